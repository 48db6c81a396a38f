use crate::runtime::Runtime;
use ncli_core::{ResourceKind, Result};
use ncli_resolver::ids::to_dashed;
use ncli_resolver::{parse_input, ParsedInput};
use serde_json::{json, Value};

pub async fn run(runtime: &Runtime, input: &str, kind: Option<&str>) -> Result<Value> {
    let kind = match kind {
        Some(kind) => kind.parse()?,
        None => default_kind(input)?,
    };
    let resolver = runtime.resolver();
    let id = resolver.resolve(input, kind).await?;

    Ok(json!({
        "input": input,
        "kind": kind,
        "id": id,
        "dashed": to_dashed(&id),
        "offline": resolver.is_offline(),
    }))
}

/// Names are looked up as databases; URLs and identifiers as pages
fn default_kind(input: &str) -> Result<ResourceKind> {
    Ok(match parse_input(input)? {
        ParsedInput::Name(_) => ResourceKind::Database,
        ParsedInput::Id(_) => ResourceKind::Page,
    })
}
