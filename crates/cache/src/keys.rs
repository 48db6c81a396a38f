//! Cache key construction
//!
//! Keys are `kind:id1:id2...`. Scalar identifiers are used as-is, structured
//! ones (filters, sort specs, query bodies) are JSON-serialized first.

use serde_json::Value;

/// One component of a cache key
#[derive(Debug, Clone, PartialEq)]
pub enum KeyPart {
    Text(String),
    Json(Value),
}

impl KeyPart {
    fn render(&self) -> String {
        match self {
            KeyPart::Text(text) => text.clone(),
            KeyPart::Json(Value::String(text)) => text.clone(),
            KeyPart::Json(value) => value.to_string(),
        }
    }
}

impl From<&str> for KeyPart {
    fn from(value: &str) -> Self {
        KeyPart::Text(value.to_string())
    }
}

impl From<String> for KeyPart {
    fn from(value: String) -> Self {
        KeyPart::Text(value)
    }
}

impl From<&String> for KeyPart {
    fn from(value: &String) -> Self {
        KeyPart::Text(value.clone())
    }
}

impl From<u64> for KeyPart {
    fn from(value: u64) -> Self {
        KeyPart::Text(value.to_string())
    }
}

impl From<Value> for KeyPart {
    fn from(value: Value) -> Self {
        KeyPart::Json(value)
    }
}

impl From<&Value> for KeyPart {
    fn from(value: &Value) -> Self {
        KeyPart::Json(value.clone())
    }
}

/// Build the key for `kind` and its identifiers
///
/// With no identifiers the key is the bare `kind:` prefix, which is also
/// what prefix invalidation matches against.
pub fn cache_key(kind: &str, ids: &[KeyPart]) -> String {
    let joined = ids.iter().map(KeyPart::render).collect::<Vec<_>>().join(":");
    format!("{kind}:{joined}")
}

/// Prefix shared by every key of `kind`
pub fn kind_prefix(kind: &str) -> String {
    format!("{kind}:")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_scalar_ids_are_joined() {
        let key = cache_key("block", &["abc".into(), "children".into(), 2u64.into()]);
        assert_eq!(key, "block:abc:children:2");
    }

    #[test]
    fn test_structured_ids_are_serialized() {
        let filter = json!({"property": "Status", "status": {"equals": "Done"}});
        let key = cache_key("query", &["db1".into(), filter.into()]);
        assert_eq!(
            key,
            r#"query:db1:{"property":"Status","status":{"equals":"Done"}}"#
        );
    }

    #[test]
    fn test_json_strings_are_not_quoted() {
        assert_eq!(cache_key("page", &[json!("abc").into()]), "page:abc");
    }

    #[test]
    fn test_empty_ids_yield_prefix() {
        assert_eq!(cache_key("page", &[]), kind_prefix("page"));
    }
}
