use crate::runtime::Runtime;
use chrono::Utc;
use clap::Subcommand;
use ncli_core::{Error, Result};
use serde_json::{json, Value};

#[derive(Debug, Subcommand)]
pub enum WorkspaceCommands {
    /// Show the persisted database name index
    Show {
        /// Include aliases and property types of every entry
        #[arg(long)]
        full: bool,
    },
}

impl WorkspaceCommands {
    pub async fn run(self, runtime: &Runtime) -> Result<Value> {
        match self {
            WorkspaceCommands::Show { full } => {
                let path = runtime.workspace_path();
                let Some(workspace) = runtime.load_workspace() else {
                    return Ok(json!({ "path": path, "present": false }));
                };

                let databases = if full {
                    serde_json::to_value(&workspace.databases)
                        .map_err(|e| Error::json("encode workspace entries", e))?
                } else {
                    workspace
                        .databases
                        .iter()
                        .map(|entry| json!({"id": entry.id, "title": entry.title}))
                        .collect()
                };

                Ok(json!({
                    "path": path,
                    "present": true,
                    "version": workspace.version,
                    "last_sync": workspace.last_sync,
                    "age_seconds": workspace.age_at(Utc::now()).num_seconds(),
                    "count": workspace.databases.len(),
                    "databases": databases,
                }))
            }
        }
    }
}
