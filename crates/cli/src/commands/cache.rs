use crate::runtime::Runtime;
use clap::Subcommand;
use ncli_core::Result;
use serde_json::{json, Value};

#[derive(Debug, Subcommand)]
pub enum CacheCommands {
    /// Show memory and disk cache statistics
    Stats,
    /// Remove every cached response
    Clear,
    /// Drop expired entries and enforce the disk size budget
    Sweep,
}

impl CacheCommands {
    pub async fn run(self, runtime: &Runtime) -> Result<Value> {
        let fetch = runtime.fetch();
        match self {
            CacheCommands::Stats => {
                let memory = fetch.memory().stats();
                let disk = match fetch.disk() {
                    Some(disk) => json!({
                        "directory": disk.directory(),
                        "max_size": disk.config().max_size,
                        "stats": disk.stats().await,
                        "recent_errors": disk.recent_errors(),
                    }),
                    None => Value::Null,
                };

                Ok(json!({
                    "enabled": fetch.memory().is_enabled(),
                    "memory": {
                        "stats": memory,
                        "hit_rate": memory.hit_rate(),
                        "max_entries": runtime.settings().cache.max_entries,
                    },
                    "disk": disk,
                    "dedup": fetch.dedup().stats(),
                    "circuit": fetch.breaker().state().as_str(),
                }))
            }
            CacheCommands::Clear => {
                let memory_entries = fetch.memory().len();
                fetch.memory().clear();
                let disk_entries = match fetch.disk() {
                    Some(disk) => disk.clear().await?,
                    None => 0,
                };
                tracing::info!(memory_entries, disk_entries, "cache_cleared");

                Ok(json!({
                    "memory_removed": memory_entries,
                    "disk_removed": disk_entries,
                }))
            }
            CacheCommands::Sweep => {
                let memory_removed = fetch.memory().sweep_expired();
                let disk = match fetch.disk() {
                    Some(disk) => Some(disk.enforce_size_limit().await?),
                    None => None,
                };

                Ok(json!({
                    "memory_removed": memory_removed,
                    "disk": disk,
                }))
            }
        }
    }
}
