use ncli_cache::CachedFetch;
use ncli_config::Settings;
use ncli_resolver::{ResourceResolver, WorkspaceCache};
use ncli_utils::XdgPaths;
use std::path::{Path, PathBuf};

/// Process-wide instances, built once at startup and borrowed by commands
#[derive(Debug, Clone)]
pub struct Runtime {
    settings: Settings,
    fetch: CachedFetch,
    workspace_path: PathBuf,
}

impl Runtime {
    /// Wire the cache tiers; a disk tier that cannot start is reported and
    /// left to fail soft
    pub async fn from_settings(settings: Settings, workspace_path: Option<PathBuf>) -> Self {
        let fetch = CachedFetch::from_settings(&settings);
        if let Err(e) = fetch.initialize().await {
            tracing::warn!(error = %e, "disk_cache_unavailable");
        }

        Self {
            settings,
            fetch,
            workspace_path: workspace_path.unwrap_or_else(XdgPaths::workspace_index),
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn fetch(&self) -> &CachedFetch {
        &self.fetch
    }

    pub fn workspace_path(&self) -> &Path {
        &self.workspace_path
    }

    pub fn load_workspace(&self) -> Option<WorkspaceCache> {
        WorkspaceCache::load(&self.workspace_path)
    }

    /// Index-only resolver; no transport is configured in this binary
    pub fn resolver(&self) -> ResourceResolver {
        ResourceResolver::offline(self.load_workspace())
    }

    pub async fn shutdown(&self) {
        self.fetch.shutdown().await;
    }
}
