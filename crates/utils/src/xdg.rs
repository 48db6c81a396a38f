use std::env;
use std::path::PathBuf;

/// XDG Base Directory paths for ncli
pub struct XdgPaths;

impl XdgPaths {
    /// Get XDG_CONFIG_HOME/ncli or fallback
    pub fn config_dir() -> PathBuf {
        env::var("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                dirs::home_dir()
                    .map(|home| home.join(".config"))
                    .unwrap_or_else(|| PathBuf::from(".config"))
            })
            .join("ncli")
    }

    /// Get XDG_CACHE_HOME/ncli or fallback
    pub fn cache_dir() -> PathBuf {
        env::var("XDG_CACHE_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                dirs::home_dir()
                    .map(|home| home.join(".cache"))
                    .unwrap_or_else(|| PathBuf::from(".cache"))
            })
            .join("ncli")
    }

    /// Directory holding one file per cached API response
    pub fn response_cache_dir() -> PathBuf {
        Self::cache_dir().join("http")
    }

    /// Persisted name -> ID index
    pub fn workspace_index() -> PathBuf {
        Self::cache_dir().join("workspace.json")
    }
}
