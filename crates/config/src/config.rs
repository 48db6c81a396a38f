//! Immutable settings shared by every component
//!
//! `Settings` is built once at startup and handed by reference to the
//! components that need it. Nothing reads the environment after that.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

/// Resource types with their own default TTL
pub const TTL_TYPES: &[&str] = &["page", "block", "database", "data_source", "user", "search"];

/// Top-level settings for the caching and resilience core
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub cache: CacheSettings,
    pub disk: DiskCacheSettings,
    pub retry: RetrySettings,
    pub circuit_breaker: CircuitBreakerSettings,
    /// Collapse concurrent identical requests
    pub dedup_enabled: bool,
    /// Emit cache and retry diagnostics on stderr
    pub verbose: bool,
}

/// In-memory cache settings
#[derive(Debug, Clone, PartialEq)]
pub struct CacheSettings {
    pub enabled: bool,
    /// TTL for types without an override
    pub default_ttl: Duration,
    /// Maximum number of entries held in memory
    pub max_entries: usize,
    /// Per-type TTL overrides keyed by resource type
    pub type_ttls: HashMap<String, Duration>,
}

impl CacheSettings {
    /// TTL for `kind`, falling back to the default
    pub fn ttl_for(&self, kind: &str) -> Duration {
        self.type_ttls
            .get(kind)
            .copied()
            .unwrap_or(self.default_ttl)
    }
}

/// Disk tier settings
#[derive(Debug, Clone, PartialEq)]
pub struct DiskCacheSettings {
    pub enabled: bool,
    /// Overrides the XDG cache location
    pub directory: Option<PathBuf>,
    /// Size budget in bytes
    pub max_size: u64,
    /// Interval of the background expiry/size pass
    pub sync_interval: Duration,
}

/// Retry engine settings
#[derive(Debug, Clone, PartialEq)]
pub struct RetrySettings {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub exponential_base: f64,
    pub jitter_factor: f64,
    /// Bound on each individual remote attempt
    pub request_timeout: Option<Duration>,
}

/// Circuit breaker settings
#[derive(Debug, Clone, PartialEq)]
pub struct CircuitBreakerSettings {
    pub failure_threshold: u32,
    pub success_threshold: u32,
    /// How long the breaker stays open before a trial call
    pub timeout: Duration,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            cache: CacheSettings::default(),
            disk: DiskCacheSettings::default(),
            retry: RetrySettings::default(),
            circuit_breaker: CircuitBreakerSettings::default(),
            dedup_enabled: true,
            verbose: false,
        }
    }
}

impl Default for CacheSettings {
    fn default() -> Self {
        let type_ttls = [
            ("page", Duration::from_secs(60)),
            ("block", Duration::from_secs(30)),
            ("database", Duration::from_secs(600)),
            ("data_source", Duration::from_secs(600)),
            ("user", Duration::from_secs(3600)),
            ("search", Duration::from_secs(30)),
        ]
        .into_iter()
        .map(|(kind, ttl)| (kind.to_string(), ttl))
        .collect();

        Self {
            enabled: true,
            default_ttl: Duration::from_secs(300),
            max_entries: 1000,
            type_ttls,
        }
    }
}

impl Default for DiskCacheSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            directory: None,
            max_size: 100 * 1024 * 1024, // 100MB
            sync_interval: Duration::from_secs(5),
        }
    }
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(30_000),
            exponential_base: 2.0,
            jitter_factor: 0.1,
            request_timeout: Some(Duration::from_secs(30)),
        }
    }
}

impl Default for CircuitBreakerSettings {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            success_threshold: 2,
            timeout: Duration::from_secs(60),
        }
    }
}
