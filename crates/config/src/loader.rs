//! Settings loader for ncli
//!
//! Reads `NCLI_*` variables through a lookup function so tests can feed a
//! plain map instead of mutating the process environment.

use crate::config::{Settings, TTL_TYPES};
use ncli_core::{Error, Result};
use std::collections::HashMap;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Prefix shared by every configuration variable
pub const ENV_PREFIX: &str = "NCLI_";

/// Builds [`Settings`] from environment-style key/value lookups
pub struct SettingsLoader<F> {
    lookup: F,
}

impl SettingsLoader<fn(&str) -> Option<String>> {
    /// Loader backed by the process environment
    pub fn from_env() -> Self {
        fn env_lookup(key: &str) -> Option<String> {
            std::env::var(key).ok()
        }
        Self { lookup: env_lookup }
    }
}

impl<F> SettingsLoader<F>
where
    F: Fn(&str) -> Option<String>,
{
    /// Loader backed by an arbitrary lookup function
    pub fn new(lookup: F) -> Self {
        Self { lookup }
    }

    /// Apply every recognised variable on top of the defaults
    pub fn load(&self) -> Result<Settings> {
        let mut settings = Settings::default();

        if let Some(enabled) = self.parse_bool("CACHE_ENABLED")? {
            settings.cache.enabled = enabled;
        }
        if let Some(ttl) = self.parse_millis("CACHE_TTL")? {
            settings.cache.default_ttl = ttl;
        }
        if let Some(max) = self.parse::<usize>("CACHE_MAX_SIZE")? {
            if max == 0 {
                return Err(Error::configuration(
                    "NCLI_CACHE_MAX_SIZE must be greater than zero",
                ));
            }
            settings.cache.max_entries = max;
        }
        for kind in TTL_TYPES {
            let name = format!("CACHE_TTL_{}", kind.to_ascii_uppercase());
            if let Some(ttl) = self.parse_millis(&name)? {
                settings.cache.type_ttls.insert((*kind).to_string(), ttl);
            }
        }

        if let Some(enabled) = self.parse_bool("DISK_CACHE_ENABLED")? {
            settings.disk.enabled = enabled;
        }
        if let Some(dir) = self.var("DISK_CACHE_DIR") {
            settings.disk.directory = Some(PathBuf::from(dir));
        }
        if let Some(max) = self.parse::<u64>("DISK_CACHE_MAX_SIZE")? {
            settings.disk.max_size = max;
        }
        if let Some(interval) = self.parse_millis("DISK_CACHE_SYNC_INTERVAL")? {
            settings.disk.sync_interval = interval;
        }

        if let Some(retries) = self.parse::<u32>("MAX_RETRIES")? {
            settings.retry.max_retries = retries;
        }
        if let Some(delay) = self.parse_millis("BASE_DELAY")? {
            settings.retry.base_delay = delay;
        }
        if let Some(delay) = self.parse_millis("MAX_DELAY")? {
            settings.retry.max_delay = delay;
        }
        if let Some(base) = self.parse::<f64>("EXP_BASE")? {
            if base < 1.0 {
                return Err(Error::configuration("NCLI_EXP_BASE must be at least 1.0"));
            }
            settings.retry.exponential_base = base;
        }
        if let Some(jitter) = self.parse::<f64>("JITTER_FACTOR")? {
            if !(0.0..=1.0).contains(&jitter) {
                return Err(Error::configuration(
                    "NCLI_JITTER_FACTOR must be between 0.0 and 1.0",
                ));
            }
            settings.retry.jitter_factor = jitter;
        }
        if let Some(timeout) = self.parse_millis("REQUEST_TIMEOUT")? {
            // Zero disables the per-attempt timeout
            settings.retry.request_timeout = (!timeout.is_zero()).then_some(timeout);
        }

        if let Some(threshold) = self.parse::<u32>("CB_FAILURE_THRESHOLD")? {
            settings.circuit_breaker.failure_threshold = threshold.max(1);
        }
        if let Some(threshold) = self.parse::<u32>("CB_SUCCESS_THRESHOLD")? {
            settings.circuit_breaker.success_threshold = threshold.max(1);
        }
        if let Some(timeout) = self.parse_millis("CB_TIMEOUT")? {
            settings.circuit_breaker.timeout = timeout;
        }

        if let Some(enabled) = self.parse_bool("DEDUP_ENABLED")? {
            settings.dedup_enabled = enabled;
        }
        if let Some(verbose) = self.parse_bool("VERBOSE")? {
            settings.verbose = verbose;
        }

        tracing::debug!(?settings, "settings_loaded");
        Ok(settings)
    }

    fn var(&self, name: &str) -> Option<String> {
        (self.lookup)(&format!("{ENV_PREFIX}{name}"))
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    }

    fn parse<T: FromStr>(&self, name: &str) -> Result<Option<T>> {
        match self.var(name) {
            Some(raw) => raw.parse::<T>().map(Some).map_err(|_| {
                Error::configuration(format!("invalid value '{raw}' for {ENV_PREFIX}{name}"))
            }),
            None => Ok(None),
        }
    }

    fn parse_millis(&self, name: &str) -> Result<Option<Duration>> {
        Ok(self.parse::<u64>(name)?.map(Duration::from_millis))
    }

    fn parse_bool(&self, name: &str) -> Result<Option<bool>> {
        match self.var(name) {
            Some(raw) => match raw.to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => Ok(Some(true)),
                "0" | "false" | "no" | "off" => Ok(Some(false)),
                _ => Err(Error::configuration(format!(
                    "invalid boolean '{raw}' for {ENV_PREFIX}{name}"
                ))),
            },
            None => Ok(None),
        }
    }
}

impl Settings {
    /// Load settings from the process environment
    pub fn from_env() -> Result<Self> {
        SettingsLoader::from_env().load()
    }

    /// Load settings from a fixed set of variables
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self> {
        SettingsLoader::new(|key: &str| vars.get(key).cloned()).load()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_defaults_without_variables() {
        let settings = Settings::from_vars(&HashMap::new()).unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.cache.ttl_for("user"), Duration::from_secs(3600));
        assert_eq!(settings.cache.ttl_for("comment"), Duration::from_secs(300));
    }

    #[test]
    fn test_overrides_are_applied() {
        let settings = Settings::from_vars(&vars(&[
            ("NCLI_CACHE_ENABLED", "false"),
            ("NCLI_CACHE_MAX_SIZE", "50"),
            ("NCLI_CACHE_TTL_PAGE", "1500"),
            ("NCLI_DISK_CACHE_MAX_SIZE", "2048"),
            ("NCLI_MAX_RETRIES", "7"),
            ("NCLI_JITTER_FACTOR", "0.25"),
            ("NCLI_CB_TIMEOUT", "250"),
            ("NCLI_DEDUP_ENABLED", "off"),
            ("NCLI_VERBOSE", "1"),
        ]))
        .unwrap();

        assert!(!settings.cache.enabled);
        assert_eq!(settings.cache.max_entries, 50);
        assert_eq!(settings.cache.ttl_for("page"), Duration::from_millis(1500));
        assert_eq!(settings.disk.max_size, 2048);
        assert_eq!(settings.retry.max_retries, 7);
        assert_eq!(settings.retry.jitter_factor, 0.25);
        assert_eq!(settings.circuit_breaker.timeout, Duration::from_millis(250));
        assert!(!settings.dedup_enabled);
        assert!(settings.verbose);
    }

    #[test]
    fn test_zero_request_timeout_disables_it() {
        let settings = Settings::from_vars(&vars(&[("NCLI_REQUEST_TIMEOUT", "0")])).unwrap();
        assert_eq!(settings.retry.request_timeout, None);
    }

    #[test]
    fn test_invalid_values_name_the_variable() {
        let err = Settings::from_vars(&vars(&[("NCLI_MAX_RETRIES", "many")])).unwrap_err();
        assert!(err.to_string().contains("NCLI_MAX_RETRIES"));

        let err = Settings::from_vars(&vars(&[("NCLI_JITTER_FACTOR", "3")])).unwrap_err();
        assert!(err.to_string().contains("NCLI_JITTER_FACTOR"));

        let err = Settings::from_vars(&vars(&[("NCLI_VERBOSE", "loud")])).unwrap_err();
        assert!(err.to_string().contains("NCLI_VERBOSE"));
    }

    #[test]
    #[serial]
    fn test_from_env_reads_process_environment() {
        std::env::set_var("NCLI_CB_FAILURE_THRESHOLD", "9");
        let settings = Settings::from_env().unwrap();
        std::env::remove_var("NCLI_CB_FAILURE_THRESHOLD");

        assert_eq!(settings.circuit_breaker.failure_threshold, 9);
    }
}
