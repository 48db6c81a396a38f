//! Configuration structs and implementations for retry and circuit breaker behavior.

use ncli_config::{CircuitBreakerSettings, RetrySettings};
use ncli_core::Error;
use rand::Rng;
use std::collections::HashSet;
use std::time::Duration;

/// Default maximum number of retry attempts
const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default base delay for exponential backoff (1s)
const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(1000);

/// Default maximum delay for exponential backoff (30s)
const DEFAULT_MAX_DELAY: Duration = Duration::from_millis(30_000);

/// Default jitter factor (0.1 = ±10% randomization)
const DEFAULT_JITTER_FACTOR: f64 = 0.1;

/// Statuses worth another attempt
pub const DEFAULT_RETRYABLE_STATUS_CODES: &[u16] = &[408, 429, 500, 502, 503, 504];

/// Remote error codes worth another attempt
pub const DEFAULT_RETRYABLE_ERROR_CODES: &[&str] = &[
    "rate_limited",
    "service_unavailable",
    "internal_server_error",
    "conflict_error",
];

/// Configuration for retry behavior
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Maximum number of retries after the first attempt
    pub max_retries: u32,
    /// Delay before the first retry
    pub base_delay: Duration,
    /// Upper bound for any single delay
    pub max_delay: Duration,
    /// Growth factor between consecutive delays
    pub exponential_base: f64,
    /// Symmetric jitter as a fraction of the delay (0.0 to 1.0)
    pub jitter_factor: f64,
    pub retryable_status_codes: HashSet<u16>,
    pub retryable_error_codes: HashSet<String>,
    /// Bound on each individual attempt
    pub attempt_timeout: Option<Duration>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            base_delay: DEFAULT_BASE_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
            exponential_base: 2.0,
            jitter_factor: DEFAULT_JITTER_FACTOR,
            retryable_status_codes: DEFAULT_RETRYABLE_STATUS_CODES.iter().copied().collect(),
            retryable_error_codes: DEFAULT_RETRYABLE_ERROR_CODES
                .iter()
                .map(|code| code.to_string())
                .collect(),
            attempt_timeout: None,
        }
    }
}

impl From<&RetrySettings> for RetryConfig {
    fn from(settings: &RetrySettings) -> Self {
        Self {
            max_retries: settings.max_retries,
            base_delay: settings.base_delay,
            max_delay: settings.max_delay,
            exponential_base: settings.exponential_base,
            jitter_factor: settings.jitter_factor,
            attempt_timeout: settings.request_timeout,
            ..Default::default()
        }
    }
}

impl RetryConfig {
    /// Create a config that never retries
    pub fn no_retry() -> Self {
        Self {
            max_retries: 0,
            ..Default::default()
        }
    }

    /// Check if an error should be retried
    pub fn is_retryable(&self, error: &Error) -> bool {
        match error {
            Error::Network { .. } | Error::Timeout { .. } => true,
            Error::Api { status, code, .. } => {
                code.as_deref()
                    .is_some_and(|code| self.retryable_error_codes.contains(code))
                    || self.retryable_status_codes.contains(status)
            }
            _ => false,
        }
    }

    /// Backoff for retry number `attempt` (1-based) before jitter
    pub fn exponential_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1) as i32;
        let millis = self.base_delay.as_millis() as f64 * self.exponential_base.powi(exponent);
        let capped = millis.min(self.max_delay.as_millis() as f64);
        Duration::from_millis(capped.max(0.0) as u64)
    }

    /// Calculate delay for a given attempt with exponential backoff and jitter
    pub fn calculate_delay(&self, attempt: u32) -> Duration {
        let delay = self.exponential_delay(attempt);
        if self.jitter_factor <= 0.0 {
            return delay;
        }

        let millis = delay.as_millis() as f64;
        let spread = rand::thread_rng().gen_range(-1.0..=1.0) * self.jitter_factor * millis;
        let jittered = (millis + spread)
            .max(0.0)
            .min(self.max_delay.as_millis() as f64);
        Duration::from_millis(jittered as u64)
    }

    /// Delay before retry `attempt` after `error`; a `Retry-After` hint wins
    pub fn delay_for(&self, attempt: u32, error: &Error) -> Duration {
        match error.retry_after() {
            Some(after) => after.min(self.max_delay),
            None => self.calculate_delay(attempt),
        }
    }
}

/// Configuration for circuit breaker behavior
#[derive(Debug, Clone, PartialEq)]
pub struct CircuitBreakerConfig {
    /// Name used in diagnostics and `CircuitOpen` errors
    pub name: String,
    /// Consecutive failures before opening the circuit
    pub failure_threshold: u32,
    /// Consecutive half-open successes before closing the circuit
    pub success_threshold: u32,
    /// How long the circuit stays open before a trial call
    pub timeout: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            name: "api".to_string(),
            failure_threshold: 5,
            success_threshold: 2,
            timeout: Duration::from_secs(60),
        }
    }
}

impl From<&CircuitBreakerSettings> for CircuitBreakerConfig {
    fn from(settings: &CircuitBreakerSettings) -> Self {
        Self {
            failure_threshold: settings.failure_threshold,
            success_threshold: settings.success_threshold,
            timeout: settings.timeout,
            ..Default::default()
        }
    }
}
