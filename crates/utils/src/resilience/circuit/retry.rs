//! Retry logic and recovery suggestions for resilient operations.

use super::config::RetryConfig;
use super::state::CircuitBreaker;
use ncli_core::{Error, Result};
use std::future::Future;
use tokio::time::sleep;

/// Runs fallible async operations with classification-driven retries.
///
/// Dropping the future returned by [`RetryExecutor::execute`] abandons the
/// loop at its next suspension point (the attempt or the backoff sleep).
#[derive(Debug, Clone, Default)]
pub struct RetryExecutor {
    config: RetryConfig,
}

impl RetryExecutor {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Execute an operation with the executor's configuration
    pub async fn execute<F, Fut, T>(&self, context: &str, operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.execute_with(&self.config, context, operation).await
    }

    /// Execute an operation with a per-invocation configuration
    pub async fn execute_with<F, Fut, T>(
        &self,
        config: &RetryConfig,
        context: &str,
        mut operation: F,
    ) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt: u32 = 0;

        loop {
            if attempt > 0 {
                tracing::debug!(context, attempt = attempt + 1, "retry_attempt");
            }

            let outcome = match config.attempt_timeout {
                Some(limit) => match tokio::time::timeout(limit, operation()).await {
                    Ok(outcome) => outcome,
                    Err(_) => Err(Error::timeout(context, limit)),
                },
                None => operation().await,
            };

            let error = match outcome {
                Ok(value) => {
                    if attempt > 0 {
                        tracing::info!(context, retries = attempt, "retry_succeeded");
                    }
                    return Ok(value);
                }
                Err(error) => error,
            };

            if !config.is_retryable(&error) {
                tracing::debug!(
                    context,
                    attempt = attempt + 1,
                    reason = %retry_reason(&error),
                    error = %error,
                    "retry_skipped"
                );
                return Err(error);
            }

            if attempt >= config.max_retries {
                tracing::warn!(
                    context,
                    attempts = attempt + 1,
                    reason = %retry_reason(&error),
                    error = %error,
                    "retries_exhausted"
                );
                return Err(error);
            }

            attempt += 1;
            let delay = config.delay_for(attempt, &error);
            tracing::warn!(
                context,
                attempt,
                max_retries = config.max_retries,
                reason = %retry_reason(&error),
                delay_ms = delay.as_millis() as u64,
                retry_after = error.retry_after().is_some(),
                "retry_scheduled"
            );
            sleep(delay).await;
        }
    }

    /// Retry inside a circuit breaker
    pub async fn execute_with_breaker<F, Fut, T>(
        &self,
        breaker: &CircuitBreaker,
        context: &str,
        operation: F,
    ) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        breaker
            .call(|| self.execute(context, operation))
            .await
    }
}

/// Retry with circuit breaker protection
///
/// The breaker sees one outcome per retry sequence: an exhausted sequence
/// counts as a single failure.
pub async fn retry_with_circuit_breaker<F, Fut, T>(
    executor: &RetryExecutor,
    circuit_breaker: &CircuitBreaker,
    context: &str,
    operation: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    executor
        .execute_with_breaker(circuit_breaker, context, operation)
        .await
}

/// Short machine-readable reason for a retry decision
fn retry_reason(error: &Error) -> String {
    match error {
        Error::Network { kind, .. } => format!("network:{}", kind.as_str()),
        Error::Timeout { .. } => "timeout".to_string(),
        Error::Api {
            code: Some(code), ..
        } => format!("code:{code}"),
        Error::Api { status, .. } => format!("status:{status}"),
        Error::CircuitOpen { .. } => "circuit_open".to_string(),
        _ => "non_retryable".to_string(),
    }
}

/// Helper to suggest recovery actions based on error type
pub fn suggest_recovery(error: &Error) -> String {
    match error {
        Error::Network { .. } => "Network error: Check your internet connection and try again. \
             If the problem persists, the service may be temporarily unavailable."
            .to_string(),
        Error::Timeout { .. } => "Operation timed out: The remote API took too long to respond. \
             Try again or raise NCLI_REQUEST_TIMEOUT."
            .to_string(),
        Error::Api { status: 429, .. } => {
            "Rate limited: Too many requests were sent. Wait a moment before retrying.".to_string()
        }
        Error::Api { status: 401, .. } | Error::Api { status: 403, .. } => {
            "Access denied: Check that your integration token is valid and that the resource \
             is shared with the integration."
                .to_string()
        }
        Error::Api { status, .. } if *status >= 500 => {
            "The remote service reported an internal error. Try again shortly.".to_string()
        }
        Error::Api { message, .. } => {
            format!("The request was rejected: {message}. Check the command arguments.")
        }
        Error::CircuitOpen { retry_in, .. } => format!(
            "Too many consecutive failures: requests are paused for {}s to let the service recover.",
            retry_in.as_secs().max(1)
        ),
        Error::InvalidUrl { .. } => {
            "Invalid URL: Paste the full link of the page or database, including its ID."
                .to_string()
        }
        Error::InvalidId { .. } => {
            "Invalid ID: IDs are 32 hexadecimal characters, with or without dashes.".to_string()
        }
        Error::NotFound { kind, .. } => format!(
            "No {} matched. Run a workspace sync to refresh names, or pass the ID or URL directly.",
            kind.display_name()
        ),
        Error::Configuration { message } => {
            format!("Configuration error: {message}. Check your NCLI_* environment variables.")
        }
        Error::FileSystem { .. } => "File system error: Check file permissions and disk space. \
             Ensure the cache directory is writable."
            .to_string(),
        _ => "An error occurred. Re-run with --verbose for diagnostics.".to_string(),
    }
}
