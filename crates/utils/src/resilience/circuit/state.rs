//! Circuit breaker state management and execution logic.

use super::config::CircuitBreakerConfig;
use super::metrics::MetricsState;
use super::transitions::{Admission, StateTransitions};
use super::types::{CircuitBreakerStats, CircuitState};
use ncli_core::{Error, Result};
use parking_lot::Mutex;
use std::future::Future;
use tokio::time::Instant;

/// Circuit breaker implementation
///
/// All state lives behind one mutex that is never held across an await,
/// so a breaker can be shared freely between tasks.
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    metrics: Mutex<MetricsState>,
    transitions: StateTransitions,
}

/// Releases the half-open slot if the trial future is dropped mid-flight
struct TrialGuard<'a> {
    breaker: &'a CircuitBreaker,
    generation: u64,
    armed: bool,
}

impl Drop for TrialGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            let mut metrics = self.breaker.metrics.lock();
            self.breaker
                .transitions
                .release_trial(&mut metrics, self.generation);
        }
    }
}

impl CircuitBreaker {
    /// Create a new circuit breaker with the given configuration
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            transitions: StateTransitions::new(config.clone()),
            metrics: Mutex::new(MetricsState::new()),
            config,
        }
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Get the current state of the circuit
    ///
    /// An open circuit whose timeout has elapsed reports `HalfOpen`; the
    /// stored state only changes when the next call arrives.
    pub fn state(&self) -> CircuitState {
        let metrics = self.metrics.lock();
        self.transitions.effective_state(&metrics, Instant::now())
    }

    /// Execute an operation through the circuit breaker
    pub async fn call<F, Fut, T>(&self, operation: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let admission = {
            let mut metrics = self.metrics.lock();
            self.transitions.admit(&mut metrics, Instant::now())
        };

        let (generation, trial) = match admission {
            Admission::Allowed { generation, trial } => (generation, trial),
            Admission::Rejected { retry_in } => {
                tracing::debug!(
                    circuit = %self.config.name,
                    retry_in_ms = retry_in.as_millis() as u64,
                    "circuit_rejected"
                );
                return Err(Error::circuit_open(&self.config.name, retry_in));
            }
        };

        let mut guard = TrialGuard {
            breaker: self,
            generation,
            armed: trial,
        };
        let result = operation().await;
        guard.armed = false;

        self.record(&result, generation);
        result
    }

    /// Execute operation outcome bookkeeping
    fn record<T>(&self, result: &Result<T>, generation: u64) {
        let now = Instant::now();
        let mut metrics = self.metrics.lock();
        match result {
            // A definitive answer from the remote (404, validation) proves it is reachable
            Err(error) if error.is_transient() => {
                self.transitions
                    .record_failure(&mut metrics, generation, now)
            }
            _ => self
                .transitions
                .record_success(&mut metrics, generation, now),
        }
    }

    /// Force the circuit closed and clear its counters
    pub fn reset(&self) {
        let mut metrics = self.metrics.lock();
        self.transitions
            .transition_to_closed(&mut metrics, Instant::now());
        metrics.reset_counters();
    }

    /// Get current circuit breaker statistics
    pub fn stats(&self) -> CircuitBreakerStats {
        let now = Instant::now();
        let metrics = self.metrics.lock();
        let mut stats = metrics.stats(now);
        stats.state = self.transitions.effective_state(&metrics, now);
        stats
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new(CircuitBreakerConfig::default())
    }
}
