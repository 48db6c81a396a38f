//! Mutable state and counters behind a circuit breaker.

use super::types::{CircuitBreakerStats, CircuitState};
use tokio::time::Instant;

/// Everything a breaker mutates, guarded by a single lock in
/// [`super::state::CircuitBreaker`].
#[derive(Debug)]
pub struct MetricsState {
    pub state: CircuitState,
    pub failure_count: u32,
    pub success_count: u32,
    /// Set while the single half-open trial call is running
    pub trial_in_flight: bool,
    /// Earliest moment an open circuit admits a trial call
    pub next_attempt_at: Option<Instant>,
    pub last_failure_time: Option<Instant>,
    pub last_state_change: Instant,
    pub rejected_calls: u64,
    pub times_opened: u64,
    /// Bumped on every transition so stale outcomes can be discarded
    pub generation: u64,
}

impl MetricsState {
    /// Create new metrics state
    pub fn new() -> Self {
        Self {
            state: CircuitState::Closed,
            failure_count: 0,
            success_count: 0,
            trial_in_flight: false,
            next_attempt_at: None,
            last_failure_time: None,
            last_state_change: Instant::now(),
            rejected_calls: 0,
            times_opened: 0,
            generation: 0,
        }
    }

    /// Reset internal counters
    pub fn reset_counters(&mut self) {
        self.failure_count = 0;
        self.success_count = 0;
        self.trial_in_flight = false;
    }

    /// Snapshot of the current statistics
    pub fn stats(&self, now: Instant) -> CircuitBreakerStats {
        CircuitBreakerStats {
            state: self.state,
            failure_count: self.failure_count,
            success_count: self.success_count,
            rejected_calls: self.rejected_calls,
            times_opened: self.times_opened,
            last_failure_time: self.last_failure_time,
            last_state_change: self.last_state_change,
            retry_in: match (self.state, self.next_attempt_at) {
                (CircuitState::Open, Some(at)) => Some(at.saturating_duration_since(now)),
                _ => None,
            },
        }
    }
}

impl Default for MetricsState {
    fn default() -> Self {
        Self::new()
    }
}
