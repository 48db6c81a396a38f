//! State transition logic for circuit breaker.

use super::config::CircuitBreakerConfig;
use super::metrics::MetricsState;
use super::types::CircuitState;
use std::time::Duration;
use tokio::time::Instant;

/// Outcome of asking the breaker whether a call may proceed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Run the operation; `trial` marks the single half-open probe
    Allowed { generation: u64, trial: bool },
    /// Fail fast without running the operation
    Rejected { retry_in: Duration },
}

/// Handles state transitions for circuit breaker
#[derive(Debug, Clone)]
pub struct StateTransitions {
    config: CircuitBreakerConfig,
}

impl StateTransitions {
    /// Create new state transitions handler
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self { config }
    }

    /// Decide whether a call may run. Open -> HalfOpen happens here, lazily.
    pub fn admit(&self, metrics: &mut MetricsState, now: Instant) -> Admission {
        match metrics.state {
            CircuitState::Closed => Admission::Allowed {
                generation: metrics.generation,
                trial: false,
            },
            CircuitState::Open => {
                let next_attempt_at = metrics.next_attempt_at.unwrap_or(now);
                if now >= next_attempt_at {
                    self.transition_to_half_open(metrics, now);
                    metrics.trial_in_flight = true;
                    Admission::Allowed {
                        generation: metrics.generation,
                        trial: true,
                    }
                } else {
                    metrics.rejected_calls += 1;
                    Admission::Rejected {
                        retry_in: next_attempt_at - now,
                    }
                }
            }
            CircuitState::HalfOpen => {
                if metrics.trial_in_flight {
                    metrics.rejected_calls += 1;
                    Admission::Rejected {
                        retry_in: Duration::ZERO,
                    }
                } else {
                    metrics.trial_in_flight = true;
                    Admission::Allowed {
                        generation: metrics.generation,
                        trial: true,
                    }
                }
            }
        }
    }

    /// Transition to open state
    pub fn transition_to_open(&self, metrics: &mut MetricsState, now: Instant) {
        if metrics.state != CircuitState::Open {
            tracing::warn!(
                circuit = %self.config.name,
                from = metrics.state.as_str(),
                failures = metrics.failure_count,
                timeout_ms = self.config.timeout.as_millis() as u64,
                "circuit_opened"
            );
            metrics.state = CircuitState::Open;
            metrics.next_attempt_at = Some(now + self.config.timeout);
            metrics.last_state_change = now;
            metrics.times_opened += 1;
            metrics.generation += 1;
            metrics.reset_counters();
        }
    }

    /// Transition to half-open state
    pub fn transition_to_half_open(&self, metrics: &mut MetricsState, now: Instant) {
        if metrics.state != CircuitState::HalfOpen {
            tracing::info!(circuit = %self.config.name, "circuit_half_open");
            metrics.state = CircuitState::HalfOpen;
            metrics.last_state_change = now;
            metrics.generation += 1;
            metrics.reset_counters();
        }
    }

    /// Transition to closed state
    pub fn transition_to_closed(&self, metrics: &mut MetricsState, now: Instant) {
        if metrics.state != CircuitState::Closed {
            tracing::info!(circuit = %self.config.name, "circuit_closed");
            metrics.state = CircuitState::Closed;
            metrics.next_attempt_at = None;
            metrics.last_state_change = now;
            metrics.generation += 1;
            metrics.reset_counters();
        }
    }

    /// Record a successful call and handle state transitions
    pub fn record_success(&self, metrics: &mut MetricsState, generation: u64, now: Instant) {
        // Outcomes from before the last transition no longer apply
        if generation != metrics.generation {
            return;
        }

        match metrics.state {
            CircuitState::HalfOpen => {
                metrics.trial_in_flight = false;
                metrics.success_count += 1;
                if metrics.success_count >= self.config.success_threshold {
                    self.transition_to_closed(metrics, now);
                }
            }
            CircuitState::Closed => {
                metrics.failure_count = 0;
            }
            CircuitState::Open => {}
        }
    }

    /// Record a failed call and handle state transitions
    pub fn record_failure(&self, metrics: &mut MetricsState, generation: u64, now: Instant) {
        metrics.last_failure_time = Some(now);
        if generation != metrics.generation {
            return;
        }

        match metrics.state {
            CircuitState::Closed => {
                metrics.failure_count += 1;
                if metrics.failure_count >= self.config.failure_threshold {
                    self.transition_to_open(metrics, now);
                }
            }
            CircuitState::HalfOpen => {
                // Any failure in half-open state reopens the circuit
                self.transition_to_open(metrics, now);
            }
            CircuitState::Open => {}
        }
    }

    /// Free the half-open slot of a trial that ended without an outcome
    pub fn release_trial(&self, metrics: &mut MetricsState, generation: u64) {
        if generation == metrics.generation && metrics.state == CircuitState::HalfOpen {
            metrics.trial_in_flight = false;
        }
    }

    /// State as a caller would observe it right now
    pub fn effective_state(&self, metrics: &MetricsState, now: Instant) -> CircuitState {
        match (metrics.state, metrics.next_attempt_at) {
            (CircuitState::Open, Some(at)) if now >= at => CircuitState::HalfOpen,
            (state, _) => state,
        }
    }
}
