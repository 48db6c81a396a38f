//! Core types and enums for circuit breaker functionality.

use std::time::Duration;
use tokio::time::Instant;

/// Circuit breaker states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Circuit is closed - requests pass through normally
    Closed,
    /// Circuit is open - requests fail immediately
    Open,
    /// Circuit is half-open - one trial request at a time tests recovery
    HalfOpen,
}

impl CircuitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half_open",
        }
    }
}

/// Statistics about circuit breaker state
#[derive(Debug, Clone)]
pub struct CircuitBreakerStats {
    pub state: CircuitState,
    /// Consecutive failures in the closed state
    pub failure_count: u32,
    /// Consecutive successes in the half-open state
    pub success_count: u32,
    /// Calls refused without reaching the operation
    pub rejected_calls: u64,
    /// Number of Closed/HalfOpen -> Open transitions
    pub times_opened: u64,
    pub last_failure_time: Option<Instant>,
    pub last_state_change: Instant,
    /// Remaining open time, when open
    pub retry_in: Option<Duration>,
}
