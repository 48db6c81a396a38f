//! Resilience patterns: retries with backoff and circuit breaking.
//!
//! ## Key Components
//!
//! - **`circuit`**: the retry executor and the circuit breaker that wraps
//!   it, so a remote that keeps failing is not hammered further.

pub mod circuit;

pub use circuit::{
    retry_with_circuit_breaker, suggest_recovery, CircuitBreaker, CircuitBreakerConfig,
    CircuitBreakerStats, CircuitState, RetryConfig, RetryExecutor,
};
