//! Retry logic and circuit breakers for remote calls
//!
//! ## Architecture
//!
//! - [`types`] - Core types and enums (CircuitState, stats)
//! - [`config`] - Configuration for retry and circuit breaker behavior
//! - [`metrics`] - Mutable breaker state and its counters
//! - [`transitions`] - State transition logic for circuit breakers
//! - [`state`] - The circuit breaker itself
//! - [`retry`] - Retry executor, classification and recovery suggestions
//!
//! ## Examples
//!
//! ```rust,no_run
//! use ncli_utils::resilience::circuit::{
//!     retry_with_circuit_breaker, CircuitBreaker, CircuitBreakerConfig, RetryConfig,
//!     RetryExecutor,
//! };
//!
//! # async fn example() -> ncli_core::Result<String> {
//! let executor = RetryExecutor::new(RetryConfig::default());
//! let breaker = CircuitBreaker::new(CircuitBreakerConfig::default());
//!
//! retry_with_circuit_breaker(&executor, &breaker, "GET /v1/users/me", || async {
//!     Ok("success".to_string())
//! })
//! .await
//! # }
//! ```

pub mod config;
pub mod metrics;
pub mod retry;
pub mod state;
pub mod transitions;
pub mod types;

// Re-export public API
pub use config::{CircuitBreakerConfig, RetryConfig};
pub use retry::{retry_with_circuit_breaker, suggest_recovery, RetryExecutor};
pub use state::CircuitBreaker;
pub use types::{CircuitBreakerStats, CircuitState};
