//! Shared utilities for ncli
//!
//! Small, dependency-light building blocks used by the cache and resolver
//! crates: crash-safe file writes, XDG path discovery, diagnostic tracing
//! setup, and the retry/circuit-breaker resilience layer.

pub mod atomic_file;
pub mod resilience;
pub mod tracing;
pub mod xdg;

pub use atomic_file::*;
pub use resilience::*;
pub use xdg::*;
