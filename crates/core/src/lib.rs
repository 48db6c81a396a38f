//! Core domain types and errors for `ncli`.
//!
//! ## Key Components
//!
//! - **`errors`**: the `Error` enum and `Result` alias shared by every
//!   crate, including the classification helpers the retry engine and
//!   circuit breaker rely on.
//! - **`types`**: `ResourceKind` and other small domain types.
//! - **`transport`**: the `Transport` trait, the only capability the core
//!   needs from the remote API layer.

pub mod errors;
pub mod transport;
pub mod types;

pub use self::{
    errors::{Error, NetworkErrorKind, Result, ResultExt},
    transport::{ApiRequest, Method, Transport},
    types::*,
};
