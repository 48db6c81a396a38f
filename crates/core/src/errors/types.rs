//! Core error type definitions

use crate::types::ResourceKind;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Result type alias for ncli operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for ncli operations using thiserror
///
/// Errors are `Clone` so a single deduplicated outcome can be handed to
/// every caller waiting on the same key. Non-clonable sources are kept
/// behind an `Arc`.
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    /// The remote API answered with an error status
    Api {
        status: u16,
        code: Option<String>,
        message: String,
        retry_after: Option<Duration>,
    },

    /// The request never produced a response
    Network {
        endpoint: String,
        kind: NetworkErrorKind,
        message: String,
    },

    /// Operation timeout errors
    Timeout {
        operation: String,
        duration: Duration,
    },

    /// The circuit breaker rejected the call without attempting it
    CircuitOpen { name: String, retry_in: Duration },

    /// Input looked like a URL but carried no resource ID
    InvalidUrl { input: String, message: String },

    /// Input looked like an ID but was malformed
    InvalidId { input: String },

    /// Resolution exhausted every stage
    NotFound { kind: ResourceKind, query: String },

    /// Configuration errors
    Configuration { message: String },

    /// File system operations
    FileSystem {
        path: PathBuf,
        operation: String,
        #[source]
        source: Arc<std::io::Error>,
    },

    /// JSON serialization/deserialization errors
    Json {
        message: String,
        #[source]
        source: Arc<serde_json::Error>,
    },

    /// Invariant violations inside ncli itself
    Internal { message: String },
}

/// Why a request failed before a response arrived
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkErrorKind {
    ConnectionReset,
    ConnectionRefused,
    Dns,
    TimedOut,
    Other,
}

impl NetworkErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NetworkErrorKind::ConnectionReset => "connection_reset",
            NetworkErrorKind::ConnectionRefused => "connection_refused",
            NetworkErrorKind::Dns => "dns",
            NetworkErrorKind::TimedOut => "timed_out",
            NetworkErrorKind::Other => "other",
        }
    }
}
