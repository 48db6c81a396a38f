//! Builder methods for creating errors with context

use super::types::{Error, NetworkErrorKind};
use crate::types::ResourceKind;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

impl Error {
    /// Create an API error from a status code and message
    #[must_use]
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Error::Api {
            status,
            code: None,
            message: message.into(),
            retry_after: None,
        }
    }

    /// Create an API error carrying the remote error code
    #[must_use]
    pub fn api_with_code(status: u16, code: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Api {
            status,
            code: Some(code.into()),
            message: message.into(),
            retry_after: None,
        }
    }

    /// Attach a `Retry-After` hint to an API error. Other variants are returned unchanged.
    #[must_use]
    pub fn with_retry_after(self, after: Duration) -> Self {
        match self {
            Error::Api {
                status,
                code,
                message,
                ..
            } => Error::Api {
                status,
                code,
                message,
                retry_after: Some(after),
            },
            other => other,
        }
    }

    /// Create a network error
    #[must_use]
    pub fn network(
        endpoint: impl Into<String>,
        kind: NetworkErrorKind,
        message: impl Into<String>,
    ) -> Self {
        Error::Network {
            endpoint: endpoint.into(),
            kind,
            message: message.into(),
        }
    }

    /// Create a timeout error
    #[must_use]
    pub fn timeout(operation: impl Into<String>, duration: Duration) -> Self {
        Error::Timeout {
            operation: operation.into(),
            duration,
        }
    }

    /// Create the sentinel returned while a circuit is open
    #[must_use]
    pub fn circuit_open(name: impl Into<String>, retry_in: Duration) -> Self {
        Error::CircuitOpen {
            name: name.into(),
            retry_in,
        }
    }

    #[must_use]
    pub fn invalid_url(input: impl Into<String>, message: impl Into<String>) -> Self {
        Error::InvalidUrl {
            input: input.into(),
            message: message.into(),
        }
    }

    #[must_use]
    pub fn invalid_id(input: impl Into<String>) -> Self {
        Error::InvalidId {
            input: input.into(),
        }
    }

    #[must_use]
    pub fn not_found(kind: ResourceKind, query: impl Into<String>) -> Self {
        Error::NotFound {
            kind,
            query: query.into(),
        }
    }

    /// Create a configuration error
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Error::Configuration {
            message: message.into(),
        }
    }

    /// Create a file system error with context
    #[must_use]
    pub fn file_system(
        path: impl Into<PathBuf>,
        operation: impl Into<String>,
        source: std::io::Error,
    ) -> Self {
        Error::FileSystem {
            path: path.into(),
            operation: operation.into(),
            source: Arc::new(source),
        }
    }

    /// Create a JSON error with a custom message
    #[must_use]
    pub fn json(message: impl Into<String>, source: serde_json::Error) -> Self {
        Error::Json {
            message: message.into(),
            source: Arc::new(source),
        }
    }

    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Error::Internal {
            message: message.into(),
        }
    }
}
