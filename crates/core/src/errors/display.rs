//! Display implementations for error types

use super::types::Error;
use std::fmt;

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Api {
                status,
                code,
                message,
                ..
            } => match code {
                Some(code) => write!(f, "API error {status} ({code}): {message}"),
                None => write!(f, "API error {status}: {message}"),
            },
            Error::Network {
                endpoint,
                kind,
                message,
            } => {
                write!(
                    f,
                    "network error contacting '{endpoint}' ({}): {message}",
                    kind.as_str()
                )
            }
            Error::Timeout {
                operation,
                duration,
            } => {
                write!(f, "operation '{operation}' timed out after {duration:?}")
            }
            Error::CircuitOpen { name, retry_in } => {
                write!(
                    f,
                    "circuit '{name}' is open - service unavailable, next attempt in {retry_in:?}"
                )
            }
            Error::InvalidUrl { input, message } => {
                write!(f, "invalid URL '{input}': {message}")
            }
            Error::InvalidId { input } => {
                write!(
                    f,
                    "invalid ID '{input}': expected 32 hexadecimal characters"
                )
            }
            Error::NotFound { kind, query } => {
                write!(f, "{} not found: '{query}'", kind.display_name())
            }
            Error::Configuration { message } => {
                write!(f, "configuration error: {message}")
            }
            Error::FileSystem {
                path,
                operation,
                source,
            } => {
                write!(
                    f,
                    "file system {} operation failed for '{}': {}",
                    operation,
                    path.display(),
                    source
                )
            }
            Error::Json { message, .. } => {
                write!(f, "JSON error: {message}")
            }
            Error::Internal { message } => {
                write!(f, "internal error: {message}")
            }
        }
    }
}
