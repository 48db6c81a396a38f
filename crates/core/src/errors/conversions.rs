//! Conversion implementations for error types

use super::types::{Error, NetworkErrorKind};
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::Arc;

impl From<std::io::Error> for Error {
    fn from(error: std::io::Error) -> Self {
        Error::FileSystem {
            path: PathBuf::new(),
            operation: "unknown".to_string(),
            source: Arc::new(error),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(error: serde_json::Error) -> Self {
        Error::Json {
            message: error.to_string(),
            source: Arc::new(error),
        }
    }
}

impl From<ErrorKind> for NetworkErrorKind {
    fn from(kind: ErrorKind) -> Self {
        match kind {
            ErrorKind::ConnectionReset | ErrorKind::ConnectionAborted | ErrorKind::BrokenPipe => {
                NetworkErrorKind::ConnectionReset
            }
            ErrorKind::ConnectionRefused => NetworkErrorKind::ConnectionRefused,
            ErrorKind::TimedOut => NetworkErrorKind::TimedOut,
            _ => NetworkErrorKind::Other,
        }
    }
}
