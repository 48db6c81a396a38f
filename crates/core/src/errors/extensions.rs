//! Inspection helpers used by the resilience layer

use super::types::{Error, Result};
use std::path::Path;
use std::time::Duration;

impl Error {
    /// HTTP status for API errors
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Remote error code for API errors
    pub fn api_code(&self) -> Option<&str> {
        match self {
            Error::Api { code, .. } => code.as_deref(),
            _ => None,
        }
    }

    /// `Retry-After` hint carried by the error, if any
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Error::Api { retry_after, .. } => *retry_after,
            _ => None,
        }
    }

    /// True when the failure says nothing about the request itself: no
    /// response, a timeout, throttling, or a server-side fault.
    pub fn is_transient(&self) -> bool {
        match self {
            Error::Network { .. } | Error::Timeout { .. } => true,
            Error::Api { status, .. } => matches!(status, 408 | 429) || *status >= 500,
            _ => false,
        }
    }

    /// Remote 404 or exhausted local resolution
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound { .. }) || self.status() == Some(404)
    }

    pub fn is_circuit_open(&self) -> bool {
        matches!(self, Error::CircuitOpen { .. })
    }
}

/// Attach file or payload context to foreign errors
pub trait ResultExt<T> {
    fn with_path(self, path: &Path, operation: &str) -> Result<T>;
}

impl<T> ResultExt<T> for std::io::Result<T> {
    fn with_path(self, path: &Path, operation: &str) -> Result<T> {
        self.map_err(|source| Error::file_system(path, operation, source))
    }
}

impl<T> ResultExt<T> for serde_json::Result<T> {
    fn with_path(self, path: &Path, operation: &str) -> Result<T> {
        self.map_err(|source| Error::json(format!("{operation} {}", path.display()), source))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::NetworkErrorKind;
    use crate::types::ResourceKind;

    #[test]
    fn test_transient_classification() {
        assert!(Error::network("api", NetworkErrorKind::Dns, "lookup failed").is_transient());
        assert!(Error::timeout("fetch", Duration::from_secs(1)).is_transient());
        assert!(Error::api(429, "slow down").is_transient());
        assert!(Error::api(503, "unavailable").is_transient());
        assert!(!Error::api(400, "bad request").is_transient());
        assert!(!Error::api(404, "missing").is_transient());
        assert!(!Error::circuit_open("api", Duration::ZERO).is_transient());
    }

    #[test]
    fn test_retry_after_only_on_api_errors() {
        let err = Error::api(429, "slow down").with_retry_after(Duration::from_secs(5));
        assert_eq!(err.retry_after(), Some(Duration::from_secs(5)));

        let err = Error::internal("boom").with_retry_after(Duration::from_secs(5));
        assert_eq!(err.retry_after(), None);
    }

    #[test]
    fn test_not_found_covers_remote_and_local() {
        assert!(Error::api(404, "missing").is_not_found());
        assert!(Error::not_found(ResourceKind::Page, "Roadmap").is_not_found());
        assert!(!Error::api(500, "boom").is_not_found());
    }

    #[test]
    fn test_display_messages() {
        let err = Error::api_with_code(409, "conflict_error", "retry the write");
        assert_eq!(err.to_string(), "API error 409 (conflict_error): retry the write");

        let err = Error::not_found(ResourceKind::Database, "Tasks");
        assert_eq!(err.to_string(), "database not found: 'Tasks'");
    }

    #[test]
    fn test_result_ext_attaches_path() {
        let io: std::io::Result<()> = Err(std::io::Error::from(std::io::ErrorKind::NotFound));
        match io.with_path(Path::new("/tmp/entry.json"), "read") {
            Err(Error::FileSystem {
                path, operation, ..
            }) => {
                assert_eq!(path, Path::new("/tmp/entry.json"));
                assert_eq!(operation, "read");
            }
            other => panic!("unexpected: {other:?}"),
        }

        let parsed: serde_json::Result<u32> = serde_json::from_str("nope");
        let err = parsed.with_path(Path::new("index.json"), "parse").unwrap_err();
        assert!(matches!(err, Error::Json { .. }));
    }
}
