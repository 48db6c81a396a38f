//! Bounded log of soft disk-cache failures

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::VecDeque;
use std::path::PathBuf;

/// Number of failures kept for inspection
pub const ERROR_LOG_CAPACITY: usize = 32;

/// A disk failure that was swallowed and turned into a miss
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiskCacheError {
    pub at: DateTime<Utc>,
    pub operation: &'static str,
    pub path: Option<PathBuf>,
    pub message: String,
}

#[derive(Debug, Default)]
pub(crate) struct ErrorLog {
    entries: Mutex<VecDeque<DiskCacheError>>,
}

impl ErrorLog {
    pub fn record(&self, operation: &'static str, path: Option<PathBuf>, message: impl Into<String>) {
        let error = DiskCacheError {
            at: Utc::now(),
            operation,
            path,
            message: message.into(),
        };
        tracing::debug!(
            operation,
            path = ?error.path,
            error = %error.message,
            "disk_cache_error"
        );

        let mut entries = self.entries.lock();
        if entries.len() == ERROR_LOG_CAPACITY {
            entries.pop_front();
        }
        entries.push_back(error);
    }

    pub fn snapshot(&self) -> Vec<DiskCacheError> {
        self.entries.lock().iter().cloned().collect()
    }
}
