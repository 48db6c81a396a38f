//! Expiry and size-budget enforcement for the disk tier

use super::{DiskCacheManager, ENTRY_EXTENSION};
use crate::entry::{now_millis, DiskCacheEntry};
use crate::stats::DiskCounters;
use ncli_core::{Error, Result, ResultExt};
use ncli_utils::is_temp_file;
use serde::de::IgnoredAny;
use serde::Serialize;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, SystemTime};
use tokio::fs;

/// Staged files older than this belong to writers that died mid-write
const STALE_TEMP_AGE: Duration = Duration::from_secs(60);

/// Outcome of one enforcement pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EnforcementReport {
    pub expired_removed: usize,
    pub evicted: usize,
    pub stale_temp_removed: usize,
    /// Bytes left on disk after the pass
    pub total_size: u64,
    /// Another pass was already running
    pub skipped: bool,
}

/// Header of an entry file found by a directory scan
#[derive(Debug, Clone)]
pub(super) struct ScannedEntry {
    pub path: PathBuf,
    pub key: String,
    pub created_at: i64,
    pub expires_at: i64,
    pub file_size: u64,
}

struct PassGuard<'a>(&'a AtomicBool);

impl Drop for PassGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl DiskCacheManager {
    /// Drop expired entries, then delete oldest-created entries until the
    /// directory fits the size budget
    ///
    /// Only one pass runs at a time; a concurrent call returns a report
    /// with `skipped` set.
    pub async fn enforce_size_limit(&self) -> Result<EnforcementReport> {
        if self.inner.enforcing.swap(true, Ordering::AcqRel) {
            return Ok(EnforcementReport {
                skipped: true,
                total_size: self.estimated_size(),
                ..Default::default()
            });
        }
        let _guard = PassGuard(&self.inner.enforcing);

        let mut report = EnforcementReport::default();
        let (entries, stale) = self.scan_inner(true).await?;
        report.stale_temp_removed = stale;

        let now = now_millis();
        let (expired, mut live): (Vec<_>, Vec<_>) = entries
            .into_iter()
            .partition(|entry| now >= entry.expires_at);

        for entry in &expired {
            if self.remove_path(&entry.path).await {
                report.expired_removed += 1;
            }
        }

        let mut total: u64 = live.iter().map(|entry| entry.file_size).sum();
        let max_size = self.inner.config.max_size;
        if total > max_size {
            live.sort_by_key(|entry| entry.created_at);
            for entry in &live {
                if total <= max_size {
                    break;
                }
                if self.remove_path(&entry.path).await {
                    total = total.saturating_sub(entry.file_size);
                    report.evicted += 1;
                    DiskCounters::bump(&self.inner.counters.evictions);
                    tracing::debug!(key = %entry.key, size = entry.file_size, "disk_cache_evict");
                }
            }
        }

        self.inner.estimated_size.store(total, Ordering::Relaxed);
        report.total_size = total;

        if report.expired_removed > 0 || report.evicted > 0 || report.stale_temp_removed > 0 {
            tracing::debug!(
                expired_removed = report.expired_removed,
                evicted = report.evicted,
                stale_temp_removed = report.stale_temp_removed,
                total_size = total,
                max_size,
                "disk_cache_enforced"
            );
        }
        Ok(report)
    }

    /// Read the header of every entry file; corrupt files are removed
    pub(super) async fn scan(&self) -> Result<Vec<ScannedEntry>> {
        self.scan_inner(false).await.map(|(entries, _)| entries)
    }

    async fn scan_inner(&self, sweep_temp: bool) -> Result<(Vec<ScannedEntry>, usize)> {
        let dir = self.directory().to_path_buf();
        let mut read_dir = match fs::read_dir(&dir).await {
            Ok(read_dir) => read_dir,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok((Vec::new(), 0)),
            Err(e) => return Err(Error::file_system(&dir, "read cache directory", e)),
        };

        let mut entries = Vec::new();
        let mut stale_removed = 0;
        while let Some(dir_entry) = read_dir
            .next_entry()
            .await
            .with_path(&dir, "read cache directory")?
        {
            let path = dir_entry.path();

            if is_temp_file(&path) {
                if sweep_temp && is_stale(&dir_entry).await && self.remove_path(&path).await {
                    stale_removed += 1;
                }
                continue;
            }
            if path.extension().and_then(|ext| ext.to_str()) != Some(ENTRY_EXTENSION) {
                continue;
            }

            let bytes = match fs::read(&path).await {
                Ok(bytes) => bytes,
                // Removed by a concurrent writer or invalidation
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => {
                    self.inner.errors.record("scan", Some(path), e.to_string());
                    continue;
                }
            };

            match serde_json::from_slice::<DiskCacheEntry<IgnoredAny>>(&bytes) {
                Ok(header) => entries.push(ScannedEntry {
                    path,
                    key: header.key,
                    created_at: header.created_at,
                    expires_at: header.expires_at,
                    file_size: bytes.len() as u64,
                }),
                Err(e) => {
                    self.inner
                        .errors
                        .record("parse", Some(path.clone()), e.to_string());
                    self.remove_path(&path).await;
                }
            }
        }

        Ok((entries, stale_removed))
    }
}

async fn is_stale(entry: &fs::DirEntry) -> bool {
    let Ok(metadata) = entry.metadata().await else {
        return false;
    };
    metadata
        .modified()
        .ok()
        .and_then(|modified| SystemTime::now().duration_since(modified).ok())
        .is_some_and(|age| age > STALE_TEMP_AGE)
}
