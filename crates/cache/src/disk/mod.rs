//! Disk-persisted response cache
//!
//! Each entry lives in its own JSON file named by the SHA-256 of its key.
//! Writes stage a temporary file beside the target and rename it into
//! place, so a reader never sees a partial entry. Every I/O or parse
//! failure is soft: it is recorded in a bounded error log and the caller
//! sees a miss.
//!
//! The tier is advisory. Entries may lag behind the memory tier and are
//! never treated as authoritative.

mod background;
mod enforce;
mod error_log;

pub use enforce::EnforcementReport;
pub use error_log::{DiskCacheError, ERROR_LOG_CAPACITY};

use crate::entry::{duration_millis, now_millis, DiskCacheEntry};
use crate::stats::{DiskCacheStats, DiskCounters};
use error_log::ErrorLog;
use ncli_config::DiskCacheSettings;
use ncli_core::{Error, Result, ResultExt};
use ncli_utils::{is_temp_file, write_atomic_async, XdgPaths};
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::fs;
use tokio::task::JoinHandle;

/// Extension of entry files
pub const ENTRY_EXTENSION: &str = "json";

/// Where and how much the disk tier stores
#[derive(Debug, Clone, PartialEq)]
pub struct DiskCacheConfig {
    pub directory: PathBuf,
    /// Size budget in bytes
    pub max_size: u64,
    /// Interval of the periodic expiry/size pass, zero disables it
    pub sync_interval: Duration,
}

impl DiskCacheConfig {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        let defaults = DiskCacheSettings::default();
        Self {
            directory: directory.into(),
            max_size: defaults.max_size,
            sync_interval: defaults.sync_interval,
        }
    }

    /// Resolve the directory against the XDG cache location
    pub fn from_settings(settings: &DiskCacheSettings) -> Self {
        Self {
            directory: settings
                .directory
                .clone()
                .unwrap_or_else(XdgPaths::response_cache_dir),
            max_size: settings.max_size,
            sync_interval: settings.sync_interval,
        }
    }
}

/// Disk tier handle; clones share the same state
#[derive(Clone)]
pub struct DiskCacheManager {
    pub(crate) inner: Arc<DiskInner>,
}

pub(crate) struct DiskInner {
    config: DiskCacheConfig,
    /// Running estimate of bytes on disk, re-synced by every enforcement pass
    estimated_size: AtomicU64,
    initialized: AtomicBool,
    enforcing: AtomicBool,
    counters: DiskCounters,
    errors: ErrorLog,
    /// Detached writes and enforcement passes not yet awaited
    pending: Mutex<Vec<JoinHandle<()>>>,
    sync_handle: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for DiskInner {
    fn drop(&mut self) {
        background::stop_sync_task(self);
    }
}

impl std::fmt::Debug for DiskCacheManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiskCacheManager")
            .field("directory", &self.inner.config.directory)
            .field("max_size", &self.inner.config.max_size)
            .field("estimated_size", &self.estimated_size())
            .finish()
    }
}

/// Hex SHA-256 of a cache key
pub fn hash_key(key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(key.as_bytes());
    hex::encode(hasher.finalize())
}

impl DiskCacheManager {
    pub fn new(config: DiskCacheConfig) -> Self {
        Self {
            inner: Arc::new(DiskInner {
                config,
                estimated_size: AtomicU64::new(0),
                initialized: AtomicBool::new(false),
                enforcing: AtomicBool::new(false),
                counters: DiskCounters::default(),
                errors: ErrorLog::default(),
                pending: Mutex::new(Vec::new()),
                sync_handle: Mutex::new(None),
            }),
        }
    }

    pub fn config(&self) -> &DiskCacheConfig {
        &self.inner.config
    }

    pub fn directory(&self) -> &Path {
        &self.inner.config.directory
    }

    /// Canonical file for `key`
    pub fn path_for(&self, key: &str) -> PathBuf {
        self.directory()
            .join(format!("{}.{ENTRY_EXTENSION}", hash_key(key)))
    }

    pub fn estimated_size(&self) -> u64 {
        self.inner.estimated_size.load(Ordering::Relaxed)
    }

    /// Create the directory, run a first enforcement pass and start the
    /// periodic sync task. Later calls are no-ops.
    pub async fn initialize(&self) -> Result<()> {
        if self.inner.initialized.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        let dir = self.directory().to_path_buf();
        if let Err(e) = fs::create_dir_all(&dir)
            .await
            .with_path(&dir, "create cache directory")
        {
            self.inner.initialized.store(false, Ordering::Release);
            return Err(e);
        }

        let report = self.enforce_size_limit().await?;
        tracing::debug!(
            directory = %dir.display(),
            total_size = report.total_size,
            expired_removed = report.expired_removed,
            evicted = report.evicted,
            "disk_cache_initialized"
        );

        background::start_sync_task(self);
        Ok(())
    }

    /// Read a valid entry; expired entries are deleted on sight
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<DiskCacheEntry<T>> {
        let path = self.path_for(key);
        let bytes = match fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) => {
                if e.kind() != ErrorKind::NotFound {
                    self.inner
                        .errors
                        .record("read", Some(path.clone()), e.to_string());
                }
                return self.miss(key);
            }
        };

        let entry: DiskCacheEntry<Value> = match serde_json::from_slice(&bytes) {
            Ok(entry) => entry,
            Err(e) => {
                self.inner
                    .errors
                    .record("parse", Some(path.clone()), e.to_string());
                self.remove_path(&path).await;
                return self.miss(key);
            }
        };

        // Hash collisions are treated as misses
        if entry.key != key {
            return self.miss(key);
        }

        if entry.is_expired_at(now_millis()) {
            tracing::debug!(key, "disk_cache_expired");
            self.remove_path(&path).await;
            return self.miss(key);
        }

        let DiskCacheEntry {
            key: entry_key,
            data,
            created_at,
            expires_at,
            size,
        } = entry;
        match serde_json::from_value::<T>(data) {
            Ok(data) => {
                DiskCounters::bump(&self.inner.counters.hits);
                tracing::debug!(key, size, "disk_cache_hit");
                Some(DiskCacheEntry {
                    key: entry_key,
                    data,
                    created_at,
                    expires_at,
                    size,
                })
            }
            Err(e) => {
                self.inner
                    .errors
                    .record("decode", Some(path), e.to_string());
                self.miss(key)
            }
        }
    }

    fn miss<T>(&self, key: &str) -> Option<T> {
        DiskCounters::bump(&self.inner.counters.misses);
        tracing::trace!(key, "disk_cache_miss");
        None
    }

    /// Persist `data` under `key` for `ttl`
    ///
    /// Failures are recorded before being returned; callers that do not
    /// care use [`DiskCacheManager::spawn_set`].
    pub async fn set<T: Serialize + ?Sized>(&self, key: &str, data: &T, ttl: Duration) -> Result<()> {
        let path = self.path_for(key);
        let replaced = fs::metadata(&path).await.map(|m| m.len()).unwrap_or(0);
        match self.write_entry(&path, key, data, ttl).await {
            Ok(written) => {
                DiskCounters::bump(&self.inner.counters.writes);
                let resize = |current: u64| current.saturating_sub(replaced).saturating_add(written);
                let estimated = self
                    .inner
                    .estimated_size
                    .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |current| {
                        Some(resize(current))
                    })
                    .map_or_else(resize, resize);
                tracing::debug!(key, size = written, "disk_cache_set");

                if estimated > self.inner.config.max_size {
                    self.spawn_enforcement();
                }
                Ok(())
            }
            Err(e) => {
                DiskCounters::bump(&self.inner.counters.write_failures);
                self.inner
                    .errors
                    .record("write", Some(path), e.to_string());
                Err(e)
            }
        }
    }

    async fn write_entry<T: Serialize + ?Sized>(
        &self,
        path: &Path,
        key: &str,
        data: &T,
        ttl: Duration,
    ) -> Result<u64> {
        let data = serde_json::to_value(data)
            .map_err(|e| Error::json("serialize cache entry", e))?;
        let size = data.to_string().len() as u64;
        let created_at = now_millis();
        let entry = DiskCacheEntry {
            key: key.to_string(),
            data,
            created_at,
            expires_at: created_at.saturating_add(duration_millis(ttl)),
            size,
        };

        let bytes = serde_json::to_vec(&entry)
            .map_err(|e| Error::json("serialize cache entry", e))?;
        write_atomic_async(path, &bytes).await?;
        Ok(bytes.len() as u64)
    }

    /// Fire-and-forget write; the outcome only shows up in stats and the
    /// error log. [`DiskCacheManager::flush`] awaits outstanding writes.
    pub fn spawn_set<T: Serialize + ?Sized>(&self, key: impl Into<String>, data: &T, ttl: Duration) {
        let key = key.into();
        let value = match serde_json::to_value(data) {
            Ok(value) => value,
            Err(e) => {
                DiskCounters::bump(&self.inner.counters.write_failures);
                self.inner.errors.record("serialize", None, e.to_string());
                return;
            }
        };

        let manager = self.clone();
        self.spawn_tracked(async move {
            // Already recorded by set
            let _ = manager.set(&key, &value, ttl).await;
        });
    }

    fn spawn_enforcement(&self) {
        let manager = self.clone();
        self.spawn_tracked(async move {
            if let Err(e) = manager.enforce_size_limit().await {
                tracing::debug!(error = %e, "disk_cache_enforcement_failed");
            }
        });
    }

    fn spawn_tracked<F>(&self, task: F)
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            self.inner
                .errors
                .record("spawn", None, "no async runtime available");
            return;
        };

        let handle = runtime.spawn(task);
        let mut pending = self.inner.pending.lock();
        pending.retain(|handle| !handle.is_finished());
        pending.push(handle);
    }

    /// Await every detached write and enforcement pass started so far
    pub async fn flush(&self) {
        loop {
            let handles = std::mem::take(&mut *self.inner.pending.lock());
            if handles.is_empty() {
                break;
            }
            for handle in handles {
                if let Err(e) = handle.await {
                    tracing::debug!(error = %e, "disk_cache_task_failed");
                }
            }
        }
    }

    /// Delete the entry for `key`; true when a file was removed
    pub async fn invalidate(&self, key: &str) -> bool {
        let path = self.path_for(key);
        let removed = self.remove_path(&path).await;
        if removed {
            tracing::debug!(key, "disk_cache_invalidate");
        }
        removed
    }

    /// Delete every entry whose key starts with `prefix`
    pub async fn invalidate_prefix(&self, prefix: &str) -> usize {
        let entries = match self.scan().await {
            Ok(entries) => entries,
            Err(e) => {
                self.inner
                    .errors
                    .record("scan", Some(self.directory().to_path_buf()), e.to_string());
                return 0;
            }
        };

        let mut removed = 0;
        for entry in entries.iter().filter(|entry| entry.key.starts_with(prefix)) {
            if self.remove_path(&entry.path).await {
                removed += 1;
            }
        }
        tracing::debug!(prefix, removed, "disk_cache_invalidate_prefix");
        removed
    }

    /// Remove every entry and staged file and reset the counters
    pub async fn clear(&self) -> Result<usize> {
        self.flush().await;

        let dir = self.directory().to_path_buf();
        let mut read_dir = match fs::read_dir(&dir).await {
            Ok(read_dir) => read_dir,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(Error::file_system(&dir, "read cache directory", e)),
        };

        let mut removed = 0;
        while let Some(entry) = read_dir
            .next_entry()
            .await
            .with_path(&dir, "read cache directory")?
        {
            let path = entry.path();
            let is_entry = path.extension().and_then(|ext| ext.to_str()) == Some(ENTRY_EXTENSION);
            if !is_entry && !is_temp_file(&path) {
                continue;
            }
            match fs::remove_file(&path).await {
                Ok(()) if is_entry => removed += 1,
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => self.inner.errors.record("clear", Some(path), e.to_string()),
            }
        }

        self.inner.estimated_size.store(0, Ordering::Relaxed);
        self.inner.counters.reset();
        tracing::debug!(directory = %dir.display(), removed, "disk_cache_clear");
        Ok(removed)
    }

    /// Stop the sync task, await pending writes and run a final pass
    pub async fn shutdown(&self) {
        background::stop_sync_task(&self.inner);
        self.flush().await;

        match self.enforce_size_limit().await {
            Ok(report) => tracing::debug!(
                total_size = report.total_size,
                evicted = report.evicted,
                "disk_cache_shutdown"
            ),
            Err(e) => tracing::debug!(error = %e, "disk_cache_shutdown_failed"),
        }
    }

    /// Scan the directory and combine it with the running counters
    pub async fn stats(&self) -> DiskCacheStats {
        let mut stats = DiskCacheStats::default();
        match self.scan().await {
            Ok(entries) => {
                let now = now_millis();
                stats.entries = entries.len();
                stats.total_size = entries.iter().map(|entry| entry.file_size).sum();
                stats.expired = entries
                    .iter()
                    .filter(|entry| now >= entry.expires_at)
                    .count();
            }
            Err(e) => self.inner.errors.record(
                "scan",
                Some(self.directory().to_path_buf()),
                e.to_string(),
            ),
        }
        self.inner.counters.fill(&mut stats);
        stats
    }

    /// Most recent soft failures, oldest first
    pub fn recent_errors(&self) -> Vec<DiskCacheError> {
        self.inner.errors.snapshot()
    }

    /// Remove one file, keeping the size estimate in step
    async fn remove_path(&self, path: &Path) -> bool {
        let size = fs::metadata(path).await.map(|m| m.len()).unwrap_or(0);
        match fs::remove_file(path).await {
            Ok(()) => {
                let _ = self.inner.estimated_size.fetch_update(
                    Ordering::Relaxed,
                    Ordering::Relaxed,
                    |current| Some(current.saturating_sub(size)),
                );
                true
            }
            Err(e) if e.kind() == ErrorKind::NotFound => false,
            Err(e) => {
                self.inner
                    .errors
                    .record("remove", Some(path.to_path_buf()), e.to_string());
                false
            }
        }
    }
}
