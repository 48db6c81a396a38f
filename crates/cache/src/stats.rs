//! Counters reported by the cache tiers

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Memory tier statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub sets: u64,
    pub evictions: u64,
    /// Entries currently held
    pub size: usize,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Disk tier statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DiskCacheStats {
    pub entries: usize,
    /// Bytes on disk across all entry files
    pub total_size: u64,
    /// Entries past their expiry that have not been removed yet
    pub expired: usize,
    pub hits: u64,
    pub misses: u64,
    pub writes: u64,
    pub write_failures: u64,
    pub evictions: u64,
}

/// Lock-free counters behind [`DiskCacheStats`]
#[derive(Debug, Default)]
pub(crate) struct DiskCounters {
    pub hits: AtomicU64,
    pub misses: AtomicU64,
    pub writes: AtomicU64,
    pub write_failures: AtomicU64,
    pub evictions: AtomicU64,
}

impl DiskCounters {
    pub fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn reset(&self) {
        for counter in [
            &self.hits,
            &self.misses,
            &self.writes,
            &self.write_failures,
            &self.evictions,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }

    pub fn fill(&self, stats: &mut DiskCacheStats) {
        stats.hits = self.hits.load(Ordering::Relaxed);
        stats.misses = self.misses.load(Ordering::Relaxed);
        stats.writes = self.writes.load(Ordering::Relaxed);
        stats.write_failures = self.write_failures.load(Ordering::Relaxed);
        stats.evictions = self.evictions.load(Ordering::Relaxed);
    }
}
