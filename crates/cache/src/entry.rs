//! Cache entry types for the memory and disk tiers

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Wall-clock milliseconds since the Unix epoch
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

pub(crate) fn duration_millis(duration: Duration) -> i64 {
    i64::try_from(duration.as_millis()).unwrap_or(i64::MAX)
}

/// In-memory cache entry
///
/// Replaced wholesale on update, never mutated in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry<T> {
    pub data: T,
    /// Insertion time in epoch milliseconds
    pub timestamp: i64,
    /// Lifetime in milliseconds
    pub ttl: i64,
}

impl<T> CacheEntry<T> {
    pub fn new(data: T, ttl: Duration) -> Self {
        Self::at(data, ttl, now_millis())
    }

    pub fn at(data: T, ttl: Duration, timestamp: i64) -> Self {
        Self {
            data,
            timestamp,
            ttl: duration_millis(ttl),
        }
    }

    /// Valid iff `now - timestamp < ttl`
    pub fn is_valid_at(&self, now: i64) -> bool {
        now.saturating_sub(self.timestamp) < self.ttl
    }

    pub fn is_valid(&self) -> bool {
        self.is_valid_at(now_millis())
    }
}

/// On-disk record, one JSON file per entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiskCacheEntry<T> {
    pub key: String,
    pub data: T,
    pub created_at: i64,
    pub expires_at: i64,
    /// Serialized size of `data` in bytes
    pub size: u64,
}

impl<T> DiskCacheEntry<T> {
    pub fn is_expired_at(&self, now: i64) -> bool {
        now >= self.expires_at
    }

    /// Lifetime left at `now`, zero once expired
    pub fn remaining_at(&self, now: i64) -> Duration {
        let left = self.expires_at.saturating_sub(now).max(0);
        Duration::from_millis(left as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_validity_boundary() {
        let entry = CacheEntry::at("x", Duration::from_millis(100), 1_000);

        assert!(entry.is_valid_at(1_000));
        assert!(entry.is_valid_at(1_099));
        assert!(!entry.is_valid_at(1_100));
        assert!(!entry.is_valid_at(5_000));
    }

    #[test]
    fn test_disk_entry_uses_camel_case() {
        let entry = DiskCacheEntry {
            key: "page:abc".to_string(),
            data: serde_json::json!({"id": "abc"}),
            created_at: 10,
            expires_at: 20,
            size: 12,
        };

        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["createdAt"], 10);
        assert_eq!(json["expiresAt"], 20);
        assert_eq!(entry.remaining_at(15), Duration::from_millis(5));
        assert_eq!(entry.remaining_at(25), Duration::ZERO);
        assert!(entry.is_expired_at(20));
    }
}
