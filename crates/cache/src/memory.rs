//! Process-local TTL cache
//!
//! Entries are keyed by `kind:id...` (see [`crate::keys`]) and stored as
//! JSON values so one map can hold every resource type. Expiry is lazy:
//! `get` drops an expired entry on sight, and roughly one `set` in ten
//! sweeps the whole map. [`MemoryCache::sweep_expired`] runs a sweep on
//! demand.
//!
//! When a disk tier is attached, a miss starts a detached lookup that
//! promotes a valid disk entry into memory. The miss itself is not
//! delayed, so only a later `get` observes the promoted entry.

use crate::disk::DiskCacheManager;
use crate::entry::{now_millis, CacheEntry};
use crate::keys::{cache_key, kind_prefix, KeyPart};
use crate::stats::CacheStats;
use ncli_config::CacheSettings;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Share of `set` calls that sweep expired entries
const SWEEP_PROBABILITY: f64 = 0.1;

macro_rules! cache_event {
    ($inner:expr, $($arg:tt)+) => {
        if $inner.verbose {
            tracing::debug!(namespace = "memory_cache", $($arg)+);
        }
    };
}

/// In-memory tier; clones share the same map
#[derive(Clone)]
pub struct MemoryCache {
    inner: Arc<MemoryInner>,
}

struct MemoryInner {
    settings: CacheSettings,
    verbose: bool,
    disk: Option<DiskCacheManager>,
    state: Mutex<MemoryState>,
}

#[derive(Default)]
struct MemoryState {
    entries: HashMap<String, Slot>,
    /// Insertion order, breaks timestamp ties during eviction
    next_seq: u64,
    hits: u64,
    misses: u64,
    sets: u64,
    evictions: u64,
}

struct Slot {
    entry: CacheEntry<Value>,
    seq: u64,
}

impl std::fmt::Debug for MemoryCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryCache")
            .field("enabled", &self.inner.settings.enabled)
            .field("max_entries", &self.inner.settings.max_entries)
            .field("len", &self.len())
            .field("disk", &self.inner.disk.is_some())
            .finish()
    }
}

impl MemoryCache {
    pub fn new(settings: CacheSettings) -> Self {
        Self::with_options(settings, false, None)
    }

    /// Cache with verbose diagnostics and an optional disk tier to promote from
    pub fn with_options(settings: CacheSettings, verbose: bool, disk: Option<DiskCacheManager>) -> Self {
        Self {
            inner: Arc::new(MemoryInner {
                settings,
                verbose,
                disk,
                state: Mutex::new(MemoryState::default()),
            }),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.inner.settings.enabled
    }

    /// Default TTL for `kind`
    pub fn ttl_for(&self, kind: &str) -> Duration {
        self.inner.settings.ttl_for(kind)
    }

    pub fn disk(&self) -> Option<&DiskCacheManager> {
        self.inner.disk.as_ref()
    }

    pub fn len(&self) -> usize {
        self.inner.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Cached value for `kind` and `ids`, if present and fresh
    pub fn get<T: DeserializeOwned>(&self, kind: &str, ids: &[KeyPart]) -> Option<T> {
        self.get_at(kind, ids, now_millis())
    }

    pub(crate) fn get_at<T: DeserializeOwned>(&self, kind: &str, ids: &[KeyPart], now: i64) -> Option<T> {
        if !self.is_enabled() {
            return None;
        }
        let key = cache_key(kind, ids);
        let value = self.get_key_at(&key, now, true)?;

        match serde_json::from_value(value) {
            Ok(data) => Some(data),
            Err(e) => {
                cache_event!(self.inner, key = %key, error = %e, "cache_decode_failed");
                None
            }
        }
    }

    /// Raw lookup by full key
    pub fn get_key(&self, key: &str) -> Option<Value> {
        if !self.is_enabled() {
            return None;
        }
        self.get_key_at(key, now_millis(), true)
    }

    /// Lookup for callers that consult the disk tier themselves
    pub(crate) fn get_key_without_promotion(&self, key: &str) -> Option<Value> {
        if !self.is_enabled() {
            return None;
        }
        self.get_key_at(key, now_millis(), false)
    }

    fn get_key_at(&self, key: &str, now: i64, promote: bool) -> Option<Value> {
        let found = {
            let mut state = self.inner.state.lock();
            let fresh = state
                .entries
                .get(key)
                .map(|slot| slot.entry.is_valid_at(now).then(|| slot.entry.data.clone()));
            match fresh {
                Some(Some(data)) => {
                    state.hits += 1;
                    Some(data)
                }
                Some(None) => {
                    state.entries.remove(key);
                    state.misses += 1;
                    cache_event!(self.inner, key, "cache_expire");
                    None
                }
                None => {
                    state.misses += 1;
                    None
                }
            }
        };

        match found {
            Some(data) => {
                cache_event!(self.inner, key, "cache_hit");
                Some(data)
            }
            None => {
                cache_event!(self.inner, key, "cache_miss");
                if promote {
                    self.spawn_promotion(key);
                }
                None
            }
        }
    }

    /// Store `data` under `kind` and `ids`; `ttl` falls back to the kind's default
    pub fn set<T: Serialize + ?Sized>(&self, kind: &str, data: &T, ttl: Option<Duration>, ids: &[KeyPart]) {
        if !self.is_enabled() {
            return;
        }
        let key = cache_key(kind, ids);
        let ttl = ttl.unwrap_or_else(|| self.ttl_for(kind));
        match serde_json::to_value(data) {
            Ok(value) => self.set_key_at(key, value, ttl, now_millis()),
            Err(e) => cache_event!(self.inner, key = %key, error = %e, "cache_encode_failed"),
        }
    }

    /// Store a raw value under a full key
    pub fn set_key(&self, key: impl Into<String>, value: Value, ttl: Duration) {
        if self.is_enabled() {
            self.set_key_at(key.into(), value, ttl, now_millis());
        }
    }

    pub(crate) fn set_key_at(&self, key: String, value: Value, ttl: Duration, now: i64) {
        let mut state = self.inner.state.lock();

        if fastrand::f64() < SWEEP_PROBABILITY {
            let swept = sweep_locked(&mut state, now);
            if swept > 0 {
                cache_event!(self.inner, swept, "cache_sweep");
            }
        }

        self.insert_locked(&mut state, key, CacheEntry::at(value, ttl, now));
    }

    /// Insert, evicting the single oldest entry when a new key would overflow the map
    fn insert_locked(&self, state: &mut MemoryState, key: String, entry: CacheEntry<Value>) {
        if !state.entries.contains_key(&key) && state.entries.len() >= self.inner.settings.max_entries {
            let oldest = state
                .entries
                .iter()
                .min_by_key(|(_, slot)| (slot.entry.timestamp, slot.seq))
                .map(|(oldest, _)| oldest.clone());
            if let Some(oldest) = oldest {
                state.entries.remove(&oldest);
                state.evictions += 1;
                cache_event!(self.inner, key = %oldest, "cache_evict");
            }
        }

        let seq = state.next_seq;
        state.next_seq += 1;
        cache_event!(self.inner, key = %key, ttl_ms = entry.ttl, "cache_set");
        state.entries.insert(key, Slot { entry, seq });
        state.sets += 1;
    }

    /// Remove the entry for `ids`, or every entry of `kind` when `ids` is empty
    pub fn invalidate(&self, kind: &str, ids: &[KeyPart]) -> usize {
        let mut state = self.inner.state.lock();
        let removed = if ids.is_empty() {
            let prefix = kind_prefix(kind);
            let before = state.entries.len();
            state.entries.retain(|key, _| !key.starts_with(&prefix));
            before - state.entries.len()
        } else {
            usize::from(state.entries.remove(&cache_key(kind, ids)).is_some())
        };
        cache_event!(self.inner, kind, removed, "cache_invalidate");
        removed
    }

    /// Drop every entry and reset the counters
    pub fn clear(&self) {
        let mut state = self.inner.state.lock();
        let removed = state.entries.len();
        *state = MemoryState::default();
        cache_event!(self.inner, removed, "cache_clear");
    }

    /// Remove every expired entry now
    pub fn sweep_expired(&self) -> usize {
        self.sweep_expired_at(now_millis())
    }

    pub(crate) fn sweep_expired_at(&self, now: i64) -> usize {
        let swept = sweep_locked(&mut self.inner.state.lock(), now);
        cache_event!(self.inner, swept, "cache_sweep");
        swept
    }

    pub fn stats(&self) -> CacheStats {
        let state = self.inner.state.lock();
        CacheStats {
            hits: state.hits,
            misses: state.misses,
            sets: state.sets,
            evictions: state.evictions,
            size: state.entries.len(),
        }
    }

    /// Look the key up on disk in the background and promote a valid hit
    fn spawn_promotion(&self, key: &str) {
        let Some(disk) = self.inner.disk.clone() else {
            return;
        };
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            return;
        };

        let cache = self.clone();
        let key = key.to_string();
        runtime.spawn(async move {
            let Some(entry) = disk.get::<Value>(&key).await else {
                return;
            };
            let now = now_millis();
            let remaining = entry.remaining_at(now);
            if remaining.is_zero() {
                return;
            }

            let mut state = cache.inner.state.lock();
            // A fresher value was set while the disk read was in flight
            if state.entries.contains_key(&key) {
                return;
            }
            cache_event!(cache.inner, key = %key, ttl_ms = remaining.as_millis() as u64, "cache_promote");
            cache.insert_locked(&mut state, key, CacheEntry::at(entry.data, remaining, now));
        });
    }
}

fn sweep_locked(state: &mut MemoryState, now: i64) -> usize {
    let before = state.entries.len();
    state.entries.retain(|_, slot| slot.entry.is_valid_at(now));
    before - state.entries.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::disk::DiskCacheConfig;
    use serde_json::json;
    use tempfile::TempDir;

    fn settings(max_entries: usize) -> CacheSettings {
        CacheSettings {
            max_entries,
            ..Default::default()
        }
    }

    #[test]
    fn test_get_returns_data_until_ttl_elapses() {
        let cache = MemoryCache::new(settings(10));
        cache.set_key_at("page:a".into(), json!({"id": "a"}), Duration::from_millis(100), 1_000);

        let hit: Option<Value> = cache.get_at("page", &["a".into()], 1_099);
        assert_eq!(hit, Some(json!({"id": "a"})));

        let expired: Option<Value> = cache.get_at("page", &["a".into()], 1_100);
        assert_eq!(expired, None);
        assert!(cache.is_empty());

        // Re-expiry is idempotent
        let again: Option<Value> = cache.get_at("page", &["a".into()], 1_200);
        assert_eq!(again, None);

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 2);
    }

    #[test]
    fn test_overflow_evicts_exactly_the_oldest() {
        let cache = MemoryCache::new(settings(3));
        let ttl = Duration::from_secs(3600);
        for (i, key) in ["page:1", "page:2", "page:3", "page:4"].iter().enumerate() {
            cache.set_key_at(key.to_string(), json!(i), ttl, 1_000 + i as i64);
        }

        assert_eq!(cache.len(), 3);
        assert!(cache.get_key_at("page:1", 2_000, false).is_none());
        for key in ["page:2", "page:3", "page:4"] {
            assert!(cache.get_key_at(key, 2_000, false).is_some(), "{key} should survive");
        }
        assert_eq!(cache.stats().evictions, 1);
    }

    #[test]
    fn test_overwriting_existing_key_does_not_evict() {
        let cache = MemoryCache::new(settings(2));
        let ttl = Duration::from_secs(3600);
        cache.set_key_at("page:1".into(), json!(1), ttl, 1_000);
        cache.set_key_at("page:2".into(), json!(2), ttl, 1_001);
        cache.set_key_at("page:1".into(), json!(10), ttl, 1_002);

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get_key_at("page:1", 2_000, false), Some(json!(10)));
        assert_eq!(cache.stats().evictions, 0);
    }

    #[test]
    fn test_prefix_invalidation_leaves_other_kinds() {
        let cache = MemoryCache::new(settings(100));
        cache.set("page", &json!(1), None, &["a".into()]);
        cache.set("page", &json!(2), None, &["b".into(), "children".into()]);
        cache.set("pages", &json!(3), None, &["c".into()]);
        cache.set("user", &json!(4), None, &["a".into()]);

        assert_eq!(cache.invalidate("page", &[]), 2);

        assert!(cache.get::<Value>("page", &["a".into()]).is_none());
        assert!(cache.get::<Value>("pages", &["c".into()]).is_some());
        assert!(cache.get::<Value>("user", &["a".into()]).is_some());
    }

    #[test]
    fn test_exact_invalidation() {
        let cache = MemoryCache::new(settings(100));
        cache.set("block", &json!([1]), None, &["a".into()]);
        cache.set("block", &json!([2]), None, &["b".into()]);

        assert_eq!(cache.invalidate("block", &["a".into()]), 1);
        assert_eq!(cache.invalidate("block", &["a".into()]), 0);
        assert_eq!(cache.get::<Vec<u32>>("block", &["b".into()]), Some(vec![2]));
    }

    #[test]
    fn test_typed_round_trip_and_default_ttl() {
        #[derive(Debug, PartialEq, Serialize, serde::Deserialize)]
        struct User {
            id: String,
            name: String,
        }

        let cache = MemoryCache::new(settings(10));
        let user = User {
            id: "u1".into(),
            name: "Ada".into(),
        };
        cache.set("user", &user, None, &["u1".into()]);

        assert_eq!(cache.get::<User>("user", &["u1".into()]), Some(user));
        // One hour default for users
        let later = now_millis() + 3_599_000;
        assert!(cache.get_at::<User>("user", &["u1".into()], later).is_some());
    }

    #[test]
    fn test_sweep_expired() {
        let cache = MemoryCache::new(settings(10));
        cache.set_key_at("page:a".into(), json!(1), Duration::from_millis(10), 1_000);
        cache.set_key_at("page:b".into(), json!(2), Duration::from_millis(500), 1_000);

        assert_eq!(cache.sweep_expired_at(1_100), 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_clear_resets_counters() {
        let cache = MemoryCache::new(settings(10));
        cache.set("page", &json!(1), None, &["a".into()]);
        let _ = cache.get::<Value>("page", &["a".into()]);

        cache.clear();

        assert_eq!(cache.stats(), CacheStats::default());
    }

    #[test]
    fn test_disabled_cache_stores_nothing() {
        let cache = MemoryCache::new(CacheSettings {
            enabled: false,
            ..Default::default()
        });
        cache.set("page", &json!(1), None, &["a".into()]);

        assert!(cache.get::<Value>("page", &["a".into()]).is_none());
        assert!(cache.is_empty());
        assert_eq!(cache.stats().misses, 0);
    }

    #[tokio::test]
    async fn test_miss_promotes_from_disk_in_background() {
        let dir = TempDir::new().unwrap();
        let disk = DiskCacheManager::new(DiskCacheConfig {
            sync_interval: Duration::ZERO,
            ..DiskCacheConfig::new(dir.path())
        });
        disk.initialize().await.unwrap();
        disk.set("page:a", &json!({"id": "a"}), Duration::from_secs(60))
            .await
            .unwrap();

        let cache = MemoryCache::with_options(settings(10), true, Some(disk));

        // The first lookup is a miss regardless of the disk tier
        assert!(cache.get::<Value>("page", &["a".into()]).is_none());

        let mut promoted = None;
        for _ in 0..100 {
            tokio::time::sleep(Duration::from_millis(10)).await;
            if cache.len() == 1 {
                promoted = cache.get::<Value>("page", &["a".into()]);
                break;
            }
        }
        assert_eq!(promoted, Some(json!({"id": "a"})));
    }
}
