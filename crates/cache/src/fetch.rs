//! Cached, deduplicated and resilient remote fetches
//!
//! `CachedFetch` is the single entry point callers use for reads:
//!
//! ```text
//! dedup(key) -> memory hit? -> disk hit? (promote) -> breaker(retry(fetch)) -> populate both tiers
//! ```
//!
//! Every component is an explicit instance; clones share them.

use crate::dedup::DeduplicationManager;
use crate::disk::{DiskCacheConfig, DiskCacheManager};
use crate::entry::now_millis;
use crate::keys::{cache_key, kind_prefix, KeyPart};
use crate::memory::MemoryCache;
use ncli_config::Settings;
use ncli_core::{ApiRequest, Result, Transport};
use ncli_utils::{CircuitBreaker, CircuitBreakerConfig, RetryConfig, RetryExecutor};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Per-call knobs for [`CachedFetch::fetch`]
#[derive(Debug, Clone, Default)]
pub struct FetchOptions {
    /// Overrides the kind's default TTL
    pub ttl: Option<Duration>,
    /// Skip cache reads; the fresh result is still stored
    pub bypass_cache: bool,
    /// Overrides the executor's retry policy for this call
    pub retry: Option<RetryConfig>,
}

impl FetchOptions {
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            ttl: Some(ttl),
            ..Default::default()
        }
    }

    pub fn fresh() -> Self {
        Self {
            bypass_cache: true,
            ..Default::default()
        }
    }
}

#[derive(Clone)]
pub struct CachedFetch {
    memory: MemoryCache,
    disk: Option<DiskCacheManager>,
    dedup: DeduplicationManager,
    retry: RetryExecutor,
    breaker: Arc<CircuitBreaker>,
}

impl std::fmt::Debug for CachedFetch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachedFetch")
            .field("memory", &self.memory)
            .field("disk", &self.disk)
            .field("dedup", &self.dedup)
            .field("circuit", &self.breaker.state())
            .finish()
    }
}

impl CachedFetch {
    pub fn new(
        memory: MemoryCache,
        disk: Option<DiskCacheManager>,
        dedup: DeduplicationManager,
        retry: RetryExecutor,
        breaker: Arc<CircuitBreaker>,
    ) -> Self {
        Self {
            memory,
            disk,
            dedup,
            retry,
            breaker,
        }
    }

    /// Wire every tier from settings; call [`CachedFetch::initialize`] before use
    pub fn from_settings(settings: &Settings) -> Self {
        let disk = (settings.cache.enabled && settings.disk.enabled)
            .then(|| DiskCacheManager::new(DiskCacheConfig::from_settings(&settings.disk)));
        let memory = MemoryCache::with_options(settings.cache.clone(), settings.verbose, disk.clone());

        Self::new(
            memory,
            disk,
            DeduplicationManager::new(settings.dedup_enabled),
            RetryExecutor::new(RetryConfig::from(&settings.retry)),
            Arc::new(CircuitBreaker::new(CircuitBreakerConfig::from(
                &settings.circuit_breaker,
            ))),
        )
    }

    /// Prepare the disk tier; failures disable nothing but are reported
    pub async fn initialize(&self) -> Result<()> {
        match &self.disk {
            Some(disk) => disk.initialize().await,
            None => Ok(()),
        }
    }

    pub fn memory(&self) -> &MemoryCache {
        &self.memory
    }

    pub fn disk(&self) -> Option<&DiskCacheManager> {
        self.disk.as_ref()
    }

    pub fn dedup(&self) -> &DeduplicationManager {
        &self.dedup
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    pub fn retry(&self) -> &RetryExecutor {
        &self.retry
    }

    /// Cached read of `kind`/`ids`, falling back to `fetch_fn`
    pub async fn fetch<T, F, Fut>(
        &self,
        kind: &str,
        ids: &[KeyPart],
        fetch_fn: F,
        options: FetchOptions,
    ) -> Result<T>
    where
        T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        let key = cache_key(kind, ids);
        let ttl = options.ttl.unwrap_or_else(|| self.memory.ttl_for(kind));
        let this = self.clone();
        let owned_key = key.clone();

        self.dedup
            .execute(&key, move || async move {
                this.fetch_uncoalesced(owned_key, ttl, fetch_fn, options)
                    .await
            })
            .await
    }

    async fn fetch_uncoalesced<T, F, Fut>(
        &self,
        key: String,
        ttl: Duration,
        fetch_fn: F,
        options: FetchOptions,
    ) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        if !options.bypass_cache {
            if let Some(value) = self.memory.get_key_without_promotion(&key) {
                if let Ok(data) = serde_json::from_value(value) {
                    return Ok(data);
                }
            }

            if let Some(data) = self.read_disk(&key).await {
                return Ok(data);
            }
        }

        let data = self
            .breaker
            .call(|| async {
                match &options.retry {
                    Some(config) => self.retry.execute_with(config, &key, fetch_fn).await,
                    None => self.retry.execute(&key, fetch_fn).await,
                }
            })
            .await?;

        self.store(&key, &data, ttl);
        Ok(data)
    }

    async fn read_disk<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        if !self.memory.is_enabled() {
            return None;
        }
        let disk = self.disk.as_ref()?;
        let entry = disk.get::<Value>(key).await?;

        let remaining = entry.remaining_at(now_millis());
        if !remaining.is_zero() {
            self.memory.set_key(key, entry.data.clone(), remaining);
        }
        serde_json::from_value(entry.data).ok()
    }

    fn store<T: Serialize>(&self, key: &str, data: &T, ttl: Duration) {
        if !self.memory.is_enabled() {
            return;
        }
        match serde_json::to_value(data) {
            Ok(value) => {
                if let Some(disk) = &self.disk {
                    disk.spawn_set(key, &value, ttl);
                }
                self.memory.set_key(key, value, ttl);
            }
            Err(e) => tracing::debug!(key, error = %e, "cache_encode_failed"),
        }
    }

    /// Cached GET-style read through a transport
    pub async fn fetch_request(
        &self,
        kind: &str,
        ids: &[KeyPart],
        transport: Arc<dyn Transport>,
        request: ApiRequest,
        options: FetchOptions,
    ) -> Result<Value> {
        self.fetch(
            kind,
            ids,
            move || {
                let transport = Arc::clone(&transport);
                let request = request.clone();
                async move { transport.fetch(request).await }
            },
            options,
        )
        .await
    }

    /// Breaker and retry without caching, for writes
    pub async fn call<T, F, Fut>(&self, context: &str, operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.retry
            .execute_with_breaker(&self.breaker, context, operation)
            .await
    }

    /// Drop cached entries after a mutation; empty `ids` clears the whole kind
    pub async fn invalidate(&self, kind: &str, ids: &[KeyPart]) -> usize {
        let mut removed = self.memory.invalidate(kind, ids);
        if let Some(disk) = &self.disk {
            removed += if ids.is_empty() {
                disk.invalidate_prefix(&kind_prefix(kind)).await
            } else {
                usize::from(disk.invalidate(&cache_key(kind, ids)).await)
            };
        }
        removed
    }

    /// Await detached disk writes and stop the disk tier
    pub async fn shutdown(&self) {
        if let Some(disk) = &self.disk {
            disk.shutdown().await;
        }
    }
}
