//! Request deduplication
//!
//! Concurrent calls that share a key collapse into one in-flight
//! operation. The first caller spawns the operation as a detached task and
//! every caller, including late joiners, awaits the same shared handle, so
//! all of them observe the same `Ok` or `Err`. The task removes its map
//! entry when it settles, panics included; there is no other eviction.

use futures::future::{BoxFuture, FutureExt, Shared};
use ncli_core::{Error, Result};
use parking_lot::Mutex;
use serde::Serialize;
use std::any::Any;
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

type SharedOutcome = Shared<BoxFuture<'static, Result<Arc<dyn Any + Send + Sync>>>>;

/// Counters for [`DeduplicationManager`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DedupStats {
    /// Calls that joined an in-flight operation
    pub hits: u64,
    /// Calls that started a new operation
    pub misses: u64,
    pub pending: usize,
}

#[derive(Clone)]
pub struct DeduplicationManager {
    inner: Arc<DedupInner>,
}

struct DedupInner {
    enabled: bool,
    pending: Mutex<HashMap<String, SharedOutcome>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl std::fmt::Debug for DeduplicationManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeduplicationManager")
            .field("enabled", &self.inner.enabled)
            .field("pending", &self.pending_count())
            .finish()
    }
}

impl Default for DeduplicationManager {
    fn default() -> Self {
        Self::new(true)
    }
}

impl DeduplicationManager {
    /// A disabled manager runs every call's own operation
    pub fn new(enabled: bool) -> Self {
        Self {
            inner: Arc::new(DedupInner {
                enabled,
                pending: Mutex::new(HashMap::new()),
                hits: AtomicU64::new(0),
                misses: AtomicU64::new(0),
            }),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.inner.enabled
    }

    /// Run `operation` unless an operation for `key` is already in flight,
    /// in which case wait for that one instead
    ///
    /// Every caller of a key must ask for the same `T`. Dropping the
    /// returned future does not stop the shared operation.
    pub async fn execute<T, F, Fut>(&self, key: &str, operation: F) -> Result<T>
    where
        T: Clone + Send + Sync + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        if !self.inner.enabled {
            self.inner.misses.fetch_add(1, Ordering::Relaxed);
            return operation().await;
        }

        let (outcome, joined) = {
            let mut pending = self.inner.pending.lock();
            match pending.get(key) {
                Some(existing) => (existing.clone(), true),
                None => {
                    let outcome = self.spawn(key, operation());
                    pending.insert(key.to_string(), outcome.clone());
                    (outcome, false)
                }
            }
        };

        if joined {
            self.inner.hits.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(key, "dedup_hit");
        } else {
            self.inner.misses.fetch_add(1, Ordering::Relaxed);
            tracing::trace!(key, "dedup_miss");
        }

        let value = outcome.await?;
        value
            .downcast::<T>()
            .map(|value| T::clone(&value))
            .map_err(|_| {
                Error::internal(format!(
                    "deduplicated request '{key}' was awaited with a different result type"
                ))
            })
    }

    fn spawn<T, Fut>(&self, key: &str, operation: Fut) -> SharedOutcome
    where
        T: Send + Sync + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        let settled = SettleGuard {
            inner: Arc::clone(&self.inner),
            key: key.to_string(),
        };
        let task = tokio::spawn(async move {
            let _settled = settled;
            operation
                .await
                .map(|value| Arc::new(value) as Arc<dyn Any + Send + Sync>)
        });

        let key = key.to_string();
        async move {
            match task.await {
                Ok(result) => result,
                Err(e) => Err(Error::internal(format!(
                    "deduplicated request '{key}' did not complete: {e}"
                ))),
            }
        }
        .boxed()
        .shared()
    }

    /// Keys with an operation in flight
    pub fn pending_count(&self) -> usize {
        self.inner.pending.lock().len()
    }

    pub fn hits(&self) -> u64 {
        self.inner.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.inner.misses.load(Ordering::Relaxed)
    }

    pub fn stats(&self) -> DedupStats {
        DedupStats {
            hits: self.hits(),
            misses: self.misses(),
            pending: self.pending_count(),
        }
    }
}

/// Removes a key's pending entry when its task finishes, panics or is
/// dropped unpolled
struct SettleGuard {
    inner: Arc<DedupInner>,
    key: String,
}

impl Drop for SettleGuard {
    fn drop(&mut self) {
        // Blocks until the spawning caller has registered the entry
        self.inner.pending.lock().remove(&self.key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::future::join_all;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_callers_share_one_invocation() {
        let dedup = DeduplicationManager::default();
        let calls = Arc::new(AtomicUsize::new(0));

        let callers = (0..8).map(|_| {
            let calls = Arc::clone(&calls);
            let dedup = dedup.clone();
            async move {
                dedup
                    .execute("page:abc", || async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        Ok(serde_json::json!({"id": "abc"}))
                    })
                    .await
            }
        });
        let results = join_all(callers).await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        for result in results {
            assert_eq!(result.unwrap(), serde_json::json!({"id": "abc"}));
        }
        assert_eq!(dedup.misses(), 1);
        assert_eq!(dedup.hits(), 7);
        assert_eq!(dedup.pending_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_all_callers_receive_the_same_error() {
        let dedup = DeduplicationManager::default();
        let calls = Arc::new(AtomicUsize::new(0));

        let callers = (0..4).map(|_| {
            let calls = Arc::clone(&calls);
            let dedup = dedup.clone();
            async move {
                dedup
                    .execute::<u32, _, _>("page:broken", || async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                        Err(Error::api(503, "unavailable"))
                    })
                    .await
            }
        });
        let results = join_all(callers).await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        for result in results {
            assert_eq!(result.unwrap_err().status(), Some(503));
        }
        assert_eq!(dedup.pending_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_settled_keys_run_again() {
        let dedup = DeduplicationManager::default();
        let calls = Arc::new(AtomicUsize::new(0));

        for expected in 1..=3 {
            let calls = Arc::clone(&calls);
            let value = dedup
                .execute("user:me", || async move {
                    Ok(calls.fetch_add(1, Ordering::SeqCst) + 1)
                })
                .await
                .unwrap();
            assert_eq!(value, expected);
        }
        assert_eq!(dedup.hits(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_distinct_keys_do_not_collapse() {
        let dedup = DeduplicationManager::default();
        let calls = Arc::new(AtomicUsize::new(0));

        let callers = ["page:a", "page:b", "page:c"].into_iter().map(|key| {
            let calls = Arc::clone(&calls);
            let dedup = dedup.clone();
            async move {
                dedup
                    .execute(key, || async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                        Ok(key.to_string())
                    })
                    .await
            }
        });
        let results: Vec<_> = join_all(callers).await.into_iter().map(Result::unwrap).collect();

        assert_eq!(results, vec!["page:a", "page:b", "page:c"]);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_disabled_runs_every_call() {
        let dedup = DeduplicationManager::new(false);
        let calls = Arc::new(AtomicUsize::new(0));

        let callers = (0..3).map(|_| {
            let calls = Arc::clone(&calls);
            let dedup = dedup.clone();
            async move {
                dedup
                    .execute("page:abc", || async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                        Ok(())
                    })
                    .await
            }
        });
        join_all(callers).await;

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(dedup.pending_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_abandoned_caller_does_not_cancel_shared_work() {
        let dedup = DeduplicationManager::default();
        let finished = Arc::new(AtomicUsize::new(0));

        let slow = {
            let finished = Arc::clone(&finished);
            dedup.execute("page:slow", || async move {
                tokio::time::sleep(Duration::from_millis(100)).await;
                finished.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
        };
        let abandoned = tokio::time::timeout(Duration::from_millis(10), slow).await;
        assert!(abandoned.is_err());

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(finished.load(Ordering::SeqCst), 1);
        assert_eq!(dedup.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_panicked_operation_releases_its_key() {
        let dedup = DeduplicationManager::default();

        let first = dedup
            .execute::<u32, _, _>("page:p", || async { panic!("boom") })
            .await;
        assert!(matches!(first, Err(Error::Internal { .. })));
        assert_eq!(dedup.pending_count(), 0);

        let second = dedup.execute("page:p", || async { Ok(7u32) }).await;
        assert_eq!(second.unwrap(), 7);
        assert_eq!(dedup.misses(), 2);
        assert_eq!(dedup.hits(), 0);
    }

    #[tokio::test]
    async fn test_mismatched_type_is_an_error() {
        let dedup = DeduplicationManager::default();
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();

        let first = dedup.execute("page:x", || async move {
            let _ = rx.await;
            Ok(1u32)
        });
        let second = dedup.execute("page:x", || async { Ok("text".to_string()) });

        let (first, second, _) = tokio::join!(first, second, async move {
            tokio::task::yield_now().await;
            let _ = tx.send(());
        });

        assert_eq!(first.unwrap(), 1);
        assert!(matches!(second, Err(Error::Internal { .. })));
    }
}
