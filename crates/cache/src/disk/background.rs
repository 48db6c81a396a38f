//! Periodic expiry and size pass for the disk tier

use std::sync::{Arc, Weak};
use std::time::Duration;

use super::{DiskCacheManager, DiskInner};

/// Start the periodic sync task
///
/// The task holds only a weak reference, so dropping the last manager
/// handle ends it on the next tick.
pub(super) fn start_sync_task(manager: &DiskCacheManager) {
    let interval = manager.inner.config.sync_interval;

    // Zero disables the task (useful for tests)
    if interval == Duration::ZERO {
        return;
    }

    let mut slot = manager.inner.sync_handle.lock();
    if slot.is_some() {
        return;
    }

    let weak: Weak<DiskInner> = Arc::downgrade(&manager.inner);
    let handle = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        // The first tick completes immediately; initialize already enforced
        ticker.tick().await;

        loop {
            ticker.tick().await;
            let Some(inner) = weak.upgrade() else {
                break;
            };
            let manager = DiskCacheManager { inner };
            if let Err(e) = manager.enforce_size_limit().await {
                tracing::debug!(error = %e, "disk_cache_sync_failed");
            }
        }
    });

    *slot = Some(handle);
}

/// Stop the periodic sync task if it is running
pub(super) fn stop_sync_task(inner: &DiskInner) {
    if let Some(handle) = inner.sync_handle.lock().take() {
        handle.abort();
    }
}
