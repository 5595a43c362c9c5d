//! Stale Entry Sweep Task
//!
//! Background task that periodically removes expired memoized results.
//!
//! Stale entries are already dropped when their key is looked up. The
//! sweep covers keys that are never asked for again.

use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::cache::MemoStore;

/// Spawns a background task that periodically removes stale entries.
///
/// The task loops forever, sleeping for `interval` between runs. Each run
/// holds the store lock only while scanning.
///
/// # Arguments
/// * `store` - Handle to the store to sweep
/// * `interval` - Time between sweeps
///
/// # Returns
/// A JoinHandle for the spawned task, used to abort it on shutdown.
///
/// # Example
/// ```ignore
/// let store = MemoStore::new();
/// let sweep_handle = spawn_sweep_task(store.clone(), Duration::from_secs(60));
/// // Later, during shutdown:
/// sweep_handle.abort();
/// ```
pub fn spawn_sweep_task(store: MemoStore, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!(
            "Starting stale entry sweep with interval of {}ms",
            interval.as_millis()
        );

        loop {
            tokio::time::sleep(interval).await;

            let removed = store.remove_expired();

            if removed > 0 {
                info!("Sweep: removed {} stale entries", removed);
            } else {
                debug!("Sweep: no stale entries found");
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheEntry;
    use crate::clock::ManualClock;
    use std::sync::Arc;

    fn manual_store() -> (MemoStore, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(0));
        let store = MemoStore::with_clock(clock.clone(), Duration::from_millis(1_000));
        (store, clock)
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_removes_stale_entries() {
        let (store, clock) = manual_store();
        store.put(
            "expire_soon".to_string(),
            CacheEntry::new(1_i32, false, 0, Duration::from_millis(100)),
        );
        clock.set(500);

        let handle = spawn_sweep_task(store.clone(), Duration::from_millis(50));
        tokio::time::sleep(Duration::from_millis(120)).await;

        assert!(!store.contains_key("expire_soon"), "Stale entry should be swept");
        assert_eq!(store.stats().expired, 1);

        handle.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_preserves_fresh_entries() {
        let (store, _) = manual_store();
        store.put(
            "long_lived".to_string(),
            CacheEntry::new(1_i32, false, 0, Duration::from_secs(3_600)),
        );

        let handle = spawn_sweep_task(store.clone(), Duration::from_millis(50));
        tokio::time::sleep(Duration::from_millis(200)).await;

        assert!(store.contains_key("long_lived"), "Fresh entry should not be removed");

        handle.abort();
    }

    #[tokio::test]
    async fn test_sweep_task_can_be_aborted() {
        let (store, _) = manual_store();

        let handle = spawn_sweep_task(store, Duration::from_secs(1));
        handle.abort();

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(handle.is_finished(), "Task should be finished after abort");
    }
}
