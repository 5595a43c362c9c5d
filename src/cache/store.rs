//! Cache Store Module
//!
//! Keyed map of memoized results shared by every wrapper built from it.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};
use std::time::Duration;

use tracing::{debug, info};

use crate::cache::{CacheEntry, CacheStats};
use crate::clock::{Clock, SystemClock};
use crate::config::MemoConfig;

static GLOBAL_STORE: OnceLock<MemoStore> = OnceLock::new();

#[derive(Debug, Default)]
struct StoreInner {
    /// Key-value storage
    entries: HashMap<String, CacheEntry>,
    /// Memoization statistics
    stats: CacheStats,
}

// == Memo Store ==
/// Process-wide store of memoized results.
///
/// Cloning is cheap and every clone sees the same entries. All operations
/// take one short mutex hold and never suspend.
#[derive(Debug, Clone)]
pub struct MemoStore {
    inner: Arc<Mutex<StoreInner>>,
    clock: Arc<dyn Clock>,
    default_ttl: Duration,
}

impl MemoStore {
    // == Constructors ==
    /// Creates an empty store on the system clock with the default TTL.
    pub fn new() -> Self {
        Self::from_config(&MemoConfig::default())
    }

    /// Creates an empty store using the configured default TTL.
    pub fn from_config(config: &MemoConfig) -> Self {
        Self::with_clock(Arc::new(SystemClock), config.default_ttl)
    }

    /// Creates an empty store reading time from `clock`.
    pub fn with_clock(clock: Arc<dyn Clock>, default_ttl: Duration) -> Self {
        Self {
            inner: Arc::new(Mutex::new(StoreInner::default())),
            clock,
            default_ttl,
        }
    }

    /// Returns the process-wide store, created from the environment on first use.
    pub fn global() -> &'static MemoStore {
        GLOBAL_STORE.get_or_init(|| {
            let config = MemoConfig::from_env();
            info!(
                "Global memo store initialized: default_ttl={}ms",
                config.default_ttl.as_millis()
            );
            MemoStore::from_config(&config)
        })
    }

    fn lock(&self) -> MutexGuard<'_, StoreInner> {
        // No operation leaves the map half-written, so a poisoned lock is still usable
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // == Get ==
    /// Returns the entry for `key` if present, fresh or not.
    pub fn get(&self, key: &str) -> Option<CacheEntry> {
        self.lock().entries.get(key).cloned()
    }

    // == Put ==
    /// Inserts or overwrites the entry for `key`.
    pub fn put(&self, key: String, entry: CacheEntry) {
        let mut inner = self.lock();
        inner.entries.insert(key, entry);
        let len = inner.entries.len();
        inner.stats.set_total_entries(len);
    }

    // == Delete ==
    /// Removes the entry for `key`. Returns whether one was present.
    pub fn delete(&self, key: &str) -> bool {
        let mut inner = self.lock();
        let removed = inner.entries.remove(key).is_some();
        let len = inner.entries.len();
        inner.stats.set_total_entries(len);
        removed
    }

    // == Get Fresh ==
    /// Returns the entry for `key` if it is still fresh.
    ///
    /// A stale entry is removed in the same critical section and reported
    /// as absent.
    pub fn get_fresh(&self, key: &str) -> Option<CacheEntry> {
        let now = self.clock.now_ms();
        let mut inner = self.lock();

        match inner.entries.get(key).map(|entry| entry.is_expired_at(now)) {
            Some(false) => inner.entries.get(key).cloned(),
            Some(true) => {
                inner.entries.remove(key);
                inner.stats.record_expired();
                let len = inner.entries.len();
                inner.stats.set_total_entries(len);
                debug!("Removed stale entry: {}", key);
                None
            }
            None => None,
        }
    }

    // == Invalidate ==
    /// Removes the entry for `key` and counts it as an invalidation.
    pub fn invalidate(&self, key: &str) -> bool {
        let mut inner = self.lock();
        let removed = inner.entries.remove(key).is_some();
        if removed {
            inner.stats.record_invalidation();
            let len = inner.entries.len();
            inner.stats.set_total_entries(len);
        }
        removed
    }

    // == Remove Expired ==
    /// Removes every stale entry. Returns the number removed.
    pub fn remove_expired(&self) -> usize {
        let now = self.clock.now_ms();
        let mut inner = self.lock();

        let expired_keys: Vec<String> = inner
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_expired_at(now))
            .map(|(key, _)| key.clone())
            .collect();

        for key in &expired_keys {
            inner.entries.remove(key);
            inner.stats.record_expired();
        }

        let len = inner.entries.len();
        inner.stats.set_total_entries(len);
        expired_keys.len()
    }

    pub(crate) fn record_hit(&self) {
        self.lock().stats.record_hit();
    }

    pub(crate) fn record_miss(&self) {
        self.lock().stats.record_miss();
    }

    // == Accessors ==
    /// Returns current memoization statistics.
    pub fn stats(&self) -> CacheStats {
        let inner = self.lock();
        let mut stats = inner.stats.clone();
        stats.set_total_entries(inner.entries.len());
        stats
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.lock().entries.contains_key(key)
    }

    /// Returns the number of stored entries, stale ones included.
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().entries.is_empty()
    }

    /// Current time according to the store's clock.
    pub fn now_ms(&self) -> u64 {
        self.clock.now_ms()
    }

    /// TTL given to wrappers that do not set their own.
    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }
}

impl Default for MemoStore {
    fn default() -> Self {
        Self::new()
    }
}
