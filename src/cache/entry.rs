//! Cache Entry Module
//!
//! Defines the structure for individual memoized results with TTL support.

use std::any::Any;
use std::sync::Arc;
use std::time::Duration;

/// Type-erased cached value, shared between the store and every hit.
pub type CachedValue = Arc<dyn Any + Send + Sync>;

// == Cache Entry ==
/// A single memoized result with its expiry metadata.
///
/// Entries are never edited in place. Refreshing a key means writing a new
/// entry over the old one.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// Whether the value came from an asynchronous operation. Reported on
    /// replay; the calling method alone decides how a hit is returned.
    pub is_deferred: bool,
    /// The stored result
    pub value: CachedValue,
    /// Creation timestamp (Unix milliseconds)
    pub created_at: u64,
    /// Expiration timestamp (Unix milliseconds)
    pub expires_at: u64,
}

impl CacheEntry {
    // == Constructor ==
    /// Creates an entry stamped at `now_ms` that lives for `ttl`.
    ///
    /// # Arguments
    /// * `value` - The result to store
    /// * `is_deferred` - Whether the result was produced asynchronously
    /// * `now_ms` - Time the result became available (Unix milliseconds)
    /// * `ttl` - How long the entry stays fresh
    pub fn new<V>(value: V, is_deferred: bool, now_ms: u64, ttl: Duration) -> Self
    where
        V: Send + Sync + 'static,
    {
        let ttl_ms = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX);

        Self {
            is_deferred,
            value: Arc::new(value),
            created_at: now_ms,
            expires_at: now_ms.saturating_add(ttl_ms),
        }
    }

    // == Is Expired ==
    /// Checks if the entry is stale at `now_ms`.
    ///
    /// Boundary condition: an entry is stale once the current time is greater
    /// than or equal to its expiration time.
    pub fn is_expired_at(&self, now_ms: u64) -> bool {
        now_ms >= self.expires_at
    }

    // == Time To Live ==
    /// Returns remaining TTL in milliseconds at `now_ms`, 0 once stale.
    pub fn ttl_remaining_ms(&self, now_ms: u64) -> u64 {
        self.expires_at.saturating_sub(now_ms)
    }

    // == Typed Value ==
    /// Returns a clone of the value if it holds a `V`.
    ///
    /// None means another operation wrote a different type under this key.
    pub fn value_as<V>(&self) -> Option<V>
    where
        V: Clone + 'static,
    {
        self.value.downcast_ref::<V>().cloned()
    }
}
