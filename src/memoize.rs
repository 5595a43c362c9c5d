//! Memoized Invocation Module
//!
//! Wraps an operation so that repeated calls with the same key are answered
//! from a [`MemoStore`] until the stored result expires.
//!
//! # Example
//! ```
//! use std::time::Duration;
//! use memo_cache::MemoStore;
//!
//! let store = MemoStore::new();
//! let double = store
//!     .memoize("double", |(x,): (i64,)| x * 2)
//!     .with_ttl(Duration::from_secs(60));
//!
//! assert_eq!(double.call((3,)), 6);
//! assert_eq!(double.call((3,)), 6); // answered from the store
//! ```

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::cache::{CacheEntry, MemoStore};
use crate::error::Result;
use crate::key::KeySource;

// == Memoized ==
/// An operation whose results are cached in a [`MemoStore`].
///
/// Built with [`MemoStore::memoize`]. Pick the call method matching the
/// operation's shape: [`call`](Self::call) for plain values,
/// [`try_call`](Self::try_call) for `Result`s, and
/// [`call_async`](Self::call_async) for futures.
#[derive(Clone)]
pub struct Memoized<F> {
    store: MemoStore,
    key: KeySource,
    ttl: Duration,
    op: F,
}

impl MemoStore {
    /// Wraps `op` so its results are memoized in this store.
    ///
    /// `name` identifies the operation in derived keys. A wrapper built with
    /// [`MemoStore::invalidating`] and the same name targets the same entries.
    pub fn memoize<F>(&self, name: impl Into<String>, op: F) -> Memoized<F> {
        Memoized {
            store: self.clone(),
            key: KeySource::Derived(name.into()),
            ttl: self.default_ttl(),
            op,
        }
    }
}

impl<F> Memoized<F> {
    /// Pins every call to `key`, whatever the arguments.
    ///
    /// An empty key counts as no key and leaves derived keys in place.
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key.pin(key.into());
        self
    }

    /// Sets how long a stored result stays fresh.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Returns the key a call with `args` would use.
    pub fn key_for<A>(&self, args: &A) -> Result<String>
    where
        A: Serialize,
    {
        self.key.resolve(args)
    }

    // == Call ==
    /// Calls an infallible synchronous operation through the cache.
    pub fn call<A, V>(&self, args: A) -> V
    where
        F: Fn(A) -> V,
        A: Serialize,
        V: Clone + Send + Sync + 'static,
    {
        let Some(key) = self.resolve_key(&args) else {
            return (self.op)(args);
        };

        if let Some(value) = self.lookup::<V>(&key) {
            return value;
        }

        let value = (self.op)(args);
        store_result(&self.store, key, value.clone(), false, self.ttl);
        value
    }

    // == Try Call ==
    /// Calls a fallible synchronous operation through the cache.
    ///
    /// Only `Ok` values are stored. An `Err` goes back to the caller and the
    /// next call runs the operation again.
    pub fn try_call<A, V, E>(&self, args: A) -> std::result::Result<V, E>
    where
        F: Fn(A) -> std::result::Result<V, E>,
        A: Serialize,
        V: Clone + Send + Sync + 'static,
    {
        let Some(key) = self.resolve_key(&args) else {
            return (self.op)(args);
        };

        if let Some(value) = self.lookup::<V>(&key) {
            return Ok(value);
        }

        let value = (self.op)(args)?;
        store_result(&self.store, key, value.clone(), false, self.ttl);
        Ok(value)
    }

    // == Call Async ==
    /// Calls an asynchronous operation through the cache.
    ///
    /// The lookup happens now, not when the returned [`Deferred`] is first
    /// polled. A hit yields an already-completed `Deferred`. A miss spawns
    /// the operation's future immediately; when it settles with `Ok` the
    /// value is stored with its TTL counted from that moment. Dropping the
    /// `Deferred` does not stop the operation or the store write.
    ///
    /// # Panics
    /// On a miss, panics if called outside a Tokio runtime. Awaiting the
    /// returned `Deferred` re-raises a panic from the operation, and panics
    /// if the runtime shuts down and cancels the spawned operation first.
    pub fn call_async<A, Fut, V, E>(&self, args: A) -> Deferred<V, E>
    where
        F: Fn(A) -> Fut,
        A: Serialize,
        Fut: Future<Output = std::result::Result<V, E>> + Send + 'static,
        V: Clone + Send + Sync + 'static,
        E: Send + 'static,
    {
        let Some(key) = self.resolve_key(&args) else {
            return Deferred::spawn((self.op)(args));
        };

        if let Some(value) = self.lookup::<V>(&key) {
            return Deferred::ready(value);
        }

        let pending = (self.op)(args);
        let store = self.store.clone();
        let ttl = self.ttl;

        Deferred::spawn(async move {
            let result = pending.await;
            match &result {
                Ok(value) => store_result(&store, key, value.clone(), true, ttl),
                Err(_) => debug!("Async call for {} failed, nothing cached", key),
            }
            result
        })
    }

    fn resolve_key<A>(&self, args: &A) -> Option<String>
    where
        A: Serialize,
    {
        match self.key.resolve(args) {
            Ok(key) => Some(key),
            Err(e) => {
                warn!(
                    "Cannot derive cache key for {}, calling uncached: {}",
                    self.key.label(),
                    e
                );
                None
            }
        }
    }

    fn lookup<V>(&self, key: &str) -> Option<V>
    where
        V: Clone + 'static,
    {
        let found = self.store.get_fresh(key).and_then(|entry| {
            let value = entry.value_as::<V>();
            match value {
                Some(_) => debug!("Cache hit: {} (stored async: {})", key, entry.is_deferred),
                None => warn!("Entry {} holds a different type, recomputing", key),
            }
            value
        });

        if found.is_some() {
            self.store.record_hit();
        } else {
            self.store.record_miss();
            debug!("Cache miss: {}", key);
        }
        found
    }
}

/// Writes a result stamped with the store's current time.
fn store_result<V>(store: &MemoStore, key: String, value: V, is_deferred: bool, ttl: Duration)
where
    V: Send + Sync + 'static,
{
    let entry = CacheEntry::new(value, is_deferred, store.now_ms(), ttl);
    debug!("Cached {} until {}", key, entry.expires_at);
    store.put(key, entry);
}

// == Deferred ==
/// The eventual result of [`Memoized::call_async`].
///
/// Either a value replayed from the store or a handle to the spawned
/// operation.
pub struct Deferred<V, E> {
    state: DeferredState<V, E>,
}

enum DeferredState<V, E> {
    Cached(Option<V>),
    Spawned(JoinHandle<std::result::Result<V, E>>),
}

impl<V, E> Deferred<V, E>
where
    V: Send + 'static,
    E: Send + 'static,
{
    fn ready(value: V) -> Self {
        Self {
            state: DeferredState::Cached(Some(value)),
        }
    }

    fn spawn<Fut>(pending: Fut) -> Self
    where
        Fut: Future<Output = std::result::Result<V, E>> + Send + 'static,
    {
        Self {
            state: DeferredState::Spawned(tokio::spawn(pending)),
        }
    }
}

impl<V, E> Deferred<V, E> {
    /// Whether this result was replayed from the store.
    pub fn is_cached(&self) -> bool {
        matches!(self.state, DeferredState::Cached(_))
    }
}

// The cached value is moved out by value, never pinned in place.
impl<V, E> Unpin for Deferred<V, E> {}

impl<V, E> Future for Deferred<V, E> {
    type Output = std::result::Result<V, E>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match &mut self.get_mut().state {
            DeferredState::Cached(value) => match value.take() {
                Some(value) => Poll::Ready(Ok(value)),
                None => panic!("Deferred polled after completion"),
            },
            DeferredState::Spawned(handle) => match Pin::new(handle).poll(cx) {
                Poll::Pending => Poll::Pending,
                Poll::Ready(Ok(result)) => Poll::Ready(result),
                Poll::Ready(Err(join_error)) if join_error.is_panic() => {
                    std::panic::resume_unwind(join_error.into_panic())
                }
                Poll::Ready(Err(join_error)) => {
                    panic!("Memoized operation did not complete: {}", join_error)
                }
            },
        }
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn manual_store() -> (MemoStore, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(0));
        let store = MemoStore::with_clock(clock.clone(), Duration::from_millis(1_000));
        (store, clock)
    }

    #[test]
    fn test_memoize_uses_store_default_ttl() {
        let (store, _) = manual_store();
        let wrapped = store.memoize("noop", |(): ()| 0);
        assert_eq!(wrapped.ttl(), Duration::from_millis(1_000));

        let wrapped = wrapped.with_ttl(Duration::from_secs(5));
        assert_eq!(wrapped.ttl(), Duration::from_secs(5));
    }

    #[test]
    fn test_key_for_matches_derivation() {
        let (store, _) = manual_store();
        let wrapped = store.memoize("double", |(x,): (i32,)| x * 2);
        assert_eq!(wrapped.key_for(&(3,)).unwrap(), "double:[3]");

        let pinned = wrapped.with_key("fixed");
        assert_eq!(pinned.key_for(&(3,)).unwrap(), "fixed");
    }

    #[test]
    fn test_empty_explicit_key_keeps_derived_keys() {
        let (store, _) = manual_store();
        let wrapped = store.memoize("double", |(x,): (i32,)| x * 2).with_key("");

        assert_eq!(wrapped.key_for(&(3,)).unwrap(), "double:[3]");
        assert_eq!(wrapped.call((3,)), 6);
        assert_eq!(wrapped.call((4,)), 8);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_call_stores_synchronous_entry() {
        let (store, clock) = manual_store();
        clock.set(200);
        let wrapped = store.memoize("double", |(x,): (i32,)| x * 2);

        assert_eq!(wrapped.call((3,)), 6);

        let entry = store.get("double:[3]").unwrap();
        assert!(!entry.is_deferred);
        assert_eq!(entry.expires_at, 1_200);
        assert_eq!(entry.value_as::<i32>(), Some(6));
    }

    #[test]
    fn test_type_mismatch_is_a_miss_and_overwrites() {
        let (store, _) = manual_store();
        let as_text = store
            .memoize("text", |(): ()| "six".to_string())
            .with_key("shared");
        let as_number = store.memoize("number", |(): ()| 6_i32).with_key("shared");

        assert_eq!(as_text.call(()), "six");
        assert_eq!(as_number.call(()), 6);
        assert_eq!(store.get("shared").unwrap().value_as::<i32>(), Some(6));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_cached_deferred_is_ready_without_runtime() {
        let (store, _) = manual_store();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let wrapped = store.memoize("fetch", move |(id,): (u32,)| {
            counter.fetch_add(1, Ordering::SeqCst);
            async move { Ok::<u32, String>(id + 1) }
        });

        store.put(
            "fetch:[1]".to_string(),
            CacheEntry::new(2_u32, true, 0, Duration::from_millis(1_000)),
        );

        let deferred = wrapped.call_async((1,));
        assert!(deferred.is_cached());

        let mut task = tokio_test::task::spawn(deferred);
        tokio_test::assert_ready_eq!(task.poll(), Ok(2));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_stats_count_hits_and_misses() {
        let (store, _) = manual_store();
        let wrapped = store.memoize("double", |(x,): (i32,)| x * 2);

        wrapped.call((1,));
        wrapped.call((1,));
        wrapped.call((2,));

        let stats = store.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 2);
        assert_eq!(stats.total_entries, 2);
    }
}
