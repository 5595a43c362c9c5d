//! Invalidation Module
//!
//! Wraps an operation so that each call first drops the matching entry
//! from a [`MemoStore`].

use serde::Serialize;
use tracing::{debug, warn};

use crate::cache::MemoStore;
use crate::key::KeySource;

// == Invalidating ==
/// An operation that clears its cache slot before running.
///
/// Built with [`MemoStore::invalidating`]. Keys are derived exactly like
/// [`Memoized`](crate::Memoized) keys, so a memoized reader and an
/// invalidating writer sharing a name (or an explicit key) meet on the
/// same entry. The operation's own result is never cached.
#[derive(Clone)]
pub struct Invalidating<F> {
    store: MemoStore,
    key: KeySource,
    op: F,
}

impl MemoStore {
    /// Wraps `op` so each call removes the entry its arguments map to.
    pub fn invalidating<F>(&self, name: impl Into<String>, op: F) -> Invalidating<F> {
        Invalidating {
            store: self.clone(),
            key: KeySource::Derived(name.into()),
            op,
        }
    }
}

impl<F> Invalidating<F> {
    /// Targets `key` on every call, whatever the arguments.
    ///
    /// An empty key counts as no key and leaves derived keys in place.
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key.pin(key.into());
        self
    }

    // == Call ==
    /// Removes the entry for `args`, then runs the operation.
    ///
    /// The result is returned untouched. For an operation returning a
    /// future, the entry is already gone when this returns and the future
    /// is handed back unpolled.
    pub fn call<A, R>(&self, args: A) -> R
    where
        F: Fn(A) -> R,
        A: Serialize,
    {
        match self.key.resolve(&args) {
            Ok(key) => {
                if self.store.invalidate(&key) {
                    debug!("Invalidated: {}", key);
                }
            }
            Err(e) => warn!(
                "Cannot derive cache key for {}, nothing invalidated: {}",
                self.key.label(),
                e
            ),
        }

        (self.op)(args)
    }
}
