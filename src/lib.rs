//! Memo Cache - An in-process memoization layer
//!
//! Wraps synchronous, fallible, and asynchronous operations so repeated
//! calls with equal arguments are answered from a TTL-bounded store, and
//! wraps writers so they can drop the entries they make stale.

pub mod cache;
pub mod clock;
pub mod config;
pub mod error;
pub mod invalidate;
pub mod key;
pub mod memoize;
pub mod tasks;

pub use cache::{CacheEntry, CacheStats, MemoStore};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{MemoConfig, DEFAULT_TTL_MS};
pub use error::{MemoError, Result};
pub use invalidate::Invalidating;
pub use key::{derive_key, KeySource};
pub use memoize::{Deferred, Memoized};
pub use tasks::spawn_sweep_task;
