//! Cache Module
//!
//! Provides the in-memory store behind memoized operations, with TTL expiry.

mod entry;
mod stats;
mod store;


// Re-export public types
pub use entry::{CacheEntry, CachedValue};
pub use stats::CacheStats;
pub use store::MemoStore;
