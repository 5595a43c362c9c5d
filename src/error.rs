//! Error types for the memoization layer
//!
//! Provides unified error handling using thiserror.

use thiserror::Error;

// == Memo Error Enum ==
/// Errors raised by the memoization layer itself.
///
/// Store operations never fail. The only internal failure is turning call
/// arguments into a cache key, and the wrappers absorb it by calling the
/// operation uncached.
#[derive(Error, Debug)]
pub enum MemoError {
    /// Call arguments could not be serialized into a key
    #[error("Key derivation failed: {0}")]
    KeyDerivation(#[from] serde_json::Error),
}

// == Result Type Alias ==
/// Convenience Result type for the memoization layer.
pub type Result<T> = std::result::Result<T, MemoError>;
