//! Configuration Module
//!
//! Loads memoization defaults from environment variables.

use std::env;
use std::time::Duration;

/// Default TTL for memoized results: 30 days in milliseconds.
pub const DEFAULT_TTL_MS: u64 = 30 * 24 * 60 * 60 * 1000;

/// Store configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct MemoConfig {
    /// TTL applied by wrappers that do not set their own
    pub default_ttl: Duration,
    /// Interval of the background stale-entry sweep, None = no sweep
    pub sweep_interval: Option<Duration>,
}

impl MemoConfig {
    /// Creates a new MemoConfig by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `MEMO_DEFAULT_TTL_MS` - Default TTL in milliseconds (default: 30 days)
    /// - `MEMO_SWEEP_INTERVAL_SECS` - Sweep interval in seconds, 0 or unset disables it
    pub fn from_env() -> Self {
        let default_ttl_ms = env::var("MEMO_DEFAULT_TTL_MS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_TTL_MS);

        let sweep_interval = env::var("MEMO_SWEEP_INTERVAL_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs);

        Self {
            default_ttl: Duration::from_millis(default_ttl_ms),
            sweep_interval,
        }
    }
}

impl Default for MemoConfig {
    fn default() -> Self {
        Self {
            default_ttl: Duration::from_millis(DEFAULT_TTL_MS),
            sweep_interval: None,
        }
    }
}
