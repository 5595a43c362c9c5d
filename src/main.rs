//! Memo Cache - demo binary
//!
//! Walks through memoized reads, a cached async lookup, and an
//! invalidating write against the process-wide store, then prints the
//! store statistics as JSON.

use std::time::Duration;

use anyhow::Context;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use memo_cache::{spawn_sweep_task, MemoConfig, MemoStore};

/// Main entry point for the demo.
///
/// # Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from environment variables
/// 3. Start the optional sweep task
/// 4. Exercise memoized and invalidating wrappers
/// 5. Print statistics
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "memo_cache=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = MemoConfig::from_env();
    info!(
        "Configuration loaded: default_ttl={}ms, sweep_interval={:?}",
        config.default_ttl.as_millis(),
        config.sweep_interval
    );

    let store = MemoStore::global().clone();

    let sweep_handle = config
        .sweep_interval
        .map(|interval| spawn_sweep_task(store.clone(), interval));

    // Synchronous read
    let square = store.memoize("square", |(n,): (u64,)| {
        info!("Computing square of {}", n);
        n * n
    });
    for n in [12, 12, 7] {
        info!("square({}) = {}", n, square.call((n,)));
    }

    // Asynchronous read
    let profile = store
        .memoize("profile", |(id,): (u32,)| async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            if id == 0 {
                anyhow::bail!("no profile with id 0");
            }
            Ok(format!("user-{}", id))
        })
        .with_ttl(Duration::from_secs(60));

    let first = profile.call_async((42,)).await?;
    let second = profile.call_async((42,)).await?;
    info!("profile(42) = {}, then {} from cache", first, second);

    if let Err(e) = profile.call_async((0,)).await {
        warn!("profile(0) failed and was not cached: {}", e);
    }

    // Writer that drops the cached read for the same id
    let rename = store.invalidating("profile", |(id,): (u32,)| {
        info!("Renaming profile {}", id);
    });
    rename.call((42,));
    let refreshed = profile.call_async((42,)).await?;
    info!("profile(42) after rename = {}", refreshed);

    let stats = store.stats();
    println!(
        "{}",
        serde_json::to_string_pretty(&stats).context("serializing stats")?
    );
    info!("Hit rate: {:.2}", stats.hit_rate());

    if let Some(handle) = sweep_handle {
        handle.abort();
    }

    Ok(())
}
