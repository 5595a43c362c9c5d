//! Background Tasks Module
//!
//! Contains optional background tasks for long-lived stores.
//!
//! # Tasks
//! - Sweep: Removes stale entries that are never looked up again

mod sweep;

pub use sweep::spawn_sweep_task;
