//! Firesentry -- multi-source fire detection and alert escalation.
//!
//! This crate provides the orchestration core for site fire monitoring:
//! a source registry, classifier adapters, a hysteresis detection
//! engine, a per-source alert lifecycle, and a retrying notification
//! dispatcher.

pub mod alert;
pub mod classify;
pub mod config;
pub mod detect;
pub mod monitor;
pub mod notify;
pub mod registry;

use anyhow::Result;
use tokio_util::sync::CancellationToken;

/// Start the monitor daemon and run it until the token is cancelled.
pub async fn run(config: config::Config, shutdown: CancellationToken) -> Result<()> {
    let monitor = monitor::Monitor::from_config(&config)?;
    monitor.run(shutdown).await
}
