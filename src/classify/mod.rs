//! Classifier adapter -- wraps detection backends behind one capability trait.
//!
//! The real inference model (or camera analytics pipeline) sits on the other
//! side of [`Classifier`]. The built-in implementations simulate plausible
//! readings per sensor kind so the daemon runs end-to-end without hardware.

pub mod chemical;
pub mod thermal;
pub mod visual;

use crate::registry::Source;
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClassifyError {
    #[error("classifier backend for '{source_id}' did not respond within {timeout_ms}ms")]
    Unavailable { source_id: String, timeout_ms: u64 },

    #[error("classifier backend error for '{source_id}': {reason}")]
    Backend { source_id: String, reason: String },
}

/// One normalized measurement sample from a source.
#[derive(Debug, Clone, Serialize)]
pub struct Reading {
    pub source_id: String,
    pub timestamp: DateTime<Utc>,
    /// Temperature-equivalent score in degrees Celsius.
    pub temperature: f64,
    /// Smoke-density-equivalent score, 0.0..=1.0.
    pub smoke_density: f64,
    /// Classifier confidence, 0.0..=1.0.
    pub confidence: f64,
}

/// Trait for anything that can score a source.
#[async_trait]
pub trait Classifier: Send + Sync {
    /// Produce a reading for the given source.
    async fn score(&self, source: &Source) -> Result<Reading, ClassifyError>;
}

/// Score a source with a hard upper bound on wall time. A backend that
/// does not answer within `timeout` yields `Unavailable` instead of
/// stalling the tick.
pub async fn score_bounded(
    classifier: &dyn Classifier,
    source: &Source,
    timeout: Duration,
) -> Result<Reading, ClassifyError> {
    match tokio::time::timeout(timeout, classifier.score(source)).await {
        Ok(result) => result,
        Err(_) => Err(ClassifyError::Unavailable {
            source_id: source.id.clone(),
            timeout_ms: timeout.as_millis() as u64,
        }),
    }
}
