//! Detection engine -- per-tick scoring and the two-threshold hysteresis rule.

pub mod engine;

pub use engine::DetectionEngine;

use crate::classify::Reading;
use serde::Serialize;

/// What one reading says about a source this tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SignalKind {
    /// Both high thresholds crossed: possible fire.
    Confirming,
    /// Below the low thresholds: conditions normal.
    Clearing,
    /// Inside the hysteresis band; no evidence either way.
    Neutral,
    /// Classification failed or timed out; treated as neutral.
    SourceFault,
}

impl std::fmt::Display for SignalKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SignalKind::Confirming => write!(f, "confirming"),
            SignalKind::Clearing => write!(f, "clearing"),
            SignalKind::Neutral => write!(f, "neutral"),
            SignalKind::SourceFault => write!(f, "source-fault"),
        }
    }
}

/// One per-source event emitted by the engine each tick.
#[derive(Debug, Clone)]
pub struct SignalEvent {
    pub source_id: String,
    pub kind: SignalKind,
    pub reading: Option<Reading>,
}

/// The two-threshold rule. Separate high/low thresholds give hysteresis:
/// a reading in the band between them produces no signal, so a noisy
/// source cannot oscillate the state machine.
#[derive(Debug, Clone, Copy)]
pub struct Thresholds {
    pub temp_high: f64,
    pub temp_low: f64,
    pub smoke_high: f64,
    pub smoke_low: f64,
}

impl Thresholds {
    /// Classify one reading. Confirming wins when both high thresholds
    /// are crossed; clearing requires dropping below either low
    /// threshold; everything else is the hysteresis band.
    pub fn classify(&self, reading: &Reading) -> SignalKind {
        if reading.temperature > self.temp_high && reading.smoke_density > self.smoke_high {
            SignalKind::Confirming
        } else if reading.temperature < self.temp_low || reading.smoke_density < self.smoke_low {
            SignalKind::Clearing
        } else {
            SignalKind::Neutral
        }
    }
}
