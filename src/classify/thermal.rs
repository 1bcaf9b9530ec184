use super::{Classifier, ClassifyError, Reading};
use crate::registry::Source;
use async_trait::async_trait;
use chrono::Utc;
use rand::Rng;

/// Simulated thermal imaging backend. Samples the same 20-100C band the
/// legacy site monitor used, with high confidence since IR temperature is
/// a direct measurement.
pub struct ThermalClassifier {
    /// Probability per call that the backend reports a transient failure.
    pub fault_rate: f64,
}

impl ThermalClassifier {
    pub fn new() -> Self {
        Self { fault_rate: 0.0 }
    }

    pub fn with_fault_rate(fault_rate: f64) -> Self {
        Self { fault_rate }
    }
}

impl Default for ThermalClassifier {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Classifier for ThermalClassifier {
    async fn score(&self, source: &Source) -> Result<Reading, ClassifyError> {
        let mut rng = rand::thread_rng();
        if rng.gen_bool(self.fault_rate.clamp(0.0, 1.0)) {
            return Err(ClassifyError::Backend {
                source_id: source.id.clone(),
                reason: "thermal frame grab failed".to_string(),
            });
        }

        Ok(Reading {
            source_id: source.id.clone(),
            timestamp: Utc::now(),
            temperature: rng.gen_range(20.0..100.0),
            smoke_density: rng.gen_range(0.0..1.0),
            confidence: rng.gen_range(0.85..1.0),
        })
    }
}
