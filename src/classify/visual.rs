use super::{Classifier, ClassifyError, Reading};
use crate::registry::Source;
use async_trait::async_trait;
use chrono::Utc;
use rand::Rng;

/// Simulated CCTV flame/smoke analytics backend. Temperature here is an
/// inferred equivalent (visual flame extent mapped onto the thermal
/// scale), so confidence runs lower than the thermal imager.
pub struct VisualClassifier {
    pub fault_rate: f64,
}

impl VisualClassifier {
    pub fn new() -> Self {
        Self { fault_rate: 0.0 }
    }

    pub fn with_fault_rate(fault_rate: f64) -> Self {
        Self { fault_rate }
    }
}

impl Default for VisualClassifier {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Classifier for VisualClassifier {
    async fn score(&self, source: &Source) -> Result<Reading, ClassifyError> {
        let mut rng = rand::thread_rng();
        if rng.gen_bool(self.fault_rate.clamp(0.0, 1.0)) {
            return Err(ClassifyError::Backend {
                source_id: source.id.clone(),
                reason: "video stream decode error".to_string(),
            });
        }

        Ok(Reading {
            source_id: source.id.clone(),
            timestamp: Utc::now(),
            temperature: rng.gen_range(20.0..100.0),
            smoke_density: rng.gen_range(0.0..1.0),
            confidence: rng.gen_range(0.5..0.9),
        })
    }
}
