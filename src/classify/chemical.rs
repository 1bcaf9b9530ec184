use super::{Classifier, ClassifyError, Reading};
use crate::registry::Source;
use async_trait::async_trait;
use chrono::Utc;
use rand::Rng;

/// Simulated point smoke sensor. Measures particulate density directly;
/// the temperature-equivalent score is derived from the sensor's onboard
/// thermistor and stays in the ambient band unless smoke is present.
pub struct ChemicalClassifier {
    pub fault_rate: f64,
}

impl ChemicalClassifier {
    pub fn new() -> Self {
        Self { fault_rate: 0.0 }
    }

    pub fn with_fault_rate(fault_rate: f64) -> Self {
        Self { fault_rate }
    }
}

impl Default for ChemicalClassifier {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Classifier for ChemicalClassifier {
    async fn score(&self, source: &Source) -> Result<Reading, ClassifyError> {
        let mut rng = rand::thread_rng();
        if rng.gen_bool(self.fault_rate.clamp(0.0, 1.0)) {
            return Err(ClassifyError::Backend {
                source_id: source.id.clone(),
                reason: "sensor bus read failed".to_string(),
            });
        }

        let smoke_density: f64 = rng.gen_range(0.0..1.0);
        // Thermistor tracks smoke: a smouldering fire warms the housing.
        let temperature = 20.0 + smoke_density * rng.gen_range(40.0..80.0);

        Ok(Reading {
            source_id: source.id.clone(),
            timestamp: Utc::now(),
            temperature,
            smoke_density,
            confidence: rng.gen_range(0.9..1.0),
        })
    }
}
