use crate::classify::{self, Classifier};
use crate::detect::{SignalEvent, SignalKind, Thresholds};
use crate::registry::{Source, SourceKind};
use futures::stream::{self, StreamExt};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Scores every active source once per tick and turns readings into
/// signal events. Holds no state across ticks.
pub struct DetectionEngine {
    classifiers: HashMap<SourceKind, Arc<dyn Classifier>>,
    thresholds: Thresholds,
    classify_timeout: Duration,
    max_concurrent: usize,
}

impl DetectionEngine {
    pub fn new(thresholds: Thresholds, classify_timeout: Duration, max_concurrent: usize) -> Self {
        Self {
            classifiers: HashMap::new(),
            thresholds,
            classify_timeout,
            max_concurrent: max_concurrent.max(1),
        }
    }

    /// Engine wired with the built-in simulated backends for every
    /// sensor kind.
    pub fn simulated(
        thresholds: Thresholds,
        classify_timeout: Duration,
        max_concurrent: usize,
    ) -> Self {
        Self::new(thresholds, classify_timeout, max_concurrent)
            .with_classifier(
                SourceKind::ThermalCamera,
                Arc::new(classify::thermal::ThermalClassifier::new()),
            )
            .with_classifier(
                SourceKind::VisualCamera,
                Arc::new(classify::visual::VisualClassifier::new()),
            )
            .with_classifier(
                SourceKind::SmokeSensor,
                Arc::new(classify::chemical::ChemicalClassifier::new()),
            )
    }

    pub fn with_classifier(mut self, kind: SourceKind, classifier: Arc<dyn Classifier>) -> Self {
        self.classifiers.insert(kind, classifier);
        self
    }

    pub fn thresholds(&self) -> &Thresholds {
        &self.thresholds
    }

    /// Run one detection tick over the given sources. Classification
    /// calls run concurrently up to the worker bound; a slow or failed
    /// backend for one source never holds up the others. Every source
    /// gets exactly one event.
    pub async fn run_tick(&self, sources: &[Source]) -> Vec<SignalEvent> {
        let mut events: Vec<SignalEvent> = stream::iter(sources.iter().cloned())
            .map(|source| async move { self.score_one(source).await })
            .buffer_unordered(self.max_concurrent)
            .collect()
            .await;

        // buffer_unordered yields in completion order; restore the
        // registry's insertion order so event application is deterministic.
        let order: HashMap<&str, usize> = sources
            .iter()
            .enumerate()
            .map(|(i, s)| (s.id.as_str(), i))
            .collect();
        events.sort_by_key(|e| order.get(e.source_id.as_str()).copied().unwrap_or(usize::MAX));
        events
    }

    async fn score_one(&self, source: Source) -> SignalEvent {
        let Some(classifier) = self.classifiers.get(&source.kind) else {
            warn!(source = %source.id, kind = %source.kind, "No classifier for source kind");
            return SignalEvent {
                source_id: source.id,
                kind: SignalKind::SourceFault,
                reading: None,
            };
        };

        match classify::score_bounded(classifier.as_ref(), &source, self.classify_timeout).await {
            Ok(reading) => {
                let kind = self.thresholds.classify(&reading);
                debug!(
                    source = %source.id,
                    temperature = reading.temperature,
                    smoke = reading.smoke_density,
                    signal = %kind,
                    "Source scored"
                );
                SignalEvent {
                    source_id: source.id,
                    kind,
                    reading: Some(reading),
                }
            }
            Err(e) => {
                warn!(source = %source.id, error = %e, "Classification failed");
                SignalEvent {
                    source_id: source.id,
                    kind: SignalKind::SourceFault,
                    reading: None,
                }
            }
        }
    }
}
