//! The periodic monitor loop: drives detection ticks, applies events to
//! the alert state machine, and hands qualifying transitions to the
//! dispatcher. Owns every component; no process-wide singletons.

use crate::alert::AlertStateMachine;
use crate::config::Config;
use crate::detect::{DetectionEngine, SignalKind};
use crate::notify::{self, DeliveryReport, Dispatcher, NotifyChannel};
use crate::registry::SourceRegistry;
use anyhow::{anyhow, Result};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub struct Monitor {
    registry: SourceRegistry,
    engine: DetectionEngine,
    alerts: AlertStateMachine,
    dispatcher: Arc<Dispatcher>,
    poll_interval: Duration,
    shutdown_deadline: Duration,
    fault_threshold: u32,
    fault_counts: HashMap<String, u32>,
}

impl Monitor {
    /// Build a monitor from validated configuration, with the built-in
    /// simulated classifiers and the configured channel chain.
    pub fn from_config(config: &Config) -> Result<Self> {
        let mut registry = SourceRegistry::new();
        for entry in &config.sources {
            registry.register(&entry.id, entry.kind)?;
        }

        let engine = DetectionEngine::simulated(
            config.detection_thresholds(),
            config.classify_timeout(),
            config.monitor.max_concurrent_classifications,
        );

        let channels: Vec<Arc<dyn NotifyChannel>> = config
            .dispatch
            .channels
            .iter()
            .map(|name| {
                notify::builtin_channel(name)
                    .ok_or_else(|| anyhow!("unknown notification channel '{name}'"))
            })
            .collect::<Result<_>>()?;
        let dispatcher = Dispatcher::new(channels, config.dispatch_policy());

        Ok(Self {
            registry,
            engine,
            alerts: AlertStateMachine::new(config.alert_policy()),
            dispatcher,
            poll_interval: config.poll_interval(),
            shutdown_deadline: config.shutdown_deadline(),
            fault_threshold: config.monitor.fault_threshold,
            fault_counts: HashMap::new(),
        })
    }

    /// Run until the token is cancelled, then drain outstanding
    /// notification tasks bounded by the shutdown deadline.
    pub async fn run(mut self, shutdown: CancellationToken) -> Result<()> {
        info!(
            sources = self.registry.len(),
            interval_secs = self.poll_interval.as_secs(),
            "Monitor started"
        );

        let (report_tx, mut report_rx) = mpsc::unbounded_channel::<DeliveryReport>();
        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                Some(report) = report_rx.recv() => {
                    self.alerts.record_delivery(&report.source_id, report.outcome);
                }
                _ = ticker.tick() => {
                    self.tick(&report_tx).await;
                }
            }
        }

        info!("Shutdown requested; draining outstanding notifications");
        drop(report_tx);
        let alerts = &mut self.alerts;
        let drain = async {
            while let Some(report) = report_rx.recv().await {
                alerts.record_delivery(&report.source_id, report.outcome);
            }
        };
        if tokio::time::timeout(self.shutdown_deadline, drain).await.is_err() {
            warn!(
                in_flight = self.dispatcher.in_flight_count().await,
                "Shutdown deadline reached with notifications still in flight"
            );
        }
        info!("Monitor stopped");
        Ok(())
    }

    /// One detection tick: score all pollable sources, apply every
    /// resulting event sequentially, queue qualifying notifications.
    pub async fn tick(&mut self, report_tx: &mpsc::UnboundedSender<DeliveryReport>) {
        let sources = self.registry.list_active();
        if sources.is_empty() {
            debug!("No active sources; tick skipped");
            return;
        }

        let events = self.engine.run_tick(&sources).await;
        let now = Utc::now();

        for event in events {
            match event.kind {
                SignalKind::SourceFault => {
                    let count = self.fault_counts.entry(event.source_id.clone()).or_insert(0);
                    *count += 1;
                    if *count == self.fault_threshold {
                        // mark_faulted only fails for unknown ids, which
                        // cannot happen for an event we just produced.
                        let _ = self.registry.mark_faulted(&event.source_id);
                    }
                }
                _ => {
                    self.fault_counts.remove(&event.source_id);
                    let _ = self.registry.mark_seen(&event.source_id, now);
                }
            }

            if let Some(task) = self.alerts.apply(&event, now) {
                self.dispatcher.dispatch(task, report_tx.clone()).await;
            }
        }
    }

    pub fn registry(&self) -> &SourceRegistry {
        &self.registry
    }

    pub fn alerts(&self) -> &AlertStateMachine {
        &self.alerts
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }
}
