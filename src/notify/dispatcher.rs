use crate::alert::{DeliveryOutcome, NotificationTask, Severity};
use crate::notify::{DeliveryReport, DeliveryResult, NotifyChannel};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tracing::{info, warn};

/// Retry and timeout tunables for delivery.
#[derive(Debug, Clone, Copy)]
pub struct DispatchPolicy {
    /// Total delivery attempts before reporting exhaustion.
    pub max_retries: u32,
    /// Per-channel timeout for a single attempt.
    pub timeout: Duration,
    /// Base backoff between attempts; doubles each retry.
    pub backoff: Duration,
}

impl Default for DispatchPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            timeout: Duration::from_secs(5),
            backoff: Duration::from_millis(500),
        }
    }
}

/// Delivers notification tasks through an ordered set of channels with
/// retry, exponential backoff, and per-source coalescing. At most one
/// task is in flight per source; later qualifying tasks for the same
/// source upgrade the in-flight severity instead of duplicating.
pub struct Dispatcher {
    channels: Vec<Arc<dyn NotifyChannel>>,
    policy: DispatchPolicy,
    in_flight: Mutex<HashMap<String, Arc<Mutex<Severity>>>>,
}

impl Dispatcher {
    pub fn new(channels: Vec<Arc<dyn NotifyChannel>>, policy: DispatchPolicy) -> Arc<Self> {
        Arc::new(Self {
            channels,
            policy,
            in_flight: Mutex::new(HashMap::new()),
        })
    }

    /// Hand a task to the dispatcher. Returns immediately; the terminal
    /// outcome arrives on `report_tx`. Coalesced tasks produce no
    /// report of their own.
    pub async fn dispatch(
        self: &Arc<Self>,
        mut task: NotificationTask,
        report_tx: mpsc::UnboundedSender<DeliveryReport>,
    ) -> DeliveryResult {
        let mut in_flight = self.in_flight.lock().await;
        if let Some(slot) = in_flight.get(&task.source_id) {
            let mut severity = slot.lock().await;
            if task.severity > *severity {
                info!(
                    source = %task.source_id,
                    from = %*severity,
                    to = %task.severity,
                    "Coalesced into in-flight task with severity upgrade"
                );
                *severity = task.severity;
            } else {
                info!(source = %task.source_id, "Coalesced into in-flight task");
            }
            return DeliveryResult::Coalesced;
        }

        let slot = Arc::new(Mutex::new(task.severity));
        in_flight.insert(task.source_id.clone(), slot.clone());
        drop(in_flight);

        let dispatcher = Arc::clone(self);
        tokio::spawn(async move {
            let source_id = task.source_id.clone();
            let task_id = task.id;
            let outcome = loop {
                let outcome = dispatcher.deliver(&mut task, &slot).await;
                if matches!(&outcome, DeliveryOutcome::Delivered { .. }) {
                    // An upgrade can land while the successful attempt is
                    // already running; the slot must be re-checked under
                    // the in-flight lock so no coalescer slips between
                    // the check and the removal.
                    let mut in_flight = dispatcher.in_flight.lock().await;
                    let current = *slot.lock().await;
                    if current > task.severity {
                        info!(
                            source = %source_id,
                            delivered = %task.severity,
                            upgraded = %current,
                            "Severity upgraded during delivery; re-dispatching"
                        );
                        continue;
                    }
                    in_flight.remove(&source_id);
                    break outcome;
                }
                dispatcher.in_flight.lock().await.remove(&source_id);
                break outcome;
            };
            let _ = report_tx.send(DeliveryReport {
                source_id,
                task_id,
                outcome,
            });
        });
        DeliveryResult::Queued
    }

    /// Run the full retry loop for one task. Each attempt walks the
    /// channel list in order and is bounded by the per-channel timeout.
    /// The severity slot is re-read before every attempt so a coalesced
    /// upgrade takes effect on the next retry; the caller re-checks the
    /// slot once more after a successful delivery.
    async fn deliver(
        &self,
        task: &mut NotificationTask,
        severity: &Arc<Mutex<Severity>>,
    ) -> DeliveryOutcome {
        for attempt in 1..=self.policy.max_retries {
            task.attempts = attempt;
            task.severity = *severity.lock().await;

            for channel in &self.channels {
                match tokio::time::timeout(self.policy.timeout, channel.deliver(&task)).await {
                    Ok(Ok(())) => {
                        return DeliveryOutcome::Delivered {
                            channel: channel.name().to_string(),
                            attempts: attempt,
                        };
                    }
                    Ok(Err(e)) => {
                        warn!(
                            source = %task.source_id,
                            channel = channel.name(),
                            attempt,
                            error = %e,
                            "Delivery attempt failed"
                        );
                    }
                    Err(_) => {
                        warn!(
                            source = %task.source_id,
                            channel = channel.name(),
                            attempt,
                            timeout_ms = self.policy.timeout.as_millis() as u64,
                            "Delivery attempt timed out"
                        );
                    }
                }
            }

            if attempt < self.policy.max_retries {
                let delay = self.policy.backoff * 2u32.saturating_pow(attempt - 1);
                tokio::time::sleep(delay).await;
            }
        }
        DeliveryOutcome::Exhausted {
            attempts: self.policy.max_retries,
        }
    }

    /// Number of tasks currently in flight.
    pub async fn in_flight_count(&self) -> usize {
        self.in_flight.lock().await.len()
    }
}
