use crate::alert::{AlertRecord, AlertState, DeliveryOutcome, NotificationTask, Severity};
use crate::detect::{SignalEvent, SignalKind};
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use tracing::{debug, error, info};

/// Tunables for the alert lifecycle.
#[derive(Debug, Clone, Copy)]
pub struct AlertPolicy {
    /// Consecutive confirming readings required to confirm.
    pub confirm_count: u32,
    /// Consecutive clearing readings required to resolve.
    pub clear_count: u32,
    /// Dedup window started when a source enters `confirmed`.
    pub cooldown: Duration,
    /// Time a source must stay confirmed before escalation.
    pub escalation_delay: Duration,
}

impl Default for AlertPolicy {
    fn default() -> Self {
        Self {
            confirm_count: 2,
            clear_count: 2,
            cooldown: Duration::seconds(300),
            escalation_delay: Duration::seconds(600),
        }
    }
}

/// Tracks the alert lifecycle for every source. Events must be applied
/// sequentially (single writer); transitions are total and never fail.
pub struct AlertStateMachine {
    policy: AlertPolicy,
    records: HashMap<String, AlertRecord>,
}

impl AlertStateMachine {
    pub fn new(policy: AlertPolicy) -> Self {
        Self {
            policy,
            records: HashMap::new(),
        }
    }

    /// Apply one signal event. Returns a notification task when the
    /// transition qualifies (entering `confirmed` or `escalated`
    /// outside the cooldown window).
    pub fn apply(&mut self, event: &SignalEvent, now: DateTime<Utc>) -> Option<NotificationTask> {
        let policy = self.policy;
        let record = self
            .records
            .entry(event.source_id.clone())
            .or_insert_with(|| AlertRecord::new(now));

        match event.kind {
            SignalKind::Neutral | SignalKind::SourceFault => {
                // Neutral evidence breaks both consecutive runs but
                // moves the lifecycle nowhere.
                record.consecutive_confirming = 0;
                record.consecutive_clearing = 0;
                if event.kind == SignalKind::SourceFault {
                    debug!(source = %event.source_id, "Source fault; holding alert state");
                }
                None
            }
            SignalKind::Confirming => {
                record.consecutive_confirming += 1;
                record.consecutive_clearing = 0;
                Self::on_confirming(&event.source_id, record, &policy, now)
            }
            SignalKind::Clearing => {
                record.consecutive_clearing += 1;
                record.consecutive_confirming = 0;
                Self::on_clearing(&event.source_id, record, &policy, now);
                None
            }
        }
    }

    fn on_confirming(
        source_id: &str,
        record: &mut AlertRecord,
        policy: &AlertPolicy,
        now: DateTime<Utc>,
    ) -> Option<NotificationTask> {
        match record.state {
            AlertState::Normal => {
                transition(source_id, record, AlertState::Suspected, now);
                None
            }
            AlertState::Suspected => {
                if record.consecutive_confirming < policy.confirm_count {
                    return None;
                }
                transition(source_id, record, AlertState::Confirmed, now);
                if record.cooldown_active(now) {
                    debug!(source = %source_id, "Cooldown active; confirmation not re-notified");
                    return None;
                }
                record.cooldown_until = Some(now + policy.cooldown);
                Some(NotificationTask::new(
                    source_id,
                    Severity::Critical,
                    format!(
                        "Fire confirmed at source '{}' after {} consecutive confirming readings",
                        source_id, record.consecutive_confirming
                    ),
                ))
            }
            AlertState::Confirmed => {
                if now - record.entered_at < policy.escalation_delay {
                    // Repeat trigger inside the alert: counted for
                    // audit, deduplicated otherwise.
                    debug!(
                        source = %source_id,
                        confirming = record.consecutive_confirming,
                        "Repeat confirming signal deduplicated"
                    );
                    return None;
                }
                transition(source_id, record, AlertState::Escalated, now);
                if record.cooldown_active(now) {
                    // An in-flight task for this source will be
                    // severity-upgraded by the dispatcher.
                    debug!(source = %source_id, "Cooldown active; escalation not re-notified");
                    return None;
                }
                Some(NotificationTask::new(
                    source_id,
                    Severity::Emergency,
                    format!(
                        "Fire at source '{}' unresolved past escalation delay; severity raised",
                        source_id
                    ),
                ))
            }
            AlertState::Escalated => None,
        }
    }

    fn on_clearing(
        source_id: &str,
        record: &mut AlertRecord,
        policy: &AlertPolicy,
        now: DateTime<Utc>,
    ) {
        match record.state {
            AlertState::Normal => {}
            AlertState::Suspected => {
                transition(source_id, record, AlertState::Normal, now);
            }
            AlertState::Confirmed | AlertState::Escalated => {
                if record.consecutive_clearing >= policy.clear_count {
                    info!(source = %source_id, "Alert resolved");
                    // Resolved folds straight back to normal. The
                    // cooldown window survives so a flapping source
                    // cannot re-notify immediately.
                    transition(source_id, record, AlertState::Normal, now);
                    record.consecutive_confirming = 0;
                    record.consecutive_clearing = 0;
                }
            }
        }
    }

    /// Record the terminal outcome of a dispatched task. Exhaustion is
    /// surfaced to the operator; the alert state is preserved so the
    /// source can be re-dispatched on the next qualifying transition.
    pub fn record_delivery(&mut self, source_id: &str, outcome: DeliveryOutcome) {
        let Some(record) = self.records.get_mut(source_id) else {
            debug!(source = %source_id, "Delivery outcome for unknown source ignored");
            return;
        };
        match &outcome {
            DeliveryOutcome::Delivered { channel, attempts } => {
                info!(source = %source_id, %channel, attempts, "Notification delivered");
            }
            DeliveryOutcome::Exhausted { attempts } => {
                error!(
                    source = %source_id,
                    attempts,
                    state = %record.state,
                    "Notification delivery exhausted; alert remains active"
                );
            }
        }
        record.last_delivery = Some(outcome);
    }

    pub fn record(&self, source_id: &str) -> Option<&AlertRecord> {
        self.records.get(source_id)
    }

    pub fn records(&self) -> impl Iterator<Item = (&String, &AlertRecord)> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

fn transition(source_id: &str, record: &mut AlertRecord, to: AlertState, now: DateTime<Utc>) {
    info!(
        source = %source_id,
        from = %record.state,
        to = %to,
        "Alert state transition"
    );
    record.state = to;
    record.entered_at = now;
}
