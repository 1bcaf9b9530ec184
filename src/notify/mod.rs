//! Notification delivery -- channel trait, built-in channels, dispatcher.

pub mod dispatcher;

pub use dispatcher::{DispatchPolicy, Dispatcher};

use crate::alert::{DeliveryOutcome, NotificationTask};
use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("channel '{channel}' timed out")]
    Timeout { channel: String },

    #[error("channel '{channel}' rejected delivery: {reason}")]
    Rejected { channel: String, reason: String },
}

/// Immediate result of handing a task to the dispatcher. Delivery
/// itself is asynchronous; terminal outcomes come back as
/// [`DeliveryReport`]s.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryResult {
    /// Accepted and queued for delivery.
    Queued,
    /// Folded into an in-flight task for the same source.
    Coalesced,
}

/// Terminal outcome of one task, reported back to the state machine
/// for retry bookkeeping.
#[derive(Debug, Clone)]
pub struct DeliveryReport {
    pub source_id: String,
    pub task_id: uuid::Uuid,
    pub outcome: DeliveryOutcome,
}

/// Construct a built-in channel by config name.
pub fn builtin_channel(name: &str) -> Option<std::sync::Arc<dyn NotifyChannel>> {
    match name {
        "log" => Some(std::sync::Arc::new(LogChannel)),
        "console" => Some(std::sync::Arc::new(ConsoleChannel)),
        _ => None,
    }
}

/// One delivery channel (SMS gateway, webhook, pager...). External
/// transports implement this; the dispatcher owns retries and ordering
/// above it.
#[async_trait]
pub trait NotifyChannel: Send + Sync {
    fn name(&self) -> &str;

    async fn deliver(&self, task: &NotificationTask) -> Result<(), NotifyError>;
}

/// Built-in channel that emits the alert into the structured log
/// stream. Always succeeds; useful as a last-resort fallback.
pub struct LogChannel;

#[async_trait]
impl NotifyChannel for LogChannel {
    fn name(&self) -> &str {
        "log"
    }

    async fn deliver(&self, task: &NotificationTask) -> Result<(), NotifyError> {
        tracing::warn!(
            source = %task.source_id,
            severity = %task.severity,
            task = %task.id,
            "{}",
            task.message
        );
        Ok(())
    }
}

/// Built-in channel that prints the alert to stdout, the way the
/// legacy site monitor alerted its console operator.
pub struct ConsoleChannel;

#[async_trait]
impl NotifyChannel for ConsoleChannel {
    fn name(&self) -> &str {
        "console"
    }

    async fn deliver(&self, task: &NotificationTask) -> Result<(), NotifyError> {
        println!(
            "[{}] ALERT {}: {}",
            task.created_at.to_rfc3339(),
            task.severity,
            task.message
        );
        Ok(())
    }
}
