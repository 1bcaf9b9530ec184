//! Alert lifecycle -- per-source state records and notification tasks.

pub mod machine;

pub use machine::{AlertPolicy, AlertStateMachine};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle state of one source's alert record. `resolved` is
/// transient and folds straight back to `Normal`, so it never appears
/// as a stored state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertState {
    Normal,
    Suspected,
    Confirmed,
    Escalated,
}

impl std::fmt::Display for AlertState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AlertState::Normal => write!(f, "normal"),
            AlertState::Suspected => write!(f, "suspected"),
            AlertState::Confirmed => write!(f, "confirmed"),
            AlertState::Escalated => write!(f, "escalated"),
        }
    }
}

/// Severity of a dispatched notification. Ordered so coalescing can
/// upgrade an in-flight task with `max`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Severity {
    Info,
    Warning,
    Critical,
    Emergency,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Info => write!(f, "INFO"),
            Severity::Warning => write!(f, "WARNING"),
            Severity::Critical => write!(f, "CRITICAL"),
            Severity::Emergency => write!(f, "EMERGENCY"),
        }
    }
}

/// Terminal outcome of one notification task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeliveryOutcome {
    Delivered { channel: String, attempts: u32 },
    Exhausted { attempts: u32 },
}

/// One unit of notification work, created on a qualifying transition
/// and owned by the dispatcher until delivered or exhausted.
#[derive(Debug, Clone, Serialize)]
pub struct NotificationTask {
    pub id: Uuid,
    pub source_id: String,
    pub severity: Severity,
    pub message: String,
    pub attempts: u32,
    pub created_at: DateTime<Utc>,
}

impl NotificationTask {
    pub fn new(source_id: &str, severity: Severity, message: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            source_id: source_id.to_string(),
            severity,
            message,
            attempts: 0,
            created_at: Utc::now(),
        }
    }
}

/// Per-source alert record. Created lazily on first signal, reset on
/// resolution, never destroyed.
#[derive(Debug, Clone, Serialize)]
pub struct AlertRecord {
    pub state: AlertState,
    pub entered_at: DateTime<Utc>,
    pub consecutive_confirming: u32,
    pub consecutive_clearing: u32,
    pub cooldown_until: Option<DateTime<Utc>>,
    pub last_delivery: Option<DeliveryOutcome>,
}

impl AlertRecord {
    fn new(now: DateTime<Utc>) -> Self {
        Self {
            state: AlertState::Normal,
            entered_at: now,
            consecutive_confirming: 0,
            consecutive_clearing: 0,
            cooldown_until: None,
            last_delivery: None,
        }
    }

    pub fn cooldown_active(&self, now: DateTime<Utc>) -> bool {
        self.cooldown_until.map(|until| now < until).unwrap_or(false)
    }
}
