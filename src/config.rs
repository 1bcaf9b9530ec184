//! Configuration loading and validation. Invalid configuration is
//! fatal at startup; nothing here is recoverable at runtime.

use crate::alert::AlertPolicy;
use crate::detect::Thresholds;
use crate::notify::DispatchPolicy;
use crate::registry::SourceKind;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::info;

/// Channel names the daemon can construct itself.
pub const BUILTIN_CHANNELS: &[&str] = &["console", "log"];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },

    #[error("duplicate source id '{0}' in inventory")]
    DuplicateSourceId(String),

    #[error("unknown notification channel '{0}'")]
    UnknownChannel(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub monitor: MonitorConfig,
    pub thresholds: ThresholdConfig,
    pub alerts: AlertConfig,
    pub dispatch: DispatchConfig,
    pub sources: Vec<SourceEntry>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            monitor: MonitorConfig::default(),
            thresholds: ThresholdConfig::default(),
            alerts: AlertConfig::default(),
            dispatch: DispatchConfig::default(),
            sources: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub poll_interval_seconds: u64,
    pub max_concurrent_classifications: usize,
    pub classify_timeout_seconds: u64,
    pub shutdown_deadline_seconds: u64,
    /// Consecutive classification failures before a source is marked
    /// faulted in the registry.
    pub fault_threshold: u32,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval_seconds: 5,
            max_concurrent_classifications: 8,
            classify_timeout_seconds: 2,
            shutdown_deadline_seconds: 10,
            fault_threshold: 3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ThresholdConfig {
    pub temp_high: f64,
    pub temp_low: f64,
    pub smoke_high: f64,
    pub smoke_low: f64,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            temp_high: 80.0,
            temp_low: 60.0,
            smoke_high: 0.7,
            smoke_low: 0.4,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertConfig {
    pub confirm_count: u32,
    pub clear_count: u32,
    pub cooldown_seconds: u64,
    pub escalation_delay_seconds: u64,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            confirm_count: 2,
            clear_count: 2,
            cooldown_seconds: 300,
            escalation_delay_seconds: 600,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    pub max_retries: u32,
    pub timeout_seconds: u64,
    pub backoff_ms: u64,
    /// Ordered channel names, primary first.
    pub channels: Vec<String>,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            timeout_seconds: 5,
            backoff_ms: 500,
            channels: vec!["console".to_string(), "log".to_string()],
        }
    }
}

/// One `[[sources]]` inventory entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceEntry {
    pub id: String,
    pub kind: SourceKind,
}

impl Config {
    /// Load and validate a TOML config file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        config.validate()?;
        info!(path = %path.display(), sources = config.sources.len(), "Configuration loaded");
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let m = &self.monitor;
        if m.poll_interval_seconds == 0 {
            return Err(invalid("monitor.poll_interval_seconds", "must be at least 1"));
        }
        if m.classify_timeout_seconds == 0 {
            return Err(invalid("monitor.classify_timeout_seconds", "must be at least 1"));
        }
        if m.max_concurrent_classifications == 0 {
            return Err(invalid(
                "monitor.max_concurrent_classifications",
                "must be at least 1",
            ));
        }
        if m.fault_threshold == 0 {
            return Err(invalid("monitor.fault_threshold", "must be at least 1"));
        }

        let t = &self.thresholds;
        for (field, value) in [
            ("thresholds.temp_high", t.temp_high),
            ("thresholds.temp_low", t.temp_low),
            ("thresholds.smoke_high", t.smoke_high),
            ("thresholds.smoke_low", t.smoke_low),
        ] {
            if !value.is_finite() {
                return Err(invalid(field, format!("{value} is not finite")));
            }
        }
        if t.temp_high <= t.temp_low {
            return Err(invalid(
                "thresholds.temp_high",
                format!("{} must be greater than temp_low {}", t.temp_high, t.temp_low),
            ));
        }
        if t.smoke_high <= t.smoke_low {
            return Err(invalid(
                "thresholds.smoke_high",
                format!("{} must be greater than smoke_low {}", t.smoke_high, t.smoke_low),
            ));
        }
        if !(0.0..=1.0).contains(&t.smoke_low) || !(0.0..=1.0).contains(&t.smoke_high) {
            return Err(invalid(
                "thresholds.smoke_high",
                "smoke thresholds must lie in 0.0..=1.0".to_string(),
            ));
        }

        let a = &self.alerts;
        if a.confirm_count == 0 {
            return Err(invalid("alerts.confirm_count", "must be at least 1"));
        }
        if a.clear_count == 0 {
            return Err(invalid("alerts.clear_count", "must be at least 1"));
        }

        let d = &self.dispatch;
        if d.max_retries == 0 {
            return Err(invalid("dispatch.max_retries", "must be at least 1"));
        }
        if d.channels.is_empty() {
            return Err(invalid("dispatch.channels", "at least one channel required"));
        }
        for channel in &d.channels {
            if !BUILTIN_CHANNELS.contains(&channel.as_str()) {
                return Err(ConfigError::UnknownChannel(channel.clone()));
            }
        }

        let mut seen = HashSet::new();
        for entry in &self.sources {
            if entry.id.trim().is_empty() {
                return Err(invalid("sources.id", "source id must not be empty"));
            }
            if !seen.insert(entry.id.as_str()) {
                return Err(ConfigError::DuplicateSourceId(entry.id.clone()));
            }
        }

        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.monitor.poll_interval_seconds)
    }

    pub fn classify_timeout(&self) -> Duration {
        Duration::from_secs(self.monitor.classify_timeout_seconds)
    }

    pub fn shutdown_deadline(&self) -> Duration {
        Duration::from_secs(self.monitor.shutdown_deadline_seconds)
    }

    pub fn detection_thresholds(&self) -> Thresholds {
        Thresholds {
            temp_high: self.thresholds.temp_high,
            temp_low: self.thresholds.temp_low,
            smoke_high: self.thresholds.smoke_high,
            smoke_low: self.thresholds.smoke_low,
        }
    }

    pub fn alert_policy(&self) -> AlertPolicy {
        AlertPolicy {
            confirm_count: self.alerts.confirm_count,
            clear_count: self.alerts.clear_count,
            cooldown: chrono::Duration::seconds(self.alerts.cooldown_seconds as i64),
            escalation_delay: chrono::Duration::seconds(self.alerts.escalation_delay_seconds as i64),
        }
    }

    pub fn dispatch_policy(&self) -> DispatchPolicy {
        DispatchPolicy {
            max_retries: self.dispatch.max_retries,
            timeout: Duration::from_secs(self.dispatch.timeout_seconds),
            backoff: Duration::from_millis(self.dispatch.backoff_ms),
        }
    }
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        Config::default().validate().unwrap();
    }

    #[test]
    fn inverted_thresholds_rejected() {
        let mut cfg = Config::default();
        cfg.thresholds.temp_high = 50.0;
        cfg.thresholds.temp_low = 60.0;
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::Invalid { field: "thresholds.temp_high", .. })
        ));
    }

    #[test]
    fn zero_poll_interval_rejected() {
        let mut cfg = Config::default();
        cfg.monitor.poll_interval_seconds = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn unknown_channel_rejected() {
        let mut cfg = Config::default();
        cfg.dispatch.channels = vec!["pigeon".to_string()];
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::UnknownChannel(name)) if name == "pigeon"
        ));
    }

    #[test]
    fn duplicate_source_ids_rejected() {
        let mut cfg = Config::default();
        cfg.sources = vec![
            SourceEntry { id: "cam1".into(), kind: SourceKind::ThermalCamera },
            SourceEntry { id: "cam1".into(), kind: SourceKind::VisualCamera },
        ];
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::DuplicateSourceId(id)) if id == "cam1"
        ));
    }

    #[test]
    fn parses_inventory_toml() {
        let cfg: Config = toml::from_str(
            r#"
            [monitor]
            poll_interval_seconds = 2

            [[sources]]
            id = "cam1"
            kind = "thermal-camera"

            [[sources]]
            id = "smk1"
            kind = "smoke-sensor"
            "#,
        )
        .unwrap();
        cfg.validate().unwrap();
        assert_eq!(cfg.monitor.poll_interval_seconds, 2);
        assert_eq!(cfg.sources.len(), 2);
        assert_eq!(cfg.sources[1].kind, SourceKind::SmokeSensor);
    }
}
