//! Source registry -- the inventory of sensor feeds the monitor watches.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("source '{0}' is already registered")]
    DuplicateSource(String),

    #[error("source '{0}' is not registered")]
    UnknownSource(String),
}

/// Kind of sensor feed behind a source id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceKind {
    ThermalCamera,
    VisualCamera,
    SmokeSensor,
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceKind::ThermalCamera => write!(f, "thermal-camera"),
            SourceKind::VisualCamera => write!(f, "visual-camera"),
            SourceKind::SmokeSensor => write!(f, "smoke-sensor"),
        }
    }
}

/// Liveness of a source as tracked by the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Liveness {
    Active,
    Inactive,
    Faulted,
}

/// A registered sensor feed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Source {
    pub id: String,
    pub kind: SourceKind,
    pub liveness: Liveness,
    pub last_seen: Option<DateTime<Utc>>,
}

/// Holds every known source. Mutations go through the registry so the
/// single-writer discipline of the tick loop is the only writer path.
#[derive(Debug, Default)]
pub struct SourceRegistry {
    sources: Vec<Source>,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new source. Rejects duplicate ids.
    pub fn register(&mut self, id: &str, kind: SourceKind) -> Result<(), RegistryError> {
        if self.sources.iter().any(|s| s.id == id) {
            warn!(source = %id, "Rejecting duplicate source registration");
            return Err(RegistryError::DuplicateSource(id.to_string()));
        }
        self.sources.push(Source {
            id: id.to_string(),
            kind,
            liveness: Liveness::Active,
            last_seen: None,
        });
        info!(source = %id, %kind, "Source registered");
        Ok(())
    }

    /// Take a source out of the polling rotation. Its alert history is
    /// untouched; only liveness changes.
    pub fn deactivate(&mut self, id: &str) -> Result<(), RegistryError> {
        let source = self.get_mut(id)?;
        source.liveness = Liveness::Inactive;
        info!(source = %id, "Source deactivated");
        Ok(())
    }

    /// Mark a source faulted after repeated classification failures.
    pub fn mark_faulted(&mut self, id: &str) -> Result<(), RegistryError> {
        let source = self.get_mut(id)?;
        source.liveness = Liveness::Faulted;
        warn!(source = %id, "Source marked faulted");
        Ok(())
    }

    /// Record a successful reading: bumps `last_seen` and recovers a
    /// faulted source back to active.
    pub fn mark_seen(&mut self, id: &str, now: DateTime<Utc>) -> Result<(), RegistryError> {
        let source = self.get_mut(id)?;
        source.last_seen = Some(now);
        if source.liveness == Liveness::Faulted {
            info!(source = %id, "Source recovered from fault");
            source.liveness = Liveness::Active;
        }
        Ok(())
    }

    /// Active sources in insertion order. Faulted sources stay in the
    /// rotation so they can recover on their own.
    pub fn list_active(&self) -> Vec<Source> {
        self.sources
            .iter()
            .filter(|s| s.liveness != Liveness::Inactive)
            .cloned()
            .collect()
    }

    pub fn get(&self, id: &str) -> Option<&Source> {
        self.sources.iter().find(|s| s.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Source> {
        self.sources.iter()
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    fn get_mut(&mut self, id: &str) -> Result<&mut Source, RegistryError> {
        self.sources
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or_else(|| RegistryError::UnknownSource(id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_registration_rejected() {
        let mut reg = SourceRegistry::new();
        reg.register("cam1", SourceKind::ThermalCamera).unwrap();
        assert_eq!(
            reg.register("cam1", SourceKind::VisualCamera),
            Err(RegistryError::DuplicateSource("cam1".into()))
        );
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn deactivate_unknown_rejected() {
        let mut reg = SourceRegistry::new();
        assert_eq!(
            reg.deactivate("ghost"),
            Err(RegistryError::UnknownSource("ghost".into()))
        );
    }

    #[test]
    fn list_active_preserves_insertion_order() {
        let mut reg = SourceRegistry::new();
        reg.register("cam1", SourceKind::ThermalCamera).unwrap();
        reg.register("ir1", SourceKind::VisualCamera).unwrap();
        reg.register("smk1", SourceKind::SmokeSensor).unwrap();
        reg.deactivate("ir1").unwrap();

        let active = reg.list_active();
        let ids: Vec<&str> = active.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["cam1", "smk1"]);
    }

    #[test]
    fn faulted_source_recovers_on_reading() {
        let mut reg = SourceRegistry::new();
        reg.register("cam1", SourceKind::ThermalCamera).unwrap();
        reg.mark_faulted("cam1").unwrap();
        assert_eq!(reg.get("cam1").unwrap().liveness, Liveness::Faulted);
        // Faulted sources are still polled
        assert_eq!(reg.list_active().len(), 1);

        reg.mark_seen("cam1", Utc::now()).unwrap();
        assert_eq!(reg.get("cam1").unwrap().liveness, Liveness::Active);
        assert!(reg.get("cam1").unwrap().last_seen.is_some());
    }
}
