//! Network snapshots
//!
//! A [`NetworkSnapshot`] is a self-contained, serializable copy of everything
//! a display or export collaborator reads: entities, notifications and the
//! latest metrics. Snapshots never alias live state.
//!
//! Each snapshot carries the hash of the configuration that produced it so a
//! consumer can tell runs apart.

use crate::core::time::SimTime;
use crate::metrics::ThroughputMetrics;
use crate::models::{Notification, Platform, Signal, Train};
use crate::orchestrator::SimulationError;
use crate::policy::LearningMetrics;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Committed network state at one instant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkSnapshot {
    /// Ticks committed so far
    pub tick: usize,
    /// Simulation time the snapshot was taken at
    pub time: SimTime,
    pub signals: Vec<Signal>,
    pub platforms: Vec<Platform>,
    pub trains: Vec<Train>,
    /// Every stored notification, in creation order
    pub notifications: Vec<Notification>,
    /// Unacknowledged notifications currently on display
    pub visible_notifications: Vec<Notification>,
    pub metrics: ThroughputMetrics,
    pub learning: LearningMetrics,
    pub config_hash: String,
}

impl NetworkSnapshot {
    pub fn to_json(&self) -> Result<String, SimulationError> {
        serde_json::to_string_pretty(self)
            .map_err(|e| SimulationError::Serialization(format!("snapshot: {}", e)))
    }

    pub fn from_json(json: &str) -> Result<Self, SimulationError> {
        serde_json::from_str(json)
            .map_err(|e| SimulationError::Serialization(format!("snapshot: {}", e)))
    }

    pub fn get_train(&self, id: &str) -> Option<&Train> {
        self.trains.iter().find(|t| t.id() == id)
    }

    pub fn get_platform(&self, id: &str) -> Option<&Platform> {
        self.platforms.iter().find(|p| p.id() == id)
    }
}

/// SHA-256 of `config`'s canonical JSON form.
///
/// Object keys are sorted recursively before hashing, so the digest does not
/// depend on map iteration order.
pub fn compute_config_hash<T: Serialize>(config: &T) -> Result<String, SimulationError> {
    use serde_json::Value;
    use std::collections::BTreeMap;

    let value = serde_json::to_value(config)
        .map_err(|e| SimulationError::Serialization(format!("config: {}", e)))?;

    fn canonicalize(value: Value) -> Value {
        match value {
            Value::Object(map) => {
                let sorted: BTreeMap<String, Value> =
                    map.into_iter().map(|(k, v)| (k, canonicalize(v))).collect();
                Value::Object(sorted.into_iter().collect())
            }
            Value::Array(items) => Value::Array(items.into_iter().map(canonicalize).collect()),
            other => other,
        }
    }

    let json = serde_json::to_string(&canonicalize(value))
        .map_err(|e| SimulationError::Serialization(format!("config: {}", e)))?;

    let mut hasher = Sha256::new();
    hasher.update(json.as_bytes());
    Ok(format!("{:x}", hasher.finalize()))
}
