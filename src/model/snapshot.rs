//! Versioned, all-or-nothing world snapshots.
//!
//! The document is JSON with `version` as its first field. Loading checks the
//! version before parsing anything else, validates the whole document against
//! itself, stages system state with rollback, and only then swaps the new
//! state into the world. A failed load leaves the world exactly as it was.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::entities::Entities;
use super::store::{Components, StoreSnapshot};
use super::world::World;
use crate::id::EntityId;
use crate::rng::{RngState, SimRng};

pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("snapshot has no integer version field")]
    MissingVersion,
    #[error("unsupported snapshot version {found} (expected {expected})")]
    UnsupportedVersion { found: u64, expected: u32 },
    #[error("malformed snapshot: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("inconsistent snapshot: {0}")]
    Inconsistent(String),
    #[error("snapshot io: {0}")]
    Io(#[from] std::io::Error),
}

/// Complete serialized world state. Field order is the document order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WorldSnapshot {
    pub version: u32,
    pub rng: RngState,
    pub tick: u64,
    pub match_time: f64,
    pub paused: bool,
    pub time_scale: f64,
    pub next_entity_id: EntityId,
    pub alive: Vec<EntityId>,
    pub pending_destroy: Vec<EntityId>,
    pub stores: StoreSnapshot,
    #[serde(default)]
    pub systems: BTreeMap<String, Value>,
}

impl World {
    pub fn snapshot(&self) -> WorldSnapshot {
        let systems = self
            .systems
            .iter()
            .filter_map(|s| s.save_state().map(|state| (s.name().to_string(), state)))
            .collect();
        WorldSnapshot {
            version: SNAPSHOT_VERSION,
            rng: self.rng.save(),
            tick: self.tick,
            match_time: self.match_time,
            paused: self.paused,
            time_scale: self.time_scale,
            next_entity_id: self.entities.next_id(),
            alive: self.entities.alive().collect(),
            pending_destroy: self.entities.doomed().to_vec(),
            stores: self.components.to_snapshot(),
            systems,
        }
    }

    pub fn serialize(&self) -> Result<String, SnapshotError> {
        Ok(serde_json::to_string(&self.snapshot())?)
    }

    /// Replace the whole world state from a JSON snapshot.
    ///
    /// Subscriptions, config and the registered systems are kept; everything
    /// else comes from the document.
    pub fn deserialize(&mut self, json: &str) -> Result<(), SnapshotError> {
        let value: Value = serde_json::from_str(json)?;
        check_version(&value)?;
        let snapshot = WorldSnapshot::deserialize(value)?;
        self.restore(snapshot)
    }

    pub fn restore(&mut self, snapshot: WorldSnapshot) -> Result<(), SnapshotError> {
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(SnapshotError::UnsupportedVersion {
                found: u64::from(snapshot.version),
                expected: SNAPSHOT_VERSION,
            });
        }
        if !snapshot.match_time.is_finite()
            || !snapshot.time_scale.is_finite()
            || snapshot.time_scale < 0.0
        {
            return Err(SnapshotError::Inconsistent(
                "clock values must be finite and time scale non-negative".to_string(),
            ));
        }

        let entities = Entities::from_parts(
            snapshot.next_entity_id,
            &snapshot.alive,
            &snapshot.pending_destroy,
        )
        .map_err(SnapshotError::Inconsistent)?;

        let mut seen = BTreeSet::new();
        for (store, id) in snapshot.stores.referenced_ids() {
            if !entities.is_alive(id) && !entities.is_doomed(id) {
                return Err(SnapshotError::Inconsistent(format!(
                    "store {} holds data for dead entity {id}",
                    store.as_str()
                )));
            }
            if !seen.insert((store, id)) {
                return Err(SnapshotError::Inconsistent(format!(
                    "store {} lists entity {id} twice",
                    store.as_str()
                )));
            }
        }

        if let Some(name) = snapshot
            .systems
            .keys()
            .find(|name| !self.systems.iter().any(|s| s.name() == name.as_str()))
        {
            return Err(SnapshotError::Inconsistent(format!(
                "snapshot carries state for unknown system {name}"
            )));
        }

        self.stage_system_state(&snapshot.systems)?;

        self.entities = entities;
        self.components = Components::from_snapshot(snapshot.stores);
        self.rng = SimRng::restore(snapshot.rng);
        self.tick = snapshot.tick;
        self.match_time = snapshot.match_time;
        self.paused = snapshot.paused;
        self.time_scale = snapshot.time_scale;

        tracing::info!(
            tick = self.tick,
            alive = self.entities.alive_count(),
            "snapshot restored"
        );
        Ok(())
    }

    /// Load each system's state in order. On the first failure, put every
    /// already-loaded system back to what it held before.
    fn stage_system_state(
        &mut self,
        states: &BTreeMap<String, Value>,
    ) -> Result<(), SnapshotError> {
        let backups: Vec<Option<Value>> = self.systems.iter().map(|s| s.save_state()).collect();

        for i in 0..self.systems.len() {
            let state = states.get(self.systems[i].name());
            if let Err(err) = self.systems[i].load_state(state) {
                for (system, backup) in self.systems.iter_mut().zip(&backups).take(i) {
                    // Restoring a state the system produced itself cannot fail.
                    let _ = system.load_state(backup.as_ref());
                }
                return Err(SnapshotError::Malformed(err));
            }
        }
        Ok(())
    }

    pub fn save_to_path(&self, path: impl AsRef<Path>) -> Result<(), SnapshotError> {
        fs::write(path, self.serialize()?)?;
        Ok(())
    }

    pub fn load_from_path(&mut self, path: impl AsRef<Path>) -> Result<(), SnapshotError> {
        let json = fs::read_to_string(path)?;
        self.deserialize(&json)
    }
}

fn check_version(value: &Value) -> Result<(), SnapshotError> {
    let found = value
        .get("version")
        .and_then(Value::as_u64)
        .ok_or(SnapshotError::MissingVersion)?;
    if found != u64::from(SNAPSHOT_VERSION) {
        return Err(SnapshotError::UnsupportedVersion {
            found,
            expected: SNAPSHOT_VERSION,
        });
    }
    Ok(())
}
