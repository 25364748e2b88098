//! Snapshot persistence and reproducibility records
//!
//! Features:
//! - Compact, field-renamed JSON snapshot schema
//! - Version check on decode
//! - Reproducibility records (config + seed streams + digest) that rebuild
//!   an equivalent session
//!
//! The compact schema does not carry world bounds; they come back as the
//! default world box and callers needing exact bounds keep them separately.

use std::path::Path;

use log::info;
use serde::{Deserialize, Serialize};

use crate::consts::SNAPSHOT_VERSION;
use crate::error::{Result, SimError};
use crate::math::{quat, vec3};
use crate::settings::SimConfig;
use crate::sim::aabb::Aabb;
use crate::sim::entity::{EntityId, EntityStatus};
use crate::sim::rng::SeedSnapshot;
use crate::sim::state::{EntityState, Simulation, StateSnapshot, WorldState};

#[derive(Debug, Serialize, Deserialize)]
struct CompactEntity {
    id: EntityId,
    pos: [f64; 3],
    rot: [f64; 4],
    vel: [f64; 3],
    status: EntityStatus,
}

#[derive(Debug, Serialize, Deserialize)]
struct CompactWorld {
    time: f64,
    gravity: [f64; 3],
    collisions: u64,
}

#[derive(Debug, Serialize, Deserialize)]
struct CompactSnapshot {
    v: u32,
    ts: u64,
    step: u64,
    entities: Vec<CompactEntity>,
    world: CompactWorld,
    hash: String,
}

impl From<&StateSnapshot> for CompactSnapshot {
    fn from(s: &StateSnapshot) -> Self {
        Self {
            v: s.version,
            ts: s.timestamp,
            step: s.step,
            entities: s
                .entities
                .iter()
                .map(|e| CompactEntity {
                    id: e.id.clone(),
                    pos: e.position.to_array(),
                    rot: e.rotation.to_array(),
                    vel: e.velocity.to_array(),
                    status: e.status,
                })
                .collect(),
            world: CompactWorld {
                time: s.world.time,
                gravity: s.world.gravity.to_array(),
                collisions: s.world.total_collisions,
            },
            hash: s.hash.clone(),
        }
    }
}

impl From<CompactSnapshot> for StateSnapshot {
    fn from(c: CompactSnapshot) -> Self {
        let entities: Vec<EntityState> = c
            .entities
            .into_iter()
            .map(|e| EntityState {
                id: e.id,
                position: vec3(e.pos),
                rotation: quat(e.rot),
                velocity: vec3(e.vel),
                status: e.status,
            })
            .collect();
        let active_entities = entities
            .iter()
            .filter(|e| e.status != EntityStatus::Disabled)
            .count();

        StateSnapshot {
            version: c.v,
            timestamp: c.ts,
            step: c.step,
            entities,
            world: WorldState {
                time: c.world.time,
                gravity: vec3(c.world.gravity),
                bounds: Aabb::default_world(),
                active_entities,
                total_collisions: c.world.collisions,
            },
            hash: c.hash,
        }
    }
}

/// Encode a snapshot in the compact schema
pub fn serialize(snapshot: &StateSnapshot) -> Result<String> {
    Ok(serde_json::to_string(&CompactSnapshot::from(snapshot))?)
}

/// Decode a compact snapshot, rejecting other schema versions
pub fn deserialize(json: &str) -> Result<StateSnapshot> {
    let compact: CompactSnapshot = serde_json::from_str(json)?;
    if compact.v != SNAPSHOT_VERSION {
        return Err(SimError::SnapshotVersion {
            found: compact.v,
            expected: SNAPSHOT_VERSION,
        });
    }
    Ok(compact.into())
}

/// Everything needed to reproduce a run, plus the digest it produced
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReproducibilityRecord {
    pub config: SimConfig,
    pub seeds: SeedSnapshot,
    /// Steps taken when the record was captured
    pub steps: u64,
    /// `Simulation::deterministic_hash` at capture time
    pub hash: String,
}

impl ReproducibilityRecord {
    pub fn capture(sim: &Simulation) -> Self {
        Self {
            config: sim.config().clone(),
            seeds: sim.seed_streams().snapshot(),
            steps: sim.step_count(),
            hash: sim.deterministic_hash(),
        }
    }

    /// Whether `sim` ended with the digest this record expects
    pub fn matches(&self, sim: &Simulation) -> bool {
        sim.step_count() == self.steps && sim.deterministic_hash() == self.hash
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path.as_ref(), self.to_json()?)?;
        info!("Saved reproducibility record to {}", path.as_ref().display());
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path.as_ref())?;
        Self::from_json(&json)
    }
}
