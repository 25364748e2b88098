//! Simulation session state
//!
//! A `Simulation` owns everything a run touches: the entity registry, the
//! integrator and broadphase, the clock, the seed streams and the step-hash
//! recorder. Nothing is shared between sessions.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use log::info;
use serde::{Deserialize, Serialize};

use super::aabb::Aabb;
use super::action::Action;
use super::broad::BroadPhase;
use super::clock::{DeterministicClock, StepHashRecorder, hex_digest, state_hash};
use super::contact::{ContactEvent, ContactManager};
use super::entity::{Entity, EntityId, EntityKind, EntityStatus};
use super::integrator::Integrator;
use super::rng::SeedStreams;
use super::tick::{self, SimEvent};
use crate::consts::SNAPSHOT_VERSION;
use crate::error::{Result, SimError};
use crate::math::{Quaternion, Vector3};
use crate::persistence::ReproducibilityRecord;
use crate::settings::SimConfig;

/// Externally visible state of one entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityState {
    pub id: EntityId,
    pub position: Vector3,
    pub rotation: Quaternion,
    pub velocity: Vector3,
    pub status: EntityStatus,
}

impl From<&Entity> for EntityState {
    fn from(entity: &Entity) -> Self {
        Self {
            id: entity.id.clone(),
            position: entity.position(),
            rotation: entity.transform.rotation,
            velocity: entity.velocity,
            status: entity.status,
        }
    }
}

/// Aggregate world state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorldState {
    pub time: f64,
    pub gravity: Vector3,
    pub bounds: Aabb,
    /// Entities that are not disabled
    pub active_entities: usize,
    pub total_collisions: u64,
}

/// Point-in-time view of a session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateSnapshot {
    pub version: u32,
    /// Wall-clock capture time in milliseconds since the Unix epoch
    pub timestamp: u64,
    pub step: u64,
    /// Sorted by id
    pub entities: Vec<EntityState>,
    pub world: WorldState,
    /// Hash of `step` and the entity states, 16 hex chars
    pub hash: String,
}

/// A deterministic simulation session
pub struct Simulation {
    pub(super) config: SimConfig,
    pub(super) entities: BTreeMap<EntityId, Entity>,
    pub(super) integrator: Box<dyn Integrator>,
    pub(super) broadphase: Box<dyn BroadPhase>,
    pub(super) contacts: ContactManager,
    pub(super) recorder: StepHashRecorder,
    /// Events of the last completed tick
    pub(super) events: Vec<SimEvent>,
    pub(super) step: u64,
    pub(super) total_collisions: u64,
    clock: DeterministicClock,
    seeds: SeedStreams,
    /// Actions handed to `advance` that no tick has consumed yet
    pending_actions: Vec<Action>,
    /// Per-session counter behind generated ids
    next_id: u64,
}

impl fmt::Debug for Simulation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Simulation")
            .field("step", &self.step)
            .field("entities", &self.entities.len())
            .field("integrator", &self.integrator.kind())
            .field("broadphase", &self.broadphase.kind())
            .field("total_collisions", &self.total_collisions)
            .finish_non_exhaustive()
    }
}

impl Simulation {
    /// Validate `config` and build an empty session
    pub fn new(config: SimConfig) -> Result<Self> {
        config.validate()?;
        info!(
            "New simulation: seed={} dt={} integrator={} broadphase={} strict={}",
            config.seed,
            config.fixed_timestep,
            config.integrator.as_str(),
            config.broadphase.as_str(),
            config.strict
        );

        Ok(Self {
            integrator: config.integrator.build(),
            broadphase: config.broadphase.build(config.cell_size),
            clock: DeterministicClock::new(config.fixed_timestep, config.max_substeps),
            seeds: SeedStreams::new(config.seed),
            pending_actions: Vec::new(),
            entities: BTreeMap::new(),
            contacts: ContactManager::new(),
            recorder: StepHashRecorder::new(),
            events: Vec::new(),
            step: 0,
            total_collisions: 0,
            next_id: 0,
            config,
        })
    }

    /// Empty session with the record's configuration and seed-stream state
    pub fn from_record(record: &ReproducibilityRecord) -> Result<Self> {
        let mut sim = Self::new(record.config.clone())?;
        sim.seeds.restore(&record.seeds);
        Ok(sim)
    }

    /// Run exactly one tick and return the resulting state.
    ///
    /// Actions still queued by `advance` run first, ahead of `actions`.
    pub fn step(&mut self, actions: &[Action]) -> Result<StateSnapshot> {
        if self.pending_actions.is_empty() {
            tick::tick(self, actions)?;
        } else {
            let mut queued = std::mem::take(&mut self.pending_actions);
            queued.extend_from_slice(actions);
            tick::tick(self, &queued)?;
        }
        Ok(self.state())
    }

    /// Feed a wall-clock delta through the fixed-step clock.
    ///
    /// `actions` join the queue, which the next substep to run consumes in
    /// full. A frame too short for a substep keeps them queued for a later
    /// frame. Returns the number of ticks run.
    pub fn advance(&mut self, wall_delta: f64, actions: &[Action]) -> Result<u32> {
        self.pending_actions.extend_from_slice(actions);
        let mut clock = std::mem::take(&mut self.clock);
        let result = clock.try_advance(wall_delta, || {
            let queued = std::mem::take(&mut self.pending_actions);
            tick::tick(self, &queued)
        });
        self.clock = clock;
        result
    }

    /// Actions waiting for the next tick
    pub fn pending_actions(&self) -> &[Action] {
        &self.pending_actions
    }

    pub fn state(&self) -> StateSnapshot {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or_default();

        StateSnapshot {
            version: SNAPSHOT_VERSION,
            timestamp,
            step: self.step,
            entities: self.entities.values().map(EntityState::from).collect(),
            world: WorldState {
                time: self.time(),
                gravity: self.config.gravity,
                bounds: self.config.bounds,
                active_entities: self.active_entities(),
                total_collisions: self.total_collisions,
            },
            hash: hex_digest(state_hash(self.step, self.entities.values())),
        }
    }

    /// Digest of every recorded step hash, 16 hex chars
    pub fn deterministic_hash(&self) -> String {
        self.recorder.digest()
    }

    // --- Entity management ---

    pub fn add_entity(&mut self, entity: Entity) -> Result<()> {
        if self.entities.contains_key(&entity.id) {
            return Err(SimError::DuplicateEntity(entity.id));
        }
        if !entity.is_disabled() {
            self.broadphase.insert(entity.id.clone(), entity.aabb());
        }
        self.entities.insert(entity.id.clone(), entity);
        Ok(())
    }

    /// Add a batch; nothing is added if any id collides
    pub fn add_entities(&mut self, entities: impl IntoIterator<Item = Entity>) -> Result<()> {
        let batch: Vec<Entity> = entities.into_iter().collect();
        {
            let mut seen = BTreeSet::new();
            for entity in &batch {
                if self.entities.contains_key(&entity.id) || !seen.insert(&entity.id) {
                    return Err(SimError::DuplicateEntity(entity.id.clone()));
                }
            }
        }
        for entity in batch {
            self.add_entity(entity)?;
        }
        Ok(())
    }

    /// Create an entity with the kind's defaults under a generated id
    /// (`"<kind>-<n>"`)
    pub fn spawn(&mut self, kind: EntityKind, position: Vector3) -> EntityId {
        let id = loop {
            self.next_id += 1;
            let candidate = EntityId::new(format!("{}-{}", kind.name(), self.next_id));
            if !self.entities.contains_key(&candidate) {
                break candidate;
            }
        };
        let entity = Entity::new(id.clone(), kind, position);
        self.broadphase.insert(id.clone(), entity.aabb());
        self.entities.insert(id.clone(), entity);
        id
    }

    /// Remove immediately, along with every trace in the collision and
    /// integration state
    pub fn remove_entity(&mut self, id: &EntityId) -> Option<Entity> {
        let entity = self.entities.remove(id)?;
        self.broadphase.remove(id);
        self.integrator.forget(id);
        self.contacts.forget_entity(id);
        Some(entity)
    }

    pub fn entity(&self, id: &EntityId) -> Option<&Entity> {
        self.entities.get(id)
    }

    pub fn entity_state(&self, id: &EntityId) -> Option<EntityState> {
        self.entities.get(id).map(EntityState::from)
    }

    /// Entities in id order
    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values()
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    /// Entities that are not disabled
    pub fn active_entities(&self) -> usize {
        self.entities.values().filter(|e| !e.is_disabled()).count()
    }

    /// Disable or re-enable an entity; returns false for unknown ids.
    ///
    /// Disabled entities are frozen: not integrated, not collided, not
    /// checked for stability, and deaf to actions.
    pub fn set_disabled(&mut self, id: &EntityId, disabled: bool) -> bool {
        let Some(entity) = self.entities.get_mut(id) else {
            return false;
        };
        if disabled {
            entity.status = EntityStatus::Disabled;
            self.broadphase.remove(id);
            self.contacts.forget_entity(id);
        } else if entity.is_disabled() {
            entity.status = EntityStatus::Idle;
            self.broadphase.insert(id.clone(), entity.aabb());
        }
        true
    }

    /// Back to a clean session with the same configuration
    pub fn reset(&mut self) {
        info!("Resetting simulation (seed={})", self.config.seed);
        self.entities.clear();
        self.integrator.reset();
        self.broadphase.clear();
        self.contacts.clear();
        self.recorder.clear();
        self.clock.reset();
        self.seeds.reset();
        self.events.clear();
        self.pending_actions.clear();
        self.step = 0;
        self.total_collisions = 0;
        self.next_id = 0;
    }

    // --- Accessors ---

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn clock(&self) -> &DeterministicClock {
        &self.clock
    }

    pub fn seed_streams(&self) -> &SeedStreams {
        &self.seeds
    }

    pub fn seed_streams_mut(&mut self) -> &mut SeedStreams {
        &mut self.seeds
    }

    /// Events produced by the last tick
    pub fn events(&self) -> &[SimEvent] {
        &self.events
    }

    pub fn contact_manager(&self) -> &ContactManager {
        &self.contacts
    }

    /// Register a callback for contact enter/stay/exit events
    pub fn on_contact(&mut self, callback: impl FnMut(&ContactEvent) + Send + 'static) {
        self.contacts.on_event(callback);
    }

    pub fn step_hashes(&self) -> &StepHashRecorder {
        &self.recorder
    }

    pub fn step_count(&self) -> u64 {
        self.step
    }

    /// Simulated time, `step × fixed_timestep`
    pub fn time(&self) -> f64 {
        self.step as f64 * self.config.fixed_timestep
    }

    pub fn total_collisions(&self) -> u64 {
        self.total_collisions
    }
}
