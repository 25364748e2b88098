//! Deterministic simulation module
//!
//! All physics lives here. This module must be pure and deterministic:
//! - Fixed timestep only
//! - Seeded RNG only
//! - Stable iteration order (by entity ID)
//! - No wall-clock reads except the snapshot timestamp

pub mod aabb;
pub mod action;
pub mod broad;
pub mod clock;
pub mod contact;
pub mod entity;
pub mod integrator;
pub mod narrow;
pub mod rng;
pub mod stability;
pub mod state;
pub mod tick;

pub use aabb::Aabb;
pub use action::{Action, ActionKind};
pub use broad::{BroadPhase, BroadPhaseKind, BroadPhaseResult, CollisionPair};
pub use clock::{DeterministicClock, StepHashRecorder, state_hash};
pub use contact::{
    ContactBody, ContactConfig, ContactEvent, ContactEventKind, ContactImpulse, ContactManager,
    ContactManifold, ContactPoint, resolve_contact,
};
pub use entity::{Entity, EntityId, EntityKind, EntityStatus, PhysicalProperties};
pub use integrator::{Integrator, IntegratorKind, IntegratorResult, IntegratorState};
pub use narrow::{Contact, RayHit, aabb_vs_aabb, raycast_aabb, raycast_sphere, sphere_vs_aabb, sphere_vs_sphere};
pub use rng::{SeedSnapshot, SeedStreams, SeededRandom, Subsystem, hash_str};
pub use stability::{StabilityReport, StabilityThresholds, check_stability};
pub use state::{EntityState, Simulation, StateSnapshot, WorldState};
pub use tick::SimEvent;
