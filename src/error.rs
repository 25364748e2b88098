//! Error taxonomy for simulation sessions
//!
//! Configuration errors are raised at construction, divergence errors from
//! `Simulation::step`. Nothing here is retried internally.

use std::fmt;

use thiserror::Error;

use crate::sim::EntityId;

/// Which kind of non-finite value the stability check found
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NonFiniteKind {
    NaN,
    Infinite,
}

impl fmt::Display for NonFiniteKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NonFiniteKind::NaN => f.write_str("NaN"),
            NonFiniteKind::Infinite => f.write_str("infinite value"),
        }
    }
}

/// Errors surfaced by the engine
#[derive(Debug, Error)]
pub enum SimError {
    /// Fixed timestep outside `(0, 1]` or not finite
    #[error("invalid timestep: {0} (must be in (0, 1] seconds)")]
    InvalidTimestep(f64),

    /// Any other rejected configuration value
    #[error("invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    /// NaN or infinity in an entity's state (always fatal)
    #[error("step {step}: {kind} in {quantity} of entity {entity}")]
    NonFinite {
        step: u64,
        entity: EntityId,
        quantity: &'static str,
        kind: NonFiniteKind,
    },

    /// Velocity or acceleration exceeded the configured threshold
    #[error(
        "step {step}: simulation diverged at entity {entity} (|v| = {velocity}, |a| = {acceleration})"
    )]
    Diverged {
        step: u64,
        entity: EntityId,
        velocity: f64,
        acceleration: f64,
    },

    /// Session reached its configured step budget
    #[error("step limit of {limit} reached")]
    StepLimit { limit: u64 },

    /// An entity with this id is already registered
    #[error("duplicate entity id: {0}")]
    DuplicateEntity(EntityId),

    /// Snapshot or record (de)serialization failed
    #[error("snapshot encoding failed: {0}")]
    Snapshot(#[from] serde_json::Error),

    /// Snapshot produced by an incompatible schema
    #[error("unsupported snapshot version {found} (expected {expected})")]
    SnapshotVersion { found: u32, expected: u32 },

    /// Reading configuration from disk failed
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl SimError {
    /// True for errors raised by the stability check
    pub fn is_divergence(&self) -> bool {
        matches!(self, SimError::NonFinite { .. } | SimError::Diverged { .. })
    }
}

/// Result alias used across the crate
pub type Result<T> = std::result::Result<T, SimError>;
