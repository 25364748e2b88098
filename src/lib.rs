//! detsim - deterministic multi-body simulation
//!
//! Core modules:
//! - `math`: Vector/quaternion kernel and transforms
//! - `sim`: Deterministic simulation (integration, collisions, session loop)
//! - `persistence`: Compact snapshot codec and reproducibility records
//! - `settings`: Session configuration

pub mod error;
pub mod math;
pub mod persistence;
pub mod settings;
pub mod sim;

pub use error::{Result, SimError};
pub use settings::SimConfig;
pub use sim::{Action, ActionKind, Entity, EntityId, EntityKind, Simulation, StateSnapshot};

/// Simulation defaults
pub mod consts {
    /// Fixed simulation timestep (60 Hz)
    pub const FIXED_TIMESTEP: f64 = 1.0 / 60.0;
    /// Maximum substeps per clock advance to prevent spiral of death
    pub const MAX_SUBSTEPS: u32 = 10;
    /// Largest timestep accepted by configuration validation
    pub const MAX_TIMESTEP: f64 = 1.0;

    /// Standard gravity along -Y (m/s²)
    pub const GRAVITY_Y: f64 = -9.81;
    /// Default half-size of the world bounds cube
    pub const WORLD_HALF_EXTENT: f64 = 1000.0;

    /// Per-tick velocity damping factor
    pub const VELOCITY_DAMPING: f64 = 0.99;
    /// Velocity-squared threshold separating `Moving` from `Idle`
    pub const REST_VELOCITY_SQ: f64 = 0.01;

    /// Default spatial hash cell size
    pub const CELL_SIZE: f64 = 10.0;

    /// Penetration allowed before positional correction kicks in
    pub const CONTACT_SLOP: f64 = 0.01;
    /// Fraction of remaining penetration corrected per contact
    pub const CORRECTION_PERCENT: f64 = 0.8;

    /// Stability thresholds (strict mode)
    pub const MAX_STABLE_VELOCITY: f64 = 1000.0;
    pub const MAX_STABLE_ACCELERATION: f64 = 10000.0;

    /// Snapshot schema version
    pub const SNAPSHOT_VERSION: u32 = 1;
}
