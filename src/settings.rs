//! Session configuration
//!
//! Everything a run needs to be reproduced lives here; it is captured verbatim
//! into reproducibility records and can be loaded from JSON.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::consts::*;
use crate::error::{Result, SimError};
use crate::math::Vector3;
use crate::sim::aabb::Aabb;
use crate::sim::broad::BroadPhaseKind;
use crate::sim::contact::ContactConfig;
use crate::sim::integrator::IntegratorKind;
use crate::sim::stability::StabilityThresholds;

/// Simulation session configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Fixed simulation timestep in seconds
    pub fixed_timestep: f64,
    /// Clock catch-up cap per `advance` call
    pub max_substeps: u32,
    /// Optional total step budget for the session
    pub max_steps: Option<u64>,
    /// Integration method
    pub integrator: IntegratorKind,
    /// Master seed for every seed stream
    pub seed: u64,
    /// Run the stability check every tick
    pub strict: bool,
    /// Record per-tick hashes for the deterministic digest
    pub record_step_hashes: bool,
    /// Run the collision phase
    pub collisions: bool,
    /// Broadphase backend
    pub broadphase: BroadPhaseKind,
    /// Spatial hash cell size (ignored by other backends)
    pub cell_size: f64,
    /// World gravity
    pub gravity: Vector3,
    /// World bounds entities are confined to
    pub bounds: Aabb,
    /// Velocity damping factor applied every tick
    pub damping: f64,
    /// Velocity-squared threshold below which an entity is idle
    pub rest_threshold: f64,
    /// Contact resolution tuning
    pub contact: ContactConfig,
    /// Divergence thresholds (strict mode)
    pub stability: StabilityThresholds,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            fixed_timestep: FIXED_TIMESTEP,
            max_substeps: MAX_SUBSTEPS,
            max_steps: None,
            integrator: IntegratorKind::default(),
            seed: 0,
            strict: false,
            record_step_hashes: true,
            collisions: true,
            broadphase: BroadPhaseKind::default(),
            cell_size: CELL_SIZE,
            gravity: Vector3::new(0.0, GRAVITY_Y, 0.0),
            bounds: Aabb::default_world(),
            damping: VELOCITY_DAMPING,
            rest_threshold: REST_VELOCITY_SQ,
            contact: ContactConfig::default(),
            stability: StabilityThresholds::default(),
        }
    }
}

impl SimConfig {
    /// Default configuration with a specific master seed
    pub fn with_seed(seed: u64) -> Self {
        Self {
            seed,
            ..Self::default()
        }
    }

    /// Reject configurations that cannot produce a valid run
    pub fn validate(&self) -> Result<()> {
        let dt = self.fixed_timestep;
        if !dt.is_finite() || dt <= 0.0 || dt > MAX_TIMESTEP {
            return Err(SimError::InvalidTimestep(dt));
        }
        if self.max_substeps == 0 {
            return invalid("max_substeps must be at least 1");
        }
        if self.max_steps == Some(0) {
            return invalid("max_steps must be at least 1 when set");
        }
        if !(self.cell_size.is_finite() && self.cell_size > 0.0) {
            return invalid(format!("cell_size must be positive, got {}", self.cell_size));
        }
        if !self.gravity.is_finite() {
            return invalid("gravity must be finite");
        }
        if !self.bounds.is_valid() {
            return invalid("world bounds min must not exceed max");
        }
        if !(0.0..=1.0).contains(&self.damping) {
            return invalid(format!("damping must be in [0, 1], got {}", self.damping));
        }
        if self.rest_threshold.is_nan() || self.rest_threshold < 0.0 {
            return invalid("rest_threshold must be non-negative");
        }
        self.contact.validate()?;
        self.stability.validate()?;
        Ok(())
    }

    /// Parse and validate a JSON configuration
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a JSON configuration file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path.as_ref())?;
        let config = Self::from_json_str(&json)?;
        log::info!("Loaded config from {}", path.as_ref().display());
        Ok(config)
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

fn invalid<T>(reason: impl Into<String>) -> Result<T> {
    Err(SimError::InvalidConfig {
        reason: reason.into(),
    })
}
