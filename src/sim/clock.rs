//! Deterministic clock and step hashing
//!
//! The clock turns variable wall-clock deltas into a whole number of fixed
//! steps. Step hashes summarize each tick's entity state so two runs can be
//! compared without diffing trajectories.

use std::convert::Infallible;

use blake3::Hasher;

use super::entity::Entity;
use crate::consts::{FIXED_TIMESTEP, MAX_SUBSTEPS};
use crate::math::{Vector3, bits};

/// Slack absorbing rounding when deltas sum to an exact multiple of the step
const STEP_EPSILON: f64 = 1e-9;


/// Fixed-timestep accumulator
#[derive(Debug, Clone, PartialEq)]
pub struct DeterministicClock {
    fixed_timestep: f64,
    max_substeps: u32,
    accumulator: f64,
    steps: u64,
}

impl Default for DeterministicClock {
    fn default() -> Self {
        Self::new(FIXED_TIMESTEP, MAX_SUBSTEPS)
    }
}

impl DeterministicClock {
    pub fn new(fixed_timestep: f64, max_substeps: u32) -> Self {
        Self {
            fixed_timestep,
            max_substeps: max_substeps.max(1),
            accumulator: 0.0,
            steps: 0,
        }
    }

    pub fn fixed_timestep(&self) -> f64 {
        self.fixed_timestep
    }

    pub fn max_substeps(&self) -> u32 {
        self.max_substeps
    }

    /// Unconsumed time carried into the next advance
    pub fn accumulator(&self) -> f64 {
        self.accumulator
    }

    /// Total fixed steps taken since construction or reset
    pub fn steps(&self) -> u64 {
        self.steps
    }

    /// Simulated time, always an exact multiple of the fixed step
    pub fn time(&self) -> f64 {
        self.steps as f64 * self.fixed_timestep
    }

    /// Fraction of a step left in the accumulator (for interpolation)
    pub fn alpha(&self) -> f64 {
        (self.accumulator / self.fixed_timestep).clamp(0.0, 1.0)
    }

    /// Feed a wall-clock delta and run `on_step` once per whole fixed step.
    ///
    /// Returns the number of steps taken, never more than `max_substeps`.
    pub fn advance(&mut self, delta: f64, mut on_step: impl FnMut()) -> u32 {
        let result = self.try_advance(delta, || {
            on_step();
            Ok::<(), Infallible>(())
        });
        match result {
            Ok(n) => n,
            Err(never) => match never {},
        }
    }

    /// Like `advance`, stopping at the first failing step.
    ///
    /// A failed step is not counted and its time stays in the accumulator.
    pub fn try_advance<E>(
        &mut self,
        delta: f64,
        mut on_step: impl FnMut() -> Result<(), E>,
    ) -> Result<u32, E> {
        if !delta.is_finite() || delta < 0.0 {
            log::debug!("Ignoring clock delta {}", delta);
            return Ok(0);
        }

        let cap = self.fixed_timestep * self.max_substeps as f64;
        self.accumulator = (self.accumulator + delta).min(cap);

        let mut taken = 0;
        while taken < self.max_substeps && self.accumulator + STEP_EPSILON >= self.fixed_timestep
        {
            on_step()?;
            self.accumulator = (self.accumulator - self.fixed_timestep).max(0.0);
            self.steps += 1;
            taken += 1;
        }
        Ok(taken)
    }

    pub fn reset(&mut self) {
        self.accumulator = 0.0;
        self.steps = 0;
    }
}

/// Hash one tick's state: step number, then positions, then velocities of
/// all entities in id order, as little-endian bits through BLAKE3.
///
/// Sorting happens here so callers cannot leak registry iteration order. The
/// per-step hash is the first 8 bytes of the digest.
pub fn state_hash<'a>(step: u64, entities: impl IntoIterator<Item = &'a Entity>) -> u64 {
    let mut sorted: Vec<&Entity> = entities.into_iter().collect();
    sorted.sort_by(|a, b| a.id.cmp(&b.id));

    let mut hasher = Hasher::new();
    hasher.update(&step.to_le_bytes());
    for e in &sorted {
        update_bits(&mut hasher, e.transform.position);
    }
    for e in &sorted {
        update_bits(&mut hasher, e.velocity);
    }

    let mut head = [0u8; 8];
    head.copy_from_slice(&hasher.finalize().as_bytes()[..8]);
    u64::from_le_bytes(head)
}

fn update_bits(hasher: &mut Hasher, v: Vector3) {
    for b in bits(v) {
        hasher.update(&b.to_le_bytes());
    }
}

/// Render a hash as 16 lowercase hex digits
pub fn hex_digest(hash: u64) -> String {
    format!("{:016x}", hash)
}

/// Ordered log of per-tick hashes
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StepHashRecorder {
    hashes: Vec<u64>,
}

impl StepHashRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, hash: u64) {
        self.hashes.push(hash);
    }

    pub fn hashes(&self) -> &[u64] {
        &self.hashes
    }

    pub fn len(&self) -> usize {
        self.hashes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hashes.is_empty()
    }

    /// Order-sensitive fold (rotate-and-add) of every recorded hash
    pub fn aggregate(&self) -> u64 {
        self.hashes
            .iter()
            .fold(0u64, |acc, h| acc.rotate_left(5).wrapping_add(*h))
    }

    /// Aggregate as 16 lowercase hex digits
    pub fn digest(&self) -> String {
        hex_digest(self.aggregate())
    }

    pub fn clear(&mut self) {
        self.hashes.clear();
    }
}
