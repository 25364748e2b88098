//! Seeded randomness
//!
//! `SeededRandom` is a Mulberry32 generator: one 32-bit state word, advanced
//! by a constant and mixed with multiply-xor-shift rounds. Every derived draw
//! (ints, gaussians, shuffles) goes through `next_u32`, so the number of
//! draws fully determines the stream position.
//!
//! `SeedStreams` derives one independent generator per subsystem from a
//! single master seed, so physics draws never perturb sensor draws.

use std::collections::BTreeMap;

use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::math::Vector3;

const MULBERRY_INCREMENT: u32 = 0x6D2B_79F5;
const TWO_POW_32: f64 = 4_294_967_296.0;

/// 32-bit string hash (`h = h·31 + byte`, wrapping)
pub fn hash_str(s: &str) -> u32 {
    s.bytes()
        .fold(0u32, |h, b| h.wrapping_mul(31).wrapping_add(b as u32))
}

/// Deterministic Mulberry32 generator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeededRandom {
    seed: u32,
    state: u32,
    subsystem: String,
}

impl SeededRandom {
    pub fn new(seed: u32) -> Self {
        Self::with_subsystem(seed, "root")
    }

    pub fn with_subsystem(seed: u32, subsystem: impl Into<String>) -> Self {
        Self {
            seed,
            state: seed,
            subsystem: subsystem.into(),
        }
    }

    /// Resume a stream at a previously captured state
    pub fn from_state(seed: u32, state: u32, subsystem: impl Into<String>) -> Self {
        Self {
            seed,
            state,
            subsystem: subsystem.into(),
        }
    }

    pub fn seed(&self) -> u32 {
        self.seed
    }

    pub fn state(&self) -> u32 {
        self.state
    }

    pub fn subsystem(&self) -> &str {
        &self.subsystem
    }

    /// Uniform float in `[0, 1)`
    pub fn next(&mut self) -> f64 {
        self.next_u32() as f64 / TWO_POW_32
    }

    /// Uniform integer in `[min, max]` (bounds may be given in either order)
    pub fn next_int(&mut self, min: i64, max: i64) -> i64 {
        let (lo, hi) = if min <= max { (min, max) } else { (max, min) };
        // i128 so the full i64 range does not overflow
        let span = hi as i128 - lo as i128 + 1;
        let offset = ((self.next() * span as f64).floor() as i128).min(span - 1);
        (lo as i128 + offset) as i64
    }

    /// Uniform float in `[min, max)`
    pub fn next_float(&mut self, min: f64, max: f64) -> f64 {
        min + self.next() * (max - min)
    }

    /// Vector with each component uniform in `[min, max)`, drawn x, y, z
    pub fn next_vector3(&mut self, min: f64, max: f64) -> Vector3 {
        let x = self.next_float(min, max);
        let y = self.next_float(min, max);
        let z = self.next_float(min, max);
        Vector3::new(x, y, z)
    }

    /// Normal sample via Box-Muller (consumes two draws, keeps no spare)
    pub fn next_gaussian(&mut self, mean: f64, std_dev: f64) -> f64 {
        // 1 - u keeps the log argument in (0, 1]
        let u1 = 1.0 - self.next();
        let u2 = self.next();
        let z = libm::sqrt(-2.0 * libm::log(u1)) * libm::cos(std::f64::consts::TAU * u2);
        mean + z * std_dev
    }

    /// `true` with probability `p`
    pub fn next_bool(&mut self, p: f64) -> bool {
        self.next() < p
    }

    /// In-place Fisher-Yates shuffle
    pub fn shuffle<T>(&mut self, items: &mut [T]) {
        for i in (1..items.len()).rev() {
            let j = (self.next() * (i + 1) as f64).floor() as usize;
            items.swap(i, j);
        }
    }

    /// Uniformly chosen element, `None` for an empty slice
    pub fn pick<'a, T>(&mut self, items: &'a [T]) -> Option<&'a T> {
        if items.is_empty() {
            return None;
        }
        let i = (self.next() * items.len() as f64).floor() as usize;
        items.get(i)
    }

    /// Derive an independent generator for `subsystem`.
    ///
    /// The child seed hashes the parent's *original* seed, so forking does not
    /// depend on or consume the parent's position.
    pub fn fork(&self, subsystem: &str) -> Self {
        let seed = hash_str(&format!("{}:{}:{}", self.seed, self.subsystem, subsystem));
        Self::with_subsystem(seed, subsystem)
    }
}

impl RngCore for SeededRandom {
    fn next_u32(&mut self) -> u32 {
        self.state = self.state.wrapping_add(MULBERRY_INCREMENT);
        let mut t = self.state;
        t = (t ^ (t >> 15)).wrapping_mul(t | 1);
        t ^= t.wrapping_add((t ^ (t >> 7)).wrapping_mul(t | 61));
        t ^ (t >> 14)
    }

    fn next_u64(&mut self) -> u64 {
        let hi = self.next_u32() as u64;
        let lo = self.next_u32() as u64;
        (hi << 32) | lo
    }

    fn fill_bytes(&mut self, dst: &mut [u8]) {
        for chunk in dst.chunks_mut(4) {
            let bytes = self.next_u32().to_le_bytes();
            chunk.copy_from_slice(&bytes[..chunk.len()]);
        }
    }
}

/// Named subsystems with their own seed stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Subsystem {
    Physics,
    Collision,
    Pathfinding,
    Sensors,
    Randomization,
}

impl Subsystem {
    pub const ALL: [Subsystem; 5] = [
        Subsystem::Physics,
        Subsystem::Collision,
        Subsystem::Pathfinding,
        Subsystem::Sensors,
        Subsystem::Randomization,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Subsystem::Physics => "physics",
            Subsystem::Collision => "collision",
            Subsystem::Pathfinding => "pathfinding",
            Subsystem::Sensors => "sensors",
            Subsystem::Randomization => "randomization",
        }
    }
}

/// Seed and current position of one stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamState {
    pub seed: u32,
    pub state: u32,
}

/// Captured seed streams, for reproducibility records
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedSnapshot {
    pub master: u64,
    pub physics: StreamState,
    pub collision: StreamState,
    pub pathfinding: StreamState,
    pub sensors: StreamState,
    pub randomization: StreamState,
}

impl SeedSnapshot {
    pub fn get(&self, subsystem: Subsystem) -> StreamState {
        match subsystem {
            Subsystem::Physics => self.physics,
            Subsystem::Collision => self.collision,
            Subsystem::Pathfinding => self.pathfinding,
            Subsystem::Sensors => self.sensors,
            Subsystem::Randomization => self.randomization,
        }
    }
}

/// Per-session registry of seed streams derived from one master seed
#[derive(Debug, Clone)]
pub struct SeedStreams {
    master: u64,
    streams: BTreeMap<String, SeededRandom>,
}

impl SeedStreams {
    pub fn new(master: u64) -> Self {
        Self {
            master,
            streams: BTreeMap::new(),
        }
    }

    pub fn master(&self) -> u64 {
        self.master
    }

    /// Seed a stream named `name` starts from
    pub fn seed_for(&self, name: &str) -> u32 {
        hash_str(&format!("{}:{}", self.master, name))
    }

    /// Stream for a built-in subsystem (created on first access)
    pub fn stream(&mut self, subsystem: Subsystem) -> &mut SeededRandom {
        self.named(subsystem.as_str())
    }

    /// Stream for an arbitrary subsystem name (created on first access)
    pub fn named(&mut self, name: &str) -> &mut SeededRandom {
        let seed = self.seed_for(name);
        self.streams
            .entry(name.to_string())
            .or_insert_with(|| SeededRandom::with_subsystem(seed, name))
    }

    fn stream_state(&self, subsystem: Subsystem) -> StreamState {
        match self.streams.get(subsystem.as_str()) {
            Some(rng) => StreamState {
                seed: rng.seed(),
                state: rng.state(),
            },
            None => {
                let seed = self.seed_for(subsystem.as_str());
                StreamState { seed, state: seed }
            }
        }
    }

    /// Capture the master seed and the position of every built-in stream
    pub fn snapshot(&self) -> SeedSnapshot {
        SeedSnapshot {
            master: self.master,
            physics: self.stream_state(Subsystem::Physics),
            collision: self.stream_state(Subsystem::Collision),
            pathfinding: self.stream_state(Subsystem::Pathfinding),
            sensors: self.stream_state(Subsystem::Sensors),
            randomization: self.stream_state(Subsystem::Randomization),
        }
    }

    /// Rebuild all built-in streams from a snapshot.
    ///
    /// Custom-named streams are dropped and re-derived from the master seed
    /// on their next access.
    pub fn restore(&mut self, snapshot: &SeedSnapshot) {
        self.master = snapshot.master;
        self.streams.clear();
        for subsystem in Subsystem::ALL {
            let s = snapshot.get(subsystem);
            self.streams.insert(
                subsystem.as_str().to_string(),
                SeededRandom::from_state(s.seed, s.state, subsystem.as_str()),
            );
        }
    }

    /// Drop all streams so they restart from their derived seeds
    pub fn reset(&mut self) {
        self.streams.clear();
    }
}
