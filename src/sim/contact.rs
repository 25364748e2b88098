//! Impulse-based contact resolution and contact lifecycle tracking
//!
//! Resolution is a single pass per contact: restitution impulse along the
//! normal, Coulomb friction along the tangent, then Baumgarte positional
//! correction. Manifolds are rebuilt every tick; only the set of active pairs
//! survives between ticks, to derive enter/stay/exit events.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use log::debug;
use serde::{Deserialize, Serialize};

use super::broad::CollisionPair;
use super::entity::{Entity, EntityId};
use super::narrow::Contact;
use crate::consts::{CONTACT_SLOP, CORRECTION_PERCENT};
use crate::error::{Result, SimError};
use crate::math::Vector3;

/// Tangential speeds below this produce no friction impulse
const TANGENT_EPSILON: f64 = 1e-9;

/// Positional correction parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContactConfig {
    /// Penetration allowed before correction kicks in
    pub slop: f64,
    /// Fraction of the remaining penetration corrected per contact
    pub percent: f64,
}

impl Default for ContactConfig {
    fn default() -> Self {
        Self {
            slop: CONTACT_SLOP,
            percent: CORRECTION_PERCENT,
        }
    }
}

impl ContactConfig {
    pub fn validate(&self) -> Result<()> {
        if !self.slop.is_finite() || self.slop < 0.0 {
            return Err(SimError::InvalidConfig {
                reason: format!("contact slop must be non-negative, got {}", self.slop),
            });
        }
        if !(0.0..=1.0).contains(&self.percent) {
            return Err(SimError::InvalidConfig {
                reason: format!("contact percent must be in [0, 1], got {}", self.percent),
            });
        }
        Ok(())
    }
}

/// Transient mutable view of one side of a contact
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContactBody {
    pub position: Vector3,
    pub velocity: Vector3,
    pub inv_mass: f64,
    pub friction: f64,
    pub restitution: f64,
    pub is_static: bool,
}

impl ContactBody {
    pub fn from_entity(entity: &Entity) -> Self {
        Self {
            position: entity.position(),
            velocity: entity.velocity,
            inv_mass: entity.inverse_mass(),
            friction: entity.properties.friction,
            restitution: entity.properties.restitution,
            is_static: entity.is_static(),
        }
    }

    /// Inverse mass seen by the solver; static bodies never move
    fn effective_inv_mass(&self) -> f64 {
        if self.is_static { 0.0 } else { self.inv_mass }
    }
}

/// Impulse magnitudes applied by one resolution
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ContactImpulse {
    pub normal: f64,
    pub tangent: f64,
}

impl ContactImpulse {
    pub fn is_zero(&self) -> bool {
        self.normal == 0.0 && self.tangent == 0.0
    }
}

/// Resolve one contact between `a` and `b`, with `contact.normal` pointing
/// from `a` to `b`.
///
/// Static/static pairs and separating pairs are left untouched.
pub fn resolve_contact(
    a: &mut ContactBody,
    b: &mut ContactBody,
    contact: &Contact,
    config: &ContactConfig,
) -> ContactImpulse {
    let inv_a = a.effective_inv_mass();
    let inv_b = b.effective_inv_mass();
    let inv_sum = inv_a + inv_b;
    if (a.is_static && b.is_static) || inv_sum <= 0.0 {
        return ContactImpulse::default();
    }

    let n = contact.normal;
    let normal_speed = (b.velocity - a.velocity).dot(n);
    if normal_speed > 0.0 {
        return ContactImpulse::default();
    }

    // Restitution
    let e = a.restitution.min(b.restitution);
    let j = -(1.0 + e) * normal_speed / inv_sum;
    a.velocity -= n * (j * inv_a);
    b.velocity += n * (j * inv_b);

    // Coulomb friction on the post-impulse relative velocity
    let relative = b.velocity - a.velocity;
    let tangential = relative - n * relative.dot(n);
    let mut jt = 0.0;
    if tangential.length_squared() > TANGENT_EPSILON * TANGENT_EPSILON {
        let t = tangential.normalize();
        let mu = (a.friction * b.friction).max(0.0).sqrt();
        let limit = mu * j.abs();
        jt = (-relative.dot(t) / inv_sum).clamp(-limit, limit);
        a.velocity -= t * (jt * inv_a);
        b.velocity += t * (jt * inv_b);
    }

    // Baumgarte positional correction
    let depth = (contact.penetration - config.slop).max(0.0);
    let correction = n * (depth / inv_sum * config.percent);
    a.position -= correction * inv_a;
    b.position += correction * inv_b;

    ContactImpulse {
        normal: j,
        tangent: jt,
    }
}

/// One resolved contact point
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ContactPoint {
    pub position: Vector3,
    pub normal: Vector3,
    pub penetration: f64,
    /// Normal impulse applied at this point
    pub impulse: f64,
}

/// Contact points of one pair for the current tick
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContactManifold {
    pub pair: CollisionPair,
    pub points: Vec<ContactPoint>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContactEventKind {
    Enter,
    Stay,
    Exit,
}

/// Contact lifecycle transition of a pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactEvent {
    pub kind: ContactEventKind,
    pub pair: CollisionPair,
    /// Step during which the transition was observed
    pub step: u64,
}

type ContactCallback = Box<dyn FnMut(&ContactEvent) + Send>;

/// Per-pair manifold store and enter/stay/exit tracker
#[derive(Default)]
pub struct ContactManager {
    manifolds: BTreeMap<CollisionPair, ContactManifold>,
    active: BTreeSet<CollisionPair>,
    callbacks: Vec<ContactCallback>,
}

impl fmt::Debug for ContactManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContactManager")
            .field("manifolds", &self.manifolds)
            .field("active", &self.active)
            .field("callbacks", &self.callbacks.len())
            .finish()
    }
}

impl ContactManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop last tick's manifolds
    pub fn begin_tick(&mut self) {
        self.manifolds.clear();
    }

    /// Add a point to the pair's manifold, creating it on first contact
    pub fn add_contact(&mut self, pair: CollisionPair, point: ContactPoint) {
        self.manifolds
            .entry(pair.clone())
            .or_insert_with(|| ContactManifold {
                pair,
                points: Vec::new(),
            })
            .points
            .push(point);
    }

    pub fn manifold(&self, pair: &CollisionPair) -> Option<&ContactManifold> {
        self.manifolds.get(pair)
    }

    /// Manifolds of the current tick, sorted by pair
    pub fn manifolds(&self) -> impl Iterator<Item = &ContactManifold> {
        self.manifolds.values()
    }

    /// Pairs in contact at the end of the last completed tick
    pub fn active_pairs(&self) -> impl Iterator<Item = &CollisionPair> {
        self.active.iter()
    }

    /// Diff this tick's pairs against the previous active set.
    ///
    /// Enter/stay events come first in pair order, then exits in pair order.
    /// Registered callbacks see the events in the returned order.
    pub fn end_tick(&mut self, step: u64) -> Vec<ContactEvent> {
        let current: BTreeSet<CollisionPair> = self.manifolds.keys().cloned().collect();
        let mut events = Vec::new();

        for pair in &current {
            let kind = if self.active.contains(pair) {
                ContactEventKind::Stay
            } else {
                ContactEventKind::Enter
            };
            events.push(ContactEvent {
                kind,
                pair: pair.clone(),
                step,
            });
        }
        for pair in self.active.difference(&current) {
            events.push(ContactEvent {
                kind: ContactEventKind::Exit,
                pair: pair.clone(),
                step,
            });
        }
        self.active = current;

        for event in &events {
            if event.kind != ContactEventKind::Stay {
                debug!(
                    "contact {:?} {}/{} at step {}",
                    event.kind, event.pair.a, event.pair.b, step
                );
            }
            for callback in &mut self.callbacks {
                callback(event);
            }
        }
        events
    }

    /// Register a callback fired for every event produced by `end_tick`
    pub fn on_event(&mut self, callback: impl FnMut(&ContactEvent) + Send + 'static) {
        self.callbacks.push(Box::new(callback));
    }

    /// Forget a removed entity without emitting exit events for it
    pub fn forget_entity(&mut self, id: &EntityId) {
        self.manifolds.retain(|pair, _| !pair.contains(id));
        self.active.retain(|pair| !pair.contains(id));
    }

    /// Drop all contact state; callbacks stay registered
    pub fn clear(&mut self) {
        self.manifolds.clear();
        self.active.clear();
    }
}
