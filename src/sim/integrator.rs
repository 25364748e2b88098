//! Numerical integrators
//!
//! Four interchangeable strategies of increasing order. All but Velocity
//! Verlet are pure functions of `(state, dt)`; Verlet needs the previous
//! acceleration sample of each body, which it keeps in a side table keyed by
//! entity id so bodies never share history.

use std::collections::BTreeMap;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::entity::EntityId;
use crate::math::Vector3;

/// Input to a single integration step
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IntegratorState {
    pub position: Vector3,
    pub velocity: Vector3,
    pub acceleration: Vector3,
}

/// Output of a single integration step
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IntegratorResult {
    pub position: Vector3,
    pub velocity: Vector3,
}

/// Integration method selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum IntegratorKind {
    /// Explicit (forward) Euler
    Euler,
    /// Semi-implicit (symplectic) Euler
    #[default]
    SemiImplicitEuler,
    /// Velocity Verlet
    Verlet,
    /// Runge-Kutta 4 with constant acceleration per step
    Rk4,
}

impl IntegratorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            IntegratorKind::Euler => "euler",
            IntegratorKind::SemiImplicitEuler => "semi-implicit-euler",
            IntegratorKind::Verlet => "verlet",
            IntegratorKind::Rk4 => "rk4",
        }
    }

    /// Parse a configuration key, falling back to semi-implicit Euler
    pub fn from_key(s: &str) -> Self {
        s.parse().unwrap_or_else(|_| {
            log::warn!("Unknown integrator '{}', using semi-implicit-euler", s);
            IntegratorKind::SemiImplicitEuler
        })
    }

    /// Order of accuracy
    pub fn order(&self) -> u8 {
        match self {
            IntegratorKind::Euler | IntegratorKind::SemiImplicitEuler => 1,
            IntegratorKind::Verlet => 2,
            IntegratorKind::Rk4 => 4,
        }
    }

    /// Instantiate the strategy (Verlet gets a fresh history table)
    pub fn build(&self) -> Box<dyn Integrator> {
        match self {
            IntegratorKind::Euler => Box::new(ExplicitEuler),
            IntegratorKind::SemiImplicitEuler => Box::new(SemiImplicitEuler),
            IntegratorKind::Verlet => Box::new(VelocityVerlet::default()),
            IntegratorKind::Rk4 => Box::new(RungeKutta4),
        }
    }
}

impl FromStr for IntegratorKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('_', "-").as_str() {
            "euler" | "explicit-euler" => Ok(IntegratorKind::Euler),
            "semi-implicit-euler" | "symplectic-euler" => Ok(IntegratorKind::SemiImplicitEuler),
            "verlet" | "velocity-verlet" => Ok(IntegratorKind::Verlet),
            "rk4" | "runge-kutta-4" => Ok(IntegratorKind::Rk4),
            other => Err(format!("unknown integrator '{other}'")),
        }
    }
}

impl From<String> for IntegratorKind {
    fn from(s: String) -> Self {
        Self::from_key(&s)
    }
}

impl From<IntegratorKind> for String {
    fn from(kind: IntegratorKind) -> Self {
        kind.as_str().to_string()
    }
}

/// An integration strategy
pub trait Integrator: Send {
    fn kind(&self) -> IntegratorKind;

    fn order(&self) -> u8 {
        self.kind().order()
    }

    /// Advance one body by `dt`
    fn integrate(&mut self, id: &EntityId, state: IntegratorState, dt: f64) -> IntegratorResult;

    /// Drop any per-body history (entity removed)
    fn forget(&mut self, _id: &EntityId) {}

    /// Drop all history (session reset)
    fn reset(&mut self) {}
}

/// Explicit Euler: position advances with the *old* velocity.
///
/// ```text
/// v' = v + a·dt
/// p' = p + v·dt
/// ```
pub struct ExplicitEuler;

impl ExplicitEuler {
    pub fn step(s: IntegratorState, dt: f64) -> IntegratorResult {
        IntegratorResult {
            position: s.position + s.velocity * dt,
            velocity: s.velocity + s.acceleration * dt,
        }
    }
}

impl Integrator for ExplicitEuler {
    fn kind(&self) -> IntegratorKind {
        IntegratorKind::Euler
    }

    fn integrate(&mut self, _id: &EntityId, state: IntegratorState, dt: f64) -> IntegratorResult {
        Self::step(state, dt)
    }
}

/// Semi-implicit Euler: position advances with the *new* velocity.
///
/// ```text
/// v' = v + a·dt
/// p' = p + v'·dt
/// ```
pub struct SemiImplicitEuler;

impl SemiImplicitEuler {
    pub fn step(s: IntegratorState, dt: f64) -> IntegratorResult {
        let velocity = s.velocity + s.acceleration * dt;
        IntegratorResult {
            position: s.position + velocity * dt,
            velocity,
        }
    }
}

impl Integrator for SemiImplicitEuler {
    fn kind(&self) -> IntegratorKind {
        IntegratorKind::SemiImplicitEuler
    }

    fn integrate(&mut self, _id: &EntityId, state: IntegratorState, dt: f64) -> IntegratorResult {
        Self::step(state, dt)
    }
}

/// Velocity Verlet history for a single body
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct VerletBody {
    /// Acceleration sampled on the previous step (zero before the first)
    pub previous_acceleration: Vector3,
}

impl VerletBody {
    /// ```text
    /// p' = p + v·dt + ½·a·dt²
    /// v' = v + ½·(a_prev + a)·dt
    /// ```
    pub fn step(&mut self, s: IntegratorState, dt: f64) -> IntegratorResult {
        let position = s.position + s.velocity * dt + s.acceleration * (0.5 * dt * dt);
        let velocity = s.velocity + (self.previous_acceleration + s.acceleration) * (0.5 * dt);
        self.previous_acceleration = s.acceleration;
        IntegratorResult { position, velocity }
    }
}

/// Velocity Verlet over many bodies, one history entry per entity
#[derive(Debug, Default)]
pub struct VelocityVerlet {
    history: BTreeMap<EntityId, VerletBody>,
}

impl VelocityVerlet {
    /// Previous acceleration recorded for `id`, if it has been integrated
    pub fn previous_acceleration(&self, id: &EntityId) -> Option<Vector3> {
        self.history.get(id).map(|b| b.previous_acceleration)
    }

    pub fn tracked(&self) -> usize {
        self.history.len()
    }
}

impl Integrator for VelocityVerlet {
    fn kind(&self) -> IntegratorKind {
        IntegratorKind::Verlet
    }

    fn integrate(&mut self, id: &EntityId, state: IntegratorState, dt: f64) -> IntegratorResult {
        if let Some(body) = self.history.get_mut(id) {
            return body.step(state, dt);
        }
        let mut body = VerletBody::default();
        let result = body.step(state, dt);
        self.history.insert(id.clone(), body);
        result
    }

    fn forget(&mut self, id: &EntityId) {
        self.history.remove(id);
    }

    fn reset(&mut self) {
        self.history.clear();
    }
}

/// Classic RK4 stage weighting with the acceleration held constant for the
/// whole step.
///
/// Every stage samples the same acceleration, so the result equals
/// `p + v·dt + ½·a·dt²`. This is a known accuracy limitation kept for
/// compatibility with existing step hashes; a true variable-force RK4 would
/// need an acceleration callback per stage.
pub struct RungeKutta4;

impl RungeKutta4 {
    pub fn step(s: IntegratorState, dt: f64) -> IntegratorResult {
        let half = dt * 0.5;

        let k1_v = s.acceleration;
        let k1_p = s.velocity;

        let k2_v = s.acceleration;
        let k2_p = s.velocity + k1_v * half;

        let k3_v = s.acceleration;
        let k3_p = s.velocity + k2_v * half;

        let k4_v = s.acceleration;
        let k4_p = s.velocity + k3_v * dt;

        let sixth = dt / 6.0;
        IntegratorResult {
            position: s.position + (k1_p + (k2_p + k3_p) * 2.0 + k4_p) * sixth,
            velocity: s.velocity + (k1_v + (k2_v + k3_v) * 2.0 + k4_v) * sixth,
        }
    }
}

impl Integrator for RungeKutta4 {
    fn kind(&self) -> IntegratorKind {
        IntegratorKind::Rk4
    }

    fn integrate(&mut self, _id: &EntityId, state: IntegratorState, dt: f64) -> IntegratorResult {
        Self::step(state, dt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [IntegratorKind; 4] = [
        IntegratorKind::Euler,
        IntegratorKind::SemiImplicitEuler,
        IntegratorKind::Verlet,
        IntegratorKind::Rk4,
    ];

    fn state(p: Vector3, v: Vector3, a: Vector3) -> IntegratorState {
        IntegratorState {
            position: p,
            velocity: v,
            acceleration: a,
        }
    }

    #[test]
    fn test_all_integrators_hold_still_at_rest() {
        let id = EntityId::from("body");
        let start = Vector3::new(3.0, -2.0, 7.5);
        for kind in ALL {
            let mut integrator = kind.build();
            let mut s = state(start, Vector3::ZERO, Vector3::ZERO);
            for _ in 0..500 {
                let r = integrator.integrate(&id, s, 1.0 / 60.0);
                s.position = r.position;
                s.velocity = r.velocity;
            }
            assert_eq!(s.position, start, "{} drifted", kind.as_str());
            assert_eq!(s.velocity, Vector3::ZERO);
        }
    }

    #[test]
    fn test_explicit_vs_semi_implicit_position() {
        let s = state(Vector3::ZERO, Vector3::X, Vector3::new(0.0, -10.0, 0.0));
        let explicit = ExplicitEuler::step(s, 0.1);
        let semi = SemiImplicitEuler::step(s, 0.1);

        // Explicit uses the old velocity: no vertical motion yet
        assert_eq!(explicit.position.y, 0.0);
        assert!((semi.position.y - (-0.1)).abs() < 1e-12);
        assert_eq!(explicit.velocity, semi.velocity);
    }

    #[test]
    fn test_verlet_first_step_uses_zero_history() {
        let mut body = VerletBody::default();
        let a = Vector3::new(0.0, -10.0, 0.0);
        let r = body.step(state(Vector3::ZERO, Vector3::ZERO, a), 0.1);
        assert!((r.position.y - (-0.05)).abs() < 1e-12);
        // v' = ½·(0 + a)·dt
        assert!((r.velocity.y - (-0.5)).abs() < 1e-12);
        assert_eq!(body.previous_acceleration, a);

        let r2 = body.step(state(r.position, r.velocity, a), 0.1);
        assert!((r2.velocity.y - (-1.5)).abs() < 1e-12);
    }

    #[test]
    fn test_verlet_history_is_per_entity() {
        let mut verlet = VelocityVerlet::default();
        let a = EntityId::from("a");
        let b = EntityId::from("b");
        let g = Vector3::new(0.0, -10.0, 0.0);

        verlet.integrate(&a, state(Vector3::ZERO, Vector3::ZERO, g), 0.1);
        // b has never been integrated, so its first step must see zero history
        let rb = verlet.integrate(&b, state(Vector3::ZERO, Vector3::ZERO, Vector3::ZERO), 0.1);
        assert_eq!(rb.velocity, Vector3::ZERO);
        assert_eq!(verlet.previous_acceleration(&a), Some(g));
        assert_eq!(verlet.previous_acceleration(&b), Some(Vector3::ZERO));

        verlet.forget(&a);
        assert_eq!(verlet.previous_acceleration(&a), None);
        verlet.reset();
        assert_eq!(verlet.tracked(), 0);
    }

    #[test]
    fn test_rk4_constant_acceleration_matches_closed_form() {
        let s = state(
            Vector3::new(1.0, 2.0, 3.0),
            Vector3::new(4.0, 0.0, -1.0),
            Vector3::new(0.0, -9.81, 2.0),
        );
        let dt = 0.05;
        let r = RungeKutta4::step(s, dt);
        let expected = s.position + s.velocity * dt + s.acceleration * (0.5 * dt * dt);
        assert!((r.position - expected).length() < 1e-12);
        assert!((r.velocity - (s.velocity + s.acceleration * dt)).length() < 1e-12);
    }

    #[test]
    fn test_kind_parsing() {
        assert_eq!(IntegratorKind::from_key("RK4"), IntegratorKind::Rk4);
        assert_eq!(
            IntegratorKind::from_key("semi_implicit_euler"),
            IntegratorKind::SemiImplicitEuler
        );
        assert_eq!(IntegratorKind::from_key("verlet"), IntegratorKind::Verlet);
        assert_eq!(
            IntegratorKind::from_key("nonsense"),
            IntegratorKind::SemiImplicitEuler
        );
        for kind in ALL {
            assert_eq!(kind.as_str().parse::<IntegratorKind>(), Ok(kind));
            assert_eq!(kind.build().kind(), kind);
        }
        assert_eq!(IntegratorKind::Rk4.order(), 4);
    }
}
