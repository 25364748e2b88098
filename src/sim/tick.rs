//! Fixed timestep simulation tick
//!
//! Core loop that advances a session deterministically. Every phase walks the
//! registry in id order, so no result depends on insertion order.

use log::debug;
use serde::{Deserialize, Serialize};

use super::action::Action;
use super::broad::CollisionPair;
use super::clock::state_hash;
use super::contact::{ContactBody, ContactEvent, ContactPoint, resolve_contact};
use super::entity::{Entity, EntityKind, EntityStatus};
use super::integrator::IntegratorState;
use super::narrow::{Contact, sphere_vs_aabb, sphere_vs_sphere};
use super::stability::check_stability;
use super::state::Simulation;
use crate::error::{Result, SimError};
use crate::math::{Vector3, clamp_length};

/// Something observable that happened during a tick
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SimEvent {
    /// A narrowphase contact was resolved
    Collision {
        step: u64,
        pair: CollisionPair,
        penetration: f64,
        impulse: f64,
    },
    /// A pair started, kept or stopped touching
    Contact(ContactEvent),
}

/// Advance `sim` by one fixed timestep.
///
/// On a stability failure the session keeps the partially advanced state and
/// the step counter is not bumped; callers are expected to `reset`.
pub(super) fn tick(sim: &mut Simulation, actions: &[Action]) -> Result<()> {
    if let Some(limit) = sim.config.max_steps.filter(|&limit| sim.step >= limit) {
        return Err(SimError::StepLimit { limit });
    }

    let step = sim.step + 1;
    let dt = sim.config.fixed_timestep;
    sim.events.clear();

    apply_actions(sim, actions);
    integrate(sim, dt);
    confine_to_bounds(sim);
    damp_and_classify(sim);

    // Diverged state must not reach the broadphase
    if sim.config.strict {
        check_stability(step, sim.entities.values(), &sim.config.stability)?;
    }

    if sim.config.collisions {
        collide(sim, step);
    }

    sim.step = step;

    if sim.config.record_step_hashes {
        sim.recorder.record(state_hash(step, sim.entities.values()));
    }
    Ok(())
}

/// Actions in the given order; unknown ids are skipped
fn apply_actions(sim: &mut Simulation, actions: &[Action]) {
    for action in actions {
        match sim.entities.get_mut(&action.entity_id) {
            Some(entity) => {
                action.apply(entity);
            }
            None => debug!(
                "Skipping {} for unknown entity {}",
                action.kind.name(),
                action.entity_id
            ),
        }
    }
}

fn is_simulated(entity: &Entity) -> bool {
    !entity.is_disabled() && !entity.is_static()
}

/// Gravity plus the commanded acceleration (capped per entity)
fn total_acceleration(entity: &Entity, gravity: Vector3) -> Vector3 {
    let gravity = if entity.kind.hovers() {
        Vector3::new(gravity.x, 0.0, gravity.z)
    } else {
        gravity
    };
    gravity + clamp_length(entity.acceleration, entity.properties.max_acceleration)
}

fn integrate(sim: &mut Simulation, dt: f64) {
    let gravity = sim.config.gravity;
    for entity in sim.entities.values_mut().filter(|e| is_simulated(e)) {
        let state = IntegratorState {
            position: entity.position(),
            velocity: entity.velocity,
            acceleration: total_acceleration(entity, gravity),
        };
        let result = sim.integrator.integrate(&entity.id, state, dt);
        entity.transform.position = result.position;
        entity.velocity = result.velocity;
    }
}

/// Clamp positions into the world box, killing velocity into the wall
fn confine_to_bounds(sim: &mut Simulation) {
    let bounds = sim.config.bounds;
    for entity in sim.entities.values_mut().filter(|e| is_simulated(e)) {
        let p = &mut entity.transform.position;
        for axis in 0..3 {
            if p[axis] < bounds.min[axis] {
                p[axis] = bounds.min[axis];
                entity.velocity[axis] = 0.0;
            } else if p[axis] > bounds.max[axis] {
                p[axis] = bounds.max[axis];
                entity.velocity[axis] = 0.0;
            }
        }
    }
}

fn damp_and_classify(sim: &mut Simulation) {
    let damping = sim.config.damping;
    let rest = sim.config.rest_threshold;
    for entity in sim.entities.values_mut() {
        if entity.is_disabled() {
            continue;
        }
        if !entity.is_static() {
            entity.velocity = clamp_length(entity.velocity * damping, entity.properties.max_velocity);
        }
        entity.status = if entity.velocity.length_squared() > rest {
            EntityStatus::Moving
        } else {
            EntityStatus::Idle
        };
    }
}

/// Exact test for a candidate pair, normal pointing from `a` to `b`
fn narrowphase(a: &Entity, b: &Entity) -> Option<Contact> {
    match (a.kind, b.kind) {
        (EntityKind::Obstacle { .. }, EntityKind::Obstacle { .. }) => None,
        (EntityKind::Obstacle { .. }, _) => {
            sphere_vs_aabb(b.position(), b.properties.collision_radius, &a.aabb()).map(|c| {
                Contact {
                    normal: -c.normal,
                    ..c
                }
            })
        }
        (_, EntityKind::Obstacle { .. }) => {
            sphere_vs_aabb(a.position(), a.properties.collision_radius, &b.aabb())
        }
        _ => sphere_vs_sphere(
            a.position(),
            a.properties.collision_radius,
            b.position(),
            b.properties.collision_radius,
        ),
    }
}

fn write_back(entity: &mut Entity, body: &ContactBody) {
    if entity.is_static() {
        return;
    }
    entity.transform.position = body.position;
    entity.velocity = body.velocity;
    entity.status = EntityStatus::Collision;
}

fn collide(sim: &mut Simulation, step: u64) {
    for entity in sim.entities.values() {
        if entity.is_disabled() {
            sim.broadphase.remove(&entity.id);
        } else {
            sim.broadphase.update(entity.id.clone(), entity.aabb());
        }
    }

    let candidates = sim.broadphase.query_pairs();
    sim.contacts.begin_tick();

    for pair in candidates.pairs {
        let (Some(a), Some(b)) = (sim.entities.get(&pair.a), sim.entities.get(&pair.b)) else {
            continue;
        };
        let Some(contact) = narrowphase(a, b) else {
            continue;
        };

        let mut body_a = ContactBody::from_entity(a);
        let mut body_b = ContactBody::from_entity(b);
        let impulse = resolve_contact(&mut body_a, &mut body_b, &contact, &sim.config.contact);

        if let Some(a) = sim.entities.get_mut(&pair.a) {
            write_back(a, &body_a);
        }
        if let Some(b) = sim.entities.get_mut(&pair.b) {
            write_back(b, &body_b);
        }

        sim.contacts.add_contact(
            pair.clone(),
            ContactPoint {
                position: contact.point,
                normal: contact.normal,
                penetration: contact.penetration,
                impulse: impulse.normal,
            },
        );
        sim.total_collisions += 1;
        sim.events.push(SimEvent::Collision {
            step,
            pair,
            penetration: contact.penetration,
            impulse: impulse.normal,
        });
    }

    let lifecycle = sim.contacts.end_tick(step);
    sim.events.extend(lifecycle.into_iter().map(SimEvent::Contact));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::SimConfig;
    use crate::sim::aabb::Aabb;
    use crate::sim::broad::BroadPhaseKind;
    use crate::sim::contact::ContactEventKind;

    fn zero_g() -> SimConfig {
        SimConfig {
            gravity: Vector3::ZERO,
            ..SimConfig::default()
        }
    }

    #[test]
    fn test_hovering_drone_ignores_gravity() {
        let mut sim = Simulation::new(SimConfig::default()).unwrap();
        let hover = sim.spawn(EntityKind::DRONE, Vector3::new(0.0, 50.0, 0.0));
        let fall = sim.spawn(EntityKind::Drone { hover: false }, Vector3::new(10.0, 50.0, 0.0));
        sim.step(&[]).unwrap();

        assert_eq!(sim.entity(&hover).unwrap().position().y, 50.0);
        let falling = sim.entity(&fall).unwrap();
        assert!(falling.position().y < 50.0);
        assert!(falling.velocity.y < 0.0);
    }

    #[test]
    fn test_actions_apply_then_damp() {
        let mut sim = Simulation::new(zero_g()).unwrap();
        let id = sim.spawn(EntityKind::Robot, Vector3::ZERO);
        let snapshot = sim
            .step(&[
                Action::set_velocity(id.clone(), Vector3::new(2.0, 0.0, 0.0)),
                Action::stop("ghost"),
            ])
            .unwrap();

        let robot = sim.entity(&id).unwrap();
        assert!((robot.velocity.x - 2.0 * 0.99).abs() < 1e-12);
        assert_eq!(robot.status, EntityStatus::Moving);
        assert_eq!(snapshot.step, 1);

        sim.step(&[Action::stop(id.clone())]).unwrap();
        assert_eq!(sim.entity(&id).unwrap().status, EntityStatus::Idle);
    }

    #[test]
    fn test_velocity_clamped_to_max() {
        let mut sim = Simulation::new(zero_g()).unwrap();
        let id = sim.spawn(EntityKind::Pedestrian, Vector3::ZERO);
        sim.step(&[Action::set_velocity(id.clone(), Vector3::new(100.0, 0.0, 0.0))])
            .unwrap();
        let speed = sim.entity(&id).unwrap().velocity.length();
        assert!((speed - 2.5).abs() < 1e-12);
    }

    #[test]
    fn test_world_bounds_confine() {
        let config = SimConfig {
            bounds: Aabb::from_center_radius(Vector3::ZERO, 1.0),
            ..zero_g()
        };
        let mut sim = Simulation::new(config).unwrap();
        let id = sim.spawn(EntityKind::DRONE, Vector3::new(0.99, 0.0, 0.0));
        sim.step(&[Action::set_velocity(id.clone(), Vector3::new(10.0, 0.0, 0.0))])
            .unwrap();
        let drone = sim.entity(&id).unwrap();
        assert_eq!(drone.position().x, 1.0);
        assert_eq!(drone.velocity.x, 0.0);
    }

    #[test]
    fn test_overlapping_drones_collide_and_separate() {
        let mut sim = Simulation::new(zero_g()).unwrap();
        let a = Entity::new("a".into(), EntityKind::DRONE, Vector3::new(0.0, 50.0, 0.0))
            .with_radius(2.5)
            .with_velocity(Vector3::new(1.0, 0.0, 0.0));
        let b = Entity::new("b".into(), EntityKind::DRONE, Vector3::new(3.0, 50.0, 0.0))
            .with_radius(2.5)
            .with_velocity(Vector3::new(-1.0, 0.0, 0.0));
        sim.add_entities([a, b]).unwrap();

        sim.step(&[]).unwrap();
        assert_eq!(sim.total_collisions(), 1);
        let a = sim.entity(&"a".into()).unwrap();
        let b = sim.entity(&"b".into()).unwrap();
        assert_eq!(a.status, EntityStatus::Collision);
        assert!(a.velocity.x < 0.0 && b.velocity.x > 0.0);
        assert!(b.position().x - a.position().x > 3.0);

        let kinds: Vec<_> = sim
            .events()
            .iter()
            .filter_map(|e| match e {
                SimEvent::Contact(c) => Some(c.kind),
                _ => None,
            })
            .collect();
        assert_eq!(kinds, vec![ContactEventKind::Enter]);
    }

    #[test]
    fn test_drone_bounces_off_obstacle() {
        let mut sim = Simulation::new(zero_g()).unwrap();
        sim.add_entity(Entity::new(
            "wall".into(),
            EntityKind::Obstacle {
                half_extents: Vector3::new(0.5, 5.0, 5.0),
            },
            Vector3::new(1.0, 0.0, 0.0),
        ))
        .unwrap();
        sim.add_entity(
            Entity::new("drone".into(), EntityKind::DRONE, Vector3::ZERO)
                .with_velocity(Vector3::new(3.0, 0.0, 0.0)),
        )
        .unwrap();

        sim.step(&[]).unwrap();
        let drone = sim.entity(&"drone".into()).unwrap();
        assert!(drone.velocity.x < 0.0);
        let wall = sim.entity(&"wall".into()).unwrap();
        assert_eq!(wall.position(), Vector3::new(1.0, 0.0, 0.0));
        assert_eq!(wall.status, EntityStatus::Idle);
    }

    #[test]
    fn test_step_limit() {
        let config = SimConfig {
            max_steps: Some(2),
            ..SimConfig::default()
        };
        let mut sim = Simulation::new(config).unwrap();
        sim.step(&[]).unwrap();
        sim.step(&[]).unwrap();
        assert!(matches!(sim.step(&[]), Err(SimError::StepLimit { limit: 2 })));
        assert_eq!(sim.step_count(), 2);
    }

    #[test]
    fn test_strict_mode_surfaces_nan() {
        let config = SimConfig {
            strict: true,
            ..zero_g()
        };
        let mut sim = Simulation::new(config).unwrap();
        let id = sim.spawn(EntityKind::Robot, Vector3::ZERO);
        let err = sim
            .step(&[Action::set_velocity(id, Vector3::new(f64::NAN, 0.0, 0.0))])
            .unwrap_err();
        assert!(err.is_divergence());
        assert_eq!(sim.step_count(), 0);
    }

    fn nan_crowd(strict: bool, broadphase: BroadPhaseKind) -> (Simulation, Vec<Action>) {
        let config = SimConfig {
            strict,
            broadphase,
            ..zero_g()
        };
        let mut sim = Simulation::new(config).unwrap();
        let mut actions = Vec::new();
        for i in 0..200 {
            let id = sim.spawn(EntityKind::Robot, Vector3::new(i as f64, 0.0, 0.0));
            if i % 7 == 0 {
                actions.push(Action::set_velocity(id, Vector3::new(f64::NAN, 0.0, 0.0)));
            }
        }
        (sim, actions)
    }

    #[test]
    fn test_strict_nan_crowd_errors_for_every_broadphase() {
        for kind in [
            BroadPhaseKind::BruteForce,
            BroadPhaseKind::SpatialHash,
            BroadPhaseKind::SweepAndPrune,
        ] {
            let (mut sim, actions) = nan_crowd(true, kind);
            let err = sim.step(&actions).unwrap_err();
            assert!(
                matches!(err, SimError::NonFinite { .. }),
                "{}: {err}",
                kind.as_str()
            );
            assert_eq!(sim.step_count(), 0);
            assert_eq!(sim.total_collisions(), 0);
        }
    }

    #[test]
    fn test_lenient_nan_crowd_keeps_stepping() {
        let (mut sim, actions) = nan_crowd(false, BroadPhaseKind::SweepAndPrune);
        sim.step(&actions).unwrap();
        sim.step(&[]).unwrap();
        assert_eq!(sim.step_count(), 2);
    }

    #[test]
    fn test_disabled_entity_is_frozen() {
        let mut sim = Simulation::new(SimConfig::default()).unwrap();
        let id = sim.spawn(EntityKind::Robot, Vector3::new(0.0, 10.0, 0.0));
        sim.set_disabled(&id, true);
        sim.step(&[Action::set_velocity(id.clone(), Vector3::X)]).unwrap();
        let robot = sim.entity(&id).unwrap();
        assert_eq!(robot.position(), Vector3::new(0.0, 10.0, 0.0));
        assert_eq!(robot.status, EntityStatus::Disabled);
    }
}
