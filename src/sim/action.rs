//! Action commands applied at the start of a tick
//!
//! Actions only touch velocity. Kinds without an implementation are accepted
//! and logged so that recorded action streams stay replayable.

use log::debug;
use serde::{Deserialize, Serialize};

use super::entity::{Entity, EntityId};
use crate::math::Vector3;

/// Command payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ActionKind {
    /// Head straight for `target` at `speed` (default: the entity's max velocity)
    MoveTo {
        target: Vector3,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        speed: Option<f64>,
    },
    SetVelocity { velocity: Vector3 },
    Stop,
    /// Not implemented yet
    FollowPath { waypoints: Vec<Vector3> },
    SetAcceleration { acceleration: Vector3 },
    ApplyForce { force: Vector3 },
    ApplyTorque { torque: Vector3 },
    Custom {
        name: String,
        #[serde(default)]
        payload: serde_json::Value,
    },
}

impl ActionKind {
    pub fn name(&self) -> &'static str {
        match self {
            ActionKind::MoveTo { .. } => "move_to",
            ActionKind::SetVelocity { .. } => "set_velocity",
            ActionKind::Stop => "stop",
            ActionKind::FollowPath { .. } => "follow_path",
            ActionKind::SetAcceleration { .. } => "set_acceleration",
            ActionKind::ApplyForce { .. } => "apply_force",
            ActionKind::ApplyTorque { .. } => "apply_torque",
            ActionKind::Custom { .. } => "custom",
        }
    }
}

/// A command addressed to one entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    pub entity_id: EntityId,
    #[serde(flatten)]
    pub kind: ActionKind,
    /// Caller-side timestamp; carried for replay logs, not used by the tick
    #[serde(default)]
    pub timestamp: f64,
}

impl Action {
    pub fn new(entity_id: impl Into<EntityId>, kind: ActionKind) -> Self {
        Self {
            entity_id: entity_id.into(),
            kind,
            timestamp: 0.0,
        }
    }

    pub fn with_timestamp(mut self, timestamp: f64) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn move_to(entity_id: impl Into<EntityId>, target: Vector3) -> Self {
        Self::new(entity_id, ActionKind::MoveTo { target, speed: None })
    }

    pub fn set_velocity(entity_id: impl Into<EntityId>, velocity: Vector3) -> Self {
        Self::new(entity_id, ActionKind::SetVelocity { velocity })
    }

    pub fn stop(entity_id: impl Into<EntityId>) -> Self {
        Self::new(entity_id, ActionKind::Stop)
    }

    /// Apply to `entity`; returns whether anything changed.
    ///
    /// Disabled entities ignore every action.
    pub fn apply(&self, entity: &mut Entity) -> bool {
        if entity.is_disabled() {
            return false;
        }
        match &self.kind {
            ActionKind::MoveTo { target, speed } => {
                let speed = speed.unwrap_or(entity.properties.max_velocity);
                let direction = (*target - entity.position()).normalize_or_zero();
                entity.velocity = direction * speed;
                true
            }
            ActionKind::SetVelocity { velocity } => {
                entity.velocity = *velocity;
                true
            }
            ActionKind::Stop => {
                entity.velocity = Vector3::ZERO;
                true
            }
            ActionKind::FollowPath { waypoints } => {
                debug!(
                    "follow_path for {} ignored ({} waypoints): not implemented",
                    entity.id,
                    waypoints.len()
                );
                false
            }
            ActionKind::SetAcceleration { .. }
            | ActionKind::ApplyForce { .. }
            | ActionKind::ApplyTorque { .. }
            | ActionKind::Custom { .. } => {
                debug!("{} for {} ignored: reserved action", self.kind.name(), entity.id);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::entity::{EntityKind, EntityStatus};

    fn drone() -> Entity {
        Entity::new("d".into(), EntityKind::DRONE, Vector3::ZERO)
    }

    #[test]
    fn test_move_to_uses_max_velocity_by_default() {
        let mut e = drone();
        assert!(Action::move_to("d", Vector3::new(10.0, 0.0, 0.0)).apply(&mut e));
        assert_eq!(e.velocity, Vector3::new(20.0, 0.0, 0.0));

        let action = Action::new(
            "d",
            ActionKind::MoveTo {
                target: Vector3::new(0.0, -5.0, 0.0),
                speed: Some(2.0),
            },
        );
        action.apply(&mut e);
        assert_eq!(e.velocity, Vector3::new(0.0, -2.0, 0.0));
    }

    #[test]
    fn test_move_to_current_position_stops() {
        let mut e = drone().with_velocity(Vector3::ONE);
        Action::move_to("d", Vector3::ZERO).apply(&mut e);
        assert_eq!(e.velocity, Vector3::ZERO);
    }

    #[test]
    fn test_reserved_and_unimplemented_are_noops() {
        let mut e = drone().with_velocity(Vector3::X);
        let kinds = [
            ActionKind::FollowPath {
                waypoints: vec![Vector3::ONE],
            },
            ActionKind::ApplyForce { force: Vector3::Y },
            ActionKind::Custom {
                name: "wave".into(),
                payload: serde_json::Value::Null,
            },
        ];
        for kind in kinds {
            assert!(!Action::new("d", kind).apply(&mut e));
        }
        assert_eq!(e.velocity, Vector3::X);
    }

    #[test]
    fn test_disabled_entity_ignores_actions() {
        let mut e = drone();
        e.status = EntityStatus::Disabled;
        assert!(!Action::set_velocity("d", Vector3::ONE).apply(&mut e));
        assert_eq!(e.velocity, Vector3::ZERO);
    }

    #[test]
    fn test_wire_format() {
        let json = serde_json::to_string(&Action::stop("robot-1")).unwrap();
        assert_eq!(json, r#"{"entity_id":"robot-1","type":"stop","timestamp":0.0}"#);
        let parsed: Action = serde_json::from_str(
            r#"{"entity_id":"d","type":"set_velocity","velocity":[1.0,0.0,0.0]}"#,
        )
        .unwrap();
        assert_eq!(parsed, Action::set_velocity("d", Vector3::X));
    }
}
