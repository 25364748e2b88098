//! Entities and their physical properties
//!
//! Entity kinds are a closed set; the only behavioural differences between
//! them are flags (hovering drones ignore vertical gravity, obstacles never
//! move), so dispatch is a `match` on the kind.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::aabb::Aabb;
use crate::math::{Transform, Vector3};

/// Stable, sortable entity identity
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(String);

impl EntityId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EntityId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for EntityId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Entity kind with its kind-specific parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum EntityKind {
    /// Multirotor; hovering drones are not pulled down by gravity
    Drone { hover: bool },
    Robot,
    /// Wheeled vehicle
    Vehicle { wheel_base: f64 },
    Pedestrian,
    /// Static box-shaped obstacle
    Obstacle { half_extents: Vector3 },
}

impl EntityKind {
    /// A hovering drone
    pub const DRONE: Self = EntityKind::Drone { hover: true };
    /// A passenger car with a 2.7 m wheel base
    pub const VEHICLE: Self = EntityKind::Vehicle { wheel_base: 2.7 };

    pub fn name(&self) -> &'static str {
        match self {
            EntityKind::Drone { .. } => "drone",
            EntityKind::Robot => "robot",
            EntityKind::Vehicle { .. } => "vehicle",
            EntityKind::Pedestrian => "pedestrian",
            EntityKind::Obstacle { .. } => "obstacle",
        }
    }

    /// Static entities are never integrated and have infinite mass
    pub fn is_static(&self) -> bool {
        matches!(self, EntityKind::Obstacle { .. })
    }

    /// Hovering entities ignore the vertical gravity component
    pub fn hovers(&self) -> bool {
        matches!(self, EntityKind::Drone { hover: true })
    }

    /// Factory defaults for this kind
    pub fn default_properties(&self) -> PhysicalProperties {
        match self {
            EntityKind::Drone { .. } => PhysicalProperties {
                mass: 1.5,
                friction: 0.3,
                restitution: 0.5,
                collision_radius: 0.5,
                max_velocity: 20.0,
                max_acceleration: 10.0,
            },
            EntityKind::Robot => PhysicalProperties {
                mass: 50.0,
                friction: 0.6,
                restitution: 0.2,
                collision_radius: 0.6,
                max_velocity: 3.0,
                max_acceleration: 2.0,
            },
            EntityKind::Vehicle { .. } => PhysicalProperties {
                mass: 1500.0,
                friction: 0.8,
                restitution: 0.1,
                collision_radius: 2.5,
                max_velocity: 40.0,
                max_acceleration: 5.0,
            },
            EntityKind::Pedestrian => PhysicalProperties {
                mass: 70.0,
                friction: 0.7,
                restitution: 0.1,
                collision_radius: 0.3,
                max_velocity: 2.5,
                max_acceleration: 1.5,
            },
            EntityKind::Obstacle { half_extents } => PhysicalProperties {
                mass: 0.0,
                friction: 0.9,
                restitution: 0.3,
                collision_radius: half_extents.length(),
                max_velocity: 0.0,
                max_acceleration: 0.0,
            },
        }
    }
}

/// Motion status, updated every tick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityStatus {
    #[default]
    Idle,
    Moving,
    Collision,
    Disabled,
}

/// Mass, surface and motion limits of an entity
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PhysicalProperties {
    /// Mass in kg; zero or less means immovable
    pub mass: f64,
    pub friction: f64,
    pub restitution: f64,
    /// Bounding sphere radius
    pub collision_radius: f64,
    pub max_velocity: f64,
    pub max_acceleration: f64,
}

/// A simulated body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub id: EntityId,
    pub kind: EntityKind,
    pub transform: Transform,
    pub velocity: Vector3,
    /// Stored and reported only; rotation is not integrated
    pub angular_velocity: Vector3,
    /// Commanded acceleration (gravity is added by the tick)
    pub acceleration: Vector3,
    pub status: EntityStatus,
    pub properties: PhysicalProperties,
}

impl Entity {
    /// Create an entity at rest with the kind's default properties
    pub fn new(id: EntityId, kind: EntityKind, position: Vector3) -> Self {
        Self {
            id,
            kind,
            transform: Transform::from_position(position),
            velocity: Vector3::ZERO,
            angular_velocity: Vector3::ZERO,
            acceleration: Vector3::ZERO,
            status: EntityStatus::Idle,
            properties: kind.default_properties(),
        }
    }

    pub fn with_velocity(mut self, velocity: Vector3) -> Self {
        self.velocity = velocity;
        self
    }

    pub fn with_properties(mut self, properties: PhysicalProperties) -> Self {
        self.properties = properties;
        self
    }

    pub fn with_radius(mut self, radius: f64) -> Self {
        self.properties.collision_radius = radius;
        self
    }

    #[inline]
    pub fn position(&self) -> Vector3 {
        self.transform.position
    }

    pub fn is_static(&self) -> bool {
        self.kind.is_static()
    }

    pub fn is_disabled(&self) -> bool {
        self.status == EntityStatus::Disabled
    }

    /// Inverse mass, zero for static or massless entities
    pub fn inverse_mass(&self) -> f64 {
        if self.is_static() || self.properties.mass <= 0.0 {
            0.0
        } else {
            1.0 / self.properties.mass
        }
    }

    /// Broadphase bounds: the obstacle box, or the collision sphere's box
    pub fn aabb(&self) -> Aabb {
        match self.kind {
            EntityKind::Obstacle { half_extents } => {
                Aabb::from_center_half_extents(self.position(), half_extents)
            }
            _ => Aabb::from_center_radius(self.position(), self.properties.collision_radius),
        }
    }
}
