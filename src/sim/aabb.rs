//! Axis-aligned bounding boxes
//!
//! Derived each tick from an entity's position and extent; never ground truth.

use serde::{Deserialize, Serialize};

use crate::consts::WORLD_HALF_EXTENT;
use crate::math::Vector3;

/// Axis-aligned bounding box in world coordinates.
///
/// `min` should not exceed `max` on any axis; `is_valid` checks it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Aabb {
    pub min: Vector3,
    pub max: Vector3,
}

impl Aabb {
    pub fn new(min: Vector3, max: Vector3) -> Self {
        Self { min, max }
    }

    pub fn from_center_half_extents(center: Vector3, half_extents: Vector3) -> Self {
        Self {
            min: center - half_extents,
            max: center + half_extents,
        }
    }

    /// Box enclosing a sphere
    pub fn from_center_radius(center: Vector3, radius: f64) -> Self {
        Self::from_center_half_extents(center, Vector3::splat(radius))
    }

    /// Default world bounds (a cube of half-size `WORLD_HALF_EXTENT`)
    pub fn default_world() -> Self {
        Self::from_center_radius(Vector3::ZERO, WORLD_HALF_EXTENT)
    }

    pub fn is_valid(&self) -> bool {
        self.min.is_finite()
            && self.max.is_finite()
            && self.min.x <= self.max.x
            && self.min.y <= self.max.y
            && self.min.z <= self.max.z
    }

    pub fn center(&self) -> Vector3 {
        (self.min + self.max) * 0.5
    }

    pub fn half_extents(&self) -> Vector3 {
        (self.max - self.min) * 0.5
    }

    /// Overlap test, inclusive on faces so touching boxes pair up
    #[inline]
    pub fn overlaps(&self, other: &Self) -> bool {
        self.min.x <= other.max.x
            && self.max.x >= other.min.x
            && self.min.y <= other.max.y
            && self.max.y >= other.min.y
            && self.min.z <= other.max.z
            && self.max.z >= other.min.z
    }

    /// Point containment, inclusive on faces
    pub fn contains_point(&self, p: Vector3) -> bool {
        p.x >= self.min.x
            && p.x <= self.max.x
            && p.y >= self.min.y
            && p.y <= self.max.y
            && p.z >= self.min.z
            && p.z <= self.max.z
    }

    /// Closest point inside the box to `p`
    pub fn closest_point(&self, p: Vector3) -> Vector3 {
        p.max(self.min).min(self.max)
    }

    pub fn union(&self, other: &Self) -> Self {
        Self {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    pub fn expanded(&self, margin: f64) -> Self {
        Self {
            min: self.min - Vector3::splat(margin),
            max: self.max + Vector3::splat(margin),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cube(x: f64, y: f64, z: f64, h: f64) -> Aabb {
        Aabb::from_center_radius(Vector3::new(x, y, z), h)
    }

    #[test]
    fn test_overlap_inclusive_on_faces() {
        let a = cube(0.0, 0.0, 0.0, 1.0);
        assert!(a.overlaps(&cube(2.0, 0.0, 0.0, 1.0)));
        assert!(!a.overlaps(&cube(2.001, 0.0, 0.0, 1.0)));
        assert!(!a.overlaps(&cube(0.0, 0.0, 5.0, 1.0)));
    }

    #[test]
    fn test_closest_point_and_contains() {
        let a = cube(0.0, 0.0, 0.0, 1.0);
        assert_eq!(a.closest_point(Vector3::new(5.0, 0.5, -3.0)), Vector3::new(1.0, 0.5, -1.0));
        assert!(a.contains_point(Vector3::new(1.0, 1.0, 1.0)));
        assert!(!a.contains_point(Vector3::new(1.1, 0.0, 0.0)));
    }

    #[test]
    fn test_union_and_validity() {
        let u = cube(0.0, 0.0, 0.0, 1.0).union(&cube(4.0, 0.0, 0.0, 1.0));
        assert_eq!(u.min, Vector3::new(-1.0, -1.0, -1.0));
        assert_eq!(u.max, Vector3::new(5.0, 1.0, 1.0));
        assert_eq!(u.center(), Vector3::new(2.0, 0.0, 0.0));
        assert!(u.is_valid());
        assert!(!Aabb::new(Vector3::ONE, Vector3::ZERO).is_valid());
        assert!(Aabb::default_world().is_valid());
    }
}
