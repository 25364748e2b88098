//! Vector/quaternion math kernel
//!
//! Thin layer over `glam`'s double-precision types. All values are `Copy`, so
//! every operation hands back a new value; nothing is mutated across
//! ownership boundaries. Double precision keeps trajectories comparable with
//! reproducibility records produced by other runs.

use glam::{DQuat, DVec3};
use serde::{Deserialize, Serialize};

/// 3D vector used for positions, velocities and accelerations
pub type Vector3 = DVec3;
/// Unit rotation quaternion
pub type Quaternion = DQuat;

/// Build a vector from a `[x, y, z]` array
#[inline]
pub fn vec3(a: [f64; 3]) -> Vector3 {
    DVec3::from_array(a)
}

/// Build a rotation from `[x, y, z, w]`, normalizing it.
///
/// A zero quaternion has no meaningful direction and maps to identity.
pub fn quat(a: [f64; 4]) -> Quaternion {
    let q = DQuat::from_xyzw(a[0], a[1], a[2], a[3]);
    if q.length_squared() == 0.0 {
        DQuat::IDENTITY
    } else {
        q.normalize()
    }
}

/// Spherical interpolation between two rotations (renormalized)
#[inline]
pub fn slerp(a: Quaternion, b: Quaternion, t: f64) -> Quaternion {
    a.slerp(b, t).normalize()
}

/// Component-wise NaN test
#[inline]
pub fn has_nan(v: Vector3) -> bool {
    v.x.is_nan() || v.y.is_nan() || v.z.is_nan()
}

/// Clamp a vector's length to `max` (no-op for shorter vectors)
#[inline]
pub fn clamp_length(v: Vector3, max: f64) -> Vector3 {
    let len_sq = v.length_squared();
    if len_sq > max * max && len_sq > 0.0 {
        v * (max / len_sq.sqrt())
    } else {
        v
    }
}

/// Raw IEEE-754 bits of each component, for hashing
#[inline]
pub fn bits(v: Vector3) -> [u64; 3] {
    [v.x.to_bits(), v.y.to_bits(), v.z.to_bits()]
}

/// Position, rotation and scale of an entity
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    pub position: Vector3,
    pub rotation: Quaternion,
    pub scale: Vector3,
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Transform {
    pub const IDENTITY: Self = Self {
        position: DVec3::ZERO,
        rotation: DQuat::IDENTITY,
        scale: DVec3::ONE,
    };

    pub fn new(position: Vector3, rotation: Quaternion, scale: Vector3) -> Self {
        Self {
            position,
            rotation: rotation.normalize(),
            scale,
        }
    }

    pub fn from_position(position: Vector3) -> Self {
        Self {
            position,
            ..Self::IDENTITY
        }
    }

    /// Map a local-space point into world space (scale, rotate, translate)
    pub fn transform_point(&self, local: Vector3) -> Vector3 {
        self.position + self.rotation * (local * self.scale)
    }

    /// Compose rotation with `delta`, keeping the result normalized
    pub fn rotate(&mut self, delta: Quaternion) {
        self.rotation = (delta * self.rotation).normalize();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::FRAC_PI_2;

    #[test]
    fn test_quat_normalizes_and_handles_zero() {
        let q = quat([0.0, 0.0, 2.0, 0.0]);
        assert!((q.length() - 1.0).abs() < 1e-12);
        assert_eq!(quat([0.0; 4]), DQuat::IDENTITY);
    }

    #[test]
    fn test_clamp_length() {
        let v = clamp_length(Vector3::new(30.0, 40.0, 0.0), 5.0);
        assert!((v.length() - 5.0).abs() < 1e-12);
        assert!((v.x - 3.0).abs() < 1e-12);

        let short = Vector3::new(1.0, 0.0, 0.0);
        assert_eq!(clamp_length(short, 5.0), short);
        assert_eq!(clamp_length(Vector3::ZERO, 0.0), Vector3::ZERO);
    }

    #[test]
    fn test_transform_point() {
        let t = Transform::new(
            Vector3::new(1.0, 0.0, 0.0),
            DQuat::from_axis_angle(DVec3::Z, FRAC_PI_2),
            Vector3::ONE,
        );
        // (1,0,0) rotated 90° about Z is (0,1,0), then translated by (1,0,0)
        let p = t.transform_point(Vector3::X);
        assert!((p.x - 1.0).abs() < 1e-12);
        assert!((p.y - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_slerp_halfway() {
        let a = DQuat::IDENTITY;
        let b = DQuat::from_axis_angle(DVec3::Y, FRAC_PI_2);
        let mid = slerp(a, b, 0.5);
        let expected = DQuat::from_axis_angle(DVec3::Y, FRAC_PI_2 / 2.0);
        assert!(mid.abs_diff_eq(expected, 1e-12));
    }

    #[test]
    fn test_has_nan() {
        assert!(has_nan(Vector3::new(0.0, f64::NAN, 0.0)));
        assert!(!has_nan(Vector3::new(f64::INFINITY, 0.0, 0.0)));
    }
}
