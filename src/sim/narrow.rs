//! Narrowphase intersection tests and ray casts
//!
//! Every test returns `None` when the shapes are apart or only touching, and
//! otherwise a [`Contact`] whose normal points from the first shape towards
//! the second. Penetration is always positive.

use crate::math::Vector3;
use crate::sim::aabb::Aabb;

/// Direction components smaller than this are treated as parallel to a slab
const PARALLEL_EPSILON: f64 = 1e-12;

/// Result of an overlapping shape pair
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Contact {
    /// World-space contact point
    pub point: Vector3,
    /// Unit normal from the first shape to the second
    pub normal: Vector3,
    /// Overlap depth along `normal`
    pub penetration: f64,
}

/// Nearest ray intersection
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayHit {
    /// Distance along the normalized ray direction
    pub t: f64,
    pub point: Vector3,
    /// Surface normal at the hit point
    pub normal: Vector3,
}

/// Sphere/sphere test.
///
/// Coincident centres have no meaningful direction; +Y is used so the
/// result is still deterministic.
pub fn sphere_vs_sphere(
    center_a: Vector3,
    radius_a: f64,
    center_b: Vector3,
    radius_b: f64,
) -> Option<Contact> {
    let delta = center_b - center_a;
    let distance = delta.length();
    let radius_sum = radius_a + radius_b;
    if distance >= radius_sum {
        return None;
    }

    let normal = if distance > 0.0 {
        delta / distance
    } else {
        Vector3::Y
    };
    let penetration = radius_sum - distance;
    Some(Contact {
        point: center_a + normal * (radius_a - penetration * 0.5),
        normal,
        penetration,
    })
}

/// AABB/AABB test along the axis of least overlap.
///
/// Ties between axes resolve to X, then Y, then Z.
pub fn aabb_vs_aabb(a: &Aabb, b: &Aabb) -> Option<Contact> {
    let overlap = a.max.min(b.max) - a.min.max(b.min);
    if overlap.x <= 0.0 || overlap.y <= 0.0 || overlap.z <= 0.0 {
        return None;
    }

    let separation = b.center() - a.center();
    let (axis, penetration, offset) = {
        let mut best = (Vector3::X, overlap.x, separation.x);
        if overlap.y < best.1 {
            best = (Vector3::Y, overlap.y, separation.y);
        }
        if overlap.z < best.1 {
            best = (Vector3::Z, overlap.z, separation.z);
        }
        best
    };
    let normal = if offset < 0.0 { -axis } else { axis };

    let region_min = a.min.max(b.min);
    Some(Contact {
        point: region_min + overlap * 0.5,
        normal,
        penetration,
    })
}

/// Sphere/AABB test by projecting the centre onto the box.
///
/// A centre inside the box is pushed out through the nearest face.
pub fn sphere_vs_aabb(center: Vector3, radius: f64, aabb: &Aabb) -> Option<Contact> {
    let closest = aabb.closest_point(center);
    let delta = closest - center;
    let distance_sq = delta.length_squared();

    if distance_sq > 0.0 {
        if distance_sq >= radius * radius {
            return None;
        }
        let distance = distance_sq.sqrt();
        return Some(Contact {
            point: closest,
            normal: delta / distance,
            penetration: radius - distance,
        });
    }

    // Centre inside (or on the surface of) the box
    let faces = [
        (center.x - aabb.min.x, -Vector3::X),
        (aabb.max.x - center.x, Vector3::X),
        (center.y - aabb.min.y, -Vector3::Y),
        (aabb.max.y - center.y, Vector3::Y),
        (center.z - aabb.min.z, -Vector3::Z),
        (aabb.max.z - center.z, Vector3::Z),
    ];
    let mut nearest = faces[0];
    for face in &faces[1..] {
        if face.0 < nearest.0 {
            nearest = *face;
        }
    }
    let (face_distance, outward) = nearest;

    Some(Contact {
        point: center + outward * face_distance,
        normal: -outward,
        penetration: radius + face_distance,
    })
}

/// Ray/sphere intersection.
///
/// A ray starting inside the sphere hits at `t = 0` facing back along the ray.
pub fn raycast_sphere(
    origin: Vector3,
    direction: Vector3,
    max_distance: f64,
    center: Vector3,
    radius: f64,
) -> Option<RayHit> {
    let dir = direction.try_normalize()?;
    let m = origin - center;
    let b = m.dot(dir);
    let c = m.length_squared() - radius * radius;

    if c <= 0.0 {
        return Some(RayHit {
            t: 0.0,
            point: origin,
            normal: -dir,
        });
    }
    // Outside and pointing away
    if b > 0.0 {
        return None;
    }
    let discriminant = b * b - c;
    if discriminant < 0.0 {
        return None;
    }

    let t = -b - discriminant.sqrt();
    if t > max_distance {
        return None;
    }
    let point = origin + dir * t;
    Some(RayHit {
        t,
        point,
        normal: (point - center).normalize_or(-dir),
    })
}

/// Ray/AABB intersection using the slab method
pub fn raycast_aabb(
    origin: Vector3,
    direction: Vector3,
    max_distance: f64,
    aabb: &Aabb,
) -> Option<RayHit> {
    let dir = direction.try_normalize()?;
    let mut t_min = 0.0_f64;
    let mut t_max = max_distance;
    let mut normal: Option<Vector3> = None;

    let axes = [Vector3::X, Vector3::Y, Vector3::Z];
    for (i, axis) in axes.iter().enumerate() {
        let (o, d, lo, hi) = (origin[i], dir[i], aabb.min[i], aabb.max[i]);

        if d.abs() < PARALLEL_EPSILON {
            if o < lo || o > hi {
                return None;
            }
            continue;
        }

        let inv = 1.0 / d;
        let mut near = (lo - o) * inv;
        let mut far = (hi - o) * inv;
        if near > far {
            std::mem::swap(&mut near, &mut far);
        }

        if near > t_min {
            t_min = near;
            normal = Some(if d > 0.0 { -*axis } else { *axis });
        }
        t_max = t_max.min(far);
        if t_min > t_max {
            return None;
        }
    }

    Some(RayHit {
        t: t_min,
        point: origin + dir * t_min,
        normal: normal.unwrap_or(-dir),
    })
}
