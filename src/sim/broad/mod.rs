//! Broadphase collision culling
//!
//! Every backend consumes per-entity AABBs and reports candidate pairs.
//! Backends differ in cost, never in result: for the same input they return
//! the same canonical pair list, sorted ascending by `(a, b)`. Only
//! `checks_performed` is allowed to differ.

pub mod brute_force;
pub mod spatial_hash;
pub mod sweep_prune;

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::aabb::Aabb;
use super::entity::EntityId;
use crate::math::Vector3;

pub use brute_force::BruteForce;
pub use spatial_hash::SpatialHash;
pub use sweep_prune::SweepAndPrune;

/// Unordered entity pair stored canonically as `a < b`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CollisionPair {
    pub a: EntityId,
    pub b: EntityId,
}

impl CollisionPair {
    /// Canonicalize two ids into a pair (smaller id first)
    pub fn new(x: EntityId, y: EntityId) -> Self {
        if x <= y {
            Self { a: x, b: y }
        } else {
            Self { a: y, b: x }
        }
    }

    pub fn contains(&self, id: &EntityId) -> bool {
        &self.a == id || &self.b == id
    }
}

/// Output of a pair query
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BroadPhaseResult {
    /// Canonical, sorted, deduplicated candidate pairs
    pub pairs: Vec<CollisionPair>,
    /// AABB overlap tests performed to produce `pairs`
    pub checks_performed: usize,
}

/// Spatial index kept in sync with the entity registry by explicit calls
pub trait BroadPhase: Send {
    fn kind(&self) -> BroadPhaseKind;

    fn insert(&mut self, id: EntityId, bounds: Aabb);

    /// Move an entry; unknown ids are inserted
    fn update(&mut self, id: EntityId, bounds: Aabb);

    /// Remove an entry; unknown ids are ignored
    fn remove(&mut self, id: &EntityId);

    fn query_pairs(&mut self) -> BroadPhaseResult;

    /// Entries whose bounds contain `point`, sorted by id
    fn query_point(&self, point: Vector3) -> Vec<EntityId>;

    /// Entries whose bounds overlap `bounds`, sorted by id
    fn query_aabb(&self, bounds: &Aabb) -> Vec<EntityId>;

    fn clear(&mut self);

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Broadphase backend selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BroadPhaseKind {
    BruteForce,
    #[default]
    SpatialHash,
    SweepAndPrune,
}

impl BroadPhaseKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BroadPhaseKind::BruteForce => "brute-force",
            BroadPhaseKind::SpatialHash => "spatial-hash",
            BroadPhaseKind::SweepAndPrune => "sweep-and-prune",
        }
    }

    /// Instantiate the backend (`cell_size` applies to the spatial hash only)
    pub fn build(&self, cell_size: f64) -> Box<dyn BroadPhase> {
        match self {
            BroadPhaseKind::BruteForce => Box::new(BruteForce::new()),
            BroadPhaseKind::SpatialHash => Box::new(SpatialHash::new(cell_size)),
            BroadPhaseKind::SweepAndPrune => Box::new(SweepAndPrune::new()),
        }
    }
}

impl FromStr for BroadPhaseKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('_', "-").as_str() {
            "brute-force" | "brute" => Ok(BroadPhaseKind::BruteForce),
            "spatial-hash" | "grid" => Ok(BroadPhaseKind::SpatialHash),
            "sweep-and-prune" | "sap" => Ok(BroadPhaseKind::SweepAndPrune),
            other => Err(format!("unknown broadphase '{other}'")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [BroadPhaseKind; 3] = [
        BroadPhaseKind::BruteForce,
        BroadPhaseKind::SpatialHash,
        BroadPhaseKind::SweepAndPrune,
    ];

    fn sphere(x: f64, y: f64, z: f64, r: f64) -> Aabb {
        Aabb::from_center_radius(Vector3::new(x, y, z), r)
    }

    fn pair(a: &str, b: &str) -> CollisionPair {
        CollisionPair::new(a.into(), b.into())
    }

    #[test]
    fn test_pair_is_canonical() {
        let p = CollisionPair::new("zeta".into(), "alpha".into());
        assert_eq!(p.a.as_str(), "alpha");
        assert_eq!(p, pair("alpha", "zeta"));
        assert!(p.contains(&"zeta".into()));
    }

    #[test]
    fn test_backends_agree_on_small_scene() {
        for kind in ALL {
            let mut bp = kind.build(10.0);
            // Inserted out of order on purpose
            bp.insert("c".into(), sphere(100.0, 0.0, 0.0, 1.0));
            bp.insert("b".into(), sphere(1.5, 0.0, 0.0, 1.0));
            bp.insert("a".into(), sphere(0.0, 0.0, 0.0, 1.0));
            bp.insert("d".into(), sphere(0.75, 0.0, 0.0, 1.0));

            let result = bp.query_pairs();
            assert_eq!(
                result.pairs,
                vec![pair("a", "b"), pair("a", "d"), pair("b", "d")],
                "{} disagrees",
                kind.as_str()
            );
            assert!(result.checks_performed >= 3);
        }
    }

    #[test]
    fn test_update_and_remove() {
        for kind in ALL {
            let mut bp = kind.build(10.0);
            bp.insert("a".into(), sphere(0.0, 0.0, 0.0, 1.0));
            bp.insert("b".into(), sphere(50.0, 0.0, 0.0, 1.0));
            assert!(bp.query_pairs().pairs.is_empty());

            bp.update("b".into(), sphere(1.0, 0.0, 0.0, 1.0));
            assert_eq!(bp.query_pairs().pairs, vec![pair("a", "b")]);

            bp.remove(&"a".into());
            bp.remove(&"missing".into());
            assert_eq!(bp.len(), 1);
            assert!(bp.query_pairs().pairs.is_empty());

            bp.update("c".into(), sphere(1.0, 0.5, 0.0, 1.0));
            assert_eq!(bp.len(), 2);

            bp.clear();
            assert!(bp.is_empty());
        }
    }

    #[test]
    fn test_point_and_box_queries() {
        for kind in ALL {
            let mut bp = kind.build(4.0);
            bp.insert("a".into(), sphere(0.0, 0.0, 0.0, 1.0));
            bp.insert("b".into(), sphere(0.5, 0.0, 0.0, 1.0));
            bp.insert("c".into(), sphere(30.0, 30.0, 0.0, 1.0));

            let hits = bp.query_point(Vector3::new(0.25, 0.0, 0.0));
            assert_eq!(hits, vec![EntityId::from("a"), EntityId::from("b")]);
            assert!(bp.query_point(Vector3::new(10.0, 10.0, 10.0)).is_empty());

            let region = Aabb::new(Vector3::new(25.0, 25.0, -1.0), Vector3::new(40.0, 40.0, 1.0));
            assert_eq!(bp.query_aabb(&region), vec![EntityId::from("c")]);
        }
    }

    #[test]
    fn test_brute_force_check_count() {
        let mut bp = BroadPhaseKind::BruteForce.build(10.0);
        for i in 0..6 {
            bp.insert(format!("e{i}").into(), sphere(i as f64 * 100.0, 0.0, 0.0, 1.0));
        }
        assert_eq!(bp.query_pairs().checks_performed, 15);
    }

    #[test]
    fn test_kind_strings() {
        for kind in ALL {
            assert_eq!(kind.as_str().parse::<BroadPhaseKind>(), Ok(kind));
            assert_eq!(kind.build(1.0).kind(), kind);
        }
        assert_eq!("SAP".parse::<BroadPhaseKind>(), Ok(BroadPhaseKind::SweepAndPrune));
        assert!("octree".parse::<BroadPhaseKind>().is_err());
    }
}
