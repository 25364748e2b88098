//! Property-based tests for the broadphase backends.
//!
//! Every backend must report exactly the brute-force pair set for any input,
//! including after entries move or are removed.

use std::collections::BTreeSet;

use detsim::math::Vector3;
use detsim::sim::{Aabb, BroadPhaseKind, CollisionPair, EntityId};
use proptest::prelude::*;

// =============================================================================
// Strategies
// =============================================================================

/// A box somewhere in a 200-unit cube, up to 15 units on a side
fn arb_aabb() -> impl Strategy<Value = Aabb> {
    (
        prop::array::uniform3(-100.0..100.0f64),
        prop::array::uniform3(0.0..7.5f64),
    )
        .prop_map(|(c, h)| {
            Aabb::from_center_half_extents(Vector3::from_array(c), Vector3::from_array(h))
        })
}

fn arb_scene(max: usize) -> impl Strategy<Value = Vec<Aabb>> {
    prop::collection::vec(arb_aabb(), 0..max)
}

fn id(i: usize) -> EntityId {
    format!("e{i}").into()
}

fn pairs_for(kind: BroadPhaseKind, cell_size: f64, scene: &[Aabb]) -> Vec<CollisionPair> {
    let mut bp = kind.build(cell_size);
    for (i, bounds) in scene.iter().enumerate() {
        bp.insert(id(i), *bounds);
    }
    bp.query_pairs().pairs
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn backends_report_same_pairs(scene in arb_scene(40), cell_size in 2.0..40.0f64) {
        let reference = pairs_for(BroadPhaseKind::BruteForce, cell_size, &scene);
        for kind in [BroadPhaseKind::SpatialHash, BroadPhaseKind::SweepAndPrune] {
            let pairs = pairs_for(kind, cell_size, &scene);
            prop_assert_eq!(&pairs, &reference, "{} disagrees", kind.as_str());
        }
    }

    #[test]
    fn pairs_are_canonical_sorted_and_unique(scene in arb_scene(40)) {
        for kind in [BroadPhaseKind::BruteForce, BroadPhaseKind::SpatialHash, BroadPhaseKind::SweepAndPrune] {
            let pairs = pairs_for(kind, 10.0, &scene);
            prop_assert!(pairs.iter().all(|p| p.a < p.b));
            prop_assert!(pairs.windows(2).all(|w| w[0] < w[1]));
            let unique: BTreeSet<_> = pairs.iter().collect();
            prop_assert_eq!(unique.len(), pairs.len());
        }
    }

    #[test]
    fn updates_and_removals_stay_consistent(
        scene in arb_scene(30),
        moved in arb_scene(30),
        remove_every in 2usize..5,
    ) {
        let mut backends: Vec<_> = [
            BroadPhaseKind::BruteForce,
            BroadPhaseKind::SpatialHash,
            BroadPhaseKind::SweepAndPrune,
        ]
        .iter()
        .map(|k| k.build(8.0))
        .collect();

        for bp in &mut backends {
            for (i, bounds) in scene.iter().enumerate() {
                bp.insert(id(i), *bounds);
            }
            for (i, bounds) in moved.iter().enumerate() {
                bp.update(id(i), *bounds);
            }
            for i in (0..scene.len().max(moved.len())).step_by(remove_every) {
                bp.remove(&id(i));
            }
        }

        let reference = backends[0].query_pairs().pairs;
        let expected_len = backends[0].len();
        for bp in &mut backends[1..] {
            prop_assert_eq!(bp.len(), expected_len);
            prop_assert_eq!(bp.query_pairs().pairs, reference.clone());
        }
    }

    #[test]
    fn point_queries_agree(scene in arb_scene(30), p in prop::array::uniform3(-100.0..100.0f64)) {
        let point = Vector3::from_array(p);
        let mut answers = Vec::new();
        for kind in [BroadPhaseKind::BruteForce, BroadPhaseKind::SpatialHash, BroadPhaseKind::SweepAndPrune] {
            let mut bp = kind.build(10.0);
            for (i, bounds) in scene.iter().enumerate() {
                bp.insert(id(i), *bounds);
            }
            answers.push(bp.query_point(point));
        }
        prop_assert_eq!(&answers[0], &answers[1]);
        prop_assert_eq!(&answers[0], &answers[2]);
    }
}

#[test]
fn brute_force_checks_every_pair() {
    let scene: Vec<Aabb> = (0..10)
        .map(|i| Aabb::from_center_radius(Vector3::new(i as f64 * 50.0, 0.0, 0.0), 1.0))
        .collect();
    let mut bp = BroadPhaseKind::BruteForce.build(10.0);
    for (i, bounds) in scene.iter().enumerate() {
        bp.insert(id(i), *bounds);
    }
    assert_eq!(bp.query_pairs().checks_performed, 45);
}

#[test]
fn spatial_hash_checks_fewer_pairs_on_sparse_scene() {
    let mut grid = BroadPhaseKind::SpatialHash.build(10.0);
    for i in 0..10 {
        grid.insert(
            id(i),
            Aabb::from_center_radius(Vector3::new(i as f64 * 50.0 + 5.0, 5.0, 5.0), 1.0),
        );
    }
    let result = grid.query_pairs();
    assert!(result.pairs.is_empty());
    assert_eq!(result.checks_performed, 0);
}
