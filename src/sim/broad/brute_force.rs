//! All-pairs reference broadphase
//!
//! `O(n²)`: tests every pair, so `checks_performed` is always `n(n-1)/2`.
//! Kept as the correctness baseline the other backends are compared against.

use std::collections::BTreeMap;

use super::{BroadPhase, BroadPhaseKind, BroadPhaseResult, CollisionPair};
use crate::math::Vector3;
use crate::sim::aabb::Aabb;
use crate::sim::entity::EntityId;

#[derive(Debug, Default)]
pub struct BruteForce {
    items: BTreeMap<EntityId, Aabb>,
}

impl BruteForce {
    pub fn new() -> Self {
        Self::default()
    }
}

impl BroadPhase for BruteForce {
    fn kind(&self) -> BroadPhaseKind {
        BroadPhaseKind::BruteForce
    }

    fn insert(&mut self, id: EntityId, bounds: Aabb) {
        self.items.insert(id, bounds);
    }

    fn update(&mut self, id: EntityId, bounds: Aabb) {
        self.items.insert(id, bounds);
    }

    fn remove(&mut self, id: &EntityId) {
        self.items.remove(id);
    }

    fn query_pairs(&mut self) -> BroadPhaseResult {
        // BTreeMap iterates in id order, so (a, b) below is already canonical
        let items: Vec<(&EntityId, &Aabb)> = self.items.iter().collect();
        let mut result = BroadPhaseResult::default();
        for (i, (a_id, a_bb)) in items.iter().enumerate() {
            for (b_id, b_bb) in items.iter().skip(i + 1) {
                result.checks_performed += 1;
                if a_bb.overlaps(b_bb) {
                    result.pairs.push(CollisionPair {
                        a: (*a_id).clone(),
                        b: (*b_id).clone(),
                    });
                }
            }
        }
        result
    }

    fn query_point(&self, point: Vector3) -> Vec<EntityId> {
        self.items
            .iter()
            .filter(|(_, bb)| bb.contains_point(point))
            .map(|(id, _)| id.clone())
            .collect()
    }

    fn query_aabb(&self, bounds: &Aabb) -> Vec<EntityId> {
        self.items
            .iter()
            .filter(|(_, bb)| bb.overlaps(bounds))
            .map(|(id, _)| id.clone())
            .collect()
    }

    fn clear(&mut self) {
        self.items.clear();
    }

    fn len(&self) -> usize {
        self.items.len()
    }
}
