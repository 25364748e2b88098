//! Sweep-and-prune along the X axis
//!
//! Bounds live in an id-keyed map so insert, update and remove stay
//! logarithmic. Each pair query copies them into a scratch list sorted by
//! `min.x` (ties by id), then compares every entry only with the run of
//! entries that start before it ends on X. Surviving candidates get a full
//! AABB test.
//!
//! The sort uses `total_cmp`, so a NaN coordinate sorts to an end of the list
//! instead of breaking the ordering; NaN boxes never overlap anything.

use std::collections::BTreeMap;

use super::{BroadPhase, BroadPhaseKind, BroadPhaseResult, CollisionPair};
use crate::math::Vector3;
use crate::sim::aabb::Aabb;
use crate::sim::entity::EntityId;

#[derive(Debug, Default)]
pub struct SweepAndPrune {
    bounds: BTreeMap<EntityId, Aabb>,
    /// Reused between queries
    sorted: Vec<(EntityId, Aabb)>,
}

impl SweepAndPrune {
    pub fn new() -> Self {
        Self::default()
    }

    fn rebuild_sorted(&mut self) {
        self.sorted.clear();
        self.sorted
            .extend(self.bounds.iter().map(|(id, bb)| (id.clone(), *bb)));
        // BTreeMap order already breaks ties by id; the sort is stable
        self.sorted.sort_by(|(_, a), (_, b)| a.min.x.total_cmp(&b.min.x));
    }

    fn ids_where(&self, keep: impl Fn(&Aabb) -> bool) -> Vec<EntityId> {
        self.bounds
            .iter()
            .filter(|(_, bb)| keep(bb))
            .map(|(id, _)| id.clone())
            .collect()
    }
}

impl BroadPhase for SweepAndPrune {
    fn kind(&self) -> BroadPhaseKind {
        BroadPhaseKind::SweepAndPrune
    }

    fn insert(&mut self, id: EntityId, bounds: Aabb) {
        self.bounds.insert(id, bounds);
    }

    fn update(&mut self, id: EntityId, bounds: Aabb) {
        self.bounds.insert(id, bounds);
    }

    fn remove(&mut self, id: &EntityId) {
        self.bounds.remove(id);
    }

    fn query_pairs(&mut self) -> BroadPhaseResult {
        // Positions change between queries, so the order is rebuilt each time
        self.rebuild_sorted();

        let mut result = BroadPhaseResult::default();
        for (i, (a_id, a_bb)) in self.sorted.iter().enumerate() {
            for (b_id, b_bb) in &self.sorted[i + 1..] {
                if b_bb.min.x > a_bb.max.x {
                    break;
                }
                result.checks_performed += 1;
                if a_bb.overlaps(b_bb) {
                    result.pairs.push(CollisionPair::new(a_id.clone(), b_id.clone()));
                }
            }
        }
        result.pairs.sort();
        result
    }

    fn query_point(&self, point: Vector3) -> Vec<EntityId> {
        self.ids_where(|bb| bb.contains_point(point))
    }

    fn query_aabb(&self, bounds: &Aabb) -> Vec<EntityId> {
        self.ids_where(|bb| bb.overlaps(bounds))
    }

    fn clear(&mut self) {
        self.bounds.clear();
        self.sorted.clear();
    }

    fn len(&self) -> usize {
        self.bounds.len()
    }
}
