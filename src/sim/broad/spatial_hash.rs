//! Uniform grid broadphase
//!
//! Each entry is registered in every cell its AABB touches. Pairs are only
//! tested between entries sharing a cell, and a canonical-key set makes sure
//! a pair sharing several cells is tested and reported once.
//!
//! Entries spanning more than `MAX_CELLS_PER_ENTRY` cells (large obstacles)
//! are kept out of the grid and tested against every other entry instead.

use std::collections::{BTreeMap, BTreeSet};

use super::{BroadPhase, BroadPhaseKind, BroadPhaseResult, CollisionPair};
use crate::consts::CELL_SIZE;
use crate::math::Vector3;
use crate::sim::aabb::Aabb;
use crate::sim::entity::EntityId;

type Cell = (i64, i64, i64);

const MAX_CELLS_PER_ENTRY: i64 = 4096;

#[derive(Debug)]
struct Entry {
    bounds: Aabb,
    /// Empty for oversized entries
    cells: Vec<Cell>,
}

#[derive(Debug)]
pub struct SpatialHash {
    cell_size: f64,
    cells: BTreeMap<Cell, BTreeSet<EntityId>>,
    entries: BTreeMap<EntityId, Entry>,
    oversized: BTreeSet<EntityId>,
}

impl Default for SpatialHash {
    fn default() -> Self {
        Self::new(CELL_SIZE)
    }
}

impl SpatialHash {
    pub fn new(cell_size: f64) -> Self {
        let cell_size = if cell_size.is_finite() && cell_size > 0.0 {
            cell_size
        } else {
            CELL_SIZE
        };
        Self {
            cell_size,
            cells: BTreeMap::new(),
            entries: BTreeMap::new(),
            oversized: BTreeSet::new(),
        }
    }

    pub fn cell_size(&self) -> f64 {
        self.cell_size
    }

    /// Number of non-empty grid cells
    pub fn occupied_cells(&self) -> usize {
        self.cells.len()
    }

    fn cell_of(&self, p: Vector3) -> Cell {
        (
            (p.x / self.cell_size).floor() as i64,
            (p.y / self.cell_size).floor() as i64,
            (p.z / self.cell_size).floor() as i64,
        )
    }

    /// Cells covered by `bounds`, or `None` if there are too many
    fn cells_for(&self, bounds: &Aabb) -> Option<Vec<Cell>> {
        let lo = self.cell_of(bounds.min);
        let hi = self.cell_of(bounds.max);
        let span = (hi.0 - lo.0 + 1)
            .saturating_mul(hi.1 - lo.1 + 1)
            .saturating_mul(hi.2 - lo.2 + 1);
        if span > MAX_CELLS_PER_ENTRY {
            return None;
        }
        let mut cells = Vec::with_capacity(span as usize);
        for x in lo.0..=hi.0 {
            for y in lo.1..=hi.1 {
                for z in lo.2..=hi.2 {
                    cells.push((x, y, z));
                }
            }
        }
        Some(cells)
    }

    fn unlink(&mut self, id: &EntityId) -> bool {
        let Some(entry) = self.entries.remove(id) else {
            return false;
        };
        for cell in &entry.cells {
            if let Some(set) = self.cells.get_mut(cell) {
                set.remove(id);
                if set.is_empty() {
                    self.cells.remove(cell);
                }
            }
        }
        self.oversized.remove(id);
        true
    }

    fn test(
        &self,
        a: &EntityId,
        b: &EntityId,
        tested: &mut BTreeSet<CollisionPair>,
        result: &mut BroadPhaseResult,
    ) {
        let pair = CollisionPair::new(a.clone(), b.clone());
        if tested.contains(&pair) {
            return;
        }
        result.checks_performed += 1;
        let (Some(ea), Some(eb)) = (self.entries.get(a), self.entries.get(b)) else {
            return;
        };
        if ea.bounds.overlaps(&eb.bounds) {
            result.pairs.push(pair.clone());
        }
        tested.insert(pair);
    }

    /// Candidates near `bounds`: grid neighbours plus oversized entries
    fn candidates(&self, bounds: &Aabb) -> BTreeSet<&EntityId> {
        match self.cells_for(bounds) {
            Some(cells) => cells
                .iter()
                .filter_map(|c| self.cells.get(c))
                .flatten()
                .chain(self.oversized.iter())
                .collect(),
            None => self.entries.keys().collect(),
        }
    }
}

impl BroadPhase for SpatialHash {
    fn kind(&self) -> BroadPhaseKind {
        BroadPhaseKind::SpatialHash
    }

    fn insert(&mut self, id: EntityId, bounds: Aabb) {
        self.unlink(&id);
        let cells = match self.cells_for(&bounds) {
            Some(cells) => {
                for cell in &cells {
                    self.cells.entry(*cell).or_default().insert(id.clone());
                }
                cells
            }
            None => {
                self.oversized.insert(id.clone());
                Vec::new()
            }
        };
        self.entries.insert(id, Entry { bounds, cells });
    }

    fn update(&mut self, id: EntityId, bounds: Aabb) {
        let footprint = self.cells_for(&bounds);
        if let Some(entry) = self.entries.get_mut(&id) {
            // Same cell footprint: only the bounds change
            if !entry.cells.is_empty() && footprint.as_ref() == Some(&entry.cells) {
                entry.bounds = bounds;
                return;
            }
        }
        self.insert(id, bounds);
    }

    fn remove(&mut self, id: &EntityId) {
        self.unlink(id);
    }

    fn query_pairs(&mut self) -> BroadPhaseResult {
        let mut result = BroadPhaseResult::default();
        let mut tested = BTreeSet::new();

        for members in self.cells.values() {
            let members: Vec<&EntityId> = members.iter().collect();
            for (i, a) in members.iter().enumerate() {
                for b in members.iter().skip(i + 1) {
                    self.test(a, b, &mut tested, &mut result);
                }
            }
        }

        for big in &self.oversized {
            for other in self.entries.keys() {
                if other != big {
                    self.test(big, other, &mut tested, &mut result);
                }
            }
        }

        result.pairs.sort();
        result
    }

    fn query_point(&self, point: Vector3) -> Vec<EntityId> {
        let cell = self.cell_of(point);
        self.cells
            .get(&cell)
            .into_iter()
            .flatten()
            .chain(self.oversized.iter())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .filter(|id| {
                self.entries
                    .get(*id)
                    .is_some_and(|e| e.bounds.contains_point(point))
            })
            .cloned()
            .collect()
    }

    fn query_aabb(&self, bounds: &Aabb) -> Vec<EntityId> {
        self.candidates(bounds)
            .into_iter()
            .filter(|id| {
                self.entries
                    .get(*id)
                    .is_some_and(|e| e.bounds.overlaps(bounds))
            })
            .cloned()
            .collect()
    }

    fn clear(&mut self) {
        self.cells.clear();
        self.entries.clear();
        self.oversized.clear();
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}
