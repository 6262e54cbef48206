// Copyright 2024 Saptak Santra
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Uniform-grid broad phase
//!
//! Every collider is recorded in each cell its bounds overlap. Cells are
//! keyed by `floor(coord / cell_size)` and dropped as soon as they empty.
//!
//! A collider spanning more than [`MAX_COVERED_CELLS`] cells is kept in a
//! single overflow bucket instead, which every query returns. Bounds with a
//! NaN or infinite edge are never indexed.

use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use tracing::warn;

use crate::collision::Collider;
use crate::entity::EntityId;

/// Axis-aligned rectangle, origin at the top-left corner
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    /// Every edge is a finite number
    pub fn is_finite(&self) -> bool {
        self.x.is_finite()
            && self.y.is_finite()
            && self.right().is_finite()
            && self.bottom().is_finite()
    }

    /// Strict overlap: rectangles that only touch along an edge do not
    /// intersect
    #[inline]
    pub fn intersects(&self, other: &Rect) -> bool {
        self.x < other.right()
            && other.x < self.right()
            && self.y < other.bottom()
            && other.y < self.bottom()
    }
}

/// Integer cell coordinate
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellCoord {
    pub x: i32,
    pub y: i32,
}

impl CellCoord {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

pub type CellList = SmallVec<[CellCoord; 4]>;

/// Largest number of cells a single collider is recorded in
pub const MAX_COVERED_CELLS: u64 = 1024;

/// Inclusive block of cells
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct CellSpan {
    min: CellCoord,
    max: CellCoord,
}

impl CellSpan {
    fn cell_count(&self) -> u64 {
        let columns = (i64::from(self.max.x) - i64::from(self.min.x) + 1) as u64;
        let rows = (i64::from(self.max.y) - i64::from(self.min.y) + 1) as u64;
        columns.saturating_mul(rows)
    }

    fn contains(&self, cell: &CellCoord) -> bool {
        (self.min.x..=self.max.x).contains(&cell.x) && (self.min.y..=self.max.y).contains(&cell.y)
    }
}

#[derive(Clone, Debug)]
struct Tracked {
    bounds: Rect,
    /// Empty for colliders in the overflow bucket
    cells: CellList,
}

/// Spatial hash grid for broad-phase collision detection
#[derive(Clone, Debug)]
pub struct SpatialHash {
    cell_size: f32,
    cells: FxHashMap<CellCoord, Vec<EntityId>>,
    oversized: Vec<EntityId>,
    tracked: FxHashMap<EntityId, Tracked>,
}

impl SpatialHash {
    /// `cell_size` must be positive; non-positive values fall back to 1
    pub fn new(cell_size: f32) -> Self {
        let cell_size = if cell_size > 0.0 { cell_size } else { 1.0 };
        Self {
            cell_size,
            cells: FxHashMap::default(),
            oversized: Vec::new(),
            tracked: FxHashMap::default(),
        }
    }

    pub fn cell_size(&self) -> f32 {
        self.cell_size
    }

    /// Drop every entry; capacity is kept for the next rebuild
    pub fn reset(&mut self) {
        self.cells.clear();
        self.oversized.clear();
        self.tracked.clear();
    }

    #[inline]
    fn cell_of(&self, x: f32, y: f32) -> CellCoord {
        CellCoord::new(
            (x / self.cell_size).floor() as i32,
            (y / self.cell_size).floor() as i32,
        )
    }

    fn span(&self, rect: &Rect) -> Option<CellSpan> {
        if !rect.is_finite() {
            return None;
        }
        Some(CellSpan {
            min: self.cell_of(rect.x, rect.y),
            max: self.cell_of(rect.x + rect.width.max(0.0), rect.y + rect.height.max(0.0)),
        })
    }

    /// Every cell a rectangle overlaps. Empty for non-finite rectangles and
    /// for spans of more than [`MAX_COVERED_CELLS`] cells.
    pub fn covered_cells(&self, rect: &Rect) -> CellList {
        let mut cells = CellList::new();
        let Some(span) = self.span(rect) else {
            return cells;
        };
        if span.cell_count() > MAX_COVERED_CELLS {
            return cells;
        }
        for x in span.min.x..=span.max.x {
            for y in span.min.y..=span.max.y {
                cells.push(CellCoord::new(x, y));
            }
        }
        cells
    }

    /// Insert a collider under its payload entity. A collider already
    /// present is moved to its new bounds. Returns `false` when the bounds
    /// are not finite and the collider was left out.
    pub fn insert(&mut self, collider: &Collider) -> bool {
        self.insert_bounds(collider.entity, collider.bounds)
    }

    pub fn insert_bounds(&mut self, entity: EntityId, bounds: Rect) -> bool {
        self.remove_entity(entity);

        let Some(span) = self.span(&bounds) else {
            warn!(?entity, ?bounds, "non-finite bounds not indexed");
            return false;
        };

        if span.cell_count() > MAX_COVERED_CELLS {
            self.oversized.push(entity);
            self.tracked.insert(
                entity,
                Tracked {
                    bounds,
                    cells: CellList::new(),
                },
            );
            return true;
        }

        let cells = self.covered_cells(&bounds);
        for cell in &cells {
            self.cells.entry(*cell).or_default().push(entity);
        }
        self.tracked.insert(entity, Tracked { bounds, cells });
        true
    }

    /// Remove a collider from every cell it was inserted into
    pub fn remove(&mut self, collider: &Collider) -> bool {
        self.remove_entity(collider.entity)
    }

    pub fn remove_entity(&mut self, entity: EntityId) -> bool {
        let Some(tracked) = self.tracked.remove(&entity) else {
            return false;
        };

        if tracked.cells.is_empty() {
            self.oversized.retain(|&e| e != entity);
        }

        for cell in tracked.cells {
            if let Some(bucket) = self.cells.get_mut(&cell) {
                bucket.retain(|&e| e != entity);
                if bucket.is_empty() {
                    self.cells.remove(&cell);
                }
            }
        }
        true
    }

    /// Union of the buckets of every cell `rect` overlaps, plus the
    /// overflow bucket. Candidates are not filtered by exact overlap, and
    /// the querying entity itself is not excluded. A non-finite `rect`
    /// finds nothing.
    pub fn query(&self, rect: &Rect, out: &mut FxHashSet<EntityId>) {
        let Some(span) = self.span(rect) else {
            return;
        };

        // Visit whichever is smaller: the covered cells or the occupied ones
        if span.cell_count() <= self.cells.len() as u64 {
            for x in span.min.x..=span.max.x {
                for y in span.min.y..=span.max.y {
                    if let Some(bucket) = self.cells.get(&CellCoord::new(x, y)) {
                        out.extend(bucket.iter().copied());
                    }
                }
            }
        } else {
            for (cell, bucket) in &self.cells {
                if span.contains(cell) {
                    out.extend(bucket.iter().copied());
                }
            }
        }
        out.extend(self.oversized.iter().copied());
    }

    /// Colliders too large to be recorded per cell
    pub fn oversized(&self) -> &[EntityId] {
        &self.oversized
    }

    /// Bounds recorded at insertion time
    pub fn bounds(&self, entity: EntityId) -> Option<Rect> {
        self.tracked.get(&entity).map(|t| t.bounds)
    }

    /// Every tracked entity with its bounds, in no particular order
    pub fn entries(&self) -> impl Iterator<Item = (EntityId, Rect)> + '_ {
        self.tracked.iter().map(|(entity, t)| (*entity, t.bounds))
    }

    pub fn contains(&self, entity: EntityId) -> bool {
        self.tracked.contains_key(&entity)
    }

    /// Cell → bucket map
    pub fn cells(&self) -> &FxHashMap<CellCoord, Vec<EntityId>> {
        &self.cells
    }

    /// Number of tracked colliders
    pub fn len(&self) -> usize {
        self.tracked.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracked.is_empty()
    }

    pub fn occupied_cells(&self) -> usize {
        self.cells.len()
    }
}

impl Default for SpatialHash {
    fn default() -> Self {
        Self::new(64.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotmap::SlotMap;

    fn entities(n: usize) -> Vec<EntityId> {
        let mut map: SlotMap<EntityId, ()> = SlotMap::with_key();
        (0..n).map(|_| map.insert(())).collect()
    }

    #[test]
    fn test_strict_intersection() {
        let a = Rect::new(0.0, 0.0, 10.0, 10.0);
        assert!(a.intersects(&Rect::new(5.0, 5.0, 10.0, 10.0)));
        assert!(!a.intersects(&Rect::new(10.0, 0.0, 10.0, 10.0)));
        assert!(!a.intersects(&Rect::new(20.0, 20.0, 10.0, 10.0)));
    }

    #[test]
    fn test_insert_spans_cells() {
        let ids = entities(1);
        let mut hash = SpatialHash::new(10.0);
        hash.insert_bounds(ids[0], Rect::new(5.0, 5.0, 10.0, 2.0));

        assert_eq!(hash.occupied_cells(), 2);
        assert!(hash.cells().contains_key(&CellCoord::new(0, 0)));
        assert!(hash.cells().contains_key(&CellCoord::new(1, 0)));
    }

    #[test]
    fn test_negative_coordinates_floor() {
        let hash = SpatialHash::new(10.0);
        let cells = hash.covered_cells(&Rect::new(-5.0, -15.0, 1.0, 1.0));
        assert_eq!(cells.as_slice(), &[CellCoord::new(-1, -2)]);
    }

    #[test]
    fn test_query_union_is_deduplicated() {
        let ids = entities(2);
        let mut hash = SpatialHash::new(10.0);
        hash.insert_bounds(ids[0], Rect::new(0.0, 0.0, 25.0, 25.0));
        hash.insert_bounds(ids[1], Rect::new(40.0, 40.0, 1.0, 1.0));

        let mut out = FxHashSet::default();
        hash.query(&Rect::new(0.0, 0.0, 25.0, 25.0), &mut out);
        assert_eq!(out.len(), 1);
        assert!(out.contains(&ids[0]));
    }

    #[test]
    fn test_remove_drops_empty_buckets() {
        let ids = entities(2);
        let mut hash = SpatialHash::new(10.0);
        hash.insert_bounds(ids[0], Rect::new(0.0, 0.0, 15.0, 15.0));
        hash.insert_bounds(ids[1], Rect::new(1.0, 1.0, 1.0, 1.0));

        assert!(hash.remove_entity(ids[0]));
        assert!(!hash.remove_entity(ids[0]));
        assert_eq!(hash.occupied_cells(), 1);

        let mut out = FxHashSet::default();
        hash.query(&Rect::new(0.0, 0.0, 30.0, 30.0), &mut out);
        assert!(!out.contains(&ids[0]));
        assert_eq!(hash.len(), 1);
    }

    #[test]
    fn test_reinsert_moves_entity() {
        let ids = entities(1);
        let mut hash = SpatialHash::new(10.0);
        hash.insert_bounds(ids[0], Rect::new(0.0, 0.0, 1.0, 1.0));
        hash.insert_bounds(ids[0], Rect::new(100.0, 100.0, 1.0, 1.0));

        assert_eq!(hash.occupied_cells(), 1);
        assert!(hash.cells().contains_key(&CellCoord::new(10, 10)));
        assert_eq!(hash.bounds(ids[0]), Some(Rect::new(100.0, 100.0, 1.0, 1.0)));
    }

    #[test]
    fn test_non_finite_bounds_are_not_indexed() {
        let ids = entities(2);
        let mut hash = SpatialHash::new(1.0);
        assert!(!hash.insert_bounds(ids[0], Rect::new(0.0, 0.0, f32::INFINITY, 1.0)));
        assert!(!hash.insert_bounds(ids[1], Rect::new(f32::NAN, 0.0, 1.0, 1.0)));
        assert!(!hash.insert_bounds(ids[1], Rect::new(f32::MAX, 0.0, f32::MAX, 1.0)));
        assert!(hash.is_empty());
        assert_eq!(hash.occupied_cells(), 0);

        let mut out = FxHashSet::default();
        hash.query(&Rect::new(0.0, 0.0, f32::INFINITY, f32::INFINITY), &mut out);
        assert!(out.is_empty());
    }

    #[test]
    fn test_huge_collider_goes_to_overflow() {
        let ids = entities(2);
        let mut hash = SpatialHash::new(1.0);
        assert!(hash.insert_bounds(ids[0], Rect::new(0.0, 0.0, 1.0e6, 1.0)));
        hash.insert_bounds(ids[1], Rect::new(3.0, 3.0, 1.0, 1.0));

        assert_eq!(hash.oversized(), &[ids[0]]);
        assert_eq!(hash.occupied_cells(), 4);
        assert!(hash.covered_cells(&Rect::new(0.0, 0.0, 1.0e6, 1.0)).is_empty());

        let mut out = FxHashSet::default();
        hash.query(&Rect::new(500_000.0, 0.0, 1.0, 1.0), &mut out);
        assert_eq!(out.len(), 1);
        assert!(out.contains(&ids[0]));

        out.clear();
        hash.query(&Rect::new(-1.0e7, -1.0e7, 2.0e7, 2.0e7), &mut out);
        assert_eq!(out.len(), 2);

        assert!(hash.remove_entity(ids[0]));
        assert!(hash.oversized().is_empty());
        assert_eq!(hash.len(), 1);
    }

    #[test]
    fn test_rebuild_is_deterministic() {
        let ids = entities(8);
        let rects: Vec<Rect> = (0..8)
            .map(|i| Rect::new(i as f32 * 7.0, (i % 3) as f32 * 11.0, 9.0, 9.0))
            .collect();

        let mut hash = SpatialHash::new(16.0);
        let snapshot = |hash: &mut SpatialHash| {
            hash.reset();
            for (id, rect) in ids.iter().zip(&rects) {
                hash.insert_bounds(*id, *rect);
            }
            let mut out = FxHashSet::default();
            hash.query(&Rect::new(0.0, 0.0, 40.0, 40.0), &mut out);
            out
        };

        let first = snapshot(&mut hash);
        let second = snapshot(&mut hash);
        assert_eq!(first, second);
    }
}
