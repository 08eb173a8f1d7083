//! Uniform-grid spatial index with a lazy, best-first k-nearest-neighbor cursor.
//!
//! This replaces the tree-based spatial structures used elsewhere in the `nalgebra`
//! ecosystem with a direct translation of the original implementation's own spatial
//! partition: a fixed `n`x`n`x`n` grid of cells over the point set's bounding box, searched
//! by a priority queue that expands outward from the query's own cell only as far as
//! necessary to produce the next-nearest point.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use nalgebra::Vector3;

use crate::aabb::AxisAlignedBoundingBox3d;
use crate::numeric_types::Real;
use crate::{new_map, MapType};

/// Picks the grid resolution `n` (cells per axis) for a point set of the given size.
pub fn grid_resolution_for_count(n_points: usize) -> usize {
    if n_points <= 5_000 {
        20
    } else if n_points <= 100_000 {
        36
    } else {
        60
    }
}

type CellIndex = (i32, i32, i32);

/// A uniform grid over a fixed bounding box, storing point ids per cell.
///
/// Built once over a point set (raw samples, or tangent-plane origins) and queried
/// repeatedly via [`SpatialIndex::search`].
pub struct SpatialIndex<R: Real> {
    aabb: AxisAlignedBoundingBox3d<R>,
    resolution: usize,
    cell_size: Vector3<R>,
    cells: MapType<CellIndex, Vec<u32>>,
    points: Vec<Vector3<R>>,
}

impl<R: Real> SpatialIndex<R> {
    /// Builds an index over the given points using the resolution formula from
    /// [`grid_resolution_for_count`].
    pub fn build(points: &[Vector3<R>]) -> Self {
        let aabb = AxisAlignedBoundingBox3d::from_points(points);
        let resolution = grid_resolution_for_count(points.len());
        let mut index = Self::with_resolution(aabb, resolution);
        for (i, p) in points.iter().enumerate() {
            index.enter(i as u32, *p);
        }
        index
    }

    fn with_resolution(aabb: AxisAlignedBoundingBox3d<R>, resolution: usize) -> Self {
        let extents = aabb.extents();
        let n = R::from(resolution.max(1)).unwrap();
        let tiny = R::from(1e-12).unwrap();
        let cell_size = Vector3::new(
            (extents.x / n).max(tiny),
            (extents.y / n).max(tiny),
            (extents.z / n).max(tiny),
        );
        Self {
            aabb,
            resolution,
            cell_size,
            cells: new_map(),
            points: Vec::new(),
        }
    }

    /// Inserts a point with the given id into the cell containing it. No duplicate check.
    pub fn enter(&mut self, id: u32, p: Vector3<R>) {
        if id as usize >= self.points.len() {
            self.points.resize(id as usize + 1, p);
        }
        self.points[id as usize] = p;
        let cell = self.cell_of(&p);
        self.cells.entry(cell).or_insert_with(Vec::new).push(id);
    }

    fn cell_of(&self, p: &Vector3<R>) -> CellIndex {
        let min = self.aabb.min();
        let idx = |v: R, lo: R, size: R| -> i32 {
            let raw = ((v - lo) / size).floor();
            num::ToPrimitive::to_i32(&raw)
                .unwrap_or(0)
                .clamp(0, self.resolution as i32 - 1)
        };
        (
            idx(p.x, min.x, self.cell_size.x),
            idx(p.y, min.y, self.cell_size.y),
            idx(p.z, min.z, self.cell_size.z),
        )
    }

    pub fn point(&self, id: u32) -> Vector3<R> {
        self.points[id as usize]
    }

    /// Returns a lazy best-first cursor over the points in this index, nearest-first, relative
    /// to `query`.
    pub fn search(&self, query: Vector3<R>) -> KnnCursor<'_, R> {
        let mut heap = BinaryHeap::new();
        let origin = self.cell_of(&query);
        heap.push(HeapEntry {
            key: OrdDist(R::zero()),
            item: Item::Cell(origin),
        });
        KnnCursor {
            index: self,
            query,
            heap,
            visited_cells: {
                let mut s = std::collections::HashSet::new();
                s.insert(origin);
                s
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct OrdDist<R: Real>(R);

impl<R: Real> Eq for OrdDist<R> {}

impl<R: Real> PartialOrd for OrdDist<R> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<R: Real> Ord for OrdDist<R> {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed so that `BinaryHeap` (a max-heap) behaves as a min-heap on distance.
        other.0.partial_cmp(&self.0).unwrap_or(Ordering::Equal)
    }
}

#[derive(Debug, Clone, Copy)]
enum Item {
    Cell(CellIndex),
    Point(u32),
}

struct HeapEntry<R: Real> {
    key: OrdDist<R>,
    item: Item,
}

impl<R: Real> PartialEq for HeapEntry<R> {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}
impl<R: Real> Eq for HeapEntry<R> {}
impl<R: Real> PartialOrd for HeapEntry<R> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl<R: Real> Ord for HeapEntry<R> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key.cmp(&other.key)
    }
}

/// A lazy, best-first cursor yielding `(id, dist_squared)` pairs in strictly non-decreasing
/// distance order.
///
/// Expansion to neighboring cells happens lazily, only as cells are popped off the queue, so a
/// caller that stops early (e.g. as soon as a density threshold is satisfied) never pays for
/// cells farther than what it actually consumed.
pub struct KnnCursor<'a, R: Real> {
    index: &'a SpatialIndex<R>,
    query: Vector3<R>,
    heap: BinaryHeap<HeapEntry<R>>,
    visited_cells: std::collections::HashSet<CellIndex>,
}

impl<'a, R: Real> KnnCursor<'a, R> {
    fn cell_lower_bound_dist2(&self, cell: CellIndex) -> R {
        let min = self.index.aabb.min();
        let cs = self.index.cell_size;
        let lo = Vector3::new(
            min.x + R::from(cell.0).unwrap() * cs.x,
            min.y + R::from(cell.1).unwrap() * cs.y,
            min.z + R::from(cell.2).unwrap() * cs.z,
        );
        let hi = lo + cs;
        let mut d2 = R::zero();
        for i in 0..3 {
            let (q, l, h) = (self.query[i], lo[i], hi[i]);
            let diff = if q < l {
                l - q
            } else if q > h {
                q - h
            } else {
                R::zero()
            };
            d2 += diff * diff;
        }
        d2
    }

    fn push_neighbors(&mut self, cell: CellIndex) {
        let r = self.index.resolution as i32;
        for (dx, dy, dz) in itertools::iproduct!(-1..=1, -1..=1, -1..=1) {
            if dx == 0 && dy == 0 && dz == 0 {
                continue;
            }
            let n = (cell.0 + dx, cell.1 + dy, cell.2 + dz);
            if n.0 < 0 || n.1 < 0 || n.2 < 0 || n.0 >= r || n.1 >= r || n.2 >= r {
                continue;
            }
            if self.visited_cells.insert(n) {
                let d2 = self.cell_lower_bound_dist2(n);
                self.heap.push(HeapEntry {
                    key: OrdDist(d2),
                    item: Item::Cell(n),
                });
            }
        }
    }

    pub fn done(&self) -> bool {
        self.heap.is_empty()
    }

    /// Pops and returns the next-nearest `(id, dist_squared)` pair, or `None` once the whole
    /// index has been exhausted.
    pub fn next(&mut self) -> Option<(u32, R)> {
        loop {
            let entry = self.heap.pop()?;
            match entry.item {
                Item::Point(id) => return Some((id, entry.key.0)),
                Item::Cell(cell) => {
                    if let Some(ids) = self.index.cells.get(&cell) {
                        for &id in ids {
                            let d2 = (self.index.point(id) - self.query).norm_squared();
                            self.heap.push(HeapEntry {
                                key: OrdDist(d2),
                                item: Item::Point(id),
                            });
                        }
                    }
                    self.push_neighbors(cell);
                }
            }
        }
    }
}

impl<'a, R: Real> Iterator for KnnCursor<'a, R> {
    type Item = (u32, R);

    fn next(&mut self) -> Option<Self::Item> {
        KnnCursor::next(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nearest_neighbor_order_is_correct() {
        let points: Vec<Vector3<f64>> = vec![
            Vector3::new(0.0, 0.0, 0.0),
            Vector3::new(1.0, 0.0, 0.0),
            Vector3::new(5.0, 0.0, 0.0),
            Vector3::new(0.0, 5.0, 0.0),
            Vector3::new(0.9, 0.1, 0.0),
        ];
        let index = SpatialIndex::build(&points);
        let mut cursor = index.search(Vector3::new(0.0, 0.0, 0.0));
        let mut order = Vec::new();
        while let Some((id, _)) = cursor.next() {
            order.push(id);
        }
        assert_eq!(order.len(), points.len());
        assert_eq!(order[0], 0);
        let mut last = 0.0;
        for &id in &order {
            let d2 = points[id as usize].norm_squared();
            assert!(d2 >= last - 1e-9);
            last = d2;
        }
    }

    #[test]
    fn resolution_buckets_match_spec() {
        assert_eq!(grid_resolution_for_count(10), 20);
        assert_eq!(grid_resolution_for_count(5_000), 20);
        assert_eq!(grid_resolution_for_count(5_001), 36);
        assert_eq!(grid_resolution_for_count(100_000), 36);
        assert_eq!(grid_resolution_for_count(100_001), 60);
    }
}
