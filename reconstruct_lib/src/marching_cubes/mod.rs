//! Grid-based isosurface contouring over the signed-distance oracle.

mod marching_cubes_lut;

use std::collections::VecDeque;

use arrayvec::ArrayVec;
use nalgebra::Vector3;

use crate::aabb::AxisAlignedBoundingBox3d;
use crate::mesh::{HalfEdgeMesh, VId};
use crate::numeric_types::Real;
use crate::signed_distance::SignedDistanceOracle;
use crate::union_find::UnionFind;
use crate::{new_map, MapType};

type CubeIndex = (i32, i32, i32);

/// Local corner offsets within a cube, in the vertex numbering used by the marching cubes
/// lookup table (see the diagram in `marching_cubes_lut`).
const CORNER_OFFSETS: [(i32, i32, i32); 8] = [
    (0, 0, 0),
    (1, 0, 0),
    (1, 1, 0),
    (0, 1, 0),
    (0, 0, 1),
    (1, 0, 1),
    (1, 1, 1),
    (0, 1, 1),
];

/// The six faces of a cube, each as the four corner-local indices bounding it and the
/// neighbor cube offset across that face.
const FACES: [([usize; 4], (i32, i32, i32)); 6] = [
    ([0, 3, 4, 7], (-1, 0, 0)),
    ([1, 2, 5, 6], (1, 0, 0)),
    ([0, 1, 4, 5], (0, -1, 0)),
    ([2, 3, 6, 7], (0, 1, 0)),
    ([0, 1, 2, 3], (0, 0, -1)),
    ([4, 5, 6, 7], (0, 0, 1)),
];

const EDGES: [(usize, usize); 12] = [
    (0, 1),
    (1, 2),
    (2, 3),
    (3, 0),
    (4, 5),
    (5, 6),
    (6, 7),
    (7, 4),
    (0, 4),
    (1, 5),
    (2, 6),
    (3, 7),
];

fn pack_corner(c: (i32, i32, i32)) -> u64 {
    let gx = c.0 as u64 & 0x1f_ffff;
    let gy = c.1 as u64 & 0x1f_ffff;
    let gz = c.2 as u64 & 0x1f_ffff;
    gx | (gy << 21) | (gz << 42)
}

/// Flood-fill isosurface extractor.
///
/// Seeded once per oriented tangent-plane origin via [`Self::march_from`], it samples the
/// oracle at cube corners across a uniform `gridsize`x`gridsize`x`gridsize` lattice and emits
/// triangles for every sign-crossing cube, reusing a single corner-value cache and edge-vertex
/// map across all seeds so that the same physical cube is never processed twice.
pub struct ContouringEngine<'a, R: Real> {
    oracle: &'a SignedDistanceOracle<'a, R>,
    aabb: AxisAlignedBoundingBox3d<R>,
    gridsize: usize,
    cell_size: Vector3<R>,
    corner_cache: MapType<u64, R>,
    edge_vertices: MapType<(u64, u64), VId>,
    visited_cubes: MapType<CubeIndex, Option<u32>>,
    mesh: HalfEdgeMesh<R>,
    regions: UnionFind<u32>,
    next_region_id: u32,
}

impl<'a, R: Real> ContouringEngine<'a, R> {
    pub fn new(
        oracle: &'a SignedDistanceOracle<'a, R>,
        aabb: AxisAlignedBoundingBox3d<R>,
        gridsize: usize,
    ) -> Self {
        let n = R::from(gridsize.max(1)).unwrap();
        let extents = aabb.extents();
        let cell_size = Vector3::new(extents.x / n, extents.y / n, extents.z / n);
        Self {
            oracle,
            aabb,
            gridsize,
            cell_size,
            corner_cache: new_map(),
            edge_vertices: new_map(),
            visited_cubes: new_map(),
            mesh: HalfEdgeMesh::new(),
            regions: UnionFind::new(),
            next_region_id: 0,
        }
    }

    pub fn mesh(&self) -> &HalfEdgeMesh<R> {
        &self.mesh
    }

    /// The number of distinct regions flood-filling discovered; more than one indicates the
    /// point cloud's reconstructed surface consists of multiple disjoint shells.
    pub fn region_count(&mut self) -> usize {
        self.regions.class_count()
    }

    fn cube_containing(&self, p: &Vector3<R>) -> Option<CubeIndex> {
        let min = self.aabb.min();
        let idx = |v: R, lo: R, size: R| -> Option<i32> {
            let raw = ((v - lo) / size).floor();
            let i = num::ToPrimitive::to_i32(&raw)?;
            if i < 0 || i as usize >= self.gridsize {
                None
            } else {
                Some(i)
            }
        };
        Some((
            idx(p.x, min.x, self.cell_size.x)?,
            idx(p.y, min.y, self.cell_size.y)?,
            idx(p.z, min.z, self.cell_size.z)?,
        ))
    }

    fn corner_position(&self, corner: CubeIndex) -> Vector3<R> {
        let min = self.aabb.min();
        Vector3::new(
            min.x + R::from(corner.0).unwrap() * self.cell_size.x,
            min.y + R::from(corner.1).unwrap() * self.cell_size.y,
            min.z + R::from(corner.2).unwrap() * self.cell_size.z,
        )
    }

    fn corner_value(&mut self, corner: CubeIndex) -> R {
        let key = pack_corner(corner);
        if let Some(&v) = self.corner_cache.get(&key) {
            return v;
        }
        let p = self.corner_position(corner);
        let v = self.oracle.eval_raw(&p);
        self.corner_cache.insert(key, v);
        v
    }

    fn edge_vertex(
        &mut self,
        corner_a: CubeIndex,
        value_a: R,
        corner_b: CubeIndex,
        value_b: R,
    ) -> VId {
        let key_a = pack_corner(corner_a);
        let key_b = pack_corner(corner_b);
        let key = if key_a < key_b {
            (key_a, key_b)
        } else {
            (key_b, key_a)
        };
        if let Some(&v) = self.edge_vertices.get(&key) {
            return v;
        }
        let t = value_a / (value_a - value_b);
        let pa = self.corner_position(corner_a);
        let pb = self.corner_position(corner_b);
        let p = pa + (pb - pa) * t;
        let v = self.mesh.create_vertex(p);
        self.edge_vertices.insert(key, v);
        v
    }

    /// Finds the cube containing `seed` and flood-fills outward from it, claiming every cube
    /// it reaches under a fresh region id; if flood-fill touches a cube already claimed by a
    /// previous seed, the two regions are unified rather than reprocessed.
    pub fn march_from(&mut self, seed: &Vector3<R>) {
        let start = match self.cube_containing(seed) {
            Some(c) => c,
            None => return,
        };

        let region = self.next_region_id;
        self.next_region_id += 1;

        if let Some(&existing) = self.visited_cubes.get(&start) {
            if let Some(owner) = existing {
                self.regions.unify(region, owner);
            }
            return;
        }

        let mut queue = VecDeque::new();
        queue.push_back(start);

        while let Some(cube) = queue.pop_front() {
            if let Some(&existing) = self.visited_cubes.get(&cube) {
                if let Some(owner) = existing {
                    self.regions.unify(region, owner);
                }
                continue;
            }

            let corners: [CubeIndex; 8] = CORNER_OFFSETS
                .map(|(dx, dy, dz)| (cube.0 + dx, cube.1 + dy, cube.2 + dz));
            let values: ArrayVec<R, 8> = corners.iter().map(|&c| self.corner_value(c)).collect();

            if values.iter().any(|v| v.is_sentinel()) {
                self.visited_cubes.insert(cube, None);
                continue;
            }

            self.visited_cubes.insert(cube, Some(region));
            self.regions.make_set(region);

            let inside: [bool; 8] = {
                let mut a = [false; 8];
                for i in 0..8 {
                    a[i] = values[i] < R::zero();
                }
                a
            };

            for tri in marching_cubes_lut::marching_cubes_triangulation_iter(&inside) {
                let mut verts = [VId(0); 3];
                for (slot, &edge_idx) in tri.iter().enumerate() {
                    let (a, b) = EDGES[edge_idx as usize];
                    verts[slot] = self.edge_vertex(corners[a], values[a], corners[b], values[b]);
                }
                self.mesh.create_face(verts[0], verts[1], verts[2]);
            }

            for &(face_corners, offset) in &FACES {
                let crosses = {
                    let s0 = values[face_corners[0]] < R::zero();
                    face_corners.iter().any(|&c| (values[c] < R::zero()) != s0)
                };
                if !crosses {
                    continue;
                }
                let neighbor = (cube.0 + offset.0, cube.1 + offset.1, cube.2 + offset.2);
                if neighbor.0 < 0
                    || neighbor.1 < 0
                    || neighbor.2 < 0
                    || neighbor.0 as usize >= self.gridsize
                    || neighbor.1 as usize >= self.gridsize
                    || neighbor.2 as usize >= self.gridsize
                {
                    continue;
                }
                if !self.visited_cubes.contains_key(&neighbor) {
                    queue.push_back(neighbor);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signed_distance::SignedDistanceOracle;
    use crate::spatial_index::SpatialIndex;
    use crate::tangent_plane::estimate_tangent_planes;
    use crate::Parameters;

    #[test]
    fn flat_patch_contours_to_a_non_empty_mesh() {
        let mut points = Vec::new();
        for x in -10..=10 {
            for y in -10..=10 {
                points.push(Vector3::new(x as f64 * 0.1, y as f64 * 0.1, 0.0));
            }
        }
        let cloud_aabb = AxisAlignedBoundingBox3d::from_points(&points).expanded(0.2);
        let index = SpatialIndex::build(&points);
        let params = Parameters {
            grid_resolution: 20,
            min_k: 4,
            max_k: 20,
            sampling_density: f64::INFINITY,
            enable_grid_diagonal_gate: false,
            enable_multi_threading: false,
        };
        let mut estimate = estimate_tangent_planes(&points, &index, &params);
        crate::orientation::propagate_orientation(&mut estimate.graph, &mut estimate.frames)
            .unwrap();

        let origins: Vec<Vector3<f64>> = estimate.frames.iter().map(|f| f.origin).collect();
        let origins_index = SpatialIndex::build(&origins);

        let oracle = SignedDistanceOracle::new(
            &origins_index,
            &index,
            &estimate.frames,
            &cloud_aabb,
            f64::INFINITY,
            0.0,
            false,
        );

        let mut engine = ContouringEngine::new(&oracle, cloud_aabb, 12);
        for origin in &origins {
            engine.march_from(origin);
        }

        assert!(engine.mesh().face_count() > 0);
        assert_eq!(engine.region_count(), 1);
    }
}
