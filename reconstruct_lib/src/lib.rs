//!
//! Library for reconstructing an approximating triangular mesh from an unorganized 3D point
//! cloud. Entry point is the [reconstruct_surface] function.
//!
//! The pipeline follows the classical approach of estimating a tangent plane at every sample
//! via local PCA, propagating a consistent normal orientation across the point cloud's
//! neighborhood graph, defining an implicit signed-distance field from the oriented planes,
//! and extracting its zero set with a marching-cubes style contouring engine.
//!

/// Re-export of the version of nalgebra used by this crate.
pub use nalgebra;

mod aabb;
mod graph;
/// Triangular half-edge mesh type produced by the contouring engine.
pub mod mesh;
/// Marching-cubes style grid contouring over the signed-distance oracle.
pub mod marching_cubes;
mod numeric_types;
/// Consistent orientation propagation across the neighborhood graph.
pub mod orientation;
/// Functions calling the individual steps of the reconstruction pipeline.
mod reconstruction;
/// The implicit signed-distance field defined by the oriented tangent planes.
pub mod signed_distance;
/// Uniform-grid spatial index with a lazy best-first k-nearest-neighbor cursor.
pub mod spatial_index;
/// Per-sample tangent-plane estimation via local principal component analysis.
pub mod tangent_plane;
/// Disjoint-set forest used by the contouring engine to merge flood-fill regions.
mod union_find;
/// Workspace for reusing allocated memory between multiple reconstructions.
pub(crate) mod workspace;

use nalgebra::Vector3;
use thiserror::Error as ThisError;

pub use aabb::AxisAlignedBoundingBox3d;
pub use mesh::HalfEdgeMesh;
pub use numeric_types::Real;
pub use orientation::OrientationError;
pub use reconstruction::{ReconstructionDiagnostics, StageTimings};

use crate::workspace::ReconstructionWorkspace;

pub(crate) type HashState = fxhash::FxBuildHasher;
pub(crate) type MapType<K, V> = std::collections::HashMap<K, V, HashState>;
pub(crate) fn new_map<K, V>() -> MapType<K, V> {
    MapType::with_hasher(HashState::default())
}

/// Parameters controlling the reconstruction pipeline.
#[derive(Clone, Copy, Debug)]
pub struct Parameters<R: Real> {
    /// Number of cells per axis of the marching-cubes background grid.
    pub grid_resolution: usize,
    /// Minimum neighborhood size gathered per sample during tangent-plane estimation.
    pub min_k: usize,
    /// Maximum neighborhood size gathered per sample during tangent-plane estimation.
    pub max_k: usize,
    /// Radius used by the sampling-density gate; `+infinity` disables it in favor of `max_k`.
    pub sampling_density: R,
    /// Whether the signed-distance oracle's grid-diagonal gate is applied.
    pub enable_grid_diagonal_gate: bool,
    /// Whether tangent-plane estimation runs data-parallel across samples.
    pub enable_multi_threading: bool,
}

impl<R: Real> Default for Parameters<R> {
    fn default() -> Self {
        Self {
            grid_resolution: 30,
            min_k: 4,
            max_k: 20,
            sampling_density: R::sentinel(),
            enable_grid_diagonal_gate: false,
            enable_multi_threading: false,
        }
    }
}

/// Result of a successful surface reconstruction.
pub struct SurfaceReconstruction<R: Real> {
    mesh: HalfEdgeMesh<R>,
    cloud_aabb: Option<AxisAlignedBoundingBox3d<R>>,
    diagnostics: ReconstructionDiagnostics,
    timings: StageTimings,
    workspace: ReconstructionWorkspace<R>,
}

impl<R: Real> Default for SurfaceReconstruction<R> {
    /// Returns an empty [SurfaceReconstruction] to pass into the inplace reconstruction.
    fn default() -> Self {
        Self {
            mesh: HalfEdgeMesh::new(),
            cloud_aabb: None,
            diagnostics: ReconstructionDiagnostics::default(),
            timings: StageTimings::default(),
            workspace: ReconstructionWorkspace::default(),
        }
    }
}

impl<R: Real> SurfaceReconstruction<R> {
    /// Returns a reference to the reconstructed mesh.
    pub fn mesh(&self) -> &HalfEdgeMesh<R> {
        &self.mesh
    }

    /// Returns the bounding box of the input point cloud, if a reconstruction has run.
    pub fn cloud_aabb(&self) -> Option<&AxisAlignedBoundingBox3d<R>> {
        self.cloud_aabb.as_ref()
    }

    /// Number of samples whose local neighborhood was too small or degenerate to fit a
    /// reliable tangent plane (a tentative cardinal-axis frame was substituted for them).
    pub fn degenerate_neighborhood_count(&self) -> usize {
        self.diagnostics.degenerate_neighborhood_count
    }

    /// Number of disjoint regions the contouring engine discovered while flood-filling from
    /// every tangent-plane origin; more than one means the reconstructed surface is not a
    /// single connected shell.
    pub fn contour_region_count(&self) -> usize {
        self.diagnostics.contour_region_count
    }

    /// Per-stage wall-clock timings of the most recent run.
    pub fn timings(&self) -> StageTimings {
        self.timings
    }
}

impl<R: Real> From<SurfaceReconstruction<R>> for HalfEdgeMesh<R> {
    /// Extracts the reconstructed mesh.
    fn from(result: SurfaceReconstruction<R>) -> Self {
        result.mesh
    }
}

/// Error type returned when the surface reconstruction fails.
#[non_exhaustive]
#[derive(Debug, ThisError)]
pub enum PipelineError {
    /// Orientation propagation left at least one sample unoriented after spanning its
    /// component's minimum spanning tree; indicates a bug in neighborhood graph construction.
    #[error("orientation propagation failed: {0}")]
    Orientation(#[from] OrientationError),
    /// The input point cloud was empty; there is nothing to reconstruct.
    #[error("cannot reconstruct a surface from an empty point cloud")]
    EmptyPointCloud,
    /// Any error that is not represented by some other explicit variant.
    #[error("unknown error")]
    Unknown(anyhow::Error),
}

impl<R: Real> From<anyhow::Error> for PipelineError
where
    R: 'static,
{
    fn from(error: anyhow::Error) -> Self {
        PipelineError::Unknown(error)
    }
}

/// Performs a surface reconstruction of the point cloud represented by the given positions.
#[inline(never)]
pub fn reconstruct_surface<R: Real>(
    points: &[Vector3<R>],
    parameters: &Parameters<R>,
) -> Result<SurfaceReconstruction<R>, PipelineError> {
    let mut surface = SurfaceReconstruction::default();
    reconstruct_surface_inplace(points, parameters, &mut surface)?;
    Ok(surface)
}

/// Performs a surface reconstruction of the point cloud represented by the given positions,
/// reusing the mesh and scratch buffers already allocated inside `output_surface`.
pub fn reconstruct_surface_inplace<R: Real>(
    points: &[Vector3<R>],
    parameters: &Parameters<R>,
    output_surface: &mut SurfaceReconstruction<R>,
) -> Result<(), PipelineError> {
    if points.is_empty() {
        return Err(PipelineError::EmptyPointCloud);
    }

    output_surface.cloud_aabb = Some(AxisAlignedBoundingBox3d::from_points(points));

    let mut workspace = output_surface
        .workspace
        .get_local_with_capacity(points.len())
        .borrow_mut();

    let (timings, diagnostics) = reconstruction::run_pipeline(points, parameters, &mut workspace)?;

    output_surface.mesh = workspace.mesh.clone();
    output_surface.timings = timings;
    output_surface.diagnostics = diagnostics;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    fn sphere_points(n: usize, center: Vector3<f64>, radius: f64, seed_offset: u64) -> Vec<Vector3<f64>> {
        let mut rng = rand::rngs::StdRng::seed_from_u64(42 + seed_offset);
        (0..n)
            .map(|_| {
                let u: f64 = rng.gen_range(-1.0..1.0);
                let theta: f64 = rng.gen_range(0.0..std::f64::consts::TAU);
                let r = (1.0 - u * u).sqrt();
                center
                    + Vector3::new(radius * r * theta.cos(), radius * r * theta.sin(), radius * u)
            })
            .collect()
    }

    use rand::SeedableRng;

    /// Scenario 3: a single sphere's point cloud reconstructs as one region whose triangles
    /// have outward-pointing normals (dot product with the radial direction is positive).
    #[test]
    fn sphere_reconstructs_single_outward_region() {
        let points = sphere_points(1200, Vector3::zeros(), 1.0, 0);
        let parameters = Parameters {
            grid_resolution: 16,
            min_k: 4,
            max_k: 20,
            sampling_density: f64::INFINITY,
            enable_grid_diagonal_gate: false,
            enable_multi_threading: false,
        };

        let result = reconstruct_surface(&points, &parameters).expect("reconstruction succeeds");
        assert!(result.mesh().face_count() > 0);
        assert_eq!(result.contour_region_count(), 1);

        let mesh = result.mesh();
        let mut outward = 0usize;
        let mut total = 0usize;
        for f in mesh.faces() {
            let [a, b, c] = mesh.face_vertices(f);
            let (pa, pb, pc) = (
                *mesh.vertex_position(a),
                *mesh.vertex_position(b),
                *mesh.vertex_position(c),
            );
            let centroid = (pa + pb + pc) / 3.0;
            let normal = (pb - pa).cross(&(pc - pa));
            if normal.dot(&centroid) > 0.0 {
                outward += 1;
            }
            total += 1;
        }
        // The vast majority of triangle normals should point away from the sphere's center;
        // a handful of boundary/degenerate cubes near the coarse grid resolution may not.
        assert!(total > 0);
        assert!((outward as f64) / (total as f64) > 0.8);
    }

    /// Scenario 4: two disjoint spheres produce exactly two disjoint contoured regions.
    #[test]
    fn two_disjoint_spheres_produce_two_regions() {
        let mut points = sphere_points(600, Vector3::new(-2.0, 0.0, 0.0), 1.0, 0);
        points.extend(sphere_points(600, Vector3::new(2.0, 0.0, 0.0), 1.0, 1));

        let parameters = Parameters {
            grid_resolution: 20,
            min_k: 4,
            max_k: 20,
            sampling_density: f64::INFINITY,
            enable_grid_diagonal_gate: false,
            enable_multi_threading: false,
        };

        let result = reconstruct_surface(&points, &parameters).expect("reconstruction succeeds");
        assert!(result.mesh().face_count() > 0);
        assert_eq!(result.contour_region_count(), 2);
    }

    /// R1: running orientation propagation again on an already-oriented cloud does not flip
    /// any normal (re-deriving the frames and MST from scratch yields the same signs).
    #[test]
    fn reorienting_an_already_oriented_cloud_is_a_no_op() {
        let points = sphere_points(300, Vector3::zeros(), 1.0, 0);
        let parameters = Parameters {
            grid_resolution: 10,
            min_k: 4,
            max_k: 20,
            sampling_density: f64::INFINITY,
            enable_grid_diagonal_gate: false,
            enable_multi_threading: false,
        };

        let index = spatial_index::SpatialIndex::build(&points);
        let mut first = tangent_plane::estimate_tangent_planes(&points, &index, &parameters);
        orientation::propagate_orientation(&mut first.graph, &mut first.frames).unwrap();
        let first_signs: Vec<bool> = first.frames.iter().map(|f| f.normal.z >= 0.0).collect();

        let mut second = tangent_plane::estimate_tangent_planes(&points, &index, &parameters);
        orientation::propagate_orientation(&mut second.graph, &mut second.frames).unwrap();
        let second_signs: Vec<bool> = second.frames.iter().map(|f| f.normal.z >= 0.0).collect();

        assert_eq!(first_signs, second_signs);
    }

    #[test]
    fn empty_point_cloud_is_a_typed_error() {
        let points: Vec<Vector3<f64>> = Vec::new();
        let parameters = Parameters::default();
        match reconstruct_surface(&points, &parameters) {
            Err(PipelineError::EmptyPointCloud) => {}
            other => panic!("expected EmptyPointCloud, got {:?}", other.map(|_| ())),
        }
    }
}
