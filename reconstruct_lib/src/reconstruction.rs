//! Orchestration of the full reconstruction pipeline: tangent-plane estimation, orientation
//! propagation, and grid contouring, in sequence.

use std::time::Duration;

use log::debug;
use nalgebra::Vector3;

use crate::aabb::AxisAlignedBoundingBox3d;
use crate::marching_cubes::ContouringEngine;
use crate::orientation::{propagate_orientation, OrientationError};
use crate::signed_distance::SignedDistanceOracle;
use crate::spatial_index::{grid_resolution_for_count, SpatialIndex};
use crate::tangent_plane::estimate_tangent_planes;
use crate::workspace::LocalReconstructionWorkspace;
use crate::{numeric_types::Real, Parameters};

/// Per-stage wall-clock timings for one reconstruction run, used by the CLI's timing log.
#[derive(Clone, Copy, Debug, Default)]
pub struct StageTimings {
    pub tangent_plane: Duration,
    pub orientation: Duration,
    pub contouring: Duration,
}

/// Diagnostics produced alongside the mesh by one reconstruction run.
#[derive(Clone, Copy, Debug, Default)]
pub struct ReconstructionDiagnostics {
    pub degenerate_neighborhood_count: usize,
    pub contour_region_count: usize,
}

/// Runs the full pipeline, writing its mesh and reusable buffers into `workspace`.
pub(crate) fn run_pipeline<R: Real>(
    points: &[Vector3<R>],
    parameters: &Parameters<R>,
    workspace: &mut LocalReconstructionWorkspace<R>,
) -> Result<(StageTimings, ReconstructionDiagnostics), OrientationError> {
    workspace.mesh.clear();
    workspace.frames.clear();
    workspace.degenerate.clear();
    workspace.origins.clear();

    let cloud_aabb = AxisAlignedBoundingBox3d::from_points(points);

    let t0 = std::time::Instant::now();
    let points_index = SpatialIndex::build(points);
    let mut estimate = estimate_tangent_planes(points, &points_index, parameters);
    let tangent_plane_elapsed = t0.elapsed();

    let t1 = std::time::Instant::now();
    propagate_orientation(&mut estimate.graph, &mut estimate.frames)?;
    let orientation_elapsed = t1.elapsed();

    workspace.frames = estimate.frames;
    workspace.degenerate = estimate.degenerate;
    workspace.origins = workspace.frames.iter().map(|f| f.origin).collect();

    let degenerate_count = workspace.degenerate.iter().filter(|&&d| d).count();

    let t2 = std::time::Instant::now();
    let origins_index = SpatialIndex::build(&workspace.origins);
    let oracle = SignedDistanceOracle::new(
        &origins_index,
        &points_index,
        &workspace.frames,
        &cloud_aabb,
        parameters.sampling_density,
        grid_diagonal(&cloud_aabb),
        parameters.enable_grid_diagonal_gate,
    );

    let mut engine = ContouringEngine::new(&oracle, cloud_aabb.expanded(R::from(0.1).unwrap()), parameters.grid_resolution);
    for origin in &workspace.origins {
        engine.march_from(origin);
    }
    let region_count = engine.region_count();
    workspace.mesh = engine.mesh().clone();
    let contouring_elapsed = t2.elapsed();

    debug!(
        "reconstruction pipeline: {} samples, grid resolution {}, {} degenerate neighborhoods, {} contour region(s)",
        points.len(),
        grid_resolution_for_count(points.len()),
        degenerate_count,
        region_count
    );

    Ok((
        StageTimings {
            tangent_plane: tangent_plane_elapsed,
            orientation: orientation_elapsed,
            contouring: contouring_elapsed,
        },
        ReconstructionDiagnostics {
            degenerate_neighborhood_count: degenerate_count,
            contour_region_count: region_count,
        },
    ))
}

fn grid_diagonal<R: Real>(aabb: &AxisAlignedBoundingBox3d<R>) -> R {
    aabb.extents().norm()
}
