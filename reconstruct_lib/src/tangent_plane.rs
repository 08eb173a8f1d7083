//! Per-sample tangent-plane estimation via local principal component analysis.

use log::warn;
use nalgebra::{Matrix3, SymmetricEigen, Vector3};
use smallvec::SmallVec;

use crate::graph::NeighborhoodGraph;
use crate::numeric_types::Real;
use crate::spatial_index::SpatialIndex;
use crate::Parameters;

/// Per-sample neighbor id buffer. Inline capacity matches the default `max_k` so a typical
/// gather never spills to the heap; larger `max_k` values simply spill transparently.
type NeighborIds = SmallVec<[u32; 20]>;

/// A local tangent frame estimated at one sample: its origin (the sample itself), an
/// orthonormal basis `(e0, e1)` spanning the estimated tangent plane, and a unit normal `e2`
/// whose sign is unresolved until orientation propagation runs.
#[derive(Clone, Copy, Debug)]
pub struct TangentFrame<R: Real> {
    pub origin: Vector3<R>,
    pub e0: Vector3<R>,
    pub e1: Vector3<R>,
    pub normal: Vector3<R>,
}

/// The result of tangent-plane estimation across every sample: one frame per sample, plus
/// which samples had a neighborhood too small or too degenerate to fit reliably, and the
/// neighborhood graph accumulated while gathering each sample's neighbors.
pub struct TangentPlaneEstimate<R: Real> {
    pub frames: Vec<TangentFrame<R>>,
    pub degenerate: Vec<bool>,
    pub graph: NeighborhoodGraph,
}

/// Estimates a tangent frame at every sample in `points`, gathering each sample's neighborhood
/// from `index` per [`Parameters::min_k`]/[`Parameters::max_k`]/[`Parameters::sampling_density`].
///
/// When [`Parameters::enable_multi_threading`] is set, the per-sample gather-and-fit work runs
/// in parallel via `rayon`; graph-edge insertion is always done in a subsequent sequential pass
/// over the collected neighbor lists so the resulting graph is identical regardless of whether
/// multithreading was enabled.
pub fn estimate_tangent_planes<R: Real>(
    points: &[Vector3<R>],
    index: &SpatialIndex<R>,
    parameters: &Parameters<R>,
) -> TangentPlaneEstimate<R> {
    let per_sample: Vec<(TangentFrame<R>, bool, NeighborIds)> = if parameters.enable_multi_threading {
        use rayon::prelude::*;
        (0..points.len())
            .into_par_iter()
            .map(|i| fit_one(i as u32, points, index, parameters))
            .collect()
    } else {
        (0..points.len())
            .map(|i| fit_one(i as u32, points, index, parameters))
            .collect()
    };

    let mut graph = NeighborhoodGraph::with_nodes(points.len());
    let mut frames = Vec::with_capacity(points.len());
    let mut degenerate = Vec::with_capacity(points.len());
    let mut degenerate_count = 0usize;

    for (i, (frame, is_degenerate, neighbors)) in per_sample.into_iter().enumerate() {
        for neighbor in neighbors {
            graph.insert_edge(i as u32, neighbor);
        }
        if is_degenerate {
            degenerate_count += 1;
        }
        frames.push(frame);
        degenerate.push(is_degenerate);
    }

    if degenerate_count > 0 {
        warn!(
            "tangent plane estimation: {} of {} samples had a degenerate neighborhood (fewer than 3 usable neighbors)",
            degenerate_count,
            frames.len()
        );
    }

    TangentPlaneEstimate {
        frames,
        degenerate,
        graph,
    }
}

fn fit_one<R: Real>(
    i: u32,
    points: &[Vector3<R>],
    index: &SpatialIndex<R>,
    parameters: &Parameters<R>,
) -> (TangentFrame<R>, bool, NeighborIds) {
    let p = points[i as usize];
    let mut cursor = index.search(p);

    let mut neighbors: NeighborIds = SmallVec::with_capacity(parameters.max_k);
    let density2 = parameters.sampling_density * parameters.sampling_density;

    // The query point itself is always returned by the cursor as its own nearest neighbor
    // (distance zero) and belongs in the PCA point set, exactly as the original gather pushes
    // every candidate including the query point into its neighborhood array; only the
    // *graph*-edge insertion below excludes it (`NeighborhoodGraph::insert_edge` is already a
    // no-op for `a == b`, so self-loops never appear in the neighborhood graph).
    while neighbors.len() < parameters.max_k {
        match cursor.next() {
            None => break,
            Some((id, dist2)) => {
                neighbors.push(id);
                if neighbors.len() >= parameters.min_k && dist2 > density2 {
                    break;
                }
            }
        }
    }

    if neighbors.len() < 3 {
        let frame = TangentFrame {
            origin: p,
            e0: Vector3::x(),
            e1: Vector3::y(),
            normal: Vector3::z(),
        };
        return (frame, true, neighbors);
    }

    let centroid = neighbors
        .iter()
        .map(|&j| points[j as usize])
        .fold(Vector3::zeros(), |acc, q| acc + q)
        / R::from(neighbors.len()).unwrap();

    let mut covariance = Matrix3::zeros();
    for &j in &neighbors {
        let d = points[j as usize] - centroid;
        covariance += d * d.transpose();
    }
    covariance /= R::from(neighbors.len() - 1).unwrap();

    let eigen = SymmetricEigen::new(covariance);
    // Eigenvalues are returned in no particular order; sort indices by eigenvalue ascending so
    // that e2 is the normal direction (smallest-variance axis) and e0, e1 span the tangent
    // plane in decreasing-eigenvalue order.
    let mut order = [0usize, 1, 2];
    order.sort_by(|&a, &b| {
        eigen.eigenvalues[a]
            .partial_cmp(&eigen.eigenvalues[b])
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let normal_axis = eigen.eigenvectors.column(order[0]).into_owned();
    let e0 = eigen.eigenvectors.column(order[2]).into_owned();
    let e1 = eigen.eigenvectors.column(order[1]).into_owned();
    // Re-derive the normal as e0 x e1 so the frame is guaranteed right-handed and orthonormal
    // regardless of the sign convention the eigensolver picked for each column.
    let normal = e0.cross(&e1).normalize();
    let _ = normal_axis;

    let frame = TangentFrame {
        origin: p,
        e0,
        e1,
        normal,
    };

    (frame, false, neighbors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spatial_index::SpatialIndex;

    fn default_parameters() -> Parameters<f64> {
        Parameters {
            grid_resolution: 20,
            min_k: 4,
            max_k: 20,
            sampling_density: f64::INFINITY,
            enable_grid_diagonal_gate: false,
            enable_multi_threading: false,
        }
    }

    #[test]
    fn flat_patch_recovers_normal_close_to_z() {
        let mut points = Vec::new();
        for x in -3..=3 {
            for y in -3..=3 {
                points.push(Vector3::new(x as f64 * 0.1, y as f64 * 0.1, 0.0));
            }
        }
        let index = SpatialIndex::build(&points);
        let params = default_parameters();
        let estimate = estimate_tangent_planes(&points, &index, &params);
        let center = estimate.frames[points.len() / 2];
        assert!(center.normal.z.abs() > 0.9);
        assert!(!estimate.degenerate[points.len() / 2]);
    }

    #[test]
    fn isolated_point_is_flagged_degenerate() {
        let points = vec![
            Vector3::new(0.0, 0.0, 0.0),
            Vector3::new(1000.0, 1000.0, 1000.0),
        ];
        let index = SpatialIndex::build(&points);
        let mut params = default_parameters();
        params.sampling_density = 0.01;
        params.min_k = 4;
        let estimate = estimate_tangent_planes(&points, &index, &params);
        assert!(estimate.degenerate.iter().any(|&d| d));
    }

    /// P1: every non-degenerate tangent frame carries a unit normal.
    #[test]
    fn every_normal_is_unit_length() {
        let mut points = Vec::new();
        for x in -3..=3 {
            for y in -3..=3 {
                points.push(Vector3::new(x as f64 * 0.1, y as f64 * 0.1, 0.0));
            }
        }
        let index = SpatialIndex::build(&points);
        let params = default_parameters();
        let estimate = estimate_tangent_planes(&points, &index, &params);
        for frame in &estimate.frames {
            approx::assert_abs_diff_eq!(frame.normal.norm(), 1.0, epsilon = 1e-10);
        }
    }
}
