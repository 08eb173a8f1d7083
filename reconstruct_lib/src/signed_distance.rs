//! The implicit signed-distance field defined by a set of oriented tangent planes.

use nalgebra::Vector3;

use crate::aabb::AxisAlignedBoundingBox3d;
use crate::numeric_types::Real;
use crate::spatial_index::SpatialIndex;
use crate::tangent_plane::TangentFrame;

/// Result of evaluating the signed-distance oracle at a point.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SignedDistance<R: Real> {
    Defined(R),
    Undefined,
}

/// Evaluates the signed distance to the nearest oriented tangent plane, subject to the
/// bounding-box and sampling-density validity gates (and, optionally, the grid-diagonal gate).
///
/// Construction is cheap: both spatial indices it wraps are built once by the caller and
/// shared across however many points the oracle is asked to evaluate.
pub struct SignedDistanceOracle<'a, R: Real> {
    origins_index: &'a SpatialIndex<R>,
    points_index: &'a SpatialIndex<R>,
    frames: &'a [TangentFrame<R>],
    gated_aabb: AxisAlignedBoundingBox3d<R>,
    sampling_density: R,
    grid_diagonal: R,
    enable_grid_diagonal_gate: bool,
}

impl<'a, R: Real> SignedDistanceOracle<'a, R> {
    pub fn new(
        origins_index: &'a SpatialIndex<R>,
        points_index: &'a SpatialIndex<R>,
        frames: &'a [TangentFrame<R>],
        cloud_aabb: &AxisAlignedBoundingBox3d<R>,
        sampling_density: R,
        grid_diagonal: R,
        enable_grid_diagonal_gate: bool,
    ) -> Self {
        Self {
            origins_index,
            points_index,
            frames,
            gated_aabb: cloud_aabb.expanded(R::from(0.1).unwrap()),
            sampling_density,
            grid_diagonal,
            enable_grid_diagonal_gate,
        }
    }

    /// Evaluates the signed distance at `p`, returning the typed [`SignedDistance`] result.
    ///
    /// This is the public boundary: internally the contouring engine's hot path uses
    /// [`Self::eval_raw`] instead, which returns a sentinel float rather than an enum so that
    /// per-corner evaluation in tight loops avoids the branch-on-enum overhead; the sentinel
    /// never reaches calling code outside this module.
    pub fn eval(&self, p: &Vector3<R>) -> SignedDistance<R> {
        let raw = self.eval_raw(p);
        if raw.is_sentinel() {
            SignedDistance::Undefined
        } else {
            SignedDistance::Defined(raw)
        }
    }

    pub(crate) fn eval_raw(&self, p: &Vector3<R>) -> R {
        let mut cursor = self.origins_index.search(*p);
        let nearest_origin_id = match cursor.next() {
            Some((id, _)) => id,
            None => return R::sentinel(),
        };
        let frame = &self.frames[nearest_origin_id as usize];

        let dis = (p - frame.origin).dot(&frame.normal);
        let proj = p - frame.normal * dis;

        if !self.gated_aabb.contains(&proj) {
            return R::sentinel();
        }

        let mut density_cursor = self.points_index.search(proj);
        let density2 = match density_cursor.next() {
            Some((_, d2)) => d2,
            None => return R::sentinel(),
        };
        if density2 > self.sampling_density * self.sampling_density {
            return R::sentinel();
        }

        if self.enable_grid_diagonal_gate {
            let mut nearest_cursor = self.points_index.search(*p);
            if let Some((_, d2)) = nearest_cursor.next() {
                let limit = R::from(1.44).unwrap() * self.grid_diagonal * self.grid_diagonal;
                if d2 > limit {
                    return R::sentinel();
                }
            }
        }

        dis
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tangent_plane::estimate_tangent_planes;
    use crate::Parameters;

    #[test]
    fn flat_plane_gives_zero_crossing_at_surface() {
        let mut points = Vec::new();
        for x in -5..=5 {
            for y in -5..=5 {
                points.push(Vector3::new(x as f64 * 0.1, y as f64 * 0.1, 0.0));
            }
        }
        let cloud_aabb = AxisAlignedBoundingBox3d::from_points(&points);
        let index = SpatialIndex::build(&points);
        let params = Parameters {
            grid_resolution: 20,
            min_k: 4,
            max_k: 20,
            sampling_density: f64::INFINITY,
            enable_grid_diagonal_gate: false,
            enable_multi_threading: false,
        };
        let estimate = estimate_tangent_planes(&points, &index, &params);
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

        match oracle.eval(&Vector3::new(0.0, 0.0, 0.0)) {
            SignedDistance::Defined(d) => approx::assert_abs_diff_eq!(d, 0.0, epsilon = 1e-6),
            SignedDistance::Undefined => panic!("expected a defined value on the surface"),
        }
    }

    #[test]
    fn far_outside_cloud_bounding_box_is_undefined() {
        let points = vec![
            Vector3::new(0.0, 0.0, 0.0),
            Vector3::new(1.0, 0.0, 0.0),
            Vector3::new(0.0, 1.0, 0.0),
            Vector3::new(1.0, 1.0, 0.0),
        ];
        let cloud_aabb = AxisAlignedBoundingBox3d::from_points(&points);
        let index = SpatialIndex::build(&points);
        let params = Parameters {
            grid_resolution: 20,
            min_k: 3,
            max_k: 4,
            sampling_density: f64::INFINITY,
            enable_grid_diagonal_gate: false,
            enable_multi_threading: false,
        };
        let estimate = estimate_tangent_planes(&points, &index, &params);
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

        let far = Vector3::new(1000.0, 1000.0, 1000.0);
        assert_eq!(oracle.eval(&far), SignedDistance::Undefined);
    }
}
