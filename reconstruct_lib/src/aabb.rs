//! Axis-aligned bounding box over 3D points.

use nalgebra::Vector3;

use crate::numeric_types::Real;

/// An axis-aligned bounding box in 3D, stored as its min and max corners.
#[derive(Clone, Debug, PartialEq)]
pub struct AxisAlignedBoundingBox3d<R: Real> {
    min: Vector3<R>,
    max: Vector3<R>,
}

impl<R: Real> AxisAlignedBoundingBox3d<R> {
    pub fn new(min: Vector3<R>, max: Vector3<R>) -> Self {
        Self { min, max }
    }

    /// Computes the smallest AABB enclosing the given points.
    ///
    /// Panics if `points` is empty; this mirrors the teacher library's own `from_points`,
    /// which is only ever called on a non-empty input point set.
    pub fn from_points(points: &[Vector3<R>]) -> Self {
        let mut min = points[0];
        let mut max = points[0];
        for p in points.iter().skip(1) {
            for i in 0..3 {
                if p[i] < min[i] {
                    min[i] = p[i];
                }
                if p[i] > max[i] {
                    max[i] = p[i];
                }
            }
        }
        Self { min, max }
    }

    pub fn min(&self) -> &Vector3<R> {
        &self.min
    }

    pub fn max(&self) -> &Vector3<R> {
        &self.max
    }

    pub fn extents(&self) -> Vector3<R> {
        self.max - self.min
    }

    /// Returns a new AABB expanded uniformly on every side by `margin`.
    pub fn expanded(&self, margin: R) -> Self {
        let m = Vector3::new(margin, margin, margin);
        Self {
            min: self.min - m,
            max: self.max + m,
        }
    }

    pub fn contains(&self, p: &Vector3<R>) -> bool {
        (0..3).all(|i| p[i] >= self.min[i] && p[i] <= self.max[i])
    }
}
