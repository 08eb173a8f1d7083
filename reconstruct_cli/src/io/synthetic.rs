//! Synthetic sphere/cube point-cloud generators, used by `--emit-synthetic` to produce quick
//! test fixtures without needing a real scan.

use nalgebra::Vector3;
use rand::Rng;

pub fn sphere(n_points: usize, radius: f64) -> Vec<Vector3<f64>> {
    let mut rng = rand::thread_rng();
    let mut points = Vec::with_capacity(n_points);
    for _ in 0..n_points {
        let u: f64 = rng.gen_range(-1.0..1.0);
        let theta: f64 = rng.gen_range(0.0..std::f64::consts::TAU);
        let r = (1.0 - u * u).sqrt();
        points.push(Vector3::new(
            radius * r * theta.cos(),
            radius * r * theta.sin(),
            radius * u,
        ));
    }
    points
}

pub fn cube(n_points: usize, half_extent: f64) -> Vec<Vector3<f64>> {
    let mut rng = rand::thread_rng();
    let mut points = Vec::with_capacity(n_points);
    for _ in 0..n_points {
        // Pick a uniformly random face, then a uniformly random point on it.
        let face = rng.gen_range(0..6);
        let (a, b): (f64, f64) = (
            rng.gen_range(-half_extent..half_extent),
            rng.gen_range(-half_extent..half_extent),
        );
        let p = match face {
            0 => Vector3::new(half_extent, a, b),
            1 => Vector3::new(-half_extent, a, b),
            2 => Vector3::new(a, half_extent, b),
            3 => Vector3::new(a, -half_extent, b),
            4 => Vector3::new(a, b, half_extent),
            _ => Vector3::new(a, b, -half_extent),
        };
        points.push(p);
    }
    points
}
