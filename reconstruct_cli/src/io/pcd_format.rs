//! A minimal reader/writer for the tool's own plain-text point-cloud format: a point count on
//! the first line, followed by one whitespace-separated `x y z` triplet per line.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use anyhow::{bail, Context};
use nalgebra::Vector3;

/// Loads a point cloud from the given path, returning its positions.
pub fn load_pcd(path: &Path) -> anyhow::Result<Vec<Vector3<f64>>> {
    let file = File::open(path)
        .with_context(|| format!("failed to open point cloud file '{}'", path.display()))?;
    let mut reader = BufReader::new(file);

    let mut header = String::new();
    reader
        .read_line(&mut header)
        .with_context(|| format!("failed to read header of '{}'", path.display()))?;
    let n: usize = header
        .trim()
        .parse()
        .with_context(|| format!("invalid point count header in '{}'", path.display()))?;

    let mut points = Vec::with_capacity(n);
    for (line_no, line) in reader.lines().enumerate() {
        let line = line.with_context(|| format!("failed to read '{}'", path.display()))?;
        if line.trim().is_empty() {
            continue;
        }
        let coords: Vec<&str> = line.split_whitespace().collect();
        if coords.len() != 3 {
            bail!(
                "malformed point on line {} of '{}': expected 3 coordinates, found {}",
                line_no + 2,
                path.display(),
                coords.len()
            );
        }
        let x: f64 = coords[0]
            .parse()
            .with_context(|| format!("invalid x coordinate on line {}", line_no + 2))?;
        let y: f64 = coords[1]
            .parse()
            .with_context(|| format!("invalid y coordinate on line {}", line_no + 2))?;
        let z: f64 = coords[2]
            .parse()
            .with_context(|| format!("invalid z coordinate on line {}", line_no + 2))?;
        points.push(Vector3::new(x, y, z));
    }

    if points.len() != n {
        bail!(
            "'{}' declared {} points in its header but contained {}",
            path.display(),
            n,
            points.len()
        );
    }

    Ok(points)
}

/// Writes a point cloud to the given path in the same format [`load_pcd`] reads.
pub fn write_pcd(path: &Path, points: &[Vector3<f64>]) -> anyhow::Result<()> {
    let file = File::create(path)
        .with_context(|| format!("failed to create point cloud file '{}'", path.display()))?;
    let mut writer = BufWriter::new(file);
    writeln!(writer, "{}", points.len())?;
    for p in points {
        writeln!(writer, "{} {} {}", p.x, p.y, p.z)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_then_load_round_trips_points() {
        let dir = std::env::temp_dir();
        let path = dir.join(format!("reconstruct_cli_pcd_roundtrip_{}.pcd", std::process::id()));
        let points = vec![
            Vector3::new(0.0, 0.0, 0.0),
            Vector3::new(1.5, -2.0, 3.25),
            Vector3::new(-1.0, 1.0, -1.0),
        ];

        write_pcd(&path, &points).unwrap();
        let loaded = load_pcd(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(loaded, points);
    }

    #[test]
    fn header_count_mismatch_is_an_error() {
        let dir = std::env::temp_dir();
        let path = dir.join(format!("reconstruct_cli_pcd_mismatch_{}.pcd", std::process::id()));
        std::fs::write(&path, "2\n0.0 0.0 0.0\n").unwrap();

        let result = load_pcd(&path);
        std::fs::remove_file(&path).ok();

        assert!(result.is_err());
    }
}
