mod io;

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use log::info;

use reconstruct_lib::{reconstruct_surface, Parameters};

/// Reconstructs a triangular surface mesh from an unorganized 3D point cloud.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Path to the input point cloud file (plain-text `.pcd`: a count line followed by one
    /// `x y z` triplet per line). Not required when `--emit-synthetic` is given.
    point_cloud: Option<PathBuf>,

    /// Number of cells per axis of the marching-cubes background grid.
    gridsize: usize,

    /// Writes the reconstructed mesh here instead of `<point_cloud>.obj`.
    #[arg(long)]
    output: Option<PathBuf>,

    /// Minimum neighborhood size used for tangent-plane estimation.
    #[arg(long, default_value_t = 4)]
    min_k: usize,

    /// Maximum neighborhood size used for tangent-plane estimation.
    #[arg(long, default_value_t = 20)]
    max_k: usize,

    /// Sampling density radius; omit for no density gate (use `max_k` alone).
    #[arg(long)]
    sampling_density: Option<f64>,

    /// Enables the signed-distance oracle's grid-diagonal validity gate.
    #[arg(long, default_value_t = false)]
    enable_grid_diagonal_gate: bool,

    /// Allows tangent-plane estimation to run data-parallel across samples.
    #[arg(long, default_value_t = false)]
    enable_multi_threading: bool,

    /// Generates a synthetic sphere/cube point cloud of this many points instead of loading a
    /// file, and writes it next to the mesh output for inspection.
    #[arg(long)]
    emit_synthetic: Option<EmitSynthetic>,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
enum EmitSynthetic {
    Sphere,
    Cube,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let (name, points) = match args.emit_synthetic {
        Some(EmitSynthetic::Sphere) => {
            let points = io::synthetic::sphere(20_000, 1.0);
            let path = PathBuf::from("sphere.pcd");
            io::pcd_format::write_pcd(&path, &points)?;
            ("sphere".to_string(), points)
        }
        Some(EmitSynthetic::Cube) => {
            let points = io::synthetic::cube(20_000, 1.0);
            let path = PathBuf::from("cube.pcd");
            io::pcd_format::write_pcd(&path, &points)?;
            ("cube".to_string(), points)
        }
        None => {
            let path = args
                .point_cloud
                .context("a point cloud path is required unless --emit-synthetic is given")?;
            let points = io::pcd_format::load_pcd(&path)?;
            let name = path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| "pointcloud".to_string());
            (name, points)
        }
    };

    info!("loaded {} points for '{}'", points.len(), name);

    let parameters = Parameters {
        grid_resolution: args.gridsize,
        min_k: args.min_k,
        max_k: args.max_k,
        sampling_density: args.sampling_density.unwrap_or(f64::INFINITY),
        enable_grid_diagonal_gate: args.enable_grid_diagonal_gate,
        enable_multi_threading: args.enable_multi_threading,
    };

    let result = reconstruct_surface(&points, &parameters)
        .map_err(|e| anyhow::anyhow!("surface reconstruction failed: {}", e))?;

    info!(
        "reconstructed {} triangles ({} degenerate neighborhoods, {} contour region(s))",
        result.mesh().face_count(),
        result.degenerate_neighborhood_count(),
        result.contour_region_count()
    );

    let output_path = args
        .output
        .unwrap_or_else(|| PathBuf::from(format!("{}.obj", name)));
    io::mesh_writer::write_obj(&output_path, result.mesh())?;

    append_timing_log(&name, points.len(), args.gridsize, result.timings())?;

    Ok(())
}

fn append_timing_log(
    name: &str,
    n_points: usize,
    gridsize: usize,
    timings: reconstruct_lib::StageTimings,
) -> anyhow::Result<()> {
    use std::io::Write;

    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open("times.txt")
        .context("failed to open times.txt for appending")?;

    writeln!(
        file,
        "{} false {} {} {} {} {}",
        name,
        n_points,
        gridsize,
        timings.tangent_plane.as_secs_f64(),
        timings.orientation.as_secs_f64(),
        timings.contouring.as_secs_f64(),
    )
    .context("failed to append to times.txt")?;

    Ok(())
}
