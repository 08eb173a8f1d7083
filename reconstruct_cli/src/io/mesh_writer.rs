//! Writes the reconstructed mesh to a plain Wavefront OBJ file.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::Context;
use reconstruct_lib::mesh::HalfEdgeMesh;

pub fn write_obj(path: &Path, mesh: &HalfEdgeMesh<f64>) -> anyhow::Result<()> {
    let file = File::create(path)
        .with_context(|| format!("failed to create mesh output file '{}'", path.display()))?;
    let mut writer = BufWriter::new(file);

    for v in mesh.vertices() {
        writeln!(writer, "v {} {} {}", v.x, v.y, v.z)?;
    }
    for f in mesh.faces() {
        let [a, b, c] = mesh.face_vertices(f);
        // OBJ vertex indices are 1-based.
        writeln!(writer, "f {} {} {}", a.0 + 1, b.0 + 1, c.0 + 1)?;
    }

    Ok(())
}
