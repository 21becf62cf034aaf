//! Wavefront OBJ export of a posed mesh.

use crate::error::SmplError;
use ndarray as nd;
use ndarray::prelude::*;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Writes vertices and triangles as ASCII OBJ: fixed six-digit floats,
/// one-based indices, LF line endings, no normals or materials.
pub fn write_obj<W: Write>(
    out: &mut W,
    verts: &ArrayView2<f32>,
    faces: &ArrayView2<u32>,
) -> Result<(), SmplError> {
    writeln!(out, "# Generated by smplrig")?;
    writeln!(out, "o body")?;
    for v in verts.axis_iter(nd::Axis(0)) {
        writeln!(out, "v {:.6} {:.6} {:.6}", v[0], v[1], v[2])?;
    }
    writeln!(out, "s 1")?;
    for f in faces.axis_iter(nd::Axis(0)) {
        writeln!(out, "f {} {} {}", f[0] + 1, f[1] + 1, f[2] + 1)?;
    }
    out.flush()?;
    Ok(())
}

/// Writes the mesh to `path`, failing with an i/o error when the target is
/// unwriteable.
pub fn save_obj(
    path: &Path,
    verts: &ArrayView2<f32>,
    faces: &ArrayView2<u32>,
) -> Result<(), SmplError> {
    let file = std::fs::File::create(path)?;
    let mut out = BufWriter::new(file);
    write_obj(&mut out, verts, faces)
}
