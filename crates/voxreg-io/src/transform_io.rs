//! Plain-text affine matrix dumps.
//!
//! One `# transform N` comment line followed by the four rows of the 4x4
//! matrix, eight decimals per entry. Files may hold several transforms.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use nalgebra::Matrix4;
use voxreg_core::transform::Affine;

use crate::error::{IoError, Result};

pub fn write_transforms<P: AsRef<Path>>(path: P, transforms: &[Affine]) -> Result<()> {
    let mut out = BufWriter::new(File::create(path)?);
    for (i, transform) in transforms.iter().enumerate() {
        writeln!(out, "# transform {i}")?;
        let m = transform.matrix();
        for r in 0..4 {
            writeln!(
                out,
                "{:.8} {:.8} {:.8} {:.8}",
                m[(r, 0)],
                m[(r, 1)],
                m[(r, 2)],
                m[(r, 3)]
            )?;
        }
    }
    Ok(())
}

pub fn read_transforms<P: AsRef<Path>>(path: P) -> Result<Vec<Affine>> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path)?;

    let mut transforms = Vec::new();
    let mut rows: Vec<[f64; 4]> = Vec::new();

    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let values: Vec<f64> = line
            .split_whitespace()
            .map(|t| {
                t.parse()
                    .map_err(|_| IoError::parse(path, format!("bad number {t:?}")))
            })
            .collect::<Result<_>>()?;
        if values.len() != 4 {
            return Err(IoError::parse(
                path,
                format!("expected 4 entries per row, got {}", values.len()),
            ));
        }
        rows.push([values[0], values[1], values[2], values[3]]);

        if rows.len() == 4 {
            let m = Matrix4::from_fn(|r, c| rows[r][c]);
            transforms.push(Affine::from_matrix(m));
            rows.clear();
        }
    }

    if !rows.is_empty() {
        return Err(IoError::parse(path, "truncated matrix at end of file"));
    }
    Ok(transforms)
}
