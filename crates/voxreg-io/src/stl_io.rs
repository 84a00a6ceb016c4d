//! Binary STL surface export.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use byteorder::{LittleEndian, WriteBytesExt};
use voxreg_core::mesh::Mesh;

use crate::error::Result;

/// Write the triangle cells of a mesh as binary STL.
///
/// Non-triangle cells are skipped; facet normals come from the vertex
/// winding (zero for degenerate triangles, which STL viewers tolerate).
pub fn write_stl<P: AsRef<Path>>(path: P, mesh: &Mesh) -> Result<()> {
    let triangles = mesh.triangle_cells();
    let mut out = BufWriter::new(File::create(path)?);

    let mut header = [0u8; 80];
    let tag = b"voxreg surface";
    header[..tag.len()].copy_from_slice(tag);
    out.write_all(&header)?;
    out.write_u32::<LittleEndian>(triangles.len() as u32)?;

    let points = mesh.points();
    for [a, b, c] in triangles {
        let pa = points[a].to_array();
        let pb = points[b].to_array();
        let pc = points[c].to_array();

        let u = [pb[0] - pa[0], pb[1] - pa[1], pb[2] - pa[2]];
        let v = [pc[0] - pa[0], pc[1] - pa[1], pc[2] - pa[2]];
        let mut n = [
            u[1] * v[2] - u[2] * v[1],
            u[2] * v[0] - u[0] * v[2],
            u[0] * v[1] - u[1] * v[0],
        ];
        let norm = (n[0] * n[0] + n[1] * n[1] + n[2] * n[2]).sqrt();
        if norm > 1e-12 {
            for c in &mut n {
                *c /= norm;
            }
        } else {
            n = [0.0; 3];
        }

        for c in n {
            out.write_f32::<LittleEndian>(c as f32)?;
        }
        for p in [pa, pb, pc] {
            for c in p {
                out.write_f32::<LittleEndian>(c as f32)?;
            }
        }
        out.write_u16::<LittleEndian>(0)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;
    use voxreg_core::mesh::CellType;
    use voxreg_core::spatial::Point3;

    #[test]
    fn test_stl_size_and_count() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("surface.stl");

        let mut mesh = Mesh::new(vec![
            Point3::new([0.0, 0.0, 0.0]),
            Point3::new([1.0, 0.0, 0.0]),
            Point3::new([0.0, 1.0, 0.0]),
            Point3::new([0.0, 0.0, 1.0]),
        ]);
        mesh.add_cell(CellType::Triangle, &[0, 1, 2]).unwrap();
        mesh.add_cell(CellType::Triangle, &[0, 1, 3]).unwrap();
        mesh.add_cell(CellType::Line, &[0, 1]).unwrap();

        write_stl(&path, &mesh).unwrap();

        let bytes = std::fs::read(&path).unwrap();
        // 80-byte header + count + 2 facets of 50 bytes.
        assert_eq!(bytes.len(), 80 + 4 + 2 * 50);
        assert_eq!(u32::from_le_bytes(bytes[80..84].try_into().unwrap()), 2);
    }
}
