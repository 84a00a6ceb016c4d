//! XML unstructured-grid (`.vtu`) IO, ASCII encoding.
//!
//! Hand-rolled for the subset the pipeline needs: one Piece with Points,
//! Cells (connectivity / offsets / types) and per-point Float64 arrays.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use voxreg_core::mesh::{CellType, Mesh};
use voxreg_core::spatial::Point3;

use crate::error::{IoError, Result};

pub fn write_vtu<P: AsRef<Path>>(path: P, mesh: &Mesh) -> Result<()> {
    let path = path.as_ref();
    let mut out = BufWriter::new(File::create(path)?);

    writeln!(out, r#"<?xml version="1.0"?>"#)?;
    writeln!(
        out,
        r#"<VTKFile type="UnstructuredGrid" version="0.1" byte_order="LittleEndian">"#
    )?;
    writeln!(out, "  <UnstructuredGrid>")?;
    writeln!(
        out,
        r#"    <Piece NumberOfPoints="{}" NumberOfCells="{}">"#,
        mesh.num_points(),
        mesh.num_cells()
    )?;

    writeln!(out, "      <Points>")?;
    writeln!(
        out,
        r#"        <DataArray type="Float64" NumberOfComponents="3" format="ascii">"#
    )?;
    for p in mesh.points() {
        writeln!(out, "          {} {} {}", p[0], p[1], p[2])?;
    }
    writeln!(out, "        </DataArray>")?;
    writeln!(out, "      </Points>")?;

    writeln!(out, "      <Cells>")?;
    writeln!(
        out,
        r#"        <DataArray type="Int64" Name="connectivity" format="ascii">"#
    )?;
    let connectivity: Vec<String> = mesh.connectivity().iter().map(|i| i.to_string()).collect();
    writeln!(out, "          {}", connectivity.join(" "))?;
    writeln!(out, "        </DataArray>")?;
    writeln!(
        out,
        r#"        <DataArray type="Int64" Name="offsets" format="ascii">"#
    )?;
    let offsets: Vec<String> = mesh.offsets().iter().map(|o| o.to_string()).collect();
    writeln!(out, "          {}", offsets.join(" "))?;
    writeln!(out, "        </DataArray>")?;
    writeln!(
        out,
        r#"        <DataArray type="UInt8" Name="types" format="ascii">"#
    )?;
    let types: Vec<String> = mesh
        .cell_types()
        .iter()
        .map(|t| t.vtk_id().to_string())
        .collect();
    writeln!(out, "          {}", types.join(" "))?;
    writeln!(out, "        </DataArray>")?;
    writeln!(out, "      </Cells>")?;

    writeln!(out, "      <PointData>")?;
    for (name, values) in mesh.point_scalars() {
        writeln!(
            out,
            r#"        <DataArray type="Float64" Name="{name}" format="ascii">"#
        )?;
        let text: Vec<String> = values.iter().map(|v| v.to_string()).collect();
        writeln!(out, "          {}", text.join(" "))?;
        writeln!(out, "        </DataArray>")?;
    }
    for (name, values) in mesh.point_vectors() {
        writeln!(
            out,
            r#"        <DataArray type="Float64" Name="{name}" NumberOfComponents="3" format="ascii">"#
        )?;
        for v in values {
            writeln!(out, "          {} {} {}", v[0], v[1], v[2])?;
        }
        writeln!(out, "        </DataArray>")?;
    }
    writeln!(out, "      </PointData>")?;

    writeln!(out, "    </Piece>")?;
    writeln!(out, "  </UnstructuredGrid>")?;
    writeln!(out, "</VTKFile>")?;
    Ok(())
}

pub fn read_vtu<P: AsRef<Path>>(path: P) -> Result<Mesh> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path)?;
    if !text.contains("UnstructuredGrid") {
        return Err(IoError::UnsupportedFormat(format!(
            "{}: not an unstructured grid",
            path.display()
        )));
    }

    let points_xml = section(&text, "Points")
        .ok_or_else(|| IoError::parse(path, "missing <Points> section"))?;
    let cells_xml = section(&text, "Cells")
        .ok_or_else(|| IoError::parse(path, "missing <Cells> section"))?;

    let point_values = data_arrays(points_xml, path)?
        .into_iter()
        .next()
        .ok_or_else(|| IoError::parse(path, "missing point coordinates"))?
        .1;
    if point_values.len() % 3 != 0 {
        return Err(IoError::parse(path, "point array not divisible by 3"));
    }
    let points: Vec<Point3> = point_values
        .chunks_exact(3)
        .map(|c| Point3::new([c[0], c[1], c[2]]))
        .collect();

    let cell_arrays: HashMap<String, Vec<f64>> = data_arrays(cells_xml, path)?
        .into_iter()
        .map(|(attrs, values)| {
            (
                attrs.get("Name").cloned().unwrap_or_default(),
                values,
            )
        })
        .collect();
    let connectivity = cell_arrays
        .get("connectivity")
        .ok_or_else(|| IoError::parse(path, "missing connectivity"))?;
    let offsets = cell_arrays
        .get("offsets")
        .ok_or_else(|| IoError::parse(path, "missing offsets"))?;
    let types = cell_arrays
        .get("types")
        .ok_or_else(|| IoError::parse(path, "missing cell types"))?;
    if offsets.len() != types.len() {
        return Err(IoError::parse(path, "offsets and types disagree"));
    }

    let mut mesh = Mesh::new(points);
    let mut start = 0usize;
    for (offset, kind) in offsets.iter().zip(types.iter()) {
        let end = *offset as usize;
        if end > connectivity.len() || end < start {
            return Err(IoError::parse(path, "offsets out of range"));
        }
        let indices: Vec<usize> = connectivity[start..end].iter().map(|&v| v as usize).collect();
        let cell_type = CellType::from_vtk_id(*kind as u8)?;
        mesh.add_cell(cell_type, &indices)?;
        start = end;
    }

    if let Some(point_data) = section(&text, "PointData") {
        for (attrs, values) in data_arrays(point_data, path)? {
            let Some(name) = attrs.get("Name").cloned() else {
                continue;
            };
            let components = attrs
                .get("NumberOfComponents")
                .and_then(|c| c.parse::<usize>().ok())
                .unwrap_or(1);
            if components == 3 {
                if values.len() % 3 != 0 {
                    return Err(IoError::parse(path, format!("vector array {name} truncated")));
                }
                let vectors: Vec<[f64; 3]> = values
                    .chunks_exact(3)
                    .map(|c| [c[0], c[1], c[2]])
                    .collect();
                mesh.attach_vectors(name, vectors)?;
            } else {
                mesh.attach_scalars(name, values)?;
            }
        }
    }

    Ok(mesh)
}

/// Slice of `text` between `<tag ...>` and `</tag>`.
fn section<'a>(text: &'a str, tag: &str) -> Option<&'a str> {
    let open = format!("<{tag}");
    let close = format!("</{tag}>");
    let start = text.find(&open)?;
    let body_start = start + text[start..].find('>')? + 1;
    let end = body_start + text[body_start..].find(&close)?;
    Some(&text[body_start..end])
}

/// All DataArray blocks in a section: (attributes, parsed numbers).
fn data_arrays(xml: &str, path: &Path) -> Result<Vec<(HashMap<String, String>, Vec<f64>)>> {
    let mut out = Vec::new();
    let mut rest = xml;

    while let Some(start) = rest.find("<DataArray") {
        let after_tag = &rest[start..];
        let header_end = after_tag
            .find('>')
            .ok_or_else(|| IoError::parse(path, "unterminated DataArray tag"))?;
        let header = &after_tag[..header_end];
        let body_start = header_end + 1;
        let body_end = after_tag[body_start..]
            .find("</DataArray>")
            .ok_or_else(|| IoError::parse(path, "unterminated DataArray body"))?;
        let body = &after_tag[body_start..body_start + body_end];

        let attrs = parse_attributes(header);
        if attrs.get("format").map(String::as_str).unwrap_or("ascii") != "ascii" {
            return Err(IoError::UnsupportedFormat(format!(
                "{}: non-ascii DataArray",
                path.display()
            )));
        }

        let mut values = Vec::new();
        for token in body.split_whitespace() {
            let v: f64 = token
                .parse()
                .map_err(|_| IoError::parse(path, format!("bad number {token:?}")))?;
            values.push(v);
        }
        out.push((attrs, values));

        rest = &after_tag[body_start + body_end..];
    }
    Ok(out)
}

fn parse_attributes(header: &str) -> HashMap<String, String> {
    let mut attrs = HashMap::new();
    let mut rest = header;
    while let Some(eq) = rest.find('=') {
        let key = rest[..eq]
            .rsplit(|c: char| c.is_whitespace() || c == '<')
            .next()
            .unwrap_or("")
            .to_string();
        let after = &rest[eq + 1..];
        let Some(quote_start) = after.find('"') else { break };
        let Some(quote_end) = after[quote_start + 1..].find('"') else {
            break;
        };
        let value = after[quote_start + 1..quote_start + 1 + quote_end].to_string();
        if !key.is_empty() {
            attrs.insert(key, value);
        }
        rest = &after[quote_start + 1 + quote_end + 1..];
    }
    attrs
}
