//! Legacy VTK structured-points IO (scalars and vector fields).
//!
//! Handles the subset of the legacy format the pipeline exchanges: ASCII
//! or binary STRUCTURED_POINTS datasets with SCALARS and/or VECTORS point
//! data. Binary payloads are big-endian f32, per the legacy spec.

use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::Path;

use burn::tensor::backend::Backend;
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use tracing::warn;
use voxreg_core::field::VectorField;
use voxreg_core::image::{Grid3, Image};
use voxreg_core::spatial::{Direction3, Point3, Spacing3};

use crate::error::{IoError, Result};

/// Everything we pull out of one legacy VTK file.
struct ParsedVtk {
    dims: [usize; 3],
    spacing: [f64; 3],
    origin: [f64; 3],
    scalars: Option<Vec<f32>>,
    vectors: Option<Vec<[f64; 3]>>,
}

/// Read a structured-points volume; the first SCALARS array becomes the
/// voxel data. Direction is identity (the legacy format cannot carry one).
pub fn read_structured_points<B: Backend, P: AsRef<Path>>(
    path: P,
    device: &B::Device,
) -> Result<Image<B, 3>> {
    let path = path.as_ref();
    let parsed = parse_file(path)?;
    let values = parsed
        .scalars
        .ok_or_else(|| IoError::NoScalarData(path.display().to_string()))?;

    let [nx, ny, nz] = parsed.dims;
    Ok(Image::from_raw(
        values,
        [nz, ny, nx],
        Point3::new(parsed.origin),
        Spacing3::new(parsed.spacing),
        Direction3::identity(),
        device,
    ))
}

/// Read a structured-points vector field.
pub fn read_vector_field<P: AsRef<Path>>(path: P) -> Result<VectorField> {
    let path = path.as_ref();
    let parsed = parse_file(path)?;
    let vectors = parsed
        .vectors
        .ok_or_else(|| IoError::parse(path, "no VECTORS point data"))?;

    let grid = Grid3::new(
        parsed.dims,
        Spacing3::new(parsed.spacing),
        Point3::new(parsed.origin),
        Direction3::identity(),
    );
    Ok(VectorField::new(grid, vectors)?)
}

/// Write a volume as a structured-points scalar dataset.
pub fn write_structured_points<B: Backend, P: AsRef<Path>>(
    path: P,
    image: &Image<B, 3>,
    binary: bool,
) -> Result<()> {
    let path = path.as_ref();
    if *image.direction() != Direction3::identity() {
        warn!("legacy VTK cannot store direction cosines, writing axis-aligned geometry");
    }

    let [nz, ny, nx] = image.shape();
    let mut out = BufWriter::new(File::create(path)?);
    write_header(
        &mut out,
        binary,
        [nx, ny, nz],
        image.spacing().to_array(),
        image.origin().to_array(),
    )?;

    let values = image.to_vec();
    writeln!(out, "POINT_DATA {}", values.len())?;
    writeln!(out, "SCALARS scalars float 1")?;
    writeln!(out, "LOOKUP_TABLE default")?;
    if binary {
        for v in &values {
            out.write_f32::<BigEndian>(*v)?;
        }
        writeln!(out)?;
    } else {
        for v in &values {
            writeln!(out, "{v}")?;
        }
    }
    Ok(())
}

/// Write a vector field with its magnitude as a companion scalar array.
pub fn write_vector_field<P: AsRef<Path>>(
    path: P,
    field: &VectorField,
    binary: bool,
) -> Result<()> {
    let path = path.as_ref();
    let grid = field.grid();
    let mut out = BufWriter::new(File::create(path)?);
    write_header(
        &mut out,
        binary,
        grid.dims,
        grid.spacing.to_array(),
        grid.origin.to_array(),
    )?;

    let n = grid.num_points();
    writeln!(out, "POINT_DATA {n}")?;
    writeln!(out, "VECTORS vectors float")?;
    if binary {
        for v in field.vectors() {
            for c in 0..3 {
                out.write_f32::<BigEndian>(v[c] as f32)?;
            }
        }
        writeln!(out)?;
    } else {
        for v in field.vectors() {
            writeln!(out, "{} {} {}", v[0], v[1], v[2])?;
        }
    }

    writeln!(out, "SCALARS magnitude float 1")?;
    writeln!(out, "LOOKUP_TABLE default")?;
    if binary {
        for m in field.magnitudes() {
            out.write_f32::<BigEndian>(m as f32)?;
        }
        writeln!(out)?;
    } else {
        for m in field.magnitudes() {
            writeln!(out, "{m}")?;
        }
    }
    Ok(())
}

fn write_header<W: Write>(
    out: &mut W,
    binary: bool,
    dims: [usize; 3],
    spacing: [f64; 3],
    origin: [f64; 3],
) -> Result<()> {
    writeln!(out, "# vtk DataFile Version 3.0")?;
    writeln!(out, "voxreg output")?;
    writeln!(out, "{}", if binary { "BINARY" } else { "ASCII" })?;
    writeln!(out, "DATASET STRUCTURED_POINTS")?;
    writeln!(out, "DIMENSIONS {} {} {}", dims[0], dims[1], dims[2])?;
    writeln!(out, "SPACING {} {} {}", spacing[0], spacing[1], spacing[2])?;
    writeln!(out, "ORIGIN {} {} {}", origin[0], origin[1], origin[2])?;
    Ok(())
}

/// Byte cursor that can alternate between line-based header reads and raw
/// binary payload reads.
struct Cursor {
    data: Vec<u8>,
    pos: usize,
}

impl Cursor {
    fn next_line(&mut self) -> Option<String> {
        if self.pos >= self.data.len() {
            return None;
        }
        let start = self.pos;
        while self.pos < self.data.len() && self.data[self.pos] != b'\n' {
            self.pos += 1;
        }
        let end = self.pos;
        if self.pos < self.data.len() {
            self.pos += 1;
        }
        Some(String::from_utf8_lossy(&self.data[start..end]).trim_end().to_string())
    }

    /// Next non-empty line.
    fn next_content_line(&mut self) -> Option<String> {
        loop {
            let line = self.next_line()?;
            if !line.trim().is_empty() {
                return Some(line);
            }
        }
    }

    fn read_f32_be(&mut self, count: usize, path: &Path) -> Result<Vec<f32>> {
        let needed = count * 4;
        if self.pos + needed > self.data.len() {
            return Err(IoError::parse(path, "truncated binary payload"));
        }
        let mut slice = &self.data[self.pos..self.pos + needed];
        let mut values = Vec::with_capacity(count);
        for _ in 0..count {
            values.push(slice.read_f32::<BigEndian>()?);
        }
        self.pos += needed;
        Ok(values)
    }

    /// Read `count` whitespace-separated ASCII floats, spanning lines.
    fn read_ascii_f32(&mut self, count: usize, path: &Path) -> Result<Vec<f32>> {
        let mut values = Vec::with_capacity(count);
        while values.len() < count {
            let line = self
                .next_content_line()
                .ok_or_else(|| IoError::parse(path, "truncated ASCII payload"))?;
            for token in line.split_whitespace() {
                let v: f32 = token
                    .parse()
                    .map_err(|_| IoError::parse(path, format!("bad number {token:?}")))?;
                values.push(v);
            }
        }
        if values.len() != count {
            return Err(IoError::parse(
                path,
                format!("expected {count} values, got {}", values.len()),
            ));
        }
        Ok(values)
    }
}

fn parse_file(path: &Path) -> Result<ParsedVtk> {
    let mut data = Vec::new();
    File::open(path)?.read_to_end(&mut data)?;
    let mut cursor = Cursor { data, pos: 0 };

    let magic = cursor
        .next_line()
        .ok_or_else(|| IoError::parse(path, "empty file"))?;
    if !magic.starts_with("# vtk DataFile") {
        return Err(IoError::parse(path, "not a legacy VTK file"));
    }
    cursor.next_line(); // title, ignored

    let format = cursor
        .next_content_line()
        .ok_or_else(|| IoError::parse(path, "missing format line"))?;
    let binary = match format.trim() {
        "BINARY" => true,
        "ASCII" => false,
        other => return Err(IoError::parse(path, format!("unknown format {other:?}"))),
    };

    let dataset = cursor
        .next_content_line()
        .ok_or_else(|| IoError::parse(path, "missing DATASET line"))?;
    if !dataset.contains("STRUCTURED_POINTS") {
        return Err(IoError::UnsupportedFormat(format!(
            "{}: dataset {dataset:?}",
            path.display()
        )));
    }

    let mut dims = None;
    let mut spacing = [1.0f64; 3];
    let mut origin = [0.0f64; 3];
    let mut num_points = None;
    let mut scalars = None;
    let mut vectors = None;

    while let Some(line) = cursor.next_content_line() {
        let mut tokens = line.split_whitespace();
        let Some(keyword) = tokens.next() else { continue };
        match keyword {
            "DIMENSIONS" => {
                let d = parse_triplet::<usize>(&line, path)?;
                dims = Some(d);
            }
            "SPACING" | "ASPECT_RATIO" => {
                spacing = parse_triplet::<f64>(&line, path)?;
            }
            "ORIGIN" => {
                origin = parse_triplet::<f64>(&line, path)?;
            }
            "POINT_DATA" => {
                let n: usize = tokens
                    .next()
                    .and_then(|t| t.parse().ok())
                    .ok_or_else(|| IoError::parse(path, "bad POINT_DATA count"))?;
                num_points = Some(n);
            }
            "SCALARS" => {
                let n =
                    num_points.ok_or_else(|| IoError::parse(path, "SCALARS before POINT_DATA"))?;
                // Skip the LOOKUP_TABLE line.
                let lut = cursor
                    .next_content_line()
                    .ok_or_else(|| IoError::parse(path, "missing LOOKUP_TABLE"))?;
                if !lut.starts_with("LOOKUP_TABLE") {
                    return Err(IoError::parse(path, "expected LOOKUP_TABLE"));
                }
                let values = if binary {
                    cursor.read_f32_be(n, path)?
                } else {
                    cursor.read_ascii_f32(n, path)?
                };
                if scalars.is_none() {
                    scalars = Some(values);
                }
            }
            "VECTORS" => {
                let n =
                    num_points.ok_or_else(|| IoError::parse(path, "VECTORS before POINT_DATA"))?;
                let flat = if binary {
                    cursor.read_f32_be(3 * n, path)?
                } else {
                    cursor.read_ascii_f32(3 * n, path)?
                };
                let mut out = Vec::with_capacity(n);
                for i in 0..n {
                    out.push([
                        flat[3 * i] as f64,
                        flat[3 * i + 1] as f64,
                        flat[3 * i + 2] as f64,
                    ]);
                }
                if vectors.is_none() {
                    vectors = Some(out);
                }
            }
            _ => {}
        }
    }

    let dims = dims.ok_or_else(|| IoError::parse(path, "missing DIMENSIONS"))?;
    if let Some(n) = num_points {
        let expected = dims[0] * dims[1] * dims[2];
        if n != expected {
            return Err(IoError::parse(
                path,
                format!("POINT_DATA {n} does not match dimensions ({expected})"),
            ));
        }
    }

    Ok(ParsedVtk {
        dims,
        spacing,
        origin,
        scalars,
        vectors,
    })
}

fn parse_triplet<T: std::str::FromStr>(line: &str, path: &Path) -> Result<[T; 3]> {
    let mut tokens = line.split_whitespace().skip(1);
    let mut parse_one = || -> Result<T> {
        tokens
            .next()
            .and_then(|t| t.parse().ok())
            .ok_or_else(|| IoError::parse(path, format!("bad triplet in {line:?}")))
    };
    Ok([parse_one()?, parse_one()?, parse_one()?])
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn_ndarray::NdArray;
    use tempfile::tempdir;

    type B = NdArray<f32>;

    fn sample_image() -> Image<B, 3> {
        let values: Vec<f32> = (0..24).map(|v| v as f32 * 0.5).collect();
        Image::from_raw(
            values,
            [2, 3, 4],
            Point3::new([1.0, 2.0, 3.0]),
            Spacing3::new([0.5, 1.0, 1.5]),
            Direction3::identity(),
            &Default::default(),
        )
    }

    #[test]
    fn test_scalar_roundtrip_ascii() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("vol.vtk");
        let image = sample_image();

        write_structured_points(&path, &image, false).unwrap();
        let back = read_structured_points::<B, _>(&path, &Default::default()).unwrap();

        assert_eq!(back.shape(), image.shape());
        assert_eq!(back.spacing().to_array(), image.spacing().to_array());
        assert_eq!(back.origin().to_array(), image.origin().to_array());
        assert_eq!(back.to_vec(), image.to_vec());
    }

    #[test]
    fn test_scalar_roundtrip_binary() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("vol.vtk");
        let image = sample_image();

        write_structured_points(&path, &image, true).unwrap();
        let back = read_structured_points::<B, _>(&path, &Default::default()).unwrap();
        assert_eq!(back.to_vec(), image.to_vec());
    }

    #[test]
    fn test_vector_field_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("field.vtk");

        let grid = Grid3::new(
            [2, 2, 1],
            Spacing3::uniform(1.0),
            Point3::origin(),
            Direction3::identity(),
        );
        let field = VectorField::new(
            grid,
            vec![
                [1.0, 0.0, 0.0],
                [0.0, 2.0, 0.0],
                [0.0, 0.0, 3.0],
                [1.0, 1.0, 1.0],
            ],
        )
        .unwrap();

        for binary in [false, true] {
            write_vector_field(&path, &field, binary).unwrap();
            let back = read_vector_field(&path).unwrap();
            assert_eq!(back.grid().dims, [2, 2, 1]);
            for (a, b) in back.vectors().iter().zip(field.vectors()) {
                for c in 0..3 {
                    assert!((a[c] - b[c]).abs() < 1e-6);
                }
            }
        }
    }

    #[test]
    fn test_missing_scalars_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("field.vtk");
        let grid = Grid3::new(
            [1, 1, 1],
            Spacing3::uniform(1.0),
            Point3::origin(),
            Direction3::identity(),
        );
        let field = VectorField::new(grid, vec![[0.0; 3]]).unwrap();
        write_vector_field(&path, &field, false).unwrap();

        // A vector-only file read as a scalar volume: the magnitude array
        // written alongside satisfies the scalar reader, so strip it.
        let text = std::fs::read_to_string(&path).unwrap();
        let truncated: String = text.lines().take_while(|l| !l.starts_with("SCALARS")).fold(
            String::new(),
            |mut acc, l| {
                acc.push_str(l);
                acc.push('\n');
                acc
            },
        );
        std::fs::write(&path, truncated).unwrap();

        assert!(matches!(
            read_structured_points::<B, _>(&path, &Default::default()),
            Err(IoError::NoScalarData(_))
        ));
    }

    #[test]
    fn test_rejects_non_vtk() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("junk.vtk");
        std::fs::write(&path, "hello\n").unwrap();
        assert!(read_structured_points::<B, _>(&path, &Default::default()).is_err());
    }
}
