//! Unstructured meshes with per-point attributes.

use std::collections::BTreeMap;

use crate::error::{CoreError, Result};
use crate::spatial::Point3;
use crate::transform::Affine;

/// VTK cell kinds the pipeline handles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellType {
    Vertex,
    Line,
    Triangle,
    Quad,
    Tetra,
    Hexahedron,
    Wedge,
}

impl CellType {
    pub fn vtk_id(&self) -> u8 {
        match self {
            CellType::Vertex => 1,
            CellType::Line => 3,
            CellType::Triangle => 5,
            CellType::Quad => 9,
            CellType::Tetra => 10,
            CellType::Hexahedron => 12,
            CellType::Wedge => 13,
        }
    }

    pub fn from_vtk_id(id: u8) -> Result<Self> {
        match id {
            1 => Ok(CellType::Vertex),
            3 => Ok(CellType::Line),
            5 => Ok(CellType::Triangle),
            9 => Ok(CellType::Quad),
            10 => Ok(CellType::Tetra),
            12 => Ok(CellType::Hexahedron),
            13 => Ok(CellType::Wedge),
            other => Err(CoreError::UnsupportedCell(format!("VTK cell type {other}"))),
        }
    }

    pub fn num_points(&self) -> usize {
        match self {
            CellType::Vertex => 1,
            CellType::Line => 2,
            CellType::Triangle => 3,
            CellType::Quad => 4,
            CellType::Tetra => 4,
            CellType::Wedge => 6,
            CellType::Hexahedron => 8,
        }
    }
}

/// Point cloud plus cell connectivity, VTK-style (flat connectivity with
/// per-cell end offsets), and named per-point data arrays.
#[derive(Debug, Clone, Default)]
pub struct Mesh {
    points: Vec<Point3>,
    connectivity: Vec<usize>,
    offsets: Vec<usize>,
    cell_types: Vec<CellType>,
    point_scalars: BTreeMap<String, Vec<f64>>,
    point_vectors: BTreeMap<String, Vec<[f64; 3]>>,
}

impl Mesh {
    pub fn new(points: Vec<Point3>) -> Self {
        Self {
            points,
            ..Default::default()
        }
    }

    pub fn points(&self) -> &[Point3] {
        &self.points
    }

    pub fn num_points(&self) -> usize {
        self.points.len()
    }

    pub fn num_cells(&self) -> usize {
        self.cell_types.len()
    }

    pub fn add_cell(&mut self, cell_type: CellType, indices: &[usize]) -> Result<()> {
        if indices.len() != cell_type.num_points() {
            return Err(CoreError::UnsupportedCell(format!(
                "{cell_type:?} needs {} points, got {}",
                cell_type.num_points(),
                indices.len()
            )));
        }
        if let Some(&bad) = indices.iter().find(|&&i| i >= self.points.len()) {
            return Err(CoreError::InvalidBufferLength {
                expected: self.points.len(),
                actual: bad,
            });
        }
        self.connectivity.extend_from_slice(indices);
        self.offsets.push(self.connectivity.len());
        self.cell_types.push(cell_type);
        Ok(())
    }

    pub fn cell(&self, i: usize) -> (&CellType, &[usize]) {
        let start = if i == 0 { 0 } else { self.offsets[i - 1] };
        (&self.cell_types[i], &self.connectivity[start..self.offsets[i]])
    }

    pub fn connectivity(&self) -> &[usize] {
        &self.connectivity
    }

    pub fn offsets(&self) -> &[usize] {
        &self.offsets
    }

    pub fn cell_types(&self) -> &[CellType] {
        &self.cell_types
    }

    pub fn attach_scalars(&mut self, name: impl Into<String>, values: Vec<f64>) -> Result<()> {
        if values.len() != self.points.len() {
            return Err(CoreError::InvalidBufferLength {
                expected: self.points.len(),
                actual: values.len(),
            });
        }
        self.point_scalars.insert(name.into(), values);
        Ok(())
    }

    pub fn attach_vectors(&mut self, name: impl Into<String>, values: Vec<[f64; 3]>) -> Result<()> {
        if values.len() != self.points.len() {
            return Err(CoreError::InvalidBufferLength {
                expected: self.points.len(),
                actual: values.len(),
            });
        }
        self.point_vectors.insert(name.into(), values);
        Ok(())
    }

    pub fn point_scalars(&self) -> &BTreeMap<String, Vec<f64>> {
        &self.point_scalars
    }

    pub fn point_vectors(&self) -> &BTreeMap<String, Vec<[f64; 3]>> {
        &self.point_vectors
    }

    /// Move the mesh through an affine: point coordinates change,
    /// connectivity and attribute arrays do not.
    pub fn transform(&mut self, affine: &Affine) {
        for point in &mut self.points {
            *point = affine.apply_point(point);
        }
    }

    /// Indices of all triangle cells, for surface export.
    pub fn triangle_cells(&self) -> Vec<[usize; 3]> {
        (0..self.num_cells())
            .filter_map(|i| {
                let (kind, indices) = self.cell(i);
                if *kind == CellType::Triangle {
                    Some([indices[0], indices[1], indices[2]])
                } else {
                    None
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square_mesh() -> Mesh {
        let mut mesh = Mesh::new(vec![
            Point3::new([0.0, 0.0, 0.0]),
            Point3::new([1.0, 0.0, 0.0]),
            Point3::new([1.0, 1.0, 0.0]),
            Point3::new([0.0, 1.0, 0.0]),
        ]);
        mesh.add_cell(CellType::Triangle, &[0, 1, 2]).unwrap();
        mesh.add_cell(CellType::Triangle, &[0, 2, 3]).unwrap();
        mesh
    }

    #[test]
    fn test_cell_access() {
        let mesh = square_mesh();
        assert_eq!(mesh.num_cells(), 2);
        let (kind, indices) = mesh.cell(1);
        assert_eq!(*kind, CellType::Triangle);
        assert_eq!(indices, &[0, 2, 3]);
    }

    #[test]
    fn test_add_cell_validates_arity_and_bounds() {
        let mut mesh = square_mesh();
        assert!(mesh.add_cell(CellType::Triangle, &[0, 1]).is_err());
        assert!(mesh.add_cell(CellType::Triangle, &[0, 1, 99]).is_err());
    }

    #[test]
    fn test_transform_moves_points_only() {
        let mut mesh = square_mesh();
        mesh.attach_scalars("flux", vec![1.0, 2.0, 3.0, 4.0]).unwrap();
        let before_cells = mesh.connectivity().to_vec();

        let shift = Affine::from_euler([0.0; 3], [10.0, 0.0, 0.0], Point3::origin());
        mesh.transform(&shift);

        assert_eq!(mesh.points()[0].to_array(), [10.0, 0.0, 0.0]);
        assert_eq!(mesh.connectivity(), before_cells.as_slice());
        assert_eq!(mesh.point_scalars()["flux"], vec![1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_attribute_length_check() {
        let mut mesh = square_mesh();
        assert!(matches!(
            mesh.attach_scalars("bad", vec![1.0]),
            Err(CoreError::InvalidBufferLength { .. })
        ));
    }

    #[test]
    fn test_triangle_cells() {
        let mut mesh = square_mesh();
        mesh.add_cell(CellType::Line, &[0, 1]).unwrap();
        assert_eq!(mesh.triangle_cells(), vec![[0, 1, 2], [0, 2, 3]]);
    }
}
