//! Regular-grid vector fields (velocity / flux data).

use burn::tensor::backend::Backend;
use tracing::debug;

use crate::error::{CoreError, Result};
use crate::image::{Grid3, Image};
use crate::transform::Affine;

/// One 3-vector per grid point, X-fastest flat ordering (the legacy-VTK
/// point order).
#[derive(Debug, Clone)]
pub struct VectorField {
    grid: Grid3,
    vectors: Vec<[f64; 3]>,
}

impl VectorField {
    pub fn new(grid: Grid3, vectors: Vec<[f64; 3]>) -> Result<Self> {
        if vectors.len() != grid.num_points() {
            return Err(CoreError::InvalidBufferLength {
                expected: grid.num_points(),
                actual: vectors.len(),
            });
        }
        Ok(Self { grid, vectors })
    }

    pub fn grid(&self) -> &Grid3 {
        &self.grid
    }

    pub fn vectors(&self) -> &[[f64; 3]] {
        &self.vectors
    }

    pub fn magnitudes(&self) -> Vec<f64> {
        self.vectors
            .iter()
            .map(|v| (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]).sqrt())
            .collect()
    }

    /// Move the field through an affine: the grid rides along (origin and
    /// direction updated) and each vector rotates with the linear part.
    pub fn transform(&mut self, affine: &Affine) {
        self.grid.origin = affine.apply_point(&self.grid.origin);
        let linear = affine.linear();
        let mut direction = self.grid.direction;
        let rotated = linear * *direction.inner();
        for r in 0..3 {
            for c in 0..3 {
                direction[(r, c)] = rotated[(r, c)];
            }
        }
        self.grid.direction = direction;

        for v in &mut self.vectors {
            let out = affine.apply_vector(&crate::spatial::Vector3::new(*v));
            *v = out.to_array();
        }
    }
}

/// Zero out vectors where the mask volume is zero.
///
/// The mask must live on exactly the field's grid; a mismatch is a data
/// error, not something to resample around.
pub fn mask_field<B: Backend>(field: &VectorField, mask: &Image<B, 3>) -> Result<VectorField> {
    let mask_grid = mask.grid();
    if !field.grid().approx_eq(&mask_grid) {
        return Err(CoreError::GeometryMismatch {
            expected: field.grid().describe(),
            actual: mask_grid.describe(),
        });
    }

    // Mask buffer order ([Z, Y, X] flat) matches field point order.
    let mask_values = mask.to_vec();
    let mut kept = 0usize;
    let vectors = field
        .vectors()
        .iter()
        .zip(mask_values.iter())
        .map(|(v, &m)| {
            if m != 0.0 {
                kept += 1;
                *v
            } else {
                [0.0; 3]
            }
        })
        .collect();

    debug!(kept, total = field.vectors().len(), "masked vector field");
    VectorField::new(*field.grid(), vectors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spatial::{Direction3, Point3, Spacing3};
    use burn_ndarray::NdArray;

    type B = NdArray<f32>;

    fn unit_grid(dims: [usize; 3]) -> Grid3 {
        Grid3::new(
            dims,
            Spacing3::uniform(1.0),
            Point3::origin(),
            Direction3::identity(),
        )
    }

    fn mask_image(values: Vec<f32>, dims: [usize; 3]) -> Image<B, 3> {
        Image::from_raw(
            values,
            [dims[2], dims[1], dims[0]],
            Point3::origin(),
            Spacing3::uniform(1.0),
            Direction3::identity(),
            &Default::default(),
        )
    }

    #[test]
    fn test_all_true_mask_is_identity() {
        let grid = unit_grid([2, 2, 2]);
        let field = VectorField::new(grid, vec![[1.0, 2.0, 3.0]; 8]).unwrap();
        let mask = mask_image(vec![1.0; 8], [2, 2, 2]);
        let out = mask_field(&field, &mask).unwrap();
        assert_eq!(out.vectors(), field.vectors());
    }

    #[test]
    fn test_all_false_mask_zeroes_field() {
        let grid = unit_grid([2, 2, 2]);
        let field = VectorField::new(grid, vec![[1.0, 2.0, 3.0]; 8]).unwrap();
        let mask = mask_image(vec![0.0; 8], [2, 2, 2]);
        let out = mask_field(&field, &mask).unwrap();
        assert!(out.vectors().iter().all(|v| *v == [0.0; 3]));
        assert!(out.magnitudes().iter().all(|&m| m == 0.0));
    }

    #[test]
    fn test_partial_mask() {
        let grid = unit_grid([2, 1, 1]);
        let field = VectorField::new(grid, vec![[3.0, 4.0, 0.0], [1.0, 0.0, 0.0]]).unwrap();
        let mask = mask_image(vec![1.0, 0.0], [2, 1, 1]);
        let out = mask_field(&field, &mask).unwrap();
        assert_eq!(out.vectors()[0], [3.0, 4.0, 0.0]);
        assert_eq!(out.vectors()[1], [0.0; 3]);
        assert_eq!(out.magnitudes(), vec![5.0, 0.0]);
    }

    #[test]
    fn test_geometry_mismatch() {
        let grid = unit_grid([2, 2, 2]);
        let field = VectorField::new(grid, vec![[0.0; 3]; 8]).unwrap();
        let mask = mask_image(vec![1.0; 4], [2, 2, 1]);
        assert!(matches!(
            mask_field(&field, &mask),
            Err(CoreError::GeometryMismatch { .. })
        ));
    }

    #[test]
    fn test_transform_rotates_vectors() {
        let grid = unit_grid([1, 1, 1]);
        let mut field = VectorField::new(grid, vec![[1.0, 0.0, 0.0]]).unwrap();
        let rot = Affine::from_euler(
            [0.0, 0.0, std::f64::consts::FRAC_PI_2],
            [0.0; 3],
            Point3::origin(),
        );
        field.transform(&rot);
        let v = field.vectors()[0];
        assert!((v[0]).abs() < 1e-12);
        assert!((v[1] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_length_check() {
        let grid = unit_grid([2, 2, 2]);
        assert!(matches!(
            VectorField::new(grid, vec![[0.0; 3]; 5]),
            Err(CoreError::InvalidBufferLength { .. })
        ));
    }
}
