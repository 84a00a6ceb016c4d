//! Grid helpers: index-grid tensors for resampling/metrics, and a
//! host-side grid description for point-ordered data (legacy VTK layout).

use burn::tensor::backend::Backend;
use burn::tensor::{Int, Tensor};

use crate::spatial::{Direction3, Point3, Spacing3, Vector3};

/// Generate the full grid of voxel indices for an image shape.
///
/// Returns `[N, D]` with rows ordered `(x, y, z)` and X varying fastest,
/// matching the flat `[Z, Y, X]` tensor layout.
pub fn generate_grid<B, const D: usize>(shape: [usize; D], device: &B::Device) -> Tensor<B, 2>
where
    B: Backend,
{
    match D {
        3 => {
            let [d, h, w] = shape.as_slice().try_into().expect("shape must be 3D");

            let z = Tensor::<B, 1, Int>::arange(0..d as i64, device);
            let y = Tensor::<B, 1, Int>::arange(0..h as i64, device);
            let x = Tensor::<B, 1, Int>::arange(0..w as i64, device);

            let n = d * h * w;
            let z = z.reshape([d, 1, 1]).repeat(&[1, h, w]).reshape([n]).float();
            let y = y.reshape([1, h, 1]).repeat(&[d, 1, w]).reshape([n]).float();
            let x = x.reshape([1, 1, w]).repeat(&[d, h, 1]).reshape([n]).float();

            Tensor::cat(
                vec![x.unsqueeze_dim(1), y.unsqueeze_dim(1), z.unsqueeze_dim(1)],
                1,
            )
        }
        2 => {
            let [h, w] = shape.as_slice().try_into().expect("shape must be 2D");

            let y = Tensor::<B, 1, Int>::arange(0..h as i64, device);
            let x = Tensor::<B, 1, Int>::arange(0..w as i64, device);

            let n = h * w;
            let y = y.reshape([h, 1]).repeat(&[1, w]).reshape([n]).float();
            let x = x.reshape([1, w]).repeat(&[h, 1]).reshape([n]).float();

            Tensor::cat(vec![x.unsqueeze_dim(1), y.unsqueeze_dim(1)], 1)
        }
        _ => panic!("only 2D and 3D grids are supported"),
    }
}

/// Host-side description of a regular 3D grid.
///
/// `dims` is `(nx, ny, nz)`; flat point order is X-fastest, which is both
/// the legacy-VTK point order and the flat order of a `[Z, Y, X]` tensor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Grid3 {
    pub dims: [usize; 3],
    pub spacing: Spacing3,
    pub origin: Point3,
    pub direction: Direction3,
}

impl Grid3 {
    pub fn new(dims: [usize; 3], spacing: Spacing3, origin: Point3, direction: Direction3) -> Self {
        Self {
            dims,
            spacing,
            origin,
            direction,
        }
    }

    pub fn num_points(&self) -> usize {
        self.dims.iter().product()
    }

    /// Physical position of grid index `(i, j, k)`.
    pub fn point_at(&self, index: [usize; 3]) -> Point3 {
        let mut scaled = Vector3::zeros();
        for a in 0..3 {
            scaled[a] = index[a] as f64 * self.spacing[a];
        }
        self.origin + self.direction * scaled
    }

    /// Flat point index of `(i, j, k)`, X varying fastest.
    pub fn flat_index(&self, index: [usize; 3]) -> usize {
        index[2] * self.dims[1] * self.dims[0] + index[1] * self.dims[0] + index[0]
    }

    /// Inverse of [`Self::flat_index`].
    pub fn unflatten(&self, flat: usize) -> [usize; 3] {
        let i = flat % self.dims[0];
        let j = (flat / self.dims[0]) % self.dims[1];
        let k = flat / (self.dims[0] * self.dims[1]);
        [i, j, k]
    }

    /// Whether two grids coincide within a small tolerance.
    pub fn approx_eq(&self, other: &Self) -> bool {
        if self.dims != other.dims {
            return false;
        }
        let eps = 1e-6;
        (0..3).all(|i| {
            (self.spacing[i] - other.spacing[i]).abs() < eps
                && (self.origin[i] - other.origin[i]).abs() < eps
                && (0..3).all(|j| (self.direction[(i, j)] - other.direction[(i, j)]).abs() < eps)
        })
    }

    /// Short geometry summary for error messages.
    pub fn describe(&self) -> String {
        format!(
            "dims {:?}, spacing {:?}, origin {:?}",
            self.dims,
            self.spacing.to_array(),
            self.origin.to_array()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn_ndarray::NdArray;

    type B = NdArray<f32>;

    #[test]
    fn test_generate_grid_3d_order() {
        let device = Default::default();
        let grid = generate_grid::<B, 3>([2, 2, 2], &device);
        assert_eq!(grid.dims(), [8, 3]);
        let data = grid.into_data();
        let rows = data.as_slice::<f32>().unwrap();
        // First two rows: (0,0,0), (1,0,0) -> X varies fastest.
        assert_eq!(&rows[0..3], &[0.0, 0.0, 0.0]);
        assert_eq!(&rows[3..6], &[1.0, 0.0, 0.0]);
        // Last row: (1,1,1).
        assert_eq!(&rows[21..24], &[1.0, 1.0, 1.0]);
    }

    #[test]
    fn test_grid3_flat_index_roundtrip() {
        let grid = Grid3::new(
            [3, 4, 5],
            Spacing3::uniform(1.0),
            Point3::origin(),
            Direction3::identity(),
        );
        for flat in [0, 1, 3, 11, 59] {
            assert_eq!(grid.flat_index(grid.unflatten(flat)), flat);
        }
        assert_eq!(grid.num_points(), 60);
    }

    #[test]
    fn test_grid3_point_at() {
        let grid = Grid3::new(
            [3, 3, 3],
            Spacing3::new([2.0, 1.0, 0.5]),
            Point3::new([1.0, 1.0, 1.0]),
            Direction3::identity(),
        );
        assert_eq!(grid.point_at([1, 2, 2]).to_array(), [3.0, 3.0, 2.0]);
    }
}
