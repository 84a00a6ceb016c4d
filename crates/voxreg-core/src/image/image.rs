//! Volumetric image: tensor data plus physical-space geometry.

use burn::tensor::backend::Backend;
use burn::tensor::{Shape, Tensor, TensorData};

use crate::spatial::{Direction, Point, Spacing, Vector};

use super::Grid3;

/// A scalar image sampled on a regular grid.
///
/// Tensor layout is `[Z, Y, X]` for 3D data; index tensors passed to the
/// coordinate helpers are ordered `(x, y, z)` per row. The geometry triple
/// (origin, spacing, direction) maps indices to physical millimetres:
///
/// `point = origin + direction * (index * spacing)`
#[derive(Debug, Clone)]
pub struct Image<B: Backend, const D: usize> {
    data: Tensor<B, D>,
    origin: Point<D>,
    spacing: Spacing<D>,
    direction: Direction<D>,
}

impl<B: Backend, const D: usize> Image<B, D> {
    pub fn new(
        data: Tensor<B, D>,
        origin: Point<D>,
        spacing: Spacing<D>,
        direction: Direction<D>,
    ) -> Self {
        Self {
            data,
            origin,
            spacing,
            direction,
        }
    }

    /// Build an image from a flat `[Z, Y, X]`-ordered buffer.
    ///
    /// # Panics
    /// Panics if the buffer length does not match the shape.
    pub fn from_raw(
        values: Vec<f32>,
        shape: [usize; D],
        origin: Point<D>,
        spacing: Spacing<D>,
        direction: Direction<D>,
        device: &B::Device,
    ) -> Self {
        let expected: usize = shape.iter().product();
        assert_eq!(values.len(), expected, "buffer length must match grid size");
        let data = Tensor::from_data(TensorData::new(values, Shape::new(shape)), device);
        Self::new(data, origin, spacing, direction)
    }

    /// Replace the voxel data, keeping the geometry.
    pub fn with_data(&self, data: Tensor<B, D>) -> Self {
        Self::new(data, self.origin, self.spacing, self.direction)
    }

    pub fn data(&self) -> &Tensor<B, D> {
        &self.data
    }

    pub fn origin(&self) -> &Point<D> {
        &self.origin
    }

    pub fn spacing(&self) -> &Spacing<D> {
        &self.spacing
    }

    pub fn direction(&self) -> &Direction<D> {
        &self.direction
    }

    pub fn shape(&self) -> [usize; D] {
        self.data.shape().dims.try_into().expect("tensor rank mismatch")
    }

    pub fn num_voxels(&self) -> usize {
        self.shape().iter().product()
    }

    /// Copy the voxel data to the host as a flat `[Z, Y, X]`-ordered buffer.
    pub fn to_vec(&self) -> Vec<f32> {
        self.data
            .clone()
            .into_data()
            .to_vec::<f32>()
            .expect("image tensors are f32")
    }

    /// Map a continuous index `(x, y, z, ...)` to a physical point.
    pub fn index_to_point(&self, index: &Point<D>) -> Point<D> {
        let mut scaled = Vector::<D>::zeros();
        for i in 0..D {
            scaled[i] = index[i] * self.spacing[i];
        }
        self.origin + self.direction * scaled
    }

    /// Map a physical point to a continuous index `(x, y, z, ...)`.
    pub fn point_to_index(&self, point: &Point<D>) -> Point<D> {
        let inv = self
            .direction
            .try_inverse()
            .expect("direction matrix must be invertible");
        let rotated = inv * (*point - self.origin);
        let mut index = Point::<D>::origin();
        for i in 0..D {
            index[i] = rotated[i] / self.spacing[i];
        }
        index
    }

    /// Physical position of the grid's geometric center.
    ///
    /// This is the center used to seed rigid registration (the analogue of
    /// a centered-transform initializer in GEOMETRY mode).
    pub fn physical_center(&self) -> Point<D> {
        let shape = self.shape();
        let mut index = Point::<D>::origin();
        for i in 0..D {
            // shape is [Z, Y, X]; index coordinates are (x, y, z).
            index[i] = (shape[D - 1 - i] as f64 - 1.0) / 2.0;
        }
        self.index_to_point(&index)
    }

    /// Whether two images share the same grid (dims, spacing, origin,
    /// direction) within a small tolerance.
    pub fn same_grid(&self, other: &Self) -> bool {
        if self.shape() != other.shape() {
            return false;
        }
        let eps = 1e-6;
        for i in 0..D {
            if (self.spacing[i] - other.spacing[i]).abs() > eps
                || (self.origin[i] - other.origin[i]).abs() > eps
            {
                return false;
            }
            for j in 0..D {
                if (self.direction[(i, j)] - other.direction[(i, j)]).abs() > eps {
                    return false;
                }
            }
        }
        true
    }

    /// Batch map continuous indices `[N, D]` to physical points `[N, D]`.
    ///
    /// Row order is `(x, y, z, ...)`.
    pub fn index_to_world_tensor(&self, indices: Tensor<B, 2>) -> Tensor<B, 2> {
        let device = indices.device();
        let origin = self.origin_row(&device);

        // point = origin + index @ M with M[r][c] = spacing[r] * direction[c][r]
        let mut m = Vec::with_capacity(D * D);
        for r in 0..D {
            for c in 0..D {
                m.push((self.spacing[r] * self.direction[(c, r)]) as f32);
            }
        }
        let m = Tensor::<B, 2>::from_data(TensorData::new(m, Shape::new([D, D])), &device);

        indices.matmul(m) + origin
    }

    /// Batch map physical points `[N, D]` to continuous indices `[N, D]`.
    pub fn world_to_index_tensor(&self, points: Tensor<B, 2>) -> Tensor<B, 2> {
        let device = points.device();
        let origin = self.origin_row(&device);
        let inv = self
            .direction
            .try_inverse()
            .expect("direction matrix must be invertible");

        // index = (point - origin) @ T with T[r][c] = inv[c][r] / spacing[c]
        let mut t = Vec::with_capacity(D * D);
        for r in 0..D {
            for c in 0..D {
                t.push((inv[(c, r)] / self.spacing[c]) as f32);
            }
        }
        let t = Tensor::<B, 2>::from_data(TensorData::new(t, Shape::new([D, D])), &device);

        (points - origin).matmul(t)
    }

    fn origin_row(&self, device: &B::Device) -> Tensor<B, 2> {
        let coords: Vec<f32> = (0..D).map(|i| self.origin[i] as f32).collect();
        Tensor::<B, 1>::from_data(TensorData::new(coords, Shape::new([D])), device).reshape([1, D])
    }
}

impl<B: Backend> Image<B, 3> {
    /// The grid geometry as a host-side value, dims in `(nx, ny, nz)` order.
    pub fn grid(&self) -> Grid3 {
        let [nz, ny, nx] = self.shape();
        Grid3::new(
            [nx, ny, nz],
            *self.spacing(),
            *self.origin(),
            *self.direction(),
        )
    }
}
