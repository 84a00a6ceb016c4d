//! Resampling a volume through a spatial transform.

use std::marker::PhantomData;

use burn::tensor::backend::Backend;
use burn::tensor::{Shape, Tensor, TensorData};

use crate::image::{generate_grid, Image};
use crate::interpolation::Interpolator;
use crate::spatial::{Direction3, Point3, Spacing3};
use crate::transform::Transform;

/// Resamples an input volume onto an output grid.
///
/// The transform maps output physical points into input physical points
/// (for a registration result this is the fixed-to-moving transform).
/// Output voxels whose mapped index falls outside the input volume take
/// `default_value`, which callers set explicitly; the background level is
/// part of the pipeline contract, not an implementation detail.
pub struct ResampleFilter<B, T, I>
where
    B: Backend,
    T: Transform<B>,
    I: Interpolator<B>,
{
    size: [usize; 3],
    origin: Point3,
    spacing: Spacing3,
    direction: Direction3,
    transform: T,
    interpolator: I,
    default_value: f64,
    _b: PhantomData<B>,
}

impl<B, T, I> ResampleFilter<B, T, I>
where
    B: Backend,
    T: Transform<B>,
    I: Interpolator<B>,
{
    /// Output grid given explicitly; `size` is `[Z, Y, X]`.
    pub fn new(
        size: [usize; 3],
        origin: Point3,
        spacing: Spacing3,
        direction: Direction3,
        transform: T,
        interpolator: I,
        default_value: f64,
    ) -> Self {
        Self {
            size,
            origin,
            spacing,
            direction,
            transform,
            interpolator,
            default_value,
            _b: PhantomData,
        }
    }

    /// Output grid copied from a reference volume.
    pub fn from_reference(
        reference: &Image<B, 3>,
        transform: T,
        interpolator: I,
        default_value: f64,
    ) -> Self {
        Self::new(
            reference.shape(),
            *reference.origin(),
            *reference.spacing(),
            *reference.direction(),
            transform,
            interpolator,
            default_value,
        )
    }

    pub fn apply(&self, input: &Image<B, 3>) -> Image<B, 3> {
        let device = input.data().device();
        let [d, h, w] = self.size;

        let output_indices = generate_grid::<B, 3>(self.size, &device);
        let output_points = self.indices_to_physical(output_indices, &device);
        let input_points = self.transform.transform_points(output_points);
        let input_indices = input.world_to_index_tensor(input_points);

        let values = self
            .interpolator
            .interpolate(input.data(), input_indices.clone());

        // Interpolation clamps at the border, so out-of-volume samples need
        // an explicit mask to receive the default value instead.
        let [iz, iy, ix] = input.shape();
        let host = input_indices.into_data();
        let host = host
            .as_slice::<f32>()
            .expect("index tensors are f32");
        let n = d * h * w;
        let mut mask = vec![0.0f32; n];
        let eps = 1e-4f32;
        for (row, m) in mask.iter_mut().enumerate() {
            let x = host[row * 3];
            let y = host[row * 3 + 1];
            let z = host[row * 3 + 2];
            let inside = x >= -eps
                && x <= (ix - 1) as f32 + eps
                && y >= -eps
                && y <= (iy - 1) as f32 + eps
                && z >= -eps
                && z <= (iz - 1) as f32 + eps;
            if inside {
                *m = 1.0;
            }
        }
        let mask = Tensor::<B, 1>::from_data(TensorData::new(mask, Shape::new([n])), &device);

        let fill = Tensor::<B, 1>::ones([n], &device) - mask.clone();
        let values = values * mask + fill * self.default_value;

        Image::new(
            values.reshape(Shape::new(self.size)),
            self.origin,
            self.spacing,
            self.direction,
        )
    }

    /// `point = origin + Direction * (index * spacing)` as a batched matmul.
    fn indices_to_physical(&self, indices: Tensor<B, 2>, device: &B::Device) -> Tensor<B, 2> {
        let origin: Vec<f32> = (0..3).map(|i| self.origin[i] as f32).collect();
        let origin = Tensor::<B, 1>::from_data(TensorData::new(origin, Shape::new([3])), device)
            .reshape([1, 3]);

        let spacing: Vec<f32> = (0..3).map(|i| self.spacing[i] as f32).collect();
        let spacing = Tensor::<B, 1>::from_data(TensorData::new(spacing, Shape::new([3])), device)
            .reshape([1, 3]);

        let scaled = indices * spacing;

        // Direction transposed for row-vector matmul.
        let mut dir = Vec::with_capacity(9);
        for c in 0..3 {
            for r in 0..3 {
                dir.push(self.direction[(r, c)] as f32);
            }
        }
        let dir = Tensor::<B, 2>::from_data(TensorData::new(dir, Shape::new([3, 3])), device);

        origin + scaled.matmul(dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpolation::LinearInterpolator;
    use crate::transform::RigidTransform;
    use burn_ndarray::NdArray;

    type B = NdArray<f32>;

    fn blob_volume() -> Image<B, 3> {
        // 10^3 volume with a bright 2x2x2 block at (4..6, 4..6, 4..6).
        let mut values = vec![0.0f32; 1000];
        for z in 4..6 {
            for y in 4..6 {
                for x in 4..6 {
                    values[(z * 10 + y) * 10 + x] = 1.0;
                }
            }
        }
        Image::from_raw(
            values,
            [10, 10, 10],
            Point3::origin(),
            Spacing3::uniform(1.0),
            Direction3::identity(),
            &Default::default(),
        )
    }

    #[test]
    fn test_identity_resample() {
        let device = Default::default();
        let image = blob_volume();
        let filter = ResampleFilter::from_reference(
            &image,
            RigidTransform::<B>::identity(None, &device),
            LinearInterpolator::new(),
            0.0,
        );
        let out = filter.apply(&image);
        assert_eq!(out.to_vec(), image.to_vec());
    }

    #[test]
    fn test_translation_moves_content() {
        let device = Default::default();
        let image = blob_volume();
        // Output-to-input shift of -2 in X moves content +2 in the output.
        let transform = RigidTransform::<B>::from_params(
            [0.0, 0.0, 0.0, -2.0, 0.0, 0.0],
            Point3::origin(),
            &device,
        );
        let filter =
            ResampleFilter::from_reference(&image, transform, LinearInterpolator::new(), 0.0);
        let out = filter.apply(&image).to_vec();

        assert!(out[(4 * 10 + 4) * 10 + 6] > 0.9);
        assert!(out[(4 * 10 + 4) * 10 + 4] < 0.1);
    }

    #[test]
    fn test_default_value_outside_volume() {
        let device = Default::default();
        let image = blob_volume();
        // Shift far enough that part of the output maps outside the input.
        let transform = RigidTransform::<B>::from_params(
            [0.0, 0.0, 0.0, -7.0, 0.0, 0.0],
            Point3::origin(),
            &device,
        );
        let filter =
            ResampleFilter::from_reference(&image, transform, LinearInterpolator::new(), -5.0);
        let out = filter.apply(&image).to_vec();

        // Output x=0 maps to input x=-7, outside; gets the default.
        assert_eq!(out[0], -5.0);
        // Output x=9 maps to input x=2, inside; background is 0.
        assert_eq!(out[9], 0.0);
    }
}
