//! Gaussian smoothing via separable 1D convolutions.

use burn::tensor::backend::Backend;
use burn::tensor::ops::ConvOptions;
use burn::tensor::{Shape, Tensor};

use crate::image::Image;
use crate::spatial::Spacing;

/// Gaussian smoothing filter.
///
/// Sigmas are in physical units (mm); the kernel width per axis follows
/// from the image spacing, capped at `max_kernel_width` taps.
pub struct GaussianFilter<B: Backend> {
    sigmas: Vec<f64>,
    max_kernel_width: usize,
    _b: std::marker::PhantomData<B>,
}

impl<B: Backend> GaussianFilter<B> {
    pub fn new(sigmas: Vec<f64>) -> Self {
        Self {
            sigmas,
            max_kernel_width: 32,
            _b: std::marker::PhantomData,
        }
    }

    pub fn with_max_kernel_width(mut self, width: usize) -> Self {
        self.max_kernel_width = width;
        self
    }

    pub fn apply<const D: usize>(&self, image: &Image<B, D>) -> Image<B, D> {
        let data = self.apply_tensor(image.data().clone(), image.spacing());
        image.with_data(data)
    }

    /// Smooth a raw tensor, one separable pass per axis.
    pub fn apply_tensor<const D: usize>(
        &self,
        input: Tensor<B, D>,
        spacing: &Spacing<D>,
    ) -> Tensor<B, D> {
        let mut data = input;
        let device = data.device();

        for d in 0..D {
            // Sigmas and spacing are spatially ordered (x, y, z); tensor
            // axes run [Z, Y, X].
            let axis = D - 1 - d;
            let sigma = if axis < self.sigmas.len() {
                self.sigmas[axis]
            } else {
                self.sigmas[0]
            };
            if sigma <= 1e-6 {
                continue;
            }

            let pixel_sigma = sigma / spacing[axis];
            let radius = (3.0 * pixel_sigma).ceil() as usize;
            let width = (2 * radius + 1).min(self.max_kernel_width);
            let actual_radius = (width - 1) / 2;

            let kernel = gaussian_kernel(pixel_sigma, actual_radius);
            let kernel = Tensor::<B, 1>::from_floats(kernel.as_slice(), &device);

            data = convolve_axis::<B, D>(data, kernel, d);
        }
        data
    }
}

fn gaussian_kernel(sigma: f64, radius: usize) -> Vec<f32> {
    let mut kernel = Vec::with_capacity(2 * radius + 1);
    let two_sigma2 = 2.0 * sigma * sigma;
    let mut sum = 0.0;

    for i in 0..=(2 * radius) {
        let x = i as f64 - radius as f64;
        let value = (-x * x / two_sigma2).exp();
        kernel.push(value as f32);
        sum += value;
    }
    for value in &mut kernel {
        *value /= sum as f32;
    }
    kernel
}

/// Convolve along one tensor axis by rotating it to the end, flattening the
/// rest into a batch dimension, and running a same-size conv1d.
fn convolve_axis<B: Backend, const D: usize>(
    input: Tensor<B, D>,
    kernel: Tensor<B, 1>,
    dim: usize,
) -> Tensor<B, D> {
    let dims: [usize; D] = input.dims();

    let mut permute_indices = [0isize; D];
    let mut idx = 0;
    for i in 0..D {
        if i != dim {
            permute_indices[idx] = i as isize;
            idx += 1;
        }
    }
    permute_indices[D - 1] = dim as isize;

    let permuted = input.permute(permute_indices);

    let length = dims[dim];
    let batch: usize = (0..D).filter(|&i| i != dim).map(|i| dims[i]).product();

    let reshaped = permuted.reshape([batch, 1, length]);
    let kernel_size = kernel.dims()[0];
    let kernel = kernel.reshape([1, 1, kernel_size]);
    let padding = kernel_size / 2;

    let options = ConvOptions::new([1], [padding], [1], 1);
    let convolved = burn::tensor::module::conv1d(reshaped, kernel, None, options);

    let mut permuted_shape = [0; D];
    let mut p = 0;
    for i in 0..D {
        if i != dim {
            permuted_shape[p] = dims[i];
            p += 1;
        }
    }
    permuted_shape[D - 1] = length;
    let convolved = convolved.reshape(Shape::new(permuted_shape));

    let mut inverse = [0isize; D];
    for (new_pos, &old_pos) in permute_indices.iter().enumerate() {
        inverse[old_pos as usize] = new_pos as isize;
    }
    convolved.permute(inverse)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spatial::{Direction3, Point3, Spacing3};
    use burn_ndarray::NdArray;

    type B = NdArray<f32>;

    #[test]
    fn test_smoothing_preserves_mass() {
        let device = Default::default();
        let mut values = vec![0.0f32; 7 * 7 * 7];
        values[3 * 49 + 3 * 7 + 3] = 1.0;
        let image = Image::<B, 3>::from_raw(
            values,
            [7, 7, 7],
            Point3::origin(),
            Spacing3::uniform(1.0),
            Direction3::identity(),
            &device,
        );

        let smoothed = GaussianFilter::new(vec![0.8; 3]).apply(&image);
        let out = smoothed.to_vec();

        let total: f32 = out.iter().sum();
        assert!((total - 1.0).abs() < 1e-3);
        // Peak stays at the center but spreads out.
        let center = out[3 * 49 + 3 * 7 + 3];
        assert!(center < 1.0 && center > 0.0);
        assert!(out[3 * 49 + 3 * 7 + 4] > 0.0);
    }

    #[test]
    fn test_kernel_width_cap_limits_support() {
        let device = Default::default();
        let mut values = vec![0.0f32; 9 * 9 * 9];
        values[4 * 81 + 4 * 9 + 4] = 1.0;
        let image = Image::<B, 3>::from_raw(
            values,
            [9, 9, 9],
            Point3::origin(),
            Spacing3::uniform(1.0),
            Direction3::identity(),
            &device,
        );

        // Sigma 2.0 wants a radius-6 kernel; capping the width at 5 taps
        // truncates it to radius 2, so an impulse spreads at most 2 voxels.
        let out = GaussianFilter::new(vec![2.0; 3])
            .with_max_kernel_width(5)
            .apply(&image)
            .to_vec();

        assert!(out[4 * 81 + 4 * 9 + 6] > 0.0);
        assert_eq!(out[4 * 81 + 4 * 9 + 7], 0.0);
        let total: f32 = out.iter().sum();
        assert!((total - 1.0).abs() < 1e-3);
    }

    #[test]
    fn test_zero_sigma_is_identity() {
        let device = Default::default();
        let values: Vec<f32> = (0..27).map(|v| v as f32).collect();
        let image = Image::<B, 3>::from_raw(
            values.clone(),
            [3, 3, 3],
            Point3::origin(),
            Spacing3::uniform(1.0),
            Direction3::identity(),
            &device,
        );
        let out = GaussianFilter::new(vec![0.0; 3]).apply(&image).to_vec();
        assert_eq!(out, values);
    }
}
