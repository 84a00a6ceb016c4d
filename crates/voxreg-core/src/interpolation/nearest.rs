//! Nearest-neighbor interpolation.

use burn::tensor::backend::Backend;
use burn::tensor::Tensor;

use super::trait_::Interpolator;

/// Nearest-neighbor interpolator.
///
/// Used for label and mask volumes where blending values is wrong.
#[derive(Debug, Clone, Copy, Default)]
pub struct NearestInterpolator;

impl NearestInterpolator {
    pub fn new() -> Self {
        Self
    }
}

impl<B: Backend> Interpolator<B> for NearestInterpolator {
    fn interpolate(&self, data: &Tensor<B, 3>, indices: Tensor<B, 2>) -> Tensor<B, 1> {
        let [d, h, w] = data.dims();

        let x = indices.clone().narrow(1, 0, 1).squeeze::<1>(1);
        let y = indices.clone().narrow(1, 1, 1).squeeze::<1>(1);
        let z = indices.narrow(1, 2, 1).squeeze::<1>(1);

        let x_i = x.round().clamp(0.0, (w - 1) as f64).int();
        let y_i = y.round().clamp(0.0, (h - 1) as f64).int();
        let z_i = z.round().clamp(0.0, (d - 1) as f64).int();

        let stride_z = (h * w) as i32;
        let stride_y = w as i32;

        let idx = z_i * stride_z + y_i * stride_y + x_i;
        data.clone().reshape([d * h * w]).gather(0, idx)
    }
}
