//! Mean squared intensity difference.

use burn::tensor::backend::Backend;
use burn::tensor::Tensor;
use voxreg_core::image::Image;
use voxreg_core::transform::Transform;

use super::trait_::{sample_pair, Metric};

/// Mean of squared intensity differences at the sampled positions.
///
/// Only meaningful for mono-modal pairs, where intensities are directly
/// comparable, but much cheaper than mutual information.
#[derive(Default)]
pub struct MeanSquares;

impl MeanSquares {
    pub fn new() -> Self {
        Self
    }
}

impl<B: Backend> Metric<B> for MeanSquares {
    fn forward(
        &self,
        fixed: &Image<B, 3>,
        moving: &Image<B, 3>,
        transform: &impl Transform<B>,
        indices: Tensor<B, 2>,
    ) -> Tensor<B, 1> {
        let (fixed_values, moving_values) = sample_pair(fixed, moving, transform, indices);
        (fixed_values - moving_values).powf_scalar(2.0).mean()
    }

    fn name(&self) -> &'static str {
        "MeanSquares"
    }
}
