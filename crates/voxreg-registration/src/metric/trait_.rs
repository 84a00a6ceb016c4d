//! Similarity metric trait.

use burn::tensor::backend::Backend;
use burn::tensor::Tensor;
use voxreg_core::image::Image;
use voxreg_core::interpolation::{Interpolator, LinearInterpolator, NearestInterpolator};
use voxreg_core::transform::Transform;

/// Dissimilarity between a fixed and a moving volume under a transform.
///
/// The transform maps fixed-space points into moving space; the metric
/// samples both volumes at `indices` (fixed-image index rows, `(x, y, z)`
/// ordered) and returns a scalar loss tensor. Lower is better aligned.
pub trait Metric<B: Backend> {
    fn forward(
        &self,
        fixed: &Image<B, 3>,
        moving: &Image<B, 3>,
        transform: &impl Transform<B>,
        indices: Tensor<B, 2>,
    ) -> Tensor<B, 1>;

    fn name(&self) -> &'static str;
}

/// Paired samples of both volumes at the given fixed-image indices.
///
/// The fixed volume is read exactly (the indices are integral), the moving
/// volume trilinearly at the transformed positions.
pub(crate) fn sample_pair<B: Backend>(
    fixed: &Image<B, 3>,
    moving: &Image<B, 3>,
    transform: &impl Transform<B>,
    indices: Tensor<B, 2>,
) -> (Tensor<B, 1>, Tensor<B, 1>) {
    let fixed_values = NearestInterpolator::new().interpolate(fixed.data(), indices.clone());

    let fixed_points = fixed.index_to_world_tensor(indices);
    let moving_points = transform.transform_points(fixed_points);
    let moving_indices = moving.world_to_index_tensor(moving_points);
    let moving_values = LinearInterpolator::new().interpolate(moving.data(), moving_indices);

    (fixed_values, moving_values)
}
