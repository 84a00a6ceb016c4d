//! Transform trait for spatial coordinate transformations.

use burn::tensor::backend::Backend;
use burn::tensor::Tensor;

/// Maps points from one physical space to another.
///
/// The trait does not require `burn::module::Module`, so both trainable
/// transforms (rigid, during registration) and fixed ones can implement it.
pub trait Transform<B: Backend> {
    /// Apply the transform to a batch of points of shape `[N, 3]`.
    fn transform_points(&self, points: Tensor<B, 2>) -> Tensor<B, 2>;
}
