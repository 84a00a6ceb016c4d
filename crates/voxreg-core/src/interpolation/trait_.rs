//! Interpolator trait.

use burn::tensor::backend::Backend;
use burn::tensor::Tensor;

/// Samples a `[Z, Y, X]` volume at continuous indices.
///
/// Indices are `[N, 3]` rows ordered `(x, y, z)`; out-of-bounds indices
/// are clamped to the boundary (callers that need a fill value mask the
/// out-of-bounds rows afterwards).
pub trait Interpolator<B: Backend> {
    fn interpolate(&self, data: &Tensor<B, 3>, indices: Tensor<B, 2>) -> Tensor<B, 1>;
}
