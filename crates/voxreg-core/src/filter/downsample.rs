//! Integer-factor downsampling.

use burn::tensor::backend::Backend;
use burn::tensor::Tensor;

use crate::image::Image;

/// Downsample filter.
///
/// Keeps every Nth voxel per axis and scales spacing accordingly. The
/// origin is unchanged since sampling starts at index 0.
pub struct DownsampleFilter<B: Backend> {
    factors: Vec<usize>,
    _b: std::marker::PhantomData<B>,
}

impl<B: Backend> DownsampleFilter<B> {
    /// Factors are spatially ordered (x, y, z); each must be >= 1.
    pub fn new(factors: Vec<usize>) -> Self {
        Self {
            factors,
            _b: std::marker::PhantomData,
        }
    }

    pub fn apply<const D: usize>(&self, image: &Image<B, D>) -> Image<B, D> {
        let mut data = image.data().clone();
        let device = data.device();
        let dims: [usize; D] = data.dims();

        let mut new_spacing = *image.spacing();

        for d in 0..D {
            let axis = D - 1 - d;
            let factor = if axis < self.factors.len() {
                self.factors[axis]
            } else {
                self.factors[0]
            };
            if factor <= 1 {
                continue;
            }

            let keep: Vec<i32> = (0..dims[d]).step_by(factor).map(|i| i as i32).collect();
            let indices = Tensor::<B, 1, burn::tensor::Int>::from_ints(keep.as_slice(), &device);
            data = data.select(d, indices);

            new_spacing[axis] *= factor as f64;
        }

        Image::new(data, *image.origin(), new_spacing, *image.direction())
    }
}
