//! Multi-resolution image pyramid for coarse-to-fine registration.

use burn::tensor::backend::Backend;

use crate::image::Image;

use super::downsample::DownsampleFilter;
use super::gaussian::GaussianFilter;

/// Sequence of progressively finer renditions of one image.
///
/// Level 0 is the coarsest. Each level smooths with the scheduled sigma
/// and then decimates by the scheduled shrink factor.
pub struct MultiResolutionPyramid<B: Backend, const D: usize> {
    images: Vec<Image<B, D>>,
}

impl<B: Backend, const D: usize> MultiResolutionPyramid<B, D> {
    /// # Panics
    /// Panics if the two schedules differ in length.
    pub fn new(
        input: &Image<B, D>,
        shrink_factors: &[Vec<usize>],
        smoothing_sigmas: &[Vec<f64>],
    ) -> Self {
        assert_eq!(
            shrink_factors.len(),
            smoothing_sigmas.len(),
            "schedule lengths must match"
        );

        let mut images = Vec::with_capacity(shrink_factors.len());

        for (factors, sigmas) in shrink_factors.iter().zip(smoothing_sigmas.iter()) {
            let no_shrink = factors.iter().all(|&f| f == 1);
            let no_smooth = sigmas.iter().all(|&s| s <= 1e-6);

            if no_shrink && no_smooth {
                images.push(input.clone());
                continue;
            }

            let smoothed = if no_smooth {
                input.clone()
            } else {
                GaussianFilter::new(sigmas.clone()).apply(input)
            };

            let level = if no_shrink {
                smoothed
            } else {
                DownsampleFilter::new(factors.clone()).apply(&smoothed)
            };

            images.push(level);
        }

        Self { images }
    }

    pub fn level(&self, level: usize) -> &Image<B, D> {
        &self.images[level]
    }

    pub fn levels(&self) -> usize {
        self.images.len()
    }

    /// Power-of-two schedule, coarsest first.
    ///
    /// `levels = 3` yields factors `[4, 2, 1]` with sigmas `[2.0, 1.0, 0.0]`.
    pub fn default_schedule(levels: usize) -> (Vec<Vec<usize>>, Vec<Vec<f64>>) {
        let mut shrink_factors = Vec::with_capacity(levels);
        let mut smoothing_sigmas = Vec::with_capacity(levels);

        for i in 0..levels {
            let factor = 2usize.pow((levels - 1 - i) as u32);
            let sigma = if factor > 1 { 0.5 * factor as f64 } else { 0.0 };
            shrink_factors.push(vec![factor; D]);
            smoothing_sigmas.push(vec![sigma; D]);
        }

        (shrink_factors, smoothing_sigmas)
    }
}
