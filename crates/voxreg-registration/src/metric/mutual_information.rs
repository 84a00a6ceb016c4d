//! Mutual information via differentiable Parzen-window histograms.

use burn::tensor::backend::Backend;
use burn::tensor::{Int, Tensor};
use voxreg_core::image::Image;
use voxreg_core::transform::Transform;

use super::trait_::{sample_pair, Metric};

/// Negated mutual information between the sampled fixed and moving values.
///
/// `MI(F, M) = H(F) + H(M) - H(F, M)` with Shannon entropies over soft
/// histograms: each sample contributes a Gaussian-kernel weight to every
/// bin, so the loss stays differentiable with respect to the transform.
/// Both value sets are rescaled to `[0, 1]` before binning, which makes
/// the kernel width a fraction of the intensity range and lets the metric
/// compare volumes from different scanners.
pub struct MutualInformation {
    num_bins: usize,
    sigma: f64,
}

impl MutualInformation {
    /// `num_bins` histogram bins with a Parzen kernel of width `sigma`
    /// (in normalized intensity units).
    pub fn new(num_bins: usize, sigma: f64) -> Self {
        Self { num_bins, sigma }
    }

    /// Rescale values to `[0, 1]` using the batch min and max.
    fn normalize<B: Backend>(values: Tensor<B, 1>) -> Tensor<B, 1> {
        let min = values.clone().min();
        let range = values.clone().max() - min.clone() + 1e-8;
        let n = values.dims()[0];
        (values - min.reshape([1]).repeat(&[n])) / range.reshape([1]).repeat(&[n])
    }

    /// Per-sample kernel weights against every bin center, `[N, bins]`.
    fn bin_weights<B: Backend>(&self, values: Tensor<B, 1>) -> Tensor<B, 2> {
        let device = values.device();
        let n = values.dims()[0];

        let step = 1.0 / (self.num_bins as f64 - 1.0);
        let bins = Tensor::<B, 1, Int>::arange(0..self.num_bins as i64, &device)
            .float()
            .mul_scalar(step)
            .reshape([1, self.num_bins]);

        let diff = values.reshape([n, 1]) - bins.repeat(&[n, 1]);
        (diff.powf_scalar(2.0) * (-0.5 / (self.sigma * self.sigma))).exp()
    }

    /// Entropy of a normalized probability tensor.
    fn entropy<B: Backend, const D: usize>(probs: Tensor<B, D>) -> Tensor<B, 1> {
        let log_probs = (probs.clone() + 1e-10).log();
        (probs * log_probs).sum().neg()
    }

    fn marginal<B: Backend>(weights: Tensor<B, 2>) -> Tensor<B, 1> {
        let bins = weights.dims()[1];
        let hist = weights.sum_dim(0).reshape([bins]);
        let total = hist.clone().sum() + 1e-10;
        hist / total.reshape([1]).repeat(&[bins])
    }
}

impl Default for MutualInformation {
    fn default() -> Self {
        Self::new(32, 0.05)
    }
}

impl<B: Backend> Metric<B> for MutualInformation {
    fn forward(
        &self,
        fixed: &Image<B, 3>,
        moving: &Image<B, 3>,
        transform: &impl Transform<B>,
        indices: Tensor<B, 2>,
    ) -> Tensor<B, 1> {
        let (fixed_values, moving_values) = sample_pair(fixed, moving, transform, indices);

        let weights_f = self.bin_weights(Self::normalize(fixed_values));
        let weights_m = self.bin_weights(Self::normalize(moving_values));

        let h_f = Self::entropy(Self::marginal(weights_f.clone()));
        let h_m = Self::entropy(Self::marginal(weights_m.clone()));

        // Joint entry (i, j) sums w_f(k, i) * w_m(k, j) over samples k,
        // which is the matrix product w_f^T w_m.
        let joint = weights_f.transpose().matmul(weights_m);
        let total = joint.clone().sum() + 1e-10;
        let bins = [self.num_bins, self.num_bins];
        let p_fm = joint / total.reshape([1, 1]).repeat(&[bins[0], bins[1]]);
        let h_fm = Self::entropy(p_fm);

        // Maximizing MI means minimizing H(F, M) - H(F) - H(M).
        h_fm - h_f - h_m
    }

    fn name(&self) -> &'static str {
        "MutualInformation"
    }
}
