//! Optimizer trait for updating transform parameters.

use burn::module::AutodiffModule;
use burn::optim::GradientsParams;
use burn::tensor::backend::AutodiffBackend;

/// Updates a transform module from the gradients of the metric loss.
pub trait Optimizer<M, B>
where
    M: AutodiffModule<B>,
    B: AutodiffBackend,
{
    /// Apply one update and return the new module.
    fn step(&mut self, module: M, gradients: GradientsParams) -> M;

    fn learning_rate(&self) -> f64;

    fn set_learning_rate(&mut self, lr: f64);
}
