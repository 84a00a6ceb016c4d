use burn::module::AutodiffModule;
use burn::optim::adaptor::OptimizerAdaptor;
use burn::optim::{GradientsParams, Optimizer as BurnOptimizer, Sgd, SgdConfig};
use burn::tensor::backend::AutodiffBackend;

use super::trait_::Optimizer;

/// Plain gradient descent, wrapping Burn's SGD without momentum.
pub struct GradientDescent<M: AutodiffModule<B>, B: AutodiffBackend> {
    optimizer: OptimizerAdaptor<Sgd<B::InnerBackend>, M, B>,
    learning_rate: f64,
}

impl<M: AutodiffModule<B>, B: AutodiffBackend> GradientDescent<M, B> {
    pub fn new(learning_rate: f64) -> Self {
        Self {
            optimizer: SgdConfig::new().init(),
            learning_rate,
        }
    }
}

impl<M, B> Optimizer<M, B> for GradientDescent<M, B>
where
    M: AutodiffModule<B>,
    B: AutodiffBackend,
{
    fn step(&mut self, module: M, gradients: GradientsParams) -> M {
        self.optimizer.step(self.learning_rate, module, gradients)
    }

    fn learning_rate(&self) -> f64 {
        self.learning_rate
    }

    fn set_learning_rate(&mut self, lr: f64) {
        self.learning_rate = lr;
    }
}
