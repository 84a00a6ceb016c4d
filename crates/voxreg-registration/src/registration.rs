//! Gradient-driven rigid registration loop.

use burn::optim::GradientsParams;
use burn::tensor::backend::AutodiffBackend;
use burn::tensor::ElementConversion;
use tracing::{debug, info};
use voxreg_core::image::Image;
use voxreg_core::transform::RigidTransform;

use crate::error::{RegistrationError, Result};
use crate::metric::Metric;
use crate::optimizer::Optimizer;
use crate::sampling::RandomSampler;

/// Similarity metric selector for the high-level driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    /// Parzen-window mutual information, for multi-modal pairs.
    MutualInformation,
    /// Mean squared difference, for mono-modal pairs.
    MeanSquares,
}

/// Optimizer selector for the high-level driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptimizerKind {
    GradientDescent,
    Adam,
}

/// Settings for a rigid registration run.
#[derive(Debug, Clone)]
pub struct RegistrationConfig {
    pub metric: MetricKind,
    pub optimizer: OptimizerKind,
    pub learning_rate: f64,
    pub max_iterations: usize,
    /// Stop when the best metric value no longer improves by at least
    /// this much within the trailing window.
    pub convergence_min_value: f64,
    pub convergence_window: usize,
    /// Fraction of fixed voxels sampled per iteration, in `(0, 1]`.
    pub sampling_fraction: f64,
    pub seed: u64,
    pub histogram_bins: usize,
    pub parzen_sigma: f64,
    /// Per-level shrink factors, coarsest first. One entry per pyramid
    /// level; `[1]` runs at full resolution only.
    pub shrink_factors: Vec<usize>,
    /// Per-level Gaussian smoothing sigmas, paired with `shrink_factors`.
    pub smoothing_sigmas: Vec<f64>,
    pub log_every: usize,
}

impl Default for RegistrationConfig {
    fn default() -> Self {
        Self {
            metric: MetricKind::MutualInformation,
            optimizer: OptimizerKind::GradientDescent,
            learning_rate: 0.3,
            max_iterations: 200,
            convergence_min_value: 1e-6,
            convergence_window: 10,
            sampling_fraction: 0.9,
            seed: 42,
            histogram_bins: 32,
            parzen_sigma: 0.05,
            shrink_factors: vec![1],
            smoothing_sigmas: vec![0.0],
            log_every: 10,
        }
    }
}

impl RegistrationConfig {
    pub fn validate(&self) -> Result<()> {
        if self.learning_rate <= 0.0 {
            return Err(RegistrationError::invalid_configuration(format!(
                "learning rate must be positive, got {}",
                self.learning_rate
            )));
        }
        if self.max_iterations == 0 {
            return Err(RegistrationError::invalid_configuration(
                "max_iterations must be positive",
            ));
        }
        if self.convergence_window == 0 {
            return Err(RegistrationError::invalid_configuration(
                "convergence_window must be positive",
            ));
        }
        if !(self.sampling_fraction > 0.0 && self.sampling_fraction <= 1.0) {
            return Err(RegistrationError::invalid_configuration(format!(
                "sampling_fraction must be in (0, 1], got {}",
                self.sampling_fraction
            )));
        }
        if self.histogram_bins < 2 {
            return Err(RegistrationError::invalid_configuration(format!(
                "histogram_bins must be at least 2, got {}",
                self.histogram_bins
            )));
        }
        if self.shrink_factors.is_empty()
            || self.shrink_factors.len() != self.smoothing_sigmas.len()
        {
            return Err(RegistrationError::invalid_configuration(
                "shrink_factors and smoothing_sigmas must be non-empty and equal length",
            ));
        }
        Ok(())
    }
}

/// Metric value and parameters at one optimizer iteration.
#[derive(Debug, Clone, PartialEq)]
pub struct IterationRecord {
    pub iteration: usize,
    pub metric: f64,
    /// `[rx, ry, rz, tx, ty, tz]` at the start of the iteration.
    pub params: [f64; 6],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationStatus {
    Converged,
    MaxIterationsReached,
}

/// Final transform plus the full iteration trace.
pub struct RegistrationOutcome<B: AutodiffBackend> {
    pub transform: RigidTransform<B>,
    pub history: Vec<IterationRecord>,
    pub status: RegistrationStatus,
}

impl<B: AutodiffBackend> RegistrationOutcome<B> {
    pub fn final_metric(&self) -> Option<f64> {
        self.history.last().map(|r| r.metric)
    }
}

/// Identity rotation about the fixed volume's geometric center, with the
/// translation that maps that center onto the moving volume's center.
pub fn centered_initializer<B: AutodiffBackend>(
    fixed: &Image<B, 3>,
    moving: &Image<B, 3>,
    device: &B::Device,
) -> RigidTransform<B> {
    let fixed_center = fixed.physical_center();
    let moving_center = moving.physical_center();
    RigidTransform::from_params(
        [
            0.0,
            0.0,
            0.0,
            moving_center[0] - fixed_center[0],
            moving_center[1] - fixed_center[1],
            moving_center[2] - fixed_center[2],
        ],
        fixed_center,
        device,
    )
}

/// Whether the best metric value stopped improving over the trailing
/// window.
fn has_converged(values: &[f64], window: usize, min_value: f64) -> bool {
    if values.len() <= window {
        return false;
    }
    let split = values.len() - window;
    let older_best = values[..split].iter().cloned().fold(f64::INFINITY, f64::min);
    let recent_best = values[split..].iter().cloned().fold(f64::INFINITY, f64::min);
    older_best - recent_best < min_value
}

/// Single-level registration loop over one metric and one optimizer.
pub struct Registration<B, O, M>
where
    B: AutodiffBackend,
    O: Optimizer<RigidTransform<B>, B>,
    M: Metric<B>,
{
    optimizer: O,
    metric: M,
    config: RegistrationConfig,
    _backend: std::marker::PhantomData<B>,
}

impl<B, O, M> Registration<B, O, M>
where
    B: AutodiffBackend,
    O: Optimizer<RigidTransform<B>, B>,
    M: Metric<B>,
{
    pub fn new(optimizer: O, metric: M, config: RegistrationConfig) -> Self {
        Self {
            optimizer,
            metric,
            config,
            _backend: std::marker::PhantomData,
        }
    }

    /// Run the optimization from `transform` until convergence or the
    /// iteration cap.
    pub fn execute(
        &mut self,
        fixed: &Image<B, 3>,
        moving: &Image<B, 3>,
        mut transform: RigidTransform<B>,
    ) -> Result<RegistrationOutcome<B>> {
        self.config.validate()?;
        // Trilinear sampling needs at least two voxels along every axis.
        for (role, shape) in [("fixed", fixed.shape()), ("moving", moving.shape())] {
            if shape.iter().any(|&d| d < 2) {
                return Err(RegistrationError::dimension_mismatch(format!(
                    "{role} volume shape {shape:?} is too small to sample"
                )));
            }
        }
        self.optimizer.set_learning_rate(self.config.learning_rate);

        let device = fixed.data().device();
        let mut sampler = RandomSampler::new(self.config.sampling_fraction, self.config.seed)?;

        let mut history: Vec<IterationRecord> = Vec::new();
        let mut values: Vec<f64> = Vec::new();
        let mut status = RegistrationStatus::MaxIterationsReached;

        for iteration in 0..self.config.max_iterations {
            let indices = sampler.sample(fixed.shape(), &device);
            let loss = self.metric.forward(fixed, moving, &transform, indices);

            let value = loss.clone().into_scalar().elem::<f64>();
            if !value.is_finite() {
                return Err(RegistrationError::MetricFailure {
                    iteration,
                    message: format!("{} produced {value}", self.metric.name()),
                });
            }

            history.push(IterationRecord {
                iteration,
                metric: value,
                params: transform.params(),
            });
            values.push(value);

            if iteration % self.config.log_every == 0 {
                info!(iteration, metric = value, "registration step");
            } else {
                debug!(iteration, metric = value, "registration step");
            }

            if has_converged(
                &values,
                self.config.convergence_window,
                self.config.convergence_min_value,
            ) {
                info!(iteration, metric = value, "converged");
                status = RegistrationStatus::Converged;
                break;
            }

            let grads = loss.backward();
            let grads_params = GradientsParams::from_grads(grads, &transform);
            transform = self.optimizer.step(transform, grads_params);
        }

        Ok(RegistrationOutcome {
            transform,
            history,
            status,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::Autodiff;
    use burn_ndarray::NdArray;
    use voxreg_core::spatial::{Direction3, Point3, Spacing3};

    use crate::metric::MeanSquares;
    use crate::optimizer::GradientDescent;

    type B = Autodiff<NdArray<f32>>;

    fn blob_volume(size: usize, center: [f64; 3], sigma: f64) -> Image<B, 3> {
        let mut data = Vec::with_capacity(size * size * size);
        for z in 0..size {
            for y in 0..size {
                for x in 0..size {
                    let d2 = (x as f64 - center[0]).powi(2)
                        + (y as f64 - center[1]).powi(2)
                        + (z as f64 - center[2]).powi(2);
                    data.push((-d2 / (2.0 * sigma * sigma)).exp() as f32);
                }
            }
        }
        Image::from_raw(
            data,
            [size, size, size],
            Point3::origin(),
            Spacing3::uniform(1.0),
            Direction3::identity(),
            &Default::default(),
        )
    }

    #[test]
    fn test_has_converged() {
        assert!(!has_converged(&[1.0, 0.5], 10, 1e-6));
        assert!(has_converged(&[1.0, 0.5, 0.5, 0.5], 3, 1e-6));
        assert!(!has_converged(&[1.0, 0.5, 0.4, 0.3], 3, 1e-6));
    }

    #[test]
    fn test_centered_initializer() {
        let fixed = blob_volume(8, [3.5, 3.5, 3.5], 2.0);
        let moving = Image::new(
            fixed.data().clone(),
            Point3::new([10.0, 0.0, 0.0]),
            *fixed.spacing(),
            *fixed.direction(),
        );
        let init = centered_initializer(&fixed, &moving, &Default::default());
        let params = init.params();
        assert!((params[3] - 10.0).abs() < 1e-5);
        assert!(params[4].abs() < 1e-5);
        assert!(params[5].abs() < 1e-5);
    }

    #[test]
    fn test_self_registration_converges() {
        let image = blob_volume(12, [5.5, 5.5, 5.5], 3.0);
        let device = Default::default();

        let config = RegistrationConfig {
            metric: MetricKind::MeanSquares,
            optimizer: OptimizerKind::GradientDescent,
            learning_rate: 0.1,
            max_iterations: 50,
            sampling_fraction: 1.0,
            ..Default::default()
        };
        let initial = centered_initializer(&image, &image, &device);
        let mut engine = Registration::new(
            GradientDescent::new(config.learning_rate),
            MeanSquares::new(),
            config,
        );

        let outcome = engine.execute(&image, &image, initial).unwrap();
        assert_eq!(outcome.status, RegistrationStatus::Converged);
        assert!(outcome.final_metric().unwrap() < 1e-6);

        let params = outcome.transform.params();
        for p in params {
            assert!(p.abs() < 1e-2);
        }
    }

    #[test]
    fn test_rejects_single_slice_volume() {
        let device = Default::default();
        let fixed = Image::<B, 3>::from_raw(
            vec![1.0; 16],
            [1, 4, 4],
            Point3::origin(),
            Spacing3::uniform(1.0),
            Direction3::identity(),
            &device,
        );
        let moving = blob_volume(8, [3.5, 3.5, 3.5], 2.0);

        let config = RegistrationConfig {
            metric: MetricKind::MeanSquares,
            optimizer: OptimizerKind::GradientDescent,
            sampling_fraction: 1.0,
            ..Default::default()
        };
        let initial = centered_initializer(&fixed, &moving, &device);
        let mut engine = Registration::new(
            GradientDescent::new(config.learning_rate),
            MeanSquares::new(),
            config,
        );

        assert!(matches!(
            engine.execute(&fixed, &moving, initial),
            Err(RegistrationError::DimensionMismatch(_))
        ));
    }

    #[test]
    fn test_rejects_bad_config() {
        let config = RegistrationConfig {
            learning_rate: -1.0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
