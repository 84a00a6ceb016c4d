//! Coarse-to-fine driver over a shrink/smooth pyramid schedule.

use burn::tensor::backend::AutodiffBackend;
use tracing::info;
use voxreg_core::filter::MultiResolutionPyramid;
use voxreg_core::image::Image;
use voxreg_core::transform::RigidTransform;

use crate::error::Result;
use crate::metric::{MeanSquares, MutualInformation};
use crate::optimizer::{AdamOptimizer, GradientDescent, Optimizer};
use crate::registration::{
    centered_initializer, MetricKind, OptimizerKind, Registration, RegistrationConfig,
    RegistrationOutcome,
};

/// Register `moving` onto `fixed` across the configured pyramid levels.
///
/// The returned transform maps fixed-space points into moving space, so it
/// can be handed directly to a resampler that pulls moving intensities
/// onto the fixed grid. Iteration numbers in the history run globally
/// across levels; parameters carry over from one level to the next since
/// they live in physical space.
pub fn register_volumes<B: AutodiffBackend>(
    fixed: &Image<B, 3>,
    moving: &Image<B, 3>,
    config: &RegistrationConfig,
) -> Result<RegistrationOutcome<B>> {
    config.validate()?;
    let device = fixed.data().device();

    let factors: Vec<Vec<usize>> = config.shrink_factors.iter().map(|&f| vec![f; 3]).collect();
    let sigmas: Vec<Vec<f64>> = config.smoothing_sigmas.iter().map(|&s| vec![s; 3]).collect();
    let fixed_pyramid = MultiResolutionPyramid::new(fixed, &factors, &sigmas);
    let moving_pyramid = MultiResolutionPyramid::new(moving, &factors, &sigmas);

    let mut transform = centered_initializer(fixed, moving, &device);
    let mut history = Vec::new();
    let mut status = None;

    for level in 0..fixed_pyramid.levels() {
        let fixed_level = fixed_pyramid.level(level);
        let moving_level = moving_pyramid.level(level);
        info!(
            level,
            shape = ?fixed_level.shape(),
            metric = ?config.metric,
            "registration level"
        );

        // A fresh seed per level keeps the sample draws independent.
        let mut level_config = config.clone();
        level_config.seed = config.seed.wrapping_add(level as u64);

        let outcome = match config.optimizer {
            OptimizerKind::GradientDescent => run_level(
                GradientDescent::new(config.learning_rate),
                fixed_level,
                moving_level,
                transform,
                level_config,
            )?,
            OptimizerKind::Adam => run_level(
                AdamOptimizer::new(config.learning_rate),
                fixed_level,
                moving_level,
                transform,
                level_config,
            )?,
        };

        let offset = history.len();
        history.extend(outcome.history.into_iter().map(|mut record| {
            record.iteration += offset;
            record
        }));
        transform = outcome.transform;
        status = Some(outcome.status);
    }

    let status = status.unwrap_or(crate::registration::RegistrationStatus::MaxIterationsReached);
    Ok(RegistrationOutcome {
        transform,
        history,
        status,
    })
}

fn run_level<B, O>(
    optimizer: O,
    fixed: &Image<B, 3>,
    moving: &Image<B, 3>,
    transform: RigidTransform<B>,
    config: RegistrationConfig,
) -> Result<RegistrationOutcome<B>>
where
    B: AutodiffBackend,
    O: Optimizer<RigidTransform<B>, B>,
{
    match config.metric {
        MetricKind::MutualInformation => {
            let metric = MutualInformation::new(config.histogram_bins, config.parzen_sigma);
            Registration::new(optimizer, metric, config).execute(fixed, moving, transform)
        }
        MetricKind::MeanSquares => {
            Registration::new(optimizer, MeanSquares::new(), config).execute(fixed, moving, transform)
        }
    }
}
