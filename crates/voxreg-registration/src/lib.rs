//! Rigid multi-modal volume registration.
//!
//! Optimizes a [`voxreg_core::transform::RigidTransform`] that maps
//! fixed-space points into moving space by gradient descent on a
//! differentiable similarity metric.

pub mod error;
pub mod metric;
pub mod multires;
pub mod optimizer;
pub mod registration;
pub mod sampling;

pub use error::{RegistrationError, Result};
pub use multires::register_volumes;
pub use registration::{
    centered_initializer, IterationRecord, MetricKind, OptimizerKind, Registration,
    RegistrationConfig, RegistrationOutcome, RegistrationStatus,
};
