//! Error types for the registration engine.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RegistrationError {
    /// The similarity metric produced a non-finite value.
    #[error("metric failure at iteration {iteration}: {message}")]
    MetricFailure { iteration: usize, message: String },

    /// A configuration value is out of range.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Pyramid schedules or image geometry disagree.
    #[error("dimension mismatch: {0}")]
    DimensionMismatch(String),
}

pub type Result<T> = std::result::Result<T, RegistrationError>;

impl RegistrationError {
    pub fn invalid_configuration(msg: impl Into<String>) -> Self {
        Self::InvalidConfiguration(msg.into())
    }

    pub fn dimension_mismatch(msg: impl Into<String>) -> Self {
        Self::DimensionMismatch(msg.into())
    }
}
