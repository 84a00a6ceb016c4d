//! IO error type.

use std::path::Path;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum IoError {
    /// The path's format cannot be inferred or is not handled.
    #[error("unsupported volume format: {0}")]
    UnsupportedFormat(String),

    /// A legacy VTK volume without a scalar point-data array.
    #[error("no scalar point data in {0}")]
    NoScalarData(String),

    /// Malformed content in an otherwise recognized file.
    #[error("parse error in {path}: {message}")]
    Parse { path: String, message: String },

    #[error(transparent)]
    Core(#[from] voxreg_core::CoreError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl IoError {
    pub fn parse(path: &Path, message: impl Into<String>) -> Self {
        Self::Parse {
            path: path.display().to_string(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, IoError>;
