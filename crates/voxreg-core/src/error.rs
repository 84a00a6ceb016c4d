//! Error types for geometry and filtering operations.

use thiserror::Error;

/// Errors raised by core geometry and filtering code.
///
/// Everything here is fatal to a pipeline run; callers surface the message
/// and abort rather than retrying.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Two grids that must be co-registered differ in geometry.
    #[error("geometry mismatch: expected {expected}, got {actual}")]
    GeometryMismatch { expected: String, actual: String },

    /// A data buffer does not match its declared grid size.
    #[error("invalid buffer length: grid has {expected} points, buffer has {actual}")]
    InvalidBufferLength { expected: usize, actual: usize },

    /// An acquisition protocol has no entry in the calibration table.
    #[error("unknown acquisition protocol: {0}")]
    UnknownProtocol(String),

    /// A mesh cell kind that an operation cannot handle.
    #[error("unsupported cell: {0}")]
    UnsupportedCell(String),

    /// Degenerate input to a numeric operation (empty volume, all-constant
    /// histogram, empty point cloud).
    #[error("degenerate input: {0}")]
    DegenerateInput(String),
}

pub type Result<T> = std::result::Result<T, CoreError>;
