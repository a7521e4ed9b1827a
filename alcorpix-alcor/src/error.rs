//! ALCOR-specific error types.

use thiserror::Error;

/// Result type for ALCOR operations.
pub type Result<T> = std::result::Result<T, Error>;

/// ALCOR-specific error types.
#[derive(Error, Debug)]
pub enum Error {
    /// Chip configuration is inconsistent.
    #[error("invalid chip configuration: {0}")]
    InvalidConfig(String),

    /// Configuration document could not be parsed.
    #[error("configuration parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Core library error.
    #[error("core error: {0}")]
    CoreError(#[from] alcorpix_core::Error),
}
