//! Error types for alcorpix-core.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for alcorpix operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for alcorpix operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Input stream or calibration store could not be opened.
    #[error("input unavailable: {}", path.display())]
    InputUnavailable { path: PathBuf },

    /// An opened input lacks the expected table or column.
    #[error("schema missing: {0}")]
    SchemaMissing(String),

    /// A candidate parameter point produced no qualifying residual pairs.
    #[error("degenerate fit: no qualifying hit pairs")]
    DegenerateFit,

    /// TDC index outside of 0..=3.
    #[error("malformed TDC index: {0}")]
    MalformedChannelIndex(i32),

    /// A field does not fit the range of its hit record column.
    #[error("field {field} out of range: {value}")]
    FieldOutOfRange { field: &'static str, value: i64 },

    /// Histogram binning or contents are inconsistent.
    #[error("invalid histogram: {0}")]
    InvalidHistogram(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    ConfigError(String),
}
