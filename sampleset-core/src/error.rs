//! Error types for dataset adapters and transforms

use thiserror::Error;

/// Result type for dataset operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for dataset operations
#[derive(Error, Debug)]
pub enum Error {
    /// A dataset was constructed from inconsistent or missing fields
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Index out of bounds
    #[error("Index {index} out of bounds for length {len}")]
    IndexOutOfBounds {
        /// The requested index
        index: usize,
        /// The length of the indexed container
        len: usize,
    },

    /// A sample did not have the number of fields a transform or mask expects
    #[error("Arity mismatch: expected {expected} fields, got {actual}")]
    ArityMismatch {
        /// Number of fields expected
        expected: usize,
        /// Number of fields received
        actual: usize,
    },

    /// Data type mismatch
    #[error("Data type mismatch: {0}")]
    TypeMismatch(String),

    /// Invalid argument
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Array shape error
    #[error("Shape error: {0}")]
    Shape(#[from] ndarray::ShapeError),

    /// Configuration could not be parsed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A per-field function failed
    #[error("Transformation error: {0}")]
    Transformation(String),
}
