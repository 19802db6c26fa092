//! Error types for store readers

use thiserror::Error;

/// Error type for store readers
#[derive(Error, Debug)]
pub enum Error {
    /// Core library error
    #[error("Core error: {0}")]
    Core(#[from] sampleset_core::error::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The store file could not be parsed
    #[error("Safetensors error: {0}")]
    SafeTensors(#[from] safetensors::SafeTensorError),

    /// Configuration file could not be parsed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A dataset was opened with missing or inconsistent fields
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Format error
    #[error("Format error: {0}")]
    Format(String),

    /// Unsupported operation
    #[error("Unsupported operation: {0}")]
    Unsupported(String),
}

/// Result type for store readers
pub type Result<T> = std::result::Result<T, Error>;
