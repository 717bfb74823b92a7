//! Error types for offline processing

use sf_ml::MlError;
use thiserror::Error;

/// Offline processing errors
#[derive(Error, Debug)]
pub enum OfflineError {
    #[error("Input file not found: {0}")]
    InputNotFound(String),

    #[error("Failed to read audio file: {0}")]
    ReadError(String),

    #[error("Failed to write output file: {0}")]
    WriteError(String),

    #[error("Encoding error: {0}")]
    EncodingError(String),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("No audio files found in {0}")]
    NoInputFiles(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Sample rate conversion failed: {0}")]
    Resample(String),

    #[error("Separation failed: {0}")]
    Separation(#[from] MlError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Job cancelled")]
    Cancelled,
}

/// Result type for offline operations
pub type OfflineResult<T> = Result<T, OfflineError>;
