//! Error types for separation and inference

use thiserror::Error;

/// Separation and inference error types
#[derive(Error, Debug)]
pub enum MlError {
    /// Frame length, overlap or sample rate cannot drive a separation
    #[error("Invalid configuration: {reason}")]
    InvalidConfiguration { reason: String },

    /// Mixture is not a two-channel waveform of consistent length
    #[error("Invalid input: {reason}")]
    InvalidInput { reason: String },

    /// The inference adapter failed or returned an unusable frame
    #[error("Inference failed at frame {frame} (offset {offset}): {reason}")]
    InferenceFailure {
        frame: usize,
        offset: usize,
        reason: String,
    },

    /// Model file not found
    #[error("Model not found: {path}")]
    ModelNotFound { path: String },

    /// Model loading failed
    #[error("Failed to load model: {reason}")]
    ModelLoadFailed { reason: String },

    /// Model produced a tensor of unexpected rank or channel count
    #[error("Invalid output shape: expected {expected}, got {got}")]
    InvalidOutputShape { expected: String, got: String },

    /// Tract error
    #[error("Tract error: {0}")]
    TractError(String),
}

impl MlError {
    pub(crate) fn config(reason: impl Into<String>) -> Self {
        Self::InvalidConfiguration {
            reason: reason.into(),
        }
    }

    pub(crate) fn input(reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            reason: reason.into(),
        }
    }
}

/// Result type for ML operations
pub type MlResult<T> = Result<T, MlError>;
