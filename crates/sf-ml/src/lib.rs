//! # StemForge ML Separation Core
//!
//! Vocal isolation from stereo music mixtures with a pre-trained ONNX model:
//! - Frame scheduling with configurable overlap
//! - Hann-weighted overlap-add reconstruction
//! - Pluggable inference adapter (tract ONNX engine or any test double)
//! - Accompaniment derived by subtracting the isolated vocals
//!
//! ## Architecture
//!
//! ```text
//! mixture ─▶ FrameSchedule ─▶ InferenceAdapter ─▶ OverlapAdd ─▶ vocals
//!                                                            └─▶ mixture - vocals
//! ```
//!
//! The separator is offline only: a whole waveform goes in, a whole
//! waveform comes out.

#![allow(missing_docs)]

pub mod inference;
pub mod separation;

mod error;
mod waveform;

pub use error::{MlError, MlResult};
pub use inference::{ExecutionProvider, InferenceConfig, InferenceEngine};
pub use separation::{InferenceAdapter, SeparationConfig, Separator, StemPair, StemType};
pub use waveform::Waveform;

/// ML model registry paths
pub mod models {
    /// Default vocal separation model
    pub const MDX_VOCALS: &str = "models/models.onnx";
}

/// Sample rates commonly used by ML models
pub mod sample_rates {
    /// MDX-Net sample rate
    pub const MDX: u32 = 44100;
}

/// Frame sizes for chunked inference
pub mod frame_sizes {
    /// Default MDX frame (5 s @ 44.1 kHz)
    pub const MDX_DEFAULT: usize = 44100 * 5;
}
