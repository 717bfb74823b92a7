//! Separation configuration

use serde::{Deserialize, Serialize};

use crate::error::{MlError, MlResult};
use crate::inference::ExecutionProvider;
use crate::{frame_sizes, sample_rates};

/// Separation configuration
///
/// Fixed for the duration of one separation call. `frame_len` must match the
/// input length the model was exported with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeparationConfig {
    /// Frame length in samples
    pub frame_len: usize,

    /// Overlap between consecutive frames, in `[0, 1)`
    pub overlap: f32,

    /// Sample rate the model expects
    pub sample_rate: u32,

    /// Compute backend requested for the inference engine
    pub provider: ExecutionProvider,

    /// Frames inferred concurrently within one call (1 = sequential)
    pub batch_size: usize,
}

impl Default for SeparationConfig {
    fn default() -> Self {
        Self {
            frame_len: frame_sizes::MDX_DEFAULT,
            overlap: 0.25,
            sample_rate: sample_rates::MDX,
            provider: ExecutionProvider::Cpu,
            batch_size: 1,
        }
    }
}

impl SeparationConfig {
    /// No overlap: every sample is inferred once
    pub fn fast() -> Self {
        Self {
            overlap: 0.0,
            batch_size: num_cpus::get().max(1),
            ..Default::default()
        }
    }

    /// Half-frame overlap for smoother seams
    pub fn high_quality() -> Self {
        Self {
            overlap: 0.5,
            ..Default::default()
        }
    }

    /// Set frame length from a duration in seconds at the configured rate
    pub fn with_frame_secs(mut self, secs: f32) -> Self {
        self.frame_len = (secs.max(0.0) * self.sample_rate as f32).round() as usize;
        self
    }

    /// Set frame length in samples
    pub fn with_frame_len(mut self, frame_len: usize) -> Self {
        self.frame_len = frame_len;
        self
    }

    /// Set overlap fraction
    pub fn with_overlap(mut self, overlap: f32) -> Self {
        self.overlap = overlap;
        self
    }

    /// Set execution provider
    pub fn with_provider(mut self, provider: ExecutionProvider) -> Self {
        self.provider = provider;
        self
    }

    /// Set concurrent frame batch size
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Stride between frame starts: `floor(frame_len * (1 - overlap))`
    pub fn hop(&self) -> MlResult<usize> {
        if self.frame_len == 0 {
            return Err(MlError::config("frame length must be positive"));
        }
        if !self.overlap.is_finite() || self.overlap < 0.0 || self.overlap >= 1.0 {
            return Err(MlError::config(format!(
                "overlap must be in [0, 1), got {}",
                self.overlap
            )));
        }

        let hop = (self.frame_len as f64 * (1.0 - self.overlap as f64)).floor() as usize;
        if hop < 1 {
            return Err(MlError::config(format!(
                "overlap {} leaves no hop for a {}-sample frame",
                self.overlap, self.frame_len
            )));
        }

        Ok(hop)
    }

    /// Check every field before any frame is processed
    pub fn validate(&self) -> MlResult<()> {
        if self.sample_rate == 0 {
            return Err(MlError::config("sample rate must be positive"));
        }
        self.hop().map(|_| ())
    }

    /// Frame length in seconds
    pub fn frame_secs(&self) -> f32 {
        if self.sample_rate == 0 {
            0.0
        } else {
            self.frame_len as f32 / self.sample_rate as f32
        }
    }
}
