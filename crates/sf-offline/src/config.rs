//! Batch configuration
//!
//! Loaded from JSON; every field has a default so partial files work.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sf_ml::{ExecutionProvider, SeparationConfig};

use crate::encoder::WavConfig;
use crate::error::{OfflineError, OfflineResult};

/// Largest overlap offered to users
pub const MAX_OVERLAP: f32 = 0.9;

/// Frame duration bounds in seconds
pub const FRAME_SECS_RANGE: (f32, f32) = (1.0, 15.0);

/// Batch processing configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// ONNX model file
    pub model_path: PathBuf,

    /// Requested execution provider
    pub device: ExecutionProvider,

    /// Overlap between frames, in `[0, MAX_OVERLAP]`
    pub overlap: f32,

    /// Frame duration in seconds
    pub frame_secs: f32,

    /// Files processed concurrently (0 = auto)
    pub max_parallel: usize,

    /// Frames inferred concurrently within one file
    pub frame_batch: usize,

    /// Output bit depth (16, 24 or 32 float)
    pub bit_depth: u8,
}

impl Default for BatchConfig {
    fn default() -> Self {
        let separation = SeparationConfig::default();
        Self {
            model_path: PathBuf::from(sf_ml::models::MDX_VOCALS),
            device: ExecutionProvider::Cpu,
            overlap: separation.overlap,
            frame_secs: separation.frame_secs(),
            max_parallel: 0,
            frame_batch: 1,
            bit_depth: 16,
        }
    }
}

impl BatchConfig {
    /// Load from a JSON file
    pub fn load(path: &Path) -> OfflineResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            OfflineError::InvalidConfig(format!("{}: {}", path.display(), e))
        })?;

        serde_json::from_str(&text)
            .map_err(|e| OfflineError::InvalidConfig(format!("{}: {}", path.display(), e)))
    }

    /// Save as pretty JSON
    pub fn save(&self, path: &Path) -> OfflineResult<()> {
        let text = serde_json::to_string_pretty(self)
            .map_err(|e| OfflineError::InvalidConfig(e.to_string()))?;
        std::fs::write(path, text)?;
        Ok(())
    }

    /// Check every field before the model is loaded
    pub fn validate(&self) -> OfflineResult<()> {
        if !(0.0..=MAX_OVERLAP).contains(&self.overlap) {
            return Err(OfflineError::InvalidConfig(format!(
                "overlap must be between 0 and {}, got {}",
                MAX_OVERLAP, self.overlap
            )));
        }

        let (min_secs, max_secs) = FRAME_SECS_RANGE;
        if !(min_secs..=max_secs).contains(&self.frame_secs) {
            return Err(OfflineError::InvalidConfig(format!(
                "frame length must be between {} and {} seconds, got {}",
                min_secs, max_secs, self.frame_secs
            )));
        }

        WavConfig::from_bit_depth(self.bit_depth)?;
        self.separation_config().validate()?;

        Ok(())
    }

    /// Separation settings derived from this batch config
    pub fn separation_config(&self) -> SeparationConfig {
        SeparationConfig::default()
            .with_frame_secs(self.frame_secs)
            .with_overlap(self.overlap)
            .with_provider(self.device)
            .with_batch_size(self.frame_batch)
    }

    /// Stem encoding settings
    pub fn wav_config(&self) -> OfflineResult<WavConfig> {
        WavConfig::from_bit_depth(self.bit_depth)
    }

    /// Effective number of files processed at once
    pub fn parallelism(&self) -> usize {
        if self.max_parallel == 0 {
            num_cpus::get().max(1)
        } else {
            self.max_parallel
        }
    }
}
