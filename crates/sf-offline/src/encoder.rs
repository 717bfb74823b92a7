//! Audio encoding module
//!
//! Stems are written as WAV via hound: 16-bit PCM by default, 24-bit PCM
//! and 32-bit float on request.

use std::io::Cursor;
use std::path::Path;

use serde::{Deserialize, Serialize};
use sf_ml::Waveform;

use crate::error::{OfflineError, OfflineResult};

// ═══════════════════════════════════════════════════════════════════════════════
// WAV CONFIG
// ═══════════════════════════════════════════════════════════════════════════════

/// WAV configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WavConfig {
    /// Bit depth (16, 24, 32)
    pub bit_depth: u8,
    /// Float format (32-bit only)
    pub float: bool,
}

impl Default for WavConfig {
    fn default() -> Self {
        Self::pcm16()
    }
}

impl WavConfig {
    /// 16-bit integer PCM
    pub fn pcm16() -> Self {
        Self {
            bit_depth: 16,
            float: false,
        }
    }

    /// 24-bit integer PCM
    pub fn pcm24() -> Self {
        Self {
            bit_depth: 24,
            float: false,
        }
    }

    /// 32-bit IEEE float
    pub fn float32() -> Self {
        Self {
            bit_depth: 32,
            float: true,
        }
    }

    /// Pick the format for a bit depth (32 means float)
    pub fn from_bit_depth(bit_depth: u8) -> OfflineResult<Self> {
        match bit_depth {
            16 => Ok(Self::pcm16()),
            24 => Ok(Self::pcm24()),
            32 => Ok(Self::float32()),
            other => Err(OfflineError::InvalidConfig(format!(
                "Unsupported bit depth: {} (expected 16, 24 or 32)",
                other
            ))),
        }
    }

    fn spec(&self, sample_rate: u32) -> OfflineResult<hound::WavSpec> {
        let sample_format = match (self.bit_depth, self.float) {
            (16 | 24, false) => hound::SampleFormat::Int,
            (32, true) => hound::SampleFormat::Float,
            _ => {
                return Err(OfflineError::InvalidConfig(format!(
                    "Unsupported WAV format: {}-bit{}",
                    self.bit_depth,
                    if self.float { " float" } else { "" }
                )));
            }
        };

        Ok(hound::WavSpec {
            channels: Waveform::CHANNELS as u16,
            sample_rate,
            bits_per_sample: self.bit_depth as u16,
            sample_format,
        })
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// WAV ENCODER
// ═══════════════════════════════════════════════════════════════════════════════

/// WAV encoder using hound
#[derive(Debug, Clone, Copy, Default)]
pub struct WavEncoder {
    config: WavConfig,
}

impl WavEncoder {
    pub fn new(config: WavConfig) -> Self {
        Self { config }
    }

    /// Encoder settings
    pub fn config(&self) -> &WavConfig {
        &self.config
    }

    /// Encode a stereo waveform to WAV bytes
    pub fn encode(&self, waveform: &Waveform) -> OfflineResult<Vec<u8>> {
        let spec = self.config.spec(waveform.sample_rate())?;

        let mut output = Vec::new();
        let mut writer = hound::WavWriter::new(Cursor::new(&mut output), spec)
            .map_err(|e| OfflineError::EncodingError(e.to_string()))?;

        let encoding = |e: hound::Error| OfflineError::EncodingError(e.to_string());
        let interleaved = waveform.interleave();

        match (self.config.bit_depth, self.config.float) {
            (16, _) => {
                for &sample in &interleaved {
                    let s = (sample.clamp(-1.0, 1.0) * 32767.0) as i16;
                    writer.write_sample(s).map_err(encoding)?;
                }
            }
            (24, _) => {
                for &sample in &interleaved {
                    let s = (sample.clamp(-1.0, 1.0) * 8388607.0) as i32;
                    writer.write_sample(s).map_err(encoding)?;
                }
            }
            _ => {
                for &sample in &interleaved {
                    writer.write_sample(sample.clamp(-1.0, 1.0)).map_err(encoding)?;
                }
            }
        }

        writer.finalize().map_err(encoding)?;

        Ok(output)
    }

    /// Encode and write to `path`, creating parent directories
    pub fn write(&self, path: &Path, waveform: &Waveform) -> OfflineResult<u64> {
        let data = self.encode(waveform)?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                OfflineError::WriteError(format!("{}: {}", parent.display(), e))
            })?;
        }

        std::fs::write(path, &data)
            .map_err(|e| OfflineError::WriteError(format!("{}: {}", path.display(), e)))?;

        Ok(data.len() as u64)
    }

    fn extension(&self) -> &'static str {
        "wav"
    }
}

/// Write a stereo waveform as WAV, returning the file size in bytes
pub fn write_stereo(path: &Path, waveform: &Waveform, config: &WavConfig) -> OfflineResult<u64> {
    let encoder = WavEncoder::new(*config);
    let is_wav = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(encoder.extension()));

    if !is_wav {
        return Err(OfflineError::UnsupportedFormat(format!(
            "{}: stems are written as .{}",
            path.display(),
            encoder.extension()
        )));
    }

    encoder.write(path, waveform)
}
