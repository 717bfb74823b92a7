//! Audio decoding module
//!
//! Uses symphonia for decoding every container the batch accepts:
//! - WAV (PCM)
//! - FLAC (lossless)
//! - MP3, OGG Vorbis, M4A/AAC (lossy)
//!
//! All sample formats are converted to interleaved `f32`.

use std::fs::File;
use std::path::{Path, PathBuf};

use sf_ml::Waveform;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{CODEC_TYPE_NULL, DecoderOptions};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::buffer::AudioBuffer;
use crate::error::{OfflineError, OfflineResult};
use crate::resample::resample;

// ═══════════════════════════════════════════════════════════════════════════════
// DECODER
// ═══════════════════════════════════════════════════════════════════════════════

/// Universal audio decoder using symphonia
pub struct AudioDecoder;

impl AudioDecoder {
    /// Open and probe a container
    fn open(path: &Path) -> OfflineResult<Box<dyn FormatReader>> {
        if !path.exists() {
            return Err(OfflineError::InputNotFound(path.display().to_string()));
        }

        let file = File::open(path)
            .map_err(|e| OfflineError::ReadError(format!("Failed to open file: {}", e)))?;

        let mss = MediaSourceStream::new(Box::new(file), Default::default());

        let mut hint = Hint::new();
        if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            hint.with_extension(ext);
        }

        let probed = symphonia::default::get_probe()
            .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
            .map_err(|e| match e {
                SymphoniaError::Unsupported(what) => {
                    OfflineError::UnsupportedFormat(format!("{}: {}", path.display(), what))
                }
                other => OfflineError::ReadError(format!("Failed to probe format: {}", other)),
            })?;

        Ok(probed.format)
    }

    /// Decode audio file to AudioBuffer
    pub fn decode(path: &Path) -> OfflineResult<AudioBuffer> {
        let mut format = Self::open(path)?;

        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| OfflineError::ReadError("No audio track found".to_string()))?;

        let track_id = track.id;
        let codec_params = track.codec_params.clone();

        let mut decoder = symphonia::default::get_codecs()
            .make(&codec_params, &DecoderOptions::default())
            .map_err(|e| OfflineError::UnsupportedFormat(format!("Failed to create decoder: {}", e)))?;

        let mut buffer = AudioBuffer::new(
            codec_params.channels.map(|c| c.count()).unwrap_or(0),
            codec_params.sample_rate.unwrap_or(0),
        );
        let mut scratch: Option<SampleBuffer<f32>> = None;

        loop {
            let packet = match format.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(ref e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    break;
                }
                Err(SymphoniaError::ResetRequired) => break,
                Err(e) => {
                    return Err(OfflineError::ReadError(format!("Packet read error: {}", e)));
                }
            };

            if packet.track_id() != track_id {
                continue;
            }

            let decoded = match decoder.decode(&packet) {
                Ok(decoded) => decoded,
                Err(SymphoniaError::DecodeError(e)) => {
                    log::debug!("Skipping corrupt packet in {}: {}", path.display(), e);
                    continue;
                }
                Err(e) => {
                    return Err(OfflineError::ReadError(format!("Decode error: {}", e)));
                }
            };

            let spec = *decoded.spec();
            buffer.channels = spec.channels.count();
            buffer.sample_rate = spec.rate;

            let needed = decoded.capacity() * buffer.channels;
            if scratch.as_ref().is_none_or(|s| s.capacity() < needed) {
                scratch = Some(SampleBuffer::new(decoded.capacity() as u64, spec));
            }
            if let Some(samples) = scratch.as_mut() {
                samples.copy_interleaved_ref(decoded);
                buffer.samples.extend_from_slice(samples.samples());
            }
        }

        if buffer.sample_rate == 0 {
            return Err(OfflineError::ReadError(format!(
                "Unknown sample rate in {}",
                path.display()
            )));
        }

        Ok(buffer)
    }

    /// Get audio file info without decoding
    pub fn probe(path: &Path) -> OfflineResult<AudioFileInfo> {
        let format = Self::open(path)?;

        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| OfflineError::ReadError("No audio track found".to_string()))?;

        let codec_params = &track.codec_params;

        let sample_rate = codec_params.sample_rate.unwrap_or(0);
        let frames = codec_params.n_frames.unwrap_or(0);
        let duration = if sample_rate > 0 {
            frames as f64 / sample_rate as f64
        } else {
            0.0
        };

        let format_name = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("unknown")
            .to_uppercase();

        Ok(AudioFileInfo {
            path: path.to_path_buf(),
            format: format_name,
            sample_rate,
            channels: codec_params.channels.map(|c| c.count()).unwrap_or(0),
            bit_depth: codec_params.bits_per_sample.unwrap_or(0) as u8,
            duration,
            samples: frames as usize,
        })
    }
}

/// Decode `path` into a stereo waveform at `target_rate`
///
/// Channel layouts are folded with [`AudioBuffer::to_stereo`]; a file at a
/// different rate is resampled.
pub fn load_stereo(path: &Path, target_rate: u32) -> OfflineResult<Waveform> {
    let decoded = AudioDecoder::decode(path)?;
    let channels = decoded.channels;
    let waveform = decoded.into_waveform()?;

    if channels != 2 {
        log::debug!(
            "{}: folded {} channel(s) to stereo",
            path.display(),
            channels
        );
    }

    if waveform.sample_rate() == target_rate {
        return Ok(waveform);
    }

    log::warn!(
        "{}: resampling {} Hz -> {} Hz",
        path.display(),
        waveform.sample_rate(),
        target_rate
    );
    resample(&waveform, target_rate)
}

/// Audio file information
#[derive(Debug, Clone)]
pub struct AudioFileInfo {
    pub path: PathBuf,
    pub format: String,
    pub sample_rate: u32,
    pub channels: usize,
    pub bit_depth: u8,
    pub duration: f64,
    pub samples: usize,
}

impl AudioFileInfo {
    /// Get duration as formatted string
    pub fn duration_str(&self) -> String {
        let total_secs = self.duration as u64;
        let hours = total_secs / 3600;
        let mins = (total_secs % 3600) / 60;
        let secs = total_secs % 60;
        let ms = ((self.duration - total_secs as f64) * 1000.0).round() as u64;

        if hours > 0 {
            format!("{}:{:02}:{:02}.{:03}", hours, mins, secs, ms)
        } else {
            format!("{}:{:02}.{:03}", mins, secs, ms)
        }
    }
}
