//! Interleaved decode buffer and stereo conversion

use sf_ml::Waveform;

use crate::error::{OfflineError, OfflineResult};

/// Decoded audio as it comes out of the container
#[derive(Debug, Clone)]
pub struct AudioBuffer {
    /// Interleaved samples
    pub samples: Vec<f32>,
    /// Number of channels
    pub channels: usize,
    /// Sample rate
    pub sample_rate: u32,
}

impl AudioBuffer {
    /// Create new buffer
    pub fn new(channels: usize, sample_rate: u32) -> Self {
        Self {
            samples: Vec::new(),
            channels,
            sample_rate,
        }
    }

    /// Number of frames
    pub fn frames(&self) -> usize {
        if self.channels == 0 {
            0
        } else {
            self.samples.len() / self.channels
        }
    }

    /// Fold any channel layout to two channels
    ///
    /// Mono is duplicated to both sides; wider layouts keep the first two
    /// channels.
    pub fn to_stereo(&self) -> OfflineResult<AudioBuffer> {
        let samples = match self.channels {
            0 => {
                return Err(OfflineError::ReadError(
                    "audio stream has no channels".to_string(),
                ));
            }
            1 => self.samples.iter().flat_map(|&s| [s, s]).collect(),
            2 => self.samples.clone(),
            n => self
                .samples
                .chunks_exact(n)
                .flat_map(|frame| [frame[0], frame[1]])
                .collect(),
        };

        Ok(AudioBuffer {
            samples,
            channels: 2,
            sample_rate: self.sample_rate,
        })
    }

    /// Convert to a stereo waveform at the buffer's own rate
    pub fn into_waveform(self) -> OfflineResult<Waveform> {
        let stereo = if self.channels == 2 {
            self
        } else {
            self.to_stereo()?
        };

        Ok(Waveform::from_interleaved(
            &stereo.samples,
            stereo.channels,
            stereo.sample_rate,
        )?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mono_to_stereo() {
        let mono = AudioBuffer {
            samples: vec![0.5, -0.5, 0.25],
            channels: 1,
            sample_rate: 44100,
        };

        let stereo = mono.to_stereo().unwrap();
        assert_eq!(stereo.channels, 2);
        assert_eq!(stereo.samples, vec![0.5, 0.5, -0.5, -0.5, 0.25, 0.25]);
    }

    #[test]
    fn test_surround_keeps_front_pair() {
        let surround = AudioBuffer {
            samples: vec![0.1, 0.2, 0.3, 0.4, 0.5, 0.6, 0.7, 0.8],
            channels: 4,
            sample_rate: 48000,
        };

        let stereo = surround.to_stereo().unwrap();
        assert_eq!(stereo.samples, vec![0.1, 0.2, 0.5, 0.6]);
        assert_eq!(stereo.frames(), 2);
    }

    #[test]
    fn test_into_waveform() {
        let buffer = AudioBuffer {
            samples: vec![0.1, 0.2, 0.3],
            channels: 1,
            sample_rate: 22050,
        };

        let waveform = buffer.into_waveform().unwrap();
        assert_eq!(waveform.len(), 3);
        assert_eq!(waveform.sample_rate(), 22050);
        assert_eq!(waveform.left(), waveform.right());
    }

    #[test]
    fn test_no_channels_rejected() {
        let buffer = AudioBuffer::new(0, 44100);
        assert_eq!(buffer.frames(), 0);
        assert!(buffer.to_stereo().is_err());
    }
}
