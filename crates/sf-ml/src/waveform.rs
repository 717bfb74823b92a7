//! Stereo waveform container
//!
//! Planar `[2, T]` storage shared by the separator, the decoder and the
//! encoder. Every constructor enforces the two-channel, equal-length
//! invariant, so downstream stages never re-check channel counts.

use ndarray::{Array2, ArrayView1, ArrayView2, Axis};

use crate::error::{MlError, MlResult};

/// Two-channel floating-point audio at a fixed sample rate
#[derive(Debug, Clone, PartialEq)]
pub struct Waveform {
    /// Planar samples, row 0 = left, row 1 = right
    samples: Array2<f32>,
    /// Sample rate in Hz
    sample_rate: u32,
}

impl Waveform {
    /// Channel count of every waveform
    pub const CHANNELS: usize = 2;

    /// Wrap a `[channels, samples]` array
    pub fn new(samples: Array2<f32>, sample_rate: u32) -> MlResult<Self> {
        if samples.nrows() != Self::CHANNELS {
            return Err(MlError::input(format!(
                "expected {} channels, got {}",
                Self::CHANNELS,
                samples.nrows()
            )));
        }

        Ok(Self {
            samples,
            sample_rate,
        })
    }

    /// Build from separate left/right channel vectors
    pub fn from_channels(left: Vec<f32>, right: Vec<f32>, sample_rate: u32) -> MlResult<Self> {
        if left.len() != right.len() {
            return Err(MlError::input(format!(
                "channel length mismatch: left {} vs right {}",
                left.len(),
                right.len()
            )));
        }

        let len = left.len();
        let mut data = left;
        data.extend(right);

        let samples = Array2::from_shape_vec((Self::CHANNELS, len), data)
            .map_err(|e| MlError::input(e.to_string()))?;

        Ok(Self {
            samples,
            sample_rate,
        })
    }

    /// Build from interleaved `L R L R ...` samples
    pub fn from_interleaved(data: &[f32], channels: usize, sample_rate: u32) -> MlResult<Self> {
        if channels != Self::CHANNELS {
            return Err(MlError::input(format!(
                "expected stereo input, got {} channel(s)",
                channels
            )));
        }
        if data.len() % channels != 0 {
            return Err(MlError::input(format!(
                "interleaved buffer of {} samples does not split into {} equal channels",
                data.len(),
                channels
            )));
        }

        let left = data.iter().step_by(channels).copied().collect();
        let right = data.iter().skip(1).step_by(channels).copied().collect();

        Self::from_channels(left, right, sample_rate)
    }

    /// Silent waveform of `len` samples per channel
    pub fn silence(len: usize, sample_rate: u32) -> Self {
        Self {
            samples: Array2::zeros((Self::CHANNELS, len)),
            sample_rate,
        }
    }

    /// Samples per channel
    pub fn len(&self) -> usize {
        self.samples.ncols()
    }

    /// True for a zero-length waveform
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sample rate in Hz
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Duration in seconds
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            0.0
        } else {
            self.len() as f64 / self.sample_rate as f64
        }
    }

    /// Left channel
    pub fn left(&self) -> ArrayView1<'_, f32> {
        self.samples.row(0)
    }

    /// Right channel
    pub fn right(&self) -> ArrayView1<'_, f32> {
        self.samples.row(1)
    }

    /// `[2, T]` view of the samples
    pub fn view(&self) -> ArrayView2<'_, f32> {
        self.samples.view()
    }

    /// Consume into the underlying `[2, T]` array
    pub fn into_array(self) -> Array2<f32> {
        self.samples
    }

    /// Interleave into `L R L R ...`
    pub fn interleave(&self) -> Vec<f32> {
        let mut out = Vec::with_capacity(self.len() * Self::CHANNELS);
        for frame in self.samples.axis_iter(Axis(1)) {
            out.extend(frame.iter().copied());
        }
        out
    }

    /// Peak absolute sample value
    pub fn peak(&self) -> f32 {
        self.samples.iter().fold(0.0f32, |acc, s| acc.max(s.abs()))
    }

    /// `self - isolated`, the accompaniment left after removing a source
    pub fn residual(&self, isolated: &Waveform) -> MlResult<Waveform> {
        if isolated.len() != self.len() {
            return Err(MlError::input(format!(
                "cannot subtract a {}-sample waveform from a {}-sample mixture",
                isolated.len(),
                self.len()
            )));
        }

        Ok(Self {
            samples: &self.samples - &isolated.samples,
            sample_rate: self.sample_rate,
        })
    }
}
