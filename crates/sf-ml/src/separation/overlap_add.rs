//! Weighted overlap-add reconstruction
//!
//! Each frame output is multiplied by the window and added into a `[2, T]`
//! signal buffer while the window itself is added into a `[T]` weight buffer.
//! Finalizing divides the two, so any window shape reconstructs a unity model
//! exactly.

use ndarray::{Array1, Array2, ArrayView2, Axis, Zip, s};

use super::schedule::FrameDescriptor;
use super::window::WINDOW_FLOOR;

/// Accumulation state for one separation call
#[derive(Debug)]
pub struct OverlapAdd {
    /// Windowed signal sum `[channels, samples]`
    output: Array2<f32>,
    /// Window sum `[samples]`
    weight: Array1<f32>,
}

impl OverlapAdd {
    /// Zeroed buffers for a waveform of `len` samples
    pub fn new(channels: usize, len: usize) -> Self {
        Self {
            output: Array2::zeros((channels, len)),
            weight: Array1::zeros(len),
        }
    }

    /// Samples per channel
    pub fn len(&self) -> usize {
        self.weight.len()
    }

    /// True when reconstructing a zero-length waveform
    pub fn is_empty(&self) -> bool {
        self.weight.is_empty()
    }

    /// Samples of `frame_output` that may be written for `frame`
    ///
    /// Aligns by the returned length: a model may hand back fewer samples
    /// than it was given, and the padded tail of the last frame is never
    /// written.
    pub fn usable_len(frame: &FrameDescriptor, returned_len: usize) -> usize {
        returned_len.min(frame.len())
    }

    /// Add one frame's model output; returns the number of samples written
    pub fn accumulate(
        &mut self,
        frame: &FrameDescriptor,
        frame_output: ArrayView2<'_, f32>,
        window: &[f32],
    ) -> usize {
        let len = Self::usable_len(frame, frame_output.ncols())
            .min(window.len())
            .min(self.len().saturating_sub(frame.start));
        if len == 0 {
            return 0;
        }

        let win = &window[..len];
        let range = frame.start..frame.start + len;

        for (mut out_row, in_row) in self
            .output
            .slice_mut(s![.., range.clone()])
            .axis_iter_mut(Axis(0))
            .zip(frame_output.slice(s![.., ..len]).axis_iter(Axis(0)))
        {
            Zip::from(&mut out_row)
                .and(&in_row)
                .and(win)
                .for_each(|acc, &y, &w| *acc += y * w);
        }

        Zip::from(self.weight.slice_mut(s![range]))
            .and(win)
            .for_each(|acc, &w| *acc += w);

        len
    }

    /// Divide the signal sum by the weight sum, floored at [`WINDOW_FLOOR`]
    pub fn finalize(self) -> Array2<f32> {
        let Self { mut output, weight } = self;

        for mut row in output.axis_iter_mut(Axis(0)) {
            Zip::from(&mut row)
                .and(&weight)
                .for_each(|y, &w| *y /= w.max(WINDOW_FLOOR));
        }

        output
    }
}
