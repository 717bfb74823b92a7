//! Separation driver
//!
//! Runs the frame schedule over one mixture, feeds every zero-padded frame
//! to the inference adapter and reassembles the outputs. The accumulation
//! buffers belong to a single call, so one `Separator` can serve many
//! mixtures concurrently.

use std::path::Path;
use std::sync::Arc;

use ndarray::{Array2, ArrayView2, s};
use rayon::prelude::*;

use super::InferenceAdapter;
use super::config::SeparationConfig;
use super::overlap_add::OverlapAdd;
use super::schedule::{FrameDescriptor, FrameSchedule};
use super::stems::StemPair;
use super::window::create_hann_window;
use crate::error::{MlError, MlResult};
use crate::inference::{InferenceConfig, InferenceEngine};
use crate::waveform::Waveform;

/// Progress report emitted after each frame is accumulated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameProgress {
    /// Zero-based frame index
    pub index: usize,
    /// Total frames in this call
    pub total: usize,
    /// First sample of the frame
    pub start: usize,
    /// End (exclusive) of the frame
    pub end: usize,
}

impl FrameProgress {
    /// Fraction of frames done (0.0 - 1.0)
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            1.0
        } else {
            (self.index + 1) as f64 / self.total as f64
        }
    }
}

/// Chunked overlap-add separator bound to one inference adapter
pub struct Separator {
    adapter: Arc<dyn InferenceAdapter>,
    config: SeparationConfig,
}

impl Separator {
    /// Bind a separator to an adapter
    pub fn new(adapter: Arc<dyn InferenceAdapter>, config: SeparationConfig) -> Self {
        Self { adapter, config }
    }

    /// Load an ONNX model and bind a separator to it
    pub fn from_model<P: AsRef<Path>>(model_path: P, config: SeparationConfig) -> MlResult<Self> {
        config.validate()?;

        let inference_config = InferenceConfig::for_separation(&config);
        let engine = InferenceEngine::new(model_path, inference_config)?;
        log::debug!(
            "Separator ready: {} on {}, {} samples per frame",
            engine.model_name(),
            engine.provider(),
            config.frame_len
        );

        Ok(Self::new(Arc::new(engine), config))
    }

    /// Separation configuration
    pub fn config(&self) -> &SeparationConfig {
        &self.config
    }

    /// Name of the bound adapter
    pub fn adapter_name(&self) -> &str {
        self.adapter.name()
    }

    /// Isolate the target source from a stereo mixture
    pub fn separate(&self, mixture: &Waveform) -> MlResult<Waveform> {
        self.separate_with_progress(mixture, |_| {})
    }

    /// [`separate`](Self::separate), reporting every accumulated frame
    pub fn separate_with_progress<F>(&self, mixture: &Waveform, on_frame: F) -> MlResult<Waveform>
    where
        F: FnMut(FrameProgress),
    {
        self.config.validate()?;

        if mixture.sample_rate() != self.config.sample_rate {
            return Err(MlError::InvalidInput {
                reason: format!(
                    "mixture is {} Hz, model expects {} Hz",
                    mixture.sample_rate(),
                    self.config.sample_rate
                ),
            });
        }

        let output = self.separate_array(mixture.view(), on_frame)?;
        Waveform::new(output, mixture.sample_rate())
    }

    /// Separate and derive the accompaniment in one step
    pub fn separate_stems(&self, mixture: &Waveform) -> MlResult<StemPair> {
        let vocals = self.separate(mixture)?;
        StemPair::from_isolated(mixture, vocals)
    }

    /// Core loop over a raw `[channels, samples]` array
    pub fn separate_array<F>(&self, mix: ArrayView2<'_, f32>, mut on_frame: F) -> MlResult<Array2<f32>>
    where
        F: FnMut(FrameProgress),
    {
        let schedule = FrameSchedule::for_config(mix.ncols(), &self.config)?;

        if mix.nrows() != Waveform::CHANNELS {
            return Err(MlError::InvalidInput {
                reason: format!(
                    "expected {} channels, got {}",
                    Waveform::CHANNELS,
                    mix.nrows()
                ),
            });
        }

        let total_samples = mix.ncols();
        let total_frames = schedule.len();
        let window = create_hann_window(self.config.frame_len);
        let mut ola = OverlapAdd::new(Waveform::CHANNELS, total_samples);

        log::debug!(
            "Separating {} samples in {} frames (frame {}, hop {}) with {}",
            total_samples,
            total_frames,
            schedule.frame_len(),
            schedule.hop(),
            self.adapter.name()
        );

        let frames: Vec<FrameDescriptor> = schedule.collect();
        let batch_size = self.config.batch_size.max(1);

        for batch in frames.chunks(batch_size) {
            let outputs: Vec<MlResult<Array2<f32>>> = if batch.len() == 1 {
                batch.iter().map(|f| self.infer_frame(mix, f)).collect()
            } else {
                batch.par_iter().map(|f| self.infer_frame(mix, f)).collect()
            };

            for (frame, output) in batch.iter().zip(outputs) {
                let output = output?;
                ola.accumulate(frame, output.view(), &window);

                log::trace!(
                    "frame {}/{} [{}..{}) pad {}",
                    frame.index + 1,
                    total_frames,
                    frame.start,
                    frame.end,
                    frame.pad
                );

                on_frame(FrameProgress {
                    index: frame.index,
                    total: total_frames,
                    start: frame.start,
                    end: frame.end,
                });
            }
        }

        Ok(ola.finalize())
    }

    /// Extract, pad, infer and validate one frame
    fn infer_frame(&self, mix: ArrayView2<'_, f32>, frame: &FrameDescriptor) -> MlResult<Array2<f32>> {
        let frame_len = self.config.frame_len;

        let mut input = Array2::<f32>::zeros((Waveform::CHANNELS, frame_len));
        input
            .slice_mut(s![.., ..frame.len()])
            .assign(&mix.slice(s![.., frame.start..frame.end]));

        let failure = |reason: String| MlError::InferenceFailure {
            frame: frame.index,
            offset: frame.start,
            reason,
        };

        let output = self
            .adapter
            .infer(input.view())
            .map_err(|e| failure(e.to_string()))?;

        if output.nrows() != Waveform::CHANNELS {
            return Err(failure(format!(
                "model returned {} channels, expected {}",
                output.nrows(),
                Waveform::CHANNELS
            )));
        }
        if output.ncols() > frame_len {
            return Err(failure(format!(
                "model returned {} samples for a {}-sample frame",
                output.ncols(),
                frame_len
            )));
        }
        if OverlapAdd::usable_len(frame, output.ncols()) == 0 {
            return Err(failure("model returned an empty frame".into()));
        }

        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Identity;

    impl InferenceAdapter for Identity {
        fn infer(&self, frame: ArrayView2<'_, f32>) -> MlResult<Array2<f32>> {
            Ok(frame.to_owned())
        }
    }

    struct Halve;

    impl InferenceAdapter for Halve {
        fn infer(&self, frame: ArrayView2<'_, f32>) -> MlResult<Array2<f32>> {
            Ok(frame.mapv(|v| v * 0.5))
        }
    }

    struct Counting(AtomicUsize);

    impl InferenceAdapter for Counting {
        fn infer(&self, frame: ArrayView2<'_, f32>) -> MlResult<Array2<f32>> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(frame.to_owned())
        }
    }

    fn ramp(len: usize) -> Waveform {
        let left = (0..len).map(|i| (i as f32 * 0.01).sin()).collect();
        let right = (0..len).map(|i| (i as f32 * 0.013).cos() * 0.5).collect();
        Waveform::from_channels(left, right, 44100).unwrap()
    }

    fn config(frame_len: usize, overlap: f32) -> SeparationConfig {
        SeparationConfig::default()
            .with_frame_len(frame_len)
            .with_overlap(overlap)
    }

    #[test]
    fn test_identity_roundtrip() {
        let mix = ramp(1000);
        let separator = Separator::new(Arc::new(Identity), config(64, 0.25));
        let out = separator.separate(&mix).unwrap();

        assert_eq!(out.len(), mix.len());
        for (a, b) in out.view().iter().zip(mix.view().iter()) {
            assert!((a - b).abs() < 1e-5);
        }
    }

    #[test]
    fn test_linear_model_scales_output() {
        let mix = ramp(333);
        let separator = Separator::new(Arc::new(Halve), config(50, 0.5));
        let out = separator.separate(&mix).unwrap();

        for (a, b) in out.view().iter().zip(mix.view().iter()) {
            assert!((a - b * 0.5).abs() < 1e-5);
        }
    }

    #[test]
    fn test_calls_adapter_once_per_frame() {
        let adapter = Arc::new(Counting(AtomicUsize::new(0)));
        let separator = Separator::new(adapter.clone(), config(10, 0.5));
        let mut reported = Vec::new();

        separator
            .separate_with_progress(&ramp(100), |p| reported.push(p))
            .unwrap();

        assert_eq!(adapter.0.load(Ordering::SeqCst), 19);
        assert_eq!(reported.len(), 19);
        assert_eq!(reported.last().map(|p| p.fraction()), Some(1.0));
        assert!(reported.windows(2).all(|w| w[0].start < w[1].start));
    }

    #[test]
    fn test_sample_rate_mismatch() {
        let mix = Waveform::silence(100, 48000);
        let separator = Separator::new(Arc::new(Identity), config(10, 0.0));
        assert!(matches!(
            separator.separate(&mix),
            Err(MlError::InvalidInput { .. })
        ));
    }

    #[test]
    fn test_rejects_mono_array() {
        let mono = Array2::<f32>::zeros((1, 32));
        let separator = Separator::new(Arc::new(Identity), config(8, 0.0));
        assert!(matches!(
            separator.separate_array(mono.view(), |_| {}),
            Err(MlError::InvalidInput { .. })
        ));
    }

    #[test]
    fn test_separate_stems() {
        let mix = ramp(200);
        let separator = Separator::new(Arc::new(Halve), config(32, 0.25));
        let stems = separator.separate_stems(&mix).unwrap();

        for (v, a) in stems.vocals.view().iter().zip(stems.accompaniment.view().iter()) {
            assert!((v - a).abs() < 1e-5);
        }
    }
}
