//! Sample rate conversion with rubato

use rubato::{FftFixedIn, Resampler};
use sf_ml::Waveform;

use crate::error::{OfflineError, OfflineResult};

/// Input frames per resampler call
const CHUNK_SIZE: usize = 1024;

/// FFT sub-chunks per chunk
const SUB_CHUNKS: usize = 2;

fn append(block: Vec<Vec<f32>>, output: &mut [Vec<f32>]) {
    for (channel, samples) in output.iter_mut().zip(block) {
        channel.extend_from_slice(&samples);
    }
}

fn resample_error(e: impl std::fmt::Display) -> OfflineError {
    OfflineError::Resample(e.to_string())
}

/// Resample a stereo waveform to `target_rate`
///
/// The output holds `ceil(len * target / source)` samples per channel with
/// the resampler's group delay removed.
pub fn resample(waveform: &Waveform, target_rate: u32) -> OfflineResult<Waveform> {
    let source_rate = waveform.sample_rate();
    if source_rate == 0 || target_rate == 0 {
        return Err(OfflineError::Resample(format!(
            "cannot convert {} Hz -> {} Hz",
            source_rate, target_rate
        )));
    }
    if source_rate == target_rate {
        return Ok(waveform.clone());
    }
    if waveform.is_empty() {
        return Ok(Waveform::silence(0, target_rate));
    }

    let len = waveform.len();
    let expected =
        (len as f64 * target_rate as f64 / source_rate as f64).ceil() as usize;

    let mut resampler = FftFixedIn::<f32>::new(
        source_rate as usize,
        target_rate as usize,
        CHUNK_SIZE,
        SUB_CHUNKS,
        Waveform::CHANNELS,
    )
    .map_err(resample_error)?;

    let delay = resampler.output_delay();
    let input = [waveform.left().to_vec(), waveform.right().to_vec()];
    let mut output = vec![Vec::with_capacity(expected + delay); Waveform::CHANNELS];

    let mut pos = 0;
    while len - pos >= resampler.input_frames_next() {
        let next = resampler.input_frames_next();
        let chunk: Vec<&[f32]> = input.iter().map(|c| &c[pos..pos + next]).collect();
        let block = resampler.process(&chunk, None).map_err(resample_error)?;
        append(block, &mut output);
        pos += next;
    }

    if pos < len {
        let tail: Vec<&[f32]> = input.iter().map(|c| &c[pos..]).collect();
        let block = resampler
            .process_partial(Some(tail.as_slice()), None)
            .map_err(resample_error)?;
        append(block, &mut output);
    }

    // Flush until the delayed signal has fully come out
    while output[0].len() < expected + delay {
        let block = resampler
            .process_partial(None::<&[Vec<f32>]>, None)
            .map_err(resample_error)?;
        if block.first().is_none_or(|c| c.is_empty()) {
            break;
        }
        append(block, &mut output);
    }

    let trim = |channel: &Vec<f32>| -> Vec<f32> {
        let start = delay.min(channel.len());
        let end = (delay + expected).min(channel.len());
        channel[start..end].to_vec()
    };

    Ok(Waveform::from_channels(
        trim(&output[0]),
        trim(&output[1]),
        target_rate,
    )?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tone(len: usize, rate: u32) -> Waveform {
        let samples: Vec<f32> = (0..len)
            .map(|i| (2.0 * std::f32::consts::PI * 440.0 * i as f32 / rate as f32).sin() * 0.5)
            .collect();
        Waveform::from_channels(samples.clone(), samples, rate).unwrap()
    }

    #[test]
    fn test_same_rate_is_noop() {
        let input = tone(1000, 44100);
        assert_eq!(resample(&input, 44100).unwrap(), input);
    }

    #[test]
    fn test_upsample_length() {
        let input = tone(22050, 22050);
        let output = resample(&input, 44100).unwrap();

        assert_eq!(output.sample_rate(), 44100);
        assert_eq!(output.len(), 44100);
        assert!(output.peak() > 0.4 && output.peak() < 0.6);
    }

    #[test]
    fn test_downsample_length() {
        let input = tone(4800, 48000);
        let output = resample(&input, 44100).unwrap();
        assert_eq!(output.len(), 4410);
    }

    #[test]
    fn test_empty_and_zero_rate() {
        let empty = Waveform::silence(0, 48000);
        assert!(resample(&empty, 44100).unwrap().is_empty());
        assert!(resample(&tone(10, 44100), 0).is_err());
    }
}
