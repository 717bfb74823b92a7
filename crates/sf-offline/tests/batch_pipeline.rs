//! Offline Pipeline Integration Tests
//!
//! Verifies the file-level path around the separator:
//! - WAV write / decode round trip
//! - Channel folding and resampling on load
//! - Recursive input discovery
//! - Batch end to end with a pass-through model
//! - Per-job failure isolation and cancellation
//! - Distinct output folders for inputs sharing a file stem

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use approx::assert_abs_diff_eq;
use crossbeam_channel::unbounded;
use ndarray::{Array2, ArrayView2};
use tempfile::TempDir;

use sf_ml::separation::InferenceAdapter;
use sf_ml::{MlResult, SeparationConfig, Separator, StemType, Waveform};
use sf_offline::{
    AudioDecoder, BatchEvent, BatchProcessor, JobStatus, OfflineError, SeparationJob, WavConfig,
    discover_inputs, load_stereo, write_stereo,
};

const SAMPLE_RATE: u32 = 44100;

struct PassThrough;

impl InferenceAdapter for PassThrough {
    fn infer(&self, frame: ArrayView2<'_, f32>) -> MlResult<Array2<f32>> {
        Ok(frame.to_owned())
    }

    fn name(&self) -> &str {
        "pass-through"
    }
}

/// Pass-through that raises a cancel flag on its first frame
struct CancelOnFirstFrame {
    cancel: Arc<AtomicBool>,
}

impl InferenceAdapter for CancelOnFirstFrame {
    fn infer(&self, frame: ArrayView2<'_, f32>) -> MlResult<Array2<f32>> {
        self.cancel.store(true, Ordering::SeqCst);
        Ok(frame.to_owned())
    }
}

/// Write a 16-bit WAV where `sample(frame, channel)` gives each value
fn write_wav(path: &Path, channels: u16, rate: u32, frames: usize, sample: impl Fn(usize, usize) -> f32) {
    let spec = hound::WavSpec {
        channels,
        sample_rate: rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec).unwrap();
    for frame in 0..frames {
        for ch in 0..channels as usize {
            writer
                .write_sample((sample(frame, ch) * 32767.0) as i16)
                .unwrap();
        }
    }
    writer.finalize().unwrap();
}

fn song(frame: usize, channel: usize) -> f32 {
    let t = frame as f32 / SAMPLE_RATE as f32;
    let freq = if channel == 0 { 220.0 } else { 330.0 };
    (2.0 * std::f32::consts::PI * freq * t).sin() * 0.4
}

fn separator() -> Arc<Separator> {
    let config = SeparationConfig::default()
        .with_frame_len(4096)
        .with_overlap(0.25);
    Arc::new(Separator::new(Arc::new(PassThrough), config))
}

// ═══════════════════════════════════════════════════════════════════════════════
// AUDIO I/O
// ═══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_wav_round_trip() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested/out/mix.wav");

    let left: Vec<f32> = (0..2000).map(|i| song(i, 0)).collect();
    let right: Vec<f32> = (0..2000).map(|i| song(i, 1)).collect();
    let original = Waveform::from_channels(left, right, SAMPLE_RATE).unwrap();

    let size = write_stereo(&path, &original, &WavConfig::default()).unwrap();
    assert!(size > 8000);

    let decoded = load_stereo(&path, SAMPLE_RATE).unwrap();
    assert_eq!(decoded.len(), original.len());
    assert_eq!(decoded.sample_rate(), SAMPLE_RATE);
    for (a, b) in decoded.view().iter().zip(original.view().iter()) {
        assert_abs_diff_eq!(*a, *b, epsilon = 1e-3);
    }
}

#[test]
fn test_float_round_trip_is_exact() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("mix.wav");

    let original =
        Waveform::from_channels(vec![0.123, -0.5, 0.75], vec![0.0, 0.25, -1.0], SAMPLE_RATE)
            .unwrap();
    write_stereo(&path, &original, &WavConfig::float32()).unwrap();

    assert_eq!(load_stereo(&path, SAMPLE_RATE).unwrap(), original);
}

#[test]
fn test_mono_input_is_duplicated_and_resampled() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("mono.wav");
    write_wav(&path, 1, 22050, 22050, |frame, _| {
        (2.0 * std::f32::consts::PI * 440.0 * frame as f32 / 22050.0).sin() * 0.5
    });

    let loaded = load_stereo(&path, SAMPLE_RATE).unwrap();

    assert_eq!(loaded.sample_rate(), SAMPLE_RATE);
    assert_eq!(loaded.len(), 44100);
    assert_eq!(loaded.left(), loaded.right());
}

#[test]
fn test_probe_reads_header() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("half.wav");
    write_wav(&path, 2, SAMPLE_RATE, 22050, song);

    let info = AudioDecoder::probe(&path).unwrap();

    assert_eq!(info.format, "WAV");
    assert_eq!(info.sample_rate, SAMPLE_RATE);
    assert_eq!(info.channels, 2);
    assert_eq!(info.samples, 22050);
    assert_eq!(info.duration_str(), "0:00.500");
}

#[test]
fn test_surround_input_keeps_front_pair() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("quad.wav");
    write_wav(&path, 4, SAMPLE_RATE, 100, |_, ch| ch as f32 * 0.2);

    let loaded = load_stereo(&path, SAMPLE_RATE).unwrap();

    assert_eq!(loaded.len(), 100);
    assert!(loaded.left().iter().all(|&s| s.abs() < 1e-4));
    assert!(loaded.right().iter().all(|&s| (s - 0.2).abs() < 1e-3));
}

// ═══════════════════════════════════════════════════════════════════════════════
// DISCOVERY
// ═══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_discovery_is_recursive_and_sorted() {
    let dir = TempDir::new().unwrap();
    let root = dir.path();
    std::fs::create_dir_all(root.join("b/deeper")).unwrap();
    for name in ["z.wav", "b/deeper/a.FLAC", "b/track.mp3", "cover.jpg", "b/notes.txt"] {
        std::fs::write(root.join(name), b"").unwrap();
    }

    let found = discover_inputs(root).unwrap();
    let relative: Vec<_> = found
        .iter()
        .map(|p| p.strip_prefix(root).unwrap().to_path_buf())
        .collect();

    assert_eq!(
        relative,
        vec![
            Path::new("b/deeper/a.FLAC").to_path_buf(),
            Path::new("b/track.mp3").to_path_buf(),
            Path::new("z.wav").to_path_buf(),
        ]
    );
}

#[test]
fn test_discovery_without_audio() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("readme.md"), b"hi").unwrap();

    assert!(matches!(
        discover_inputs(dir.path()),
        Err(OfflineError::NoInputFiles(_))
    ));
}

// ═══════════════════════════════════════════════════════════════════════════════
// BATCH
// ═══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_batch_end_to_end() {
    let input = TempDir::new().unwrap();
    let output = TempDir::new().unwrap();
    write_wav(&input.path().join("first.wav"), 2, SAMPLE_RATE, 44100, song);
    write_wav(&input.path().join("second.wav"), 1, SAMPLE_RATE, 10000, song);

    let jobs = SeparationJob::for_inputs(discover_inputs(input.path()).unwrap(), output.path());
    let (tx, rx) = unbounded();
    let processor = BatchProcessor::new(separator()).with_max_parallel(2);

    let results = processor.process_all(&jobs, &tx, &AtomicBool::new(false));
    drop(tx);
    let events: Vec<BatchEvent> = rx.iter().collect();

    assert_eq!(results.len(), 2);
    assert!(results.iter().all(|r| r.status == JobStatus::Completed));
    assert_eq!(processor.stats().completed, 2);

    for job in &jobs {
        let mixture = load_stereo(&job.input_path, SAMPLE_RATE).unwrap();
        let vocals = load_stereo(&job.stem_path(StemType::Vocals), SAMPLE_RATE).unwrap();
        let accompaniment =
            load_stereo(&job.stem_path(StemType::Accompaniment), SAMPLE_RATE).unwrap();

        assert_eq!(vocals.len(), mixture.len());
        assert_eq!(accompaniment.len(), mixture.len());
        for (v, m) in vocals.view().iter().zip(mixture.view().iter()) {
            assert_abs_diff_eq!(*v, *m, epsilon = 1e-3);
        }
        assert!(accompaniment.peak() < 1e-3);
    }

    assert!(matches!(events.first(), Some(BatchEvent::Started { total_jobs: 2 })));
    assert!(matches!(events.last(), Some(BatchEvent::Finished(stats)) if stats.completed == 2));

    let frame_events = events
        .iter()
        .filter(|e| matches!(e, BatchEvent::FrameDone { .. }))
        .count();
    assert_eq!(frame_events, results.iter().map(|r| r.frames).sum::<usize>());
}

#[test]
fn test_failed_job_does_not_stop_batch() {
    let input = TempDir::new().unwrap();
    let output = TempDir::new().unwrap();
    write_wav(&input.path().join("good.wav"), 2, SAMPLE_RATE, 5000, song);
    std::fs::write(input.path().join("broken.wav"), b"definitely not a RIFF file").unwrap();

    let jobs = SeparationJob::for_inputs(discover_inputs(input.path()).unwrap(), output.path());
    let (tx, _rx) = unbounded();
    let results = BatchProcessor::new(separator()).process_all(&jobs, &tx, &AtomicBool::new(false));

    // sorted: broken.wav, good.wav
    assert_eq!(results[0].status, JobStatus::Failed);
    assert!(results[0].error.is_some());
    assert!(!output.path().join("broken").exists());

    assert_eq!(results[1].status, JobStatus::Completed);
    assert_eq!(results[1].stems.len(), 2);
    assert!(output.path().join("good/vocals.wav").is_file());
    assert!(output.path().join("good/accompaniment.wav").is_file());
}

#[test]
fn test_cancelled_batch_writes_nothing() {
    let input = TempDir::new().unwrap();
    let output = TempDir::new().unwrap();
    write_wav(&input.path().join("song.wav"), 2, SAMPLE_RATE, 5000, song);

    let jobs = SeparationJob::for_inputs(discover_inputs(input.path()).unwrap(), output.path());
    let (tx, _rx) = unbounded();
    let processor = BatchProcessor::new(separator());
    let results = processor.process_all(&jobs, &tx, &AtomicBool::new(true));

    assert_eq!(results[0].status, JobStatus::Cancelled);
    assert_eq!(processor.stats().cancelled, 1);
    assert!(!output.path().join("song").exists());
}

#[test]
fn test_cancel_during_separation_writes_nothing() {
    let input = TempDir::new().unwrap();
    let output = TempDir::new().unwrap();
    write_wav(&input.path().join("song.wav"), 2, SAMPLE_RATE, 10000, song);

    let cancel = Arc::new(AtomicBool::new(false));
    let adapter = CancelOnFirstFrame {
        cancel: Arc::clone(&cancel),
    };
    let config = SeparationConfig::default()
        .with_frame_len(4096)
        .with_overlap(0.25);
    let processor = BatchProcessor::new(Arc::new(Separator::new(Arc::new(adapter), config)));

    let jobs = SeparationJob::for_inputs(discover_inputs(input.path()).unwrap(), output.path());
    let (tx, rx) = unbounded();
    let results = processor.process_all(&jobs, &tx, &cancel);
    drop(tx);
    let events: Vec<BatchEvent> = rx.iter().collect();

    assert!(
        events
            .iter()
            .any(|e| matches!(e, BatchEvent::FrameDone { index: 0, .. }))
    );
    assert_eq!(results[0].status, JobStatus::Cancelled);
    assert!(results[0].stems.is_empty());
    assert_eq!(processor.stats().cancelled, 1);
    assert!(!output.path().join("song").exists());
}

#[test]
fn test_same_stem_inputs_keep_matched_stems() {
    let input = TempDir::new().unwrap();
    let output = TempDir::new().unwrap();
    std::fs::create_dir_all(input.path().join("x")).unwrap();
    std::fs::create_dir_all(input.path().join("y")).unwrap();
    write_wav(&input.path().join("x/a.wav"), 2, SAMPLE_RATE, 20000, song);
    write_wav(&input.path().join("y/a.wav"), 2, SAMPLE_RATE, 20100, song);

    let jobs = SeparationJob::for_inputs(discover_inputs(input.path()).unwrap(), output.path());
    assert_eq!(jobs[0].stem_dir, output.path().join("a"));
    assert_eq!(jobs[1].stem_dir, output.path().join("a (2)"));

    let (tx, _rx) = unbounded();
    let results = BatchProcessor::new(separator())
        .with_max_parallel(2)
        .process_all(&jobs, &tx, &AtomicBool::new(false));
    assert!(results.iter().all(|r| r.status == JobStatus::Completed));

    for (job, frames) in jobs.iter().zip([20000, 20100]) {
        for stem in StemType::ALL {
            let written = load_stereo(&job.stem_path(stem), SAMPLE_RATE).unwrap();
            assert_eq!(written.len(), frames, "{} in {}", stem.file_name(), job.name);
        }
    }
}
