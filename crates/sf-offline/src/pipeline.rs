//! Batch separation pipeline
//!
//! Per input file:
//! 1. Decode and fold to stereo at the model rate
//! 2. Separate vocals (chunked overlap-add)
//! 3. Derive accompaniment as mixture minus vocals
//! 4. Encode both stems to WAV under `<output>/<file stem>/`
//!
//! Progress goes out on a crossbeam channel. Sends never block and a
//! disconnected receiver is ignored.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use crossbeam_channel::Sender;
use parking_lot::RwLock;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use sf_ml::{Separator, StemPair};
use walkdir::WalkDir;

use crate::decoder::load_stereo;
use crate::encoder::{WavConfig, write_stereo};
use crate::error::{OfflineError, OfflineResult};
use crate::job::{JobId, JobResult, JobStatus, SeparationJob};

// ═══════════════════════════════════════════════════════════════════════════════
// INPUT DISCOVERY
// ═══════════════════════════════════════════════════════════════════════════════

/// Extensions accepted as batch input (lowercase)
pub const SUPPORTED_EXTENSIONS: [&str; 5] = ["wav", "mp3", "flac", "ogg", "m4a"];

/// Whether `path` has a supported audio extension
pub fn is_supported(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| {
            SUPPORTED_EXTENSIONS
                .iter()
                .any(|s| s.eq_ignore_ascii_case(ext))
        })
}

/// Collect supported audio files under `root`, recursively and sorted
///
/// A single supported file is accepted as its own batch.
pub fn discover_inputs(root: &Path) -> OfflineResult<Vec<PathBuf>> {
    if !root.exists() {
        return Err(OfflineError::InputNotFound(root.display().to_string()));
    }

    if root.is_file() {
        return if is_supported(root) {
            Ok(vec![root.to_path_buf()])
        } else {
            Err(OfflineError::UnsupportedFormat(root.display().to_string()))
        };
    }

    let mut inputs: Vec<PathBuf> = WalkDir::new(root)
        .follow_links(true)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file() && is_supported(e.path()))
        .map(|e| e.into_path())
        .collect();

    if inputs.is_empty() {
        return Err(OfflineError::NoInputFiles(root.display().to_string()));
    }

    inputs.sort();
    log::info!("Found {} audio file(s) in {}", inputs.len(), root.display());

    Ok(inputs)
}

// ═══════════════════════════════════════════════════════════════════════════════
// PROGRESS EVENTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Progress messages sent by the batch processor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum BatchEvent {
    /// Batch accepted
    Started { total_jobs: usize },
    /// A file began decoding
    JobStarted { job_id: JobId, name: String },
    /// One frame of a file went through the model
    FrameDone {
        job_id: JobId,
        index: usize,
        total: usize,
    },
    /// A file finished, failed or was skipped
    JobFinished(JobResult),
    /// Every job has a result
    Finished(BatchStats),
}

/// Running totals for one batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchStats {
    pub total: usize,
    pub completed: usize,
    pub failed: usize,
    pub cancelled: usize,
}

impl BatchStats {
    /// Jobs with a result so far
    pub fn done(&self) -> usize {
        self.completed + self.failed + self.cancelled
    }

    fn record(&mut self, status: JobStatus) {
        match status {
            JobStatus::Completed => self.completed += 1,
            JobStatus::Failed => self.failed += 1,
            JobStatus::Cancelled => self.cancelled += 1,
        }
    }
}

/// Progress is best-effort: a dropped receiver never stops the batch
fn notify(events: &Sender<BatchEvent>, event: BatchEvent) {
    if events.send(event).is_err() {
        log::trace!("Progress receiver gone, event dropped");
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// BATCH PROCESSOR
// ═══════════════════════════════════════════════════════════════════════════════

/// Runs separation jobs in parallel against one shared separator
pub struct BatchProcessor {
    separator: Arc<Separator>,
    wav: WavConfig,
    max_parallel: usize,
    stats: Arc<RwLock<BatchStats>>,
}

impl BatchProcessor {
    /// Create new batch processor
    pub fn new(separator: Arc<Separator>) -> Self {
        Self {
            separator,
            wav: WavConfig::default(),
            max_parallel: rayon::current_num_threads(),
            stats: Arc::new(RwLock::new(BatchStats::default())),
        }
    }

    /// Set stem encoding
    pub fn with_wav_config(mut self, wav: WavConfig) -> Self {
        self.wav = wav;
        self
    }

    /// Set max parallel jobs
    pub fn with_max_parallel(mut self, max: usize) -> Self {
        self.max_parallel = max.max(1);
        self
    }

    /// Totals of the current or last batch
    pub fn stats(&self) -> BatchStats {
        *self.stats.read()
    }

    /// Separate one file and write its stems
    ///
    /// Stops with [`OfflineError::Cancelled`] before writing if `cancel` is
    /// raised while the file is being separated.
    pub fn process_job(
        &self,
        job: &SeparationJob,
        events: &Sender<BatchEvent>,
        cancel: &AtomicBool,
    ) -> OfflineResult<JobResult> {
        let start = Instant::now();
        job.validate()?;

        let mixture = load_stereo(&job.input_path, self.separator.config().sample_rate)?;
        log::info!(
            "Separating {} ({:.1} s)",
            job.input_path.display(),
            mixture.duration_secs()
        );

        let mut frames = 0;
        let vocals = self.separator.separate_with_progress(&mixture, |progress| {
            frames = progress.total;
            notify(
                events,
                BatchEvent::FrameDone {
                    job_id: job.id,
                    index: progress.index,
                    total: progress.total,
                },
            );
        })?;

        if cancel.load(Ordering::Relaxed) {
            return Err(OfflineError::Cancelled);
        }

        let stems = StemPair::from_isolated(&mixture, vocals)?;

        let mut written = Vec::new();
        let mut output_size = 0;
        for (stem, waveform) in stems.iter() {
            let path = job.stem_path(stem);
            output_size += write_stereo(&path, waveform, &self.wav)?;
            log::debug!("Wrote {}", path.display());
            written.push(path);
        }

        Ok(JobResult::success(
            job,
            written,
            output_size,
            frames,
            mixture.duration_secs(),
            start.elapsed(),
        ))
    }

    /// Process all jobs in parallel
    ///
    /// Failures are reported per job and never stop the rest of the batch.
    /// Jobs not yet started when `cancel` is raised are marked cancelled.
    /// Results come back in job order.
    pub fn process_all(
        &self,
        jobs: &[SeparationJob],
        events: &Sender<BatchEvent>,
        cancel: &AtomicBool,
    ) -> Vec<JobResult> {
        *self.stats.write() = BatchStats {
            total: jobs.len(),
            ..Default::default()
        };
        notify(
            events,
            BatchEvent::Started {
                total_jobs: jobs.len(),
            },
        );

        log::info!(
            "Processing {} job(s), {} at a time, with {}",
            jobs.len(),
            self.max_parallel,
            self.separator.adapter_name()
        );

        let run = || -> Vec<JobResult> {
            jobs.par_iter()
                .map(|job| self.run_job(job, events, cancel))
                .collect()
        };

        let results = match rayon::ThreadPoolBuilder::new()
            .num_threads(self.max_parallel)
            .build()
        {
            Ok(pool) => pool.install(run),
            Err(e) => {
                log::warn!("Failed to build worker pool ({}), using global pool", e);
                run()
            }
        };

        let stats = self.stats();
        log::info!(
            "Batch finished: {} completed, {} failed, {} cancelled",
            stats.completed,
            stats.failed,
            stats.cancelled
        );
        notify(events, BatchEvent::Finished(stats));

        results
    }

    fn run_job(
        &self,
        job: &SeparationJob,
        events: &Sender<BatchEvent>,
        cancel: &AtomicBool,
    ) -> JobResult {
        let start = Instant::now();

        let result = if cancel.load(Ordering::Relaxed) {
            JobResult::cancelled(job, start.elapsed())
        } else {
            notify(
                events,
                BatchEvent::JobStarted {
                    job_id: job.id,
                    name: job.name.clone(),
                },
            );

            match self.process_job(job, events, cancel) {
                Ok(result) => result,
                Err(OfflineError::Cancelled) => JobResult::cancelled(job, start.elapsed()),
                Err(e) => {
                    log::error!("{}: {}", job.input_path.display(), e);
                    JobResult::failure(job, e.to_string(), start.elapsed())
                }
            }
        };

        self.stats.write().record(result.status);
        notify(events, BatchEvent::JobFinished(result.clone()));

        result
    }
}
