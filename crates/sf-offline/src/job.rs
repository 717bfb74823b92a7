//! Separation job definitions

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use sf_ml::StemType;

use crate::error::{OfflineError, OfflineResult};

/// Unique job identifier
pub type JobId = u64;

static JOB_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// One input file to split into stems
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeparationJob {
    /// Unique job ID
    pub id: JobId,

    /// Input audio file
    pub input_path: PathBuf,

    /// Directory receiving the stem files (`<output>/<file stem>`)
    pub stem_dir: PathBuf,

    /// Display name (file stem)
    pub name: String,
}

impl SeparationJob {
    /// Job writing into `<output_root>/<input file stem>/`
    pub fn new<P: Into<PathBuf>>(input: P, output_root: &Path) -> Self {
        let input_path = input.into();
        let id = JOB_ID_COUNTER.fetch_add(1, Ordering::Relaxed);

        let name = input_path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| format!("job-{}", id));

        Self {
            id,
            stem_dir: output_root.join(&name),
            input_path,
            name,
        }
    }

    /// One job per input, all under the same output root
    ///
    /// Inputs sharing a file stem (`x/a.wav`, `y/a.wav`, `a.mp3`) get
    /// numbered directories in input order: `a`, `a (2)`, `a (3)`. Every job
    /// in the batch owns its stem directory, so parallel jobs never write
    /// into the same folder.
    pub fn for_inputs<I, P>(inputs: I, output_root: &Path) -> Vec<Self>
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        let mut taken = HashSet::new();

        inputs
            .into_iter()
            .map(|input| {
                let mut job = Self::new(input, output_root);
                let name = unique_name(&job.name, &mut taken);
                if name != job.name {
                    log::warn!(
                        "{}: output name '{}' already used, writing to '{}'",
                        job.input_path.display(),
                        job.name,
                        name
                    );
                    job.stem_dir = output_root.join(&name);
                    job.name = name;
                }
                job
            })
            .collect()
    }

    /// Output file for one stem
    pub fn stem_path(&self, stem: StemType) -> PathBuf {
        self.stem_dir.join(stem.file_name())
    }

    /// Validate job configuration
    pub fn validate(&self) -> OfflineResult<()> {
        if !self.input_path.is_file() {
            return Err(OfflineError::InputNotFound(
                self.input_path.display().to_string(),
            ));
        }

        if self.stem_dir.is_file() {
            return Err(OfflineError::WriteError(format!(
                "Output path is a file: {}",
                self.stem_dir.display()
            )));
        }

        Ok(())
    }
}

/// First of `base`, `base (2)`, `base (3)`, ... not yet in `taken`
///
/// Names compare case-insensitively so `Song` and `song` stay apart on
/// case-insensitive file systems.
fn unique_name(base: &str, taken: &mut HashSet<String>) -> String {
    let mut name = base.to_string();
    let mut n = 2;
    while !taken.insert(name.to_lowercase()) {
        name = format!("{} ({})", base, n);
        n += 1;
    }
    name
}

/// Job execution status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobStatus {
    /// Completed successfully
    Completed,
    /// Failed with error
    Failed,
    /// Cancelled by user
    Cancelled,
}

/// Job completion result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobResult {
    /// Job ID
    pub job_id: JobId,
    /// Input file
    pub input_path: PathBuf,
    /// Final status
    pub status: JobStatus,
    /// Written stem files (vocals first)
    pub stems: Vec<PathBuf>,
    /// Total bytes written
    pub output_size: u64,
    /// Frames sent through the model
    pub frames: usize,
    /// Length of the separated audio in seconds
    pub audio_secs: f64,
    /// Processing duration
    pub duration: Duration,
    /// Error message (if failed)
    pub error: Option<String>,
}

impl JobResult {
    /// Create successful result
    pub fn success(
        job: &SeparationJob,
        stems: Vec<PathBuf>,
        output_size: u64,
        frames: usize,
        audio_secs: f64,
        duration: Duration,
    ) -> Self {
        Self {
            stems,
            output_size,
            frames,
            audio_secs,
            duration,
            ..Self::empty(job, JobStatus::Completed)
        }
    }

    /// Create failed result
    pub fn failure(job: &SeparationJob, error: String, duration: Duration) -> Self {
        Self {
            duration,
            error: Some(error),
            ..Self::empty(job, JobStatus::Failed)
        }
    }

    /// Create cancelled result
    pub fn cancelled(job: &SeparationJob, duration: Duration) -> Self {
        Self {
            duration,
            ..Self::empty(job, JobStatus::Cancelled)
        }
    }

    fn empty(job: &SeparationJob, status: JobStatus) -> Self {
        Self {
            job_id: job.id,
            input_path: job.input_path.clone(),
            status,
            stems: Vec::new(),
            output_size: 0,
            frames: 0,
            audio_secs: 0.0,
            duration: Duration::ZERO,
            error: None,
        }
    }

    /// Whether the stems were written
    pub fn is_success(&self) -> bool {
        self.status == JobStatus::Completed
    }

    /// Audio seconds processed per wall-clock second
    pub fn realtime_factor(&self) -> f64 {
        let secs = self.duration.as_secs_f64();
        if secs > 0.0 { self.audio_secs / secs } else { 0.0 }
    }
}
