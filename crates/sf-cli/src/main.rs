//! StemForge - vocal / accompaniment separation
//!
//! Usage:
//!   stemforge batch -i songs/ -o stems/     - Separate every file in a folder
//!   stemforge separate -i song.mp3 -o out/  - Separate one file
//!   stemforge providers                     - List execution providers

use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use anyhow::{Context, Result, anyhow, bail};
use clap::{Args, Parser, Subcommand};
use crossbeam_channel::unbounded;

use sf_ml::inference::{available_providers, detect_best_provider};
use sf_ml::{ExecutionProvider, Separator};
use sf_offline::{
    AudioDecoder, BatchConfig, BatchEvent, BatchProcessor, JobResult, JobStatus, SeparationJob,
    discover_inputs,
};

#[derive(Parser)]
#[command(name = "stemforge", version, about = "Split songs into vocals and accompaniment")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Separate every supported file under a folder
    Batch {
        /// Input folder (searched recursively)
        #[arg(short, long)]
        input: PathBuf,
        /// Output folder; one sub-folder per song
        #[arg(short, long)]
        output: PathBuf,
        /// Skip the remaining files after the first failure
        #[arg(long)]
        fail_fast: bool,
        #[command(flatten)]
        options: SeparationArgs,
    },
    /// Separate a single file
    Separate {
        /// Input audio file
        #[arg(short, long)]
        input: PathBuf,
        /// Output folder
        #[arg(short, long)]
        output: PathBuf,
        #[command(flatten)]
        options: SeparationArgs,
    },
    /// List execution providers and their availability
    Providers,
}

/// Overrides on top of the JSON config (or the defaults)
#[derive(Args, Debug, Default)]
struct SeparationArgs {
    /// JSON batch config supplying defaults
    #[arg(long)]
    config: Option<PathBuf>,
    /// ONNX model file
    #[arg(long)]
    model: Option<PathBuf>,
    /// Compute device (cpu, cuda)
    #[arg(long)]
    device: Option<ExecutionProvider>,
    /// Overlap between frames (0 - 0.9)
    #[arg(long)]
    overlap: Option<f32>,
    /// Frame length in seconds (1 - 15)
    #[arg(long)]
    frame_secs: Option<f32>,
    /// Files processed in parallel (0 = one per CPU)
    #[arg(short, long)]
    jobs: Option<usize>,
    /// Frames inferred concurrently within one file
    #[arg(long)]
    frame_batch: Option<usize>,
    /// Output bit depth (16, 24, 32 = float)
    #[arg(long)]
    bit_depth: Option<u8>,
}

impl SeparationArgs {
    fn resolve(&self) -> Result<BatchConfig> {
        let mut config = match &self.config {
            Some(path) => BatchConfig::load(path)
                .with_context(|| format!("Failed to load config {}", path.display()))?,
            None => BatchConfig::default(),
        };

        if let Some(model) = &self.model {
            config.model_path = model.clone();
        }
        if let Some(device) = self.device {
            config.device = device;
        }
        if let Some(overlap) = self.overlap {
            config.overlap = overlap;
        }
        if let Some(secs) = self.frame_secs {
            config.frame_secs = secs;
        }
        if let Some(jobs) = self.jobs {
            config.max_parallel = jobs;
        }
        if let Some(batch) = self.frame_batch {
            config.frame_batch = batch;
        }
        if let Some(depth) = self.bit_depth {
            config.bit_depth = depth;
        }

        config.validate().context("Invalid separation settings")?;
        Ok(config)
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Batch {
            input,
            output,
            fail_fast,
            options,
        } => {
            let inputs = discover_inputs(&input)
                .with_context(|| format!("Cannot read inputs from {}", input.display()))?;
            run_batch(inputs, &output, &options.resolve()?, fail_fast)
        }
        Commands::Separate {
            input,
            output,
            options,
        } => {
            if !input.is_file() {
                bail!("Input is not a file: {}", input.display());
            }
            let inputs = discover_inputs(&input)
                .with_context(|| format!("Cannot separate {}", input.display()))?;

            let info = AudioDecoder::probe(&input)
                .with_context(|| format!("Cannot read {}", input.display()))?;
            println!(
                "{}: {}, {} Hz, {} ch, {}",
                input.display(),
                info.format,
                info.sample_rate,
                info.channels,
                info.duration_str()
            );

            run_batch(inputs, &output, &options.resolve()?, false)
        }
        Commands::Providers => {
            list_providers();
            Ok(())
        }
    }
}

fn list_providers() {
    let available = available_providers();
    for provider in ExecutionProvider::ALL {
        let state = if available.contains(&provider) {
            "available"
        } else {
            "unavailable"
        };
        println!("{:<6} {}", provider, state);
    }
    println!("\nBest provider: {}", detect_best_provider());
}

fn run_batch(inputs: Vec<PathBuf>, output: &Path, config: &BatchConfig, fail_fast: bool) -> Result<()> {
    let separator = Separator::from_model(&config.model_path, config.separation_config())
        .with_context(|| format!("Failed to load model {}", config.model_path.display()))?;

    let processor = BatchProcessor::new(Arc::new(separator))
        .with_wav_config(config.wav_config()?)
        .with_max_parallel(config.parallelism());

    let jobs = SeparationJob::for_inputs(inputs, output);
    let names: HashMap<_, _> = jobs.iter().map(|j| (j.id, j.name.clone())).collect();

    let (tx, rx) = unbounded();
    let cancel = Arc::new(AtomicBool::new(false));

    let worker = {
        let cancel = Arc::clone(&cancel);
        thread::Builder::new()
            .name("stemforge-batch".into())
            .spawn(move || processor.process_all(&jobs, &tx, &cancel))
            .context("Failed to start batch worker")?
    };

    // Sender lives in the worker, so this loop ends with the batch
    for event in rx {
        render_event(&event, &names);
        if fail_fast {
            cancel_on_failure(&event, &cancel);
        }
    }

    let results = worker
        .join()
        .map_err(|_| anyhow!("Batch worker panicked"))?;

    summarize(&results)
}

/// Raise `cancel` once any job reports a failure
fn cancel_on_failure(event: &BatchEvent, cancel: &AtomicBool) {
    if let BatchEvent::JobFinished(result) = event {
        if result.status == JobStatus::Failed {
            cancel.store(true, Ordering::Relaxed);
        }
    }
}

fn job_name(names: &HashMap<u64, String>, id: u64) -> &str {
    names.get(&id).map(String::as_str).unwrap_or("?")
}

fn render_event(event: &BatchEvent, names: &HashMap<u64, String>) {
    match event {
        BatchEvent::Started { total_jobs } => {
            println!("Separating {} file(s)...\n", total_jobs);
        }
        BatchEvent::JobStarted { job_id, .. } => {
            log::debug!("started {}", job_name(names, *job_id));
        }
        BatchEvent::FrameDone {
            job_id,
            index,
            total,
        } => {
            eprint!("\r  {}: frame {}/{}   ", job_name(names, *job_id), index + 1, total);
            let _ = std::io::stderr().flush();
        }
        BatchEvent::JobFinished(result) => {
            eprint!("\r");
            print_result(result, job_name(names, result.job_id));
        }
        BatchEvent::Finished(stats) => {
            println!(
                "\nDone: {} completed, {} failed, {} skipped",
                stats.completed, stats.failed, stats.cancelled
            );
        }
    }
}

fn print_result(result: &JobResult, name: &str) {
    match result.status {
        JobStatus::Completed => println!(
            "  ✓ {} ({:.1} s audio, {:.1}x realtime) → {}",
            name,
            result.audio_secs,
            result.realtime_factor(),
            result
                .stems
                .first()
                .and_then(|p| p.parent())
                .map(|p| p.display().to_string())
                .unwrap_or_default()
        ),
        JobStatus::Failed => println!(
            "  ✗ {}: {}",
            name,
            result.error.as_deref().unwrap_or("unknown error")
        ),
        JobStatus::Cancelled => println!("  - {} skipped", name),
    }
}

fn summarize(results: &[JobResult]) -> Result<()> {
    let failed = results
        .iter()
        .filter(|r| r.status == JobStatus::Failed)
        .count();

    if failed > 0 {
        bail!("{} of {} file(s) failed", failed, results.len());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_batch() {
        let cli = Cli::try_parse_from([
            "stemforge",
            "batch",
            "-i",
            "songs",
            "-o",
            "stems",
            "--device",
            "cuda",
            "--overlap",
            "0.5",
            "--jobs",
            "2",
        ])
        .unwrap();

        let Commands::Batch {
            input,
            output,
            fail_fast,
            options,
        } = cli.command
        else {
            panic!("expected batch command");
        };

        assert_eq!(input, PathBuf::from("songs"));
        assert_eq!(output, PathBuf::from("stems"));
        assert!(!fail_fast);

        let config = options.resolve().unwrap();
        assert_eq!(config.device, ExecutionProvider::Cuda);
        assert_eq!(config.overlap, 0.5);
        assert_eq!(config.max_parallel, 2);
        assert_eq!(config.frame_secs, 5.0);
    }

    #[test]
    fn test_rejects_unknown_device() {
        assert!(
            Cli::try_parse_from(["stemforge", "separate", "-i", "a.wav", "-o", "out", "--device", "tpu"])
                .is_err()
        );
    }

    #[test]
    fn test_flags_override_config_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("batch.json");
        BatchConfig {
            overlap: 0.1,
            bit_depth: 24,
            ..Default::default()
        }
        .save(&path)
        .unwrap();

        let args = SeparationArgs {
            config: Some(path),
            overlap: Some(0.3),
            ..Default::default()
        };
        let config = args.resolve().unwrap();

        assert_eq!(config.overlap, 0.3);
        assert_eq!(config.bit_depth, 24);
    }

    #[test]
    fn test_invalid_overrides() {
        let args = SeparationArgs {
            overlap: Some(1.0),
            ..Default::default()
        };
        assert!(args.resolve().is_err());
    }

    #[test]
    fn test_failure_raises_cancel() {
        let job = SeparationJob::new("a.wav", Path::new("out"));
        let cancel = AtomicBool::new(false);

        cancel_on_failure(&BatchEvent::Started { total_jobs: 2 }, &cancel);
        cancel_on_failure(
            &BatchEvent::JobFinished(JobResult::cancelled(&job, Default::default())),
            &cancel,
        );
        cancel_on_failure(
            &BatchEvent::JobFinished(JobResult::success(&job, vec![], 0, 1, 1.0, Default::default())),
            &cancel,
        );
        assert!(!cancel.load(Ordering::Relaxed));

        cancel_on_failure(
            &BatchEvent::JobFinished(JobResult::failure(&job, "boom".into(), Default::default())),
            &cancel,
        );
        assert!(cancel.load(Ordering::Relaxed));
    }

    #[test]
    fn test_summary_fails_on_any_failure() {
        let job = SeparationJob::new("a.wav", Path::new("out"));
        let ok = JobResult::success(&job, vec![], 0, 1, 1.0, Default::default());
        let bad = JobResult::failure(&job, "boom".into(), Default::default());

        assert!(summarize(std::slice::from_ref(&ok)).is_ok());
        assert!(summarize(&[ok, bad]).is_err());
    }
}
