//! SF-Offline: Batch Stem Separation Pipeline
//!
//! Turns a folder of songs into vocal and accompaniment stems:
//! - Decode any supported container to stereo at the model rate
//! - Separate vocals with a shared [`sf_ml::Separator`]
//! - Write `vocals.wav` and `accompaniment.wav` per input
//! - Report progress over a channel, one event per frame and per file
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                        BatchProcessor                            │
//! │                                                                  │
//! │  ┌─────────┐   ┌───────────┐   ┌───────────┐   ┌─────────────┐  │
//! │  │ Decoder │ → │ Resampler │ → │ Separator │ → │ WAV Encoder │  │
//! │  │(symph.) │   │ (rubato)  │   │  (sf-ml)  │   │  (hound)    │  │
//! │  └─────────┘   └───────────┘   └───────────┘   └─────────────┘  │
//! │                                                                  │
//! │  ┌────────────────────────────────────────────────────────────┐ │
//! │  │                   Job Queue (rayon)                        │ │
//! │  │  [Job1] [Job2] [Job3] ... [JobN] → ThreadPool              │ │
//! │  └────────────────────────────────────────────────────────────┘ │
//! │                 BatchEvent ──▶ crossbeam channel                 │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::{Arc, atomic::AtomicBool};
//! use sf_offline::{BatchConfig, BatchProcessor, SeparationJob, discover_inputs};
//!
//! let config = BatchConfig::default();
//! let separator = sf_ml::Separator::from_model(&config.model_path, config.separation_config())?;
//!
//! let inputs = discover_inputs("songs".as_ref())?;
//! let jobs = SeparationJob::for_inputs(inputs, "stems".as_ref());
//!
//! let (tx, rx) = crossbeam_channel::unbounded();
//! let results = BatchProcessor::new(Arc::new(separator))
//!     .process_all(&jobs, &tx, &AtomicBool::new(false));
//! ```

mod buffer;
mod config;
mod decoder;
mod encoder;
mod error;
mod job;
mod pipeline;
mod resample;

pub use buffer::*;
pub use config::*;
pub use decoder::*;
pub use encoder::*;
pub use error::*;
pub use job::*;
pub use pipeline::*;
pub use resample::resample;
