//! ONNX inference engine abstraction
//!
//! Loads the separation model with tract (pure Rust). The input fact is
//! pinned to `[1, 2, frame_len]` so models exported with symbolic lengths
//! optimize to a fixed plan.

use std::path::Path;

use ndarray::{Array2, ArrayView2};
use serde::{Deserialize, Serialize};

use crate::error::{MlError, MlResult};
use crate::separation::{InferenceAdapter, SeparationConfig};

/// Execution provider for inference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionProvider {
    /// CPU execution using Tract (pure Rust)
    #[default]
    Cpu,
    /// NVIDIA CUDA
    Cuda,
}

impl ExecutionProvider {
    /// Every provider the engine knows about
    pub const ALL: [ExecutionProvider; 2] = [ExecutionProvider::Cuda, ExecutionProvider::Cpu];

    /// Check if this provider is available on current system
    pub fn is_available(&self) -> bool {
        match self {
            ExecutionProvider::Cpu => true,
            // tract has no GPU backend
            ExecutionProvider::Cuda => false,
        }
    }

    /// Get priority (higher = preferred)
    pub fn priority(&self) -> u32 {
        match self {
            ExecutionProvider::Cuda => 90,
            ExecutionProvider::Cpu => 10,
        }
    }

    /// Short name used on the command line
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionProvider::Cpu => "cpu",
            ExecutionProvider::Cuda => "cuda",
        }
    }

    /// Providers to try for a requested device, best first
    pub fn fallback_chain(self) -> Vec<ExecutionProvider> {
        match self {
            ExecutionProvider::Cuda => vec![ExecutionProvider::Cuda, ExecutionProvider::Cpu],
            ExecutionProvider::Cpu => vec![ExecutionProvider::Cpu],
        }
    }
}

impl std::fmt::Display for ExecutionProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ExecutionProvider {
    type Err = MlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cpu" => Ok(ExecutionProvider::Cpu),
            "cuda" | "gpu" => Ok(ExecutionProvider::Cuda),
            other => Err(MlError::InvalidConfiguration {
                reason: format!("unknown execution provider: {}", other),
            }),
        }
    }
}

/// Configuration for inference engine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InferenceConfig {
    /// Preferred execution providers (in order)
    pub providers: Vec<ExecutionProvider>,
    /// Frame length the model input is pinned to
    pub frame_len: usize,
    /// Enable graph optimization
    pub optimize_graph: bool,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            providers: vec![ExecutionProvider::Cpu],
            frame_len: crate::frame_sizes::MDX_DEFAULT,
            optimize_graph: true,
        }
    }
}

impl InferenceConfig {
    /// Engine settings matching a separation configuration
    pub fn for_separation(config: &SeparationConfig) -> Self {
        Self {
            providers: config.provider.fallback_chain(),
            frame_len: config.frame_len,
            ..Default::default()
        }
    }

    /// Best available provider among the requested ones
    pub fn resolve_provider(&self) -> ExecutionProvider {
        self.providers
            .iter()
            .filter(|p| p.is_available())
            .max_by_key(|p| p.priority())
            .copied()
            .unwrap_or(ExecutionProvider::Cpu)
    }
}

/// Optimized, runnable tract plan
type TractPlan = tract_onnx::prelude::SimplePlan<
    tract_onnx::prelude::TypedFact,
    Box<dyn tract_onnx::prelude::TypedOp>,
    tract_onnx::prelude::Graph<
        tract_onnx::prelude::TypedFact,
        Box<dyn tract_onnx::prelude::TypedOp>,
    >,
>;

/// ONNX model bound to an execution provider
pub struct InferenceEngine {
    /// Active execution provider
    provider: ExecutionProvider,
    /// Runnable plan
    plan: TractPlan,
    /// Model file stem, for logs
    model_name: String,
    /// Configuration
    config: InferenceConfig,
}

impl InferenceEngine {
    /// Create new inference engine with model
    pub fn new<P: AsRef<Path>>(model_path: P, config: InferenceConfig) -> MlResult<Self> {
        let path = model_path.as_ref();

        if !path.exists() {
            return Err(MlError::ModelNotFound {
                path: path.display().to_string(),
            });
        }
        if config.frame_len == 0 {
            return Err(MlError::InvalidConfiguration {
                reason: "frame length must be positive".into(),
            });
        }

        let requested = config.providers.first().copied().unwrap_or_default();
        let provider = config.resolve_provider();
        if provider != requested {
            log::warn!(
                "Execution provider {} unavailable, falling back to {}",
                requested,
                provider
            );
        }

        log::info!(
            "Using execution provider: {} for model {}",
            provider,
            path.display()
        );

        let plan = Self::load_plan(path, &config)?;

        let model_name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("model")
            .to_string();

        Ok(Self {
            provider,
            plan,
            model_name,
            config,
        })
    }

    /// Load and optimize the tract plan
    fn load_plan(path: &Path, config: &InferenceConfig) -> MlResult<TractPlan> {
        use tract_onnx::prelude::*;

        let load_failed = |e: TractError| MlError::ModelLoadFailed {
            reason: e.to_string(),
        };

        let model = tract_onnx::onnx()
            .model_for_path(path)
            .map_err(load_failed)?
            .with_input_fact(0, f32::fact([1, 2, config.frame_len]).into())
            .map_err(load_failed)?;

        let typed = if config.optimize_graph {
            model.into_optimized().map_err(load_failed)?
        } else {
            model.into_typed().map_err(load_failed)?
        };

        typed.into_runnable().map_err(load_failed)
    }

    /// Run inference on a `[2, L]` frame
    pub fn run_frame(&self, frame: ArrayView2<'_, f32>) -> MlResult<Array2<f32>> {
        use tract_onnx::prelude::*;

        let (channels, samples) = frame.dim();
        if samples != self.config.frame_len {
            return Err(MlError::InvalidInput {
                reason: format!(
                    "frame has {} samples, model is pinned to {}",
                    samples, self.config.frame_len
                ),
            });
        }

        let data: Vec<f32> = frame.iter().copied().collect();
        let input = Tensor::from_shape(&[1, channels, samples], &data)
            .map_err(|e| MlError::TractError(e.to_string()))?;

        let outputs = self
            .plan
            .run(tvec!(input.into()))
            .map_err(|e| MlError::TractError(e.to_string()))?;

        let output = outputs.first().ok_or_else(|| MlError::InvalidOutputShape {
            expected: "at least one output tensor".into(),
            got: "none".into(),
        })?;

        let shape = output.shape().to_vec();
        let (out_channels, out_samples) = match shape.as_slice() {
            [1, c, n] => (*c, *n),
            [c, n] => (*c, *n),
            _ => {
                return Err(MlError::InvalidOutputShape {
                    expected: "[1, 2, samples] or [2, samples]".into(),
                    got: format!("{:?}", shape),
                });
            }
        };

        let values = output
            .as_slice::<f32>()
            .map_err(|e| MlError::TractError(e.to_string()))?;

        Array2::from_shape_vec((out_channels, out_samples), values.to_vec()).map_err(|e| {
            MlError::InvalidOutputShape {
                expected: format!("{} x {}", out_channels, out_samples),
                got: e.to_string(),
            }
        })
    }

    /// Get current execution provider
    pub fn provider(&self) -> ExecutionProvider {
        self.provider
    }

    /// Model file stem
    pub fn model_name(&self) -> &str {
        &self.model_name
    }
}

impl InferenceAdapter for InferenceEngine {
    fn infer(&self, frame: ArrayView2<'_, f32>) -> MlResult<Array2<f32>> {
        self.run_frame(frame)
    }

    fn name(&self) -> &str {
        &self.model_name
    }
}

/// Auto-detect best execution provider
pub fn detect_best_provider() -> ExecutionProvider {
    ExecutionProvider::ALL
        .into_iter()
        .filter(|p| p.is_available())
        .max_by_key(|p| p.priority())
        .unwrap_or(ExecutionProvider::Cpu)
}

/// Get all available execution providers
pub fn available_providers() -> Vec<ExecutionProvider> {
    ExecutionProvider::ALL
        .into_iter()
        .filter(|p| p.is_available())
        .collect()
}
