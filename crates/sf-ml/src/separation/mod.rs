//! Vocal separation by chunked, windowed inference
//!
//! A mixture is cut into overlapping fixed-length frames, each frame goes
//! through an opaque model, and the outputs are stitched back together with
//! weighted overlap-add.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use sf_ml::separation::{SeparationConfig, Separator, StemPair};
//!
//! let separator = Separator::from_model("models/models.onnx", SeparationConfig::default())?;
//! let vocals = separator.separate(&mixture)?;
//! let stems = StemPair::from_isolated(&mixture, vocals)?;
//! ```

mod config;
mod overlap_add;
mod schedule;
mod separator;
mod stems;
mod window;

pub use config::SeparationConfig;
pub use overlap_add::OverlapAdd;
pub use schedule::{FrameDescriptor, FrameSchedule};
pub use separator::{FrameProgress, Separator};
pub use stems::{StemPair, StemType};
pub use window::{WINDOW_FLOOR, create_hann_window};

use ndarray::{Array2, ArrayView2};

use crate::error::MlResult;

/// Model call contract used by the separator
///
/// Receives one `[2, L]` frame and returns a `[2, L']` frame with
/// `L' <= L`. Implementations must be shareable across threads; the
/// separator may call `infer` for several frames concurrently.
pub trait InferenceAdapter: Send + Sync {
    /// Run the model on one stereo frame
    fn infer(&self, frame: ArrayView2<'_, f32>) -> MlResult<Array2<f32>>;

    /// Human-readable name for logs
    fn name(&self) -> &str {
        "adapter"
    }
}
