//! npuview
//!
//! Real-time object detection overlay for H.264 video. Frames decoded by
//! GStreamer are scaled into a fixed-shape NPU model, the detections are
//! drawn back into the frame and the result is displayed.

pub mod annotate;
pub mod app;
pub mod config;
pub mod detection;
pub mod error;
pub mod inference;
pub mod metrics;
pub mod overlay;
pub mod pipeline;
pub mod scaler;

// Re-export commonly used types
pub use annotate::{FrameAnnotator, FrameOutcome, SkipReason};
pub use config::{AppConfig, DisplayConfig, InputConfig, ModelConfig, OverlayConfig};
pub use detection::{BoxRect, DetectionBox, FrameScale};
pub use error::{NpuviewError, NpuviewResult};
pub use inference::{Accelerator, InferenceContext};
pub use metrics::{AnnotationMetrics, MetricsSnapshot};
pub use pipeline::{InputLocator, Topology};

/// Main application entry point
pub use app::{run, run_with};

/// Current version of the library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
