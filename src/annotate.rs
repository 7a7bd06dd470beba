//! Per-frame inference and in-place annotation
//!
//! [`FrameAnnotator::annotate`] runs synchronously inside the buffer probe
//! of the format filter. No failure leaves this module: a frame that cannot
//! be processed is passed through unmodified and reported as
//! [`FrameOutcome::Skipped`].

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, warn};

use crate::config::OverlayConfig;
use crate::detection::{DecodeRequest, DetectionDecoder, FrameScale};
use crate::inference::{Accelerator, InferenceContext};
use crate::metrics::AnnotationMetrics;
use crate::overlay::{draw_rect, FrameView, GlyphOverlay};
use crate::scaler::{ImageDesc, ImageScaler, PixelFormat, TargetImage};

/// Why a frame went out without annotation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SkipReason {
    /// The scaler refused the source/destination pair
    ScalerCheck,
    /// The resize itself failed
    Resize,
    /// Input submission, run or output fetch failed
    Inference,
    /// The buffer could not be mapped or described
    Unmapped,
}

impl SkipReason {
    pub const COUNT: usize = 4;

    pub fn as_str(self) -> &'static str {
        match self {
            SkipReason::ScalerCheck => "scaler-check",
            SkipReason::Resize => "resize",
            SkipReason::Inference => "inference",
            SkipReason::Unmapped => "unmapped",
        }
    }

    pub(crate) fn index(self) -> usize {
        match self {
            SkipReason::ScalerCheck => 0,
            SkipReason::Resize => 1,
            SkipReason::Inference => 2,
            SkipReason::Unmapped => 3,
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SkipReason {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "scaler-check" => Ok(SkipReason::ScalerCheck),
            "resize" => Ok(SkipReason::Resize),
            "inference" => Ok(SkipReason::Inference),
            "unmapped" => Ok(SkipReason::Unmapped),
            other => Err(format!("unknown skip reason: {}", other)),
        }
    }
}

/// Result of one pass over a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    /// Inference ran; `detections` boxes were drawn
    Annotated { detections: usize },
    Skipped(SkipReason),
}

impl FrameOutcome {
    pub fn is_skipped(&self) -> bool {
        matches!(self, FrameOutcome::Skipped(_))
    }
}

/// Owns everything the hot path touches.
///
/// Shared with the streaming thread behind a `Mutex`; the inference
/// context inside is not reentrant.
pub struct FrameAnnotator<A: Accelerator, S: ImageScaler, D: DetectionDecoder> {
    context: InferenceContext<A>,
    scaler: S,
    decoder: D,
    glyphs: GlyphOverlay,
    font_path: PathBuf,
    box_color: [u8; 4],
    metrics: Arc<AnnotationMetrics>,
}

impl<A, S, D> FrameAnnotator<A, S, D>
where
    A: Accelerator,
    S: ImageScaler,
    D: DetectionDecoder,
{
    pub fn new(
        context: InferenceContext<A>,
        scaler: S,
        decoder: D,
        overlay: &OverlayConfig,
        metrics: Arc<AnnotationMetrics>,
    ) -> Self {
        Self {
            context,
            scaler,
            decoder,
            glyphs: GlyphOverlay::new(),
            font_path: overlay.font_path.clone(),
            box_color: overlay.box_color,
            metrics,
        }
    }

    pub fn context(&self) -> &InferenceContext<A> {
        &self.context
    }

    pub fn metrics(&self) -> Arc<AnnotationMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Detect objects in `frame` and draw them into it.
    pub fn annotate(&mut self, frame: &mut FrameView<'_>) -> FrameOutcome {
        let start = Instant::now();
        let outcome = self.process(frame);
        let elapsed = start.elapsed();

        debug!("Inference time: {} ms", elapsed.as_millis());
        self.metrics.record(&outcome, elapsed);
        outcome
    }

    fn process(&mut self, frame: &mut FrameView<'_>) -> FrameOutcome {
        let model = self.context.model();
        let (model_width, model_height) = (model.width, model.height);
        let (box_threshold, nms_threshold) = (model.box_threshold, model.nms_threshold);

        {
            let src = frame.as_source();
            let mut dst = TargetImage {
                data: self.context.scratch_mut(),
                desc: ImageDesc::packed(model_width, model_height, PixelFormat::Rgb888),
            };

            if let Err(e) = self.scaler.check(&src, &dst) {
                warn!("Scaler check failed: {}", e);
                return FrameOutcome::Skipped(SkipReason::ScalerCheck);
            }
            if let Err(e) = self.scaler.resize(&src, &mut dst) {
                warn!("Resize failed: {}", e);
                return FrameOutcome::Skipped(SkipReason::Resize);
            }
        }

        let scale = FrameScale::new(frame.width(), frame.height(), model_width, model_height);
        let decoder = &self.decoder;
        let inferred = self.context.infer(|outputs, quantization| {
            let request = DecodeRequest {
                model_height,
                model_width,
                box_threshold,
                nms_threshold,
                scale,
                zero_points: &quantization.zero_points,
                scales: &quantization.scales,
            };
            decoder.decode(outputs, &request)
        });
        let detections = match inferred {
            Ok(detections) => detections,
            Err(e) => {
                warn!("Inference failed: {}", e);
                return FrameOutcome::Skipped(SkipReason::Inference);
            }
        };

        let mut drawn = 0;
        for detection in &detections {
            debug!("{}", detection);
            let Some(rect) = detection.rect.clamp_to(frame.width(), frame.height()) else {
                continue;
            };
            draw_rect(frame, &rect, self.box_color);
            self.glyphs
                .draw(frame, &self.font_path, &detection.label, rect.left, rect.top);
            drawn += 1;
        }

        FrameOutcome::Annotated { detections: drawn }
    }
}
