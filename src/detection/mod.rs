//! Detection data structures and the decoder contract

use std::fmt;

use crate::inference::OutputTensor;

pub mod yolov5;

pub use yolov5::Yolov5Decoder;

/// Axis-aligned box in pixel coordinates; `right`/`bottom` are exclusive.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BoxRect {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl BoxRect {
    pub fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    /// Box from origin and size
    pub fn from_xywh(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self::new(x, y, x + width, y + height)
    }

    pub fn width(&self) -> i32 {
        self.right - self.left
    }

    pub fn height(&self) -> i32 {
        self.bottom - self.top
    }

    /// Intersect with `[0, width) × [0, height)`; `None` when nothing is left.
    pub fn clamp_to(&self, width: u32, height: u32) -> Option<BoxRect> {
        let clamped = BoxRect {
            left: self.left.clamp(0, width as i32),
            top: self.top.clamp(0, height as i32),
            right: self.right.clamp(0, width as i32),
            bottom: self.bottom.clamp(0, height as i32),
        };
        (clamped.width() > 0 && clamped.height() > 0).then_some(clamped)
    }
}

/// A detected object, already in source-resolution coordinates
#[derive(Clone, Debug, PartialEq)]
pub struct DetectionBox {
    /// Class label
    pub label: String,
    pub rect: BoxRect,
    /// Confidence score (0.0 to 1.0)
    pub confidence: f32,
}

impl DetectionBox {
    pub fn new(label: impl Into<String>, rect: BoxRect, confidence: f32) -> Self {
        Self {
            label: label.into(),
            rect,
            confidence,
        }
    }
}

impl fmt::Display for DetectionBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} @ ({} {} {} {}) {:.3}",
            self.label,
            self.rect.left,
            self.rect.top,
            self.rect.right,
            self.rect.bottom,
            self.confidence
        )
    }
}

/// Ratio between the model input and the source frame
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FrameScale {
    pub scale_w: f32,
    pub scale_h: f32,
}

impl FrameScale {
    /// `target / source` per axis
    pub fn new(source_width: u32, source_height: u32, target_width: u32, target_height: u32) -> Self {
        Self {
            scale_w: target_width as f32 / source_width as f32,
            scale_h: target_height as f32 / source_height as f32,
        }
    }

    /// Map a point from model-input space back to source space
    pub fn to_source(&self, x: f32, y: f32) -> (f32, f32) {
        (x / self.scale_w, y / self.scale_h)
    }

    /// Map a model-input box back to source space
    pub fn rect_to_source(&self, rect: &BoxRect) -> BoxRect {
        let (left, top) = self.to_source(rect.left as f32, rect.top as f32);
        let (right, bottom) = self.to_source(rect.right as f32, rect.bottom as f32);
        BoxRect::new(
            left.floor() as i32,
            top.floor() as i32,
            right.floor() as i32,
            bottom.floor() as i32,
        )
    }
}

/// Everything the decoder needs besides the raw tensors
#[derive(Clone, Copy, Debug)]
pub struct DecodeRequest<'a> {
    pub model_height: u32,
    pub model_width: u32,
    pub box_threshold: f32,
    pub nms_threshold: f32,
    pub scale: FrameScale,
    pub zero_points: &'a [i32],
    pub scales: &'a [f32],
}

/// Threshold + NMS decoding of raw quantised outputs.
///
/// Returned boxes are already rescaled into source coordinates.
pub trait DetectionDecoder: Send {
    fn decode(&self, outputs: &[OutputTensor<'_>], request: &DecodeRequest<'_>) -> Vec<DetectionBox>;
}
