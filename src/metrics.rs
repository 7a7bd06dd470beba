//! Per-frame annotation counters
//!
//! Shared between the probe callback and the run loop, which logs a
//! summary at shutdown.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use crate::annotate::{FrameOutcome, SkipReason};

/// Counters updated once per frame
#[derive(Debug, Default)]
pub struct AnnotationMetrics {
    /// Frames seen by the annotator
    pub total_frames: AtomicUsize,
    /// Frames that went through inference
    pub annotated_frames: AtomicUsize,
    /// Frames passed through unannotated
    pub skipped_frames: AtomicUsize,
    /// Boxes drawn across all frames
    pub detections: AtomicUsize,
    skips_by_reason: Mutex<[usize; SkipReason::COUNT]>,
    /// Sum of per-frame processing time in milliseconds
    total_time_ms: Mutex<f64>,
    /// Most recent per-frame processing time in milliseconds
    last_time_ms: Mutex<f64>,
}

impl AnnotationMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Account for one frame
    pub fn record(&self, outcome: &FrameOutcome, elapsed: Duration) {
        self.total_frames.fetch_add(1, Ordering::Relaxed);
        match outcome {
            FrameOutcome::Annotated { detections } => {
                self.annotated_frames.fetch_add(1, Ordering::Relaxed);
                self.detections.fetch_add(*detections, Ordering::Relaxed);
            }
            FrameOutcome::Skipped(reason) => {
                self.skipped_frames.fetch_add(1, Ordering::Relaxed);
                if let Ok(mut skips) = self.skips_by_reason.lock() {
                    skips[reason.index()] += 1;
                }
            }
        }

        let ms = elapsed.as_secs_f64() * 1000.0;
        if let Ok(mut total) = self.total_time_ms.lock() {
            *total += ms;
        }
        if let Ok(mut last) = self.last_time_ms.lock() {
            *last = ms;
        }
    }

    pub fn get_total_frames(&self) -> usize {
        self.total_frames.load(Ordering::Relaxed)
    }

    pub fn get_annotated_frames(&self) -> usize {
        self.annotated_frames.load(Ordering::Relaxed)
    }

    pub fn get_skipped_frames(&self) -> usize {
        self.skipped_frames.load(Ordering::Relaxed)
    }

    pub fn get_detections(&self) -> usize {
        self.detections.load(Ordering::Relaxed)
    }

    /// Skips recorded for one reason
    pub fn get_skips(&self, reason: SkipReason) -> usize {
        self.skips_by_reason
            .lock()
            .map(|skips| skips[reason.index()])
            .unwrap_or(0)
    }

    pub fn get_last_frame_time_ms(&self) -> f64 {
        self.last_time_ms.lock().map(|guard| *guard).unwrap_or(0.0)
    }

    /// Mean processing time over every recorded frame
    pub fn get_avg_frame_time_ms(&self) -> f64 {
        let total = self.get_total_frames();
        if total == 0 {
            return 0.0;
        }
        self.total_time_ms.lock().map(|guard| *guard).unwrap_or(0.0) / total as f64
    }

    /// Skipped frames as a percentage of all frames
    pub fn get_skip_rate(&self) -> f64 {
        let total = self.get_total_frames();
        if total == 0 {
            0.0
        } else {
            (self.get_skipped_frames() as f64 / total as f64) * 100.0
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            total_frames: self.get_total_frames(),
            annotated_frames: self.get_annotated_frames(),
            skipped_frames: self.get_skipped_frames(),
            detections: self.get_detections(),
            avg_frame_time_ms: self.get_avg_frame_time_ms(),
            skip_rate: self.get_skip_rate(),
        }
    }
}

/// Point-in-time copy of the counters, for logging
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MetricsSnapshot {
    pub total_frames: usize,
    pub annotated_frames: usize,
    pub skipped_frames: usize,
    pub detections: usize,
    pub avg_frame_time_ms: f64,
    pub skip_rate: f64,
}

impl fmt::Display for MetricsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Frames: {} | Annotated: {} | Skipped: {} ({:.1}%) | Boxes: {} | Avg: {:.1}ms",
            self.total_frames,
            self.annotated_frames,
            self.skipped_frames,
            self.skip_rate,
            self.detections,
            self.avg_frame_time_ms
        )
    }
}
