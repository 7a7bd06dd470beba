//! Run loop over the pipeline bus
//!
//! The monitor is the only way the run loop ends: on end-of-stream or on
//! the first error posted by any stage.

use gstreamer as gst;
use gstreamer::prelude::*;
use tracing::{debug, error, info};

use super::FRAME_SKIPPED_MESSAGE;
use crate::error::{NpuviewError, NpuviewResult, StreamError};

/// The parts of a bus message the monitor cares about
#[derive(Debug, Clone, PartialEq)]
pub enum BusEvent {
    Error {
        source: String,
        message: String,
        debug: Option<String>,
    },
    EndOfStream,
    /// Posted by the annotation probe for an unannotated frame
    FrameSkipped { reason: String },
    /// State change of the pipeline itself
    StateChanged {
        old: gst::State,
        current: gst::State,
    },
    Other,
}

impl BusEvent {
    pub fn from_message(msg: &gst::Message, pipeline: &gst::Pipeline) -> Self {
        match msg.view() {
            gst::MessageView::Eos(..) => BusEvent::EndOfStream,
            gst::MessageView::Error(err) => BusEvent::Error {
                source: err
                    .src()
                    .map(|s| s.name().to_string())
                    .unwrap_or_else(|| "unknown".to_string()),
                message: err.error().to_string(),
                debug: err.debug().map(|d| d.to_string()),
            },
            gst::MessageView::Element(element) => match element.structure() {
                Some(s) if s.has_name(FRAME_SKIPPED_MESSAGE) => BusEvent::FrameSkipped {
                    reason: s
                        .get::<String>("reason")
                        .unwrap_or_else(|_| "unknown".to_string()),
                },
                _ => BusEvent::Other,
            },
            gst::MessageView::StateChanged(state_changed)
                if state_changed.src() == Some(pipeline.upcast_ref::<gst::Object>()) =>
            {
                BusEvent::StateChanged {
                    old: state_changed.old(),
                    current: state_changed.current(),
                }
            }
            _ => BusEvent::Other,
        }
    }
}

/// Why the run loop ended
#[derive(Debug, Clone, PartialEq)]
pub enum StopReason {
    EndOfStream,
    Error(StreamError),
}

#[derive(Debug, Clone, PartialEq)]
pub enum BusFlow {
    Continue,
    Stop(StopReason),
}

/// Consumes bus events until a terminal one arrives
#[derive(Debug, Default)]
pub struct BusMonitor {
    skipped_frames: usize,
}

impl BusMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Skip notifications seen so far
    pub fn skipped_frames(&self) -> usize {
        self.skipped_frames
    }

    pub fn handle(&mut self, event: &BusEvent) -> BusFlow {
        match event {
            BusEvent::Error {
                source,
                message,
                debug,
            } => {
                error!("Error received from element {}: {}", source, message);
                if let Some(detail) = debug {
                    error!("Debugging information: {}", detail);
                }
                BusFlow::Stop(StopReason::Error(StreamError {
                    stage: source.clone(),
                    message: message.clone(),
                    debug: debug.clone(),
                }))
            }
            BusEvent::EndOfStream => {
                info!("End-Of-Stream reached");
                BusFlow::Stop(StopReason::EndOfStream)
            }
            BusEvent::FrameSkipped { reason } => {
                self.skipped_frames += 1;
                debug!("Frame passed through unannotated: {}", reason);
                BusFlow::Continue
            }
            BusEvent::StateChanged { old, current } => {
                info!("Pipeline state changed from {:?} to {:?}", old, current);
                BusFlow::Continue
            }
            BusEvent::Other => BusFlow::Continue,
        }
    }

    /// Block on the bus of `pipeline` until a stop is signalled
    pub fn run(&mut self, pipeline: &gst::Pipeline) -> NpuviewResult<StopReason> {
        let bus = pipeline
            .bus()
            .ok_or_else(|| NpuviewError::Pipeline("pipeline has no bus".to_string()))?;

        for msg in bus.iter_timed(gst::ClockTime::NONE) {
            let event = BusEvent::from_message(&msg, pipeline);
            if let BusFlow::Stop(reason) = self.handle(&event) {
                return Ok(reason);
            }
        }

        Err(NpuviewError::Pipeline(
            "bus closed before end of stream".to_string(),
        ))
    }
}
