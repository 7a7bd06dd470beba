//! Error handling for the npuview overlay
//!
//! One error type per failure domain. Only the startup-phase errors
//! ([`InitError`], [`GraphBuildError`], [`ConfigError`]) are fatal; link,
//! accelerator and per-frame failures are absorbed where they happen.

use std::path::PathBuf;
use thiserror::Error;

pub use crate::config::ConfigError;

/// Inference context startup failures. Any of these aborts before playback.
#[derive(Error, Debug)]
pub enum InitError {
    #[error("Scratch buffer allocation failed: {bytes} bytes")]
    Allocation { bytes: usize },

    #[error("Model loading failed for {}: {source}", path.display())]
    ModelLoad {
        path: PathBuf,
        #[source]
        source: AcceleratorError,
    },

    #[error("Accelerator query failed ({what}): {source}")]
    Query {
        what: &'static str,
        #[source]
        source: AcceleratorError,
    },

    #[error("Unsupported input tensor layout: {0}")]
    Layout(String),

    #[error("Input tensor size mismatch: model expects {expected} elements, scratch buffer holds {actual}")]
    InputShape { expected: usize, actual: usize },
}

/// Failures of the vendor inference SDK or the image scaler.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AcceleratorError {
    #[error("{call} failed with status {status}")]
    Sdk { call: &'static str, status: i32 },

    #[error("{call} failed with status {status}")]
    Scaler { call: &'static str, status: i32 },

    #[error("Unsupported conversion: {0}")]
    UnsupportedConversion(String),

    #[error("Accelerator unavailable: {0}")]
    Unavailable(String),
}

/// Processing graph construction failures.
#[derive(Error, Debug)]
pub enum GraphBuildError {
    #[error("GStreamer element creation failed: {factory} ({name})")]
    ElementCreation { factory: String, name: String },

    #[error("Failed to add stages to the pipeline: {0}")]
    AddToPipeline(String),

    #[error("Static link failed: {from} -> {to}")]
    StaticLink { from: String, to: String },

    #[error("Stage {stage} has no {pad} pad")]
    MissingPad { stage: String, pad: String },

    #[error("GStreamer initialisation failed: {0}")]
    Init(String),
}

/// A dynamic pad could not be linked. Degrades that stream only.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("Pad link {pad} -> {target} failed: {reason}")]
pub struct LinkError {
    pub pad: String,
    pub target: String,
    pub reason: String,
}

/// A framework-level error posted on the pipeline bus.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("Stream error from {stage}: {message}")]
pub struct StreamError {
    pub stage: String,
    pub message: String,
    pub debug: Option<String>,
}

/// Top-level error for the npuview library
#[derive(Error, Debug)]
pub enum NpuviewError {
    #[error(transparent)]
    Init(#[from] InitError),

    #[error(transparent)]
    GraphBuild(#[from] GraphBuildError),

    #[error(transparent)]
    Stream(#[from] StreamError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("GStreamer pipeline error: {0}")]
    Pipeline(String),
}

/// Result type alias for convenience
pub type NpuviewResult<T> = std::result::Result<T, NpuviewError>;

impl From<gstreamer::StateChangeError> for NpuviewError {
    fn from(err: gstreamer::StateChangeError) -> Self {
        NpuviewError::Pipeline(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = InitError::Allocation { bytes: 1_228_800 };
        assert_eq!(
            error.to_string(),
            "Scratch buffer allocation failed: 1228800 bytes"
        );

        let error = AcceleratorError::Sdk {
            call: "rknn_init",
            status: -6,
        };
        assert_eq!(error.to_string(), "rknn_init failed with status -6");
    }

    #[test]
    fn test_model_load_error_carries_status() {
        let error = InitError::ModelLoad {
            path: PathBuf::from("./yolov5s-640-640.rknn"),
            source: AcceleratorError::Sdk {
                call: "rknn_init",
                status: -1,
            },
        };
        let message = error.to_string();
        assert!(message.contains("yolov5s-640-640.rknn"));
        assert!(message.contains("status -1"));
    }

    #[test]
    fn test_error_conversion() {
        let stream_error = StreamError {
            stage: "decoder".to_string(),
            message: "not negotiated".to_string(),
            debug: None,
        };
        let error: NpuviewError = stream_error.into();

        match error {
            NpuviewError::Stream(inner) => assert_eq!(inner.stage, "decoder"),
            _ => panic!("Expected Stream error variant"),
        }
    }

    #[test]
    fn test_structured_errors() {
        let error = GraphBuildError::StaticLink {
            from: "parse".to_string(),
            to: "decoder".to_string(),
        };
        assert!(error.to_string().contains("parse -> decoder"));

        let error = LinkError {
            pad: "recv_rtp_src_0".to_string(),
            target: "depay:sink".to_string(),
            reason: "WrongFormat".to_string(),
        };
        assert!(error.to_string().contains("depay:sink"));
        assert!(error.to_string().contains("WrongFormat"));
    }
}
