//! Startup, run loop and shutdown

use std::path::Path;
use std::sync::{Arc, Mutex};

use tracing::info;

use crate::annotate::FrameAnnotator;
use crate::config::AppConfig;
use crate::detection::{DetectionDecoder, Yolov5Decoder};
use crate::error::{AcceleratorError, NpuviewResult};
use crate::inference::{Accelerator, InferenceContext, RknnAccelerator};
use crate::metrics::{AnnotationMetrics, MetricsSnapshot};
use crate::pipeline::{self, BusMonitor, InputLocator, PipelineSettings, StopReason, Topology};
use crate::scaler::ImageScaler;

#[cfg(feature = "rockchip")]
fn default_scaler() -> crate::scaler::RgaScaler {
    crate::scaler::RgaScaler::new()
}

#[cfg(not(feature = "rockchip"))]
fn default_scaler() -> crate::scaler::SoftwareScaler {
    crate::scaler::SoftwareScaler::default()
}

/// Run the overlay on the RKNN accelerator until end-of-stream
pub fn run(config: AppConfig) -> NpuviewResult<MetricsSnapshot> {
    run_with(config, RknnAccelerator::open, default_scaler(), Yolov5Decoder::new())
}

/// Run with explicit collaborators.
///
/// The inference context is initialised before GStreamer is touched, so a
/// model that fails to load stops the process with no graph built.
pub fn run_with<A, S, D, F>(
    config: AppConfig,
    open: F,
    scaler: S,
    decoder: D,
) -> NpuviewResult<MetricsSnapshot>
where
    A: Accelerator + 'static,
    S: ImageScaler + 'static,
    D: DetectionDecoder + 'static,
    F: FnOnce(&Path) -> Result<A, AcceleratorError>,
{
    config.validate()?;

    info!("Loading model {}", config.model.path.display());
    let context = InferenceContext::initialize(&config.model, open)?;

    pipeline::init()?;
    let locator = InputLocator::classify(&config.input.locator);
    info!("Input {:?}", locator);
    let mut topology = Topology::build(&locator, &PipelineSettings::from(&config.display))?;

    let metrics = Arc::new(AnnotationMetrics::new());
    let annotator = FrameAnnotator::new(
        context,
        scaler,
        decoder,
        &config.overlay,
        Arc::clone(&metrics),
    );
    topology.attach_annotator(Arc::new(Mutex::new(annotator)))?;

    topology.start()?;
    let mut monitor = BusMonitor::new();
    let stopped = monitor.run(topology.pipeline());
    topology.stop()?;

    let summary = metrics.snapshot();
    info!("{}", summary);

    match stopped? {
        StopReason::EndOfStream => Ok(summary),
        StopReason::Error(err) => Err(err.into()),
    }
}
