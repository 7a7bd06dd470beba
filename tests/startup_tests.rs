//! Startup must fail closed: no graph and no frames when the model is unusable

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use npuview::config::AppConfig;
use npuview::detection::{DecodeRequest, DetectionBox, DetectionDecoder};
use npuview::error::{AcceleratorError, ConfigError, InitError, NpuviewError};
use npuview::inference::{
    Accelerator, InputTensor, IoCount, OutputTensor, SdkVersion, TensorAttr,
};
use npuview::scaler::{ImageScaler, SourceImage, TargetImage};

/// Never constructed: `open` always fails before one exists
struct UnreachableAccelerator;

impl Accelerator for UnreachableAccelerator {
    fn sdk_version(&self) -> Result<SdkVersion, AcceleratorError> {
        unreachable!()
    }

    fn io_count(&self) -> Result<IoCount, AcceleratorError> {
        unreachable!()
    }

    fn input_attr(&self, _index: u32) -> Result<TensorAttr, AcceleratorError> {
        unreachable!()
    }

    fn output_attr(&self, _index: u32) -> Result<TensorAttr, AcceleratorError> {
        unreachable!()
    }

    fn set_input(&mut self, _input: &InputTensor<'_>) -> Result<(), AcceleratorError> {
        unreachable!()
    }

    fn run(&mut self) -> Result<(), AcceleratorError> {
        unreachable!()
    }

    fn with_outputs<R, F>(&mut self, _count: u32, _f: F) -> Result<R, AcceleratorError>
    where
        F: FnOnce(&[OutputTensor<'_>]) -> R,
    {
        unreachable!()
    }
}

struct CountingScaler(Arc<AtomicUsize>);

impl ImageScaler for CountingScaler {
    fn check(&self, _src: &SourceImage<'_>, _dst: &TargetImage<'_>) -> Result<(), AcceleratorError> {
        self.0.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn resize(
        &mut self,
        _src: &SourceImage<'_>,
        _dst: &mut TargetImage<'_>,
    ) -> Result<(), AcceleratorError> {
        self.0.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

struct CountingDecoder(Arc<AtomicUsize>);

impl DetectionDecoder for CountingDecoder {
    fn decode(&self, _outputs: &[OutputTensor<'_>], _request: &DecodeRequest<'_>) -> Vec<DetectionBox> {
        self.0.fetch_add(1, Ordering::SeqCst);
        Vec::new()
    }
}

fn missing_model_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.input.locator = "/nonexistent/clip.mp4".to_string();
    config.model.path = PathBuf::from("/nonexistent/yolov5s-640-640.rknn");
    config
}

#[test]
fn test_model_load_failure_processes_no_frames() {
    let frames = Arc::new(AtomicUsize::new(0));
    let opened = Arc::new(AtomicUsize::new(0));
    let opened_in = Arc::clone(&opened);

    let result = npuview::run_with(
        missing_model_config(),
        move |path: &Path| -> Result<UnreachableAccelerator, AcceleratorError> {
            opened_in.fetch_add(1, Ordering::SeqCst);
            assert!(path.ends_with("yolov5s-640-640.rknn"));
            Err(AcceleratorError::Sdk {
                call: "rknn_init",
                status: -1,
            })
        },
        CountingScaler(Arc::clone(&frames)),
        CountingDecoder(Arc::clone(&frames)),
    );

    match result {
        Err(NpuviewError::Init(InitError::ModelLoad { path, source })) => {
            assert_eq!(path, PathBuf::from("/nonexistent/yolov5s-640-640.rknn"));
            assert_eq!(
                source,
                AcceleratorError::Sdk {
                    call: "rknn_init",
                    status: -1
                }
            );
        }
        other => panic!("Expected model load failure, got {:?}", other.map(|_| ())),
    }
    assert_eq!(opened.load(Ordering::SeqCst), 1);
    assert_eq!(frames.load(Ordering::SeqCst), 0);
}

#[test]
fn test_invalid_config_fails_before_model_load() {
    let mut config = missing_model_config();
    config.model.box_threshold = -0.1;
    let opened = Arc::new(AtomicUsize::new(0));
    let opened_in = Arc::clone(&opened);
    let frames = Arc::new(AtomicUsize::new(0));

    let result = npuview::run_with(
        config,
        move |_: &Path| -> Result<UnreachableAccelerator, AcceleratorError> {
            opened_in.fetch_add(1, Ordering::SeqCst);
            Err(AcceleratorError::Unavailable("unused".into()))
        },
        CountingScaler(Arc::clone(&frames)),
        CountingDecoder(Arc::clone(&frames)),
    );

    assert!(matches!(
        result,
        Err(NpuviewError::Config(ConfigError::InvalidValue(_)))
    ));
    assert_eq!(opened.load(Ordering::SeqCst), 0);
}

#[cfg(not(feature = "rockchip"))]
#[test]
fn test_host_build_fails_closed() {
    let result = npuview::run(missing_model_config());

    match result {
        Err(NpuviewError::Init(InitError::ModelLoad { source, .. })) => {
            assert!(matches!(source, AcceleratorError::Unavailable(_)));
        }
        other => panic!("Expected model load failure, got {:?}", other.map(|_| ())),
    }
}
