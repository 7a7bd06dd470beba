//! Frame annotation with in-test accelerator, scaler and decoder fakes

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use npuview::annotate::{FrameAnnotator, FrameOutcome, SkipReason};
use npuview::config::{ModelConfig, OverlayConfig};
use npuview::detection::{BoxRect, DecodeRequest, DetectionBox, DetectionDecoder};
use npuview::error::AcceleratorError;
use npuview::inference::{
    Accelerator, InferenceContext, InputTensor, IoCount, OutputTensor, SdkVersion, TensorAttr,
    TensorFormat, TensorType,
};
use npuview::metrics::AnnotationMetrics;
use npuview::overlay::FrameView;
use npuview::scaler::{ImageDesc, PixelFormat, SoftwareScaler};

use image::imageops::FilterType;

const MODEL_SIDE: u32 = 16;

/// Accelerator that records the last submitted input
struct RecordingAccelerator {
    last_input: Arc<Mutex<Vec<u8>>>,
    runs: Arc<AtomicUsize>,
}

impl Accelerator for RecordingAccelerator {
    fn sdk_version(&self) -> Result<SdkVersion, AcceleratorError> {
        Ok(SdkVersion {
            api: "1.6.0".into(),
            driver: "0.9.3".into(),
        })
    }

    fn io_count(&self) -> Result<IoCount, AcceleratorError> {
        Ok(IoCount {
            inputs: 1,
            outputs: 3,
        })
    }

    fn input_attr(&self, index: u32) -> Result<TensorAttr, AcceleratorError> {
        let n = MODEL_SIDE * MODEL_SIDE * 3;
        Ok(TensorAttr {
            index,
            name: "images".into(),
            dims: vec![1, MODEL_SIDE, MODEL_SIDE, 3],
            element_count: n,
            size: n,
            format: TensorFormat::Nhwc,
            tensor_type: TensorType::Uint8,
            zero_point: 0,
            scale: 1.0,
        })
    }

    fn output_attr(&self, index: u32) -> Result<TensorAttr, AcceleratorError> {
        Ok(TensorAttr {
            index,
            name: format!("output{}", index),
            dims: vec![1, 255, 2, 2],
            element_count: 255 * 4,
            size: 255 * 4,
            format: TensorFormat::Nchw,
            tensor_type: TensorType::Int8,
            zero_point: -128 + index as i32,
            scale: 0.05,
        })
    }

    fn set_input(&mut self, input: &InputTensor<'_>) -> Result<(), AcceleratorError> {
        assert_eq!(input.index, 0);
        assert_eq!(input.format, TensorFormat::Nhwc);
        *self.last_input.lock().unwrap() = input.data.to_vec();
        Ok(())
    }

    fn run(&mut self) -> Result<(), AcceleratorError> {
        self.runs.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn with_outputs<R, F>(&mut self, count: u32, f: F) -> Result<R, AcceleratorError>
    where
        F: FnOnce(&[OutputTensor<'_>]) -> R,
    {
        let data = vec![0u8; 255 * 4];
        let outputs: Vec<_> = (0..count)
            .map(|index| OutputTensor { index, data: &data })
            .collect();
        Ok(f(&outputs))
    }
}

/// Returns a box in model-input space, mapped back with the request scale
struct ModelSpaceDecoder {
    rect: BoxRect,
}

impl DetectionDecoder for ModelSpaceDecoder {
    fn decode(&self, _outputs: &[OutputTensor<'_>], request: &DecodeRequest<'_>) -> Vec<DetectionBox> {
        assert_eq!(request.model_width, MODEL_SIDE);
        assert_eq!(request.box_threshold, 0.25);
        assert_eq!(request.nms_threshold, 0.45);
        assert_eq!(request.zero_points, &[-128, -127, -126]);
        vec![DetectionBox::new(
            "",
            request.scale.rect_to_source(&self.rect),
            0.9,
        )]
    }
}

struct Harness {
    annotator: FrameAnnotator<RecordingAccelerator, SoftwareScaler, ModelSpaceDecoder>,
    last_input: Arc<Mutex<Vec<u8>>>,
    runs: Arc<AtomicUsize>,
    metrics: Arc<AnnotationMetrics>,
}

fn harness(rect: BoxRect) -> Harness {
    let last_input = Arc::new(Mutex::new(Vec::new()));
    let runs = Arc::new(AtomicUsize::new(0));
    let model = ModelConfig {
        width: MODEL_SIDE,
        height: MODEL_SIDE,
        ..ModelConfig::default()
    };
    let context = InferenceContext::initialize(&model, |_| {
        Ok(RecordingAccelerator {
            last_input: Arc::clone(&last_input),
            runs: Arc::clone(&runs),
        })
    })
    .unwrap();
    let overlay = OverlayConfig {
        font_path: PathBuf::from("/nonexistent/simsun.ttc"),
        box_color: [0, 255, 0, 255],
    };
    let metrics = Arc::new(AnnotationMetrics::new());
    let annotator = FrameAnnotator::new(
        context,
        SoftwareScaler::new(FilterType::Nearest),
        ModelSpaceDecoder { rect },
        &overlay,
        Arc::clone(&metrics),
    );

    Harness {
        annotator,
        last_input,
        runs,
        metrics,
    }
}

#[test]
fn test_scaled_input_reaches_accelerator() {
    let mut h = harness(BoxRect::new(4, 4, 8, 8));
    // solid blue RGBA frame
    let desc = ImageDesc::packed(64, 32, PixelFormat::Rgba8888);
    let mut data: Vec<u8> = [0u8, 0, 200, 255].repeat(64 * 32);
    let mut frame = FrameView::new(&mut data, desc).unwrap();

    let outcome = h.annotator.annotate(&mut frame);

    assert_eq!(outcome, FrameOutcome::Annotated { detections: 1 });
    assert_eq!(h.runs.load(Ordering::SeqCst), 1);
    let input = h.last_input.lock().unwrap();
    assert_eq!(input.len(), (MODEL_SIDE * MODEL_SIDE * 3) as usize);
    assert!(input.chunks(3).all(|px| px == [0, 0, 200]));
}

#[test]
fn test_context_reports_model_geometry() {
    let h = harness(BoxRect::new(0, 0, 1, 1));
    let context = h.annotator.context();

    assert_eq!(context.io_count().outputs, 3);
    assert_eq!(context.input_attrs()[0].dims, vec![1, MODEL_SIDE, MODEL_SIDE, 3]);
    assert_eq!(context.output_attrs().len(), 3);
    assert_eq!(context.model().width, MODEL_SIDE);
}

#[test]
fn test_model_space_box_drawn_at_source_resolution() {
    // 64x32 source into a 16x16 model: x * 4, y * 2
    let mut h = harness(BoxRect::new(2, 2, 6, 8));
    let desc = ImageDesc::packed(64, 32, PixelFormat::Rgba8888);
    let mut data = vec![0u8; desc.min_len()];
    let mut frame = FrameView::new(&mut data, desc).unwrap();

    h.annotator.annotate(&mut frame);

    let green = Some([0, 255, 0, 255]);
    // source rect (8, 4) .. (24, 16)
    assert_eq!(frame.pixel(8, 4), green);
    assert_eq!(frame.pixel(23, 15), green);
    assert_eq!(frame.pixel(16, 4), green);
    assert_eq!(frame.pixel(16, 10), Some([0, 0, 0, 0]));
}

#[test]
fn test_rgb_frames_with_padded_stride() {
    let mut h = harness(BoxRect::new(0, 0, 4, 4));
    let desc = ImageDesc {
        width: 30,
        height: 20,
        stride: 96,
        format: PixelFormat::Rgb888,
    };
    let mut data = vec![0x40u8; 96 * 20];
    let mut frame = FrameView::new(&mut data, desc).unwrap();

    let outcome = h.annotator.annotate(&mut frame);
    drop(frame);

    assert!(!outcome.is_skipped());
    // row padding is never drawn on
    assert!(data[90..96].iter().all(|&b| b == 0x40));
}

#[test]
fn test_metrics_accumulate_over_frames() {
    let mut h = harness(BoxRect::new(1, 1, 3, 3));
    let desc = ImageDesc::packed(32, 32, PixelFormat::Rgba8888);
    let mut data = vec![0u8; desc.min_len()];

    for _ in 0..5 {
        let mut frame = FrameView::new(&mut data, desc).unwrap();
        h.annotator.annotate(&mut frame);
    }

    assert_eq!(h.metrics.get_total_frames(), 5);
    assert_eq!(h.metrics.get_annotated_frames(), 5);
    assert_eq!(h.metrics.get_detections(), 5);
    assert_eq!(h.metrics.get_skips(SkipReason::Resize), 0);
}
