//! YOLOv5 decoder backed by the RKNN model-zoo post-process.
//!
//! The model zoo ships `post_process` as C++ source taking `std::vector`
//! quantisation arrays. `csrc/yolov5_shim.cc` compiles it together with a
//! C entry point, `npuview_yolov5_post_process`, that takes the three raw
//! int8 heads, the model geometry, both thresholds, the frame scale and
//! plain quantisation arrays, and fills a fixed-size result group.
//! Without the `rockchip` feature the decoder yields no boxes.

use super::{DecodeRequest, DetectionBox, DetectionDecoder};
use crate::inference::OutputTensor;

#[cfg(feature = "rockchip")]
mod ffi {
    #![allow(non_camel_case_types, dead_code)]

    use std::os::raw::{c_char, c_int};

    pub const OBJ_NAME_MAX_SIZE: usize = 16;
    pub const OBJ_NUMB_MAX_SIZE: usize = 64;

    #[repr(C)]
    #[derive(Clone, Copy, Default)]
    pub struct BOX_RECT {
        pub left: c_int,
        pub right: c_int,
        pub top: c_int,
        pub bottom: c_int,
    }

    #[repr(C)]
    #[derive(Clone, Copy)]
    pub struct detect_result_t {
        pub name: [c_char; OBJ_NAME_MAX_SIZE],
        pub box_: BOX_RECT,
        pub prop: f32,
    }

    #[repr(C)]
    pub struct detect_result_group_t {
        pub id: c_int,
        pub count: c_int,
        pub results: [detect_result_t; OBJ_NUMB_MAX_SIZE],
    }

    extern "C" {
        pub fn npuview_yolov5_post_process(
            input0: *const i8,
            input1: *const i8,
            input2: *const i8,
            model_in_h: c_int,
            model_in_w: c_int,
            conf_threshold: f32,
            nms_threshold: f32,
            scale_w: f32,
            scale_h: f32,
            qnt_zps: *const i32,
            qnt_scales: *const f32,
            qnt_len: c_int,
            group: *mut detect_result_group_t,
        ) -> c_int;
    }
}

/// Number of output heads a YOLOv5 model exposes
pub const YOLOV5_HEADS: usize = 3;

/// Vendor YOLOv5 decoder
#[derive(Debug, Default, Clone, Copy)]
pub struct Yolov5Decoder;

impl Yolov5Decoder {
    pub fn new() -> Self {
        Self
    }
}

#[cfg(feature = "rockchip")]
impl DetectionDecoder for Yolov5Decoder {
    fn decode(&self, outputs: &[OutputTensor<'_>], request: &DecodeRequest<'_>) -> Vec<DetectionBox> {
        use super::BoxRect;
        use std::os::raw::c_int;

        if outputs.len() < YOLOV5_HEADS
            || request.zero_points.len() < YOLOV5_HEADS
            || request.scales.len() < YOLOV5_HEADS
        {
            tracing::warn!(
                "YOLOv5 decoder needs {} outputs, got {}",
                YOLOV5_HEADS,
                outputs.len()
            );
            return Vec::new();
        }

        // SAFETY: the group is plain old data; zeroed is a valid empty result.
        let mut group: Box<ffi::detect_result_group_t> = Box::new(unsafe { std::mem::zeroed() });

        // SAFETY: head buffers and quantisation arrays outlive the call.
        let status = unsafe {
            ffi::npuview_yolov5_post_process(
                outputs[0].as_i8().as_ptr(),
                outputs[1].as_i8().as_ptr(),
                outputs[2].as_i8().as_ptr(),
                request.model_height as c_int,
                request.model_width as c_int,
                request.box_threshold,
                request.nms_threshold,
                request.scale.scale_w,
                request.scale.scale_h,
                request.zero_points.as_ptr(),
                request.scales.as_ptr(),
                request.zero_points.len().min(request.scales.len()) as c_int,
                group.as_mut(),
            )
        };
        if status < 0 {
            tracing::warn!("YOLOv5 post-process failed with status {}", status);
            return Vec::new();
        }

        let count = (group.count.max(0) as usize).min(ffi::OBJ_NUMB_MAX_SIZE);
        group.results[..count]
            .iter()
            .map(|result| {
                let name: Vec<u8> = result
                    .name
                    .iter()
                    .take_while(|&&c| c != 0)
                    .map(|&c| c as u8)
                    .collect();
                DetectionBox::new(
                    String::from_utf8_lossy(&name),
                    BoxRect::new(
                        result.box_.left,
                        result.box_.top,
                        result.box_.right,
                        result.box_.bottom,
                    ),
                    result.prop,
                )
            })
            .collect()
    }
}

#[cfg(not(feature = "rockchip"))]
impl DetectionDecoder for Yolov5Decoder {
    fn decode(&self, _outputs: &[OutputTensor<'_>], _request: &DecodeRequest<'_>) -> Vec<DetectionBox> {
        Vec::new()
    }
}
