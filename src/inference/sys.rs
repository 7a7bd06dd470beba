//! Raw FFI bindings to the RKNN runtime (`librknnrt`).
//!
//! Covers the subset of `rknn_api.h` used by [`RknnAccelerator`](super::rknn).
//! Matches RKNN toolkit2 runtime 1.5.x headers.
//!
//! # Linking
//!
//! `build.rs` emits `-l rknnrt` when the `rockchip` feature is enabled.
//! The library is located via `RKNN_LIB_DIR` or the board's `/usr/lib`.

#![allow(non_camel_case_types, dead_code)]

use std::ffi::c_void;
use std::os::raw::{c_char, c_int};

/// Context handle (64-bit on aarch64 runtimes).
pub type rknn_context = u64;

pub const RKNN_SUCC: c_int = 0;

pub const RKNN_MAX_DIMS: usize = 16;
pub const RKNN_MAX_NAME_LEN: usize = 256;

// Query commands

pub type rknn_query_cmd = c_int;
pub const RKNN_QUERY_IN_OUT_NUM: rknn_query_cmd = 0;
pub const RKNN_QUERY_INPUT_ATTR: rknn_query_cmd = 1;
pub const RKNN_QUERY_OUTPUT_ATTR: rknn_query_cmd = 2;
pub const RKNN_QUERY_SDK_VERSION: rknn_query_cmd = 5;

// Tensor enums

pub type rknn_tensor_type = c_int;
pub const RKNN_TENSOR_FLOAT32: rknn_tensor_type = 0;
pub const RKNN_TENSOR_FLOAT16: rknn_tensor_type = 1;
pub const RKNN_TENSOR_INT8: rknn_tensor_type = 2;
pub const RKNN_TENSOR_UINT8: rknn_tensor_type = 3;
pub const RKNN_TENSOR_INT16: rknn_tensor_type = 4;

pub type rknn_tensor_format = c_int;
pub const RKNN_TENSOR_NCHW: rknn_tensor_format = 0;
pub const RKNN_TENSOR_NHWC: rknn_tensor_format = 1;
pub const RKNN_TENSOR_NC1HWC2: rknn_tensor_format = 2;
pub const RKNN_TENSOR_UNDEFINED: rknn_tensor_format = 3;

pub type rknn_tensor_qnt_type = c_int;

// Structs

#[repr(C)]
#[derive(Clone, Copy, Default, Debug)]
pub struct rknn_input_output_num {
    pub n_input: u32,
    pub n_output: u32,
}

#[repr(C)]
#[derive(Clone, Copy)]
pub struct rknn_tensor_attr {
    pub index: u32,
    pub n_dims: u32,
    pub dims: [u32; RKNN_MAX_DIMS],
    pub name: [c_char; RKNN_MAX_NAME_LEN],
    pub n_elems: u32,
    pub size: u32,
    pub fmt: rknn_tensor_format,
    pub type_: rknn_tensor_type,
    pub qnt_type: rknn_tensor_qnt_type,
    pub fl: i8,
    pub zp: i32,
    pub scale: f32,
    pub w_stride: u32,
    pub size_with_stride: u32,
    pub pass_through: u8,
    pub h_stride: u32,
}

impl rknn_tensor_attr {
    /// Zeroed record with the query index set
    pub fn for_index(index: u32) -> Self {
        Self {
            index,
            n_dims: 0,
            dims: [0; RKNN_MAX_DIMS],
            name: [0; RKNN_MAX_NAME_LEN],
            n_elems: 0,
            size: 0,
            fmt: 0,
            type_: 0,
            qnt_type: 0,
            fl: 0,
            zp: 0,
            scale: 0.0,
            w_stride: 0,
            size_with_stride: 0,
            pass_through: 0,
            h_stride: 0,
        }
    }
}

#[repr(C)]
#[derive(Clone, Copy)]
pub struct rknn_sdk_version {
    pub api_version: [c_char; 256],
    pub drv_version: [c_char; 256],
}

#[repr(C)]
#[derive(Clone, Copy)]
pub struct rknn_input {
    pub index: u32,
    pub buf: *mut c_void,
    pub size: u32,
    pub pass_through: u8,
    pub type_: rknn_tensor_type,
    pub fmt: rknn_tensor_format,
}

#[repr(C)]
#[derive(Clone, Copy)]
pub struct rknn_output {
    pub want_float: u8,
    pub is_prealloc: u8,
    pub index: u32,
    pub buf: *mut c_void,
    pub size: u32,
}

// Functions

extern "C" {
    /// `size == 0` means `model` is a NUL-terminated path.
    pub fn rknn_init(
        context: *mut rknn_context,
        model: *mut c_void,
        size: u32,
        flag: u32,
        extend: *mut c_void,
    ) -> c_int;

    pub fn rknn_destroy(context: rknn_context) -> c_int;

    pub fn rknn_query(
        context: rknn_context,
        cmd: rknn_query_cmd,
        info: *mut c_void,
        size: u32,
    ) -> c_int;

    pub fn rknn_inputs_set(context: rknn_context, n_inputs: u32, inputs: *mut rknn_input) -> c_int;

    pub fn rknn_run(context: rknn_context, extend: *mut c_void) -> c_int;

    pub fn rknn_outputs_get(
        context: rknn_context,
        n_outputs: u32,
        outputs: *mut rknn_output,
        extend: *mut c_void,
    ) -> c_int;

    pub fn rknn_outputs_release(
        context: rknn_context,
        n_outputs: u32,
        outputs: *mut rknn_output,
    ) -> c_int;
}
