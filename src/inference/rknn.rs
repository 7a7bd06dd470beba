//! Safe wrapper over the RKNN runtime

use std::ffi::{c_void, CString};
use std::os::raw::c_char;
use std::os::unix::ffi::OsStrExt;
use std::path::Path;
use std::ptr;

use tracing::warn;

use super::sys;
use super::{
    Accelerator, InputTensor, IoCount, OutputTensor, SdkVersion, TensorAttr, TensorFormat,
    TensorType,
};
use crate::error::AcceleratorError;

fn check(call: &'static str, status: i32) -> Result<(), AcceleratorError> {
    if status < sys::RKNN_SUCC {
        Err(AcceleratorError::Sdk { call, status })
    } else {
        Ok(())
    }
}

fn c_string(chars: &[c_char]) -> String {
    let bytes: Vec<u8> = chars
        .iter()
        .take_while(|&&c| c != 0)
        .map(|&c| c as u8)
        .collect();
    String::from_utf8_lossy(&bytes).into_owned()
}

fn tensor_format(fmt: sys::rknn_tensor_format) -> TensorFormat {
    match fmt {
        sys::RKNN_TENSOR_NCHW => TensorFormat::Nchw,
        sys::RKNN_TENSOR_NHWC => TensorFormat::Nhwc,
        sys::RKNN_TENSOR_NC1HWC2 => TensorFormat::Nc1hwc2,
        _ => TensorFormat::Undefined,
    }
}

fn raw_format(format: TensorFormat) -> sys::rknn_tensor_format {
    match format {
        TensorFormat::Nchw => sys::RKNN_TENSOR_NCHW,
        TensorFormat::Nhwc => sys::RKNN_TENSOR_NHWC,
        TensorFormat::Nc1hwc2 => sys::RKNN_TENSOR_NC1HWC2,
        TensorFormat::Undefined => sys::RKNN_TENSOR_UNDEFINED,
    }
}

fn tensor_type(raw: sys::rknn_tensor_type) -> TensorType {
    match raw {
        sys::RKNN_TENSOR_FLOAT32 => TensorType::Float32,
        sys::RKNN_TENSOR_FLOAT16 => TensorType::Float16,
        sys::RKNN_TENSOR_INT8 => TensorType::Int8,
        sys::RKNN_TENSOR_UINT8 => TensorType::Uint8,
        sys::RKNN_TENSOR_INT16 => TensorType::Int16,
        other => TensorType::Other(other),
    }
}

fn raw_type(tensor_type: TensorType) -> sys::rknn_tensor_type {
    match tensor_type {
        TensorType::Float32 => sys::RKNN_TENSOR_FLOAT32,
        TensorType::Float16 => sys::RKNN_TENSOR_FLOAT16,
        TensorType::Int8 => sys::RKNN_TENSOR_INT8,
        TensorType::Uint8 => sys::RKNN_TENSOR_UINT8,
        TensorType::Int16 => sys::RKNN_TENSOR_INT16,
        TensorType::Other(raw) => raw,
    }
}

impl From<&sys::rknn_tensor_attr> for TensorAttr {
    fn from(raw: &sys::rknn_tensor_attr) -> Self {
        let n_dims = (raw.n_dims as usize).min(sys::RKNN_MAX_DIMS);
        TensorAttr {
            index: raw.index,
            name: c_string(&raw.name),
            dims: raw.dims[..n_dims].to_vec(),
            element_count: raw.n_elems,
            size: raw.size,
            format: tensor_format(raw.fmt),
            tensor_type: tensor_type(raw.type_),
            zero_point: raw.zp,
            scale: raw.scale,
        }
    }
}

/// An initialised RKNN context. Destroyed exactly once on drop.
pub struct RknnAccelerator {
    context: sys::rknn_context,
}

impl RknnAccelerator {
    /// Load a compiled `.rknn` model from disk
    pub fn open(model: &Path) -> Result<Self, AcceleratorError> {
        let path = CString::new(model.as_os_str().as_bytes()).map_err(|_| {
            AcceleratorError::Unavailable(format!("model path {} contains NUL", model.display()))
        })?;

        let mut context: sys::rknn_context = 0;
        // SAFETY: size 0 tells the runtime `model` is a C path string.
        let status = unsafe {
            sys::rknn_init(
                &mut context,
                path.as_ptr() as *mut c_void,
                0,
                0,
                ptr::null_mut(),
            )
        };
        check("rknn_init", status)?;

        Ok(Self { context })
    }

    fn query<T>(&self, cmd: sys::rknn_query_cmd, info: &mut T) -> Result<(), AcceleratorError> {
        // SAFETY: `info` is the struct the runtime expects for `cmd`.
        let status = unsafe {
            sys::rknn_query(
                self.context,
                cmd,
                info as *mut T as *mut c_void,
                std::mem::size_of::<T>() as u32,
            )
        };
        check("rknn_query", status)
    }
}

impl Accelerator for RknnAccelerator {
    fn sdk_version(&self) -> Result<SdkVersion, AcceleratorError> {
        let mut raw = sys::rknn_sdk_version {
            api_version: [0; 256],
            drv_version: [0; 256],
        };
        self.query(sys::RKNN_QUERY_SDK_VERSION, &mut raw)?;
        Ok(SdkVersion {
            api: c_string(&raw.api_version),
            driver: c_string(&raw.drv_version),
        })
    }

    fn io_count(&self) -> Result<IoCount, AcceleratorError> {
        let mut raw = sys::rknn_input_output_num::default();
        self.query(sys::RKNN_QUERY_IN_OUT_NUM, &mut raw)?;
        Ok(IoCount {
            inputs: raw.n_input,
            outputs: raw.n_output,
        })
    }

    fn input_attr(&self, index: u32) -> Result<TensorAttr, AcceleratorError> {
        let mut raw = sys::rknn_tensor_attr::for_index(index);
        self.query(sys::RKNN_QUERY_INPUT_ATTR, &mut raw)?;
        Ok(TensorAttr::from(&raw))
    }

    fn output_attr(&self, index: u32) -> Result<TensorAttr, AcceleratorError> {
        let mut raw = sys::rknn_tensor_attr::for_index(index);
        self.query(sys::RKNN_QUERY_OUTPUT_ATTR, &mut raw)?;
        Ok(TensorAttr::from(&raw))
    }

    fn set_input(&mut self, input: &InputTensor<'_>) -> Result<(), AcceleratorError> {
        let mut raw = sys::rknn_input {
            index: input.index,
            // the runtime copies from this address and never writes to it
            buf: input.data.as_ptr() as *mut c_void,
            size: input.data.len() as u32,
            pass_through: 0,
            type_: raw_type(input.tensor_type),
            fmt: raw_format(input.format),
        };
        // SAFETY: `raw.buf` stays valid for the duration of the call.
        let status = unsafe { sys::rknn_inputs_set(self.context, 1, &mut raw) };
        check("rknn_inputs_set", status)
    }

    fn run(&mut self) -> Result<(), AcceleratorError> {
        // SAFETY: synchronous run on an initialised context.
        let status = unsafe { sys::rknn_run(self.context, ptr::null_mut()) };
        check("rknn_run", status)
    }

    fn with_outputs<R, F>(&mut self, count: u32, f: F) -> Result<R, AcceleratorError>
    where
        F: FnOnce(&[OutputTensor<'_>]) -> R,
    {
        let mut raw: Vec<sys::rknn_output> = (0..count)
            .map(|index| sys::rknn_output {
                want_float: 0,
                is_prealloc: 0,
                index,
                buf: ptr::null_mut(),
                size: 0,
            })
            .collect();

        // SAFETY: `raw` holds `count` records for the runtime to fill.
        let status = unsafe {
            sys::rknn_outputs_get(self.context, count, raw.as_mut_ptr(), ptr::null_mut())
        };
        check("rknn_outputs_get", status)?;

        let result = {
            let views: Vec<OutputTensor<'_>> = raw
                .iter()
                .map(|output| OutputTensor {
                    index: output.index,
                    data: if output.buf.is_null() {
                        &[]
                    } else {
                        // SAFETY: runtime-owned until rknn_outputs_release below.
                        unsafe {
                            std::slice::from_raw_parts(
                                output.buf as *const u8,
                                output.size as usize,
                            )
                        }
                    },
                })
                .collect();
            f(&views)
        };

        // SAFETY: releases exactly the records filled by rknn_outputs_get.
        let status = unsafe { sys::rknn_outputs_release(self.context, count, raw.as_mut_ptr()) };
        if let Err(e) = check("rknn_outputs_release", status) {
            warn!("{}", e);
        }

        Ok(result)
    }
}

impl Drop for RknnAccelerator {
    fn drop(&mut self) {
        // SAFETY: the context was created by rknn_init and is destroyed once.
        let status = unsafe { sys::rknn_destroy(self.context) };
        if status < sys::RKNN_SUCC {
            warn!("rknn_destroy failed with status {}", status);
        }
    }
}
