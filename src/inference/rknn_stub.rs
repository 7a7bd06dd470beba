//! Stub used when built without the `rockchip` feature.
//!
//! Opening always fails, so startup stops before playback on hosts without
//! the RKNN runtime.

use std::path::Path;

use super::{Accelerator, InputTensor, IoCount, OutputTensor, SdkVersion, TensorAttr};
use crate::error::AcceleratorError;

fn unavailable() -> AcceleratorError {
    AcceleratorError::Unavailable(
        "npuview built without the `rockchip` feature: the RKNN runtime is not linked".into(),
    )
}

/// Stub RKNN accelerator; never constructed.
pub struct RknnAccelerator {
    _private: (),
}

impl RknnAccelerator {
    pub fn open(model: &Path) -> Result<Self, AcceleratorError> {
        let _ = model;
        Err(unavailable())
    }
}

impl Accelerator for RknnAccelerator {
    fn sdk_version(&self) -> Result<SdkVersion, AcceleratorError> {
        Err(unavailable())
    }

    fn io_count(&self) -> Result<IoCount, AcceleratorError> {
        Err(unavailable())
    }

    fn input_attr(&self, _index: u32) -> Result<TensorAttr, AcceleratorError> {
        Err(unavailable())
    }

    fn output_attr(&self, _index: u32) -> Result<TensorAttr, AcceleratorError> {
        Err(unavailable())
    }

    fn set_input(&mut self, _input: &InputTensor<'_>) -> Result<(), AcceleratorError> {
        Err(unavailable())
    }

    fn run(&mut self) -> Result<(), AcceleratorError> {
        Err(unavailable())
    }

    fn with_outputs<R, F>(&mut self, _count: u32, _f: F) -> Result<R, AcceleratorError>
    where
        F: FnOnce(&[OutputTensor<'_>]) -> R,
    {
        Err(unavailable())
    }
}
