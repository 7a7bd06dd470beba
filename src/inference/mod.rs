//! Accelerator abstraction and the process-wide inference context

use std::fmt;
use std::path::Path;

use tracing::{debug, info};

use crate::config::ModelConfig;
use crate::error::{AcceleratorError, InitError};

#[cfg(feature = "rockchip")]
pub mod sys;

#[cfg(feature = "rockchip")]
pub mod rknn;
#[cfg(not(feature = "rockchip"))]
#[path = "rknn_stub.rs"]
pub mod rknn;

pub use rknn::RknnAccelerator;

/// Memory layout of a tensor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TensorFormat {
    Nchw,
    Nhwc,
    Nc1hwc2,
    Undefined,
}

impl fmt::Display for TensorFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TensorFormat::Nchw => "NCHW",
            TensorFormat::Nhwc => "NHWC",
            TensorFormat::Nc1hwc2 => "NC1HWC2",
            TensorFormat::Undefined => "UNDEFINED",
        };
        f.write_str(name)
    }
}

/// Element type of a tensor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TensorType {
    Float32,
    Float16,
    Int8,
    Uint8,
    Int16,
    Other(i32),
}

/// One tensor attribute record as reported by the SDK
#[derive(Debug, Clone, PartialEq)]
pub struct TensorAttr {
    pub index: u32,
    pub name: String,
    pub dims: Vec<u32>,
    pub element_count: u32,
    pub size: u32,
    pub format: TensorFormat,
    pub tensor_type: TensorType,
    /// Affine quantisation zero-point
    pub zero_point: i32,
    /// Affine quantisation scale
    pub scale: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IoCount {
    pub inputs: u32,
    pub outputs: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SdkVersion {
    pub api: String,
    pub driver: String,
}

/// Input tensor submitted to the accelerator
#[derive(Debug)]
pub struct InputTensor<'a> {
    pub index: u32,
    pub data: &'a [u8],
    pub format: TensorFormat,
    pub tensor_type: TensorType,
}

/// Raw (still quantised) output tensor, borrowed from the accelerator
#[derive(Debug, Clone, Copy)]
pub struct OutputTensor<'a> {
    pub index: u32,
    pub data: &'a [u8],
}

impl<'a> OutputTensor<'a> {
    /// View the raw bytes as signed 8-bit quantised values
    pub fn as_i8(&self) -> &'a [i8] {
        // SAFETY: u8 and i8 share size and alignment; the length is unchanged.
        unsafe { std::slice::from_raw_parts(self.data.as_ptr() as *const i8, self.data.len()) }
    }
}

/// Per-output affine quantisation parameters
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Quantization {
    pub zero_points: Vec<i32>,
    pub scales: Vec<f32>,
}

/// Vendor inference SDK seam.
///
/// A handle is not reentrant: every call that touches device state takes
/// `&mut self`.
pub trait Accelerator: Send {
    fn sdk_version(&self) -> Result<SdkVersion, AcceleratorError>;

    fn io_count(&self) -> Result<IoCount, AcceleratorError>;

    fn input_attr(&self, index: u32) -> Result<TensorAttr, AcceleratorError>;

    fn output_attr(&self, index: u32) -> Result<TensorAttr, AcceleratorError>;

    fn set_input(&mut self, input: &InputTensor<'_>) -> Result<(), AcceleratorError>;

    fn run(&mut self) -> Result<(), AcceleratorError>;

    /// Fetch `count` raw outputs, hand them to `f`, then release them.
    fn with_outputs<R, F>(&mut self, count: u32, f: F) -> Result<R, AcceleratorError>
    where
        F: FnOnce(&[OutputTensor<'_>]) -> R;
}

/// The single inference context of the process.
///
/// Owns the accelerator handle and the scratch buffer the scaler writes
/// model input into.
pub struct InferenceContext<A: Accelerator> {
    accelerator: A,
    scratch: Vec<u8>,
    model: ModelConfig,
    sdk: SdkVersion,
    io: IoCount,
    input_attrs: Vec<TensorAttr>,
    output_attrs: Vec<TensorAttr>,
    quantization: Quantization,
}

impl<A: Accelerator> fmt::Debug for InferenceContext<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InferenceContext")
            .field("model", &self.model.path)
            .field("sdk", &self.sdk)
            .field("io", &self.io)
            .field("scratch_len", &self.scratch.len())
            .finish()
    }
}

impl<A: Accelerator> InferenceContext<A> {
    /// Run the one-time startup sequence. Every failure is fatal.
    pub fn initialize<F>(model: &ModelConfig, open: F) -> Result<Self, InitError>
    where
        F: FnOnce(&Path) -> Result<A, AcceleratorError>,
    {
        let bytes = model.input_size();
        let mut scratch = Vec::new();
        scratch
            .try_reserve_exact(bytes)
            .map_err(|_| InitError::Allocation { bytes })?;
        scratch.resize(bytes, 0);

        let accelerator = open(&model.path).map_err(|source| InitError::ModelLoad {
            path: model.path.clone(),
            source,
        })?;

        let sdk = accelerator
            .sdk_version()
            .map_err(|source| InitError::Query {
                what: "sdk version",
                source,
            })?;
        info!("api version: {} driver version: {}", sdk.api, sdk.driver);

        let io = accelerator.io_count().map_err(|source| InitError::Query {
            what: "input/output count",
            source,
        })?;
        info!("n_input={} n_output={}", io.inputs, io.outputs);

        if io.inputs == 0 || io.outputs == 0 {
            return Err(InitError::Layout(format!(
                "model reports {} inputs and {} outputs",
                io.inputs, io.outputs
            )));
        }

        let input_attrs = (0..io.inputs)
            .map(|i| accelerator.input_attr(i))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|source| InitError::Query {
                what: "input attribute",
                source,
            })?;
        let output_attrs = (0..io.outputs)
            .map(|i| accelerator.output_attr(i))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|source| InitError::Query {
                what: "output attribute",
                source,
            })?;

        let input = &input_attrs[0];
        info!("input[0] fmt={}", input.format);
        debug!("output[0] fmt={}", output_attrs[0].format);

        // zero-copy input only accepts channel-last
        if input.format != TensorFormat::Nhwc {
            return Err(InitError::Layout(format!(
                "input[0] is {}, NHWC is required",
                input.format
            )));
        }
        if input.element_count != 0 && input.element_count as usize != scratch.len() {
            return Err(InitError::InputShape {
                expected: input.element_count as usize,
                actual: scratch.len(),
            });
        }

        let quantization = Quantization {
            zero_points: output_attrs.iter().map(|a| a.zero_point).collect(),
            scales: output_attrs.iter().map(|a| a.scale).collect(),
        };

        Ok(Self {
            accelerator,
            scratch,
            model: model.clone(),
            sdk,
            io,
            input_attrs,
            output_attrs,
            quantization,
        })
    }

    pub fn model(&self) -> &ModelConfig {
        &self.model
    }

    pub fn sdk_version(&self) -> &SdkVersion {
        &self.sdk
    }

    pub fn io_count(&self) -> IoCount {
        self.io
    }

    pub fn input_attrs(&self) -> &[TensorAttr] {
        &self.input_attrs
    }

    pub fn output_attrs(&self) -> &[TensorAttr] {
        &self.output_attrs
    }

    pub fn quantization(&self) -> &Quantization {
        &self.quantization
    }

    /// Model input buffer the scaler writes into
    pub fn scratch_mut(&mut self) -> &mut [u8] {
        &mut self.scratch
    }

    /// Submit the scratch buffer, run, and hand the raw outputs to `f`.
    ///
    /// Outputs are released when `f` returns.
    pub fn infer<R, F>(&mut self, f: F) -> Result<R, AcceleratorError>
    where
        F: FnOnce(&[OutputTensor<'_>], &Quantization) -> R,
    {
        let input = InputTensor {
            index: 0,
            data: &self.scratch,
            format: TensorFormat::Nhwc,
            tensor_type: TensorType::Uint8,
        };
        self.accelerator.set_input(&input)?;
        self.accelerator.run()?;

        let quantization = &self.quantization;
        self.accelerator
            .with_outputs(self.io.outputs, |outputs| f(outputs, quantization))
    }
}
