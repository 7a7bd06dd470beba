//! Resize + colour-convert from the display frame into the model input

use crate::error::AcceleratorError;

#[cfg(feature = "rockchip")]
pub mod rga;
pub mod software;

#[cfg(feature = "rockchip")]
pub use rga::RgaScaler;
pub use software::SoftwareScaler;

/// Interleaved 8-bit pixel layouts understood by the scaler and overlay
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    Rgba8888,
    Rgb888,
}

impl PixelFormat {
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            PixelFormat::Rgba8888 => 4,
            PixelFormat::Rgb888 => 3,
        }
    }
}

/// Geometry of an image in memory. `stride` is in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageDesc {
    pub width: u32,
    pub height: u32,
    pub stride: usize,
    pub format: PixelFormat,
}

impl ImageDesc {
    /// Tightly packed image
    pub fn packed(width: u32, height: u32, format: PixelFormat) -> Self {
        Self {
            width,
            height,
            stride: width as usize * format.bytes_per_pixel(),
            format,
        }
    }

    pub fn row_bytes(&self) -> usize {
        self.width as usize * self.format.bytes_per_pixel()
    }

    /// Smallest buffer that holds this image
    pub fn min_len(&self) -> usize {
        if self.height == 0 {
            return 0;
        }
        self.stride * (self.height as usize - 1) + self.row_bytes()
    }

    fn validate(&self, role: &str, len: usize) -> Result<(), AcceleratorError> {
        if self.width == 0 || self.height == 0 {
            return Err(AcceleratorError::UnsupportedConversion(format!(
                "{} image has zero size",
                role
            )));
        }
        if self.stride < self.row_bytes() {
            return Err(AcceleratorError::UnsupportedConversion(format!(
                "{} stride {} is shorter than a row ({} bytes)",
                role,
                self.stride,
                self.row_bytes()
            )));
        }
        if len < self.min_len() {
            return Err(AcceleratorError::UnsupportedConversion(format!(
                "{} buffer holds {} bytes, {} required",
                role,
                len,
                self.min_len()
            )));
        }
        Ok(())
    }
}

/// Read side of a conversion
#[derive(Debug)]
pub struct SourceImage<'a> {
    pub data: &'a [u8],
    pub desc: ImageDesc,
}

/// Write side of a conversion
#[derive(Debug)]
pub struct TargetImage<'a> {
    pub data: &'a mut [u8],
    pub desc: ImageDesc,
}

/// Checks that both sides of a conversion describe valid buffers.
pub fn validate_pair(src: &SourceImage<'_>, dst: &TargetImage<'_>) -> Result<(), AcceleratorError> {
    src.desc.validate("source", src.data.len())?;
    dst.desc.validate("destination", dst.data.len())
}

/// Combined resize and pixel-format conversion.
///
/// `check` must succeed before `resize` is attempted; a failure from
/// either is a per-frame soft failure for the caller.
pub trait ImageScaler: Send {
    fn check(&self, src: &SourceImage<'_>, dst: &TargetImage<'_>) -> Result<(), AcceleratorError>;

    fn resize(
        &mut self,
        src: &SourceImage<'_>,
        dst: &mut TargetImage<'_>,
    ) -> Result<(), AcceleratorError>;
}
