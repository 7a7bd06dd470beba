//! CPU fallback scaler for hosts without an RGA block

use image::imageops::{self, FilterType};
use image::{ImageBuffer, Pixel, RgbImage, RgbaImage};

use super::{validate_pair, ImageScaler, PixelFormat, SourceImage, TargetImage};
use crate::error::AcceleratorError;

/// Resizes with the `image` crate. Copies the source once to drop row padding.
pub struct SoftwareScaler {
    filter: FilterType,
}

impl Default for SoftwareScaler {
    fn default() -> Self {
        Self {
            filter: FilterType::Triangle,
        }
    }
}

impl SoftwareScaler {
    pub fn new(filter: FilterType) -> Self {
        Self { filter }
    }
}

fn pack_rows(src: &SourceImage<'_>) -> Vec<u8> {
    let row = src.desc.row_bytes();
    let mut packed = Vec::with_capacity(row * src.desc.height as usize);
    for y in 0..src.desc.height as usize {
        let start = y * src.desc.stride;
        packed.extend_from_slice(&src.data[start..start + row]);
    }
    packed
}

fn write_rgb<P>(image: &ImageBuffer<P, Vec<u8>>, dst: &mut TargetImage<'_>)
where
    P: Pixel<Subpixel = u8>,
{
    let stride = dst.desc.stride;
    for (x, y, pixel) in image.enumerate_pixels() {
        let channels = pixel.channels();
        let idx = y as usize * stride + x as usize * 3;
        dst.data[idx..idx + 3].copy_from_slice(&channels[..3]);
    }
}

impl ImageScaler for SoftwareScaler {
    fn check(&self, src: &SourceImage<'_>, dst: &TargetImage<'_>) -> Result<(), AcceleratorError> {
        validate_pair(src, dst)?;
        if dst.desc.format != PixelFormat::Rgb888 {
            return Err(AcceleratorError::UnsupportedConversion(format!(
                "destination format {:?} is not supported",
                dst.desc.format
            )));
        }
        Ok(())
    }

    fn resize(
        &mut self,
        src: &SourceImage<'_>,
        dst: &mut TargetImage<'_>,
    ) -> Result<(), AcceleratorError> {
        let (width, height) = (src.desc.width, src.desc.height);
        let (dst_width, dst_height) = (dst.desc.width, dst.desc.height);
        let packed = pack_rows(src);
        let malformed = || AcceleratorError::UnsupportedConversion("malformed source image".into());

        match src.desc.format {
            PixelFormat::Rgba8888 => {
                let image = RgbaImage::from_raw(width, height, packed).ok_or_else(malformed)?;
                let resized = imageops::resize(&image, dst_width, dst_height, self.filter);
                write_rgb(&resized, dst);
            }
            PixelFormat::Rgb888 => {
                let image = RgbImage::from_raw(width, height, packed).ok_or_else(malformed)?;
                let resized = imageops::resize(&image, dst_width, dst_height, self.filter);
                write_rgb(&resized, dst);
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scaler::ImageDesc;

    #[test]
    fn test_rgba_to_rgb_downscale_drops_alpha() {
        // 4x2 solid colour with padded rows
        let desc = ImageDesc {
            width: 4,
            height: 2,
            stride: 20,
            format: PixelFormat::Rgba8888,
        };
        let mut src_data = vec![0u8; desc.stride * 2];
        for y in 0..2 {
            for x in 0..4 {
                let idx = y * desc.stride + x * 4;
                src_data[idx..idx + 4].copy_from_slice(&[10, 20, 30, 255]);
            }
        }
        let mut dst_data = vec![0u8; 2 * 1 * 3];

        let src = SourceImage {
            data: &src_data,
            desc,
        };
        let mut dst = TargetImage {
            data: &mut dst_data,
            desc: ImageDesc::packed(2, 1, PixelFormat::Rgb888),
        };

        let mut scaler = SoftwareScaler::default();
        scaler.check(&src, &dst).unwrap();
        scaler.resize(&src, &mut dst).unwrap();

        assert_eq!(dst_data, vec![10, 20, 30, 10, 20, 30]);
    }

    #[test]
    fn test_rejects_rgba_destination() {
        let src_data = vec![0u8; 16];
        let mut dst_data = vec![0u8; 16];
        let src = SourceImage {
            data: &src_data,
            desc: ImageDesc::packed(2, 2, PixelFormat::Rgba8888),
        };
        let dst = TargetImage {
            data: &mut dst_data,
            desc: ImageDesc::packed(2, 2, PixelFormat::Rgba8888),
        };

        assert!(SoftwareScaler::default().check(&src, &dst).is_err());
    }
}
