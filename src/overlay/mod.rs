//! In-place drawing on mapped video frames

use crate::detection::BoxRect;
use crate::scaler::{ImageDesc, PixelFormat, SourceImage};

pub mod glyph;

pub use glyph::{blit_glyph, em_scale, GlyphBitmap, GlyphOverlay};

/// Mutable view over one mapped frame.
///
/// Borrowed from the mapped buffer for the duration of the probe callback.
#[derive(Debug)]
pub struct FrameView<'a> {
    data: &'a mut [u8],
    desc: ImageDesc,
}

impl<'a> FrameView<'a> {
    /// `None` when `data` is too small for the described geometry
    pub fn new(data: &'a mut [u8], desc: ImageDesc) -> Option<Self> {
        if desc.stride < desc.row_bytes() || data.len() < desc.min_len() {
            return None;
        }
        Some(Self { data, desc })
    }

    pub fn width(&self) -> u32 {
        self.desc.width
    }

    pub fn height(&self) -> u32 {
        self.desc.height
    }

    /// Read-only source descriptor for the scaler
    pub fn as_source(&self) -> SourceImage<'_> {
        SourceImage {
            data: self.data,
            desc: self.desc,
        }
    }

    fn offset(&self, x: i32, y: i32) -> Option<usize> {
        if x < 0 || y < 0 || x >= self.desc.width as i32 || y >= self.desc.height as i32 {
            return None;
        }
        Some(y as usize * self.desc.stride + x as usize * self.desc.format.bytes_per_pixel())
    }

    /// Overwrite one pixel; out-of-bounds coordinates are ignored.
    pub fn set_pixel(&mut self, x: i32, y: i32, rgba: [u8; 4]) {
        if let Some(idx) = self.offset(x, y) {
            match self.desc.format {
                PixelFormat::Rgba8888 => self.data[idx..idx + 4].copy_from_slice(&rgba),
                PixelFormat::Rgb888 => self.data[idx..idx + 3].copy_from_slice(&rgba[..3]),
            }
        }
    }

    /// Pixel as RGBA; RGB frames report alpha 255.
    pub fn pixel(&self, x: i32, y: i32) -> Option<[u8; 4]> {
        let idx = self.offset(x, y)?;
        let px = &self.data[idx..];
        Some(match self.desc.format {
            PixelFormat::Rgba8888 => [px[0], px[1], px[2], px[3]],
            PixelFormat::Rgb888 => [px[0], px[1], px[2], 255],
        })
    }
}

/// Draw a one-pixel rectangle outline at `(x, y)` of size `width × height`.
///
/// Only the four edges are written; edges outside the frame are clipped.
pub fn draw_box(frame: &mut FrameView<'_>, x: i32, y: i32, width: i32, height: i32, rgba: [u8; 4]) {
    if width <= 0 || height <= 0 {
        return;
    }

    let frame_w = frame.width() as i32;
    let frame_h = frame.height() as i32;
    let (left, right) = (x, x + width - 1);
    let (top, bottom) = (y, y + height - 1);

    // Top & bottom
    for px in left.max(0)..=right.min(frame_w - 1) {
        frame.set_pixel(px, top, rgba);
        frame.set_pixel(px, bottom, rgba);
    }

    // Left & right
    for py in top.max(0)..=bottom.min(frame_h - 1) {
        frame.set_pixel(left, py, rgba);
        frame.set_pixel(right, py, rgba);
    }
}

/// Draw the outline of a detection rectangle
pub fn draw_rect(frame: &mut FrameView<'_>, rect: &BoxRect, rgba: [u8; 4]) {
    draw_box(frame, rect.left, rect.top, rect.width(), rect.height(), rgba);
}

#[cfg(test)]
mod tests {
    use super::*;

    const RED: [u8; 4] = [255, 0, 0, 255];

    fn rgba_frame(data: &mut [u8], width: u32, height: u32) -> FrameView<'_> {
        FrameView::new(data, ImageDesc::packed(width, height, PixelFormat::Rgba8888)).unwrap()
    }

    #[test]
    fn test_frame_view_rejects_short_buffer() {
        let mut data = vec![0u8; 10];
        assert!(FrameView::new(&mut data, ImageDesc::packed(4, 4, PixelFormat::Rgba8888)).is_none());
    }

    #[test]
    fn test_set_pixel_out_of_bounds_is_ignored() {
        let mut data = vec![0u8; 4 * 4 * 4];
        let mut frame = rgba_frame(&mut data, 4, 4);
        frame.set_pixel(-1, 0, RED);
        frame.set_pixel(4, 0, RED);
        frame.set_pixel(0, 4, RED);
        drop(frame);
        assert!(data.iter().all(|&b| b == 0));
    }

    #[test]
    fn test_box_clipped_at_frame_edge() {
        let mut data = vec![0u8; 8 * 8 * 4];
        let mut frame = rgba_frame(&mut data, 8, 8);
        draw_box(&mut frame, 5, 5, 10, 10, RED);

        assert_eq!(frame.pixel(5, 5), Some(RED));
        assert_eq!(frame.pixel(7, 5), Some(RED));
        assert_eq!(frame.pixel(5, 7), Some(RED));
        assert_eq!(frame.pixel(6, 6), Some([0, 0, 0, 0]));
    }

    #[test]
    fn test_rgb_frame_box() {
        let mut data = vec![0u8; 6 * 6 * 3];
        let mut frame =
            FrameView::new(&mut data, ImageDesc::packed(6, 6, PixelFormat::Rgb888)).unwrap();
        draw_box(&mut frame, 1, 1, 4, 4, RED);

        assert_eq!(frame.pixel(1, 1), Some(RED));
        assert_eq!(frame.pixel(4, 4), Some(RED));
        assert_eq!(frame.pixel(2, 2), Some([0, 0, 0, 255]));
    }
}
