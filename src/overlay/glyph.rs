//! Text labels burned into the frame with `rusttype`

use std::path::Path;

use once_cell::sync::OnceCell;
use rusttype::{point, Font, Scale};
use tracing::{debug, warn};

use super::FrameView;

/// Label em size in pixels
pub const LABEL_PIXEL_SIZE: f32 = 24.0;

/// One rasterised glyph.
///
/// `left` is the offset from the pen to the first column; `top` is the
/// distance from the baseline up to the first row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlyphBitmap {
    pub left: i32,
    pub top: i32,
    pub width: u32,
    pub rows: u32,
    /// Row-major coverage, `width * rows` bytes
    pub pixels: Vec<u8>,
}

/// Copy a glyph's coverage into the frame at `(pen_x + left, pen_y - top)`.
///
/// Coverage is written as grey into every colour channel with alpha 255;
/// pixels outside the frame are skipped.
pub fn blit_glyph(frame: &mut FrameView<'_>, pen_x: i32, pen_y: i32, glyph: &GlyphBitmap) {
    let origin_x = pen_x + glyph.left;
    let origin_y = pen_y - glyph.top;

    for row in 0..glyph.rows {
        let y = origin_y + row as i32;
        if y < 0 || y >= frame.height() as i32 {
            continue;
        }
        for col in 0..glyph.width {
            let x = origin_x + col as i32;
            if x < 0 || x >= frame.width() as i32 {
                continue;
            }
            let Some(&value) = glyph.pixels.get((row * glyph.width + col) as usize) else {
                continue;
            };
            frame.set_pixel(x, y, [value, value, value, 255]);
        }
    }
}

/// Scale whose em square is `pixel_size` pixels tall.
///
/// rusttype sizes a font by ascent minus descent, so the em size has to be
/// converted through the face's unscaled vertical metrics.
pub fn em_scale(pixel_size: f32, units_per_em: u16, ascent: f32, descent: f32) -> Scale {
    let height = ascent - descent;
    if units_per_em == 0 || height <= 0.0 {
        return Scale::uniform(pixel_size);
    }
    Scale::uniform(pixel_size * height / f32::from(units_per_em))
}

/// Lazily loaded typeface shared by every label draw.
///
/// The first `draw` loads the font; a failed load disables text for the
/// rest of the process.
#[derive(Default)]
pub struct GlyphOverlay {
    font: OnceCell<Option<Font<'static>>>,
}

impl GlyphOverlay {
    pub fn new() -> Self {
        Self::default()
    }

    fn font(&self, font_path: &Path) -> Option<&Font<'static>> {
        self.font
            .get_or_init(|| match load_font(font_path) {
                Ok(font) => {
                    debug!("Loaded label font {}", font_path.display());
                    Some(font)
                }
                Err(reason) => {
                    warn!(
                        "Label font {} unavailable, text disabled: {}",
                        font_path.display(),
                        reason
                    );
                    None
                }
            })
            .as_ref()
    }

    /// `true` once a font load has been attempted and failed
    pub fn is_disabled(&self) -> bool {
        matches!(self.font.get(), Some(None))
    }

    /// Rasterise `text` one character at a time, pen starting at `(x, y)`.
    pub fn draw(&self, frame: &mut FrameView<'_>, font_path: &Path, text: &str, x: i32, y: i32) {
        let Some(font) = self.font(font_path) else {
            return;
        };
        let metrics = font.v_metrics_unscaled();
        let scale = em_scale(
            LABEL_PIXEL_SIZE,
            font.units_per_em(),
            metrics.ascent,
            metrics.descent,
        );

        let mut pen_x = x;
        for ch in text.chars() {
            let scaled = font.glyph(ch).scaled(scale);
            let advance = scaled.h_metrics().advance_width.floor() as i32;
            let positioned = scaled.positioned(point(0.0, 0.0));

            if let Some(bb) = positioned.pixel_bounding_box() {
                let width = bb.width().max(0) as u32;
                let rows = bb.height().max(0) as u32;
                let mut pixels = vec![0u8; (width * rows) as usize];
                positioned.draw(|gx, gy, coverage| {
                    if let Some(px) = pixels.get_mut((gy * width + gx) as usize) {
                        *px = (coverage * 255.0).round().clamp(0.0, 255.0) as u8;
                    }
                });
                let bitmap = GlyphBitmap {
                    left: bb.min.x,
                    top: -bb.min.y,
                    width,
                    rows,
                    pixels,
                };
                blit_glyph(frame, pen_x, y, &bitmap);
            }

            pen_x += advance;
        }
    }
}

fn load_font(path: &Path) -> Result<Font<'static>, String> {
    let bytes = std::fs::read(path).map_err(|e| e.to_string())?;
    // face 0 so .ttc collections load too
    Font::try_from_vec_and_index(bytes, 0).ok_or_else(|| "not a usable font face".to_string())
}
