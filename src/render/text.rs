//! Text rasterization.
//!
//! Uses cosmic-text for shaping and glyph rasterization:
//! - Proper text shaping (HarfBuzz-style, via rustybuzz)
//! - Unicode and color emoji (sticker glyphs are emoji)
//! - System font discovery with generic family fallback
//!
//! A run is rasterized once into its own RGBA layer with some padding around
//! it, so the painter can derive glow and outline passes from the same
//! coverage before compositing the fill.

use cosmic_text::{Attrs, Buffer, Color, Family, FontSystem, Metrics, Shaping, SwashCache, Weight};
use image::{Rgba, RgbaImage};
use std::sync::Mutex;

use super::scene::{FontFamily, TextStyle};

// Global font system (expensive to create, reuse across all renders)
lazy_static::lazy_static! {
    static ref FONT_SYSTEM: Mutex<FontSystem> = Mutex::new(FontSystem::new());
    static ref SWASH_CACHE: Mutex<SwashCache> = Mutex::new(SwashCache::new());
}

/// Line height as a multiple of the font size.
const LINE_HEIGHT: f32 = 1.2;

/// Rasterized single-line text run.
#[derive(Debug, Clone)]
pub struct TextRaster {
    /// Colored glyph layer, transparent elsewhere.
    pub layer: RgbaImage,
    /// Transparent border around the glyphs, in pixels.
    pub pad: u32,
    /// Advance width of the run (without padding).
    pub advance: f32,
    /// Baseline distance from the top of the unpadded line box.
    pub ascent: f32,
    /// Height of the unpadded line box.
    pub line_height: f32,
}

impl TextRaster {
    /// True when no glyph produced any coverage (e.g. no fonts installed).
    pub fn is_blank(&self) -> bool {
        self.layer.pixels().all(|p| p[3] == 0)
    }
}

/// Shape and rasterize `text` in `style`, leaving `pad` transparent pixels on
/// every side.
pub fn rasterize(text: &str, style: &TextStyle, pad: u32) -> TextRaster {
    let size = style.size.max(1.0);
    let line_height = size * LINE_HEIGHT;

    let mut font_system = FONT_SYSTEM.lock().unwrap_or_else(|e| e.into_inner());
    let mut swash_cache = SWASH_CACHE.lock().unwrap_or_else(|e| e.into_inner());

    let mut buffer = Buffer::new(&mut font_system, Metrics::new(size, line_height));
    // Unbounded width: captions and stickers are single-line
    buffer.set_size(&mut font_system, None, None);

    let family = match style.family {
        FontFamily::SansSerif => Family::SansSerif,
        FontFamily::Serif => Family::Serif,
        FontFamily::Monospace => Family::Monospace,
    };
    let mut attrs = Attrs::new().family(family);
    if style.bold {
        attrs = attrs.weight(Weight::BOLD);
    }
    buffer.set_text(&mut font_system, text, &attrs, Shaping::Advanced, None);
    buffer.shape_until_scroll(&mut font_system, false);

    let (advance, ascent) = buffer
        .layout_runs()
        .next()
        .map(|run| (run.line_w, run.line_y - run.line_top))
        .unwrap_or((0.0, size));

    let width = advance.ceil() as u32 + 2 * pad;
    let height = line_height.ceil() as u32 + 2 * pad;
    let mut layer = RgbaImage::new(width.max(1), height.max(1));

    let c = style.color;
    let text_color = Color::rgba(c[0], c[1], c[2], c[3]);

    buffer.draw(&mut font_system, &mut swash_cache, text_color, |x, y, w, h, color| {
        if color.a() == 0 {
            return;
        }
        let src = Rgba([color.r(), color.g(), color.b(), color.a()]);
        for dy in 0..h as i32 {
            for dx in 0..w as i32 {
                let px = x + dx + pad as i32;
                let py = y + dy + pad as i32;
                if px < 0 || py < 0 || px >= layer.width() as i32 || py >= layer.height() as i32 {
                    continue;
                }
                let dst = layer.get_pixel_mut(px as u32, py as u32);
                blend_over(dst, src);
            }
        }
    });

    TextRaster {
        layer,
        pad,
        advance,
        ascent,
        line_height,
    }
}

/// Source-over blend of straight-alpha RGBA.
pub(crate) fn blend_over(dst: &mut Rgba<u8>, src: Rgba<u8>) {
    let src_a = src[3] as f32 / 255.0;
    let dst_a = dst[3] as f32 / 255.0;
    let out_a = src_a + dst_a * (1.0 - src_a);
    if out_a <= 0.0 {
        return;
    }
    for i in 0..3 {
        let s = src[i] as f32 / 255.0;
        let d = dst[i] as f32 / 255.0;
        let out = (s * src_a + d * dst_a * (1.0 - src_a)) / out_a;
        dst[i] = (out.clamp(0.0, 1.0) * 255.0).round() as u8;
    }
    dst[3] = (out_a.clamp(0.0, 1.0) * 255.0).round() as u8;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::scene::WHITE;

    #[test]
    fn test_layer_has_padding() {
        let style = TextStyle::new(20.0, WHITE);
        let r = rasterize("Hi", &style, 6);
        assert_eq!(r.pad, 6);
        assert!(r.layer.height() >= (20.0 * LINE_HEIGHT) as u32 + 12);
        assert!(r.layer.width() >= 12);
    }

    #[test]
    fn test_empty_text_is_blank() {
        let r = rasterize("", &TextStyle::new(16.0, WHITE), 2);
        assert!(r.is_blank());
        assert_eq!(r.advance, 0.0);
    }

    #[test]
    fn test_blend_over_opaque_source_wins() {
        let mut dst = Rgba([10, 20, 30, 255]);
        blend_over(&mut dst, Rgba([200, 100, 0, 255]));
        assert_eq!(dst, Rgba([200, 100, 0, 255]));

        let mut clear = Rgba([0, 0, 0, 0]);
        blend_over(&mut clear, Rgba([0, 0, 0, 0]));
        assert_eq!(clear, Rgba([0, 0, 0, 0]));
    }
}
