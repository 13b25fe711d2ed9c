//! Display list shared by the compositor and the preview filters.
//!
//! Rendering is split in two steps:
//! 1. **Planning** builds a `Scene`: canvas size plus an ordered list of
//!    `DrawOp`s. Planning is pure and cheap, so it is what most tests inspect
//!    (where did the caption go, which stickers were drawn, in which order).
//! 2. **Painting** rasterizes the scene onto a [`Canvas`](super::Canvas).
//!
//! Ops are painted in list order, later ops on top, like a 2D canvas context.

use image::Rgba;

use crate::entities::CapturedFrame;

/// Build an opaque color from `0xRRGGBB`.
pub const fn hex(rgb: u32) -> Rgba<u8> {
    Rgba([(rgb >> 16) as u8, (rgb >> 8) as u8, rgb as u8, 255])
}

/// Same color with a fractional alpha (0.0..=1.0).
pub fn with_alpha(color: Rgba<u8>, alpha: f32) -> Rgba<u8> {
    let a = (alpha.clamp(0.0, 1.0) * 255.0).round() as u8;
    Rgba([color[0], color[1], color[2], a])
}

pub const WHITE: Rgba<u8> = hex(0xFFFFFF);
pub const BLACK: Rgba<u8> = hex(0x000000);

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

impl Rect {
    pub const fn new(x: f32, y: f32, w: f32, h: f32) -> Self {
        Self { x, y, w, h }
    }

    pub fn contains(&self, px: f32, py: f32) -> bool {
        px >= self.x && py >= self.y && px < self.x + self.w && py < self.y + self.h
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Stroke {
    pub color: Rgba<u8>,
    pub width: f32,
}

impl Stroke {
    pub const fn new(color: Rgba<u8>, width: f32) -> Self {
        Self { color, width }
    }
}

/// Horizontal anchor of a text run relative to its `x`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum TextAlign {
    #[default]
    Left,
    Center,
    Right,
}

/// Vertical anchor of a text run relative to its `y`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Baseline {
    #[default]
    Alphabetic,
    Middle,
    Bottom,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum FontFamily {
    #[default]
    SansSerif,
    Serif,
    Monospace,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TextStyle {
    pub size: f32,
    pub color: Rgba<u8>,
    pub align: TextAlign,
    pub baseline: Baseline,
    pub bold: bool,
    pub family: FontFamily,
}

impl TextStyle {
    pub fn new(size: f32, color: Rgba<u8>) -> Self {
        Self {
            size,
            color,
            align: TextAlign::Left,
            baseline: Baseline::Alphabetic,
            bold: false,
            family: FontFamily::SansSerif,
        }
    }

    pub fn align(mut self, align: TextAlign) -> Self {
        self.align = align;
        self
    }

    pub fn baseline(mut self, baseline: Baseline) -> Self {
        self.baseline = baseline;
        self
    }

    pub fn bold(mut self) -> Self {
        self.bold = true;
        self
    }

    pub fn family(mut self, family: FontFamily) -> Self {
        self.family = family;
        self
    }
}

/// Blurred, unoffset halo behind a text run (drop shadow or glow).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Glow {
    pub color: Rgba<u8>,
    pub blur: f32,
}

#[derive(Clone, Debug, PartialEq)]
pub struct TextOp {
    pub text: String,
    pub x: f32,
    pub y: f32,
    pub style: TextStyle,
    pub glow: Option<Glow>,
    /// Stroked under the fill.
    pub outline: Option<Stroke>,
}

impl TextOp {
    pub fn new(text: impl Into<String>, x: f32, y: f32, style: TextStyle) -> Self {
        Self {
            text: text.into(),
            x,
            y,
            style,
            glow: None,
            outline: None,
        }
    }

    pub fn glow(mut self, color: Rgba<u8>, blur: f32) -> Self {
        self.glow = Some(Glow { color, blur });
        self
    }

    pub fn outline(mut self, color: Rgba<u8>, width: f32) -> Self {
        self.outline = Some(Stroke::new(color, width));
        self
    }
}

#[derive(Clone, Debug)]
pub enum DrawOp {
    FillRect {
        rect: Rect,
        color: Rgba<u8>,
    },
    /// Stroke centered on the rectangle edge, like a canvas `strokeRect`.
    StrokeRect {
        rect: Rect,
        stroke: Stroke,
    },
    RoundedRect {
        rect: Rect,
        radius: f32,
        fill: Rgba<u8>,
        stroke: Option<Stroke>,
    },
    Image {
        frame: CapturedFrame,
        x: i64,
        y: i64,
    },
    Circle {
        center: (f32, f32),
        radius: f32,
        fill: Option<Rgba<u8>>,
        stroke: Option<Stroke>,
    },
    Polyline {
        points: Vec<(f32, f32)>,
        stroke: Stroke,
        /// (on, off) lengths in pixels.
        dash: Option<(f32, f32)>,
        closed: bool,
    },
    /// Radial gradient from transparent at `inner` to `color` at `outer`.
    Vignette {
        center: (f32, f32),
        inner: f32,
        outer: f32,
        color: Rgba<u8>,
    },
    Text(TextOp),
}

/// Sized, ordered list of draw operations.
#[derive(Clone, Debug)]
pub struct Scene {
    pub width: u32,
    pub height: u32,
    pub ops: Vec<DrawOp>,
}

impl Scene {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            ops: Vec::new(),
        }
    }

    pub fn push(&mut self, op: DrawOp) {
        self.ops.push(op);
    }

    pub fn text(&mut self, op: TextOp) {
        self.ops.push(DrawOp::Text(op));
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// All text runs, in paint order.
    pub fn texts(&self) -> impl Iterator<Item = &TextOp> {
        self.ops.iter().filter_map(|op| match op {
            DrawOp::Text(t) => Some(t),
            _ => None,
        })
    }

    pub fn find_text(&self, text: &str) -> Option<&TextOp> {
        self.texts().find(|t| t.text == text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_and_alpha() {
        assert_eq!(hex(0x00FFCC), Rgba([0, 255, 204, 255]));
        assert_eq!(with_alpha(WHITE, 0.5), Rgba([255, 255, 255, 128]));
        assert_eq!(with_alpha(WHITE, 3.0)[3], 255);
    }

    #[test]
    fn test_scene_text_lookup() {
        let mut scene = Scene::new(10, 10);
        scene.push(DrawOp::FillRect {
            rect: Rect::new(0.0, 0.0, 10.0, 10.0),
            color: BLACK,
        });
        scene.text(TextOp::new("hi", 1.0, 2.0, TextStyle::new(12.0, WHITE)));
        assert_eq!(scene.len(), 2);
        assert_eq!(scene.texts().count(), 1);
        assert_eq!(scene.find_text("hi").map(|t| (t.x, t.y)), Some((1.0, 2.0)));
        assert!(scene.find_text("nope").is_none());
    }
}
