//! Collage compositor - turns a finished shot set into one flattened image.
//!
//! Two stages:
//! - `plan()` lays out the collage as a [`Scene`] (pure, no pixels touched)
//! - `compose()` plans and paints it with the CPU [`Canvas`]
//!
//! Geometry, for `cols x rows` cells of `bw x bh` pixels:
//! ```text
//! W = cols*bw + (cols-1)*GAP + 2*OUTER_PADDING
//! H = rows*bh + (rows-1)*GAP + 2*OUTER_PADDING + FOOTER_HEIGHT
//! ```
//! Paint order: background, frames with borders, overlay, stickers, footer,
//! caption. The date is an input so identical inputs always give identical
//! bytes.

use chrono::NaiveDate;
use image::RgbaImage;
use log::debug;

use crate::entities::{CapturedFrame, CollageLayout, Decoration, FrameOverlay, Sticker, StickerKind};
use crate::render::{
    hex, with_alpha, Baseline, Canvas, DrawOp, Rect, Scene, Stroke, TextAlign, TextOp, TextStyle, BLACK, WHITE,
};

pub const GAP: u32 = 20;
pub const OUTER_PADDING: u32 = 50;
pub const FOOTER_HEIGHT: u32 = 150;
/// Width of the white border around every frame, centered on the cell edge.
pub const BORDER_WIDTH: f32 = 10.0;
pub const DEFAULT_WATERMARK: &str = "UniVerse Expo 2025";

/// Composition contract violations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ComposeError {
    /// Frame count does not match the layout.
    FrameCount {
        layout: CollageLayout,
        expected: usize,
        actual: usize,
    },
    /// Frame does not share the size of the first frame.
    FrameSize {
        index: usize,
        expected: (u32, u32),
        actual: (u32, u32),
    },
    /// Zero-sized first frame.
    EmptyFrame,
}

impl std::fmt::Display for ComposeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ComposeError::FrameCount {
                layout,
                expected,
                actual,
            } => write!(f, "Layout {} needs {} frames, got {}", layout, expected, actual),
            ComposeError::FrameSize {
                index,
                expected,
                actual,
            } => write!(
                f,
                "Frame {} is {}x{}, expected {}x{}",
                index, actual.0, actual.1, expected.0, expected.1
            ),
            ComposeError::EmptyFrame => write!(f, "Frames have zero size"),
        }
    }
}

impl std::error::Error for ComposeError {}

/// Final canvas size for a layout with `bw x bh` frames.
pub fn canvas_size(layout: CollageLayout, bw: u32, bh: u32) -> (u32, u32) {
    let (cols, rows) = (layout.cols(), layout.rows());
    let w = cols * bw + (cols - 1) * GAP + 2 * OUTER_PADDING;
    let h = rows * bh + (rows - 1) * GAP + 2 * OUTER_PADDING + FOOTER_HEIGHT;
    (w, h)
}

/// Top-left pixel of the i-th frame cell.
pub fn cell_origin(layout: CollageLayout, index: usize, bw: u32, bh: u32) -> (u32, u32) {
    let (col, row) = layout.cell(index);
    (
        OUTER_PADDING + col * (bw + GAP),
        OUTER_PADDING + row * (bh + GAP),
    )
}

/// Footer date text, e.g. `17 Oct 2026`.
pub fn format_date(date: NaiveDate) -> String {
    date.format("%-d %b %Y").to_string()
}

/// Stateless collage renderer. Only the watermark text is configurable.
#[derive(Clone, Debug)]
pub struct Compositor {
    watermark: String,
}

impl Default for Compositor {
    fn default() -> Self {
        Self::new(DEFAULT_WATERMARK)
    }
}

impl Compositor {
    pub fn new(watermark: impl Into<String>) -> Self {
        Self {
            watermark: watermark.into(),
        }
    }

    pub fn watermark(&self) -> &str {
        &self.watermark
    }

    /// Lay out the collage without painting it.
    pub fn plan(
        &self,
        frames: &[CapturedFrame],
        layout: CollageLayout,
        decoration: &Decoration,
        date: NaiveDate,
    ) -> Result<Scene, ComposeError> {
        let (bw, bh) = validate(frames, layout)?;
        let (w, h) = canvas_size(layout, bw, bh);
        debug!(
            "Compositor::plan layout={} frames={} base={}x{} canvas={}x{} stickers={}",
            layout,
            frames.len(),
            bw,
            bh,
            w,
            h,
            decoration.stickers.len()
        );

        let mut scene = Scene::new(w, h);
        scene.push(DrawOp::FillRect {
            rect: Rect::new(0.0, 0.0, w as f32, h as f32),
            color: hex(0x050505),
        });

        for (i, frame) in frames.iter().enumerate() {
            let (x, y) = cell_origin(layout, i, bw, bh);
            scene.push(DrawOp::Image {
                frame: frame.clone(),
                x: x as i64,
                y: y as i64,
            });
            scene.push(DrawOp::StrokeRect {
                rect: Rect::new(x as f32, y as f32, bw as f32, bh as f32),
                stroke: Stroke::new(WHITE, BORDER_WIDTH),
            });
        }

        plan_overlay(&mut scene, decoration.overlay);

        for sticker in decoration.stickers.iter() {
            plan_sticker(&mut scene, sticker);
        }

        self.plan_footer(&mut scene, date);

        if let Some(text) = decoration.caption.visible_text() {
            let (wf, hf) = (w as f32, h as f32);
            let size = (wf * 0.05).floor();
            scene.text(
                TextOp::new(
                    text,
                    wf / 2.0,
                    hf - 100.0,
                    TextStyle::new(size, WHITE)
                        .bold()
                        .align(TextAlign::Center)
                        .baseline(Baseline::Bottom),
                )
                .glow(hex(0x00FFFF), 20.0),
            );
        }

        Ok(scene)
    }

    /// Plan and paint the collage.
    pub fn compose(
        &self,
        frames: &[CapturedFrame],
        layout: CollageLayout,
        decoration: &Decoration,
        date: NaiveDate,
    ) -> Result<RgbaImage, ComposeError> {
        let scene = self.plan(frames, layout, decoration, date)?;
        Ok(Canvas::render(&scene))
    }

    fn plan_footer(&self, scene: &mut Scene, date: NaiveDate) {
        let (w, h) = (scene.width as f32, scene.height as f32);
        let size = (w * 0.04).floor();
        let glow = hex(0xD946EF);

        scene.text(
            TextOp::new(
                self.watermark.as_str(),
                w - OUTER_PADDING as f32,
                h - 50.0,
                TextStyle::new(size, WHITE).bold().align(TextAlign::Right),
            )
            .glow(glow, 15.0),
        );
        scene.text(
            TextOp::new(
                format_date(date),
                OUTER_PADDING as f32,
                h - 50.0,
                TextStyle::new((size * 0.6).floor(), WHITE),
            )
            .glow(glow, 15.0),
        );
    }
}

fn validate(frames: &[CapturedFrame], layout: CollageLayout) -> Result<(u32, u32), ComposeError> {
    if frames.len() != layout.shots() {
        return Err(ComposeError::FrameCount {
            layout,
            expected: layout.shots(),
            actual: frames.len(),
        });
    }
    // shots() >= 1 for every layout, so frames[0] exists here
    let base = frames[0].dimensions();
    if base.0 == 0 || base.1 == 0 {
        return Err(ComposeError::EmptyFrame);
    }
    for (index, frame) in frames.iter().enumerate().skip(1) {
        if frame.dimensions() != base {
            return Err(ComposeError::FrameSize {
                index,
                expected: base,
                actual: frame.dimensions(),
            });
        }
    }
    Ok(base)
}

fn plan_overlay(scene: &mut Scene, overlay: FrameOverlay) {
    let (w, h) = (scene.width as f32, scene.height as f32);
    match overlay {
        FrameOverlay::None => {}
        FrameOverlay::Cockpit => {
            let line = Stroke::new(with_alpha(hex(0x00FFFF), 0.7), 5.0);
            let s = 100.0;
            let brackets = [
                [(0.0, s), (0.0, 0.0), (s, 0.0)],
                [(w - s, 0.0), (w, 0.0), (w, s)],
                [(0.0, h - s), (0.0, h), (s, h)],
                [(w - s, h), (w, h), (w, h - s)],
            ];
            for points in brackets {
                scene.push(DrawOp::Polyline {
                    points: points.to_vec(),
                    stroke: line,
                    dash: None,
                    closed: false,
                });
            }
            let (cx, cy) = (w / 2.0, h / 2.0);
            for points in [[(cx - 20.0, cy), (cx + 20.0, cy)], [(cx, cy - 20.0), (cx, cy + 20.0)]] {
                scene.push(DrawOp::Polyline {
                    points: points.to_vec(),
                    stroke: line,
                    dash: None,
                    closed: false,
                });
            }

            let hud = TextStyle::new(24.0, with_alpha(hex(0x00FFFF), 0.8));
            scene.text(TextOp::new("SYS: ONLINE", 40.0, 40.0, hud));
            scene.text(TextOp::new("TARGET: FUTURE", w - 240.0, 40.0, hud));
        }
        FrameOverlay::Magazine => {
            let shadow = with_alpha(BLACK, 0.5);
            let centered = |size: f32, color| TextStyle::new(size, color).bold().align(TextAlign::Center);

            scene.text(TextOp::new("UNIVERSE", w / 2.0, 140.0, centered(120.0, hex(0xE11D48))).glow(shadow, 10.0));
            scene.text(TextOp::new("MAGAZINE", w / 2.0, 180.0, centered(40.0, WHITE)).glow(shadow, 10.0));
            scene.text(
                TextOp::new("STUDENT", 50.0, h - 150.0, TextStyle::new(60.0, hex(0xFBBF24)).bold()).glow(shadow, 10.0),
            );
            scene.text(TextOp::new("OF THE YEAR", 50.0, h - 90.0, TextStyle::new(60.0, WHITE).bold()).glow(shadow, 10.0));
            scene.push(DrawOp::FillRect {
                rect: Rect::new(w - 200.0, h - 120.0, 150.0, 80.0),
                color: WHITE,
            });
        }
    }
}

fn plan_sticker(scene: &mut Scene, sticker: &Sticker) {
    let (w, h) = (scene.width as f32, scene.height as f32);
    let size = w * sticker.scale;
    let style = TextStyle::new(size, WHITE)
        .align(TextAlign::Center)
        .baseline(Baseline::Middle);
    let (x, y) = (sticker.x * w, sticker.y * h);
    let op = match sticker.kind() {
        StickerKind::Label => {
            let style = TextStyle {
                color: hex(0x00FFCC),
                ..style
            };
            TextOp::new(&sticker.tag, x, y, style.bold()).outline(BLACK, 4.0)
        }
        StickerKind::Glyph => TextOp::new(&sticker.tag, x, y, style),
    };
    scene.text(op.glow(with_alpha(BLACK, 0.5), 10.0));
}
