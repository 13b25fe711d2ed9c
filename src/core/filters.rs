//! Live-preview filters drawn over the mirrored camera image.
//!
//! Detections arrive in detector (unmirrored) space and are flipped with
//! [`DetectionBox::mirrored`] before any geometry is derived from them.
//! Filters never touch captured frames: capture reads the unfiltered canvas.

use image::RgbaImage;
use log::trace;

use crate::entities::{DetectionBox, FilterSelection};
use crate::render::{
    hex, with_alpha, Baseline, Canvas, DrawOp, FontFamily, Rect, Stroke, TextAlign, TextOp, TextStyle, BLACK,
    WHITE,
};

use super::randomizer::Randomizer;

/// Orbit angle increment per rendered frame, in radians.
pub const ORBIT_STEP: f32 = 0.02;
pub const EXPLORER_LABEL: &str = "UNIVERSE-25";
pub const TICKET_TITLE: &str = "UNIVERSE TICKET";
pub const STAR_GLYPH: &str = "☆";

/// Per-frame filter overlay planner. Holds only the orbit accumulator.
#[derive(Clone, Debug, Default)]
pub struct FilterRenderer {
    orbit_angle: f32,
}

impl FilterRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn orbit_angle(&self) -> f32 {
        self.orbit_angle
    }

    /// Overlay ops for one displayed frame of `width x height`.
    pub fn render(
        &mut self,
        width: u32,
        height: u32,
        detections: &[DetectionBox],
        filter: FilterSelection,
    ) -> Vec<DrawOp> {
        let (w, h) = (width as f32, height as f32);
        let faces: Vec<DetectionBox> = detections.iter().map(|d| d.mirrored(w)).collect();
        let mut ops = Vec::new();

        match filter {
            FilterSelection::None => {}
            FilterSelection::FutureExplorer => {
                ops.push(DrawOp::FillRect {
                    rect: Rect::new(0.0, 0.0, w, h),
                    color: with_alpha(hex(0x7832C8), 0.15),
                });
                for face in &faces {
                    let (cx, cy) = face.center();
                    let size = face.max_side() * 1.4;
                    ops.push(DrawOp::Circle {
                        center: (cx, cy),
                        radius: size / 2.0,
                        fill: Some(with_alpha(hex(0x64C8FF), 0.2)),
                        stroke: Some(Stroke::new(hex(0xE0E0E0), size * 0.05)),
                    });
                    ops.push(DrawOp::Text(TextOp::new(
                        EXPLORER_LABEL,
                        cx,
                        cy + size / 2.0 + 20.0,
                        TextStyle::new(size * 0.1, hex(0x00FFCC))
                            .bold()
                            .align(TextAlign::Center),
                    )));
                }
            }
            FilterSelection::Constellation => {
                let mut centers = Vec::with_capacity(faces.len());
                for face in &faces {
                    let (cx, cy) = face.center();
                    centers.push((cx, cy));
                    ops.push(DrawOp::Text(TextOp::new(
                        STAR_GLYPH,
                        cx - 10.0,
                        cy,
                        TextStyle::new(face.width / 3.0, WHITE).family(FontFamily::Serif),
                    )));
                }
                if centers.len() > 1 {
                    ops.push(DrawOp::Polyline {
                        closed: centers.len() > 2,
                        points: centers,
                        stroke: Stroke::new(hex(0x00F0FF), 3.0),
                        dash: Some((10.0, 10.0)),
                    });
                }
            }
            FilterSelection::OrbitAura => {
                self.orbit_angle += ORBIT_STEP;
                let (cx, cy) = (w / 2.0, h / 2.0);
                ops.push(DrawOp::Vignette {
                    center: (cx, cy),
                    inner: w / 4.0,
                    outer: w,
                    color: with_alpha(hex(0xEC4899), 0.3),
                });
                ops.push(DrawOp::Circle {
                    center: (
                        cx + self.orbit_angle.cos() * w * 0.3,
                        cy + self.orbit_angle.sin() * h * 0.2,
                    ),
                    radius: 30.0,
                    fill: Some(hex(0x60A5FA)),
                    stroke: None,
                });
            }
            FilterSelection::Ticket => {
                let m = 40.0;
                ops.push(DrawOp::StrokeRect {
                    rect: Rect::new(m, m, w - m * 2.0, h - m * 2.0),
                    stroke: Stroke::new(WHITE, 10.0),
                });
                ops.push(DrawOp::Text(TextOp::new(
                    TICKET_TITLE,
                    w / 2.0,
                    h - 60.0,
                    TextStyle::new(48.0, hex(0xFDE047))
                        .bold()
                        .align(TextAlign::Center),
                )));
            }
        }

        trace!("FilterRenderer: {} faces, {:?} -> {} ops", faces.len(), filter, ops.len());
        ops
    }

    /// Filtered copy of the live canvas, with the randomizer card on top.
    pub fn apply(
        &mut self,
        live: &RgbaImage,
        detections: &[DetectionBox],
        filter: FilterSelection,
        randomizer: &Randomizer,
    ) -> RgbaImage {
        let (width, height) = live.dimensions();
        let mut ops = self.render(width, height, detections, filter);
        ops.extend(randomizer_card(width, randomizer));

        let mut canvas = Canvas::from_image(live.clone());
        canvas.paint(&ops);
        canvas.into_image()
    }
}

/// Result card shown at the top center while spinning or after a pick.
pub fn randomizer_card(width: u32, randomizer: &Randomizer) -> Vec<DrawOp> {
    if !randomizer.is_visible() {
        return Vec::new();
    }
    let (box_w, box_h) = (400.0, 150.0);
    let (x, y) = (width as f32 / 2.0, 100.0);
    let centered = |size: f32, color| {
        TextStyle::new(size, color)
            .align(TextAlign::Center)
            .baseline(Baseline::Middle)
    };

    let mut ops = vec![DrawOp::RoundedRect {
        rect: Rect::new(x - box_w / 2.0, y - box_h / 2.0, box_w, box_h),
        radius: 20.0,
        fill: WHITE,
        stroke: Some(Stroke::new(BLACK, 4.0)),
    }];
    match randomizer.current() {
        Some(item) => {
            ops.push(DrawOp::Text(TextOp::new(
                item.category.as_str(),
                x,
                y - 30.0,
                centered(20.0, BLACK).bold(),
            )));
            ops.push(DrawOp::Text(TextOp::new(
                item.text,
                x,
                y + 10.0,
                centered(30.0, hex(0x7C3AED)).bold(),
            )));
        }
        None => ops.push(DrawOp::Text(TextOp::new("Scanning...", x, y, centered(24.0, BLACK)))),
    }
    ops
}
