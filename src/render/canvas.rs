//! CPU painter for [`Scene`] display lists.
//!
//! All drawing is straight-alpha source-over on an RGBA8 buffer, rounded so
//! an opaque backdrop stays opaque. Geometry primitives go through imageproc
//! on an [`OverBlend`] view; per-pixel passes
//! (vignette, rings) run row-parallel with rayon. Painting is deterministic:
//! the same scene always yields the same bytes.

use image::{Pixel, Rgba, RgbaImage};
use imageproc::drawing::{self, Canvas as DrawTarget};
use imageproc::point::Point;
use log::trace;
use rayon::prelude::*;

use super::scene::{Baseline, DrawOp, Rect, Scene, Stroke, TextAlign, TextOp};
use super::text::{self, blend_over};

/// Owned RGBA surface with 2D-canvas-like drawing operations.
#[derive(Clone, Debug)]
pub struct Canvas {
    image: RgbaImage,
}

impl Canvas {
    /// Transparent canvas.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            image: RgbaImage::new(width, height),
        }
    }

    /// Canvas initialized with an existing image (e.g. a live frame).
    pub fn from_image(image: RgbaImage) -> Self {
        Self { image }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    pub fn into_image(self) -> RgbaImage {
        self.image
    }

    /// Paint a whole scene onto a fresh transparent canvas of the scene size.
    pub fn render(scene: &Scene) -> RgbaImage {
        let mut canvas = Canvas::new(scene.width, scene.height);
        canvas.paint(&scene.ops);
        canvas.into_image()
    }

    /// Paint ops in order, later ops on top.
    pub fn paint(&mut self, ops: &[DrawOp]) {
        trace!("Canvas::paint {} ops on {}x{}", ops.len(), self.width(), self.height());
        for op in ops {
            match op {
                DrawOp::FillRect { rect, color } => self.fill_rect(*rect, *color),
                DrawOp::StrokeRect { rect, stroke } => self.stroke_rect(*rect, *stroke),
                DrawOp::RoundedRect {
                    rect,
                    radius,
                    fill,
                    stroke,
                } => self.rounded_rect(*rect, *radius, *fill, *stroke),
                DrawOp::Image { frame, x, y } => self.overlay(frame.image(), *x, *y),
                DrawOp::Circle {
                    center,
                    radius,
                    fill,
                    stroke,
                } => {
                    if let Some(color) = fill {
                        self.fill_circle(*center, *radius, *color);
                    }
                    if let Some(stroke) = stroke {
                        self.ring(*center, *radius, *stroke);
                    }
                }
                DrawOp::Polyline {
                    points,
                    stroke,
                    dash,
                    closed,
                } => self.polyline(points, *stroke, *dash, *closed),
                DrawOp::Vignette {
                    center,
                    inner,
                    outer,
                    color,
                } => self.vignette(*center, *inner, *outer, *color),
                DrawOp::Text(t) => self.text(t),
            }
        }
    }

    // === Primitives ===

    /// Run imageproc drawing calls against a blending view of the buffer.
    fn blended<F: FnOnce(&mut OverBlend<'_>)>(&mut self, f: F) {
        f(&mut OverBlend(&mut self.image));
    }

    /// Source-over `layer` with its top-left corner at (`x`, `y`), clipped.
    pub fn overlay(&mut self, layer: &RgbaImage, x: i64, y: i64) {
        let (w, h) = (self.width() as i64, self.height() as i64);
        let x0 = x.max(0);
        let y0 = y.max(0);
        let x1 = (x + layer.width() as i64).min(w);
        let y1 = (y + layer.height() as i64).min(h);
        for dy in y0..y1 {
            for dx in x0..x1 {
                let src = *layer.get_pixel((dx - x) as u32, (dy - y) as u32);
                if src[3] == 0 {
                    continue;
                }
                blend_over(self.image.get_pixel_mut(dx as u32, dy as u32), src);
            }
        }
    }

    pub fn fill_rect(&mut self, rect: Rect, color: Rgba<u8>) {
        let x0 = rect.x.round().max(0.0) as u32;
        let y0 = rect.y.round().max(0.0) as u32;
        let x1 = ((rect.x + rect.w).round().max(0.0) as u32).min(self.width());
        let y1 = ((rect.y + rect.h).round().max(0.0) as u32).min(self.height());
        if x0 >= x1 || y0 >= y1 {
            return;
        }

        if color[3] == 255 {
            for y in y0..y1 {
                for x in x0..x1 {
                    self.image.put_pixel(x, y, color);
                }
            }
        } else {
            for y in y0..y1 {
                for x in x0..x1 {
                    blend_over(self.image.get_pixel_mut(x, y), color);
                }
            }
        }
    }

    /// Stroke centered on the rectangle edge: half the width falls inside.
    pub fn stroke_rect(&mut self, rect: Rect, stroke: Stroke) {
        let half = stroke.width / 2.0;
        let w = stroke.width;
        let outer = Rect::new(rect.x - half, rect.y - half, rect.w + w, rect.h + w);
        // Top and bottom bars span the full outer width, sides fill between them
        self.fill_rect(Rect::new(outer.x, outer.y, outer.w, w), stroke.color);
        self.fill_rect(Rect::new(outer.x, outer.y + outer.h - w, outer.w, w), stroke.color);
        self.fill_rect(Rect::new(outer.x, outer.y + w, w, outer.h - 2.0 * w), stroke.color);
        self.fill_rect(
            Rect::new(outer.x + outer.w - w, outer.y + w, w, outer.h - 2.0 * w),
            stroke.color,
        );
    }

    pub fn fill_circle(&mut self, center: (f32, f32), radius: f32, color: Rgba<u8>) {
        let c = (center.0.round() as i32, center.1.round() as i32);
        let r = radius.round().max(0.0) as i32;
        self.blended(|layer| drawing::draw_filled_circle_mut(layer, c, r, color));
    }

    /// Annulus of `stroke.width` centered on the circle outline.
    pub fn ring(&mut self, center: (f32, f32), radius: f32, stroke: Stroke) {
        let inner = (radius - stroke.width / 2.0).max(0.0);
        let outer = radius + stroke.width / 2.0;
        self.radial_pass(center, outer, |d| {
            if d >= inner && d <= outer {
                Some(stroke.color)
            } else {
                None
            }
        });
    }

    fn vignette(&mut self, center: (f32, f32), inner: f32, outer: f32, color: Rgba<u8>) {
        let span = (outer - inner).max(f32::EPSILON);
        let base_alpha = color[3] as f32 / 255.0;
        let (w, h) = (self.width() as f32, self.height() as f32);
        // Covers the whole frame, so scan every row
        let reach = (w * w + h * h).sqrt();
        self.radial_pass(center, reach, |d| {
            let t = ((d - inner) / span).clamp(0.0, 1.0);
            if t <= 0.0 {
                return None;
            }
            let a = (base_alpha * t * 255.0).round() as u8;
            Some(Rgba([color[0], color[1], color[2], a]))
        });
    }

    /// Blend `shade(distance)` into every pixel within `reach` of `center`.
    fn radial_pass<F>(&mut self, center: (f32, f32), reach: f32, shade: F)
    where
        F: Fn(f32) -> Option<Rgba<u8>> + Sync,
    {
        let width = self.width() as usize;
        let height = self.height() as i64;
        let y0 = ((center.1 - reach).floor() as i64).clamp(0, height) as usize;
        let y1 = ((center.1 + reach).ceil() as i64 + 1).clamp(0, height) as usize;
        if y0 >= y1 || width == 0 {
            return;
        }

        let stride = width * 4;
        let rows = &mut self.image.as_mut()[y0 * stride..y1 * stride];
        rows.par_chunks_mut(stride).enumerate().for_each(|(i, row)| {
            let py = (y0 + i) as f32 + 0.5;
            for x in 0..width {
                let px = x as f32 + 0.5;
                let d = ((px - center.0).powi(2) + (py - center.1).powi(2)).sqrt();
                if d > reach {
                    continue;
                }
                if let Some(src) = shade(d) {
                    let idx = x * 4;
                    let dst = Rgba::from_slice_mut(&mut row[idx..idx + 4]);
                    blend_over(dst, src);
                }
            }
        });
    }

    fn rounded_rect(&mut self, rect: Rect, radius: f32, fill: Rgba<u8>, stroke: Option<Stroke>) {
        let r = radius.min(rect.w / 2.0).min(rect.h / 2.0).max(0.0);
        let edge = stroke.map(|s| s.width / 2.0).unwrap_or(0.0);
        let x0 = (rect.x - edge).floor().max(0.0) as u32;
        let y0 = (rect.y - edge).floor().max(0.0) as u32;
        let x1 = ((rect.x + rect.w + edge).ceil().max(0.0) as u32).min(self.width());
        let y1 = ((rect.y + rect.h + edge).ceil().max(0.0) as u32).min(self.height());

        // Signed distance to the rounded rectangle outline (negative inside)
        let sdf = |px: f32, py: f32| -> f32 {
            let cx = rect.x + rect.w / 2.0;
            let cy = rect.y + rect.h / 2.0;
            let qx = (px - cx).abs() - (rect.w / 2.0 - r);
            let qy = (py - cy).abs() - (rect.h / 2.0 - r);
            let outside = (qx.max(0.0).powi(2) + qy.max(0.0).powi(2)).sqrt();
            outside + qx.max(qy).min(0.0) - r
        };

        for y in y0..y1 {
            for x in x0..x1 {
                let d = sdf(x as f32 + 0.5, y as f32 + 0.5);
                let px = self.image.get_pixel_mut(x, y);
                if d <= 0.0 {
                    blend_over(px, fill);
                }
                if let Some(s) = stroke {
                    if d.abs() <= s.width / 2.0 {
                        blend_over(px, s.color);
                    }
                }
            }
        }
    }

    pub fn polyline(&mut self, points: &[(f32, f32)], stroke: Stroke, dash: Option<(f32, f32)>, closed: bool) {
        if points.len() < 2 {
            return;
        }
        let mut path: Vec<(f32, f32)> = points.to_vec();
        if closed {
            path.push(points[0]);
        }

        let segments: Vec<((f32, f32), (f32, f32))> = match dash {
            None => path.windows(2).map(|w| (w[0], w[1])).collect(),
            Some((on, off)) => dash_path(&path, on, off),
        };
        for (a, b) in segments {
            self.thick_segment(a, b, stroke);
        }
    }

    /// Segment of `stroke.width` drawn as a filled quad.
    fn thick_segment(&mut self, a: (f32, f32), b: (f32, f32), stroke: Stroke) {
        let (dx, dy) = (b.0 - a.0, b.1 - a.1);
        let len = (dx * dx + dy * dy).sqrt();
        if len < 0.5 {
            return;
        }
        if stroke.width <= 1.5 {
            self.blended(|layer| drawing::draw_line_segment_mut(layer, a, b, stroke.color));
            return;
        }

        let (nx, ny) = (-dy / len * stroke.width / 2.0, dx / len * stroke.width / 2.0);
        let quad = [
            Point::new((a.0 + nx).round() as i32, (a.1 + ny).round() as i32),
            Point::new((b.0 + nx).round() as i32, (b.1 + ny).round() as i32),
            Point::new((b.0 - nx).round() as i32, (b.1 - ny).round() as i32),
            Point::new((a.0 - nx).round() as i32, (a.1 - ny).round() as i32),
        ];
        // imageproc rejects polygons whose first and last points coincide
        if quad[0] == quad[3] || quad[1] == quad[2] {
            self.blended(|layer| drawing::draw_line_segment_mut(layer, a, b, stroke.color));
            return;
        }
        self.blended(|layer| drawing::draw_polygon_mut(layer, &quad, stroke.color));
    }

    // === Text ===

    fn text(&mut self, op: &TextOp) {
        let glow_pad = op.glow.map(|g| (g.blur * 2.0).ceil() as u32).unwrap_or(0);
        let outline_pad = op.outline.map(|s| s.width.ceil() as u32).unwrap_or(0);
        let pad = glow_pad.max(outline_pad) + 2;

        let raster = text::rasterize(&op.text, &op.style, pad);
        if raster.is_blank() {
            trace!("Text '{}' produced no coverage, skipping", op.text);
            return;
        }

        let left = match op.style.align {
            TextAlign::Left => op.x,
            TextAlign::Center => op.x - raster.advance / 2.0,
            TextAlign::Right => op.x - raster.advance,
        };
        let top = match op.style.baseline {
            Baseline::Alphabetic => op.y - raster.ascent,
            Baseline::Middle => op.y - raster.line_height / 2.0,
            Baseline::Bottom => op.y - raster.line_height,
        };
        let ox = (left - pad as f32).round() as i64;
        let oy = (top - pad as f32).round() as i64;

        if let Some(glow) = op.glow {
            let halo = tinted(&raster.layer, glow.color);
            // Canvas shadowBlur maps to roughly twice the gaussian sigma
            let halo = image::imageops::blur(&halo, (glow.blur / 2.0).max(0.5));
            self.overlay(&halo, ox, oy);
        }

        if let Some(outline) = op.outline {
            let ink = tinted(&raster.layer, outline.color);
            let r = (outline.width / 2.0).max(1.0).round() as i64;
            for dy in -r..=r {
                for dx in -r..=r {
                    if dx * dx + dy * dy > r * r || (dx == 0 && dy == 0) {
                        continue;
                    }
                    self.overlay(&ink, ox + dx, oy + dy);
                }
            }
        }

        self.overlay(&raster.layer, ox, oy);
    }
}

/// imageproc target that source-over blends every drawn pixel.
struct OverBlend<'a>(&'a mut RgbaImage);

impl DrawTarget for OverBlend<'_> {
    type Pixel = Rgba<u8>;

    fn dimensions(&self) -> (u32, u32) {
        self.0.dimensions()
    }

    fn get_pixel(&self, x: u32, y: u32) -> Rgba<u8> {
        *self.0.get_pixel(x, y)
    }

    fn draw_pixel(&mut self, x: u32, y: u32, color: Rgba<u8>) {
        blend_over(self.0.get_pixel_mut(x, y), color);
    }
}

/// Same coverage as `layer`, recolored to `color` (alpha multiplied).
fn tinted(layer: &RgbaImage, color: Rgba<u8>) -> RgbaImage {
    let mut out = RgbaImage::new(layer.width(), layer.height());
    for (src, dst) in layer.pixels().zip(out.pixels_mut()) {
        let a = (src[3] as u16 * color[3] as u16 / 255) as u8;
        *dst = Rgba([color[0], color[1], color[2], a]);
    }
    out
}

/// Split a polyline into "on" dash segments, carrying the pattern phase
/// across vertices like a canvas line dash.
fn dash_path(path: &[(f32, f32)], on: f32, off: f32) -> Vec<((f32, f32), (f32, f32))> {
    let period = on + off;
    let mut out = Vec::new();
    if on <= 0.0 || period <= 0.0 {
        return out;
    }

    let mut phase = 0.0f32;
    for w in path.windows(2) {
        let (a, b) = (w[0], w[1]);
        let len = ((b.0 - a.0).powi(2) + (b.1 - a.1).powi(2)).sqrt();
        if len <= 0.0 {
            continue;
        }
        let at = |t: f32| (a.0 + (b.0 - a.0) * t / len, a.1 + (b.1 - a.1) * t / len);

        let mut t = 0.0f32;
        while t < len {
            let in_period = phase % period;
            if in_period < on {
                let run = (on - in_period).min(len - t);
                out.push((at(t), at(t + run)));
                t += run;
                phase += run;
            } else {
                let gap = (period - in_period).min(len - t);
                t += gap;
                phase += gap;
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::scene::{hex, TextStyle, WHITE};

    #[test]
    fn test_fill_rect_clips() {
        let mut c = Canvas::new(10, 10);
        c.fill_rect(Rect::new(-5.0, -5.0, 8.0, 8.0), WHITE);
        assert_eq!(*c.image().get_pixel(0, 0), WHITE);
        assert_eq!(*c.image().get_pixel(2, 2), WHITE);
        assert_eq!(c.image().get_pixel(3, 3)[3], 0);
    }

    #[test]
    fn test_translucent_fill_blends() {
        let mut c = Canvas::from_image(RgbaImage::from_pixel(4, 4, hex(0x000000)));
        c.fill_rect(Rect::new(0.0, 0.0, 4.0, 4.0), Rgba([255, 255, 255, 128]));
        let p = c.image().get_pixel(1, 1);
        assert!(p[0] > 100 && p[0] < 160, "got {:?}", p);
        assert_eq!(p[3], 255);
    }

    #[test]
    fn test_overlay_keeps_opaque_backdrop() {
        let mut c = Canvas::from_image(RgbaImage::from_pixel(6, 6, hex(0x050505)));
        let mut layer = RgbaImage::new(4, 4);
        for (i, p) in layer.pixels_mut().enumerate() {
            *p = Rgba([255, 0, 255, (i * 17) as u8]);
        }
        c.overlay(&layer, -1, 3);
        c.fill_circle((3.0, 3.0), 2.0, Rgba([0, 255, 0, 77]));
        assert!(c.image().pixels().all(|p| p[3] == 255));
        // Clipped: the layer's first column falls off the left edge
        let red = c.image().get_pixel(0, 3)[0];
        assert!((21..=22).contains(&red), "got {}", red);
    }

    #[test]
    fn test_stroke_rect_straddles_edge() {
        let mut c = Canvas::from_image(RgbaImage::from_pixel(40, 40, hex(0x000000)));
        c.stroke_rect(Rect::new(10.0, 10.0, 20.0, 20.0), Stroke::new(WHITE, 4.0));
        // 2px outside and 2px inside the edge
        assert_eq!(*c.image().get_pixel(8, 20), WHITE);
        assert_eq!(*c.image().get_pixel(11, 20), WHITE);
        assert_eq!(*c.image().get_pixel(12, 20), hex(0x000000));
        assert_eq!(*c.image().get_pixel(7, 20), hex(0x000000));
        assert_eq!(*c.image().get_pixel(20, 20), hex(0x000000));
    }

    #[test]
    fn test_ring_leaves_center() {
        let mut c = Canvas::from_image(RgbaImage::from_pixel(50, 50, hex(0x000000)));
        c.ring((25.0, 25.0), 15.0, Stroke::new(WHITE, 4.0));
        assert_eq!(*c.image().get_pixel(25, 25), hex(0x000000));
        assert_eq!(*c.image().get_pixel(40, 25), WHITE);
    }

    #[test]
    fn test_dash_pattern() {
        let dashes = dash_path(&[(0.0, 0.0), (45.0, 0.0)], 10.0, 10.0);
        let starts: Vec<f32> = dashes.iter().map(|(a, _)| a.0).collect();
        assert_eq!(starts, vec![0.0, 20.0, 40.0]);
        assert!((dashes[2].1 .0 - 45.0).abs() < 1e-4);
    }

    #[test]
    fn test_dash_phase_carries_over_corner() {
        // 15 on the first leg: dash 0..10, gap 10..15; second leg starts mid-gap
        let dashes = dash_path(&[(0.0, 0.0), (15.0, 0.0), (15.0, 30.0)], 10.0, 10.0);
        assert_eq!(dashes.len(), 3);
        let (a, _) = dashes[1];
        assert!((a.1 - 5.0).abs() < 1e-4, "second leg dash starts after the gap, got {:?}", a);
    }

    #[test]
    fn test_vignette_clear_center() {
        let mut c = Canvas::from_image(RgbaImage::from_pixel(40, 40, hex(0x000000)));
        c.vignette((20.0, 20.0), 10.0, 40.0, Rgba([255, 0, 0, 255]));
        assert_eq!(*c.image().get_pixel(20, 20), hex(0x000000));
        assert!(c.image().get_pixel(0, 0)[0] > 0);
    }

    #[test]
    fn test_paint_is_deterministic() {
        let mut scene = Scene::new(60, 40);
        scene.push(DrawOp::FillRect {
            rect: Rect::new(0.0, 0.0, 60.0, 40.0),
            color: hex(0x050505),
        });
        scene.push(DrawOp::Polyline {
            points: vec![(5.0, 5.0), (50.0, 30.0), (10.0, 35.0)],
            stroke: Stroke::new(hex(0x00F0FF), 3.0),
            dash: Some((10.0, 10.0)),
            closed: true,
        });
        scene.text(TextOp::new("A", 30.0, 20.0, TextStyle::new(12.0, WHITE)).glow(hex(0xD946EF), 6.0));
        assert_eq!(Canvas::render(&scene), Canvas::render(&scene));
    }
}
