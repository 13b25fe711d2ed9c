//! Rendering: display lists, text rasterization and the CPU painter.

pub mod canvas;
pub mod scene;
pub mod text;

pub use canvas::Canvas;
pub use scene::{
    hex, with_alpha, Baseline, DrawOp, FontFamily, Glow, Rect, Scene, Stroke, TextAlign, TextOp, TextStyle,
    BLACK, WHITE,
};
