//! Face detection boxes.
//!
//! The live canvas shows the camera mirrored (selfie view) while detectors
//! see the raw frame. Every consumer of face geometry goes through
//! [`DetectionBox::mirrored`] so the two spaces never mix.

use serde::{Deserialize, Serialize};

/// Axis-aligned face rectangle, in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct DetectionBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl DetectionBox {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self { x, y, width, height }
    }

    /// Map from detector space into the horizontally flipped display space.
    pub fn mirrored(&self, frame_width: f32) -> Self {
        Self {
            x: frame_width - (self.x + self.width),
            ..*self
        }
    }

    pub fn center(&self) -> (f32, f32) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    pub fn max_side(&self) -> f32 {
        self.width.max(self.height)
    }

    /// Rescale from the detector's input resolution to the display canvas.
    pub fn scaled(&self, sx: f32, sy: f32) -> Self {
        Self {
            x: self.x * sx,
            y: self.y * sy,
            width: self.width * sx,
            height: self.height * sy,
        }
    }
}
