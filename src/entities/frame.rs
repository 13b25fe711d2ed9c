//! Captured frames.
//!
//! A `CapturedFrame` is an immutable RGBA still taken from the live canvas.
//! Frames are shared through `Arc`, so handing a shot set from the sequencer
//! to the compositor (or to a background recomposition job) never copies
//! pixels.

use image::{Rgba, RgbaImage};
use std::sync::Arc;

use super::layout::CollageLayout;

/// Immutable raster still.
#[derive(Clone, Debug)]
pub struct CapturedFrame {
    image: Arc<RgbaImage>,
}

impl CapturedFrame {
    pub fn new(image: RgbaImage) -> Self {
        Self {
            image: Arc::new(image),
        }
    }

    /// Solid-color frame, mostly for tests and placeholders.
    pub fn solid(width: u32, height: u32, color: Rgba<u8>) -> Self {
        Self::new(RgbaImage::from_pixel(width, height, color))
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    /// True when both handles point at the same pixels.
    pub fn ptr_eq(&self, other: &CapturedFrame) -> bool {
        Arc::ptr_eq(&self.image, &other.image)
    }
}

impl From<RgbaImage> for CapturedFrame {
    fn from(image: RgbaImage) -> Self {
        CapturedFrame::new(image)
    }
}

/// Ordered result of one completed capture session.
///
/// Only the capture sequencer builds these from a live session, so the frame
/// count always matches `layout.shots()`.
#[derive(Clone, Debug)]
pub struct ShotSet {
    layout: CollageLayout,
    frames: Vec<CapturedFrame>,
}

impl ShotSet {
    pub(crate) fn new(layout: CollageLayout, frames: Vec<CapturedFrame>) -> Self {
        debug_assert_eq!(frames.len(), layout.shots());
        Self { layout, frames }
    }

    /// Build a shot set from frames that did not come from a live session
    /// (files on disk, tests). Returns `None` if the count is wrong.
    pub fn from_frames(layout: CollageLayout, frames: Vec<CapturedFrame>) -> Option<Self> {
        (frames.len() == layout.shots()).then(|| Self { layout, frames })
    }

    pub fn layout(&self) -> CollageLayout {
        self.layout
    }

    pub fn frames(&self) -> &[CapturedFrame] {
        &self.frames
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}
