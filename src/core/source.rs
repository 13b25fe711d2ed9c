//! Frame sources: where live camera frames come from.
//!
//! A source hands out "whatever frame is current" on each call, or `None`
//! once it is stopped. Camera drivers live outside this crate; the provided
//! sources replay still images, which is enough for the CLI and tests.
//!
//! The live canvas is always the horizontally mirrored (selfie) view.
//! [`Mirrored`] wraps a raw source so capture can read that view directly,
//! and [`LiveCanvas`] holds the view the preview loop last drew.

use image::{imageops, Rgba, RgbaImage};
use log::{debug, info};
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};

/// Error opening a frame source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    /// No input images.
    Empty,
    /// Image could not be read or decoded.
    Decode { path: PathBuf, msg: String },
    /// Inputs do not share one size.
    SizeMismatch {
        path: PathBuf,
        expected: (u32, u32),
        actual: (u32, u32),
    },
}

impl std::fmt::Display for SourceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceError::Empty => write!(f, "No frames to play"),
            SourceError::Decode { path, msg } => write!(f, "Cannot read {}: {}", path.display(), msg),
            SourceError::SizeMismatch {
                path,
                expected,
                actual,
            } => write!(
                f,
                "{} is {}x{}, expected {}x{}",
                path.display(),
                actual.0,
                actual.1,
                expected.0,
                expected.1
            ),
        }
    }
}

impl std::error::Error for SourceError {}

/// Readable frame each tick, or none if stopped.
pub trait FrameSource: Send + Sync {
    fn current_frame(&self) -> Option<RgbaImage>;

    /// Short name for logs.
    fn name(&self) -> &str {
        "source"
    }
}

impl<S: FrameSource + ?Sized> FrameSource for Arc<S> {
    fn current_frame(&self) -> Option<RgbaImage> {
        (**self).current_frame()
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// Mirror a raw camera frame into the selfie view.
pub fn mirror(raw: &RgbaImage) -> RgbaImage {
    imageops::flip_horizontal(raw)
}

/// Single solid color. Can be stopped to simulate a lost camera.
#[derive(Debug)]
pub struct SolidSource {
    width: u32,
    height: u32,
    color: Rgba<u8>,
    stopped: AtomicBool,
}

impl SolidSource {
    pub fn new(width: u32, height: u32, color: Rgba<u8>) -> Self {
        Self {
            width,
            height,
            color,
            stopped: AtomicBool::new(false),
        }
    }

    pub fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }
}

impl FrameSource for SolidSource {
    fn current_frame(&self) -> Option<RgbaImage> {
        if self.stopped.load(Ordering::SeqCst) {
            return None;
        }
        Some(RgbaImage::from_pixel(self.width, self.height, self.color))
    }

    fn name(&self) -> &str {
        "solid"
    }
}

/// Cycles through decoded still images, one per call.
#[derive(Debug)]
pub struct ImageSequenceSource {
    frames: Vec<Arc<RgbaImage>>,
    cursor: AtomicUsize,
    /// Stop after one pass instead of wrapping.
    once: bool,
}

impl ImageSequenceSource {
    /// Decode all `paths` up front (in parallel). All images must share one size.
    pub fn open<P: AsRef<Path> + Sync>(paths: &[P]) -> Result<Self, SourceError> {
        if paths.is_empty() {
            return Err(SourceError::Empty);
        }
        let decoded: Result<Vec<RgbaImage>, SourceError> = paths
            .par_iter()
            .map(|p| {
                let path = p.as_ref();
                image::open(path)
                    .map(|img| img.to_rgba8())
                    .map_err(|e| SourceError::Decode {
                        path: path.to_path_buf(),
                        msg: e.to_string(),
                    })
            })
            .collect();
        let decoded = decoded?;

        let expected = decoded[0].dimensions();
        for (img, p) in decoded.iter().zip(paths) {
            if img.dimensions() != expected {
                return Err(SourceError::SizeMismatch {
                    path: p.as_ref().to_path_buf(),
                    expected,
                    actual: img.dimensions(),
                });
            }
        }
        info!(
            "Image sequence source: {} frames, {}x{}",
            decoded.len(),
            expected.0,
            expected.1
        );
        Ok(Self::from_images(decoded))
    }

    pub fn from_images(images: Vec<RgbaImage>) -> Self {
        Self {
            frames: images.into_iter().map(Arc::new).collect(),
            cursor: AtomicUsize::new(0),
            once: false,
        }
    }

    /// Play the sequence once, then report stopped.
    pub fn play_once(mut self) -> Self {
        self.once = true;
        self
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

impl FrameSource for ImageSequenceSource {
    fn current_frame(&self) -> Option<RgbaImage> {
        if self.frames.is_empty() {
            return None;
        }
        let i = self.cursor.fetch_add(1, Ordering::SeqCst);
        if self.once && i >= self.frames.len() {
            debug!("Image sequence exhausted after {} frames", self.frames.len());
            return None;
        }
        Some(self.frames[i % self.frames.len()].as_ref().clone())
    }

    fn name(&self) -> &str {
        "image-sequence"
    }
}

/// Reads a raw source and hands out the mirrored view.
pub struct Mirrored<S> {
    inner: S,
}

impl<S: FrameSource> Mirrored<S> {
    pub fn new(inner: S) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }
}

impl<S: FrameSource> FrameSource for Mirrored<S> {
    fn current_frame(&self) -> Option<RgbaImage> {
        self.inner.current_frame().map(|f| mirror(&f))
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}

/// Latest mirrored, unfiltered frame drawn by the preview loop.
///
/// Cloned handles share the same slot. Capture reads it as a `FrameSource`.
#[derive(Clone, Debug, Default)]
pub struct LiveCanvas {
    slot: Arc<RwLock<Option<Arc<RgbaImage>>>>,
}

impl LiveCanvas {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mirror a raw frame into the canvas. Returns the mirrored frame.
    pub fn update(&self, raw: &RgbaImage) -> Arc<RgbaImage> {
        let view = Arc::new(mirror(raw));
        *self.slot.write().unwrap_or_else(|e| e.into_inner()) = Some(Arc::clone(&view));
        view
    }

    /// Drop the current frame (source stopped).
    pub fn clear(&self) {
        *self.slot.write().unwrap_or_else(|e| e.into_inner()) = None;
    }

    pub fn latest(&self) -> Option<Arc<RgbaImage>> {
        self.slot.read().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl FrameSource for LiveCanvas {
    fn current_frame(&self) -> Option<RgbaImage> {
        self.latest().map(|f| f.as_ref().clone())
    }

    fn name(&self) -> &str {
        "live-canvas"
    }
}
