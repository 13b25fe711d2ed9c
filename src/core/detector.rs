//! Face detection: pluggable detectors and the lossy preview adapter.
//!
//! The adapter keeps detection off the render path:
//! - `submit()` hands a frame to the worker pool and returns immediately
//! - at most one pass is in flight; frames submitted meanwhile are dropped
//! - `latest()` always returns the most recent finished result, which may
//!   be a few frames old
//!
//! Detectors report boxes in raw (unmirrored) frame coordinates.

use image::RgbaImage;
use log::{debug, info, trace, warn};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::entities::DetectionBox;

use super::workers::Workers;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DetectError {
    /// Detector model or backend could not be loaded.
    Unavailable(String),
    /// A single detection pass failed.
    Failed(String),
    /// Replay file could not be parsed.
    Script { path: PathBuf, msg: String },
}

impl std::fmt::Display for DetectError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DetectError::Unavailable(e) => write!(f, "Detector unavailable: {}", e),
            DetectError::Failed(e) => write!(f, "Detection failed: {}", e),
            DetectError::Script { path, msg } => write!(f, "Bad detection file {}: {}", path.display(), msg),
        }
    }
}

impl std::error::Error for DetectError {}

/// Pluggable face detection backend.
pub trait FaceDetector: Send + Sync {
    /// Face boxes in `frame` coordinates.
    fn detect(&self, frame: &RgbaImage) -> Result<Vec<DetectionBox>, DetectError>;

    fn name(&self) -> &str;
}

/// Detector that never finds anything.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullDetector;

impl FaceDetector for NullDetector {
    fn detect(&self, _frame: &RgbaImage) -> Result<Vec<DetectionBox>, DetectError> {
        Ok(Vec::new())
    }

    fn name(&self) -> &str {
        "null"
    }
}

/// On-disk format of a detection replay file.
///
/// ```json
/// { "width": 640, "height": 480,
///   "frames": [[{"x": 200, "y": 120, "width": 160, "height": 180}], []] }
/// ```
/// `width`/`height` give the coordinate space of the boxes; when present,
/// boxes are rescaled to the size of the frame being "detected".
#[derive(Debug, Clone, Deserialize)]
pub struct DetectionScript {
    #[serde(default)]
    pub width: Option<f32>,
    #[serde(default)]
    pub height: Option<f32>,
    pub frames: Vec<Vec<DetectionBox>>,
}

/// Replays recorded boxes from a JSON sidecar file, one entry per pass,
/// wrapping around at the end.
#[derive(Debug)]
pub struct ReplayDetector {
    script: DetectionScript,
    cursor: AtomicUsize,
}

impl ReplayDetector {
    pub fn new(script: DetectionScript) -> Self {
        Self {
            script,
            cursor: AtomicUsize::new(0),
        }
    }

    pub fn load(path: &Path) -> Result<Self, DetectError> {
        let text = std::fs::read_to_string(path).map_err(|e| DetectError::Script {
            path: path.to_path_buf(),
            msg: e.to_string(),
        })?;
        let script: DetectionScript = serde_json::from_str(&text).map_err(|e| DetectError::Script {
            path: path.to_path_buf(),
            msg: e.to_string(),
        })?;
        info!(
            "Loaded detection replay {} ({} passes)",
            path.display(),
            script.frames.len()
        );
        Ok(Self::new(script))
    }
}

impl FaceDetector for ReplayDetector {
    fn detect(&self, frame: &RgbaImage) -> Result<Vec<DetectionBox>, DetectError> {
        if self.script.frames.is_empty() {
            return Ok(Vec::new());
        }
        let i = self.cursor.fetch_add(1, Ordering::SeqCst) % self.script.frames.len();
        let sx = self.script.width.map(|w| frame.width() as f32 / w).unwrap_or(1.0);
        let sy = self.script.height.map(|h| frame.height() as f32 / h).unwrap_or(1.0);
        Ok(self.script.frames[i].iter().map(|b| b.scaled(sx, sy)).collect())
    }

    fn name(&self) -> &str {
        "replay"
    }
}

/// Lossy, non-blocking wrapper that feeds the preview loop.
pub struct DetectionAdapter {
    detector: Option<Arc<dyn FaceDetector>>,
    workers: Arc<Workers>,
    in_flight: Arc<AtomicBool>,
    latest: Arc<Mutex<Vec<DetectionBox>>>,
    passes: Arc<AtomicUsize>,
}

impl DetectionAdapter {
    /// `None` means the detector failed to load: the adapter then always
    /// reports zero detections.
    pub fn new(detector: Option<Arc<dyn FaceDetector>>, workers: Arc<Workers>) -> Self {
        match &detector {
            Some(d) => info!("Face detector '{}' loaded", d.name()),
            None => warn!("No face detector loaded, filters will see no faces"),
        }
        Self {
            detector,
            workers,
            in_flight: Arc::new(AtomicBool::new(false)),
            latest: Arc::new(Mutex::new(Vec::new())),
            passes: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.detector.is_some()
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Finished detection passes so far.
    pub fn passes(&self) -> usize {
        self.passes.load(Ordering::Acquire)
    }

    /// Queue a detection pass on `frame`. Returns false if the frame was
    /// dropped (no detector, or a pass is still running).
    pub fn submit(&self, frame: Arc<RgbaImage>) -> bool {
        let Some(detector) = self.detector.clone() else {
            return false;
        };
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            trace!("Detection busy, dropping frame");
            return false;
        }

        let in_flight = Arc::clone(&self.in_flight);
        let latest = Arc::clone(&self.latest);
        let passes = Arc::clone(&self.passes);
        self.workers.execute(move || {
            match detector.detect(&frame) {
                Ok(boxes) => {
                    trace!("Detection pass: {} faces", boxes.len());
                    *latest.lock().unwrap_or_else(|e| e.into_inner()) = boxes;
                }
                Err(e) => {
                    warn!("{}", e);
                    latest.lock().unwrap_or_else(|e| e.into_inner()).clear();
                }
            }
            passes.fetch_add(1, Ordering::AcqRel);
            in_flight.store(false, Ordering::Release);
        });
        true
    }

    /// Run a pass on the calling thread and publish its result.
    pub fn detect_now(&self, frame: &RgbaImage) -> Vec<DetectionBox> {
        let Some(detector) = &self.detector else {
            return Vec::new();
        };
        let boxes = detector.detect(frame).unwrap_or_else(|e| {
            warn!("{}", e);
            Vec::new()
        });
        debug!("Detection (sync): {} faces", boxes.len());
        *self.latest.lock().unwrap_or_else(|e| e.into_inner()) = boxes.clone();
        self.passes.fetch_add(1, Ordering::AcqRel);
        boxes
    }

    /// Most recent finished result (possibly stale, never blocks on a pass).
    pub fn latest(&self) -> Vec<DetectionBox> {
        self.latest.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}
