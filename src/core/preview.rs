//! Live preview loop: one `tick()` per displayed frame.
//!
//! Per tick:
//! 1. read the raw source frame (none: the source stopped, nothing to show)
//! 2. mirror it into the shared [`LiveCanvas`] that capture reads from
//! 3. hand it to the detection adapter without waiting
//! 4. draw the active filter with the latest detections onto a copy
//!
//! The loop owns no timers; the caller decides the frame rate.

use image::RgbaImage;
use log::trace;
use std::sync::Arc;

use crate::entities::FilterSelection;

use super::detector::DetectionAdapter;
use super::filters::FilterRenderer;
use super::randomizer::Randomizer;
use super::source::{FrameSource, LiveCanvas};

pub struct Preview {
    live: LiveCanvas,
    detection: DetectionAdapter,
    filters: FilterRenderer,
    detect_enabled: bool,
    frames: u64,
}

impl Preview {
    pub fn new(detection: DetectionAdapter) -> Self {
        Self {
            live: LiveCanvas::new(),
            detection,
            filters: FilterRenderer::new(),
            detect_enabled: true,
            frames: 0,
        }
    }

    /// Turn detection submission on or off (filters then see the last result).
    pub fn set_detection(&mut self, enabled: bool) {
        self.detect_enabled = enabled;
    }

    /// Shared handle to the unfiltered mirrored view.
    pub fn live_canvas(&self) -> LiveCanvas {
        self.live.clone()
    }

    pub fn detection(&self) -> &DetectionAdapter {
        &self.detection
    }

    pub fn filters(&self) -> &FilterRenderer {
        &self.filters
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Produce the next displayed frame, or `None` if the source stopped.
    pub fn tick(
        &mut self,
        source: &dyn FrameSource,
        filter: FilterSelection,
        randomizer: &Randomizer,
    ) -> Option<RgbaImage> {
        let Some(raw) = source.current_frame() else {
            self.live.clear();
            return None;
        };
        let view = self.live.update(&raw);

        // Detectors work on the raw frame; boxes are mirrored when drawn
        if self.detect_enabled && filter.uses_faces() {
            self.detection.submit(Arc::new(raw));
        }
        let faces = self.detection.latest();
        self.frames += 1;
        trace!("Preview frame {}: {} faces, filter {}", self.frames, faces.len(), filter);

        Some(self.filters.apply(&view, &faces, filter, randomizer))
    }

    /// Like `tick()`, but waits for detection on this very frame. Used when
    /// rendering previews offline, where frame-exact boxes matter more than
    /// latency.
    pub fn tick_blocking(
        &mut self,
        source: &dyn FrameSource,
        filter: FilterSelection,
        randomizer: &Randomizer,
    ) -> Option<RgbaImage> {
        let raw = source.current_frame()?;
        let view = self.live.update(&raw);
        let faces = if self.detect_enabled && filter.uses_faces() {
            self.detection.detect_now(&raw)
        } else {
            self.detection.latest()
        };
        self.frames += 1;
        Some(self.filters.apply(&view, &faces, filter, randomizer))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::detector::{DetectionScript, FaceDetector, ReplayDetector};
    use crate::core::source::SolidSource;
    use crate::core::workers::Workers;
    use crate::entities::DetectionBox;
    use image::Rgba;
    use std::sync::atomic::AtomicU64;

    fn preview(detector: Option<Arc<dyn FaceDetector>>) -> Preview {
        let workers = Arc::new(Workers::new(1, Arc::new(AtomicU64::new(0))));
        Preview::new(DetectionAdapter::new(detector, workers))
    }

    #[test]
    fn test_stopped_source_clears_live() {
        let mut p = preview(None);
        let src = SolidSource::new(16, 12, Rgba([5, 5, 5, 255]));
        let r = Randomizer::new();
        assert!(p.tick(&src, FilterSelection::None, &r).is_some());
        assert!(p.live_canvas().latest().is_some());
        src.stop();
        assert!(p.tick(&src, FilterSelection::None, &r).is_none());
        assert!(p.live_canvas().latest().is_none());
    }

    #[test]
    fn test_live_canvas_stays_unfiltered() {
        let mut p = preview(None);
        let src = SolidSource::new(200, 150, Rgba([5, 5, 5, 255]));
        let shown = p.tick(&src, FilterSelection::Ticket, &Randomizer::new()).unwrap();
        let live = p.live_canvas().latest().unwrap();
        // Ticket border at the inset is drawn on the display copy only
        assert_eq!(*live.get_pixel(40, 75), Rgba([5, 5, 5, 255]));
        assert_ne!(*shown.get_pixel(40, 75), Rgba([5, 5, 5, 255]));
    }

    #[test]
    fn test_blocking_tick_uses_current_detections() {
        let script = DetectionScript {
            width: None,
            height: None,
            frames: vec![vec![DetectionBox::new(10.0, 10.0, 40.0, 40.0)]],
        };
        let det: Arc<dyn FaceDetector> = Arc::new(ReplayDetector::new(script));
        let mut p = preview(Some(det));
        let src = SolidSource::new(120, 90, Rgba([0, 0, 0, 255]));
        p.tick_blocking(&src, FilterSelection::Constellation, &Randomizer::new())
            .unwrap();
        assert_eq!(p.detection().latest().len(), 1);
        assert_eq!(p.frames(), 1);
    }
}
