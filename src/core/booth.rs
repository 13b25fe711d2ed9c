//! Booth controller - the whole session as one explicit state machine.
//!
//! Steps:
//! ```text
//! Splash --start--> Camera --capture done--> Result
//!                     ^  ^                      |
//!                     |  +------- retake -------+
//!   any step --reset--+--> Splash
//! ```
//! The controller owns every piece of session state a UI would otherwise
//! keep in globals: selections, the capture buffer, the decoration, the
//! sticker drag target and the latest composite. UIs call transition
//! methods and `tick()` once per frame, then read state or poll the bus.

use chrono::NaiveDate;
use image::RgbaImage;
use log::{debug, error, info, warn};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::entities::{
    CollageLayout, Decoration, FilterSelection, FrameOverlay, ShotSet, StickerId, TimerDuration,
};

use super::compositor::{ComposeError, Compositor};
use super::event_bus::EventBus;
use super::export::{self, ExportError};
use super::preview::Preview;
use super::randomizer::{Randomizer, SpinError};
use super::recomposer::{ComposeJob, Recomposer};
use super::sequencer::{CaptureError, CaptureSequencer, SequenceConfig, SequenceHandle};
use super::source::FrameSource;

/// Message shown when the camera or detector cannot be opened.
pub const CAMERA_REQUIRED: &str = "Camera access required.";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Step {
    Splash,
    Camera,
    Result,
}

/// Published on the bus when the visible step changes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StepChanged {
    pub from: Step,
    pub to: Step,
}

/// Published when a new composite becomes visible.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompositeReady {
    pub width: u32,
    pub height: u32,
}

/// Published when a capture session ends without frames.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CaptureFailed {
    pub reason: String,
}

/// Booth tunables taken from the settings file.
#[derive(Clone, Debug)]
pub struct BoothOptions {
    pub timer: TimerDuration,
    pub sound: bool,
    pub flash: Duration,
}

impl Default for BoothOptions {
    fn default() -> Self {
        Self {
            timer: TimerDuration::Three,
            sound: true,
            flash: super::sequencer::DEFAULT_FLASH,
        }
    }
}

pub struct Booth {
    step: Step,
    error: Option<String>,

    filter: FilterSelection,
    layout: CollageLayout,
    timer: TimerDuration,
    sound: bool,
    flash: Duration,

    sequencer: CaptureSequencer,
    capture: Option<SequenceHandle>,
    shots: Option<ShotSet>,

    decoration: Decoration,
    drag: Option<StickerId>,
    composite: Option<Arc<RgbaImage>>,
    date: Option<NaiveDate>,

    preview: Preview,
    randomizer: Randomizer,
    recomposer: Recomposer,
    bus: EventBus,
}

impl Booth {
    pub fn new(preview: Preview, recomposer: Recomposer, options: BoothOptions) -> Self {
        Self {
            step: Step::Splash,
            error: None,
            filter: FilterSelection::None,
            layout: CollageLayout::Single,
            timer: options.timer,
            sound: options.sound,
            flash: options.flash,
            sequencer: CaptureSequencer::new(),
            capture: None,
            shots: None,
            decoration: Decoration::default(),
            drag: None,
            composite: None,
            date: None,
            preview,
            randomizer: Randomizer::new(),
            recomposer,
            bus: EventBus::new(),
        }
    }

    /// Pin the footer date (otherwise today's local date is used).
    pub fn with_date(mut self, date: NaiveDate) -> Self {
        self.date = Some(date);
        self
    }

    pub fn with_randomizer(mut self, randomizer: Randomizer) -> Self {
        self.randomizer = randomizer;
        self
    }

    // === State ===

    pub fn step(&self) -> Step {
        self.step
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn filter(&self) -> FilterSelection {
        self.filter
    }

    pub fn layout(&self) -> CollageLayout {
        self.layout
    }

    pub fn timer(&self) -> TimerDuration {
        self.timer
    }

    pub fn sound(&self) -> bool {
        self.sound
    }

    pub fn shots(&self) -> Option<&ShotSet> {
        self.shots.as_ref()
    }

    pub fn decoration(&self) -> &Decoration {
        &self.decoration
    }

    pub fn dragging(&self) -> Option<StickerId> {
        self.drag
    }

    pub fn composite(&self) -> Option<Arc<RgbaImage>> {
        self.composite.clone()
    }

    pub fn randomizer(&self) -> &Randomizer {
        &self.randomizer
    }

    pub fn sequencer(&self) -> &CaptureSequencer {
        &self.sequencer
    }

    /// True from `start_capture` until `tick()` has collected the outcome.
    pub fn is_capturing(&self) -> bool {
        self.capture.is_some() || self.sequencer.is_running()
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn preview(&self) -> &Preview {
        &self.preview
    }

    fn set_step(&mut self, to: Step) {
        if self.step != to {
            info!("Booth: {:?} -> {:?}", self.step, to);
            self.bus.emit(StepChanged { from: self.step, to });
            self.step = to;
        }
    }

    // === Splash / camera ===

    /// Leave the splash screen.
    pub fn start(&mut self) {
        if self.step == Step::Splash {
            self.set_step(Step::Camera);
        }
    }

    /// Camera could not be opened: blocking error, no retry loop.
    pub fn camera_failed(&mut self, detail: &str) {
        error!("Camera unavailable: {}", detail);
        self.error = Some(CAMERA_REQUIRED.to_string());
    }

    pub fn select_filter(&mut self, filter: FilterSelection) {
        self.filter = filter;
    }

    /// Ignored while a sequence is running: the shot count is fixed at start.
    pub fn select_layout(&mut self, layout: CollageLayout) {
        if self.is_capturing() {
            debug!("Booth: layout change ignored during capture");
            return;
        }
        self.layout = layout;
    }

    pub fn select_timer(&mut self, timer: TimerDuration) {
        if !self.is_capturing() {
            self.timer = timer;
        }
    }

    pub fn toggle_sound(&mut self) -> bool {
        self.sound = !self.sound;
        self.sound
    }

    pub fn spin(&mut self, now: Instant) -> Result<(), SpinError> {
        self.randomizer.spin(now)
    }

    /// Next displayed preview frame (camera step only).
    pub fn preview_frame(&mut self, source: &dyn FrameSource) -> Option<RgbaImage> {
        if self.step != Step::Camera || self.error.is_some() {
            return None;
        }
        self.preview.tick(source, self.filter, &self.randomizer)
    }

    /// Start a capture session reading the preview's live canvas.
    pub fn start_capture(&mut self) -> Result<(), CaptureError> {
        let source: Arc<dyn FrameSource> = Arc::new(self.preview.live_canvas());
        self.start_capture_from(source)
    }

    /// Start a capture session reading `source` (already mirrored).
    pub fn start_capture_from(&mut self, source: Arc<dyn FrameSource>) -> Result<(), CaptureError> {
        if self.step != Step::Camera || self.error.is_some() {
            return Err(CaptureError::NotReady);
        }
        let config = SequenceConfig::new(self.layout, self.timer, self.sound).with_flash(self.flash);
        let handle = self.sequencer.spawn(config, source, Arc::new(self.bus.clone()))?;
        self.shots = None;
        self.capture = Some(handle);
        Ok(())
    }

    /// Abort a running capture. Frames taken so far are discarded.
    pub fn cancel_capture(&mut self) {
        if let Some(handle) = self.capture.take() {
            handle.cancel();
            if let Err(e) = handle.join() {
                debug!("Capture ended: {}", e);
            }
        }
    }

    /// Hand a finished shot set to the decoration stage.
    pub fn capture_complete(&mut self, shots: ShotSet, now: Instant) {
        info!("Booth: {} frames captured for {}", shots.len(), shots.layout());
        self.layout = shots.layout();
        self.shots = Some(shots);
        self.decoration.reset();
        self.drag = None;
        self.composite = None;
        self.set_step(Step::Result);
        self.request_compose(now);
    }

    fn poll_capture(&mut self, now: Instant) {
        let finished = self.capture.as_ref().map(|h| h.is_finished()).unwrap_or(false);
        if !finished {
            return;
        }
        let Some(handle) = self.capture.take() else {
            return;
        };
        match handle.join() {
            Ok(shots) => self.capture_complete(shots, now),
            Err(e) => {
                warn!("Capture failed: {}", e);
                self.bus.emit(CaptureFailed { reason: e.to_string() });
            }
        }
    }

    // === Result / decoration ===

    /// Back to the camera with an empty session.
    pub fn retake(&mut self) {
        self.cancel_capture();
        self.recomposer.cancel();
        self.shots = None;
        self.decoration.reset();
        self.drag = None;
        self.composite = None;
        self.set_step(Step::Camera);
    }

    /// Back to the splash screen, dropping everything.
    pub fn reset(&mut self) {
        self.retake();
        self.error = None;
        self.set_step(Step::Splash);
    }

    pub fn set_overlay(&mut self, overlay: FrameOverlay, now: Instant) {
        self.decoration.overlay = overlay;
        self.request_compose(now);
    }

    pub fn add_sticker(&mut self, tag: &str, now: Instant) -> StickerId {
        let id = self.decoration.stickers.add(tag);
        self.request_compose(now);
        id
    }

    /// Add a sticker already placed at normalized `(x, y)`.
    pub fn add_sticker_at(&mut self, tag: &str, x: f32, y: f32, now: Instant) -> StickerId {
        let id = self.decoration.stickers.add_at(tag, x, y);
        self.request_compose(now);
        id
    }

    pub fn clear_stickers(&mut self, now: Instant) {
        self.decoration.stickers.clear();
        self.drag = None;
        self.request_compose(now);
    }

    pub fn set_caption(&mut self, text: &str, now: Instant) {
        self.decoration.set_caption(text);
        self.request_compose(now);
    }

    /// Pointer pressed at normalized canvas coordinates. Returns the grabbed sticker.
    pub fn pointer_down(&mut self, x: f32, y: f32) -> Option<StickerId> {
        if self.decoration.stickers.is_empty() {
            return None;
        }
        self.drag = self.decoration.stickers.hit_test(x, y);
        if let Some(id) = self.drag {
            debug!("Booth: dragging sticker {}", id);
        }
        self.drag
    }

    /// Move the grabbed sticker to the pointer. No-op without a drag target.
    pub fn pointer_move(&mut self, x: f32, y: f32, now: Instant) -> bool {
        let Some(id) = self.drag else {
            return false;
        };
        let moved = self.decoration.stickers.set_position(id, x, y);
        if moved {
            self.request_compose(now);
        }
        moved
    }

    pub fn pointer_up(&mut self) {
        self.drag = None;
    }

    fn compose_job(&self) -> Option<ComposeJob> {
        let shots = self.shots.as_ref()?;
        Some(ComposeJob {
            frames: shots.frames().to_vec(),
            layout: shots.layout(),
            decoration: self.decoration.clone(),
            date: self.date.unwrap_or_else(|| chrono::Local::now().date_naive()),
        })
    }

    fn request_compose(&mut self, now: Instant) {
        if self.step != Step::Result {
            return;
        }
        if let Some(job) = self.compose_job() {
            self.recomposer.request(job, now);
        }
    }

    /// Compose right away, bypassing the debounce.
    pub fn compose_now(&mut self) -> Result<Option<Arc<RgbaImage>>, ComposeError> {
        let Some(job) = self.compose_job() else {
            return Ok(None);
        };
        let image = self.recomposer.compose_now(&job)?;
        self.publish(Arc::clone(&image));
        Ok(Some(image))
    }

    fn publish(&mut self, image: Arc<RgbaImage>) {
        self.bus.emit(CompositeReady {
            width: image.width(),
            height: image.height(),
        });
        self.composite = Some(image);
    }

    /// Per-frame housekeeping: capture completion, randomizer, recomposition.
    pub fn tick(&mut self, now: Instant) {
        self.poll_capture(now);
        self.randomizer.tick(now);
        match self.recomposer.tick(now) {
            Some(Ok(image)) => self.publish(image),
            Some(Err(e)) => error!("Composite failed: {}", e),
            None => {}
        }
    }

    /// True while a composite is pending or rendering.
    pub fn is_composing(&self) -> bool {
        self.recomposer.is_busy()
    }

    /// Save the current composite into `dir`. `Ok(None)` if there is none yet.
    pub fn download(&self, dir: &Path) -> Result<Option<PathBuf>, ExportError> {
        let Some(image) = &self.composite else {
            debug!("Booth: download with no composite, ignoring");
            return Ok(None);
        };
        export::save_download(image, dir, export::now_millis()).map(Some)
    }

    pub fn compositor(&self) -> &Compositor {
        self.recomposer.compositor()
    }
}

impl Drop for Booth {
    fn drop(&mut self) {
        // Stop a running capture before the worker pool goes away
        if let Some(handle) = self.capture.take() {
            handle.cancel();
        }
    }
}
