//! Capture sequencer - timed multi-shot capture.
//!
//! Per shot: countdown (one beep and one second per step), snap with flash
//! and shutter cue, grab the live frame, then a one second pause before the
//! next shot. The layout alone decides how many shots are taken.
//!
//! **Why a `Sleeper`**: every wait goes through it, so a spawned sequence
//! can be cancelled mid-countdown (the wait selects on a cancel channel) and
//! tests can run a ten-second timer without sleeping.
//!
//! Only one sequence runs at a time per sequencer; a second `run()` or
//! `spawn()` while one is active is rejected without producing frames.

use crossbeam_channel::{bounded, select, Receiver, Sender};
use log::{debug, error, info, trace};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use crate::entities::{CapturedFrame, CollageLayout, ShotSet, TimerDuration};

use super::source::FrameSource;

/// One countdown step.
pub const COUNTDOWN_STEP: Duration = Duration::from_millis(1000);
/// Pause between consecutive shots.
pub const INTER_SHOT_DELAY: Duration = Duration::from_millis(1000);
pub const DEFAULT_FLASH: Duration = Duration::from_millis(120);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureError {
    /// Another sequence is still running.
    AlreadyRunning,
    /// The source had no frame when shot `shot` (1-based) was taken.
    SourceUnavailable { shot: usize },
    /// Sequence was cancelled during a wait.
    Cancelled,
    /// Camera step not active or camera unavailable.
    NotReady,
    /// Capture thread could not be started.
    Spawn(String),
}

impl std::fmt::Display for CaptureError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CaptureError::AlreadyRunning => write!(f, "A capture sequence is already running"),
            CaptureError::SourceUnavailable { shot } => write!(f, "No camera frame for shot {}", shot),
            CaptureError::Cancelled => write!(f, "Capture cancelled"),
            CaptureError::NotReady => write!(f, "Camera is not ready"),
            CaptureError::Spawn(e) => write!(f, "Cannot start capture thread: {}", e),
        }
    }
}

impl std::error::Error for CaptureError {}

/// Audio cue requested by the sequence.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Cue {
    /// Short 880 Hz to 440 Hz chirp, once per countdown step.
    Beep,
    /// Filtered noise burst at the snap.
    Shutter,
}

/// Progress published while a sequence runs. Shot numbers are 1-based.
#[derive(Clone, Debug, PartialEq)]
pub enum SequenceEvent {
    Started { layout: CollageLayout, shots: usize },
    Countdown { shot: usize, remaining: u32 },
    Snap { shot: usize },
    Flash { duration: Duration },
    Sound(Cue),
    ShotCaptured { shot: usize, total: usize },
    Finished { shots: usize },
    Aborted { reason: String },
}

/// Receives sequence progress (UI, audio, logs).
pub trait SequenceObserver: Send + Sync {
    fn on_event(&self, event: &SequenceEvent);
}

/// Ignores all events.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopObserver;

impl SequenceObserver for NoopObserver {
    fn on_event(&self, _event: &SequenceEvent) {}
}

impl SequenceObserver for Sender<SequenceEvent> {
    fn on_event(&self, event: &SequenceEvent) {
        // Receiver gone means nobody is watching anymore
        let _ = self.send(event.clone());
    }
}

/// Wait that may be interrupted.
pub trait Sleeper: Send + Sync {
    /// Suspend for `duration`. `Err(CaptureError::Cancelled)` if interrupted.
    fn sleep(&self, duration: Duration) -> Result<(), CaptureError>;
}

/// Plain blocking wait, never cancelled.
#[derive(Clone, Copy, Debug, Default)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) -> Result<(), CaptureError> {
        thread::sleep(duration);
        Ok(())
    }
}

/// Wait that ends early when the cancel channel fires or disconnects.
#[derive(Clone, Debug)]
pub struct CancelSleeper {
    cancel: Receiver<()>,
}

impl CancelSleeper {
    pub fn new(cancel: Receiver<()>) -> Self {
        Self { cancel }
    }
}

impl Sleeper for CancelSleeper {
    fn sleep(&self, duration: Duration) -> Result<(), CaptureError> {
        select! {
            recv(self.cancel) -> _ => Err(CaptureError::Cancelled),
            default(duration) => Ok(()),
        }
    }
}

/// Virtual clock: records requested waits instead of sleeping.
///
/// Optionally cancels on the n-th wait, to exercise abort paths.
#[derive(Debug, Default)]
pub struct InstantSleeper {
    waits: Mutex<Vec<Duration>>,
    cancel_on: Option<usize>,
}

impl InstantSleeper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancel when the `n`-th wait (1-based) is requested.
    pub fn cancel_on(n: usize) -> Self {
        Self {
            waits: Mutex::new(Vec::new()),
            cancel_on: Some(n),
        }
    }

    pub fn waits(&self) -> Vec<Duration> {
        self.waits.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Total virtual time spent waiting.
    pub fn elapsed(&self) -> Duration {
        self.waits().iter().sum()
    }
}

impl Sleeper for InstantSleeper {
    fn sleep(&self, duration: Duration) -> Result<(), CaptureError> {
        let mut waits = self.waits.lock().unwrap_or_else(|e| e.into_inner());
        waits.push(duration);
        if self.cancel_on == Some(waits.len()) {
            return Err(CaptureError::Cancelled);
        }
        Ok(())
    }
}

/// Parameters of one capture session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SequenceConfig {
    pub layout: CollageLayout,
    pub timer: TimerDuration,
    pub sound: bool,
    pub flash: Duration,
}

impl SequenceConfig {
    pub fn new(layout: CollageLayout, timer: TimerDuration, sound: bool) -> Self {
        Self {
            layout,
            timer,
            sound,
            flash: DEFAULT_FLASH,
        }
    }

    pub fn with_flash(mut self, flash: Duration) -> Self {
        self.flash = flash;
        self
    }
}

/// Transient state a UI shows while capturing.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SequenceStatus {
    pub capturing: bool,
    /// `Some(0)` is the "snap" moment.
    pub countdown: Option<u32>,
    pub captured: usize,
    pub total: usize,
}

/// Clears the running flag and transient state on every exit path.
struct ActiveGuard {
    active: Arc<AtomicBool>,
    status: Arc<Mutex<SequenceStatus>>,
}

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        *self.status.lock().unwrap_or_else(|e| e.into_inner()) = SequenceStatus::default();
        self.active.store(false, Ordering::Release);
    }
}

/// Runs capture sequences, one at a time. Clones share the running flag.
#[derive(Clone, Debug, Default)]
pub struct CaptureSequencer {
    active: Arc<AtomicBool>,
    status: Arc<Mutex<SequenceStatus>>,
}

impl CaptureSequencer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_running(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    pub fn status(&self) -> SequenceStatus {
        *self.status.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn acquire(&self) -> Result<ActiveGuard, CaptureError> {
        if self
            .active
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("Capture sequence rejected: already running");
            return Err(CaptureError::AlreadyRunning);
        }
        Ok(ActiveGuard {
            active: Arc::clone(&self.active),
            status: Arc::clone(&self.status),
        })
    }

    /// Run a whole sequence on the calling thread.
    pub fn run(
        &self,
        config: &SequenceConfig,
        source: &dyn FrameSource,
        observer: &dyn SequenceObserver,
        sleeper: &dyn Sleeper,
    ) -> Result<ShotSet, CaptureError> {
        let guard = self.acquire()?;
        self.run_guarded(guard, config, source, observer, sleeper)
    }

    /// Run a sequence on its own thread. The returned handle cancels it
    /// when dropped.
    pub fn spawn(
        &self,
        config: SequenceConfig,
        source: Arc<dyn FrameSource>,
        observer: Arc<dyn SequenceObserver>,
    ) -> Result<SequenceHandle, CaptureError> {
        let guard = self.acquire()?;
        let (cancel_tx, cancel_rx) = bounded::<()>(1);
        let this = self.clone();

        let join = thread::Builder::new()
            .name("starbooth-capture".into())
            .spawn(move || {
                let sleeper = CancelSleeper::new(cancel_rx);
                this.run_guarded(guard, &config, source.as_ref(), observer.as_ref(), &sleeper)
            })
            .map_err(|e| CaptureError::Spawn(e.to_string()))?;

        Ok(SequenceHandle {
            cancel: Some(cancel_tx),
            join: Some(join),
        })
    }

    fn set_status(&self, f: impl FnOnce(&mut SequenceStatus)) {
        f(&mut self.status.lock().unwrap_or_else(|e| e.into_inner()));
    }

    fn run_guarded(
        &self,
        _guard: ActiveGuard,
        config: &SequenceConfig,
        source: &dyn FrameSource,
        observer: &dyn SequenceObserver,
        sleeper: &dyn Sleeper,
    ) -> Result<ShotSet, CaptureError> {
        let total = config.layout.shots();
        info!(
            "Capture sequence: {} ({} shots, {} timer, sound {})",
            config.layout,
            total,
            config.timer,
            if config.sound { "on" } else { "off" }
        );
        self.set_status(|s| {
            *s = SequenceStatus {
                capturing: true,
                countdown: None,
                captured: 0,
                total,
            }
        });
        observer.on_event(&SequenceEvent::Started {
            layout: config.layout,
            shots: total,
        });

        match self.shoot_all(config, source, observer, sleeper) {
            Ok(frames) => {
                info!("Capture sequence finished: {} frames", frames.len());
                observer.on_event(&SequenceEvent::Finished { shots: frames.len() });
                Ok(ShotSet::new(config.layout, frames))
            }
            Err(e) => {
                // Partial buffer is dropped with the error
                error!("Capture sequence aborted: {}", e);
                observer.on_event(&SequenceEvent::Aborted { reason: e.to_string() });
                Err(e)
            }
        }
    }

    fn shoot_all(
        &self,
        config: &SequenceConfig,
        source: &dyn FrameSource,
        observer: &dyn SequenceObserver,
        sleeper: &dyn Sleeper,
    ) -> Result<Vec<CapturedFrame>, CaptureError> {
        let total = config.layout.shots();
        let mut frames = Vec::with_capacity(total);

        for i in 0..total {
            let shot = i + 1;
            for remaining in (1..=config.timer.seconds()).rev() {
                self.set_status(|s| s.countdown = Some(remaining));
                observer.on_event(&SequenceEvent::Countdown { shot, remaining });
                if config.sound {
                    observer.on_event(&SequenceEvent::Sound(Cue::Beep));
                }
                sleeper.sleep(COUNTDOWN_STEP)?;
            }

            self.set_status(|s| s.countdown = Some(0));
            observer.on_event(&SequenceEvent::Snap { shot });
            observer.on_event(&SequenceEvent::Flash {
                duration: config.flash,
            });
            if config.sound {
                observer.on_event(&SequenceEvent::Sound(Cue::Shutter));
            }

            let image = source
                .current_frame()
                .ok_or(CaptureError::SourceUnavailable { shot })?;
            trace!("Shot {}/{} from '{}': {}x{}", shot, total, source.name(), image.width(), image.height());
            frames.push(CapturedFrame::new(image));
            self.set_status(|s| s.captured = frames.len());
            observer.on_event(&SequenceEvent::ShotCaptured { shot, total });

            if shot < total {
                self.set_status(|s| s.countdown = None);
                sleeper.sleep(INTER_SHOT_DELAY)?;
            }
        }
        Ok(frames)
    }
}

/// Running background sequence.
#[derive(Debug)]
pub struct SequenceHandle {
    cancel: Option<Sender<()>>,
    join: Option<thread::JoinHandle<Result<ShotSet, CaptureError>>>,
}

impl SequenceHandle {
    /// Interrupt the current wait and abort the sequence.
    pub fn cancel(&self) {
        if let Some(tx) = &self.cancel {
            let _ = tx.try_send(());
        }
    }

    pub fn is_finished(&self) -> bool {
        self.join.as_ref().map(|j| j.is_finished()).unwrap_or(true)
    }

    /// Wait for the sequence result.
    pub fn join(mut self) -> Result<ShotSet, CaptureError> {
        match self.join.take() {
            Some(handle) => handle
                .join()
                .unwrap_or_else(|_| Err(CaptureError::Spawn("capture thread panicked".into()))),
            None => Err(CaptureError::Cancelled),
        }
    }
}

impl Drop for SequenceHandle {
    fn drop(&mut self) {
        if self.join.is_some() {
            trace!("SequenceHandle dropped, cancelling capture");
        }
        // Disconnecting the channel wakes the capture thread
        self.cancel.take();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::source::{ImageSequenceSource, SolidSource};
    use image::{Rgba, RgbaImage};
    use std::time::Instant;

    /// Collects events for inspection.
    #[derive(Default)]
    struct Recorder(Mutex<Vec<SequenceEvent>>);

    impl SequenceObserver for Recorder {
        fn on_event(&self, event: &SequenceEvent) {
            self.0.lock().unwrap().push(event.clone());
        }
    }

    impl Recorder {
        fn events(&self) -> Vec<SequenceEvent> {
            self.0.lock().unwrap().clone()
        }
    }

    fn solid() -> SolidSource {
        SolidSource::new(8, 6, Rgba([9, 9, 9, 255]))
    }

    #[test]
    fn test_shot_count_and_timing() {
        let seq = CaptureSequencer::new();
        let sleeper = InstantSleeper::new();
        let cfg = SequenceConfig::new(CollageLayout::Strip3, TimerDuration::Three, false);
        let set = seq.run(&cfg, &solid(), &NoopObserver, &sleeper).unwrap();
        assert_eq!(set.len(), 3);
        // 3 countdown steps per shot plus 2 pauses between shots
        assert_eq!(sleeper.waits().len(), 3 * 3 + 2);
        assert_eq!(sleeper.elapsed(), Duration::from_secs(11));
        assert!(!seq.is_running());
        assert_eq!(seq.status(), SequenceStatus::default());
    }

    #[test]
    fn test_frames_in_capture_order() {
        let imgs: Vec<RgbaImage> = (0..4u8)
            .map(|i| RgbaImage::from_pixel(2, 2, Rgba([i, 0, 0, 255])))
            .collect();
        let src = ImageSequenceSource::from_images(imgs);
        let cfg = SequenceConfig::new(CollageLayout::Grid2x2, TimerDuration::Three, false);
        let set = CaptureSequencer::new()
            .run(&cfg, &src, &NoopObserver, &InstantSleeper::new())
            .unwrap();
        let order: Vec<u8> = set.frames().iter().map(|f| f.image().get_pixel(0, 0)[0]).collect();
        assert_eq!(order, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_events_and_sound() {
        let rec = Recorder::default();
        let cfg = SequenceConfig::new(CollageLayout::Single, TimerDuration::Three, true);
        CaptureSequencer::new()
            .run(&cfg, &solid(), &rec, &InstantSleeper::new())
            .unwrap();
        let ev = rec.events();
        assert_eq!(ev[0], SequenceEvent::Started { layout: CollageLayout::Single, shots: 1 });
        let countdown: Vec<u32> = ev
            .iter()
            .filter_map(|e| match e {
                SequenceEvent::Countdown { remaining, .. } => Some(*remaining),
                _ => None,
            })
            .collect();
        assert_eq!(countdown, vec![3, 2, 1]);
        let beeps = ev.iter().filter(|e| **e == SequenceEvent::Sound(Cue::Beep)).count();
        assert_eq!(beeps, 3);
        assert!(ev.contains(&SequenceEvent::Sound(Cue::Shutter)));
        assert!(ev.contains(&SequenceEvent::Flash { duration: DEFAULT_FLASH }));
        assert_eq!(ev.last(), Some(&SequenceEvent::Finished { shots: 1 }));
    }

    #[test]
    fn test_muted_has_no_cues() {
        let rec = Recorder::default();
        let cfg = SequenceConfig::new(CollageLayout::Single, TimerDuration::Five, false);
        CaptureSequencer::new()
            .run(&cfg, &solid(), &rec, &InstantSleeper::new())
            .unwrap();
        assert!(!rec.events().iter().any(|e| matches!(e, SequenceEvent::Sound(_))));
    }

    #[test]
    fn test_missing_frame_aborts() {
        let src = ImageSequenceSource::from_images(vec![RgbaImage::new(2, 2)]).play_once();
        let rec = Recorder::default();
        let seq = CaptureSequencer::new();
        let cfg = SequenceConfig::new(CollageLayout::Strip3, TimerDuration::Three, false);
        let err = seq.run(&cfg, &src, &rec, &InstantSleeper::new()).unwrap_err();
        assert_eq!(err, CaptureError::SourceUnavailable { shot: 2 });
        assert!(matches!(rec.events().last(), Some(SequenceEvent::Aborted { .. })));
        assert!(!seq.is_running());
    }

    #[test]
    fn test_cancel_mid_countdown() {
        let seq = CaptureSequencer::new();
        let cfg = SequenceConfig::new(CollageLayout::Grid2x2, TimerDuration::Ten, false);
        let err = seq
            .run(&cfg, &solid(), &NoopObserver, &InstantSleeper::cancel_on(4))
            .unwrap_err();
        assert_eq!(err, CaptureError::Cancelled);
        assert!(!seq.is_running());
    }

    #[test]
    fn test_reentrant_spawn_rejected() {
        let seq = CaptureSequencer::new();
        let cfg = SequenceConfig::new(CollageLayout::Single, TimerDuration::Three, false);
        let src: Arc<dyn FrameSource> = Arc::new(solid());
        let handle = seq.spawn(cfg, Arc::clone(&src), Arc::new(NoopObserver)).unwrap();
        assert!(seq.is_running());

        let second = seq.run(&cfg, src.as_ref(), &NoopObserver, &InstantSleeper::new());
        assert_eq!(second.unwrap_err(), CaptureError::AlreadyRunning);

        handle.cancel();
        assert_eq!(handle.join().unwrap_err(), CaptureError::Cancelled);
        assert!(!seq.is_running());
    }

    #[test]
    fn test_dropping_handle_cancels_promptly() {
        let seq = CaptureSequencer::new();
        let cfg = SequenceConfig::new(CollageLayout::Grid3x3, TimerDuration::Ten, false);
        let handle = seq
            .spawn(cfg, Arc::new(solid()), Arc::new(NoopObserver))
            .unwrap();
        let start = Instant::now();
        drop(handle);
        while seq.is_running() && start.elapsed() < Duration::from_secs(2) {
            thread::sleep(Duration::from_millis(2));
        }
        assert!(!seq.is_running());
        assert!(start.elapsed() < Duration::from_millis(900));
    }

    #[test]
    fn test_cancel_sleeper_completes_without_cancel() {
        let (_tx, rx) = bounded::<()>(1);
        let s = CancelSleeper::new(rx);
        assert!(s.sleep(Duration::from_millis(5)).is_ok());
    }
}
