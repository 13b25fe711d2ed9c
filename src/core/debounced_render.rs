//! Debounced render requests.
//!
//! Edits to the decoration arrive in bursts (typing a caption, dragging a
//! sticker). Each edit reschedules a single pending render; the render only
//! fires once the input has been quiet for the delay:
//! 1. `schedule()` on every change (replaces the pending payload, resets the timer)
//! 2. `tick()` from the frame loop returns the payload once the delay elapsed

use std::time::{Duration, Instant};

pub const DEFAULT_DELAY_MS: u64 = 100;

/// Latest-wins delayed trigger carrying a payload.
///
/// # Usage
/// ```ignore
/// // On every edit:
/// debounce.schedule(job);
///
/// // In the frame loop:
/// if let Some(job) = debounce.tick() {
///     start_render(job);
/// }
/// ```
#[derive(Debug, Clone)]
pub struct DebouncedRender<T> {
    delay: Duration,
    pending: Option<(T, Instant)>,
}

impl<T> Default for DebouncedRender<T> {
    fn default() -> Self {
        Self::new(DEFAULT_DELAY_MS)
    }
}

impl<T> DebouncedRender<T> {
    pub fn new(delay_ms: u64) -> Self {
        Self {
            delay: Duration::from_millis(delay_ms),
            pending: None,
        }
    }

    pub fn delay_ms(&self) -> u64 {
        self.delay.as_millis() as u64
    }

    pub fn set_delay(&mut self, delay_ms: u64) {
        self.delay = Duration::from_millis(delay_ms);
    }

    /// Schedule `payload`, replacing any pending one and restarting the delay.
    pub fn schedule(&mut self, payload: T) {
        self.schedule_at(payload, Instant::now());
    }

    pub fn schedule_at(&mut self, payload: T, now: Instant) {
        if self.pending.is_some() {
            log::trace!("DebouncedRender: coalescing pending render");
        }
        self.pending = Some((payload, now + self.delay));
    }

    pub fn cancel(&mut self) {
        if self.pending.take().is_some() {
            log::trace!("DebouncedRender: cancelled pending render");
        }
    }

    /// Pending payload if the delay has elapsed. Clears it when returned.
    pub fn tick(&mut self) -> Option<T> {
        self.tick_at(Instant::now())
    }

    pub fn tick_at(&mut self, now: Instant) -> Option<T> {
        match &self.pending {
            Some((_, due)) if now >= *due => self.pending.take().map(|(payload, _)| payload),
            _ => None,
        }
    }

    /// Fire immediately regardless of the delay.
    pub fn flush(&mut self) -> Option<T> {
        self.pending.take().map(|(payload, _)| payload)
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }
}
