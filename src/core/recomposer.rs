//! Background recomposition of the collage.
//!
//! Every edit requests a new composite. Requests are debounced, then run on
//! the worker pool under a fresh epoch:
//! - a job whose epoch went stale before it started is skipped by the pool
//! - a result whose epoch went stale while rendering is discarded here
//!
//! So when renders overlap, only the newest request's image is ever shown.

use chrono::NaiveDate;
use crossbeam_channel::{unbounded, Receiver, Sender};
use image::RgbaImage;
use log::{debug, trace};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Instant;

use crate::entities::{CapturedFrame, CollageLayout, Decoration};

use super::compositor::{ComposeError, Compositor};
use super::debounced_render::DebouncedRender;
use super::workers::Workers;

/// Everything a composite depends on.
#[derive(Clone, Debug)]
pub struct ComposeJob {
    pub frames: Vec<CapturedFrame>,
    pub layout: CollageLayout,
    pub decoration: Decoration,
    pub date: NaiveDate,
}

impl ComposeJob {
    pub fn run(&self, compositor: &Compositor) -> Result<RgbaImage, ComposeError> {
        compositor.compose(&self.frames, self.layout, &self.decoration, self.date)
    }
}

type Outcome = (u64, Result<RgbaImage, ComposeError>);

/// Debounced, latest-wins composite producer.
pub struct Recomposer {
    compositor: Arc<Compositor>,
    workers: Arc<Workers>,
    debounce: DebouncedRender<ComposeJob>,
    tx: Sender<Outcome>,
    rx: Receiver<Outcome>,
    /// Epoch of the newest dispatched job, if its result is still due.
    in_flight: Option<u64>,
}

impl Recomposer {
    pub fn new(compositor: Arc<Compositor>, workers: Arc<Workers>, delay_ms: u64) -> Self {
        let (tx, rx) = unbounded();
        Self {
            compositor,
            workers,
            debounce: DebouncedRender::new(delay_ms),
            tx,
            rx,
            in_flight: None,
        }
    }

    pub fn compositor(&self) -> &Compositor {
        &self.compositor
    }

    /// Queue a recomposition (coalesced with other requests in the delay window).
    pub fn request(&mut self, job: ComposeJob, now: Instant) {
        self.debounce.schedule_at(job, now);
    }

    /// Drop pending and running work; any result still in flight is ignored.
    pub fn cancel(&mut self) {
        self.debounce.cancel();
        self.workers.bump_epoch();
        self.in_flight = None;
    }

    /// True while a request is waiting out the delay or rendering.
    pub fn is_busy(&self) -> bool {
        self.debounce.is_pending() || self.in_flight.is_some()
    }

    /// Dispatch a due request and collect the newest finished result.
    pub fn tick(&mut self, now: Instant) -> Option<Result<Arc<RgbaImage>, ComposeError>> {
        if let Some(job) = self.debounce.tick_at(now) {
            self.dispatch(job);
        }
        self.collect()
    }

    fn dispatch(&mut self, job: ComposeJob) {
        let epoch = self.workers.bump_epoch();
        let compositor = Arc::clone(&self.compositor);
        let current = self.workers.epoch_ref();
        let tx = self.tx.clone();
        debug!("Recomposer: dispatch epoch {} ({} stickers)", epoch, job.decoration.stickers.len());

        self.workers.execute_with_epoch(epoch, move || {
            let result = job.run(&compositor);
            if current.load(Ordering::Acquire) != epoch {
                trace!("Recomposer: epoch {} finished stale, dropping", epoch);
                return;
            }
            let _ = tx.send((epoch, result));
        });
        self.in_flight = Some(epoch);
    }

    fn collect(&mut self) -> Option<Result<Arc<RgbaImage>, ComposeError>> {
        let mut newest = None;
        for (epoch, result) in self.rx.try_iter() {
            if Some(epoch) != self.in_flight {
                trace!("Recomposer: discarding result of stale epoch {}", epoch);
                continue;
            }
            newest = Some(result.map(Arc::new));
            self.in_flight = None;
        }
        newest
    }

    /// Compose on the calling thread, superseding anything pending.
    pub fn compose_now(&mut self, job: &ComposeJob) -> Result<Arc<RgbaImage>, ComposeError> {
        self.cancel();
        job.run(&self.compositor).map(Arc::new)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;
    use std::sync::atomic::AtomicU64;
    use std::thread;
    use std::time::Duration;

    fn job(caption: &str) -> ComposeJob {
        let mut decoration = Decoration::default();
        decoration.set_caption(caption);
        ComposeJob {
            frames: vec![CapturedFrame::solid(40, 30, Rgba([200, 0, 0, 255]))],
            layout: CollageLayout::Single,
            decoration,
            date: NaiveDate::from_ymd_opt(2026, 10, 17).unwrap(),
        }
    }

    fn recomposer() -> Recomposer {
        let workers = Arc::new(Workers::new(2, Arc::new(AtomicU64::new(0))));
        Recomposer::new(Arc::new(Compositor::default()), workers, 100)
    }

    fn wait_result(r: &mut Recomposer, now: Instant) -> Option<Result<Arc<RgbaImage>, ComposeError>> {
        let deadline = Instant::now() + Duration::from_secs(10);
        while Instant::now() < deadline {
            if let Some(out) = r.tick(now) {
                return Some(out);
            }
            thread::sleep(Duration::from_millis(5));
        }
        None
    }

    #[test]
    fn test_burst_renders_once_after_delay() {
        let mut r = recomposer();
        let t0 = Instant::now();
        r.request(job("a"), t0);
        r.request(job("ab"), t0 + Duration::from_millis(50));
        assert!(r.tick(t0 + Duration::from_millis(120)).is_none());
        assert!(r.is_busy());

        let out = wait_result(&mut r, t0 + Duration::from_millis(200)).unwrap().unwrap();
        assert_eq!(out.dimensions(), (140, 280));
        assert!(!r.is_busy());
    }

    #[test]
    fn test_superseded_result_is_discarded() {
        let mut r = recomposer();
        let t0 = Instant::now();
        r.request(job("first"), t0);
        r.tick(t0 + Duration::from_millis(100));
        // A newer request dispatches before the first result is collected
        r.request(job("second"), t0 + Duration::from_millis(110));
        r.tick(t0 + Duration::from_millis(210));
        let newest = r.in_flight;

        let out = wait_result(&mut r, t0 + Duration::from_millis(300));
        assert!(out.is_some());
        assert!(newest.is_some());
        assert_eq!(r.workers.current_epoch(), newest.unwrap_or_default());
    }

    #[test]
    fn test_cancel_drops_pending() {
        let mut r = recomposer();
        let t0 = Instant::now();
        r.request(job("x"), t0);
        r.cancel();
        assert!(!r.is_busy());
        assert!(r.tick(t0 + Duration::from_secs(1)).is_none());
    }

    #[test]
    fn test_compose_now_reports_errors() {
        let mut r = recomposer();
        let mut bad = job("");
        bad.layout = CollageLayout::Grid2x2;
        assert!(matches!(r.compose_now(&bad), Err(ComposeError::FrameCount { .. })));
        assert!(r.compose_now(&job("ok")).is_ok());
    }
}
