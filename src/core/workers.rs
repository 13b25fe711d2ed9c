//! Background thread pool for detection passes and recomposition.
//!
//! Workers pull closures from a shared crossbeam `Injector`. Jobs tagged
//! with an epoch are skipped at execution time if the shared epoch moved on,
//! so a burst of recomposition requests collapses to the newest one.

use crossbeam::deque::{Injector, Steal};
use log::{error, trace};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

type Job = Box<dyn FnOnce() + Send + 'static>;

/// How long `Drop` waits for running jobs before detaching the threads.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_millis(500);

/// Fixed-size worker pool with an epoch counter for cancellable jobs.
///
/// # Example
/// ```ignore
/// let workers = Workers::new(2, Arc::new(AtomicU64::new(0)));
/// let epoch = workers.bump_epoch();
/// workers.execute_with_epoch(epoch, move || compose_and_publish());
/// ```
pub struct Workers {
    injector: Arc<Injector<Job>>,
    handles: Vec<thread::JoinHandle<()>>,
    current_epoch: Arc<AtomicU64>,
    shutdown: Arc<AtomicBool>,
}

impl Workers {
    /// Create pool with `num_threads` threads sharing `epoch`.
    ///
    /// Recommended: `num_cpus::get() / 2` (preview and capture keep their own threads).
    pub fn new(num_threads: usize, epoch: Arc<AtomicU64>) -> Self {
        let injector: Arc<Injector<Job>> = Arc::new(Injector::new());
        let shutdown = Arc::new(AtomicBool::new(false));
        let mut handles = Vec::with_capacity(num_threads);

        for worker_id in 0..num_threads.max(1) {
            let injector = Arc::clone(&injector);
            let shutdown = Arc::clone(&shutdown);

            let spawned = thread::Builder::new()
                .name(format!("starbooth-worker-{}", worker_id))
                .spawn(move || {
                    trace!("Worker {} started", worker_id);
                    loop {
                        match injector.steal() {
                            Steal::Success(job) => job(),
                            Steal::Retry => continue,
                            Steal::Empty => {
                                if shutdown.load(Ordering::Relaxed) {
                                    break;
                                }
                                // Idle: short sleep instead of spinning
                                thread::sleep(Duration::from_millis(1));
                            }
                        }
                    }
                    trace!("Worker {} stopped", worker_id);
                });

            match spawned {
                Ok(handle) => handles.push(handle),
                Err(e) => error!("Failed to spawn worker {}: {}", worker_id, e),
            }
        }

        trace!("Workers initialized: {} threads", handles.len());

        Self {
            injector,
            handles,
            current_epoch: epoch,
            shutdown,
        }
    }

    /// Pool sized for this machine.
    pub fn with_default_threads() -> Self {
        Self::new((num_cpus::get() / 2).max(1), Arc::new(AtomicU64::new(0)))
    }

    pub fn num_threads(&self) -> usize {
        self.handles.len()
    }

    /// Run closure on a worker thread.
    pub fn execute<F>(&self, f: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.injector.push(Box::new(f));
    }

    pub fn current_epoch(&self) -> u64 {
        self.current_epoch.load(Ordering::Acquire)
    }

    /// Advance the epoch, invalidating every queued epoch job. Returns the new epoch.
    pub fn bump_epoch(&self) -> u64 {
        self.current_epoch.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Shared epoch counter, for jobs that re-check it when they finish.
    pub fn epoch_ref(&self) -> Arc<AtomicU64> {
        Arc::clone(&self.current_epoch)
    }

    /// Run closure only if `epoch` is still current when a worker picks it up.
    pub fn execute_with_epoch<F>(&self, epoch: u64, f: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let current_epoch = Arc::clone(&self.current_epoch);
        self.injector.push(Box::new(move || {
            let now = current_epoch.load(Ordering::Acquire);
            if now == epoch {
                f();
            } else {
                trace!("Skipping stale job: epoch {} != current {}", epoch, now);
            }
        }));
    }
}

impl Drop for Workers {
    fn drop(&mut self) {
        let num_threads = self.handles.len();
        trace!("Workers shutting down ({} threads)...", num_threads);
        self.shutdown.store(true, Ordering::SeqCst);

        let deadline = Instant::now() + SHUTDOWN_TIMEOUT;
        for handle in std::mem::take(&mut self.handles) {
            while !handle.is_finished() {
                if Instant::now() >= deadline {
                    trace!("Shutdown timeout reached, detaching remaining workers");
                    return;
                }
                thread::sleep(Duration::from_millis(1));
            }
            let _ = handle.join();
        }
        trace!("All {} workers stopped", num_threads);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn wait_for(mut cond: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(2);
        while Instant::now() < deadline {
            if cond() {
                return true;
            }
            thread::sleep(Duration::from_millis(2));
        }
        false
    }

    #[test]
    fn test_execute_runs_jobs() {
        let workers = Workers::new(2, Arc::new(AtomicU64::new(0)));
        let counter = Arc::new(AtomicUsize::new(0));
        for _ in 0..10 {
            let c = Arc::clone(&counter);
            workers.execute(move || {
                c.fetch_add(1, Ordering::SeqCst);
            });
        }
        assert!(wait_for(|| counter.load(Ordering::SeqCst) == 10));
    }

    #[test]
    fn test_stale_epoch_skipped() {
        let workers = Workers::new(1, Arc::new(AtomicU64::new(0)));
        let ran = Arc::new(AtomicUsize::new(0));

        // Block the only worker so both jobs queue up behind it
        let gate = Arc::new(AtomicBool::new(false));
        let g = Arc::clone(&gate);
        workers.execute(move || {
            while !g.load(Ordering::SeqCst) {
                thread::sleep(Duration::from_millis(1));
            }
        });

        let stale = workers.bump_epoch();
        let r = Arc::clone(&ran);
        workers.execute_with_epoch(stale, move || {
            r.fetch_add(1, Ordering::SeqCst);
        });
        let fresh = workers.bump_epoch();
        let r = Arc::clone(&ran);
        workers.execute_with_epoch(fresh, move || {
            r.fetch_add(10, Ordering::SeqCst);
        });

        gate.store(true, Ordering::SeqCst);
        assert!(wait_for(|| ran.load(Ordering::SeqCst) == 10));
        thread::sleep(Duration::from_millis(20));
        assert_eq!(ran.load(Ordering::SeqCst), 10);
    }

    #[test]
    fn test_drop_stops_threads() {
        let workers = Workers::new(3, Arc::new(AtomicU64::new(0)));
        assert_eq!(workers.num_threads(), 3);
        let start = Instant::now();
        drop(workers);
        assert!(start.elapsed() < Duration::from_secs(1));
    }
}
