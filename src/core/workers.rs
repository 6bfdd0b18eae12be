//! Background pool for clip fetches (alphabet preload, on-demand word loads)
//!
//! Work-stealing deques from crossbeam: external jobs go through a global
//! injector, idle workers steal from each other. Jobs can be tagged with the
//! scheduler epoch; a tagged job whose epoch is stale by the time a worker
//! picks it up is dropped without running.

use crossbeam::deque::{Injector, Stealer, Worker};
use log::trace;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread;
use std::time::{Duration, Instant};

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Idle back-off between empty polls
const IDLE_SLEEP: Duration = Duration::from_millis(1);

/// Total time Drop waits for workers to finish
const SHUTDOWN_TIMEOUT: Duration = Duration::from_millis(500);

/// Fetch worker pool sharing the scheduler's epoch counter.
pub struct Workers {
    injector: Arc<Injector<Job>>,
    handles: Vec<thread::JoinHandle<()>>,
    epoch: Arc<AtomicU64>,
    shutdown: Arc<AtomicBool>,
}

impl Workers {
    /// Spawn `num_threads` workers (at least one).
    pub fn new(num_threads: usize, epoch: Arc<AtomicU64>) -> Self {
        let num_threads = num_threads.max(1);
        let injector: Arc<Injector<Job>> = Arc::new(Injector::new());
        let shutdown = Arc::new(AtomicBool::new(false));

        let locals: Vec<Worker<Job>> = (0..num_threads).map(|_| Worker::new_fifo()).collect();
        let stealers: Vec<Stealer<Job>> = locals.iter().map(|w| w.stealer()).collect();

        let handles = locals
            .into_iter()
            .enumerate()
            .map(|(worker_id, local)| {
                let injector = Arc::clone(&injector);
                let shutdown = Arc::clone(&shutdown);
                let stealers = stealers.clone();
                thread::Builder::new()
                    .name(format!("signplay-fetch-{}", worker_id))
                    .spawn(move || worker_loop(worker_id, local, &injector, &stealers, &shutdown))
                    .expect("Failed to spawn fetch worker thread")
            })
            .collect();

        trace!("Workers initialized: {} threads", num_threads);

        Self {
            injector,
            handles,
            epoch,
            shutdown,
        }
    }

    /// Default pool size: half the cores, at least one
    pub fn default_threads() -> usize {
        (num_cpus::get() / 2).max(1)
    }

    /// Run a job regardless of epoch (cache preloads).
    pub fn execute<F>(&self, f: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.injector.push(Box::new(f));
    }

    /// Run a job only if `epoch` is still current when a worker picks it up.
    pub fn execute_with_epoch<F>(&self, epoch: u64, f: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let current = Arc::clone(&self.epoch);
        self.injector.push(Box::new(move || {
            if current.load(Ordering::Acquire) == epoch {
                f();
            } else {
                trace!("Dropping stale fetch job (epoch {})", epoch);
            }
        }));
    }

    pub fn current_epoch(&self) -> u64 {
        self.epoch.load(Ordering::Acquire)
    }

    pub fn threads(&self) -> usize {
        self.handles.len()
    }
}

fn worker_loop(
    worker_id: usize,
    local: Worker<Job>,
    injector: &Injector<Job>,
    stealers: &[Stealer<Job>],
    shutdown: &AtomicBool,
) {
    trace!("Fetch worker {} started", worker_id);
    loop {
        let job = local
            .pop()
            .or_else(|| injector.steal_batch_and_pop(&local).success())
            .or_else(|| stealers.iter().find_map(|s| s.steal().success()));

        if let Some(job) = job {
            job();
            continue;
        }
        if shutdown.load(Ordering::Relaxed) {
            break;
        }
        thread::sleep(IDLE_SLEEP);
    }
    trace!("Fetch worker {} stopped", worker_id);
}

impl Drop for Workers {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);

        let deadline = Instant::now() + SHUTDOWN_TIMEOUT;
        for handle in std::mem::take(&mut self.handles) {
            while !handle.is_finished() {
                if Instant::now() >= deadline {
                    trace!("Worker shutdown timeout reached, detaching remaining threads");
                    return;
                }
                thread::sleep(IDLE_SLEEP);
            }
            let _ = handle.join();
        }
        trace!("All fetch workers stopped");
    }
}
