//! # Job Scheduler
//!
//! A fixed pool of worker threads draining a FIFO pending queue, with
//! dependency gating and a per-tick completion broadcast.
//!
//! ## Architecture
//!
//! ```text
//!   schedule() ──> [Pending Queue] ──> Worker 1..N ──> [Completed Queue]
//!                   (FIFO, condvar)    refresh + run         │
//!                                                            ▼
//!   update(dt) ── drains completed, fires callbacks, emits OnJobsCompleted
//! ```
//!
//! Submission order is preserved into the pending queue; completion order
//! across workers is not. Completion callbacks always run on the thread
//! that calls [`JobScheduler::update`], never on a worker.
//!
//! A job whose dependencies are not yet met is requeued at the back of the
//! pending queue and retried; it is never silently dropped. The
//! `OnJobsCompleted` signal is emitted on **every** update, whether or not
//! any job ran that tick - consumers gate their next action on it.

use crate::error::{JobError, JobResult};
use crate::job::{JobBase, JobHandle};
use crate::signal::Signal;
use parking_lot::{Condvar, Mutex};
use serde::Deserialize;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// How long a worker parks after requeueing a dependency-gated job, so a
/// queue holding only gated jobs does not busy-spin.
const GATED_RETRY_PAUSE: Duration = Duration::from_millis(1);

/// Configuration for the scheduler's worker pool.
#[derive(Clone, Copy, Debug, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Number of worker threads.
    pub workers: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            workers: thread::available_parallelism().map_or(1, std::num::NonZeroUsize::get),
        }
    }
}

impl SchedulerConfig {
    /// Parses a configuration from TOML text.
    ///
    /// Missing keys fall back to their defaults.
    ///
    /// # Errors
    ///
    /// [`JobError::InvalidConfig`] on malformed TOML, or on a zero worker
    /// count.
    pub fn from_toml_str(text: &str) -> JobResult<Self> {
        let config: Self =
            toml::from_str(text).map_err(|e| JobError::InvalidConfig(e.to_string()))?;
        if config.workers == 0 {
            return Err(JobError::InvalidConfig(
                "worker count must be greater than zero".to_string(),
            ));
        }
        Ok(config)
    }
}

/// State shared between the scheduler handle and its workers.
struct Shared {
    /// FIFO queue of jobs waiting for a worker.
    pending: Mutex<VecDeque<Box<dyn JobBase>>>,
    /// Signalled when work arrives or shutdown begins.
    work_available: Condvar,
    /// Jobs whose `execute` has returned, awaiting the next update drain.
    completed: Mutex<Vec<Box<dyn JobBase>>>,
    /// Cleared at shutdown; workers drain and exit.
    running: AtomicBool,
    /// Jobs currently held by a worker.
    in_flight: AtomicUsize,
    /// This tick's delta time, stored as f32 bits.
    delta_time: AtomicU32,
}

/// Dependency-aware job scheduler over a fixed worker-thread pool.
///
/// # Example
///
/// ```rust,ignore
/// let scheduler = JobScheduler::new();
/// scheduler.on_jobs_completed.connect(|()| println!("tick drained"));
///
/// let first = scheduler.schedule(Box::new(build_job()));
/// let mut dependent = build_other_job();
/// dependent.core_mut().add_dependency(first);
/// scheduler.schedule(Box::new(dependent));
///
/// scheduler.update(0.016); // once per tick
/// ```
pub struct JobScheduler {
    shared: Arc<Shared>,
    workers: Vec<JoinHandle<()>>,
    /// Emitted once per [`JobScheduler::update`], after the completed
    /// queue is drained - every tick, jobs or not.
    pub on_jobs_completed: Signal<()>,
}

impl JobScheduler {
    /// Creates a scheduler with one worker per hardware thread.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(SchedulerConfig::default())
    }

    /// Creates a scheduler with an explicit worker count.
    ///
    /// Workers start immediately and block on the queue.
    ///
    /// # Panics
    ///
    /// Panics if the worker count is zero (fatal at startup by design).
    #[must_use]
    pub fn with_config(config: SchedulerConfig) -> Self {
        assert!(config.workers > 0, "Worker count must be greater than zero");

        let shared = Arc::new(Shared {
            pending: Mutex::new(VecDeque::new()),
            work_available: Condvar::new(),
            completed: Mutex::new(Vec::new()),
            running: AtomicBool::new(true),
            in_flight: AtomicUsize::new(0),
            delta_time: AtomicU32::new(0.0f32.to_bits()),
        });

        let workers = (0..config.workers)
            .map(|_| {
                let shared = Arc::clone(&shared);
                thread::spawn(move || worker_loop(&shared))
            })
            .collect();

        tracing::debug!(workers = config.workers, "job scheduler started");

        Self {
            shared,
            workers,
            on_jobs_completed: Signal::new(),
        }
    }

    /// Returns the number of worker threads.
    #[inline]
    #[must_use]
    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Schedules a job, transferring ownership to the scheduler.
    ///
    /// Returns the job's completion token for dependency wiring. If the
    /// scheduler is shutting down the job is dropped unrun (logged) and
    /// the token never completes.
    pub fn schedule(&self, job: Box<dyn JobBase>) -> JobHandle {
        let handle = job.core().handle();
        if let Err(error) = self.try_schedule(job) {
            tracing::warn!(%error, "job rejected");
        }
        handle
    }

    /// Schedules a job, reporting rejection during shutdown.
    ///
    /// # Errors
    ///
    /// [`JobError::SchedulerShutDown`] once shutdown has begun.
    pub fn try_schedule(&self, job: Box<dyn JobBase>) -> JobResult<JobHandle> {
        if !self.shared.running.load(Ordering::Acquire) {
            return Err(JobError::SchedulerShutDown);
        }
        let handle = job.core().handle();
        tracing::debug!(job = job.name(), "job scheduled");
        self.shared.pending.lock().push_back(job);
        self.shared.work_available.notify_one();
        Ok(handle)
    }

    /// Runs one tick: publishes `dt`, drains completed jobs (firing their
    /// completion callbacks on this thread), then emits
    /// [`Self::on_jobs_completed`] unconditionally.
    pub fn update(&self, dt: f32) {
        self.shared.delta_time.store(dt.to_bits(), Ordering::Relaxed);

        let drained: Vec<Box<dyn JobBase>> = std::mem::take(&mut *self.shared.completed.lock());
        for mut job in drained {
            tracing::debug!(job = job.name(), "job drained");
            job.core_mut().post_execute();
        }

        // Fires every tick, jobs or not; consumers gate on it.
        self.on_jobs_completed.emit(&());
    }

    /// Number of jobs waiting for a worker.
    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.shared.pending.lock().len()
    }

    /// Number of executed jobs awaiting the next update drain.
    #[must_use]
    pub fn completed_len(&self) -> usize {
        self.shared.completed.lock().len()
    }

    /// Blocks until no job is pending or executing, or until `timeout`.
    ///
    /// Returns true when the scheduler went idle. Completed jobs may still
    /// be waiting for the next [`Self::update`] drain.
    #[must_use]
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            let idle = self.shared.pending.lock().is_empty()
                && self.shared.in_flight.load(Ordering::Acquire) == 0;
            if idle {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            thread::sleep(Duration::from_micros(100));
        }
    }
}

impl Default for JobScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for JobScheduler {
    /// Stops accepting work, drains in-flight jobs, joins every worker,
    /// then clears queues and subscriptions so no callback can fire after
    /// destruction.
    fn drop(&mut self) {
        self.shared.running.store(false, Ordering::Release);
        self.shared.work_available.notify_all();

        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }

        self.on_jobs_completed.disconnect_all();
        self.shared.pending.lock().clear();
        self.shared.completed.lock().clear();
        tracing::debug!("job scheduler shut down");
    }
}

/// Worker thread main loop.
fn worker_loop(shared: &Shared) {
    loop {
        let mut job = {
            let mut pending = shared.pending.lock();
            while pending.is_empty() && shared.running.load(Ordering::Acquire) {
                shared.work_available.wait(&mut pending);
            }
            // Shutdown with a drained queue: exit. Jobs still queued are
            // executed before the worker leaves.
            let Some(job) = pending.pop_front() else {
                return;
            };
            shared.in_flight.fetch_add(1, Ordering::AcqRel);
            job
        };

        if !job.dependencies_met() {
            if shared.running.load(Ordering::Acquire) {
                // Requeue at the back and park briefly; a queue holding
                // only gated jobs must not spin.
                let mut pending = shared.pending.lock();
                pending.push_back(job);
                shared.in_flight.fetch_sub(1, Ordering::AcqRel);
                shared
                    .work_available
                    .wait_for(&mut pending, GATED_RETRY_PAUSE);
            } else {
                // Its dependency can no longer complete; drop it rather
                // than loop forever during shutdown.
                tracing::warn!(job = job.name(), "gated job dropped at shutdown");
                shared.in_flight.fetch_sub(1, Ordering::AcqRel);
            }
            continue;
        }

        job.core_mut().mark_running();
        job.refresh_cache();

        // Execute outside every queue lock.
        let dt = f32::from_bits(shared.delta_time.load(Ordering::Relaxed));
        job.execute(dt);
        job.core_mut().mark_completed();

        shared.completed.lock().push(job);
        shared.in_flight.fetch_sub(1, Ordering::AcqRel);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::FnJob;
    use std::sync::atomic::AtomicU32;

    fn counting_job(counter: &Arc<AtomicU32>) -> Box<dyn JobBase> {
        let counter = Arc::clone(counter);
        Box::new(FnJob::new("count", move |_dt| {
            counter.fetch_add(1, Ordering::SeqCst);
        }))
    }

    #[test]
    fn test_all_jobs_execute() {
        let scheduler = JobScheduler::with_config(SchedulerConfig { workers: 4 });
        let counter = Arc::new(AtomicU32::new(0));

        for _ in 0..32 {
            scheduler.schedule(counting_job(&counter));
        }

        assert!(scheduler.wait_idle(Duration::from_secs(5)));
        assert_eq!(counter.load(Ordering::SeqCst), 32);

        scheduler.update(0.016);
        assert_eq!(scheduler.completed_len(), 0);
    }

    #[test]
    fn test_signal_fires_every_update() {
        let scheduler = JobScheduler::with_config(SchedulerConfig { workers: 1 });
        let ticks = Arc::new(AtomicU32::new(0));

        let ticks_cb = Arc::clone(&ticks);
        scheduler.on_jobs_completed.connect(move |()| {
            ticks_cb.fetch_add(1, Ordering::SeqCst);
        });

        // No jobs at all: the signal still fires once per update.
        scheduler.update(0.016);
        scheduler.update(0.016);
        scheduler.update(0.016);
        assert_eq!(ticks.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_callbacks_run_on_update_thread() {
        let scheduler = JobScheduler::with_config(SchedulerConfig { workers: 2 });
        let update_thread = thread::current().id();
        let checked = Arc::new(AtomicBool::new(false));

        let mut job = FnJob::new("probe", |_dt| {});
        let checked_cb = Arc::clone(&checked);
        job.core_mut().on_completed(move || {
            assert_eq!(thread::current().id(), update_thread);
            checked_cb.store(true, Ordering::SeqCst);
        });

        scheduler.schedule(Box::new(job));
        assert!(scheduler.wait_idle(Duration::from_secs(5)));
        scheduler.update(0.016);

        assert!(checked.load(Ordering::SeqCst));
    }

    #[test]
    fn test_dependency_ordering() {
        let scheduler = JobScheduler::with_config(SchedulerConfig { workers: 4 });
        let order = Arc::new(Mutex::new(Vec::new()));

        let order_a = Arc::clone(&order);
        let mut slow = FnJob::new("slow", move |_dt| {
            thread::sleep(Duration::from_millis(20));
            order_a.lock().push("slow");
        });

        let order_b = Arc::clone(&order);
        let mut gated = FnJob::new("gated", move |_dt| {
            order_b.lock().push("gated");
        });
        gated.core_mut().add_dependency(slow.core().handle());

        // Schedule the dependent first to force at least one requeue.
        scheduler.schedule(Box::new(gated));
        let _slow = scheduler.schedule(Box::new(slow));

        assert!(scheduler.wait_idle(Duration::from_secs(5)));
        assert_eq!(*order.lock(), vec!["slow", "gated"]);
    }

    #[test]
    fn test_parallelism_bound() {
        const WORKERS: usize = 4;
        const JOBS: usize = 8;
        const BLOCK: Duration = Duration::from_millis(30);

        let scheduler = JobScheduler::with_config(SchedulerConfig { workers: WORKERS });

        let start = Instant::now();
        for _ in 0..JOBS {
            scheduler.schedule(Box::new(FnJob::new("block", |_dt| {
                thread::sleep(BLOCK);
            })));
        }
        assert!(scheduler.wait_idle(Duration::from_secs(10)));
        let elapsed = start.elapsed();

        // Serial time would be JOBS * BLOCK; with W > 1 workers we must
        // finish strictly faster.
        assert!(
            elapsed < BLOCK * (JOBS as u32),
            "no parallel speedup: {elapsed:?}"
        );
    }

    #[test]
    fn test_dt_reaches_jobs() {
        let scheduler = JobScheduler::with_config(SchedulerConfig { workers: 1 });
        scheduler.update(0.25);

        let seen = Arc::new(Mutex::new(0.0f32));
        let seen_job = Arc::clone(&seen);
        scheduler.schedule(Box::new(FnJob::new("probe", move |dt| {
            *seen_job.lock() = dt;
        })));

        assert!(scheduler.wait_idle(Duration::from_secs(5)));
        assert!((*seen.lock() - 0.25).abs() < f32::EPSILON);
    }

    #[test]
    fn test_schedule_after_shutdown_is_rejected() {
        let scheduler = JobScheduler::with_config(SchedulerConfig { workers: 1 });
        scheduler.shared.running.store(false, Ordering::Release);

        let result = scheduler.try_schedule(Box::new(FnJob::new("late", |_| {})));
        assert_eq!(result.err(), Some(JobError::SchedulerShutDown));

        // The infallible form drops the job; the handle never completes.
        let handle = scheduler.schedule(Box::new(FnJob::new("late", |_| {})));
        assert!(!handle.is_completed());

        // Put the flag back so drop can join cleanly.
        scheduler.shared.running.store(true, Ordering::Release);
    }

    #[test]
    fn test_config_from_toml() {
        let config = SchedulerConfig::from_toml_str("workers = 3").unwrap();
        assert_eq!(config.workers, 3);

        assert!(SchedulerConfig::from_toml_str("workers = 0").is_err());
        assert!(SchedulerConfig::from_toml_str("workers = \"all\"").is_err());
    }
}
