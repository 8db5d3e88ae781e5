//! # System Orchestration
//!
//! A system is a batch-of-jobs producer: each run it creates its jobs,
//! hands them to the scheduler, and is told - via the scheduler's
//! per-tick `on_jobs_completed` signal - when every one of them has
//! finished.
//!
//! The signal fires on every update whether or not jobs ran, so the
//! runner's subscriber checks the batch's completion tokens before
//! declaring the system done. While a system is running, neither it nor
//! any system depending on it can be started again.

use crate::job::{JobBase, JobHandle};
use crate::scheduler::JobScheduler;
use crate::signal::ConnectionId;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A producer of job batches driven by the scheduler's completion signal.
pub trait System: Send + 'static {
    /// The system's name, for logs.
    fn name(&self) -> &str;

    /// Builds this run's jobs. Called once per [`SystemRunner::run`].
    fn create_jobs(&mut self) -> Vec<Box<dyn JobBase>>;

    /// Invoked on the update thread once every job of the current batch
    /// has completed.
    fn on_jobs_completed(&mut self);
}

/// Drives a [`System`] through the scheduler.
///
/// # Example
///
/// ```rust,ignore
/// let mut physics = SystemRunner::new(PhysicsSystem::default());
/// let mut render = SystemRunner::new(RenderSystem::default());
/// render.add_dependency(physics.running_flag());
///
/// // Each tick:
/// physics.run(&scheduler);
/// render.run(&scheduler); // refused while physics is mid-batch
/// scheduler.update(dt);
/// ```
pub struct SystemRunner<S: System> {
    system: Arc<Mutex<S>>,
    is_running: Arc<AtomicBool>,
    dependencies: Vec<Arc<AtomicBool>>,
    connection: Option<ConnectionId>,
}

impl<S: System> SystemRunner<S> {
    /// Wraps a system for scheduling.
    #[must_use]
    pub fn new(system: S) -> Self {
        Self {
            system: Arc::new(Mutex::new(system)),
            is_running: Arc::new(AtomicBool::new(false)),
            dependencies: Vec::new(),
            connection: None,
        }
    }

    /// Returns this runner's running flag, for wiring as a dependency of
    /// other runners.
    #[must_use]
    pub fn running_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.is_running)
    }

    /// Declares that this system must not run while `dependency` is
    /// mid-batch.
    pub fn add_dependency(&mut self, dependency: Arc<AtomicBool>) {
        self.dependencies.push(dependency);
    }

    /// True while the current batch has not yet completed.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.is_running.load(Ordering::Acquire)
    }

    /// True when neither this system nor any dependency is mid-batch.
    #[must_use]
    pub fn can_run(&self) -> bool {
        !self.is_running()
            && self
                .dependencies
                .iter()
                .all(|flag| !flag.load(Ordering::Acquire))
    }

    /// Starts one batch: creates the system's jobs, schedules them, and
    /// subscribes to the completion signal.
    ///
    /// Returns false (and does nothing) when [`Self::can_run`] is false.
    /// A batch with zero jobs completes on the next update.
    pub fn run(&mut self, scheduler: &JobScheduler) -> bool {
        if !self.can_run() {
            return false;
        }
        self.is_running.store(true, Ordering::Release);

        let jobs = self.system.lock().create_jobs();
        tracing::debug!(
            system = self.system.lock().name(),
            jobs = jobs.len(),
            "system batch scheduled"
        );

        // Replace any subscription left over from the previous batch so
        // the system never receives a completion twice.
        if let Some(id) = self.connection.take() {
            scheduler.on_jobs_completed.disconnect(id);
        }

        let handles: Vec<JobHandle> = jobs
            .into_iter()
            .map(|job| scheduler.schedule(job))
            .collect();

        let system = Arc::clone(&self.system);
        let running = Arc::clone(&self.is_running);
        let id = scheduler.on_jobs_completed.connect(move |()| {
            if running.load(Ordering::Acquire)
                && handles.iter().all(JobHandle::is_completed)
            {
                system.lock().on_jobs_completed();
                running.store(false, Ordering::Release);
            }
        });
        self.connection = Some(id);
        true
    }

    /// Drops this runner's completion subscription.
    ///
    /// Call before discarding a runner whose scheduler lives on; the
    /// scheduler's own shutdown disconnects everything anyway.
    pub fn detach(&mut self, scheduler: &JobScheduler) {
        if let Some(id) = self.connection.take() {
            scheduler.on_jobs_completed.disconnect(id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::FnJob;
    use crate::scheduler::SchedulerConfig;
    use std::sync::atomic::AtomicU32;
    use std::time::Duration;

    struct CountingSystem {
        jobs_per_batch: usize,
        executed: Arc<AtomicU32>,
        completions: Arc<AtomicU32>,
    }

    impl System for CountingSystem {
        fn name(&self) -> &str {
            "counting"
        }

        fn create_jobs(&mut self) -> Vec<Box<dyn JobBase>> {
            (0..self.jobs_per_batch)
                .map(|_| {
                    let executed = Arc::clone(&self.executed);
                    Box::new(FnJob::new("count", move |_dt| {
                        executed.fetch_add(1, Ordering::SeqCst);
                    })) as Box<dyn JobBase>
                })
                .collect()
        }

        fn on_jobs_completed(&mut self) {
            self.completions.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn counting(jobs: usize) -> (SystemRunner<CountingSystem>, Arc<AtomicU32>, Arc<AtomicU32>) {
        let executed = Arc::new(AtomicU32::new(0));
        let completions = Arc::new(AtomicU32::new(0));
        let runner = SystemRunner::new(CountingSystem {
            jobs_per_batch: jobs,
            executed: Arc::clone(&executed),
            completions: Arc::clone(&completions),
        });
        (runner, executed, completions)
    }

    #[test]
    fn test_batch_runs_and_completes() {
        let scheduler = JobScheduler::with_config(SchedulerConfig { workers: 2 });
        let (mut runner, executed, completions) = counting(5);

        assert!(runner.run(&scheduler));
        assert!(runner.is_running());
        assert!(scheduler.wait_idle(Duration::from_secs(5)));

        scheduler.update(0.016);
        assert_eq!(executed.load(Ordering::SeqCst), 5);
        assert_eq!(completions.load(Ordering::SeqCst), 1);
        assert!(!runner.is_running());

        // Later updates must not re-notify the finished batch.
        scheduler.update(0.016);
        assert_eq!(completions.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_refuses_to_run_while_running() {
        let scheduler = JobScheduler::with_config(SchedulerConfig { workers: 1 });
        let (mut runner, _executed, _completions) = counting(1);

        assert!(runner.run(&scheduler));
        assert!(!runner.run(&scheduler));
    }

    #[test]
    fn test_dependency_blocks_dependent() {
        let scheduler = JobScheduler::with_config(SchedulerConfig { workers: 2 });
        let (mut upstream, _e1, _c1) = counting(1);
        let (mut downstream, _e2, _c2) = counting(1);
        downstream.add_dependency(upstream.running_flag());

        assert!(upstream.run(&scheduler));
        assert!(!downstream.run(&scheduler));

        assert!(scheduler.wait_idle(Duration::from_secs(5)));
        scheduler.update(0.016);

        assert!(downstream.run(&scheduler));
    }

    #[test]
    fn test_empty_batch_completes_next_update() {
        let scheduler = JobScheduler::with_config(SchedulerConfig { workers: 1 });
        let (mut runner, _executed, completions) = counting(0);

        assert!(runner.run(&scheduler));
        scheduler.update(0.016);
        assert_eq!(completions.load(Ordering::SeqCst), 1);
        assert!(!runner.is_running());
    }
}
