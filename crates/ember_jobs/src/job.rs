//! # Job Model
//!
//! A job is a named unit of work: a function over cached component inputs,
//! a list of dependencies on other jobs, and completion callbacks.
//!
//! Lifecycle: `Queued -> Running -> Completed`. A worker moves a job to
//! `Running` only once every dependency's completed flag is set. After
//! `execute` returns the worker marks the job completed (unblocking
//! dependents immediately); the completion callbacks run later, on the
//! thread that drives [`crate::JobScheduler::update`].
//!
//! Component inputs are captured as shared registry handles at
//! construction. `refresh_cache` re-reads the live refs just before
//! execution, so a cache built before pool churn never dangles - dead refs
//! simply drop out of the next refresh, and `execute` double-checks each
//! ref against the registry anyway.

use ember_entities::{Component, ComponentRef, EntityResult, SharedRegistry, World};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Execution state of a job.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JobState {
    /// Waiting in the pending queue.
    Queued,
    /// Executing on a worker thread.
    Running,
    /// Finished executing; waiting to be drained (or already drained).
    Completed,
}

/// Cheap, cloneable completion token for a job.
///
/// Hand this to other jobs as a dependency, or poll it from the driving
/// thread.
#[derive(Clone)]
pub struct JobHandle {
    completed: Arc<AtomicBool>,
}

impl JobHandle {
    /// Returns true once the job's `execute` has finished.
    #[inline]
    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.completed.load(Ordering::Acquire)
    }
}

/// State shared by every job type: name, lifecycle, dependencies and
/// completion callbacks.
pub struct JobCore {
    name: String,
    state: JobState,
    completed: Arc<AtomicBool>,
    dependencies: Vec<JobHandle>,
    callbacks: Vec<Box<dyn FnOnce() + Send>>,
}

impl JobCore {
    /// Creates a core in the `Queued` state.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: JobState::Queued,
            completed: Arc::new(AtomicBool::new(false)),
            dependencies: Vec::new(),
            callbacks: Vec::new(),
        }
    }

    /// Returns the job's name.
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the job's current lifecycle state.
    #[inline]
    #[must_use]
    pub const fn state(&self) -> JobState {
        self.state
    }

    /// Marks the job as running on a worker.
    pub fn mark_running(&mut self) {
        self.state = JobState::Running;
    }

    /// Marks the job completed, unblocking dependents.
    pub fn mark_completed(&mut self) {
        self.state = JobState::Completed;
        self.completed.store(true, Ordering::Release);
    }

    /// Returns a completion token for dependency wiring.
    #[must_use]
    pub fn handle(&self) -> JobHandle {
        JobHandle {
            completed: Arc::clone(&self.completed),
        }
    }

    /// Adds a dependency: this job will not run until `dependency`
    /// completes.
    pub fn add_dependency(&mut self, dependency: JobHandle) {
        self.dependencies.push(dependency);
    }

    /// Registers a callback to fire once after the job completes.
    pub fn on_completed<F>(&mut self, callback: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.callbacks.push(Box::new(callback));
    }

    /// True when every dependency's completed flag is set.
    #[must_use]
    pub fn dependencies_met(&self) -> bool {
        self.dependencies.iter().all(JobHandle::is_completed)
    }

    /// Fires each completion callback once and clears the list.
    ///
    /// Idempotent: a second call is a no-op because the list is already
    /// empty.
    pub fn post_execute(&mut self) {
        for callback in self.callbacks.drain(..) {
            callback();
        }
    }
}

/// Object-safe interface the scheduler drives jobs through.
pub trait JobBase: Send {
    /// Shared job state.
    fn core(&self) -> &JobCore;
    /// Shared job state, mutably.
    fn core_mut(&mut self) -> &mut JobCore;

    /// Repopulates cached inputs from live registry state.
    ///
    /// Invoked by a worker immediately before [`JobBase::execute`], so
    /// refs cached before any intervening pool churn are never used.
    fn refresh_cache(&mut self);

    /// Runs the job's work for this tick.
    fn execute(&mut self, dt: f32);

    /// The job's name, for logs.
    fn name(&self) -> &str {
        self.core().name()
    }

    /// True when every dependency has completed.
    fn dependencies_met(&self) -> bool {
        self.core().dependencies_met()
    }
}

/// A job with no component inputs: just a closure.
///
/// Useful for barriers, bookkeeping ticks, and tests.
pub struct FnJob {
    core: JobCore,
    func: Box<dyn FnMut(f32) + Send>,
}

impl FnJob {
    /// Creates a closure job.
    #[must_use]
    pub fn new<F>(name: impl Into<String>, func: F) -> Self
    where
        F: FnMut(f32) + Send + 'static,
    {
        Self {
            core: JobCore::new(name),
            func: Box::new(func),
        }
    }
}

impl JobBase for FnJob {
    fn core(&self) -> &JobCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut JobCore {
        &mut self.core
    }

    fn refresh_cache(&mut self) {}

    fn execute(&mut self, dt: f32) {
        (self.func)(dt);
    }
}

/// Fixed-arity component input description for a [`Job`].
///
/// Implemented for tuples of distinct [`Component`] types up to arity
/// three. The types in a tuple must be distinct: the same registry cannot
/// be write-locked twice by one job.
pub trait JobInputs: Send + Sync + 'static {
    /// Shared registry handles captured at job construction.
    type Registries: Clone + Send + Sync + 'static;
    /// One cached cache entry: a tuple of component refs.
    type Refs: Copy + Send + 'static;
    /// The job function signature for this arity.
    type Func: Send + 'static;

    /// Captures registry handles from the world.
    ///
    /// # Errors
    ///
    /// [`ember_entities::EntityError::UnknownComponent`] if any type in
    /// the tuple was never registered.
    fn registries(world: &World) -> EntityResult<Self::Registries>;

    /// Collects the current live input tuples.
    ///
    /// Arity one yields every live component; higher arities yield one
    /// tuple per entity owning all of the types (an owner-map join).
    fn collect(registries: &Self::Registries) -> Vec<Self::Refs>;

    /// Runs `func` over each cached tuple, skipping entries whose refs
    /// died since the cache was refreshed.
    fn apply(registries: &Self::Registries, cache: &[Self::Refs], dt: f32, func: &mut Self::Func);
}

/// A job over a fixed tuple of component types.
///
/// # Example
///
/// ```rust,ignore
/// let job: Job<(Position, Velocity)> = Job::new(
///     "integrate",
///     &world,
///     Box::new(|dt, position: &mut Position, velocity: &mut Velocity| {
///         position.x += velocity.dx * dt;
///     }),
/// )?;
/// scheduler.schedule(Box::new(job));
/// ```
pub struct Job<S: JobInputs> {
    core: JobCore,
    registries: S::Registries,
    cache: Vec<S::Refs>,
    func: S::Func,
}

impl<S: JobInputs> Job<S> {
    /// Creates a job, capturing registry handles from `world`.
    ///
    /// # Errors
    ///
    /// [`ember_entities::EntityError::UnknownComponent`] if any component
    /// type in the tuple was never registered with the world.
    pub fn new(name: impl Into<String>, world: &World, func: S::Func) -> EntityResult<Self> {
        Ok(Self::from_registries(name, S::registries(world)?, func))
    }

    /// Creates a job from already-captured registry handles.
    #[must_use]
    pub fn from_registries(name: impl Into<String>, registries: S::Registries, func: S::Func) -> Self {
        Self {
            core: JobCore::new(name),
            registries,
            cache: Vec::new(),
            func,
        }
    }

    /// Number of cached input tuples from the last refresh.
    #[inline]
    #[must_use]
    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }
}

impl<S: JobInputs> JobBase for Job<S> {
    fn core(&self) -> &JobCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut JobCore {
        &mut self.core
    }

    fn refresh_cache(&mut self) {
        self.cache = S::collect(&self.registries);
        tracing::debug!(job = self.core.name(), entries = self.cache.len(), "cache refreshed");
    }

    fn execute(&mut self, dt: f32) {
        S::apply(&self.registries, &self.cache, dt, &mut self.func);
    }
}

impl<A: Component> JobInputs for (A,) {
    type Registries = (SharedRegistry<A>,);
    type Refs = (ComponentRef,);
    type Func = Box<dyn FnMut(f32, &mut A) + Send>;

    fn registries(world: &World) -> EntityResult<Self::Registries> {
        Ok((world.components::<A>()?,))
    }

    fn collect(registries: &Self::Registries) -> Vec<Self::Refs> {
        registries.0.read().all().into_iter().map(|r| (r,)).collect()
    }

    fn apply(registries: &Self::Registries, cache: &[Self::Refs], dt: f32, func: &mut Self::Func) {
        let mut a = registries.0.write();
        for &(ra,) in cache {
            if let Some(component) = a.get_mut(ra) {
                func(dt, component);
            }
        }
    }
}

impl<A: Component, B: Component> JobInputs for (A, B) {
    type Registries = (SharedRegistry<A>, SharedRegistry<B>);
    type Refs = (ComponentRef, ComponentRef);
    type Func = Box<dyn FnMut(f32, &mut A, &mut B) + Send>;

    fn registries(world: &World) -> EntityResult<Self::Registries> {
        Ok((world.components::<A>()?, world.components::<B>()?))
    }

    fn collect(registries: &Self::Registries) -> Vec<Self::Refs> {
        let a = registries.0.read();
        let b = registries.1.read();
        let mut tuples: Vec<Self::Refs> = a
            .owners()
            .filter_map(|(entity, ra)| b.component_for_entity(entity).map(|rb| (ra, rb)))
            .collect();
        tuples.sort_by_key(|(ra, _)| ra.index());
        tuples
    }

    fn apply(registries: &Self::Registries, cache: &[Self::Refs], dt: f32, func: &mut Self::Func) {
        // Registries are locked in tuple order; declare tuples in a
        // consistent order across jobs that share types.
        let mut a = registries.0.write();
        let mut b = registries.1.write();
        for &(ra, rb) in cache {
            if let (Some(ca), Some(cb)) = (a.get_mut(ra), b.get_mut(rb)) {
                func(dt, ca, cb);
            }
        }
    }
}

impl<A: Component, B: Component, C: Component> JobInputs for (A, B, C) {
    type Registries = (SharedRegistry<A>, SharedRegistry<B>, SharedRegistry<C>);
    type Refs = (ComponentRef, ComponentRef, ComponentRef);
    type Func = Box<dyn FnMut(f32, &mut A, &mut B, &mut C) + Send>;

    fn registries(world: &World) -> EntityResult<Self::Registries> {
        Ok((
            world.components::<A>()?,
            world.components::<B>()?,
            world.components::<C>()?,
        ))
    }

    fn collect(registries: &Self::Registries) -> Vec<Self::Refs> {
        let a = registries.0.read();
        let b = registries.1.read();
        let c = registries.2.read();
        let mut tuples: Vec<Self::Refs> = a
            .owners()
            .filter_map(|(entity, ra)| {
                let rb = b.component_for_entity(entity)?;
                let rc = c.component_for_entity(entity)?;
                Some((ra, rb, rc))
            })
            .collect();
        tuples.sort_by_key(|(ra, _, _)| ra.index());
        tuples
    }

    fn apply(registries: &Self::Registries, cache: &[Self::Refs], dt: f32, func: &mut Self::Func) {
        let mut a = registries.0.write();
        let mut b = registries.1.write();
        let mut c = registries.2.write();
        for &(ra, rb, rc) in cache {
            if let (Some(ca), Some(cb), Some(cc)) = (a.get_mut(ra), b.get_mut(rb), c.get_mut(rc)) {
                func(dt, ca, cb, cc);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ember_entities::EntityId;
    use std::sync::atomic::AtomicU32;

    #[derive(Default)]
    struct Counter {
        value: u32,
    }

    impl Component for Counter {
        const NAME: &'static str = "counter";
        const CAPACITY: usize = 32;
    }

    #[derive(Default)]
    struct Scale {
        factor: u32,
    }

    impl Component for Scale {
        const NAME: &'static str = "scale";
        const CAPACITY: usize = 32;
    }

    fn world() -> World {
        let mut world = World::new();
        world.register_component::<Counter>();
        world.register_component::<Scale>();
        world
    }

    #[test]
    fn test_fn_job_lifecycle() {
        let hits = Arc::new(AtomicU32::new(0));
        let hits_job = Arc::clone(&hits);
        let mut job = FnJob::new("tick", move |_dt| {
            hits_job.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(job.core().state(), JobState::Queued);
        assert!(!job.core().handle().is_completed());

        job.refresh_cache();
        job.core_mut().mark_running();
        job.execute(0.16);
        job.core_mut().mark_completed();

        assert_eq!(job.core().state(), JobState::Completed);
        assert!(job.core().handle().is_completed());
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_post_execute_fires_once() {
        let hits = Arc::new(AtomicU32::new(0));
        let mut job = FnJob::new("noop", |_| {});

        let hits_cb = Arc::clone(&hits);
        job.core_mut().on_completed(move || {
            hits_cb.fetch_add(1, Ordering::SeqCst);
        });

        job.core_mut().post_execute();
        job.core_mut().post_execute();
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_dependencies_met() {
        let mut first = FnJob::new("first", |_| {});
        let mut second = FnJob::new("second", |_| {});
        second.core_mut().add_dependency(first.core().handle());

        assert!(first.dependencies_met());
        assert!(!second.dependencies_met());

        first.core_mut().mark_completed();
        assert!(second.dependencies_met());
    }

    #[test]
    fn test_single_type_cache_and_execute() {
        let world = world();
        let counters = world.components::<Counter>().unwrap();
        for _ in 0..5 {
            counters.write().create().unwrap();
        }

        let mut job: Job<(Counter,)> = Job::<(Counter,)>::new(
            "bump",
            &world,
            Box::new(|_dt, counter: &mut Counter| {
                counter.value += 1;
            }),
        )
        .unwrap();

        job.refresh_cache();
        assert_eq!(job.cache_len(), 5);
        job.execute(1.0);

        let counters = counters.read();
        assert!(counters.iter().all(|(_, c)| c.value == 1));
    }

    #[test]
    fn test_refresh_drops_stale_refs() {
        let world = world();
        let counters = world.components::<Counter>().unwrap();
        let doomed = counters.write().create().unwrap();
        counters.write().create().unwrap();

        let mut job: Job<(Counter,)> = Job::<(Counter,)>::new(
            "bump",
            &world,
            Box::new(|_dt, counter: &mut Counter| {
                counter.value += 1;
            }),
        )
        .unwrap();

        job.refresh_cache();
        assert_eq!(job.cache_len(), 2);

        // Churn between refreshes: the dead ref must vanish on the next
        // refresh, and execute never touches reused memory meanwhile.
        counters.write().destroy(doomed);
        job.refresh_cache();
        assert_eq!(job.cache_len(), 1);

        job.execute(1.0);
        assert_eq!(counters.read().active_count(), 1);
    }

    #[test]
    fn test_two_type_join() {
        let world = world();
        let counters = world.components::<Counter>().unwrap();
        let scales = world.components::<Scale>().unwrap();

        // Two entities with both types, one with only a counter.
        for _ in 0..2 {
            let entity = EntityId::generate();
            let rc = counters.write().create().unwrap();
            counters.write().register_owner(entity, rc);
            let rs = scales.write().create_with(Scale { factor: 3 }).unwrap();
            scales.write().register_owner(entity, rs);
        }
        let lonely = EntityId::generate();
        let rc = counters.write().create().unwrap();
        counters.write().register_owner(lonely, rc);

        let mut job: Job<(Counter, Scale)> = Job::<(Counter, Scale)>::new(
            "scale-up",
            &world,
            Box::new(|_dt, counter: &mut Counter, scale: &mut Scale| {
                counter.value += scale.factor;
            }),
        )
        .unwrap();

        job.refresh_cache();
        assert_eq!(job.cache_len(), 2);
        job.execute(1.0);

        let bumped = counters
            .read()
            .iter()
            .filter(|(_, c)| c.value == 3)
            .count();
        assert_eq!(bumped, 2);
    }

    #[test]
    fn test_unregistered_type_is_an_error() {
        let world = World::new();
        let result: EntityResult<Job<(Counter,)>> =
            Job::<(Counter,)>::new("bump", &world, Box::new(|_, _: &mut Counter| {}));
        assert!(result.is_err());
    }
}
