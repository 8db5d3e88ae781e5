//! # EMBER Jobs
//!
//! Dependency-aware job execution for the EMBER entity core:
//!
//! - [`Signal`]: multi-subscriber broadcast with reentrancy-safe emission
//! - [`Job`] / [`FnJob`]: units of work with cached component inputs,
//!   dependency tokens, and completion callbacks
//! - [`JobScheduler`]: fixed worker pool, FIFO queue, dependency gating,
//!   per-tick completion broadcast
//! - [`System`] / [`SystemRunner`]: batch orchestration gated on the
//!   completion signal
//!
//! ## Threading Model
//!
//! One driving thread calls [`JobScheduler::update`] once per tick;
//! workers only refresh caches and execute. Completion callbacks always
//! run on the driving thread. Component pools themselves are locked per
//! registry, so jobs touching disjoint component types run fully in
//! parallel.
//!
//! ## Example
//!
//! ```rust,ignore
//! use ember_jobs::{Job, JobScheduler};
//!
//! let scheduler = JobScheduler::new();
//! let job: Job<(Position, Velocity)> = Job::new(
//!     "integrate",
//!     &world,
//!     Box::new(|dt, p: &mut Position, v: &mut Velocity| {
//!         p.x += v.dx * dt;
//!     }),
//! )?;
//! scheduler.schedule(Box::new(job));
//! scheduler.update(0.016);
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod job;
pub mod scheduler;
pub mod signal;
pub mod system;

pub use error::{JobError, JobResult};
pub use job::{FnJob, Job, JobBase, JobCore, JobHandle, JobInputs, JobState};
pub use scheduler::{JobScheduler, SchedulerConfig};
pub use signal::{ConnectionId, Signal};
pub use system::{System, SystemRunner};
