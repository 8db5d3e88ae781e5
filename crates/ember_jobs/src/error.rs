//! # Job System Error Types

use thiserror::Error;

/// Errors that can occur in the job scheduling layer.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum JobError {
    /// A job was scheduled after shutdown began; it was dropped unrun.
    #[error("scheduler is shutting down; job rejected")]
    SchedulerShutDown,

    /// A configuration file or value could not be parsed.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Convenience alias for results in this crate.
pub type JobResult<T> = Result<T, JobError>;
