//! # Entity Core Error Types
//!
//! All errors that can occur in the pool/registry/archetype layer.
//!
//! Everything here is non-fatal by design: capacity exhaustion and stale
//! handles degrade gracefully instead of aborting the process. The only
//! fatal condition in the crate is a zero-capacity pool at construction,
//! which panics at startup.

use thiserror::Error;

/// Errors produced by pools, registries, the entity store and archetypes.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EntityError {
    /// A pool has reached its fixed capacity; the create call failed.
    #[error("pool '{pool}' exhausted: capacity {capacity} reached")]
    PoolExhausted {
        /// Label of the pool that ran out of slots.
        pool: &'static str,
        /// The pool's fixed capacity.
        capacity: usize,
    },

    /// A handle referred to an out-of-range, dead, or stale slot.
    #[error("invalid handle into pool '{pool}': index {index}, generation {generation}")]
    InvalidHandle {
        /// Label of the pool the handle was used against.
        pool: &'static str,
        /// Slot index carried by the handle.
        index: u32,
        /// Generation carried by the handle.
        generation: u32,
    },

    /// A component type was used before being registered with the world.
    #[error("component type '{name}' is not registered with this world")]
    UnknownComponent {
        /// The component type's name.
        name: &'static str,
    },

    /// A configuration file or value could not be parsed.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Convenience alias for results in this crate.
pub type EntityResult<T> = Result<T, EntityError>;
