//! # EMBER Entities
//!
//! Pooled entity/component storage with stable lifetimes and no garbage
//! collector:
//!
//! - Slot pools: fixed capacity, index reuse, O(1) amortized churn
//! - Component registries: one pool per type plus owner maps
//! - Entity store: UUID identities behind generation-checked handles
//! - Archetypes: compile-time fixed component sets composed per entity
//!
//! ## Architecture Rules
//!
//! 1. **All pool memory is allocated up front** - steady-state churn never
//!    allocates
//! 2. **Handles, not pointers** - every reference is an index plus a
//!    generation, so stale references are detectable
//! 3. **No hidden globals** - everything hangs off an explicit [`World`]
//!
//! ## Example
//!
//! ```rust,ignore
//! use ember_entities::{Archetype, World};
//!
//! let mut world = World::new();
//! world.register_component::<Position>();
//! world.register_component::<Velocity>();
//!
//! let entity = world.entities_mut().create_entity()?;
//! let id = world.entities().id_of(entity).unwrap();
//!
//! let mut movables: Archetype<(Position, Velocity)> = Archetype::new();
//! movables.create(&world, id)?;
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]

pub mod archetype;
pub mod config;
pub mod entity;
pub mod error;
pub mod pool;
pub mod registry;
pub mod world;

pub use archetype::{Archetype, ComponentSet};
pub use config::WorldConfig;
pub use entity::{Entity, EntityId, EntityRef, EntityStore};
pub use error::{EntityError, EntityResult};
pub use pool::{SlotHandle, SlotPool};
pub use registry::{Component, ComponentRef, ComponentRegistry};
pub use world::{SharedRegistry, World};
