//! # World
//!
//! The explicit context object that owns the entity store and one registry
//! per registered component type. Nothing in the crate is a global or a
//! singleton; constructing two worlds gives two fully independent
//! simulations, which is exactly what tests want.
//!
//! Registries are handed out as `Arc<RwLock<..>>` clones so that jobs can
//! capture them and refresh their caches from worker threads. Component
//! creation and destruction is expected to happen on the driving thread
//! between ticks; the lock makes a violation of that discipline safe
//! (serialized) rather than undefined.

use crate::config::WorldConfig;
use crate::entity::EntityStore;
use crate::error::{EntityError, EntityResult};
use crate::registry::{Component, ComponentRegistry};
use parking_lot::RwLock;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

/// Shared, lock-protected handle to a component type's registry.
pub type SharedRegistry<C> = Arc<RwLock<ComponentRegistry<C>>>;

/// Type-erased registry slot plus its teardown hook.
struct RegistryEntry {
    registry: Box<dyn Any + Send + Sync>,
    clear: fn(&(dyn Any + Send + Sync)),
}

/// Container for one simulation's entities and component registries.
pub struct World {
    entities: EntityStore,
    registries: HashMap<TypeId, RegistryEntry>,
}

impl World {
    /// Creates a world with the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(WorldConfig::default())
    }

    /// Creates a world from an explicit configuration.
    ///
    /// # Panics
    ///
    /// Panics if the configured entity capacity is zero.
    #[must_use]
    pub fn with_config(config: WorldConfig) -> Self {
        Self {
            entities: EntityStore::with_capacity(config.entity_capacity),
            registries: HashMap::new(),
        }
    }

    /// Registers a component type with its declared capacity.
    ///
    /// Idempotent: registering an already-known type is a no-op.
    pub fn register_component<C: Component>(&mut self) {
        self.register_component_with_capacity::<C>(C::CAPACITY);
    }

    /// Registers a component type with an explicit capacity override.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    pub fn register_component_with_capacity<C: Component>(&mut self, capacity: usize) {
        self.registries
            .entry(TypeId::of::<C>())
            .or_insert_with(|| {
                tracing::debug!(component = C::NAME, capacity, "component type registered");
                let registry: SharedRegistry<C> =
                    Arc::new(RwLock::new(ComponentRegistry::with_capacity(capacity)));
                RegistryEntry {
                    registry: Box::new(registry),
                    clear: |any| {
                        if let Some(registry) = any.downcast_ref::<SharedRegistry<C>>() {
                            registry.write().clear();
                        }
                    },
                }
            });
    }

    /// Returns a shared handle to the registry for `C`.
    ///
    /// # Errors
    ///
    /// [`EntityError::UnknownComponent`] if the type was never registered.
    pub fn components<C: Component>(&self) -> EntityResult<SharedRegistry<C>> {
        self.registries
            .get(&TypeId::of::<C>())
            .and_then(|entry| entry.registry.downcast_ref::<SharedRegistry<C>>())
            .cloned()
            .ok_or(EntityError::UnknownComponent { name: C::NAME })
    }

    /// Returns the entity store.
    #[inline]
    #[must_use]
    pub fn entities(&self) -> &EntityStore {
        &self.entities
    }

    /// Returns the entity store mutably.
    #[inline]
    pub fn entities_mut(&mut self) -> &mut EntityStore {
        &mut self.entities
    }

    /// Tears down every entity and every component instance.
    ///
    /// Registered component types stay registered.
    pub fn clear(&mut self) {
        self.entities.clear();
        for entry in self.registries.values() {
            (entry.clear)(entry.registry.as_ref());
        }
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}
