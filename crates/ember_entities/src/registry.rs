//! # Component Registry
//!
//! One registry per component type: a [`SlotPool`] of instances plus owner
//! bookkeeping linking components to the entity that holds them.
//!
//! Ownership maps are kept in both directions (`entity -> component` and
//! `component -> entity`), so owner lookups are O(1) either way. The maps
//! are mutated only through the archetype layer (and the registry's own
//! `destroy`, which evicts the owner entry before releasing the slot so the
//! maps can never refer to a dead slot).

use crate::entity::EntityId;
use crate::error::EntityResult;
use crate::pool::{SlotHandle, SlotPool};
use std::collections::HashMap;

/// Stable reference to a component instance inside its type's registry.
pub type ComponentRef = SlotHandle;

/// Type descriptor for a component: a name for diagnostics and a fixed pool
/// capacity. Field layout is just the implementing struct's fields.
///
/// # Example
///
/// ```rust,ignore
/// #[derive(Default)]
/// struct Position { x: f32, y: f32, z: f32 }
///
/// impl Component for Position {
///     const NAME: &'static str = "position";
///     const CAPACITY: usize = 10_000;
/// }
/// ```
pub trait Component: Send + Sync + 'static {
    /// Human-readable type name, used in logs and errors.
    const NAME: &'static str;
    /// Fixed pool capacity for this component type.
    const CAPACITY: usize;
}

/// Storage and ownership tracking for a single component type.
pub struct ComponentRegistry<C: Component> {
    /// The component instances.
    pool: SlotPool<C>,
    /// Owning entity per component.
    owner_by_component: HashMap<ComponentRef, EntityId>,
    /// Component per owning entity (at most one per entity per type).
    component_by_owner: HashMap<EntityId, ComponentRef>,
}

impl<C: Component> Default for ComponentRegistry<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Component> ComponentRegistry<C> {
    /// Creates a registry with the component's declared capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(C::CAPACITY)
    }

    /// Creates a registry with an explicit capacity override.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            pool: SlotPool::with_label(C::NAME, capacity),
            owner_by_component: HashMap::new(),
            component_by_owner: HashMap::new(),
        }
    }

    /// Creates a default-constructed component instance.
    ///
    /// # Errors
    ///
    /// [`crate::EntityError::PoolExhausted`] when the type's pool is full.
    pub fn create(&mut self) -> EntityResult<ComponentRef>
    where
        C: Default,
    {
        self.pool.create()
    }

    /// Creates a component instance from `value`.
    ///
    /// # Errors
    ///
    /// [`crate::EntityError::PoolExhausted`] when the type's pool is full.
    pub fn create_with(&mut self, value: C) -> EntityResult<ComponentRef> {
        self.pool.create_with(value)
    }

    /// Destroys a component instance.
    ///
    /// Any owner entry is removed first, keeping the owner maps consistent
    /// with pool liveness at all times. Invalid refs log and no-op.
    pub fn destroy(&mut self, component: ComponentRef) -> Option<C> {
        if let Some(owner) = self.owner_by_component.remove(&component) {
            self.component_by_owner.remove(&owner);
        }
        self.pool.destroy(component)
    }

    /// Checks whether `component` refers to a live instance.
    #[inline]
    #[must_use]
    pub fn is_active(&self, component: ComponentRef) -> bool {
        self.pool.is_active(component)
    }

    /// Returns the number of live instances.
    #[inline]
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.pool.active_count()
    }

    /// Gets a reference to a live component instance.
    #[inline]
    #[must_use]
    pub fn get(&self, component: ComponentRef) -> Option<&C> {
        self.pool.get(component)
    }

    /// Gets a mutable reference to a live component instance.
    #[inline]
    pub fn get_mut(&mut self, component: ComponentRef) -> Option<&mut C> {
        self.pool.get_mut(component)
    }

    /// Returns all live refs in ascending slot-index order.
    #[must_use]
    pub fn all(&self) -> Vec<ComponentRef> {
        self.pool.handles().collect()
    }

    /// Iterates over live instances in ascending slot-index order.
    pub fn iter(&self) -> impl Iterator<Item = (ComponentRef, &C)> {
        self.pool.iter()
    }

    /// Records `entity` as the owner of `component`.
    ///
    /// A previous component owned by the same entity, or a previous owner of
    /// the same component, is unlinked first.
    pub fn register_owner(&mut self, entity: EntityId, component: ComponentRef) {
        if !self.pool.is_active(component) {
            tracing::warn!(
                component = C::NAME,
                index = component.index(),
                "refusing to register owner for dead component"
            );
            return;
        }
        if let Some(previous) = self.component_by_owner.insert(entity, component) {
            self.owner_by_component.remove(&previous);
        }
        if let Some(previous_owner) = self.owner_by_component.insert(component, entity) {
            if previous_owner != entity {
                self.component_by_owner.remove(&previous_owner);
            }
        }
    }

    /// Removes the ownership entry for `entity`, if any.
    pub fn unregister_owner(&mut self, entity: EntityId) {
        if let Some(component) = self.component_by_owner.remove(&entity) {
            self.owner_by_component.remove(&component);
        }
    }

    /// Returns the entity owning `component`, if registered. O(1).
    #[inline]
    #[must_use]
    pub fn find_owner_entity(&self, component: ComponentRef) -> Option<EntityId> {
        self.owner_by_component.get(&component).copied()
    }

    /// Returns the component owned by `entity`, if any. O(1).
    #[inline]
    #[must_use]
    pub fn component_for_entity(&self, entity: EntityId) -> Option<ComponentRef> {
        self.component_by_owner.get(&entity).copied()
    }

    /// Iterates over `(owner, component)` pairs for owned instances.
    ///
    /// Order is unspecified.
    pub fn owners(&self) -> impl Iterator<Item = (EntityId, ComponentRef)> + '_ {
        self.component_by_owner
            .iter()
            .map(|(entity, component)| (*entity, *component))
    }

    /// Destroys every instance and forgets all ownership entries.
    pub fn clear(&mut self) {
        self.pool.clear();
        self.owner_by_component.clear();
        self.component_by_owner.clear();
    }
}
