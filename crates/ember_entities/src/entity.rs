//! # Entity Store
//!
//! Entities are pure identities: a UUID and nothing else. They do not own
//! their components; ownership lives in each component type's registry,
//! linked only by the shared [`EntityId`] (a logical foreign key, not a
//! structural pointer).
//!
//! The store is an explicitly constructed value owned by the
//! [`crate::World`] - there is no hidden global, so tests can run several
//! independent worlds side by side.

use crate::error::EntityResult;
use crate::pool::{SlotHandle, SlotPool};
use std::fmt;
use uuid::Uuid;

/// Unique identity of an entity, stable for the entity's whole lifetime.
///
/// Backed by a v4 UUID; [`fmt::Display`] renders the canonical hyphenated
/// string form.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct EntityId(Uuid);

impl EntityId {
    /// Generates a fresh random identity.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the underlying UUID.
    #[inline]
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// An entity: identity only, no component data.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Entity {
    /// The entity's stable identity.
    pub id: EntityId,
}

/// Stable reference to a live entity in the store.
pub type EntityRef = SlotHandle;

/// Pool-backed storage for entity identities.
pub struct EntityStore {
    pool: SlotPool<Entity>,
}

impl EntityStore {
    /// Default entity capacity when none is configured.
    pub const DEFAULT_CAPACITY: usize = 10_000;

    /// Creates a store with [`Self::DEFAULT_CAPACITY`] slots.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(Self::DEFAULT_CAPACITY)
    }

    /// Creates a store with a fixed capacity.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            pool: SlotPool::with_label("entity", capacity),
        }
    }

    /// Creates a new entity with a freshly generated UUID identity.
    ///
    /// # Errors
    ///
    /// [`crate::EntityError::PoolExhausted`] when the store is full. The
    /// entity simply fails to appear; callers must check the result.
    pub fn create_entity(&mut self) -> EntityResult<EntityRef> {
        let id = EntityId::generate();
        let entity = self.pool.create_with(Entity { id })?;
        tracing::debug!(%id, index = entity.index(), "entity created");
        Ok(entity)
    }

    /// Destroys an entity. Invalid refs log a warning and no-op.
    ///
    /// Components owned by the entity are not touched here; tear those down
    /// through the archetype that composed them.
    pub fn destroy(&mut self, entity: EntityRef) -> Option<Entity> {
        self.pool.destroy(entity)
    }

    /// Checks whether `entity` refers to a live entity.
    #[inline]
    #[must_use]
    pub fn is_active(&self, entity: EntityRef) -> bool {
        self.pool.is_active(entity)
    }

    /// Returns the number of live entities.
    #[inline]
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.pool.active_count()
    }

    /// Returns the store's fixed capacity.
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.pool.capacity()
    }

    /// Gets the entity behind a ref.
    #[inline]
    #[must_use]
    pub fn get(&self, entity: EntityRef) -> Option<&Entity> {
        self.pool.get(entity)
    }

    /// Returns the identity of the entity behind a ref.
    #[inline]
    #[must_use]
    pub fn id_of(&self, entity: EntityRef) -> Option<EntityId> {
        self.pool.get(entity).map(|e| e.id)
    }

    /// Returns the refs of all live entities in ascending index order.
    pub fn all(&self) -> impl Iterator<Item = EntityRef> + '_ {
        self.pool.handles()
    }

    /// Returns the slot index of a live entity.
    ///
    /// Linear scan over the live set - O(active-count). Not a hot-path
    /// operation; it exists for debug tooling.
    #[must_use]
    pub fn entity_index(&self, entity: EntityRef) -> Option<usize> {
        self.pool
            .handles()
            .find(|h| *h == entity)
            .map(|h| h.index() as usize)
    }

    /// Destroys every live entity.
    pub fn clear(&mut self) {
        self.pool.clear();
    }
}

impl Default for EntityStore {
    fn default() -> Self {
        Self::new()
    }
}
