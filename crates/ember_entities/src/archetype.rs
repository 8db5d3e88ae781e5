//! # Archetype
//!
//! A compile-time fixed set of component types composed together per
//! entity. Creating an entity through an archetype creates exactly one
//! instance of every type in the set, registers the entity as owner in each
//! type's registry, and records the entity in the archetype's own per-type
//! index.
//!
//! Invariant: for every entity composed through an archetype, the
//! archetype's per-type entity set and the registry's live set agree.
//! `destroy_for` always fully reverses `create`, including for entities
//! that were only partially composed (each type's teardown is a defensive
//! no-op when that type was never registered for the entity).

use crate::entity::EntityId;
use crate::error::EntityResult;
use crate::registry::{Component, ComponentRef};
use crate::world::World;
use std::any::TypeId;
use std::collections::{BTreeSet, HashMap};
use std::marker::PhantomData;

type EntitySets = HashMap<TypeId, BTreeSet<EntityId>>;

/// A fixed list of component types an [`Archetype`] composes.
///
/// Implemented for tuples of [`Component`] types up to arity four.
pub trait ComponentSet: Send + Sync + 'static {
    /// Creates one component of every type in the set for `entity`.
    ///
    /// On failure partway through, everything already created for the
    /// entity is rolled back before the error is returned.
    ///
    /// # Errors
    ///
    /// Pool exhaustion or an unregistered component type.
    fn create_all(world: &World, entity: EntityId, sets: &mut EntitySets) -> EntityResult<()>;

    /// Destroys the set's components for `entity`, type by type.
    fn destroy_all(world: &World, entity: EntityId, sets: &mut EntitySets);

    /// Checks that every type in the set has a live component for `entity`.
    fn has_all(world: &World, entity: EntityId) -> bool;

    /// Checks whether `type_id` names a member of the set.
    fn contains(type_id: TypeId) -> bool;
}

/// Stateful composition index over a fixed component set.
///
/// The archetype itself stores only which entities it has composed, per
/// type; component data lives in the world's registries.
///
/// # Example
///
/// ```rust,ignore
/// let mut movables: Archetype<(Position, Velocity)> = Archetype::new();
/// movables.create(&world, entity_id)?;
/// let position = movables.component::<Position>(&world, entity_id);
/// movables.destroy_for(&world, entity_id);
/// ```
pub struct Archetype<S: ComponentSet> {
    entity_sets: EntitySets,
    _marker: PhantomData<S>,
}

impl<S: ComponentSet> Archetype<S> {
    /// Creates an empty archetype.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entity_sets: EntitySets::new(),
            _marker: PhantomData,
        }
    }

    /// Composes one component of every type in the set for `entity`.
    ///
    /// # Errors
    ///
    /// Pool exhaustion or an unregistered component type. Nothing is left
    /// behind for the entity on failure.
    pub fn create(&mut self, world: &World, entity: EntityId) -> EntityResult<()> {
        S::create_all(world, entity, &mut self.entity_sets)
    }

    /// Tears down every component this archetype composed for `entity`.
    ///
    /// Safe to call for entities that were never (or only partially)
    /// composed.
    pub fn destroy_for(&mut self, world: &World, entity: EntityId) {
        S::destroy_all(world, entity, &mut self.entity_sets);
    }

    /// Checks whether `entity` currently has a live component of every type
    /// in the set.
    #[must_use]
    pub fn has_components(&self, world: &World, entity: EntityId) -> bool {
        S::has_all(world, entity)
    }

    /// Returns the ref of `entity`'s component of type `C`.
    ///
    /// Only entities composed through this archetype are visible here.
    ///
    /// # Panics
    ///
    /// Panics if `C` is not a member of the archetype's component set
    /// (a programming error, caught in every build).
    #[must_use]
    pub fn component<C: Component>(&self, world: &World, entity: EntityId) -> Option<ComponentRef> {
        assert!(
            S::contains(TypeId::of::<C>()),
            "component type '{}' is not part of this archetype",
            C::NAME
        );
        self.entity_sets
            .get(&TypeId::of::<C>())
            .filter(|set| set.contains(&entity))?;
        world
            .components::<C>()
            .ok()?
            .read()
            .component_for_entity(entity)
    }

    /// Returns the entities composed for type `C` in this archetype,
    /// in sorted order.
    ///
    /// # Panics
    ///
    /// Panics if `C` is not a member of the archetype's component set.
    #[must_use]
    pub fn entities<C: Component>(&self) -> Vec<EntityId> {
        assert!(
            S::contains(TypeId::of::<C>()),
            "component type '{}' is not part of this archetype",
            C::NAME
        );
        self.entity_sets
            .get(&TypeId::of::<C>())
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Returns all live component refs of type `C` in the world's registry.
    ///
    /// # Panics
    ///
    /// Panics if `C` is not a member of the archetype's component set.
    #[must_use]
    pub fn components<C: Component>(&self, world: &World) -> Vec<ComponentRef> {
        assert!(
            S::contains(TypeId::of::<C>()),
            "component type '{}' is not part of this archetype",
            C::NAME
        );
        world
            .components::<C>()
            .map(|registry| registry.read().all())
            .unwrap_or_default()
    }
}

impl<S: ComponentSet> Default for Archetype<S> {
    fn default() -> Self {
        Self::new()
    }
}

fn create_one<C: Component + Default>(
    world: &World,
    entity: EntityId,
    sets: &mut EntitySets,
) -> EntityResult<()> {
    let registry = world.components::<C>()?;
    {
        let mut registry = registry.write();
        let component = registry.create()?;
        registry.register_owner(entity, component);
    }
    sets.entry(TypeId::of::<C>()).or_default().insert(entity);
    Ok(())
}

fn destroy_one<C: Component>(world: &World, entity: EntityId, sets: &mut EntitySets) {
    // No-op when the type was never composed for this entity, so a partial
    // create can always be reversed.
    if let Ok(registry) = world.components::<C>() {
        let mut registry = registry.write();
        if let Some(component) = registry.component_for_entity(entity) {
            registry.destroy(component);
        }
    }
    if let Some(set) = sets.get_mut(&TypeId::of::<C>()) {
        set.remove(&entity);
    }
}

fn has_one<C: Component>(world: &World, entity: EntityId) -> bool {
    world
        .components::<C>()
        .map(|registry| registry.read().component_for_entity(entity).is_some())
        .unwrap_or(false)
}

macro_rules! impl_component_set {
    ($($ty:ident),+) => {
        impl<$($ty: Component + Default),+> ComponentSet for ($($ty,)+) {
            fn create_all(
                world: &World,
                entity: EntityId,
                sets: &mut EntitySets,
            ) -> EntityResult<()> {
                $(
                    if let Err(e) = create_one::<$ty>(world, entity, sets) {
                        // Roll back whatever part of the set already exists.
                        Self::destroy_all(world, entity, sets);
                        return Err(e);
                    }
                )+
                Ok(())
            }

            fn destroy_all(world: &World, entity: EntityId, sets: &mut EntitySets) {
                $(destroy_one::<$ty>(world, entity, sets);)+
            }

            fn has_all(world: &World, entity: EntityId) -> bool {
                $(has_one::<$ty>(world, entity))&&+
            }

            fn contains(type_id: TypeId) -> bool {
                $(TypeId::of::<$ty>() == type_id)||+
            }
        }
    };
}

impl_component_set!(A);
impl_component_set!(A, B);
impl_component_set!(A, B, C);
impl_component_set!(A, B, C, D);

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Position {
        x: f32,
        y: f32,
    }

    impl Component for Position {
        const NAME: &'static str = "position";
        const CAPACITY: usize = 16;
    }

    #[derive(Default)]
    struct Velocity {
        dx: f32,
    }

    impl Component for Velocity {
        const NAME: &'static str = "velocity";
        const CAPACITY: usize = 16;
    }

    #[derive(Default)]
    struct Tiny;

    impl Component for Tiny {
        const NAME: &'static str = "tiny";
        const CAPACITY: usize = 1;
    }

    fn world() -> World {
        let mut world = World::new();
        world.register_component::<Position>();
        world.register_component::<Velocity>();
        world.register_component_with_capacity::<Tiny>(1);
        world
    }

    #[test]
    fn test_create_composes_every_type() {
        let world = world();
        let mut movables: Archetype<(Position, Velocity)> = Archetype::new();
        let entity = EntityId::generate();

        movables.create(&world, entity).unwrap();

        assert!(movables.has_components(&world, entity));
        assert!(movables.component::<Position>(&world, entity).is_some());
        assert!(movables.component::<Velocity>(&world, entity).is_some());
        assert_eq!(movables.entities::<Position>(), vec![entity]);
        assert_eq!(movables.entities::<Velocity>(), vec![entity]);
    }

    #[test]
    fn test_round_trip_restores_everything() {
        let world = world();
        let mut movables: Archetype<(Position, Velocity)> = Archetype::new();
        let entity = EntityId::generate();

        let positions = world.components::<Position>().unwrap();
        let velocities = world.components::<Velocity>().unwrap();
        let before = (positions.read().active_count(), velocities.read().active_count());

        movables.create(&world, entity).unwrap();
        movables.destroy_for(&world, entity);

        assert_eq!(
            (positions.read().active_count(), velocities.read().active_count()),
            before
        );
        assert!(positions.read().component_for_entity(entity).is_none());
        assert!(!movables.has_components(&world, entity));
        assert!(movables.entities::<Position>().is_empty());
    }

    #[test]
    fn test_partial_create_rolls_back() {
        let world = world();
        let mut cramped: Archetype<(Position, Tiny)> = Archetype::new();

        let first = EntityId::generate();
        let second = EntityId::generate();

        cramped.create(&world, first).unwrap();
        // Tiny's pool (capacity 1) is now full; the second create must fail
        // and leave no Position behind either.
        assert!(cramped.create(&world, second).is_err());

        let positions = world.components::<Position>().unwrap();
        assert_eq!(positions.read().active_count(), 1);
        assert!(positions.read().component_for_entity(second).is_none());
        assert!(!cramped.has_components(&world, second));
    }

    #[test]
    fn test_destroy_for_unknown_entity_is_noop() {
        let world = world();
        let mut movables: Archetype<(Position, Velocity)> = Archetype::new();

        movables.destroy_for(&world, EntityId::generate());
        assert_eq!(world.components::<Position>().unwrap().read().active_count(), 0);
    }

    #[test]
    fn test_per_type_views() {
        let world = world();
        let mut movables: Archetype<(Position, Velocity)> = Archetype::new();

        let a = EntityId::generate();
        let b = EntityId::generate();
        movables.create(&world, a).unwrap();
        movables.create(&world, b).unwrap();

        assert_eq!(movables.entities::<Position>().len(), 2);
        assert_eq!(movables.components::<Velocity>(&world).len(), 2);

        let position = movables.component::<Position>(&world, a).unwrap();
        let registry = world.components::<Position>().unwrap();
        let mut registry = registry.write();
        let component = registry.get_mut(position).unwrap();
        component.x = 3.0;
        component.y = 4.0;
        assert!((registry.get(position).unwrap().x - 3.0).abs() < f32::EPSILON);
    }

    #[test]
    #[should_panic(expected = "not part of this archetype")]
    fn test_foreign_type_panics() {
        let world = world();
        let movables: Archetype<(Position,)> = Archetype::new();
        let _ = movables.component::<Velocity>(&world, EntityId::generate());
    }
}
