// Copyright 2024 Saptak Santra
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! World: central entity, component, event and resource storage

use std::collections::VecDeque;

use parking_lot::{MappedRwLockReadGuard, MappedRwLockWriteGuard};
use tracing::{debug, trace};

#[cfg(feature = "profiling")]
use tracing::info_span;

use crate::component::{Component, ComponentId, ComponentKey, ComponentList, ComponentRegistry};
use crate::entity::{EntityId, EntityRegistry};
use crate::error::{EcsError, Result};
use crate::event::EntityEvent;
use crate::event_bus::EventBus;
use crate::observer::{Observer, ObserverRegistry};
use crate::query::{Query, QueryIter, QueryParam};
use crate::resources::Resources;
use crate::storage::ComponentStore;

/// Central ECS world
/// The World is the central type that holds all entities, components, events and resources.
pub struct World {
    entities: EntityRegistry,
    components: ComponentRegistry,
    store: ComponentStore,

    /// Single-tick event queues
    events: EventBus,

    /// Typed singletons (collision pipeline, game state, ...)
    resources: Resources,

    /// Lifecycle observers (despawn cleanup hooks)
    observers: ObserverRegistry,

    /// Lifecycle events not yet broadcast. The front entry is the one
    /// being broadcast while `broadcasting` is set.
    pending: VecDeque<EntityEvent>,
    broadcasting: bool,

    /// Current world tick
    tick: u64,
}

impl World {
    /// Create a new, empty world.
    pub fn new() -> Self {
        Self {
            entities: EntityRegistry::new(),
            components: ComponentRegistry::new(),
            store: ComponentStore::new(),
            events: EventBus::new(),
            resources: Resources::new(),
            observers: ObserverRegistry::new(),
            pending: VecDeque::new(),
            broadcasting: false,
            tick: 0,
        }
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn increment_tick(&mut self) {
        self.tick += 1;
    }

    /// Register `name` as a component of type `T`.
    ///
    /// Idempotent: registering the same name again returns the same key.
    pub fn register_component<T: Component>(&mut self, name: &str) -> Result<ComponentKey<T>> {
        let (key, created) = self.components.register::<T>(name)?;
        if created {
            self.store.add_column(key, name);
            debug!(component = name, id = key.id().index(), "component registered");
        }
        Ok(key)
    }

    pub fn component_id(&self, name: &str) -> Result<ComponentId> {
        self.components.id(name)
    }

    pub fn component<T: Component>(&self, name: &str) -> Result<ComponentKey<T>> {
        self.components.key(name)
    }

    pub fn component_name(&self, id: ComponentId) -> Option<&str> {
        self.components.name(id)
    }

    /// Register an event queue (idempotent)
    pub fn register_event(&mut self, name: &str) -> bool {
        self.events.register_event(name)
    }

    /// Spawn an entity with the given component values.
    ///
    /// Every component id is validated before the entity is allocated; a
    /// failure leaves the world untouched.
    pub fn spawn(&mut self, label: &str, components: ComponentList) -> Result<EntityId> {
        #[cfg(feature = "profiling")]
        let _span = info_span!("world.spawn", label, components = components.len()).entered();

        for id in components.component_ids() {
            if self.components.info(id).is_none() {
                return Err(EcsError::UnknownComponentId(id));
            }
        }

        let entity = self.entities.spawn(label);
        self.store.track(entity);
        for (id, value) in components.entries {
            if let Err(err) = self.store.insert_boxed(entity, id, value) {
                self.store.remove_all(entity);
                self.entities.despawn(entity);
                return Err(err);
            }
        }

        trace!(?entity, label, "spawned");
        self.pending.push_back(EntityEvent::Spawned(entity));
        self.flush_lifecycle()?;
        Ok(entity)
    }

    /// Despawn entity immediately
    ///
    /// Observers are notified first, while the components are still
    /// readable. Despawning a dead or unknown id, or one already queued
    /// for despawn, is a no-op returning `Ok(false)`.
    ///
    /// Called from inside an observer, the despawn is queued: it returns
    /// `Ok(true)` and the entity stays alive until every observer has seen
    /// the event currently being broadcast.
    pub fn despawn(&mut self, entity: EntityId) -> Result<bool> {
        if !self.entities.is_alive(entity) || self.despawn_pending(entity) {
            trace!(?entity, "despawn of dead entity ignored");
            return Ok(false);
        }

        self.pending.push_back(EntityEvent::Despawned(entity));
        self.flush_lifecycle().map(|_| true)
    }

    fn despawn_pending(&self, entity: EntityId) -> bool {
        self.pending.contains(&EntityEvent::Despawned(entity))
    }

    /// Broadcast queued lifecycle events in order, removing each despawned
    /// entity once its observers have run. Events raised by observers are
    /// appended and drained in the same pass. The first observer error is
    /// returned after the queue is empty.
    fn flush_lifecycle(&mut self) -> Result<()> {
        if self.broadcasting {
            return Ok(());
        }

        let mut observers = std::mem::take(&mut self.observers);
        self.broadcasting = true;
        let mut result = Ok(());
        while let Some(&event) = self.pending.front() {
            let notified = observers.broadcast(&event, self);
            if result.is_ok() {
                result = notified;
            }
            self.pending.pop_front();

            if let EntityEvent::Despawned(entity) = event {
                self.store.remove_all(entity);
                self.entities.despawn(entity);
                trace!(?entity, "despawned");
            }
        }
        self.broadcasting = false;

        let added = std::mem::replace(&mut self.observers, observers);
        self.observers.merge(added);
        result
    }

    pub fn add_observer(&mut self, observer: Box<dyn Observer>) {
        self.observers.register(observer);
    }

    pub fn is_alive(&self, entity: EntityId) -> bool {
        self.entities.is_alive(entity)
    }

    pub fn alive_entities(&self) -> Vec<EntityId> {
        self.entities.alive_entities()
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    pub fn entity_label(&self, entity: EntityId) -> Option<&str> {
        self.entities.label(entity)
    }

    /// Check if entity has a specific component
    pub fn has_component(&self, entity: EntityId, id: ComponentId) -> bool {
        self.store.has(entity, id)
    }

    /// Get immutable access to a component on an entity
    pub fn get_component<T: Component>(
        &self,
        entity: EntityId,
        key: ComponentKey<T>,
    ) -> Result<Option<MappedRwLockReadGuard<'_, T>>> {
        self.store.get(entity, key)
    }

    /// Get mutable access to a component on an entity
    pub fn get_component_mut<T: Component>(
        &self,
        entity: EntityId,
        key: ComponentKey<T>,
    ) -> Result<Option<MappedRwLockWriteGuard<'_, T>>> {
        self.store.get_mut(entity, key)
    }

    /// Insert or overwrite a component on a live entity
    pub fn set_component<T: Component>(
        &mut self,
        entity: EntityId,
        key: ComponentKey<T>,
        value: T,
    ) -> Result<()> {
        if !self.entities.is_alive(entity) {
            return Err(EcsError::EntityNotFound);
        }
        self.store.set(entity, key, value)
    }

    /// Remove a component. Returns whether it was present.
    pub fn remove_component(&mut self, entity: EntityId, id: ComponentId) -> bool {
        self.store.remove(entity, id)
    }

    /// Build a validated query
    pub fn query<P: QueryParam>(&self, params: P) -> Result<Query<P>> {
        self.view().query(params)
    }

    /// Run `f` for every entity matching `query`
    pub fn each<P, F>(&self, query: &Query<P>, f: F) -> Result<usize>
    where
        P: QueryParam,
        F: FnMut(EntityId, P::Item<'_>),
    {
        self.view().each(query, f)
    }

    /// Read-only handle used by systems for queries and component access
    pub fn view(&self) -> WorldView<'_> {
        WorldView {
            entities: &self.entities,
            components: &self.components,
            store: &self.store,
            tick: self.tick,
        }
    }

    /// Borrow the query view and the mutable side tables at once
    pub fn split(&mut self) -> (WorldView<'_>, &mut EventBus, &mut Resources) {
        let view = WorldView {
            entities: &self.entities,
            components: &self.components,
            store: &self.store,
            tick: self.tick,
        };
        (view, &mut self.events, &mut self.resources)
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn events_mut(&mut self) -> &mut EventBus {
        &mut self.events
    }

    pub fn resources(&self) -> &Resources {
        &self.resources
    }

    pub fn resources_mut(&mut self) -> &mut Resources {
        &mut self.resources
    }

    pub fn insert_resource<R: std::any::Any + Send + Sync>(&mut self, resource: R) -> Option<R> {
        self.resources.insert(resource)
    }

    pub fn resource<R: std::any::Any + Send + Sync>(&self) -> Option<&R> {
        self.resources.get::<R>()
    }

    pub fn resource_mut<R: std::any::Any + Send + Sync>(&mut self) -> Option<&mut R> {
        self.resources.get_mut::<R>()
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

/// Shared view of entities and components.
///
/// Cheap to copy. Column contents are still writable through `write`
/// descriptors and `get_component_mut`, which take the column locks.
#[derive(Clone, Copy)]
pub struct WorldView<'w> {
    entities: &'w EntityRegistry,
    components: &'w ComponentRegistry,
    store: &'w ComponentStore,
    tick: u64,
}

impl<'w> WorldView<'w> {
    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn is_alive(&self, entity: EntityId) -> bool {
        self.entities.is_alive(entity)
    }

    pub fn alive_entities(&self) -> Vec<EntityId> {
        self.entities.alive_entities()
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    pub fn entity_label(&self, entity: EntityId) -> Option<&'w str> {
        self.entities.label(entity)
    }

    pub fn component_id(&self, name: &str) -> Result<ComponentId> {
        self.components.id(name)
    }

    pub fn component<T: Component>(&self, name: &str) -> Result<ComponentKey<T>> {
        self.components.key(name)
    }

    pub fn has_component(&self, entity: EntityId, id: ComponentId) -> bool {
        self.store.has(entity, id)
    }

    pub fn get_component<T: Component>(
        &self,
        entity: EntityId,
        key: ComponentKey<T>,
    ) -> Result<Option<MappedRwLockReadGuard<'w, T>>> {
        self.store.get(entity, key)
    }

    pub fn get_component_mut<T: Component>(
        &self,
        entity: EntityId,
        key: ComponentKey<T>,
    ) -> Result<Option<MappedRwLockWriteGuard<'w, T>>> {
        self.store.get_mut(entity, key)
    }

    /// Build a query, checking that every component belongs to this world
    pub fn query<P: QueryParam>(&self, params: P) -> Result<Query<P>> {
        let query = Query::new(params)?;
        for descriptor in query.descriptors() {
            if self.components.info(descriptor.component).is_none() {
                return Err(EcsError::UnknownComponentId(descriptor.component));
            }
        }
        Ok(query)
    }

    /// Lock the query's columns and iterate manually
    pub fn iter<P: QueryParam>(&self, query: &Query<P>) -> Result<QueryIter<'w, P>> {
        query.iter(self.store)
    }

    /// Run `f` for every entity matching `query`; returns the match count
    pub fn each<P, F>(&self, query: &Query<P>, mut f: F) -> Result<usize>
    where
        P: QueryParam,
        F: FnMut(EntityId, P::Item<'_>),
    {
        let mut iter = query.iter(self.store)?;
        let mut count = 0;
        while let Some((entity, item)) = iter.next() {
            f(entity, item);
            count += 1;
        }
        Ok(count)
    }

    /// Like `each`, but the callback may fail; the first error stops iteration
    pub fn try_each<P, F>(&self, query: &Query<P>, mut f: F) -> Result<usize>
    where
        P: QueryParam,
        F: FnMut(EntityId, P::Item<'_>) -> Result<()>,
    {
        let mut iter = query.iter(self.store)?;
        let mut count = 0;
        while let Some((entity, item)) = iter.next() {
            f(entity, item)?;
            count += 1;
        }
        Ok(count)
    }

    /// Number of entities the query would visit
    pub fn count<P: QueryParam>(&self, query: &Query<P>) -> usize {
        self.store.matching(query.required()).len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{read, write};

    #[derive(Debug, Clone, Copy, PartialEq)]
    struct Position {
        x: f32,
        y: f32,
    }

    #[derive(Debug, Clone, Copy, PartialEq)]
    struct Health(i32);

    #[test]
    fn test_register_component_twice_returns_same_id() {
        let mut world = World::new();
        let first = world.register_component::<Position>("Position").unwrap();
        let second = world.register_component::<Position>("Position").unwrap();
        assert_eq!(first.id(), second.id());
        assert_eq!(world.component_id("Position").unwrap(), first.id());
    }

    #[test]
    fn test_spawn_with_components() {
        let mut world = World::new();
        let pos = world.register_component::<Position>("Position").unwrap();
        let hp = world.register_component::<Health>("Health").unwrap();

        let entity = world
            .spawn(
                "Player",
                ComponentList::new()
                    .with(pos, Position { x: 1.0, y: 2.0 })
                    .with(hp, Health(3)),
            )
            .unwrap();

        assert!(world.has_component(entity, pos.id()));
        assert_eq!(world.entity_label(entity), Some("Player"));
        assert_eq!(
            *world.get_component(entity, hp).unwrap().unwrap(),
            Health(3)
        );
    }

    #[test]
    fn test_despawn_removes_components() {
        let mut world = World::new();
        let pos = world.register_component::<Position>("Position").unwrap();
        let entity = world
            .spawn(
                "Bullet",
                ComponentList::new().with(pos, Position { x: 0.0, y: 0.0 }),
            )
            .unwrap();

        assert!(world.despawn(entity).unwrap());
        assert!(!world.is_alive(entity));
        assert!(!world.has_component(entity, pos.id()));
        assert!(world.get_component(entity, pos).unwrap().is_none());
        assert!(!world.despawn(entity).unwrap());
    }

    #[test]
    fn test_dead_entity_access_is_soft() {
        let mut world = World::new();
        let hp = world.register_component::<Health>("Health").unwrap();
        let entity = world.spawn("Enemy", ComponentList::new()).unwrap();
        world.despawn(entity).unwrap();

        assert!(world.get_component(entity, hp).unwrap().is_none());
        assert!(!world.remove_component(entity, hp.id()));
        assert_eq!(
            world.set_component(entity, hp, Health(1)),
            Err(EcsError::EntityNotFound)
        );
    }

    #[test]
    fn test_query_requires_all_components() {
        let mut world = World::new();
        let pos = world.register_component::<Position>("Position").unwrap();
        let hp = world.register_component::<Health>("Health").unwrap();

        let healthy = world
            .spawn(
                "A",
                ComponentList::new()
                    .with(pos, Position { x: 0.0, y: 0.0 })
                    .with(hp, Health(2)),
            )
            .unwrap();
        let _no_health = world
            .spawn("B", ComponentList::new().with(pos, Position { x: 0.0, y: 0.0 }))
            .unwrap();

        let query = world.query((read(hp), write(pos))).unwrap();
        let mut visited = Vec::new();
        let count = world
            .each(&query, |entity: EntityId, (health, position): (&Health, &mut Position)| {
                position.x += health.0 as f32;
                visited.push(entity);
            })
            .unwrap();

        assert_eq!(count, 1);
        assert_eq!(visited, vec![healthy]);
        assert_eq!(world.get_component(healthy, pos).unwrap().unwrap().x, 2.0);
    }

    #[test]
    fn test_query_with_foreign_key_is_error() {
        let mut other = World::new();
        other.register_component::<Position>("Position").unwrap();
        let foreign = other.register_component::<Health>("Health").unwrap();

        let world = World::new();
        assert!(matches!(
            world.query(read(foreign)),
            Err(EcsError::UnknownComponentId(_))
        ));
    }

    #[test]
    fn test_failed_spawn_leaves_world_untouched() {
        let mut other = World::new();
        let foreign = other.register_component::<Health>("Health").unwrap();

        let mut world = World::new();
        let result = world.spawn("Ghost", ComponentList::new().with(foreign, Health(1)));
        assert!(result.is_err());
        assert_eq!(world.entity_count(), 0);
    }
}
