//! System trait and per-run context

use parking_lot::MappedRwLockReadGuard;
use std::any::Any;

use crate::builtin::{AssetSource, InputSource};
use crate::command::CommandBuffer;
use crate::component::{Component, ComponentId, ComponentKey, ComponentList};
use crate::entity::EntityId;
use crate::error::Result;
use crate::event_bus::{Event, EventBus};
use crate::query::{Query, QueryParam};
use crate::resources::Resources;
use crate::schedule::Phase;
use crate::world::WorldView;

/// System ID (registration index within its phase)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SystemId {
    pub phase: Phase,
    pub index: u32,
}

/// Per-tick values the host hands to the scheduler
#[derive(Clone, Copy)]
pub struct Frame<'a> {
    /// Seconds since the previous tick (already clamped)
    pub delta_time: f32,
    pub stage_width: f32,
    pub stage_height: f32,
    pub assets: &'a dyn AssetSource,
    pub input: &'a dyn InputSource,
}

impl<'a> Frame<'a> {
    pub fn new(
        delta_time: f32,
        stage_width: f32,
        stage_height: f32,
        assets: &'a dyn AssetSource,
        input: &'a dyn InputSource,
    ) -> Self {
        Self {
            delta_time,
            stage_width,
            stage_height,
            assets,
            input,
        }
    }
}

/// Everything a running system may touch.
///
/// Queries go through `world`; structural changes (spawn/despawn) are
/// recorded in `commands` and applied by the executor once the system
/// returns. Events go straight onto the bus so later systems of the same
/// tick can read them.
pub struct SystemContext<'w> {
    pub world: WorldView<'w>,
    pub commands: &'w mut CommandBuffer,
    pub events: &'w mut EventBus,
    pub resources: &'w mut Resources,
    pub assets: &'w dyn AssetSource,
    pub input: &'w dyn InputSource,
    pub(crate) phase: Phase,
    pub(crate) delta_time: f32,
    pub(crate) stage_width: f32,
    pub(crate) stage_height: f32,
}

impl<'w> SystemContext<'w> {
    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn tick(&self) -> u64 {
        self.world.tick()
    }

    pub fn delta_time(&self) -> f32 {
        self.delta_time
    }

    pub fn stage_width(&self) -> f32 {
        self.stage_width
    }

    pub fn stage_height(&self) -> f32 {
        self.stage_height
    }

    /// Copy of the world view that does not borrow the context
    pub fn world(&self) -> WorldView<'w> {
        self.world
    }

    pub fn component_id(&self, name: &str) -> Result<ComponentId> {
        self.world.component_id(name)
    }

    pub fn component<T: Component>(&self, name: &str) -> Result<ComponentKey<T>> {
        self.world.component(name)
    }

    pub fn has_component(&self, entity: EntityId, id: ComponentId) -> bool {
        self.world.has_component(entity, id)
    }

    pub fn get_component<T: Component>(
        &self,
        entity: EntityId,
        key: ComponentKey<T>,
    ) -> Result<Option<MappedRwLockReadGuard<'w, T>>> {
        self.world.get_component(entity, key)
    }

    pub fn query<P: QueryParam>(&self, params: P) -> Result<Query<P>> {
        self.world.query(params)
    }

    /// Iterate a query. Use [`SystemContext::world`] instead when the
    /// callback needs to spawn or emit events.
    pub fn each<P, F>(&self, query: &Query<P>, f: F) -> Result<usize>
    where
        P: QueryParam,
        F: FnMut(EntityId, P::Item<'_>),
    {
        self.world.each(query, f)
    }

    /// Deferred until this system returns
    pub fn spawn(&mut self, label: &str, components: ComponentList) {
        self.commands.spawn(label, components);
    }

    /// Deferred until this system returns
    pub fn despawn(&mut self, entity: EntityId) {
        self.commands.despawn(entity);
    }

    pub fn create_event(&mut self, name: &str, event: impl Into<Event>) -> Result<()> {
        self.events.create_event(name, event)
    }

    pub fn read_events(&self, name: &str) -> Result<&[Event]> {
        self.events.read_events(name)
    }

    pub fn resource<R: Any + Send + Sync>(&self) -> Option<&R> {
        self.resources.get::<R>()
    }

    pub fn resource_mut<R: Any + Send + Sync>(&mut self) -> Result<&mut R> {
        self.resources.expect_mut::<R>()
    }
}

/// System trait
pub trait System: Send + Sync {
    /// Get system name
    fn name(&self) -> &str;

    /// Run to completion. Any internal parallel work must be joined
    /// before returning.
    fn run(&mut self, ctx: &mut SystemContext<'_>) -> Result<()>;
}

/// Boxed system
pub type BoxedSystem = Box<dyn System>;

/// System backed by a closure
pub struct FnSystem<F> {
    name: String,
    f: F,
}

impl<F> System for FnSystem<F>
where
    F: FnMut(&mut SystemContext<'_>) -> Result<()> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn run(&mut self, ctx: &mut SystemContext<'_>) -> Result<()> {
        (self.f)(ctx)
    }
}

/// Wrap a closure as a named system
pub fn system_fn<F>(name: impl Into<String>, f: F) -> FnSystem<F>
where
    F: FnMut(&mut SystemContext<'_>) -> Result<()> + Send + Sync,
{
    FnSystem {
        name: name.into(),
        f,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fn_system_name() {
        let system = system_fn("noop", |_ctx| Ok(()));
        assert_eq!(system.name(), "noop");
    }
}
