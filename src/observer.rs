//! Entity lifecycle observers
//!
//! Observers are called synchronously from `World::spawn` / `World::despawn`.
//! A despawn observer runs before the entity's components are dropped, which
//! is how derived indexes (the spatial hash) release their entries.

use tracing::debug;

use crate::error::Result;
use crate::event::EntityEvent;
use crate::world::World;

/// Observer that reacts to entity lifecycle events
pub trait Observer: Send + Sync {
    /// Called when an entity event occurs
    /// Return error to stop processing
    fn on_event(&mut self, event: &EntityEvent, world: &mut World) -> Result<()>;

    /// Get name for debugging
    fn name(&self) -> &str {
        "Observer"
    }
}

/// Ordered list of observers owned by the World
#[derive(Default)]
pub struct ObserverRegistry {
    pub(crate) observers: Vec<Box<dyn Observer>>,
}

impl ObserverRegistry {
    /// Create new registry
    pub fn new() -> Self {
        Self {
            observers: Vec::new(),
        }
    }

    /// Register observer
    pub fn register(&mut self, observer: Box<dyn Observer>) {
        debug!(observer = observer.name(), "observer registered");
        self.observers.push(observer);
    }

    /// Broadcast event to all observers, in registration order
    pub fn broadcast(&mut self, event: &EntityEvent, world: &mut World) -> Result<()> {
        for observer in &mut self.observers {
            observer.on_event(event, world)?;
        }
        Ok(())
    }

    /// Get number of registered observers
    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }

    /// Append observers registered while this registry was detached
    pub(crate) fn merge(&mut self, mut other: ObserverRegistry) {
        self.observers.append(&mut other.observers);
    }
}

/// Logs every lifecycle event at debug level
pub struct LoggingObserver;

impl Observer for LoggingObserver {
    fn on_event(&mut self, event: &EntityEvent, world: &mut World) -> Result<()> {
        let entity = event.entity_id();
        debug!(
            event = event.event_type(),
            ?entity,
            label = world.entity_label(entity).unwrap_or("<unknown>"),
            "entity lifecycle"
        );
        Ok(())
    }

    fn name(&self) -> &str {
        "LoggingObserver"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::ComponentList;
    use crate::entity::EntityId;
    use parking_lot::Mutex;
    use std::sync::Arc;

    struct RecordingObserver {
        seen: Arc<Mutex<Vec<EntityEvent>>>,
    }

    impl Observer for RecordingObserver {
        fn on_event(&mut self, event: &EntityEvent, _world: &mut World) -> Result<()> {
            self.seen.lock().push(*event);
            Ok(())
        }

        fn name(&self) -> &str {
            "RecordingObserver"
        }
    }

    #[test]
    fn test_observer_registry_creation() {
        let registry = ObserverRegistry::new();
        assert_eq!(registry.observer_count(), 0);
    }

    #[test]
    fn test_observer_sees_spawn_and_despawn() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut world = World::new();
        world.add_observer(Box::new(RecordingObserver { seen: seen.clone() }));
        world.add_observer(Box::new(LoggingObserver));

        let entity = world.spawn("Enemy", ComponentList::new()).unwrap();
        assert!(world.despawn(entity).unwrap());
        assert!(!world.despawn(entity).unwrap());

        assert_eq!(
            *seen.lock(),
            vec![EntityEvent::Spawned(entity), EntityEvent::Despawned(entity)]
        );
    }

    /// Despawns `child` together with `parent` and spawns a marker in its place
    struct CascadeObserver {
        parent: EntityId,
        child: EntityId,
    }

    impl Observer for CascadeObserver {
        fn on_event(&mut self, event: &EntityEvent, world: &mut World) -> Result<()> {
            if *event == EntityEvent::Despawned(self.parent) {
                assert!(world.despawn(self.child)?);
                world.spawn("Debris", ComponentList::new())?;
            }
            Ok(())
        }
    }

    #[test]
    fn test_events_raised_by_observers_reach_every_observer() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut world = World::new();
        let parent = world.spawn("Parent", ComponentList::new()).unwrap();
        let child = world.spawn("Child", ComponentList::new()).unwrap();
        world.add_observer(Box::new(CascadeObserver { parent, child }));
        world.add_observer(Box::new(RecordingObserver { seen: seen.clone() }));

        assert!(world.despawn(parent).unwrap());

        assert!(!world.is_alive(parent));
        assert!(!world.is_alive(child));
        assert_eq!(world.entity_count(), 1);
        let debris = world.alive_entities()[0];
        assert_eq!(
            *seen.lock(),
            vec![
                EntityEvent::Despawned(parent),
                EntityEvent::Despawned(child),
                EntityEvent::Spawned(debris),
            ]
        );
    }

    #[test]
    fn test_despawn_of_queued_entity_is_ignored() {
        struct DoubleDespawn(EntityId);

        impl Observer for DoubleDespawn {
            fn on_event(&mut self, event: &EntityEvent, world: &mut World) -> Result<()> {
                if *event == EntityEvent::Despawned(self.0) {
                    assert!(!world.despawn(self.0)?);
                    assert!(world.is_alive(self.0));
                }
                Ok(())
            }
        }

        let mut world = World::new();
        let entity = world.spawn("Once", ComponentList::new()).unwrap();
        world.add_observer(Box::new(DoubleDespawn(entity)));
        assert!(world.despawn(entity).unwrap());
        assert!(!world.is_alive(entity));
    }
}
