//! Named, single-tick event queues
//!
//! Events created during a tick are visible to every system that runs later
//! in the same tick (and to render systems). The executor clears every queue
//! at the tick boundary; nothing is carried into the next tick.

use ahash::AHashMap;
use tracing::trace;

use crate::entity::EntityId;
use crate::error::{EcsError, Result};

/// Queue name used by the collision pipeline
pub const COLLISION_EVENT: &str = "collision";

/// Two colliders overlapped this tick
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CollisionEvent {
    pub a: EntityId,
    pub b: EntityId,
}

impl CollisionEvent {
    /// Whether `entity` is one side of the pair
    pub fn involves(&self, entity: EntityId) -> bool {
        self.a == entity || self.b == entity
    }

    /// The other side of the pair, if `entity` is involved
    pub fn other(&self, entity: EntityId) -> Option<EntityId> {
        if self.a == entity {
            Some(self.b)
        } else if self.b == entity {
            Some(self.a)
        } else {
            None
        }
    }
}

/// Gameplay-defined event with a JSON payload
#[derive(Clone, Debug, PartialEq)]
pub struct CustomEvent {
    pub entity: Option<EntityId>,
    pub payload: serde_json::Value,
}

/// Every event kind carried by the bus
#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    Collision(CollisionEvent),
    Custom(CustomEvent),
}

impl Event {
    pub fn as_collision(&self) -> Option<&CollisionEvent> {
        match self {
            Event::Collision(collision) => Some(collision),
            Event::Custom(_) => None,
        }
    }

    /// Event type name for debugging
    pub fn kind(&self) -> &'static str {
        match self {
            Event::Collision(_) => "Collision",
            Event::Custom(_) => "Custom",
        }
    }
}

impl From<CollisionEvent> for Event {
    fn from(event: CollisionEvent) -> Self {
        Event::Collision(event)
    }
}

impl From<CustomEvent> for Event {
    fn from(event: CustomEvent) -> Self {
        Event::Custom(event)
    }
}

/// Central event bus
#[derive(Default)]
pub struct EventBus {
    queues: AHashMap<String, Vec<Event>>,
    processed_count: u64,
}

impl EventBus {
    /// Create new event bus
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a queue. Returns `false` when it already existed.
    pub fn register_event(&mut self, name: &str) -> bool {
        if self.queues.contains_key(name) {
            return false;
        }
        self.queues.insert(name.to_string(), Vec::new());
        true
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.queues.contains_key(name)
    }

    /// Append an event to this tick's queue
    pub fn create_event(&mut self, name: &str, event: impl Into<Event>) -> Result<()> {
        let queue = self
            .queues
            .get_mut(name)
            .ok_or_else(|| EcsError::EventNotRegistered(name.to_string()))?;
        let event = event.into();
        trace!(queue = name, kind = event.kind(), "event created");
        queue.push(event);
        Ok(())
    }

    /// Events created so far this tick, in creation order
    pub fn read_events(&self, name: &str) -> Result<&[Event]> {
        self.queues
            .get(name)
            .map(Vec::as_slice)
            .ok_or_else(|| EcsError::EventNotRegistered(name.to_string()))
    }

    /// Collision events of this tick
    pub fn collisions(&self) -> impl Iterator<Item = &CollisionEvent> + '_ {
        self.queues
            .get(COLLISION_EVENT)
            .into_iter()
            .flatten()
            .filter_map(Event::as_collision)
    }

    /// Drop every queued event (tick boundary). Returns how many were dropped.
    pub fn clear(&mut self) -> usize {
        let mut cleared = 0;
        for queue in self.queues.values_mut() {
            cleared += queue.len();
            queue.clear();
        }
        self.processed_count += cleared as u64;
        cleared
    }

    /// Get number of queued events
    pub fn queue_size(&self) -> usize {
        self.queues.values().map(Vec::len).sum()
    }

    /// Get total events cleared at tick boundaries
    pub fn processed_count(&self) -> u64 {
        self.processed_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotmap::{Key, KeyData};

    fn entity(index: u64) -> EntityId {
        EntityId::from(KeyData::from_ffi((1 << 32) | index))
    }

    #[test]
    fn test_create_and_read_same_tick() {
        let mut bus = EventBus::new();
        assert!(bus.register_event(COLLISION_EVENT));
        assert!(!bus.register_event(COLLISION_EVENT));

        let (a, b) = (entity(1), entity(2));
        bus.create_event(COLLISION_EVENT, CollisionEvent { a, b })
            .unwrap();

        let events = bus.read_events(COLLISION_EVENT).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].as_collision().unwrap().other(a), Some(b));
        assert_eq!(bus.collisions().count(), 1);
    }

    #[test]
    fn test_clear_drops_everything() {
        let mut bus = EventBus::new();
        bus.register_event("score");
        bus.create_event(
            "score",
            CustomEvent {
                entity: None,
                payload: serde_json::json!({ "points": 10 }),
            },
        )
        .unwrap();

        assert_eq!(bus.queue_size(), 1);
        assert_eq!(bus.clear(), 1);
        assert!(bus.read_events("score").unwrap().is_empty());
        assert_eq!(bus.processed_count(), 1);
    }

    #[test]
    fn test_unregistered_event_is_error() {
        let mut bus = EventBus::new();
        let err = bus
            .create_event(
                "missing",
                CollisionEvent {
                    a: EntityId::null(),
                    b: EntityId::null(),
                },
            )
            .unwrap_err();
        assert_eq!(err, EcsError::EventNotRegistered("missing".to_string()));
        assert!(bus.read_events("missing").is_err());
    }
}
