use crate::entity::EntityId;

/// Entity lifecycle notifications delivered to observers
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EntityEvent {
    /// Entity was spawned (all components already written)
    Spawned(EntityId),

    /// Entity is being despawned (components still readable)
    Despawned(EntityId),
}

impl EntityEvent {
    /// Get the entity involved in this event
    pub fn entity_id(&self) -> EntityId {
        match self {
            EntityEvent::Spawned(id) => *id,
            EntityEvent::Despawned(id) => *id,
        }
    }

    /// Get event type name for debugging
    pub fn event_type(&self) -> &'static str {
        match self {
            EntityEvent::Spawned(_) => "Spawned",
            EntityEvent::Despawned(_) => "Despawned",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotmap::Key;

    #[test]
    fn test_event_entity_id() {
        let id = EntityId::null();
        let event = EntityEvent::Despawned(id);
        assert_eq!(event.entity_id(), id);
        assert_eq!(event.event_type(), "Despawned");
    }
}
