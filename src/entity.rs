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

//! Entity identifiers and the registry that hands them out.

use slotmap::new_key_type;
use slotmap::SlotMap;

new_key_type! {
    /// Unique entity identifier backed by slotmap's generational keys.
    ///
    /// A slot may be reused after despawn, but the reused key carries a new
    /// generation, so a stale id never compares equal to the new entity.
    pub struct EntityId;
}

/// Per-entity bookkeeping kept by the registry
#[derive(Debug, Clone)]
struct EntityMeta {
    label: String,
}

/// Allocates and frees entity identifiers, tracks liveness
#[derive(Default)]
pub struct EntityRegistry {
    entities: SlotMap<EntityId, EntityMeta>,

    /// Despawn counter (for diagnostics)
    despawned_total: u64,
}

impl EntityRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            entities: SlotMap::with_capacity_and_key(256),
            despawned_total: 0,
        }
    }

    /// Allocate a new entity id
    pub fn spawn(&mut self, label: &str) -> EntityId {
        self.entities.insert(EntityMeta {
            label: label.to_string(),
        })
    }

    /// Release an entity id.
    ///
    /// Returns `false` when the id was already dead (no-op).
    pub fn despawn(&mut self, entity: EntityId) -> bool {
        if self.entities.remove(entity).is_some() {
            self.despawned_total += 1;
            true
        } else {
            false
        }
    }

    pub fn is_alive(&self, entity: EntityId) -> bool {
        self.entities.contains_key(entity)
    }

    /// Snapshot of every live entity, in slot order
    pub fn alive_entities(&self) -> Vec<EntityId> {
        self.entities.keys().collect()
    }

    /// Label given at spawn time
    pub fn label(&self, entity: EntityId) -> Option<&str> {
        self.entities.get(entity).map(|meta| meta.label.as_str())
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Total number of successful despawns since creation
    pub fn despawned_total(&self) -> u64 {
        self.despawned_total
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spawn_and_despawn() {
        let mut registry = EntityRegistry::new();
        let a = registry.spawn("Player");
        let b = registry.spawn("Enemy");

        assert!(registry.is_alive(a));
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.label(b), Some("Enemy"));

        assert!(registry.despawn(a));
        assert!(!registry.is_alive(a));
        assert_eq!(registry.alive_entities(), vec![b]);
    }

    #[test]
    fn test_double_despawn_is_noop() {
        let mut registry = EntityRegistry::new();
        let a = registry.spawn("Bullet");

        assert!(registry.despawn(a));
        assert!(!registry.despawn(a));
        assert_eq!(registry.despawned_total(), 1);
    }

    #[test]
    fn test_reused_slot_gets_new_generation() {
        let mut registry = EntityRegistry::new();
        let old = registry.spawn("Bullet");
        registry.despawn(old);

        let new = registry.spawn("Bullet");
        assert_ne!(old, new);
        assert!(!registry.is_alive(old));
        assert!(registry.is_alive(new));
    }
}
