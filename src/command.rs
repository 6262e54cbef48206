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

//! Deferred world mutations recorded by systems

use tracing::trace;

use crate::component::{Component, ComponentId, ComponentKey, ComponentList};
use crate::entity::EntityId;
use crate::error::Result;
use crate::world::World;

/// Type alias for world mutation closures
pub type CommandClosure = Box<dyn FnOnce(&mut World) -> Result<()> + Send>;

/// Deferred command for world mutations
pub enum Command {
    /// Spawn a labelled entity with the given components
    Spawn {
        label: String,
        components: ComponentList,
    },

    /// Despawn entity
    Despawn(EntityId),

    /// Custom world mutation
    Custom(CommandClosure),
}

impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Command::Spawn { label, components } => f
                .debug_struct("Spawn")
                .field("label", label)
                .field("components", &components.len())
                .finish(),
            Command::Despawn(e) => f.debug_tuple("Despawn").field(e).finish(),
            Command::Custom(_) => write!(f, "Custom(...)"),
        }
    }
}

/// Command buffer for deferred operations
#[derive(Default)]
pub struct CommandBuffer {
    commands: Vec<Command>,
}

impl CommandBuffer {
    /// Create new command buffer
    pub fn new() -> Self {
        Self::default()
    }

    /// Create with capacity
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            commands: Vec::with_capacity(capacity),
        }
    }

    /// Queue spawn command
    pub fn spawn(&mut self, label: impl Into<String>, components: ComponentList) {
        self.commands.push(Command::Spawn {
            label: label.into(),
            components,
        });
    }

    /// Queue despawn command
    pub fn despawn(&mut self, entity: EntityId) {
        self.commands.push(Command::Despawn(entity));
    }

    /// Queue a custom world mutation
    pub fn add<F>(&mut self, f: F)
    where
        F: FnOnce(&mut World) -> Result<()> + Send + 'static,
    {
        self.commands.push(Command::Custom(Box::new(f)));
    }

    /// Queue set component command
    pub fn set_component<T: Component>(&mut self, entity: EntityId, key: ComponentKey<T>, value: T) {
        self.add(move |world| {
            if world.is_alive(entity) {
                world.set_component(entity, key, value)
            } else {
                Ok(())
            }
        });
    }

    /// Queue remove component command
    pub fn remove_component(&mut self, entity: EntityId, id: ComponentId) {
        self.add(move |world| {
            world.remove_component(entity, id);
            Ok(())
        });
    }

    /// Apply all commands in record order and clear the buffer.
    ///
    /// Stops at the first failing command; the rest are discarded.
    pub fn apply(&mut self, world: &mut World) -> Result<()> {
        if !self.commands.is_empty() {
            trace!(count = self.commands.len(), "applying commands");
        }
        for command in self.commands.drain(..) {
            match command {
                Command::Spawn { label, components } => {
                    world.spawn(&label, components)?;
                }
                Command::Despawn(entity) => {
                    world.despawn(entity)?;
                }
                Command::Custom(f) => {
                    f(world)?;
                }
            }
        }
        Ok(())
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Get length
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    /// Clear buffer
    pub fn clear(&mut self) {
        self.commands.clear();
    }
}
