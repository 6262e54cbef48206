//! Convenient re-exports of commonly used types.
//!
//! The prelude can be imported with:
//! ```
//! use scatter_ecs::prelude::*;
//! ```

pub use crate::app::App;
pub use crate::builtin::{
    AssetRegistry, AssetSource, InputSource, KeyCode, KeyboardInput, RenderSink, Sprite,
    TextureInfo, Transform, Velocity, SPRITE, TRANSFORM, VELOCITY,
};
pub use crate::collision::{Collider, CollisionPipeline, CollisionSystem, COLLIDER};
pub use crate::command::CommandBuffer;
pub use crate::component::{Component, ComponentId, ComponentKey, ComponentList};
pub use crate::config::{EngineConfig, NarrowPhaseMode};
pub use crate::entity::EntityId;
pub use crate::error::{EcsError, Result};
pub use crate::event_bus::{CollisionEvent, Event, COLLISION_EVENT};
pub use crate::observer::Observer;
pub use crate::plugin::{CollisionPlugin, Plugin};
pub use crate::query::{read, write, Query};
pub use crate::schedule::Phase;
pub use crate::spatial_hash::Rect;
pub use crate::system::{system_fn, System, SystemContext};
pub use crate::time::{Timer, TimerMode};
pub use crate::world::World;
