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

//! Scatter ECS - frame-stepped Entity Component System
//!
//! Entities are generational slotmap keys, components live in one
//! lock-guarded column per registered name, and systems run in three
//! phases (init, update, render) against a [`World`]. A spatial-hash
//! collision pipeline with a parallel narrow phase ships as a plugin.
//!
//! ```
//! use scatter_ecs::prelude::*;
//!
//! let mut app = App::new(EngineConfig::default()).unwrap();
//! app.add_plugin(CollisionPlugin).unwrap();
//! app.single_step().unwrap();
//! assert_eq!(app.world().tick(), 1);
//! ```

pub mod app;
pub mod bitset;
pub mod builtin;
pub mod collision;
pub mod command;
pub mod component;
pub mod config;
pub mod entity;
pub mod error;
pub mod event;
pub mod event_bus;
pub mod executor;
pub mod observer;
pub mod parallel;
pub mod plugin;
pub mod prelude;
pub mod query;
pub mod resources;
pub mod schedule;
pub mod spatial_hash;
pub mod storage;
pub mod system;
pub mod time;
pub mod world;

pub use app::*;
pub use collision::*;
pub use command::*;
pub use component::*;
pub use config::*;
pub use entity::*;
pub use error::*;
pub use event::*;
pub use event_bus::*;
pub use executor::*;
pub use observer::*;
pub use parallel::*;
pub use plugin::*;
pub use query::*;
pub use resources::*;
pub use schedule::*;
pub use spatial_hash::*;
pub use system::*;
pub use time::*;
pub use world::*;
