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

//! Collision pipeline
//!
//! Once per tick, in the update phase:
//!
//! 1. clear `collided_this_frame` on every collider
//! 2. copy `Transform.position` into the collider bounds, stamp the owning
//!    entity as payload and rebuild the spatial hash from scratch
//! 3. narrow phase (per entity, per cell, or per cell on the worker pool)
//! 4. canonicalize pairs as `(larger id, smaller id)` and drop duplicates
//! 5. flag both colliders of every pair and emit one `"collision"` event
//!    per pair
//!
//! Steps 4 and 5 always run on the driving thread after every execution
//! unit has answered.

use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use slotmap::Key;
use tracing::{debug, trace};

#[cfg(feature = "profiling")]
use tracing::info_span;

#[cfg(feature = "parallel")]
use crate::parallel::WorkerPool;

use crate::builtin::transform::{Transform, TRANSFORM};
use crate::component::ComponentKey;
pub use crate::config::NarrowPhaseMode;
use crate::config::EngineConfig;
use crate::entity::EntityId;
use crate::error::Result;
use crate::event::EntityEvent;
use crate::event_bus::{CollisionEvent, EventBus, COLLISION_EVENT};
use crate::observer::Observer;
use crate::parallel::{narrow_phase_cell, CellJob, ColliderSnapshot};
use crate::query::{read, write};
use crate::spatial_hash::{Rect, SpatialHash};
use crate::system::{System, SystemContext};
use crate::world::{World, WorldView};

/// Component name of [`Collider`]
pub const COLLIDER: &str = "@my/Collider";

/// Axis-aligned collider. `bounds.x`/`bounds.y` follow the entity's
/// transform; width and height are set at spawn.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Collider {
    pub bounds: Rect,
    /// Owning entity, stamped by the pipeline
    pub entity: EntityId,
    pub collided_this_frame: bool,
}

impl Collider {
    pub fn new(width: f32, height: f32) -> Self {
        Self {
            bounds: Rect::new(0.0, 0.0, width, height),
            entity: EntityId::null(),
            collided_this_frame: false,
        }
    }
}

/// An unordered pair in canonical form: larger id first
#[inline]
pub fn canonical_pair(a: EntityId, b: EntityId) -> (EntityId, EntityId) {
    if a > b {
        (a, b)
    } else {
        (b, a)
    }
}

/// Step the pipeline is in (`Idle` between ticks)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum PipelineState {
    #[default]
    Idle,
    Rebuilding,
    NarrowPhase,
    Emitting,
}

/// Counters of the last pipeline run
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CollisionStats {
    pub colliders: usize,
    pub occupied_cells: usize,
    /// Raw pairs reported by the narrow phase, duplicates included
    pub raw_pairs: usize,
    pub pairs: usize,
}

/// Broad phase, dedup state and worker pool, stored as a world resource
pub struct CollisionPipeline {
    hash: SpatialHash,
    mode: NarrowPhaseMode,
    state: PipelineState,
    seen: FxHashSet<(EntityId, EntityId)>,
    pairs: Vec<(EntityId, EntityId)>,
    flagged: FxHashSet<EntityId>,
    scratch: FxHashSet<EntityId>,
    stats: CollisionStats,
    #[cfg(feature = "parallel")]
    pool: Option<WorkerPool>,
}

impl CollisionPipeline {
    /// Build a pipeline; in `Parallel` mode this starts the worker pool
    pub fn from_config(config: &EngineConfig) -> Result<Self> {
        config.validate()?;

        #[cfg(feature = "parallel")]
        let pool = match config.narrow_phase {
            NarrowPhaseMode::Parallel => Some(WorkerPool::new(
                config.resolved_worker_threads(),
                config.worker_timeout(),
            )?),
            _ => None,
        };

        debug!(
            cell_size = config.cell_size,
            mode = ?config.narrow_phase,
            "collision pipeline created"
        );
        Ok(Self {
            hash: SpatialHash::new(config.cell_size),
            mode: config.narrow_phase,
            state: PipelineState::Idle,
            seen: FxHashSet::default(),
            pairs: Vec::new(),
            flagged: FxHashSet::default(),
            scratch: FxHashSet::default(),
            stats: CollisionStats::default(),
            #[cfg(feature = "parallel")]
            pool,
        })
    }

    pub fn new(cell_size: f32, mode: NarrowPhaseMode) -> Result<Self> {
        Self::from_config(&EngineConfig {
            cell_size,
            narrow_phase: mode,
            ..EngineConfig::default()
        })
    }

    pub fn hash(&self) -> &SpatialHash {
        &self.hash
    }

    pub fn mode(&self) -> NarrowPhaseMode {
        self.mode
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// Canonical pairs detected by the last run, sorted
    pub fn pairs(&self) -> &[(EntityId, EntityId)] {
        &self.pairs
    }

    pub fn stats(&self) -> CollisionStats {
        self.stats
    }

    #[cfg(feature = "parallel")]
    pub fn pool(&self) -> Option<&WorkerPool> {
        self.pool.as_ref()
    }

    /// Switch narrow-phase mode. Entering `Parallel` starts the pool the
    /// first time; the pool is kept when leaving it.
    pub fn set_mode(&mut self, mode: NarrowPhaseMode, config: &EngineConfig) -> Result<()> {
        #[cfg(feature = "parallel")]
        if mode == NarrowPhaseMode::Parallel && self.pool.is_none() {
            self.pool = Some(WorkerPool::new(
                config.resolved_worker_threads(),
                config.worker_timeout(),
            )?);
        }
        #[cfg(not(feature = "parallel"))]
        let _ = config;

        self.mode = mode;
        Ok(())
    }

    /// Drop an entity's entry from the spatial hash
    pub fn remove_entity(&mut self, entity: EntityId) -> bool {
        self.hash.remove_entity(entity)
    }

    /// Run every step for this tick; returns the number of pairs
    pub fn run(
        &mut self,
        world: WorldView<'_>,
        events: &mut EventBus,
        transform: ComponentKey<Transform>,
        collider: ComponentKey<Collider>,
    ) -> Result<usize> {
        #[cfg(feature = "profiling")]
        let _span = info_span!("collision.run", mode = ?self.mode).entered();

        let result = self.run_steps(world, events, transform, collider);
        self.state = PipelineState::Idle;
        result
    }

    fn run_steps(
        &mut self,
        world: WorldView<'_>,
        events: &mut EventBus,
        transform: ComponentKey<Transform>,
        collider: ComponentKey<Collider>,
    ) -> Result<usize> {
        self.state = PipelineState::Rebuilding;
        self.rebuild(world, transform, collider)?;

        self.state = PipelineState::NarrowPhase;
        let raw = self.narrow_phase();

        self.state = PipelineState::Emitting;
        self.seen.clear();
        self.pairs.clear();
        for &(a, b) in &raw {
            let pair = canonical_pair(a, b);
            if self.seen.insert(pair) {
                self.pairs.push(pair);
            }
        }
        self.pairs.sort_unstable();

        self.flagged.clear();
        for &(a, b) in &self.pairs {
            self.flagged.insert(a);
            self.flagged.insert(b);
        }
        if !self.flagged.is_empty() {
            let flag_query = world.query(write(collider))?;
            let mut iter = world.iter(&flag_query)?;
            while let Some((entity, c)) = iter.next() {
                if self.flagged.contains(&entity) {
                    c.collided_this_frame = true;
                }
            }
        }

        for &(a, b) in &self.pairs {
            events.create_event(COLLISION_EVENT, CollisionEvent { a, b })?;
        }

        self.stats = CollisionStats {
            colliders: self.hash.len(),
            occupied_cells: self.hash.occupied_cells(),
            raw_pairs: raw.len(),
            pairs: self.pairs.len(),
        };
        trace!(stats = ?self.stats, "collision pass complete");
        Ok(self.pairs.len())
    }

    fn rebuild(
        &mut self,
        world: WorldView<'_>,
        transform: ComponentKey<Transform>,
        collider: ComponentKey<Collider>,
    ) -> Result<()> {
        #[cfg(feature = "profiling")]
        let _span = info_span!("collision.rebuild").entered();

        let clear_query = world.query(write(collider))?;
        let mut iter = world.iter(&clear_query)?;
        while let Some((_, c)) = iter.next() {
            c.collided_this_frame = false;
        }
        drop(iter);

        self.hash.reset();
        let sync_query = world.query((read(transform), write(collider)))?;
        let mut iter = world.iter(&sync_query)?;
        while let Some((entity, (t, c))) = iter.next() {
            c.bounds.x = t.position.x;
            c.bounds.y = t.position.y;
            c.entity = entity;
            self.hash.insert(c);
        }
        Ok(())
    }

    fn cell_jobs(&self) -> Vec<CellJob> {
        self.hash
            .cells()
            .iter()
            .map(|(cell, bucket)| CellJob {
                cell: *cell,
                colliders: bucket
                    .iter()
                    .filter_map(|&entity| {
                        self.hash
                            .bounds(entity)
                            .map(|bounds| ColliderSnapshot { entity, bounds })
                    })
                    .collect(),
            })
            .collect()
    }

    fn narrow_phase(&mut self) -> Vec<(EntityId, EntityId)> {
        #[cfg(feature = "profiling")]
        let _span = info_span!("collision.narrow_phase").entered();

        match self.mode {
            NarrowPhaseMode::PerEntity => self.narrow_phase_per_entity(),
            NarrowPhaseMode::PerCell => {
                let mut raw = self.narrow_phase_per_cell();
                self.oversized_pairs(&mut raw);
                raw
            }
            NarrowPhaseMode::Parallel => {
                let mut raw = self.narrow_phase_parallel();
                self.oversized_pairs(&mut raw);
                raw
            }
        }
    }

    /// Colliders in the hash's overflow bucket sit in no cell, so cell
    /// jobs never see them. Test each against every tracked collider.
    fn oversized_pairs(&self, raw: &mut Vec<(EntityId, EntityId)>) {
        for &a in self.hash.oversized() {
            let Some(bounds) = self.hash.bounds(a) else {
                continue;
            };
            for (b, other) in self.hash.entries() {
                if a != b && bounds.intersects(&other) {
                    raw.push((a, b));
                }
            }
        }
    }

    fn narrow_phase_per_entity(&mut self) -> Vec<(EntityId, EntityId)> {
        let mut raw = Vec::new();
        let entries: Vec<(EntityId, Rect)> = self.hash.entries().collect();
        for (a, bounds) in entries {
            self.scratch.clear();
            self.hash.query(&bounds, &mut self.scratch);
            for &b in &self.scratch {
                if a == b {
                    continue;
                }
                if let Some(other) = self.hash.bounds(b) {
                    if bounds.intersects(&other) {
                        raw.push((a, b));
                    }
                }
            }
        }
        raw
    }

    fn narrow_phase_per_cell(&self) -> Vec<(EntityId, EntityId)> {
        self.cell_jobs()
            .iter()
            .flat_map(|job| narrow_phase_cell(&job.colliders))
            .collect()
    }

    #[cfg(feature = "parallel")]
    fn narrow_phase_parallel(&mut self) -> Vec<(EntityId, EntityId)> {
        let jobs = self.cell_jobs();
        match self.pool.as_mut() {
            Some(pool) => pool
                .run(jobs)
                .into_iter()
                .flat_map(|result| result.pairs)
                .collect(),
            None => jobs
                .iter()
                .flat_map(|job| narrow_phase_cell(&job.colliders))
                .collect(),
        }
    }

    #[cfg(not(feature = "parallel"))]
    fn narrow_phase_parallel(&mut self) -> Vec<(EntityId, EntityId)> {
        self.narrow_phase_per_cell()
    }
}

/// Update-phase system driving the [`CollisionPipeline`] resource
#[derive(Default)]
pub struct CollisionSystem {
    keys: Option<(ComponentKey<Transform>, ComponentKey<Collider>)>,
}

impl CollisionSystem {
    pub fn new() -> Self {
        Self::default()
    }
}

impl System for CollisionSystem {
    fn name(&self) -> &str {
        "collision"
    }

    fn run(&mut self, ctx: &mut SystemContext<'_>) -> Result<()> {
        let (transform, collider) = match self.keys {
            Some(keys) => keys,
            None => {
                let keys = (
                    ctx.component::<Transform>(TRANSFORM)?,
                    ctx.component::<Collider>(COLLIDER)?,
                );
                self.keys = Some(keys);
                keys
            }
        };

        let world = ctx.world;
        let pipeline = ctx.resources.expect_mut::<CollisionPipeline>()?;
        pipeline.run(world, ctx.events, transform, collider)?;
        Ok(())
    }
}

/// Removes despawned entities from the spatial hash
pub struct SpatialIndexCleanup;

impl Observer for SpatialIndexCleanup {
    fn on_event(&mut self, event: &EntityEvent, world: &mut World) -> Result<()> {
        if let EntityEvent::Despawned(entity) = event {
            if let Some(pipeline) = world.resource_mut::<CollisionPipeline>() {
                if pipeline.remove_entity(*entity) {
                    trace!(?entity, "removed from spatial hash");
                }
            }
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "SpatialIndexCleanup"
    }
}

/// Register the collision components and event, insert the pipeline
/// resource and hook despawn cleanup. Returns the component keys.
pub fn install(
    world: &mut World,
    config: &EngineConfig,
) -> Result<(ComponentKey<Transform>, ComponentKey<Collider>)> {
    let transform = world.register_component::<Transform>(TRANSFORM)?;
    let collider = world.register_component::<Collider>(COLLIDER)?;
    world.register_event(COLLISION_EVENT);
    world.insert_resource(CollisionPipeline::from_config(config)?);
    world.add_observer(Box::new(SpatialIndexCleanup));
    Ok((transform, collider))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::ComponentList;

    fn setup(mode: NarrowPhaseMode) -> (World, ComponentKey<Transform>, ComponentKey<Collider>) {
        let mut world = World::new();
        let config = EngineConfig {
            cell_size: 16.0,
            narrow_phase: mode,
            worker_threads: 2,
            ..EngineConfig::default()
        };
        let (transform, collider) = install(&mut world, &config).unwrap();
        (world, transform, collider)
    }

    fn spawn_box(
        world: &mut World,
        keys: (ComponentKey<Transform>, ComponentKey<Collider>),
        x: f32,
        y: f32,
    ) -> EntityId {
        world
            .spawn(
                "Box",
                ComponentList::new()
                    .with(keys.0, Transform::from_xy(x, y))
                    .with(keys.1, Collider::new(10.0, 10.0)),
            )
            .unwrap()
    }

    fn run_pipeline(
        world: &mut World,
        keys: (ComponentKey<Transform>, ComponentKey<Collider>),
    ) -> usize {
        let (view, events, resources) = world.split();
        let pipeline = resources.expect_mut::<CollisionPipeline>().unwrap();
        pipeline.run(view, events, keys.0, keys.1).unwrap()
    }

    fn flag(world: &World, collider: ComponentKey<Collider>, entity: EntityId) -> bool {
        world
            .get_component(entity, collider)
            .unwrap()
            .unwrap()
            .collided_this_frame
    }

    #[test]
    fn test_overlap_emits_single_event() {
        for mode in [
            NarrowPhaseMode::PerEntity,
            NarrowPhaseMode::PerCell,
            NarrowPhaseMode::Parallel,
        ] {
            let (mut world, t, c) = setup(mode);
            let a = spawn_box(&mut world, (t, c), 0.0, 0.0);
            let b = spawn_box(&mut world, (t, c), 5.0, 5.0);
            let far = spawn_box(&mut world, (t, c), 20.0, 20.0);

            assert_eq!(run_pipeline(&mut world, (t, c)), 1, "{mode:?}");
            let events = world.events().read_events(COLLISION_EVENT).unwrap();
            assert_eq!(events.len(), 1);
            let event = events[0].as_collision().unwrap();
            assert_eq!((event.a, event.b), canonical_pair(a, b));

            assert!(flag(&world, c, a));
            assert!(flag(&world, c, b));
            assert!(!flag(&world, c, far));
        }
    }

    #[test]
    fn test_flags_reset_each_run() {
        let (mut world, t, c) = setup(NarrowPhaseMode::PerCell);
        let a = spawn_box(&mut world, (t, c), 0.0, 0.0);
        let b = spawn_box(&mut world, (t, c), 5.0, 5.0);
        run_pipeline(&mut world, (t, c));
        assert!(flag(&world, c, a));

        world.get_component_mut(b, t).unwrap().unwrap().position.x = 100.0;
        world.events_mut().clear();
        assert_eq!(run_pipeline(&mut world, (t, c)), 0);
        assert!(!flag(&world, c, a));
        assert!(!flag(&world, c, b));
    }

    #[test]
    fn test_payload_and_bounds_follow_transform() {
        let (mut world, t, c) = setup(NarrowPhaseMode::PerEntity);
        let a = spawn_box(&mut world, (t, c), 33.0, 7.0);
        run_pipeline(&mut world, (t, c));

        let collider = *world.get_component(a, c).unwrap().unwrap();
        assert_eq!(collider.entity, a);
        assert_eq!(collider.bounds, Rect::new(33.0, 7.0, 10.0, 10.0));
        let pipeline = world.resource::<CollisionPipeline>().unwrap();
        assert_eq!(pipeline.hash().bounds(a), Some(collider.bounds));
        assert_eq!(pipeline.state(), PipelineState::Idle);
    }

    #[test]
    fn test_despawn_removes_from_hash() {
        let (mut world, t, c) = setup(NarrowPhaseMode::PerCell);
        let a = spawn_box(&mut world, (t, c), 0.0, 0.0);
        run_pipeline(&mut world, (t, c));
        assert!(world.resource::<CollisionPipeline>().unwrap().hash().contains(a));

        world.despawn(a).unwrap();
        let pipeline = world.resource::<CollisionPipeline>().unwrap();
        let mut out = FxHashSet::default();
        pipeline.hash().query(&Rect::new(-100.0, -100.0, 300.0, 300.0), &mut out);
        assert!(!out.contains(&a));
    }

    #[test]
    fn test_pair_spanning_many_cells_reported_once() {
        let (mut world, t, c) = setup(NarrowPhaseMode::PerCell);
        let keys = (t, c);
        let big = |x: f32, y: f32| {
            let mut collider = Collider::new(60.0, 60.0);
            collider.bounds.x = x;
            collider.bounds.y = y;
            ComponentList::new()
                .with(keys.0, Transform::from_xy(x, y))
                .with(keys.1, collider)
        };
        world.spawn("Wall", big(0.0, 0.0)).unwrap();
        world.spawn("Wall", big(10.0, 10.0)).unwrap();

        assert_eq!(run_pipeline(&mut world, keys), 1);
        let stats = world.resource::<CollisionPipeline>().unwrap().stats();
        assert!(stats.raw_pairs > 1);
        assert_eq!(stats.pairs, 1);
    }
}
