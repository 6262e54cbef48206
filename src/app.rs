use tracing::{debug, info};

use crate::builtin::{AssetRegistry, KeyboardInput};
use crate::config::EngineConfig;
use crate::error::Result;
use crate::executor::Executor;
use crate::plugin::Plugin;
use crate::schedule::{Phase, Schedule};
use crate::system::{Frame, System};
use crate::time::FrameClock;
use crate::world::World;

/// Delta used by [`App::single_step`]
const SINGLE_STEP_DELTA: f32 = 1.0 / 60.0;

/// Main application entry point.
///
/// Owns the world, the scheduler and the host-side collaborators (assets,
/// keyboard state, frame clock). The host calls [`App::step`] once per
/// frame with its timestamp.
pub struct App {
    world: World,
    executor: Executor,
    config: EngineConfig,
    clock: FrameClock,
    assets: AssetRegistry,
    input: KeyboardInput,
    stage_width: f32,
    stage_height: f32,
    running: bool,
}

impl App {
    pub fn new(config: EngineConfig) -> Result<Self> {
        Self::with_assets(config, AssetRegistry::new(), &[])
    }

    /// Create an app whose `required` textures must all be present in
    /// `assets`; a missing one aborts construction.
    pub fn with_assets(
        config: EngineConfig,
        assets: AssetRegistry,
        required: &[&str],
    ) -> Result<Self> {
        config.validate()?;
        assets.require(required)?;

        info!(
            textures = assets.len(),
            stage_width = config.stage_width,
            stage_height = config.stage_height,
            "app created"
        );
        Ok(Self {
            world: World::new(),
            executor: Executor::new(Schedule::new()),
            clock: FrameClock::new(config.max_delta_seconds, config.fps_window),
            stage_width: config.stage_width,
            stage_height: config.stage_height,
            config,
            assets,
            input: KeyboardInput::new(),
            running: false,
        })
    }

    /// Add a plugin
    pub fn add_plugin<P: Plugin>(&mut self, plugin: P) -> Result<&mut Self> {
        info!(plugin = plugin.name(), "registering plugin");
        plugin.build(self)?;
        Ok(self)
    }

    /// Add a system to `phase`; systems of a phase run in registration order
    pub fn add_system(&mut self, phase: Phase, system: impl System + 'static) -> &mut Self {
        self.executor.schedule.add_system(phase, system);
        self
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    pub fn executor(&self) -> &Executor {
        &self.executor
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn assets(&self) -> &AssetRegistry {
        &self.assets
    }

    pub fn input(&self) -> &KeyboardInput {
        &self.input
    }

    /// Keyboard state, updated by the host between frames
    pub fn input_mut(&mut self) -> &mut KeyboardInput {
        &mut self.input
    }

    pub fn clock(&self) -> &FrameClock {
        &self.clock
    }

    pub fn fps(&self) -> f32 {
        self.clock.fps()
    }

    pub fn stage_size(&self) -> (f32, f32) {
        (self.stage_width, self.stage_height)
    }

    pub fn set_stage_size(&mut self, width: f32, height: f32) {
        debug!(width, height, "stage resized");
        self.stage_width = width;
        self.stage_height = height;
    }

    /// Resume ticking on [`App::step`]
    pub fn run(&mut self) {
        if !self.running {
            debug!("app running");
            self.clock.resync();
            self.running = true;
        }
    }

    /// Stop ticking; [`App::step`] becomes a no-op until [`App::run`]
    pub fn pause(&mut self) {
        if self.running {
            debug!("app paused");
            self.running = false;
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Run the init phase now instead of on the first tick
    pub fn run_init(&mut self) -> Result<bool> {
        let frame = Frame::new(
            0.0,
            self.stage_width,
            self.stage_height,
            &self.assets,
            &self.input,
        );
        self.executor.run_init(&mut self.world, &frame)
    }

    /// Host frame callback. `now` is the host timestamp in seconds.
    /// Returns whether a tick ran.
    pub fn step(&mut self, now: f64) -> Result<bool> {
        if !self.running {
            return Ok(false);
        }
        let delta = self.clock.advance(now);
        self.tick_with(delta)?;
        Ok(true)
    }

    /// Run exactly one tick with a fixed delta and leave the app paused
    pub fn single_step(&mut self) -> Result<()> {
        self.pause();
        let delta = self.clock.step(SINGLE_STEP_DELTA);
        self.tick_with(delta)
    }

    fn tick_with(&mut self, delta: f32) -> Result<()> {
        let frame = Frame::new(
            delta,
            self.stage_width,
            self.stage_height,
            &self.assets,
            &self.input,
        );
        let result = self.executor.tick(&mut self.world, &frame);
        self.input.clear_just_changed();
        result
    }
}
