//! Tick executor: phase state machine, per-system barrier and profiling

use std::time::{Duration, Instant};

use rustc_hash::FxHashMap;
use tracing::{debug, trace, warn};

#[cfg(feature = "profiling")]
use tracing::info_span;

use crate::command::CommandBuffer;
use crate::error::Result;
use crate::schedule::{Phase, Schedule, SchedulerState};
use crate::system::{BoxedSystem, Frame, SystemContext, SystemId};
use crate::world::World;

/// Accumulated timing of one system
#[derive(Debug, Clone, PartialEq)]
pub struct SystemStats {
    pub min: Duration,
    pub max: Duration,
    pub avg: Duration,
    pub call_count: u64,
}

#[derive(Debug, Clone, Copy)]
struct Accumulator {
    min: Duration,
    max: Duration,
    total: Duration,
    count: u64,
}

/// System profiler for collecting timing data
#[derive(Default)]
pub struct SystemProfiler {
    timings: FxHashMap<SystemId, Accumulator>,
}

impl SystemProfiler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_execution(&mut self, id: SystemId, duration: Duration) {
        self.timings
            .entry(id)
            .and_modify(|acc| {
                acc.min = acc.min.min(duration);
                acc.max = acc.max.max(duration);
                acc.total += duration;
                acc.count += 1;
            })
            .or_insert(Accumulator {
                min: duration,
                max: duration,
                total: duration,
                count: 1,
            });
    }

    pub fn get_stats(&self, id: SystemId) -> Option<SystemStats> {
        let acc = self.timings.get(&id)?;
        Some(SystemStats {
            min: acc.min,
            max: acc.max,
            avg: acc.total / acc.count.max(1) as u32,
            call_count: acc.count,
        })
    }

    pub fn clear(&mut self) {
        self.timings.clear();
    }
}

/// Per-system timing data for a single tick
#[derive(Debug, Clone)]
pub struct SystemTiming {
    pub name: String,
    pub phase: Phase,
    pub duration: Duration,
}

/// Execution profile for a tick
#[derive(Debug, Clone, Default)]
pub struct ExecutionProfile {
    pub tick: u64,
    pub total_frame_time: Duration,
    pub system_timings: Vec<SystemTiming>,
    pub events_cleared: usize,
}

/// Runs a [`Schedule`] against a [`World`], one tick at a time
pub struct Executor {
    pub schedule: Schedule,
    pub profiler: SystemProfiler,
    state: SchedulerState,
    init_done: bool,
    commands: CommandBuffer,
    last_profile: Option<ExecutionProfile>,
}

impl Executor {
    pub fn new(schedule: Schedule) -> Self {
        Self {
            schedule,
            profiler: SystemProfiler::new(),
            state: SchedulerState::Idle,
            init_done: false,
            commands: CommandBuffer::new(),
            last_profile: None,
        }
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    pub fn has_run_init(&self) -> bool {
        self.init_done
    }

    /// Run the init phase. Only the first call does anything; later calls
    /// return `Ok(false)`.
    ///
    /// Events created during init are dropped once the phase completes.
    pub fn run_init(&mut self, world: &mut World, frame: &Frame<'_>) -> Result<bool> {
        if self.init_done {
            debug!("init phase already ran; ignoring");
            return Ok(false);
        }

        #[cfg(feature = "profiling")]
        let _span = info_span!("executor.init").entered();

        let mut timings = Vec::new();
        let result = self.run_phase(Phase::Init, world, frame, &mut timings);
        self.state = SchedulerState::Idle;
        result?;

        self.init_done = true;
        let cleared = world.events_mut().clear();
        debug!(
            systems = timings.len(),
            events_cleared = cleared,
            "init phase complete"
        );
        Ok(true)
    }

    /// Run one tick: init (first time only), update, render, then clear
    /// the event queues and advance the world tick.
    ///
    /// A failing system aborts the tick; its error is returned unchanged
    /// and the world tick does not advance.
    pub fn tick(&mut self, world: &mut World, frame: &Frame<'_>) -> Result<()> {
        if !self.init_done {
            self.run_init(world, frame)?;
        }

        #[cfg(feature = "profiling")]
        let _span = info_span!("executor.tick", tick = world.tick()).entered();

        let frame_start = Instant::now();
        let mut system_timings = Vec::with_capacity(self.schedule.system_count());

        for phase in [Phase::Update, Phase::Render] {
            let result = self.run_phase(phase, world, frame, &mut system_timings);
            if result.is_err() {
                self.state = SchedulerState::Idle;
                return result;
            }
        }
        self.state = SchedulerState::Idle;

        let events_cleared = world.events_mut().clear();
        let tick = world.tick();
        world.increment_tick();

        let total_frame_time = frame_start.elapsed();
        trace!(tick, ?total_frame_time, events_cleared, "tick complete");
        self.last_profile = Some(ExecutionProfile {
            tick,
            total_frame_time,
            system_timings,
            events_cleared,
        });
        Ok(())
    }

    fn run_phase(
        &mut self,
        phase: Phase,
        world: &mut World,
        frame: &Frame<'_>,
        timings: &mut Vec<SystemTiming>,
    ) -> Result<()> {
        self.state = phase.into();
        let systems: &mut [BoxedSystem] = self.schedule.systems_mut(phase);
        let commands = &mut self.commands;
        let profiler = &mut self.profiler;

        for (index, system) in systems.iter_mut().enumerate() {
            #[cfg(feature = "profiling")]
            let _span = info_span!("system", name = system.name(), %phase).entered();

            let start = Instant::now();
            let result = {
                let (view, events, resources) = world.split();
                let mut ctx = SystemContext {
                    world: view,
                    commands: &mut *commands,
                    events,
                    resources,
                    assets: frame.assets,
                    input: frame.input,
                    phase,
                    delta_time: frame.delta_time,
                    stage_width: frame.stage_width,
                    stage_height: frame.stage_height,
                };
                system.run(&mut ctx)
            };

            if let Err(err) = result {
                warn!(system = system.name(), %phase, error = %err, "system failed");
                commands.clear();
                return Err(err);
            }

            // Barrier: structural changes land before the next system starts
            commands.apply(world)?;

            let duration = start.elapsed();
            profiler.record_execution(
                SystemId {
                    phase,
                    index: index as u32,
                },
                duration,
            );
            timings.push(SystemTiming {
                name: system.name().to_string(),
                phase,
                duration,
            });
        }
        Ok(())
    }

    /// Get the most recent execution profile
    pub fn profile(&self) -> Option<&ExecutionProfile> {
        self.last_profile.as_ref()
    }

    /// Log the last tick's timings at debug level
    pub fn log_profile(&self) {
        match &self.last_profile {
            Some(profile) => {
                debug!(
                    tick = profile.tick,
                    total = ?profile.total_frame_time,
                    systems = profile.system_timings.len(),
                    "frame profile"
                );
                for timing in &profile.system_timings {
                    debug!(system = %timing.name, phase = %timing.phase, duration = ?timing.duration);
                }
            }
            None => debug!("no profiling data collected yet"),
        }
    }
}
