//! Phased system schedule
//!
//! Systems are grouped into three phases and run in registration order
//! within each phase. There is no reordering: the order systems are added
//! in is the order they observe each other's writes, spawns and events.

use std::fmt;

use tracing::debug;

use crate::system::{BoxedSystem, System};

/// Execution phase of a system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Runs exactly once, before the first tick
    Init,
    Update,
    /// Read-only consumers (drawing, diagnostics)
    Render,
}

impl Phase {
    pub const ALL: [Phase; 3] = [Phase::Init, Phase::Update, Phase::Render];
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Init => "init",
            Phase::Update => "update",
            Phase::Render => "render",
        };
        f.write_str(name)
    }
}

/// Where the scheduler currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SchedulerState {
    #[default]
    Idle,
    InitPhase,
    UpdatePhase,
    RenderPhase,
}

impl From<Phase> for SchedulerState {
    fn from(phase: Phase) -> Self {
        match phase {
            Phase::Init => SchedulerState::InitPhase,
            Phase::Update => SchedulerState::UpdatePhase,
            Phase::Render => SchedulerState::RenderPhase,
        }
    }
}

/// Registered systems, per phase
#[derive(Default)]
pub struct Schedule {
    pub(crate) init: Vec<BoxedSystem>,
    pub(crate) update: Vec<BoxedSystem>,
    pub(crate) render: Vec<BoxedSystem>,
}

impl Schedule {
    /// Create an empty schedule
    pub fn new() -> Self {
        Self::default()
    }

    /// Convenience constructor for chaining
    pub fn with_system(mut self, phase: Phase, system: impl System + 'static) -> Self {
        self.add_system(phase, system);
        self
    }

    /// Append a system to the end of `phase`
    pub fn add_system(&mut self, phase: Phase, system: impl System + 'static) {
        self.add_boxed(phase, Box::new(system));
    }

    pub fn add_boxed(&mut self, phase: Phase, system: BoxedSystem) {
        debug!(system = system.name(), %phase, "system added");
        self.systems_mut(phase).push(system);
    }

    pub fn systems(&self, phase: Phase) -> &[BoxedSystem] {
        match phase {
            Phase::Init => &self.init,
            Phase::Update => &self.update,
            Phase::Render => &self.render,
        }
    }

    pub(crate) fn systems_mut(&mut self, phase: Phase) -> &mut Vec<BoxedSystem> {
        match phase {
            Phase::Init => &mut self.init,
            Phase::Update => &mut self.update,
            Phase::Render => &mut self.render,
        }
    }

    /// Get mutable reference to a system by name
    pub fn get_system_mut(&mut self, name: &str) -> Option<&mut (dyn System + 'static)> {
        let (phase, index) = Phase::ALL.into_iter().find_map(|phase| {
            let index = self.systems(phase).iter().position(|s| s.name() == name)?;
            Some((phase, index))
        })?;
        Some(self.systems_mut(phase)[index].as_mut())
    }

    /// System names of a phase, in run order
    pub fn system_names(&self, phase: Phase) -> Vec<&str> {
        self.systems(phase).iter().map(|s| s.name()).collect()
    }

    /// Total number of registered systems
    pub fn system_count(&self) -> usize {
        self.init.len() + self.update.len() + self.render.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::system::system_fn;

    #[test]
    fn test_registration_order_per_phase() {
        let mut schedule = Schedule::new()
            .with_system(Phase::Update, system_fn("move", |_| Ok(())))
            .with_system(Phase::Render, system_fn("draw", |_| Ok(())))
            .with_system(Phase::Update, system_fn("collide", |_| Ok(())));
        schedule.add_system(Phase::Init, system_fn("spawn_player", |_| Ok(())));

        assert_eq!(schedule.system_names(Phase::Update), vec!["move", "collide"]);
        assert_eq!(schedule.system_names(Phase::Render), vec!["draw"]);
        assert_eq!(schedule.system_count(), 4);
        assert!(schedule.get_system_mut("collide").is_some());
        assert!(schedule.get_system_mut("missing").is_none());
    }

    #[test]
    fn test_state_from_phase() {
        assert_eq!(SchedulerState::from(Phase::Init), SchedulerState::InitPhase);
        assert_eq!(SchedulerState::default(), SchedulerState::Idle);
        assert_eq!(Phase::Render.to_string(), "render");
    }
}
