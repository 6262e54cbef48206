//! Engine configuration
//!
//! Loaded from JSON; every field is optional and falls back to its default.
//!
//! ```
//! use scatter_ecs::config::{EngineConfig, NarrowPhaseMode};
//!
//! let config = EngineConfig::from_json_str(r#"{ "cell_size": 32.0, "narrow_phase": "per_cell" }"#).unwrap();
//! assert_eq!(config.cell_size, 32.0);
//! assert_eq!(config.narrow_phase, NarrowPhaseMode::PerCell);
//! assert_eq!(config.max_delta_seconds, 0.1);
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{EcsError, Result};

/// How candidate pairs are tested after the broad phase
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum NarrowPhaseMode {
    /// Each collider queries the hash with its own bounds
    PerEntity,
    /// Pairwise tests inside every occupied cell, on the driving thread
    PerCell,
    /// Per-cell tests fanned out to the worker pool
    #[default]
    Parallel,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Upper bound of a single tick's delta time, in seconds
    pub max_delta_seconds: f32,
    /// Frames averaged for the FPS readout
    pub fps_window: usize,
    /// Edge length of a spatial hash cell
    pub cell_size: f32,
    pub stage_width: f32,
    pub stage_height: f32,
    pub narrow_phase: NarrowPhaseMode,
    /// Worker threads for the parallel narrow phase; 0 = available parallelism
    pub worker_threads: usize,
    /// Cap applied to `worker_threads`
    pub max_worker_threads: usize,
    /// Per-cell deadline before the driving thread recomputes the cell
    pub worker_timeout_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_delta_seconds: 0.1,
            fps_window: 20,
            cell_size: 64.0,
            stage_width: 800.0,
            stage_height: 600.0,
            narrow_phase: NarrowPhaseMode::default(),
            worker_threads: 0,
            max_worker_threads: 8,
            worker_timeout_ms: 50,
        }
    }
}

impl EngineConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: EngineConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)?;
        let config = Self::from_json_str(&json)?;
        debug!(path = %path.display(), "engine config loaded");
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_delta_seconds.is_nan() || self.max_delta_seconds <= 0.0 {
            return Err(EcsError::ConfigError(format!(
                "max_delta_seconds must be positive, got {}",
                self.max_delta_seconds
            )));
        }
        if !self.cell_size.is_finite() || self.cell_size <= 0.0 {
            return Err(EcsError::ConfigError(format!(
                "cell_size must be a positive finite number, got {}",
                self.cell_size
            )));
        }
        if self.stage_width < 0.0 || self.stage_height < 0.0 {
            return Err(EcsError::ConfigError(
                "stage size must not be negative".to_string(),
            ));
        }
        if self.fps_window == 0 {
            return Err(EcsError::ConfigError(
                "fps_window must be at least 1".to_string(),
            ));
        }
        if self.max_worker_threads == 0 {
            return Err(EcsError::ConfigError(
                "max_worker_threads must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Thread count for the worker pool after defaults and the cap
    pub fn resolved_worker_threads(&self) -> usize {
        let requested = if self.worker_threads == 0 {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        } else {
            self.worker_threads
        };
        requested.clamp(1, self.max_worker_threads.max(1))
    }

    pub fn worker_timeout(&self) -> Duration {
        Duration::from_millis(self.worker_timeout_ms)
    }
}
