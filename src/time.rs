//! Frame timing and gameplay timers.
//!
//! This module provides:
//! - [`FrameClock`] - clamped per-tick delta and a rolling FPS average
//! - [`Timer`] - countdown used for spawn and fire cadence
//!
//! # Examples
//!
//! ```
//! use scatter_ecs::time::{FrameClock, Timer, TimerMode};
//!
//! let mut clock = FrameClock::new(0.1, 20);
//! let mut cooldown = Timer::new(0.3, TimerMode::Once);
//!
//! // Host timestamps in seconds
//! clock.advance(1.0);
//! let dt = clock.advance(1.016);
//! cooldown.tick(dt);
//! assert!(!cooldown.finished());
//! ```

use std::collections::VecDeque;

/// Delta-time source driven by host timestamps
#[derive(Clone, Debug)]
pub struct FrameClock {
    max_delta: f32,
    last: Option<f64>,
    delta: f32,
    elapsed: f64,
    frame_count: u64,
    window: usize,
    samples: VecDeque<f32>,
}

impl FrameClock {
    /// `max_delta` caps a single step (seconds); `window` is the number of
    /// frames averaged for [`FrameClock::fps`].
    pub fn new(max_delta: f32, window: usize) -> Self {
        Self {
            max_delta,
            last: None,
            delta: 0.0,
            elapsed: 0.0,
            frame_count: 0,
            window: window.max(1),
            samples: VecDeque::with_capacity(window.max(1)),
        }
    }

    /// Feed the host timestamp (seconds) of a new frame and return the
    /// clamped delta. The first call returns zero.
    pub fn advance(&mut self, now: f64) -> f32 {
        let raw = match self.last {
            Some(last) => (now - last).max(0.0) as f32,
            None => 0.0,
        };
        self.last = Some(now);
        self.step(raw)
    }

    /// Advance by an explicit delta (seconds), clamped like `advance`
    pub fn step(&mut self, raw_delta: f32) -> f32 {
        let delta = raw_delta.clamp(0.0, self.max_delta);
        self.delta = delta;
        self.elapsed += delta as f64;
        self.frame_count += 1;

        if delta > 0.0 {
            if self.samples.len() == self.window {
                self.samples.pop_front();
            }
            self.samples.push_back(1.0 / delta);
        }
        delta
    }

    /// Forget the previous timestamp (after a pause), so the next frame
    /// does not see the paused interval as its delta
    pub fn resync(&mut self) {
        self.last = None;
    }

    pub fn delta(&self) -> f32 {
        self.delta
    }

    /// Sum of clamped deltas
    pub fn elapsed(&self) -> f64 {
        self.elapsed
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    pub fn max_delta(&self) -> f32 {
        self.max_delta
    }

    /// Mean of the instantaneous frame rates of the last `window` frames
    pub fn fps(&self) -> f32 {
        if self.samples.is_empty() {
            return 0.0;
        }
        self.samples.iter().sum::<f32>() / self.samples.len() as f32
    }
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new(0.1, 20)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TimerMode {
    /// Finishes once, then stays finished until reset
    Once,
    /// Wraps around every `duration` seconds
    Infinite,
}

/// Countdown timer ticked by systems with the frame delta
#[derive(Clone, Debug)]
pub struct Timer {
    duration: f32,
    elapsed: f32,
    mode: TimerMode,
    finished: bool,
    segment_finished: bool,
}

impl Timer {
    pub fn new(duration: f32, mode: TimerMode) -> Self {
        Self {
            duration: duration.max(0.0),
            elapsed: 0.0,
            mode,
            finished: false,
            segment_finished: false,
        }
    }

    pub fn tick(&mut self, delta: f32) {
        self.segment_finished = false;
        match self.mode {
            TimerMode::Once => {
                if self.finished {
                    return;
                }
                self.elapsed += delta;
                if self.elapsed >= self.duration {
                    self.elapsed = self.duration;
                    self.finished = true;
                    self.segment_finished = true;
                }
            }
            TimerMode::Infinite => {
                self.elapsed += delta;
                if self.duration <= 0.0 {
                    self.elapsed = 0.0;
                    self.segment_finished = true;
                } else if self.elapsed >= self.duration {
                    self.elapsed %= self.duration;
                    self.segment_finished = true;
                }
            }
        }
    }

    /// `Once`: the timer has run out. `Infinite`: never.
    pub fn finished(&self) -> bool {
        self.finished
    }

    /// A segment ended during the last `tick`
    pub fn segment_finished(&self) -> bool {
        self.segment_finished
    }

    pub fn reset(&mut self) {
        self.elapsed = 0.0;
        self.finished = false;
        self.segment_finished = false;
    }

    pub fn elapsed(&self) -> f32 {
        self.elapsed
    }

    pub fn duration(&self) -> f32 {
        self.duration
    }

    pub fn mode(&self) -> TimerMode {
        self.mode
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delta_is_clamped() {
        let mut clock = FrameClock::new(0.1, 20);
        assert_eq!(clock.advance(10.0), 0.0);
        assert!((clock.advance(10.016) - 0.016).abs() < 1e-4);
        assert_eq!(clock.advance(12.0), 0.1);
        assert_eq!(clock.frame_count(), 3);
    }

    #[test]
    fn test_fps_average_window() {
        let mut clock = FrameClock::new(0.1, 4);
        for _ in 0..10 {
            clock.step(0.05);
        }
        assert!((clock.fps() - 20.0).abs() < 1e-3);

        clock.step(0.025);
        clock.step(0.025);
        clock.step(0.025);
        clock.step(0.025);
        assert!((clock.fps() - 40.0).abs() < 1e-2);
    }

    #[test]
    fn test_once_timer() {
        let mut timer = Timer::new(0.3, TimerMode::Once);
        timer.tick(0.2);
        assert!(!timer.finished());
        timer.tick(0.2);
        assert!(timer.finished());
        assert!(timer.segment_finished());
        timer.tick(0.2);
        assert!(timer.finished());
        assert!(!timer.segment_finished());

        timer.reset();
        assert!(!timer.finished());
    }

    #[test]
    fn test_infinite_timer_wraps() {
        let mut timer = Timer::new(0.5, TimerMode::Infinite);
        let mut segments = 0;
        for _ in 0..10 {
            timer.tick(0.25);
            if timer.segment_finished() {
                segments += 1;
            }
        }
        assert_eq!(segments, 5);
        assert!(!timer.finished());
    }
}
