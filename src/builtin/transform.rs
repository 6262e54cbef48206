//! 2D transform and velocity components.

use glam::Vec2;
use serde::{Deserialize, Serialize};

/// Component name of [`Transform`]
pub const TRANSFORM: &str = "@scatter/Transform";

/// Component name of [`Velocity`]
pub const VELOCITY: &str = "@my/Velocity";

/// Position (top-left corner), rotation in radians and scale
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    pub position: Vec2,
    pub rotation: f32,
    pub scale: Vec2,
}

impl Transform {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_position(position: Vec2) -> Self {
        Self {
            position,
            ..Default::default()
        }
    }

    pub fn from_xy(x: f32, y: f32) -> Self {
        Self::from_position(Vec2::new(x, y))
    }

    pub fn with_scale(mut self, scale: f32) -> Self {
        self.scale = Vec2::splat(scale);
        self
    }

    pub fn translate(&mut self, offset: Vec2) {
        self.position += offset;
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec2::ZERO,
            rotation: 0.0,
            scale: Vec2::ONE,
        }
    }
}

/// Linear velocity in units per second
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Velocity(pub Vec2);

impl Velocity {
    pub fn new(x: f32, y: f32) -> Self {
        Self(Vec2::new(x, y))
    }

    /// Displacement over `delta_time` seconds
    pub fn step(&self, delta_time: f32) -> Vec2 {
        self.0 * delta_time
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transform_default() {
        let transform = Transform::default();
        assert_eq!(transform.position, Vec2::ZERO);
        assert_eq!(transform.scale, Vec2::ONE);
    }

    #[test]
    fn test_velocity_integration() {
        let mut transform = Transform::from_xy(10.0, 0.0).with_scale(0.3);
        let velocity = Velocity::new(-100.0, 50.0);

        transform.translate(velocity.step(0.5));
        assert_eq!(transform.position, Vec2::new(-40.0, 25.0));
        assert_eq!(transform.scale, Vec2::splat(0.3));
    }
}
