//! Keyboard state as seen by systems.
//!
//! The host feeds key transitions into a [`KeyboardInput`] between ticks;
//! systems only see the read-only [`InputSource`] view.
//!
//! # Examples
//!
//! ```
//! use scatter_ecs::builtin::{InputSource, KeyCode, KeyboardInput};
//!
//! let mut input = KeyboardInput::new();
//! input.press(KeyCode::Space);
//! assert!(input.is_pressed(KeyCode::Space));
//!
//! input.clear_just_changed(); // end of frame
//! assert!(!input.just_pressed(KeyCode::Space));
//! ```

use std::hash::Hash;

use rustc_hash::FxHashSet;

/// Read-only key state handed to systems
pub trait InputSource: Send + Sync {
    fn is_pressed(&self, key: KeyCode) -> bool;

    fn just_pressed(&self, _key: KeyCode) -> bool {
        false
    }
}

/// Input source for headless runs: nothing is ever pressed
#[derive(Clone, Copy, Debug, Default)]
pub struct NoInput;

impl InputSource for NoInput {
    fn is_pressed(&self, _key: KeyCode) -> bool {
        false
    }
}

/// Generic pressed / just pressed / just released tracker
#[derive(Clone, Debug)]
pub struct Input<T: Copy + Eq + Hash> {
    pressed: FxHashSet<T>,
    just_pressed: FxHashSet<T>,
    just_released: FxHashSet<T>,
}

impl<T: Copy + Eq + Hash> Input<T> {
    pub fn new() -> Self {
        Self {
            pressed: FxHashSet::default(),
            just_pressed: FxHashSet::default(),
            just_released: FxHashSet::default(),
        }
    }

    pub fn press(&mut self, input: T) {
        if self.pressed.insert(input) {
            self.just_pressed.insert(input);
        }
    }

    pub fn release(&mut self, input: T) {
        if self.pressed.remove(&input) {
            self.just_released.insert(input);
        }
    }

    pub fn pressed(&self, input: T) -> bool {
        self.pressed.contains(&input)
    }

    pub fn just_pressed(&self, input: T) -> bool {
        self.just_pressed.contains(&input)
    }

    pub fn just_released(&self, input: T) -> bool {
        self.just_released.contains(&input)
    }

    pub fn get_pressed(&self) -> impl Iterator<Item = &T> {
        self.pressed.iter()
    }

    /// Clear just_pressed and just_released (call at end of frame)
    pub fn clear_just_changed(&mut self) {
        self.just_pressed.clear();
        self.just_released.clear();
    }

    pub fn reset(&mut self) {
        self.pressed.clear();
        self.clear_just_changed();
    }
}

impl<T: Copy + Eq + Hash> Default for Input<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Keys a 2D game typically binds
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum KeyCode {
    W,
    A,
    S,
    D,
    Space,
    Enter,
    Escape,
    Left,
    Right,
    Up,
    Down,
    LShift,
}

pub type KeyboardInput = Input<KeyCode>;

impl InputSource for KeyboardInput {
    fn is_pressed(&self, key: KeyCode) -> bool {
        self.pressed(key)
    }

    fn just_pressed(&self, key: KeyCode) -> bool {
        Input::just_pressed(self, key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_input_press_release() {
        let mut input = KeyboardInput::new();

        input.press(KeyCode::Space);
        assert!(input.is_pressed(KeyCode::Space));
        assert!(input.just_pressed(KeyCode::Space));

        input.clear_just_changed();
        input.press(KeyCode::Space);
        assert!(input.pressed(KeyCode::Space));
        assert!(!input.just_pressed(KeyCode::Space));

        input.release(KeyCode::Space);
        assert!(!input.pressed(KeyCode::Space));
        assert!(input.just_released(KeyCode::Space));
    }

    #[test]
    fn test_release_without_press_is_ignored() {
        let mut input = KeyboardInput::new();
        input.release(KeyCode::Left);
        assert!(!input.just_released(KeyCode::Left));
        assert!(!NoInput.is_pressed(KeyCode::Left));
    }
}
