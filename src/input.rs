use std::collections::HashSet;

use glam::Vec2;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::camera::{Camera, CameraMovement};

/// Keys the camera controls respond to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyCode {
    W,
    A,
    S,
    D,
}

/// Input snapshot written by the windowing layer and read once per frame.
///
/// Scroll offsets accumulate until [`InputState::take_scroll`] consumes them.
#[derive(Debug, Default)]
pub struct InputState {
    keys: RwLock<HashSet<KeyCode>>,
    cursor_position: RwLock<Option<Vec2>>,
    scroll: RwLock<f32>,
}

impl InputState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_key_down(&self, key: KeyCode) {
        self.keys.write().insert(key);
    }

    pub fn set_key_up(&self, key: KeyCode) {
        self.keys.write().remove(&key);
    }

    pub fn is_key_down(&self, key: KeyCode) -> bool {
        self.keys.read().contains(&key)
    }

    pub fn set_cursor_position(&self, position: Vec2) {
        *self.cursor_position.write() = Some(position);
    }

    /// `None` until the first cursor event arrives.
    pub fn cursor_position(&self) -> Option<Vec2> {
        *self.cursor_position.read()
    }

    pub fn add_scroll(&self, delta_y: f32) {
        *self.scroll.write() += delta_y;
    }

    /// Returns and clears the scroll accumulated since the last call.
    pub fn take_scroll(&self) -> f32 {
        std::mem::take(&mut *self.scroll.write())
    }
}

const MOVEMENT_KEYS: [(KeyCode, CameraMovement); 4] = [
    (KeyCode::W, CameraMovement::Forward),
    (KeyCode::S, CameraMovement::Backward),
    (KeyCode::A, CameraMovement::Left),
    (KeyCode::D, CameraMovement::Right),
];

/// Applies one frame of input to `camera`: held WASD keys, the latest
/// cursor position and any pending scroll.
pub fn drive_camera(camera: &mut Camera, input: &InputState, delta_seconds: f32) {
    for (key, movement) in MOVEMENT_KEYS {
        if input.is_key_down(key) {
            camera.process_keyboard(movement, delta_seconds);
        }
    }
    if let Some(cursor) = input.cursor_position() {
        camera.process_cursor_position(cursor.x, cursor.y);
    }
    let scroll = input.take_scroll();
    if scroll != 0.0 {
        camera.process_mouse_scroll(scroll);
    }
}

/// Turns absolute timestamps into per-frame deltas.
#[derive(Debug, Clone, Copy, Default)]
pub struct FrameClock {
    last: Option<f32>,
}

impl FrameClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seconds since the previous tick; the first tick yields zero.
    pub fn tick(&mut self, now_seconds: f32) -> f32 {
        let delta = self.last.map_or(0.0, |last| (now_seconds - last).max(0.0));
        self.last = Some(now_seconds);
        delta
    }
}

#[cfg(test)]
mod tests {
    use glam::Vec3;

    use super::*;
    use crate::config::CameraConfig;

    #[test]
    fn input_state_tracks_keys() {
        let state = InputState::new();
        state.set_key_down(KeyCode::A);
        assert!(state.is_key_down(KeyCode::A));
        assert!(!state.is_key_down(KeyCode::D));
        state.set_key_up(KeyCode::A);
        assert!(!state.is_key_down(KeyCode::A));
    }

    #[test]
    fn released_keys_stop_moving_the_camera() {
        let mut camera = Camera::new(Vec3::new(0.0, 0.0, 3.0));
        let input = InputState::new();
        input.set_key_down(KeyCode::S);
        drive_camera(&mut camera, &input, 0.0);
        input.set_key_up(KeyCode::S);
        drive_camera(&mut camera, &input, 1.0);
        assert_eq!(camera.position, Vec3::new(0.0, 0.0, 3.0));
    }

    #[test]
    fn scroll_accumulates_until_taken() {
        let state = InputState::new();
        state.add_scroll(1.0);
        state.add_scroll(2.5);
        assert_eq!(state.take_scroll(), 3.5);
        assert_eq!(state.take_scroll(), 0.0);
    }

    #[test]
    fn held_keys_move_the_camera() {
        let config = CameraConfig {
            movement_speed: 1.0,
            ..CameraConfig::default()
        };
        let mut camera = Camera::with_config(Vec3::new(0.0, 0.0, 3.0), config);
        let input = InputState::new();
        input.set_key_down(KeyCode::W);
        input.set_key_down(KeyCode::D);

        drive_camera(&mut camera, &input, 0.5);
        assert!(camera.position.abs_diff_eq(Vec3::new(0.5, 0.0, 2.5), 1e-6));
    }

    #[test]
    fn cursor_and_scroll_reach_the_camera() {
        let mut camera = Camera::default();
        let input = InputState::new();
        input.set_cursor_position(Vec2::new(400.0, 300.0));
        drive_camera(&mut camera, &input, 0.0);
        assert_eq!(camera.yaw(), -90.0);

        input.set_cursor_position(Vec2::new(500.0, 300.0));
        input.add_scroll(5.0);
        drive_camera(&mut camera, &input, 0.0);
        assert!((camera.yaw() - -80.0).abs() < 1e-4);
        assert_eq!(camera.zoom(), 40.0);
    }

    #[test]
    fn first_frame_delta_is_zero() {
        let mut clock = FrameClock::new();
        assert_eq!(clock.tick(12.0), 0.0);
        assert!((clock.tick(12.25) - 0.25).abs() < 1e-6);
        assert_eq!(clock.tick(12.0), 0.0);
    }
}
