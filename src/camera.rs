use glam::{Mat4, Vec2, Vec3};
use serde::{Deserialize, Serialize};

use crate::config::CameraConfig;

const DEFAULT_YAW: f32 = -90.0;
const DEFAULT_PITCH: f32 = 0.0;

/// Discrete movement directions fed by keyboard input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CameraMovement {
    Forward,
    Backward,
    Left,
    Right,
}

/// Fly camera storing its orientation as Euler angles in degrees.
///
/// The basis vectors are derived from yaw and pitch on demand, so the
/// front vector is always unit length and never drifts out of sync.
#[derive(Debug, Clone, PartialEq)]
pub struct Camera {
    pub position: Vec3,
    world_up: Vec3,
    yaw: f32,
    pitch: f32,
    zoom: f32,
    config: CameraConfig,
    last_cursor: Option<Vec2>,
}

impl Camera {
    /// Camera at `position` looking down -Z.
    pub fn new(position: Vec3) -> Self {
        Self::with_config(position, CameraConfig::default())
    }

    pub fn with_config(position: Vec3, config: CameraConfig) -> Self {
        Self::from_yaw_pitch(position, Vec3::Y, DEFAULT_YAW, DEFAULT_PITCH, config)
    }

    /// Camera with an explicit orientation.
    ///
    /// `world_up` is normalized; a zero or non-finite vector falls back to
    /// +Y. `config` goes through [`CameraConfig::normalized`].
    pub fn from_yaw_pitch(
        position: Vec3,
        world_up: Vec3,
        yaw: f32,
        pitch: f32,
        config: CameraConfig,
    ) -> Self {
        let config = config.normalized();
        let mut camera = Self {
            position,
            world_up: world_up.try_normalize().unwrap_or(Vec3::Y),
            yaw,
            pitch,
            zoom: config.zoom.clamp(config.zoom_min, config.zoom_max),
            config,
            last_cursor: None,
        };
        camera.constrain_pitch();
        camera
    }

    /// Camera at `position` facing along `front`.
    ///
    /// A zero-length `front` falls back to the default -Z orientation.
    pub fn looking_along(position: Vec3, front: Vec3, config: CameraConfig) -> Self {
        let Some(front) = front.try_normalize() else {
            return Self::with_config(position, config);
        };
        let yaw = front.z.atan2(front.x).to_degrees();
        let pitch = front.y.clamp(-1.0, 1.0).asin().to_degrees();
        Self::from_yaw_pitch(position, Vec3::Y, yaw, pitch, config)
    }

    pub fn yaw(&self) -> f32 {
        self.yaw
    }

    pub fn pitch(&self) -> f32 {
        self.pitch
    }

    /// Vertical field of view in degrees.
    pub fn zoom(&self) -> f32 {
        self.zoom
    }

    pub fn config(&self) -> &CameraConfig {
        &self.config
    }

    pub fn world_up(&self) -> Vec3 {
        self.world_up
    }

    pub fn front(&self) -> Vec3 {
        let (yaw, pitch) = (self.yaw.to_radians(), self.pitch.to_radians());
        Vec3::new(yaw.cos() * pitch.cos(), pitch.sin(), yaw.sin() * pitch.cos()).normalize()
    }

    /// Unit vector to the right of `front`. When `front` is parallel to
    /// the world up vector any unit vector perpendicular to `front` is used.
    pub fn right(&self) -> Vec3 {
        let front = self.front();
        front
            .cross(self.world_up)
            .try_normalize()
            .unwrap_or_else(|| front.any_orthonormal_vector())
    }

    pub fn up(&self) -> Vec3 {
        self.right().cross(self.front()).normalize()
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.position + self.front(), self.up())
    }

    /// GL clip-space perspective using the current zoom as vertical FOV.
    pub fn projection_matrix(&self, aspect: f32, near: f32, far: f32) -> Mat4 {
        Mat4::perspective_rh_gl(self.zoom.to_radians(), aspect.max(0.01), near, far)
    }

    pub fn process_keyboard(&mut self, direction: CameraMovement, elapsed_seconds: f32) {
        let velocity = self.config.movement_speed * elapsed_seconds;
        let offset = match direction {
            CameraMovement::Forward => self.front(),
            CameraMovement::Backward => -self.front(),
            CameraMovement::Left => -self.right(),
            CameraMovement::Right => self.right(),
        };
        self.position += offset * velocity;
    }

    /// Rotates by screen-space cursor deltas (y grows downwards).
    pub fn process_mouse_movement(&mut self, delta_x: f32, delta_y: f32) {
        self.yaw += delta_x * self.config.mouse_sensitivity;
        self.pitch -= delta_y * self.config.mouse_sensitivity;
        self.constrain_pitch();
    }

    /// Feeds an absolute cursor position. The first sample after
    /// construction or [`reset_mouse`](Self::reset_mouse) only records it.
    pub fn process_cursor_position(&mut self, x: f32, y: f32) {
        let cursor = Vec2::new(x, y);
        if let Some(last) = self.last_cursor.replace(cursor) {
            let delta = cursor - last;
            self.process_mouse_movement(delta.x, delta.y);
        }
    }

    /// Forgets the last cursor sample, e.g. after the cursor was recaptured.
    pub fn reset_mouse(&mut self) {
        self.last_cursor = None;
    }

    pub fn process_mouse_scroll(&mut self, delta_y: f32) {
        self.zoom = (self.zoom - delta_y).clamp(self.config.zoom_min, self.config.zoom_max);
    }

    fn constrain_pitch(&mut self) {
        if self.config.constrain_pitch {
            let limit = self.config.pitch_limit;
            self.pitch = self.pitch.clamp(-limit, limit);
        }
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self::new(Vec3::ZERO)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn front_is_unit_length_across_orientations() {
        for yaw in (-360..=360).step_by(15) {
            for pitch in (-89..=89).step_by(7) {
                let config = CameraConfig::default();
                let camera =
                    Camera::from_yaw_pitch(Vec3::ZERO, Vec3::Y, yaw as f32, pitch as f32, config);
                assert!((camera.front().length() - 1.0).abs() < 1e-5, "yaw {yaw} pitch {pitch}");
            }
        }
    }

    #[test]
    fn default_orientation_faces_negative_z() {
        let camera = Camera::new(Vec3::new(0.0, 0.0, 3.0));
        assert!(camera.front().abs_diff_eq(Vec3::NEG_Z, 1e-6));
        assert!(camera.right().abs_diff_eq(Vec3::X, 1e-6));
        assert!(camera.up().abs_diff_eq(Vec3::Y, 1e-6));
    }

    #[test]
    fn forward_step_scales_with_speed_and_time() {
        let config = CameraConfig {
            movement_speed: 0.05,
            ..CameraConfig::default()
        };
        let mut camera = Camera::with_config(Vec3::new(0.0, 0.0, 3.0), config);
        camera.process_keyboard(CameraMovement::Forward, 1.0);
        assert!(camera.position.abs_diff_eq(Vec3::new(0.0, 0.0, 2.95), 1e-6));

        camera.process_keyboard(CameraMovement::Right, 2.0);
        assert!(camera.position.abs_diff_eq(Vec3::new(0.1, 0.0, 2.95), 1e-6));
    }

    #[test]
    fn pitch_is_pinned_at_limit() {
        let mut camera = Camera::default();
        camera.process_mouse_movement(0.0, -10_000.0);
        assert_eq!(camera.pitch(), 89.0);
        camera.process_mouse_movement(0.0, 20_000.0);
        assert_eq!(camera.pitch(), -89.0);
    }

    #[test]
    fn pitch_is_free_when_unconstrained() {
        let config = CameraConfig {
            constrain_pitch: false,
            ..CameraConfig::default()
        };
        let mut camera = Camera::with_config(Vec3::ZERO, config);
        camera.process_mouse_movement(0.0, -1_000.0);
        assert_eq!(camera.pitch(), 100.0);
    }

    #[test]
    fn yaw_is_unbounded() {
        let mut camera = Camera::default();
        camera.process_mouse_movement(5_000.0, 0.0);
        assert!((camera.yaw() - 410.0).abs() < 1e-3);
    }

    #[test]
    fn zoom_stays_in_range() {
        let mut camera = Camera::default();
        camera.process_mouse_scroll(-10.0);
        assert_eq!(camera.zoom(), 45.0);
        camera.process_mouse_scroll(30.0);
        assert_eq!(camera.zoom(), 15.0);
        camera.process_mouse_scroll(100.0);
        assert_eq!(camera.zoom(), 1.0);
    }

    #[test]
    fn first_cursor_sample_does_not_rotate() {
        let mut camera = Camera::default();
        camera.process_cursor_position(400.0, 300.0);
        assert_eq!((camera.yaw(), camera.pitch()), (-90.0, 0.0));

        camera.process_cursor_position(410.0, 290.0);
        assert!((camera.yaw() - -89.0).abs() < 1e-5);
        assert!((camera.pitch() - 1.0).abs() < 1e-5);

        camera.reset_mouse();
        camera.process_cursor_position(0.0, 0.0);
        assert!((camera.yaw() - -89.0).abs() < 1e-5);
    }

    #[test]
    fn view_matrix_is_pure() {
        let camera = Camera::new(Vec3::new(1.0, 2.0, 3.0));
        let before = camera.clone();
        assert_eq!(camera.view_matrix(), camera.view_matrix());
        assert_eq!(camera, before);
    }

    #[test]
    fn view_matrix_maps_eye_to_origin() {
        let camera = Camera::new(Vec3::new(0.0, 0.0, 3.0));
        let eye = camera.view_matrix().transform_point3(camera.position);
        assert!(eye.abs_diff_eq(Vec3::ZERO, 1e-6));
        let ahead = camera.view_matrix().transform_point3(Vec3::ZERO);
        assert!(ahead.abs_diff_eq(Vec3::new(0.0, 0.0, -3.0), 1e-5));
    }

    #[test]
    fn looking_along_recovers_angles() {
        let front = Vec3::new(1.0, 1.0, 0.0);
        let camera = Camera::looking_along(Vec3::ZERO, front, CameraConfig::default());
        assert!(camera.yaw().abs() < 1e-4);
        assert!((camera.pitch() - 45.0).abs() < 1e-4);
        assert!(camera.front().abs_diff_eq(Vec3::new(1.0, 1.0, 0.0).normalize(), 1e-5));

        let fallback = Camera::looking_along(Vec3::ZERO, Vec3::ZERO, CameraConfig::default());
        assert_eq!(fallback.yaw(), -90.0);
    }

    #[test]
    fn projection_uses_zoom_as_vertical_fov() {
        let mut camera = Camera::default();
        let projection = camera.projection_matrix(1.0, 0.1, 100.0);
        let focal = 1.0 / 22.5_f32.to_radians().tan();
        assert!((projection.y_axis.y - focal).abs() < 1e-5);
        assert!((projection.project_point3(Vec3::new(0.0, 0.0, -0.1)).z + 1.0).abs() < 1e-4);
        assert!((projection.project_point3(Vec3::new(0.0, 0.0, -100.0)).z - 1.0).abs() < 1e-4);

        let wide = camera.projection_matrix(2.0, 0.1, 100.0);
        assert!((wide.x_axis.x - focal / 2.0).abs() < 1e-5);

        camera.process_mouse_scroll(15.0);
        let narrow = camera.projection_matrix(1.0, 0.1, 100.0);
        assert!(narrow.y_axis.y > projection.y_axis.y);
    }

    #[test]
    fn inverted_bounds_in_config_do_not_panic() {
        let config = CameraConfig {
            zoom_min: 45.0,
            zoom_max: 1.0,
            pitch_limit: -10.0,
            ..CameraConfig::default()
        };
        let mut camera = Camera::with_config(Vec3::ZERO, config);
        assert_eq!(camera.zoom(), 45.0);

        camera.process_mouse_scroll(100.0);
        assert_eq!(camera.zoom(), 1.0);
        camera.process_mouse_movement(0.0, -1_000.0);
        assert_eq!(camera.pitch(), 10.0);
    }

    #[test]
    fn world_up_is_normalized_and_parallel_front_stays_finite() {
        let camera = Camera::from_yaw_pitch(
            Vec3::ZERO,
            Vec3::new(0.0, 5.0, 0.0),
            -90.0,
            0.0,
            CameraConfig::default(),
        );
        assert_eq!(camera.world_up(), Vec3::Y);

        let config = CameraConfig::default();
        let mut camera = Camera::from_yaw_pitch(Vec3::ZERO, Vec3::X, 0.0, 0.0, config);
        assert!(camera.right().is_finite());
        assert!((camera.right().length() - 1.0).abs() < 1e-5);
        assert!(camera.view_matrix().is_finite());
        camera.process_keyboard(CameraMovement::Right, 1.0);
        assert!(camera.position.is_finite());

        let fallback = Camera::from_yaw_pitch(Vec3::ZERO, Vec3::ZERO, 0.0, 0.0, config);
        assert_eq!(fallback.world_up(), Vec3::Y);
    }
}
