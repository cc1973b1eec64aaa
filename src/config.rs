use serde::{Deserialize, Serialize};

/// Tunables for [`Camera`](crate::Camera).
///
/// Angles are in degrees. The defaults match the tutorial scenes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// World units per second.
    pub movement_speed: f32,
    /// Degrees of rotation per pixel of cursor travel.
    pub mouse_sensitivity: f32,
    /// Initial vertical field of view.
    pub zoom: f32,
    pub zoom_min: f32,
    pub zoom_max: f32,
    pub pitch_limit: f32,
    pub constrain_pitch: bool,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            movement_speed: 2.5,
            mouse_sensitivity: 0.1,
            zoom: 45.0,
            zoom_min: 1.0,
            zoom_max: 45.0,
            pitch_limit: 89.0,
            constrain_pitch: true,
        }
    }
}

impl CameraConfig {
    /// Repairs bounds a hand-written config may get wrong: swapped zoom
    /// limits, a negative pitch limit, or non-finite values (replaced by
    /// the defaults).
    pub fn normalized(self) -> Self {
        let defaults = Self::default();
        let finite_or = |value: f32, fallback: f32| {
            if value.is_finite() {
                value
            } else {
                fallback
            }
        };
        let zoom_min = finite_or(self.zoom_min, defaults.zoom_min);
        let zoom_max = finite_or(self.zoom_max, defaults.zoom_max);
        Self {
            movement_speed: finite_or(self.movement_speed, defaults.movement_speed),
            mouse_sensitivity: finite_or(self.mouse_sensitivity, defaults.mouse_sensitivity),
            zoom: finite_or(self.zoom, defaults.zoom),
            zoom_min: zoom_min.min(zoom_max),
            zoom_max: zoom_min.max(zoom_max),
            pitch_limit: finite_or(self.pitch_limit, defaults.pitch_limit).abs(),
            constrain_pitch: self.constrain_pitch,
        }
    }
}

/// What to do when a shader pair fails to compile or link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ShaderPolicy {
    /// Return the error to the caller.
    #[default]
    FailFast,
    /// Log the diagnostic and carry on without a program.
    WarnAndContinue,
}

/// Options applied when uploading decoded images.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TextureOptions {
    /// Flip rows so the first row is the bottom of the image, as GL expects.
    pub flip_vertically: bool,
}
