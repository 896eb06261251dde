//! Per-frame scene inputs

use crate::core_types::{Color, Vec3};
use serde::{Deserialize, Serialize};

/// Read-only scene state handed to the engine every frame
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FrameContext {
    /// Host clock in seconds
    pub time: f32,
    /// Wind velocity in world units per second
    pub wind: Vec3,
    /// Direction from the scene toward the directional light
    pub light_direction: Vec3,
    /// Diffuse colour of the light
    pub light_color: Color,
    pub light_intensity: f32,
    pub camera_position: Vec3,
    /// Camera look direction, used for back-to-front particle sorting
    pub camera_direction: Vec3,
}

impl Default for FrameContext {
    fn default() -> Self {
        Self {
            time: 0.0,
            wind: Vec3::zeros(),
            light_direction: Vec3::z(),
            light_color: Color::WHITE,
            light_intensity: 1.0,
            camera_position: Vec3::zeros(),
            camera_direction: Vec3::x(),
        }
    }
}

impl FrameContext {
    /// Same scene at another time
    pub fn at_time(self, time: f32) -> Self {
        Self { time, ..self }
    }

    /// Same scene `dt` seconds later
    pub fn advanced(self, dt: f32) -> Self {
        self.at_time(self.time + dt)
    }
}

/// Scene state the engine keeps between frames
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SceneSnapshot {
    pub wind: Vec3,
    /// Unit light direction, zero if the frame supplied a degenerate one
    pub light_direction: Vec3,
    /// Light colour already scaled by intensity
    pub light_color: Color,
    pub light_intensity: f32,
    pub camera_position: Vec3,
    pub camera_direction: Vec3,
}

impl SceneSnapshot {
    pub fn from_frame(frame: &FrameContext) -> Self {
        Self {
            wind: frame.wind,
            light_direction: frame
                .light_direction
                .try_normalize(f32::EPSILON)
                .unwrap_or_else(Vec3::zeros),
            light_color: frame.light_color * frame.light_intensity,
            light_intensity: frame.light_intensity,
            camera_position: frame.camera_position,
            camera_direction: frame.camera_direction,
        }
    }
}
