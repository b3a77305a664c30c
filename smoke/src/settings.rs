use crate::capture::CaptureConfig;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub seed: Option<String>,

    pub plane: Plane,
    pub camera: Camera,
    pub controls: Controls,
    pub noise: Noise,

    pub smoke_color: [f32; 3],
    pub max_pixel_ratio: f64,

    pub capture: CaptureConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            seed: None,
            plane: Plane::default(),
            camera: Camera::default(),
            controls: Controls::default(),
            noise: Noise::default(),
            smoke_color: [0.6, 0.3, 0.2],
            max_pixel_ratio: 2.0,
            capture: CaptureConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Plane {
    pub width_segments: u32,
    pub height_segments: u32,
    pub scale: f32,
}

impl Default for Plane {
    fn default() -> Self {
        Self {
            width_segments: 16,
            height_segments: 64,
            scale: 2.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Camera {
    pub fov_y_degrees: f32,
    pub near: f32,
    pub far: f32,
    pub position: [f32; 3],
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            fov_y_degrees: 75.0,
            near: 0.1,
            far: 100.0,
            position: [0.0, 0.0, 1.0],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Controls {
    pub enable_damping: bool,
    pub damping_factor: f32,
    pub enable_zoom: bool,
    pub zoom_speed: f32,
    pub rotate_speed: f32,
}

impl Default for Controls {
    fn default() -> Self {
        Self {
            enable_damping: true,
            damping_factor: 0.05,
            enable_zoom: false,
            zoom_speed: 1.0,
            rotate_speed: 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Noise {
    pub size: u32,
    pub scale: u32,
    pub octaves: u32,
    pub persistence: f32,
}

impl Default for Noise {
    fn default() -> Self {
        Self {
            size: 128,
            scale: 4,
            octaves: 4,
            persistence: 0.5,
        }
    }
}
