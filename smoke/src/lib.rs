pub mod camera;
pub mod capture;
pub mod render;
mod rng;
pub mod settings;
mod smoke;

pub use capture::{CaptureConfig, CaptureError, VideoFormat};
pub use settings::Settings;
pub use smoke::{Problem, Smoke};
