//! Video and still-image capture of the rendered smoke plane.
//!
//! A [`CaptureSession`] accumulates frames handed to it by the render loop
//! between `start` and `stop`, then exports them through an [`ArtifactSink`].
//! Still images bypass the session entirely, see [`snapshot`].

pub mod clock;
pub mod config;
pub mod encoder;
pub mod export;
pub mod panel;
pub mod session;
pub mod snapshot;

pub use clock::{Clock, SystemClock, Timestamp};
pub use config::{CaptureConfig, ImageEncoding, VideoFormat};
pub use encoder::{Frame, FrameEncoder, StreamingEncoder};
pub use export::{Artifact, ArtifactSink, DiskSink, DOWNLOAD_MIME};
pub use panel::{ControlPanel, PanelAction};
pub use session::{CaptureSession, Export, StopOutcome};

#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error("Failed to encode {format} output: {source}")]
    Encode {
        format: &'static str,
        #[source]
        source: image::ImageError,
    },

    #[error("Nothing to export: no frames were captured")]
    NoFrames,

    #[error("Failed to save {file_name}: {reason}")]
    Export { file_name: String, reason: String },

    #[error("Failed to read back the rendered frame: {0}")]
    Readback(String),
}
