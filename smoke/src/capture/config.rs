use serde::{Deserialize, Serialize};
use std::fmt;
use std::num::NonZeroU32;

/// Fixed configuration of the capture encoder.
///
/// The encoder is created once from this configuration and reused for every
/// session. Only the output name can change afterwards, through
/// [`CaptureSession::set_output_name`](super::CaptureSession::set_output_name).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CaptureConfig {
    pub format: VideoFormat,
    pub frame_rate: NonZeroU32,
    pub name: String,
    pub verbose: bool,
    /// JPEG quality, 1 to 100. Applies to snapshots too.
    pub quality: u8,
    pub snapshot_encoding: ImageEncoding,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            format: VideoFormat::Gif,
            frame_rate: NonZeroU32::new(60).unwrap_or(NonZeroU32::MIN),
            name: "pattern_".to_string(),
            verbose: true,
            quality: 90,
            snapshot_encoding: ImageEncoding::Jpeg,
        }
    }
}

#[derive(Clone, Copy, Default, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum VideoFormat {
    /// A single looping animated GIF.
    #[default]
    Gif,
    /// One PNG file per frame.
    Png,
    /// One JPEG file per frame.
    Jpeg,
}

impl VideoFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            VideoFormat::Gif => "gif",
            VideoFormat::Png => "png",
            VideoFormat::Jpeg => "jpg",
        }
    }

    pub fn mime(&self) -> &'static str {
        match self {
            VideoFormat::Gif => "image/gif",
            VideoFormat::Png => "image/png",
            VideoFormat::Jpeg => "image/jpeg",
        }
    }
}

impl fmt::Display for VideoFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Encoding used for still snapshots.
#[derive(Clone, Copy, Default, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageEncoding {
    #[default]
    Jpeg,
    Png,
}

impl ImageEncoding {
    pub fn extension(&self) -> &'static str {
        match self {
            ImageEncoding::Jpeg => "jpg",
            ImageEncoding::Png => "png",
        }
    }
}
