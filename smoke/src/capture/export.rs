use super::CaptureError;

use std::fs;
use std::path::PathBuf;

/// MIME type that makes browsers download a file instead of displaying it.
pub const DOWNLOAD_MIME: &str = "image/octet-stream";

/// A finished, downloadable file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub file_name: String,
    pub mime: String,
    pub bytes: Vec<u8>,
}

impl Artifact {
    pub fn new(file_name: impl Into<String>, mime: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            mime: mime.into(),
            bytes,
        }
    }
}

/// Hands an artifact to the platform: a download in the browser, a file on
/// disk on the desktop.
pub trait ArtifactSink {
    fn save(&mut self, artifact: &Artifact) -> Result<(), CaptureError>;
}

impl<S: ArtifactSink + ?Sized> ArtifactSink for &mut S {
    fn save(&mut self, artifact: &Artifact) -> Result<(), CaptureError> {
        (**self).save(artifact)
    }
}

/// Writes artifacts into a directory.
#[derive(Debug, Clone)]
pub struct DiskSink {
    output_dir: PathBuf,
}

impl DiskSink {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }
}

impl ArtifactSink for DiskSink {
    fn save(&mut self, artifact: &Artifact) -> Result<(), CaptureError> {
        let to_error = |err: std::io::Error| CaptureError::Export {
            file_name: artifact.file_name.clone(),
            reason: err.to_string(),
        };

        fs::create_dir_all(&self.output_dir).map_err(to_error)?;

        let path = self.output_dir.join(&artifact.file_name);
        fs::write(&path, &artifact.bytes).map_err(to_error)?;

        log::info!("💾 Saved {}", path.display());
        Ok(())
    }
}
