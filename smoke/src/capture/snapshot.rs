//! Still images of the current frame.
//!
//! Snapshots don't go through the capture session and work whether or not a
//! video capture is running.

use super::encoder::{encode_jpeg, encode_png};
use super::{Artifact, ArtifactSink, CaptureError, Frame, ImageEncoding, DOWNLOAD_MIME};

/// Encode `frame` and save it as `<name>.<ext>`. `quality` only applies to
/// JPEG.
///
/// The artifact carries [`DOWNLOAD_MIME`] rather than the image type so that
/// browsers download it instead of opening it. If encoding fails the sink is
/// never called. Returns the saved file name.
pub fn save_as_image<S: ArtifactSink>(
    frame: &Frame,
    name: &str,
    encoding: ImageEncoding,
    quality: u8,
    sink: &mut S,
) -> Result<String, CaptureError> {
    let bytes = match encoding {
        ImageEncoding::Jpeg => encode_jpeg(frame, quality),
        ImageEncoding::Png => encode_png(frame),
    }?;

    let artifact = Artifact::new(
        format!("{}.{}", name, encoding.extension()),
        DOWNLOAD_MIME,
        bytes,
    );
    sink.save(&artifact)?;

    log::info!("📸 Saved snapshot {}", artifact.file_name);

    Ok(artifact.file_name)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::capture::session::test::{frame, RecordingSink};

    #[test]
    fn test_jpeg_snapshot() {
        let mut sink = RecordingSink::default();

        let file_name =
            save_as_image(&frame(120), "pattern_", ImageEncoding::Jpeg, 90, &mut sink).unwrap();

        assert_eq!(file_name, "pattern_.jpg");
        let saved = sink.saved.borrow();
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].mime, DOWNLOAD_MIME);
        assert_eq!(&saved[0].bytes[..2], &[0xFF, 0xD8]);
    }

    #[test]
    fn test_png_snapshot() {
        let mut sink = RecordingSink::default();

        let file_name =
            save_as_image(&frame(7), "still", ImageEncoding::Png, 90, &mut sink).unwrap();

        assert_eq!(file_name, "still.png");
        let decoded = image::load_from_memory(&sink.saved.borrow()[0].bytes).unwrap();
        assert_eq!(decoded.to_rgba8().get_pixel(0, 0).0, [7, 0, 0, 255]);
    }

    #[test]
    fn test_failed_encoding_saves_nothing() {
        let mut sink = RecordingSink::default();
        // Wider than the largest dimension JPEG can store.
        let too_wide = Frame::new(70_000, 1);

        assert!(save_as_image(&too_wide, "wide", ImageEncoding::Jpeg, 90, &mut sink).is_err());
        assert!(sink.saved.borrow().is_empty());
    }

    #[test]
    fn test_jpeg_quality_is_applied() {
        let mut sink = RecordingSink::default();
        let noisy = Frame::from_fn(64, 64, |x, y| {
            let (x, y) = (x as u8, y as u8);
            image::Rgba([x.wrapping_mul(37), y.wrapping_mul(91), (x ^ y).wrapping_mul(13), 255])
        });

        save_as_image(&noisy, "low", ImageEncoding::Jpeg, 10, &mut sink).unwrap();
        save_as_image(&noisy, "high", ImageEncoding::Jpeg, 95, &mut sink).unwrap();

        let saved = sink.saved.borrow();
        assert!(saved[0].bytes.len() < saved[1].bytes.len());
    }
}
