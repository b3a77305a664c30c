use super::{Artifact, CaptureConfig, CaptureError, VideoFormat};

use image::codecs::gif::{GifEncoder, Repeat};
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::imageops::{self, FilterType};
use image::{Delay, RgbaImage};
use std::cell::RefCell;
use std::io::{self, Write};
use std::rc::Rc;

/// A drawn frame of the render surface.
pub type Frame = RgbaImage;

/// Turns the frames of one capture into downloadable artifacts.
pub trait FrameEncoder {
    /// Discard anything left over and start a new capture.
    fn begin(&mut self);

    /// Encode one frame. Called once per rendered frame while capturing, so
    /// the work is spread over the capture instead of piling up at the end.
    fn add_frame(&mut self, frame: Frame);

    /// Package everything encoded since `begin` into artifacts named after
    /// `name`. The encoder is empty afterwards, even on failure.
    fn finish(&mut self, name: &str) -> Result<Vec<Artifact>, CaptureError>;

    fn buffered_frames(&self) -> usize;
}

// NeuQuant sample factor. 1 is the slowest and best, 30 the fastest.
const GIF_SPEED: i32 = 10;

// GIF delays are whole centiseconds, and browsers slow anything below 2cs
// down to 10cs.
const MIN_FRAME_DELAY_CS: u32 = 2;

/// Encodes frames as they arrive. Only the compressed output, plus one raw
/// frame for GIFs, is held between frames.
///
/// GIF frames are timed on a centisecond grid derived from the frame rate.
/// Frames that would be shown for less than [`MIN_FRAME_DELAY_CS`] are
/// dropped, so the animation plays back at real time even when the frame
/// rate is higher than a GIF can represent.
pub struct StreamingEncoder {
    format: VideoFormat,
    frame_rate: u32,
    quality: u8,
    verbose: bool,

    frames: usize,
    size: Option<(u32, u32)>,
    gif: Option<GifStream>,
    stills: Vec<Vec<u8>>,
    failure: Option<CaptureError>,
}

impl StreamingEncoder {
    pub fn new(config: &CaptureConfig) -> Self {
        Self {
            format: config.format,
            frame_rate: config.frame_rate.get(),
            quality: config.quality.clamp(1, 100),
            verbose: config.verbose,
            frames: 0,
            size: None,
            gif: None,
            stills: Vec::new(),
            failure: None,
        }
    }

    fn encode(&mut self, frame: Frame, index: usize) -> Result<(), CaptureError> {
        let frame = self.conform(frame);

        match self.format {
            VideoFormat::Gif => match self.gif.as_mut() {
                Some(gif) => gif.push(frame, frame_start_cs(index, self.frame_rate)),
                None => Ok(()),
            },
            VideoFormat::Png => {
                self.stills.push(encode_png(&frame)?);
                Ok(())
            }
            VideoFormat::Jpeg => {
                self.stills.push(encode_jpeg(&frame, self.quality)?);
                Ok(())
            }
        }
    }

    // Every frame of a capture shares the size of the first one. A window
    // resized mid-capture produces frames of another size.
    fn conform(&mut self, frame: Frame) -> Frame {
        let (width, height) = *self.size.get_or_insert(frame.dimensions());
        if frame.dimensions() == (width, height) {
            return frame;
        }

        log::warn!(
            "Resizing captured frame from {}x{} to {}x{}",
            frame.width(),
            frame.height(),
            width,
            height
        );
        imageops::resize(&frame, width, height, FilterType::Triangle)
    }

    fn reset(&mut self) {
        self.frames = 0;
        self.size = None;
        self.gif = None;
        self.stills.clear();
        self.failure = None;
    }
}

impl FrameEncoder for StreamingEncoder {
    fn begin(&mut self) {
        self.reset();

        if self.format == VideoFormat::Gif {
            match GifStream::new() {
                Ok(gif) => self.gif = Some(gif),
                Err(err) => self.failure = Some(err),
            }
        }
    }

    fn add_frame(&mut self, frame: Frame) {
        let index = self.frames;
        self.frames += 1;

        // The first failure is reported by `finish`.
        if self.failure.is_some() {
            return;
        }
        if let Err(err) = self.encode(frame, index) {
            log::error!("{}", err);
            self.failure = Some(err);
        }

        if self.verbose && self.frames % self.frame_rate as usize == 0 {
            log::debug!(
                "🎞 Captured {} frames ({}s of video)",
                self.frames,
                self.frames / self.frame_rate as usize
            );
        }
    }

    fn finish(&mut self, name: &str) -> Result<Vec<Artifact>, CaptureError> {
        let frames = self.frames;
        let gif = self.gif.take();
        let stills = std::mem::take(&mut self.stills);
        let failure = self.failure.take();
        self.reset();

        if let Some(err) = failure {
            return Err(err);
        }
        if frames == 0 {
            return Err(CaptureError::NoFrames);
        }

        if self.verbose {
            log::info!(
                "📦 Finishing {} frames as {} at {} fps",
                frames,
                self.format,
                self.frame_rate
            );
        }

        match (self.format, gif) {
            (VideoFormat::Gif, Some(gif)) => {
                let bytes = gif.finish(frame_start_cs(frames, self.frame_rate))?;
                Ok(vec![Artifact::new(
                    format!("{}.gif", name),
                    VideoFormat::Gif.mime(),
                    bytes,
                )])
            }
            (VideoFormat::Gif, None) => Err(CaptureError::NoFrames),
            (format, _) => Ok(stills
                .into_iter()
                .enumerate()
                .map(|(index, bytes)| {
                    Artifact::new(
                        format!("{}-{:06}.{}", name, index, format.extension()),
                        format.mime(),
                        bytes,
                    )
                })
                .collect()),
        }
    }

    fn buffered_frames(&self) -> usize {
        self.frames
    }
}

/// An animated GIF being written frame by frame.
///
/// A frame's delay is only known once the next kept frame arrives, so the
/// latest frame waits in `pending` together with its start time.
struct GifStream {
    encoder: GifEncoder<SharedBuffer>,
    bytes: Rc<RefCell<Vec<u8>>>,
    pending: Option<(Frame, u32)>,
}

impl GifStream {
    fn new() -> Result<Self, CaptureError> {
        let bytes = Rc::new(RefCell::new(Vec::new()));
        let mut encoder = GifEncoder::new_with_speed(SharedBuffer(Rc::clone(&bytes)), GIF_SPEED);
        encoder.set_repeat(Repeat::Infinite).map_err(gif_error)?;

        Ok(Self {
            encoder,
            bytes,
            pending: None,
        })
    }

    fn push(&mut self, frame: Frame, start_cs: u32) -> Result<(), CaptureError> {
        let too_soon = self
            .pending
            .as_ref()
            .is_some_and(|(_, pending_start)| start_cs < pending_start + MIN_FRAME_DELAY_CS);
        if too_soon {
            return Ok(());
        }

        if let Some((previous, previous_start)) = self.pending.replace((frame, start_cs)) {
            self.write(previous, start_cs - previous_start)?;
        }

        Ok(())
    }

    /// Write the last frame so that the animation ends at `end_cs`, then
    /// return the finished file.
    fn finish(mut self, end_cs: u32) -> Result<Vec<u8>, CaptureError> {
        if let Some((last, last_start)) = self.pending.take() {
            let delay = end_cs.saturating_sub(last_start).max(MIN_FRAME_DELAY_CS);
            self.write(last, delay)?;
        }

        // Dropping the encoder writes the GIF trailer.
        let GifStream { encoder, bytes, .. } = self;
        drop(encoder);

        Ok(bytes.take())
    }

    fn write(&mut self, frame: Frame, delay_cs: u32) -> Result<(), CaptureError> {
        let delay = Delay::from_numer_denom_ms(delay_cs * 10, 1);
        self.encoder
            .encode_frame(image::Frame::from_parts(frame, 0, 0, delay))
            .map_err(gif_error)
    }
}

fn gif_error(source: image::ImageError) -> CaptureError {
    CaptureError::Encode {
        format: "gif",
        source,
    }
}

// Lets the GIF encoder own its writer while the bytes stay reachable.
struct SharedBuffer(Rc<RefCell<Vec<u8>>>);

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.borrow_mut().write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// When frame `index` starts, in centiseconds, rounded to the nearest one.
fn frame_start_cs(index: usize, frame_rate: u32) -> u32 {
    let frame_rate = u64::from(frame_rate.max(1));
    ((index as u64 * 200 + frame_rate) / (2 * frame_rate)) as u32
}

pub(crate) fn encode_jpeg(frame: &Frame, quality: u8) -> Result<Vec<u8>, CaptureError> {
    // JPEG has no alpha channel.
    let rgb = image::DynamicImage::ImageRgba8(frame.clone()).to_rgb8();

    let mut bytes = Vec::new();
    JpegEncoder::new_with_quality(&mut bytes, quality)
        .encode_image(&rgb)
        .map_err(|source| CaptureError::Encode {
            format: "jpeg",
            source,
        })?;

    Ok(bytes)
}

pub(crate) fn encode_png(frame: &Frame) -> Result<Vec<u8>, CaptureError> {
    let mut bytes = Vec::new();
    frame
        .write_with_encoder(PngEncoder::new(&mut bytes))
        .map_err(|source| CaptureError::Encode {
            format: "png",
            source,
        })?;

    Ok(bytes)
}

#[cfg(test)]
mod test {
    use super::*;
    use image::AnimationDecoder;
    use std::num::NonZeroU32;

    fn config(format: VideoFormat, frame_rate: u32) -> CaptureConfig {
        CaptureConfig {
            format,
            frame_rate: NonZeroU32::new(frame_rate).unwrap(),
            verbose: false,
            ..Default::default()
        }
    }

    fn solid(width: u32, height: u32, value: u8) -> Frame {
        RgbaImage::from_pixel(width, height, image::Rgba([value, value / 2, 0, 255]))
    }

    // Frame delays of an encoded GIF, in milliseconds.
    fn gif_delays(bytes: &[u8]) -> Vec<u32> {
        let decoder = image::codecs::gif::GifDecoder::new(std::io::Cursor::new(bytes)).unwrap();
        decoder
            .into_frames()
            .collect_frames()
            .unwrap()
            .iter()
            .map(|frame| {
                let (numer, denom) = frame.delay().numer_denom_ms();
                numer / denom
            })
            .collect()
    }

    #[test]
    fn test_gif_export() {
        let mut encoder = StreamingEncoder::new(&config(VideoFormat::Gif, 30));
        encoder.begin();
        encoder.add_frame(solid(8, 8, 10));
        encoder.add_frame(solid(8, 8, 200));
        assert_eq!(encoder.buffered_frames(), 2);

        let artifacts = encoder.finish("pattern_").unwrap();

        assert_eq!(artifacts.len(), 1);
        assert_eq!(artifacts[0].file_name, "pattern_.gif");
        assert_eq!(artifacts[0].mime, "image/gif");
        assert_eq!(&artifacts[0].bytes[..6], b"GIF89a");
        assert_eq!(encoder.buffered_frames(), 0);
    }

    #[test]
    fn test_gif_export_with_resized_frames() {
        let mut encoder = StreamingEncoder::new(&config(VideoFormat::Gif, 30));
        encoder.begin();
        encoder.add_frame(solid(8, 8, 10));
        encoder.add_frame(solid(16, 4, 90));

        let artifacts = encoder.finish("resized").unwrap();

        let decoder =
            image::codecs::gif::GifDecoder::new(std::io::Cursor::new(&artifacts[0].bytes))
                .unwrap();
        let frames = decoder.into_frames().collect_frames().unwrap();
        assert_eq!(frames.len(), 2);
        assert!(frames.iter().all(|frame| frame.buffer().dimensions() == (8, 8)));
    }

    #[test]
    fn test_gif_timing_matches_frame_rate() {
        let mut encoder = StreamingEncoder::new(&config(VideoFormat::Gif, 10));
        encoder.begin();
        for value in [0, 100, 200] {
            encoder.add_frame(solid(4, 4, value));
        }

        let artifacts = encoder.finish("slow").unwrap();

        assert_eq!(gif_delays(&artifacts[0].bytes), vec![100, 100, 100]);
    }

    #[test]
    fn test_fast_gif_plays_back_in_real_time() {
        // One second at the default 60 fps.
        let mut encoder = StreamingEncoder::new(&config(VideoFormat::Gif, 60));
        encoder.begin();
        for value in 0..60u8 {
            encoder.add_frame(solid(4, 4, value * 4));
        }

        let artifacts = encoder.finish("fast").unwrap();
        let delays = gif_delays(&artifacts[0].bytes);

        assert_eq!(delays.iter().sum::<u32>(), 1000);
        assert!(delays.iter().all(|&delay| delay >= 10 * MIN_FRAME_DELAY_CS));
        // Two out of every three frames fit on the centisecond grid.
        assert_eq!(delays.len(), 40);
    }

    #[test]
    fn test_frame_start_rounds_to_centiseconds() {
        let starts: Vec<u32> = (0..7).map(|index| frame_start_cs(index, 60)).collect();
        assert_eq!(starts, vec![0, 2, 3, 5, 7, 8, 10]);

        assert_eq!(frame_start_cs(3, 25), 12);
        assert_eq!(frame_start_cs(30, 30), 100);
    }

    #[test]
    fn test_png_sequence_in_frame_order() {
        let mut encoder = StreamingEncoder::new(&config(VideoFormat::Png, 30));
        encoder.begin();
        for value in [0, 100, 200] {
            encoder.add_frame(solid(4, 4, value));
        }

        let artifacts = encoder.finish("seq").unwrap();

        let names: Vec<_> = artifacts.iter().map(|a| a.file_name.as_str()).collect();
        assert_eq!(names, ["seq-000000.png", "seq-000001.png", "seq-000002.png"]);

        for (artifact, value) in artifacts.iter().zip([0u8, 100, 200]) {
            let decoded = image::load_from_memory(&artifact.bytes).unwrap().to_rgba8();
            assert_eq!(decoded.get_pixel(0, 0).0[0], value);
        }
    }

    #[test]
    fn test_jpeg_sequence() {
        let mut encoder = StreamingEncoder::new(&config(VideoFormat::Jpeg, 30));
        encoder.begin();
        encoder.add_frame(solid(4, 4, 50));

        let artifacts = encoder.finish("seq").unwrap();

        assert_eq!(artifacts[0].file_name, "seq-000000.jpg");
        assert_eq!(&artifacts[0].bytes[..2], &[0xFF, 0xD8]);
    }

    #[test]
    fn test_failed_frame_is_reported_by_finish() {
        let mut encoder = StreamingEncoder::new(&config(VideoFormat::Jpeg, 30));
        encoder.begin();
        // Wider than the largest dimension JPEG can store.
        encoder.add_frame(Frame::new(70_000, 1));
        encoder.add_frame(Frame::new(70_000, 1));

        assert!(matches!(
            encoder.finish("wide"),
            Err(CaptureError::Encode { format: "jpeg", .. })
        ));
        assert!(matches!(encoder.finish("wide"), Err(CaptureError::NoFrames)));
    }

    #[test]
    fn test_finish_without_frames() {
        let mut encoder = StreamingEncoder::new(&config(VideoFormat::Gif, 30));
        encoder.begin();

        assert!(matches!(encoder.finish("empty"), Err(CaptureError::NoFrames)));
    }

    #[test]
    fn test_begin_discards_leftovers() {
        let mut encoder = StreamingEncoder::new(&config(VideoFormat::Png, 30));
        encoder.begin();
        encoder.add_frame(solid(2, 2, 1));
        encoder.begin();

        assert_eq!(encoder.buffered_frames(), 0);
        assert!(matches!(encoder.finish("empty"), Err(CaptureError::NoFrames)));
    }
}
