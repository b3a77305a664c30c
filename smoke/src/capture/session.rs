use super::{
    ArtifactSink, CaptureConfig, CaptureError, Clock, Frame, FrameEncoder, SystemClock, Timestamp,
};

/// Start/accumulate/stop workflow around a single, long-lived encoder.
///
/// The session is driven from two directions: user actions call
/// [`start`](Self::start), [`stop`](Self::stop) and
/// [`set_output_name`](Self::set_output_name), while the render loop hands
/// over each drawn frame through [`ingest_frame`](Self::ingest_frame). The
/// render loop is expected to check [`is_active`](Self::is_active) first so
/// that it only reads frames back from the GPU when they are wanted.
///
/// `start` while active and `stop` while idle are silent no-ops, which makes
/// repeated clicks on the same button harmless.
pub struct CaptureSession<E, S, C = SystemClock> {
    config: CaptureConfig,
    encoder: E,
    sink: S,
    clock: C,

    output_name: String,
    started_at: Option<Timestamp>,
    frames_captured: usize,
}

/// The result of a call to [`CaptureSession::stop`].
#[derive(Debug, Clone, PartialEq)]
pub enum StopOutcome {
    /// No capture was running.
    Idle,
    Exported(Export),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Export {
    pub name: String,
    pub frames: usize,
    pub files: Vec<String>,
    pub duration_ms: f64,
}

impl<E, S> CaptureSession<E, S, SystemClock>
where
    E: FrameEncoder,
    S: ArtifactSink,
{
    pub fn new(config: CaptureConfig, encoder: E, sink: S) -> Self {
        Self::with_clock(config, encoder, sink, SystemClock)
    }
}

impl<E, S, C> CaptureSession<E, S, C>
where
    E: FrameEncoder,
    S: ArtifactSink,
    C: Clock,
{
    pub fn with_clock(config: CaptureConfig, encoder: E, sink: S, clock: C) -> Self {
        let output_name = config.name.clone();

        Self {
            config,
            encoder,
            sink,
            clock,
            output_name,
            started_at: None,
            frames_captured: 0,
        }
    }

    pub fn is_active(&self) -> bool {
        self.started_at.is_some()
    }

    pub fn started_at(&self) -> Option<Timestamp> {
        self.started_at
    }

    pub fn frames_captured(&self) -> usize {
        self.frames_captured
    }

    pub fn output_name(&self) -> &str {
        &self.output_name
    }

    pub fn config(&self) -> &CaptureConfig {
        &self.config
    }

    /// Only the name current at the time of [`stop`](Self::stop) is used.
    pub fn set_output_name(&mut self, name: impl Into<String>) {
        self.output_name = name.into();
    }

    pub fn start(&mut self) {
        if self.is_active() {
            return;
        }

        self.encoder.begin();
        self.frames_captured = 0;
        self.started_at = Some(self.clock.now());

        if self.config.verbose {
            log::info!(
                "🔴 Capture started ({} at {} fps)",
                self.config.format,
                self.config.frame_rate
            );
        }
    }

    /// Forward a freshly drawn frame to the encoder. Must be called at most
    /// once per rendered frame, in render order. Ignored while idle.
    pub fn ingest_frame(&mut self, frame: Frame) {
        if !self.is_active() {
            return;
        }

        self.encoder.add_frame(frame);
        self.frames_captured += 1;
    }

    /// Finish the capture and export it under the current output name.
    ///
    /// The session is idle once this returns, whether or not the export
    /// succeeded. Frames buffered for a failed export are discarded.
    pub fn stop(&mut self) -> Result<StopOutcome, CaptureError> {
        let Some(started_at) = self.started_at.take() else {
            return Ok(StopOutcome::Idle);
        };

        let frames = std::mem::take(&mut self.frames_captured);
        let duration_ms = (self.clock.now() - started_at).max(0.0);
        let name = self.output_name.clone();

        if self.config.verbose {
            log::info!(
                "⏹ Capture stopped after {} frames ({:.1}s)",
                frames,
                duration_ms / 1000.0
            );
        }

        let artifacts = self.encoder.finish(&name)?;

        let mut files = Vec::with_capacity(artifacts.len());
        for artifact in &artifacts {
            self.sink.save(artifact)?;
            files.push(artifact.file_name.clone());
        }

        Ok(StopOutcome::Exported(Export {
            name,
            frames,
            files,
            duration_ms,
        }))
    }
}

#[cfg(test)]
pub(crate) mod test {
    use super::*;
    use crate::capture::{Artifact, StreamingEncoder};
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    #[derive(Debug, Clone, PartialEq)]
    pub enum Call {
        Begin,
        Frame(u8),
        Finish(String),
    }

    /// Records every call and exports a single artifact per capture.
    #[derive(Clone, Default)]
    pub struct RecordingEncoder {
        pub calls: Rc<RefCell<Vec<Call>>>,
        pub fail: bool,
        buffered: usize,
    }

    impl FrameEncoder for RecordingEncoder {
        fn begin(&mut self) {
            self.buffered = 0;
            self.calls.borrow_mut().push(Call::Begin);
        }

        fn add_frame(&mut self, frame: Frame) {
            self.buffered += 1;
            self.calls
                .borrow_mut()
                .push(Call::Frame(frame.get_pixel(0, 0).0[0]));
        }

        fn finish(&mut self, name: &str) -> Result<Vec<crate::capture::Artifact>, CaptureError> {
            self.buffered = 0;
            self.calls.borrow_mut().push(Call::Finish(name.to_string()));

            if self.fail {
                return Err(CaptureError::NoFrames);
            }

            Ok(vec![Artifact::new(format!("{}.gif", name), "image/gif", vec![])])
        }

        fn buffered_frames(&self) -> usize {
            self.buffered
        }
    }

    #[derive(Clone, Default)]
    pub struct RecordingSink {
        pub saved: Rc<RefCell<Vec<Artifact>>>,
        pub fail: bool,
    }

    impl ArtifactSink for RecordingSink {
        fn save(&mut self, artifact: &Artifact) -> Result<(), CaptureError> {
            if self.fail {
                return Err(CaptureError::Export {
                    file_name: artifact.file_name.clone(),
                    reason: "download denied".to_string(),
                });
            }

            self.saved.borrow_mut().push(artifact.clone());
            Ok(())
        }
    }

    /// Advances by one second on every read.
    #[derive(Default)]
    pub struct TickingClock(Cell<f64>);

    impl Clock for TickingClock {
        fn now(&self) -> Timestamp {
            let now = self.0.get() + 1000.0;
            self.0.set(now);
            now
        }
    }

    pub fn frame(id: u8) -> Frame {
        Frame::from_pixel(1, 1, image::Rgba([id, 0, 0, 255]))
    }

    type TestSession = CaptureSession<RecordingEncoder, RecordingSink, TickingClock>;

    fn session() -> (TestSession, RecordingEncoder, RecordingSink) {
        let encoder = RecordingEncoder::default();
        let sink = RecordingSink::default();
        let session = CaptureSession::with_clock(
            CaptureConfig::default(),
            encoder.clone(),
            sink.clone(),
            TickingClock::default(),
        );

        (session, encoder, sink)
    }

    #[test]
    fn test_start_stop_sequences() {
        // Every sequence of up to 8 start (1) / stop (0) calls.
        for length in 0..=8u32 {
            for pattern in 0..(1u32 << length) {
                let (mut session, _, _) = session();
                let mut expected = false;

                for step in 0..length {
                    if pattern & (1 << step) != 0 {
                        session.start();
                        expected = true;
                    } else {
                        let _ = session.stop();
                        expected = false;
                    }
                }

                assert_eq!(session.is_active(), expected, "pattern {:b}", pattern);
                assert_eq!(session.is_active(), session.started_at().is_some());
            }
        }
    }

    #[test]
    fn test_frames_reach_encoder_in_order() {
        let (mut session, encoder, _) = session();

        session.start();
        for id in 1..=5 {
            session.ingest_frame(frame(id));
        }
        assert_eq!(session.frames_captured(), 5);
        let outcome = session.stop().unwrap();

        assert_eq!(
            *encoder.calls.borrow(),
            vec![
                Call::Begin,
                Call::Frame(1),
                Call::Frame(2),
                Call::Frame(3),
                Call::Frame(4),
                Call::Frame(5),
                Call::Finish("pattern_".to_string()),
            ]
        );
        assert!(matches!(outcome, StopOutcome::Exported(Export { frames: 5, .. })));
    }

    #[test]
    fn test_stop_before_start() {
        let (mut session, encoder, sink) = session();

        assert_eq!(session.stop().unwrap(), StopOutcome::Idle);
        assert!(!session.is_active());
        assert!(encoder.calls.borrow().is_empty());
        assert!(sink.saved.borrow().is_empty());
    }

    #[test]
    fn test_double_start_keeps_start_time() {
        let (mut session, encoder, _) = session();

        session.start();
        let started_at = session.started_at();
        session.ingest_frame(frame(1));
        session.start();

        assert_eq!(session.started_at(), started_at);
        assert_eq!(session.frames_captured(), 1);
        assert_eq!(*encoder.calls.borrow(), vec![Call::Begin, Call::Frame(1)]);
    }

    #[test]
    fn test_double_stop_exports_once() {
        let (mut session, encoder, sink) = session();

        session.start();
        session.ingest_frame(frame(1));
        session.stop().unwrap();
        assert_eq!(session.stop().unwrap(), StopOutcome::Idle);

        let finishes = encoder
            .calls
            .borrow()
            .iter()
            .filter(|call| matches!(call, Call::Finish(_)))
            .count();
        assert_eq!(finishes, 1);
        assert_eq!(sink.saved.borrow().len(), 1);
    }

    #[test]
    fn test_ingest_while_idle_is_ignored() {
        let (mut session, encoder, _) = session();

        session.ingest_frame(frame(1));
        session.start();
        session.stop().unwrap();
        session.ingest_frame(frame(2));

        assert_eq!(
            *encoder.calls.borrow(),
            vec![Call::Begin, Call::Finish("pattern_".to_string())]
        );
    }

    #[test]
    fn test_output_name_is_read_at_stop() {
        let (mut session, _, sink) = session();

        session.start();
        session.set_output_name("early");
        session.ingest_frame(frame(1));
        session.set_output_name("foo");
        let outcome = session.stop().unwrap();
        session.set_output_name("bar");

        let StopOutcome::Exported(export) = outcome else {
            panic!("expected an export");
        };
        assert_eq!(export.name, "foo");
        assert_eq!(export.files, vec!["foo.gif".to_string()]);
        assert_eq!(sink.saved.borrow()[0].file_name, "foo.gif");
        assert_eq!(session.output_name(), "bar");
    }

    #[test]
    fn test_two_frame_capture() {
        let (mut session, encoder, sink) = session();

        session.start();
        session.ingest_frame(frame(1));
        session.ingest_frame(frame(2));
        let outcome = session.stop().unwrap();

        assert_eq!(
            *encoder.calls.borrow(),
            vec![
                Call::Begin,
                Call::Frame(1),
                Call::Frame(2),
                Call::Finish("pattern_".to_string()),
            ]
        );
        assert_eq!(sink.saved.borrow().len(), 1);
        assert_eq!(
            outcome,
            StopOutcome::Exported(Export {
                name: "pattern_".to_string(),
                frames: 2,
                files: vec!["pattern_.gif".to_string()],
                duration_ms: 1000.0,
            })
        );
    }

    #[test]
    fn test_failed_finalize_leaves_session_idle() {
        let encoder = RecordingEncoder {
            fail: true,
            ..Default::default()
        };
        let sink = RecordingSink::default();
        let mut session = CaptureSession::with_clock(
            CaptureConfig::default(),
            encoder,
            sink.clone(),
            TickingClock::default(),
        );

        session.start();
        session.ingest_frame(frame(1));

        assert!(session.stop().is_err());
        assert!(!session.is_active());
        assert_eq!(session.frames_captured(), 0);
        assert!(sink.saved.borrow().is_empty());

        // A fresh capture works as usual afterwards.
        session.start();
        assert!(session.is_active());
    }

    #[test]
    fn test_stop_without_frames_saves_nothing() {
        let config = CaptureConfig::default();
        let sink = RecordingSink::default();
        let mut session = CaptureSession::with_clock(
            config.clone(),
            StreamingEncoder::new(&config),
            sink.clone(),
            TickingClock::default(),
        );

        session.start();
        assert!(matches!(session.stop(), Err(CaptureError::NoFrames)));
        assert!(!session.is_active());
        assert!(sink.saved.borrow().is_empty());

        // The next capture exports normally.
        session.start();
        session.ingest_frame(frame(1));
        session.ingest_frame(frame(2));
        let StopOutcome::Exported(export) = session.stop().unwrap() else {
            panic!("expected an export");
        };
        assert_eq!(export.frames, 2);
        assert_eq!(export.files, vec!["pattern_.gif".to_string()]);
        assert_eq!(sink.saved.borrow().len(), 1);
    }

    #[test]
    fn test_failed_save_is_reported() {
        let sink = RecordingSink {
            fail: true,
            ..Default::default()
        };
        let mut session = CaptureSession::with_clock(
            CaptureConfig::default(),
            RecordingEncoder::default(),
            sink,
            TickingClock::default(),
        );

        session.start();
        session.ingest_frame(frame(1));

        assert!(matches!(session.stop(), Err(CaptureError::Export { .. })));
        assert!(!session.is_active());
    }
}
