use super::{
    snapshot, ArtifactSink, CaptureError, CaptureSession, Clock, Frame, FrameEncoder,
    StopOutcome, SystemClock,
};

/// What the debug panel can ask for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PanelAction {
    StartCapture,
    StopCapture,
    SaveAsImage,
    SetName(String),
}

/// Binds the panel actions to a capture session and the snapshot exporter.
///
/// Frames are only drawn once per tick, so a snapshot request is remembered
/// and served from the next frame handed to [`on_frame`](Self::on_frame).
pub struct ControlPanel<E, S, C = SystemClock> {
    session: CaptureSession<E, S, C>,
    snapshot_sink: S,
    snapshot_requested: bool,
}

impl<E, S, C> ControlPanel<E, S, C>
where
    E: FrameEncoder,
    S: ArtifactSink,
    C: Clock,
{
    pub fn new(session: CaptureSession<E, S, C>, snapshot_sink: S) -> Self {
        Self {
            session,
            snapshot_sink,
            snapshot_requested: false,
        }
    }

    pub fn session(&self) -> &CaptureSession<E, S, C> {
        &self.session
    }

    pub fn is_capturing(&self) -> bool {
        self.session.is_active()
    }

    pub fn name(&self) -> &str {
        self.session.output_name()
    }

    /// Run an action, logging failures instead of returning them.
    pub fn dispatch(&mut self, action: PanelAction) {
        match action {
            PanelAction::StartCapture => self.session.start(),
            PanelAction::StopCapture => {
                if let Err(err) = self.session.stop() {
                    log::error!("{}", err);
                }
            }
            PanelAction::SaveAsImage => self.snapshot_requested = true,
            PanelAction::SetName(name) => self.session.set_output_name(name),
        }
    }

    pub fn stop_capture(&mut self) -> Result<StopOutcome, CaptureError> {
        self.session.stop()
    }

    /// Whether the next drawn frame should be read back at all.
    pub fn wants_frame(&self) -> bool {
        self.session.is_active() || self.snapshot_requested
    }

    /// Called by the render loop right after a frame is drawn. `grab` reads
    /// the frame back and is only invoked when a capture is running or a
    /// snapshot is pending.
    pub fn on_frame<F>(&mut self, grab: F)
    where
        F: FnOnce() -> Result<Frame, CaptureError>,
    {
        if !self.wants_frame() {
            return;
        }

        let frame = match grab() {
            Ok(frame) => frame,
            Err(err) => {
                log::error!("{}", err);
                self.snapshot_requested = false;
                return;
            }
        };

        if std::mem::take(&mut self.snapshot_requested) {
            if let Err(err) = self.save_as_image(&frame) {
                log::error!("{}", err);
            }
        }

        if self.session.is_active() {
            self.session.ingest_frame(frame);
        }
    }

    /// Save `frame` as a still image named after the current output name,
    /// encoded as the capture configuration asks.
    pub fn save_as_image(&mut self, frame: &Frame) -> Result<String, CaptureError> {
        let config = self.session.config();
        snapshot::save_as_image(
            frame,
            self.session.output_name(),
            config.snapshot_encoding,
            config.quality,
            &mut self.snapshot_sink,
        )
    }
}
