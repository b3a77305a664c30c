mod input;

use input::{Command, Key, PanelInput};
use smoke::capture::{CaptureSession, ControlPanel, DiskSink, StreamingEncoder};
use smoke::render::FrameReader;
use smoke::{Settings, Smoke};

use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use winit::application::ApplicationHandler;
use winit::dpi::{LogicalSize, PhysicalPosition, PhysicalSize};
use winit::event::{ElementState, KeyEvent, MouseButton, MouseScrollDelta, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::{Key as LogicalKey, NamedKey};
use winit::window::{Window, WindowId};

type Panel = ControlPanel<StreamingEncoder, DiskSink>;

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let mut args = std::env::args().skip(1);
    let settings = match args.next() {
        Some(path) => {
            log::info!("📄 Loading settings from {}", path);
            let json = std::fs::read_to_string(&path)?;
            serde_json::from_str(&json)?
        }
        None => Settings::default(),
    };
    let output_dir = args.next().map_or_else(|| PathBuf::from("."), PathBuf::from);

    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = App {
        settings: Arc::new(settings),
        output_dir,
        start: Instant::now(),
        input: PanelInput::default(),
        state: None,
        failure: None,
    };
    event_loop.run_app(&mut app)?;

    match app.failure {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

struct App {
    settings: Arc<Settings>,
    output_dir: PathBuf,
    start: Instant,
    input: PanelInput,
    state: Option<State>,
    failure: Option<Box<dyn Error>>,
}

struct State {
    window: Arc<Window>,
    surface: wgpu::Surface<'static>,
    config: wgpu::SurfaceConfiguration,
    device: wgpu::Device,
    queue: wgpu::Queue,

    smoke: Smoke,
    reader: FrameReader,
    panel: Panel,

    cursor: PhysicalPosition<f64>,
}

impl State {
    async fn new(
        window: Arc<Window>,
        settings: &Arc<Settings>,
        output_dir: PathBuf,
    ) -> Result<Self, Box<dyn Error>> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor::default());
        let surface = instance.create_surface(Arc::clone(&window))?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                force_fallback_adapter: false,
                compatible_surface: Some(&surface),
            })
            .await?;
        log::info!("🖥 Using adapter: {:?}", adapter.get_info().name);

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("smoke:device"),
                required_features: wgpu::Features::empty(),
                // Support textures the size of the swapchain.
                required_limits: wgpu::Limits::default().using_resolution(adapter.limits()),
                memory_hints: wgpu::MemoryHints::default(),
                trace: wgpu::Trace::Off,
                experimental_features: wgpu::ExperimentalFeatures::disabled(),
            })
            .await?;

        let capabilities = surface.get_capabilities(&adapter);
        let format = capabilities
            .formats
            .iter()
            .copied()
            .find(|format| format.is_srgb())
            .or_else(|| capabilities.formats.first().copied())
            .ok_or("the surface doesn't support any texture formats")?;

        let physical_size = window.inner_size();
        let logical_size: LogicalSize<u32> = physical_size.to_logical(window.scale_factor());

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: physical_size.width.max(1),
            height: physical_size.height.max(1),
            present_mode: wgpu::PresentMode::AutoVsync,
            alpha_mode: capabilities
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        let smoke = Smoke::new(
            &device,
            &queue,
            format,
            logical_size.width,
            logical_size.height,
            config.width,
            config.height,
            settings,
        )?;
        let reader = FrameReader::new(&device, format, config.width, config.height);

        let capture = &settings.capture;
        let sink = DiskSink::new(output_dir);
        let session = CaptureSession::new(
            capture.clone(),
            StreamingEncoder::new(capture),
            sink.clone(),
        );
        let panel = ControlPanel::new(session, sink);

        Ok(Self {
            window,
            surface,
            config,
            device,
            queue,
            smoke,
            reader,
            panel,
            cursor: PhysicalPosition::default(),
        })
    }

    fn resize(&mut self, physical_size: PhysicalSize<u32>) {
        if physical_size.width == 0 || physical_size.height == 0 {
            return;
        }

        self.config.width = physical_size.width;
        self.config.height = physical_size.height;
        self.surface.configure(&self.device, &self.config);

        let logical_size: LogicalSize<u32> = physical_size.to_logical(self.window.scale_factor());
        self.smoke.resize(
            logical_size.width,
            logical_size.height,
            physical_size.width,
            physical_size.height,
        );
        self.reader
            .resize(&self.device, physical_size.width, physical_size.height);
    }

    fn redraw(&mut self, timestamp: f64) {
        let frame = match self.surface.get_current_texture() {
            Ok(frame) => frame,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                self.surface.configure(&self.device, &self.config);
                return;
            }
            Err(err) => {
                log::warn!("Skipping frame: {}", err);
                return;
            }
        };

        let view = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("smoke:frame"),
            });

        self.smoke
            .animate(&self.queue, &mut encoder, &view, timestamp);

        self.queue.submit(Some(encoder.finish()));
        self.window.pre_present_notify();
        frame.present();

        let Self {
            device,
            queue,
            smoke,
            reader,
            panel,
            ..
        } = self;
        panel.on_frame(|| reader.read(device, queue, smoke));
    }

    fn update_title(&self, input: &PanelInput) {
        self.window
            .set_title(&input.title(self.panel.name(), self.panel.is_capturing()));
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.state.is_some() {
            return;
        }

        let attributes = Window::default_attributes()
            .with_title("Smoke")
            .with_inner_size(LogicalSize::new(1280, 800))
            .with_resizable(true);

        let window = match event_loop.create_window(attributes) {
            Ok(window) => Arc::new(window),
            Err(err) => {
                self.failure = Some(err.into());
                event_loop.exit();
                return;
            }
        };

        match pollster::block_on(State::new(
            window,
            &self.settings,
            self.output_dir.clone(),
        )) {
            Ok(state) => {
                state.update_title(&self.input);
                self.state = Some(state);
            }
            Err(err) => {
                log::error!("Failed to initialise: {}", err);
                self.failure = Some(err);
                event_loop.exit();
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _: WindowId, event: WindowEvent) {
        let Some(state) = self.state.as_mut() else {
            return;
        };

        match event {
            WindowEvent::CloseRequested => event_loop.exit(),

            WindowEvent::Resized(physical_size) => {
                state.resize(physical_size);
                state.window.request_redraw();
            }

            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        logical_key,
                        state: ElementState::Pressed,
                        ..
                    },
                ..
            } => {
                let key = match &logical_key {
                    LogicalKey::Named(NamedKey::Backspace) => Key::Backspace,
                    LogicalKey::Named(NamedKey::Enter) => Key::Enter,
                    LogicalKey::Named(NamedKey::Escape) => Key::Escape,
                    LogicalKey::Named(NamedKey::Space) => Key::Text(" "),
                    LogicalKey::Character(text) => Key::Text(text.as_str()),
                    _ => Key::Other,
                };

                match self.input.handle(key, state.panel.name()) {
                    Some(Command::Panel(action)) => state.panel.dispatch(action),
                    Some(Command::Quit) => {
                        // Don't lose a running capture on the way out.
                        if let Err(err) = state.panel.stop_capture() {
                            log::error!("{}", err);
                        }
                        event_loop.exit();
                    }
                    None => (),
                }

                state.update_title(&self.input);
            }

            WindowEvent::CursorMoved { position, .. } => {
                state.cursor = position;
                state.smoke.controls_mut().pointer_move(
                    position.x as f32,
                    position.y as f32,
                    state.config.height as f32,
                );
            }

            WindowEvent::MouseInput {
                state: button_state,
                button: MouseButton::Left,
                ..
            } => match button_state {
                ElementState::Pressed => {
                    let (x, y) = (state.cursor.x as f32, state.cursor.y as f32);
                    state.smoke.controls_mut().pointer_down(x, y);
                }
                ElementState::Released => state.smoke.controls_mut().pointer_up(),
            },

            WindowEvent::MouseWheel { delta, .. } => {
                let steps = match delta {
                    MouseScrollDelta::LineDelta(_, y) => y,
                    MouseScrollDelta::PixelDelta(position) => position.y as f32 / 100.0,
                };
                state.smoke.controls_mut().zoom(steps);
            }

            WindowEvent::RedrawRequested => {
                let timestamp = self.start.elapsed().as_secs_f64() * 1000.0;
                state.redraw(timestamp);
            }

            _ => (),
        }
    }

    fn about_to_wait(&mut self, _: &ActiveEventLoop) {
        if let Some(state) = &self.state {
            state.window.request_redraw();
        }
    }
}
