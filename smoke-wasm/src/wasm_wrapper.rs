mod canvas;
mod download;

use canvas::{physical_from_logical_size, CanvasGrabber};
use download::{BrowserClock, BrowserDownload};

use smoke::capture::{
    CaptureError, CaptureSession, ControlPanel, PanelAction, StopOutcome, StreamingEncoder,
};
use smoke::settings::Settings;

use gloo_utils::format::JsValueSerdeExt;
use std::sync::Arc;
use wasm_bindgen::prelude::*;
use wasm_bindgen::{JsCast, JsValue};

type Panel = ControlPanel<StreamingEncoder, BrowserDownload, BrowserClock>;

#[wasm_bindgen]
pub struct Smoke {
    canvas: web_sys::HtmlCanvasElement,
    device: wgpu::Device,
    queue: wgpu::Queue,
    surface: wgpu::Surface<'static>,
    config: wgpu::SurfaceConfiguration,
    logical_width: u32,
    logical_height: u32,
    pixel_ratio: f64,

    instance: smoke::Smoke,
    grabber: CanvasGrabber,
    panel: Panel,
}

#[wasm_bindgen]
impl Smoke {
    #[wasm_bindgen(constructor)]
    pub async fn new(element_id: &str, settings_object: &JsValue) -> Result<Smoke, JsValue> {
        if let Err(err) = console_log::init_with_level(log::Level::Info) {
            web_sys::console::warn_1(&JsValue::from_str(&err.to_string()));
        }
        set_panic_hook();

        let settings: Arc<Settings> = settings_object
            .into_serde()
            .map(Arc::new)
            .map_err(|err| JsValue::from_str(&err.to_string()))?;

        let window = web_sys::window().ok_or("no global `window` exists")?;
        let document = window.document().ok_or("no document on window")?;
        let canvas = document
            .get_element_by_id(element_id)
            .ok_or_else(|| format!("no canvas element with id `{}`", element_id))?
            .dyn_into::<web_sys::HtmlCanvasElement>()?;

        let pixel_ratio = window.device_pixel_ratio();
        let logical_width = canvas.client_width().max(1) as u32;
        let logical_height = canvas.client_height().max(1) as u32;
        let (physical_width, physical_height) = physical_from_logical_size(
            logical_width,
            logical_height,
            pixel_ratio,
            settings.max_pixel_ratio,
        );
        canvas.set_width(physical_width);
        canvas.set_height(physical_height);

        let instance = wgpu::util::new_instance_with_webgpu_detection(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::BROWSER_WEBGPU | wgpu::Backends::GL,
            ..Default::default()
        })
        .await;
        let surface = instance
            .create_surface(wgpu::SurfaceTarget::Canvas(canvas.clone()))
            .map_err(to_js)?;
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                force_fallback_adapter: false,
                compatible_surface: Some(&surface),
            })
            .await
            .map_err(to_js)?;

        log::debug!("{:?}", adapter.get_info());

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("smoke:device"),
                required_features: wgpu::Features::empty(),
                // Support textures the size of the swapchain.
                required_limits: wgpu::Limits::downlevel_webgl2_defaults()
                    .using_resolution(adapter.limits()),
                memory_hints: wgpu::MemoryHints::default(),
                trace: wgpu::Trace::Off,
                experimental_features: wgpu::ExperimentalFeatures::disabled(),
            })
            .await
            .map_err(to_js)?;

        let capabilities = surface.get_capabilities(&adapter);
        let format = capabilities
            .formats
            .first()
            .copied()
            .ok_or("the canvas doesn't support any texture formats")?;
        log::debug!("Swapchain format: {:?}", format);

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: physical_width.max(1),
            height: physical_height.max(1),
            present_mode: wgpu::PresentMode::AutoVsync,
            desired_maximum_frame_latency: 2,
            alpha_mode: capabilities
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
        };
        surface.configure(&device, &config);

        let instance = smoke::Smoke::new(
            &device,
            &queue,
            format,
            logical_width,
            logical_height,
            config.width,
            config.height,
            &settings,
        )
        .map_err(to_js)?;

        let download = BrowserDownload::detect(&document)?;
        let capture = &settings.capture;
        let session = CaptureSession::with_clock(
            capture.clone(),
            StreamingEncoder::new(capture),
            download,
            BrowserClock,
        );

        Ok(Self {
            canvas,
            device,
            queue,
            surface,
            config,
            logical_width,
            logical_height,
            pixel_ratio,
            instance,
            grabber: CanvasGrabber::new(&document)?,
            panel: ControlPanel::new(session, download),
        })
    }

    pub fn set_settings(&mut self, settings_object: &JsValue) -> Result<(), JsValue> {
        let settings: Settings = settings_object
            .into_serde()
            .map_err(|err| JsValue::from_str(&err.to_string()))?;

        self.instance
            .update(&self.device, &self.queue, &Arc::new(settings))
            .map_err(to_js)
    }

    /// Replace the generated noise with an encoded image (PNG or JPEG).
    pub fn load_noise_texture(&mut self, encoded_bytes: &[u8]) -> Result<(), JsValue> {
        self.instance
            .load_noise_texture(&self.device, &self.queue, encoded_bytes)
            .map_err(to_js)
    }

    /// Draw a frame. `timestamp` is the `requestAnimationFrame` time in
    /// milliseconds.
    pub fn animate(&mut self, timestamp: f64) {
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

        self.instance
            .animate(&self.queue, &mut encoder, &view, timestamp);

        self.queue.submit(Some(encoder.finish()));
        frame.present();

        let (grabber, canvas) = (&self.grabber, &self.canvas);
        self.panel.on_frame(|| grabber.grab(canvas));
    }

    pub fn resize(&mut self, logical_width: u32, logical_height: u32) {
        if logical_width == 0 || logical_height == 0 {
            return;
        }

        if (self.logical_width, self.logical_height) == (logical_width, logical_height) {
            return;
        }

        let (physical_width, physical_height) = physical_from_logical_size(
            logical_width,
            logical_height,
            self.pixel_ratio,
            self.instance.settings().max_pixel_ratio,
        );

        self.canvas.set_width(physical_width);
        self.canvas.set_height(physical_height);
        self.config.width = physical_width.max(1);
        self.config.height = physical_height.max(1);
        self.surface.configure(&self.device, &self.config);

        self.instance.resize(
            logical_width,
            logical_height,
            physical_width,
            physical_height,
        );

        self.logical_width = logical_width;
        self.logical_height = logical_height;
    }

    pub fn start_capture(&mut self) {
        self.panel.dispatch(PanelAction::StartCapture);
    }

    /// Stop the capture and download the result. Returns the number of
    /// frames saved.
    pub fn stop_capture(&mut self) -> Result<u32, JsValue> {
        match self.panel.stop_capture() {
            Ok(StopOutcome::Exported(export)) => Ok(export.frames as u32),
            Ok(StopOutcome::Idle) => Ok(0),
            Err(err) => {
                log::error!("{}", err);
                Err(capture_error(err))
            }
        }
    }

    /// Save the next frame as a still image.
    pub fn save_as_image(&mut self) {
        self.panel.dispatch(PanelAction::SaveAsImage);
    }

    pub fn set_name(&mut self, name: String) {
        self.panel.dispatch(PanelAction::SetName(name));
    }

    pub fn name(&self) -> String {
        self.panel.name().to_string()
    }

    pub fn is_capturing(&self) -> bool {
        self.panel.is_capturing()
    }

    // Pointer positions are in CSS pixels, relative to the canvas.

    pub fn pointer_down(&mut self, x: f32, y: f32) {
        self.instance.controls_mut().pointer_down(x, y);
    }

    pub fn pointer_move(&mut self, x: f32, y: f32) {
        let height = self.logical_height as f32;
        self.instance.controls_mut().pointer_move(x, y, height);
    }

    pub fn pointer_up(&mut self) {
        self.instance.controls_mut().pointer_up();
    }

    /// `delta_y` as reported by a `wheel` event.
    pub fn zoom(&mut self, delta_y: f32) {
        self.instance.controls_mut().zoom(-delta_y / 100.0);
    }
}

// https://github.com/rustwasm/console_error_panic_hook#readme
pub fn set_panic_hook() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
}

fn to_js(err: impl std::error::Error) -> JsValue {
    JsValue::from_str(&err.to_string())
}

fn capture_error(err: CaptureError) -> JsValue {
    js_sys::Error::new(&err.to_string()).into()
}
