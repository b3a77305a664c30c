use crate::camera::{Camera, OrbitControls};
use crate::render::{noise, smoke};
use crate::{rng, settings::Settings};

use std::sync::Arc;

// The time at which the animation timer will reset to zero.
const MAX_ELAPSED_TIME: f32 = 10_000.0;
const MAX_FRAME_TIME: f32 = 1.0 / 10.0;

// WebGL2 guarantees 2D textures up to this size.
const MAX_NOISE_SIZE: u32 = 2048;
const MAX_NOISE_OCTAVES: u32 = 8;

#[derive(Debug, thiserror::Error)]
pub enum Problem {
    #[error("Failed to decode noise texture: {0}")]
    DecodeNoiseTexture(#[from] image::ImageError),

    #[error("Invalid settings: {0}")]
    InvalidSettings(String),
}

pub struct Smoke {
    settings: Arc<Settings>,

    camera: Camera,
    controls: OrbitControls,
    smoke: smoke::Context,

    logical_size: (u32, u32),

    // A timestamp in milliseconds. Either host or video time.
    last_timestamp: Option<f64>,

    // The animation timer in seconds. Drives the shader.
    elapsed_time: f32,
}

impl Smoke {
    pub fn new(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        swapchain_format: wgpu::TextureFormat,
        logical_width: u32,
        logical_height: u32,
        physical_width: u32,
        physical_height: u32,
        settings: &Arc<Settings>,
    ) -> Result<Smoke, Problem> {
        log::info!("💨 Initialising Smoke");

        validate(settings)?;

        log::info!("📐 Logical size: {}x{}", logical_width, logical_height);
        log::info!("📏 Physical size: {}x{}", physical_width, physical_height);

        let camera = Camera::new(&settings.camera, logical_width, logical_height);
        let controls = OrbitControls::new(&settings.controls, &camera);

        let noise_image = generate_noise(settings);
        let uniforms = uniforms(settings, &camera, 0.0);
        let smoke = smoke::Context::new(
            device,
            queue,
            swapchain_format,
            &settings.plane,
            &noise_image,
            &uniforms,
        );

        Ok(Smoke {
            settings: Arc::clone(settings),
            camera,
            controls,
            smoke,
            logical_size: (logical_width, logical_height),
            last_timestamp: None,
            elapsed_time: 0.0,
        })
    }

    pub fn settings(&self) -> &Arc<Settings> {
        &self.settings
    }

    pub fn controls_mut(&mut self) -> &mut OrbitControls {
        &mut self.controls
    }

    pub fn update(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        settings: &Arc<Settings>,
    ) -> Result<(), Problem> {
        validate(settings)?;

        if settings.noise != self.settings.noise || settings.seed != self.settings.seed {
            self.smoke
                .update_noise(device, queue, &generate_noise(settings));
        }

        if settings.plane != self.settings.plane {
            self.smoke.update_plane(device, &settings.plane);
        }

        if settings.camera != self.settings.camera {
            self.camera = Camera::new(&settings.camera, self.logical_size.0, self.logical_size.1);
            self.controls = OrbitControls::new(&settings.controls, &self.camera);
        } else {
            self.controls.update_settings(&settings.controls);
        }

        self.settings = Arc::clone(settings);
        Ok(())
    }

    /// Replace the generated noise with an encoded image. Only its red
    /// channel is used.
    pub fn load_noise_texture(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        encoded_bytes: &[u8],
    ) -> Result<(), Problem> {
        let noise_image = noise::decode(encoded_bytes)?;
        self.smoke.update_noise(device, queue, &noise_image);
        Ok(())
    }

    pub fn resize(
        &mut self,
        logical_width: u32,
        logical_height: u32,
        physical_width: u32,
        physical_height: u32,
    ) {
        if logical_width == 0 || logical_height == 0 {
            return;
        }

        log::debug!(
            "Resized to {}x{} ({}x{} physical)",
            logical_width,
            logical_height,
            physical_width,
            physical_height
        );

        self.camera.resize(logical_width, logical_height);
        self.logical_size = (logical_width, logical_height);
    }

    pub fn animate(
        &mut self,
        queue: &wgpu::Queue,
        encoder: &mut wgpu::CommandEncoder,
        view: &wgpu::TextureView,
        timestamp: f64,
    ) {
        self.compute(queue, timestamp);
        self.render(encoder, view);
    }

    /// Advance the animation to `timestamp` (in milliseconds).
    pub fn compute(&mut self, queue: &wgpu::Queue, timestamp: f64) {
        let timestep = advance(&mut self.last_timestamp, timestamp);

        self.elapsed_time += timestep;

        // Reset the animation timer to avoid precision issues
        let timer_overflow = self.elapsed_time - MAX_ELAPSED_TIME;
        if timer_overflow >= 0.0 {
            self.elapsed_time = timer_overflow;
        }

        self.controls.update(&mut self.camera);

        self.smoke.update_uniforms(
            queue,
            &uniforms(&self.settings, &self.camera, self.elapsed_time),
        );
    }

    pub fn render(&self, encoder: &mut wgpu::CommandEncoder, view: &wgpu::TextureView) {
        encoder.push_debug_group("render smoke");

        {
            let mut rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("smoke::render"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view,
                    depth_slice: None,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            self.smoke.draw(&mut rpass);
        }

        encoder.pop_debug_group();
    }
}

// Returns the clamped timestep in seconds.
fn advance(last_timestamp: &mut Option<f64>, timestamp: f64) -> f32 {
    let timestep = match *last_timestamp {
        Some(last) => f32::min(MAX_FRAME_TIME, (0.001 * (timestamp - last)).max(0.0) as f32),
        None => 0.0,
    };

    *last_timestamp = Some(timestamp);
    timestep
}

fn uniforms(settings: &Settings, camera: &Camera, time: f32) -> smoke::Uniforms {
    smoke::Uniforms {
        view_projection: camera.view_projection().to_cols_array_2d(),
        color: settings.smoke_color,
        time,
    }
}

fn generate_noise(settings: &Settings) -> image::GrayImage {
    log::info!("🎛 Generating noise");

    let mut rng = rng::from_seed(&settings.seed);
    noise::generate(&settings.noise, &mut rng)
}

fn validate(settings: &Settings) -> Result<(), Problem> {
    let noise = &settings.noise;

    if noise.size == 0 || noise.size > MAX_NOISE_SIZE {
        return Err(Problem::InvalidSettings(format!(
            "the noise texture size must be between 1 and {} (got {})",
            MAX_NOISE_SIZE, noise.size
        )));
    }

    if noise.octaves > MAX_NOISE_OCTAVES {
        return Err(Problem::InvalidSettings(format!(
            "at most {} noise octaves are supported (got {})",
            MAX_NOISE_OCTAVES, noise.octaves
        )));
    }

    // Each octave doubles the period of the previous one.
    let finest_period = 1u32
        .checked_shl(noise.octaves.max(1) - 1)
        .and_then(|factor| noise.scale.max(1).checked_mul(factor));
    match finest_period {
        Some(period) if period <= noise.size => (),
        _ => {
            return Err(Problem::InvalidSettings(format!(
                "a noise scale of {} over {} octaves is finer than the {}px texture",
                noise.scale, noise.octaves, noise.size
            )));
        }
    }

    if !(settings.camera.near > 0.0 && settings.camera.far > settings.camera.near) {
        return Err(Problem::InvalidSettings(format!(
            "the camera clipping planes are out of order (near: {}, far: {})",
            settings.camera.near, settings.camera.far
        )));
    }

    Ok(())
}
