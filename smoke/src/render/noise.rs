//! The tileable Perlin noise texture that drives both the displacement and
//! the colour of the smoke.

use crate::rng::{self, SmokeRng};
use crate::settings;

use image::{GrayImage, Luma};
use std::f32::consts::{PI, SQRT_2};

/// Fractal Perlin noise that wraps seamlessly in both directions.
pub fn generate(settings: &settings::Noise, rng: &mut SmokeRng) -> GrayImage {
    let size = settings.size.max(1);
    let octaves: Vec<Octave> = (0..settings.octaves.max(1))
        .map(|octave| Octave::new(settings.scale.max(1) << octave, rng))
        .collect();

    let mut amplitude = 1.0;
    let mut total_amplitude = 0.0;
    let amplitudes: Vec<f32> = octaves
        .iter()
        .map(|_| {
            let current = amplitude;
            total_amplitude += current;
            amplitude *= settings.persistence;
            current
        })
        .collect();

    GrayImage::from_fn(size, size, |x, y| {
        let u = x as f32 / size as f32;
        let v = y as f32 / size as f32;

        let sum: f32 = octaves
            .iter()
            .zip(&amplitudes)
            .map(|(octave, amplitude)| amplitude * octave.sample(u, v))
            .sum();

        // Perlin noise stays within ±√½.
        let value = 0.5 + 0.5 * SQRT_2 * sum / total_amplitude;
        Luma([(value.clamp(0.0, 1.0) * 255.0).round() as u8])
    })
}

/// Decode an encoded image and keep its red channel.
pub fn decode(encoded_bytes: &[u8]) -> Result<GrayImage, image::ImageError> {
    log::debug!("Decoding noise texture");

    let img = image::load_from_memory(encoded_bytes)?.to_rgba8();
    Ok(GrayImage::from_fn(img.width(), img.height(), |x, y| {
        Luma([img.get_pixel(x, y).0[0]])
    }))
}

struct Octave {
    period: u32,
    gradients: Vec<[f32; 2]>,
}

impl Octave {
    fn new(period: u32, rng: &mut SmokeRng) -> Self {
        let gradients = (0..period * period)
            .map(|_| {
                let angle = 2.0 * PI * rng::gen::<f32>(rng);
                [angle.cos(), angle.sin()]
            })
            .collect();

        Self { period, gradients }
    }

    fn gradient(&self, x: u32, y: u32) -> [f32; 2] {
        let x = x % self.period;
        let y = y % self.period;
        self.gradients[(y * self.period + x) as usize]
    }

    // `u` and `v` are in [0, 1).
    fn sample(&self, u: f32, v: f32) -> f32 {
        let x = u * self.period as f32;
        let y = v * self.period as f32;
        let x0 = x.floor();
        let y0 = y.floor();
        let (fx, fy) = (x - x0, y - y0);
        let (ix, iy) = (x0 as u32, y0 as u32);

        let dot = |gx: u32, gy: u32, dx: f32, dy: f32| {
            let [gx, gy] = self.gradient(gx, gy);
            gx * dx + gy * dy
        };

        let n00 = dot(ix, iy, fx, fy);
        let n10 = dot(ix + 1, iy, fx - 1.0, fy);
        let n01 = dot(ix, iy + 1, fx, fy - 1.0);
        let n11 = dot(ix + 1, iy + 1, fx - 1.0, fy - 1.0);

        let (sx, sy) = (fade(fx), fade(fy));
        let top = lerp(n00, n10, sx);
        let bottom = lerp(n01, n11, sx);
        lerp(top, bottom, sy)
    }
}

fn fade(t: f32) -> f32 {
    t * t * t * (t * (t * 6.0 - 15.0) + 10.0)
}

fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

pub struct Context {
    #[allow(dead_code)]
    texture: wgpu::Texture,
    pub texture_view: wgpu::TextureView,
}

impl Context {
    pub fn new(device: &wgpu::Device, queue: &wgpu::Queue, img: &GrayImage) -> Self {
        let width = img.width();
        let height = img.height();
        let size = wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        };

        log::debug!("Uploading noise texture ({}x{})", width, height);

        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("texture:noise"),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::R8Unorm,
            view_formats: &[],
            usage: wgpu::TextureUsages::COPY_DST | wgpu::TextureUsages::TEXTURE_BINDING,
        });

        queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            img.as_raw(),
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(width),
                rows_per_image: None,
            },
            size,
        );

        let texture_view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        Self {
            texture,
            texture_view,
        }
    }
}
