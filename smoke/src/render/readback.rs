use crate::capture::{CaptureError, Frame};
use crate::Smoke;

/// Renders the scene into an offscreen texture and copies it back to the CPU.
///
/// Swapchain textures usually can't be copied from, so the frame is drawn a
/// second time into a texture of the same format. Reading back blocks until
/// the GPU is done, which is only possible on native targets.
pub struct FrameReader {
    texture: wgpu::Texture,
    texture_view: wgpu::TextureView,
    buffer: wgpu::Buffer,
    size: wgpu::Extent3d,
    format: wgpu::TextureFormat,
    padded_bytes_per_row: u32,
}

impl FrameReader {
    pub fn new(device: &wgpu::Device, format: wgpu::TextureFormat, width: u32, height: u32) -> Self {
        let size = wgpu::Extent3d {
            width: width.max(1),
            height: height.max(1),
            depth_or_array_layers: 1,
        };
        let padded_bytes_per_row = padded_bytes_per_row(size.width);

        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("texture:readback"),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            view_formats: &[],
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
        });
        let texture_view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("buffer:readback"),
            size: u64::from(padded_bytes_per_row) * u64::from(size.height),
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        Self {
            texture,
            texture_view,
            buffer,
            size,
            format,
            padded_bytes_per_row,
        }
    }

    pub fn resize(&mut self, device: &wgpu::Device, width: u32, height: u32) {
        if (width.max(1), height.max(1)) != (self.size.width, self.size.height) {
            *self = Self::new(device, self.format, width, height);
        }
    }

    /// Draw the current state of `smoke` and return it as an RGBA image.
    pub fn read(
        &self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        smoke: &Smoke,
    ) -> Result<Frame, CaptureError> {
        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("smoke:readback"),
        });

        smoke.render(&mut encoder, &self.texture_view);

        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture: &self.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &self.buffer,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(self.padded_bytes_per_row),
                    rows_per_image: Some(self.size.height),
                },
            },
            self.size,
        );

        queue.submit(Some(encoder.finish()));

        let slice = self.buffer.slice(..);
        let (sender, receiver) = futures::channel::oneshot::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = sender.send(result);
        });

        device
            .poll(wgpu::PollType::Wait {
                submission_index: None,
                timeout: None,
            })
            .map_err(|err| CaptureError::Readback(err.to_string()))?;

        pollster::block_on(receiver)
            .map_err(|_| CaptureError::Readback("map callback was dropped".to_string()))?
            .map_err(|err| CaptureError::Readback(err.to_string()))?;

        let pixels = {
            let data = slice.get_mapped_range();
            unpad_rows(
                &data,
                self.padded_bytes_per_row,
                self.size.width,
                self.size.height,
                is_bgra(self.format),
            )
        };
        self.buffer.unmap();

        Frame::from_raw(self.size.width, self.size.height, pixels)
            .ok_or_else(|| CaptureError::Readback("pixel buffer has the wrong size".to_string()))
    }
}

fn padded_bytes_per_row(width: u32) -> u32 {
    let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
    (4 * width).div_ceil(align) * align
}

fn is_bgra(format: wgpu::TextureFormat) -> bool {
    matches!(
        format,
        wgpu::TextureFormat::Bgra8Unorm | wgpu::TextureFormat::Bgra8UnormSrgb
    )
}

// Strip the row padding required by buffer copies and convert to RGBA.
fn unpad_rows(data: &[u8], padded_bytes_per_row: u32, width: u32, height: u32, bgra: bool) -> Vec<u8> {
    let row_length = 4 * width as usize;
    let mut pixels = Vec::with_capacity(row_length * height as usize);

    for row in data.chunks(padded_bytes_per_row as usize).take(height as usize) {
        pixels.extend_from_slice(&row[..row_length]);
    }

    if bgra {
        pixels.chunks_exact_mut(4).for_each(|pixel| pixel.swap(0, 2));
    }

    pixels
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_padded_bytes_per_row() {
        assert_eq!(padded_bytes_per_row(1), 256);
        assert_eq!(padded_bytes_per_row(64), 256);
        assert_eq!(padded_bytes_per_row(65), 512);
        assert_eq!(padded_bytes_per_row(1280), 5120);
    }

    #[test]
    fn test_unpad_rows_and_swizzle() {
        let padded = padded_bytes_per_row(2) as usize;
        let mut data = vec![0u8; padded * 2];
        data[..8].copy_from_slice(&[1, 2, 3, 4, 5, 6, 7, 8]);
        data[padded..padded + 8].copy_from_slice(&[9, 10, 11, 12, 13, 14, 15, 16]);

        assert_eq!(
            unpad_rows(&data, padded as u32, 2, 2, false),
            vec![1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16]
        );
        assert_eq!(
            unpad_rows(&data, padded as u32, 2, 2, true),
            vec![3, 2, 1, 4, 7, 6, 5, 8, 11, 10, 9, 12, 15, 14, 13, 16]
        );
    }
}
