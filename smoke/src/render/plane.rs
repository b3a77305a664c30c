use crate::settings;

#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub uv: [f32; 2],
}

impl Vertex {
    const ATTRIBUTES: [wgpu::VertexAttribute; 2] =
        wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x2];

    pub fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<Vertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRIBUTES,
        }
    }
}

/// A unit plane in the XY plane, subdivided into a grid of segments and
/// scaled in X and Y. UVs run from the bottom-left corner.
pub struct PlaneGeometry {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
}

impl PlaneGeometry {
    pub fn new(settings: &settings::Plane) -> Self {
        let columns = settings.width_segments.max(1);
        let rows = settings.height_segments.max(1);
        let stride = columns + 1;

        let mut vertices = Vec::with_capacity((stride * (rows + 1)) as usize);
        for row in 0..=rows {
            let v = row as f32 / rows as f32;
            for column in 0..=columns {
                let u = column as f32 / columns as f32;
                vertices.push(Vertex {
                    position: [(u - 0.5) * settings.scale, (0.5 - v) * settings.scale, 0.0],
                    uv: [u, 1.0 - v],
                });
            }
        }

        let mut indices = Vec::with_capacity((columns * rows * 6) as usize);
        for row in 0..rows {
            for column in 0..columns {
                let a = column + stride * row;
                let b = column + stride * (row + 1);
                let c = (column + 1) + stride * (row + 1);
                let d = (column + 1) + stride * row;

                indices.extend_from_slice(&[a, b, d, b, c, d]);
            }
        }

        Self { vertices, indices }
    }
}
