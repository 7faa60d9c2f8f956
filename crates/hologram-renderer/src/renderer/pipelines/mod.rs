pub mod alpha;
pub mod interpolation;
pub mod lenticular;
pub mod tile_copy;
pub mod tint;

use anyhow::{anyhow, Result};
use wgpu::util::DeviceExt;

/// Runs `create` inside a validation error scope. GPU objects the device
/// rejects come back as an error instead of reaching the uncaptured-error
/// handler, which panics.
pub fn validated<T>(device: &wgpu::Device, what: &str, create: impl FnOnce() -> T) -> Result<T> {
    device.push_error_scope(wgpu::ErrorFilter::Validation);
    let value = create();
    match pollster::block_on(device.pop_error_scope()) {
        Some(err) => Err(anyhow!("creating {}: {}", what, err)),
        None => Ok(value),
    }
}

/// Full-screen triangle vertices
pub(crate) const FS_TRI: [[f32; 2]; 3] = [
    [-1.0, -1.0],
    [3.0, -1.0],
    [-1.0, 3.0],
];

/// Vertex stage shared by every full-screen pass. `uv` runs top-down and is
/// relative to the current viewport.
pub(crate) const FS_VERTEX_WGSL: &str = r#"
struct VSOut {
    @builtin(position) clip: vec4<f32>,
    @location(0)         uv: vec2<f32>,
}

@vertex
fn vs_main(@location(0) pos: vec2<f32>) -> VSOut {
    var out: VSOut;
    out.clip = vec4<f32>(pos, 0.0, 1.0);
    out.uv = vec2<f32>(0.5 * (pos.x + 1.0), 0.5 * (-pos.y + 1.0));
    return out;
}
"#;

pub(crate) const FS_VERTEX_LAYOUT: wgpu::VertexBufferLayout<'static> = wgpu::VertexBufferLayout {
    array_stride: std::mem::size_of::<[f32; 2]>() as u64,
    step_mode: wgpu::VertexStepMode::Vertex,
    attributes: &[wgpu::VertexAttribute {
        shader_location: 0,
        offset: 0,
        format: wgpu::VertexFormat::Float32x2,
    }],
};

pub(crate) fn fs_vbo(device: &wgpu::Device, label: &str) -> wgpu::Buffer {
    device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some(label),
        contents: bytemuck::cast_slice(&FS_TRI),
        usage: wgpu::BufferUsages::VERTEX,
    })
}

pub(crate) fn texture_entry(
    binding: u32,
    visibility: wgpu::ShaderStages,
    sample_type: wgpu::TextureSampleType,
) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility,
        ty: wgpu::BindingType::Texture {
            sample_type,
            view_dimension: wgpu::TextureViewDimension::D2,
            multisampled: false,
        },
        count: None,
    }
}

pub(crate) fn uniform_entry(
    binding: u32,
    visibility: wgpu::ShaderStages,
    size: u64,
    has_dynamic_offset: bool,
) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset,
            min_binding_size: wgpu::BufferSize::new(size),
        },
        count: None,
    }
}

pub(crate) fn storage_entry(binding: u32, visibility: wgpu::ShaderStages) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Storage { read_only: true },
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

/// Draws the full-screen triangle into whatever attachments `pass` has.
pub(crate) fn draw_fullscreen<'a>(
    pass: &mut wgpu::RenderPass<'a>,
    pipeline: &'a wgpu::RenderPipeline,
    bind_group: &'a wgpu::BindGroup,
    fs_vbo: &'a wgpu::Buffer,
) {
    pass.set_pipeline(pipeline);
    pass.set_bind_group(0, bind_group, &[]);
    pass.set_vertex_buffer(0, fs_vbo.slice(..));
    pass.draw(0..3, 0..1);
}

/// GPU buffer that only ever grows. Never zero-sized: an empty upload
/// leaves a one-element placeholder.
pub struct GrowBuffer {
    buffer: wgpu::Buffer,
    capacity: u64,
    elem_size: u64,
    usage: wgpu::BufferUsages,
    label: &'static str,
}

impl GrowBuffer {
    pub fn new(device: &wgpu::Device, label: &'static str, elem_size: u64, usage: wgpu::BufferUsages) -> Self {
        let usage = usage | wgpu::BufferUsages::COPY_DST;
        Self {
            buffer: Self::alloc(device, label, elem_size, 1, usage),
            capacity: 1,
            elem_size,
            usage,
            label,
        }
    }

    fn alloc(device: &wgpu::Device, label: &str, elem_size: u64, count: u64, usage: wgpu::BufferUsages) -> wgpu::Buffer {
        device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size: elem_size * count,
            usage,
            mapped_at_creation: false,
        })
    }

    /// Makes room for `count` elements; returns true when reallocated.
    pub fn reserve(&mut self, device: &wgpu::Device, count: u64) -> bool {
        if count <= self.capacity {
            return false;
        }
        let capacity = count.next_power_of_two();
        log::debug!("Growing {} to {} elements", self.label, capacity);
        self.buffer = Self::alloc(device, self.label, self.elem_size, capacity, self.usage);
        self.capacity = capacity;
        true
    }

    pub fn upload(&mut self, device: &wgpu::Device, queue: &wgpu::Queue, bytes: &[u8]) {
        if bytes.is_empty() {
            return;
        }
        self.reserve(device, bytes.len() as u64 / self.elem_size);
        queue.write_buffer(&self.buffer, 0, bytes);
    }

    #[inline]
    pub fn buffer(&self) -> &wgpu::Buffer {
        &self.buffer
    }

    #[inline]
    pub fn capacity(&self) -> u64 {
        self.capacity
    }
}
