//! Maps the quilt onto the lenticular panel, one sub-pixel at a time.

use super::{draw_fullscreen, fs_vbo, storage_entry, texture_entry, uniform_entry, GrowBuffer, FS_VERTEX_LAYOUT, FS_VERTEX_WGSL};
use crate::renderer::targets::QuiltTargets;
use quilt::{DisplayRegion, LenticularParams, LenticularUniform};

pub struct LenticularPass {
    pipeline: wgpu::RenderPipeline,
    layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
    ubo: wgpu::Buffer,
    cells: GrowBuffer,
    fs_vbo: wgpu::Buffer,
}

impl LenticularPass {
    pub fn new(device: &wgpu::Device, out_fmt: wgpu::TextureFormat) -> Self {
        let fragment = wgpu::ShaderStages::FRAGMENT;
        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Lenticular Layout"),
            entries: &[
                texture_entry(0, fragment, wgpu::TextureSampleType::Float { filterable: true }),
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: fragment,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
                uniform_entry(2, fragment, std::mem::size_of::<LenticularUniform>() as u64, false),
                storage_entry(3, fragment),
            ],
        });

        let source = [FS_VERTEX_WGSL, LENTICULAR_WGSL].concat();
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Lenticular WGSL"),
            source: wgpu::ShaderSource::Wgsl(source.into()),
        });

        let pipe_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Lenticular PipelineLayout"),
            bind_group_layouts: &[&layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Lenticular Pipeline"),
            layout: Some(&pipe_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: "vs_main",
                buffers: &[FS_VERTEX_LAYOUT],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: "fs_main",
                targets: &[Some(wgpu::ColorTargetState {
                    format: out_fmt,
                    blend: None,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            }),
            primitive: wgpu::PrimitiveState::default(),
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
        });

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Lenticular Sampler"),
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        let ubo = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Lenticular UBO"),
            size: std::mem::size_of::<LenticularUniform>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        // Six floats per cell.
        let cells = GrowBuffer::new(device, "Subpixel Cells", 24, wgpu::BufferUsages::STORAGE);

        Self {
            pipeline,
            layout,
            sampler,
            ubo,
            cells,
            fs_vbo: fs_vbo(device, "Lenticular FS VBO"),
        }
    }

    /// Draws into `region` of `dst`. Without a quilt the whole output is
    /// cleared to opaque black.
    #[allow(clippy::too_many_arguments)]
    pub fn draw(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        encoder: &mut wgpu::CommandEncoder,
        dst: &wgpu::TextureView,
        quilt: Option<&QuiltTargets>,
        params: &LenticularParams,
        region: &DisplayRegion,
    ) {
        let quilt = quilt.filter(|_| region.width >= 1.0 && region.height >= 1.0);
        let Some(quilt) = quilt else {
            Self::clear(encoder, dst);
            return;
        };

        queue.write_buffer(&self.ubo, 0, bytemuck::bytes_of(&params.to_uniform()));
        self.cells
            .upload(device, queue, bytemuck::cast_slice(&params.cell_data()));

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Lenticular BG"),
            layout: &self.layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&quilt.color),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&self.sampler),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: self.ubo.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: self.cells.buffer().as_entire_binding(),
                },
            ],
        });

        let mut rpass = Self::begin(encoder, dst);
        rpass.set_viewport(region.x, region.y, region.width, region.height, 0.0, 1.0);
        draw_fullscreen(&mut rpass, &self.pipeline, &bind_group, &self.fs_vbo);
    }

    fn clear(encoder: &mut wgpu::CommandEncoder, dst: &wgpu::TextureView) {
        let _rpass = Self::begin(encoder, dst);
    }

    fn begin<'a>(encoder: &'a mut wgpu::CommandEncoder, dst: &'a wgpu::TextureView) -> wgpu::RenderPass<'a> {
        encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Lenticular Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: dst,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        })
    }
}

const LENTICULAR_WGSL: &str = r#"
struct Lenticular {
    pitch: f32,
    slope: f32,
    center: f32,
    subpixel_size: f32,
    screen_size: vec2<f32>,
    view_portion: vec2<f32>,
    tile: vec4<f32>,
    aspect: vec2<f32>,
    fringe: f32,
    flip_subp: f32,
    inv_view: f32,
    flip_x: f32,
    flip_y: f32,
    filter_edge: f32,
    cell_pattern_mode: u32,
    cell_count: u32,
    _pad: vec2<u32>,
};

@group(0) @binding(0) var quilt_tex: texture_2d<f32>;
@group(0) @binding(1) var quilt_samp: sampler;
@group(0) @binding(2) var<uniform> L: Lenticular;
@group(0) @binding(3) var<storage, read> cells: array<f32>;

// Both arguments y-up. `z` in [0, 1) picks the view across the cone.
fn quilt_uv(uv: vec2<f32>, z: f32) -> vec2<f32> {
    let count = L.tile.z;
    let tile = min(floor(z * count), count - 1.0);
    let x = (tile % L.tile.x + uv.x) / L.tile.x;
    let y = (floor(tile / L.tile.x) + uv.y) / L.tile.y;
    let up = vec2<f32>(x, y) * L.view_portion;
    // Quilt rows are stored top-down.
    return vec2<f32>(up.x, 1.0 - up.y);
}

fn view_fraction(coord: vec2<f32>) -> f32 {
    let z = fract((coord.x + coord.y * L.slope) * L.pitch - L.center);
    return mix(z, 1.0 - z, clamp(L.inv_view, 0.0, 1.0));
}

@fragment
fn fs_main(in: VSOut) -> @location(0) vec4<f32> {
    var tex = vec2<f32>(in.uv.x, 1.0 - in.uv.y);
    if (L.flip_x >= 0.5) {
        tex.x = 1.0 - tex.x;
    }
    if (L.flip_y >= 0.5) {
        tex.y = 1.0 - tex.y;
    }

    // Letterbox the render aspect inside the display aspect.
    var nuv = tex - 0.5;
    let display = L.aspect.x;
    let render = L.aspect.y;
    if (display >= render) {
        nuv.x = nuv.x * display / render;
    } else {
        nuv.y = nuv.y * render / display;
    }
    nuv = nuv + 0.5;
    if (any(nuv < vec2<f32>(0.0)) || any(nuv > vec2<f32>(1.0))) {
        return vec4<f32>(0.0, 0.0, 0.0, 1.0);
    }

    let pixel = vec2<u32>(in.uv * L.screen_size);
    var rgb: array<vec4<f32>, 3>;
    for (var i = 0u; i < 3u; i++) {
        var coord = tex;
        if (L.cell_count > 0u) {
            let cell = (pixel.x + pixel.y * L.cell_pattern_mode) % L.cell_count;
            coord = coord + vec2<f32>(cells[cell * 6u + i * 2u], cells[cell * 6u + i * 2u + 1u]);
        } else {
            coord.x = coord.x + f32(i) * L.subpixel_size;
        }
        rgb[i] = textureSampleLevel(quilt_tex, quilt_samp, quilt_uv(nuv, view_fraction(coord)), 0.0);
    }

    let ri = select(0, 2, L.flip_subp >= 0.5);
    var color = vec3<f32>(rgb[ri].r, rgb[1].g, rgb[2 - ri].b);

    if (L.filter_edge >= 0.5) {
        let edge = min(
            min(nuv.x, 1.0 - nuv.x) * L.screen_size.x,
            min(nuv.y, 1.0 - nuv.y) * L.screen_size.y,
        );
        color = color * clamp(edge, 0.0, 1.0);
    }

    return vec4<f32>(color, 1.0);
}
"#;
