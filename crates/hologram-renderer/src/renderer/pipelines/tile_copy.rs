//! Copies one rendered view into its quilt tile.
//!
//! The draw covers the tile rect via the viewport. Color is written
//! premultiplied and the view's linear depth goes to the quilt depth texture
//! through a second attachment. Every tile is written once over the cleared
//! quilt, so a plain write is the same as blending over it.

use super::{draw_fullscreen, fs_vbo, texture_entry, FS_VERTEX_LAYOUT, FS_VERTEX_WGSL};
use crate::renderer::targets::{QuiltTargets, TileTarget, QUILT_COLOR_FORMAT, QUILT_DEPTH_FORMAT};
use quilt::TileRect;

pub struct TileCopyPipeline {
    pipeline: wgpu::RenderPipeline,
    layout: wgpu::BindGroupLayout,
    fs_vbo: wgpu::Buffer,
}

impl TileCopyPipeline {
    pub fn new(device: &wgpu::Device) -> Self {
        let unfilterable = wgpu::TextureSampleType::Float { filterable: false };
        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Tile Copy Layout"),
            entries: &[
                texture_entry(0, wgpu::ShaderStages::FRAGMENT, unfilterable),
                texture_entry(1, wgpu::ShaderStages::FRAGMENT, unfilterable),
            ],
        });

        let source = [FS_VERTEX_WGSL, TILE_COPY_WGSL].concat();
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Tile Copy WGSL"),
            source: wgpu::ShaderSource::Wgsl(source.into()),
        });

        let pipe_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Tile Copy PipelineLayout"),
            bind_group_layouts: &[&layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Tile Copy Pipeline"),
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
                targets: &[
                    Some(wgpu::ColorTargetState {
                        format: QUILT_COLOR_FORMAT,
                        blend: None,
                        write_mask: wgpu::ColorWrites::ALL,
                    }),
                    Some(wgpu::ColorTargetState {
                        format: QUILT_DEPTH_FORMAT,
                        blend: None,
                        write_mask: wgpu::ColorWrites::ALL,
                    }),
                ],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            }),
            primitive: wgpu::PrimitiveState::default(),
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
        });

        Self {
            pipeline,
            layout,
            fs_vbo: fs_vbo(device, "Tile Copy FS VBO"),
        }
    }

    pub fn copy(
        &self,
        device: &wgpu::Device,
        encoder: &mut wgpu::CommandEncoder,
        tile: &TileTarget,
        quilt: &QuiltTargets,
        rect: TileRect,
    ) {
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Tile Copy BG"),
            layout: &self.layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&tile.color),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(&tile.linear_depth),
                },
            ],
        });

        let load = wgpu::Operations {
            load: wgpu::LoadOp::Load,
            store: wgpu::StoreOp::Store,
        };
        let mut rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Tile Copy Pass"),
            color_attachments: &[
                Some(wgpu::RenderPassColorAttachment {
                    view: &quilt.color,
                    resolve_target: None,
                    ops: load,
                }),
                Some(wgpu::RenderPassColorAttachment {
                    view: &quilt.depth,
                    resolve_target: None,
                    ops: load,
                }),
            ],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });

        rpass.set_viewport(
            rect.x as f32,
            rect.y as f32,
            rect.width as f32,
            rect.height as f32,
            0.0,
            1.0,
        );
        rpass.set_scissor_rect(rect.x, rect.y, rect.width, rect.height);
        draw_fullscreen(&mut rpass, &self.pipeline, &bind_group, &self.fs_vbo);
    }
}

const TILE_COPY_WGSL: &str = r#"
@group(0) @binding(0) var t_color: texture_2d<f32>;
@group(0) @binding(1) var t_linear_depth: texture_2d<f32>;

struct FSOut {
    @location(0) color: vec4<f32>,
    @location(1) depth: vec4<f32>,
}

@fragment
fn fs_main(in: VSOut) -> FSOut {
    let size = vec2<f32>(textureDimensions(t_color));
    let texel = vec2<i32>(min(in.uv * size, size - 1.0));

    let c = textureLoad(t_color, texel, 0);

    var out: FSOut;
    out.color = vec4<f32>(c.rgb * c.a, c.a);
    out.depth = vec4<f32>(textureLoad(t_linear_depth, texel, 0).r, 0.0, 0.0, 0.0);
    return out;
}
"#;
