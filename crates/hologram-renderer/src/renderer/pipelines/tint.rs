//! Demo post-process: multiplies the quilt by a constant color.

use super::{draw_fullscreen, fs_vbo, uniform_entry, FS_VERTEX_LAYOUT, FS_VERTEX_WGSL};
use crate::renderer::targets::{QuiltTargets, QUILT_COLOR_FORMAT};
use crate::renderer::PostProcess;
use wgpu::util::DeviceExt;

pub struct TintPass {
    pipeline: wgpu::RenderPipeline,
    bind_group: wgpu::BindGroup,
    fs_vbo: wgpu::Buffer,
}

impl TintPass {
    pub fn new(device: &wgpu::Device, tint: [f32; 4]) -> Self {
        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Tint Layout"),
            entries: &[uniform_entry(0, wgpu::ShaderStages::FRAGMENT, 16, false)],
        });

        let ubo = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Tint UBO"),
            contents: bytemuck::cast_slice(&tint),
            usage: wgpu::BufferUsages::UNIFORM,
        });

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Tint BG"),
            layout: &layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: ubo.as_entire_binding(),
            }],
        });

        let source = [FS_VERTEX_WGSL, TINT_WGSL].concat();
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Tint WGSL"),
            source: wgpu::ShaderSource::Wgsl(source.into()),
        });

        let pipe_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Tint PipelineLayout"),
            bind_group_layouts: &[&layout],
            push_constant_ranges: &[],
        });

        // dst * src
        let multiply = wgpu::BlendComponent {
            src_factor: wgpu::BlendFactor::Dst,
            dst_factor: wgpu::BlendFactor::Zero,
            operation: wgpu::BlendOperation::Add,
        };

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Tint Pipeline"),
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
                    format: QUILT_COLOR_FORMAT,
                    blend: Some(wgpu::BlendState {
                        color: multiply,
                        alpha: multiply,
                    }),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            }),
            primitive: wgpu::PrimitiveState::default(),
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
        });

        Self {
            pipeline,
            bind_group,
            fs_vbo: fs_vbo(device, "Tint FS VBO"),
        }
    }
}

impl PostProcess for TintPass {
    fn process(
        &mut self,
        _device: &wgpu::Device,
        _queue: &wgpu::Queue,
        encoder: &mut wgpu::CommandEncoder,
        quilt: &QuiltTargets,
    ) {
        let mut rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Tint Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &quilt.color,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Load,
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });
        draw_fullscreen(&mut rpass, &self.pipeline, &self.bind_group, &self.fs_vbo);
    }
}

const TINT_WGSL: &str = r#"
@group(0) @binding(0) var<uniform> tint: vec4<f32>;

@fragment
fn fs_main(in: VSOut) -> @location(0) vec4<f32> {
    return tint;
}
"#;
