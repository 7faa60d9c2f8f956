//! Keeps the quilt's alpha channel intact across an external post-process.

use super::{draw_fullscreen, fs_vbo, texture_entry, FS_VERTEX_LAYOUT, FS_VERTEX_WGSL};
use crate::renderer::targets::{QuiltTargets, QUILT_COLOR_FORMAT};

/// Copy of the quilt color taken by [`AlphaPreservePass::save`]. Lives for
/// one frame; drop it once the restoring commands are submitted.
pub struct SavedAlpha {
    _texture: wgpu::Texture,
    view: wgpu::TextureView,
}

pub struct AlphaPreservePass {
    pipeline: wgpu::RenderPipeline,
    layout: wgpu::BindGroupLayout,
    fs_vbo: wgpu::Buffer,
}

impl AlphaPreservePass {
    pub fn new(device: &wgpu::Device) -> Self {
        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Alpha Restore Layout"),
            entries: &[texture_entry(
                0,
                wgpu::ShaderStages::FRAGMENT,
                wgpu::TextureSampleType::Float { filterable: false },
            )],
        });

        let source = [FS_VERTEX_WGSL, ALPHA_RESTORE_WGSL].concat();
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Alpha Restore WGSL"),
            source: wgpu::ShaderSource::Wgsl(source.into()),
        });

        let pipe_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Alpha Restore PipelineLayout"),
            bind_group_layouts: &[&layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Alpha Restore Pipeline"),
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
                    blend: None,
                    write_mask: wgpu::ColorWrites::ALPHA,
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
            layout,
            fs_vbo: fs_vbo(device, "Alpha Restore FS VBO"),
        }
    }

    /// Snapshots the quilt color before the post-process touches it.
    pub fn save(&self, device: &wgpu::Device, encoder: &mut wgpu::CommandEncoder, quilt: &QuiltTargets) -> SavedAlpha {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Saved Quilt Alpha"),
            size: quilt.extent(),
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: QUILT_COLOR_FORMAT,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        encoder.copy_texture_to_texture(
            quilt.color_texture.as_image_copy(),
            texture.as_image_copy(),
            quilt.extent(),
        );

        SavedAlpha {
            view: texture.create_view(&wgpu::TextureViewDescriptor::default()),
            _texture: texture,
        }
    }

    /// Writes the saved alpha back over the quilt, leaving RGB as the
    /// post-process left it.
    pub fn restore(
        &self,
        device: &wgpu::Device,
        encoder: &mut wgpu::CommandEncoder,
        quilt: &QuiltTargets,
        saved: &SavedAlpha,
    ) {
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Alpha Restore BG"),
            layout: &self.layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::TextureView(&saved.view),
            }],
        });

        let mut rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Alpha Restore Pass"),
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
        draw_fullscreen(&mut rpass, &self.pipeline, &bind_group, &self.fs_vbo);
    }
}

const ALPHA_RESTORE_WGSL: &str = r#"
@group(0) @binding(0) var saved: texture_2d<f32>;

@fragment
fn fs_main(in: VSOut) -> @location(0) vec4<f32> {
    let size = vec2<f32>(textureDimensions(saved));
    let texel = vec2<i32>(min(in.uv * size, size - 1.0));
    return vec4<f32>(0.0, 0.0, 0.0, textureLoad(saved, texel, 0).a);
}
"#;
