//! What gets drawn into each view.
//!
//! The quilt renderer only knows the [`ScenePrimitive`] trait. [`DemoScene`]
//! is a small instanced-cube scene used by the binary and the tests.

use crate::renderer::targets::{TILE_COLOR_FORMAT, TILE_DEPTH_FORMAT, TILE_LINEAR_DEPTH_FORMAT};
use glam::{Mat4, Vec3, Vec4};
use wgpu::util::DeviceExt;

/// Matrices for one view.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SceneView {
    pub view: Mat4,
    pub proj: Mat4,
    /// Wider than `proj`; anything outside it is invisible in every view.
    pub cull_proj: Mat4,
    pub view_index: u32,
}

/// Draws the scene into a tile target. The pass has two color attachments,
/// [`TILE_COLOR_FORMAT`] at location 0 and [`TILE_LINEAR_DEPTH_FORMAT`] at
/// location 1 (view-space distance `-z`, cleared to the far clip), plus a
/// [`TILE_DEPTH_FORMAT`] depth buffer (compare `Less`, cleared to 1).
pub trait ScenePrimitive {
    /// Uploads per-view state. Called once before each `draw`.
    fn prepare(&mut self, queue: &wgpu::Queue, view: &SceneView);

    fn draw<'a>(&'a self, pass: &mut wgpu::RenderPass<'a>);
}

/// Draws nothing. Leaves the tile transparent.
#[derive(Debug, Default)]
pub struct EmptyScene;

impl ScenePrimitive for EmptyScene {
    fn prepare(&mut self, _queue: &wgpu::Queue, _view: &SceneView) {}

    fn draw<'a>(&'a self, _pass: &mut wgpu::RenderPass<'a>) {}
}

#[repr(C)]
#[derive(Clone, Copy, Debug, bytemuck::Pod, bytemuck::Zeroable)]
struct CubeVertex {
    position: [f32; 3],
    normal: [f32; 3],
}

#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct CubeInstance {
    /// xyz, w unused
    pub center: [f32; 4],
    pub half_extent: [f32; 4],
    pub color: [f32; 4],
}

const _: [(); 48] = [(); core::mem::size_of::<CubeInstance>()];

impl CubeInstance {
    pub fn new(center: Vec3, half_extent: Vec3, color: [f32; 4]) -> Self {
        Self {
            center: center.extend(0.0).to_array(),
            half_extent: half_extent.extend(0.0).to_array(),
            color,
        }
    }

    fn bounding_radius(&self) -> f32 {
        Vec3::from_slice(&self.half_extent[..3]).length()
    }
}

#[repr(C)]
#[derive(Clone, Copy, Debug, bytemuck::Pod, bytemuck::Zeroable)]
struct SceneUniform {
    view_proj: [[f32; 4]; 4],
    view: [[f32; 4]; 4],
    light_dir: [f32; 4],
}

const _: [(); 144] = [(); core::mem::size_of::<SceneUniform>()];

fn cube_vertices() -> Vec<CubeVertex> {
    // (normal, tangent u, tangent v) per face
    let faces = [
        (Vec3::X, Vec3::Z, Vec3::Y),
        (Vec3::NEG_X, Vec3::NEG_Z, Vec3::Y),
        (Vec3::Y, Vec3::X, Vec3::Z),
        (Vec3::NEG_Y, Vec3::X, Vec3::NEG_Z),
        (Vec3::Z, Vec3::NEG_X, Vec3::Y),
        (Vec3::NEG_Z, Vec3::X, Vec3::Y),
    ];

    let mut out = Vec::with_capacity(36);
    for (n, u, v) in faces {
        let corner = |su: f32, sv: f32| CubeVertex {
            position: (n + u * su + v * sv).to_array(),
            normal: n.to_array(),
        };
        let quad = [
            corner(-1.0, -1.0),
            corner(1.0, -1.0),
            corner(1.0, 1.0),
            corner(-1.0, 1.0),
        ];
        // Winding is irrelevant: culling is off.
        out.extend_from_slice(&[quad[0], quad[1], quad[2], quad[0], quad[2], quad[3]]);
    }
    out
}

/// True when a sphere can touch the clip volume of `view_proj`.
fn sphere_visible(view_proj: &Mat4, center: Vec3, radius: f32) -> bool {
    let m = view_proj.transpose();
    let (r0, r1, r2, r3) = (m.x_axis, m.y_axis, m.z_axis, m.w_axis);
    // Gribb-Hartmann planes for 0..1 depth
    let planes = [r3 + r0, r3 - r0, r3 + r1, r3 - r1, r2, r3 - r2];
    let p = center.extend(1.0);
    planes.iter().all(|plane: &Vec4| {
        let len = plane.truncate().length();
        len <= 0.0 || plane.dot(p) / len >= -radius
    })
}

pub struct DemoScene {
    pipeline: wgpu::RenderPipeline,
    bind_group: wgpu::BindGroup,
    ubo: wgpu::Buffer,
    vbo: wgpu::Buffer,
    ibo: wgpu::Buffer,
    instances: Vec<CubeInstance>,
    visible: u32,
}

impl DemoScene {
    /// A ring of cubes above a ground slab, spread in depth so parallax is
    /// visible around the focal plane.
    pub fn new(device: &wgpu::Device) -> Self {
        let mut instances = vec![CubeInstance::new(
            Vec3::new(0.0, -1.6, 0.0),
            Vec3::new(4.0, 0.1, 4.0),
            [0.35, 0.38, 0.42, 1.0],
        )];
        let ring = 8;
        for i in 0..ring {
            let a = i as f32 / ring as f32 * std::f32::consts::TAU;
            let t = i as f32 / (ring - 1) as f32;
            instances.push(CubeInstance::new(
                Vec3::new(a.cos() * 2.5, -0.9 + t * 1.5, a.sin() * 2.5),
                Vec3::splat(0.45),
                [0.9 - 0.6 * t, 0.3 + 0.5 * t, 0.4 + 0.4 * t, 1.0],
            ));
        }
        Self::with_instances(device, instances)
    }

    pub fn with_instances(device: &wgpu::Device, instances: Vec<CubeInstance>) -> Self {
        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Demo Scene Layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: wgpu::BufferSize::new(std::mem::size_of::<SceneUniform>() as u64),
                },
                count: None,
            }],
        });

        let ubo = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Demo Scene UBO"),
            size: std::mem::size_of::<SceneUniform>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Demo Scene BG"),
            layout: &layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: ubo.as_entire_binding(),
            }],
        });

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Demo Scene WGSL"),
            source: wgpu::ShaderSource::Wgsl(SCENE_WGSL.into()),
        });

        let pipe_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Demo Scene PipelineLayout"),
            bind_group_layouts: &[&layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Demo Scene Pipeline"),
            layout: Some(&pipe_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: "vs_main",
                buffers: &[
                    wgpu::VertexBufferLayout {
                        array_stride: std::mem::size_of::<CubeVertex>() as u64,
                        step_mode: wgpu::VertexStepMode::Vertex,
                        attributes: &wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x3],
                    },
                    wgpu::VertexBufferLayout {
                        array_stride: std::mem::size_of::<CubeInstance>() as u64,
                        step_mode: wgpu::VertexStepMode::Instance,
                        attributes: &wgpu::vertex_attr_array![
                            2 => Float32x4,
                            3 => Float32x4,
                            4 => Float32x4
                        ],
                    },
                ],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: "fs_main",
                targets: &[
                    Some(wgpu::ColorTargetState {
                        format: TILE_COLOR_FORMAT,
                        blend: None,
                        write_mask: wgpu::ColorWrites::ALL,
                    }),
                    Some(wgpu::ColorTargetState {
                        format: TILE_LINEAR_DEPTH_FORMAT,
                        blend: None,
                        write_mask: wgpu::ColorWrites::ALL,
                    }),
                ],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            }),
            primitive: wgpu::PrimitiveState {
                cull_mode: None,
                ..Default::default()
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: TILE_DEPTH_FORMAT,
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::Less,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
        });

        let vbo = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Cube VBO"),
            contents: bytemuck::cast_slice(&cube_vertices()),
            usage: wgpu::BufferUsages::VERTEX,
        });

        let ibo = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Cube Instances"),
            size: (std::mem::size_of::<CubeInstance>() * instances.len().max(1)) as u64,
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        Self {
            pipeline,
            bind_group,
            ubo,
            vbo,
            ibo,
            instances,
            visible: 0,
        }
    }

    /// Instances that survived culling in the last `prepare`.
    #[inline]
    pub fn visible(&self) -> u32 {
        self.visible
    }
}

impl ScenePrimitive for DemoScene {
    fn prepare(&mut self, queue: &wgpu::Queue, view: &SceneView) {
        let cull = view.cull_proj * view.view;
        let visible: Vec<CubeInstance> = self
            .instances
            .iter()
            .filter(|i| sphere_visible(&cull, Vec3::from_slice(&i.center[..3]), i.bounding_radius()))
            .copied()
            .collect();

        let u = SceneUniform {
            view_proj: (view.proj * view.view).to_cols_array_2d(),
            view: view.view.to_cols_array_2d(),
            light_dir: Vec3::new(0.4, 1.0, 0.6).normalize().extend(0.0).to_array(),
        };
        queue.write_buffer(&self.ubo, 0, bytemuck::bytes_of(&u));
        if !visible.is_empty() {
            queue.write_buffer(&self.ibo, 0, bytemuck::cast_slice(&visible));
        }
        self.visible = visible.len() as u32;
    }

    fn draw<'a>(&'a self, pass: &mut wgpu::RenderPass<'a>) {
        if self.visible == 0 {
            return;
        }
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, &self.bind_group, &[]);
        pass.set_vertex_buffer(0, self.vbo.slice(..));
        pass.set_vertex_buffer(1, self.ibo.slice(..));
        pass.draw(0..36, 0..self.visible);
    }
}

const SCENE_WGSL: &str = r#"
struct Scene {
    view_proj: mat4x4<f32>,
    view: mat4x4<f32>,
    light_dir: vec4<f32>,
};
@group(0) @binding(0) var<uniform> S: Scene;

struct VSOut {
    @builtin(position) clip: vec4<f32>,
    @location(0) normal: vec3<f32>,
    @location(1) color: vec4<f32>,
    @location(2) view_depth: f32,
};

struct FSOut {
    @location(0) color: vec4<f32>,
    @location(1) view_depth: vec4<f32>,
};

@vertex
fn vs_main(
    @location(0) pos: vec3<f32>,
    @location(1) normal: vec3<f32>,
    @location(2) center: vec4<f32>,
    @location(3) half_extent: vec4<f32>,
    @location(4) color: vec4<f32>,
) -> VSOut {
    var out: VSOut;
    let world = center.xyz + pos * half_extent.xyz;
    out.clip = S.view_proj * vec4<f32>(world, 1.0);
    out.view_depth = -(S.view * vec4<f32>(world, 1.0)).z;
    out.normal = normal;
    out.color = color;
    return out;
}

@fragment
fn fs_main(in: VSOut) -> FSOut {
    let lambert = max(dot(normalize(in.normal), S.light_dir.xyz), 0.0);
    var out: FSOut;
    out.color = vec4<f32>(in.color.rgb * (0.25 + 0.75 * lambert), in.color.a);
    out.view_depth = vec4<f32>(in.view_depth, 0.0, 0.0, 0.0);
    return out;
}
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cube_has_six_faces() {
        let v = cube_vertices();
        assert_eq!(v.len(), 36);
        for vert in &v {
            let p = Vec3::from_array(vert.position);
            assert_eq!(p.abs().max_element(), 1.0);
            assert!(Vec3::from_array(vert.normal).dot(p) > 0.0);
        }
    }

    #[test]
    fn culls_outside_frustum() {
        let view = Mat4::look_at_rh(Vec3::new(0.0, 0.0, 10.0), Vec3::ZERO, Vec3::Y);
        let proj = Mat4::perspective_rh(30f32.to_radians(), 1.0, 0.1, 50.0);
        let vp = proj * view;

        assert!(sphere_visible(&vp, Vec3::ZERO, 0.5));
        assert!(!sphere_visible(&vp, Vec3::new(50.0, 0.0, 0.0), 0.5));
        assert!(!sphere_visible(&vp, Vec3::new(0.0, 0.0, 20.0), 0.5));
        // Straddling the edge still counts.
        let edge = 10.0 * 15f32.to_radians().tan();
        assert!(sphere_visible(&vp, Vec3::new(edge + 0.3, 0.0, 0.0), 0.5));
    }
}
