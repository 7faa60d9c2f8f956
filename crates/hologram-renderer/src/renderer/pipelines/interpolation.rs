//! Synthesizes skipped quilt tiles from their rendered neighbours.
//!
//! The quilt is copied to scratch textures, then a compute pass gathers each
//! interpolated tile from its two bracketing base tiles ("forward" from the
//! previous base, "backward" from the next one) and writes the result back
//! into the quilt. Texels neither base can supply are marked with a negative
//! depth and optionally filled by a second pass.
//!
//! With flicker reduction the views run one band each, in view order, and
//! the forward gather steps from the view just before instead of jumping
//! from the base. The scratch copy of that view's tile is refreshed between
//! bands. The scratch textures only live for one `run`.

use super::{storage_entry, texture_entry, uniform_entry, validated, GrowBuffer};
use crate::renderer::targets::{QuiltTargets, QUILT_COLOR_FORMAT, QUILT_DEPTH_FORMAT};
use quilt::{InterpolationPlan, QuiltLayout};

const WORKGROUP: u32 = 8;
/// Dynamic uniform offsets must be multiples of this.
const PARAMS_STRIDE: u64 = 256;
/// Widest hole the gap fill searches across, in texels.
const MAX_GAP: u32 = 32;

const FLAG_BLEND_VIEWS: u32 = 1;
const FLAG_REDUCE_FLICKER: u32 = 2;

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct InterpolationParams {
    pub tile_size: [u32; 2],
    pub view_offset: u32,
    pub view_count: u32,
    /// Converts `focal / depth - 1` into base-to-base shift in tile widths,
    /// before scaling by a view's parallax offset.
    pub depth_scale: f32,
    pub focal: f32,
    pub flags: u32,
    pub max_gap: u32,
}

const _: [(); 32] = [(); core::mem::size_of::<InterpolationParams>()];

/// Frame inputs the engine needs beyond the plan.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InterpolationFrame {
    pub focal: f32,
    pub size: f32,
    pub aspect: f32,
    pub view_cone_deg: f32,
    pub blend_views: bool,
    pub reduce_flicker: bool,
    pub fill_gaps: bool,
}

impl InterpolationFrame {
    /// `parallax_offset` uses `tan(cone)` while the cameras actually travel
    /// `2 * tan(cone / 2)`; the ratio is folded in here.
    pub fn depth_scale(&self) -> f32 {
        let cone = self.view_cone_deg.to_radians();
        let tan_cone = cone.tan();
        if tan_cone.abs() < 1e-6 || self.size <= 0.0 || self.aspect <= 0.0 {
            return 0.0;
        }
        let proj_modifier = 1.0 / (self.size * self.aspect);
        -self.focal * proj_modifier * (cone * 0.5).tan() / tan_cone
    }

    fn flags(&self) -> u32 {
        let mut flags = 0;
        if self.blend_views {
            flags |= FLAG_BLEND_VIEWS;
        }
        if self.reduce_flicker {
            flags |= FLAG_REDUCE_FLICKER;
        }
        flags
    }
}

/// `(view_offset, view_count)` per params slot. Flicker reduction gets one
/// band per view, in view order; the last band always covers every view.
fn bands(count: u32, reduce_flicker: bool) -> Vec<(u32, u32)> {
    let mut bands = Vec::with_capacity(count as usize + 1);
    if reduce_flicker {
        bands.extend((0..count).map(|i| (i, 1)));
    }
    bands.push((0, count));
    bands
}

struct Scratch {
    color_tex: wgpu::Texture,
    depth_tex: wgpu::Texture,
    color: wgpu::TextureView,
    depth: wgpu::TextureView,
}

impl Scratch {
    fn new(device: &wgpu::Device, width: u32, height: u32) -> Self {
        let make = |label: &str, format| {
            device.create_texture(&wgpu::TextureDescriptor {
                label: Some(label),
                size: wgpu::Extent3d {
                    width,
                    height,
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format,
                usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
                view_formats: &[],
            })
        };
        let color_tex = make("Interpolation Scratch Color", QUILT_COLOR_FORMAT);
        let depth_tex = make("Interpolation Scratch Depth", QUILT_DEPTH_FORMAT);

        Self {
            color: color_tex.create_view(&wgpu::TextureViewDescriptor::default()),
            depth: depth_tex.create_view(&wgpu::TextureViewDescriptor::default()),
            color_tex,
            depth_tex,
        }
    }

    fn capture(&self, encoder: &mut wgpu::CommandEncoder, quilt: &QuiltTargets) {
        self.capture_region(encoder, quilt, [0, 0], quilt.extent());
    }

    fn capture_tile(&self, encoder: &mut wgpu::CommandEncoder, quilt: &QuiltTargets, layout: &QuiltLayout, origin: [u32; 2]) {
        let extent = wgpu::Extent3d {
            width: layout.tile_width(),
            height: layout.tile_height(),
            depth_or_array_layers: 1,
        };
        self.capture_region(encoder, quilt, origin, extent);
    }

    fn capture_region(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        quilt: &QuiltTargets,
        origin: [u32; 2],
        extent: wgpu::Extent3d,
    ) {
        for (src, dst) in [
            (&quilt.color_texture, &self.color_tex),
            (&quilt.depth_texture, &self.depth_tex),
        ] {
            encoder.copy_texture_to_texture(texel_at(src, origin), texel_at(dst, origin), extent);
        }
    }
}

fn texel_at(texture: &wgpu::Texture, origin: [u32; 2]) -> wgpu::ImageCopyTexture<'_> {
    wgpu::ImageCopyTexture {
        texture,
        mip_level: 0,
        origin: wgpu::Origin3d {
            x: origin[0],
            y: origin[1],
            z: 0,
        },
        aspect: wgpu::TextureAspect::All,
    }
}

pub struct InterpolationEngine {
    interpolate: wgpu::ComputePipeline,
    fill_gaps: wgpu::ComputePipeline,
    layout: wgpu::BindGroupLayout,

    base_positions: GrowBuffer,
    interp_positions: GrowBuffer,
    offsets: GrowBuffer,
    params: GrowBuffer,
}

impl InterpolationEngine {
    /// `None` when the device rejects the compute shader.
    pub fn new(device: &wgpu::Device) -> Option<Self> {
        match validated(device, "interpolation pipelines", || Self::create(device)) {
            Ok(engine) => Some(engine),
            Err(err) => {
                log::warn!("View interpolation unavailable: {:#}", err);
                None
            }
        }
    }

    fn create(device: &wgpu::Device) -> Self {
        let compute = wgpu::ShaderStages::COMPUTE;
        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Interpolation Layout"),
            entries: &[
                texture_entry(0, compute, wgpu::TextureSampleType::Float { filterable: false }),
                texture_entry(1, compute, wgpu::TextureSampleType::Float { filterable: false }),
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: compute,
                    ty: wgpu::BindingType::StorageTexture {
                        access: wgpu::StorageTextureAccess::WriteOnly,
                        format: QUILT_COLOR_FORMAT,
                        view_dimension: wgpu::TextureViewDimension::D2,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 3,
                    visibility: compute,
                    ty: wgpu::BindingType::StorageTexture {
                        access: wgpu::StorageTextureAccess::WriteOnly,
                        format: QUILT_DEPTH_FORMAT,
                        view_dimension: wgpu::TextureViewDimension::D2,
                    },
                    count: None,
                },
                storage_entry(4, compute),
                storage_entry(5, compute),
                storage_entry(6, compute),
                uniform_entry(7, compute, std::mem::size_of::<InterpolationParams>() as u64, true),
            ],
        });

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Interpolation WGSL"),
            source: wgpu::ShaderSource::Wgsl(INTERPOLATE_WGSL.into()),
        });

        let pipe_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Interpolation PipelineLayout"),
            bind_group_layouts: &[&layout],
            push_constant_ranges: &[],
        });

        let make = |label: &str, entry_point: &str| {
            device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                label: Some(label),
                layout: Some(&pipe_layout),
                module: &shader,
                entry_point,
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            })
        };

        let storage = wgpu::BufferUsages::STORAGE;
        Self {
            interpolate: make("Interpolate Pipeline", "interpolate"),
            fill_gaps: make("Fill Gaps Pipeline", "fill_gaps"),
            layout,
            base_positions: GrowBuffer::new(device, "Base Positions", 8, storage),
            interp_positions: GrowBuffer::new(device, "Interpolated Positions", 16, storage),
            offsets: GrowBuffer::new(device, "Interpolation Offsets", 8, storage),
            params: GrowBuffer::new(device, "Interpolation Params", PARAMS_STRIDE, wgpu::BufferUsages::UNIFORM),
        }
    }

    /// Makes room for the worst case of `layout` up front.
    pub fn reserve(&mut self, device: &wgpu::Device, layout: &QuiltLayout) {
        let n = layout.tile_count() as u64;
        self.base_positions.reserve(device, n);
        self.interp_positions.reserve(device, n);
        self.offsets.reserve(device, n);
        // One band per view plus the band covering all of them.
        self.params.reserve(device, n + 1);
    }

    /// Interpolates every view in `plan` and submits the work. Returns the
    /// number of views synthesized.
    pub fn run(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        quilt: &QuiltTargets,
        layout: &QuiltLayout,
        plan: &InterpolationPlan,
        frame: &InterpolationFrame,
    ) -> u32 {
        if plan.is_empty() {
            return 0;
        }

        // --- Upload ---
        let base: Vec<[u32; 2]> = plan.base_positions.clone();
        let positions: Vec<[u32; 4]> = plan
            .views
            .iter()
            .map(|v| [v.position[0], v.position[1], v.prev_slot, v.next_slot])
            .collect();
        let offsets: Vec<[f32; 2]> = plan.views.iter().map(|v| [v.parallax_offset, v.lerp]).collect();

        self.base_positions.upload(device, queue, bytemuck::cast_slice(&base));
        self.interp_positions.upload(device, queue, bytemuck::cast_slice(&positions));
        self.offsets.upload(device, queue, bytemuck::cast_slice(&offsets));

        let count = plan.interpolated_count();
        let bands = bands(count, frame.reduce_flicker);
        let all = bands.len() - 1;

        let mut params = vec![0u8; bands.len() * PARAMS_STRIDE as usize];
        for (i, &(view_offset, view_count)) in bands.iter().enumerate() {
            let p = InterpolationParams {
                tile_size: [layout.tile_width(), layout.tile_height()],
                view_offset,
                view_count,
                depth_scale: frame.depth_scale(),
                focal: frame.focal,
                flags: frame.flags(),
                max_gap: MAX_GAP,
            };
            let at = i * PARAMS_STRIDE as usize;
            params[at..at + std::mem::size_of::<InterpolationParams>()]
                .copy_from_slice(bytemuck::bytes_of(&p));
        }
        self.params.upload(device, queue, &params);

        let scratch = Scratch::new(device, quilt.width, quilt.height);
        let bind_group = self.bind_group(device, &scratch, quilt);
        let groups = (
            layout.tile_width().div_ceil(WORKGROUP),
            layout.tile_height().div_ceil(WORKGROUP),
        );

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Interpolation Encoder"),
        });
        scratch.capture(&mut encoder, quilt);
        if frame.reduce_flicker {
            for (band, view) in plan.views.iter().enumerate() {
                if let Some(prev) = band.checked_sub(1).and_then(|b| plan.views.get(b)) {
                    scratch.capture_tile(&mut encoder, quilt, layout, prev.position);
                }
                let label = format!("Interpolate View {}", view.view_index);
                self.dispatch(&mut encoder, &self.interpolate, &bind_group, band, 1, groups, &label);
            }
        } else {
            self.dispatch(&mut encoder, &self.interpolate, &bind_group, all, count, groups, "Interpolate Views");
        }

        if frame.fill_gaps {
            scratch.capture(&mut encoder, quilt);
            self.dispatch(&mut encoder, &self.fill_gaps, &bind_group, all, count, groups, "Fill Gaps");
        }
        queue.submit(Some(encoder.finish()));

        count
    }

    #[allow(clippy::too_many_arguments)]
    fn dispatch(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        pipeline: &wgpu::ComputePipeline,
        bind_group: &wgpu::BindGroup,
        band: usize,
        view_count: u32,
        groups: (u32, u32),
        label: &str,
    ) {
        let mut cpass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: Some(label),
            timestamp_writes: None,
        });
        cpass.set_pipeline(pipeline);
        cpass.set_bind_group(0, bind_group, &[(band as u64 * PARAMS_STRIDE) as u32]);
        cpass.dispatch_workgroups(groups.0, groups.1, view_count);
    }

    fn bind_group(&self, device: &wgpu::Device, scratch: &Scratch, quilt: &QuiltTargets) -> wgpu::BindGroup {
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Interpolation BG"),
            layout: &self.layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&scratch.color),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(&scratch.depth),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::TextureView(&quilt.color),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: wgpu::BindingResource::TextureView(&quilt.depth),
                },
                wgpu::BindGroupEntry {
                    binding: 4,
                    resource: self.base_positions.buffer().as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 5,
                    resource: self.interp_positions.buffer().as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 6,
                    resource: self.offsets.buffer().as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 7,
                    resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                        buffer: self.params.buffer(),
                        offset: 0,
                        size: wgpu::BufferSize::new(std::mem::size_of::<InterpolationParams>() as u64),
                    }),
                },
            ],
        })
    }
}

const INTERPOLATE_WGSL: &str = r#"
struct Params {
    tile_size: vec2<u32>,
    view_offset: u32,
    view_count: u32,
    depth_scale: f32,
    focal: f32,
    flags: u32,
    max_gap: u32,
};

const BLEND_VIEWS: u32 = 1u;
const REDUCE_FLICKER: u32 = 2u;
const HOLE: f32 = -1.0;
// Relative depth difference under which both bases see the same surface.
const SAME_SURFACE: f32 = 0.02;

@group(0) @binding(0) var src_color: texture_2d<f32>;
@group(0) @binding(1) var src_depth: texture_2d<f32>;
@group(0) @binding(2) var dst_color: texture_storage_2d<rgba8unorm, write>;
@group(0) @binding(3) var dst_depth: texture_storage_2d<r32float, write>;
@group(0) @binding(4) var<storage, read> base_positions: array<vec2<u32>>;
// xy = tile origin, z = previous base slot, w = next base slot
@group(0) @binding(5) var<storage, read> interp_positions: array<vec4<u32>>;
// x = parallax offset, y = lerp toward the next base
@group(0) @binding(6) var<storage, read> offsets: array<vec2<f32>>;
@group(0) @binding(7) var<uniform> P: Params;

struct Sample {
    color: vec4<f32>,
    depth: f32,
    valid: bool,
};

fn no_sample() -> Sample {
    return Sample(vec4<f32>(0.0), HOLE, false);
}

// Base-to-base shift of a texel at `depth`, in tile widths per unit parallax.
fn disparity(depth: f32) -> f32 {
    return P.depth_scale * (P.focal / max(depth, 1e-4) - 1.0);
}

// Fetches the texel of base tile `origin` that lands on `p` after moving
// `travel` of the way toward the other base.
fn gather(origin: vec2<u32>, p: vec2<i32>, travel: f32, parallax: f32) -> Sample {
    let o = vec2<i32>(origin);
    let width = f32(P.tile_size.x);
    var q = p;
    var d = textureLoad(src_depth, o + p, 0).r;
    // Two refinement steps: the shift depends on the depth found at the source.
    for (var i = 0; i < 2; i++) {
        let shift = travel * parallax * disparity(d) * width;
        q = vec2<i32>(i32(round(f32(p.x) - shift)), p.y);
        if (q.x < 0 || q.x >= i32(P.tile_size.x)) {
            return no_sample();
        }
        d = textureLoad(src_depth, o + q, 0).r;
    }
    if (d < 0.0) {
        return no_sample();
    }
    return Sample(textureLoad(src_color, o + q, 0), d, true);
}

fn eased(t: f32) -> f32 {
    if ((P.flags & REDUCE_FLICKER) != 0u) {
        return smoothstep(0.0, 1.0, t);
    }
    return t;
}

@compute @workgroup_size(8, 8, 1)
fn interpolate(@builtin(global_invocation_id) gid: vec3<u32>) {
    if (gid.x >= P.tile_size.x || gid.y >= P.tile_size.y || gid.z >= P.view_count) {
        return;
    }
    let slot = P.view_offset + gid.z;
    let dst_view = interp_positions[slot];
    let parallax = offsets[slot].x;
    let t = eased(offsets[slot].y);

    var fwd_origin = base_positions[dst_view.z];
    var fwd_travel = t;
    // Step from the previous view of the same gap; its band already ran.
    if ((P.flags & REDUCE_FLICKER) != 0u && slot > 0u && interp_positions[slot - 1u].z == dst_view.z) {
        fwd_origin = interp_positions[slot - 1u].xy;
        fwd_travel = t - eased(offsets[slot - 1u].y);
    }

    let p = vec2<i32>(gid.xy);
    let fwd = gather(fwd_origin, p, fwd_travel, parallax);
    let back = gather(base_positions[dst_view.w], p, t - 1.0, parallax);

    var color = vec4<f32>(0.0);
    var depth = HOLE;
    if (fwd.valid && back.valid) {
        let same = abs(fwd.depth - back.depth) <= SAME_SURFACE * min(fwd.depth, back.depth);
        if (same && (P.flags & BLEND_VIEWS) != 0u) {
            color = mix(fwd.color, back.color, t);
            depth = mix(fwd.depth, back.depth, t);
        } else if (fwd.depth <= back.depth) {
            color = fwd.color;
            depth = fwd.depth;
        } else {
            color = back.color;
            depth = back.depth;
        }
    } else if (fwd.valid) {
        color = fwd.color;
        depth = fwd.depth;
    } else if (back.valid) {
        color = back.color;
        depth = back.depth;
    }

    let out = vec2<i32>(dst_view.xy) + p;
    textureStore(dst_color, out, color);
    textureStore(dst_depth, out, vec4<f32>(depth, 0.0, 0.0, 0.0));
}

// Fills holes from the nearest valid texel on the same row, preferring the
// farther of the two candidates so disocclusions take the background.
@compute @workgroup_size(8, 8, 1)
fn fill_gaps(@builtin(global_invocation_id) gid: vec3<u32>) {
    if (gid.x >= P.tile_size.x || gid.y >= P.tile_size.y || gid.z >= P.view_count) {
        return;
    }
    let origin = vec2<i32>(interp_positions[P.view_offset + gid.z].xy);
    let p = vec2<i32>(gid.xy);
    let here = origin + p;
    if (textureLoad(src_depth, here, 0).r >= 0.0) {
        return;
    }

    let width = i32(P.tile_size.x);
    for (var r = 1; r <= i32(P.max_gap); r++) {
        var best_depth = HOLE;
        var best = vec4<f32>(0.0);
        let left = p.x - r;
        let right = p.x + r;
        if (left >= 0) {
            let at = origin + vec2<i32>(left, p.y);
            let d = textureLoad(src_depth, at, 0).r;
            if (d >= 0.0) {
                best_depth = d;
                best = textureLoad(src_color, at, 0);
            }
        }
        if (right < width) {
            let at = origin + vec2<i32>(right, p.y);
            let d = textureLoad(src_depth, at, 0).r;
            if (d >= 0.0 && d > best_depth) {
                best_depth = d;
                best = textureLoad(src_color, at, 0);
            }
        }
        if (best_depth >= 0.0) {
            textureStore(dst_color, here, best);
            textureStore(dst_depth, here, vec4<f32>(best_depth, 0.0, 0.0, 0.0));
            return;
        }
    }
}
"#;
