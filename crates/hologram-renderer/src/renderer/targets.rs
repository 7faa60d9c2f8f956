//! Quilt textures and the per-view render targets feeding them.

use quilt::QuiltLayout;

pub const QUILT_COLOR_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;
/// Linear view-space distance per texel; negative means "no sample".
pub const QUILT_DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::R32Float;

pub const TILE_COLOR_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;
/// Second color attachment of a view: view-space distance, written by the
/// scene. Depth buffers are only ever attached, never sampled.
pub const TILE_LINEAR_DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::R32Float;
pub const TILE_DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

fn create_tex(
    device: &wgpu::Device,
    label: &str,
    width: u32,
    height: u32,
    format: wgpu::TextureFormat,
    usage: wgpu::TextureUsages,
) -> wgpu::Texture {
    device.create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
        size: wgpu::Extent3d {
            width: width.max(1),
            height: height.max(1),
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format,
        usage,
        view_formats: &[],
    })
}

/// The quilt: color plus its depth companion. The only GPU state kept
/// across frames.
pub struct QuiltTargets {
    pub color_texture: wgpu::Texture,
    pub depth_texture: wgpu::Texture,

    pub color: wgpu::TextureView,
    pub depth: wgpu::TextureView,

    pub width: u32,
    pub height: u32,
}

impl QuiltTargets {
    pub fn new(device: &wgpu::Device, layout: &QuiltLayout) -> Self {
        let (width, height) = (layout.quilt_width(), layout.quilt_height());
        let usage = wgpu::TextureUsages::RENDER_ATTACHMENT
            | wgpu::TextureUsages::TEXTURE_BINDING
            | wgpu::TextureUsages::STORAGE_BINDING
            | wgpu::TextureUsages::COPY_SRC
            | wgpu::TextureUsages::COPY_DST;

        let color_texture = create_tex(device, "Quilt Color", width, height, QUILT_COLOR_FORMAT, usage);
        let depth_texture = create_tex(device, "Quilt Depth", width, height, QUILT_DEPTH_FORMAT, usage);

        log::info!("Allocated {}x{} quilt", width, height);

        Self {
            color: color_texture.create_view(&wgpu::TextureViewDescriptor::default()),
            depth: depth_texture.create_view(&wgpu::TextureViewDescriptor::default()),
            color_texture,
            depth_texture,
            width,
            height,
        }
    }

    #[inline]
    pub fn matches(&self, layout: &QuiltLayout) -> bool {
        self.width == layout.quilt_width() && self.height == layout.quilt_height()
    }

    #[inline]
    pub fn extent(&self) -> wgpu::Extent3d {
        wgpu::Extent3d {
            width: self.width,
            height: self.height,
            depth_or_array_layers: 1,
        }
    }

    /// Clears color to transparent black and depth to `far`.
    pub fn clear(&self, encoder: &mut wgpu::CommandEncoder, far: f32) {
        let _ = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Quilt Clear"),
            color_attachments: &[
                Some(wgpu::RenderPassColorAttachment {
                    view: &self.color,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                        store: wgpu::StoreOp::Store,
                    },
                }),
                Some(wgpu::RenderPassColorAttachment {
                    view: &self.depth,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color {
                            r: far as f64,
                            g: 0.0,
                            b: 0.0,
                            a: 0.0,
                        }),
                        store: wgpu::StoreOp::Store,
                    },
                }),
            ],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });
    }
}

/// Scratch targets for one view, sized to a tile.
pub struct TileTarget {
    _color_tex: wgpu::Texture,
    _linear_depth_tex: wgpu::Texture,
    _depth_tex: wgpu::Texture,

    pub color: wgpu::TextureView,
    pub linear_depth: wgpu::TextureView,
    pub depth: wgpu::TextureView,

    pub width: u32,
    pub height: u32,
}

impl TileTarget {
    pub fn new(device: &wgpu::Device, width: u32, height: u32) -> Self {
        let usage = wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING;
        let color_tex = create_tex(device, "Tile Color", width, height, TILE_COLOR_FORMAT, usage);
        let linear_depth_tex = create_tex(device, "Tile Linear Depth", width, height, TILE_LINEAR_DEPTH_FORMAT, usage);
        let depth_tex = create_tex(
            device,
            "Tile Depth",
            width,
            height,
            TILE_DEPTH_FORMAT,
            wgpu::TextureUsages::RENDER_ATTACHMENT,
        );

        Self {
            color: color_tex.create_view(&wgpu::TextureViewDescriptor::default()),
            linear_depth: linear_depth_tex.create_view(&wgpu::TextureViewDescriptor::default()),
            depth: depth_tex.create_view(&wgpu::TextureViewDescriptor::default()),
            _color_tex: color_tex,
            _linear_depth_tex: linear_depth_tex,
            _depth_tex: depth_tex,
            width,
            height,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileHandle(usize);

/// Frame-scoped arena of tile targets. Targets are borrowed for one view and
/// returned afterwards; everything is dropped by `end_frame`.
#[derive(Default)]
pub struct TargetPool {
    targets: Vec<(TileTarget, bool)>,
}

impl TargetPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn acquire(&mut self, device: &wgpu::Device, width: u32, height: u32) -> TileHandle {
        let free = self
            .targets
            .iter()
            .position(|(t, in_use)| !in_use && t.width == width && t.height == height);

        let index = match free {
            Some(index) => index,
            None => {
                self.targets.push((TileTarget::new(device, width, height), false));
                self.targets.len() - 1
            }
        };

        self.targets[index].1 = true;
        TileHandle(index)
    }

    pub fn release(&mut self, handle: TileHandle) {
        if let Some(slot) = self.targets.get_mut(handle.0) {
            slot.1 = false;
        }
    }

    pub fn get(&self, handle: TileHandle) -> Option<&TileTarget> {
        self.targets.get(handle.0).map(|(t, _)| t)
    }

    pub fn end_frame(&mut self) {
        self.targets.clear();
    }
}
