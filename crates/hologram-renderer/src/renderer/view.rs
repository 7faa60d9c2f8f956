//! Renders single views and places them into quilt tiles.

use super::pipelines::tile_copy::TileCopyPipeline;
use super::targets::{QuiltTargets, TargetPool, TileHandle};
use crate::scene::{ScenePrimitive, SceneView};
use glam::Mat4;
use quilt::{QuiltLayout, ViewShared};

pub struct ViewRenderer {
    tile_copy: TileCopyPipeline,
    /// Linear depth of empty texels: the far clip of the center view.
    far: f32,
    /// Tile kept alive after its copy so it can be fast-copied again.
    retained: Option<(u32, TileHandle)>,
}

impl ViewRenderer {
    pub fn new(device: &wgpu::Device) -> Self {
        Self {
            tile_copy: TileCopyPipeline::new(device),
            far: 1.0,
            retained: None,
        }
    }

    /// `far` is the center projection's far clip.
    pub fn begin_frame(&mut self, far: f32) {
        self.far = far;
        self.retained = None;
    }

    /// Renders `view_index` and copies it into its tile. With `retain` the
    /// tile target stays borrowed for later [`fast_copy`](Self::fast_copy)s.
    #[allow(clippy::too_many_arguments)]
    pub fn render_view(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        pool: &mut TargetPool,
        quilt: &QuiltTargets,
        layout: &QuiltLayout,
        shared: &ViewShared,
        cull_proj: Mat4,
        scene: &mut dyn ScenePrimitive,
        view_index: u32,
        retain: bool,
    ) {
        let handle = pool.acquire(device, layout.tile_width(), layout.tile_height());
        let Some(tile) = pool.get(handle) else {
            log::error!("Tile target for view {} vanished", view_index);
            return;
        };

        let m = shared.view_matrices(view_index);
        scene.prepare(
            queue,
            &SceneView {
                view: m.view,
                proj: m.proj,
                cull_proj,
                view_index,
            },
        );

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("View Encoder"),
        });
        {
            let mut rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("View Pass"),
                color_attachments: &[
                    Some(wgpu::RenderPassColorAttachment {
                        view: &tile.color,
                        resolve_target: None,
                        ops: wgpu::Operations {
                            load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                            store: wgpu::StoreOp::Store,
                        },
                    }),
                    Some(wgpu::RenderPassColorAttachment {
                        view: &tile.linear_depth,
                        resolve_target: None,
                        ops: wgpu::Operations {
                            load: wgpu::LoadOp::Clear(wgpu::Color {
                                r: self.far as f64,
                                g: 0.0,
                                b: 0.0,
                                a: 0.0,
                            }),
                            store: wgpu::StoreOp::Store,
                        },
                    }),
                ],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &tile.depth,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            scene.draw(&mut rpass);
        }
        self.tile_copy
            .copy(device, &mut encoder, tile, quilt, layout.tile_rect(view_index));
        queue.submit(Some(encoder.finish()));

        if retain {
            if let Some((_, old)) = self.retained.replace((view_index, handle)) {
                pool.release(old);
            }
        } else {
            pool.release(handle);
        }
    }

    /// Copies the retained view into `to`'s tile without rendering. Returns
    /// false when `from` is not the retained view.
    #[allow(clippy::too_many_arguments)]
    pub fn fast_copy(
        &self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        pool: &TargetPool,
        quilt: &QuiltTargets,
        layout: &QuiltLayout,
        from: u32,
        to: u32,
    ) -> bool {
        let tile = match self.retained {
            Some((view, handle)) if view == from => pool.get(handle),
            _ => None,
        };
        let Some(tile) = tile else {
            return false;
        };

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Fast Copy Encoder"),
        });
        self.tile_copy
            .copy(device, &mut encoder, tile, quilt, layout.tile_rect(to));
        queue.submit(Some(encoder.finish()));
        true
    }

    /// Releases everything borrowed this frame and empties the pool.
    pub fn end_frame(&mut self, pool: &mut TargetPool) {
        if let Some((_, handle)) = self.retained.take() {
            pool.release(handle);
        }
        pool.end_frame();
    }
}
