//! Quilt rendering, one frame at a time.
//!
//! [`QuiltRenderer::render`] walks the frame phases in order:
//!
//! 1. PreparingFrame: apply calibration/settings changes, validate the
//!    camera, build the shared view state and clear the quilt.
//! 2. RenderingViews: execute the [`FramePlan`] (render, fast-copy or skip
//!    each tile).
//! 3. Interpolating: synthesize skipped tiles, when the plan has any.
//! 4. Compositing: restore the camera, run the post-process with the quilt's
//!    alpha preserved.
//!
//! Nothing is retried. A stage that cannot run logs and the frame continues
//! with whatever the earlier stages produced.

pub mod context;
pub mod pipelines;
pub mod targets;
pub mod view;

use crate::camera::Camera;
use crate::scene::ScenePrimitive;
use anyhow::Result;
use pipelines::alpha::AlphaPreservePass;
use pipelines::interpolation::{InterpolationEngine, InterpolationFrame};
use pipelines::validated;
use quilt::view::culling_fov_deg;
use quilt::{
    BinderOptions, Calibration, DirtyFlags, DisplayRegion, FramePhase, FramePlan, FrameStep,
    InterpolationPlan, LenticularParams, QuiltLayout, RenderSettings, ViewCone, ViewShared,
};
use targets::{QuiltTargets, TargetPool};
use view::ViewRenderer;

/// Told synchronously whenever the quilt layout is re-derived. Handlers
/// may run more than once for the same layout.
pub trait QuiltObserver {
    fn quilt_changed(&mut self, layout: &QuiltLayout, calibration: &Calibration);
}

/// Effect applied to the finished quilt. May write RGB freely; alpha is
/// restored afterwards.
pub trait PostProcess {
    fn process(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        encoder: &mut wgpu::CommandEncoder,
        quilt: &QuiltTargets,
    );
}

/// What one call to [`QuiltRenderer::render`] did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameReport {
    pub rendered: u32,
    pub copied: u32,
    pub interpolated: u32,
    /// Views left to interpolation, whether or not it ran.
    pub skipped: u32,
    /// The view cone was zero; every view is identical.
    pub degenerate: bool,
    /// Nothing was rendered this frame.
    pub frame_skipped: bool,
}

pub struct QuiltRenderer {
    calibration: Calibration,
    settings: RenderSettings,
    layout: QuiltLayout,
    max_texture_size: u32,
    dirty: DirtyFlags,

    targets: Option<QuiltTargets>,
    pool: TargetPool,
    views: ViewRenderer,
    interpolation: Option<InterpolationEngine>,
    alpha: AlphaPreservePass,

    observers: Vec<Box<dyn QuiltObserver>>,
    phase: FramePhase,
    ready: bool,
}

impl QuiltRenderer {
    /// Fails when the device rejects one of the pipelines every frame needs.
    /// Interpolation is optional and only logged when unavailable.
    pub fn new(device: &wgpu::Device, calibration: Calibration, settings: RenderSettings) -> Result<Self> {
        let (views, alpha) = validated(device, "quilt pipelines", || {
            (ViewRenderer::new(device), AlphaPreservePass::new(device))
        })?;
        let interpolation = InterpolationEngine::new(device);
        if interpolation.is_none() {
            log::warn!("Skipped views will stay empty on this device");
        }

        Ok(Self {
            layout: settings.resolve_layout(&calibration),
            calibration,
            settings,
            max_texture_size: device.limits().max_texture_dimension_2d,
            dirty: DirtyFlags::all(),
            targets: None,
            pool: TargetPool::new(),
            views,
            interpolation,
            alpha,
            observers: Vec::new(),
            phase: FramePhase::Idle,
            ready: false,
        })
    }

    #[inline]
    pub fn layout(&self) -> &QuiltLayout {
        &self.layout
    }

    #[inline]
    pub fn calibration(&self) -> &Calibration {
        &self.calibration
    }

    #[inline]
    pub fn settings(&self) -> &RenderSettings {
        &self.settings
    }

    #[inline]
    pub fn phase(&self) -> FramePhase {
        self.phase
    }

    /// The finished quilt, or `None` until a frame has completed.
    pub fn quilt(&self) -> Option<&QuiltTargets> {
        self.targets.as_ref().filter(|_| self.ready)
    }

    /// Takes effect at the start of the next frame.
    pub fn set_calibration(&mut self, calibration: Calibration) {
        if calibration != self.calibration {
            self.calibration = calibration;
            self.dirty.mark_calibration();
        }
    }

    /// Takes effect at the start of the next frame.
    pub fn set_settings(&mut self, settings: RenderSettings) {
        if settings.quilt_override != self.settings.quilt_override {
            self.dirty.mark_quilt();
        }
        self.settings = settings;
    }

    pub fn add_observer(&mut self, observer: Box<dyn QuiltObserver>) {
        self.observers.push(observer);
    }

    pub fn lenticular_params(&self, region: &DisplayRegion) -> LenticularParams {
        let options = BinderOptions {
            preview_2d: self.settings.preview_2d,
            editor_center_offset: None,
        };
        quilt::lenticular::bind(&self.calibration, &self.layout, region, &options)
    }

    fn advance(&mut self, to: FramePhase) {
        debug_assert!(
            self.phase.can_advance_to(to),
            "illegal frame phase transition {:?} -> {:?}",
            self.phase,
            to
        );
        self.phase = to;
    }

    /// Re-derives the layout and reallocates the quilt if anything changed.
    fn apply_changes(&mut self, device: &wgpu::Device) {
        let dirty = self.dirty.take();
        if dirty.any() {
            let wanted = self.settings.resolve_layout(&self.calibration);
            self.layout = clamp_to_device(wanted, self.max_texture_size);
            if self.layout != wanted {
                log::warn!(
                    "Quilt {}x{} exceeds the device limit of {}; clamped to {}x{}",
                    wanted.quilt_width(),
                    wanted.quilt_height(),
                    self.max_texture_size,
                    self.layout.quilt_width(),
                    self.layout.quilt_height()
                );
            }
            if let Some(engine) = self.interpolation.as_mut() {
                engine.reserve(device, &self.layout);
            }
            for observer in &mut self.observers {
                observer.quilt_changed(&self.layout, &self.calibration);
            }
        }

        let stale = self.targets.as_ref().map_or(true, |t| !t.matches(&self.layout));
        if stale {
            self.targets = Some(QuiltTargets::new(device, &self.layout));
            self.ready = false;
        }
    }

    /// Renders one quilt from `camera`. The camera is returned unchanged.
    pub fn render(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        camera: &mut Camera,
        scene: &mut dyn ScenePrimitive,
        post: Option<&mut dyn PostProcess>,
    ) -> FrameReport {
        let mut report = FrameReport::default();

        // --- PreparingFrame ---
        self.advance(FramePhase::PreparingFrame);
        self.apply_changes(device);

        if !camera.is_initialized() || !self.calibration.is_valid() {
            log::warn!("Hologram camera or calibration not ready; skipping quilt frame");
            self.ready = false;
            report.frame_skipped = true;
            self.advance(FramePhase::Idle);
            return report;
        }

        let lens = camera.lens;
        let aspect = self.layout.render_aspect();
        let cone = ViewCone {
            size: lens.size,
            aspect,
            focal_plane: lens.distance(),
            view_cone_deg: self.calibration.view_cone,
            depthiness: self.settings.depthiness,
            tile_count: self.layout.tile_count(),
        };
        let shared = ViewShared::new(camera.view(), lens.projection(aspect), cone);
        if shared.is_degenerate() {
            log::error!("View cone is 0; all views will be identical");
            report.degenerate = true;
        }

        let plan = FramePlan::build(&self.layout, self.settings.interpolation, self.settings.debug_view);
        let Self {
            layout,
            calibration,
            settings,
            targets,
            pool,
            views,
            interpolation,
            alpha,
            ..
        } = self;
        let Some(quilt) = targets.as_ref() else {
            self.ready = false;
            report.frame_skipped = true;
            self.advance(FramePhase::Idle);
            return report;
        };

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Quilt Clear Encoder"),
        });
        quilt.clear(&mut encoder, lens.far());
        queue.submit(Some(encoder.finish()));

        let snapshot = camera.snapshot();
        camera.aspect = aspect;
        camera.set_cull_fov_deg(culling_fov_deg(lens.fov_deg, cone.view_cone_deg));
        let cull_proj = camera.cull_proj();

        // --- RenderingViews ---
        self.phase = advance_checked(self.phase, FramePhase::RenderingViews);
        views.begin_frame(lens.far());
        let retain = settings.debug_view.map_or(false, |d| d.fast_copy);
        for step in &plan.steps {
            match *step {
                FrameStep::Render { view_index } => {
                    views.render_view(
                        device, queue, pool, quilt, layout, &shared, cull_proj, scene, view_index, retain,
                    );
                    report.rendered += 1;
                }
                FrameStep::FastCopy { from, to } => {
                    if views.fast_copy(device, queue, pool, quilt, layout, from, to) {
                        report.copied += 1;
                    } else {
                        log::warn!("No retained tile for view {}; tile {} left empty", from, to);
                    }
                }
                FrameStep::SkipInterpolated { .. } => report.skipped += 1,
            }
        }
        views.end_frame(pool);

        // --- Interpolating ---
        if plan.interpolate {
            self.phase = advance_checked(self.phase, FramePhase::Interpolating);
            match interpolation.as_mut() {
                Some(engine) => {
                    let interp = InterpolationPlan::build(layout, settings.interpolation, calibration.view_cone);
                    let frame = InterpolationFrame {
                        focal: lens.distance(),
                        size: lens.size,
                        aspect,
                        view_cone_deg: calibration.view_cone,
                        blend_views: settings.blend_views,
                        reduce_flicker: settings.reduce_flicker,
                        fill_gaps: settings.fill_gaps,
                    };
                    report.interpolated = engine.run(device, queue, quilt, layout, &interp, &frame);
                }
                None => log::warn!(
                    "Interpolation engine unavailable; {} tiles left empty",
                    report.skipped
                ),
            }
        }

        // --- Compositing ---
        self.phase = advance_checked(self.phase, FramePhase::Compositing);
        camera.restore(snapshot);

        if let Some(post) = post.filter(|_| settings.post_processing) {
            let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Post Process Encoder"),
            });
            let saved = alpha.save(device, &mut encoder, quilt);
            post.process(device, queue, &mut encoder, quilt);
            alpha.restore(device, &mut encoder, quilt, &saved);
            queue.submit(Some(encoder.finish()));
            drop(saved);
        }

        self.ready = true;
        self.advance(FramePhase::Idle);
        report
    }
}

/// `advance` for call sites that hold split borrows of the renderer.
fn advance_checked(from: FramePhase, to: FramePhase) -> FramePhase {
    debug_assert!(
        from.can_advance_to(to),
        "illegal frame phase transition {:?} -> {:?}",
        from,
        to
    );
    to
}

/// Shrinks the quilt to fit `max` without touching the grid.
fn clamp_to_device(layout: QuiltLayout, max: u32) -> QuiltLayout {
    if layout.quilt_width() <= max && layout.quilt_height() <= max {
        return layout;
    }
    QuiltLayout::new(
        layout.quilt_width().min(max),
        layout.quilt_height().min(max),
        layout.columns(),
        layout.rows(),
        layout.render_aspect(),
    )
    .with_tile_count(layout.tile_count())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_clamp_keeps_grid() {
        let big = QuiltLayout::new(16384, 8192, 8, 6, 0.75).with_tile_count(45);
        let clamped = clamp_to_device(big, 8192);
        assert_eq!(clamped.quilt_width(), 8192);
        assert_eq!(clamped.quilt_height(), 8192);
        assert_eq!((clamped.columns(), clamped.rows()), (8, 6));
        assert_eq!(clamped.tile_count(), 45);

        let small = QuiltLayout::default();
        assert_eq!(clamp_to_device(small, 8192), small);
    }

    #[test]
    fn phase_walk_is_legal() {
        let mut phase = FramePhase::Idle;
        for to in [
            FramePhase::PreparingFrame,
            FramePhase::RenderingViews,
            FramePhase::Interpolating,
            FramePhase::Compositing,
            FramePhase::Idle,
        ] {
            phase = advance_checked(phase, to);
        }
        assert_eq!(phase, FramePhase::Idle);
    }
}
