use crate::{
    camera::{Camera, CameraController},
    config::Config,
    registry::{CameraId, CameraRegistry},
    renderer::{
        context::GfxContext,
        pipelines::{lenticular::LenticularPass, tint::TintPass, validated},
        PostProcess, QuiltRenderer,
    },
    scene::DemoScene,
};
use anyhow::Result;
use quilt::{DisplayRegion, InterpolationMode};
use std::sync::Arc;
use winit::{
    event::{ElementState, WindowEvent},
    keyboard::{KeyCode, PhysicalKey},
    window::Window,
};

pub struct App {
    pub gfx: GfxContext,
    pub quilt: QuiltRenderer,
    pub lenticular: LenticularPass,
    pub scene: DemoScene,
    pub tint: TintPass,
    pub cameras: CameraRegistry,
    pub camera_id: CameraId,
    pub camera_controller: CameraController,
}

impl App {
    pub async fn new(window: Arc<Window>, config: &Config) -> Result<Self> {
        let gfx = GfxContext::new(window).await?;

        let calibration = config.load_calibration()?;
        let settings = config.settings();
        let quilt = QuiltRenderer::new(&gfx.device, calibration, settings.clone())?;
        log::info!(
            "Quilt {}x{}, {} views, interpolation {}",
            quilt.layout().quilt_width(),
            quilt.layout().quilt_height(),
            quilt.layout().tile_count(),
            settings.interpolation
        );

        let device = &gfx.device;
        let (lenticular, scene, tint) = validated(device, "display pipelines", || {
            (
                LenticularPass::new(device, gfx.config.format),
                DemoScene::new(device),
                TintPass::new(device, [1.0, 0.85, 0.7, 1.0]),
            )
        })?;

        let mut cameras = CameraRegistry::new();
        let camera_id = cameras.register(Camera::new(settings.lens, quilt.layout().render_aspect()));

        Ok(Self {
            gfx,
            quilt,
            lenticular,
            scene,
            tint,
            cameras,
            camera_id,
            camera_controller: CameraController::new(),
        })
    }

    pub fn resize(&mut self, new_size: winit::dpi::PhysicalSize<u32>) {
        self.gfx.resize(new_size);
    }

    /// Returns true when the event was consumed.
    pub fn handle_event(&mut self, event: &WindowEvent) -> bool {
        if let WindowEvent::KeyboardInput { event, .. } = event {
            if event.state == ElementState::Pressed && event.physical_key == PhysicalKey::Code(KeyCode::KeyI) {
                self.cycle_interpolation();
                return true;
            }
        }

        if let Some(camera) = self.cameras.get_mut(self.camera_id) {
            self.camera_controller.handle_event(event, camera);
        }

        if let WindowEvent::Resized(physical_size) = event {
            self.resize(*physical_size);
        }

        false
    }

    fn cycle_interpolation(&mut self) {
        let mut settings = self.quilt.settings().clone();
        let modes = InterpolationMode::ALL;
        let at = modes.iter().position(|&m| m == settings.interpolation).unwrap_or(0);
        settings.interpolation = modes[(at + 1) % modes.len()];
        log::info!("Interpolation: {}", settings.interpolation);
        self.quilt.set_settings(settings);
    }

    pub fn render(&mut self) -> Result<(), wgpu::SurfaceError> {
        let device = &self.gfx.device;
        let queue = &self.gfx.queue;

        if let Some(camera) = self.cameras.get_mut(self.camera_id) {
            let post: Option<&mut dyn PostProcess> = Some(&mut self.tint);
            let report = self.quilt.render(device, queue, camera, &mut self.scene, post);
            log::trace!("Quilt frame: {:?}", report);
        }

        let frame = self.gfx.surface.get_current_texture()?;
        let view = frame.texture.create_view(&wgpu::TextureViewDescriptor::default());

        let region = DisplayRegion::new(self.gfx.size.width as f32, self.gfx.size.height as f32);
        let params = self.quilt.lenticular_params(&region);

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Display Encoder"),
        });
        self.lenticular
            .draw(device, queue, &mut encoder, &view, self.quilt.quilt(), &params, &region);
        queue.submit(Some(encoder.finish()));
        frame.present();

        Ok(())
    }
}
