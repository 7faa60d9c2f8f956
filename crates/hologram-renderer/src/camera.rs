use glam::{Mat4, Vec3};
use quilt::Lens;
use winit::event::{ElementState, MouseButton, MouseScrollDelta, WindowEvent};

/// Orbiting hologram camera. The focal plane passes through `target`; the
/// camera sits `lens.distance()` away from it.
#[derive(Debug, Clone)]
pub struct Camera {
    // --- Orbital Parameters (Primary State) ---
    pub target: Vec3,
    /// Rotation around the world Y axis (radians).
    pub yaw_rad: f32,
    /// Elevation above the XZ plane (radians).
    pub pitch_rad: f32,

    pub lens: Lens,
    /// Aspect of the full-screen render the views are derived from.
    pub aspect: f32,
    /// Wider FOV used only for culling while quilt views render.
    cull_fov_deg: Option<f32>,

    // --- Derived Properties (Updated by `update()`) ---
    position: Vec3,
}

/// Camera state the quilt renderer changes while rendering views.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraSnapshot {
    lens: Lens,
    aspect: f32,
    cull_fov_deg: Option<f32>,
}

impl Camera {
    pub fn new(lens: Lens, aspect: f32) -> Self {
        let mut camera = Self {
            target: Vec3::ZERO,
            yaw_rad: 0.0,
            pitch_rad: 15f32.to_radians(),
            lens,
            aspect,
            cull_fov_deg: None,
            position: Vec3::ZERO, // placeholder
        };

        camera.update();
        camera
    }

    /// Recalculates the position from the orbital parameters. Call after
    /// changing any of them.
    pub fn update(&mut self) {
        let (sin_yaw, cos_yaw) = self.yaw_rad.sin_cos();
        let (sin_pitch, cos_pitch) = self.pitch_rad.sin_cos();
        let dir = Vec3::new(cos_pitch * sin_yaw, sin_pitch, cos_pitch * cos_yaw);
        self.position = self.target + dir * self.lens.distance();
    }

    /// False until the camera can produce finite matrices.
    pub fn is_initialized(&self) -> bool {
        self.lens.is_valid() && self.aspect.is_finite() && self.aspect > 0.0
    }

    #[inline]
    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn view(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.target, Vec3::Y)
    }

    pub fn proj(&self) -> Mat4 {
        self.lens.projection(self.aspect)
    }

    pub fn set_fov_deg(&mut self, fov_deg: f32) {
        self.lens.fov_deg = fov_deg;
        self.update();
    }

    /// Widens the culling frustum without moving the camera.
    pub fn set_cull_fov_deg(&mut self, fov_deg: f32) {
        self.cull_fov_deg = Some(fov_deg);
    }

    /// Projection used for culling: `proj()` unless a culling FOV is set.
    pub fn cull_proj(&self) -> Mat4 {
        match self.cull_fov_deg {
            Some(fov) => Mat4::perspective_rh(
                fov.to_radians(),
                self.aspect,
                self.lens.near(),
                self.lens.far(),
            ),
            None => self.proj(),
        }
    }

    pub fn snapshot(&self) -> CameraSnapshot {
        CameraSnapshot {
            lens: self.lens,
            aspect: self.aspect,
            cull_fov_deg: self.cull_fov_deg,
        }
    }

    pub fn restore(&mut self, snapshot: CameraSnapshot) {
        self.lens = snapshot.lens;
        self.aspect = snapshot.aspect;
        self.cull_fov_deg = snapshot.cull_fov_deg;
        self.update();
    }
}

#[derive(Default)]
pub struct CameraController {
    mouse_down: bool,
    last_mouse: Option<(f64, f64)>,
}

impl CameraController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Orbits on left-drag, resizes the focal plane on scroll.
    pub fn handle_event(&mut self, event: &WindowEvent, camera: &mut Camera) {
        match event {
            WindowEvent::MouseInput { button, state, .. } => {
                if *button == MouseButton::Left {
                    self.mouse_down = *state == ElementState::Pressed;
                }
            }
            WindowEvent::CursorMoved { position, .. } => {
                self.handle_cursor_orbit((position.x, position.y), camera);
            }
            WindowEvent::MouseWheel { delta, .. } => {
                let scroll = match delta {
                    MouseScrollDelta::LineDelta(_, y) => *y,
                    MouseScrollDelta::PixelDelta(pos) => pos.y as f32 / 120.0,
                };

                self.handle_scroll(scroll, camera);
            }
            _ => {}
        }
    }

    fn handle_scroll(&mut self, delta: f32, camera: &mut Camera) {
        // Scroll up shrinks the focal plane, which zooms in.
        camera.lens.size = (camera.lens.size * 1.1f32.powf(-delta)).clamp(0.1, 1000.0);
        camera.update();
    }

    fn handle_cursor_orbit(&mut self, xy: (f64, f64), camera: &mut Camera) {
        if let Some(last) = self.last_mouse {
            if self.mouse_down {
                let dx = ((xy.0 - last.0) * 0.005) as f32;
                let dy = ((xy.1 - last.1) * 0.005) as f32;

                camera.yaw_rad -= dx;
                camera.pitch_rad = (camera.pitch_rad + dy)
                    .clamp(-80f32.to_radians(), 80f32.to_radians());
                camera.update();
            }
        }
        self.last_mouse = Some(xy);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn sits_on_the_focal_distance() {
        let camera = Camera::new(Lens::default(), 0.75);
        assert_relative_eq!(
            camera.position().distance(camera.target),
            Lens::default().distance(),
            max_relative = 1e-5
        );
        assert!(camera.is_initialized());
    }

    #[test]
    fn snapshot_restores_widened_fov() {
        let mut camera = Camera::new(Lens::default(), 0.75);
        let before = (camera.view(), camera.proj());
        let snapshot = camera.snapshot();

        camera.set_fov_deg(54.0);
        camera.aspect = 1.6;
        assert_ne!(camera.proj(), before.1);

        camera.restore(snapshot);
        assert_eq!((camera.view(), camera.proj()), before);
    }

    #[test]
    fn culling_fov_leaves_view_alone() {
        let mut camera = Camera::new(Lens::default(), 0.75);
        let snapshot = camera.snapshot();
        let view = camera.view();
        assert_eq!(camera.cull_proj(), camera.proj());

        camera.set_cull_fov_deg(54.0);
        assert_eq!(camera.view(), view);
        assert_ne!(camera.cull_proj(), camera.proj());

        camera.restore(snapshot);
        assert_eq!(camera.cull_proj(), camera.proj());
    }

    #[test]
    fn zero_aspect_is_not_initialized() {
        let camera = Camera::new(Lens::default(), 0.0);
        assert!(!camera.is_initialized());
    }
}
