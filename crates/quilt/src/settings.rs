//! User-facing render settings for one hologram camera.

use crate::calibration::Calibration;
use crate::interpolation::InterpolationMode;
use crate::layout::QuiltLayout;
use crate::plan::DebugView;
use glam::Mat4;

/// Lens of the hologram camera. `size` is the half-height of the focal plane
/// in world units; the camera sits far enough back for `fov_deg` to frame it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Lens {
    pub size: f32,
    pub fov_deg: f32,
    pub near_clip_factor: f32,
    pub far_clip_factor: f32,
}

impl Default for Lens {
    fn default() -> Self {
        Self {
            size: 5.0,
            fov_deg: 14.0,
            near_clip_factor: 1.5,
            far_clip_factor: 4.0,
        }
    }
}

impl Lens {
    pub fn is_valid(&self) -> bool {
        self.size.is_finite()
            && self.size > 0.0
            && self.fov_deg.is_finite()
            && self.fov_deg > 0.0
            && self.fov_deg < 180.0
    }

    /// Distance from the camera to the focal plane.
    pub fn distance(&self) -> f32 {
        self.size / (self.fov_deg.to_radians() * 0.5).tan()
    }

    pub fn near(&self) -> f32 {
        (self.distance() - self.size * self.near_clip_factor).max(0.01)
    }

    pub fn far(&self) -> f32 {
        self.distance() + self.size * self.far_clip_factor
    }

    /// Center-view projection with 0..1 depth.
    pub fn projection(&self, aspect: f32) -> Mat4 {
        Mat4::perspective_rh(self.fov_deg.to_radians(), aspect, self.near(), self.far())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RenderSettings {
    pub lens: Lens,
    /// Z scale around the focal plane; 1 leaves the scene untouched.
    pub depthiness: f32,
    pub interpolation: InterpolationMode,
    pub blend_views: bool,
    pub reduce_flicker: bool,
    pub fill_gaps: bool,
    pub post_processing: bool,
    pub preview_2d: bool,
    pub debug_view: Option<DebugView>,
    /// Replaces the device's factory quilt when set.
    pub quilt_override: Option<QuiltLayout>,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            lens: Lens::default(),
            depthiness: 1.0,
            interpolation: InterpolationMode::None,
            blend_views: true,
            reduce_flicker: false,
            fill_gaps: true,
            post_processing: false,
            preview_2d: false,
            debug_view: None,
            quilt_override: None,
        }
    }
}

impl RenderSettings {
    pub fn resolve_layout(&self, calibration: &Calibration) -> QuiltLayout {
        self.quilt_override
            .unwrap_or_else(|| calibration.device_type().default_quilt())
    }
}
