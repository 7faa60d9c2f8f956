//! Per-view camera perturbation.
//!
//! Every view is the center view slid sideways along the view cone. The view
//! matrix gets an x translation and the projection an opposing x skew, so
//! points on the focal plane land on the same pixel in every view while
//! nearer and farther points drift apart.

use glam::{Mat4, Vec3};

/// Total camera travel across the view cone. Zero when `view_cone_deg` is 0.
pub fn view_cone_sweep(focal_plane: f32, view_cone_deg: f32) -> f32 {
    -focal_plane * (view_cone_deg.to_radians() / 2.0).tan() * 2.0
}

/// Position of a view along the sweep, in `[-0.5, 0.5]`.
pub fn current_view_lerp(view_index: u32, tile_count: u32) -> f32 {
    if tile_count > 1 {
        view_index as f32 / (tile_count - 1) as f32 - 0.5
    } else {
        0.0
    }
}

#[inline]
pub fn projection_modifier(size: f32, aspect: f32) -> f32 {
    1.0 / (size * aspect)
}

/// Scale view-space z by `depthiness` around the focal plane. `None` at 1.
///
/// View space looks down -z, so the focal plane sits at `z = -focal_plane`.
pub fn depthiness_matrix(focal_plane: f32, depthiness: f32) -> Option<Mat4> {
    if depthiness == 1.0 {
        return None;
    }

    Some(
        Mat4::from_translation(Vec3::new(0.0, 0.0, -focal_plane))
            * Mat4::from_scale(Vec3::new(1.0, 1.0, depthiness))
            * Mat4::from_translation(Vec3::new(0.0, 0.0, focal_plane)),
    )
}

/// FOV used for culling while views render, wide enough to cover every view.
pub fn culling_fov_deg(fov_deg: f32, view_cone_deg: f32) -> f32 {
    (fov_deg + view_cone_deg.abs()).min(179.0)
}

/// Inputs describing the cone of views for one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewCone {
    pub size: f32,
    pub aspect: f32,
    pub focal_plane: f32,
    pub view_cone_deg: f32,
    pub depthiness: f32,
    pub tile_count: u32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewMatrices {
    pub view: Mat4,
    pub proj: Mat4,
}

/// Frame-scoped state shared by every view render.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewShared {
    pub center: ViewMatrices,
    pub aspect: f32,
    pub view_cone_deg: f32,
    pub view_cone_sweep: f32,
    pub proj_modifier: f32,
    pub depthiness: Option<Mat4>,
    pub tile_count: u32,
}

impl ViewShared {
    pub fn new(center_view: Mat4, center_proj: Mat4, cone: ViewCone) -> Self {
        Self {
            center: ViewMatrices {
                view: center_view,
                proj: center_proj,
            },
            aspect: cone.aspect,
            view_cone_deg: cone.view_cone_deg,
            view_cone_sweep: view_cone_sweep(cone.focal_plane, cone.view_cone_deg),
            proj_modifier: projection_modifier(cone.size, cone.aspect),
            depthiness: depthiness_matrix(cone.focal_plane, cone.depthiness),
            tile_count: cone.tile_count,
        }
    }

    /// A zero view cone makes every view identical.
    #[inline]
    pub fn is_degenerate(&self) -> bool {
        self.view_cone_deg == 0.0
    }

    pub fn view_matrices(&self, view_index: u32) -> ViewMatrices {
        let offset = current_view_lerp(view_index, self.tile_count) * self.view_cone_sweep;

        let mut view = self.center.view;
        view.w_axis.x += offset;

        let mut proj = self.center.proj;
        proj.z_axis.x += offset * self.proj_modifier;

        if let Some(depth) = self.depthiness {
            proj *= depth;
        }

        ViewMatrices { view, proj }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use glam::Vec4;

    fn shared(tile_count: u32, view_cone_deg: f32, depthiness: f32) -> (ViewShared, f32) {
        let size = 2.0;
        let aspect = 0.75;
        let fov = 14.0_f32;
        let focal = size / (fov.to_radians() * 0.5).tan();
        let view = Mat4::look_at_rh(Vec3::new(0.0, 0.0, focal), Vec3::ZERO, Vec3::Y);
        let proj = Mat4::perspective_rh(fov.to_radians(), aspect, 0.1, focal * 4.0);
        let cone = ViewCone {
            size,
            aspect,
            focal_plane: focal,
            view_cone_deg,
            depthiness,
            tile_count,
        };
        (ViewShared::new(view, proj, cone), focal)
    }

    fn ndc(m: &ViewMatrices, p: Vec3) -> Vec3 {
        let clip = m.proj * m.view * Vec4::new(p.x, p.y, p.z, 1.0);
        clip.truncate() / clip.w
    }

    #[test]
    fn single_view_has_no_shift() {
        assert_eq!(current_view_lerp(0, 1), 0.0);
        let (s, _) = shared(1, 40.0, 1.0);
        assert_eq!(s.view_matrices(0), s.center);
    }

    #[test]
    fn sweep_is_symmetric() {
        for n in [2, 3, 45, 48, 1024] {
            assert_eq!(current_view_lerp(0, n), -0.5);
            assert_eq!(current_view_lerp(n - 1, n), 0.5);
        }
        assert_relative_eq!(current_view_lerp(24, 49), 0.0);
    }

    #[test]
    fn sweep_formula() {
        assert_relative_eq!(
            view_cone_sweep(10.0, 40.0),
            -10.0 * 20.0_f32.to_radians().tan() * 2.0
        );
        assert_eq!(view_cone_sweep(10.0, 0.0), 0.0);
    }

    #[test]
    fn zero_cone_is_degenerate() {
        let (s, _) = shared(48, 0.0, 1.0);
        assert!(s.is_degenerate());
        assert_eq!(s.view_matrices(0), s.view_matrices(47));
    }

    #[test]
    fn focal_plane_is_stable_across_views() {
        let (s, _) = shared(48, 40.0, 1.0);
        let p = Vec3::new(0.7, -0.3, 0.0);
        let first = ndc(&s.view_matrices(0), p);
        let last = ndc(&s.view_matrices(47), p);
        assert_relative_eq!(first.x, last.x, epsilon = 1e-4);
        assert_relative_eq!(first.y, last.y, epsilon = 1e-4);

        // Off-plane points drift in opposite directions for near and far.
        let near = Vec3::new(0.0, 0.0, 1.0);
        let far = Vec3::new(0.0, 0.0, -1.0);
        let dn = ndc(&s.view_matrices(47), near).x - ndc(&s.view_matrices(0), near).x;
        let df = ndc(&s.view_matrices(47), far).x - ndc(&s.view_matrices(0), far).x;
        assert!(dn * df < 0.0);
    }

    #[test]
    fn depthiness_keeps_focal_plane() {
        assert!(depthiness_matrix(5.0, 1.0).is_none());

        let d = depthiness_matrix(5.0, 0.5).unwrap();
        let on_plane = d * Vec4::new(1.0, 2.0, -5.0, 1.0);
        assert_relative_eq!(on_plane.z, -5.0);
        assert_relative_eq!(on_plane.x, 1.0);

        let behind = d * Vec4::new(0.0, 0.0, -7.0, 1.0);
        assert_relative_eq!(behind.z, -6.0);

        let (flat, _) = shared(8, 40.0, 1.0);
        let (squashed, _) = shared(8, 40.0, 0.5);
        assert_ne!(flat.view_matrices(3).proj, squashed.view_matrices(3).proj);
        assert_eq!(flat.view_matrices(3).view, squashed.view_matrices(3).view);
    }

    #[test]
    fn culling_fov_widens_and_caps() {
        assert_eq!(culling_fov_deg(14.0, 40.0), 54.0);
        assert_eq!(culling_fov_deg(170.0, 40.0), 179.0);
    }
}
