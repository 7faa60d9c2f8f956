//! Which views get rendered and which get synthesized from their neighbours.
//!
//! Every `divisor`-th view plus the last view is rendered ("base" views).
//! Everything in between is interpolated from the two bases bracketing it.

use crate::layout::QuiltLayout;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum InterpolationMode {
    #[default]
    None,
    EveryOther,
    Every4th,
    Every8th,
    /// Roughly four rendered views across the cone.
    FourViews,
    /// Only the two outermost views are rendered.
    TwoViews,
}

impl InterpolationMode {
    pub const ALL: [InterpolationMode; 6] = [
        InterpolationMode::None,
        InterpolationMode::EveryOther,
        InterpolationMode::Every4th,
        InterpolationMode::Every8th,
        InterpolationMode::FourViews,
        InterpolationMode::TwoViews,
    ];

    /// Stride between rendered views. Never 0.
    pub fn view_index_divisor(self, tile_count: u32) -> u32 {
        let divisor = match self {
            InterpolationMode::None => 1,
            InterpolationMode::EveryOther => 2,
            InterpolationMode::Every4th => 4,
            InterpolationMode::Every8th => 8,
            InterpolationMode::FourViews => tile_count / 3,
            InterpolationMode::TwoViews => tile_count,
        };
        divisor.max(1)
    }

    pub fn name(self) -> &'static str {
        match self {
            InterpolationMode::None => "none",
            InterpolationMode::EveryOther => "every-other",
            InterpolationMode::Every4th => "every-4th",
            InterpolationMode::Every8th => "every-8th",
            InterpolationMode::FourViews => "4-views",
            InterpolationMode::TwoViews => "2-views",
        }
    }
}

impl fmt::Display for InterpolationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for InterpolationMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|mode| mode.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown interpolation mode '{s}'"))
    }
}

/// True when `view_index` is synthesized rather than rendered. The first and
/// last views are always rendered.
pub fn is_interpolated_view(view_index: u32, tile_count: u32, mode: InterpolationMode) -> bool {
    let divisor = mode.view_index_divisor(tile_count);
    view_index % divisor != 0 && view_index + 1 != tile_count
}

/// One synthesized view and the two rendered views it is built from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InterpolatedView {
    pub view_index: u32,
    /// Top-left pixel of the tile being written.
    pub position: [u32; 2],
    pub prev_base: u32,
    pub next_base: u32,
    /// Indices into [`InterpolationPlan::base_views`].
    pub prev_slot: u32,
    pub next_slot: u32,
    /// Parallax between the two bases, in tile widths per unit of depth disparity.
    pub parallax_offset: f32,
    /// 0 at `prev_base`, 1 at `next_base`.
    pub lerp: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InterpolationPlan {
    pub mode: InterpolationMode,
    pub divisor: u32,
    /// Rendered views, ascending.
    pub base_views: Vec<u32>,
    /// Tile origin of each rendered view, same order as `base_views`.
    pub base_positions: Vec<[u32; 2]>,
    pub views: Vec<InterpolatedView>,
}

impl InterpolationPlan {
    /// Classifies every view of the layout.
    pub fn build(layout: &QuiltLayout, mode: InterpolationMode, view_cone_deg: f32) -> Self {
        let tile_count = layout.tile_count();
        let divisor = mode.view_index_divisor(tile_count);

        let base_views: Vec<u32> = (0..tile_count)
            .filter(|&i| !is_interpolated_view(i, tile_count, mode))
            .collect();
        let base_positions = base_views.iter().map(|&i| layout.tile_origin(i)).collect();

        let tan_cone = view_cone_deg.to_radians().tan();
        let span = tile_count.saturating_sub(1).max(1) as f32;

        let views = (0..tile_count)
            .filter(|&i| is_interpolated_view(i, tile_count, mode))
            .map(|i| {
                let prev_base = i - i % divisor;
                let next_base = (prev_base + divisor).min(tile_count - 1);
                let divisor_used = next_base - prev_base;

                InterpolatedView {
                    view_index: i,
                    position: layout.tile_origin(i),
                    prev_base,
                    next_base,
                    prev_slot: slot_of(&base_views, prev_base),
                    next_slot: slot_of(&base_views, next_base),
                    parallax_offset: divisor_used as f32 * tan_cone / span,
                    lerp: (i - prev_base) as f32 / divisor_used as f32,
                }
            })
            .collect();

        Self {
            mode,
            divisor,
            base_views,
            base_positions,
            views,
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.views.is_empty()
    }

    #[inline]
    pub fn interpolated_count(&self) -> u32 {
        self.views.len() as u32
    }

    #[inline]
    pub fn rendered_count(&self) -> u32 {
        self.base_views.len() as u32
    }
}

fn slot_of(base_views: &[u32], view_index: u32) -> u32 {
    // Bases bracketing an interpolated view are always rendered.
    base_views.binary_search(&view_index).unwrap_or_default() as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn divisor_table() {
        assert_eq!(InterpolationMode::None.view_index_divisor(48), 1);
        assert_eq!(InterpolationMode::EveryOther.view_index_divisor(48), 2);
        assert_eq!(InterpolationMode::Every4th.view_index_divisor(48), 4);
        assert_eq!(InterpolationMode::Every8th.view_index_divisor(48), 8);
        assert_eq!(InterpolationMode::FourViews.view_index_divisor(48), 16);
        assert_eq!(InterpolationMode::TwoViews.view_index_divisor(48), 48);
        assert_eq!(InterpolationMode::FourViews.view_index_divisor(2), 1);
    }

    #[test]
    fn every_other_on_48_keeps_last_anchor() {
        let layout = QuiltLayout::new(3360, 3360, 8, 6, 0.75);
        let plan = InterpolationPlan::build(&layout, InterpolationMode::EveryOther, 40.0);

        let mut expected: Vec<u32> = (0..48).step_by(2).collect();
        expected.push(47);
        assert_eq!(plan.base_views, expected);
        assert_eq!(plan.interpolated_count(), 23);

        // 45 sits between 44 and 46.
        let v45 = plan.views.iter().find(|v| v.view_index == 45).unwrap();
        assert_eq!((v45.prev_base, v45.next_base), (44, 46));
        assert_relative_eq!(v45.lerp, 0.5);
        assert_eq!(plan.base_views[v45.prev_slot as usize], 44);
        assert_eq!(plan.base_views[v45.next_slot as usize], 46);
        assert_eq!(v45.position, layout.tile_origin(45));
    }

    #[test]
    fn last_segment_uses_shorter_divisor() {
        let layout = QuiltLayout::new(4096, 4096, 5, 9, 1.6);
        let plan = InterpolationPlan::build(&layout, InterpolationMode::Every8th, 35.0);
        // 45 tiles: bases 0,8,...,40,44.
        let v42 = plan.views.iter().find(|v| v.view_index == 42).unwrap();
        assert_eq!((v42.prev_base, v42.next_base), (40, 44));
        assert_relative_eq!(v42.lerp, 0.5);
        let expected = 4.0 * 35.0_f32.to_radians().tan() / 44.0;
        assert_relative_eq!(v42.parallax_offset, expected);

        let v41 = plan.views.iter().find(|v| v.view_index == 41).unwrap();
        assert_relative_eq!(v41.lerp, 0.25);
    }

    #[test]
    fn none_mode_interpolates_nothing() {
        let layout = QuiltLayout::default();
        let plan = InterpolationPlan::build(&layout, InterpolationMode::None, 40.0);
        assert!(plan.is_empty());
        assert_eq!(plan.rendered_count(), layout.tile_count());
    }

    #[test]
    fn two_views_renders_only_the_ends() {
        let layout = QuiltLayout::default();
        let plan = InterpolationPlan::build(&layout, InterpolationMode::TwoViews, 40.0);
        assert_eq!(plan.base_views, vec![0, 47]);
        assert!(plan.views.iter().all(|v| v.prev_base == 0 && v.next_base == 47));
    }

    #[test]
    fn modes_parse_by_name() {
        for mode in InterpolationMode::ALL {
            assert_eq!(mode.to_string().parse::<InterpolationMode>().unwrap(), mode);
        }
        assert!("every-3rd".parse::<InterpolationMode>().is_err());
    }
}
