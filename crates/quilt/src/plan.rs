//! What a frame does, in order, decided before any GPU work is recorded.

use crate::interpolation::{is_interpolated_view, InterpolationMode};
use crate::layout::QuiltLayout;

/// Renders a single view and optionally copies it into every other tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DebugView {
    pub view_index: u32,
    pub fast_copy: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameStep {
    Render { view_index: u32 },
    /// Copy an already rendered tile instead of rendering `to`.
    FastCopy { from: u32, to: u32 },
    /// Left for the interpolation pass.
    SkipInterpolated { view_index: u32 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct FramePlan {
    pub steps: Vec<FrameStep>,
    /// True when the interpolation pass has tiles to fill.
    pub interpolate: bool,
}

impl FramePlan {
    pub fn build(layout: &QuiltLayout, mode: InterpolationMode, debug: Option<DebugView>) -> Self {
        let tile_count = layout.tile_count();

        if let Some(debug) = debug {
            let pinned = debug.view_index.min(tile_count - 1);
            let mut steps = vec![FrameStep::Render { view_index: pinned }];
            if debug.fast_copy {
                steps.extend(
                    (0..tile_count)
                        .filter(|&to| to != pinned)
                        .map(|to| FrameStep::FastCopy { from: pinned, to }),
                );
            }
            // A pinned view never feeds the interpolation pass.
            return Self {
                steps,
                interpolate: false,
            };
        }

        let steps: Vec<FrameStep> = (0..tile_count)
            .map(|view_index| {
                if is_interpolated_view(view_index, tile_count, mode) {
                    FrameStep::SkipInterpolated { view_index }
                } else {
                    FrameStep::Render { view_index }
                }
            })
            .collect();

        let interpolate = steps
            .iter()
            .any(|step| matches!(step, FrameStep::SkipInterpolated { .. }));

        Self { steps, interpolate }
    }

    pub fn rendered_count(&self) -> u32 {
        self.count(|s| matches!(s, FrameStep::Render { .. }))
    }

    pub fn copied_count(&self) -> u32 {
        self.count(|s| matches!(s, FrameStep::FastCopy { .. }))
    }

    pub fn skipped_count(&self) -> u32 {
        self.count(|s| matches!(s, FrameStep::SkipInterpolated { .. }))
    }

    fn count(&self, pred: impl Fn(&FrameStep) -> bool) -> u32 {
        self.steps.iter().filter(|s| pred(s)).count() as u32
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FramePhase {
    #[default]
    Idle,
    PreparingFrame,
    RenderingViews,
    Interpolating,
    Compositing,
}

impl FramePhase {
    /// The phase after `self`. `Interpolating` only happens when `interpolate`.
    pub fn next(self, interpolate: bool) -> FramePhase {
        match self {
            FramePhase::Idle => FramePhase::PreparingFrame,
            FramePhase::PreparingFrame => FramePhase::RenderingViews,
            FramePhase::RenderingViews if interpolate => FramePhase::Interpolating,
            FramePhase::RenderingViews | FramePhase::Interpolating => FramePhase::Compositing,
            FramePhase::Compositing => FramePhase::Idle,
        }
    }

    pub fn can_advance_to(self, to: FramePhase) -> bool {
        // Any phase may bail out to Idle when a frame is skipped.
        to == FramePhase::Idle || self.next(true) == to || self.next(false) == to
    }
}

/// Changes observed since the last frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DirtyFlags {
    pub calibration: bool,
    pub quilt: bool,
}

impl DirtyFlags {
    pub fn all() -> Self {
        Self {
            calibration: true,
            quilt: true,
        }
    }

    pub fn mark_calibration(&mut self) {
        self.calibration = true;
    }

    pub fn mark_quilt(&mut self) {
        self.quilt = true;
    }

    #[inline]
    pub fn any(&self) -> bool {
        self.calibration || self.quilt
    }

    /// Returns the current flags and clears them.
    pub fn take(&mut self) -> DirtyFlags {
        std::mem::take(self)
    }
}
