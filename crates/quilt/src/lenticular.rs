//! Shader parameters for mapping a quilt onto a lenticular panel.

use crate::calibration::Calibration;
use crate::layout::QuiltLayout;
use bytemuck::{Pod, Zeroable};

/// Pixel region of the output the quilt is mapped into.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DisplayRegion {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl DisplayRegion {
    pub fn new(width: f32, height: f32) -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            width,
            height,
        }
    }

    /// The panel's full native resolution.
    pub fn native(calibration: &Calibration) -> Self {
        Self::new(calibration.screen_w, calibration.screen_h)
    }

    #[inline]
    pub fn aspect(&self) -> f32 {
        if self.height > 0.0 {
            self.width / self.height
        } else {
            1.0
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BinderOptions {
    pub preview_2d: bool,
    /// Extra center shift dialled in by a user while tuning. Never set on a
    /// production display.
    pub editor_center_offset: Option<f32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LenticularParams {
    pub pitch: f32,
    pub slope: f32,
    pub center: f32,
    pub subpixel_size: f32,
    pub fringe: f32,
    pub screen_size: [f32; 2],
    pub view_portion: [f32; 2],
    pub columns: u32,
    pub rows: u32,
    pub tile_count: u32,
    pub display_aspect: f32,
    pub render_aspect: f32,
    pub inv_view: f32,
    pub flip_x: f32,
    pub flip_y: f32,
    pub flip_subp: f32,
    pub filter_edge: bool,
    pub cell_pattern_mode: u32,
    /// Sub-pixel offsets normalized by the region size.
    pub cells: Vec<[f32; 6]>,
}

/// Derives the display shader's parameters. Pure: identical inputs give
/// bit-identical outputs.
pub fn bind(
    calibration: &Calibration,
    layout: &QuiltLayout,
    region: &DisplayRegion,
    options: &BinderOptions,
) -> LenticularParams {
    let filter_edge = !options.preview_2d && calibration.device_type().filters_edges();

    let cells = calibration
        .subpixel_cells
        .iter()
        .map(|cell| cell.normalized(region.width, region.height))
        .collect();

    LenticularParams {
        pitch: calibration.processed_pitch(),
        slope: calibration.processed_slope(),
        center: calibration.center + options.editor_center_offset.unwrap_or(0.0),
        subpixel_size: calibration.subpixel_size(),
        fringe: calibration.fringe,
        screen_size: [region.width, region.height],
        view_portion: [layout.view_portion_horizontal(), layout.view_portion_vertical()],
        columns: layout.columns(),
        rows: layout.rows(),
        tile_count: layout.tile_count(),
        display_aspect: region.aspect(),
        render_aspect: layout.render_aspect(),
        inv_view: calibration.inv_view,
        flip_x: calibration.flip_image_x,
        flip_y: calibration.flip_image_y,
        flip_subp: calibration.flip_subp,
        filter_edge,
        cell_pattern_mode: calibration.cell_pattern_mode.max(0) as u32,
        cells,
    }
}

impl LenticularParams {
    pub fn to_uniform(&self) -> LenticularUniform {
        LenticularUniform {
            pitch: self.pitch,
            slope: self.slope,
            center: self.center,
            subpixel_size: self.subpixel_size,
            screen_size: self.screen_size,
            view_portion: self.view_portion,
            tile: [self.columns as f32, self.rows as f32, self.tile_count as f32, 0.0],
            aspect: [self.display_aspect, self.render_aspect],
            fringe: self.fringe,
            flip_subp: self.flip_subp,
            inv_view: self.inv_view,
            flip_x: self.flip_x,
            flip_y: self.flip_y,
            filter_edge: if self.filter_edge { 1.0 } else { 0.0 },
            cell_pattern_mode: self.cell_pattern_mode,
            cell_count: self.cells.len() as u32,
            _pad: [0; 2],
        }
    }

    /// Cells flattened for a storage buffer, six floats each.
    pub fn cell_data(&self) -> Vec<f32> {
        self.cells.iter().flatten().copied().collect()
    }
}

/// Mirrors `struct Lenticular` in the display-mapping shader.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct LenticularUniform {
    pub pitch: f32,
    pub slope: f32,
    pub center: f32,
    pub subpixel_size: f32,
    pub screen_size: [f32; 2],
    pub view_portion: [f32; 2],
    /// columns, rows, tile count, unused
    pub tile: [f32; 4],
    /// display aspect, render aspect
    pub aspect: [f32; 2],
    pub fringe: f32,
    /// >= 0.5 swaps the red and blue sub-pixels.
    pub flip_subp: f32,
    pub inv_view: f32,
    pub flip_x: f32,
    pub flip_y: f32,
    pub filter_edge: f32,
    pub cell_pattern_mode: u32,
    pub cell_count: u32,
    pub _pad: [u32; 2],
}

const _: [(); 96] = [(); std::mem::size_of::<LenticularUniform>()];
