use anyhow::{Context, Result};
use clap::Parser;
use quilt::{Calibration, DebugView, DeviceType, InterpolationMode, Lens, QuiltLayout, RenderSettings};
use std::path::PathBuf;

/// `hologram-renderer` - renders a demo scene as a light-field quilt and maps
/// it onto a lenticular display.
///
/// Without a calibration file the optics of a Portrait-class panel are used
/// under the chosen device preset.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Config {
    /// Path to the device's `visual.json` calibration document.
    #[arg(long, env = "HOLOGRAM_CALIBRATION")]
    pub calibration: Option<PathBuf>,

    /// Device preset used when no calibration file is given.
    #[arg(long, env = "HOLOGRAM_DEVICE", default_value = "portrait")]
    pub device: DeviceType,

    /// Which views to synthesize instead of render.
    ///
    /// One of: none, every-other, every-4th, every-8th, 4-views, 2-views.
    #[arg(long, env = "HOLOGRAM_INTERPOLATION", default_value = "none")]
    pub interpolation: InterpolationMode,

    /// Overrides the device's quilt, as `WIDTHxHEIGHT:COLUMNSxROWS:ASPECT`
    /// (e.g. `4096x4096:5x9:1.6`).
    #[arg(long, env = "HOLOGRAM_QUILT", value_parser = parse_quilt)]
    pub quilt: Option<QuiltLayout>,

    /// Scales scene depth around the focal plane.
    #[arg(long, default_value_t = 1.0)]
    pub depthiness: f32,

    /// Half-height of the focal plane, in world units.
    #[arg(long, default_value_t = Lens::default().size)]
    pub size: f32,

    /// Vertical field of view of the center view, in degrees.
    #[arg(long, default_value_t = Lens::default().fov_deg)]
    pub fov: f32,

    /// Render only this view.
    #[arg(long)]
    pub debug_view: Option<u32>,

    /// With `--debug-view`, copy the view into every other tile.
    #[arg(long, requires = "debug_view")]
    pub fast_copy: bool,

    /// Take the nearer sample instead of blending the two source views.
    #[arg(long)]
    pub no_blend: bool,

    /// Interpolate one view per dispatch, in view order.
    #[arg(long)]
    pub reduce_flicker: bool,

    /// Leave interpolation holes unfilled.
    #[arg(long)]
    pub no_fill_gaps: bool,

    /// Run the demo post-process over the quilt.
    #[arg(long)]
    pub post: bool,

    /// Show the display output as a flat 2D preview.
    #[arg(long)]
    pub preview_2d: bool,
}

/// Parses `WIDTHxHEIGHT:COLUMNSxROWS:ASPECT`.
pub fn parse_quilt(s: &str) -> Result<QuiltLayout, String> {
    let pair = |part: &str, what: &str| -> Result<(u32, u32), String> {
        let (a, b) = part
            .split_once(['x', 'X'])
            .ok_or_else(|| format!("expected {what} as AxB, got '{part}'"))?;
        let a = a.trim().parse().map_err(|e| format!("bad {what} '{part}': {e}"))?;
        let b = b.trim().parse().map_err(|e| format!("bad {what} '{part}': {e}"))?;
        Ok((a, b))
    };

    let mut parts = s.split(':');
    let (Some(size), Some(grid), Some(aspect), None) = (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(format!("expected WIDTHxHEIGHT:COLUMNSxROWS:ASPECT, got '{s}'"));
    };

    let (width, height) = pair(size, "size")?;
    let (columns, rows) = pair(grid, "grid")?;
    let aspect: f32 = aspect
        .trim()
        .parse()
        .map_err(|e| format!("bad aspect '{aspect}': {e}"))?;

    Ok(QuiltLayout::new(width, height, columns, rows, aspect))
}

impl Config {
    pub fn lens(&self) -> Lens {
        Lens {
            size: self.size,
            fov_deg: self.fov,
            ..Lens::default()
        }
    }

    pub fn settings(&self) -> RenderSettings {
        RenderSettings {
            lens: self.lens(),
            depthiness: self.depthiness,
            interpolation: self.interpolation,
            blend_views: !self.no_blend,
            reduce_flicker: self.reduce_flicker,
            fill_gaps: !self.no_fill_gaps,
            post_processing: self.post,
            preview_2d: self.preview_2d,
            debug_view: self.debug_view.map(|view_index| DebugView {
                view_index,
                fast_copy: self.fast_copy,
            }),
            quilt_override: self.quilt,
        }
    }

    /// Loads the calibration file, or synthesizes one for `--device`.
    pub fn load_calibration(&self) -> Result<Calibration> {
        if let Some(path) = &self.calibration {
            return Calibration::from_path(path)
                .with_context(|| format!("loading calibration from {}", path.display()));
        }

        let mut calibration = Calibration::default();
        if let Some(prefix) = self.device.serial_prefix() {
            calibration.serial = format!("{prefix}00000");
        }
        log::info!(
            "No calibration file; using {} preset with placeholder optics",
            self.device
        );
        Ok(calibration)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_render_every_view() {
        let config = Config::try_parse_from(["hologram-renderer"]).unwrap();
        let settings = config.settings();
        assert_eq!(settings.interpolation, InterpolationMode::None);
        assert!(settings.blend_views);
        assert!(settings.fill_gaps);
        assert_eq!(settings.debug_view, None);
        assert_eq!(settings.lens, Lens::default());

        let cal = config.load_calibration().unwrap();
        assert_eq!(cal.device_type(), DeviceType::Portrait);
    }

    #[test]
    fn parses_flags() {
        let config = Config::try_parse_from([
            "hologram-renderer",
            "--device",
            "16-landscape-gen3",
            "--interpolation",
            "every-4th",
            "--quilt",
            "4096x4096:5x9:1.6",
            "--debug-view",
            "3",
            "--fast-copy",
            "--no-blend",
        ])
        .unwrap();

        let settings = config.settings();
        assert_eq!(settings.interpolation, InterpolationMode::Every4th);
        assert!(!settings.blend_views);
        assert_eq!(
            settings.debug_view,
            Some(DebugView {
                view_index: 3,
                fast_copy: true
            })
        );
        assert_eq!(settings.quilt_override, Some(QuiltLayout::new(4096, 4096, 5, 9, 1.6)));
        assert_eq!(
            config.load_calibration().unwrap().device_type(),
            DeviceType::Landscape16Gen3
        );
    }

    #[test]
    fn fast_copy_needs_debug_view() {
        assert!(Config::try_parse_from(["hologram-renderer", "--fast-copy"]).is_err());
    }

    #[test]
    fn rejects_bad_quilt() {
        assert!(parse_quilt("4096x4096:5x9").is_err());
        assert!(parse_quilt("4096:5x9:1.6").is_err());
        assert!(parse_quilt("4096x4096:5x9:wide").is_err());
        assert!(parse_quilt("4096x4096:5x9:1.6:2").is_err());

        let q = parse_quilt("8192X8192:7x7:1.77778").unwrap();
        assert_eq!((q.columns(), q.rows(), q.tile_count()), (7, 7, 49));
    }
}
