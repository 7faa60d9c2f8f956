//! Per-device optical calibration and the formulas derived from it.
//!
//! The calibration is produced by the display's device bridge and is read-only
//! here. It arrives as a `visual.json` style document where every scalar is
//! wrapped in an object:
//!
//! ```json
//! { "serial": "LKG-P01234", "pitch": { "value": 52.36 }, "DPI": { "value": 324.0 }, ... }
//! ```

use crate::device::DeviceType;
use crate::error::CalibrationError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Red/green/blue sub-pixel offsets of one cell, in native pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SubpixelCell {
    #[serde(rename = "ROffsetX", default)]
    pub r_offset_x: f32,
    #[serde(rename = "ROffsetY", default)]
    pub r_offset_y: f32,
    #[serde(rename = "GOffsetX", default)]
    pub g_offset_x: f32,
    #[serde(rename = "GOffsetY", default)]
    pub g_offset_y: f32,
    #[serde(rename = "BOffsetX", default)]
    pub b_offset_x: f32,
    #[serde(rename = "BOffsetY", default)]
    pub b_offset_y: f32,
}

impl SubpixelCell {
    #[inline]
    pub fn to_array(self) -> [f32; 6] {
        [
            self.r_offset_x,
            self.r_offset_y,
            self.g_offset_x,
            self.g_offset_y,
            self.b_offset_x,
            self.b_offset_y,
        ]
    }

    /// Offsets divided by the target region size (x by width, y by height).
    pub fn normalized(self, width: f32, height: f32) -> [f32; 6] {
        let mut out = self.to_array();
        for pair in out.chunks_exact_mut(2) {
            pair[0] /= width;
            pair[1] /= height;
        }
        out
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Calibration {
    pub serial: String,

    // Lens geometry
    pub pitch: f32,
    pub slope: f32,
    pub center: f32,
    pub fringe: f32,

    /// Full view cone, degrees.
    pub view_cone: f32,
    pub inv_view: f32,
    pub vertical_angle: f32,

    pub dpi: f32,
    /// Native panel resolution, pixels.
    pub screen_w: f32,
    pub screen_h: f32,

    pub flip_image_x: f32,
    pub flip_image_y: f32,
    pub flip_subp: f32,

    pub cell_pattern_mode: i32,
    pub subpixel_cells: Vec<SubpixelCell>,
}

impl Default for Calibration {
    /// A Portrait-class panel, used when no device is attached.
    fn default() -> Self {
        Self {
            serial: "LKG-P00000".to_string(),
            pitch: 52.36,
            slope: -7.13,
            center: 0.0,
            fringe: 0.0,
            view_cone: 40.0,
            inv_view: 1.0,
            vertical_angle: 0.0,
            dpi: 324.0,
            screen_w: 1536.0,
            screen_h: 2048.0,
            flip_image_x: 0.0,
            flip_image_y: 0.0,
            flip_subp: 0.0,
            cell_pattern_mode: 0,
            subpixel_cells: Vec::new(),
        }
    }
}

impl Calibration {
    /// `-1` when the image is mirrored horizontally, `1` otherwise.
    #[inline]
    pub fn flip_sign(&self) -> f32 {
        if self.flip_image_x >= 0.5 {
            -1.0
        } else {
            1.0
        }
    }

    /// Lens pitch in screen-width units, corrected for the lens tilt.
    pub fn processed_pitch(&self) -> f32 {
        self.pitch * self.screen_w / self.dpi * (1.0 / self.slope).atan().cos()
    }

    pub fn processed_slope(&self) -> f32 {
        self.screen_h / (self.screen_w * self.slope) * self.flip_sign()
    }

    /// Width of one RGB sub-pixel in normalized screen units.
    pub fn subpixel_size(&self) -> f32 {
        1.0 / (3.0 * self.screen_w) * self.flip_sign()
    }

    #[inline]
    pub fn aspect(&self) -> f32 {
        self.screen_w / self.screen_h
    }

    pub fn device_type(&self) -> DeviceType {
        DeviceType::from_serial(&self.serial)
    }

    /// True when the panel size allows rendering at all.
    pub fn is_valid(&self) -> bool {
        self.screen_w > 0.0 && self.screen_h > 0.0
    }

    /// Rejects calibrations whose derived formulas would divide by zero.
    pub fn validate(&self) -> Result<(), CalibrationError> {
        let checks = [
            ("screenW", self.screen_w, self.screen_w > 0.0),
            ("screenH", self.screen_h, self.screen_h > 0.0),
            ("DPI", self.dpi, self.dpi > 0.0),
            ("slope", self.slope, self.slope != 0.0),
        ];

        for (field, value, ok) in checks {
            if !ok || !value.is_finite() {
                return Err(CalibrationError::InvalidField {
                    serial: self.serial.clone(),
                    field,
                    value,
                });
            }
        }

        Ok(())
    }

    pub fn from_json_str(json: &str) -> Result<Self, CalibrationError> {
        let doc: CalibrationDocument = serde_json::from_str(json)?;
        let calibration = Self::from(doc);
        calibration.validate()?;
        Ok(calibration)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, CalibrationError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| CalibrationError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let calibration = Self::from_json_str(&json)?;
        log::info!(
            "Loaded calibration {} ({}) from {}",
            calibration.serial,
            calibration.device_type(),
            path.display()
        );
        Ok(calibration)
    }
}

// -------------------- Document Shape --------------------

#[derive(Debug, Clone, Copy, Deserialize)]
struct Scalar {
    value: f32,
}

fn scalar(v: Option<Scalar>) -> f32 {
    v.map_or(0.0, |s| s.value)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CalibrationDocument {
    #[serde(default)]
    serial: String,
    pitch: Scalar,
    slope: Scalar,
    center: Scalar,
    #[serde(default)]
    fringe: Option<Scalar>,
    view_cone: Scalar,
    #[serde(default)]
    inv_view: Option<Scalar>,
    #[serde(default)]
    vertical_angle: Option<Scalar>,
    #[serde(rename = "DPI")]
    dpi: Scalar,
    screen_w: Scalar,
    screen_h: Scalar,
    #[serde(default)]
    flip_image_x: Option<Scalar>,
    #[serde(default)]
    flip_image_y: Option<Scalar>,
    #[serde(default)]
    flip_subp: Option<Scalar>,
    #[serde(rename = "CellPatternMode", default)]
    cell_pattern_mode: Option<Scalar>,
    #[serde(default)]
    subpixel_cells: Vec<SubpixelCell>,
}

impl From<CalibrationDocument> for Calibration {
    fn from(doc: CalibrationDocument) -> Self {
        Self {
            serial: doc.serial,
            pitch: doc.pitch.value,
            slope: doc.slope.value,
            center: doc.center.value,
            fringe: scalar(doc.fringe),
            view_cone: doc.view_cone.value,
            inv_view: scalar(doc.inv_view),
            vertical_angle: scalar(doc.vertical_angle),
            dpi: doc.dpi.value,
            screen_w: doc.screen_w.value,
            screen_h: doc.screen_h.value,
            flip_image_x: scalar(doc.flip_image_x),
            flip_image_y: scalar(doc.flip_image_y),
            flip_subp: scalar(doc.flip_subp),
            cell_pattern_mode: scalar(doc.cell_pattern_mode).round() as i32,
            subpixel_cells: doc.subpixel_cells,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const PORTRAIT_JSON: &str = r#"{
        "configVersion": "3.0",
        "serial": "LKG-P03996",
        "pitch": { "value": 52.36 },
        "slope": { "value": -7.13 },
        "center": { "value": 0.41 },
        "fringe": { "value": 0.0 },
        "viewCone": { "value": 40.0 },
        "invView": { "value": 1.0 },
        "verticalAngle": { "value": 0.0 },
        "DPI": { "value": 324.0 },
        "screenW": { "value": 1536.0 },
        "screenH": { "value": 2048.0 },
        "flipImageX": { "value": 0.0 },
        "flipImageY": { "value": 0.0 },
        "flipSubp": { "value": 0.0 },
        "CellPatternMode": { "value": 1 },
        "subpixelCells": [
            { "ROffsetX": 0.0, "ROffsetY": 0.0, "GOffsetX": 1.0, "GOffsetY": 0.0, "BOffsetX": 2.0, "BOffsetY": 0.5 }
        ]
    }"#;

    #[test]
    fn parses_device_document() {
        let cal = Calibration::from_json_str(PORTRAIT_JSON).unwrap();
        assert_eq!(cal.serial, "LKG-P03996");
        assert_eq!(cal.device_type(), DeviceType::Portrait);
        assert_relative_eq!(cal.center, 0.41);
        assert_relative_eq!(cal.screen_h, 2048.0);
        assert_eq!(cal.cell_pattern_mode, 1);
        assert_eq!(cal.subpixel_cells.len(), 1);
        assert_relative_eq!(cal.subpixel_cells[0].b_offset_y, 0.5);
    }

    #[test]
    fn missing_optional_fields_default_to_zero() {
        let json = r#"{
            "pitch": { "value": 50.0 }, "slope": { "value": 5.0 }, "center": { "value": 0.1 },
            "viewCone": { "value": 35.0 }, "DPI": { "value": 300.0 },
            "screenW": { "value": 2560.0 }, "screenH": { "value": 1600.0 }
        }"#;
        let cal = Calibration::from_json_str(json).unwrap();
        assert_eq!(cal.serial, "");
        assert_eq!(cal.fringe, 0.0);
        assert_eq!(cal.flip_image_x, 0.0);
        assert!(cal.subpixel_cells.is_empty());
        assert_eq!(cal.device_type(), DeviceType::Unknown);
    }

    #[test]
    fn rejects_zero_screen_size() {
        let json = PORTRAIT_JSON.replace(r#""screenW": { "value": 1536.0 }"#, r#""screenW": { "value": 0.0 }"#);
        match Calibration::from_json_str(&json) {
            Err(CalibrationError::InvalidField { field, .. }) => assert_eq!(field, "screenW"),
            other => panic!("expected InvalidField, got {other:?}"),
        }
    }

    #[test]
    fn rejects_malformed_json() {
        assert!(matches!(
            Calibration::from_json_str("{ not json"),
            Err(CalibrationError::Parse(_))
        ));
    }

    #[test]
    fn processed_pitch_matches_reference() {
        let cal = Calibration {
            screen_w: 1536.0,
            dpi: 338.0,
            pitch: 52.36,
            slope: 5.56,
            ..Calibration::default()
        };
        let expected = 52.36_f32 * 1536.0 / 338.0 * (1.0_f32 / 5.56).atan().cos();
        assert_relative_eq!(cal.processed_pitch(), expected, max_relative = 1e-6);
    }

    #[test]
    fn flip_negates_slope_and_subpixel() {
        let plain = Calibration::default();
        let flipped = Calibration {
            flip_image_x: 1.0,
            ..Calibration::default()
        };
        assert_relative_eq!(flipped.processed_slope(), -plain.processed_slope());
        assert_relative_eq!(flipped.subpixel_size(), -plain.subpixel_size());
        assert_relative_eq!(plain.subpixel_size(), 1.0 / (3.0 * 1536.0));
    }

    #[test]
    fn cells_normalize_per_axis() {
        let cell = SubpixelCell {
            r_offset_x: 10.0,
            r_offset_y: 20.0,
            g_offset_x: 30.0,
            g_offset_y: 40.0,
            b_offset_x: 50.0,
            b_offset_y: 60.0,
        };
        let n = cell.normalized(10.0, 20.0);
        assert_eq!(n, [1.0, 1.0, 3.0, 2.0, 5.0, 3.0]);
    }
}
