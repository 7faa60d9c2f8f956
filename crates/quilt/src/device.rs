//! Device classification and the per-device lookup tables hanging off it.

use crate::layout::QuiltLayout;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceType {
    Standard,
    Large,
    Pro,
    Portrait,
    Landscape16Gen2,
    Landscape32Gen2,
    Landscape65Gen2,
    Go,
    Portrait16Gen3,
    Landscape16Gen3,
    Landscape32Gen3,
    Unknown,
}

/// Serial prefix -> device type. Checked in order.
const SERIAL_PREFIXES: &[(&str, DeviceType)] = &[
    ("LKG-2K", DeviceType::Standard),
    ("LKG-4K", DeviceType::Large),
    ("LKG-8K", DeviceType::Pro),
    ("LKG-P", DeviceType::Portrait),
    ("LKG-A", DeviceType::Landscape16Gen2),
    ("LKG-B", DeviceType::Landscape32Gen2),
    ("LKG-D", DeviceType::Landscape65Gen2),
    ("LKG-E", DeviceType::Go),
    ("LKG-F", DeviceType::Portrait16Gen3),
    ("LKG-H", DeviceType::Landscape16Gen3),
    ("LKG-J", DeviceType::Landscape32Gen3),
];

/// Devices whose lenticular output gets edge dimming outside 2D preview.
/// Kept as a table: there is no rule behind the membership.
const EDGE_FILTERED: &[DeviceType] = &[DeviceType::Landscape16Gen3, DeviceType::Landscape32Gen3];

const NAMES: &[(&str, DeviceType)] = &[
    ("standard", DeviceType::Standard),
    ("large", DeviceType::Large),
    ("pro", DeviceType::Pro),
    ("portrait", DeviceType::Portrait),
    ("16-landscape-gen2", DeviceType::Landscape16Gen2),
    ("32-landscape-gen2", DeviceType::Landscape32Gen2),
    ("65-landscape-gen2", DeviceType::Landscape65Gen2),
    ("go", DeviceType::Go),
    ("16-portrait-gen3", DeviceType::Portrait16Gen3),
    ("16-landscape-gen3", DeviceType::Landscape16Gen3),
    ("32-landscape-gen3", DeviceType::Landscape32Gen3),
    ("unknown", DeviceType::Unknown),
];

impl DeviceType {
    pub fn from_serial(serial: &str) -> Self {
        SERIAL_PREFIXES
            .iter()
            .find(|(prefix, _)| serial.starts_with(prefix))
            .map_or(DeviceType::Unknown, |&(_, ty)| ty)
    }

    /// Serial prefix identifying this device; `None` for `Unknown`.
    pub fn serial_prefix(self) -> Option<&'static str> {
        SERIAL_PREFIXES
            .iter()
            .find(|(_, ty)| *ty == self)
            .map(|(prefix, _)| *prefix)
    }

    #[inline]
    pub fn filters_edges(self) -> bool {
        EDGE_FILTERED.contains(&self)
    }

    /// Factory quilt settings for this device.
    pub fn default_quilt(self) -> QuiltLayout {
        use DeviceType::*;
        match self {
            Standard | Large => QuiltLayout::new(4096, 4096, 5, 9, 1.6),
            Pro => QuiltLayout::new(8192, 8192, 5, 9, 1.6),
            Portrait | Unknown => QuiltLayout::new(3360, 3360, 8, 6, 0.75),
            Landscape16Gen2 | Landscape16Gen3 => QuiltLayout::new(5999, 5999, 7, 7, 1.777_78),
            Landscape32Gen2 | Landscape32Gen3 => QuiltLayout::new(8192, 8192, 7, 7, 1.777_78),
            Landscape65Gen2 => QuiltLayout::new(8192, 8192, 8, 9, 1.777_78),
            Go | Portrait16Gen3 => QuiltLayout::new(4092, 4092, 11, 6, 0.5625),
        }
    }

    pub fn name(self) -> &'static str {
        NAMES
            .iter()
            .find(|(_, ty)| *ty == self)
            .map_or("unknown", |(name, _)| name)
    }
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for DeviceType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NAMES
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(s))
            .map(|&(_, ty)| ty)
            .ok_or_else(|| {
                let known: Vec<&str> = NAMES.iter().map(|(name, _)| *name).collect();
                format!("unknown device type '{s}' (expected one of: {})", known.join(", "))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_by_serial_prefix() {
        assert_eq!(DeviceType::from_serial("LKG-P03996"), DeviceType::Portrait);
        assert_eq!(DeviceType::from_serial("LKG-2K01234"), DeviceType::Standard);
        assert_eq!(DeviceType::from_serial("LKG-H00042"), DeviceType::Landscape16Gen3);
        assert_eq!(DeviceType::from_serial("XYZ-123"), DeviceType::Unknown);
        assert_eq!(DeviceType::from_serial(""), DeviceType::Unknown);

        for &(_, ty) in SERIAL_PREFIXES {
            let serial = format!("{}00001", ty.serial_prefix().unwrap());
            assert_eq!(DeviceType::from_serial(&serial), ty);
        }
        assert_eq!(DeviceType::Unknown.serial_prefix(), None);
    }

    #[test]
    fn only_two_devices_filter_edges() {
        let filtered: Vec<_> = NAMES
            .iter()
            .map(|&(_, ty)| ty)
            .filter(|ty| ty.filters_edges())
            .collect();
        assert_eq!(filtered, vec![DeviceType::Landscape16Gen3, DeviceType::Landscape32Gen3]);
    }

    #[test]
    fn names_round_trip() {
        for &(name, ty) in NAMES {
            assert_eq!(name.parse::<DeviceType>().unwrap(), ty);
            assert_eq!(ty.to_string(), name);
        }
        assert!("hologram-9000".parse::<DeviceType>().is_err());
    }

    #[test]
    fn portrait_preset() {
        let q = DeviceType::Portrait.default_quilt();
        assert_eq!((q.quilt_width(), q.quilt_height()), (3360, 3360));
        assert_eq!((q.columns(), q.rows(), q.tile_count()), (8, 6, 48));
    }
}
