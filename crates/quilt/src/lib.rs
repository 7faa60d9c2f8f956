//! QUILT: GPU-free math for rendering light-field "quilts" and mapping them
//! onto lenticular displays.
//!
//! - A quilt is one texture holding `tile_count` views of the scene laid out
//!   as a `columns x rows` grid. View 0 sits in the bottom-left tile, indices
//!   grow left to right and then upwards.
//! - Each view is the center camera shifted sideways along the view cone.
//!   Only the view and projection x-terms change between views.
//! - Some views may be synthesized from their rendered neighbours instead of
//!   being rendered (see [`interpolation`]).
//! - The lenticular mapping shader is driven entirely by
//!   [`lenticular::LenticularParams`], derived from a per-device
//!   [`calibration::Calibration`].
//!
//! Quilt pixel layout (rows top-down, as stored in the texture):
//!
//!   y = 0                 : unused margin (`padding_vertical` rows)
//!   y = padding_vertical  : top tile row    (highest view indices)
//!   ...
//!   y = height - tile_h   : bottom tile row (views 0..columns)
//!
//! Horizontal padding (`quilt_width % columns`) sits on the right.

pub mod calibration;
pub mod device;
pub mod error;
pub mod interpolation;
pub mod layout;
pub mod lenticular;
pub mod plan;
pub mod settings;
pub mod view;

pub use calibration::{Calibration, SubpixelCell};
pub use device::DeviceType;
pub use error::CalibrationError;
pub use interpolation::{InterpolatedView, InterpolationMode, InterpolationPlan};
pub use layout::{QuiltLayout, TileRect};
pub use lenticular::{BinderOptions, DisplayRegion, LenticularParams, LenticularUniform};
pub use plan::{DebugView, DirtyFlags, FramePhase, FramePlan, FrameStep};
pub use settings::{Lens, RenderSettings};
pub use view::{ViewCone, ViewMatrices, ViewShared};
