//! Domain-to-screen coordinate mapping
//!
//! Everything here is a pure function of its inputs. Normalized screen space
//! runs from 0 to 1 on both axes; vertical mappings are inverted so that the
//! top row of the image is 0.

pub mod label;
pub mod spectral;
pub mod value;

pub use label::format_axis_label;
pub use spectral::{BinWindow, SpectralAxis};
pub use value::{map_linear_y, map_log_y, map_time, AxisMapping, PreparedMapping, ValueScale};

/// Smallest span used when a range collapses (`max <= min`)
pub const DEGENERATE_RANGE_EPSILON: f64 = 1e-6;

/// Default floor applied to values before taking `log10`
pub const DEFAULT_LOG_FLOOR: f32 = 1e-6;

/// Convert a normalized coordinate to a pixel position along an axis of
/// `extent` pixels. Pixel centers sit on integer positions.
#[inline]
pub fn to_pixel(norm: f32, extent: usize) -> f32 {
    norm * extent.saturating_sub(1) as f32
}
