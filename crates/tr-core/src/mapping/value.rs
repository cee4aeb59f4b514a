//! Value and time axis mapping

use serde::{Deserialize, Serialize};

use super::{DEFAULT_LOG_FLOOR, DEGENERATE_RANGE_EPSILON};

/// How raw values are spaced along an axis
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ValueScale {
    Linear,
    /// Values below `floor` are clamped to it before taking `log10`
    Log10 { floor: f32 },
}

impl Default for ValueScale {
    fn default() -> Self {
        ValueScale::Linear
    }
}

impl ValueScale {
    pub fn log10() -> Self {
        ValueScale::Log10 { floor: DEFAULT_LOG_FLOOR }
    }
}

/// A single axis mapping from domain values to normalized [0, 1] space
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AxisMapping {
    pub min: f32,
    pub max: f32,
    pub scale: ValueScale,
    /// Flip the result (`1 - t`), used for vertical axes
    pub invert: bool,
}

impl AxisMapping {
    /// Vertical axis: `max` maps to 0 (top), `min` to 1 (bottom)
    pub fn vertical(min: f32, max: f32, scale: ValueScale) -> Self {
        Self { min, max, scale, invert: true }
    }

    /// Horizontal axis: `min` maps to 0 (left), `max` to 1 (right)
    pub fn horizontal(min: f32, max: f32, scale: ValueScale) -> Self {
        Self { min, max, scale, invert: false }
    }

    /// The active range in the space the mapping interpolates in.
    ///
    /// For log scales both ends are floored and converted with `log10`. The
    /// result is always finite and non-empty.
    pub fn effective_range(&self) -> (f64, f64) {
        let (lo, hi) = match self.scale {
            ValueScale::Linear => (self.min as f64, self.max as f64),
            ValueScale::Log10 { floor } => {
                let floor = sanitize_floor(floor);
                (log_floored(self.min as f64, floor), log_floored(self.max as f64, floor))
            }
        };
        widen(lo, hi)
    }

    /// Resolve the range once for mapping many values
    pub fn prepare(&self) -> PreparedMapping {
        let (lo, hi) = self.effective_range();
        let log_floor = match self.scale {
            ValueScale::Linear => None,
            ValueScale::Log10 { floor } => Some(sanitize_floor(floor)),
        };
        PreparedMapping {
            lo,
            hi,
            log_floor,
            invert: self.invert,
        }
    }

    /// Map a domain value to normalized space, clamped to [0, 1]
    pub fn normalize(&self, value: f32) -> f32 {
        self.prepare().apply(value)
    }

    /// Inverse of [`AxisMapping::normalize`] for in-range inputs
    pub fn denormalize(&self, norm: f32) -> f32 {
        let (lo, hi) = self.effective_range();
        let t = norm.clamp(0.0, 1.0) as f64;
        let t = if self.invert { 1.0 - t } else { t };
        let v = lo + t * (hi - lo);
        match self.scale {
            ValueScale::Linear => v as f32,
            ValueScale::Log10 { .. } => 10f64.powf(v) as f32,
        }
    }
}

/// An [`AxisMapping`] with its interpolation range already resolved
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PreparedMapping {
    /// Range start in interpolation space
    pub lo: f64,
    /// Range end in interpolation space, always `> lo`
    pub hi: f64,
    /// `Some(floor)` for log10 scales
    pub log_floor: Option<f64>,
    pub invert: bool,
}

impl PreparedMapping {
    /// The value in interpolation space (identity or floored `log10`).
    ///
    /// Non-finite inputs are clamped to the range boundary: `+inf` to the
    /// maximum, `NaN` and `-inf` to the minimum.
    pub fn project(&self, value: f32) -> f64 {
        if value.is_nan() || value == f32::NEG_INFINITY {
            return self.lo;
        }
        if value == f32::INFINITY {
            return self.hi;
        }
        match self.log_floor {
            None => value as f64,
            Some(floor) => log_floored(value as f64, floor),
        }
    }

    pub fn apply(&self, value: f32) -> f32 {
        let t = ((self.project(value) - self.lo) / (self.hi - self.lo)).clamp(0.0, 1.0);
        let t = if self.invert { 1.0 - t } else { t };
        t as f32
    }
}

/// `yNorm = clamp(1 - (value - min) / (max - min), 0, 1)`
pub fn map_linear_y(value: f32, min: f32, max: f32) -> f32 {
    AxisMapping::vertical(min, max, ValueScale::Linear).normalize(value)
}

/// Log10 vertical mapping with values (and the range) floored at `floor`
pub fn map_log_y(value: f32, min: f32, max: f32, floor: f32) -> f32 {
    AxisMapping::vertical(min, max, ValueScale::Log10 { floor }).normalize(value)
}

/// `xNorm = clamp((tick - start) / (end - start), 0, 1)`.
///
/// Offsets are taken in integer space before converting, so absolute tick
/// counts of any magnitude keep their resolution.
pub fn map_time(tick: i64, start_tick: i64, end_tick: i64) -> f32 {
    let span = end_tick as i128 - start_tick as i128;
    let offset = tick as i128 - start_tick as i128;
    if span <= 0 {
        return if offset > 0 { 1.0 } else { 0.0 };
    }
    (offset as f64 / span as f64).clamp(0.0, 1.0) as f32
}

fn sanitize_floor(floor: f32) -> f64 {
    if floor.is_finite() && floor > 0.0 {
        floor as f64
    } else {
        DEFAULT_LOG_FLOOR as f64
    }
}

fn log_floored(value: f64, floor: f64) -> f64 {
    if value.is_nan() {
        return floor.log10();
    }
    value.max(floor).log10()
}

fn widen(lo: f64, hi: f64) -> (f64, f64) {
    let lo = if lo.is_finite() { lo } else { 0.0 };
    let hi = if hi.is_finite() { hi } else { lo };
    if hi <= lo {
        // Relative widening keeps large magnitudes from rounding back to `lo`
        let span = DEGENERATE_RANGE_EPSILON.max(lo.abs() * f64::EPSILON * 4.0);
        (lo, lo + span)
    } else {
        (lo, hi)
    }
}
