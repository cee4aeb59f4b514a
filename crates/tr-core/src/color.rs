//! Pixel colors and gradients

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

/// A single BGRA8 pixel value.
///
/// Fields are declared in memory order so a `Bgra8` can be written into a
/// pixel buffer with [`Bgra8::to_bytes`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Bgra8 {
    pub b: u8,
    pub g: u8,
    pub r: u8,
    pub a: u8,
}

impl Bgra8 {
    pub const TRANSPARENT: Bgra8 = Bgra8::from_rgba(0, 0, 0, 0);
    pub const BLACK: Bgra8 = Bgra8::from_rgb(0, 0, 0);
    pub const WHITE: Bgra8 = Bgra8::from_rgb(255, 255, 255);

    /// Opaque color from red, green and blue components
    pub const fn from_rgb(r: u8, g: u8, b: u8) -> Self {
        Self { b, g, r, a: 255 }
    }

    pub const fn from_rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { b, g, r, a }
    }

    /// Read a pixel back out of a BGRA8 byte quad
    pub fn from_bytes(bytes: [u8; 4]) -> Self {
        Self {
            b: bytes[0],
            g: bytes[1],
            r: bytes[2],
            a: bytes[3],
        }
    }

    pub fn to_bytes(self) -> [u8; 4] {
        [self.b, self.g, self.r, self.a]
    }

    pub fn is_opaque(self) -> bool {
        self.a == 255
    }

    /// Component-wise linear interpolation, `t` clamped to [0, 1]
    pub fn lerp(self, other: Bgra8, t: f32) -> Bgra8 {
        let t = t.clamp(0.0, 1.0);
        let mix = |a: u8, b: u8| (a as f32 + (b as f32 - a as f32) * t).round() as u8;
        Bgra8 {
            b: mix(self.b, other.b),
            g: mix(self.g, other.g),
            r: mix(self.r, other.r),
            a: mix(self.a, other.a),
        }
    }
}

/// A stop in a [`ColorGradient`]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GradientStop {
    /// Position in [0, 1]
    pub position: f32,
    pub color: Bgra8,
}

/// Ordered list of color stops sampled with piecewise-linear interpolation.
///
/// Immutable once built; stops are sorted by position on construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColorGradient {
    stops: Vec<GradientStop>,
}

impl ColorGradient {
    /// Build a gradient from `(position, color)` pairs.
    ///
    /// Positions are clamped to [0, 1]. An empty list yields a gradient that
    /// samples as transparent.
    pub fn new(stops: impl IntoIterator<Item = (f32, Bgra8)>) -> Self {
        let mut stops: Vec<GradientStop> = stops
            .into_iter()
            .map(|(position, color)| GradientStop {
                position: if position.is_finite() { position.clamp(0.0, 1.0) } else { 0.0 },
                color,
            })
            .collect();
        stops.sort_by(|a, b| a.position.total_cmp(&b.position));
        Self { stops }
    }

    pub fn stops(&self) -> &[GradientStop] {
        &self.stops
    }

    /// Color at normalized position `t`.
    ///
    /// Values outside the first/last stop take that stop's color; NaN samples
    /// the first stop.
    pub fn sample(&self, t: f32) -> Bgra8 {
        let (first, last) = match (self.stops.first(), self.stops.last()) {
            (Some(first), Some(last)) => (first, last),
            _ => return Bgra8::TRANSPARENT,
        };
        if t.is_nan() || t <= first.position {
            return first.color;
        }
        if t >= last.position {
            return last.color;
        }

        // First stop strictly past t; guaranteed to exist and be > 0 here
        let upper = self.stops.partition_point(|s| s.position <= t);
        let lo = &self.stops[upper - 1];
        let hi = &self.stops[upper];
        let span = hi.position - lo.position;
        if span <= f32::EPSILON {
            return hi.color;
        }
        lo.color.lerp(hi.color, (t - lo.position) / span)
    }
}

/// Default spectrogram palette: black, navy, purple, red, yellow, white
pub static SPECTROGRAM_GRADIENT: Lazy<ColorGradient> = Lazy::new(|| {
    ColorGradient::new([
        (0.0, Bgra8::from_rgb(0, 0, 0)),
        (0.2, Bgra8::from_rgb(0, 0, 128)),
        (0.4, Bgra8::from_rgb(128, 0, 128)),
        (0.6, Bgra8::from_rgb(255, 0, 0)),
        (0.8, Bgra8::from_rgb(255, 255, 0)),
        (1.0, Bgra8::from_rgb(255, 255, 255)),
    ])
});

impl Default for ColorGradient {
    fn default() -> Self {
        SPECTROGRAM_GRADIENT.clone()
    }
}
