//! Render configuration
//!
//! Plain immutable data handed to the renderer at construction or per call.
//! Nothing here notifies or observes; a caller that wants different settings
//! builds a new value.

use serde::{Deserialize, Serialize};

use crate::color::Bgra8;
use crate::mode::{ModeThresholds, RenderMode};

/// Whether the renderer should bring up a GPU device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GpuPreference {
    /// Never touch the GPU
    Disabled,
    /// Use a GPU if one can be opened, otherwise run CPU-only
    Auto,
    /// Construction fails if no GPU can be opened
    Required,
}

impl Default for GpuPreference {
    fn default() -> Self {
        GpuPreference::Auto
    }
}

/// Renderer-wide settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    /// Requested execution path
    pub mode: RenderMode,

    /// GPU bring-up policy
    pub gpu: GpuPreference,

    /// Adaptive selection thresholds
    pub thresholds: ModeThresholds,

    /// Pixel rows per fill band in the parallel engine
    pub band_rows: usize,

    /// Color line/scatter/strip buffers are cleared to before drawing
    pub background: Bgra8,

    /// Scratch buffers retained per size class
    pub pool_buffers_per_class: usize,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            mode: RenderMode::Adaptive,
            gpu: GpuPreference::Auto,
            thresholds: ModeThresholds::default(),
            band_rows: 16,
            background: Bgra8::TRANSPARENT,
            pool_buffers_per_class: 8,
        }
    }
}

impl RendererConfig {
    /// CPU-only configuration that never opens a device
    pub fn cpu_only() -> Self {
        Self {
            mode: RenderMode::Cpu,
            gpu: GpuPreference::Disabled,
            ..Self::default()
        }
    }
}

/// Line chart style
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LineStyle {
    pub color: Bgra8,
    /// Full stroke width in pixels
    pub thickness: f32,
}

impl Default for LineStyle {
    fn default() -> Self {
        Self {
            color: Bgra8::WHITE,
            thickness: 1.5,
        }
    }
}

/// Scatter chart style
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScatterStyle {
    pub color: Bgra8,
    pub radius: f32,
}

impl Default for ScatterStyle {
    fn default() -> Self {
        Self {
            color: Bgra8::from_rgb(100, 150, 250),
            radius: 2.0,
        }
    }
}

/// Strip chart style
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StripStyle {
    pub line_color: Bgra8,
    pub line_thickness: f32,
    pub draw_lines: bool,
    pub draw_dots: bool,
    pub dot_color: Bgra8,
    pub dot_radius: f32,
}

impl Default for StripStyle {
    fn default() -> Self {
        Self {
            line_color: Bgra8::from_rgb(150, 250, 100),
            line_thickness: 1.5,
            draw_lines: true,
            draw_dots: false,
            dot_color: Bgra8::from_rgb(250, 150, 100),
            dot_radius: 2.0,
        }
    }
}

/// Scrolling spectrogram settings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpectrogramConfig {
    pub width: usize,
    pub height: usize,
    /// Seconds of history spanning the full width
    pub visible_seconds: f32,
    pub min_db: f32,
    pub max_db: f32,
    pub min_hz: f32,
    pub max_hz: f32,
    pub sample_rate: f32,
    pub fft_length: usize,
}

impl Default for SpectrogramConfig {
    fn default() -> Self {
        Self {
            width: 512,
            height: 256,
            visible_seconds: 10.0,
            min_db: -100.0,
            max_db: 0.0,
            min_hz: 0.0,
            max_hz: 24_000.0,
            sample_rate: 48_000.0,
            fft_length: 1024,
        }
    }
}

impl SpectrogramConfig {
    /// Wall-clock seconds represented by one column
    pub fn seconds_per_pixel(&self) -> f32 {
        if self.width == 0 {
            return f32::INFINITY;
        }
        self.visible_seconds.max(f32::EPSILON) / self.width as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_renderer_config_partial_json() {
        let config: RendererConfig = serde_json::from_str(r#"{ "mode": "Gpu", "band_rows": 4 }"#).unwrap();
        assert_eq!(config.mode, RenderMode::Gpu);
        assert_eq!(config.band_rows, 4);
        assert_eq!(config.gpu, GpuPreference::Auto);
        assert_eq!(config.thresholds.gpu_min_points, 5000);
    }

    #[test]
    fn test_spectrogram_seconds_per_pixel() {
        let config = SpectrogramConfig {
            width: 100,
            visible_seconds: 5.0,
            ..SpectrogramConfig::default()
        };
        assert!((config.seconds_per_pixel() - 0.05).abs() < 1e-6);
    }
}
