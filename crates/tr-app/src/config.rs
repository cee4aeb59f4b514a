//! Demo driver configuration

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tr_core::{LineStyle, RendererConfig, ScatterStyle, SpectrogramConfig, StripStyle};

/// Everything the demo needs, loadable from a JSON file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub renderer: RendererConfig,

    /// Size of the line, scatter, strip and spectrum images
    pub width: usize,
    pub height: usize,

    /// Render ticks to run before exiting
    pub frames: usize,
    pub render_hz: f32,

    /// Synthetic samples produced per second; one tick per sample
    pub sample_rate_hz: u32,
    pub ring_capacity: usize,
    /// Ticks visible in the strip chart
    pub window_ticks: i64,

    pub y_min: f32,
    pub y_max: f32,
    /// Plot the spectrum on a log10 magnitude axis
    pub log_spectrum: bool,

    pub line: LineStyle,
    pub scatter: ScatterStyle,
    pub strip: StripStyle,
    pub spectrogram: SpectrogramConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            renderer: RendererConfig::default(),
            width: 800,
            height: 300,
            frames: 240,
            render_hz: 60.0,
            sample_rate_hz: 2_000,
            ring_capacity: 8_192,
            window_ticks: 4_000,
            y_min: -1.5,
            y_max: 1.5,
            log_spectrum: true,
            line: LineStyle::default(),
            scatter: ScatterStyle::default(),
            strip: StripStyle::default(),
            spectrogram: SpectrogramConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load from `path`, or the defaults when no path is given
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config = serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse config {}", path.display()))?;
        Ok(config)
    }
}
