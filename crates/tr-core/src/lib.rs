//! Core types for the telemetry rendering engine
//!
//! This crate provides the pure building blocks shared by the data and
//! render crates: colors, coordinate mapping, the CPU/GPU selection policy
//! and configuration.

pub mod color;
pub mod config;
pub mod mapping;
pub mod mode;

// Re-export commonly used types
pub use color::{Bgra8, ColorGradient, GradientStop, SPECTROGRAM_GRADIENT};
pub use config::{
    GpuPreference, LineStyle, RendererConfig, ScatterStyle, SpectrogramConfig, StripStyle,
};
pub use mapping::{AxisMapping, BinWindow, PreparedMapping, SpectralAxis, ValueScale};
pub use mode::{
    render_mode_reason, select_render_mode, ExecutionPath, ModeThresholds, RenderMode,
    RenderModeSelector,
};

/// One timestamped telemetry sample
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Sample {
    /// Monotonic tick count
    pub timestamp: i64,
    pub value: f32,
}

impl Sample {
    pub fn new(timestamp: i64, value: f32) -> Self {
        Self { timestamp, value }
    }
}

/// Bytes per BGRA8 pixel
pub const BYTES_PER_PIXEL: usize = 4;

/// Required pixel buffer length for a `width` x `height` image
pub fn required_buffer_len(width: usize, height: usize) -> usize {
    width.saturating_mul(height).saturating_mul(BYTES_PER_PIXEL)
}
