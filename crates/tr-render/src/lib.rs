//! Rendering layer
//!
//! This crate turns telemetry arrays into BGRA8 pixel buffers. Coordinate
//! transforms run on the host or on a GPU compute device; rasterization
//! always runs on the CPU, fanned out over rayon workers.

pub mod engine;
pub mod error;
pub mod pacing;
pub mod raster;
pub mod renderer;
pub mod spectrogram;
pub mod transform;

pub use engine::ParallelEngine;
pub use error::RenderError;
pub use pacing::UpdateRateEstimator;
pub use raster::Canvas;
pub use renderer::{AdaptiveRenderer, ChartId, FrameReport, PixelTarget, RendererCapabilities};
pub use spectrogram::{render_spectrogram, SpectrogramScroller};
pub use transform::{DomainTransform, GpuTransform, HostTransform};
