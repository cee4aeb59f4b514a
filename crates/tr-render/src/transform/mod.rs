//! Domain-to-normalized coordinate transforms
//!
//! The transform is the only stage of a frame that can run on either the host
//! or a GPU compute device. Rasterization always happens on the CPU.

mod gpu;
mod host;

pub use gpu::GpuTransform;
pub use host::HostTransform;

use tr_core::{AxisMapping, ExecutionPath};

use crate::error::RenderError;

/// Maps raw values into normalized [0, 1] space.
///
/// Implementations write `out[..input.len()]`; `out` must be at least as long
/// as the input.
pub trait DomainTransform: Send + Sync {
    /// Which execution path this transform runs on
    fn path(&self) -> ExecutionPath;

    /// Normalize values through `mapping`
    fn normalize(&self, input: &[f32], mapping: &AxisMapping, out: &mut [f32]) -> Result<(), RenderError>;

    /// Normalize ticks against the window `[start, end]`
    fn normalize_ticks(&self, ticks: &[i64], start: i64, end: i64, out: &mut [f32]) -> Result<(), RenderError>;
}

fn check_output(input: usize, output: usize) -> Result<(), RenderError> {
    if output < input {
        return Err(RenderError::InvalidConfig(format!(
            "transform output holds {} values, input has {}",
            output, input
        )));
    }
    Ok(())
}
