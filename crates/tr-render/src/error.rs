use thiserror::Error;

/// Errors that can occur while rendering
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RenderError {
    #[error("pixel buffer too small: need {required} bytes, got {actual}")]
    BufferTooSmall { required: usize, actual: usize },

    #[error("GPU unavailable: {0}")]
    GpuUnavailable(String),

    #[error("GPU transform failed: {0}")]
    Gpu(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Check that `actual` bytes can hold a `width` x `height` BGRA8 image
pub fn check_buffer(actual: usize, width: usize, height: usize) -> Result<usize, RenderError> {
    let required = tr_core::required_buffer_len(width, height);
    if actual < required {
        return Err(RenderError::BufferTooSmall { required, actual });
    }
    Ok(required)
}
