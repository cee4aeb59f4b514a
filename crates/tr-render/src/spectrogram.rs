//! Scrolling spectrogram compositor
//!
//! The image scrolls left as time advances. Each new spectrum paints the
//! freshly exposed columns on the right; rows map to frequency (top row is
//! `max_hz`) and color maps to decibels through a [`ColorGradient`].

use std::time::{Duration, Instant};

use rayon::prelude::*;
use tr_core::{AxisMapping, ColorGradient, PreparedMapping, SpectralAxis, SpectrogramConfig, ValueScale, BYTES_PER_PIXEL};
use tracing::debug;

use crate::error::{check_buffer, RenderError};

/// Magnitudes are floored here before conversion to decibels
pub const MAGNITUDE_FLOOR: f32 = 1e-10;

/// Scroll `pixels` left by `pixel_shift` columns and paint the exposed
/// columns from `magnitudes`.
///
/// A shift of at least the image width clears the whole image and paints
/// only the rightmost column. Returns the number of columns painted; zero
/// shifts and empty spectra leave the buffer untouched.
pub fn render_spectrogram(
    magnitudes: &[f32],
    pixels: &mut [u8],
    pixel_shift: usize,
    config: &SpectrogramConfig,
    gradient: &ColorGradient,
) -> Result<usize, RenderError> {
    let (width, height) = (config.width, config.height);
    let required = check_buffer(pixels.len(), width, height)?;
    if width == 0 || height == 0 || pixel_shift == 0 || magnitudes.is_empty() {
        return Ok(0);
    }

    let (kept, fresh) = if pixel_shift >= width {
        (0, 1)
    } else {
        (width - pixel_shift, pixel_shift)
    };
    let rows = RowMapper::new(config, magnitudes.len());
    let shift_bytes = pixel_shift.min(width) * BYTES_PER_PIXEL;
    let kept_bytes = kept * BYTES_PER_PIXEL;
    let fresh_start = (width - fresh) * BYTES_PER_PIXEL;

    pixels[..required]
        .par_chunks_mut(width * BYTES_PER_PIXEL)
        .enumerate()
        .for_each(|(row, line)| {
            if kept > 0 {
                line.copy_within(shift_bytes.., 0);
            }
            line[kept_bytes..].fill(0);

            let color = gradient.sample(rows.level(row, magnitudes)).to_bytes();
            for px in line[fresh_start..].chunks_exact_mut(BYTES_PER_PIXEL) {
                px.copy_from_slice(&color);
            }
        });

    Ok(fresh)
}

/// Row to frequency to bin to normalized decibel level
struct RowMapper {
    axis: SpectralAxis,
    height: usize,
    min_hz: f32,
    max_hz: f32,
    last_bin: usize,
    db: PreparedMapping,
}

impl RowMapper {
    fn new(config: &SpectrogramConfig, magnitude_count: usize) -> Self {
        let axis = SpectralAxis::new(config.sample_rate, config.fft_length);
        Self {
            axis,
            height: config.height,
            min_hz: config.min_hz,
            max_hz: config.max_hz,
            last_bin: magnitude_count.saturating_sub(1),
            db: AxisMapping::horizontal(config.min_db, config.max_db, ValueScale::Linear).prepare(),
        }
    }

    fn frequency(&self, row: usize) -> f32 {
        let t = if self.height > 1 {
            1.0 - row as f32 / (self.height - 1) as f32
        } else {
            1.0
        };
        let hz = self.min_hz + t * (self.max_hz - self.min_hz);
        hz.clamp(0.0, self.axis.nyquist().max(0.0))
    }

    fn level(&self, row: usize, magnitudes: &[f32]) -> f32 {
        let bin = self.axis.hz_to_bin(self.frequency(row)).min(self.last_bin);
        let magnitude = magnitudes[bin].max(MAGNITUDE_FLOOR);
        self.db.apply(10.0 * magnitude.log10())
    }
}

/// Owns a spectrogram image and scrolls it in wall-clock time
pub struct SpectrogramScroller {
    config: SpectrogramConfig,
    gradient: ColorGradient,
    pixels: Vec<u8>,
    last_frame: Option<Instant>,
}

impl SpectrogramScroller {
    pub fn new(config: SpectrogramConfig) -> Result<Self, RenderError> {
        Self::with_gradient(config, ColorGradient::default())
    }

    pub fn with_gradient(config: SpectrogramConfig, gradient: ColorGradient) -> Result<Self, RenderError> {
        validate(&config)?;
        Ok(Self {
            pixels: vec![0; tr_core::required_buffer_len(config.width, config.height)],
            config,
            gradient,
            last_frame: None,
        })
    }

    pub fn config(&self) -> &SpectrogramConfig {
        &self.config
    }

    /// The current BGRA8 image, `width * height * 4` bytes
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Add one spectrum observed at `now`. Returns the columns painted.
    ///
    /// The first frame always paints one column. After that the shift is the
    /// whole number of columns elapsed since the previous painted frame; a
    /// frame arriving within one column of it paints nothing and leaves the
    /// time reference alone so the elapsed time keeps accumulating.
    pub fn push_frame(&mut self, magnitudes: &[f32], now: Instant) -> Result<usize, RenderError> {
        if magnitudes.is_empty() {
            return Ok(0);
        }

        let seconds_per_pixel = self.config.seconds_per_pixel() as f64;
        let shift = match self.last_frame {
            None => 1,
            Some(prev) => {
                let elapsed = now.saturating_duration_since(prev).as_secs_f64();
                (elapsed / seconds_per_pixel).floor() as usize
            }
        };
        if shift == 0 {
            return Ok(0);
        }

        self.last_frame = Some(match self.last_frame {
            Some(prev) if shift < self.config.width => {
                // Carry the sub-column remainder into the next frame
                prev + Duration::from_secs_f64(shift as f64 * seconds_per_pixel)
            }
            _ => now,
        });

        let painted = render_spectrogram(magnitudes, &mut self.pixels, shift, &self.config, &self.gradient)?;
        debug!("Spectrogram scrolled {} columns, painted {}", shift, painted);
        Ok(painted)
    }

    /// Clear the image and forget the previous frame time
    pub fn reset(&mut self) {
        self.pixels.fill(0);
        self.last_frame = None;
    }

    /// Switch to a new configuration, starting from an empty image
    pub fn reconfigure(&mut self, config: SpectrogramConfig) -> Result<(), RenderError> {
        validate(&config)?;
        self.pixels.clear();
        self.pixels.resize(tr_core::required_buffer_len(config.width, config.height), 0);
        self.config = config;
        self.last_frame = None;
        Ok(())
    }
}

fn validate(config: &SpectrogramConfig) -> Result<(), RenderError> {
    if config.width == 0 || config.height == 0 {
        return Err(RenderError::InvalidConfig(format!(
            "spectrogram size {}x{} is empty",
            config.width, config.height
        )));
    }
    if !(config.visible_seconds.is_finite() && config.visible_seconds > 0.0) {
        return Err(RenderError::InvalidConfig(format!(
            "visible window of {} seconds",
            config.visible_seconds
        )));
    }
    if !(config.sample_rate.is_finite() && config.sample_rate > 0.0) || config.fft_length < 2 {
        return Err(RenderError::InvalidConfig(format!(
            "sample rate {} with FFT length {}",
            config.sample_rate, config.fft_length
        )));
    }
    Ok(())
}
