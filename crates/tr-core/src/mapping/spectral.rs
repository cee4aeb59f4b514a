//! Frequency (Hz) to FFT bin mapping

use serde::{Deserialize, Serialize};

/// Result of mapping a frequency window onto FFT bins
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinWindow {
    /// Inclusive bin range `[first, last]`
    Range { first: usize, last: usize },
    /// The window was empty or inverted; use the whole magnitude array
    Full,
}

impl BinWindow {
    /// Slice `magnitudes` down to the window, clamping `last` to the bins
    /// actually supplied. A window that starts past the end keeps the whole
    /// array.
    pub fn apply<'a>(&self, magnitudes: &'a [f32]) -> &'a [f32] {
        match *self {
            BinWindow::Range { first, last } => {
                let last = last.min(magnitudes.len().saturating_sub(1));
                if magnitudes.is_empty() || last < first {
                    magnitudes
                } else {
                    &magnitudes[first..=last]
                }
            }
            BinWindow::Full => magnitudes,
        }
    }
}

/// Frequency axis of a real FFT with `fft_length / 2 + 1` magnitude bins
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpectralAxis {
    pub sample_rate: f32,
    pub fft_length: usize,
}

impl SpectralAxis {
    pub fn new(sample_rate: f32, fft_length: usize) -> Self {
        Self { sample_rate, fft_length }
    }

    pub fn bins(&self) -> usize {
        self.fft_length / 2 + 1
    }

    pub fn nyquist(&self) -> f32 {
        self.sample_rate / 2.0
    }

    /// `(sampleRate / 2) / (bins - 1)`; zero when the axis is degenerate
    pub fn hz_per_bin(&self) -> f32 {
        let bins = self.bins();
        if bins < 2 || !(self.sample_rate > 0.0) {
            return 0.0;
        }
        self.nyquist() / (bins - 1) as f32
    }

    /// Nearest bin to `hz`, clamped to valid indices
    pub fn hz_to_bin(&self, hz: f32) -> usize {
        let per_bin = self.hz_per_bin();
        if per_bin <= 0.0 || !hz.is_finite() || hz <= 0.0 {
            return 0;
        }
        ((hz / per_bin).round() as usize).min(self.bins() - 1)
    }

    pub fn bin_to_hz(&self, bin: usize) -> f32 {
        bin.min(self.bins().saturating_sub(1)) as f32 * self.hz_per_bin()
    }

    /// Map `[min_hz, max_hz]` to `[floor(min / hzPerBin), ceil(max / hzPerBin)]`,
    /// clamped to valid bins. Empty, inverted or non-finite windows come back
    /// as [`BinWindow::Full`].
    pub fn bin_window(&self, min_hz: f32, max_hz: f32) -> BinWindow {
        let per_bin = self.hz_per_bin();
        if per_bin <= 0.0 || !min_hz.is_finite() || !max_hz.is_finite() {
            return BinWindow::Full;
        }
        let last_bin = (self.bins() - 1) as f32;
        let first = (min_hz / per_bin).floor().clamp(0.0, last_bin) as usize;
        let last = (max_hz / per_bin).ceil().clamp(0.0, last_bin) as usize;
        if last < first {
            return BinWindow::Full;
        }
        BinWindow::Range { first, last }
    }
}
