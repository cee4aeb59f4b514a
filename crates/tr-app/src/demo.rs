//! Synthetic telemetry for the demo driver

use tr_core::{Sample, SpectralAxis};

/// Noise floor of generated spectra
const SPECTRUM_FLOOR: f32 = 1e-4;

/// Deterministic pseudo-noise in [-1, 1]
fn noise(idx: u64) -> f32 {
    ((idx as f64 * 12345.6789).sin() * 43758.5453).fract() as f32
}

/// Produces a sensor-like signal: two tones, a slow trend and noise
#[derive(Debug, Clone)]
pub struct SignalGenerator {
    sample_rate_hz: f64,
    next_tick: i64,
}

impl SignalGenerator {
    pub fn new(sample_rate_hz: u32) -> Self {
        Self {
            sample_rate_hz: sample_rate_hz.max(1) as f64,
            next_tick: 0,
        }
    }

    /// Value at `tick`
    pub fn value_at(&self, tick: i64) -> f32 {
        let t = tick as f64 / self.sample_rate_hz;
        let tones = (t * std::f64::consts::TAU * 3.0).sin() * 0.8 + (t * std::f64::consts::TAU * 17.0).sin() * 0.2;
        let trend = (t * 0.1).sin() * 0.3;
        (tones + trend) as f32 + noise(tick as u64) * 0.05
    }

    /// The next `count` samples, one tick apart
    pub fn next_batch(&mut self, count: usize, out: &mut Vec<Sample>) {
        out.clear();
        for _ in 0..count {
            out.push(Sample::new(self.next_tick, self.value_at(self.next_tick)));
            self.next_tick += 1;
        }
    }

    pub fn next_tick(&self) -> i64 {
        self.next_tick
    }
}

/// Magnitude spectrum with one peak that sweeps across the band over time
pub fn sweeping_spectrum(axis: &SpectralAxis, frame: usize, out: &mut Vec<f32>) {
    let bins = axis.bins();
    out.clear();
    if bins == 0 {
        return;
    }
    let sweep = (frame as f32 * 0.02).sin() * 0.5 + 0.5;
    let peak = sweep * (bins - 1) as f32;
    let width = (bins as f32 / 64.0).max(1.0);
    for bin in 0..bins {
        let d = (bin as f32 - peak) / width;
        let jitter = noise((frame * bins + bin) as u64).abs() * SPECTRUM_FLOOR;
        out.push((-0.5 * d * d).exp() + SPECTRUM_FLOOR + jitter);
    }
}

/// Lissajous figure for the scatter chart
pub fn lissajous(frame: usize, count: usize, xs: &mut Vec<f32>, ys: &mut Vec<f32>) {
    xs.clear();
    ys.clear();
    let phase = frame as f32 * 0.01;
    for i in 0..count {
        let t = i as f32 / count.max(1) as f32 * std::f32::consts::TAU;
        xs.push((3.0 * t + phase).sin() + noise(i as u64) * 0.02);
        ys.push((2.0 * t).sin() + noise((i + count) as u64) * 0.02);
    }
}
