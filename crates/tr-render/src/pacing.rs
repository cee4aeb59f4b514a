use std::time::Instant;

/// Smoothing factor applied to each new interval
pub const DEFAULT_SMOOTHING: f32 = 0.2;

/// Tracks how often render calls arrive, as an exponential moving average
/// of the instantaneous rate in Hz.
#[derive(Debug, Clone)]
pub struct UpdateRateEstimator {
    smoothing: f32,
    last: Option<Instant>,
    rate_hz: f32,
}

impl Default for UpdateRateEstimator {
    fn default() -> Self {
        Self::new(DEFAULT_SMOOTHING)
    }
}

impl UpdateRateEstimator {
    pub fn new(smoothing: f32) -> Self {
        let smoothing = if smoothing.is_finite() { smoothing.clamp(0.01, 1.0) } else { DEFAULT_SMOOTHING };
        Self {
            smoothing,
            last: None,
            rate_hz: 0.0,
        }
    }

    /// Record a call at `now` and return the updated estimate.
    ///
    /// The first call has no interval to measure and reports 0 Hz.
    pub fn record(&mut self, now: Instant) -> f32 {
        let Some(last) = self.last else {
            self.last = Some(now);
            return self.rate_hz;
        };
        let dt = now.saturating_duration_since(last).as_secs_f32();
        if dt <= 0.0 {
            return self.rate_hz;
        }
        self.last = Some(now);

        let instant = 1.0 / dt;
        self.rate_hz = if self.rate_hz == 0.0 {
            instant
        } else {
            self.rate_hz + self.smoothing * (instant - self.rate_hz)
        };
        self.rate_hz
    }

    pub fn rate_hz(&self) -> f32 {
        self.rate_hz
    }

    pub fn reset(&mut self) {
        self.last = None;
        self.rate_hz = 0.0;
    }
}
