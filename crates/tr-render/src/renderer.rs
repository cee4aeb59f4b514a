//! Adaptive CPU/GPU renderer entry points

use std::sync::Arc;
use std::time::{Duration, Instant};

use ahash::AHashMap;
use parking_lot::Mutex;
use tr_core::{
    AxisMapping, ColorGradient, ExecutionPath, GpuPreference, LineStyle, RendererConfig,
    RenderModeSelector, ScatterStyle, SpectralAxis, SpectrogramConfig, StripStyle,
};
use tr_data::{PoolStats, RingSnapshot, ScratchPools};
use tracing::{debug, info, warn};

use crate::engine::ParallelEngine;
use crate::error::{check_buffer, RenderError};
use crate::pacing::UpdateRateEstimator;
use crate::spectrogram;
use crate::transform::{DomainTransform, GpuTransform, HostTransform};

/// Charts idle for longer than this lose their rate history
const STALE_AFTER: Duration = Duration::from_secs(5);

/// Rate estimators kept before idle ones are pruned
const MAX_TRACKED_CHARTS: usize = 64;

/// Identifies one chart for update-rate tracking
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChartId(pub u64);

impl ChartId {
    /// Key derived from the address of a pixel buffer
    pub fn of_buffer(pixels: &[u8]) -> Self {
        Self(pixels.as_ptr() as usize as u64)
    }
}

/// A caller-owned BGRA8 image to render into
pub struct PixelTarget<'a> {
    pub pixels: &'a mut [u8],
    pub width: usize,
    pub height: usize,
    /// Chart whose refresh rate this call counts toward
    pub chart: ChartId,
}

impl<'a> PixelTarget<'a> {
    /// Target keyed by its buffer address, so each reused buffer counts as
    /// its own chart. Use [`PixelTarget::with_chart`] when buffers move.
    pub fn new(pixels: &'a mut [u8], width: usize, height: usize) -> Self {
        let chart = ChartId::of_buffer(pixels);
        Self {
            pixels,
            width,
            height,
            chart,
        }
    }

    pub fn with_chart(mut self, chart: ChartId) -> Self {
        self.chart = chart;
        self
    }

    /// The `width * height * 4` prefix that holds the image
    fn image(&mut self) -> &mut [u8] {
        let len = tr_core::required_buffer_len(self.width, self.height).min(self.pixels.len());
        &mut self.pixels[..len]
    }
}

/// Outcome of one render call
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameReport {
    /// Path the coordinate transform actually ran on
    pub path: ExecutionPath,
    /// Segments, dots or spectrogram columns painted
    pub primitives: usize,
    pub elapsed: Duration,
    /// `false` when the input was degenerate and the buffer was left alone
    pub drawn: bool,
}

impl FrameReport {
    fn skipped(start: Instant) -> Self {
        Self {
            path: ExecutionPath::Cpu,
            primitives: 0,
            elapsed: start.elapsed(),
            drawn: false,
        }
    }
}

/// What the renderer can do on this machine
#[derive(Debug, Clone, PartialEq)]
pub struct RendererCapabilities {
    pub gpu_available: bool,
    pub adapter_name: Option<String>,
    /// Values one GPU dispatch can hold, 0 without a GPU
    pub max_gpu_elements: usize,
    pub worker_threads: usize,
    pub band_rows: usize,
}

/// Renders line, scatter, strip, spectrum and spectrogram charts, picking the
/// CPU or GPU transform per call.
///
/// Calls are synchronous. The renderer may be shared between threads, but
/// callers must not render into the same pixel buffer concurrently.
pub struct AdaptiveRenderer {
    config: RendererConfig,
    selector: RenderModeSelector,
    pools: Arc<ScratchPools>,
    engine: ParallelEngine,
    host: HostTransform,
    gpu: Option<GpuTransform>,
    rates: Mutex<AHashMap<ChartId, ChartRate>>,
    gradient: ColorGradient,
}

impl AdaptiveRenderer {
    /// Build a renderer, opening a GPU according to `config.gpu`.
    ///
    /// Fails with [`RenderError::GpuUnavailable`] only when a GPU is
    /// required and none can be opened.
    pub fn new(config: RendererConfig) -> Result<Self, RenderError> {
        let pools = Arc::new(ScratchPools::new(config.pool_buffers_per_class));
        let gpu = match config.gpu {
            GpuPreference::Disabled => None,
            GpuPreference::Auto => match GpuTransform::new(pools.clone()) {
                Ok(gpu) => Some(gpu),
                Err(e) => {
                    warn!("No GPU, rendering on the CPU only: {}", e);
                    None
                }
            },
            GpuPreference::Required => Some(GpuTransform::new(pools.clone())?),
        };

        info!(
            "Renderer ready: mode {:?}, GPU {}, {} worker threads",
            config.mode,
            gpu.as_ref().map_or("none", |g| g.adapter_name()),
            rayon::current_num_threads()
        );

        Ok(Self {
            selector: RenderModeSelector::new(config.thresholds),
            engine: ParallelEngine::new(pools.clone(), config.band_rows),
            pools,
            host: HostTransform,
            gpu,
            rates: Mutex::new(AHashMap::new()),
            gradient: ColorGradient::default(),
            config,
        })
    }

    /// Replace the spectrogram color gradient
    pub fn with_gradient(mut self, gradient: ColorGradient) -> Self {
        self.gradient = gradient;
        self
    }

    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    pub fn gpu_available(&self) -> bool {
        self.gpu.is_some()
    }

    /// Smoothed refresh rate of `chart` in Hz, 0 before its second call
    pub fn update_rate_hz(&self, chart: ChartId) -> f32 {
        self.rates.lock().get(&chart).map_or(0.0, |r| r.estimator.rate_hz())
    }

    /// Forget the refresh history of `chart`
    pub fn reset_rate(&self, chart: ChartId) {
        self.rates.lock().remove(&chart);
    }

    /// Float scratch pool statistics
    pub fn pool_stats(&self) -> PoolStats {
        self.pools.floats.stats()
    }

    pub fn capabilities(&self) -> RendererCapabilities {
        RendererCapabilities {
            gpu_available: self.gpu.is_some(),
            adapter_name: self.gpu.as_ref().map(|g| g.adapter_name().to_string()),
            max_gpu_elements: self.gpu.as_ref().map_or(0, |g| g.max_elements()),
            worker_threads: rayon::current_num_threads(),
            band_rows: self.engine.band_rows(),
        }
    }

    /// The path a call with this workload would take right now
    pub fn select_mode(&self, point_count: usize, update_frequency_hz: f32) -> ExecutionPath {
        self.selector
            .select(point_count, update_frequency_hz, self.config.mode, self.gpu.is_some())
    }

    /// Diagnostic explanation for [`AdaptiveRenderer::select_mode`]
    pub fn mode_reason(&self, point_count: usize, update_frequency_hz: f32) -> String {
        self.selector
            .reason(point_count, update_frequency_hz, self.config.mode, self.gpu.is_some())
    }

    /// Line chart of `values` spread evenly across the width
    pub fn render_line(
        &self,
        values: &[f32],
        target: &mut PixelTarget<'_>,
        y_axis: &AxisMapping,
        style: &LineStyle,
    ) -> Result<FrameReport, RenderError> {
        let start = Instant::now();
        let Some(mut path) = self.begin(target, values.len(), 2)? else {
            return Ok(FrameReport::skipped(start));
        };

        let mut norm_y = self.pools.floats.checkout(values.len());
        self.normalize(&mut path, values, y_axis, &mut norm_y)?;

        let (width, height) = (target.width, target.height);
        let pixels = target.image();
        self.engine.clear(pixels, width, self.config.background);
        let primitives = self.engine.line(&norm_y, pixels, width, height, style);
        Ok(finish("line", path, primitives, start))
    }

    /// One dot per `(xs[i], ys[i])` pair
    pub fn render_scatter(
        &self,
        xs: &[f32],
        ys: &[f32],
        target: &mut PixelTarget<'_>,
        x_axis: &AxisMapping,
        y_axis: &AxisMapping,
        style: &ScatterStyle,
    ) -> Result<FrameReport, RenderError> {
        let start = Instant::now();
        let n = xs.len().min(ys.len());
        let Some(mut path) = self.begin(target, n, 1)? else {
            return Ok(FrameReport::skipped(start));
        };

        let mut norm_x = self.pools.floats.checkout(n);
        let mut norm_y = self.pools.floats.checkout(n);
        self.normalize(&mut path, &xs[..n], x_axis, &mut norm_x)?;
        self.normalize(&mut path, &ys[..n], y_axis, &mut norm_y)?;

        let (width, height) = (target.width, target.height);
        let pixels = target.image();
        self.engine.clear(pixels, width, self.config.background);
        let primitives = self.engine.scatter(&norm_x, &norm_y, pixels, width, height, style);
        Ok(finish("scatter", path, primitives, start))
    }

    /// Strip chart of timestamped values over the tick window `[start, end]`
    pub fn render_strip(
        &self,
        ticks: &[i64],
        values: &[f32],
        target: &mut PixelTarget<'_>,
        window: (i64, i64),
        y_axis: &AxisMapping,
        style: &StripStyle,
    ) -> Result<FrameReport, RenderError> {
        let start = Instant::now();
        let n = ticks.len().min(values.len());
        let Some(mut path) = self.begin(target, n, 1)? else {
            return Ok(FrameReport::skipped(start));
        };

        let mut norm_x = self.pools.floats.checkout(n);
        let mut norm_y = self.pools.floats.checkout(n);
        self.normalize_ticks(&mut path, &ticks[..n], window, &mut norm_x)?;
        self.normalize(&mut path, &values[..n], y_axis, &mut norm_y)?;

        let (width, height) = (target.width, target.height);
        let pixels = target.image();
        self.engine.clear(pixels, width, self.config.background);
        let primitives =
            self.engine
                .strip(&ticks[..n], &norm_x, &norm_y, window, pixels, width, height, style);
        Ok(finish("strip", path, primitives, start))
    }

    /// Strip chart straight from a ring snapshot, showing the `span` ticks
    /// up to the newest sample
    pub fn render_ring(
        &self,
        snapshot: &RingSnapshot,
        target: &mut PixelTarget<'_>,
        span: i64,
        y_axis: &AxisMapping,
        style: &StripStyle,
    ) -> Result<FrameReport, RenderError> {
        check_buffer(target.pixels.len(), target.width, target.height)?;
        let Some(latest) = snapshot.latest() else {
            return Ok(FrameReport::skipped(Instant::now()));
        };
        let window = (latest.timestamp.saturating_sub(span.max(0)), latest.timestamp);

        let range = snapshot.window_range(window.0);
        let mut ticks = self.pools.ticks.checkout(range.len());
        let mut values = self.pools.floats.checkout(range.len());
        snapshot.copy_range(range, &mut ticks, &mut values);
        self.render_strip(&ticks, &values, target, window, y_axis, style)
    }

    /// FFT magnitudes as a line chart over the `hz` window.
    ///
    /// The bin range is clamped to the magnitudes supplied. A window that
    /// maps to an empty or inverted range plots the whole spectrum.
    pub fn render_spectrum(
        &self,
        magnitudes: &[f32],
        target: &mut PixelTarget<'_>,
        axis: &SpectralAxis,
        hz: (f32, f32),
        y_axis: &AxisMapping,
        style: &LineStyle,
    ) -> Result<FrameReport, RenderError> {
        let visible = axis.bin_window(hz.0, hz.1).apply(magnitudes);
        self.render_line(visible, target, y_axis, style)
    }

    /// Scroll a caller-owned spectrogram image by `pixel_shift` columns and
    /// paint the new columns from `magnitudes`
    pub fn render_spectrogram(
        &self,
        magnitudes: &[f32],
        pixels: &mut [u8],
        pixel_shift: usize,
        config: &SpectrogramConfig,
    ) -> Result<FrameReport, RenderError> {
        let start = Instant::now();
        let columns = spectrogram::render_spectrogram(magnitudes, pixels, pixel_shift, config, &self.gradient)?;
        if columns == 0 {
            return Ok(FrameReport::skipped(start));
        }
        Ok(finish("spectrogram", ExecutionPath::Cpu, columns, start))
    }

    /// Validate the target and pick a path; `None` for degenerate input
    fn begin(
        &self,
        target: &PixelTarget<'_>,
        points: usize,
        min_points: usize,
    ) -> Result<Option<ExecutionPath>, RenderError> {
        check_buffer(target.pixels.len(), target.width, target.height)?;
        if target.width == 0 || target.height == 0 || points < min_points {
            return Ok(None);
        }
        let rate = self.record_rate(target.chart, Instant::now());
        Ok(Some(self.select_mode(points, rate)))
    }

    fn record_rate(&self, chart: ChartId, now: Instant) -> f32 {
        let mut rates = self.rates.lock();
        if rates.len() >= MAX_TRACKED_CHARTS && !rates.contains_key(&chart) {
            rates.retain(|_, r| now.saturating_duration_since(r.last_seen) < STALE_AFTER);
        }
        let entry = rates.entry(chart).or_insert_with(|| ChartRate {
            estimator: UpdateRateEstimator::default(),
            last_seen: now,
        });
        entry.last_seen = now;
        entry.estimator.record(now)
    }

    fn transform(&self, path: ExecutionPath) -> &dyn DomainTransform {
        match (path, &self.gpu) {
            (ExecutionPath::Gpu, Some(gpu)) => gpu as &dyn DomainTransform,
            _ => &self.host,
        }
    }

    /// Normalize on `path`, dropping to the host if the device fails
    fn normalize(
        &self,
        path: &mut ExecutionPath,
        input: &[f32],
        mapping: &AxisMapping,
        out: &mut [f32],
    ) -> Result<(), RenderError> {
        let transform = self.transform(*path);
        match transform.normalize(input, mapping, out) {
            Err(RenderError::Gpu(e)) => {
                warn!("GPU transform failed, retrying on the host: {}", e);
                *path = ExecutionPath::Cpu;
                self.host.normalize(input, mapping, out)
            }
            result => result,
        }
    }

    fn normalize_ticks(
        &self,
        path: &mut ExecutionPath,
        ticks: &[i64],
        window: (i64, i64),
        out: &mut [f32],
    ) -> Result<(), RenderError> {
        let transform = self.transform(*path);
        match transform.normalize_ticks(ticks, window.0, window.1, out) {
            Err(RenderError::Gpu(e)) => {
                warn!("GPU transform failed, retrying on the host: {}", e);
                *path = ExecutionPath::Cpu;
                self.host.normalize_ticks(ticks, window.0, window.1, out)
            }
            result => result,
        }
    }
}

/// Refresh history of one chart
#[derive(Debug)]
struct ChartRate {
    estimator: UpdateRateEstimator,
    last_seen: Instant,
}

fn finish(chart: &str, path: ExecutionPath, primitives: usize, start: Instant) -> FrameReport {
    let elapsed = start.elapsed();
    debug!("Rendered {} chart via {}: {} primitives in {:?}", chart, path, primitives, elapsed);
    FrameReport {
        path,
        primitives,
        elapsed,
        drawn: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tr_core::{Bgra8, RenderMode, ValueScale};

    fn cpu_renderer() -> AdaptiveRenderer {
        AdaptiveRenderer::new(RendererConfig::cpu_only()).unwrap()
    }

    #[test]
    fn test_cpu_only_has_no_gpu() {
        let renderer = cpu_renderer();
        assert!(!renderer.gpu_available());
        let caps = renderer.capabilities();
        assert!(!caps.gpu_available);
        assert_eq!(caps.max_gpu_elements, 0);
        assert_eq!(caps.band_rows, 16);
    }

    #[test]
    fn test_gpu_request_falls_back_without_device() {
        let config = RendererConfig {
            mode: RenderMode::Gpu,
            gpu: GpuPreference::Disabled,
            ..RendererConfig::default()
        };
        let renderer = AdaptiveRenderer::new(config).unwrap();
        assert_eq!(renderer.select_mode(100_000, 60.0), ExecutionPath::Cpu);
        assert!(renderer.mode_reason(100_000, 60.0).contains("falling back"));

        let mut pixels = vec![0u8; 8 * 8 * 4];
        let report = renderer
            .render_line(
                &[0.0, 1.0],
                &mut PixelTarget::new(&mut pixels, 8, 8),
                &AxisMapping::vertical(0.0, 1.0, ValueScale::Linear),
                &LineStyle::default(),
            )
            .unwrap();
        assert_eq!(report.path, ExecutionPath::Cpu);
        assert!(report.drawn);
    }

    #[test]
    fn test_line_clears_to_background() {
        let config = RendererConfig {
            background: Bgra8::BLACK,
            ..RendererConfig::cpu_only()
        };
        let renderer = AdaptiveRenderer::new(config).unwrap();
        let mut pixels = vec![0x55u8; 6 * 6 * 4];
        renderer
            .render_line(
                &[1.0, 1.0],
                &mut PixelTarget::new(&mut pixels, 6, 6),
                &AxisMapping::vertical(0.0, 1.0, ValueScale::Linear),
                &LineStyle { color: Bgra8::WHITE, thickness: 2.0 },
            )
            .unwrap();
        // The flat line at max value sits on the top row
        assert_eq!(&pixels[..4], &Bgra8::WHITE.to_bytes());
        assert_eq!(&pixels[5 * 6 * 4..5 * 6 * 4 + 4], &Bgra8::BLACK.to_bytes());
    }

    #[test]
    fn test_degenerate_input_is_noop() {
        let renderer = cpu_renderer();
        let mut pixels = vec![0x33u8; 4 * 4 * 4];
        let y = AxisMapping::vertical(0.0, 1.0, ValueScale::Linear);

        let report = renderer
            .render_line(&[0.5], &mut PixelTarget::new(&mut pixels, 4, 4), &y, &LineStyle::default())
            .unwrap();
        assert!(!report.drawn);

        let report = renderer
            .render_scatter(&[], &[], &mut PixelTarget::new(&mut pixels, 4, 4), &y, &y, &ScatterStyle::default())
            .unwrap();
        assert!(!report.drawn);

        let report = renderer
            .render_line(&[0.0, 1.0], &mut PixelTarget::new(&mut pixels, 0, 4), &y, &LineStyle::default())
            .unwrap();
        assert!(!report.drawn);
        assert!(pixels.iter().all(|&b| b == 0x33));
    }

    #[test]
    fn test_spectrum_uses_bin_window() {
        let renderer = cpu_renderer();
        let axis = SpectralAxis::new(8.0, 8);
        let mags = [0.0, 0.0, 1.0, 1.0, 0.0];
        let mut pixels = vec![0u8; 3 * 3 * 4];
        // 2-3 Hz selects bins 2..=3, a flat line at the top
        let report = renderer
            .render_spectrum(
                &mags,
                &mut PixelTarget::new(&mut pixels, 3, 3),
                &axis,
                (2.0, 3.0),
                &AxisMapping::vertical(0.0, 1.0, ValueScale::Linear),
                &LineStyle { color: Bgra8::WHITE, thickness: 2.0 },
            )
            .unwrap();
        assert!(report.drawn);
        assert_eq!(&pixels[..4], &Bgra8::WHITE.to_bytes());
        assert!(pixels[2 * 3 * 4..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_spectrum_window_clamps_to_short_input() {
        let renderer = cpu_renderer();
        // 5 bins on the axis but only 4 magnitudes supplied
        let axis = SpectralAxis::new(8.0, 8);
        let mags = [1.0, 1.0, 0.0, 0.0];
        let mut pixels = vec![0u8; 4 * 4 * 4];
        let report = renderer
            .render_spectrum(
                &mags,
                &mut PixelTarget::new(&mut pixels, 4, 4),
                &axis,
                (2.0, 4.0),
                &AxisMapping::vertical(0.0, 1.0, ValueScale::Linear),
                &LineStyle { color: Bgra8::WHITE, thickness: 2.0 },
            )
            .unwrap();
        assert!(report.drawn);
        // Bins 2..=3 are silent, so nothing reaches the top row
        assert!(pixels[..4 * 4].iter().all(|&b| b == 0));
        assert!(pixels[3 * 4 * 4..].iter().any(|&b| b != 0));
    }

    #[test]
    fn test_ring_snapshot_strip() {
        let renderer = cpu_renderer();
        let ring = tr_data::SampleRingBuffer::with_capacity(16);
        let mut pixels = vec![0u8; 8 * 8 * 4];
        let y = AxisMapping::vertical(0.0, 1.0, ValueScale::Linear);

        let report = renderer
            .render_ring(&ring.snapshot(), &mut PixelTarget::new(&mut pixels, 8, 8), 10, &y, &StripStyle::default())
            .unwrap();
        assert!(!report.drawn);

        for t in 0..12 {
            ring.add_sample(0.5, t * 10);
        }
        let report = renderer
            .render_ring(&ring.snapshot(), &mut PixelTarget::new(&mut pixels, 8, 8), 30, &y, &StripStyle::default())
            .unwrap();
        // Window 80..=110 plus the sample at 70 entering from the left
        assert!(report.drawn);
        assert_eq!(report.primitives, 4);
        assert!(pixels.iter().any(|&b| b != 0));
    }

    #[test]
    fn test_rate_estimate_grows_with_calls() {
        let renderer = cpu_renderer();
        let y = AxisMapping::vertical(0.0, 1.0, ValueScale::Linear);
        let mut pixels = vec![0u8; 4 * 4 * 4];
        let chart = ChartId(7);
        for _ in 0..3 {
            renderer
                .render_line(
                    &[0.0, 1.0],
                    &mut PixelTarget::new(&mut pixels, 4, 4).with_chart(chart),
                    &y,
                    &LineStyle::default(),
                )
                .unwrap();
            std::thread::sleep(Duration::from_millis(2));
        }
        assert!(renderer.update_rate_hz(chart) > 0.0);
        assert_eq!(renderer.update_rate_hz(ChartId(8)), 0.0);

        renderer.reset_rate(chart);
        assert_eq!(renderer.update_rate_hz(chart), 0.0);
    }

    #[test]
    fn test_rate_is_tracked_per_chart() {
        let config = RendererConfig {
            mode: RenderMode::Adaptive,
            ..RendererConfig::cpu_only()
        };
        let renderer = AdaptiveRenderer::new(config).unwrap();

        // Two charts, each refreshed every 100 ms, drawn back to back
        let base = Instant::now();
        for frame in 0..5u32 {
            let now = base + Duration::from_millis(100) * frame;
            for chart in [ChartId(1), ChartId(2)] {
                renderer.record_rate(chart, now + Duration::from_micros(chart.0 * 50));
            }
        }
        for chart in [ChartId(1), ChartId(2)] {
            let hz = renderer.update_rate_hz(chart);
            assert!((hz - 10.0).abs() < 0.5, "chart {:?} at {} Hz", chart, hz);
            assert_eq!(
                renderer.selector.select(2_000, hz, RenderMode::Adaptive, true),
                ExecutionPath::Cpu
            );
        }
    }

    #[test]
    fn test_idle_charts_are_pruned() {
        let renderer = cpu_renderer();
        let base = Instant::now();
        for id in 0..MAX_TRACKED_CHARTS as u64 {
            renderer.record_rate(ChartId(id), base);
        }
        renderer.record_rate(ChartId(1_000), base + STALE_AFTER * 2);
        let rates = renderer.rates.lock();
        assert_eq!(rates.len(), 1);
        assert!(rates.contains_key(&ChartId(1_000)));
    }

    #[test]
    fn test_required_gpu_errors_without_device() {
        let config = RendererConfig {
            gpu: GpuPreference::Required,
            ..RendererConfig::default()
        };
        let device = GpuTransform::new(Arc::new(ScratchPools::new(1)));
        match AdaptiveRenderer::new(config) {
            Ok(renderer) => {
                // A device exists on this host
                assert!(device.is_ok());
                assert!(renderer.gpu_available());
            }
            Err(e) => {
                assert!(device.is_err());
                assert!(matches!(e, RenderError::GpuUnavailable(_)), "{:?}", e);
            }
        }
    }
}
