//! Headless demo driver
//!
//! A producer task streams synthetic samples into a ring buffer while a
//! fixed-rate render tick draws every chart kind into in-memory BGRA8 images.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use parking_lot::Mutex;
use tracing::{error, info};

use tr_core::mapping::format_axis_label;
use tr_core::{AxisMapping, Sample, SpectralAxis, ValueScale};
use tr_data::{RingSnapshot, SampleRingBuffer};
use tr_render::{AdaptiveRenderer, ChartId, FrameReport, PixelTarget, SpectrogramScroller};

mod config;
mod demo;

use config::AppConfig;
use demo::SignalGenerator;

/// Samples pushed per producer wakeup
const PRODUCER_BATCH: usize = 32;

/// Scatter points per frame
const SCATTER_POINTS: usize = 2_000;

const STRIP_CHART: ChartId = ChartId(1);
const LINE_CHART: ChartId = ChartId(2);
const SCATTER_CHART: ChartId = ChartId(3);
const SPECTRUM_CHART: ChartId = ChartId(4);

/// Images and scratch arrays reused across render ticks
struct Surfaces {
    line: Vec<u8>,
    scatter: Vec<u8>,
    strip: Vec<u8>,
    spectrum: Vec<u8>,
    spectrogram: SpectrogramScroller,
    snapshot: RingSnapshot,
    ticks: Vec<i64>,
    values: Vec<f32>,
    xs: Vec<f32>,
    ys: Vec<f32>,
    magnitudes: Vec<f32>,
}

impl Surfaces {
    fn new(config: &AppConfig) -> Result<Self> {
        let image = tr_core::required_buffer_len(config.width, config.height);
        Ok(Self {
            line: vec![0; image],
            scatter: vec![0; image],
            strip: vec![0; image],
            spectrum: vec![0; image],
            spectrogram: SpectrogramScroller::new(config.spectrogram)
                .context("Invalid spectrogram configuration")?,
            snapshot: RingSnapshot::default(),
            ticks: Vec::new(),
            values: Vec::new(),
            xs: Vec::new(),
            ys: Vec::new(),
            magnitudes: Vec::new(),
        })
    }
}

/// Reports from one render tick
#[derive(Debug, Default)]
struct TickReports {
    reports: Vec<(&'static str, FrameReport)>,
}

fn render_tick(
    renderer: &AdaptiveRenderer,
    ring: &SampleRingBuffer,
    surfaces: &mut Surfaces,
    config: &AppConfig,
    frame: usize,
) -> Result<TickReports> {
    let (width, height) = (config.width, config.height);
    let y_axis = AxisMapping::vertical(config.y_min, config.y_max, ValueScale::Linear);
    let mut out = TickReports::default();

    // Strip chart over the most recent window
    ring.snapshot_into(&mut surfaces.snapshot);
    let report = renderer.render_ring(
        &surfaces.snapshot,
        &mut PixelTarget::new(&mut surfaces.strip, width, height).with_chart(STRIP_CHART),
        config.window_ticks,
        &y_axis,
        &config.strip,
    )?;
    out.reports.push(("strip", report));

    // The whole ring as a line chart
    surfaces
        .snapshot
        .write_ordered(&mut surfaces.ticks, &mut surfaces.values);
    let report = renderer.render_line(
        &surfaces.values,
        &mut PixelTarget::new(&mut surfaces.line, width, height).with_chart(LINE_CHART),
        &y_axis,
        &config.line,
    )?;
    out.reports.push(("line", report));

    demo::lissajous(frame, SCATTER_POINTS, &mut surfaces.xs, &mut surfaces.ys);
    let unit = AxisMapping::horizontal(-1.1, 1.1, ValueScale::Linear);
    let report = renderer.render_scatter(
        &surfaces.xs,
        &surfaces.ys,
        &mut PixelTarget::new(&mut surfaces.scatter, width, height).with_chart(SCATTER_CHART),
        &unit,
        &AxisMapping { invert: true, ..unit },
        &config.scatter,
    )?;
    out.reports.push(("scatter", report));

    let spectro = config.spectrogram;
    let axis = SpectralAxis::new(spectro.sample_rate, spectro.fft_length);
    demo::sweeping_spectrum(&axis, frame, &mut surfaces.magnitudes);
    let scale = if config.log_spectrum {
        ValueScale::log10()
    } else {
        ValueScale::Linear
    };
    let report = renderer.render_spectrum(
        &surfaces.magnitudes,
        &mut PixelTarget::new(&mut surfaces.spectrum, width, height).with_chart(SPECTRUM_CHART),
        &axis,
        (spectro.min_hz, spectro.max_hz),
        &AxisMapping::vertical(1e-4, 1.0, scale),
        &config.line,
    )?;
    out.reports.push(("spectrum", report));

    let columns = surfaces
        .spectrogram
        .push_frame(&surfaces.magnitudes, Instant::now())?;
    if columns > 0 {
        info!(target: "telerender::spectrogram", "frame {}: {} new columns", frame, columns);
    }

    Ok(out)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = AppConfig::load(config_path.as_deref())?;
    info!(
        "Starting telemetry demo: {}x{} at {:.0} Hz for {} frames",
        config.width, config.height, config.render_hz, config.frames
    );

    let renderer_config = config.renderer.clone();
    let renderer = match tokio::task::spawn_blocking(move || AdaptiveRenderer::new(renderer_config)).await? {
        Ok(renderer) => Arc::new(renderer),
        Err(e) => {
            error!("Failed to create renderer: {}", e);
            return Err(e).context("Renderer initialization failed");
        }
    };
    info!("Capabilities: {:?}", renderer.capabilities());

    let ring = Arc::new(SampleRingBuffer::with_capacity(config.ring_capacity));

    // Producer: batches of samples at the configured rate
    let producer = {
        let ring = ring.clone();
        let sample_rate = config.sample_rate_hz.max(1);
        tokio::spawn(async move {
            let mut generator = SignalGenerator::new(sample_rate);
            let period = Duration::from_secs_f64(PRODUCER_BATCH as f64 / sample_rate as f64);
            let mut interval = tokio::time::interval(period);
            let mut batch: Vec<Sample> = Vec::with_capacity(PRODUCER_BATCH);
            loop {
                interval.tick().await;
                generator.next_batch(PRODUCER_BATCH, &mut batch);
                ring.add_samples(&batch);
            }
        })
    };

    let surfaces = Arc::new(Mutex::new(Surfaces::new(&config)?));
    let config = Arc::new(config);
    let mut interval = tokio::time::interval(Duration::from_secs_f32(1.0 / config.render_hz.max(1.0)));

    for frame in 0..config.frames {
        interval.tick().await;

        let tick = {
            let (r, rg, s, c) = (renderer.clone(), ring.clone(), surfaces.clone(), config.clone());
            tokio::task::spawn_blocking(move || {
                let mut surfaces = s.lock();
                render_tick(&r, &rg, &mut surfaces, &c, frame)
            })
            .await??
        };

        if frame % 60 == 0 {
            for (chart, report) in &tick.reports {
                info!(
                    "frame {} {}: {} primitives via {} in {:?}",
                    frame, chart, report.primitives, report.path, report.elapsed
                );
            }
            let rate = renderer.update_rate_hz(STRIP_CHART);
            info!(
                "{} samples buffered, strip at {:.1} Hz, {}",
                ring.len(),
                rate,
                renderer.mode_reason(ring.len(), rate)
            );
        }
    }

    producer.abort();

    let stats = renderer.pool_stats();
    info!(
        "Pool: {} hits, {} misses, {} buffers retained ({} bytes)",
        stats.hits, stats.misses, stats.retained, stats.retained_bytes
    );
    info!(
        "Y axis {} .. {}",
        format_axis_label(config.y_min as f64),
        format_axis_label(config.y_max as f64)
    );
    Ok(())
}
