use std::collections::BTreeSet;
use std::sync::Arc;
use std::thread;

use tr_core::mapping::map_log_y;
use tr_core::{
    select_render_mode, AxisMapping, Bgra8, ExecutionPath, LineStyle, RenderMode, RendererConfig,
    ScatterStyle, SpectrogramConfig, StripStyle, ValueScale,
};
use tr_data::SampleRingBuffer;
use tr_render::{AdaptiveRenderer, PixelTarget, RenderError};

fn renderer(band_rows: usize) -> AdaptiveRenderer {
    AdaptiveRenderer::new(RendererConfig {
        band_rows,
        ..RendererConfig::cpu_only()
    })
    .unwrap()
}

fn unit_y() -> AxisMapping {
    AxisMapping::vertical(0.0, 1.0, ValueScale::Linear)
}

fn painted(pixels: &[u8], width: usize) -> BTreeSet<(usize, usize)> {
    pixels
        .chunks_exact(4)
        .enumerate()
        .filter(|(_, px)| px.iter().any(|&b| b != 0))
        .map(|(i, _)| (i % width, i / width))
        .collect()
}

#[test]
fn zigzag_line_paints_only_the_path() {
    let renderer = renderer(16);
    let mut pixels = vec![0u8; 4 * 2 * 4];
    let report = renderer
        .render_line(
            &[0.0, 1.0, 0.0, 1.0],
            &mut PixelTarget::new(&mut pixels, 4, 2),
            &unit_y(),
            &LineStyle { color: Bgra8::WHITE, thickness: 1.0 },
        )
        .unwrap();

    assert!(report.drawn);
    assert_eq!(report.path, ExecutionPath::Cpu);
    let expected: BTreeSet<_> = [(0, 1), (1, 0), (2, 1), (3, 0)].into_iter().collect();
    assert_eq!(painted(&pixels, 4), expected);
    for px in pixels.chunks_exact(4) {
        // Gray-white: channels move together
        assert!(px[0] == px[1] && px[1] == px[2]);
    }
}

#[test]
fn ring_of_three_keeps_last_four_ticks() {
    let ring = SampleRingBuffer::with_capacity(3);
    assert_eq!(ring.capacity(), 4);
    for tick in 1..=5 {
        ring.add_sample(tick as f32, tick);
    }
    let ticks: Vec<i64> = ring.snapshot().iter().map(|s| s.timestamp).collect();
    assert_eq!(ticks, vec![2, 3, 4, 5]);
}

#[test]
fn adaptive_selection_thresholds() {
    assert_eq!(select_render_mode(6000, 0.0, RenderMode::Adaptive, true), ExecutionPath::Gpu);
    assert_eq!(select_render_mode(2000, 40.0, RenderMode::Adaptive, true), ExecutionPath::Gpu);
    assert_eq!(select_render_mode(500, 10.0, RenderMode::Adaptive, true), ExecutionPath::Cpu);
    for mode in [RenderMode::Adaptive, RenderMode::Gpu, RenderMode::Cpu] {
        assert_eq!(select_render_mode(1_000_000, 240.0, mode, false), ExecutionPath::Cpu);
    }
}

#[test]
fn undersized_buffers_fail_without_writing() {
    let renderer = renderer(4);
    let y = unit_y();
    let mut pixels = vec![0x7Fu8; 10 * 10 * 4 - 1];

    let err = renderer
        .render_line(&[0.0, 1.0], &mut PixelTarget::new(&mut pixels, 10, 10), &y, &LineStyle::default())
        .unwrap_err();
    assert_eq!(err, RenderError::BufferTooSmall { required: 400, actual: 399 });

    assert!(renderer
        .render_scatter(
            &[0.5],
            &[0.5],
            &mut PixelTarget::new(&mut pixels, 10, 10),
            &y,
            &y,
            &ScatterStyle::default(),
        )
        .is_err());

    assert!(renderer
        .render_strip(
            &[0, 1],
            &[0.0, 1.0],
            &mut PixelTarget::new(&mut pixels, 10, 10),
            (0, 1),
            &y,
            &StripStyle::default(),
        )
        .is_err());

    let config = SpectrogramConfig {
        width: 10,
        height: 10,
        ..SpectrogramConfig::default()
    };
    assert!(renderer.render_spectrogram(&[1.0; 513], &mut pixels, 1, &config).is_err());

    assert!(pixels.iter().all(|&b| b == 0x7F));
}

#[test]
fn band_height_does_not_change_output() {
    let ticks: Vec<i64> = (0..2_000).map(|i| i * 10).collect();
    let values: Vec<f32> = (0..2_000).map(|i| ((i as f32) * 0.05).sin()).collect();
    let y = AxisMapping::vertical(-1.0, 1.0, ValueScale::Linear);
    let style = StripStyle {
        line_thickness: 4.0,
        draw_dots: true,
        ..StripStyle::default()
    };

    let render = |band_rows: usize| {
        let mut pixels = vec![0u8; 203 * 117 * 4];
        renderer(band_rows)
            .render_strip(&ticks, &values, &mut PixelTarget::new(&mut pixels, 203, 117), (5_000, 15_000), &y, &style)
            .unwrap();
        pixels
    };

    let reference = render(1);
    assert!(reference.iter().any(|&b| b != 0));
    for band_rows in [2, 7, 16, 500] {
        assert_eq!(render(band_rows), reference, "band_rows = {}", band_rows);
    }
}

#[test]
fn dense_line_keeps_spikes() {
    let mut values = vec![0.5f32; 100_000];
    values[31_337] = 1.0;
    let mut pixels = vec![0u8; 64 * 32 * 4];
    renderer(8)
        .render_line(
            &values,
            &mut PixelTarget::new(&mut pixels, 64, 32),
            &unit_y(),
            &LineStyle { color: Bgra8::WHITE, thickness: 2.0 },
        )
        .unwrap();
    // The single spike reaches the top row
    assert!(pixels[..64 * 4].chunks_exact(4).any(|px| px[3] > 0));
}

#[test]
fn strip_renders_from_a_live_ring() {
    let ring = Arc::new(SampleRingBuffer::with_capacity(1024));
    let producer = {
        let ring = ring.clone();
        thread::spawn(move || {
            for tick in 0..5_000i64 {
                ring.add_sample(((tick as f32) * 0.01).sin(), tick);
            }
        })
    };

    let renderer = renderer(16);
    let y = AxisMapping::vertical(-1.0, 1.0, ValueScale::Linear);
    let mut pixels = vec![0u8; 128 * 64 * 4];
    let (mut ticks, mut values) = (Vec::new(), Vec::new());
    for _ in 0..20 {
        let snapshot = ring.snapshot();
        let Some(latest) = snapshot.latest() else {
            continue;
        };
        let window = (latest.timestamp - 500, latest.timestamp);
        snapshot.write_window(window.0, &mut ticks, &mut values);
        assert!(ticks.windows(2).all(|w| w[0] < w[1]));
        renderer
            .render_strip(&ticks, &values, &mut PixelTarget::new(&mut pixels, 128, 64), window, &y, &StripStyle::default())
            .unwrap();
    }
    producer.join().unwrap();
    assert_eq!(ring.len(), 1024);
}

#[test]
fn log_axis_floor_is_bottom_and_max_is_top() {
    assert_eq!(map_log_y(1e-6, 0.0, 1e3, 1e-6), 1.0);
    assert_eq!(map_log_y(1e3, 0.0, 1e3, 1e-6), 0.0);
}

#[test]
fn spectrogram_shift_keeps_width_minus_shift_columns() {
    let renderer = renderer(16);
    let config = SpectrogramConfig {
        width: 6,
        height: 4,
        ..SpectrogramConfig::default()
    };
    let loud = vec![1.0f32; 513];
    let mut pixels = vec![0u8; 6 * 4 * 4];

    // Paint every column
    for _ in 0..6 {
        renderer.render_spectrogram(&loud, &mut pixels, 1, &config).unwrap();
    }
    assert!(pixels.chunks_exact(4).all(|px| px[3] == 255));

    let report = renderer.render_spectrogram(&loud, &mut pixels, 2, &config).unwrap();
    assert_eq!(report.primitives, 2);
    assert!(pixels.chunks_exact(4).all(|px| px[3] == 255));

    let report = renderer.render_spectrogram(&loud, &mut pixels, 6, &config).unwrap();
    assert_eq!(report.primitives, 1);
    let opaque = painted(&pixels, 6);
    assert_eq!(opaque, (0..4).map(|y| (5, y)).collect::<BTreeSet<_>>());
}
