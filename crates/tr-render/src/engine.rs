//! Fork-join rasterization of line, scatter and strip charts
//!
//! Each call runs in two parallel phases:
//!
//! 1. Geometry: one partition per output column (line charts) or per data
//!    index (scatter and strip charts) turns normalized coordinates into
//!    pixel-space primitives, written to pooled scratch.
//! 2. Fill: the image is split into horizontal bands of whole rows and every
//!    band paints the primitives that touch it, in partition order.
//!
//! Bands never share bytes, so thick-line joins that straddle partitions are
//! painted exactly as a serial pass would paint them.

use std::sync::Arc;

use rayon::prelude::*;
use tr_core::mapping::to_pixel;
use tr_core::{LineStyle, ScatterStyle, StripStyle, BYTES_PER_PIXEL};
use tr_data::ScratchPools;

use crate::raster::Canvas;

/// Floats per line-chart column: entry piece, min/max envelope, exit piece
const LINE_SLOTS: usize = 12;

/// Floats per strip-chart index: segment to the next sample, then a dot
const STRIP_SLOTS: usize = 6;

/// Parallel rasterization engine
pub struct ParallelEngine {
    pools: Arc<ScratchPools>,
    band_rows: usize,
}

impl ParallelEngine {
    pub fn new(pools: Arc<ScratchPools>, band_rows: usize) -> Self {
        Self {
            pools,
            band_rows: band_rows.max(1),
        }
    }

    pub fn pools(&self) -> &ScratchPools {
        &self.pools
    }

    pub fn band_rows(&self) -> usize {
        self.band_rows
    }

    /// Run `paint` over disjoint row bands of a `width`-wide image
    fn fill_bands<F>(&self, pixels: &mut [u8], width: usize, paint: F)
    where
        F: Fn(&mut Canvas<'_>) + Sync + Send,
    {
        let band_rows = self.band_rows;
        let stride = width * BYTES_PER_PIXEL * band_rows;
        if stride == 0 {
            return;
        }
        pixels
            .par_chunks_mut(stride)
            .enumerate()
            .for_each(|(band, chunk)| {
                let mut canvas = Canvas::band(chunk, width, band * band_rows);
                paint(&mut canvas);
            });
    }

    /// Fill the image with one color
    pub fn clear(&self, pixels: &mut [u8], width: usize, color: tr_core::Bgra8) {
        self.fill_bands(pixels, width, |canvas| canvas.clear(color));
    }

    /// Draw a line chart of normalized y values spread evenly across the
    /// width. Returns the number of segments painted.
    pub fn line(&self, norm_y: &[f32], pixels: &mut [u8], width: usize, height: usize, style: &LineStyle) -> usize {
        if norm_y.len() < 2 || width == 0 || height == 0 {
            return 0;
        }

        let partitions = width.saturating_sub(1).max(1);
        let mut geometry = self.pools.floats.checkout(partitions * LINE_SLOTS);
        let y_scale = to_pixel(1.0, height);
        geometry
            .par_chunks_mut(LINE_SLOTS)
            .enumerate()
            .for_each(|(column, slots)| column_geometry(norm_y, column, width, y_scale, slots));

        let segments = &*geometry;
        let color = style.color;
        let half = style.thickness.max(0.0) * 0.5;
        self.fill_bands(pixels, width, |canvas| {
            for seg in segments.chunks_exact(4) {
                if seg[0].is_nan() {
                    continue;
                }
                let pad = half + 1.0;
                if canvas.overlaps_rows(seg[1].min(seg[3]) - pad, seg[1].max(seg[3]) + pad) {
                    canvas.draw_thick_line([seg[0], seg[1]], [seg[2], seg[3]], color, half);
                }
            }
        });

        segments.chunks_exact(4).filter(|s| !s[0].is_nan()).count()
    }

    /// Draw one dot per (x, y) pair. Returns the number of dots.
    pub fn scatter(
        &self,
        norm_x: &[f32],
        norm_y: &[f32],
        pixels: &mut [u8],
        width: usize,
        height: usize,
        style: &ScatterStyle,
    ) -> usize {
        let n = norm_x.len().min(norm_y.len());
        if n == 0 || width == 0 || height == 0 {
            return 0;
        }

        let mut centers = self.pools.floats.checkout(n * 2);
        centers
            .par_chunks_mut(2)
            .enumerate()
            .for_each(|(i, c)| {
                c[0] = to_pixel(norm_x[i], width);
                c[1] = to_pixel(norm_y[i], height);
            });

        let centers = &*centers;
        let color = style.color;
        let radius = style.radius.max(0.0);
        self.fill_bands(pixels, width, |canvas| {
            for c in centers.chunks_exact(2) {
                if canvas.overlaps_rows(c[1] - radius, c[1] + radius) {
                    canvas.draw_dot([c[0], c[1]], radius, color);
                }
            }
        });
        n
    }

    /// Draw a strip chart. `ticks` decide visibility against `window`;
    /// `norm_x`/`norm_y` are the already-mapped positions. Returns the number
    /// of primitives painted.
    #[allow(clippy::too_many_arguments)]
    pub fn strip(
        &self,
        ticks: &[i64],
        norm_x: &[f32],
        norm_y: &[f32],
        window: (i64, i64),
        pixels: &mut [u8],
        width: usize,
        height: usize,
        style: &StripStyle,
    ) -> usize {
        let n = ticks.len().min(norm_x.len()).min(norm_y.len());
        if n == 0 || width == 0 || height == 0 || !(style.draw_lines || style.draw_dots) {
            return 0;
        }
        let (start, end) = window;

        let mut geometry = self.pools.floats.checkout(n * STRIP_SLOTS);
        geometry
            .par_chunks_mut(STRIP_SLOTS)
            .enumerate()
            .for_each(|(i, slots)| {
                slots.fill(f32::NAN);
                let here = [to_pixel(norm_x[i], width), to_pixel(norm_y[i], height)];
                if style.draw_lines && i + 1 < n {
                    // Skip segments lying entirely outside the window
                    if ticks[i + 1] >= start && ticks[i] <= end {
                        let next = [to_pixel(norm_x[i + 1], width), to_pixel(norm_y[i + 1], height)];
                        slots[..4].copy_from_slice(&[here[0], here[1], next[0], next[1]]);
                    }
                }
                if style.draw_dots && ticks[i] >= start && ticks[i] <= end {
                    slots[4..].copy_from_slice(&here);
                }
            });

        let geometry = &*geometry;
        let style = *style;
        let half = style.line_thickness.max(0.0) * 0.5;
        let dot_radius = style.dot_radius.max(0.0);
        self.fill_bands(pixels, width, |canvas| {
            // Lines first so dots sit on top
            for slots in geometry.chunks_exact(STRIP_SLOTS) {
                let seg = &slots[..4];
                if seg[0].is_nan() {
                    continue;
                }
                let pad = half + 1.0;
                if canvas.overlaps_rows(seg[1].min(seg[3]) - pad, seg[1].max(seg[3]) + pad) {
                    canvas.draw_thick_line([seg[0], seg[1]], [seg[2], seg[3]], style.line_color, half);
                }
            }
            for slots in geometry.chunks_exact(STRIP_SLOTS) {
                let dot = &slots[4..];
                if dot[0].is_nan() {
                    continue;
                }
                if canvas.overlaps_rows(dot[1] - dot_radius, dot[1] + dot_radius) {
                    canvas.draw_dot([dot[0], dot[1]], dot_radius, style.dot_color);
                }
            }
        });

        geometry
            .chunks_exact(STRIP_SLOTS)
            .map(|s| usize::from(!s[0].is_nan()) + usize::from(!s[4].is_nan()))
            .sum()
    }
}

/// Geometry for line-chart column `column`, the span between pixel columns
/// `column` and `column + 1`.
///
/// Sample `i` sits at `x = i * (width - 1) / (n - 1)`. The column draws the
/// polyline from its left edge to the first sample strictly inside it, a
/// vertical min/max envelope when several samples share the column, and the
/// polyline from the last inside sample to its right edge.
fn column_geometry(norm_y: &[f32], column: usize, width: usize, y_scale: f32, out: &mut [f32]) {
    out.fill(f32::NAN);
    let n = norm_y.len();

    if width < 2 {
        let (lo, hi) = min_max(norm_y);
        out[4..8].copy_from_slice(&[0.0, lo * y_scale, 0.0, hi * y_scale]);
        return;
    }

    let spans = (width - 1) as u64;
    let steps = (n - 1) as u64;
    let c = column as u64;
    let k = steps as f64 / spans as f64;

    let left = [column as f32, sample_at(norm_y, column as f64 * k) * y_scale];
    let right = [(column + 1) as f32, sample_at(norm_y, (column + 1) as f64 * k) * y_scale];

    // Samples with c < i * spans / steps < c + 1, in exact integer arithmetic
    let first = (c * steps / spans + 1) as usize;
    let last = (((c + 1) * steps + spans - 1) / spans).saturating_sub(1) as usize;
    if first > last || first >= n {
        out[..4].copy_from_slice(&[left[0], left[1], right[0], right[1]]);
        return;
    }
    let last = last.min(n - 1);
    let vertex = |i: usize| [(i as f64 / k) as f32, norm_y[i] * y_scale];

    let entry = vertex(first);
    out[..4].copy_from_slice(&[left[0], left[1], entry[0], entry[1]]);
    if last > first {
        let (lo, hi) = min_max(&norm_y[first..=last]);
        let x_mid = ((first + last) as f64 * 0.5 / k) as f32;
        out[4..8].copy_from_slice(&[x_mid, lo * y_scale, x_mid, hi * y_scale]);
    }
    let exit = vertex(last);
    out[8..].copy_from_slice(&[exit[0], exit[1], right[0], right[1]]);
}

/// Linear interpolation at fractional sample index `position`
fn sample_at(values: &[f32], position: f64) -> f32 {
    let last = values.len() - 1;
    let position = position.clamp(0.0, last as f64);
    let i = (position.floor() as usize).min(last);
    let frac = (position - i as f64) as f32;
    if i == last || frac == 0.0 {
        return values[i];
    }
    values[i] + (values[i + 1] - values[i]) * frac
}

fn min_max(values: &[f32]) -> (f32, f32) {
    values
        .iter()
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tr_core::Bgra8;

    fn engine(band_rows: usize) -> ParallelEngine {
        ParallelEngine::new(Arc::new(ScratchPools::default()), band_rows)
    }

    fn serial_line(norm_y: &[f32], width: usize, height: usize, style: &LineStyle) -> Vec<u8> {
        let mut bytes = vec![0u8; width * height * 4];
        let mut canvas = Canvas::new(&mut bytes, width, height).unwrap();
        let partitions = width.saturating_sub(1).max(1);
        let mut slots = vec![0.0; LINE_SLOTS];
        for column in 0..partitions {
            column_geometry(norm_y, column, width, to_pixel(1.0, height), &mut slots);
            for seg in slots.chunks_exact(4) {
                if !seg[0].is_nan() {
                    canvas.draw_thick_line([seg[0], seg[1]], [seg[2], seg[3]], style.color, style.thickness * 0.5);
                }
            }
        }
        bytes
    }

    #[test]
    fn test_column_geometry_exact_vertices() {
        // Four samples over four columns: vertices land on column edges
        let mut slots = vec![0.0; LINE_SLOTS];
        column_geometry(&[0.0, 1.0, 0.0, 1.0], 1, 4, 1.0, &mut slots);
        assert_eq!(&slots[..4], &[1.0, 1.0, 2.0, 0.0]);
        assert!(slots[4].is_nan());
        assert!(slots[8].is_nan());
    }

    #[test]
    fn test_column_geometry_keeps_inner_vertex() {
        // Three samples over four columns: the middle sample sits at x = 1.5
        let mut slots = vec![0.0; LINE_SLOTS];
        column_geometry(&[0.0, 1.0, 0.0], 1, 4, 10.0, &mut slots);
        let expected = [1.0, 20.0 / 3.0, 1.5, 10.0, f32::NAN, f32::NAN, f32::NAN, f32::NAN, 1.5, 10.0, 2.0, 20.0 / 3.0];
        for (got, want) in slots.iter().zip(expected) {
            if want.is_nan() {
                assert!(got.is_nan());
            } else {
                assert!((got - want).abs() < 1e-4, "{} vs {}", got, want);
            }
        }
    }

    #[test]
    fn test_column_geometry_envelope_preserves_peaks() {
        // 101 samples over 3 columns with a single spike in the first column
        let mut values = vec![0.5f32; 101];
        values[20] = 0.0;
        values[30] = 1.0;
        let mut slots = vec![0.0; LINE_SLOTS];
        column_geometry(&values, 0, 3, 100.0, &mut slots);
        assert_eq!(slots[5], 0.0);
        assert_eq!(slots[7], 100.0);
    }

    #[test]
    fn test_line_matches_serial_rendering() {
        let values: Vec<f32> = (0..300).map(|i| ((i as f32) * 0.07).sin() * 0.5 + 0.5).collect();
        let style = LineStyle { color: Bgra8::from_rgb(100, 150, 250), thickness: 3.0 };
        let expected = serial_line(&values, 97, 61, &style);
        for band_rows in [1, 3, 16, 64] {
            let mut bytes = vec![0u8; 97 * 61 * 4];
            engine(band_rows).line(&values, &mut bytes, 97, 61, &style);
            assert_eq!(bytes, expected, "band_rows = {}", band_rows);
        }
    }

    #[test]
    fn test_line_needs_two_points() {
        let mut bytes = vec![0u8; 16 * 16 * 4];
        assert_eq!(engine(4).line(&[0.5], &mut bytes, 16, 16, &LineStyle::default()), 0);
        assert!(bytes.iter().all(|&b| b == 0));
    }

    #[test]
    fn test_single_column_draws_envelope() {
        let mut bytes = vec![0u8; 4 * 8];
        let style = LineStyle { color: Bgra8::WHITE, thickness: 2.0 };
        let drawn = engine(2).line(&[0.0, 1.0, 0.5], &mut bytes, 1, 8, &style);
        assert_eq!(drawn, 1);
        assert!(bytes.chunks_exact(4).all(|px| px[3] > 0));
    }

    #[test]
    fn test_scatter_dots_land_on_mapped_pixels() {
        let mut bytes = vec![0u8; 11 * 11 * 4];
        let style = ScatterStyle { color: Bgra8::WHITE, radius: 0.0 };
        let drawn = engine(4).scatter(&[0.0, 0.5, 1.0], &[1.0, 0.5, 0.0], &mut bytes, 11, 11, &style);
        assert_eq!(drawn, 3);
        let canvas = Canvas::new(&mut bytes, 11, 11).unwrap();
        assert_eq!(canvas.pixel(0, 10), Some(Bgra8::WHITE));
        assert_eq!(canvas.pixel(5, 5), Some(Bgra8::WHITE));
        assert_eq!(canvas.pixel(10, 0), Some(Bgra8::WHITE));
        assert_eq!(canvas.pixel(5, 6), Some(Bgra8::TRANSPARENT));
    }

    #[test]
    fn test_strip_culls_outside_window() {
        let ticks = [0, 10, 20, 30];
        let norm_x = [0.0, 0.0, 0.5, 1.0];
        let norm_y = [0.5, 0.5, 0.5, 0.5];
        let style = StripStyle {
            draw_lines: true,
            draw_dots: true,
            ..StripStyle::default()
        };
        let mut bytes = vec![0u8; 21 * 5 * 4];
        let drawn = engine(2).strip(&ticks, &norm_x, &norm_y, (10, 30), &mut bytes, 21, 5, &style);
        // Segments 0-10, 10-20, 20-30 all touch the window; dots at 10, 20, 30
        assert_eq!(drawn, 6);

        let mut bytes = vec![0u8; 21 * 5 * 4];
        let drawn = engine(2).strip(&ticks, &norm_x, &norm_y, (21, 30), &mut bytes, 21, 5, &style);
        // Only 20-30 and the dot at 30 remain
        assert_eq!(drawn, 2);
    }
}
