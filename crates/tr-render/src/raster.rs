//! Pixel-level rasterization into BGRA8 buffers
//!
//! A [`Canvas`] covers a horizontal band of an image (possibly the whole
//! image). All drawing takes image-space coordinates with pixel centers on
//! integer positions and is clipped to the band, so disjoint bands can be
//! painted from different threads.

use tr_core::{Bgra8, BYTES_PER_PIXEL};

use crate::error::{check_buffer, RenderError};

/// Segments shorter than this rasterize as a dot
pub const DEGENERATE_SEGMENT_LENGTH: f32 = 0.001;

/// Width of the anti-aliased edge band in pixels
const EDGE_BAND: f32 = 1.0;

/// Mutable view of some rows of a BGRA8 image
pub struct Canvas<'a> {
    bytes: &'a mut [u8],
    width: usize,
    /// First image row covered by `bytes`
    row_offset: usize,
    rows: usize,
}

impl<'a> Canvas<'a> {
    /// Wrap a full `width` x `height` image.
    ///
    /// Fails without touching `bytes` when it is shorter than
    /// `width * height * 4`; any excess past that length is left alone.
    pub fn new(bytes: &'a mut [u8], width: usize, height: usize) -> Result<Self, RenderError> {
        let required = check_buffer(bytes.len(), width, height)?;
        Ok(Self {
            bytes: &mut bytes[..required],
            width,
            row_offset: 0,
            rows: height,
        })
    }

    /// Wrap a band of whole rows starting at image row `row_offset`
    pub(crate) fn band(bytes: &'a mut [u8], width: usize, row_offset: usize) -> Self {
        let stride = width * BYTES_PER_PIXEL;
        let rows = if stride == 0 { 0 } else { bytes.len() / stride };
        Self {
            bytes,
            width,
            row_offset,
            rows,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    /// Rows covered by this canvas
    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn row_offset(&self) -> usize {
        self.row_offset
    }

    /// Whether the image-space span `[y_min, y_max]` touches this band
    pub fn overlaps_rows(&self, y_min: f32, y_max: f32) -> bool {
        let top = self.row_offset as f32;
        let bottom = (self.row_offset + self.rows) as f32 - 1.0;
        y_max >= top && y_min <= bottom
    }

    /// Fill every pixel with `color`
    pub fn clear(&mut self, color: Bgra8) {
        let px = color.to_bytes();
        for chunk in self.bytes.chunks_exact_mut(BYTES_PER_PIXEL) {
            chunk.copy_from_slice(&px);
        }
    }

    #[inline]
    fn offset(&self, x: usize, y: usize) -> Option<usize> {
        if x >= self.width || y < self.row_offset || y >= self.row_offset + self.rows {
            return None;
        }
        Some(((y - self.row_offset) * self.width + x) * BYTES_PER_PIXEL)
    }

    /// Read a pixel in image coordinates
    pub fn pixel(&self, x: usize, y: usize) -> Option<Bgra8> {
        let i = self.offset(x, y)?;
        Some(Bgra8::from_bytes([
            self.bytes[i],
            self.bytes[i + 1],
            self.bytes[i + 2],
            self.bytes[i + 3],
        ]))
    }

    /// Overwrite a pixel
    #[inline]
    pub fn set_pixel(&mut self, x: usize, y: usize, color: Bgra8) {
        if let Some(i) = self.offset(x, y) {
            self.bytes[i..i + BYTES_PER_PIXEL].copy_from_slice(&color.to_bytes());
        }
    }

    /// Composite `color` over the existing pixel with "over" blending.
    ///
    /// `coverage` in [0, 1] scales the source alpha.
    #[inline]
    pub fn blend_pixel(&mut self, x: usize, y: usize, color: Bgra8, coverage: f32) {
        let coverage = coverage.clamp(0.0, 1.0);
        if coverage <= 0.0 {
            return;
        }
        if coverage >= 1.0 && color.is_opaque() {
            self.set_pixel(x, y, color);
            return;
        }
        let Some(i) = self.offset(x, y) else {
            return;
        };

        let src_a = color.a as f32 / 255.0 * coverage;
        let keep = 1.0 - src_a;
        let dst = &mut self.bytes[i..i + BYTES_PER_PIXEL];
        let src = color.to_bytes();
        for c in 0..3 {
            dst[c] = (src[c] as f32 * src_a + dst[c] as f32 * keep).round() as u8;
        }
        dst[3] = (src_a * 255.0 + dst[3] as f32 * keep).round().min(255.0) as u8;
    }

    /// Anti-aliased thick line segment via signed distance.
    ///
    /// Every pixel in the segment's bounding box (inflated by the radius plus
    /// one pixel) is projected onto the segment; pixels within
    /// `half_thickness` are painted, opaque in the interior and blended over
    /// the outer one-pixel band.
    pub fn draw_thick_line(&mut self, p0: [f32; 2], p1: [f32; 2], color: Bgra8, half_thickness: f32) {
        if !(p0[0].is_finite() && p0[1].is_finite() && p1[0].is_finite() && p1[1].is_finite()) {
            return;
        }
        let radius = half_thickness.max(0.0);
        let (dx, dy) = (p1[0] - p0[0], p1[1] - p0[1]);
        let length = (dx * dx + dy * dy).sqrt();
        if length < DEGENERATE_SEGMENT_LENGTH {
            self.draw_dot(p0, radius, color);
            return;
        }
        let (ux, uy) = (dx / length, dy / length);

        let pad = radius + EDGE_BAND;
        let Some((x_lo, x_hi, y_lo, y_hi)) = self.clip_box(
            p0[0].min(p1[0]) - pad,
            p0[0].max(p1[0]) + pad,
            p0[1].min(p1[1]) - pad,
            p0[1].max(p1[1]) + pad,
        ) else {
            return;
        };

        for y in y_lo..=y_hi {
            let fy = y as f32 - p0[1];
            for x in x_lo..=x_hi {
                let fx = x as f32 - p0[0];
                let t = (fx * ux + fy * uy).clamp(0.0, length);
                let (cx, cy) = (fx - ux * t, fy - uy * t);
                let distance = (cx * cx + cy * cy).sqrt();
                if distance > radius {
                    continue;
                }
                let inside = radius - distance;
                if inside >= EDGE_BAND {
                    self.blend_pixel(x, y, color, 1.0);
                } else {
                    self.blend_pixel(x, y, color, inside / EDGE_BAND);
                }
            }
        }
    }

    /// Filled disc via a squared-distance test, no edge blending
    pub fn draw_dot(&mut self, center: [f32; 2], radius: f32, color: Bgra8) {
        if !(center[0].is_finite() && center[1].is_finite()) {
            return;
        }
        let radius = radius.max(0.0);
        let r2 = radius * radius;
        let Some((x_lo, x_hi, y_lo, y_hi)) = self.clip_box(
            center[0] - radius,
            center[0] + radius,
            center[1] - radius,
            center[1] + radius,
        ) else {
            return;
        };

        for y in y_lo..=y_hi {
            let dy = y as f32 - center[1];
            for x in x_lo..=x_hi {
                let dx = x as f32 - center[0];
                if dx * dx + dy * dy <= r2 {
                    self.set_pixel(x, y, color);
                }
            }
        }
    }

    /// Clamp an image-space box to this canvas, `None` when nothing is left
    fn clip_box(&self, x0: f32, x1: f32, y0: f32, y1: f32) -> Option<(usize, usize, usize, usize)> {
        if self.width == 0 || self.rows == 0 {
            return None;
        }
        let x_lo = (x0.floor() as i64).max(0);
        let x_hi = (x1.ceil() as i64).min(self.width as i64 - 1);
        let y_lo = (y0.floor() as i64).max(self.row_offset as i64);
        let y_hi = (y1.ceil() as i64).min((self.row_offset + self.rows) as i64 - 1);
        if x_lo > x_hi || y_lo > y_hi {
            return None;
        }
        Some((x_lo as usize, x_hi as usize, y_lo as usize, y_hi as usize))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image(width: usize, height: usize) -> Vec<u8> {
        vec![0; width * height * BYTES_PER_PIXEL]
    }

    #[test]
    fn test_undersized_buffer_rejected() {
        let mut bytes = vec![0u8; 10];
        assert!(matches!(
            Canvas::new(&mut bytes, 2, 2),
            Err(RenderError::BufferTooSmall { required: 16, actual: 10 })
        ));
    }

    #[test]
    fn test_thick_line_interior_is_opaque() {
        let mut bytes = image(20, 20);
        let mut canvas = Canvas::new(&mut bytes, 20, 20).unwrap();
        canvas.draw_thick_line([2.0, 10.0], [17.0, 10.0], Bgra8::WHITE, 3.0);

        assert_eq!(canvas.pixel(10, 10), Some(Bgra8::WHITE));
        assert_eq!(canvas.pixel(10, 8), Some(Bgra8::WHITE));
        // Outside the radius
        assert_eq!(canvas.pixel(10, 14), Some(Bgra8::TRANSPARENT));
        assert_eq!(canvas.pixel(10, 5), Some(Bgra8::TRANSPARENT));
    }

    #[test]
    fn test_thick_line_edge_is_blended() {
        let mut bytes = image(20, 20);
        let mut canvas = Canvas::new(&mut bytes, 20, 20).unwrap();
        // Radius 2.5: row 12 sits 2px away, half a pixel inside the edge band
        canvas.draw_thick_line([2.0, 10.0], [17.0, 10.0], Bgra8::WHITE, 2.5);
        let edge = canvas.pixel(10, 12).unwrap();
        assert!(edge.a > 0 && edge.a < 255);
        assert!(edge.r > 0 && edge.r < 255);
    }

    #[test]
    fn test_blend_over_existing_color() {
        let mut bytes = image(1, 1);
        let mut canvas = Canvas::new(&mut bytes, 1, 1).unwrap();
        canvas.set_pixel(0, 0, Bgra8::from_rgb(0, 0, 200));
        canvas.blend_pixel(0, 0, Bgra8::from_rgb(200, 0, 0), 0.5);
        let px = canvas.pixel(0, 0).unwrap();
        assert_eq!(px.r, 100);
        assert_eq!(px.b, 100);
        assert_eq!(px.a, 255);
    }

    #[test]
    fn test_degenerate_segment_draws_dot() {
        let mut bytes = image(5, 5);
        let mut canvas = Canvas::new(&mut bytes, 5, 5).unwrap();
        canvas.draw_thick_line([2.0, 2.0], [2.0005, 2.0], Bgra8::WHITE, 1.0);
        assert_eq!(canvas.pixel(2, 2), Some(Bgra8::WHITE));
        assert_eq!(canvas.pixel(2, 1), Some(Bgra8::WHITE));
        assert_eq!(canvas.pixel(1, 1), Some(Bgra8::TRANSPARENT));
    }

    #[test]
    fn test_dot_has_hard_edges() {
        let mut bytes = image(9, 9);
        let mut canvas = Canvas::new(&mut bytes, 9, 9).unwrap();
        let color = Bgra8::from_rgb(250, 150, 100);
        canvas.draw_dot([4.0, 4.0], 2.0, color);
        for y in 0..9 {
            for x in 0..9 {
                let (dx, dy) = (x as f32 - 4.0, y as f32 - 4.0);
                let expected = if dx * dx + dy * dy <= 4.0 { color } else { Bgra8::TRANSPARENT };
                assert_eq!(canvas.pixel(x, y), Some(expected), "pixel ({}, {})", x, y);
            }
        }
    }

    #[test]
    fn test_drawing_is_clipped_to_band() {
        let mut bytes = image(8, 4);
        let mut band = Canvas::band(&mut bytes[8 * 4 * 2..], 8, 2);
        assert_eq!(band.rows(), 2);
        assert!(band.overlaps_rows(0.0, 2.0));
        assert!(!band.overlaps_rows(-5.0, 1.0));

        band.draw_dot([4.0, 1.0], 3.0, Bgra8::WHITE);
        assert_eq!(band.pixel(4, 0), None);
        assert_eq!(band.pixel(4, 2), Some(Bgra8::WHITE));
        // Rows above the band were never touched
        assert!(bytes[..8 * 4 * 2].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_out_of_bounds_geometry_is_ignored() {
        let mut bytes = image(4, 4);
        let mut canvas = Canvas::new(&mut bytes, 4, 4).unwrap();
        canvas.draw_thick_line([-50.0, -50.0], [-40.0, -45.0], Bgra8::WHITE, 2.0);
        canvas.draw_dot([100.0, 2.0], 1.0, Bgra8::WHITE);
        canvas.draw_thick_line([f32::NAN, 0.0], [1.0, 1.0], Bgra8::WHITE, 2.0);
        assert!(bytes.iter().all(|&b| b == 0));
    }
}
