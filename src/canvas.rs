use std::sync::mpsc;

use image::codecs::png::PngEncoder;
use image::{ColorType, ImageEncoder, ImageFormat, Rgba, RgbaImage};
use rayon::prelude::*;

/// Largest accepted edge length.  Keeps `width * height * 4` well inside `usize`
/// on every target.
pub const MAX_DIMENSION: u32 = 16_384;

// ============================================================================
// ERRORS
// ============================================================================

/// Failures raised by the raster surface.
#[derive(Debug, Clone, PartialEq)]
pub enum SurfaceError {
    /// The surface could not be created (zero or oversized dimensions).
    MissingContext { width: u32, height: u32 },
    /// The pixel buffer could not be encoded into a snapshot.
    Encode(String),
    /// Snapshot data was corrupt or unavailable.
    Decode(String),
    /// A decoded snapshot does not fit this surface.
    DimensionMismatch {
        expected: (u32, u32),
        found: (u32, u32),
    },
}

impl std::fmt::Display for SurfaceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SurfaceError::MissingContext { width, height } => {
                write!(f, "Cannot create a {}x{} rendering surface", width, height)
            }
            SurfaceError::Encode(e) => write!(f, "Snapshot encode failed: {}", e),
            SurfaceError::Decode(e) => write!(f, "Snapshot decode failed: {}", e),
            SurfaceError::DimensionMismatch { expected, found } => write!(
                f,
                "Snapshot is {}x{} but the surface is {}x{}",
                found.0, found.1, expected.0, expected.1
            ),
        }
    }
}

impl std::error::Error for SurfaceError {}

// ============================================================================
// GEOMETRY
// ============================================================================

/// Round to the nearest integer, halves toward +∞.
#[inline]
fn round_half_up(v: f64) -> i32 {
    (v + 0.5).floor() as i32
}

/// Rotate `(x, y)` about `(cx, cy)` by `angle` degrees.
///
/// Uses the y-down screen convention: `+90°` carries a point right of the
/// pivot to directly above it.  The result is snapped to the nearest pixel
/// (halves round up) so mirrored strokes are exactly reproducible.
pub fn rotate(cx: f64, cy: f64, x: f64, y: f64, angle: f64) -> (i32, i32) {
    let radians = angle.to_radians();
    let (sin, cos) = radians.sin_cos();
    let nx = cos * (x - cx) + sin * (y - cy) + cx;
    let ny = cos * (y - cy) - sin * (x - cx) + cy;
    (round_half_up(nx), round_half_up(ny))
}

// ============================================================================
// RASTER TARGET - the drawing seam used by the stroke engine
// ============================================================================

/// How painted pixels combine with what is already on the target.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PaintMode {
    /// Source-over compositing.
    #[default]
    Blend,
    /// Overwrite the pixel, alpha included.
    Replace,
}

/// Anything the stroke engine can paint onto.
///
/// Coordinates are pixel indices: pixel `(px, py)` is centred on the integer
/// point `(px, py)`.
pub trait RasterTarget {
    /// Fill every pixel whose centre lies within `radius` of `(cx, cy)`.
    fn fill_circle(&mut self, cx: f32, cy: f32, radius: f32, color: Rgba<u8>, mode: PaintMode);

    /// Paint a round-capped segment `width` pixels wide.
    fn stroke_segment(
        &mut self,
        from: (i32, i32),
        to: (i32, i32),
        width: f32,
        color: Rgba<u8>,
        mode: PaintMode,
    );
}

// ============================================================================
// ENCODED SNAPSHOT
// ============================================================================

/// Self-contained PNG encoding of a surface's pixels.
#[derive(Clone, PartialEq, Eq)]
pub struct EncodedSurface {
    bytes: Vec<u8>,
}

impl EncodedSurface {
    /// Wrap raw bytes, e.g. data received from a collaborator.  The bytes are
    /// only validated when decoded.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn memory_size(&self) -> usize {
        self.bytes.len()
    }

    /// Decode on the calling thread.
    pub fn decode(&self, expected: (u32, u32)) -> Result<RgbaImage, SurfaceError> {
        let img = image::load_from_memory_with_format(&self.bytes, ImageFormat::Png)
            .map_err(|e| SurfaceError::Decode(e.to_string()))?
            .into_rgba8();
        let found = img.dimensions();
        if found != expected {
            return Err(SurfaceError::DimensionMismatch { expected, found });
        }
        Ok(img)
    }
}

impl std::fmt::Debug for EncodedSurface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncodedSurface")
            .field("bytes", &self.bytes.len())
            .finish()
    }
}

/// A decode running on the rayon pool.
pub struct PendingDecode {
    rx: mpsc::Receiver<Result<RgbaImage, SurfaceError>>,
}

impl PendingDecode {
    pub fn spawn(encoded: EncodedSurface, expected: (u32, u32)) -> Self {
        let (tx, rx) = mpsc::channel();
        rayon::spawn(move || {
            let _ = tx.send(encoded.decode(expected));
        });
        Self { rx }
    }

    /// Non-blocking check. `None` while the worker is still decoding.
    pub fn try_take(&self) -> Option<Result<RgbaImage, SurfaceError>> {
        match self.rx.try_recv() {
            Ok(result) => Some(result),
            Err(mpsc::TryRecvError::Empty) => None,
            Err(mpsc::TryRecvError::Disconnected) => Some(Err(SurfaceError::Decode(
                "decoder worker exited without a result".to_string(),
            ))),
        }
    }

    /// Block until the worker delivers its result.
    pub fn wait(self) -> Result<RgbaImage, SurfaceError> {
        self.rx.recv().unwrap_or_else(|_| {
            Err(SurfaceError::Decode(
                "decoder worker exited without a result".to_string(),
            ))
        })
    }
}

// ============================================================================
// SURFACE
// ============================================================================

/// Fixed-size RGBA8 drawing surface with a background color.
#[derive(Clone)]
pub struct Surface {
    width: u32,
    height: u32,
    background: Rgba<u8>,
    pixels: RgbaImage,
}

impl Surface {
    /// Create a surface filled with `background`.
    pub fn new(width: u32, height: u32, background: Rgba<u8>) -> Result<Self, SurfaceError> {
        if width == 0 || height == 0 || width > MAX_DIMENSION || height > MAX_DIMENSION {
            return Err(SurfaceError::MissingContext { width, height });
        }
        let mut surface = Self {
            width,
            height,
            background,
            pixels: RgbaImage::new(width, height),
        };
        surface.clear();
        Ok(surface)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn background(&self) -> Rgba<u8> {
        self.background
    }

    pub fn pixels(&self) -> &RgbaImage {
        &self.pixels
    }

    /// Pixel at `(x, y)`, `None` outside the surface.
    pub fn pixel(&self, x: i32, y: i32) -> Option<Rgba<u8>> {
        if x < 0 || y < 0 || x as u32 >= self.width || y as u32 >= self.height {
            return None;
        }
        Some(*self.pixels.get_pixel(x as u32, y as u32))
    }

    /// Repaint the whole buffer with the background color.
    pub fn clear(&mut self) {
        let bg = self.background.0;
        let row_bytes = self.width as usize * 4;
        self.pixels.par_chunks_mut(row_bytes).for_each(|row| {
            for px in row.chunks_exact_mut(4) {
                px.copy_from_slice(&bg);
            }
        });
    }

    /// True when every pixel equals the background color.
    pub fn is_blank(&self) -> bool {
        let bg = self.background.0;
        self.pixels
            .par_chunks(4)
            .all(|px| px == bg.as_slice())
    }

    /// Centre point, recomputed from the current dimensions.
    pub fn center(&self) -> (f64, f64) {
        (self.width as f64 / 2.0, self.height as f64 / 2.0)
    }

    /// Encode the current pixels into a self-contained PNG blob.
    pub fn snapshot(&self) -> Result<EncodedSurface, SurfaceError> {
        let mut bytes = Vec::new();
        PngEncoder::new(&mut bytes)
            .write_image(
                self.pixels.as_raw(),
                self.width,
                self.height,
                ColorType::Rgba8,
            )
            .map_err(|e| SurfaceError::Encode(e.to_string()))?;
        Ok(EncodedSurface { bytes })
    }

    /// Start decoding `encoded` off the caller's stack.  The surface is not
    /// touched until [`Surface::apply_decoded`] is called with the result.
    pub fn begin_restore(&self, encoded: EncodedSurface) -> PendingDecode {
        PendingDecode::spawn(encoded, self.dimensions())
    }

    /// Replace the pixel buffer with a decoded snapshot.  On error the
    /// surface keeps its current content.
    pub fn apply_decoded(&mut self, decoded: RgbaImage) -> Result<(), SurfaceError> {
        let found = decoded.dimensions();
        if found != self.dimensions() {
            return Err(SurfaceError::DimensionMismatch {
                expected: self.dimensions(),
                found,
            });
        }
        self.pixels = decoded;
        Ok(())
    }

    /// Decode and apply on the calling thread.
    pub fn restore_blocking(&mut self, encoded: &EncodedSurface) -> Result<(), SurfaceError> {
        let decoded = encoded.decode(self.dimensions())?;
        self.apply_decoded(decoded)
    }

    /// Inclusive pixel bounds of a box around `(cx, cy)`, clipped to the
    /// surface.  `None` when the box misses the surface entirely.
    fn clip_box(&self, min_x: f32, min_y: f32, max_x: f32, max_y: f32) -> Option<(u32, u32, u32, u32)> {
        let x0 = min_x.floor().max(0.0);
        let y0 = min_y.floor().max(0.0);
        let x1 = max_x.ceil().min(self.width as f32 - 1.0);
        let y1 = max_y.ceil().min(self.height as f32 - 1.0);
        if x0 > x1 || y0 > y1 {
            return None;
        }
        Some((x0 as u32, y0 as u32, x1 as u32, y1 as u32))
    }

    #[inline]
    fn paint(&mut self, x: u32, y: u32, color: Rgba<u8>, mode: PaintMode) {
        let dst = self.pixels.get_pixel_mut(x, y);
        *dst = match mode {
            PaintMode::Blend => blend_over(*dst, color),
            PaintMode::Replace => color,
        };
    }
}

impl RasterTarget for Surface {
    fn fill_circle(&mut self, cx: f32, cy: f32, radius: f32, color: Rgba<u8>, mode: PaintMode) {
        if radius <= 0.0 {
            return;
        }
        let Some((x0, y0, x1, y1)) = self.clip_box(cx - radius, cy - radius, cx + radius, cy + radius)
        else {
            return;
        };
        let radius_sq = radius * radius;
        for y in y0..=y1 {
            let dy = y as f32 - cy;
            for x in x0..=x1 {
                let dx = x as f32 - cx;
                if dx * dx + dy * dy <= radius_sq {
                    self.paint(x, y, color, mode);
                }
            }
        }
    }

    fn stroke_segment(
        &mut self,
        from: (i32, i32),
        to: (i32, i32),
        width: f32,
        color: Rgba<u8>,
        mode: PaintMode,
    ) {
        let radius = width / 2.0;
        if radius <= 0.0 {
            return;
        }
        let (ax, ay) = (from.0 as f32, from.1 as f32);
        let (bx, by) = (to.0 as f32, to.1 as f32);
        let Some((x0, y0, x1, y1)) = self.clip_box(
            ax.min(bx) - radius,
            ay.min(by) - radius,
            ax.max(bx) + radius,
            ay.max(by) + radius,
        ) else {
            return;
        };

        let (sx, sy) = (bx - ax, by - ay);
        let len_sq = sx * sx + sy * sy;
        let radius_sq = radius * radius;
        for y in y0..=y1 {
            for x in x0..=x1 {
                let (px, py) = (x as f32 - ax, y as f32 - ay);
                // Project onto the segment and clamp to its end points: the
                // clamped ends give the round caps.
                let t = if len_sq > 0.0 {
                    ((px * sx + py * sy) / len_sq).clamp(0.0, 1.0)
                } else {
                    0.0
                };
                let (dx, dy) = (px - sx * t, py - sy * t);
                if dx * dx + dy * dy <= radius_sq {
                    self.paint(x, y, color, mode);
                }
            }
        }
    }
}

/// Source-over compositing of straight-alpha colors.
fn blend_over(dst: Rgba<u8>, src: Rgba<u8>) -> Rgba<u8> {
    match src.0[3] {
        255 => src,
        0 => dst,
        sa => {
            let sa = sa as f32 / 255.0;
            let da = dst.0[3] as f32 / 255.0;
            let out_a = sa + da * (1.0 - sa);
            let mut out = [0u8; 4];
            for c in 0..3 {
                let sc = src.0[c] as f32;
                let dc = dst.0[c] as f32;
                out[c] = ((sc * sa + dc * da * (1.0 - sa)) / out_a).round() as u8;
            }
            out[3] = (out_a * 255.0).round() as u8;
            Rgba(out)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);
    const BLACK: Rgba<u8> = Rgba([0, 0, 0, 255]);

    fn surface(w: u32, h: u32) -> Surface {
        Surface::new(w, h, WHITE).expect("surface")
    }

    #[test]
    fn zero_sized_surface_fails_fast() {
        assert_eq!(
            Surface::new(0, 10, WHITE).err(),
            Some(SurfaceError::MissingContext { width: 0, height: 10 })
        );
        assert!(Surface::new(10, MAX_DIMENSION + 1, WHITE).is_err());
    }

    #[test]
    fn new_surface_is_blank() {
        let s = surface(8, 4);
        assert!(s.is_blank());
        assert_eq!(s.pixel(7, 3), Some(WHITE));
        assert_eq!(s.pixel(8, 0), None);
        assert_eq!(s.pixel(-1, 0), None);
    }

    #[test]
    fn clear_is_idempotent() {
        let mut s = surface(16, 16);
        s.fill_circle(8.0, 8.0, 4.0, BLACK, PaintMode::Blend);
        s.clear();
        let once = s.pixels().clone();
        s.clear();
        assert_eq!(&once, s.pixels());
        assert!(s.is_blank());
    }

    #[test]
    fn center_tracks_dimensions() {
        assert_eq!(surface(400, 600).center(), (200.0, 300.0));
        assert_eq!(surface(5, 3).center(), (2.5, 1.5));
    }

    #[test]
    fn rotate_by_zero_rounds_input() {
        assert_eq!(rotate(200.0, 300.0, 10.4, 20.6, 0.0), (10, 21));
        assert_eq!(rotate(0.0, 0.0, -3.5, 2.5, 0.0), (-3, 3));
    }

    #[test]
    fn rotate_by_full_turn_matches_zero() {
        for &(x, y) in &[(0.0, 0.0), (100.0, 100.0), (399.0, 17.0), (250.0, 580.0)] {
            assert_eq!(
                rotate(200.0, 300.0, x, y, 360.0),
                rotate(200.0, 300.0, x, y, 0.0)
            );
        }
    }

    #[test]
    fn rotate_quarter_turn_maps_right_onto_up() {
        assert_eq!(rotate(0.0, 0.0, 10.0, 0.0, 90.0), (0, -10));
        assert_eq!(rotate(0.0, 0.0, 0.0, -10.0, 90.0), (-10, 0));
    }

    #[test]
    fn four_quarter_turns_return_home() {
        let (cx, cy) = (200.0, 300.0);
        let (mut x, mut y) = (123.0, 45.0);
        for _ in 0..4 {
            let (nx, ny) = rotate(cx, cy, x, y, 90.0);
            x = nx as f64;
            y = ny as f64;
        }
        assert!((x - 123.0).abs() <= 1.0 && (y - 45.0).abs() <= 1.0);
    }

    #[test]
    fn circle_covers_radius_inclusive() {
        let mut s = surface(32, 32);
        s.fill_circle(10.0, 10.0, 5.0, BLACK, PaintMode::Blend);
        assert_eq!(s.pixel(10, 10), Some(BLACK));
        assert_eq!(s.pixel(15, 10), Some(BLACK));
        assert_eq!(s.pixel(10, 5), Some(BLACK));
        assert_eq!(s.pixel(16, 10), Some(WHITE));
        assert_eq!(s.pixel(14, 14), Some(WHITE));
    }

    #[test]
    fn segment_has_round_caps_and_full_width() {
        let mut s = surface(64, 64);
        s.stroke_segment((20, 20), (30, 20), 10.0, BLACK, PaintMode::Blend);
        // body
        assert_eq!(s.pixel(25, 15), Some(BLACK));
        assert_eq!(s.pixel(25, 25), Some(BLACK));
        assert_eq!(s.pixel(25, 26), Some(WHITE));
        // caps extend past both end points by the radius
        assert_eq!(s.pixel(15, 20), Some(BLACK));
        assert_eq!(s.pixel(35, 20), Some(BLACK));
        assert_eq!(s.pixel(36, 20), Some(WHITE));
        // cap corners are rounded
        assert_eq!(s.pixel(35, 25), Some(WHITE));
    }

    #[test]
    fn drawing_clips_at_edges() {
        let mut s = surface(8, 8);
        s.stroke_segment((-20, -20), (2, 2), 4.0, BLACK, PaintMode::Blend);
        s.fill_circle(100.0, 100.0, 3.0, BLACK, PaintMode::Blend);
        assert_eq!(s.pixel(0, 0), Some(BLACK));
        assert_eq!(s.pixel(7, 7), Some(WHITE));
    }

    #[test]
    fn translucent_paint_blends_over_background() {
        let mut s = surface(4, 4);
        s.fill_circle(1.0, 1.0, 0.5, Rgba([0, 0, 0, 128]), PaintMode::Blend);
        let px = s.pixel(1, 1).unwrap_or(WHITE);
        assert_eq!(px.0[3], 255);
        assert!(px.0[0] > 100 && px.0[0] < 150);
    }

    #[test]
    fn replace_mode_overwrites_alpha() {
        let mut s = Surface::new(6, 6, Rgba([0, 0, 0, 0])).expect("surface");
        s.fill_circle(3.0, 3.0, 2.0, BLACK, PaintMode::Blend);
        assert_eq!(s.pixel(3, 3), Some(BLACK));

        s.fill_circle(3.0, 3.0, 2.0, Rgba([0, 0, 0, 0]), PaintMode::Replace);
        assert_eq!(s.pixel(3, 3), Some(Rgba([0, 0, 0, 0])));
        assert!(s.is_blank());

        let half = Rgba([10, 20, 30, 128]);
        s.stroke_segment((0, 0), (5, 0), 2.0, half, PaintMode::Replace);
        assert_eq!(s.pixel(2, 0), Some(half));
    }

    #[test]
    fn snapshot_bytes_are_png() {
        let snap = surface(3, 2).snapshot().expect("encode");
        assert_eq!(&snap.as_bytes()[..8], b"\x89PNG\r\n\x1a\n");
        assert_eq!(snap.memory_size(), snap.as_bytes().len());
    }

    #[test]
    fn snapshot_restore_is_bit_identical() {
        let mut s = surface(40, 30);
        s.stroke_segment((2, 2), (35, 25), 3.0, Rgba([200, 10, 40, 255]), PaintMode::Blend);
        let before = s.pixels().clone();
        let snap = s.snapshot().expect("encode");

        s.clear();
        let decoded = s.begin_restore(snap).wait().expect("decode");
        s.apply_decoded(decoded).expect("apply");
        assert_eq!(&before, s.pixels());
    }

    #[test]
    fn corrupt_snapshot_leaves_surface_untouched() {
        let mut s = surface(10, 10);
        s.fill_circle(5.0, 5.0, 2.0, BLACK, PaintMode::Blend);
        let before = s.pixels().clone();

        let err = s
            .restore_blocking(&EncodedSurface::from_bytes(vec![1, 2, 3, 4]))
            .unwrap_err();
        assert!(matches!(err, SurfaceError::Decode(_)));
        assert_eq!(&before, s.pixels());
    }

    #[test]
    fn snapshot_of_other_size_is_rejected() {
        let small = surface(4, 4).snapshot().expect("encode");
        let mut s = surface(8, 8);
        assert_eq!(
            s.restore_blocking(&small),
            Err(SurfaceError::DimensionMismatch {
                expected: (8, 8),
                found: (4, 4)
            })
        );
    }
}
