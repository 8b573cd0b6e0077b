use image::Rgba;

use crate::canvas::{PaintMode, RasterTarget};
use crate::components::colors::BLACK;

pub const MIN_BRUSH_SIZE: u32 = 1;
pub const MAX_BRUSH_SIZE: u32 = 99;
pub const DEFAULT_BRUSH_SIZE: u32 = 2;

/// Lines narrower than this read as broken with round joins, so they are
/// rasterized `THIN_STROKE_BOOST` pixels wider.  The stored size is unchanged.
pub const THIN_STROKE_WIDTH: f32 = 2.0;
pub const THIN_STROKE_BOOST: f32 = 1.0;

/// Clamp a requested brush size into `[MIN_BRUSH_SIZE, MAX_BRUSH_SIZE]`.
pub fn clamp_brush_size(size: i64) -> u32 {
    size.clamp(MIN_BRUSH_SIZE as i64, MAX_BRUSH_SIZE as i64) as u32
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Tool {
    #[default]
    Brush,
    /// Resets pixels to the surface background color.
    Eraser,
}

impl Tool {
    pub fn paint_mode(self) -> PaintMode {
        match self {
            Tool::Brush => PaintMode::Blend,
            Tool::Eraser => PaintMode::Replace,
        }
    }
}

// ============================================================================
// BRUSH STATE
// ============================================================================

#[derive(Clone, Debug, PartialEq)]
pub struct BrushState {
    color: Rgba<u8>,
    size: u32,
    mode: PaintMode,
    pressed: bool,
    /// Last raw pointer position; `None` until the first sample.
    position: Option<(f64, f64)>,
}

impl Default for BrushState {
    fn default() -> Self {
        Self::new(BLACK, DEFAULT_BRUSH_SIZE as i64)
    }
}

impl BrushState {
    pub fn new(color: Rgba<u8>, size: i64) -> Self {
        Self {
            color,
            size: clamp_brush_size(size),
            mode: PaintMode::Blend,
            pressed: false,
            position: None,
        }
    }

    pub fn color(&self) -> Rgba<u8> {
        self.color
    }

    pub fn set_color(&mut self, color: Rgba<u8>) {
        self.color = color;
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn mode(&self) -> PaintMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: PaintMode) {
        self.mode = mode;
    }

    /// Stores the clamped size and returns it.
    pub fn set_size(&mut self, size: i64) -> u32 {
        self.size = clamp_brush_size(size);
        self.size
    }

    pub fn is_pressed(&self) -> bool {
        self.pressed
    }

    pub fn position(&self) -> Option<(f64, f64)> {
        self.position
    }

    /// Width actually rasterized for line segments.
    pub fn stroke_width(&self) -> f32 {
        let width = self.size as f32;
        if width < THIN_STROKE_WIDTH {
            width + THIN_STROKE_BOOST
        } else {
            width
        }
    }

    /// Radius of single dots: half the brush size.
    pub fn dot_radius(&self) -> f32 {
        self.size as f32 * 0.5
    }
}

// ============================================================================
// TRACE BUFFER - two-point sliding window per axis
// ============================================================================

/// Segment emitted when a trace buffer fills.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Segment {
    pub from: (i32, i32),
    pub to: (i32, i32),
}

/// Inline storage for at most two points (no heap allocation).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TraceBuffer {
    data: [(i32, i32); 2],
    len: usize,
}

impl TraceBuffer {
    /// Append a point.  When the buffer reaches two points the older one is
    /// evicted and the connecting segment returned.
    pub fn push(&mut self, point: (i32, i32)) -> Option<Segment> {
        self.data[self.len] = point;
        self.len += 1;
        if self.len < 2 {
            return None;
        }
        let segment = Segment {
            from: self.data[0],
            to: self.data[1],
        };
        self.data[0] = self.data[1];
        self.len = 1;
        Some(segment)
    }

    pub fn points(&self) -> &[(i32, i32)] {
        &self.data[..self.len]
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn clear(&mut self) {
        self.len = 0;
    }
}

// ============================================================================
// STROKE ENGINE
// ============================================================================

/// Turns pointer samples into painted segments, one trace per symmetry axis.
#[derive(Clone, Debug, Default)]
pub struct StrokeEngine {
    brush: BrushState,
    traces: Vec<TraceBuffer>,
}

impl StrokeEngine {
    pub fn new(brush: BrushState) -> Self {
        Self {
            brush,
            traces: Vec::new(),
        }
    }

    pub fn brush(&self) -> &BrushState {
        &self.brush
    }

    pub fn set_color(&mut self, color: Rgba<u8>) {
        self.brush.set_color(color);
    }

    pub fn set_size(&mut self, size: i64) -> u32 {
        self.brush.set_size(size)
    }

    pub fn set_mode(&mut self, mode: PaintMode) {
        self.brush.set_mode(mode);
    }

    pub fn is_pressed(&self) -> bool {
        self.brush.pressed
    }

    pub fn set_pressed(&mut self, pressed: bool) {
        self.brush.pressed = pressed;
        if !pressed {
            self.reset_traces();
        }
    }

    /// Record the raw pointer position.  Draws nothing.
    pub fn begin_sample(&mut self, x: f64, y: f64) {
        self.brush.position = Some((x, y));
    }

    pub fn trace(&self, axis: usize) -> Option<&TraceBuffer> {
        self.traces.get(axis)
    }

    /// Whether `axis` already holds a point of the current stroke.
    pub fn has_history(&self, axis: usize) -> bool {
        self.traces.get(axis).is_some_and(|t| !t.is_empty())
    }

    pub fn reset_traces(&mut self) {
        for trace in &mut self.traces {
            trace.clear();
        }
    }

    /// Feed one point into `axis`'s trace.
    ///
    /// Released: every trace is cleared and nothing is drawn.  Pressed: the
    /// segment from the previous point of this axis to `(x, y)` is painted
    /// once the window holds two points.
    pub fn render_trace<T: RasterTarget + ?Sized>(
        &mut self,
        target: &mut T,
        axis: usize,
        x: i32,
        y: i32,
    ) -> Option<Segment> {
        if !self.brush.pressed {
            self.reset_traces();
            return None;
        }
        if self.traces.len() <= axis {
            self.traces.resize_with(axis + 1, TraceBuffer::default);
        }
        let segment = self.traces[axis].push((x, y))?;
        target.stroke_segment(
            segment.from,
            segment.to,
            self.brush.stroke_width(),
            self.brush.color,
            self.brush.mode,
        );
        Some(segment)
    }

    pub fn render_dot<T: RasterTarget + ?Sized>(&self, target: &mut T, x: i32, y: i32, radius: f32) {
        target.fill_circle(x as f32, y as f32, radius, self.brush.color, self.brush.mode);
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Records draw calls instead of painting.
    #[derive(Default, Debug)]
    pub(crate) struct RecordingTarget {
        pub segments: Vec<((i32, i32), (i32, i32), f32)>,
        pub dots: Vec<(f32, f32, f32)>,
        pub modes: Vec<PaintMode>,
    }

    impl RasterTarget for RecordingTarget {
        fn fill_circle(&mut self, cx: f32, cy: f32, radius: f32, _color: Rgba<u8>, mode: PaintMode) {
            self.dots.push((cx, cy, radius));
            self.modes.push(mode);
        }

        fn stroke_segment(
            &mut self,
            from: (i32, i32),
            to: (i32, i32),
            width: f32,
            _color: Rgba<u8>,
            mode: PaintMode,
        ) {
            self.segments.push((from, to, width));
            self.modes.push(mode);
        }
    }

    fn pressed_engine(size: i64) -> StrokeEngine {
        let mut engine = StrokeEngine::new(BrushState::new(BLACK, size));
        engine.set_pressed(true);
        engine
    }

    #[test]
    fn brush_size_is_clamped() {
        assert_eq!(clamp_brush_size(0), 1);
        assert_eq!(clamp_brush_size(-40), 1);
        assert_eq!(clamp_brush_size(50), 50);
        assert_eq!(clamp_brush_size(150), 99);

        let mut brush = BrushState::default();
        assert_eq!(brush.size(), DEFAULT_BRUSH_SIZE);
        assert_eq!(brush.set_size(1000), 99);
        assert_eq!(brush.size(), 99);
    }

    #[test]
    fn thin_strokes_are_widened_when_rasterized() {
        assert_eq!(BrushState::new(BLACK, 1).stroke_width(), 2.0);
        assert_eq!(BrushState::new(BLACK, 2).stroke_width(), 2.0);
        assert_eq!(BrushState::new(BLACK, 10).stroke_width(), 10.0);
        assert_eq!(BrushState::new(BLACK, 10).dot_radius(), 5.0);
    }

    #[test]
    fn trace_buffer_never_exceeds_two_points() {
        let mut trace = TraceBuffer::default();
        assert_eq!(trace.push((1, 1)), None);
        assert_eq!(trace.len(), 1);
        let seg = trace.push((2, 2));
        assert_eq!(
            seg,
            Some(Segment {
                from: (1, 1),
                to: (2, 2)
            })
        );
        assert_eq!(trace.points(), &[(2, 2)]);
        trace.clear();
        assert!(trace.is_empty());
    }

    #[test]
    fn three_samples_make_exactly_two_segments() {
        let mut engine = pressed_engine(4);
        let mut target = RecordingTarget::default();
        for (x, y) in [(10, 10), (20, 10), (30, 15)] {
            engine.render_trace(&mut target, 0, x, y);
        }
        assert_eq!(
            target.segments,
            vec![((10, 10), (20, 10), 4.0), ((20, 10), (30, 15), 4.0)]
        );
        assert_eq!(engine.trace(0).map(|t| t.len()), Some(1));
    }

    #[test]
    fn released_render_clears_every_axis() {
        let mut engine = pressed_engine(4);
        let mut target = RecordingTarget::default();
        engine.render_trace(&mut target, 0, 1, 1);
        engine.render_trace(&mut target, 3, 5, 5);
        assert!(engine.has_history(3));

        engine.brush.pressed = false;
        assert_eq!(engine.render_trace(&mut target, 0, 2, 2), None);
        assert!(!engine.has_history(0));
        assert!(!engine.has_history(3));
        assert!(target.segments.is_empty());
    }

    #[test]
    fn no_segment_bridges_a_pen_up() {
        let mut engine = pressed_engine(4);
        let mut target = RecordingTarget::default();
        engine.render_trace(&mut target, 0, 1, 1);
        engine.set_pressed(false);
        engine.set_pressed(true);
        engine.render_trace(&mut target, 0, 50, 50);
        assert!(target.segments.is_empty());
    }

    #[test]
    fn axes_keep_independent_windows() {
        let mut engine = pressed_engine(2);
        let mut target = RecordingTarget::default();
        engine.render_trace(&mut target, 0, 0, 0);
        engine.render_trace(&mut target, 1, 100, 100);
        engine.render_trace(&mut target, 0, 1, 0);
        engine.render_trace(&mut target, 1, 101, 100);
        assert_eq!(
            target.segments,
            vec![((0, 0), (1, 0), 2.0), ((100, 100), (101, 100), 2.0)]
        );
    }

    #[test]
    fn begin_sample_only_records_position() {
        let mut engine = StrokeEngine::default();
        assert_eq!(engine.brush().position(), None);
        engine.begin_sample(3.5, 4.0);
        assert_eq!(engine.brush().position(), Some((3.5, 4.0)));
        assert!(!engine.has_history(0));
    }

    #[test]
    fn dot_uses_given_radius() {
        let engine = pressed_engine(10);
        let mut target = RecordingTarget::default();
        engine.render_dot(&mut target, 110, 100, 5.0);
        assert_eq!(target.dots, vec![(110.0, 100.0, 5.0)]);
    }

    #[test]
    fn eraser_mode_reaches_the_target() {
        assert_eq!(Tool::Brush.paint_mode(), PaintMode::Blend);
        let mut engine = pressed_engine(4);
        engine.set_mode(Tool::Eraser.paint_mode());
        let mut target = RecordingTarget::default();
        engine.render_dot(&mut target, 1, 1, 2.0);
        engine.render_trace(&mut target, 0, 1, 1);
        engine.render_trace(&mut target, 0, 5, 1);
        assert_eq!(target.modes, vec![PaintMode::Replace, PaintMode::Replace]);
    }
}
