//! One drawing session: the surface, stroke engine, symmetry and history that
//! external input drives.
//!
//! Every input is an event.  While a snapshot restore is decoding, new events
//! are queued and replayed in arrival order once the restore lands, so no
//! stroke is ever painted onto the buffer that is about to be replaced.

use std::collections::VecDeque;

use image::Rgba;
use uuid::Uuid;

use crate::canvas::{PendingDecode, Surface, SurfaceError};
use crate::components::colors::Palette;
use crate::components::history::{HistoryManager, HistorySnapshot, StackKind};
use crate::components::symmetry::SymmetryController;
use crate::components::tools::{BrushState, StrokeEngine, Tool};
use crate::settings::SessionSettings;

/// Reported to the sample listener after each pressed motion sample.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StrokeSample {
    /// Sample position after the coordinate transform.
    pub x: f64,
    pub y: f64,
    pub axes: u32,
    /// Segments painted for this sample across all axes.
    pub segments: usize,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SessionEvent {
    PointerDown { x: f64, y: f64 },
    PointerMove { x: f64, y: f64, pressed: bool },
    PointerUp { x: f64, y: f64 },
    SetColor(Rgba<u8>),
    SetBrushSize(i64),
    SetSymmetry(i64),
    CycleSymmetry,
    SelectTool(Tool),
    SelectSwatch(usize, usize),
    NewCanvas,
    Undo,
    Redo,
}

/// A decode in flight plus what to apply with it.
struct PendingRestore {
    decode: PendingDecode,
    color: Rgba<u8>,
    size: u32,
    /// Stack that received the pre-restore state.
    to: StackKind,
}

type SampleListener = Box<dyn FnMut(&StrokeSample)>;
type CoordinateTransform = Box<dyn Fn(f64, f64) -> (f64, f64)>;

pub struct PaintSession {
    id: Uuid,
    surface: Surface,
    engine: StrokeEngine,
    symmetry: SymmetryController,
    history: HistoryManager,
    palette: Palette,
    tool: Tool,
    /// Color of the brush tool; the eraser paints with the background instead.
    brush_color: Rgba<u8>,
    listener: Option<SampleListener>,
    transform: CoordinateTransform,
    pending: Option<PendingRestore>,
    deferred: VecDeque<SessionEvent>,
    dirty: bool,
}

impl PaintSession {
    pub fn new(settings: &SessionSettings) -> Result<Self, SurfaceError> {
        let surface = Surface::new(settings.width, settings.height, settings.background)?;
        let id = Uuid::new_v4();
        crate::log_info!(
            "Session {} started ({}x{})",
            id,
            settings.width,
            settings.height
        );
        Ok(Self {
            id,
            surface,
            engine: StrokeEngine::new(BrushState::new(
                settings.brush_color,
                settings.brush_size as i64,
            )),
            symmetry: SymmetryController::new(settings.symmetry_axes as i64),
            history: HistoryManager::new(),
            palette: Palette::default(),
            tool: Tool::Brush,
            brush_color: settings.brush_color,
            listener: None,
            transform: Box::new(|x, y| (x, y)),
            pending: None,
            deferred: VecDeque::new(),
            dirty: false,
        })
    }

    pub fn with_size(width: u32, height: u32, background: Rgba<u8>) -> Result<Self, SurfaceError> {
        Self::new(&SessionSettings {
            width,
            height,
            background,
            ..SessionSettings::default()
        })
    }

    // -- Accessors ---------------------------------------------------------

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn surface(&self) -> &Surface {
        &self.surface
    }

    pub fn brush(&self) -> &BrushState {
        self.engine.brush()
    }

    pub fn brush_color(&self) -> Rgba<u8> {
        self.brush_color
    }

    pub fn symmetry(&self) -> &SymmetryController {
        &self.symmetry
    }

    pub fn history(&self) -> &HistoryManager {
        &self.history
    }

    /// Direct stack access, e.g. to inject snapshots received elsewhere.
    pub fn history_mut(&mut self) -> &mut HistoryManager {
        &mut self.history
    }

    pub fn palette(&self) -> &Palette {
        &self.palette
    }

    pub fn tool(&self) -> Tool {
        self.tool
    }

    /// True while a snapshot decode is in flight.
    pub fn is_restoring(&self) -> bool {
        self.pending.is_some()
    }

    /// Events queued behind the current restore.
    pub fn pending_events(&self) -> usize {
        self.deferred.len()
    }

    /// Changed since the last [`PaintSession::mark_clean`].
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn mark_clean(&mut self) {
        self.dirty = false;
    }

    pub fn set_sample_listener<F>(&mut self, listener: F)
    where
        F: FnMut(&StrokeSample) + 'static,
    {
        self.listener = Some(Box::new(listener));
    }

    pub fn clear_sample_listener(&mut self) {
        self.listener = None;
    }

    /// Map incoming pointer coordinates onto surface pixels.  Identity by
    /// default.
    pub fn set_coordinate_transform<F>(&mut self, transform: F)
    where
        F: Fn(f64, f64) -> (f64, f64) + 'static,
    {
        self.transform = Box::new(transform);
    }

    // -- Input -------------------------------------------------------------

    pub fn pointer_down(&mut self, x: f64, y: f64) {
        self.dispatch(SessionEvent::PointerDown { x, y });
    }

    pub fn pointer_move(&mut self, x: f64, y: f64, pressed: bool) {
        self.dispatch(SessionEvent::PointerMove { x, y, pressed });
    }

    pub fn pointer_up(&mut self, x: f64, y: f64) {
        self.dispatch(SessionEvent::PointerUp { x, y });
    }

    // -- Configuration -----------------------------------------------------

    pub fn set_color(&mut self, color: Rgba<u8>) {
        self.dispatch(SessionEvent::SetColor(color));
    }

    pub fn set_brush_size(&mut self, size: i64) {
        self.dispatch(SessionEvent::SetBrushSize(size));
    }

    pub fn set_symmetry_axis_count(&mut self, axes: i64) {
        self.dispatch(SessionEvent::SetSymmetry(axes));
    }

    pub fn cycle_symmetry(&mut self) {
        self.dispatch(SessionEvent::CycleSymmetry);
    }

    pub fn select_tool(&mut self, tool: Tool) {
        self.dispatch(SessionEvent::SelectTool(tool));
    }

    /// Select a palette swatch by name.  Returns `false` for unknown names.
    /// Ignored while the eraser is active.
    pub fn select_swatch(&mut self, name: &str) -> bool {
        match Palette::find(name) {
            Some((row, col)) => {
                self.dispatch(SessionEvent::SelectSwatch(row, col));
                true
            }
            None => false,
        }
    }

    pub fn request_new_canvas(&mut self) {
        self.dispatch(SessionEvent::NewCanvas);
    }

    pub fn request_undo(&mut self) {
        self.dispatch(SessionEvent::Undo);
    }

    pub fn request_redo(&mut self) {
        self.dispatch(SessionEvent::Redo);
    }

    /// Apply an event now, or queue it behind an in-flight restore.
    pub fn dispatch(&mut self, event: SessionEvent) {
        if self.pending.is_some() {
            self.deferred.push_back(event);
            return;
        }
        self.apply(event);
    }

    // -- Restore completion --------------------------------------------------

    /// Land a finished restore, if any, and replay queued events.  Never
    /// blocks; call again while [`PaintSession::is_restoring`] is true.
    pub fn poll(&mut self) -> Result<(), SurfaceError> {
        loop {
            let Some(result) = self.pending.as_ref().and_then(|p| p.decode.try_take()) else {
                return Ok(());
            };
            let Some(pending) = self.pending.take() else {
                return Ok(());
            };
            let outcome = self.finish_restore(pending.color, pending.size, pending.to, result);
            self.replay_deferred();
            outcome?;
        }
    }

    /// Block until every restore, including ones started by replayed events,
    /// has landed.  Returns the first decode failure.
    pub fn settle(&mut self) -> Result<(), SurfaceError> {
        let mut first_error = None;
        while let Some(PendingRestore {
            decode,
            color,
            size,
            to,
        }) = self.pending.take()
        {
            if let Err(e) = self.finish_restore(color, size, to, decode.wait()) {
                first_error.get_or_insert(e);
            }
            self.replay_deferred();
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn replay_deferred(&mut self) {
        while self.pending.is_none() {
            let Some(event) = self.deferred.pop_front() else { break };
            self.apply(event);
        }
    }

    fn finish_restore(
        &mut self,
        color: Rgba<u8>,
        size: u32,
        to: StackKind,
        decoded: Result<image::RgbaImage, SurfaceError>,
    ) -> Result<(), SurfaceError> {
        match decoded.and_then(|img| self.surface.apply_decoded(img)) {
            Ok(()) => {
                self.brush_color = color;
                self.engine.set_size(size as i64);
                self.sync_tool_color();
                // A stroke in progress belonged to the old buffer; end it
                // without terminal dots.
                self.engine.set_pressed(false);
                self.dirty = true;
                crate::log_info!(
                    "Session {}: restored snapshot (undo {}, redo {})",
                    self.id,
                    self.history.depth(StackKind::Undo),
                    self.history.depth(StackKind::Redo)
                );
                Ok(())
            }
            Err(e) => {
                self.history.rollback(to);
                crate::log_err!("Session {}: restore failed: {}", self.id, e);
                Err(e)
            }
        }
    }

    // -- Event handling ------------------------------------------------------

    fn apply(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::PointerDown { x, y } => {
                let (x, y) = (self.transform)(x, y);
                self.begin_stroke(x, y);
            }
            SessionEvent::PointerMove { x, y, pressed } => {
                let (x, y) = (self.transform)(x, y);
                self.handle_move(x, y, pressed);
            }
            SessionEvent::PointerUp { x, y } => {
                let (x, y) = (self.transform)(x, y);
                self.engine.begin_sample(x, y);
                if self.engine.is_pressed() {
                    self.end_stroke(x, y);
                }
            }
            SessionEvent::SetColor(color) => {
                self.brush_color = color;
                self.tool = Tool::Brush;
                self.sync_tool_color();
            }
            SessionEvent::SetBrushSize(size) => {
                self.engine.set_size(size);
            }
            SessionEvent::SetSymmetry(axes) => {
                self.symmetry.set_axis_count(axes);
                self.engine.reset_traces();
            }
            SessionEvent::CycleSymmetry => {
                self.symmetry.cycle();
                self.engine.reset_traces();
            }
            SessionEvent::SelectTool(tool) => {
                self.tool = tool;
                self.sync_tool_color();
            }
            // Swatches only apply to the brush.
            SessionEvent::SelectSwatch(row, col) => {
                if self.tool == Tool::Brush && self.palette.select_at(row, col) {
                    self.apply(SessionEvent::SetColor(self.palette.selected().color));
                }
            }
            SessionEvent::NewCanvas => {
                self.surface.clear();
                self.engine.reset_traces();
                self.dirty = true;
                crate::log_info!("Session {}: new canvas", self.id);
            }
            SessionEvent::Undo => self.start_restore(StackKind::Undo),
            SessionEvent::Redo => self.start_restore(StackKind::Redo),
        }
    }

    fn sync_tool_color(&mut self) {
        let color = match self.tool {
            Tool::Brush => self.brush_color,
            Tool::Eraser => self.surface.background(),
        };
        self.engine.set_color(color);
        self.engine.set_mode(self.tool.paint_mode());
    }

    fn capture(&self) -> Result<HistorySnapshot, SurfaceError> {
        HistorySnapshot::capture(&self.surface, self.brush_color, self.engine.brush().size())
    }

    /// Swap the newest snapshot of `from` in.  The current state is parked
    /// on the opposite stack first; the pixels change once the decode lands.
    fn start_restore(&mut self, from: StackKind) {
        if self.history.depth(from) == 0 {
            return;
        }
        let current = match self.capture() {
            Ok(snapshot) => snapshot,
            Err(e) => {
                crate::log_err!("Session {}: could not snapshot before {:?}: {}", self.id, from, e);
                return;
            }
        };
        let to = from.opposite();
        let Some(target) = self.history.restore(from, to, current) else { return };
        let (image, color, size) = target.into_parts();
        crate::log_info!(
            "Session {}: restoring from {:?} stack ({} bytes)",
            self.id,
            from,
            image.memory_size()
        );
        self.pending = Some(PendingRestore {
            decode: self.surface.begin_restore(image),
            color,
            size,
            to,
        });
    }

    fn begin_stroke(&mut self, x: f64, y: f64) {
        match self.capture() {
            Ok(snapshot) => self.history.record(snapshot),
            Err(e) => {
                crate::log_err!("Session {}: could not snapshot before stroke: {}", self.id, e);
            }
        }
        self.engine.set_pressed(true);
        self.engine.reset_traces();
        self.engine.begin_sample(x, y);
        self.render_sample(x, y);
    }

    fn handle_move(&mut self, x: f64, y: f64, pressed: bool) {
        match (pressed, self.engine.is_pressed()) {
            (true, true) => {
                self.engine.begin_sample(x, y);
                let segments = self.render_sample(x, y);
                let sample = StrokeSample {
                    x,
                    y,
                    axes: self.symmetry.axis_count(),
                    segments,
                };
                if let Some(listener) = self.listener.as_mut() {
                    listener(&sample);
                }
            }
            // Button came down outside the surface.
            (true, false) => self.begin_stroke(x, y),
            // Button went up outside the surface.
            (false, true) => {
                let (lx, ly) = self.engine.brush().position().unwrap_or((x, y));
                self.end_stroke(lx, ly);
                self.engine.begin_sample(x, y);
            }
            (false, false) => self.engine.begin_sample(x, y),
        }
    }

    fn render_sample(&mut self, x: f64, y: f64) -> usize {
        let center = self.surface.center();
        let segments = self
            .symmetry
            .render_sample(&mut self.engine, &mut self.surface, center, x, y);
        self.dirty = true;
        segments
    }

    fn end_stroke(&mut self, x: f64, y: f64) {
        let center = self.surface.center();
        self.symmetry
            .render_dots(&self.engine, &mut self.surface, center, x, y);
        self.engine.set_pressed(false);
        self.dirty = true;
    }
}
