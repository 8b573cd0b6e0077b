//! Kaleido: a raster drawing surface with rotational symmetry strokes and
//! whole-canvas undo/redo.
//!
//! [`session::PaintSession`] is the entry point.  It owns the
//! [`canvas::Surface`] and routes pointer and configuration events through the
//! stroke engine, the symmetry controller and the history stacks.

pub mod logger;

pub mod canvas;
pub mod cli;
pub mod components;
pub mod io;
pub mod ops;
pub mod session;
pub mod settings;

pub use canvas::{PaintMode, Surface, SurfaceError};
pub use components::history::{HistoryManager, HistorySnapshot, StackKind};
pub use components::tools::Tool;
pub use session::{PaintSession, SessionEvent, StrokeSample};
pub use settings::SessionSettings;
