// ============================================================================
// Kaleido scripting, Rhai-driven pointer input for headless replay
// ============================================================================
//
// A script never touches pixels.  Host functions record session events
// (pointer samples, brush changes, undo/redo) into a command list, which is
// replayed against a `PaintSession` once the script has finished.

use std::sync::{Arc, Mutex};

use rhai::{Engine, EvalAltResult, ImmutableString, Position, Scope};

use crate::canvas::SurfaceError;
use crate::components::colors::{Palette, parse_color};
use crate::components::tools::Tool;
use crate::session::{PaintSession, SessionEvent};

/// Commands a single script may record.
pub const MAX_COMMANDS: usize = 1_000_000;

// ============================================================================
// Error type
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct ScriptError {
    pub message: String,
    pub line: Option<usize>,
    pub column: Option<usize>,
}

impl ScriptError {
    fn located(message: String, pos: Position) -> Self {
        Self {
            message,
            line: pos.line().filter(|&l| l > 0),
            column: pos.position().filter(|&c| c > 0),
        }
    }

    /// Error explanation with line/column context and a hint where one helps.
    pub fn friendly_message(&self) -> String {
        let raw = &self.message;
        let mut parts = Vec::new();

        match (self.line, self.column) {
            (Some(line), Some(col)) => parts.push(format!("Error on line {}, column {}:", line, col)),
            (Some(line), None) => parts.push(format!("Error on line {}:", line)),
            _ => parts.push("Script error:".to_string()),
        }

        let cleaned = raw.split(" (line ").next().unwrap_or(raw);
        if raw.contains("Function not found:") {
            let fn_desc = cleaned.strip_prefix("Function not found: ").unwrap_or(cleaned);
            parts.push(format!("  Could not find function: {}", fn_desc.trim()));
            parts.push(String::new());
            parts.push("  Tip: pointer functions take two numbers, e.g. down(10, 20);".to_string());
            parts.push("  color() and swatch() take a string, e.g. color(\"#ff0000\");".to_string());
        } else if raw.contains("Variable not found:") {
            parts.push(format!("  {}", cleaned));
            parts.push(String::new());
            parts.push("  Tip: declare variables with 'let' before using them.".to_string());
        } else if raw.contains("Syntax error") || raw.contains("Expected") {
            parts.push(format!("  Syntax error: {}", cleaned));
            parts.push(String::new());
            parts.push("  Tip: check for missing semicolons or brackets near this line.".to_string());
        } else if raw.contains("Too many operations") {
            parts.push("  Script exceeded the maximum operation limit.".to_string());
            parts.push(String::new());
            parts.push("  Tip: look for a loop that never ends.".to_string());
        } else {
            parts.push(format!("  {}", cleaned));
        }

        parts.join("\n")
    }
}

impl std::fmt::Display for ScriptError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let (Some(line), Some(col)) = (self.line, self.column) {
            write!(f, "Line {}, Col {}: {}", line, col, self.message)
        } else if let Some(line) = self.line {
            write!(f, "Line {}: {}", line, self.message)
        } else {
            write!(f, "{}", self.message)
        }
    }
}

impl std::error::Error for ScriptError {}

// ============================================================================
// Script context, shared between the engine and host functions
// ============================================================================

struct ScriptContext {
    width: u32,
    height: u32,
    commands: Vec<SessionEvent>,
    console_output: Vec<String>,
}

type SharedContext = Arc<Mutex<ScriptContext>>;

/// What a finished script produced.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ScriptOutput {
    pub commands: Vec<SessionEvent>,
    pub console_output: Vec<String>,
}

fn record(ctx: &SharedContext, event: SessionEvent) -> Result<(), Box<EvalAltResult>> {
    let mut lock = ctx.lock().unwrap_or_else(|e| e.into_inner());
    if lock.commands.len() >= MAX_COMMANDS {
        return Err(format!("Too many drawing commands (limit {})", MAX_COMMANDS).into());
    }
    lock.commands.push(event);
    Ok(())
}

// ============================================================================
// Engine construction with sandbox + API registration
// ============================================================================

fn create_engine(ctx: SharedContext) -> Engine {
    let mut engine = Engine::new();

    // ── Sandbox limits ──
    engine.set_max_operations(50_000_000);
    engine.set_max_call_levels(64);
    engine.set_max_expr_depths(64, 64);
    engine.set_max_string_size(10_000);
    engine.set_max_array_size(10_000);
    engine.set_max_map_size(1_000);

    register_canvas_api(&mut engine, ctx.clone());
    register_pointer_api(&mut engine, ctx.clone());
    register_brush_api(&mut engine, ctx.clone());
    register_history_api(&mut engine, ctx.clone());

    let c = ctx;
    engine.on_print(move |msg| {
        let mut lock = c.lock().unwrap_or_else(|e| e.into_inner());
        lock.console_output.push(msg.to_string());
    });

    engine
}

fn register_canvas_api(engine: &mut Engine, ctx: SharedContext) {
    let c = ctx.clone();
    engine.register_fn("width", move || -> i64 {
        let lock = c.lock().unwrap_or_else(|e| e.into_inner());
        lock.width as i64
    });

    let c = ctx;
    engine.register_fn("height", move || -> i64 {
        let lock = c.lock().unwrap_or_else(|e| e.into_inner());
        lock.height as i64
    });
}

/// Register `name(x, y)` for every int/float argument combination.
fn register_point_fn(
    engine: &mut Engine,
    ctx: &SharedContext,
    name: &str,
    make: fn(f64, f64) -> SessionEvent,
) {
    let c = ctx.clone();
    engine.register_fn(name, move |x: i64, y: i64| record(&c, make(x as f64, y as f64)));
    let c = ctx.clone();
    engine.register_fn(name, move |x: f64, y: f64| record(&c, make(x, y)));
    let c = ctx.clone();
    engine.register_fn(name, move |x: i64, y: f64| record(&c, make(x as f64, y)));
    let c = ctx.clone();
    engine.register_fn(name, move |x: f64, y: i64| record(&c, make(x, y as f64)));
}

fn register_pointer_api(engine: &mut Engine, ctx: SharedContext) {
    register_point_fn(engine, &ctx, "down", |x, y| SessionEvent::PointerDown { x, y });
    register_point_fn(engine, &ctx, "drag", |x, y| SessionEvent::PointerMove {
        x,
        y,
        pressed: true,
    });
    register_point_fn(engine, &ctx, "hover", |x, y| SessionEvent::PointerMove {
        x,
        y,
        pressed: false,
    });
    register_point_fn(engine, &ctx, "up", |x, y| SessionEvent::PointerUp { x, y });
}

fn register_brush_api(engine: &mut Engine, ctx: SharedContext) {
    let c = ctx.clone();
    engine.register_fn("color", move |spec: ImmutableString| -> Result<(), Box<EvalAltResult>> {
        let color = parse_color(&spec).ok_or_else(|| format!("Invalid color: '{}'", spec))?;
        record(&c, SessionEvent::SetColor(color))
    });

    let c = ctx.clone();
    engine.register_fn("swatch", move |name: ImmutableString| -> Result<(), Box<EvalAltResult>> {
        let (row, col) = Palette::find(&name).ok_or_else(|| format!("Unknown swatch: '{}'", name))?;
        record(&c, SessionEvent::SelectSwatch(row, col))
    });

    let c = ctx.clone();
    engine.register_fn("size", move |n: i64| record(&c, SessionEvent::SetBrushSize(n)));

    let c = ctx.clone();
    engine.register_fn("symmetry", move |n: i64| record(&c, SessionEvent::SetSymmetry(n)));

    let c = ctx.clone();
    engine.register_fn("cycle_symmetry", move || record(&c, SessionEvent::CycleSymmetry));

    let c = ctx.clone();
    engine.register_fn("brush", move || record(&c, SessionEvent::SelectTool(Tool::Brush)));

    let c = ctx;
    engine.register_fn("eraser", move || record(&c, SessionEvent::SelectTool(Tool::Eraser)));
}

fn register_history_api(engine: &mut Engine, ctx: SharedContext) {
    let c = ctx.clone();
    engine.register_fn("undo", move || record(&c, SessionEvent::Undo));

    let c = ctx.clone();
    engine.register_fn("redo", move || record(&c, SessionEvent::Redo));

    let c = ctx;
    engine.register_fn("clear", move || record(&c, SessionEvent::NewCanvas));
}

// ============================================================================
// Public execution API
// ============================================================================

/// Run `source` against a `width`×`height` canvas description and collect
/// the commands it records.  Runs on the calling thread.
pub fn execute_script(source: &str, width: u32, height: u32) -> Result<ScriptOutput, ScriptError> {
    let ctx = Arc::new(Mutex::new(ScriptContext {
        width,
        height,
        commands: Vec::new(),
        console_output: Vec::new(),
    }));

    let engine = create_engine(ctx.clone());
    let mut scope = Scope::new();

    let ast = engine
        .compile(source)
        .map_err(|e| ScriptError::located(e.to_string(), e.position()))?;
    engine
        .run_ast_with_scope(&mut scope, &ast)
        .map_err(|e| ScriptError::located(e.to_string(), e.position()))?;

    // The engine still holds clones of the context; copy out what we need.
    let lock = ctx.lock().unwrap_or_else(|e| e.into_inner());
    Ok(ScriptOutput {
        commands: lock.commands.clone(),
        console_output: lock.console_output.clone(),
    })
}

/// Feed recorded commands to `session` and wait for every restore they
/// trigger.  Returns the first snapshot failure, after all commands ran.
pub fn replay(session: &mut PaintSession, output: &ScriptOutput) -> Result<(), SurfaceError> {
    for command in &output.commands {
        session.dispatch(*command);
    }
    session.settle()
}
