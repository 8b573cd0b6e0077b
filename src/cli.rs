// ============================================================================
// Kaleido CLI, headless replay of drawing scripts
// ============================================================================
//
// Usage examples:
//   kaleido -i star.rhai -o star.png
//   kaleido -i "patterns/*.rhai" --output-dir out/ --format jpeg -q 85
//   kaleido -i mandala.rhai -o m.bmp --width 800 --height 800 --background "#202020"
//
// Each script runs against a fresh session; the final surface is written
// to the output file.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;

use clap::Parser;

use crate::components::colors::parse_color;
use crate::io::{SaveFormat, encode_and_write};
use crate::ops::scripting::{execute_script, replay};
use crate::session::PaintSession;
use crate::settings::SessionSettings;

/// Kaleido headless renderer.
///
/// Replays Rhai drawing scripts against a symmetry paint session and saves
/// the result.
#[derive(Parser, Debug)]
#[command(
    name = "kaleido",
    about = "Kaleido headless symmetry-drawing renderer",
    long_about = "Run Rhai drawing scripts against a fresh canvas and save the result\n\
                  as PNG, JPEG or BMP.\n\n\
                  Example:\n  \
                  kaleido -i star.rhai -o star.png\n  \
                  kaleido -i \"*.rhai\" --output-dir out/ --format jpeg"
)]
pub struct CliArgs {
    /// Script file(s). Glob patterns accepted (e.g. "*.rhai").
    #[arg(short, long, required = true, num_args = 1..)]
    pub input: Vec<String>,

    /// Output file path. Only valid for single-file input.
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Output directory for batch rendering.
    #[arg(long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Output format: png, jpeg, bmp.  Inferred from --output when omitted.
    #[arg(short, long, value_name = "FORMAT")]
    pub format: Option<String>,

    /// JPEG quality (1-100, default 90).
    #[arg(short, long, default_value_t = 90, value_name = "1-100")]
    pub quality: u8,

    /// Canvas width in pixels (overrides the settings file).
    #[arg(long)]
    pub width: Option<u32>,

    /// Canvas height in pixels (overrides the settings file).
    #[arg(long)]
    pub height: Option<u32>,

    /// Background color, e.g. "#ffffff" or "light-gray".
    #[arg(long, value_name = "COLOR")]
    pub background: Option<String>,

    /// Print script console output and per-file timing.
    #[arg(short, long)]
    pub verbose: bool,
}

/// Run all CLI processing and return an OS exit code.
/// `0` = all files succeeded, `1` = one or more files failed.
pub fn run(args: CliArgs) -> ExitCode {
    run_with_settings(args, SessionSettings::load())
}

/// [`run`] with explicit base settings instead of the user's settings file.
pub fn run_with_settings(args: CliArgs, base: SessionSettings) -> ExitCode {
    let inputs = resolve_inputs(&args.input);
    if inputs.is_empty() {
        eprintln!("error: no input files matched the given pattern(s).");
        return ExitCode::FAILURE;
    }

    if inputs.len() > 1 && args.output.is_some() && args.output_dir.is_none() {
        eprintln!(
            "error: {} input files given but --output only accepts a single file path.\n\
             Use --output-dir to specify a destination directory for batch rendering.",
            inputs.len()
        );
        return ExitCode::FAILURE;
    }

    let settings = match apply_overrides(base, &args) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let save_format = match parse_format(args.format.as_deref(), args.output.as_deref()) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if let Some(dir) = &args.output_dir
        && let Err(e) = std::fs::create_dir_all(dir)
    {
        eprintln!(
            "error: could not create output directory '{}': {}",
            dir.display(),
            e
        );
        return ExitCode::FAILURE;
    }

    let total = inputs.len();
    let multi = total > 1;
    let mut any_failure = false;

    for (idx, input_path) in inputs.iter().enumerate() {
        if multi || args.verbose {
            println!("[{}/{}] {}", idx + 1, total, input_path.display());
        }
        let file_start = Instant::now();

        let Some(output_path) = build_output_path(
            input_path,
            args.output.as_deref(),
            args.output_dir.as_deref(),
            save_format,
        ) else {
            eprintln!(
                "  error: cannot determine output path for '{}'.",
                input_path.display()
            );
            any_failure = true;
            continue;
        };

        match run_one(
            input_path,
            &output_path,
            &settings,
            save_format,
            args.quality,
            args.verbose,
        ) {
            Ok(()) => {
                crate::log_info!("Rendered {} -> {}", input_path.display(), output_path.display());
                if args.verbose || multi {
                    println!(
                        "  -> {} ({:.0}ms)",
                        output_path.display(),
                        file_start.elapsed().as_secs_f64() * 1000.0
                    );
                }
            }
            Err(e) => {
                crate::log_err!("Failed to render {}: {}", input_path.display(), e);
                eprintln!("  error: {}", e);
                any_failure = true;
            }
        }
    }

    if any_failure {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

fn apply_overrides(mut settings: SessionSettings, args: &CliArgs) -> Result<SessionSettings, String> {
    if let Some(w) = args.width {
        settings.width = w;
    }
    if let Some(h) = args.height {
        settings.height = h;
    }
    if let Some(bg) = &args.background {
        settings.background =
            parse_color(bg).ok_or_else(|| format!("invalid background color '{}'", bg))?;
    }
    Ok(settings)
}

// ============================================================================
// Per-file pipeline
// ============================================================================

fn run_one(
    input: &Path,
    output: &Path,
    settings: &SessionSettings,
    format: SaveFormat,
    quality: u8,
    verbose: bool,
) -> Result<(), String> {
    let source = std::fs::read_to_string(input).map_err(|e| format!("could not read script: {}", e))?;

    let mut session = PaintSession::new(settings).map_err(|e| format!("canvas: {}", e))?;

    let script = execute_script(&source, settings.width, settings.height)
        .map_err(|e| format!("script error:\n{}", e.friendly_message()))?;

    if verbose {
        for line in &script.console_output {
            println!("  [script] {}", line);
        }
    }

    replay(&mut session, &script).map_err(|e| format!("replay failed: {}", e))?;

    encode_and_write(session.surface().pixels(), output, format, quality)
        .map_err(|e| format!("save failed: {}", e))?;
    session.mark_clean();
    Ok(())
}

// ============================================================================
// Helpers
// ============================================================================

/// Expand glob patterns and literal paths into a deduplicated, ordered list.
fn resolve_inputs(patterns: &[String]) -> Vec<PathBuf> {
    let mut result: Vec<PathBuf> = Vec::new();

    for pattern in patterns {
        let as_path = Path::new(pattern);

        if as_path.exists() {
            if !result.iter().any(|p| p.as_path() == as_path) {
                result.push(as_path.to_path_buf());
            }
            continue;
        }

        match glob::glob(pattern) {
            Ok(entries) => {
                let mut matched = false;
                for entry in entries.flatten() {
                    if !result.contains(&entry) {
                        result.push(entry);
                    }
                    matched = true;
                }
                if !matched {
                    eprintln!("warning: pattern '{}' matched no files.", pattern);
                }
            }
            Err(e) => {
                eprintln!("warning: invalid glob '{}': {}", pattern, e);
            }
        }
    }

    result
}

/// `--format` wins, then the output extension, then PNG.  An unrecognised
/// `--format` is an error.
fn parse_format(format_arg: Option<&str>, output: Option<&Path>) -> Result<SaveFormat, String> {
    if let Some(name) = format_arg {
        return SaveFormat::from_name(name).ok_or_else(|| {
            format!("unknown format '{}' (expected png, jpeg or bmp)", name)
        });
    }
    Ok(output.and_then(SaveFormat::from_path).unwrap_or_default())
}

/// Compute the output path for a single input script.
///
/// Priority:
/// 1. `--output` (explicit path, used for single-file input)
/// 2. `--output-dir` (batch directory, derives filename from input stem)
/// 3. Fallback: next to the script, same stem, image extension
fn build_output_path(
    input: &Path,
    output: Option<&Path>,
    output_dir: Option<&Path>,
    format: SaveFormat,
) -> Option<PathBuf> {
    if let Some(out) = output {
        return Some(out.to_path_buf());
    }

    let ext = format.extension();
    let stem = input.file_stem()?.to_string_lossy().into_owned();

    if let Some(dir) = output_dir {
        return Some(dir.join(format!("{}.{}", stem, ext)));
    }

    let parent = input.parent().unwrap_or(Path::new("."));
    let candidate = parent.join(format!("{}.{}", stem, ext));
    if candidate == input {
        Some(parent.join(format!("{}_out.{}", stem, ext)))
    } else {
        Some(candidate)
    }
}
