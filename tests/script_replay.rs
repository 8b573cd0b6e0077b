use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use image::Rgba;
use kaleido::cli::{CliArgs, run_with_settings};
use kaleido::ops::scripting::{execute_script, replay};
use kaleido::{PaintSession, SessionSettings, StackKind};

const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);

fn scratch_dir() -> PathBuf {
    let dir = std::env::temp_dir().join(format!("kaleido-test-{}", uuid::Uuid::new_v4()));
    std::fs::create_dir_all(&dir).expect("scratch dir");
    dir
}

#[test]
fn mirrored_script_paints_both_halves() {
    let script = r##"
        color("#0000ff");
        size(4);
        symmetry(2);
        down(100, 300);
        for x in 101..=140 {
            drag(x, 300);
        }
        up(140, 300);
    "##;
    let out = execute_script(script, 400, 600).expect("script");
    let mut session = PaintSession::with_size(400, 600, WHITE).expect("session");
    replay(&mut session, &out).expect("replay");

    let blue = Rgba([0, 0, 255, 255]);
    assert_eq!(session.surface().pixel(120, 300), Some(blue));
    // mirrored through the centre (200, 300)
    assert_eq!(session.surface().pixel(280, 300), Some(blue));
    assert_eq!(session.surface().pixel(200, 300), Some(WHITE));
}

#[test]
fn script_undo_waits_for_restore() {
    let script = r#"
        down(10, 10); drag(50, 10); up(50, 10);
        undo();
        eraser();
        down(5, 5); up(5, 5);
    "#;
    let out = execute_script(script, 100, 100).expect("script");
    let mut session = PaintSession::with_size(100, 100, WHITE).expect("session");
    replay(&mut session, &out).expect("replay");

    assert!(session.surface().is_blank());
    assert_eq!(session.history().depth(StackKind::Undo), 1);
    assert_eq!(session.history().depth(StackKind::Redo), 0);
}

#[test]
fn cli_renders_script_to_png() {
    let dir = scratch_dir();
    let script_path = dir.join("line.rhai");
    std::fs::write(&script_path, "size(6); down(10, 20); drag(50, 20); up(50, 20);").expect("write");
    let output = dir.join("line.png");

    let args = CliArgs::parse_from([
        "kaleido".to_string(),
        "-i".to_string(),
        script_path.display().to_string(),
        "-o".to_string(),
        output.display().to_string(),
        "--width".to_string(),
        "64".to_string(),
        "--height".to_string(),
        "32".to_string(),
    ]);
    let code = run_with_settings(args, SessionSettings::default());
    assert_eq!(code, ExitCode::SUCCESS);

    let img = image::open(&output).expect("output").into_rgba8();
    assert_eq!(img.dimensions(), (64, 32));
    assert_eq!(*img.get_pixel(30, 20), Rgba([0, 0, 0, 255]));
    assert_eq!(*img.get_pixel(30, 5), WHITE);
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn cli_reports_failing_script() {
    let dir = scratch_dir();
    let script_path = dir.join("bad.rhai");
    std::fs::write(&script_path, "color(\"not-a-color\");").expect("write");

    let args = CliArgs::parse_from([
        "kaleido".to_string(),
        "-i".to_string(),
        script_path.display().to_string(),
        "--output-dir".to_string(),
        dir.join("out").display().to_string(),
    ]);
    let code = run_with_settings(args, SessionSettings::default());
    assert_eq!(code, ExitCode::FAILURE);
    assert!(!dir.join("out").join("bad.png").exists());
    let _ = std::fs::remove_dir_all(&dir);
}
