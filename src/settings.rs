use std::path::{Path, PathBuf};

use image::Rgba;

use crate::components::colors::{BLACK, WHITE, color_to_hex, parse_color};
use crate::components::symmetry::{MIN_AXES, SymmetryController};
use crate::components::tools::{DEFAULT_BRUSH_SIZE, clamp_brush_size};

pub const DEFAULT_WIDTH: u32 = 400;
pub const DEFAULT_HEIGHT: u32 = 600;

/// Startup defaults for a new [`crate::session::PaintSession`].
#[derive(Clone, Debug, PartialEq)]
pub struct SessionSettings {
    pub width: u32,
    pub height: u32,
    pub background: Rgba<u8>,
    pub brush_color: Rgba<u8>,
    pub brush_size: u32,
    pub symmetry_axes: u32,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            background: WHITE,
            brush_color: BLACK,
            brush_size: DEFAULT_BRUSH_SIZE,
            symmetry_axes: MIN_AXES,
        }
    }
}

impl SessionSettings {
    /// Path to the settings file.
    /// On Linux:   ~/.config/kaleido/kaleido_settings.cfg  (XDG_CONFIG_HOME respected)
    /// On Windows: %APPDATA%\Kaleido\kaleido_settings.cfg
    /// On macOS:   ~/Library/Application Support/Kaleido/kaleido_settings.cfg
    /// Fallback:   same directory as the executable.
    pub fn settings_path() -> Option<PathBuf> {
        #[cfg(target_os = "linux")]
        {
            let config_dir = std::env::var("XDG_CONFIG_HOME")
                .map(PathBuf::from)
                .unwrap_or_else(|_| {
                    let home = std::env::var("HOME").unwrap_or_else(|_| "~".to_string());
                    PathBuf::from(home).join(".config")
                })
                .join("kaleido");
            return Some(config_dir.join("kaleido_settings.cfg"));
        }
        #[cfg(target_os = "windows")]
        {
            let appdata = std::env::var("APPDATA")
                .or_else(|_| std::env::var("USERPROFILE"))
                .ok()?;
            return Some(PathBuf::from(appdata).join("Kaleido").join("kaleido_settings.cfg"));
        }
        #[cfg(target_os = "macos")]
        {
            let home = std::env::var("HOME").unwrap_or_else(|_| "~".to_string());
            return Some(
                PathBuf::from(home)
                    .join("Library")
                    .join("Application Support")
                    .join("Kaleido")
                    .join("kaleido_settings.cfg"),
            );
        }
        #[cfg(not(any(target_os = "linux", target_os = "windows", target_os = "macos")))]
        {
            std::env::current_exe()
                .ok()
                .and_then(|p| p.parent().map(|d| d.join("kaleido_settings.cfg")))
        }
    }

    /// Parse `key=value` lines.  Unknown keys, blank lines and values that do
    /// not parse keep their defaults.
    pub fn parse(content: &str) -> Self {
        let mut s = Self::default();
        for line in content.lines() {
            let Some((key, val)) = line.split_once('=') else { continue };
            let val = val.trim();
            match key.trim() {
                "canvas_width" => {
                    if let Some(w) = val.parse::<u32>().ok().filter(|&w| w > 0) {
                        s.width = w;
                    }
                }
                "canvas_height" => {
                    if let Some(h) = val.parse::<u32>().ok().filter(|&h| h > 0) {
                        s.height = h;
                    }
                }
                "background" => {
                    if let Some(c) = parse_color(val) {
                        s.background = c;
                    }
                }
                "brush_color" => {
                    if let Some(c) = parse_color(val) {
                        s.brush_color = c;
                    }
                }
                "brush_size" => {
                    if let Ok(n) = val.parse::<i64>() {
                        s.brush_size = clamp_brush_size(n);
                    }
                }
                "symmetry_axes" => {
                    if let Ok(n) = val.parse::<i64>() {
                        s.symmetry_axes = SymmetryController::new(n).axis_count();
                    }
                }
                _ => {}
            }
        }
        s
    }

    pub fn to_config_string(&self) -> String {
        format!(
            "canvas_width={}\n\
             canvas_height={}\n\
             background={}\n\
             brush_color={}\n\
             brush_size={}\n\
             symmetry_axes={}\n",
            self.width,
            self.height,
            color_to_hex(self.background),
            color_to_hex(self.brush_color),
            self.brush_size,
            self.symmetry_axes,
        )
    }

    /// Load settings from disk (returns default if file missing or unreadable)
    pub fn load() -> Self {
        match Self::settings_path() {
            Some(path) => Self::load_from(&path),
            None => Self::default(),
        }
    }

    pub fn load_from(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(content) => Self::parse(&content),
            Err(_) => Self::default(),
        }
    }

    pub fn save_to(&self, path: &Path) -> std::io::Result<()> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        std::fs::write(path, self.to_config_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        assert_eq!(SessionSettings::parse(""), SessionSettings::default());
        let d = SessionSettings::default();
        assert_eq!((d.width, d.height), (400, 600));
        assert_eq!(d.brush_size, 2);
    }

    #[test]
    fn parses_known_keys_and_clamps() {
        let s = SessionSettings::parse(
            "canvas_width = 800\n\
             canvas_height=0\n\
             background=#202020\n\
             brush_color=red\n\
             brush_size=500\n\
             symmetry_axes=-2\n\
             theme_mode=dark\n\
             garbage line\n",
        );
        assert_eq!(s.width, 800);
        assert_eq!(s.height, DEFAULT_HEIGHT);
        assert_eq!(s.background, Rgba([0x20, 0x20, 0x20, 255]));
        assert_eq!(s.brush_color, Rgba([0xe9, 0x1e, 0x1e, 255]));
        assert_eq!(s.brush_size, 99);
        assert_eq!(s.symmetry_axes, 1);
    }

    #[test]
    fn bad_values_fall_back() {
        let s = SessionSettings::parse("brush_color=#zzz\nbrush_size=big\ncanvas_width=-5\n");
        assert_eq!(s, SessionSettings::default());
    }

    #[test]
    fn save_and_load_file() {
        let path = std::env::temp_dir()
            .join(format!("kaleido-settings-{}", uuid::Uuid::new_v4()))
            .join("kaleido_settings.cfg");
        let s = SessionSettings {
            width: 123,
            height: 45,
            background: Rgba([1, 2, 3, 255]),
            brush_color: Rgba([9, 8, 7, 128]),
            brush_size: 17,
            symmetry_axes: 6,
        };
        s.save_to(&path).expect("save");
        assert_eq!(SessionSettings::load_from(&path), s);
        if let Some(dir) = path.parent() {
            let _ = std::fs::remove_dir_all(dir);
        }
    }

    #[test]
    fn missing_file_gives_defaults() {
        let path = std::env::temp_dir().join(format!("kaleido-missing-{}.cfg", uuid::Uuid::new_v4()));
        assert_eq!(SessionSettings::load_from(&path), SessionSettings::default());
    }
}
