use image::Rgba;

pub const BLACK: Rgba<u8> = Rgba([0, 0, 0, 255]);
pub const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);
pub const TRANSPARENT: Rgba<u8> = Rgba([0, 0, 0, 0]);

// ============================================================================
// COLOR PARSING
// ============================================================================

/// Parse `#rgb`, `#rrggbb`, `#rrggbbaa` or a swatch name (case-insensitive).
/// Surrounding whitespace is ignored.
pub fn parse_color(s: &str) -> Option<Rgba<u8>> {
    let s = s.trim();
    if let Some(hex) = s.strip_prefix('#') {
        return parse_hex(hex);
    }
    let lower = s.to_ascii_lowercase();
    if lower == "transparent" {
        return Some(TRANSPARENT);
    }
    SWATCHES
        .iter()
        .flatten()
        .find(|sw| sw.name == lower)
        .map(|sw| sw.color)
}

fn parse_hex(hex: &str) -> Option<Rgba<u8>> {
    if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    let byte = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
    match hex.len() {
        3 => {
            let mut out = [255u8; 4];
            for (i, c) in hex.chars().enumerate() {
                let v = c.to_digit(16)? as u8;
                out[i] = v * 17;
            }
            Some(Rgba(out))
        }
        6 => Some(Rgba([byte(0)?, byte(2)?, byte(4)?, 255])),
        8 => Some(Rgba([byte(0)?, byte(2)?, byte(4)?, byte(6)?])),
        _ => None,
    }
}

/// `#rrggbb`, or `#rrggbbaa` when the color is not opaque.
pub fn color_to_hex(c: Rgba<u8>) -> String {
    let [r, g, b, a] = c.0;
    if a == 255 {
        format!("#{:02x}{:02x}{:02x}", r, g, b)
    } else {
        format!("#{:02x}{:02x}{:02x}{:02x}", r, g, b, a)
    }
}

// ============================================================================
// PALETTE
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Swatch {
    pub name: &'static str,
    pub color: Rgba<u8>,
}

const fn swatch(name: &'static str, r: u8, g: u8, b: u8) -> Swatch {
    Swatch {
        name,
        color: Rgba([r, g, b, 255]),
    }
}

pub const PALETTE_ROWS: usize = 3;
pub const PALETTE_COLUMNS: usize = 8;

/// Dark, base and light rows.
pub const SWATCHES: [[Swatch; PALETTE_COLUMNS]; PALETTE_ROWS] = [
    [
        swatch("black", 0x00, 0x00, 0x00),
        swatch("dark-red", 0x78, 0x0c, 0x0c),
        swatch("dark-orange", 0x6a, 0x27, 0x12),
        swatch("dark-yellow", 0x8d, 0x6b, 0x06),
        swatch("dark-green", 0x22, 0x4e, 0x24),
        swatch("dark-blue", 0x11, 0x49, 0x76),
        swatch("dark-violet", 0x37, 0x1f, 0x62),
        swatch("medium-gray", 0x92, 0x92, 0x92),
    ],
    [
        swatch("dark-gray", 0x45, 0x45, 0x45),
        swatch("red", 0xe9, 0x1e, 0x1e),
        swatch("orange", 0xff, 0x57, 0x22),
        swatch("yellow", 0xff, 0xc1, 0x07),
        swatch("green", 0x4c, 0xaf, 0x50),
        swatch("blue", 0x21, 0x96, 0xf3),
        swatch("violet", 0x67, 0x3a, 0xb7),
        swatch("white", 0xff, 0xff, 0xff),
    ],
    [
        swatch("gray", 0x75, 0x75, 0x75),
        swatch("light-red", 0xdb, 0x5a, 0x5a),
        swatch("light-orange", 0xff, 0x87, 0x61),
        swatch("light-yellow", 0xff, 0xd4, 0x50),
        swatch("light-green", 0x75, 0xb2, 0x77),
        swatch("light-blue", 0x6b, 0xc9, 0xd5),
        swatch("light-violet", 0x95, 0x75, 0xcd),
        swatch("light-gray", 0xd7, 0xd5, 0xd5),
    ],
];

/// Swatch grid with a single selection.  Starts on black.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct Palette {
    selected: (usize, usize),
}

impl Palette {
    /// `(row, column)` of the named swatch.
    pub fn find(name: &str) -> Option<(usize, usize)> {
        let name = name.trim().to_ascii_lowercase();
        SWATCHES.iter().enumerate().find_map(|(row, swatches)| {
            swatches
                .iter()
                .position(|sw| sw.name == name)
                .map(|col| (row, col))
        })
    }

    pub fn swatch_at(row: usize, col: usize) -> Option<Swatch> {
        SWATCHES.get(row).and_then(|r| r.get(col)).copied()
    }

    /// Select by grid position.  Out-of-range positions are ignored.
    pub fn select_at(&mut self, row: usize, col: usize) -> bool {
        if Self::swatch_at(row, col).is_some() {
            self.selected = (row, col);
            true
        } else {
            false
        }
    }

    pub fn select(&mut self, name: &str) -> bool {
        match Self::find(name) {
            Some((row, col)) => self.select_at(row, col),
            None => false,
        }
    }

    pub fn selected(&self) -> Swatch {
        SWATCHES[self.selected.0][self.selected.1]
    }

    pub fn selected_position(&self) -> (usize, usize) {
        self.selected
    }
}
