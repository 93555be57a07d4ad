//! Theme loading: btop-style `theme[key]="value"` and hex → ratatui Color.

use crate::board;
use ratatui::style::Color;
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

/// Default piece colours, in `board::Color::index` order: red, yellow, green, blue, magenta.
const DEFAULT_PIECES: [(u8, u8, u8); 5] = [
    (0xE7, 0x4C, 0x3C),
    (0xFF, 0xB3, 0x00),
    (0x2E, 0xCC, 0x71),
    (0x34, 0x98, 0xDB),
    (0x9B, 0x59, 0xB6),
];

/// Piece palette and UI colours.
#[derive(Debug, Clone)]
pub struct Theme {
    /// Piece colours indexed by `board::Color::index`.
    pub pieces: [Color; 5],
    /// Playfield background.
    pub bg: Color,
    /// Grid / border.
    pub div_line: Color,
    /// Text (score, chain).
    pub main_fg: Color,
    /// Highlight / titles.
    pub title: Color,
    /// Cells about to clear.
    pub flash: Color,
}

#[derive(Debug, Error)]
pub enum ThemeError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid hex: {0}")]
    InvalidHex(String),
}

impl Default for Theme {
    fn default() -> Self {
        Self::builtin()
    }
}

const fn rgb((r, g, b): (u8, u8, u8)) -> Color {
    Color::Rgb(r, g, b)
}

impl Theme {
    /// Built-in palette: the classic puyo colours on a deep navy well.
    pub fn builtin() -> Self {
        Self {
            pieces: DEFAULT_PIECES.map(rgb),
            bg: rgb((0x07, 0x10, 0x26)),
            div_line: rgb((0x3F, 0x44, 0x4F)),
            main_fg: rgb((0xAB, 0xB2, 0xBF)),
            title: rgb((0xE5, 0xC0, 0x7B)),
            flash: Color::White,
        }
    }

    /// Load theme from a btop-style file: `theme[key]="value"` or `theme[key]='value'`.
    /// Falls back to the built-in theme if path is None or the file is missing.
    pub fn load(path: Option<&Path>, palette: crate::Palette) -> Result<Self, ThemeError> {
        let mut theme = match path {
            Some(p) if p.exists() => {
                let s = std::fs::read_to_string(p)?;
                Self::from_map(&parse_theme_file(&s))
            }
            _ => Self::builtin(),
        };
        theme.apply_palette(palette);
        Ok(theme)
    }

    /// Override piece colours for high-contrast or colorblind play.
    pub fn apply_palette(&mut self, palette: crate::Palette) {
        match palette {
            crate::Palette::Normal => {}
            crate::Palette::HighContrast => {
                self.pieces = [
                    rgb((0xFF, 0x00, 0x00)),
                    rgb((0xFF, 0xFF, 0x00)),
                    rgb((0x00, 0xFF, 0x00)),
                    rgb((0x00, 0x88, 0xFF)),
                    rgb((0xFF, 0x00, 0xFF)),
                ];
            }
            crate::Palette::Colorblind => {
                // Tol's bright scheme: distinguishable without red/green
                self.pieces = [
                    rgb((0xEE, 0x66, 0x77)),
                    rgb((0xCC, 0xBB, 0x44)),
                    rgb((0x22, 0x88, 0x33)),
                    rgb((0x44, 0x77, 0xAA)),
                    rgb((0xAA, 0x33, 0x77)),
                ];
            }
        }
    }

    fn from_map(map: &HashMap<String, String>) -> Self {
        let get = |key: &str| map.get(key).and_then(|v| parse_hex(v).ok());
        let base = Self::builtin();
        // btop keys first, then our own piece_* keys override them.
        let piece = |i: usize, own: &str, btop: &str| {
            get(own).or_else(|| get(btop)).unwrap_or(base.pieces[i])
        };
        Self {
            pieces: [
                piece(0, "piece_red", "cpu_end"),
                piece(1, "piece_yellow", "title"),
                piece(2, "piece_green", "mem_box"),
                piece(3, "piece_blue", "cpu_box"),
                piece(4, "piece_magenta", "net_box"),
            ],
            bg: get("meter_bg").unwrap_or(base.bg),
            div_line: get("div_line").unwrap_or(base.div_line),
            main_fg: get("main_fg").unwrap_or(base.main_fg),
            title: get("title").unwrap_or(base.title),
            flash: get("selected_fg").unwrap_or(base.flash),
        }
    }

    #[inline]
    pub fn piece_color(&self, color: board::Color) -> Color {
        self.pieces[color.index()]
    }
}

/// Parse btop-style theme file into key -> value map.
fn parse_theme_file(s: &str) -> HashMap<String, String> {
    let mut map = HashMap::new();
    for line in s.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some(stripped) = line.strip_prefix("theme[") else {
            continue;
        };
        let Some(end) = stripped.find(']') else {
            continue;
        };
        let key = stripped[..end].trim();
        let rest = stripped[end + 1..].trim();
        if let Some(value) = rest.strip_prefix('=') {
            let value = value.trim().trim_matches('"').trim_matches('\'');
            if !value.is_empty() {
                map.insert(key.to_string(), value.to_string());
            }
        }
    }
    map
}

/// Parse hex colour "#RRGGBB" or "#RGB" into ratatui Color.
pub fn parse_hex(s: &str) -> Result<Color, ThemeError> {
    let s = s.trim().trim_start_matches('#');
    let invalid = || ThemeError::InvalidHex(s.to_string());
    let channel = |range: std::ops::Range<usize>| {
        s.get(range)
            .and_then(|h| u8::from_str_radix(h, 16).ok())
            .ok_or_else(invalid)
    };
    let (r, g, b) = match s.len() {
        6 => (channel(0..2)?, channel(2..4)?, channel(4..6)?),
        3 => (channel(0..1)? * 17, channel(1..2)? * 17, channel(2..3)? * 17),
        _ => return Err(invalid()),
    };
    Ok(Color::Rgb(r, g, b))
}
