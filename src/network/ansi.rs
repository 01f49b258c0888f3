/// ANSI colouring for terminal clients

use serde::{Deserialize, Serialize};

/// Erase the current terminal line and return the cursor to column 0
pub const CLEAR_LINE: &str = "\r\x1b[2K";

const RESET: &str = "\x1b[0m";

/// How a connection wants its text coloured
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorMode {
    /// Plain text, no escape sequences
    None,

    /// Normal intensity, for light terminal backgrounds
    Light,

    /// Bold intensity, for dark terminal backgrounds
    #[default]
    Dark,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Color {
    Black,
    Red,
    Green,
    Yellow,
    Blue,
    Magenta,
    Cyan,
    White,
}

impl Color {
    fn code(&self) -> u8 {
        match self {
            Color::Black => 30,
            Color::Red => 31,
            Color::Green => 32,
            Color::Yellow => 33,
            Color::Blue => 34,
            Color::Magenta => 35,
            Color::Cyan => 36,
            Color::White => 37,
        }
    }
}

/// Wrap `text` in the escape sequence for `color`
pub fn colorize(mode: ColorMode, color: Color, text: &str) -> String {
    match mode {
        ColorMode::None => text.to_string(),
        ColorMode::Light => format!("\x1b[0;{}m{}{}", color.code(), text, RESET),
        ColorMode::Dark => format!("\x1b[1;{}m{}{}", color.code(), text, RESET),
    }
}
