use std::fmt;
use std::str::FromStr;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::util::error::{ControlError, Result};

/// Symbols of the compact text encoding, indexed 0..63.
///
/// Same symbol order as standard Base64, but applied to the packed integer value
/// with no padding: every color is exactly four symbols.
const COMPACT_ALPHABET: &[u8; 64] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";

/// Largest packed value, `0xFFFFFF`.
pub const MAX_COLOR: u32 = 0x00FF_FFFF;

/// A 24-bit packed RGB color: red in bits 16-23, green in 8-15, blue in 0-7.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct Color(u32);

impl Color {
    pub const BLACK: Color = Color(0);
    pub const WHITE: Color = Color(MAX_COLOR);

    /// Creates a color from a packed value, rejecting anything above `0xFFFFFF`.
    pub fn new(value: u32) -> Result<Self> {
        if value > MAX_COLOR {
            return Err(ControlError::InvalidArgument(format!(
                "color value {:#x} exceeds 24 bits",
                value
            )));
        }
        Ok(Color(value))
    }

    /// Parses `#rrggbb`, `rrggbb` or any shorter hex value, ignoring surrounding whitespace.
    pub fn from_hex(text: &str) -> Result<Self> {
        let digits = text.trim().trim_start_matches('#');
        if digits.is_empty() {
            return Err(ControlError::parse(text, "no hex digits"));
        }
        if let Some(bad) = digits.chars().find(|c| !c.is_ascii_hexdigit()) {
            return Err(ControlError::parse(
                text,
                format!("invalid hex digit {:?}", bad),
            ));
        }
        let value = u64::from_str_radix(digits, 16)
            .map_err(|e| ControlError::parse(text, e.to_string()))?;
        if value > MAX_COLOR as u64 {
            return Err(ControlError::parse(text, "value exceeds 24 bits"));
        }
        Ok(Color(value as u32))
    }

    pub const fn from_rgb(red: u8, green: u8, blue: u8) -> Self {
        Color(((red as u32) << 16) | ((green as u32) << 8) | blue as u32)
    }

    pub const fn value(&self) -> u32 {
        self.0
    }

    /// Six lowercase hex digits, zero padded, without a leading `#`.
    pub fn to_hex(&self) -> String {
        format!("{:06x}", self.0)
    }

    pub const fn to_rgb(&self) -> (u8, u8, u8) {
        (
            ((self.0 >> 16) & 0xFF) as u8,
            ((self.0 >> 8) & 0xFF) as u8,
            (self.0 & 0xFF) as u8,
        )
    }

    /// The four-symbol text form used in `update_leds` frames.
    pub fn to_compact_text(&self) -> String {
        let mut text = String::with_capacity(4);
        self.push_compact_text(&mut text);
        text
    }

    fn push_compact_text(&self, out: &mut String) {
        let hi = self.0 / 64;
        let lo = self.0 % 64;
        for index in [hi / 4096, (hi % 4096) / 64, hi % 64, lo] {
            out.push(COMPACT_ALPHABET[index as usize] as char);
        }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.to_hex())
    }
}

impl FromStr for Color {
    type Err = ControlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Color::from_hex(s)
    }
}

impl TryFrom<u32> for Color {
    type Error = ControlError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Color::new(value)
    }
}

impl From<Color> for u32 {
    fn from(color: Color) -> Self {
        color.0
    }
}

impl From<(u8, u8, u8)> for Color {
    fn from((red, green, blue): (u8, u8, u8)) -> Self {
        Color::from_rgb(red, green, blue)
    }
}

impl From<Color> for (u8, u8, u8) {
    fn from(color: Color) -> Self {
        color.to_rgb()
    }
}

/// One LED-strip frame, first LED first.
///
/// No length limit is enforced; the device ignores colors beyond its LED count.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ColorMatrix {
    colors: Vec<Color>,
}

impl ColorMatrix {
    pub fn new(colors: Vec<Color>) -> Self {
        ColorMatrix { colors }
    }

    /// A frame of `num_leds` LEDs all showing `color`.
    pub fn solid(num_leds: usize, color: Color) -> Self {
        ColorMatrix {
            colors: vec![color; num_leds],
        }
    }

    pub fn push(&mut self, color: Color) {
        self.colors.push(color);
    }

    pub fn len(&self) -> usize {
        self.colors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }

    pub fn colors(&self) -> &[Color] {
        &self.colors
    }

    /// Concatenated compact text of every color, in order and without separators.
    pub fn to_compact_text(&self) -> String {
        let mut text = String::with_capacity(self.colors.len() * 4);
        for color in &self.colors {
            color.push_compact_text(&mut text);
        }
        text
    }
}

impl FromIterator<Color> for ColorMatrix {
    fn from_iter<I: IntoIterator<Item = Color>>(iter: I) -> Self {
        ColorMatrix {
            colors: iter.into_iter().collect(),
        }
    }
}

impl From<Vec<Color>> for ColorMatrix {
    fn from(colors: Vec<Color>) -> Self {
        ColorMatrix::new(colors)
    }
}

/// Named colors accepted on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CliColors {
    Red,
    Green,
    Blue,
    White,
    WarmWhite,
    Yellow,
    Orange,
    Purple,
    Cyan,
    Magenta,
    Pink,
    Teal,
    Off,
}

impl From<CliColors> for Color {
    fn from(color: CliColors) -> Self {
        match color {
            CliColors::Red => Color(0xff0000),
            CliColors::Green => Color(0x00ff00),
            CliColors::Blue => Color(0x0000ff),
            CliColors::White => Color(0xffffff),
            CliColors::WarmWhite => Color(0xffb46b),
            CliColors::Yellow => Color(0xffff00),
            CliColors::Orange => Color(0xffa500),
            CliColors::Purple => Color(0x800080),
            CliColors::Cyan => Color(0x00ffff),
            CliColors::Magenta => Color(0xff00ff),
            CliColors::Pink => Color(0xffc0cb),
            CliColors::Teal => Color(0x008080),
            CliColors::Off => Color(0x000000),
        }
    }
}
