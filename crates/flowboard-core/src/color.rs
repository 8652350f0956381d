//! Color specifications for nodes and edges.
//!
//! A board stores colors either as a named palette entry or as a literal
//! `#rgb` / `#rrggbb` string. Both are resolved to a concrete
//! [`peniko::Color`] only when the renderer asks for one.

use peniko::Color;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Errors produced when parsing a color string.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ColorError {
    #[error("invalid hex color: {0}")]
    InvalidHex(String),
    #[error("unknown palette color: {0}")]
    UnknownName(String),
}

/// Named entries of the built-in palette.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PaletteColor {
    Red,
    Yellow,
    Green,
    Black,
    Orange,
}

impl PaletteColor {
    pub const ALL: [PaletteColor; 5] = [
        PaletteColor::Red,
        PaletteColor::Yellow,
        PaletteColor::Green,
        PaletteColor::Black,
        PaletteColor::Orange,
    ];

    /// Name used in the serialized board.
    pub fn name(self) -> &'static str {
        match self {
            PaletteColor::Red => "red",
            PaletteColor::Yellow => "yellow",
            PaletteColor::Green => "green",
            PaletteColor::Black => "black",
            PaletteColor::Orange => "orange",
        }
    }

    /// Concrete RGB value of this palette entry.
    pub fn rgb(self) -> (u8, u8, u8) {
        match self {
            PaletteColor::Red => (0xdc, 0x26, 0x26),
            PaletteColor::Yellow => (0xca, 0x8a, 0x04),
            PaletteColor::Green => (0x16, 0xa3, 0x4a),
            PaletteColor::Black => (0x18, 0x18, 0x1b),
            PaletteColor::Orange => (0xea, 0x58, 0x0c),
        }
    }

    fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|c| c.name().eq_ignore_ascii_case(name))
    }
}

/// A validated `#rgb` or `#rrggbb` literal.
///
/// The original spelling is kept so that a board round-trips unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HexColor(String);

impl HexColor {
    pub fn parse(s: &str) -> Result<Self, ColorError> {
        let digits = s
            .strip_prefix('#')
            .ok_or_else(|| ColorError::InvalidHex(s.to_string()))?;
        let valid_len = digits.len() == 3 || digits.len() == 6;
        if !valid_len || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(ColorError::InvalidHex(s.to_string()));
        }
        Ok(Self(s.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Decode to RGB components.
    pub fn rgb(&self) -> (u8, u8, u8) {
        let hex = &self.0[1..];
        // Length and digits were validated in `parse`.
        let channel = |range: std::ops::Range<usize>| u8::from_str_radix(&hex[range], 16).unwrap_or(0);
        if hex.len() == 3 {
            (channel(0..1) * 17, channel(1..2) * 17, channel(2..3) * 17)
        } else {
            (channel(0..2), channel(2..4), channel(4..6))
        }
    }
}

/// A color as stored on the board: palette name or hex literal.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ColorSpec {
    Named(PaletteColor),
    Literal(HexColor),
}

impl ColorSpec {
    /// Default color for status badges.
    pub const STATUS_DEFAULT: ColorSpec = ColorSpec::Named(PaletteColor::Yellow);
    /// Default color for new edges.
    pub const EDGE_DEFAULT: ColorSpec = ColorSpec::Named(PaletteColor::Orange);

    /// Resolve to a concrete color for rendering.
    pub fn to_color(&self) -> Color {
        let (r, g, b) = match self {
            ColorSpec::Named(named) => named.rgb(),
            ColorSpec::Literal(hex) => hex.rgb(),
        };
        Color::from_rgba8(r, g, b, 255)
    }

    /// Parse leniently: anything unrecognized becomes the status default.
    pub fn parse_or_default(s: &str) -> Self {
        s.parse().unwrap_or_else(|e| {
            log::warn!("{e}; using {}", Self::STATUS_DEFAULT);
            Self::STATUS_DEFAULT
        })
    }
}

impl Default for ColorSpec {
    fn default() -> Self {
        Self::STATUS_DEFAULT
    }
}

impl FromStr for ColorSpec {
    type Err = ColorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.starts_with('#') {
            return HexColor::parse(s).map(ColorSpec::Literal);
        }
        PaletteColor::from_name(s)
            .map(ColorSpec::Named)
            .ok_or_else(|| ColorError::UnknownName(s.to_string()))
    }
}

impl fmt::Display for ColorSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColorSpec::Named(named) => f.write_str(named.name()),
            ColorSpec::Literal(hex) => f.write_str(hex.as_str()),
        }
    }
}

impl Serialize for ColorSpec {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ColorSpec {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = serde_json::Value::deserialize(deserializer)?;
        Ok(match raw.as_str() {
            Some(s) => Self::parse_or_default(s),
            None => {
                log::warn!("non-string color {raw}; using {}", Self::STATUS_DEFAULT);
                Self::STATUS_DEFAULT
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_named() {
        assert_eq!("red".parse::<ColorSpec>(), Ok(ColorSpec::Named(PaletteColor::Red)));
        assert_eq!("Green".parse::<ColorSpec>(), Ok(ColorSpec::Named(PaletteColor::Green)));
    }

    #[test]
    fn test_parse_hex() {
        let short: ColorSpec = "#f0a".parse().unwrap();
        assert_eq!(short.to_color(), Color::from_rgba8(0xff, 0x00, 0xaa, 255));

        let long: ColorSpec = "#16A34a".parse().unwrap();
        assert_eq!(long.to_color(), Color::from_rgba8(0x16, 0xa3, 0x4a, 255));
        assert_eq!(long.to_string(), "#16A34a");
    }

    #[test]
    fn test_rejects_bad_hex() {
        assert!(matches!("#12".parse::<ColorSpec>(), Err(ColorError::InvalidHex(_))));
        assert!(matches!("#12345g".parse::<ColorSpec>(), Err(ColorError::InvalidHex(_))));
        assert!(matches!("#1234".parse::<ColorSpec>(), Err(ColorError::InvalidHex(_))));
    }

    #[test]
    fn test_unknown_name_coerced_on_load() {
        let spec: ColorSpec = serde_json::from_str("\"chartreuse\"").unwrap();
        assert_eq!(spec, ColorSpec::STATUS_DEFAULT);
    }

    #[test]
    fn test_non_string_coerced_on_load() {
        for json in ["null", "7", "{\"r\": 1}"] {
            let spec: ColorSpec = serde_json::from_str(json).unwrap();
            assert_eq!(spec, ColorSpec::STATUS_DEFAULT, "{json}");
        }
    }

    #[test]
    fn test_serializes_as_string() {
        let json = serde_json::to_string(&ColorSpec::EDGE_DEFAULT).unwrap();
        assert_eq!(json, "\"orange\"");
    }
}
