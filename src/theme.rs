//! Terminal theme and design tokens.
//!
//! A [`Theme`] carries the colours the host design system supplies to the
//! terminal: background, foreground, cursor and selection. It is recomputed
//! from [`DesignTokens`] whenever the tokens change, and handed to the session,
//! which pushes it into a live engine.
//!
//! Cell colours that are not one of the themed defaults resolve through the
//! usual terminal palettes:
//!
//! - **0-15**: ANSI colours (Tango-like defaults)
//! - **16-231**: 6×6×6 RGB cube with components `0, 95, 135, 175, 215, 255`
//! - **232-255**: 24-step grayscale from `#080808` to `#EEEEEE`
//! - **Spec**: true colour, used as is
//!
//! # Example
//!
//! ```
//! use gpui_embedded_terminal::theme::{DesignTokens, Theme};
//!
//! let mut tokens = DesignTokens::default();
//! tokens.set("gray.900", "#101014").unwrap();
//!
//! let theme = Theme::from_tokens(&tokens);
//! assert_eq!(theme.background, DesignTokens::parse_hex("#101014").unwrap());
//! ```

use alacritty_terminal::term::color::Colors;
use alacritty_terminal::vte::ansi::{Color, NamedColor, Rgb};
use gpui::Hsla;
use std::collections::BTreeMap;
use thiserror::Error;

/// Token read for the terminal background.
pub const BACKGROUND_TOKEN: &str = "gray.900";
/// Token read for the terminal foreground and cursor.
pub const FOREGROUND_TOKEN: &str = "gray.100";
/// Token read for the scrollbar thumb.
pub const SCROLLBAR_THUMB_TOKEN: &str = "gray.500";
/// Token read for the selection highlight.
pub const SELECTION_TOKEN: &str = "gray.600";

const SELECTION_ALPHA: f32 = 0.6;

/// Built-in gray scale, used when a token is not overridden.
const GRAY_SCALE: [(&str, &str); 10] = [
    ("gray.50", "#F7FAFC"),
    ("gray.100", "#EDF2F7"),
    ("gray.200", "#E2E8F0"),
    ("gray.300", "#CBD5E0"),
    ("gray.400", "#A0AEC0"),
    ("gray.500", "#718096"),
    ("gray.600", "#4A5568"),
    ("gray.700", "#2D3748"),
    ("gray.800", "#1A202C"),
    ("gray.900", "#171923"),
];

const ANSI_COLORS: [u32; 16] = [
    0x000000, 0xcc0000, 0x4e9a06, 0xc4a000, 0x3465a4, 0x75507b, 0x06989a, 0xd3d7cf,
    0x555753, 0xef2929, 0x8ae234, 0xfce94f, 0x729fcf, 0xad7fa8, 0x34e2e2, 0xeeeeec,
];

/// A colour token could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid colour for token {name:?}: expected #rrggbb, got {value:?}")]
pub struct InvalidColor {
    pub name: String,
    pub value: String,
}

/// Named colour tokens from the host design system.
///
/// Tokens are keyed like `"gray.900"`. Unknown tokens resolve to `None`;
/// the gray scale is always present.
#[derive(Debug, Clone, PartialEq)]
pub struct DesignTokens {
    colors: BTreeMap<String, Hsla>,
}

impl Default for DesignTokens {
    fn default() -> Self {
        let colors = GRAY_SCALE
            .iter()
            .filter_map(|(name, hex)| Some((name.to_string(), Self::parse_hex(hex)?)))
            .collect();
        Self { colors }
    }
}

impl DesignTokens {
    /// Parses `#rrggbb` (the `#` is optional).
    pub fn parse_hex(value: &str) -> Option<Hsla> {
        let value = value.trim();
        let digits = value.strip_prefix('#').unwrap_or(value);
        if digits.len() != 6 || !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
            return None;
        }
        u32::from_str_radix(digits, 16).ok().map(hex_to_hsla)
    }

    /// Overrides a token with a `#rrggbb` colour.
    pub fn set(&mut self, name: &str, value: &str) -> Result<(), InvalidColor> {
        let color = Self::parse_hex(value).ok_or_else(|| InvalidColor {
            name: name.to_string(),
            value: value.to_string(),
        })?;
        self.colors.insert(name.to_string(), color);
        Ok(())
    }

    /// Looks a token up.
    pub fn get(&self, name: &str) -> Option<Hsla> {
        self.colors.get(name).copied()
    }

    fn get_or_default(&self, name: &str) -> Hsla {
        self.get(name)
            .or_else(|| Self::default().get(name))
            .unwrap_or_else(gpui::black)
    }

    /// Colour of the scrollbar thumb.
    pub fn scrollbar_thumb(&self) -> Hsla {
        self.get_or_default(SCROLLBAR_THUMB_TOKEN)
    }
}

/// Colours applied to the terminal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Theme {
    pub background: Hsla,
    pub foreground: Hsla,
    pub cursor: Hsla,
    pub selection: Hsla,
}

impl Default for Theme {
    fn default() -> Self {
        Self::from_tokens(&DesignTokens::default())
    }
}

impl Theme {
    /// Derives the theme from design tokens.
    pub fn from_tokens(tokens: &DesignTokens) -> Self {
        let foreground = tokens.get_or_default(FOREGROUND_TOKEN);
        let mut selection = tokens.get_or_default(SELECTION_TOKEN);
        selection.a = SELECTION_ALPHA;
        Self {
            background: tokens.get_or_default(BACKGROUND_TOKEN),
            foreground,
            cursor: foreground,
            selection,
        }
    }

    pub fn with_background(mut self, r: u8, g: u8, b: u8) -> Self {
        self.background = rgb_to_hsla(Rgb { r, g, b });
        self
    }

    pub fn with_foreground(mut self, r: u8, g: u8, b: u8) -> Self {
        self.foreground = rgb_to_hsla(Rgb { r, g, b });
        self
    }

    pub fn with_cursor(mut self, r: u8, g: u8, b: u8) -> Self {
        self.cursor = rgb_to_hsla(Rgb { r, g, b });
        self
    }

    /// Resolves a cell colour.
    ///
    /// Overrides set by the running program (OSC 4/10/11/12) win over the
    /// theme; everything else falls back to the theme or the fixed palettes.
    pub fn resolve(&self, color: Color, colors: &Colors) -> Hsla {
        match color {
            Color::Spec(rgb) => rgb_to_hsla(rgb),
            Color::Indexed(idx) => match colors[idx as usize] {
                Some(rgb) => rgb_to_hsla(rgb),
                None => indexed_color(idx),
            },
            Color::Named(named) => {
                if let Some(rgb) = colors[named] {
                    return rgb_to_hsla(rgb);
                }
                match named {
                    NamedColor::Foreground | NamedColor::BrightForeground => self.foreground,
                    NamedColor::Background => self.background,
                    NamedColor::Cursor => self.cursor,
                    NamedColor::DimForeground => dim(self.foreground),
                    other => {
                        let idx = other as usize;
                        if idx < 16 {
                            hex_to_hsla(ANSI_COLORS[idx])
                        } else {
                            let base = idx.saturating_sub(NamedColor::DimBlack as usize) % 8;
                            dim(hex_to_hsla(ANSI_COLORS[base]))
                        }
                    }
                }
            }
        }
    }
}

fn dim(mut color: Hsla) -> Hsla {
    color.l *= 0.66;
    color
}

fn indexed_color(idx: u8) -> Hsla {
    match idx {
        0..=15 => hex_to_hsla(ANSI_COLORS[idx as usize]),
        16..=231 => {
            let cube = idx - 16;
            let component = |v: u8| if v == 0 { 0 } else { 55 + v * 40 };
            rgb_to_hsla(Rgb {
                r: component(cube / 36),
                g: component((cube / 6) % 6),
                b: component(cube % 6),
            })
        }
        _ => {
            let gray = 8 + (idx - 232) * 10;
            rgb_to_hsla(Rgb {
                r: gray,
                g: gray,
                b: gray,
            })
        }
    }
}

fn hex_to_hsla(hex: u32) -> Hsla {
    gpui::rgb(hex).into()
}

pub(crate) fn rgb_to_hsla(rgb: Rgb) -> Hsla {
    hex_to_hsla(((rgb.r as u32) << 16) | ((rgb.g as u32) << 8) | rgb.b as u32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hex() {
        assert_eq!(
            DesignTokens::parse_hex("#ffffff"),
            DesignTokens::parse_hex("FFFFFF")
        );
        assert!(DesignTokens::parse_hex("#fff").is_none());
        assert!(DesignTokens::parse_hex("#gggggg").is_none());
        assert!(DesignTokens::parse_hex("#+fffff").is_none());
        assert!(DesignTokens::parse_hex("+fffff").is_none());
        assert!(DesignTokens::parse_hex("##ffffff").is_none());
    }

    #[test]
    fn test_signed_hex_token_is_rejected() {
        let mut tokens = DesignTokens::default();
        assert!(tokens.set("gray.900", "#+00000").is_err());
        assert_eq!(tokens, DesignTokens::default());
    }

    #[test]
    fn test_invalid_token_is_rejected() {
        let mut tokens = DesignTokens::default();
        let err = tokens.set("gray.900", "dark").unwrap_err();
        assert_eq!(err.name, "gray.900");
        assert_eq!(tokens, DesignTokens::default());
    }

    #[test]
    fn test_theme_reads_gray_tokens() {
        let tokens = DesignTokens::default();
        let theme = Theme::from_tokens(&tokens);

        assert_eq!(Some(theme.background), tokens.get("gray.900"));
        assert_eq!(Some(theme.foreground), tokens.get("gray.100"));
        assert_eq!(theme.cursor, theme.foreground);
        assert_eq!(theme.selection.a, SELECTION_ALPHA);
    }

    #[test]
    fn test_changed_token_changes_theme() {
        let mut tokens = DesignTokens::default();
        let before = Theme::from_tokens(&tokens);

        tokens.set("gray.900", "#000000").unwrap();
        let after = Theme::from_tokens(&tokens);

        assert_ne!(before, after);
        assert_eq!(after.background.l, 0.0);
        assert_eq!(before.foreground, after.foreground);
    }

    #[test]
    fn test_unrelated_token_keeps_theme() {
        let mut tokens = DesignTokens::default();
        let before = Theme::from_tokens(&tokens);

        tokens.set("blue.500", "#3182ce").unwrap();

        assert_eq!(before, Theme::from_tokens(&tokens));
    }

    #[test]
    fn test_resolve_named_defaults_use_theme() {
        let theme = Theme::default().with_background(0, 0, 0);
        let colors = Colors::default();

        assert_eq!(
            theme.resolve(Color::Named(NamedColor::Background), &colors),
            theme.background
        );
        assert_eq!(
            theme.resolve(Color::Named(NamedColor::Foreground), &colors),
            theme.foreground
        );
    }

    #[test]
    fn test_resolve_override_wins() {
        let theme = Theme::default();
        let mut colors = Colors::default();
        let red = Rgb { r: 255, g: 0, b: 0 };
        colors[NamedColor::Foreground] = Some(red);

        assert_eq!(
            theme.resolve(Color::Named(NamedColor::Foreground), &colors),
            rgb_to_hsla(red)
        );
    }

    #[test]
    fn test_resolve_indexed_matches_named() {
        let theme = Theme::default();
        let colors = Colors::default();

        assert_eq!(
            theme.resolve(Color::Indexed(1), &colors),
            theme.resolve(Color::Named(NamedColor::Red), &colors)
        );
    }

    #[test]
    fn test_grayscale_ramp_ends() {
        assert_eq!(indexed_color(232), rgb_to_hsla(Rgb { r: 8, g: 8, b: 8 }));
        assert_eq!(
            indexed_color(255),
            rgb_to_hsla(Rgb {
                r: 238,
                g: 238,
                b: 238
            })
        );
    }

    #[test]
    fn test_cube_corner_is_white() {
        assert_eq!(indexed_color(231), hex_to_hsla(0xffffff));
        assert_eq!(indexed_color(16), hex_to_hsla(0x000000));
    }
}
