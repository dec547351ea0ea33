//! Terminal configuration.
//!
//! [`TerminalConfig`] holds everything the view needs to build a session:
//! font, padding, scrollbar gutter, scrollback depth, line ending handling and
//! the design tokens the theme is derived from. It can be built in code or
//! read from a TOML settings file:
//!
//! ```toml
//! font_family = "JetBrains Mono"
//! font_size = 13.0
//! line_height_multiplier = 1.1
//! padding = 16.0
//! scrollbar_width = 6.0
//! scrollback = 25000
//! convert_eol = true
//!
//! [colors]
//! "gray.900" = "#101014"
//! "gray.100" = "#EDEDED"
//! ```
//!
//! Keys that are missing keep their defaults.

use crate::engine::DEFAULT_SCROLLBACK;
use crate::fit::CellMetrics;
use crate::session::SessionOptions;
use crate::theme::{DesignTokens, InvalidColor, Theme};
use gpui::{Edges, Pixels, px};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// A settings file could not be used.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse terminal settings: {0}")]
    Parse(#[from] toml::de::Error),

    #[error(transparent)]
    Color(#[from] InvalidColor),
}

/// Configuration for a [`TerminalView`](crate::TerminalView).
#[derive(Debug, Clone, PartialEq)]
pub struct TerminalConfig {
    /// Font family name (e.g., "Fira Code", "JetBrains Mono")
    pub font_family: String,

    /// Font size in pixels
    pub font_size: Pixels,

    /// Multiplier for line height to accommodate tall glyphs.
    /// Default is 1.0 (no extra height)
    pub line_height_multiplier: f32,

    /// Space between the container edge and the grid.
    pub padding: Edges<Pixels>,

    /// Width of the scrollbar gutter reserved on the right.
    pub scrollbar_width: Pixels,

    /// Maximum number of scrollback lines to keep in history
    pub scrollback: usize,

    /// Treat a bare `\n` in written text as `\r\n`.
    pub convert_eol: bool,

    /// Colour tokens the theme is derived from.
    pub tokens: DesignTokens,
}

impl Default for TerminalConfig {
    fn default() -> Self {
        Self {
            font_family: "monospace".into(),
            font_size: px(14.0),
            line_height_multiplier: 1.0,
            padding: Edges::all(px(16.0)),
            scrollbar_width: px(6.0),
            scrollback: DEFAULT_SCROLLBACK,
            convert_eol: true,
            tokens: DesignTokens::default(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SettingsFile {
    font_family: Option<String>,
    font_size: Option<f32>,
    line_height_multiplier: Option<f32>,
    padding: Option<f32>,
    scrollbar_width: Option<f32>,
    scrollback: Option<usize>,
    convert_eol: Option<bool>,
    colors: BTreeMap<String, String>,
}

impl TerminalConfig {
    /// Parses TOML settings on top of the defaults.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let file: SettingsFile = toml::from_str(content)?;
        let defaults = Self::default();

        let mut tokens = defaults.tokens;
        for (name, value) in &file.colors {
            tokens.set(name, value)?;
        }

        Ok(Self {
            font_family: file.font_family.unwrap_or(defaults.font_family),
            font_size: file.font_size.map(px).unwrap_or(defaults.font_size),
            line_height_multiplier: file
                .line_height_multiplier
                .unwrap_or(defaults.line_height_multiplier),
            padding: file
                .padding
                .map(|padding| Edges::all(px(padding)))
                .unwrap_or(defaults.padding),
            scrollbar_width: file
                .scrollbar_width
                .map(px)
                .unwrap_or(defaults.scrollbar_width),
            scrollback: file.scrollback.unwrap_or(defaults.scrollback),
            convert_eol: file.convert_eol.unwrap_or(defaults.convert_eol),
            tokens,
        })
    }

    /// Reads a TOML settings file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml_str(&content)?;
        tracing::debug!(path = %path.display(), "terminal settings loaded");
        Ok(config)
    }

    pub fn theme(&self) -> Theme {
        Theme::from_tokens(&self.tokens)
    }

    /// Cell size estimate used until the font has been measured.
    pub fn estimated_cell_metrics(&self) -> CellMetrics {
        CellMetrics::estimate(self.font_size, self.line_height_multiplier)
    }

    /// Options for a session built from this configuration.
    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            convert_eol: self.convert_eol,
            scrollback: self.scrollback,
            theme: self.theme(),
            cell_metrics: self.estimated_cell_metrics(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = TerminalConfig::default();

        assert_eq!(config.padding, Edges::all(px(16.0)));
        assert_eq!(config.scrollbar_width, px(6.0));
        assert_eq!(config.scrollback, 25_000);
        assert!(config.convert_eol);
    }

    #[test]
    fn test_empty_file_keeps_defaults() {
        let config = TerminalConfig::from_toml_str("").unwrap();
        assert_eq!(config, TerminalConfig::default());
    }

    #[test]
    fn test_overrides() {
        let config = TerminalConfig::from_toml_str(
            r##"
            font_family = "JetBrains Mono"
            font_size = 13.0
            padding = 8.0
            scrollback = 500
            convert_eol = false

            [colors]
            "gray.900" = "#101014"
            "##,
        )
        .unwrap();

        assert_eq!(config.font_family, "JetBrains Mono");
        assert_eq!(config.font_size, px(13.0));
        assert_eq!(config.padding, Edges::all(px(8.0)));
        assert_eq!(config.scrollback, 500);
        assert!(!config.convert_eol);
        assert_eq!(
            config.theme().background,
            DesignTokens::parse_hex("#101014").unwrap()
        );
        assert_eq!(config.scrollbar_width, px(6.0));
    }

    #[test]
    fn test_bad_colour_is_rejected() {
        let err = TerminalConfig::from_toml_str(
            r#"
            [colors]
            "gray.900" = "dark"
            "#,
        )
        .unwrap_err();

        assert!(matches!(err, ConfigError::Color(_)));
    }

    #[test]
    fn test_bad_toml_is_rejected() {
        let err = TerminalConfig::from_toml_str("font_size = [").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_missing_file() {
        let err = TerminalConfig::load("/nonexistent/terminal.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn test_session_options_follow_config() {
        let config = TerminalConfig {
            scrollback: 0,
            convert_eol: false,
            ..TerminalConfig::default()
        };
        let options = config.session_options();

        assert_eq!(options.scrollback, 0);
        assert!(!options.convert_eol);
        assert_eq!(options.theme, config.theme());
        assert_eq!(options.cell_metrics, CellMetrics::estimate(px(14.0), 1.0));
    }
}
