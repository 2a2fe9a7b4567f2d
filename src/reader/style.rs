//! Typography and color settings, and the values the reader view applies.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LetterSpacing {
    Tight,
    #[default]
    Normal,
    Wide,
}

impl LetterSpacing {
    pub fn as_css(self) -> &'static str {
        match self {
            LetterSpacing::Tight => "-0.02em",
            LetterSpacing::Normal => "0",
            LetterSpacing::Wide => "0.05em",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReaderSettings {
    pub font_family: String,
    /// Pixels.
    pub font_size: u32,
    pub letter_spacing: LetterSpacing,
    pub line_height: f32,
    pub background_color: String,
    pub text_color: String,
}

impl Default for ReaderSettings {
    fn default() -> Self {
        ThemePreset::Light.settings()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThemePreset {
    Light,
    Dark,
    Warm,
}

impl ThemePreset {
    pub const ALL: [ThemePreset; 3] = [ThemePreset::Light, ThemePreset::Dark, ThemePreset::Warm];

    pub fn id(self) -> &'static str {
        match self {
            ThemePreset::Light => "light",
            ThemePreset::Dark => "dark",
            ThemePreset::Warm => "warm",
        }
    }

    pub fn from_id(id: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|preset| preset.id() == id)
    }

    /// Presets share typography and differ only in colors.
    pub fn settings(self) -> ReaderSettings {
        let (background, text) = match self {
            ThemePreset::Light => ("#FFFFFF", "#000000"),
            ThemePreset::Dark => ("#1A1A1A", "#E0E0E0"),
            ThemePreset::Warm => ("#F5F1E8", "#3A3A3A"),
        };
        ReaderSettings {
            font_family: "Playfair Display".to_string(),
            font_size: 20,
            letter_spacing: LetterSpacing::Normal,
            line_height: 1.8,
            background_color: background.to_string(),
            text_color: text.to_string(),
        }
    }
}

impl fmt::Display for ThemePreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// Computed values the view sets on the reader container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReaderStyle {
    pub font_family: String,
    pub font_size: String,
    pub line_height: String,
    pub letter_spacing: &'static str,
    pub background_color: String,
    pub text_color: String,
}

impl ReaderStyle {
    pub fn from_settings(settings: &ReaderSettings) -> Self {
        Self {
            font_family: settings.font_family.clone(),
            font_size: format!("{}px", settings.font_size),
            line_height: settings.line_height.to_string(),
            letter_spacing: settings.letter_spacing.as_css(),
            background_color: settings.background_color.clone(),
            text_color: settings.text_color.clone(),
        }
    }

    /// Custom property names paired with their values.
    pub fn css_variables(&self) -> [(&'static str, &str); 6] {
        [
            ("--reader-font-family", self.font_family.as_str()),
            ("--reader-font-size", self.font_size.as_str()),
            ("--reader-line-height", self.line_height.as_str()),
            ("--reader-letter-spacing", self.letter_spacing),
            ("--reader-bg-color", self.background_color.as_str()),
            ("--reader-text-color", self.text_color.as_str()),
        ]
    }
}
