//! Configuration loading for the reader library.
//!
//! Settings are read from a TOML file when one exists. Missing entries take
//! their defaults, and a missing or invalid file falls back to the defaults
//! entirely.

use crate::error::{ReaderError, Result};
use crate::parsers::ParseOptions;
use crate::reader::{ReaderSettings, ThemePreset, WindowConfig};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::Path;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LibraryConfig {
    #[serde(default = "default_database_path")]
    pub database_path: String,
    #[serde(default = "default_log_level")]
    pub log_level: LogLevel,
    #[serde(default)]
    pub parse: ParseOptions,
    #[serde(default)]
    pub reader: WindowConfig,
    #[serde(default)]
    pub appearance: AppearanceConfig,
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            log_level: default_log_level(),
            parse: ParseOptions::default(),
            reader: WindowConfig::default(),
            appearance: AppearanceConfig::default(),
        }
    }
}

/// Reader typography. A preset `theme` replaces the individual settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppearanceConfig {
    #[serde(default)]
    pub theme: Option<ThemePreset>,
    #[serde(flatten)]
    pub settings: ReaderSettings,
}

impl AppearanceConfig {
    pub fn effective_settings(&self) -> ReaderSettings {
        match self.theme {
            Some(preset) => preset.settings(),
            None => self.settings.clone(),
        }
    }
}

fn default_database_path() -> String {
    "library.db".to_string()
}

fn default_log_level() -> LogLevel {
    LogLevel::Info
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_filter_str(self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_filter_str())
    }
}

pub fn parse_config(contents: &str) -> Result<LibraryConfig> {
    let config: LibraryConfig =
        toml::from_str(contents).map_err(|e| ReaderError::InvalidConfig(e.to_string()))?;
    if config.parse.pdf_pages_per_chapter == 0 {
        return Err(ReaderError::InvalidConfig(
            "parse.pdf_pages_per_chapter must be at least 1".to_string(),
        ));
    }
    if !(0.0..0.5).contains(&config.reader.central_band_margin) {
        return Err(ReaderError::InvalidConfig(
            "reader.central_band_margin must be in [0, 0.5)".to_string(),
        ));
    }
    Ok(config)
}

/// Load `path`, falling back to defaults when it is missing or invalid.
pub fn load_config(path: &Path) -> LibraryConfig {
    let contents = match fs::read_to_string(path) {
        Ok(data) => {
            info!(path = %path.display(), "Loaded config");
            data
        }
        Err(err) => {
            warn!(path = %path.display(), "Falling back to default config: {err}");
            return LibraryConfig::default();
        }
    };

    match parse_config(&contents) {
        Ok(config) => {
            debug!("Parsed configuration from disk");
            config
        }
        Err(err) => {
            warn!(path = %path.display(), "{err}");
            LibraryConfig::default()
        }
    }
}
