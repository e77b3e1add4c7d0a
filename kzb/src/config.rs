//! Configuration file handling.
//!
//! Settings live in an INI file at `<config dir>/kzb/config.ini`:
//!
//! ```ini
//! [directory]
//! file_flag_mask = 0xff
//! resource_dir = /opt/assets
//!
//! [logging]
//! level = info
//! file = /tmp/kzb.log
//! ```
//!
//! Every setting is addressed by a [`ConfigKey`] (`section.key`), which is how
//! the CLI reads and writes individual values.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use ini::Ini;
use thiserror::Error;
use tracing_subscriber::EnvFilter;

use crate::tree::DEFAULT_FILE_FLAG_MASK;

/// Log filter used when none is configured.
pub const DEFAULT_LOG_LEVEL: &str = "info";

const CONFIG_DIR_NAME: &str = "kzb";
const CONFIG_FILE_NAME: &str = "config.ini";

/// Errors that can occur while loading, saving or editing configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(String),

    #[error("Unknown configuration key '{0}'")]
    UnknownKey(String),

    #[error("Invalid value '{value}' for {key}: {reason}")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },

    #[error("Could not determine the user configuration directory")]
    NoConfigDir,
}

/// Settings applied to loaded directories.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectorySettings {
    /// Mask applied to file flags on merge.
    pub file_flag_mask: u32,
    /// Folder that relative container paths are resolved against.
    pub resource_dir: Option<PathBuf>,
}

impl Default for DirectorySettings {
    fn default() -> Self {
        Self {
            file_flag_mask: DEFAULT_FILE_FLAG_MASK,
            resource_dir: None,
        }
    }
}

/// Logging output settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingSettings {
    /// `tracing` filter directive, e.g. `info` or `kzb=debug`.
    pub level: String,
    /// Also write logs to this file.
    pub file: Option<PathBuf>,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: DEFAULT_LOG_LEVEL.to_string(),
            file: None,
        }
    }
}

/// Contents of the configuration file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigFile {
    pub directory: DirectorySettings,
    pub logging: LoggingSettings,
}

/// Location of the user's configuration file.
pub fn config_file_path() -> Result<PathBuf, ConfigError> {
    dirs::config_dir()
        .map(|dir| dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
        .ok_or(ConfigError::NoConfigDir)
}

impl ConfigFile {
    /// Load the user's configuration file, or defaults if it does not exist.
    pub fn load() -> Result<Self, ConfigError> {
        let path = config_file_path()?;
        if !path.exists() {
            return Ok(Self::default());
        }
        Self::load_from(&path)
    }

    /// Load a configuration file. Missing keys keep their defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let ini = Ini::load_from_file(path).map_err(|e| ConfigError::Parse(e.to_string()))?;
        let mut config = Self::default();

        for key in ConfigKey::all() {
            let value = ini
                .section(Some(key.section()))
                .and_then(|section| section.get(key.key_name()));
            if let Some(value) = value {
                key.set(&mut config, value)?;
            }
        }

        Ok(config)
    }

    /// Save to the user's configuration file.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&config_file_path()?)
    }

    /// Save to a configuration file, creating its folder if needed.
    /// Unset optional values are omitted.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut ini = Ini::new();
        for key in ConfigKey::all() {
            let value = key.get(self);
            if !value.is_empty() {
                ini.with_section(Some(key.section()))
                    .set(key.key_name(), value);
            }
        }
        ini.write_to_file(path)?;
        Ok(())
    }
}

/// A single configuration setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigKey {
    DirectoryFileFlagMask,
    DirectoryResourceDir,
    LoggingLevel,
    LoggingFile,
}

impl ConfigKey {
    /// All keys, grouped by section.
    pub fn all() -> &'static [ConfigKey] {
        &[
            ConfigKey::DirectoryFileFlagMask,
            ConfigKey::DirectoryResourceDir,
            ConfigKey::LoggingLevel,
            ConfigKey::LoggingFile,
        ]
    }

    /// Full name, `section.key`.
    pub fn name(self) -> &'static str {
        match self {
            ConfigKey::DirectoryFileFlagMask => "directory.file_flag_mask",
            ConfigKey::DirectoryResourceDir => "directory.resource_dir",
            ConfigKey::LoggingLevel => "logging.level",
            ConfigKey::LoggingFile => "logging.file",
        }
    }

    /// One-line explanation shown next to the setting.
    pub fn description(self) -> &'static str {
        match self {
            ConfigKey::DirectoryFileFlagMask => "mask applied to file flags when containers are merged",
            ConfigKey::DirectoryResourceDir => "folder that relative container paths are resolved against",
            ConfigKey::LoggingLevel => "tracing filter, overridden by RUST_LOG",
            ConfigKey::LoggingFile => "file that receives a copy of the log",
        }
    }

    pub fn section(self) -> &'static str {
        self.name().split_once('.').map_or("", |(section, _)| section)
    }

    pub fn key_name(self) -> &'static str {
        self.name().split_once('.').map_or("", |(_, key)| key)
    }

    /// Current value as a string. Unset optional values are empty.
    pub fn get(self, config: &ConfigFile) -> String {
        match self {
            ConfigKey::DirectoryFileFlagMask => format!("{:#x}", config.directory.file_flag_mask),
            ConfigKey::DirectoryResourceDir => display_path(&config.directory.resource_dir),
            ConfigKey::LoggingLevel => config.logging.level.clone(),
            ConfigKey::LoggingFile => display_path(&config.logging.file),
        }
    }

    /// Validate and store a value. An empty value clears optional settings.
    pub fn set(self, config: &mut ConfigFile, value: &str) -> Result<(), ConfigError> {
        let value = value.trim();
        match self {
            ConfigKey::DirectoryFileFlagMask => {
                config.directory.file_flag_mask = parse_mask(value).map_err(|reason| {
                    ConfigError::InvalidValue {
                        key: self.name().to_string(),
                        value: value.to_string(),
                        reason,
                    }
                })?;
            }
            ConfigKey::DirectoryResourceDir => config.directory.resource_dir = optional_path(value),
            ConfigKey::LoggingLevel => {
                EnvFilter::try_new(value).map_err(|e| ConfigError::InvalidValue {
                    key: self.name().to_string(),
                    value: value.to_string(),
                    reason: e.to_string(),
                })?;
                config.logging.level = value.to_string();
            }
            ConfigKey::LoggingFile => config.logging.file = optional_path(value),
        }
        Ok(())
    }
}

impl ConfigKey {
    /// Restore the built-in default. Optional settings become unset.
    pub fn reset(self, config: &mut ConfigFile) {
        let defaults = ConfigFile::default();
        match self {
            ConfigKey::DirectoryFileFlagMask => {
                config.directory.file_flag_mask = defaults.directory.file_flag_mask
            }
            ConfigKey::DirectoryResourceDir => {
                config.directory.resource_dir = defaults.directory.resource_dir
            }
            ConfigKey::LoggingLevel => config.logging.level = defaults.logging.level,
            ConfigKey::LoggingFile => config.logging.file = defaults.logging.file,
        }
    }

    /// Whether `config` holds the built-in default for this setting.
    pub fn is_default(self, config: &ConfigFile) -> bool {
        self.get(config) == self.get(&ConfigFile::default())
    }
}

impl FromStr for ConfigKey {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ConfigKey::all()
            .iter()
            .copied()
            .find(|key| key.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ConfigError::UnknownKey(s.to_string()))
    }
}

impl fmt::Display for ConfigKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Parse a flag mask written in decimal or as `0x` hex.
pub fn parse_mask(value: &str) -> Result<u32, String> {
    let value = value.trim();
    let parsed = match value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
    {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => value.parse::<u32>(),
    };
    parsed.map_err(|e| e.to_string())
}

fn optional_path(value: &str) -> Option<PathBuf> {
    (!value.is_empty()).then(|| PathBuf::from(value))
}

fn display_path(path: &Option<PathBuf>) -> String {
    path.as_ref()
        .map(|p| p.display().to_string())
        .unwrap_or_default()
}
