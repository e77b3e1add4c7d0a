//! `kzb config`: inspect and edit the settings in `config.ini`.
//!
//! Edits are validated against the same rules used when the file is loaded,
//! so a value that `set` accepts never breaks the next start.

use std::path::Path;

use clap::Subcommand;
use serde::Serialize;

use kzb::config::{config_file_path, ConfigFile, ConfigKey};

use crate::error::CliError;

#[derive(Debug, Subcommand)]
pub enum ConfigCommands {
    /// Show every setting with its effective value
    Show {
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Print the effective value of one setting
    Get {
        /// Setting name, e.g. logging.level
        key: String,
    },

    /// Validate and store a value
    Set {
        /// Setting name, e.g. directory.file_flag_mask
        key: String,

        /// New value; flag masks accept decimal or 0x hex
        value: String,
    },

    /// Restore a setting to its built-in default
    Unset {
        /// Setting name, e.g. directory.resource_dir
        key: String,
    },
}

/// One line of `config show`.
#[derive(Debug, Serialize, PartialEq)]
struct Setting {
    key: &'static str,
    value: Option<String>,
    default: bool,
    description: &'static str,
}

impl Setting {
    fn new(key: ConfigKey, config: &ConfigFile) -> Self {
        let value = key.get(config);
        Self {
            key: key.name(),
            value: (!value.is_empty()).then_some(value),
            default: key.is_default(config),
            description: key.description(),
        }
    }
}

/// Run a config subcommand against the already loaded `config`.
pub fn run(command: ConfigCommands, config: &ConfigFile) -> Result<(), CliError> {
    match command {
        ConfigCommands::Show { json } => {
            let settings = settings(config);
            if json {
                println!("{}", serde_json::to_string_pretty(&settings)?);
            } else {
                println!("# {}", config_file_path()?.display());
                for line in table(&settings) {
                    println!("{line}");
                }
            }
        }
        ConfigCommands::Get { key } => {
            let setting = Setting::new(parse_key(&key)?, config);
            println!("{}", setting.value.as_deref().unwrap_or(""));
        }
        ConfigCommands::Set { key, value } => {
            let key = parse_key(&key)?;
            let path = config_file_path()?;
            let updated = edit(config, &path, |config| key.set(config, &value))?;
            println!("{} = {}", key, key.get(&updated));
        }
        ConfigCommands::Unset { key } => {
            let key = parse_key(&key)?;
            let path = config_file_path()?;
            let updated = edit(config, &path, |config| {
                key.reset(config);
                Ok(())
            })?;
            println!("{} reset to {}", key, display_value(&key.get(&updated)));
        }
    }
    Ok(())
}

fn parse_key(key: &str) -> Result<ConfigKey, CliError> {
    key.parse().map_err(|_| {
        let known: Vec<&str> = ConfigKey::all().iter().map(|key| key.name()).collect();
        CliError::Config(format!("no setting named '{key}' (known: {})", known.join(", ")))
    })
}

/// Apply `change` to a copy of `config` and write the result to `path`.
fn edit(
    config: &ConfigFile,
    path: &Path,
    change: impl FnOnce(&mut ConfigFile) -> Result<(), kzb::config::ConfigError>,
) -> Result<ConfigFile, CliError> {
    let mut updated = config.clone();
    change(&mut updated)?;
    updated.save_to(path)?;
    Ok(updated)
}

fn settings(config: &ConfigFile) -> Vec<Setting> {
    ConfigKey::all()
        .iter()
        .map(|&key| Setting::new(key, config))
        .collect()
}

/// Aligned `key  value  # description` rows. Changed values are starred.
fn table(settings: &[Setting]) -> Vec<String> {
    let key_width = settings.iter().map(|s| s.key.len()).max().unwrap_or(0);
    let value_width = settings
        .iter()
        .map(|s| display_value(s.value.as_deref().unwrap_or("")).len() + 1)
        .max()
        .unwrap_or(0);

    settings
        .iter()
        .map(|s| {
            let mut value = display_value(s.value.as_deref().unwrap_or("")).to_string();
            if !s.default {
                value.push('*');
            }
            format!(
                "{:key_width$}  {:value_width$}  # {}",
                s.key, value, s.description
            )
        })
        .collect()
}

fn display_value(value: &str) -> &str {
    if value.is_empty() {
        "-"
    } else {
        value
    }
}
