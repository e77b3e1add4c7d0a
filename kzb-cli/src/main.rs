//! KZB CLI - Inspect merged `.KZB` container directories
//!
//! Containers given with `--container` (or listed in a `--list` file) are
//! merged in order into one directory before the command runs.

mod commands;
mod error;

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use kzb::config::ConfigFile;
use tracing::debug;

use commands::common::ContainerArgs;
use commands::config::ConfigCommands;
use error::CliError;

#[derive(Debug, Parser)]
#[command(name = "kzb", version, about = "Inspect merged .KZB container directories")]
struct Cli {
    /// Container file to load; repeat to merge several in order
    #[arg(short = 'c', long = "container", global = true)]
    containers: Vec<PathBuf>,

    /// File listing one container path per line
    #[arg(long, global = true)]
    list: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Show loaded containers and directory totals
    Info,

    /// List files with type, size and flags
    Ls {
        /// Only list paths matching this glob pattern (e.g., "Objects/*")
        #[arg(short, long)]
        pattern: Option<String>,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Write a file's payload to stdout
    Cat {
        /// File path or shortcut alias
        path: String,
    },

    /// Show the references embedded in a file
    Refs {
        /// File path or shortcut alias
        path: String,
    },

    /// List shortcut aliases and their targets
    Shortcuts,

    /// Show or edit settings in config.ini
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn run() -> Result<(), CliError> {
    let cli = Cli::parse();
    let config = ConfigFile::load()?;

    let mut logging = config.logging.clone();
    if cli.verbose {
        logging.level = "debug".to_string();
    }
    let _guard = kzb::logging::init_logging(&logging)?;
    debug!(version = kzb::VERSION, "Starting");

    let args = ContainerArgs {
        containers: cli.containers,
        list: cli.list,
    };

    match cli.command {
        Commands::Info => commands::info::run(&args, &config),
        Commands::Ls { pattern, json } => commands::ls::run(&args, &config, pattern.as_deref(), json),
        Commands::Cat { path } => commands::cat::run(&args, &config, &path),
        Commands::Refs { path } => commands::refs::run(&args, &config, &path),
        Commands::Shortcuts => commands::shortcuts::run(&args, &config),
        Commands::Config { command } => commands::config::run(command, &config),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_repeated_containers_keep_order() {
        let cli = Cli::try_parse_from(["kzb", "-c", "base.kzb", "-c", "patch.kzb", "ls", "--json"])
            .unwrap();
        assert_eq!(
            cli.containers,
            vec![PathBuf::from("base.kzb"), PathBuf::from("patch.kzb")]
        );
        assert!(matches!(cli.command, Commands::Ls { json: true, .. }));
    }

    #[test]
    fn test_config_subcommand() {
        let cli = Cli::try_parse_from(["kzb", "config", "set", "logging.level", "warn"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Config {
                command: ConfigCommands::Set { .. }
            }
        ));
    }

    #[test]
    fn test_config_show_json() {
        let cli = Cli::try_parse_from(["kzb", "config", "show", "--json"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Config {
                command: ConfigCommands::Show { json: true }
            }
        ));
        assert!(Cli::try_parse_from(["kzb", "config", "list"]).is_err());
    }
}
