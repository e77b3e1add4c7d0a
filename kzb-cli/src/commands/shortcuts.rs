//! `kzb shortcuts`: alias to target map.

use kzb::config::ConfigFile;

use super::common::{load_directory, ContainerArgs};
use crate::error::CliError;

pub fn run(args: &ContainerArgs, config: &ConfigFile) -> Result<(), CliError> {
    let loader = load_directory(args, config)?;
    let shortcuts = loader.directory().shortcuts();

    if shortcuts.is_empty() {
        println!("No shortcuts.");
        return Ok(());
    }

    let width = shortcuts.keys().map(|alias| alias.len()).max().unwrap_or(0);
    for (alias, target) in shortcuts {
        println!("{:<width$} -> {}", alias, target, width = width);
    }
    Ok(())
}
