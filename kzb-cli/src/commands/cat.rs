//! `kzb cat`: write a file's payload to stdout.

use std::io::{self, Write};

use kzb::config::ConfigFile;

use super::common::{load_directory, ContainerArgs};
use crate::error::CliError;

pub fn run(args: &ContainerArgs, config: &ConfigFile, path: &str) -> Result<(), CliError> {
    let loader = load_directory(args, config)?;
    let directory = loader.directory();

    let file = directory.get_file(path)?;
    let bytes = directory.read_file(file)?;

    let mut stdout = io::stdout().lock();
    stdout.write_all(&bytes)?;
    stdout.flush()?;
    Ok(())
}
