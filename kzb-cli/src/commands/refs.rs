//! `kzb refs`: references embedded in a file.

use kzb::config::ConfigFile;
use kzb::Endianness;

use super::common::{load_directory, ContainerArgs};
use crate::error::CliError;

pub fn run(args: &ContainerArgs, config: &ConfigFile, path: &str) -> Result<(), CliError> {
    let loader = load_directory(args, config)?;
    let directory = loader.directory();

    let file = directory.get_file(path)?;
    let (_, positions) = directory.open_file_with_references(file, Endianness::Unspecified)?;
    let references = directory.file_references(file)?;

    println!("{}", directory.file_debug_description(file)?);
    if references.is_empty() {
        println!("  (no references)");
        return Ok(());
    }

    for (position, target) in positions.iter().zip(&references) {
        match target {
            Some(target) => println!("  @{:<8} {}", position, target),
            None => println!("  @{:<8} (null)", position),
        }
    }
    Ok(())
}
