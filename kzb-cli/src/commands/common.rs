//! Common types and utilities shared across CLI commands.

use std::path::PathBuf;

use kzb::config::ConfigFile;
use kzb::{DirectoryLoader, FileEntry};

use crate::error::CliError;

/// Containers named on the command line.
#[derive(Debug, Clone, Default)]
pub struct ContainerArgs {
    /// Container files, merged in order.
    pub containers: Vec<PathBuf>,
    /// List file naming containers, merged before `containers`.
    pub list: Option<PathBuf>,
}

impl ContainerArgs {
    pub fn is_empty(&self) -> bool {
        self.containers.is_empty() && self.list.is_none()
    }
}

/// Load and merge every container named in `args`.
pub fn load_directory(args: &ContainerArgs, config: &ConfigFile) -> Result<DirectoryLoader, CliError> {
    if args.is_empty() {
        return Err(CliError::NoContainers);
    }

    let mut loader = DirectoryLoader::from_settings(&config.directory);
    if let Some(list) = &args.list {
        loader.add_list_file(list)?;
    }
    for container in &args.containers {
        loader.add_resource(container)?;
    }
    Ok(loader)
}

/// Short flag summary, e.g. `0x06 [demand,cached]`.
pub fn format_flags(file: &FileEntry) -> String {
    let mut names = Vec::new();
    if file.is_load_on_demand() {
        names.push("demand");
    }
    if file.is_cached_resource() {
        names.push("cached");
    }
    if names.is_empty() {
        format!("{:#04x}", file.flags())
    } else {
        format!("{:#04x} [{}]", file.flags(), names.join(","))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_containers() {
        let args = ContainerArgs::default();
        assert!(matches!(
            load_directory(&args, &ConfigFile::default()),
            Err(CliError::NoContainers)
        ));
    }

    #[test]
    fn test_missing_container_is_directory_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let args = ContainerArgs {
            containers: vec![dir.path().join("missing.kzb")],
            list: None,
        };
        assert!(matches!(
            load_directory(&args, &ConfigFile::default()),
            Err(CliError::Directory(_))
        ));
    }
}
