//! Loading several containers into one directory.
//!
//! The loader starts from an empty [`Directory`] and merges containers into it
//! in the order they are added, so later containers patch earlier ones.

use std::fs;
use std::path::{Path, PathBuf};

use bytes::Bytes;
use tracing::info;

use crate::config::DirectorySettings;
use crate::directory::{ContainerHeader, Directory, LoadTimings};
use crate::error::DirectoryResult;

/// Summary of one container merged by a [`DirectoryLoader`].
#[derive(Debug, Clone)]
pub struct LoadedContainer {
    /// Source description (file path or `buffer[<len>]`).
    pub description: String,
    pub header: Option<ContainerHeader>,
    pub timings: LoadTimings,
    pub file_count: usize,
    pub deleted_count: usize,
}

/// Builds a directory from a sequence of containers.
#[derive(Debug, Default)]
pub struct DirectoryLoader {
    directory: Directory,
    resource_dir: Option<PathBuf>,
    loaded: Vec<LoadedContainer>,
}

impl DirectoryLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a loader configured from settings.
    pub fn from_settings(settings: &DirectorySettings) -> Self {
        let mut loader = Self::new().with_file_flag_mask(settings.file_flag_mask);
        if let Some(dir) = &settings.resource_dir {
            loader = loader.with_resource_dir(dir);
        }
        loader
    }

    /// Mask applied to the flags of every merged file.
    pub fn with_file_flag_mask(mut self, mask: u32) -> Self {
        self.directory.set_file_flag_mask(mask);
        self
    }

    /// Folder that relative container paths are resolved against.
    pub fn with_resource_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.resource_dir = Some(dir.into());
        self
    }

    /// Read a list file and merge every container named in it.
    ///
    /// Each non-empty line is a container path; relative paths are resolved
    /// against the list file's folder.
    pub fn from_list_file(path: impl AsRef<Path>) -> DirectoryResult<Self> {
        let mut loader = Self::new();
        loader.add_list_file(path)?;
        Ok(loader)
    }

    /// Merge every container named in a list file. Returns how many were merged.
    pub fn add_list_file(&mut self, path: impl AsRef<Path>) -> DirectoryResult<usize> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)?;
        let base = path.parent().unwrap_or_else(|| Path::new(""));

        let mut count = 0;
        for line in contents.lines().map(str::trim).filter(|l| !l.is_empty()) {
            let container = Path::new(line);
            let container = if container.is_absolute() {
                container.to_path_buf()
            } else {
                base.join(container)
            };
            self.add_resource_path(container)?;
            count += 1;
        }

        info!(list = %path.display(), containers = count, "Loaded container list");
        Ok(count)
    }

    /// Parse a container file and merge it.
    pub fn add_resource(&mut self, path: impl AsRef<Path>) -> DirectoryResult<()> {
        let path = path.as_ref();
        let resolved = match &self.resource_dir {
            Some(dir) if path.is_relative() => dir.join(path),
            _ => path.to_path_buf(),
        };
        self.add_resource_path(resolved)
    }

    fn add_resource_path(&mut self, path: PathBuf) -> DirectoryResult<()> {
        let patch = Directory::from_resource(&path)?;
        self.add_directory(patch)
    }

    /// Parse an in-memory container and merge it.
    pub fn add_memory(&mut self, bytes: impl Into<Bytes>) -> DirectoryResult<()> {
        let patch = Directory::from_memory(bytes)?;
        self.add_directory(patch)
    }

    /// Merge an already parsed directory.
    pub fn add_directory(&mut self, patch: Directory) -> DirectoryResult<()> {
        let summary = LoadedContainer {
            description: patch
                .sources()
                .map(|s| s.description())
                .collect::<Vec<_>>()
                .join(", "),
            header: patch.header().cloned(),
            timings: *patch.timings(),
            file_count: patch.root().file_count_recursive(),
            deleted_count: patch.deleted_files().len(),
        };

        self.directory.merge(patch)?;

        info!(
            source = %summary.description,
            files = summary.file_count,
            deleted = summary.deleted_count,
            "Merged container"
        );
        self.loaded.push(summary);
        Ok(())
    }

    /// Containers merged so far, in order.
    pub fn loaded(&self) -> &[LoadedContainer] {
        &self.loaded
    }

    pub fn directory(&self) -> &Directory {
        &self.directory
    }

    pub fn into_directory(self) -> Directory {
        self.directory
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::FileType;
    use crate::writer::{ContainerBuilder, PayloadBuilder};
    use tempfile::TempDir;

    fn container(path: &str, payload: &[u8]) -> Vec<u8> {
        let mut builder = ContainerBuilder::new();
        builder
            .add_file(path, FileType::Binary, 0, PayloadBuilder::new().bytes(payload))
            .unwrap();
        builder.build().unwrap()
    }

    #[test]
    fn test_add_memory_in_order() {
        let mut loader = DirectoryLoader::new();
        loader.add_memory(container("A/x", b"old")).unwrap();
        loader.add_memory(container("A/x", b"new")).unwrap();

        let directory = loader.directory();
        let file = directory.get_file("A/x").unwrap();
        assert_eq!(directory.read_file(file).unwrap(), b"new");
        assert_eq!(loader.loaded().len(), 2);
        assert!(loader.loaded()[0].description.starts_with("buffer["));
    }

    #[test]
    fn test_list_file_resolves_relative_paths() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("base.kzb"), container("A/x", b"1")).unwrap();
        fs::write(dir.path().join("patch.kzb"), container("B/y", b"2")).unwrap();
        fs::write(dir.path().join("list.txt"), "base.kzb\n\n  patch.kzb  \n").unwrap();

        let loader = DirectoryLoader::from_list_file(dir.path().join("list.txt")).unwrap();
        assert_eq!(loader.loaded().len(), 2);

        let directory = loader.into_directory();
        assert_eq!(directory.source_count(), 2);
        assert!(directory.get_file("A/x").is_ok());
        assert!(directory.get_file("B/y").is_ok());
    }

    #[test]
    fn test_missing_list_file() {
        let dir = TempDir::new().unwrap();
        assert!(DirectoryLoader::from_list_file(dir.path().join("nope.txt")).is_err());
    }

    #[test]
    fn test_resource_dir_and_mask_from_settings() {
        let dir = TempDir::new().unwrap();
        let mut builder = ContainerBuilder::new();
        builder
            .add_file("A/x", FileType::Binary, 0xFF, PayloadBuilder::new())
            .unwrap();
        fs::write(dir.path().join("main.kzb"), builder.build().unwrap()).unwrap();

        let settings = DirectorySettings {
            file_flag_mask: 0x0F,
            resource_dir: Some(dir.path().to_path_buf()),
        };
        let mut loader = DirectoryLoader::from_settings(&settings);
        loader.add_resource("main.kzb").unwrap();

        assert_eq!(loader.directory().get_file("A/x").unwrap().flags(), 0x0F);
    }
}
