//! Shortcut resolution.

use std::time::{Duration, Instant};

use tracing::debug;

use super::Directory;
use crate::error::{DirectoryError, DirectoryResult};
use crate::tree::FileType;

/// Root folder holding shortcut records.
pub const SHORTCUTS_FOLDER: &str = "Shortcuts";

impl Directory {
    /// Build the alias map from the files in the root `Shortcuts` folder.
    ///
    /// Each file's payload starts with one reference index naming the target.
    /// The alias is the shortcut file's name.
    pub(super) fn resolve_shortcuts(&mut self) -> DirectoryResult<()> {
        let started = Instant::now();
        let Some(folder) = self.root.subfolder(SHORTCUTS_FOLDER) else {
            return Ok(());
        };

        let mut resolved = Vec::with_capacity(folder.files().len());
        let mut open_time = Duration::ZERO;
        let mut read_time = Duration::ZERO;
        for file in folder.files().values() {
            if file.file_type() != FileType::Shortcut {
                return Err(DirectoryError::WrongFileType {
                    path: file.path().to_string(),
                    expected: FileType::Shortcut.to_string(),
                    actual: file.file_type().to_string(),
                });
            }

            let opened = Instant::now();
            let mut stream = self.open_file(file)?;
            open_time += opened.elapsed();

            let read = Instant::now();
            let target = self.read_reference(&mut stream, file)?.ok_or_else(|| {
                DirectoryError::corrupt(format!("shortcut '{}' has a null target", file.path()))
            })?;
            read_time += read.elapsed();

            resolved.push((file.name().to_string(), target));
        }

        debug!(count = resolved.len(), "Resolved shortcuts");
        self.shortcuts.extend(resolved);
        self.timings.shortcut_open = open_time;
        self.timings.shortcut_read_reference = read_time;
        self.timings.shortcuts = started.elapsed();
        Ok(())
    }
}
