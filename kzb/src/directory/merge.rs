//! Destructive directory merge ("patching").

use std::collections::HashSet;

use tracing::debug;

use super::Directory;
use crate::error::{DirectoryError, DirectoryResult};
use crate::tree::{FileEntry, FolderEntry};

impl Directory {
    /// Merge `patch` into this directory, consuming it.
    ///
    /// Folders are united, equally named files are overwritten in place, and
    /// every path in the patch's [`deleted_files`](Directory::deleted_files)
    /// is removed afterwards. Sources and shortcuts move over to this directory.
    ///
    /// Fails with [`DirectoryError::ObjectNotFound`] if the patch deletes a
    /// path that exists neither here nor in the patch. This directory is left
    /// unchanged in that case.
    pub fn merge(&mut self, patch: Directory) -> DirectoryResult<()> {
        self.merge_with(patch, None)
    }

    /// Like [`merge`](Directory::merge), returning the paths of all files that
    /// were added or overwritten and survived the patch's deletions.
    pub fn merge_tracked(&mut self, patch: Directory) -> DirectoryResult<Vec<String>> {
        let mut merged = Vec::new();
        self.merge_with(patch, Some(&mut merged))?;
        Ok(merged)
    }

    fn merge_with(
        &mut self,
        patch: Directory,
        mut merged: Option<&mut Vec<String>>,
    ) -> DirectoryResult<()> {
        let Directory {
            root,
            sources,
            deleted_files,
            shortcuts,
            ..
        } = patch;

        if !deleted_files.is_empty() {
            let existing: HashSet<&str> = self
                .root
                .all_files()
                .into_iter()
                .chain(root.all_files())
                .map(|file| file.path())
                .collect();
            let missing: Vec<String> = deleted_files
                .iter()
                .filter(|path| !existing.contains(path.as_str()))
                .cloned()
                .collect();
            if !missing.is_empty() {
                return Err(DirectoryError::ObjectNotFound { paths: missing });
            }
        }

        let file_count = root.file_count_recursive();
        merge_folder(&mut self.root, root, self.file_flag_mask, &mut merged);
        self.library_folders = Default::default();

        let removed = if deleted_files.is_empty() {
            0
        } else {
            if let Some(merged) = merged.as_deref_mut() {
                merged.retain(|path| !deleted_files.contains(path));
            }
            self.root
                .remove_files_where(&mut |file: &FileEntry| deleted_files.contains(file.path()))
        };

        let source_count = sources.len();
        self.sources.extend(sources);
        self.shortcuts.extend(shortcuts);

        debug!(
            files = file_count,
            deleted = removed,
            sources = source_count,
            "Merged directory"
        );
        Ok(())
    }
}

/// Move every entry of `source` into `target`.
fn merge_folder(
    target: &mut FolderEntry,
    mut source: FolderEntry,
    flag_mask: u32,
    merged: &mut Option<&mut Vec<String>>,
) {
    let (subfolders, files) = source.take_children();

    for (name, subfolder) in subfolders {
        merge_folder(target.subfolder_or_create(&name), subfolder, flag_mask, merged);
    }

    for (_, file) in files {
        let file = target.merge_file(file, flag_mask);
        if let Some(merged) = merged.as_deref_mut() {
            merged.push(file.path().to_string());
        }
    }
}
