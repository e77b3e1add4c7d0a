//! Container directories.
//!
//! A [`Directory`] is the merged view of one or more parsed containers: a
//! folder tree, the sources backing its files, tombstones recorded by patches,
//! and the shortcut map.
//!
//! # Example
//!
//! ```
//! use kzb::writer::{ContainerBuilder, PayloadBuilder};
//! use kzb::{Directory, FileType};
//!
//! let mut base = ContainerBuilder::new();
//! base.add_file("Objects/Box", FileType::Mesh, 0, PayloadBuilder::new().bytes(b"box"))
//!     .unwrap();
//! let mut directory = Directory::from_memory(base.build().unwrap()).unwrap();
//!
//! let mut patch = ContainerBuilder::new();
//! patch.add_file("Objects/Ball", FileType::Mesh, 0, PayloadBuilder::new().bytes(b"ball"))
//!     .unwrap();
//! directory.merge(Directory::from_memory(patch.build().unwrap()).unwrap()).unwrap();
//!
//! let ball = directory.get_file("Objects/Ball").unwrap();
//! assert_eq!(directory.read_file(ball).unwrap(), b"ball");
//! ```

mod merge;
mod parser;
mod shortcuts;

pub use parser::{
    ContainerHeader, CONTAINER_FLAG_LITTLE_ENDIAN, FORMAT_VERSION, MAGIC, MAX_FOLDER_DEPTH,
};
pub use shortcuts::SHORTCUTS_FOLDER;

pub(crate) use parser::string_padding;

use std::path::Path;
use std::sync::OnceLock;
use std::time::Duration;

use bytes::Bytes;
use indexmap::{IndexMap, IndexSet};
use tracing::debug;

use crate::codec::{decode_positions, REFERENCE_SIZE};
use crate::error::{DirectoryError, DirectoryResult};
use crate::path::split_path;
use crate::source::{ContainerSource, SourceId};
use crate::stream::{Endianness, InputStream};
use crate::tree::{FileEntry, FolderEntry, DEFAULT_FILE_FLAG_MASK};

/// Time spent in each phase of loading a container.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadTimings {
    pub header: Duration,
    pub folders: Duration,
    pub files: Duration,
    pub external_files: Duration,
    pub deleted_files: Duration,
    pub shortcuts: Duration,
    /// Part of `shortcuts` spent opening shortcut files.
    pub shortcut_open: Duration,
    /// Part of `shortcuts` spent reading shortcut references.
    pub shortcut_read_reference: Duration,
}

impl LoadTimings {
    pub fn total(&self) -> Duration {
        self.header
            + self.folders
            + self.files
            + self.external_files
            + self.deleted_files
            + self.shortcuts
    }
}

/// Well-known library folders at the root of a project container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Library {
    PropertyTypes,
    Animations,
    Meshes,
}

impl Library {
    /// Root folder holding the library.
    pub fn folder_name(self) -> &'static str {
        match self {
            Library::PropertyTypes => "PropertyTypeLibrary",
            Library::Animations => "Animation Data",
            Library::Meshes => "Mesh Data",
        }
    }

    /// Path prefix of files in the library, including the trailing separator.
    pub fn prefix(self) -> &'static str {
        match self {
            Library::PropertyTypes => "PropertyTypeLibrary/",
            Library::Animations => "Animation Data/",
            Library::Meshes => "Mesh Data/",
        }
    }
}

/// Positions of the library folders among the root's subfolders, looked up
/// on first use. Reset whenever the root changes.
#[derive(Debug, Default)]
struct LibraryFolders {
    slots: [OnceLock<Option<usize>>; 3],
}

impl LibraryFolders {
    fn slot(&self, library: Library) -> &OnceLock<Option<usize>> {
        &self.slots[library as usize]
    }
}

/// A merged, queryable view over one or more containers.
#[derive(Debug)]
pub struct Directory {
    root: FolderEntry,
    library_folders: LibraryFolders,
    sources: IndexMap<SourceId, ContainerSource>,
    deleted_files: IndexSet<String>,
    shortcuts: IndexMap<String, String>,
    file_flag_mask: u32,
    container_flags: u32,
    header: Option<ContainerHeader>,
    timings: LoadTimings,
}

impl Default for Directory {
    fn default() -> Self {
        Self::new()
    }
}

impl Directory {
    /// Create an empty directory.
    pub fn new() -> Self {
        Self {
            root: FolderEntry::new(""),
            library_folders: LibraryFolders::default(),
            sources: IndexMap::new(),
            deleted_files: IndexSet::new(),
            shortcuts: IndexMap::new(),
            file_flag_mask: DEFAULT_FILE_FLAG_MASK,
            container_flags: 0,
            header: None,
            timings: LoadTimings::default(),
        }
    }

    /// Parse a container image held in memory.
    pub fn from_memory(bytes: impl Into<Bytes>) -> DirectoryResult<Self> {
        Self::from_source(ContainerSource::memory(bytes))
    }

    /// Parse a container file.
    pub fn from_resource(path: impl AsRef<Path>) -> DirectoryResult<Self> {
        Self::from_source(ContainerSource::resource(path))
    }

    /// Parse a container from a source and resolve its shortcuts.
    pub fn from_source(source: ContainerSource) -> DirectoryResult<Self> {
        let description = source.description();
        let mut directory = parser::parse(source)?;
        directory.resolve_shortcuts()?;

        let timings = &directory.timings;
        debug!(
            source = %description,
            files = directory.root.file_count_recursive(),
            shortcuts = directory.shortcuts.len(),
            header = ?timings.header,
            folders = ?timings.folders,
            files_time = ?timings.files,
            external = ?timings.external_files,
            deleted = ?timings.deleted_files,
            shortcuts_time = ?timings.shortcuts,
            "Loaded container"
        );

        Ok(directory)
    }

    // ==================== Accessors ====================

    pub fn root(&self) -> &FolderEntry {
        &self.root
    }

    /// Paths this directory deletes when merged into another one.
    pub fn deleted_files(&self) -> &IndexSet<String> {
        &self.deleted_files
    }

    /// Alias path to target path.
    pub fn shortcuts(&self) -> &IndexMap<String, String> {
        &self.shortcuts
    }

    /// Flags of the most recently parsed container header.
    pub fn flags(&self) -> u32 {
        self.container_flags
    }

    pub fn file_flag_mask(&self) -> u32 {
        self.file_flag_mask
    }

    /// Mask applied to the flags of files merged into this directory.
    pub fn set_file_flag_mask(&mut self, mask: u32) {
        self.file_flag_mask = mask;
    }

    pub fn source_count(&self) -> usize {
        self.sources.len()
    }

    pub fn source(&self, id: SourceId) -> Option<&ContainerSource> {
        self.sources.get(&id)
    }

    pub fn sources(&self) -> impl Iterator<Item = &ContainerSource> {
        self.sources.values()
    }

    /// Header of the parsed container. `None` for empty or merged-into directories.
    pub fn header(&self) -> Option<&ContainerHeader> {
        self.header.as_ref()
    }

    pub fn timings(&self) -> &LoadTimings {
        &self.timings
    }

    fn file_source(&self, file: &FileEntry) -> DirectoryResult<&ContainerSource> {
        self.sources
            .get(&file.source())
            .ok_or(DirectoryError::UnknownSource(file.source().get()))
    }

    // ==================== Lookup ====================

    /// Substitute a shortcut alias with its target. Other paths are returned as is.
    pub fn actual_path<'a>(&'a self, path: &'a str) -> &'a str {
        self.shortcuts.get(path).map(String::as_str).unwrap_or(path)
    }

    /// Look up the folder holding the last component of `path`.
    ///
    /// `"Objects/"` returns the `Objects` folder and `""` the root.
    pub fn get_folder(&self, path: &str) -> DirectoryResult<&FolderEntry> {
        let (folders, _) = split_path(path);
        self.walk(path, &folders)
    }

    /// Look up a file, following a shortcut if `path` is an alias.
    pub fn get_file(&self, path: &str) -> DirectoryResult<&FileEntry> {
        let path = self.actual_path(path);
        let (folders, name) = split_path(path);
        self.walk(path, &folders)?
            .file(&name)
            .ok_or_else(|| DirectoryError::FileNotFound(path.to_string()))
    }

    fn walk(&self, path: &str, folders: &[String]) -> DirectoryResult<&FolderEntry> {
        let mut folder = &self.root;
        for name in folders {
            folder = folder
                .subfolder(name)
                .ok_or_else(|| DirectoryError::FolderNotFound(path.to_string()))?;
        }
        Ok(folder)
    }

    /// Look up a file in one of the library folders.
    ///
    /// `path` must start with the library prefix and name a file directly
    /// inside the library folder. The library folder itself is located once
    /// and remembered until the next merge.
    pub fn get_file_from_library(&self, library: Library, path: &str) -> DirectoryResult<&FileEntry> {
        let not_in_library = || DirectoryError::NotInLibrary {
            path: path.to_string(),
            library: library.folder_name().to_string(),
        };
        let escaped = path.strip_prefix(library.prefix()).ok_or_else(not_in_library)?;
        let (folders, name) = split_path(escaped);
        if !folders.is_empty() || name.is_empty() {
            return Err(not_in_library());
        }

        let subfolders = self.root.subfolders();
        let index = *self
            .library_folders
            .slot(library)
            .get_or_init(|| subfolders.get_index_of(library.folder_name()));
        let (_, folder) = index
            .and_then(|index| subfolders.get_index(index))
            .ok_or_else(|| DirectoryError::FolderNotFound(library.prefix().to_string()))?;
        folder
            .file(&name)
            .ok_or_else(|| DirectoryError::FileNotFound(path.to_string()))
    }

    // ==================== Reading ====================

    /// Open a file's payload using its source's byte order.
    ///
    /// The returned stream is positioned after the reference block.
    pub fn open_file(&self, file: &FileEntry) -> DirectoryResult<InputStream> {
        self.open_file_with_endianness(file, Endianness::Unspecified)
    }

    /// Open a file's payload with an explicit byte order.
    pub fn open_file_with_endianness(
        &self,
        file: &FileEntry,
        endianness: Endianness,
    ) -> DirectoryResult<InputStream> {
        let mut stream = self.open_at_reference_block(file, endianness)?;
        let block_size = stream.read_u32()?;
        stream.skip(u64::from(block_size))?;
        Ok(stream)
    }

    /// Open a file's payload and decode its reference positions.
    ///
    /// Positions are offsets from the start of the payload, where the stream is left.
    pub fn open_file_with_references(
        &self,
        file: &FileEntry,
        endianness: Endianness,
    ) -> DirectoryResult<(InputStream, Vec<u32>)> {
        let mut stream = self.open_at_reference_block(file, endianness)?;
        let block_size = stream.read_u32()?;
        let positions = if block_size == 0 {
            Vec::new()
        } else {
            decode_positions(&stream.read_bytes(block_size as usize)?)?
        };
        Ok((stream, positions))
    }

    fn open_at_reference_block(
        &self,
        file: &FileEntry,
        endianness: Endianness,
    ) -> DirectoryResult<InputStream> {
        let mut stream = self.file_source(file)?.open_stream(endianness)?;
        stream.skip(u64::from(file.offset()))?;
        Ok(stream)
    }

    /// Read a file's whole payload.
    pub fn read_file(&self, file: &FileEntry) -> DirectoryResult<Vec<u8>> {
        let mut stream = self.open_file(file)?;
        Ok(stream.read_bytes(file.size() as usize)?)
    }

    /// Resolve every reference embedded in a file, in position order.
    pub fn file_references(&self, file: &FileEntry) -> DirectoryResult<Vec<Option<String>>> {
        let (mut stream, positions) = self.open_file_with_references(file, Endianness::Unspecified)?;
        let source = self.file_source(file)?;

        let mut offset: u64 = 0;
        let mut references = Vec::with_capacity(positions.len());
        for position in positions {
            stream.skip(u64::from(position) - offset)?;
            let index = stream.read_u32()?;
            offset = u64::from(position) + u64::from(REFERENCE_SIZE);
            references.push(source.referenced_path(index)?.map(str::to_string));
        }
        Ok(references)
    }

    /// Read one reference index from `stream` and resolve it through `file`'s source.
    pub fn read_reference(
        &self,
        stream: &mut InputStream,
        file: &FileEntry,
    ) -> DirectoryResult<Option<String>> {
        let index = stream.read_u32()?;
        let path = self.file_source(file)?.referenced_path(index)?;
        Ok(path.map(str::to_string))
    }

    /// One-line description of where a file's payload lives.
    pub fn file_debug_description(&self, file: &FileEntry) -> DirectoryResult<String> {
        let source = self.file_source(file)?;
        Ok(format!(
            "{} (Source: {}:{}, size: {})",
            file.name(),
            source.description(),
            file.offset(),
            file.size()
        ))
    }
}
