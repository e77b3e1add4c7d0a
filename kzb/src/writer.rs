//! Container writer.
//!
//! Builds container images in memory, mostly for tests and tooling. Reference
//! indices are assigned in the order the reader registers paths: a folder's
//! subfolders (recursively) before its own files, then external paths.
//!
//! ```
//! use kzb::writer::{ContainerBuilder, PayloadBuilder};
//! use kzb::{Directory, FileType};
//!
//! let mut builder = ContainerBuilder::new();
//! builder
//!     .add_file("Materials/Red", FileType::Material, 0, PayloadBuilder::new().u32(0xFF0000))?
//!     .add_file(
//!         "Objects/Box",
//!         FileType::Mesh,
//!         0,
//!         PayloadBuilder::new().reference("Materials/Red"),
//!     )?;
//!
//! let directory = Directory::from_memory(builder.build()?)?;
//! let mesh = directory.get_file("Objects/Box")?;
//! assert_eq!(directory.file_references(mesh)?, vec![Some("Materials/Red".to_string())]);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use std::collections::HashMap;

use indexmap::IndexMap;
use thiserror::Error;

use crate::codec::{encode_positions, CodecError};
use crate::directory::{CONTAINER_FLAG_LITTLE_ENDIAN, FORMAT_VERSION, MAGIC, SHORTCUTS_FOLDER};
use crate::path::{escape_name, PathTokens};
use crate::stream::Endianness;
use crate::tree::FileType;

/// Size of the fixed header fields.
const HEADER_SIZE: usize = 4 + 4 * 3 + 2 * 4 + 4 + 16;

/// Errors that can occur while building a container.
#[derive(Debug, Error)]
pub enum BuildError {
    /// An entry with the same name already exists in its folder.
    #[error("Duplicate entry: {0}")]
    DuplicateEntry(String),

    /// The path does not name a file.
    #[error("Invalid path: '{0}'")]
    InvalidPath(String),

    /// A name or path does not fit the 16-bit length prefix.
    #[error("Name too long ({0} bytes)")]
    NameTooLong(usize),

    /// A payload references a path that is neither a file nor an external path.
    #[error("Unknown reference target: {0}")]
    UnknownReference(String),

    /// The container does not fit 32-bit offsets.
    #[error("Container too large")]
    TooLarge,

    #[error(transparent)]
    Codec(#[from] CodecError),
}

#[derive(Debug, Clone)]
enum Segment {
    Bytes(Vec<u8>),
    U32(u32),
    Reference(String),
}

/// File payload under construction.
///
/// Values are encoded in the container's payload byte order at build time.
#[derive(Debug, Clone, Default)]
pub struct PayloadBuilder {
    segments: Vec<Segment>,
}

impl PayloadBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append raw bytes.
    pub fn bytes(mut self, data: impl AsRef<[u8]>) -> Self {
        self.segments.push(Segment::Bytes(data.as_ref().to_vec()));
        self
    }

    /// Append a 32-bit value.
    pub fn u32(mut self, value: u32) -> Self {
        self.segments.push(Segment::U32(value));
        self
    }

    /// Append a reference to another file (by full path) or to an external path.
    pub fn reference(mut self, path: impl Into<String>) -> Self {
        self.segments.push(Segment::Reference(path.into()));
        self
    }

    /// Render the reference block followed by the payload. Returns the bytes and
    /// the payload size.
    fn render(
        &self,
        endianness: Endianness,
        references: &HashMap<String, u32>,
    ) -> Result<(Vec<u8>, u32), BuildError> {
        let mut data = Vec::new();
        let mut positions = Vec::new();

        for segment in &self.segments {
            match segment {
                Segment::Bytes(bytes) => data.extend_from_slice(bytes),
                Segment::U32(value) => data.extend_from_slice(&endianness.encode_u32(*value)),
                Segment::Reference(path) => {
                    let index = references
                        .get(path)
                        .ok_or_else(|| BuildError::UnknownReference(path.clone()))?;
                    positions.push(to_u32(data.len())?);
                    data.extend_from_slice(&endianness.encode_u32(*index));
                }
            }
        }

        let block = encode_positions(&positions)?;
        let mut out = Vec::with_capacity(4 + block.len() + data.len());
        out.extend_from_slice(&endianness.encode_u32(to_u32(block.len())?));
        out.extend_from_slice(&block);
        let size = to_u32(data.len())?;
        out.extend_from_slice(&data);
        Ok((out, size))
    }
}

#[derive(Debug)]
struct PendingFile {
    file_type: FileType,
    flags: u32,
    payload: PayloadBuilder,
}

#[derive(Debug, Default)]
struct PendingFolder {
    folders: IndexMap<String, PendingFolder>,
    files: IndexMap<String, PendingFile>,
}

impl PendingFolder {
    fn folder_mut(&mut self, names: &[String]) -> &mut PendingFolder {
        names.iter().fold(self, |folder, name| {
            folder.folders.entry(name.clone()).or_default()
        })
    }

    /// Visit files in reader order with their full paths.
    fn visit<'a>(
        &'a self,
        path: Option<&str>,
        visit: &mut dyn FnMut(String, &'a PendingFile),
    ) {
        let prefix = path.unwrap_or("");
        for (name, folder) in &self.folders {
            let folder_path = format!("{prefix}{}/", escape_name(name));
            folder.visit(Some(&folder_path), visit);
        }
        for (name, file) in &self.files {
            let file_path = match path {
                None => name.clone(),
                Some(folder) => format!("{folder}{}", escape_name(name)),
            };
            visit(file_path, file);
        }
    }
}

/// Builder for container images.
#[derive(Debug)]
pub struct ContainerBuilder {
    root: PendingFolder,
    externals: Vec<String>,
    deleted: Vec<String>,
    little_endian: bool,
    format_version: u32,
    tool_version: [u16; 4],
    reserved_bytes: usize,
}

impl Default for ContainerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ContainerBuilder {
    /// Start an empty big-endian container of the current format version.
    pub fn new() -> Self {
        Self {
            root: PendingFolder::default(),
            externals: Vec::new(),
            deleted: Vec::new(),
            little_endian: false,
            format_version: FORMAT_VERSION,
            tool_version: [0; 4],
            reserved_bytes: 0,
        }
    }

    /// Store payloads little-endian.
    pub fn little_endian(&mut self, little_endian: bool) -> &mut Self {
        self.little_endian = little_endian;
        self
    }

    pub fn format_version(&mut self, version: u32) -> &mut Self {
        self.format_version = version;
        self
    }

    pub fn tool_version(&mut self, version: [u16; 4]) -> &mut Self {
        self.tool_version = version;
        self
    }

    /// Append `count` unread zero bytes to the header, every folder block and
    /// the directory block, the way a newer writer adds fields.
    pub fn reserved_bytes(&mut self, count: usize) -> &mut Self {
        self.reserved_bytes = count;
        self
    }

    /// Add a file at an escaped path, creating folders as needed.
    pub fn add_file(
        &mut self,
        path: &str,
        file_type: FileType,
        flags: u32,
        payload: PayloadBuilder,
    ) -> Result<&mut Self, BuildError> {
        let mut names: Vec<String> = PathTokens::new(path).collect();
        let name = match names.pop() {
            Some(name) if !name.is_empty() => name,
            _ => return Err(BuildError::InvalidPath(path.to_string())),
        };
        self.insert(&names, name, path, file_type, flags, payload)?;
        Ok(self)
    }

    /// Add an (empty) folder at an escaped path. A trailing separator is allowed.
    pub fn add_folder(&mut self, path: &str) -> &mut Self {
        let names: Vec<String> = PathTokens::new(path).filter(|n| !n.is_empty()).collect();
        self.root.folder_mut(&names);
        self
    }

    /// Add a shortcut record named `alias` pointing at `target`.
    pub fn add_shortcut(&mut self, alias: &str, target: &str) -> Result<&mut Self, BuildError> {
        let folder = [SHORTCUTS_FOLDER.to_string()];
        let payload = PayloadBuilder::new().reference(target);
        self.insert(&folder, alias.to_string(), alias, FileType::Shortcut, 0, payload)?;
        Ok(self)
    }

    /// Add a path to the reference table that is not a file in this container.
    pub fn add_external(&mut self, path: impl Into<String>) -> &mut Self {
        self.externals.push(path.into());
        self
    }

    /// Record a tombstone for `path`.
    pub fn delete(&mut self, path: impl Into<String>) -> &mut Self {
        self.deleted.push(path.into());
        self
    }

    fn insert(
        &mut self,
        folders: &[String],
        name: String,
        path: &str,
        file_type: FileType,
        flags: u32,
        payload: PayloadBuilder,
    ) -> Result<(), BuildError> {
        let folder = self.root.folder_mut(folders);
        if folder.files.contains_key(&name) {
            return Err(BuildError::DuplicateEntry(path.to_string()));
        }
        folder.files.insert(
            name,
            PendingFile {
                file_type,
                flags,
                payload,
            },
        );
        Ok(())
    }

    /// Serialize the container.
    pub fn build(&self) -> Result<Vec<u8>, BuildError> {
        let endianness = if self.little_endian {
            Endianness::Little
        } else {
            Endianness::Big
        };

        // Reference table in reader order.
        let mut files = Vec::new();
        self.root.visit(None, &mut |path, file| files.push((path, file)));

        let mut references = HashMap::new();
        let mut next_index = 1u32;
        for path in files
            .iter()
            .map(|(path, _)| path)
            .chain(self.externals.iter())
        {
            references.entry(path.clone()).or_insert(next_index);
            next_index += 1;
        }

        let mut payloads = Vec::with_capacity(files.len());
        for (_, file) in &files {
            payloads.push(file.payload.render(endianness, &references)?);
        }

        let header_size = HEADER_SIZE + self.reserved_bytes;
        let total_count = to_u32(files.len() + self.externals.len())?;

        // The directory block length does not depend on the offsets.
        let draft = self.directory_block(total_count, &[])?;
        let mut offset = to_u32(header_size + draft.len())?;
        let mut offsets = Vec::with_capacity(payloads.len());
        for (bytes, _) in &payloads {
            offsets.push(offset);
            offset = offset
                .checked_add(to_u32(bytes.len())?)
                .ok_or(BuildError::TooLarge)?;
        }
        let sizes: Vec<u32> = payloads.iter().map(|(_, size)| *size).collect();
        let placements: Vec<(u32, u32)> = offsets.into_iter().zip(sizes).collect();
        let directory = self.directory_block(total_count, &placements)?;

        let mut out = Vec::with_capacity(offset as usize);
        out.extend_from_slice(&MAGIC);
        out.extend_from_slice(&offset.to_be_bytes());
        out.extend_from_slice(&to_u32(header_size)?.to_be_bytes());
        out.extend_from_slice(&self.format_version.to_be_bytes());
        for part in self.tool_version {
            out.extend_from_slice(&part.to_be_bytes());
        }
        let flags = if self.little_endian {
            CONTAINER_FLAG_LITTLE_ENDIAN
        } else {
            0
        };
        out.extend_from_slice(&flags.to_be_bytes());
        out.extend_from_slice(&[0u8; 16]);
        out.resize(header_size, 0);

        out.extend_from_slice(&directory);
        for (bytes, _) in payloads {
            out.extend_from_slice(&bytes);
        }
        Ok(out)
    }

    /// Serialize the directory block. `placements` holds `(offset, size)` per
    /// file in reader order; missing entries are written as zeros.
    fn directory_block(&self, total_count: u32, placements: &[(u32, u32)]) -> Result<Vec<u8>, BuildError> {
        let mut out = Vec::new();
        let start = begin_block(&mut out);
        out.extend_from_slice(&total_count.to_be_bytes());

        let mut next = 0usize;
        self.folder_block(&mut out, "", &self.root, placements, &mut next)?;

        out.extend_from_slice(&to_u32(self.externals.len())?.to_be_bytes());
        for path in &self.externals {
            put_string(&mut out, path)?;
        }
        out.extend_from_slice(&to_u32(self.deleted.len())?.to_be_bytes());
        for path in &self.deleted {
            put_string(&mut out, path)?;
        }

        self.end_block(&mut out, start)?;
        Ok(out)
    }

    fn folder_block(
        &self,
        out: &mut Vec<u8>,
        name: &str,
        folder: &PendingFolder,
        placements: &[(u32, u32)],
        next: &mut usize,
    ) -> Result<(), BuildError> {
        let start = begin_block(out);
        put_string(out, name)?;

        out.extend_from_slice(&to_u32(folder.folders.len())?.to_be_bytes());
        for (name, subfolder) in &folder.folders {
            self.folder_block(out, name, subfolder, placements, next)?;
        }

        out.extend_from_slice(&to_u32(folder.files.len())?.to_be_bytes());
        for (name, file) in &folder.files {
            let (offset, size) = placements.get(*next).copied().unwrap_or_default();
            *next += 1;
            out.extend_from_slice(&offset.to_be_bytes());
            out.extend_from_slice(&size.to_be_bytes());
            out.extend_from_slice(&file.file_type.tag().to_be_bytes());
            out.extend_from_slice(&file.flags.to_be_bytes());
            put_string(out, name)?;
        }

        self.end_block(out, start)
    }

    fn end_block(&self, out: &mut Vec<u8>, start: usize) -> Result<(), BuildError> {
        out.resize(out.len() + self.reserved_bytes, 0);
        let size = to_u32(out.len() - start)?;
        out[start..start + 4].copy_from_slice(&size.to_be_bytes());
        Ok(())
    }
}

/// Reserve a block size field and return where it starts.
fn begin_block(out: &mut Vec<u8>) -> usize {
    let start = out.len();
    out.extend_from_slice(&[0; 4]);
    start
}

fn put_string(out: &mut Vec<u8>, value: &str) -> Result<(), BuildError> {
    let length = u16::try_from(value.len()).map_err(|_| BuildError::NameTooLong(value.len()))?;
    out.extend_from_slice(&length.to_be_bytes());
    out.extend_from_slice(value.as_bytes());
    let padding = crate::directory::string_padding(value.len());
    out.resize(out.len() + padding, 0);
    Ok(())
}

fn to_u32(value: usize) -> Result<u32, BuildError> {
    u32::try_from(value).map_err(|_| BuildError::TooLarge)
}
