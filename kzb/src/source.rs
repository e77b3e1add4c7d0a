//! Container sources.
//!
//! A source is the byte origin of one loaded container together with its
//! reference table. Files refer to their source by [`SourceId`]; the
//! [`Directory`](crate::Directory) owning the files owns the sources too and
//! hands them over wholesale on merge.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;

use crate::error::{DirectoryError, DirectoryResult};
use crate::stream::{Endianness, InputStream};

/// Process-unique identity of a container source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SourceId(u64);

impl SourceId {
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        SourceId(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw numeric value.
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Where a source's bytes live.
#[derive(Clone)]
pub enum SourceOrigin {
    /// In-memory container image.
    Memory(Bytes),
    /// Container file on disk.
    Resource(PathBuf),
}

impl fmt::Debug for SourceOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceOrigin::Memory(bytes) => write!(f, "Memory({} bytes)", bytes.len()),
            SourceOrigin::Resource(path) => f.debug_tuple("Resource").field(path).finish(),
        }
    }
}

/// One loaded container: its byte origin, payload byte order and reference table.
#[derive(Debug)]
pub struct ContainerSource {
    id: SourceId,
    origin: SourceOrigin,
    endianness: Endianness,
    references: Vec<Option<String>>,
    next_reference: usize,
}

impl ContainerSource {
    /// Create a source with a fresh identity and an empty reference table.
    pub fn new(origin: SourceOrigin) -> Self {
        Self {
            id: SourceId::next(),
            origin,
            endianness: Endianness::Unspecified,
            references: vec![None],
            next_reference: 1,
        }
    }

    /// Source over an in-memory container image.
    pub fn memory(bytes: impl Into<Bytes>) -> Self {
        Self::new(SourceOrigin::Memory(bytes.into()))
    }

    /// Source over a container file.
    pub fn resource(path: impl AsRef<Path>) -> Self {
        Self::new(SourceOrigin::Resource(path.as_ref().to_path_buf()))
    }

    pub fn id(&self) -> SourceId {
        self.id
    }

    pub fn origin(&self) -> &SourceOrigin {
        &self.origin
    }

    /// Byte order of file payloads in this source.
    pub fn endianness(&self) -> Endianness {
        self.endianness
    }

    pub(crate) fn set_endianness(&mut self, endianness: Endianness) {
        self.endianness = endianness;
    }

    /// The reference table. Slot 0 is always `None`.
    pub fn references(&self) -> &[Option<String>] {
        &self.references
    }

    /// Allocate a reference table for `total_file_count` entries plus the null slot.
    pub(crate) fn reset_references(&mut self, total_file_count: usize) {
        self.references = vec![None; total_file_count + 1];
        self.next_reference = 1;
    }

    /// Store `path` at the next unused index and return that index.
    pub(crate) fn push_reference(&mut self, path: String) -> DirectoryResult<usize> {
        let index = self.next_reference;
        let declared = self.references.len().saturating_sub(1);
        let slot = self.references.get_mut(index).ok_or_else(|| {
            DirectoryError::corrupt(format!(
                "more file paths than the declared total of {declared}"
            ))
        })?;
        *slot = Some(path);
        self.next_reference += 1;
        Ok(index)
    }

    /// Resolve a reference index to a path. Index 0 is the null reference.
    pub fn referenced_path(&self, index: u32) -> DirectoryResult<Option<&str>> {
        self.references
            .get(index as usize)
            .map(|path| path.as_deref())
            .ok_or(DirectoryError::InvalidReference {
                index,
                len: self.references.len(),
            })
    }

    /// Open a stream over the whole source.
    ///
    /// [`Endianness::Unspecified`] selects the source's payload byte order.
    pub fn open_stream(&self, endianness: Endianness) -> DirectoryResult<InputStream> {
        let endianness = match endianness {
            Endianness::Unspecified => self.endianness,
            other => other,
        };
        let stream = match &self.origin {
            SourceOrigin::Memory(bytes) => InputStream::from_memory(bytes.clone(), endianness),
            SourceOrigin::Resource(path) => InputStream::from_resource(path, endianness)?,
        };
        Ok(stream)
    }

    /// Short human readable description of the origin.
    pub fn description(&self) -> String {
        match &self.origin {
            SourceOrigin::Memory(bytes) => format!("buffer[{}]", bytes.len()),
            SourceOrigin::Resource(path) => path.display().to_string(),
        }
    }
}
