//! Container parsing.
//!
//! The header and the directory block are always big-endian. Every block that
//! declares its own size is read field by field and then skipped to its
//! declared end, so containers written by newer tools with extra trailing
//! fields still load. Only when the format version matches exactly must the
//! declared sizes match what was read.

use std::cmp::Ordering;
use std::time::Instant;

use indexmap::{IndexMap, IndexSet};
use tracing::warn;

use super::{Directory, LoadTimings};
use crate::error::{DirectoryError, DirectoryResult};
use crate::path::escape_name;
use crate::source::ContainerSource;
use crate::stream::{Endianness, InputStream};
use crate::tree::{FileEntry, FileType, FolderEntry, DEFAULT_FILE_FLAG_MASK};

/// Magic bytes at the start of every container.
pub const MAGIC: [u8; 4] = *b".KZB";

/// Container format version this library reads in exact mode.
pub const FORMAT_VERSION: u32 = 35;

/// Header flag: file payloads are little-endian.
pub const CONTAINER_FLAG_LITTLE_ENDIAN: u32 = 1;

const LICENSE_ID_SIZE: usize = 16;

/// Smallest number of directory bytes a single reference index can come from.
const MIN_REFERENCE_RECORD_SIZE: u64 = 4;

/// Deepest folder nesting accepted below the root folder.
pub const MAX_FOLDER_DEPTH: usize = 256;

/// Fields of a container header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerHeader {
    pub file_size: u32,
    pub header_size: u32,
    pub format_version: u32,
    /// Informational version of the tool that wrote the container.
    pub tool_version: [u16; 4],
    pub flags: u32,
    /// Opaque license identifier.
    pub license_id: [u8; LICENSE_ID_SIZE],
}

impl ContainerHeader {
    /// Whether the format version equals [`FORMAT_VERSION`].
    pub fn version_matches(&self) -> bool {
        self.format_version == FORMAT_VERSION
    }

    pub fn is_little_endian(&self) -> bool {
        self.flags & CONTAINER_FLAG_LITTLE_ENDIAN != 0
    }

    /// Byte order of file payloads, normalized against the host.
    pub fn payload_endianness(&self) -> Endianness {
        if self.is_little_endian() {
            Endianness::Little.normalize()
        } else {
            Endianness::Big.normalize()
        }
    }
}

/// Parse a container into a standalone directory. Shortcuts are not resolved.
pub(super) fn parse(source: ContainerSource) -> DirectoryResult<Directory> {
    let mut stream = source.open_stream(Endianness::Big)?;
    let mut parser = Parser {
        source,
        exact_version: false,
        timings: LoadTimings::default(),
    };

    let header = parser.read_header(&mut stream)?;
    parser.source.set_endianness(header.payload_endianness());
    let (root, deleted_files) = parser.read_directory(&mut stream)?;

    let Parser {
        source, timings, ..
    } = parser;
    let mut sources = IndexMap::new();
    sources.insert(source.id(), source);

    Ok(Directory {
        root,
        library_folders: Default::default(),
        sources,
        deleted_files,
        shortcuts: IndexMap::new(),
        file_flag_mask: DEFAULT_FILE_FLAG_MASK,
        container_flags: header.flags,
        header: Some(header),
        timings,
    })
}

struct Parser {
    source: ContainerSource,
    exact_version: bool,
    timings: LoadTimings,
}

impl Parser {
    fn read_header(&mut self, stream: &mut InputStream) -> DirectoryResult<ContainerHeader> {
        let started = Instant::now();

        let mut magic = [0u8; 4];
        stream
            .read_exact(&mut magic)
            .map_err(|_| DirectoryError::corrupt("missing container magic"))?;
        if magic != MAGIC {
            return Err(DirectoryError::corrupt(format!(
                "bad magic {:02x?}, expected {:02x?}",
                magic, MAGIC
            )));
        }

        let file_size = stream.read_u32()?;
        let header_size = stream.read_u32()?;
        let format_version = stream.read_u32()?;

        match format_version.cmp(&FORMAT_VERSION) {
            Ordering::Less => warn!(
                version = format_version,
                supported = FORMAT_VERSION,
                "Loading older container format"
            ),
            Ordering::Greater => warn!(
                version = format_version,
                supported = FORMAT_VERSION,
                "Loading newer container format"
            ),
            Ordering::Equal => self.exact_version = true,
        }

        let mut tool_version = [0u16; 4];
        for part in &mut tool_version {
            *part = stream.read_u16()?;
        }
        let flags = stream.read_u32()?;
        let mut license_id = [0u8; LICENSE_ID_SIZE];
        stream.read_exact(&mut license_id)?;

        let consumed = stream.position();
        let declared = u64::from(header_size);
        if consumed > declared {
            return Err(DirectoryError::corrupt(format!(
                "header size {declared} is smaller than the {consumed} bytes read"
            )));
        }
        stream.skip(declared - consumed)?;

        self.timings.header = started.elapsed();

        Ok(ContainerHeader {
            file_size,
            header_size,
            format_version,
            tool_version,
            flags,
            license_id,
        })
    }

    fn read_directory(
        &mut self,
        stream: &mut InputStream,
    ) -> DirectoryResult<(FolderEntry, IndexSet<String>)> {
        let start = stream.position();
        let directory_size = stream.read_u32()?;
        let total_file_count = stream.read_u32()?;

        if u64::from(total_file_count) > stream.remaining() / MIN_REFERENCE_RECORD_SIZE {
            return Err(DirectoryError::corrupt(format!(
                "total file count {total_file_count} exceeds the container size"
            )));
        }
        self.source.reset_references(total_file_count as usize);

        let root = self.read_folder(stream, None, 0)?;

        let started = Instant::now();
        let external_count = stream.read_u32()?;
        for _ in 0..external_count {
            let path = read_string(stream)?;
            self.source.push_reference(path)?;
        }
        self.timings.external_files = started.elapsed();

        let started = Instant::now();
        let deleted_count = stream.read_u32()?;
        let mut deleted_files = IndexSet::new();
        for _ in 0..deleted_count {
            deleted_files.insert(read_string(stream)?);
        }
        self.timings.deleted_files = started.elapsed();

        self.finish_block(stream, start, directory_size, "directory")?;

        Ok((root, deleted_files))
    }

    /// Read a folder block. `parent_path` is `None` for the root folder, which
    /// sits at `depth` 0.
    fn read_folder(
        &mut self,
        stream: &mut InputStream,
        parent_path: Option<&str>,
        depth: usize,
    ) -> DirectoryResult<FolderEntry> {
        if depth > MAX_FOLDER_DEPTH {
            return Err(DirectoryError::corrupt(format!(
                "folders nested deeper than {MAX_FOLDER_DEPTH} levels"
            )));
        }

        let started = Instant::now();
        let start = stream.position();

        let folder_size = stream.read_u32()?;
        let name = read_string(stream)?;
        let path = match parent_path {
            None => String::new(),
            Some(parent) => format!("{parent}{}/", escape_name(&name)),
        };
        let mut folder = FolderEntry::new(name);

        let subfolder_count = stream.read_u32()?;
        self.timings.folders += started.elapsed();

        for _ in 0..subfolder_count {
            let subfolder = self.read_folder(stream, Some(&path), depth + 1)?;
            folder.insert_subfolder(subfolder).map_err(|duplicate| {
                DirectoryError::corrupt(format!(
                    "duplicate folder '{}' in '{path}'",
                    duplicate.name()
                ))
            })?;
        }

        let started = Instant::now();
        let file_count = stream.read_u32()?;
        for _ in 0..file_count {
            let file = self.read_file(stream, parent_path.map(|_| path.as_str()))?;
            folder.insert_file(file).map_err(|duplicate| {
                DirectoryError::corrupt(format!("duplicate file '{}'", duplicate.path()))
            })?;
        }
        self.timings.files += started.elapsed();

        self.finish_block(stream, start, folder_size, "folder")?;
        Ok(folder)
    }

    /// Read a file record and register its path in the reference table.
    ///
    /// Files directly in the root (`folder_path` is `None`) use their bare name
    /// as their path.
    fn read_file(
        &mut self,
        stream: &mut InputStream,
        folder_path: Option<&str>,
    ) -> DirectoryResult<FileEntry> {
        let offset = stream.read_u32()?;
        let size = stream.read_u32()?;
        let file_type = FileType::from_tag(stream.read_i32()?);
        let flags = stream.read_u32()?;
        let name = read_string(stream)?;

        let path = match folder_path {
            None => name.clone(),
            Some(folder) => format!("{folder}{}", escape_name(&name)),
        };
        self.source.push_reference(path.clone())?;

        Ok(FileEntry::new(
            name,
            path,
            self.source.id(),
            offset,
            size,
            file_type,
            flags,
        ))
    }

    /// Check the bytes read since `start` against a block's declared size and
    /// skip whatever was not read.
    fn finish_block(
        &self,
        stream: &mut InputStream,
        start: u64,
        declared: u32,
        block: &str,
    ) -> DirectoryResult<()> {
        let consumed = stream.position() - start;
        let declared = u64::from(declared);

        if self.exact_version && consumed != declared {
            return Err(DirectoryError::corrupt(format!(
                "{block} size {declared} differs from the {consumed} bytes read"
            )));
        }
        if consumed > declared {
            return Err(DirectoryError::corrupt(format!(
                "{block} size {declared} is smaller than the {consumed} bytes read"
            )));
        }

        stream.skip(declared - consumed)?;
        Ok(())
    }
}

/// Read a length-prefixed string padded to a 4-byte boundary.
pub(crate) fn read_string(stream: &mut InputStream) -> DirectoryResult<String> {
    let length = usize::from(stream.read_u16()?);
    let bytes = stream.read_bytes(length)?;
    stream.skip(string_padding(length) as u64)?;
    String::from_utf8(bytes).map_err(|e| DirectoryError::corrupt(format!("invalid UTF-8 in name: {e}")))
}

/// Padding after a string of `length` bytes so that `2 + length + padding`
/// is a multiple of 4.
pub(crate) fn string_padding(length: usize) -> usize {
    (4 - (2 + length) % 4) % 4
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::writer::{ContainerBuilder, PayloadBuilder};

    fn header_size(bytes: &[u8]) -> usize {
        u32::from_be_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]) as usize
    }

    fn simple_builder() -> ContainerBuilder {
        let mut builder = ContainerBuilder::new();
        builder
            .add_file("Objects/Box", FileType::Mesh, 0, PayloadBuilder::new().bytes(b"box"))
            .unwrap();
        builder
    }

    #[test]
    fn test_string_padding() {
        assert_eq!(string_padding(0), 2);
        assert_eq!(string_padding(1), 1);
        assert_eq!(string_padding(2), 0);
        assert_eq!(string_padding(3), 3);
        assert_eq!(string_padding(6), 0);
    }

    #[test]
    fn test_read_string() {
        let mut bytes = vec![0, 3];
        bytes.extend_from_slice(b"abc");
        bytes.extend_from_slice(&[0, 0, 0, 0xAA]);
        let mut stream = InputStream::from_memory(bytes, Endianness::Big);
        assert_eq!(read_string(&mut stream).unwrap(), "abc");
        assert_eq!(stream.position(), 8);
        assert_eq!(stream.read_u8().unwrap(), 0xAA);
    }

    #[test]
    fn test_read_string_invalid_utf8() {
        let mut stream = InputStream::from_memory(vec![0, 2, 0xFF, 0xFE], Endianness::Big);
        assert!(matches!(
            read_string(&mut stream),
            Err(DirectoryError::CorruptContainer(_))
        ));
    }

    #[test]
    fn test_bad_magic() {
        let mut bytes = simple_builder().build().unwrap();
        bytes[0] = b'X';
        let err = parse(ContainerSource::memory(bytes)).unwrap_err();
        assert!(matches!(err, DirectoryError::CorruptContainer(_)));
    }

    #[test]
    fn test_truncated_magic() {
        let err = parse(ContainerSource::memory(b".K".to_vec())).unwrap_err();
        assert!(matches!(err, DirectoryError::CorruptContainer(_)));
    }

    #[test]
    fn test_header_fields() {
        let bytes = simple_builder().build().unwrap();
        let directory = parse(ContainerSource::memory(bytes.clone())).unwrap();
        let header = directory.header().unwrap();
        assert_eq!(header.file_size as usize, bytes.len());
        assert_eq!(header.format_version, FORMAT_VERSION);
        assert!(header.version_matches());
        assert!(!header.is_little_endian());
        assert_eq!(directory.flags(), header.flags);
    }

    #[test]
    fn test_payload_endianness_from_flags() {
        let mut builder = simple_builder();
        builder.little_endian(true);
        let directory = parse(ContainerSource::memory(builder.build().unwrap())).unwrap();
        let source = directory.sources().next().unwrap();
        assert_eq!(source.endianness(), Endianness::Little.normalize());
        assert!(directory.header().unwrap().is_little_endian());
    }

    #[test]
    fn test_reserved_bytes_need_version_skew() {
        let mut builder = simple_builder();
        builder.reserved_bytes(8);
        let exact = parse(ContainerSource::memory(builder.build().unwrap()));
        assert!(matches!(exact, Err(DirectoryError::CorruptContainer(_))));

        builder.format_version(FORMAT_VERSION + 1);
        let newer = parse(ContainerSource::memory(builder.build().unwrap())).unwrap();
        assert!(newer.get_file("Objects/Box").is_ok());
    }

    #[test]
    fn test_folder_smaller_than_read_is_corrupt_in_any_version() {
        let mut builder = simple_builder();
        builder.format_version(FORMAT_VERSION - 1);
        let mut bytes = builder.build().unwrap();
        // Root folder size sits right after directory_size and total_file_count.
        let root_size = header_size(&bytes) + 8;
        bytes[root_size..root_size + 4].copy_from_slice(&4u32.to_be_bytes());

        let err = parse(ContainerSource::memory(bytes)).unwrap_err();
        assert!(matches!(err, DirectoryError::CorruptContainer(_)));
    }

    #[test]
    fn test_header_smaller_than_read_is_corrupt() {
        let mut bytes = simple_builder().build().unwrap();
        bytes[8..12].copy_from_slice(&8u32.to_be_bytes());
        let err = parse(ContainerSource::memory(bytes)).unwrap_err();
        assert!(matches!(err, DirectoryError::CorruptContainer(_)));
    }

    #[test]
    fn test_too_many_paths_for_total_count() {
        let mut bytes = simple_builder().build().unwrap();
        let total = header_size(&bytes) + 4;
        // Claim zero files while Objects/Box still registers a path.
        bytes[total..total + 4].copy_from_slice(&0u32.to_be_bytes());
        let err = parse(ContainerSource::memory(bytes)).unwrap_err();
        assert!(matches!(err, DirectoryError::CorruptContainer(_)));
    }

    #[test]
    fn test_absurd_total_file_count() {
        let mut bytes = simple_builder().build().unwrap();
        let total = header_size(&bytes) + 4;
        bytes[total..total + 4].copy_from_slice(&u32::MAX.to_be_bytes());
        let err = parse(ContainerSource::memory(bytes)).unwrap_err();
        assert!(matches!(err, DirectoryError::CorruptContainer(_)));
    }

    /// Header from an empty container followed by a chain of `levels` folders,
    /// each holding exactly one subfolder. The chain is never closed.
    fn nested_chain(levels: usize) -> Vec<u8> {
        let empty = ContainerBuilder::new().build().unwrap();
        let mut bytes = empty[..header_size(&empty)].to_vec();
        bytes.extend_from_slice(&u32::MAX.to_be_bytes());
        bytes.extend_from_slice(&0u32.to_be_bytes());
        for _ in 0..levels {
            bytes.extend_from_slice(&u32::MAX.to_be_bytes());
            bytes.extend_from_slice(&[0, 0, 0, 0]);
            bytes.extend_from_slice(&1u32.to_be_bytes());
        }
        bytes
    }

    #[test]
    fn test_folder_nesting_limit() {
        let err = parse(ContainerSource::memory(nested_chain(MAX_FOLDER_DEPTH + 2))).unwrap_err();
        match err {
            DirectoryError::CorruptContainer(reason) => assert!(reason.contains("nested deeper")),
            other => panic!("unexpected error: {other:?}"),
        }

        // Within the limit the chain simply runs out of bytes.
        let err = parse(ContainerSource::memory(nested_chain(MAX_FOLDER_DEPTH))).unwrap_err();
        assert!(!err.to_string().contains("nested deeper"));
    }

    #[test]
    fn test_timings_recorded() {
        let directory = parse(ContainerSource::memory(simple_builder().build().unwrap())).unwrap();
        let timings = directory.timings();
        assert!(timings.total() >= timings.header);
    }
}
