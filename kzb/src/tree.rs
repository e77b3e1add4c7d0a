//! In-memory folder and file hierarchy.
//!
//! Each folder owns its children outright, in insertion order. Names are unique
//! among siblings. Files do not own their bytes; they record where their payload
//! lives inside a [`ContainerSource`](crate::source::ContainerSource).

use std::fmt;

use indexmap::map::Entry;
use indexmap::IndexMap;

use crate::source::SourceId;

/// File is loaded only when first requested.
pub const FILE_FLAG_LOAD_ON_DEMAND: u32 = 1 << 1;
/// File is a cached resource.
pub const FILE_FLAG_CACHED_RESOURCE: u32 = 1 << 2;
/// Mask applied to file flags on merge unless configured otherwise.
pub const DEFAULT_FILE_FLAG_MASK: u32 = 0xFF;

macro_rules! file_types {
    ($($(#[$doc:meta])* $variant:ident = $tag:literal => $name:literal,)*) => {
        /// Type tag of a file in a container.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum FileType {
            $($(#[$doc])* $variant,)*
            /// A tag this library does not know. Kept as is.
            Unknown(i32),
        }

        impl FileType {
            /// Map a raw tag to a file type.
            pub fn from_tag(tag: i32) -> Self {
                match tag {
                    $($tag => FileType::$variant,)*
                    other => FileType::Unknown(other),
                }
            }

            /// Raw tag as stored in the container.
            pub fn tag(self) -> i32 {
                match self {
                    $(FileType::$variant => $tag,)*
                    FileType::Unknown(tag) => tag,
                }
            }

            /// Short lowercase name.
            pub fn name(self) -> &'static str {
                match self {
                    $(FileType::$variant => $name,)*
                    FileType::Unknown(_) => "unknown",
                }
            }
        }
    };
}

file_types! {
    Binary = 0 => "binary",
    Utf8Text = 1 => "utf8-text",
    AsciiText = 2 => "ascii-text",
    /// Alias to another file.
    Shortcut = 5 => "shortcut",
    ImagePng = 10 => "image-png",
    ImageJpeg = 11 => "image-jpeg",
    ImageRaw1d = 12 => "image-raw-1d",
    ImageRaw2d = 13 => "image-raw-2d",
    ImageRaw3d = 14 => "image-raw-3d",
    ImageEtc = 15 => "image-etc",
    ImageMipmap = 16 => "image-mipmap",
    ImageDxt = 17 => "image-dxt",
    Scene = 100 => "scene",
    EmptyNode = 110 => "empty-node",
    MeshNode = 120 => "mesh-node",
    CameraNode = 130 => "camera-node",
    LightNode = 140 => "light-node",
    LodSelectorNode = 150 => "lod-selector-node",
    UiComponentNode = 160 => "ui-component-node",
    InstantiatorNode = 170 => "instantiator-node",
    Mesh = 500 => "mesh",
    MeshPlane = 510 => "mesh-plane",
    MeshSphere = 511 => "mesh-sphere",
    MeshBox = 512 => "mesh-box",
    UiComponentType = 600 => "ui-component-type",
    PropertyType = 1000 => "property-type",
    PropertyGroup = 1010 => "property-group",
    Composer = 1100 => "composer",
    MaterialType = 1120 => "material-type",
    Material = 1121 => "material",
    ObjectSource = 1200 => "object-source",
    AnimationData = 1300 => "animation-data",
    AnimationClip = 1301 => "animation-clip",
    TimelineSequence = 1302 => "timeline-sequence",
    Transition = 1400 => "transition",
    Project = 2000 => "project",
    ShaderSource = 2010 => "shader-source",
    ShaderBinary = 2011 => "shader-binary",
    Texture = 2020 => "texture",
    BitmapFont = 2030 => "bitmap-font",
    TruetypeFont = 2031 => "truetype-font",
    Script = 2040 => "script",
    Spline = 2050 => "spline",
    Trajectory = 2060 => "trajectory",
}

impl From<i32> for FileType {
    fn from(tag: i32) -> Self {
        FileType::from_tag(tag)
    }
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileType::Unknown(tag) => write!(f, "unknown({tag})"),
            known => f.write_str(known.name()),
        }
    }
}

/// A file descriptor: where a file's payload lives and what it is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    name: String,
    path: String,
    source: SourceId,
    offset: u32,
    size: u32,
    file_type: FileType,
    flags: u32,
}

impl FileEntry {
    pub(crate) fn new(
        name: String,
        path: String,
        source: SourceId,
        offset: u32,
        size: u32,
        file_type: FileType,
        flags: u32,
    ) -> Self {
        Self {
            name,
            path,
            source,
            offset,
            size,
            file_type,
            flags,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Escaped full path from the root.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Source holding the payload.
    pub fn source(&self) -> SourceId {
        self.source
    }

    /// Byte offset of the payload (reference block first) inside the source.
    pub fn offset(&self) -> u32 {
        self.offset
    }

    /// Payload size, excluding the reference block.
    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn file_type(&self) -> FileType {
        self.file_type
    }

    pub fn flags(&self) -> u32 {
        self.flags
    }

    pub fn is_load_on_demand(&self) -> bool {
        self.flags & FILE_FLAG_LOAD_ON_DEMAND != 0
    }

    pub fn is_cached_resource(&self) -> bool {
        self.flags & FILE_FLAG_CACHED_RESOURCE != 0
    }

    /// Take over another entry's contents, keeping this entry's name and path.
    pub(crate) fn overwrite_from(&mut self, other: FileEntry, flag_mask: u32) {
        self.source = other.source;
        self.offset = other.offset;
        self.size = other.size;
        self.file_type = other.file_type;
        self.flags = other.flags & flag_mask;
    }

    pub(crate) fn mask_flags(&mut self, flag_mask: u32) {
        self.flags &= flag_mask;
    }
}

/// A folder with its subfolders and files.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FolderEntry {
    name: String,
    subfolders: IndexMap<String, FolderEntry>,
    files: IndexMap<String, FileEntry>,
}

impl FolderEntry {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            subfolders: IndexMap::new(),
            files: IndexMap::new(),
        }
    }

    /// Folder name. Empty for the root.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn subfolders(&self) -> &IndexMap<String, FolderEntry> {
        &self.subfolders
    }

    pub fn files(&self) -> &IndexMap<String, FileEntry> {
        &self.files
    }

    pub fn subfolder(&self, name: &str) -> Option<&FolderEntry> {
        self.subfolders.get(name)
    }

    pub fn file(&self, name: &str) -> Option<&FileEntry> {
        self.files.get(name)
    }

    pub fn is_empty(&self) -> bool {
        self.subfolders.is_empty() && self.files.is_empty()
    }

    /// All files below this folder. A folder's subfolders come before its own files.
    pub fn all_files(&self) -> Vec<&FileEntry> {
        let mut out = Vec::new();
        self.collect_files(&mut out);
        out
    }

    fn collect_files<'a>(&'a self, out: &mut Vec<&'a FileEntry>) {
        for folder in self.subfolders.values() {
            folder.collect_files(out);
        }
        out.extend(self.files.values());
    }

    /// Number of files below this folder.
    pub fn file_count_recursive(&self) -> usize {
        self.files.len()
            + self
                .subfolders
                .values()
                .map(FolderEntry::file_count_recursive)
                .sum::<usize>()
    }

    /// Number of folders below this folder, not counting itself.
    pub fn folder_count_recursive(&self) -> usize {
        self.subfolders.len()
            + self
                .subfolders
                .values()
                .map(FolderEntry::folder_count_recursive)
                .sum::<usize>()
    }

    /// Get the named subfolder, creating an empty one if missing.
    pub(crate) fn subfolder_or_create(&mut self, name: &str) -> &mut FolderEntry {
        self.subfolders
            .entry(name.to_string())
            .or_insert_with(|| FolderEntry::new(name))
    }

    /// Insert a subfolder. Returns the folder back if the name is taken.
    pub(crate) fn insert_subfolder(&mut self, folder: FolderEntry) -> Result<(), FolderEntry> {
        if self.subfolders.contains_key(&folder.name) {
            return Err(folder);
        }
        self.subfolders.insert(folder.name.clone(), folder);
        Ok(())
    }

    /// Insert a file. Returns the file back if the name is taken.
    pub(crate) fn insert_file(&mut self, file: FileEntry) -> Result<(), FileEntry> {
        if self.files.contains_key(&file.name) {
            return Err(file);
        }
        self.files.insert(file.name.clone(), file);
        Ok(())
    }

    /// Overwrite the equally named file in place or insert `file` as a new entry.
    /// Either way the resulting flags are masked with `flag_mask`.
    pub(crate) fn merge_file(&mut self, mut file: FileEntry, flag_mask: u32) -> &FileEntry {
        match self.files.entry(file.name.clone()) {
            Entry::Occupied(entry) => {
                let existing = entry.into_mut();
                existing.overwrite_from(file, flag_mask);
                existing
            }
            Entry::Vacant(entry) => {
                file.mask_flags(flag_mask);
                entry.insert(file)
            }
        }
    }

    /// Remove files below this folder for which `delete` returns true.
    pub(crate) fn remove_files_where(&mut self, delete: &mut impl FnMut(&FileEntry) -> bool) -> usize {
        let mut removed = 0;
        for folder in self.subfolders.values_mut() {
            removed += folder.remove_files_where(delete);
        }
        let before = self.files.len();
        self.files.retain(|_, file| !delete(file));
        removed + before - self.files.len()
    }

    /// Move all children out, leaving this folder empty.
    pub(crate) fn take_children(
        &mut self,
    ) -> (IndexMap<String, FolderEntry>, IndexMap<String, FileEntry>) {
        (
            std::mem::take(&mut self.subfolders),
            std::mem::take(&mut self.files),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::ContainerSource;

    fn file(name: &str, path: &str, source: SourceId) -> FileEntry {
        FileEntry::new(
            name.into(),
            path.into(),
            source,
            0,
            0,
            FileType::Binary,
            FILE_FLAG_LOAD_ON_DEMAND,
        )
    }

    #[test]
    fn test_file_type_tags() {
        assert_eq!(FileType::from_tag(5), FileType::Shortcut);
        assert_eq!(FileType::from_tag(1121), FileType::Material);
        assert_eq!(FileType::from_tag(42), FileType::Unknown(42));
        assert_eq!(FileType::Unknown(42).tag(), 42);
        assert_eq!(FileType::Trajectory.tag(), 2060);
        assert_eq!(FileType::Unknown(-1).to_string(), "unknown(-1)");
        assert_eq!(FileType::MeshBox.to_string(), "mesh-box");
    }

    #[test]
    fn test_all_files_order() {
        let id = ContainerSource::memory(vec![]).id();
        let mut root = FolderEntry::new("");
        root.insert_file(file("top", "top", id)).unwrap();

        let mut sub = FolderEntry::new("Sub");
        sub.insert_file(file("inner", "Sub/inner", id)).unwrap();
        root.insert_subfolder(sub).unwrap();

        let paths: Vec<&str> = root.all_files().iter().map(|f| f.path()).collect();
        assert_eq!(paths, vec!["Sub/inner", "top"]);
        assert_eq!(root.file_count_recursive(), 2);
        assert_eq!(root.folder_count_recursive(), 1);
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let id = ContainerSource::memory(vec![]).id();
        let mut root = FolderEntry::new("");
        root.insert_file(file("a", "a", id)).unwrap();
        assert!(root.insert_file(file("a", "a", id)).is_err());
        root.insert_subfolder(FolderEntry::new("x")).unwrap();
        assert!(root.insert_subfolder(FolderEntry::new("x")).is_err());
    }

    #[test]
    fn test_overwrite_keeps_identity() {
        let first = ContainerSource::memory(vec![]).id();
        let second = ContainerSource::memory(vec![]).id();
        let mut entry = file("a", "Dir/a", first);
        let mut other = FileEntry::new(
            "other".into(),
            "Elsewhere/other".into(),
            second,
            16,
            32,
            FileType::Texture,
            0x1FF,
        );
        other.mask_flags(0xFFFF);
        entry.overwrite_from(other, 0x0F);

        assert_eq!(entry.name(), "a");
        assert_eq!(entry.path(), "Dir/a");
        assert_eq!(entry.source(), second);
        assert_eq!((entry.offset(), entry.size()), (16, 32));
        assert_eq!(entry.file_type(), FileType::Texture);
        assert_eq!(entry.flags(), 0x0F);
    }

    #[test]
    fn test_flag_helpers() {
        let id = ContainerSource::memory(vec![]).id();
        let entry = file("a", "a", id);
        assert!(entry.is_load_on_demand());
        assert!(!entry.is_cached_resource());
    }
}
