//! KZB - Reader and merger for `.KZB` binary container directories
//!
//! A `.KZB` container packs a tree of folders and typed files into a single
//! binary blob. This library parses the container's directory block into an
//! in-memory [`Directory`], merges several containers into one ("patching"),
//! resolves shortcut aliases and opens file payloads as seekable
//! [`InputStream`]s with their reference tables decoded.
//!
//! # Example
//!
//! ```no_run
//! use kzb::Directory;
//!
//! let mut directory = Directory::from_resource("base.kzb")?;
//! directory.merge(Directory::from_resource("patch.kzb")?)?;
//!
//! let file = directory.get_file("Meshes/Box")?;
//! let bytes = directory.read_file(file)?;
//! println!("{} is {} bytes", file.path(), bytes.len());
//! # Ok::<(), kzb::DirectoryError>(())
//! ```

pub mod codec;
pub mod config;
pub mod directory;
pub mod error;
pub mod loader;
pub mod logging;
pub mod path;
pub mod source;
pub mod stream;
pub mod tree;
pub mod writer;

pub use directory::{ContainerHeader, Directory, Library, LoadTimings};
pub use error::{DirectoryError, DirectoryResult};
pub use loader::DirectoryLoader;
pub use source::{ContainerSource, SourceId};
pub use stream::{Endianness, InputStream};
pub use tree::{FileEntry, FileType, FolderEntry};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
