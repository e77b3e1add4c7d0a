//! Error types for container directory operations.

use thiserror::Error;

use crate::codec::CodecError;
use crate::config::ConfigError;
use crate::stream::StreamError;

/// Result type for directory operations.
pub type DirectoryResult<T> = Result<T, DirectoryError>;

/// Errors that can occur while loading, merging or querying a directory.
#[derive(Debug, Error)]
pub enum DirectoryError {
    /// The container bytes do not describe a valid container.
    #[error("Corrupt container: {0}")]
    CorruptContainer(String),

    /// A folder on the requested path does not exist.
    #[error("Folder not found: {0}")]
    FolderNotFound(String),

    /// The requested file does not exist in its folder.
    #[error("File not found: {0}")]
    FileNotFound(String),

    /// A library lookup was given a path outside that library.
    #[error("Path {path} is not inside library {library}")]
    NotInLibrary { path: String, library: String },

    /// A patch deletes files that do not exist in the target directory.
    #[error("Patch deletes files that do not exist: {}", .paths.join(", "))]
    ObjectNotFound { paths: Vec<String> },

    /// A file has a different type than the operation requires.
    #[error("File {path} has type {actual}, expected {expected}")]
    WrongFileType {
        path: String,
        expected: String,
        actual: String,
    },

    /// A reference index points outside the source's reference table.
    #[error("Reference index {index} out of range (table has {len} entries)")]
    InvalidReference { index: u32, len: usize },

    /// A file refers to a source that is not owned by this directory.
    #[error("Source {0} is not part of this directory")]
    UnknownSource(u64),

    /// Byte stream failure.
    #[error(transparent)]
    Stream(#[from] StreamError),

    /// Reference position table failure.
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// Configuration failure.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// I/O error outside of a byte stream (e.g. reading a list file).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl DirectoryError {
    /// Create a corrupt container error.
    pub fn corrupt(reason: impl Into<String>) -> Self {
        DirectoryError::CorruptContainer(reason.into())
    }

    /// Whether this is a recoverable lookup failure rather than corruption.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            DirectoryError::FolderNotFound(_) | DirectoryError::FileNotFound(_)
        )
    }
}
