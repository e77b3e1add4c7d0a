//! Sequential byte stream over memory buffers and resource files.
//!
//! The stream is the narrow read-side primitive every other module builds on:
//! it tracks its position, knows how many bytes remain, and decodes fixed-width
//! values in a configurable byte order.
//!
//! # Example
//!
//! ```
//! use kzb::stream::{Endianness, InputStream};
//!
//! let mut stream = InputStream::from_memory(vec![0, 0, 0, 42, 7], Endianness::Big);
//! assert_eq!(stream.read_u32().unwrap(), 42);
//! assert_eq!(stream.position(), 4);
//! assert_eq!(stream.read_u8().unwrap(), 7);
//! ```

mod endian;
mod input;

pub use endian::Endianness;
pub use input::{InputStream, DEFAULT_BUFFER_SIZE};

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while reading a stream.
#[derive(Debug, Error)]
pub enum StreamError {
    /// Fewer bytes remain than the operation needs.
    #[error("End of stream reached")]
    EndOfStream,

    /// A multi-byte value was read without a configured byte order.
    #[error("Input stream endianness was not specified")]
    UnspecifiedEndianness,

    /// The read buffer was replaced while it still held unread bytes.
    #[error("Read buffer still holds {0} unread bytes")]
    BufferNotEmpty(usize),

    /// The resource backing the stream could not be opened.
    #[error("Failed to open resource {}: {source}", .path.display())]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },

    /// I/O error while reading or seeking.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
