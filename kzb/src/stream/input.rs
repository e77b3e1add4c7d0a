//! Input stream implementation.

use std::fmt;
use std::fs::File;
use std::io::{ErrorKind, Read, Seek, SeekFrom};
use std::path::Path;

use bytes::Bytes;

use super::{Endianness, StreamError};

/// Default read buffer size for resource streams.
pub const DEFAULT_BUFFER_SIZE: usize = 512 * 8;

/// Where the stream reads its bytes from.
enum Target {
    /// Shared memory buffer. Cloning a [`Bytes`] never copies the data.
    Memory { data: Bytes, cursor: usize },
    /// File on disk.
    Resource { file: File },
}

/// Internal read-ahead buffer. `start..end` is the unread window.
struct ReadBuffer {
    data: Box<[u8]>,
    start: usize,
    end: usize,
}

impl ReadBuffer {
    fn new(size: usize) -> Self {
        Self {
            data: vec![0; size].into_boxed_slice(),
            start: 0,
            end: 0,
        }
    }

    fn available(&self) -> usize {
        self.end - self.start
    }
}

/// Sequential, position-tracked reader.
///
/// Reads never go past the end of data. Fixed-width values are decoded with the
/// configured [`Endianness`]; reading multi-byte values while the endianness is
/// [`Endianness::Unspecified`] fails with [`StreamError::UnspecifiedEndianness`].
pub struct InputStream {
    target: Target,
    endianness: Endianness,
    position: u64,
    length: u64,
    buffer: Option<ReadBuffer>,
}

impl InputStream {
    /// Create a stream over a memory buffer.
    pub fn from_memory(data: impl Into<Bytes>, endianness: Endianness) -> Self {
        let data = data.into();
        let length = data.len() as u64;
        Self {
            target: Target::Memory { data, cursor: 0 },
            endianness,
            position: 0,
            length,
            buffer: None,
        }
    }

    /// Open a stream over a resource file.
    ///
    /// Resource streams are buffered with [`DEFAULT_BUFFER_SIZE`].
    pub fn from_resource(path: impl AsRef<Path>, endianness: Endianness) -> Result<Self, StreamError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| StreamError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        let length = file.metadata()?.len();

        Ok(Self {
            target: Target::Resource { file },
            endianness,
            position: 0,
            length,
            buffer: Some(ReadBuffer::new(DEFAULT_BUFFER_SIZE)),
        })
    }

    /// Replace the internal read buffer. A size of 0 disables buffering.
    ///
    /// Fails with [`StreamError::BufferNotEmpty`] while the current buffer
    /// holds bytes that have not been read yet.
    pub fn init_buffer(&mut self, size: usize) -> Result<(), StreamError> {
        let unread = self.buffer.as_ref().map_or(0, ReadBuffer::available);
        if unread > 0 {
            return Err(StreamError::BufferNotEmpty(unread));
        }
        self.buffer = (size > 0).then(|| ReadBuffer::new(size));
        Ok(())
    }

    /// Whether reads go through an internal buffer.
    pub fn is_buffered(&self) -> bool {
        self.buffer.is_some()
    }

    /// Current position, in bytes from the start of the stream.
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Total length of the underlying data.
    pub fn len(&self) -> u64 {
        self.length
    }

    /// Whether the underlying data is empty.
    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// Number of bytes left to read.
    pub fn remaining(&self) -> u64 {
        self.length - self.position
    }

    /// Byte order used for multi-byte reads.
    pub fn endianness(&self) -> Endianness {
        self.endianness
    }

    /// Change the byte order used for subsequent multi-byte reads.
    pub fn set_endianness(&mut self, endianness: Endianness) {
        self.endianness = endianness;
    }

    fn read_target(target: &mut Target, out: &mut [u8]) -> Result<usize, StreamError> {
        match target {
            Target::Memory { data, cursor } => {
                let count = out.len().min(data.len() - *cursor);
                out[..count].copy_from_slice(&data[*cursor..*cursor + count]);
                *cursor += count;
                Ok(count)
            }
            Target::Resource { file } => {
                let mut filled = 0;
                while filled < out.len() {
                    match file.read(&mut out[filled..]) {
                        Ok(0) => break,
                        Ok(count) => filled += count,
                        Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                        Err(e) => return Err(e.into()),
                    }
                }
                Ok(filled)
            }
        }
    }

    /// Read up to `out.len()` bytes.
    ///
    /// Returns the number of bytes read, which is less than requested only when
    /// the end of the stream is reached, and 0 at the end of the stream.
    pub fn read(&mut self, out: &mut [u8]) -> Result<usize, StreamError> {
        let target = &mut self.target;
        let filled = match &mut self.buffer {
            None => Self::read_target(target, out)?,
            Some(buffer) => {
                let mut filled = 0;
                while filled < out.len() {
                    if buffer.available() == 0 {
                        // Large reads bypass the buffer.
                        if out.len() - filled >= buffer.data.len() {
                            filled += Self::read_target(target, &mut out[filled..])?;
                            break;
                        }
                        let count = Self::read_target(target, &mut buffer.data)?;
                        buffer.start = 0;
                        buffer.end = count;
                        if count == 0 {
                            break;
                        }
                    }
                    let count = buffer.available().min(out.len() - filled);
                    out[filled..filled + count]
                        .copy_from_slice(&buffer.data[buffer.start..buffer.start + count]);
                    buffer.start += count;
                    filled += count;
                }
                filled
            }
        };

        self.position += filled as u64;
        Ok(filled)
    }

    /// Fill `out` completely or fail with [`StreamError::EndOfStream`].
    pub fn read_exact(&mut self, out: &mut [u8]) -> Result<(), StreamError> {
        if (out.len() as u64) > self.remaining() {
            return Err(StreamError::EndOfStream);
        }
        if self.read(out)? < out.len() {
            return Err(StreamError::EndOfStream);
        }
        Ok(())
    }

    /// Read exactly `count` bytes into a new vector.
    pub fn read_bytes(&mut self, count: usize) -> Result<Vec<u8>, StreamError> {
        if (count as u64) > self.remaining() {
            return Err(StreamError::EndOfStream);
        }
        let mut bytes = vec![0; count];
        self.read_exact(&mut bytes)?;
        Ok(bytes)
    }

    /// Skip `count` bytes.
    ///
    /// Fails with [`StreamError::EndOfStream`] without moving if fewer than
    /// `count` bytes remain.
    pub fn skip(&mut self, count: u64) -> Result<(), StreamError> {
        if count > self.remaining() {
            return Err(StreamError::EndOfStream);
        }

        let mut rest = count;
        if let Some(buffer) = &mut self.buffer {
            let from_buffer = (buffer.available() as u64).min(rest);
            buffer.start += from_buffer as usize;
            rest -= from_buffer;
        }

        if rest > 0 {
            match &mut self.target {
                Target::Memory { cursor, .. } => *cursor += rest as usize,
                Target::Resource { file } => {
                    let offset = i64::try_from(rest)
                        .map_err(|_| StreamError::Io(ErrorKind::InvalidInput.into()))?;
                    file.seek(SeekFrom::Current(offset))?;
                }
            }
        }

        self.position += count;
        Ok(())
    }

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N], StreamError> {
        let mut bytes = [0; N];
        self.read_exact(&mut bytes)?;
        Ok(bytes)
    }

    /// Read an unsigned 8-bit value.
    pub fn read_u8(&mut self) -> Result<u8, StreamError> {
        Ok(self.read_array::<1>()?[0])
    }

    /// Read an unsigned 16-bit value.
    pub fn read_u16(&mut self) -> Result<u16, StreamError> {
        if self.endianness == Endianness::Unspecified {
            return Err(StreamError::UnspecifiedEndianness);
        }
        let bytes = self.read_array::<2>()?;
        self.endianness.decode_u16(bytes)
    }

    /// Read an unsigned 32-bit value.
    pub fn read_u32(&mut self) -> Result<u32, StreamError> {
        if self.endianness == Endianness::Unspecified {
            return Err(StreamError::UnspecifiedEndianness);
        }
        let bytes = self.read_array::<4>()?;
        self.endianness.decode_u32(bytes)
    }

    /// Read a signed 32-bit value.
    pub fn read_i32(&mut self) -> Result<i32, StreamError> {
        Ok(self.read_u32()? as i32)
    }

    /// Read a 32-bit float.
    pub fn read_f32(&mut self) -> Result<f32, StreamError> {
        Ok(f32::from_bits(self.read_u32()?))
    }

    /// Read `count` unsigned 16-bit values.
    pub fn read_u16_array(&mut self, count: usize) -> Result<Vec<u16>, StreamError> {
        let endianness = self.endianness;
        if endianness == Endianness::Unspecified {
            return Err(StreamError::UnspecifiedEndianness);
        }
        let size = count.checked_mul(2).ok_or(StreamError::EndOfStream)?;
        let bytes = self.read_bytes(size)?;
        let chunks = bytes.chunks_exact(2).map(|c| [c[0], c[1]]);

        if endianness.is_native() {
            Ok(chunks.map(u16::from_ne_bytes).collect())
        } else {
            chunks.map(|c| endianness.decode_u16(c)).collect()
        }
    }

    /// Read `count` unsigned 32-bit values.
    pub fn read_u32_array(&mut self, count: usize) -> Result<Vec<u32>, StreamError> {
        let endianness = self.endianness;
        if endianness == Endianness::Unspecified {
            return Err(StreamError::UnspecifiedEndianness);
        }
        let size = count.checked_mul(4).ok_or(StreamError::EndOfStream)?;
        let bytes = self.read_bytes(size)?;
        let chunks = bytes.chunks_exact(4).map(|c| [c[0], c[1], c[2], c[3]]);

        if endianness.is_native() {
            Ok(chunks.map(u32::from_ne_bytes).collect())
        } else {
            chunks.map(|c| endianness.decode_u32(c)).collect()
        }
    }
}

impl fmt::Debug for InputStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.target {
            Target::Memory { .. } => "memory",
            Target::Resource { .. } => "resource",
        };
        f.debug_struct("InputStream")
            .field("target", &kind)
            .field("endianness", &self.endianness)
            .field("position", &self.position)
            .field("length", &self.length)
            .field("buffered", &self.buffer.is_some())
            .finish()
    }
}
