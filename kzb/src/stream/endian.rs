//! Byte order handling for stream reads.

use std::fmt;

use super::StreamError;

/// Byte order used when decoding multi-byte values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Endianness {
    /// Least significant byte first.
    Little,
    /// Most significant byte first.
    Big,
    /// Whatever the host uses; allows straight copies of value arrays.
    Platform,
    /// No byte order configured. Multi-byte reads fail.
    #[default]
    Unspecified,
}

impl Endianness {
    /// The concrete byte order of the host.
    pub fn native() -> Self {
        if cfg!(target_endian = "big") {
            Endianness::Big
        } else {
            Endianness::Little
        }
    }

    /// Map a concrete byte order equal to the host's to [`Endianness::Platform`].
    ///
    /// ```
    /// use kzb::stream::Endianness;
    ///
    /// assert_eq!(Endianness::native().normalize(), Endianness::Platform);
    /// assert_eq!(Endianness::Unspecified.normalize(), Endianness::Unspecified);
    /// ```
    pub fn normalize(self) -> Self {
        if self == Self::native() {
            Endianness::Platform
        } else {
            self
        }
    }

    /// Whether values in this order can be copied without swapping.
    pub fn is_native(self) -> bool {
        matches!(self, Endianness::Platform) || self == Self::native()
    }

    pub(crate) fn decode_u16(self, bytes: [u8; 2]) -> Result<u16, StreamError> {
        match self {
            Endianness::Little => Ok(u16::from_le_bytes(bytes)),
            Endianness::Big => Ok(u16::from_be_bytes(bytes)),
            Endianness::Platform => Ok(u16::from_ne_bytes(bytes)),
            Endianness::Unspecified => Err(StreamError::UnspecifiedEndianness),
        }
    }

    pub(crate) fn decode_u32(self, bytes: [u8; 4]) -> Result<u32, StreamError> {
        match self {
            Endianness::Little => Ok(u32::from_le_bytes(bytes)),
            Endianness::Big => Ok(u32::from_be_bytes(bytes)),
            Endianness::Platform => Ok(u32::from_ne_bytes(bytes)),
            Endianness::Unspecified => Err(StreamError::UnspecifiedEndianness),
        }
    }

    /// Encode a value in this byte order. `Unspecified` encodes as big-endian.
    pub fn encode_u32(self, value: u32) -> [u8; 4] {
        match self {
            Endianness::Little => value.to_le_bytes(),
            Endianness::Platform => value.to_ne_bytes(),
            Endianness::Big | Endianness::Unspecified => value.to_be_bytes(),
        }
    }
}

impl fmt::Display for Endianness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endianness::Little => write!(f, "little-endian"),
            Endianness::Big => write!(f, "big-endian"),
            Endianness::Platform => write!(f, "platform ({})", Self::native()),
            Endianness::Unspecified => write!(f, "unspecified"),
        }
    }
}
