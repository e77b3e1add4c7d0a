//! Reference position codec.
//!
//! A file payload may embed 4-byte indices into its source's reference table.
//! The payload is preceded by a reference block listing where those indices
//! are, as a sequence of variable-length groups. Each group is zero or more
//! continuation bytes (high bit set) followed by one terminating byte (high bit
//! clear), and decodes to the distance from the end of the previous reference.
//!
//! ```
//! use kzb::codec::{decode_positions, encode_positions};
//!
//! let encoded = encode_positions(&[0, 4, 200]).unwrap();
//! assert_eq!(decode_positions(&encoded).unwrap(), vec![0, 4, 200]);
//! ```

use thiserror::Error;

/// Width of an embedded reference index, in bytes.
pub const REFERENCE_SIZE: u32 = 4;

const CONTINUATION_BIT: u8 = 0x80;
const PAYLOAD_MASK: u8 = 0x7F;

/// Errors that can occur while encoding or decoding reference positions.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CodecError {
    /// A decoded position does not fit in a 32-bit offset.
    #[error("Reference position overflows a 32-bit offset")]
    Overflow,

    /// A position lies inside the previous reference.
    #[error("Reference at {position} overlaps the previous reference ending at {previous_end}")]
    Overlapping { position: u32, previous_end: u64 },
}

/// Number of references encoded in `bytes` (the count of terminating bytes).
pub fn count_references(bytes: &[u8]) -> usize {
    bytes.iter().filter(|&&b| b & CONTINUATION_BIT == 0).count()
}

/// Decode a reference block into absolute payload offsets.
///
/// Continuation bytes after the last terminating byte do not form a group and
/// are ignored.
pub fn decode_positions(bytes: &[u8]) -> Result<Vec<u32>, CodecError> {
    let mut positions = Vec::with_capacity(count_references(bytes));
    let mut last_position: u64 = 0;
    let mut delta: u64 = 0;

    for &byte in bytes {
        let payload = u64::from(byte & PAYLOAD_MASK);
        if byte & CONTINUATION_BIT != 0 {
            delta = delta
                .checked_add(payload + 1)
                .and_then(|d| d.checked_mul(128))
                .filter(|&d| d <= u64::from(u32::MAX))
                .ok_or(CodecError::Overflow)?;
        } else {
            let absolute = last_position + delta + payload;
            let position = u32::try_from(absolute).map_err(|_| CodecError::Overflow)?;
            positions.push(position);
            last_position = absolute + u64::from(REFERENCE_SIZE);
            delta = 0;
        }
    }

    Ok(positions)
}

/// Encode absolute payload offsets into a reference block.
///
/// Each position must start at or after the end of the previous reference.
pub fn encode_positions(positions: &[u32]) -> Result<Vec<u8>, CodecError> {
    let mut bytes = Vec::with_capacity(positions.len());
    let mut last_position: u64 = 0;

    for &position in positions {
        let delta = u64::from(position)
            .checked_sub(last_position)
            .ok_or(CodecError::Overlapping {
                position,
                previous_end: last_position,
            })?;
        encode_group(delta, &mut bytes);
        last_position = u64::from(position) + u64::from(REFERENCE_SIZE);
    }

    Ok(bytes)
}

/// Append one group, most significant byte first.
fn encode_group(delta: u64, out: &mut Vec<u8>) {
    let mut group = vec![(delta as u8) & PAYLOAD_MASK];
    let mut rest = delta >> 7;
    while rest > 0 {
        rest -= 1;
        group.push(CONTINUATION_BIT | ((rest as u8) & PAYLOAD_MASK));
        rest >>= 7;
    }
    out.extend(group.into_iter().rev());
}
