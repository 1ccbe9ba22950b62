use bytes::{BufMut, BytesMut};

use crate::error::{FrameError, Result};

/// Message header: id (6) + receptive (1) + byte length (4) = 11 bytes.
pub const HEADER_SIZE: usize = 11;

/// Largest id representable in the 48-bit header field.
pub const MAX_ID: u64 = (1 << 48) - 1;

const ID_SIZE: usize = 6;
const RECEPTIVE_OFFSET: usize = 6;
const LENGTH_OFFSET: usize = 7;

/// Decoded message header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    /// Identifier used to correlate requests and responses.
    pub id: u64,
    /// Whether the sender expects a reply.
    pub receptive: bool,
    /// Total encoded length of the message, header included.
    pub byte_length: u64,
}

impl Header {
    /// Create a header for a body of `body_len` bytes.
    pub fn for_body(id: u64, receptive: bool, body_len: usize) -> Self {
        Self {
            id,
            receptive,
            byte_length: (HEADER_SIZE + body_len) as u64,
        }
    }

    /// Number of body bytes following the header.
    pub fn body_len(&self) -> u64 {
        self.byte_length.saturating_sub(HEADER_SIZE as u64)
    }
}

/// Read a header from the first [`HEADER_SIZE`] bytes of `src`.
///
/// Wire format:
/// ```text
/// ┌────────────────────┬─────────────┬───────────────────────┐
/// │ Id (6B BE)         │ Receptive   │ Byte length (4B LE)   │
/// │ 48-bit identifier  │ (1B, 0 / 1) │ header + body, total  │
/// └────────────────────┴─────────────┴───────────────────────┘
/// ```
///
/// The layout is fixed-width, so reading never fails once enough bytes are
/// present. Any non-zero receptive byte reads as `true`.
///
/// # Panics
///
/// Panics if `src` is shorter than [`HEADER_SIZE`].
pub fn read_header(src: &[u8]) -> Header {
    let mut id_bytes = [0u8; 8];
    id_bytes[8 - ID_SIZE..].copy_from_slice(&src[..ID_SIZE]);

    let mut len_bytes = [0u8; 4];
    len_bytes.copy_from_slice(&src[LENGTH_OFFSET..HEADER_SIZE]);

    Header {
        id: u64::from_be_bytes(id_bytes),
        receptive: src[RECEPTIVE_OFFSET] != 0,
        byte_length: u64::from(u32::from_le_bytes(len_bytes)),
    }
}

/// Append the wire form of `header` to `dst`.
pub fn write_header(header: &Header, dst: &mut BytesMut) -> Result<()> {
    if header.id > MAX_ID {
        return Err(FrameError::IdOutOfRange(header.id));
    }
    if header.byte_length < HEADER_SIZE as u64 || header.byte_length > u64::from(u32::MAX) {
        return Err(FrameError::InvalidLength {
            length: header.byte_length,
        });
    }

    dst.reserve(HEADER_SIZE);
    dst.put_slice(&header.id.to_be_bytes()[8 - ID_SIZE..]);
    dst.put_u8(u8::from(header.receptive));
    dst.put_u32_le(header.byte_length as u32);
    Ok(())
}
