//! Payload chunking.
//!
//! The panel consumes the payload in slices of at most 4096 bytes, each
//! followed by CR LF.

/// Maximum payload bytes per chunk
pub const CHUNK_SIZE: usize = 4096;

/// Chunk terminator
pub const CRLF: [u8; 2] = [0x0D, 0x0A];

/// Number of chunks for a payload of `len` bytes.
pub fn chunk_count(len: usize) -> usize {
    len.div_ceil(CHUNK_SIZE)
}

/// Iterate over the chunks of `payload`.
///
/// Yields `(index, chunk)` pairs; the last chunk may be shorter.
pub fn chunks(payload: &[u8]) -> impl Iterator<Item = (usize, &[u8])> {
    payload.chunks(CHUNK_SIZE).enumerate()
}
