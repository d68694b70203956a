//! # Compressed Segments
//!
//! Block layout:
//!
//! ```text
//! 0..4   magic "LZ4B"
//! 4..8   decompressed length (u32, big endian)
//! 8..12  payload length (u32, big endian)
//! 12..   LZ4 block
//! ```
//!
//! The decompressed length sits at bytes 4..8 like every other codec the
//! engine has used, so the loader can size the destination from the header
//! alone.

use crate::error::{RomError, RomResult};

/// Block magic.
pub const MAGIC: [u8; 4] = *b"LZ4B";

/// Bytes before the payload.
pub const HEADER_LEN: usize = 12;

/// Compresses a segment for storage in ROM.
#[must_use]
pub fn compress_segment(raw: &[u8]) -> Vec<u8> {
    let payload = lz4_flex::block::compress(raw);
    let mut out = Vec::with_capacity(HEADER_LEN + payload.len());
    out.extend_from_slice(&MAGIC);
    out.extend_from_slice(&(raw.len() as u32).to_be_bytes());
    out.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    out.extend_from_slice(&payload);
    out
}

fn be_word(bytes: &[u8], at: usize) -> u32 {
    u32::from_be_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
}

/// Reads the decompressed length from a block header.
///
/// # Errors
///
/// Returns `BadHeader` if the header is truncated or the magic is wrong.
pub fn decompressed_len(block: &[u8]) -> RomResult<u32> {
    if block.len() < HEADER_LEN {
        return Err(RomError::BadHeader("truncated header"));
    }
    if block[..4] != MAGIC {
        return Err(RomError::BadHeader("bad magic"));
    }
    Ok(be_word(block, 4))
}

/// Decompresses `block` into `dest`, which must be exactly the advertised
/// length.
///
/// # Errors
///
/// Returns `BadHeader` for a malformed header and `Decompress` if the payload
/// is corrupt or decodes to the wrong length.
pub fn decompress_into(block: &[u8], dest: &mut [u8]) -> RomResult<()> {
    let raw_len = decompressed_len(block)? as usize;
    let payload_len = be_word(block, 8) as usize;
    let payload = block
        .get(HEADER_LEN..HEADER_LEN + payload_len)
        .ok_or(RomError::BadHeader("payload runs past the block"))?;
    if dest.len() != raw_len {
        return Err(RomError::Decompress(format!(
            "destination holds {} bytes, block expands to {raw_len}",
            dest.len()
        )));
    }

    let written = lz4_flex::block::decompress_into(payload, dest)
        .map_err(|e| RomError::Decompress(e.to_string()))?;
    if written != raw_len {
        return Err(RomError::Decompress(format!("expanded to {written} of {raw_len} bytes")));
    }
    Ok(())
}
