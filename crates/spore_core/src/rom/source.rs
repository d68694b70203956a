//! # ROM Sources
//!
//! Read-only, offset-addressed cartridge storage.

use crate::error::{RomError, RomResult};

/// Anything the loader can stream bytes from.
///
/// Reads past the end of the source yield zeros, the way the cartridge bus
/// pads a transfer that runs off the end of the image.
pub trait RomSource {
    /// Size of the source in bytes.
    fn len(&self) -> u32;

    /// Whether the source holds no data.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Fills `dest` with the bytes starting at `offset`.
    fn read_into(&self, offset: u32, dest: &mut [u8]);
}

/// A ROM image held in memory.
#[derive(Clone, Debug, Default)]
pub struct RomImage {
    bytes: Vec<u8>,
}

impl RomImage {
    /// Wraps raw cartridge bytes.
    #[must_use]
    pub fn new(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    /// The whole image.
    #[inline]
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

impl From<Vec<u8>> for RomImage {
    fn from(bytes: Vec<u8>) -> Self {
        Self::new(bytes)
    }
}

impl RomSource for RomImage {
    fn len(&self) -> u32 {
        self.bytes.len() as u32
    }

    fn read_into(&self, offset: u32, dest: &mut [u8]) {
        let start = (offset as usize).min(self.bytes.len());
        let available = &self.bytes[start..];
        let n = available.len().min(dest.len());
        dest[..n].copy_from_slice(&available[..n]);
        dest[n..].fill(0);
    }
}

impl<T: RomSource + ?Sized> RomSource for &T {
    fn len(&self) -> u32 {
        (**self).len()
    }

    fn read_into(&self, offset: u32, dest: &mut [u8]) {
        (**self).read_into(offset, dest);
    }
}

/// A `[start, end)` byte range of ROM.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RomRange {
    /// First byte.
    pub start: u32,
    /// One past the last byte.
    pub end: u32,
}

impl RomRange {
    /// Creates a range from its bounds.
    #[inline]
    #[must_use]
    pub const fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }

    /// Creates a range of `len` bytes at `start`.
    ///
    /// A range that would pass the end of the address space stops at
    /// `u32::MAX`, which no source validates.
    #[inline]
    #[must_use]
    pub const fn at(start: u32, len: u32) -> Self {
        Self { start, end: start.saturating_add(len) }
    }

    /// Bytes in the range.
    #[inline]
    #[must_use]
    pub const fn len(&self) -> u32 {
        self.end.saturating_sub(self.start)
    }

    /// Whether the range is empty.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.end == self.start
    }

    /// Checks the range against a source.
    ///
    /// # Errors
    ///
    /// Returns `BadRange` if the range is inverted or ends past the source.
    pub fn validate(&self, rom: &impl RomSource) -> RomResult<()> {
        if self.start > self.end || self.end > rom.len() {
            return Err(RomError::BadRange {
                start: self.start,
                end: self.end,
                rom_len: rom.len(),
            });
        }
        Ok(())
    }
}
