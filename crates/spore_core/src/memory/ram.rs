//! # RAM Image
//!
//! The console's main memory as a single byte block, addressed the way game
//! code addresses it: through the cached KSEG0 window.

use std::fmt;
use std::ops::Range;

use bytemuck::Pod;
use spore_shared::constants::{KSEG0_BASE, PHYSICAL_MASK};

use crate::error::{MemoryError, MemoryResult};

/// A KSEG0 virtual address (`0x8000_0000 | physical`).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct VirtAddr(pub u32);

impl VirtAddr {
    /// Virtual address of a physical offset.
    #[inline]
    #[must_use]
    pub const fn from_physical(physical: u32) -> Self {
        Self((physical & PHYSICAL_MASK) | KSEG0_BASE)
    }

    /// Raw 32-bit value.
    #[inline]
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }

    /// Physical address behind this virtual address.
    #[inline]
    #[must_use]
    pub const fn physical(self) -> u32 {
        self.0 & PHYSICAL_MASK
    }

    /// Address `bytes` further on.
    #[inline]
    #[must_use]
    pub const fn add(self, bytes: u32) -> Self {
        Self(self.0 + bytes)
    }

    /// Distance in bytes from `earlier` to `self`.
    #[inline]
    #[must_use]
    pub const fn offset_from(self, earlier: Self) -> u32 {
        self.0 - earlier.0
    }
}

impl fmt::Display for VirtAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#010x}", self.0)
    }
}

/// Console RAM.
///
/// All reads and writes are bounds-checked against the image; headers are
/// read unaligned so callers never have to reason about host alignment.
pub struct Ram {
    bytes: Box<[u8]>,
}

impl Ram {
    /// Creates a zeroed RAM image of `size` bytes.
    #[must_use]
    pub fn new(size: u32) -> Self {
        Self {
            bytes: vec![0u8; size as usize].into_boxed_slice(),
        }
    }

    /// Size in bytes.
    #[inline]
    #[must_use]
    pub fn size(&self) -> u32 {
        self.bytes.len() as u32
    }

    /// First address of RAM.
    #[inline]
    #[must_use]
    pub const fn start(&self) -> VirtAddr {
        VirtAddr::from_physical(0)
    }

    /// One past the last address of RAM (`RAM_END`).
    #[inline]
    #[must_use]
    pub fn end(&self) -> VirtAddr {
        VirtAddr(KSEG0_BASE + self.size())
    }

    /// Whether `[addr, addr + len)` is inside the image.
    #[must_use]
    pub fn contains(&self, addr: VirtAddr, len: u32) -> bool {
        self.range(addr, len).is_ok()
    }

    fn range(&self, addr: VirtAddr, len: u32) -> MemoryResult<Range<usize>> {
        let out_of_bounds = MemoryError::OutOfBounds { addr: addr.0, len };
        if addr.0 < KSEG0_BASE {
            return Err(out_of_bounds);
        }
        let start = addr.physical() as usize;
        let end = start.checked_add(len as usize).ok_or(out_of_bounds.clone())?;
        if end > self.bytes.len() {
            return Err(out_of_bounds);
        }
        Ok(start..end)
    }

    /// Borrows `len` bytes at `addr`.
    ///
    /// # Errors
    ///
    /// Returns `OutOfBounds` if the range leaves RAM.
    pub fn bytes(&self, addr: VirtAddr, len: u32) -> MemoryResult<&[u8]> {
        let range = self.range(addr, len)?;
        Ok(&self.bytes[range])
    }

    /// Mutably borrows `len` bytes at `addr`.
    ///
    /// # Errors
    ///
    /// Returns `OutOfBounds` if the range leaves RAM.
    pub fn bytes_mut(&mut self, addr: VirtAddr, len: u32) -> MemoryResult<&mut [u8]> {
        let range = self.range(addr, len)?;
        Ok(&mut self.bytes[range])
    }

    /// Borrows a source range immutably and a disjoint destination range
    /// mutably, for in-RAM transforms such as decompression.
    ///
    /// # Errors
    ///
    /// Returns `OutOfBounds` if either range leaves RAM or they overlap.
    pub fn split_pair(
        &mut self,
        src: VirtAddr,
        src_len: u32,
        dst: VirtAddr,
        dst_len: u32,
    ) -> MemoryResult<(&[u8], &mut [u8])> {
        let src_range = self.range(src, src_len)?;
        let dst_range = self.range(dst, dst_len)?;
        if src_range.start < dst_range.end && dst_range.start < src_range.end {
            return Err(MemoryError::OutOfBounds { addr: dst.0, len: dst_len });
        }
        if src_range.start < dst_range.start {
            let (low, high) = self.bytes.split_at_mut(dst_range.start);
            Ok((&low[src_range], &mut high[..dst_range.len()]))
        } else {
            let (low, high) = self.bytes.split_at_mut(src_range.start);
            Ok((&high[..src_range.len()], &mut low[dst_range]))
        }
    }

    /// Fills `len` bytes at `addr` with zero (`bzero`).
    ///
    /// # Errors
    ///
    /// Returns `OutOfBounds` if the range leaves RAM.
    pub fn zero(&mut self, addr: VirtAddr, len: u32) -> MemoryResult<()> {
        self.bytes_mut(addr, len)?.fill(0);
        Ok(())
    }

    /// Reads a plain-old-data value stored at `addr`.
    ///
    /// # Errors
    ///
    /// Returns `OutOfBounds` if the value leaves RAM.
    pub fn read_pod<T: Pod>(&self, addr: VirtAddr) -> MemoryResult<T> {
        let bytes = self.bytes(addr, std::mem::size_of::<T>() as u32)?;
        Ok(bytemuck::pod_read_unaligned(bytes))
    }

    /// Writes a plain-old-data value at `addr`.
    ///
    /// # Errors
    ///
    /// Returns `OutOfBounds` if the value leaves RAM.
    pub fn write_pod<T: Pod>(&mut self, addr: VirtAddr, value: &T) -> MemoryResult<()> {
        let src = bytemuck::bytes_of(value);
        self.bytes_mut(addr, src.len() as u32)?.copy_from_slice(src);
        Ok(())
    }

    /// Reads a big-endian word, the byte order of everything that came from
    /// ROM.
    ///
    /// # Errors
    ///
    /// Returns `OutOfBounds` if the word leaves RAM.
    pub fn read_u32_be(&self, addr: VirtAddr) -> MemoryResult<u32> {
        let b = self.bytes(addr, 4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }
}

impl fmt::Debug for Ram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ram").field("size", &self.bytes.len()).finish()
    }
}
