//! # Segment Table
//!
//! Asset data refers to other asset data through segmented addresses: the
//! high byte selects one of 32 segments, the low 24 bits are an offset into
//! it. Loading a segment binds its physical base in this table, so the same
//! data works wherever the allocator happened to place it.

use std::fmt;

use spore_shared::constants::{
    KSEG0_BASE, NUM_SEGMENTS, PHYSICAL_MASK, RSP_SEGMENTS, SEGMENT_OFFSET_MASK,
};

use crate::error::{MemoryError, MemoryResult};
use crate::memory::VirtAddr;

/// A `segment:offset` address as stored in asset data.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct SegmentedAddr(pub u32);

impl SegmentedAddr {
    /// Builds an address from its parts. The offset is truncated to 24 bits.
    #[inline]
    #[must_use]
    pub const fn new(segment: u8, offset: u32) -> Self {
        Self(((segment as u32) << 24) | (offset & SEGMENT_OFFSET_MASK))
    }

    /// Segment id (high byte).
    #[inline]
    #[must_use]
    pub const fn segment(self) -> u8 {
        (self.0 >> 24) as u8
    }

    /// Offset into the segment (low 24 bits).
    #[inline]
    #[must_use]
    pub const fn offset(self) -> u32 {
        self.0 & SEGMENT_OFFSET_MASK
    }

    /// Whether the value is already a KSEG0 virtual address rather than a
    /// segmented one.
    #[inline]
    #[must_use]
    pub const fn is_virtual(self) -> bool {
        self.0 & KSEG0_BASE != 0
    }

    /// Resolves through `table`.
    ///
    /// # Errors
    ///
    /// See [`SegmentTable::segmented_to_virtual`].
    #[inline]
    pub fn resolve(self, table: &SegmentTable) -> MemoryResult<VirtAddr> {
        table.segmented_to_virtual(self)
    }
}

impl fmt::Display for SegmentedAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02x}:{:06x}", self.segment(), self.offset())
    }
}

/// Physical base of every segment.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SegmentTable {
    bases: [u32; NUM_SEGMENTS],
}

impl Default for SegmentTable {
    fn default() -> Self {
        Self::new()
    }
}

impl SegmentTable {
    /// Creates a table with every segment based at physical zero.
    #[must_use]
    pub const fn new() -> Self {
        Self { bases: [0; NUM_SEGMENTS] }
    }

    fn check(segment: u8) -> MemoryResult<usize> {
        let index = usize::from(segment);
        if index < NUM_SEGMENTS {
            Ok(index)
        } else {
            Err(MemoryError::InvalidSegment(u32::from(segment)))
        }
    }

    /// Binds `segment` to the memory at `addr`. Returns the stored physical
    /// base.
    ///
    /// # Errors
    ///
    /// Returns `InvalidSegment` for ids past the table.
    pub fn set_base(&mut self, segment: u8, addr: VirtAddr) -> MemoryResult<u32> {
        let index = Self::check(segment)?;
        self.bases[index] = addr.get() & PHYSICAL_MASK;
        tracing::trace!(segment, base = %addr, "segment bound");
        Ok(self.bases[index])
    }

    /// Virtual address `segment` is bound to.
    ///
    /// # Errors
    ///
    /// Returns `InvalidSegment` for ids past the table.
    pub fn base(&self, segment: u8) -> MemoryResult<VirtAddr> {
        let index = Self::check(segment)?;
        Ok(VirtAddr(self.bases[index] | KSEG0_BASE))
    }

    /// Turns a segmented address into a virtual one.
    ///
    /// Addresses that are already virtual pass through unchanged, so data
    /// that mixes both kinds of pointer resolves uniformly.
    ///
    /// # Errors
    ///
    /// Returns `InvalidSegment` when the high byte is not a segment id.
    pub fn segmented_to_virtual(&self, addr: SegmentedAddr) -> MemoryResult<VirtAddr> {
        if addr.is_virtual() {
            return Ok(VirtAddr(addr.0));
        }
        let index = Self::check(addr.segment())?;
        Ok(VirtAddr((self.bases[index] + addr.offset()) | KSEG0_BASE))
    }

    /// Expresses a virtual address relative to `segment`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidSegment` for ids past the table and `OutsideSegment`
    /// when the address lies below the segment base.
    pub fn virtual_to_segmented(&self, segment: u8, addr: VirtAddr) -> MemoryResult<SegmentedAddr> {
        let index = Self::check(segment)?;
        let offset = addr
            .physical()
            .checked_sub(self.bases[index])
            .filter(|offset| *offset <= SEGMENT_OFFSET_MASK)
            .ok_or(MemoryError::OutsideSegment { segment, addr: addr.get() })?;
        Ok(SegmentedAddr::new(segment, offset))
    }

    /// The segments uploaded to the display processor at the start of a
    /// frame.
    #[must_use]
    pub fn rsp_segment_table(&self) -> [u32; RSP_SEGMENTS] {
        let mut out = [0; RSP_SEGMENTS];
        out.copy_from_slice(&self.bases[..RSP_SEGMENTS]);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_base_masks_to_physical() {
        let mut table = SegmentTable::new();
        assert_eq!(table.set_base(7, VirtAddr(0x8012_3400)).unwrap(), 0x0012_3400);
        assert_eq!(table.base(7).unwrap(), VirtAddr(0x8012_3400));
    }

    #[test]
    fn test_segmented_to_virtual() {
        let mut table = SegmentTable::new();
        table.set_base(0x0E, VirtAddr(0x8020_0000)).unwrap();
        let addr = SegmentedAddr(0x0E00_0010);
        assert_eq!(addr.segment(), 0x0E);
        assert_eq!(addr.offset(), 0x10);
        assert_eq!(addr.resolve(&table).unwrap(), VirtAddr(0x8020_0010));
    }

    #[test]
    fn test_round_trip_through_segment() {
        let mut table = SegmentTable::new();
        table.set_base(4, VirtAddr(0x8030_0000)).unwrap();
        let virt = VirtAddr(0x8030_1234);
        let seg = table.virtual_to_segmented(4, virt).unwrap();
        assert_eq!(seg, SegmentedAddr(0x0400_1234));
        assert_eq!(table.segmented_to_virtual(seg).unwrap(), virt);
    }

    #[test]
    fn test_virtual_passthrough_and_errors() {
        let table = SegmentTable::new();
        assert_eq!(
            table.segmented_to_virtual(SegmentedAddr(0x8000_4000)).unwrap(),
            VirtAddr(0x8000_4000)
        );
        assert_eq!(
            table.segmented_to_virtual(SegmentedAddr(0x2000_0000)),
            Err(MemoryError::InvalidSegment(0x20))
        );
        assert!(table.base(32).is_err());

        let mut table = table;
        table.set_base(5, VirtAddr(0x8010_0000)).unwrap();
        assert!(matches!(
            table.virtual_to_segmented(5, VirtAddr(0x800F_0000)),
            Err(MemoryError::OutsideSegment { segment: 5, .. })
        ));
    }

    #[test]
    fn test_rsp_table_holds_first_sixteen() {
        let mut table = SegmentTable::new();
        table.set_base(15, VirtAddr(0x8000_F000)).unwrap();
        table.set_base(16, VirtAddr(0x8001_0000)).unwrap();
        let rsp = table.rsp_segment_table();
        assert_eq!(rsp[15], 0xF000);
        assert_eq!(rsp.len(), 16);
    }

    #[test]
    fn test_display() {
        assert_eq!(SegmentedAddr::new(7, 0x1_2345).to_string(), "07:012345");
    }
}
