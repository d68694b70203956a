//! # Console Constants
//!
//! Address-space layout of the target console.
//!
//! **CRITICAL:** Level data is authored against these values. Changing them
//! invalidates every segmented pointer baked into ROM.

// =============================================================================
// ADDRESS SPACE
// =============================================================================

/// Base of the cached, directly mapped kernel segment.
pub const KSEG0_BASE: u32 = 0x8000_0000;

/// Mask that turns a KSEG0 address into a physical address.
pub const PHYSICAL_MASK: u32 = 0x1FFF_FFFF;

/// Number of entries in the segment table.
pub const NUM_SEGMENTS: usize = 32;

/// Low 24 bits of a segmented address hold the offset.
pub const SEGMENT_OFFSET_MASK: u32 = 0x00FF_FFFF;

/// Number of segments uploaded to the display processor.
pub const RSP_SEGMENTS: usize = 16;

// =============================================================================
// ALIGNMENT HELPERS
// =============================================================================

/// Rounds `value` up to the next multiple of `align` (a power of two).
#[inline]
#[must_use]
pub const fn align_up(value: u32, align: u32) -> u32 {
    (value + align - 1) & !(align - 1)
}

/// Rounds `value` up to the next multiple of `align` (a nonzero power of
/// two), or `None` if the result does not fit in 32 bits.
#[inline]
#[must_use]
pub const fn checked_align_up(value: u32, align: u32) -> Option<u32> {
    match value.checked_add(align - 1) {
        Some(v) => Some(v & !(align - 1)),
        None => None,
    }
}

/// Rounds `value` down to a multiple of `align` (a power of two).
#[inline]
#[must_use]
pub const fn align_down(value: u32, align: u32) -> u32 {
    value & !(align - 1)
}

/// `ALIGN4`.
#[inline]
#[must_use]
pub const fn align4(value: u32) -> u32 {
    align_up(value, 4)
}

/// `ALIGN16`, the DMA transfer granularity.
#[inline]
#[must_use]
pub const fn align16(value: u32) -> u32 {
    align_up(value, 16)
}
