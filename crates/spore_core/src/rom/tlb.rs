//! # Segment Page Mappings
//!
//! Segments loaded together with a bss block are additionally mapped page by
//! page, so code inside them can use the segmented address directly.
//!
//! Each entry maps an even/odd pair of pages, the way the MIPS TLB does; a
//! mapping that ends on an even page leaves the odd half empty.

use spore_shared::constants::NUM_SEGMENTS;

use crate::segment::SegmentedAddr;

/// One TLB entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TlbEntry {
    /// Segment the entry belongs to.
    pub segment: u8,
    /// Virtual (segmented) address of the even page.
    pub virt: u32,
    /// Physical address of the even page.
    pub even: u32,
    /// Physical address of the odd page, if mapped.
    pub odd: Option<u32>,
}

/// All page mappings made by segment loads.
#[derive(Clone, Debug)]
pub struct TlbMap {
    page_size: u32,
    entries: Vec<TlbEntry>,
    per_segment: [u16; NUM_SEGMENTS],
}

impl TlbMap {
    /// Creates an empty map with the given page size.
    #[must_use]
    pub fn new(page_size: u32) -> Self {
        Self {
            page_size,
            entries: Vec::new(),
            per_segment: [0; NUM_SEGMENTS],
        }
    }

    /// Page size in bytes.
    #[inline]
    #[must_use]
    pub const fn page_size(&self) -> u32 {
        self.page_size
    }

    /// Maps `len` bytes of physical memory at `physical` to the start of
    /// `segment`. Returns the number of entries added.
    ///
    /// A map with a zero page size maps nothing.
    pub fn map_segment(&mut self, segment: u8, physical: u32, len: u32) -> usize {
        let Some(pair) = self.page_size.checked_mul(2).filter(|&pair| pair > 0) else {
            tracing::warn!(segment, page_size = self.page_size, "unusable page size, segment not mapped");
            return 0;
        };
        let mut virt = u32::from(segment) << 24;
        let mut physical = physical;
        let mut remaining = len;
        let mut added = 0;

        while remaining > 0 {
            let odd = (remaining > self.page_size).then_some(physical + self.page_size);
            self.entries.push(TlbEntry {
                segment,
                virt,
                even: physical,
                odd,
            });
            if let Some(count) = self.per_segment.get_mut(usize::from(segment)) {
                *count += 1;
            }
            added += 1;

            virt += pair;
            physical += pair;
            remaining = remaining.saturating_sub(pair);
        }

        tracing::trace!(segment, entries = added, total = self.entries.len(), "segment pages mapped");
        added
    }

    /// Removes every entry belonging to `segment`.
    pub fn unmap_segment(&mut self, segment: u8) {
        self.entries.retain(|e| e.segment != segment);
        if let Some(count) = self.per_segment.get_mut(usize::from(segment)) {
            *count = 0;
        }
    }

    /// Removes every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.per_segment = [0; NUM_SEGMENTS];
    }

    /// Total entries in use.
    #[inline]
    #[must_use]
    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    /// Entries used by one segment.
    #[must_use]
    pub fn segment_entries(&self, segment: u8) -> usize {
        self.per_segment.get(usize::from(segment)).map_or(0, |&c| usize::from(c))
    }

    /// The mapped entries, oldest first.
    #[inline]
    #[must_use]
    pub fn entries(&self) -> &[TlbEntry] {
        &self.entries
    }

    /// Physical address behind a mapped segmented address.
    #[must_use]
    pub fn translate(&self, addr: SegmentedAddr) -> Option<u32> {
        let page = self.page_size;
        self.entries.iter().find_map(|e| {
            let delta = addr.0.checked_sub(e.virt)?;
            if delta < page {
                Some(e.even + delta)
            } else if delta < page * 2 {
                e.odd.map(|odd| odd + delta - page)
            } else {
                None
            }
        })
    }
}
