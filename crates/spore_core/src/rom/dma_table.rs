//! # Patchable DMA Tables
//!
//! Large banks of same-kind data (animations, mostly) stay in ROM. A table
//! at the start of the bank lists `(offset, size)` pairs, and one entry at a
//! time is streamed into a fixed buffer when it is needed.
//!
//! ```text
//! 0..4    entry count (u32, big endian)
//! 4..8    reserved
//! 8..     count x (offset u32, size u32), offsets relative to the table
//! ```

use spore_shared::constants::align16;

use super::loader::RomLoader;
use super::source::{RomRange, RomSource};
use crate::context::MemoryContext;
use crate::error::{RomError, RomResult};
use crate::memory::{Ram, VirtAddr};

const TABLE_HEADER_LEN: u32 = 8;
const PAIR_LEN: u32 = 8;

/// One table entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OffsetSizePair {
    /// Offset from the start of the table in ROM.
    pub offset: u32,
    /// Entry size in bytes.
    pub size: u32,
}

/// A table copied into the main pool.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DmaTable {
    /// ROM offset of the table.
    pub rom_addr: u32,
    /// Where the table lives in RAM.
    pub addr: VirtAddr,
    /// Number of entries.
    pub count: u32,
}

impl DmaTable {
    /// Reads entry `index` from the RAM copy of the table.
    ///
    /// # Errors
    ///
    /// Returns `TableIndex` if `index` is past the end of the table.
    pub fn entry(&self, ram: &Ram, index: u32) -> RomResult<OffsetSizePair> {
        if index >= self.count {
            return Err(RomError::TableIndex { index, count: self.count });
        }
        let at = self.addr.add(TABLE_HEADER_LEN + index * PAIR_LEN);
        Ok(OffsetSizePair {
            offset: ram.read_u32_be(at)?,
            size: ram.read_u32_be(at.add(4))?,
        })
    }
}

/// A table bound to the buffer its entries are streamed into.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DmaHandlerList {
    /// The table, if one was loaded.
    pub table: Option<DmaTable>,
    /// ROM offset of the entry currently in the buffer.
    pub current: Option<u32>,
    /// Target buffer.
    pub buffer: VirtAddr,
    /// Size of the target buffer.
    pub capacity: u32,
}

impl<R: RomSource> RomLoader<R> {
    /// Copies the table at `rom_addr` into the main region.
    ///
    /// The count is read through a freeable staging buffer first so the
    /// permanent copy is sized exactly.
    ///
    /// # Errors
    ///
    /// Fails on a bad ROM range or an exhausted main region. A count whose
    /// table would not fit in 32 bits is a `BadRange`.
    pub fn load_dma_table(&self, ctx: &mut MemoryContext, rom_addr: u32) -> RomResult<DmaTable> {
        let head = RomRange::at(rom_addr, 4);
        head.validate(self.rom())?;
        let staging = ctx.pool.try_alloc_aligned_freeable(align16(head.len()), 0)?;
        let count = self
            .dma_read(ctx.pool.ram_mut(), staging, head)
            .and_then(|_| ctx.pool.ram().read_u32_be(staging).map_err(RomError::from));
        ctx.pool.free_freeable(staging)?;
        let count = count?;

        let size = count
            .checked_mul(PAIR_LEN)
            .and_then(|pairs| pairs.checked_add(TABLE_HEADER_LEN))
            .ok_or(RomError::BadRange { start: rom_addr, end: u32::MAX, rom_len: self.rom().len() })?;
        let range = RomRange::at(rom_addr, size);
        range.validate(self.rom())?;
        let addr = ctx.pool.try_alloc_aligned(align16(size), 0)?;
        self.dma_read(ctx.pool.ram_mut(), addr, range)?;

        tracing::debug!(rom = rom_addr, addr = %addr, count, "dma table loaded");
        Ok(DmaTable { rom_addr, addr, count })
    }

    /// Prepares a handler list streaming into `buffer`. With no table
    /// address the list stays empty.
    ///
    /// # Errors
    ///
    /// See [`RomLoader::load_dma_table`].
    pub fn setup_dma_table_list(
        &self,
        ctx: &mut MemoryContext,
        rom_addr: Option<u32>,
        buffer: VirtAddr,
        capacity: u32,
    ) -> RomResult<DmaHandlerList> {
        let table = rom_addr.map(|addr| self.load_dma_table(ctx, addr)).transpose()?;
        Ok(DmaHandlerList {
            table,
            current: None,
            buffer,
            capacity,
        })
    }

    /// Streams entry `index` into the list's buffer.
    ///
    /// Returns `false` when that entry is already in the buffer.
    ///
    /// # Errors
    ///
    /// Returns `TableIndex` for an index past the table (or a list with no
    /// table), `BufferTooSmall` if the entry does not fit the buffer and
    /// `BadRange` if the entry points outside the ROM.
    pub fn load_patchable_table(
        &self,
        ram: &mut Ram,
        list: &mut DmaHandlerList,
        index: u32,
    ) -> RomResult<bool> {
        let table = list.table.ok_or(RomError::TableIndex { index, count: 0 })?;
        let entry = table.entry(ram, index)?;
        let src = table.rom_addr.checked_add(entry.offset).ok_or(RomError::BadRange {
            start: table.rom_addr,
            end: u32::MAX,
            rom_len: self.rom().len(),
        })?;

        if list.current == Some(src) {
            return Ok(false);
        }
        if align16(entry.size) > list.capacity {
            return Err(RomError::BufferTooSmall { size: entry.size, capacity: list.capacity });
        }

        self.dma_read(ram, list.buffer, RomRange::at(src, entry.size))?;
        list.current = Some(src);
        Ok(true)
    }
}
