//! # ROM Loader
//!
//! Streams ROM data into the main pool and binds it to segments.
//!
//! All transfers are synchronous and rounded up to 16 bytes, split into
//! fixed-size chunks the way the cartridge DMA engine moves them.

use spore_shared::constants::{align16, align4};
use spore_shared::MemoryConfig;

use super::compress;
use super::source::{RomRange, RomSource};
use crate::context::MemoryContext;
use crate::error::{RomError, RomResult};
use crate::memory::{Alignment, Ram, VirtAddr, MAIN_REGION};

/// Loads ROM data into a [`MemoryContext`].
#[derive(Debug)]
pub struct RomLoader<R: RomSource> {
    rom: R,
    chunk_size: u32,
    page_size: u32,
}

impl<R: RomSource> RomLoader<R> {
    /// Creates a loader over `rom`.
    #[must_use]
    pub fn new(rom: R, config: &MemoryConfig) -> Self {
        Self {
            rom,
            chunk_size: config.dma_chunk_size.max(16),
            page_size: config.tlb_page_size,
        }
    }

    /// The ROM being read.
    #[inline]
    #[must_use]
    pub const fn rom(&self) -> &R {
        &self.rom
    }

    /// Copies `src` to `dest`, rounded up to 16 bytes. Returns the number of
    /// bytes written.
    ///
    /// # Errors
    ///
    /// Returns `BadRange` for a range outside ROM and `OutOfBounds` if the
    /// destination leaves RAM.
    pub fn dma_read(&self, ram: &mut Ram, dest: VirtAddr, src: RomRange) -> RomResult<u32> {
        src.validate(&self.rom)?;
        let size = align16(src.len());
        let out = ram.bytes_mut(dest, size)?;

        for (i, chunk) in out.chunks_mut(self.chunk_size as usize).enumerate() {
            let offset = src.start + i as u32 * self.chunk_size;
            self.rom.read_into(offset, chunk);
        }

        tracing::trace!(dest = %dest, rom = src.start, size, "dma read");
        Ok(size)
    }

    /// Loads `src` into a new block of the main region and binds `segment`
    /// to it.
    ///
    /// With a bss range the block also holds the zeroed bss, starts on a
    /// page boundary, and is mapped page by page at the segment's address.
    ///
    /// # Errors
    ///
    /// Fails on a bad range or when the main region is exhausted. Nothing is
    /// bound on failure.
    pub fn load_segment(
        &self,
        ctx: &mut MemoryContext,
        segment: u8,
        src: RomRange,
        bss: Option<RomRange>,
    ) -> RomResult<VirtAddr> {
        src.validate(&self.rom)?;
        ctx.segments.base(segment)?;
        let size = align16(src.len());
        let bss_len = bss.map_or(0, |b| b.len());

        let dest = match bss {
            Some(_) => ctx.pool.try_alloc_forward(
                MAIN_REGION,
                align4(size + bss_len),
                Alignment::To(self.page_size),
            )?,
            None => ctx.pool.try_alloc_aligned(size, 0)?,
        };

        let ram = ctx.pool.ram_mut();
        self.dma_read(ram, dest, src)?;
        if bss_len > 0 {
            ram.zero(dest.add(size), bss_len)?;
        }

        ctx.segments.set_base(segment, dest)?;
        if bss.is_some() {
            ctx.tlb.unmap_segment(segment);
            ctx.tlb.map_segment(segment, dest.physical(), src.len() + bss_len);
        }

        tracing::debug!(segment, addr = %dest, size, bss = bss_len, "segment loaded");
        Ok(dest)
    }

    /// Loads a compressed block, expands it into a new block of the main
    /// region and binds `segment` to the result.
    ///
    /// The compressed data is staged in a freeable buffer that is released
    /// on every path.
    ///
    /// # Errors
    ///
    /// Fails on a bad range, a malformed block, or an exhausted main region.
    /// A destination block allocated before a decode failure is reclaimed
    /// by the next `pop_state`.
    pub fn load_segment_decompress(
        &self,
        ctx: &mut MemoryContext,
        segment: u8,
        src: RomRange,
    ) -> RomResult<VirtAddr> {
        src.validate(&self.rom)?;
        ctx.segments.base(segment)?;
        let comp_size = align16(src.len());
        let staging = ctx.pool.try_alloc_aligned_freeable(comp_size, 0)?;

        let expanded = self.expand_staged(ctx, staging, src);
        ctx.pool.free_freeable(staging)?;
        let (dest, raw_len) = expanded?;

        ctx.segments.set_base(segment, dest)?;
        tracing::debug!(segment, addr = %dest, packed = comp_size, size = raw_len, "end decompress");
        Ok(dest)
    }

    fn expand_staged(
        &self,
        ctx: &mut MemoryContext,
        staging: VirtAddr,
        src: RomRange,
    ) -> RomResult<(VirtAddr, u32)> {
        let comp_size = self.dma_read(ctx.pool.ram_mut(), staging, src)?;
        let raw_len = compress::decompressed_len(ctx.pool.ram().bytes(staging, comp_size)?)?;
        tracing::debug!(rom = src.start, packed = comp_size, size = raw_len, "start decompress");

        let dest = ctx.pool.try_alloc_aligned(raw_len, 0)?;
        let (block, out) = ctx.pool.ram_mut().split_pair(staging, comp_size, dest, raw_len)?;
        compress::decompress_into(block, out)?;
        Ok((dest, raw_len))
    }

    /// Copies `src` to the fixed address `dest` and stops every region that
    /// contains the window from `dest` to the end of RAM at `dest`.
    ///
    /// The window is zeroed before the copy.
    ///
    /// # Errors
    ///
    /// Returns `DoesNotFit` when the data does not fit between `dest` and
    /// the end of RAM.
    pub fn load_to_fixed_pool_addr(
        &self,
        ctx: &mut MemoryContext,
        dest: VirtAddr,
        src: RomRange,
    ) -> RomResult<VirtAddr> {
        src.validate(&self.rom)?;
        let src_size = align16(src.len());
        let ram_end = ctx.pool.ram().end();
        let room = if dest >= ctx.pool.ram().start() && dest <= ram_end {
            ram_end.offset_from(dest)
        } else {
            0
        };
        if src_size > room {
            return Err(RomError::DoesNotFit { dest: dest.get(), size: src_size, room });
        }

        let shrunk = ctx.pool.reserve_tail(dest, room);
        let ram = ctx.pool.ram_mut();
        ram.zero(dest, room)?;
        self.dma_read(ram, dest, src)?;

        tracing::debug!(dest = %dest, size = src_size, regions_shrunk = shrunk, "fixed load");
        Ok(dest)
    }
}
