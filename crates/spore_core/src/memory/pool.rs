//! # Dynamic Pool
//!
//! Variable-size allocator for data that is allocated and freed in any order
//! (effects, bubbles, colored text).
//!
//! The pool owns one forward block of the main region. Free blocks form a
//! singly linked list kept in address order; each block starts with an
//! 8-byte `{next, size}` header stored in RAM, where `next` is an offset from
//! the pool base rather than a pointer.

use bytemuck::{Pod, Zeroable};
use spore_shared::constants::{align4, checked_align_up};

use super::ram::{Ram, VirtAddr};
use super::region::{Alignment, MainPool, MAIN_REGION};
use crate::error::{MemoryError, MemoryResult};

/// End of the free list.
const NIL: u32 = u32::MAX;

/// Bytes in front of every block.
const HEADER_SIZE: u32 = std::mem::size_of::<BlockHeader>() as u32;

#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
struct BlockHeader {
    /// Offset of the next free block, or `NIL`.
    next: u32,
    /// Block size including this header.
    size: u32,
}

/// A first-fit pool with coalescing free.
///
/// # Thread Safety
///
/// Not thread-safe. The pool only stores offsets; every operation takes the
/// RAM image it lives in.
///
/// # Example
///
/// ```rust,ignore
/// let mut effects = DynamicPool::init(&mut main_pool, 0x4000)?;
///
/// let bubble = effects.alloc(main_pool.ram_mut(), 48)?.expect("pool full");
/// effects.free(main_pool.ram_mut(), bubble)?;
/// ```
#[derive(Debug, Clone)]
pub struct DynamicPool {
    base: VirtAddr,
    total: u32,
    free_head: u32,
}

impl DynamicPool {
    /// Carves a pool of `ALIGN4(size)` bytes from the main region.
    ///
    /// # Errors
    ///
    /// Returns `OutOfMemory` when the main region cannot hold the pool.
    pub fn init(main: &mut MainPool, size: u32) -> MemoryResult<Self> {
        let total = align4(size);
        let base = main.try_alloc_forward(MAIN_REGION, total, Alignment::Disabled)?;
        let pool = Self::with_block(main.ram_mut(), base, total)?;

        tracing::debug!(base = %base, size = total, "dynamic pool initialized");
        Ok(pool)
    }

    /// Builds a pool over memory the caller already owns.
    ///
    /// # Errors
    ///
    /// Fails if the block leaves RAM.
    pub fn with_block(ram: &mut Ram, base: VirtAddr, size: u32) -> MemoryResult<Self> {
        let mut pool = Self {
            base,
            total: size,
            free_head: NIL,
        };
        if size > HEADER_SIZE {
            pool.write(ram, 0, BlockHeader { next: NIL, size })?;
            pool.free_head = 0;
        } else if !ram.contains(base, size) {
            return Err(MemoryError::OutOfBounds { addr: base.get(), len: size });
        }
        Ok(pool)
    }

    /// First address of the pool.
    #[inline]
    #[must_use]
    pub const fn base(&self) -> VirtAddr {
        self.base
    }

    /// Size of the pool in bytes, headers included.
    #[inline]
    #[must_use]
    pub const fn total_space(&self) -> u32 {
        self.total
    }

    fn read(&self, ram: &Ram, offset: u32) -> MemoryResult<BlockHeader> {
        ram.read_pod(self.base.add(offset))
    }

    fn write(&self, ram: &mut Ram, offset: u32, header: BlockHeader) -> MemoryResult<()> {
        ram.write_pod(self.base.add(offset), &header)
    }

    /// Points the link that precedes a block (the list head, or the `next`
    /// field of `prev`) at `target`.
    fn relink(&mut self, ram: &mut Ram, prev: Option<u32>, target: u32) -> MemoryResult<()> {
        match prev {
            None => self.free_head = target,
            Some(prev) => {
                let mut header = self.read(ram, prev)?;
                header.next = target;
                self.write(ram, prev, header)?;
            }
        }
        Ok(())
    }

    /// Allocates `size` bytes.
    ///
    /// Returns `Ok(None)` when no free block is large enough.
    ///
    /// # Errors
    ///
    /// Fails only if a block header points outside RAM.
    pub fn alloc(&mut self, ram: &mut Ram, size: u32) -> MemoryResult<Option<VirtAddr>> {
        let Some(needed) = checked_align_up(size, 4).and_then(|body| body.checked_add(HEADER_SIZE)) else {
            tracing::trace!(size, "dynamic pool request too large");
            return Ok(None);
        };
        let mut prev = None;
        let mut cursor = self.free_head;

        while cursor != NIL {
            let block = self.read(ram, cursor)?;
            if block.size >= needed {
                if block.size - needed <= HEADER_SIZE {
                    self.relink(ram, prev, block.next)?;
                } else {
                    let rest = cursor + needed;
                    self.write(ram, rest, BlockHeader { next: block.next, size: block.size - needed })?;
                    self.write(ram, cursor, BlockHeader { next: NIL, size: needed })?;
                    self.relink(ram, prev, rest)?;
                }
                return Ok(Some(self.base.add(cursor + HEADER_SIZE)));
            }
            prev = Some(cursor);
            cursor = block.next;
        }

        tracing::trace!(size, "dynamic pool exhausted");
        Ok(None)
    }

    /// Returns a block to the pool, merging it with adjacent free blocks.
    ///
    /// # Errors
    ///
    /// Returns `NotInPool` for addresses this pool never handed out,
    /// including blocks that are already free.
    pub fn free(&mut self, ram: &mut Ram, addr: VirtAddr) -> MemoryResult<()> {
        let not_in_pool = MemoryError::NotInPool { addr: addr.get() };
        let offset = addr
            .get()
            .checked_sub(self.base.get() + HEADER_SIZE)
            .filter(|off| off % 4 == 0 && *off < self.total)
            .ok_or(not_in_pool.clone())?;

        let mut block = self.read(ram, offset)?;
        if block.size < HEADER_SIZE || offset + block.size > self.total {
            return Err(not_in_pool);
        }

        // Neighbours in address order.
        let mut prev: Option<(u32, BlockHeader)> = None;
        let mut next = self.free_head;
        while next != NIL && next < offset {
            let header = self.read(ram, next)?;
            prev = Some((next, header));
            next = header.next;
        }
        let overlaps_prev = prev.is_some_and(|(p, h)| p + h.size > offset);
        if next == offset || overlaps_prev {
            return Err(not_in_pool);
        }

        block.next = next;
        if next != NIL && offset + block.size == next {
            let following = self.read(ram, next)?;
            block.size += following.size;
            block.next = following.next;
        }

        match prev {
            Some((p, mut header)) if p + header.size == offset => {
                header.size += block.size;
                header.next = block.next;
                self.write(ram, p, header)?;
            }
            _ => {
                self.write(ram, offset, block)?;
                self.relink(ram, prev.map(|(p, _)| p), offset)?;
            }
        }
        Ok(())
    }

    /// Walks the free list in address order.
    #[must_use]
    pub fn free_blocks<'a>(&'a self, ram: &'a Ram) -> FreeBlocks<'a> {
        FreeBlocks {
            pool: self,
            ram,
            cursor: self.free_head,
        }
    }

    /// Total bytes on the free list, headers included.
    #[must_use]
    pub fn free_space(&self, ram: &Ram) -> u32 {
        self.free_blocks(ram).map(|(_, size)| size).sum()
    }
}

/// Iterator over `(block address, block size)` of free blocks.
pub struct FreeBlocks<'a> {
    pool: &'a DynamicPool,
    ram: &'a Ram,
    cursor: u32,
}

impl Iterator for FreeBlocks<'_> {
    type Item = (VirtAddr, u32);

    fn next(&mut self) -> Option<Self::Item> {
        if self.cursor == NIL {
            return None;
        }
        let offset = self.cursor;
        let header = self.pool.read(self.ram, offset).ok()?;
        self.cursor = header.next;
        Some((self.pool.base.add(offset), header.size))
    }
}
