//! # Region Allocator
//!
//! The main pool: a set of regions that each grow inward from both ends.
//!
//! ```text
//!  region 0                                  region 1
//!  |+++++--------------------[hdr]###|       |++--------|
//!   ^    ^                    ^     ^
//!   |    start (forward)      end   freeable block
//!   forward allocation
//! ```
//!
//! Forward allocations have no overhead and are only released in bulk, by
//! restoring a state saved with `push_state`. Freeable allocations carry an
//! 8-byte header and are released most-recent-first.

use std::panic::Location;

use bytemuck::{Pod, Zeroable};
use spore_shared::constants::{align4, align_down, checked_align_up};

use super::ram::{Ram, VirtAddr};
use crate::error::{MemoryError, MemoryResult};

/// Regions a context can hold.
pub const MAX_REGIONS: usize = 4;

/// The region every un-targeted allocation comes from.
pub const MAIN_REGION: RegionId = RegionId(0);

/// Header magic of a freeable block ("AR", allocated from the right).
const FREEABLE_MAGIC: u16 = 0x4152;

/// Bytes in front of every freeable block.
pub const FREEABLE_HEADER_SIZE: u32 = std::mem::size_of::<FreeableHeader>() as u32;

/// Index of a region.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RegionId(pub usize);

/// Placement of a new block.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Alignment {
    /// Byte-exact placement at the cursor.
    Disabled,
    /// Align to a power of two. `To(0)` is the same as `Disabled`.
    To(u32),
}

impl Alignment {
    /// The power of two to align to, or `None` for byte-exact placement.
    ///
    /// # Errors
    ///
    /// Returns `BadAlignment` for a nonzero value that is not a power of two.
    pub fn resolve(self) -> MemoryResult<Option<u32>> {
        match self {
            Self::Disabled | Self::To(0 | 1) => Ok(None),
            Self::To(align) if align.is_power_of_two() => Ok(Some(align)),
            Self::To(align) => Err(MemoryError::BadAlignment(align)),
        }
    }
}

/// Alignment used by the `*_aligned` helpers when the caller passes `0`.
pub const DEFAULT_ALIGNMENT: u32 = 16;

/// What to do when a region is exhausted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AllocMode {
    /// Return nothing and let the caller fall back.
    Try,
    /// Abort: the memory budget is broken.
    Force,
}

/// Cursors of one region.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct Region {
    /// Forward cursor.
    pub start: u32,
    /// Freeable cursor.
    pub end: u32,
}

impl Region {
    /// Bytes between the cursors.
    #[inline]
    #[must_use]
    pub const fn free(&self) -> u32 {
        self.end - self.start
    }
}

/// Every region cursor. This is what `push_state` saves.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct PoolContext {
    /// Region cursors, unused slots stay zero.
    pub regions: [Region; MAX_REGIONS],
}

/// A saved context, stored in RAM and chained to the previous one.
#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
struct SavedState {
    ctx: PoolContext,
    /// Address of the previous record, `0` for none.
    prev: u32,
}

#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
struct FreeableHeader {
    magic: u16,
    region: u16,
    /// End cursor before this block was taken.
    saved_end: u32,
}

/// The main pool.
///
/// Owns the RAM image so that every header and snapshot the allocator writes
/// lands in the same memory the game sees.
///
/// # Thread Safety
///
/// Not reentrant. The simulation owns exactly one `MainPool`.
#[derive(Debug)]
pub struct MainPool {
    ram: Ram,
    ctx: PoolContext,
    region_count: usize,
    /// Most recently pushed state record.
    state_head: Option<VirtAddr>,
    state_depth: usize,
    default_alignment: u32,
}

impl MainPool {
    /// Creates a pool over the given `(start, end)` extents of `ram`.
    ///
    /// Starts are aligned up and ends aligned down to 4 bytes.
    ///
    /// # Errors
    ///
    /// Fails if there are no regions, more than [`MAX_REGIONS`], or an extent
    /// leaves RAM.
    pub fn new(ram: Ram, regions: &[(VirtAddr, VirtAddr)]) -> MemoryResult<Self> {
        if regions.is_empty() || regions.len() > MAX_REGIONS {
            return Err(MemoryError::TooManyRegions(regions.len()));
        }

        let mut ctx = PoolContext::default();
        for (slot, &(start, end)) in ctx.regions.iter_mut().zip(regions) {
            let aligned = Region {
                start: align4(start.get()),
                end: align_down(end.get(), 4),
            };
            let inside = aligned.start <= aligned.end
                && ram.contains(VirtAddr(aligned.start), aligned.end - aligned.start);
            if !inside {
                return Err(MemoryError::BadRegion { start: start.get(), end: end.get() });
            }
            *slot = aligned;
        }

        tracing::debug!(
            regions = regions.len(),
            available = ctx.regions.iter().map(Region::free).sum::<u32>(),
            "main pool initialized"
        );

        Ok(Self {
            ram,
            ctx,
            region_count: regions.len(),
            state_head: None,
            state_depth: 0,
            default_alignment: DEFAULT_ALIGNMENT,
        })
    }

    /// Sets the alignment the `*_aligned` helpers use for alignment `0`.
    ///
    /// # Errors
    ///
    /// Returns `BadAlignment` unless `alignment` is a nonzero power of two.
    pub fn set_default_alignment(&mut self, alignment: u32) -> MemoryResult<()> {
        if !alignment.is_power_of_two() {
            return Err(MemoryError::BadAlignment(alignment));
        }
        self.default_alignment = alignment;
        Ok(())
    }

    /// Alignment the `*_aligned` helpers use for alignment `0`.
    #[inline]
    #[must_use]
    pub const fn default_alignment(&self) -> u32 {
        self.default_alignment
    }

    /// The RAM image.
    #[inline]
    #[must_use]
    pub const fn ram(&self) -> &Ram {
        &self.ram
    }

    /// The RAM image, mutably.
    #[inline]
    pub fn ram_mut(&mut self) -> &mut Ram {
        &mut self.ram
    }

    /// Current cursors of every region.
    #[inline]
    #[must_use]
    pub const fn context(&self) -> PoolContext {
        self.ctx
    }

    /// Cursors of one region.
    #[must_use]
    pub fn region(&self, id: RegionId) -> Option<Region> {
        (id.0 < self.region_count).then(|| self.ctx.regions[id.0])
    }

    /// Number of configured regions.
    #[inline]
    #[must_use]
    pub const fn region_count(&self) -> usize {
        self.region_count
    }

    /// Number of states pushed and not yet popped.
    #[inline]
    #[must_use]
    pub const fn state_depth(&self) -> usize {
        self.state_depth
    }

    /// Sum of free bytes across all regions.
    ///
    /// Regions are not contiguous, so this is not the largest block that can
    /// be allocated.
    #[must_use]
    pub fn available(&self) -> u32 {
        self.ctx.regions[..self.region_count].iter().map(Region::free).sum()
    }

    fn region_mut(&mut self, id: RegionId) -> MemoryResult<&mut Region> {
        if id.0 >= self.region_count {
            return Err(MemoryError::InvalidRegion(id.0));
        }
        Ok(&mut self.ctx.regions[id.0])
    }

    // =========================================================================
    // FORWARD ALLOCATION
    // =========================================================================

    /// Takes `size` bytes from the forward end of `region`.
    ///
    /// # Errors
    ///
    /// Returns `OutOfMemory` if the region is exhausted and `BadAlignment`
    /// for an alignment that is not a power of two.
    pub fn try_alloc_forward(
        &mut self,
        region: RegionId,
        size: u32,
        alignment: Alignment,
    ) -> MemoryResult<VirtAddr> {
        let align = alignment.resolve()?;
        let r = self.region_mut(region)?;
        let ret = match align {
            None => Some(r.start),
            Some(align) => checked_align_up(r.start, align),
        };
        let new_start = ret.and_then(|ret| ret.checked_add(size));

        match (ret, new_start) {
            (Some(ret), Some(new_start)) if new_start <= r.end => {
                r.start = new_start;
                Ok(VirtAddr(ret))
            }
            _ => Err(MemoryError::OutOfMemory {
                region: region.0,
                size,
                freeable: false,
                start: r.start,
                end: r.end,
            }),
        }
    }

    /// Takes `size` bytes from the forward end of `region`.
    ///
    /// In [`AllocMode::Try`] exhaustion yields `None`. In
    /// [`AllocMode::Force`] it aborts, reporting the region, the size and the
    /// caller.
    #[track_caller]
    pub fn alloc_forward(
        &mut self,
        region: RegionId,
        size: u32,
        alignment: Alignment,
        mode: AllocMode,
    ) -> Option<VirtAddr> {
        match (self.try_alloc_forward(region, size, alignment), mode) {
            (Ok(addr), _) => Some(addr),
            (Err(_), AllocMode::Try) => None,
            (Err(err), AllocMode::Force) => alloc_failed(&err),
        }
    }

    /// `main_pool_alloc`: `ALIGN4(size)` bytes from the main region, forced.
    #[track_caller]
    pub fn alloc(&mut self, size: u32) -> VirtAddr {
        match self.try_alloc_forward(MAIN_REGION, align4(size), Alignment::Disabled) {
            Ok(addr) => addr,
            Err(err) => alloc_failed(&err),
        }
    }

    /// Tries `region` first and falls back to the main region in force mode.
    #[track_caller]
    pub fn alloc_ex(&mut self, region: RegionId, size: u32, alignment: Alignment) -> VirtAddr {
        if region != MAIN_REGION {
            if let Ok(addr) = self.try_alloc_forward(region, size, alignment) {
                return addr;
            }
        }
        match self.try_alloc_forward(MAIN_REGION, size, alignment) {
            Ok(addr) => addr,
            Err(err) => alloc_failed(&err),
        }
    }

    /// Aligned forward allocation from the main region. `alignment == 0`
    /// means the default alignment (16 unless configured otherwise).
    ///
    /// # Errors
    ///
    /// Returns `OutOfMemory` if the main region is exhausted and
    /// `BadAlignment` for an alignment that is not a power of two.
    pub fn try_alloc_aligned(&mut self, size: u32, alignment: u32) -> MemoryResult<VirtAddr> {
        let alignment = if alignment == 0 { self.default_alignment } else { alignment };
        self.try_alloc_forward(MAIN_REGION, align4(size), Alignment::To(alignment))
    }

    // =========================================================================
    // FREEABLE ALLOCATION
    // =========================================================================

    /// Takes `size` bytes from the freeable end of `region`, writing a header
    /// immediately before the returned address.
    ///
    /// # Errors
    ///
    /// Returns `OutOfMemory` if the region is exhausted and `BadAlignment`
    /// for an alignment that is not a power of two.
    pub fn try_alloc_freeable(
        &mut self,
        region: RegionId,
        size: u32,
        alignment: Alignment,
    ) -> MemoryResult<VirtAddr> {
        let align = alignment.resolve()?;
        let r = *self.region_mut(region)?;
        let out_of_memory = MemoryError::OutOfMemory {
            region: region.0,
            size,
            freeable: true,
            start: r.start,
            end: r.end,
        };

        let data = r.end.checked_sub(size).map(|below| match align {
            None => below,
            Some(align) => align_down(below, align),
        });
        let header_addr = data
            .and_then(|data| data.checked_sub(FREEABLE_HEADER_SIZE))
            .filter(|&new_end| new_end >= r.start)
            .ok_or(out_of_memory)?;

        let header = FreeableHeader {
            magic: FREEABLE_MAGIC,
            region: region.0 as u16,
            saved_end: r.end,
        };
        self.ram.write_pod(VirtAddr(header_addr), &header)?;
        self.region_mut(region)?.end = header_addr;

        Ok(VirtAddr(header_addr + FREEABLE_HEADER_SIZE))
    }

    /// Takes `size` bytes from the freeable end of `region`.
    ///
    /// Same failure semantics as [`MainPool::alloc_forward`].
    #[track_caller]
    pub fn alloc_freeable(
        &mut self,
        region: RegionId,
        size: u32,
        alignment: Alignment,
        mode: AllocMode,
    ) -> Option<VirtAddr> {
        match (self.try_alloc_freeable(region, size, alignment), mode) {
            (Ok(addr), _) => Some(addr),
            (Err(_), AllocMode::Try) => None,
            (Err(err), AllocMode::Force) => alloc_failed(&err),
        }
    }

    /// `main_pool_alloc_aligned_freeable`: a freeable buffer of
    /// `ALIGN4(size)` bytes from the main region. `alignment == 0` means the
    /// default alignment.
    ///
    /// # Errors
    ///
    /// Returns `OutOfMemory` if the main region is exhausted and
    /// `BadAlignment` for an alignment that is not a power of two.
    pub fn try_alloc_aligned_freeable(&mut self, size: u32, alignment: u32) -> MemoryResult<VirtAddr> {
        let alignment = if alignment == 0 { self.default_alignment } else { alignment };
        self.try_alloc_freeable(MAIN_REGION, align4(size), Alignment::To(alignment))
    }

    /// Releases a freeable block, and with it every freeable block taken from
    /// the same region after it.
    ///
    /// Returns the number of bytes returned to the region.
    ///
    /// # Errors
    ///
    /// - `CorruptHeader` if the header magic is wrong (bad pointer or
    ///   overwritten header)
    /// - `StaleFreeable` if the block was already released
    pub fn free_freeable(&mut self, addr: VirtAddr) -> MemoryResult<u32> {
        let header_addr = addr
            .get()
            .checked_sub(FREEABLE_HEADER_SIZE)
            .map(VirtAddr)
            .ok_or(MemoryError::CorruptHeader { addr: addr.get(), magic: 0 })?;
        let header: FreeableHeader = self.ram.read_pod(header_addr)?;
        if header.magic != FREEABLE_MAGIC {
            return Err(MemoryError::CorruptHeader { addr: addr.get(), magic: header.magic });
        }

        let region = self.region_mut(RegionId(usize::from(header.region)))?;
        if header_addr.get() < region.end || header.saved_end < header_addr.get() {
            return Err(MemoryError::StaleFreeable { addr: addr.get() });
        }

        let newer = header_addr.get() - region.end;
        let released = header.saved_end - region.end;
        region.end = header.saved_end;

        if newer > 0 {
            tracing::warn!(
                addr = %addr,
                newer_bytes = newer,
                "freeable block released out of order, newer blocks released with it"
            );
        }
        Ok(released)
    }

    /// `main_pool_free`: releases a freeable block, treating any misuse as
    /// fatal.
    ///
    /// # Panics
    ///
    /// Panics on a corrupt header or a double free.
    #[track_caller]
    pub fn free(&mut self, addr: VirtAddr) {
        if let Err(err) = self.free_freeable(addr) {
            let caller = Location::caller();
            tracing::error!(%err, file = caller.file(), line = caller.line(), "invalid free");
            panic!("{err} (at {caller})");
        }
    }

    // =========================================================================
    // STATE
    // =========================================================================

    /// Saves every region cursor.
    ///
    /// The record is allocated from the main region after the snapshot was
    /// taken, so popping the state also releases the record.
    #[track_caller]
    pub fn push_state(&mut self) {
        let record = SavedState {
            ctx: self.ctx,
            prev: self.state_head.map_or(0, VirtAddr::get),
        };
        let addr = self.alloc(std::mem::size_of::<SavedState>() as u32);
        if let Err(err) = self.ram.write_pod(addr, &record) {
            alloc_failed(&err);
        }
        self.state_head = Some(addr);
        self.state_depth += 1;
        tracing::trace!(depth = self.state_depth, available = self.available(), "pool state pushed");
    }

    /// Restores the cursors saved by the most recent `push_state`.
    ///
    /// # Errors
    ///
    /// Returns `StateUnderflow` if nothing was pushed.
    pub fn pop_state(&mut self) -> MemoryResult<()> {
        let head = self.state_head.ok_or(MemoryError::StateUnderflow)?;
        let record: SavedState = self.ram.read_pod(head)?;
        self.ctx = record.ctx;
        self.state_head = (record.prev != 0).then_some(VirtAddr(record.prev));
        self.state_depth -= 1;
        tracing::trace!(depth = self.state_depth, available = self.available(), "pool state popped");
        Ok(())
    }

    // =========================================================================
    // FIXED PLACEMENT
    // =========================================================================

    /// Stops every region that fully contains `[dest, dest + len)` at `dest`,
    /// so nothing is handed out over a fixed-address load.
    ///
    /// Returns how many regions were shrunk.
    pub fn reserve_tail(&mut self, dest: VirtAddr, len: u32) -> usize {
        let window_end = dest.get().saturating_add(len);
        let mut shrunk = 0;
        for region in &mut self.ctx.regions[..self.region_count] {
            if region.start <= dest.get() && window_end <= region.end {
                region.end = dest.get();
                shrunk += 1;
            }
        }
        shrunk
    }
}

/// Reports a broken memory budget and aborts.
#[cold]
#[track_caller]
fn alloc_failed(err: &MemoryError) -> ! {
    let caller = Location::caller();
    tracing::error!(%err, file = caller.file(), line = caller.line(), "forced allocation failed");
    panic!("{err} (at {caller})");
}

#[cfg(test)]
mod tests {
    use super::*;

    const POOL_START: u32 = 0x8000_1000;
    const POOL_END: u32 = 0x8000_9000;

    fn pool() -> MainPool {
        MainPool::new(Ram::new(0x10000), &[(VirtAddr(POOL_START), VirtAddr(POOL_END))]).unwrap()
    }

    fn two_region_pool() -> MainPool {
        MainPool::new(
            Ram::new(0x10000),
            &[
                (VirtAddr(POOL_START), VirtAddr(POOL_END)),
                (VirtAddr(0x8000_A000), VirtAddr(0x8000_A100)),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_forward_allocation_bounds() {
        let mut pool = pool();
        let p = pool.try_alloc_forward(MAIN_REGION, 100, Alignment::Disabled).unwrap();
        assert_eq!(p.get(), POOL_START);
        let q = pool.try_alloc_forward(MAIN_REGION, 8, Alignment::Disabled).unwrap();
        assert_eq!(q.get(), POOL_START + 100);

        let r = pool.try_alloc_forward(MAIN_REGION, 16, Alignment::To(16)).unwrap();
        assert_eq!(r.get(), spore_shared::constants::align_up(POOL_START + 108, 16));
        assert!(r.get() + 16 <= POOL_END);
    }

    #[test]
    fn test_zero_alignment_is_byte_exact() {
        let mut pool = pool();
        pool.try_alloc_forward(MAIN_REGION, 3, Alignment::Disabled).unwrap();
        let p = pool.try_alloc_forward(MAIN_REGION, 16, Alignment::To(0)).unwrap();
        assert_eq!(p.get(), POOL_START + 3);
        assert_eq!(pool.region(MAIN_REGION).unwrap().start, POOL_START + 19);

        let before = pool.region(MAIN_REGION).unwrap();
        let block = pool.try_alloc_freeable(MAIN_REGION, 10, Alignment::To(0)).unwrap();
        assert_eq!(block.get(), before.end - 10);
    }

    #[test]
    fn test_non_power_of_two_alignment_rejected() {
        let mut pool = pool();
        let before = pool.context();
        assert_eq!(
            pool.try_alloc_forward(MAIN_REGION, 16, Alignment::To(24)),
            Err(MemoryError::BadAlignment(24))
        );
        assert_eq!(
            pool.try_alloc_freeable(MAIN_REGION, 16, Alignment::To(3)),
            Err(MemoryError::BadAlignment(3))
        );
        assert_eq!(pool.try_alloc_aligned(16, 48), Err(MemoryError::BadAlignment(48)));
        assert_eq!(pool.context(), before);
    }

    #[test]
    fn test_alignment_overflow_is_out_of_memory() {
        let mut pool = MainPool::new(Ram::new(0x10000), &[(VirtAddr(0x8000_0004), VirtAddr(0x8000_0100))]).unwrap();
        assert!(matches!(
            pool.try_alloc_forward(MAIN_REGION, 4, Alignment::To(0x8000_0000)),
            Err(MemoryError::OutOfMemory { .. })
        ));
    }

    #[test]
    fn test_default_alignment_is_configurable() {
        let mut pool = pool();
        pool.try_alloc_forward(MAIN_REGION, 4, Alignment::Disabled).unwrap();
        assert_eq!(pool.try_alloc_aligned(8, 0).unwrap().get() % 16, 0);

        pool.set_default_alignment(0x100).unwrap();
        assert_eq!(pool.default_alignment(), 0x100);
        assert_eq!(pool.try_alloc_aligned(8, 0).unwrap().get() % 0x100, 0);
        let buffer = pool.try_alloc_aligned_freeable(8, 0).unwrap();
        assert_eq!(buffer.get() % 0x100, 0);

        assert_eq!(pool.set_default_alignment(0), Err(MemoryError::BadAlignment(0)));
        assert_eq!(pool.set_default_alignment(12), Err(MemoryError::BadAlignment(12)));
    }

    #[test]
    fn test_forward_exhaustion_try_mode() {
        let mut pool = pool();
        let all = pool.available();
        assert!(pool.alloc_forward(MAIN_REGION, all, Alignment::Disabled, AllocMode::Try).is_some());
        assert_eq!(pool.available(), 0);
        assert!(pool.alloc_forward(MAIN_REGION, 1, Alignment::Disabled, AllocMode::Try).is_none());
        assert!(matches!(
            pool.try_alloc_forward(MAIN_REGION, 1, Alignment::Disabled),
            Err(MemoryError::OutOfMemory { region: 0, size: 1, freeable: false, .. })
        ));
    }

    #[test]
    #[should_panic(expected = "alloc failed for 65536 bytes in region 0")]
    fn test_forward_exhaustion_force_mode_is_fatal() {
        let mut pool = pool();
        let _ = pool.alloc_forward(MAIN_REGION, 0x10000, Alignment::Disabled, AllocMode::Force);
    }

    #[test]
    fn test_freeable_round_trip_restores_end() {
        let mut pool = pool();
        let before = pool.region(MAIN_REGION).unwrap();
        let block = pool.try_alloc_freeable(MAIN_REGION, 40, Alignment::Disabled).unwrap();
        assert_eq!(block.get(), POOL_END - 40);
        assert_eq!(pool.region(MAIN_REGION).unwrap().end, POOL_END - 40 - FREEABLE_HEADER_SIZE);

        assert_eq!(pool.free_freeable(block).unwrap(), 40 + FREEABLE_HEADER_SIZE);
        assert_eq!(pool.region(MAIN_REGION).unwrap(), before);
    }

    #[test]
    fn test_freeable_alignment() {
        let mut pool = pool();
        let block = pool.try_alloc_freeable(MAIN_REGION, 10, Alignment::To(64)).unwrap();
        assert_eq!(block.get() % 64, 0);
        assert!(block.get() + 10 <= POOL_END);
    }

    #[test]
    fn test_free_older_block_releases_newer() {
        let mut pool = pool();
        let before = pool.region(MAIN_REGION).unwrap();
        let older = pool.try_alloc_freeable(MAIN_REGION, 32, Alignment::Disabled).unwrap();
        let newer = pool.try_alloc_freeable(MAIN_REGION, 32, Alignment::Disabled).unwrap();

        pool.free_freeable(older).unwrap();
        assert_eq!(pool.region(MAIN_REGION).unwrap(), before);
        assert_eq!(pool.free_freeable(newer), Err(MemoryError::StaleFreeable { addr: newer.get() }));
    }

    #[test]
    fn test_double_free_is_detected() {
        let mut pool = pool();
        let block = pool.try_alloc_freeable(MAIN_REGION, 16, Alignment::Disabled).unwrap();
        pool.free_freeable(block).unwrap();
        assert!(matches!(pool.free_freeable(block), Err(MemoryError::StaleFreeable { .. })));
    }

    #[test]
    fn test_bad_magic_is_corruption() {
        let mut pool = pool();
        let forward = pool.try_alloc_forward(MAIN_REGION, 64, Alignment::Disabled).unwrap();
        assert!(matches!(
            pool.free_freeable(forward.add(16)),
            Err(MemoryError::CorruptHeader { magic: 0, .. })
        ));
    }

    #[test]
    #[should_panic(expected = "incorrect magic")]
    fn test_fatal_free_panics() {
        let mut pool = pool();
        let forward = pool.try_alloc_forward(MAIN_REGION, 64, Alignment::Disabled).unwrap();
        pool.free(forward.add(16));
    }

    #[test]
    fn test_freeable_and_forward_meet() {
        let mut pool = pool();
        let total = pool.available();
        pool.try_alloc_freeable(MAIN_REGION, total - FREEABLE_HEADER_SIZE - 16, Alignment::Disabled)
            .unwrap();
        assert_eq!(pool.available(), 16);
        assert!(pool.try_alloc_forward(MAIN_REGION, 17, Alignment::Disabled).is_err());
        assert!(pool.try_alloc_forward(MAIN_REGION, 16, Alignment::Disabled).is_ok());
    }

    #[test]
    fn test_nested_push_pop_restores_cursors() {
        let mut pool = two_region_pool();
        let initial = pool.context();

        pool.push_state();
        pool.alloc(100);
        let _ = pool.try_alloc_freeable(RegionId(1), 16, Alignment::Disabled).unwrap();
        let outer = pool.context();

        pool.push_state();
        pool.alloc(300);
        let _ = pool.try_alloc_freeable(MAIN_REGION, 64, Alignment::Disabled).unwrap();
        let _ = pool.try_alloc_forward(RegionId(1), 8, Alignment::Disabled).unwrap();
        assert_eq!(pool.state_depth(), 2);

        pool.pop_state().unwrap();
        assert_eq!(pool.context(), outer);
        pool.pop_state().unwrap();
        assert_eq!(pool.context(), initial);
        assert_eq!(pool.pop_state(), Err(MemoryError::StateUnderflow));
    }

    #[test]
    fn test_alloc_ex_falls_back_to_main() {
        let mut pool = two_region_pool();
        let cold = pool.alloc_ex(RegionId(1), 0x80, Alignment::Disabled);
        assert_eq!(cold.get(), 0x8000_A000);
        let fallback = pool.alloc_ex(RegionId(1), 0x100, Alignment::Disabled);
        assert_eq!(fallback.get(), POOL_START);
    }

    #[test]
    fn test_available_sums_regions() {
        let pool = two_region_pool();
        assert_eq!(pool.available(), (POOL_END - POOL_START) + 0x100);
    }

    #[test]
    fn test_invalid_regions_rejected() {
        assert!(MainPool::new(Ram::new(0x100), &[]).is_err());
        assert!(matches!(
            MainPool::new(Ram::new(0x100), &[(VirtAddr(0x8000_0000), VirtAddr(0x8000_0200))]),
            Err(MemoryError::BadRegion { .. })
        ));
        let mut pool = pool();
        assert_eq!(
            pool.try_alloc_forward(RegionId(3), 4, Alignment::Disabled),
            Err(MemoryError::InvalidRegion(3))
        );
    }

    #[test]
    fn test_reserve_tail_shrinks_containing_region() {
        let mut pool = two_region_pool();
        let dest = VirtAddr(0x8000_8000);
        assert_eq!(pool.reserve_tail(dest, 0x1000), 1);
        assert_eq!(pool.region(MAIN_REGION).unwrap().end, dest.get());
        assert_eq!(pool.region(RegionId(1)).unwrap().end, 0x8000_A100);
    }
}
