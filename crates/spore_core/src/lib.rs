//! # SPORE Core
//!
//! The memory system of a fixed-RAM console, rebuilt around an explicit
//! context object instead of globals:
//! - One RAM image, addressed with KSEG0 virtual addresses
//! - A two-sided region allocator that backs all level storage
//! - A first-fit dynamic pool for effects with unpredictable lifetimes
//! - A segment table for position-independent asset pointers
//! - A ROM loader that streams raw or compressed blocks into the pool
//!
//! ## Architecture Rules
//!
//! 1. **Every byte lives in RAM** - allocator headers, pool headers and
//!    allocator snapshots are written into the RAM image itself
//! 2. **Forced allocations never fail quietly** - running out of a region in
//!    force mode is a memory budget bug and aborts with the call site
//! 3. **Loads are synchronous** - a ROM transfer blocks until complete
//!
//! ## Example
//!
//! ```rust,ignore
//! use spore_core::{MemoryContext, RomImage, RomLoader, RomRange};
//! use spore_shared::MemoryConfig;
//!
//! let config = MemoryConfig::default();
//! let mut ctx = MemoryContext::new(&config)?;
//! let loader = RomLoader::new(RomImage::new(rom_bytes), &config);
//!
//! ctx.pool.push_state();
//! loader.load_segment(&mut ctx, 0x07, RomRange::new(0x1000, 0x8000), None)?;
//! // ... level runs ...
//! ctx.pool.pop_state()?;
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod context;
pub mod error;
pub mod memory;
pub mod rom;
pub mod segment;

pub use context::MemoryContext;
pub use error::{MemoryError, MemoryResult, RomError, RomResult};
pub use memory::{
    AllocMode, Alignment, DynamicPool, FreeBlocks, MainPool, PoolContext, Region, RegionId, Ram, VirtAddr,
    MAIN_REGION, MAX_REGIONS,
};
pub use rom::{
    compress_segment, DmaHandlerList, DmaTable, OffsetSizePair, RomImage, RomLoader, RomRange,
    RomSource, TlbEntry, TlbMap,
};
pub use segment::{SegmentTable, SegmentedAddr};
