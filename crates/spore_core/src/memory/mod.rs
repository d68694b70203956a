//! # Memory Management
//!
//! The RAM image and the allocators carved out of it.
//!
//! ## Design Philosophy
//!
//! RAM is one fixed block. At startup it is split into regions; after that:
//! - Level data comes from the forward end of a region and is released in
//!   bulk with `pop_state`
//! - Temporary buffers come from the freeable end and are released LIFO
//! - Effects with unpredictable lifetimes use a `DynamicPool` carved from the
//!   forward end

mod pool;
mod ram;
mod region;

pub use pool::{DynamicPool, FreeBlocks};
pub use ram::{Ram, VirtAddr};
pub use region::{
    AllocMode, Alignment, MainPool, PoolContext, Region, RegionId, FREEABLE_HEADER_SIZE,
    MAIN_REGION, MAX_REGIONS,
};
