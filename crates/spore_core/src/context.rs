//! # Memory Context
//!
//! Everything the memory system used to keep in globals, gathered into one
//! value that is passed to whoever needs it.

use spore_shared::{ConfigError, MemoryConfig};

use crate::error::{MemoryError, MemoryResult};
use crate::memory::{DynamicPool, MainPool, Ram, VirtAddr};
use crate::rom::TlbMap;
use crate::segment::SegmentTable;

/// The console memory system.
#[derive(Debug)]
pub struct MemoryContext {
    /// Main pool, which owns the RAM image.
    pub pool: MainPool,
    /// Segment bases.
    pub segments: SegmentTable,
    /// Page mappings of segments loaded with bss.
    pub tlb: TlbMap,
    /// Effects pool, once initialized.
    pub effects: Option<DynamicPool>,
    config: MemoryConfig,
}

impl MemoryContext {
    /// Creates a context whose single region spans from `pool_start` to the
    /// end of RAM.
    ///
    /// # Errors
    ///
    /// Fails with `BadConfig` if the configuration does not validate, or if
    /// `pool_start` lies outside RAM.
    pub fn new(config: &MemoryConfig) -> MemoryResult<Self> {
        check_config(config)?;
        let ram = Ram::new(config.ram_size);
        let region = (VirtAddr::from_physical(config.pool_start), ram.end());
        Self::with_regions(config, ram, &[region])
    }

    /// Creates a context over explicit regions.
    ///
    /// # Errors
    ///
    /// Fails with `BadConfig` if the configuration does not validate, and
    /// otherwise as [`MainPool::new`].
    pub fn with_regions(
        config: &MemoryConfig,
        ram: Ram,
        regions: &[(VirtAddr, VirtAddr)],
    ) -> MemoryResult<Self> {
        check_config(config)?;
        let mut pool = MainPool::new(ram, regions)?;
        pool.set_default_alignment(config.default_alignment)?;
        tracing::info!(
            ram_size = config.ram_size,
            regions = regions.len(),
            available = pool.available(),
            "memory context created"
        );
        Ok(Self {
            pool,
            segments: SegmentTable::new(),
            tlb: TlbMap::new(config.tlb_page_size),
            effects: None,
            config: config.clone(),
        })
    }

    /// Configuration the context was built from.
    #[inline]
    #[must_use]
    pub const fn config(&self) -> &MemoryConfig {
        &self.config
    }

    /// Carves the effects pool from the main region.
    ///
    /// # Errors
    ///
    /// Returns `OutOfMemory` if the main region cannot hold it.
    pub fn init_effects_pool(&mut self) -> MemoryResult<()> {
        let pool = DynamicPool::init(&mut self.pool, self.config.effects_pool_size)?;
        self.effects = Some(pool);
        Ok(())
    }

    /// Allocates from the effects pool. `Ok(None)` when the pool is full.
    ///
    /// # Errors
    ///
    /// Returns `NotInPool` if the effects pool was never initialized.
    pub fn alloc_effect(&mut self, size: u32) -> MemoryResult<Option<VirtAddr>> {
        let effects = self.effects.as_mut().ok_or(MemoryError::NotInPool { addr: 0 })?;
        effects.alloc(self.pool.ram_mut(), size)
    }

    /// Releases an effects allocation.
    ///
    /// # Errors
    ///
    /// Returns `NotInPool` if the address is not a live effects block.
    pub fn free_effect(&mut self, addr: VirtAddr) -> MemoryResult<()> {
        let effects = self
            .effects
            .as_mut()
            .ok_or(MemoryError::NotInPool { addr: addr.get() })?;
        effects.free(self.pool.ram_mut(), addr)
    }
}

fn check_config(config: &MemoryConfig) -> MemoryResult<()> {
    config.validate().map_err(|err| match err {
        ConfigError::Invalid { field, reason } => MemoryError::BadConfig { field, reason },
        other => MemoryError::BadConfig { field: "memory", reason: other.to_string() },
    })
}
