//! # Level Loading
//!
//! A level is a set of ROM segments plus a pointer, into one of them, to the
//! level's collision data. Loading pushes the allocator state, streams the
//! segments, decodes the collision data straight out of the RAM image and
//! rebuilds the collision world. Unloading pops the state, which releases
//! every segment at once.
//!
//! ## Lifecycle
//!
//! ```text
//! push_state ─► load segments ─► resolve collision ─► parse ─► load_level
//!     ▲                                                             │
//!     └──────────────────── pop_state ◄── unload ◄──────────────────┘
//! ```
//!
//! A failure anywhere before `load_level` pops the state again and leaves the
//! collision world untouched.

use spore_collision::{
    parse_level_collision, words_from_be_bytes, CollisionDataError, CollisionWorld, ObjectSpawn,
};
use spore_core::{
    MemoryContext, MemoryError, RomError, RomLoader, RomRange, RomSource, SegmentedAddr, VirtAddr,
};
use spore_shared::MemoryConfig;
use thiserror::Error;

/// Errors raised while loading or unloading a level.
#[derive(Error, Debug)]
pub enum LevelError {
    /// Allocator, RAM or segment table failure.
    #[error(transparent)]
    Memory(#[from] MemoryError),

    /// ROM streaming failure.
    #[error(transparent)]
    Rom(#[from] RomError),

    /// The collision data does not decode.
    #[error("level collision: {0}")]
    Collision(#[from] CollisionDataError),

    /// `unload` without a loaded level.
    #[error("no level is loaded")]
    NotLoaded,

    /// `load` while another level is still loaded.
    #[error("level '{0}' is still loaded")]
    AlreadyLoaded(String),
}

/// Result type for level operations.
pub type LevelResult<T> = Result<T, LevelError>;

// =============================================================================
// MANIFEST
// =============================================================================

/// How a segment is stored in ROM.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SegmentKind {
    /// Copied as is.
    Raw,
    /// Copied as is, followed by a zeroed bss range.
    Bss(RomRange),
    /// A compressed block expanded on load.
    Compressed,
}

/// One segment of a level.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SegmentLoad {
    /// Segment to bind.
    pub segment: u8,
    /// Bytes in ROM.
    pub rom: RomRange,
    /// Storage format.
    pub kind: SegmentKind,
}

impl SegmentLoad {
    /// A plain segment.
    #[inline]
    #[must_use]
    pub const fn raw(segment: u8, rom: RomRange) -> Self {
        Self { segment, rom, kind: SegmentKind::Raw }
    }

    /// A compressed segment.
    #[inline]
    #[must_use]
    pub const fn compressed(segment: u8, rom: RomRange) -> Self {
        Self { segment, rom, kind: SegmentKind::Compressed }
    }
}

/// Location of a block of data inside a loaded segment.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DataRef {
    /// Segmented address of the first byte.
    pub addr: SegmentedAddr,
    /// Length in bytes.
    pub len: u32,
}

/// Everything needed to bring a level into memory.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LevelManifest {
    /// Name used in logs.
    pub name: String,
    /// Segments, loaded in order.
    pub segments: Vec<SegmentLoad>,
    /// Collision command stream.
    pub collision: DataRef,
    /// Optional room table, one signed byte per collision triangle.
    pub rooms: Option<DataRef>,
}

/// Summary of a loaded level.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoadedLevel {
    /// Name from the manifest.
    pub name: String,
    /// Base address bound to each segment, in load order.
    pub segment_bases: Vec<(u8, VirtAddr)>,
    /// Static surfaces in the collision world.
    pub surfaces: usize,
    /// Object spawns found in the collision data.
    pub objects: Vec<ObjectSpawn>,
}

// =============================================================================
// LOADER
// =============================================================================

/// Loads and unloads levels from a ROM source.
pub struct LevelLoader<R: RomSource> {
    rom: RomLoader<R>,
    current: Option<String>,
}

impl<R: RomSource> LevelLoader<R> {
    /// Creates a loader over `rom`.
    #[must_use]
    pub fn new(rom: R, config: &MemoryConfig) -> Self {
        Self { rom: RomLoader::new(rom, config), current: None }
    }

    /// The underlying ROM loader.
    #[inline]
    #[must_use]
    pub fn rom(&self) -> &RomLoader<R> {
        &self.rom
    }

    /// Name of the loaded level, if any.
    #[inline]
    #[must_use]
    pub fn current(&self) -> Option<&str> {
        self.current.as_deref()
    }

    /// Loads `manifest` and rebuilds `world` from its collision data.
    ///
    /// # Errors
    ///
    /// Fails if a level is already loaded, a segment does not load, the
    /// collision pointer does not resolve into RAM, or the collision data
    /// does not decode. On failure the allocator state is restored and
    /// `world` is unchanged.
    pub fn load(
        &mut self,
        ctx: &mut MemoryContext,
        world: &mut CollisionWorld,
        manifest: &LevelManifest,
    ) -> LevelResult<LoadedLevel> {
        if let Some(name) = &self.current {
            return Err(LevelError::AlreadyLoaded(name.clone()));
        }

        ctx.pool.push_state();
        let loaded = match self.load_pushed(ctx, world, manifest) {
            Ok(loaded) => loaded,
            Err(err) => {
                tracing::warn!(level = %manifest.name, error = %err, "level load failed, rolling back");
                ctx.pool.pop_state()?;
                return Err(err);
            }
        };

        tracing::info!(
            level = %manifest.name,
            segments = loaded.segment_bases.len(),
            surfaces = loaded.surfaces,
            objects = loaded.objects.len(),
            available = ctx.pool.available(),
            "level loaded"
        );
        self.current = Some(manifest.name.clone());
        Ok(loaded)
    }

    fn load_pushed(
        &self,
        ctx: &mut MemoryContext,
        world: &mut CollisionWorld,
        manifest: &LevelManifest,
    ) -> LevelResult<LoadedLevel> {
        let mut segment_bases = Vec::with_capacity(manifest.segments.len());
        for load in &manifest.segments {
            let base = match load.kind {
                SegmentKind::Raw => self.rom.load_segment(ctx, load.segment, load.rom, None)?,
                SegmentKind::Bss(bss) => self.rom.load_segment(ctx, load.segment, load.rom, Some(bss))?,
                SegmentKind::Compressed => self.rom.load_segment_decompress(ctx, load.segment, load.rom)?,
            };
            segment_bases.push((load.segment, base));
        }

        let words = words_from_be_bytes(read_data(ctx, manifest.collision)?);
        let rooms: Option<Vec<i8>> = match manifest.rooms {
            Some(rooms) => Some(read_data(ctx, rooms)?.iter().map(|&b| b as i8).collect()),
            None => None,
        };
        let mut level = parse_level_collision(&words, rooms.as_deref())?;

        let objects = std::mem::take(&mut level.objects);
        let surfaces = world.load_level(level);
        Ok(LoadedLevel { name: manifest.name.clone(), segment_bases, surfaces, objects })
    }

    /// Releases the loaded level's memory and empties `world`.
    ///
    /// # Errors
    ///
    /// Returns `NotLoaded` without a loaded level, or the allocator error if
    /// the saved state cannot be restored.
    pub fn unload(&mut self, ctx: &mut MemoryContext, world: &mut CollisionWorld) -> LevelResult<()> {
        let name = self.current.take().ok_or(LevelError::NotLoaded)?;
        ctx.pool.pop_state()?;
        world.clear();
        tracing::info!(level = %name, available = ctx.pool.available(), "level unloaded");
        Ok(())
    }
}

fn read_data(ctx: &MemoryContext, data: DataRef) -> LevelResult<&[u8]> {
    let addr = data.addr.resolve(&ctx.segments)?;
    Ok(ctx.pool.ram().bytes(addr, data.len)?)
}
