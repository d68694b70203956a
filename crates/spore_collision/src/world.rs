//! # Collision World
//!
//! The query front end. A [`CollisionWorld`] owns the surface grid, the
//! environment regions of the current level and the latched query flags.
//!
//! ## Flags
//!
//! Actor code sets modifiers with [`CollisionWorld::set_query_flags`] right
//! before a query; the floor, ceiling and wall queries consume them.
//! [`QueryFlags::CAMERA`] survives until [`CollisionWorld::clear_query_flags`].
//! Every query also has a `*_with` form that takes the flags explicitly
//! and only needs `&self`, for callers sharing the world across threads.
//!
//! ## Misses
//!
//! No surface, or a point outside the level square, is `None`. Nothing here
//! returns an error.

use std::sync::atomic::{AtomicU64, Ordering};

use spore_shared::{CollisionConfig, Vec3, Vec3i};

use crate::ceil::{scan_ceilings, scan_segment, LateralRules, RayHit};
use crate::environment::{region_level, EnvironmentRegion};
use crate::flags::QueryFlags;
use crate::floor::{scan_floors, SurfaceHit};
use crate::partition::{CellIndex, Partition, SurfaceGrid, SurfaceId, SurfaceList};
use crate::surface::{ObjectId, Surface};
use crate::wall::{scan_walls, WallCollisionData, WallRules};
use crate::water::{scan_water, WaterRules};

// =============================================================================
// STATISTICS
// =============================================================================

/// Query counters for one world.
///
/// # Thread Safety
///
/// Counters are relaxed atomics so `&self` queries can bump them from any
/// thread.
#[derive(Debug, Default)]
pub struct QueryStats {
    floor: AtomicU64,
    ceil: AtomicU64,
    wall: AtomicU64,
    water: AtomicU64,
    floor_misses: AtomicU64,
}

/// Point-in-time copy of [`QueryStats`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct QueryStatsSnapshot {
    /// Floor queries run.
    pub floor: u64,
    /// Ceiling queries run.
    pub ceil: u64,
    /// Wall queries run.
    pub wall: u64,
    /// Water queries run.
    pub water: u64,
    /// Floor queries that found nothing.
    pub floor_misses: u64,
}

impl QueryStats {
    #[inline]
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Reads every counter.
    #[must_use]
    pub fn snapshot(&self) -> QueryStatsSnapshot {
        QueryStatsSnapshot {
            floor: self.floor.load(Ordering::Relaxed),
            ceil: self.ceil.load(Ordering::Relaxed),
            wall: self.wall.load(Ordering::Relaxed),
            water: self.water.load(Ordering::Relaxed),
            floor_misses: self.floor_misses.load(Ordering::Relaxed),
        }
    }

    /// Zeroes every counter.
    pub fn reset(&self) {
        for counter in [&self.floor, &self.ceil, &self.wall, &self.water, &self.floor_misses] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

/// Result of a combined water lookup.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WaterHit {
    /// Water surface height.
    pub level: f32,
    /// The water surface, when the level came from geometry rather than an
    /// environment region.
    pub surface: Option<SurfaceId>,
}

// =============================================================================
// WORLD
// =============================================================================

/// Surfaces, environment regions and query state of one level.
#[derive(Debug)]
pub struct CollisionWorld {
    grid: SurfaceGrid,
    config: CollisionConfig,
    flags: QueryFlags,
    environment: Vec<EnvironmentRegion>,
    has_rooms: bool,
    stats: QueryStats,
}

impl CollisionWorld {
    /// Creates an empty world.
    #[must_use]
    pub fn new(config: CollisionConfig) -> Self {
        Self {
            grid: SurfaceGrid::new(&config),
            config,
            flags: QueryFlags::NONE,
            environment: Vec::new(),
            has_rooms: false,
            stats: QueryStats::default(),
        }
    }

    /// Configuration the world was built with.
    #[inline]
    #[must_use]
    pub fn config(&self) -> &CollisionConfig {
        &self.config
    }

    /// The surface grid.
    #[inline]
    #[must_use]
    pub fn grid(&self) -> &SurfaceGrid {
        &self.grid
    }

    /// Query counters.
    #[inline]
    #[must_use]
    pub fn stats(&self) -> &QueryStats {
        &self.stats
    }

    /// Looks up a surface by handle.
    #[inline]
    #[must_use]
    pub fn surface(&self, id: SurfaceId) -> Option<&Surface> {
        self.grid.surface(id)
    }

    // =========================================================================
    // MUTATION
    // =========================================================================

    /// Adds level geometry.
    pub fn insert_static(&mut self, surface: Surface) -> SurfaceId {
        self.grid.insert(surface, Partition::Static)
    }

    /// Adds geometry of a moving object.
    pub fn insert_dynamic(&mut self, surface: Surface) -> SurfaceId {
        self.grid.insert(surface, Partition::Dynamic)
    }

    /// Drops one partition.
    pub fn clear_partition(&mut self, partition: Partition) {
        self.grid.clear(partition);
    }

    /// Drops all geometry, regions and latched flags.
    pub fn clear(&mut self) {
        self.grid.clear(Partition::Static);
        self.grid.clear(Partition::Dynamic);
        self.environment.clear();
        self.has_rooms = false;
        self.flags = QueryFlags::NONE;
    }

    /// Unlinks every dynamic surface of `owner`.
    pub fn remove_object(&mut self, owner: ObjectId) -> usize {
        self.grid.remove_owner(owner)
    }

    /// Replaces the environment regions.
    pub fn set_environment(&mut self, regions: Vec<EnvironmentRegion>) {
        self.environment = regions;
    }

    /// Environment regions of the level.
    #[inline]
    #[must_use]
    pub fn environment(&self) -> &[EnvironmentRegion] {
        &self.environment
    }

    /// Marks whether level surfaces carry room indices.
    pub fn set_has_rooms(&mut self, has_rooms: bool) {
        self.has_rooms = has_rooms;
    }

    // =========================================================================
    // FLAGS
    // =========================================================================

    /// Latches modifiers for the next query.
    pub fn set_query_flags(&mut self, flags: QueryFlags) {
        self.flags |= flags;
    }

    /// Clears latched modifiers, including [`QueryFlags::CAMERA`].
    pub fn clear_query_flags(&mut self, flags: QueryFlags) {
        self.flags = self.flags & !flags;
    }

    /// Currently latched modifiers.
    #[inline]
    #[must_use]
    pub fn query_flags(&self) -> QueryFlags {
        self.flags
    }

    fn take_flags(&mut self) -> QueryFlags {
        let flags = self.flags;
        self.flags = flags & !QueryFlags::TRANSIENT;
        flags
    }

    fn lateral_rules(&self) -> LateralRules {
        LateralRules {
            ceil_threshold: self.config.ceil_threshold,
            ceil_margin: self.config.ceil_margin,
            steep_ceil_normal: self.config.steep_ceil_normal,
        }
    }

    // =========================================================================
    // FLOORS
    // =========================================================================

    /// Highest floor at or below `y` plus the floor buffer, using and then
    /// clearing the latched flags.
    pub fn find_floor(&mut self, x: f32, y: f32, z: f32) -> Option<SurfaceHit> {
        let flags = self.take_flags();
        self.find_floor_with(x, y, z, flags)
    }

    /// [`Self::find_floor`] with explicit flags.
    ///
    /// Dynamic floors are searched first; the static list then only accepts
    /// floors strictly higher than the dynamic one.
    #[must_use]
    pub fn find_floor_with(&self, x: f32, y: f32, z: f32, flags: QueryFlags) -> Option<SurfaceHit> {
        QueryStats::bump(&self.stats.floor);
        let hit = self.floor_in_partitions(x, y, z, flags);
        if hit.is_none() {
            QueryStats::bump(&self.stats.floor_misses);
        }
        hit
    }

    fn floor_in_partitions(&self, x: f32, y: f32, z: f32, flags: QueryFlags) -> Option<SurfaceHit> {
        let p = Vec3i::truncate(Vec3::new(x, y, z));
        let cell = self.grid.cell_for(p.x, p.z)?;
        let (buffer, limit) = (self.config.floor_buffer, self.config.floor_lower_limit);

        let dynamic = if flags.contains(QueryFlags::EXCLUDE_DYNAMIC) {
            None
        } else {
            let list = self.grid.surfaces(Partition::Dynamic, cell, SurfaceList::Floors);
            scan_floors(list, p.x, p.y, p.z, buffer, limit, flags)
        };

        let floor_above = dynamic.map_or(limit, |hit| hit.height);
        let list = self.grid.surfaces(Partition::Static, cell, SurfaceList::Floors);
        scan_floors(list, p.x, p.y, p.z, buffer, floor_above, flags).or(dynamic)
    }

    /// Height of [`Self::find_floor`].
    pub fn find_floor_height(&mut self, x: f32, y: f32, z: f32) -> Option<f32> {
        self.find_floor(x, y, z).map(|hit| hit.height)
    }

    /// Highest dynamic floor only. Latched flags are left alone.
    #[must_use]
    pub fn find_dynamic_floor(&self, x: f32, y: f32, z: f32) -> Option<SurfaceHit> {
        let p = Vec3i::truncate(Vec3::new(x, y, z));
        let cell = self.grid.cell_for(p.x, p.z)?;
        let list = self.grid.surfaces(Partition::Dynamic, cell, SurfaceList::Floors);
        scan_floors(
            list,
            p.x,
            p.y,
            p.z,
            self.config.floor_buffer,
            self.config.floor_lower_limit,
            self.flags,
        )
    }

    /// Floor used for room lookup: static only, intangible floors count.
    pub fn find_room_floor(&mut self, x: f32, y: f32, z: f32) -> Option<SurfaceHit> {
        self.set_query_flags(QueryFlags::EXCLUDE_DYNAMIC | QueryFlags::INCLUDE_INTANGIBLE);
        self.find_floor(x, y, z)
    }

    /// Room index under the point, or `None` when the level has no rooms
    /// or there is no floor.
    pub fn room_at(&mut self, x: f32, y: f32, z: f32) -> Option<i8> {
        if !self.has_rooms {
            return None;
        }
        let hit = self.find_room_floor(x, y, z)?;
        self.grid.surface(hit.surface).map(|s| s.room)
    }

    // =========================================================================
    // CEILINGS
    // =========================================================================

    /// Lowest ceiling at or above `y`, using and then clearing the latched
    /// flags.
    pub fn find_ceil(&mut self, x: f32, y: f32, z: f32) -> Option<SurfaceHit> {
        let flags = self.take_flags();
        self.find_ceil_with(x, y, z, flags)
    }

    /// [`Self::find_ceil`] with explicit flags. A dynamic ceiling wins over a
    /// static one at the same height.
    #[must_use]
    pub fn find_ceil_with(&self, x: f32, y: f32, z: f32, flags: QueryFlags) -> Option<SurfaceHit> {
        QueryStats::bump(&self.stats.ceil);
        let p = Vec3i::truncate(Vec3::new(x, y, z));
        let cell = self.grid.cell_for(p.x, p.z)?;
        let rules = self.lateral_rules();
        let scan = |partition| {
            let list = self.grid.surfaces(partition, cell, SurfaceList::Ceilings);
            scan_ceilings(
                list,
                p,
                self.config.ceil_ray_length,
                self.config.ceil_height_limit,
                &rules,
                flags,
            )
        };

        let dynamic = if flags.contains(QueryFlags::EXCLUDE_DYNAMIC) {
            None
        } else {
            scan(Partition::Dynamic)
        };
        let fixed = scan(Partition::Static);

        match (fixed, dynamic) {
            (Some(s), Some(d)) if s.height < d.height => Some(s),
            (_, Some(d)) => Some(d),
            (s, None) => s,
        }
    }

    // =========================================================================
    // WALLS
    // =========================================================================

    /// Pushes the sphere in `data` out of every wall it overlaps, using and
    /// then clearing the latched flags. Returns the number of walls hit.
    pub fn find_wall_collisions(&mut self, data: &mut WallCollisionData) -> usize {
        let flags = self.take_flags();
        self.find_wall_collisions_with(data, flags)
    }

    /// [`Self::find_wall_collisions`] with explicit flags.
    ///
    /// Every cell touched by the sphere's XZ box is searched, dynamic list
    /// first. Up to `max_referenced_walls` walls are recorded in `data`; the
    /// count covers all of them.
    pub fn find_wall_collisions_with(&self, data: &mut WallCollisionData, flags: QueryFlags) -> usize {
        QueryStats::bump(&self.stats.wall);
        data.reset_walls();

        let (x, z) = (data.x as i32, data.z as i32);
        if !self.grid.in_bounds(x, z) {
            return 0;
        }
        let radius = data.radius as i32;
        let (min_x, max_x) = (
            self.grid.clamped_cell(x.saturating_sub(radius)),
            self.grid.clamped_cell(x.saturating_add(radius)),
        );
        let (min_z, max_z) = (
            self.grid.clamped_cell(z.saturating_sub(radius)),
            self.grid.clamped_cell(z.saturating_add(radius)),
        );

        let rules = WallRules {
            normal_limit: self.config.wall_normal_limit,
            max_walls: self.config.max_referenced_walls,
        };
        let partitions: &[Partition] = if flags.contains(QueryFlags::EXCLUDE_DYNAMIC) {
            &[Partition::Static]
        } else {
            &[Partition::Dynamic, Partition::Static]
        };

        let mut hits = 0;
        for cell_x in min_x..=max_x {
            for cell_z in min_z..=max_z {
                let cell = CellIndex { x: cell_x, z: cell_z };
                for &partition in partitions {
                    let list = self.grid.surfaces(partition, cell, SurfaceList::Walls);
                    let (n, stop) = scan_walls(list, data, rules, flags);
                    hits += n;
                    if stop {
                        return hits;
                    }
                }
            }
        }
        hits
    }

    /// Resolves `pos` against walls in place and returns the query record.
    pub fn resolve_wall_collisions(&mut self, pos: &mut Vec3, offset_y: f32, radius: f32) -> WallCollisionData {
        let mut data = WallCollisionData::new(*pos, offset_y, radius);
        self.find_wall_collisions(&mut data);
        *pos = data.position();
        data
    }

    // =========================================================================
    // WATER
    // =========================================================================

    /// Water surface at the point from modelled water geometry (static only).
    #[must_use]
    pub fn find_water_floor(&self, x: f32, y: f32, z: f32) -> Option<SurfaceHit> {
        QueryStats::bump(&self.stats.water);
        let p = Vec3i::truncate(Vec3::new(x, y, z));
        let cell = self.grid.cell_for(p.x, p.z)?;
        let list = self.grid.surfaces(Partition::Static, cell, SurfaceList::Water);
        scan_water(
            list,
            p.x,
            p.y,
            p.z,
            WaterRules {
                floor_threshold: self.config.floor_threshold,
                buffer: self.config.floor_buffer,
                lower_limit: self.config.floor_lower_limit,
            },
        )
    }

    /// Water level from environment regions at `(x, z)`.
    #[must_use]
    pub fn find_water_level(&self, x: f32, z: f32) -> Option<f32> {
        region_level(&self.environment, x, z, self.config.gas_type_cutoff, false)
    }

    /// Poison gas level from environment regions at `(x, z)`.
    #[must_use]
    pub fn find_poison_gas_level(&self, x: f32, z: f32) -> Option<f32> {
        region_level(&self.environment, x, z, self.config.gas_type_cutoff, true)
    }

    /// Water level from geometry, falling back to environment regions.
    #[must_use]
    pub fn find_water_level_and_floor(&self, x: f32, y: f32, z: f32) -> Option<WaterHit> {
        if let Some(hit) = self.find_water_floor(x, y, z) {
            return Some(WaterHit { level: hit.height, surface: Some(hit.surface) });
        }
        self.find_water_level(x, z).map(|level| WaterHit { level, surface: None })
    }

    // =========================================================================
    // RAYCAST
    // =========================================================================

    /// Nearest surface crossed by the segment `from -> to` among `lists`.
    ///
    /// Cells are visited along the segment's XZ bounding box. Honours
    /// [`QueryFlags::CAMERA`] and [`QueryFlags::EXCLUDE_DYNAMIC`].
    #[must_use]
    pub fn raycast_surface(&self, from: Vec3, to: Vec3, lists: &[SurfaceList], flags: QueryFlags) -> Option<RayHit> {
        let clamp = |v: f32| self.grid.clamped_cell(v as i32);
        let (min_x, max_x) = (clamp(from.x.min(to.x)), clamp(from.x.max(to.x)));
        let (min_z, max_z) = (clamp(from.z.min(to.z)), clamp(from.z.max(to.z)));
        let rules = LateralRules { ceil_margin: 0.0, ..self.lateral_rules() };
        let include_dynamic = !flags.contains(QueryFlags::EXCLUDE_DYNAMIC);

        let mut best: Option<RayHit> = None;
        for cell_x in min_x..=max_x {
            for cell_z in min_z..=max_z {
                let cell = CellIndex { x: cell_x, z: cell_z };
                for &list in lists {
                    for partition in [Partition::Static, Partition::Dynamic] {
                        if partition == Partition::Dynamic && !include_dynamic {
                            continue;
                        }
                        let candidates = self.grid.surfaces(partition, cell, list);
                        if let Some(hit) = scan_segment(candidates, from, to, &rules, flags) {
                            if best.map_or(true, |b| hit.t < b.t) {
                                best = Some(hit);
                            }
                        }
                    }
                }
            }
        }
        best
    }
}
