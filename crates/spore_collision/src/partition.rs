//! # Surface Partition Grid
//!
//! The level's XZ square is cut into `cells_per_axis²` cells. Every cell
//! holds four singly linked lists (floors, ceilings, walls, water) per
//! partition. Static geometry is linked once at level load; dynamic
//! geometry belongs to moving objects and is rebuilt as they move.
//!
//! ## Storage
//!
//! Each partition owns its arenas: the surfaces themselves, the list nodes,
//! and one head index per (cell, list). Links are `u32` indices with
//! [`NIL`] as terminator, so clearing a partition is three `Vec::clear`s and
//! a fill, with no per-node work.
//!
//! ## Overlap
//!
//! A surface whose bounding box comes within `cell_overlap` units of a cell
//! edge is also linked into the neighbouring cell, so a query point right on
//! the edge still sees it.

use spore_shared::CollisionConfig;

use crate::surface::{ObjectId, Surface};

/// End-of-list marker for node links.
pub const NIL: u32 = u32::MAX;

/// Which half of the grid a surface lives in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Partition {
    /// Level geometry, loaded once.
    Static,
    /// Geometry of moving objects, rebuilt every frame.
    Dynamic,
}

impl Partition {
    #[inline]
    const fn index(self) -> usize {
        match self {
            Self::Static => 0,
            Self::Dynamic => 1,
        }
    }
}

/// Per-cell list a surface is filed under.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SurfaceList {
    /// Upward facing.
    Floors,
    /// Downward facing.
    Ceilings,
    /// Near vertical.
    Walls,
    /// Water surfaces and water bottoms.
    Water,
}

impl SurfaceList {
    /// All lists, in storage order.
    pub const ALL: [Self; 4] = [Self::Floors, Self::Ceilings, Self::Walls, Self::Water];

    #[inline]
    const fn index(self) -> usize {
        match self {
            Self::Floors => 0,
            Self::Ceilings => 1,
            Self::Walls => 2,
            Self::Water => 3,
        }
    }
}

/// Stable handle to a surface inside the grid.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SurfaceId {
    /// Partition holding the surface.
    pub partition: Partition,
    /// Slot in the partition's surface arena.
    pub index: u32,
}

/// Grid coordinates of a cell.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CellIndex {
    /// Column along X.
    pub x: usize,
    /// Row along Z.
    pub z: usize,
}

#[derive(Clone, Copy, Debug)]
struct Node {
    surface: u32,
    next: u32,
}

#[derive(Debug, Default)]
struct PartitionData {
    surfaces: Vec<Option<Surface>>,
    nodes: Vec<Node>,
    heads: Vec<[u32; 4]>,
    live: usize,
}

impl PartitionData {
    fn new(cell_count: usize) -> Self {
        Self {
            heads: vec![[NIL; 4]; cell_count],
            ..Self::default()
        }
    }

    fn clear(&mut self) {
        self.surfaces.clear();
        self.nodes.clear();
        self.heads.fill([NIL; 4]);
        self.live = 0;
    }
}

// =============================================================================
// GRID
// =============================================================================

/// Uniform XZ grid of surface lists.
#[derive(Debug)]
pub struct SurfaceGrid {
    cells: usize,
    cell_size: i32,
    boundary: i32,
    overlap: i32,
    floor_threshold: f32,
    ceil_threshold: f32,
    partitions: [PartitionData; 2],
}

impl SurfaceGrid {
    /// Creates an empty grid shaped by `config`.
    #[must_use]
    pub fn new(config: &CollisionConfig) -> Self {
        let cells = config.cells_per_axis().max(1);
        Self {
            cells,
            cell_size: config.cell_size,
            boundary: config.level_boundary,
            overlap: config.cell_overlap,
            floor_threshold: config.floor_threshold,
            ceil_threshold: config.ceil_threshold,
            partitions: [PartitionData::new(cells * cells), PartitionData::new(cells * cells)],
        }
    }

    /// Cells along one axis.
    #[inline]
    #[must_use]
    pub const fn cells_per_axis(&self) -> usize {
        self.cells
    }

    /// List a surface belongs to.
    #[must_use]
    pub fn classify(&self, surface: &Surface) -> SurfaceList {
        if surface.kind.is_water() {
            SurfaceList::Water
        } else if surface.normal.y >= self.floor_threshold {
            SurfaceList::Floors
        } else if surface.normal.y <= self.ceil_threshold {
            SurfaceList::Ceilings
        } else {
            SurfaceList::Walls
        }
    }

    /// Whether `(x, z)` lies strictly inside the playable square.
    #[inline]
    #[must_use]
    pub fn in_bounds(&self, x: i32, z: i32) -> bool {
        x > -self.boundary && x < self.boundary && z > -self.boundary && z < self.boundary
    }

    /// Cell containing `(x, z)`, or `None` outside the playable square.
    #[must_use]
    pub fn cell_for(&self, x: i32, z: i32) -> Option<CellIndex> {
        if !self.in_bounds(x, z) {
            return None;
        }
        Some(CellIndex { x: self.clamped_cell(x), z: self.clamped_cell(z) })
    }

    /// Cell column or row of one coordinate, clamped to the grid.
    #[must_use]
    pub fn clamped_cell(&self, coord: i32) -> usize {
        let last = self.cells as i32 - 1;
        (coord.saturating_add(self.boundary) / self.cell_size).clamp(0, last) as usize
    }

    fn lower_cell(&self, coord: i32) -> i32 {
        let coord = coord.saturating_add(self.boundary).max(0);
        let mut index = coord / self.cell_size;
        if coord % self.cell_size < self.overlap {
            index -= 1;
        }
        index.max(0)
    }

    fn upper_cell(&self, coord: i32) -> i32 {
        let coord = coord.saturating_add(self.boundary).max(0);
        let mut index = coord / self.cell_size;
        if coord % self.cell_size > self.cell_size - self.overlap {
            index += 1;
        }
        index.min(self.cells as i32 - 1)
    }

    #[inline]
    fn cell_slot(&self, cell: CellIndex) -> usize {
        cell.z * self.cells + cell.x
    }

    /// Links `surface` into every cell its bounding box (plus overlap)
    /// touches, in the list [`Self::classify`] picks.
    pub fn insert(&mut self, surface: Surface, partition: Partition) -> SurfaceId {
        let list = self.classify(&surface).index();
        let (min_x, max_x, min_z, max_z) = surface.bounds_xz();
        let (x0, x1) = (self.lower_cell(min_x), self.upper_cell(max_x));
        let (z0, z1) = (self.lower_cell(min_z), self.upper_cell(max_z));
        let cells = self.cells;

        let data = &mut self.partitions[partition.index()];
        let index = data.surfaces.len() as u32;
        data.surfaces.push(Some(surface));
        data.live += 1;

        for z in z0..=z1 {
            for x in x0..=x1 {
                let slot = z as usize * cells + x as usize;
                let node = data.nodes.len() as u32;
                let head = &mut data.heads[slot][list];
                data.nodes.push(Node { surface: index, next: *head });
                *head = node;
            }
        }

        SurfaceId { partition, index }
    }

    /// Drops every surface of one partition.
    pub fn clear(&mut self, partition: Partition) {
        let data = &mut self.partitions[partition.index()];
        tracing::trace!(?partition, surfaces = data.live, "partition cleared");
        data.clear();
    }

    /// Unlinks every dynamic surface owned by `owner`. Returns how many
    /// surfaces were removed.
    ///
    /// Their list nodes stay allocated until the partition is cleared.
    pub fn remove_owner(&mut self, owner: ObjectId) -> usize {
        let data = &mut self.partitions[Partition::Dynamic.index()];
        let owned = |surfaces: &[Option<Surface>], index: u32| {
            surfaces[index as usize]
                .as_ref()
                .is_some_and(|s| s.owner == Some(owner))
        };

        for cell in 0..data.heads.len() {
            for list in 0..4 {
                let mut prev = NIL;
                let mut cur = data.heads[cell][list];
                while cur != NIL {
                    let node = data.nodes[cur as usize];
                    if owned(&data.surfaces, node.surface) {
                        if prev == NIL {
                            data.heads[cell][list] = node.next;
                        } else {
                            data.nodes[prev as usize].next = node.next;
                        }
                    } else {
                        prev = cur;
                    }
                    cur = node.next;
                }
            }
        }

        let mut removed = 0;
        for slot in &mut data.surfaces {
            if slot.as_ref().is_some_and(|s| s.owner == Some(owner)) {
                *slot = None;
                removed += 1;
            }
        }
        data.live -= removed;
        removed
    }

    /// Looks up a surface by handle.
    #[must_use]
    pub fn surface(&self, id: SurfaceId) -> Option<&Surface> {
        self.partitions[id.partition.index()]
            .surfaces
            .get(id.index as usize)
            .and_then(Option::as_ref)
    }

    /// Surfaces filed under `list` in one cell of one partition, most
    /// recently inserted first.
    #[must_use]
    pub fn surfaces(&self, partition: Partition, cell: CellIndex, list: SurfaceList) -> CellSurfaces<'_> {
        let data = &self.partitions[partition.index()];
        let next = data
            .heads
            .get(self.cell_slot(cell))
            .map_or(NIL, |heads| heads[list.index()]);
        CellSurfaces { data, partition, next }
    }

    /// Live surfaces in a partition.
    #[inline]
    #[must_use]
    pub fn surface_count(&self, partition: Partition) -> usize {
        self.partitions[partition.index()].live
    }

    /// List nodes allocated in a partition, including unlinked ones.
    #[inline]
    #[must_use]
    pub fn node_count(&self, partition: Partition) -> usize {
        self.partitions[partition.index()].nodes.len()
    }
}

/// Iterator over one cell list.
#[derive(Clone)]
pub struct CellSurfaces<'a> {
    data: &'a PartitionData,
    partition: Partition,
    next: u32,
}

impl<'a> Iterator for CellSurfaces<'a> {
    type Item = (SurfaceId, &'a Surface);

    fn next(&mut self) -> Option<Self::Item> {
        while self.next != NIL {
            let node = self.data.nodes[self.next as usize];
            self.next = node.next;
            if let Some(Some(surface)) = self.data.surfaces.get(node.surface as usize) {
                let id = SurfaceId { partition: self.partition, index: node.surface };
                return Some((id, surface));
            }
        }
        None
    }
}
