//! # Frame-Phase Collision Access
//!
//! Physics threads share one collision world. Each frame has two phases:
//!
//! ```text
//!   ┌──────────────┐        ┌───────────────────────────┐
//!   │ write phase  │ ─────► │ read phase                │
//!   │ (one thread) │        │ (every actor thread)      │
//!   │ rebuild      │        │ find_floor_with / walls / │
//!   │ dynamic grid │        │ ceilings / water          │
//!   └──────────────┘        └───────────────────────────┘
//! ```
//!
//! The write phase clears the dynamic partition and reinserts every moving
//! object. The read phase hands out shared access; queries that go through
//! it must use the `*_with` variants, which take their flags as an argument
//! instead of consuming the world's one-shot flags.
//!
//! ## Thread Safety
//!
//! - `DynamicPhase`: exclusive, blocks until every reader is gone
//! - `ReadPhase`: shared, any number at once
//! - The frame counter only moves when a write phase ends

use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use spore_collision::{CollisionResult, CollisionWorld, ObjectId, ObjectTransform, Partition};

/// A collision world shared between physics threads.
pub struct SharedCollision {
    world: RwLock<CollisionWorld>,
    frame: AtomicU64,
}

impl SharedCollision {
    /// Wraps `world`.
    #[must_use]
    pub fn new(world: CollisionWorld) -> Self {
        Self { world: RwLock::new(world), frame: AtomicU64::new(0) }
    }

    /// Number of completed write phases.
    #[inline]
    #[must_use]
    pub fn frame(&self) -> u64 {
        self.frame.load(Ordering::Acquire)
    }

    /// Starts a frame: takes the world exclusively and empties its dynamic
    /// partition.
    pub fn begin_dynamic(&self) -> DynamicPhase<'_> {
        let mut world = self.world.write();
        world.clear_partition(Partition::Dynamic);
        DynamicPhase { world, frame: &self.frame, objects: 0 }
    }

    /// Shared access for queries.
    #[inline]
    #[must_use]
    pub fn read(&self) -> ReadPhase<'_> {
        ReadPhase { world: self.world.read() }
    }

    /// Exclusive access without touching either partition, for level loads.
    #[inline]
    pub fn world_mut(&self) -> RwLockWriteGuard<'_, CollisionWorld> {
        self.world.write()
    }

    /// Unwraps the world.
    #[must_use]
    pub fn into_inner(self) -> CollisionWorld {
        self.world.into_inner()
    }
}

/// The write phase of a frame.
pub struct DynamicPhase<'a> {
    world: RwLockWriteGuard<'a, CollisionWorld>,
    frame: &'a AtomicU64,
    objects: usize,
}

impl DynamicPhase<'_> {
    /// Inserts an object's collision model at `transform`. Returns the
    /// number of surfaces inserted.
    ///
    /// # Errors
    ///
    /// Fails if the model data does not decode; nothing is inserted then.
    pub fn place_object(
        &mut self,
        words: &[i16],
        transform: &ObjectTransform,
        owner: ObjectId,
    ) -> CollisionResult<usize> {
        let count = self.world.load_object_collision(words, transform, owner)?;
        self.objects += 1;
        Ok(count)
    }

    /// Objects placed so far this frame.
    #[inline]
    #[must_use]
    pub fn objects(&self) -> usize {
        self.objects
    }
}

impl Deref for DynamicPhase<'_> {
    type Target = CollisionWorld;

    fn deref(&self) -> &CollisionWorld {
        &self.world
    }
}

impl DerefMut for DynamicPhase<'_> {
    fn deref_mut(&mut self) -> &mut CollisionWorld {
        &mut self.world
    }
}

impl Drop for DynamicPhase<'_> {
    fn drop(&mut self) {
        let frame = self.frame.fetch_add(1, Ordering::AcqRel) + 1;
        tracing::trace!(
            frame,
            objects = self.objects,
            nodes = self.world.grid().node_count(Partition::Dynamic),
            "dynamic partition rebuilt"
        );
    }
}

/// The read phase of a frame.
pub struct ReadPhase<'a> {
    world: RwLockReadGuard<'a, CollisionWorld>,
}

impl Deref for ReadPhase<'_> {
    type Target = CollisionWorld;

    fn deref(&self) -> &CollisionWorld {
        &self.world
    }
}

#[cfg(test)]
mod tests {
    use spore_collision::{QueryFlags, Surface, SurfaceType};
    use spore_shared::{CollisionConfig, Vec3, Vec3i};

    use super::*;

    /// A 400 x 400 platform at y = 0 around the model origin.
    const PLATFORM: &[i16] = &[
        0x40, 4, -200, 0, -200, -200, 0, 200, 200, 0, -200, 200, 0, 200, //
        0x00, 2, 0, 1, 2, 2, 1, 3, //
        0x41,
    ];

    fn shared() -> SharedCollision {
        let mut world = CollisionWorld::new(CollisionConfig::default());
        let ground = Surface::new(
            [Vec3i::new(-2000, -500, -2000), Vec3i::new(-2000, -500, 4000), Vec3i::new(4000, -500, -2000)],
            SurfaceType::DEFAULT,
        )
        .unwrap();
        world.insert_static(ground);
        SharedCollision::new(world)
    }

    fn at(y: f32) -> ObjectTransform {
        ObjectTransform { translation: Vec3::new(0.0, y, 0.0), ..ObjectTransform::default() }
    }

    #[test]
    fn test_write_phase_replaces_dynamic_surfaces() {
        let shared = shared();
        {
            let mut phase = shared.begin_dynamic();
            assert_eq!(phase.place_object(PLATFORM, &at(100.0), ObjectId(1)).unwrap(), 2);
            assert_eq!(phase.objects(), 1);
        }
        assert_eq!(shared.frame(), 1);
        let height = |shared: &SharedCollision| {
            shared.read().find_floor_with(0.0, 150.0, 0.0, QueryFlags::NONE).map(|h| h.height)
        };
        assert_eq!(height(&shared), Some(100.0));

        // Next frame the platform moved; the old copy is gone.
        shared.begin_dynamic().place_object(PLATFORM, &at(50.0), ObjectId(1)).unwrap();
        assert_eq!(shared.frame(), 2);
        assert_eq!(height(&shared), Some(50.0));

        // A frame with no objects leaves only the static ground.
        drop(shared.begin_dynamic());
        assert_eq!(height(&shared), Some(-500.0));
    }

    #[test]
    fn test_readers_share_the_world() {
        let shared = shared();
        shared.begin_dynamic().place_object(PLATFORM, &at(0.0), ObjectId(7)).unwrap();

        let a = shared.read();
        let b = shared.read();
        let hit = a.find_floor_with(10.0, 20.0, 10.0, QueryFlags::NONE).unwrap();
        assert_eq!(b.surface(hit.surface).and_then(|s| s.owner), Some(ObjectId(7)));
    }
}
