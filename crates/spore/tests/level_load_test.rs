//! Integration test for loading a level from ROM into the collision world and
//! running frames against it.

use spore::collision::{CollisionWorld, ObjectId, ObjectTransform, QueryFlags};
use spore::core::{compress_segment, MemoryContext, RomImage, RomRange, SegmentedAddr};
use spore::shared::{CollisionConfig, MemoryConfig, Vec3, Vec3i};
use spore::{DataRef, LevelError, LevelLoader, LevelManifest, SegmentLoad, SharedCollision};

/// Two floor triangles with a spawn and a water region.
const LEVEL: &[i16] = &[
    0x40, 4, -1000, 0, -1000, -1000, 0, 1000, 1000, 0, -1000, 1000, 0, 1000, //
    0x00, 2, 0, 1, 2, 2, 1, 3, //
    0x41, //
    0x43, 1, 0x11, 100, 0, -100, 0, //
    0x44, 1, 0, -1000, -1000, 0, 0, 250, //
    0x42,
];

const PLATFORM: &[i16] = &[
    0x40, 4, -200, 0, -200, -200, 0, 200, 200, 0, -200, 200, 0, 200, //
    0x00, 2, 0, 1, 2, 2, 1, 3, //
    0x41,
];

fn config() -> MemoryConfig {
    MemoryConfig { ram_size: 0x8_0000, pool_start: 0x2_0000, ..MemoryConfig::default() }
}

/// Collision compressed in segment 7, room table raw in segment 8.
fn build() -> (RomImage, LevelManifest) {
    let collision: Vec<u8> = LEVEL.iter().flat_map(|w| w.to_be_bytes()).collect();
    let packed = compress_segment(&collision);
    let rooms = [3u8, 4u8];

    let mut bytes = packed.clone();
    let rooms_at = bytes.len() as u32;
    bytes.extend_from_slice(&rooms);

    let manifest = LevelManifest {
        name: "courtyard".into(),
        segments: vec![
            SegmentLoad::compressed(0x07, RomRange::at(0, packed.len() as u32)),
            SegmentLoad::raw(0x08, RomRange::at(rooms_at, rooms.len() as u32)),
        ],
        collision: DataRef { addr: SegmentedAddr::new(0x07, 0), len: collision.len() as u32 },
        rooms: Some(DataRef { addr: SegmentedAddr::new(0x08, 0), len: 2 }),
    };
    (RomImage::new(bytes), manifest)
}

#[test]
fn test_level_from_compressed_segment() {
    let (rom, manifest) = build();
    let config = config();
    let mut ctx = MemoryContext::new(&config).unwrap();
    let mut world = CollisionWorld::new(CollisionConfig::default());
    let mut loader = LevelLoader::new(rom, &config);
    let before = ctx.pool.available();

    let level = loader.load(&mut ctx, &mut world, &manifest).unwrap();
    assert_eq!(level.surfaces, 2);
    assert_eq!(level.objects.len(), 1);
    assert_eq!(level.objects[0].preset, 0x11);
    assert_eq!(level.objects[0].pos, Vec3i::new(100, 0, -100));
    assert_eq!(level.segment_bases.len(), 2);
    assert_eq!(ctx.segments.base(0x07).unwrap(), level.segment_bases[0].1);

    assert_eq!(world.find_floor_height(0.0, 50.0, 0.0), Some(0.0));
    assert_eq!(world.room_at(-500.0, 50.0, -500.0), Some(3));
    assert_eq!(world.room_at(500.0, 50.0, 500.0), Some(4));
    assert_eq!(world.find_water_level(-500.0, -500.0), Some(250.0));
    assert_eq!(world.find_water_level(500.0, 500.0), None);

    loader.unload(&mut ctx, &mut world).unwrap();
    assert_eq!(ctx.pool.available(), before);
    assert_eq!(world.grid().surface_count(spore::collision::Partition::Static), 0);
}

#[test]
fn test_reload_after_unload() {
    let (rom, manifest) = build();
    let config = config();
    let mut ctx = MemoryContext::new(&config).unwrap();
    let mut world = CollisionWorld::new(CollisionConfig::default());
    let mut loader = LevelLoader::new(&rom, &config);

    let first = loader.load(&mut ctx, &mut world, &manifest).unwrap();
    loader.unload(&mut ctx, &mut world).unwrap();
    let second = loader.load(&mut ctx, &mut world, &manifest).unwrap();

    // Same allocator state, same placement.
    assert_eq!(first.segment_bases, second.segment_bases);
    assert_eq!(world.find_floor_height(0.0, 50.0, 0.0), Some(0.0));
}

#[test]
fn test_missing_segment_data_fails_cleanly() {
    let (rom, mut manifest) = build();
    manifest.segments[1].rom = RomRange::at(0x10_0000, 2);
    let config = config();
    let mut ctx = MemoryContext::new(&config).unwrap();
    let mut world = CollisionWorld::new(CollisionConfig::default());
    let mut loader = LevelLoader::new(rom, &config);
    let before = ctx.pool.available();

    assert!(matches!(loader.load(&mut ctx, &mut world, &manifest), Err(LevelError::Rom(_))));
    assert_eq!(ctx.pool.available(), before);
    assert!(world.find_floor(0.0, 50.0, 0.0).is_none());
}

#[test]
fn test_frames_over_loaded_level() {
    let (rom, manifest) = build();
    let config = config();
    let mut ctx = MemoryContext::new(&config).unwrap();
    let mut world = CollisionWorld::new(CollisionConfig::default());
    let mut loader = LevelLoader::new(rom, &config);
    loader.load(&mut ctx, &mut world, &manifest).unwrap();

    let shared = SharedCollision::new(world);
    for frame in 0..3u8 {
        let lift_y = 100.0 + f32::from(frame) * 20.0;
        {
            let mut phase = shared.begin_dynamic();
            let t = ObjectTransform { translation: Vec3::new(-500.0, lift_y, -500.0), ..ObjectTransform::default() };
            phase.place_object(PLATFORM, &t, ObjectId(1)).unwrap();
        }

        std::thread::scope(|scope| {
            for _ in 0..4 {
                scope.spawn(|| {
                    let read = shared.read();
                    let on_lift = read.find_floor_with(-500.0, lift_y + 10.0, -500.0, QueryFlags::NONE).unwrap();
                    assert_eq!(on_lift.height, lift_y);
                    let off_lift = read.find_floor_with(500.0, 10.0, 500.0, QueryFlags::NONE).unwrap();
                    assert_eq!(off_lift.height, 0.0);
                });
            }
        });
    }
    assert_eq!(shared.frame(), 3);

    let mut world = shared.into_inner();
    loader.unload(&mut ctx, &mut world).unwrap();
}
