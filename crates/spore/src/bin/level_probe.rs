//! # SPORE Level Probe
//!
//! Builds a small ROM image in memory, loads it as a level and runs a round
//! of collision queries against it, including one multi-threaded frame.
//!
//! ```bash
//! # Default configuration
//! RUST_LOG=debug level_probe
//!
//! # Custom configuration
//! level_probe engine.toml
//! ```

use std::process::ExitCode;

use spore::collision::{CollisionWorld, ObjectId, ObjectTransform, QueryFlags};
use spore::core::{compress_segment, MemoryContext, RomImage, RomRange, SegmentedAddr};
use spore::shared::{EngineConfig, Vec3};
use spore::{DataRef, LevelLoader, LevelManifest, SegmentKind, SegmentLoad, SharedCollision};
use tracing_subscriber::EnvFilter;

/// Floor, ceiling and one wall around a water-filled room.
const ROOM: &[i16] = &[
    0x40, 12, //
    -1000, 0, -1000, -1000, 0, 1000, 1000, 0, -1000, 1000, 0, 1000, //
    -1000, 600, -1000, -1000, 600, 1000, 1000, 600, -1000, 1000, 600, 1000, //
    800, 0, -1000, 800, 0, 1000, 800, 500, -1000, 800, 500, 1000, //
    0x00, 6, //
    0, 1, 2, 2, 1, 3, //
    4, 6, 5, 6, 7, 5, //
    8, 9, 10, 10, 9, 11, //
    0x41, //
    0x43, 1, 0x20, 0, 0, 200, 0x4000, //
    0x44, 1, 0, -1000, -1000, 1000, 1000, 300, //
    0x42,
];

/// A 400 x 400 moving platform.
const PLATFORM: &[i16] = &[
    0x40, 4, -200, 0, -200, -200, 0, 200, 200, 0, -200, 200, 0, 200, //
    0x00, 2, 0, 1, 2, 2, 1, 3, //
    0x41,
];

fn build_rom() -> (RomImage, LevelManifest) {
    let collision: Vec<u8> = ROOM.iter().flat_map(|w| w.to_be_bytes()).collect();
    let packed = compress_segment(&collision);
    let code = vec![0u8; 0x200];

    let mut bytes = code.clone();
    let geometry_at = bytes.len() as u32;
    bytes.extend_from_slice(&packed);

    let manifest = LevelManifest {
        name: "probe_room".into(),
        segments: vec![
            SegmentLoad {
                segment: 0x04,
                rom: RomRange::at(0, code.len() as u32),
                kind: SegmentKind::Bss(RomRange::at(0, 0x100)),
            },
            SegmentLoad::compressed(0x07, RomRange::at(geometry_at, packed.len() as u32)),
        ],
        collision: DataRef { addr: SegmentedAddr::new(0x07, 0), len: collision.len() as u32 },
        rooms: None,
    };
    (RomImage::new(bytes), manifest)
}

fn run(config: &EngineConfig) -> Result<(), Box<dyn std::error::Error>> {
    let (rom, manifest) = build_rom();
    let mut ctx = MemoryContext::new(&config.memory)?;
    let mut world = CollisionWorld::new(config.collision.clone());
    let mut loader = LevelLoader::new(rom, &config.memory);

    let level = loader.load(&mut ctx, &mut world, &manifest)?;
    println!("Level '{}': {} surfaces, {} spawns", level.name, level.surfaces, level.objects.len());
    for (segment, base) in &level.segment_bases {
        println!("  segment {segment:#04x} -> {base}");
    }

    println!("Floor at origin:   {:?}", world.find_floor_height(0.0, 100.0, 0.0));
    println!("Ceiling at origin: {:?}", world.find_ceil(0.0, 100.0, 0.0).map(|h| h.height));
    println!("Water level:       {:?}", world.find_water_level(0.0, 0.0));

    let mut pos = Vec3::new(770.0, 0.0, 0.0);
    let walls = world.resolve_wall_collisions(&mut pos, 60.0, 50.0);
    println!("Sphere at x=770 pushed to x={} by {} wall(s)", pos.x, walls.num_walls());

    let shared = SharedCollision::new(world);
    {
        let mut phase = shared.begin_dynamic();
        let lift = ObjectTransform { translation: Vec3::new(-400.0, 150.0, -400.0), ..ObjectTransform::default() };
        phase.place_object(PLATFORM, &lift, ObjectId(1))?;
    }

    let heights: Vec<Option<f32>> = std::thread::scope(|scope| {
        let workers: Vec<_> = (0..4)
            .map(|i| {
                let shared = &shared;
                scope.spawn(move || {
                    let x = -500.0 + i as f32 * 300.0;
                    shared.read().find_floor_with(x, 200.0, -400.0, QueryFlags::NONE).map(|h| h.height)
                })
            })
            .collect();
        workers.into_iter().map(|w| w.join().unwrap_or(None)).collect()
    });
    println!("Frame {} floor heights along z=-400: {heights:?}", shared.frame());

    let mut world = shared.into_inner();
    let stats = world.stats().snapshot();
    println!("Queries: {} floor ({} misses), {} ceil, {} wall", stats.floor, stats.floor_misses, stats.ceil, stats.wall);

    loader.unload(&mut ctx, &mut world)?;
    println!("Unloaded, {:#x} bytes available", ctx.pool.available());
    Ok(())
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => match EngineConfig::load(&path) {
            Ok(config) => config,
            Err(err) => {
                tracing::error!(path = %path, error = %err, "bad configuration");
                return ExitCode::FAILURE;
            }
        },
        None => EngineConfig::default(),
    };

    match run(&config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(error = %err, "probe failed");
            ExitCode::FAILURE
        }
    }
}
