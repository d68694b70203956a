//! # Collision Query Benchmarks
//!
//! Per-frame query costs on a generated terrain: floor and ceiling lookups at
//! random points, wall resolution, and the dynamic partition rebuild.

#![allow(missing_docs)]

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use spore_collision::{
    CollisionWorld, ObjectId, ObjectTransform, Partition, QueryFlags, Surface, SurfaceType,
    WallCollisionData,
};
use spore_shared::{CollisionConfig, Vec3, Vec3i};

const TILE: i32 = 256;
const EXTENT: i32 = 4096;

/// Rolling terrain of `TILE`-sized quads with a wall ring and a roof.
fn terrain() -> CollisionWorld {
    let mut world = CollisionWorld::new(CollisionConfig::default());
    let height = |x: i32, z: i32| ((x / TILE + z / TILE) % 4) * 40;
    let mut add = |a: Vec3i, b: Vec3i, c: Vec3i| {
        if let Some(s) = Surface::new([a, b, c], SurfaceType::DEFAULT) {
            world.insert_static(s);
        }
    };

    for x in (-EXTENT..EXTENT).step_by(TILE as usize) {
        for z in (-EXTENT..EXTENT).step_by(TILE as usize) {
            let p = |dx: i32, dz: i32, dy: i32| Vec3i::new(x + dx, height(x, z) + dy, z + dz);
            add(p(0, 0, 0), p(0, TILE, 0), p(TILE, 0, 0));
            add(p(TILE, 0, 0), p(0, TILE, 0), p(TILE, TILE, 0));
            add(p(0, 0, 1500), p(TILE, 0, 1500), p(0, TILE, 1500));
        }
        let wall = |z: i32| {
            (
                Vec3i::new(x, 0, z),
                Vec3i::new(x + TILE, 0, z),
                Vec3i::new(x, 1000, z),
            )
        };
        let (a, b, c) = wall(-EXTENT);
        add(a, b, c);
        let (a, b, c) = wall(EXTENT);
        add(a, b, c);
    }
    world
}

fn points(n: usize) -> Vec<Vec3> {
    let mut rng = StdRng::seed_from_u64(0xC011);
    (0..n)
        .map(|_| {
            Vec3::new(
                rng.gen_range(-EXTENT as f32..EXTENT as f32),
                rng.gen_range(0.0..400.0),
                rng.gen_range(-EXTENT as f32..EXTENT as f32),
            )
        })
        .collect()
}

// =============================================================================
// QUERIES
// =============================================================================

fn bench_find_floor(c: &mut Criterion) {
    let world = terrain();
    let pts = points(1024);

    c.bench_function("find_floor_1024_points", |b| {
        b.iter(|| {
            for p in &pts {
                black_box(world.find_floor_with(p.x, p.y, p.z, QueryFlags::NONE));
            }
        });
    });
}

fn bench_find_ceil(c: &mut Criterion) {
    let world = terrain();
    let pts = points(1024);

    c.bench_function("find_ceil_1024_points", |b| {
        b.iter(|| {
            for p in &pts {
                black_box(world.find_ceil_with(p.x, p.y, p.z, QueryFlags::NONE));
            }
        });
    });
}

fn bench_walls(c: &mut Criterion) {
    let world = terrain();
    let pts: Vec<Vec3> = points(1024)
        .into_iter()
        .map(|p| Vec3::new(p.x, 0.0, -EXTENT as f32 + 30.0))
        .collect();

    c.bench_function("find_wall_collisions_1024_movers", |b| {
        b.iter(|| {
            for p in &pts {
                let mut data = WallCollisionData::new(*p, 60.0, 50.0);
                black_box(world.find_wall_collisions_with(&mut data, QueryFlags::NONE));
            }
        });
    });
}

// =============================================================================
// DYNAMIC PARTITION
// =============================================================================

fn bench_dynamic_rebuild(c: &mut Criterion) {
    let mut world = terrain();
    let platform: Vec<i16> = vec![
        0x40, 4, -200, 0, -200, -200, 0, 200, 200, 0, -200, 200, 0, 200, //
        0x00, 2, 0, 1, 2, 2, 1, 3, //
        0x41,
    ];
    let placements: Vec<ObjectTransform> = points(64)
        .into_iter()
        .enumerate()
        .map(|(i, p)| ObjectTransform { translation: p, yaw: (i as i16).wrapping_mul(1024), scale: 1.0 })
        .collect();

    c.bench_function("dynamic_rebuild_64_objects", |b| {
        b.iter(|| {
            world.clear_partition(Partition::Dynamic);
            for (i, t) in placements.iter().enumerate() {
                black_box(world.load_object_collision(&platform, t, ObjectId(i as u32)).expect("platform"));
            }
        });
    });
}

criterion_group!(benches, bench_find_floor, bench_find_ceil, bench_walls, bench_dynamic_rebuild);
criterion_main!(benches);
