//! Integration test for the collision queries against small hand-built
//! levels.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use spore_collision::{
    CollisionWorld, Partition, QueryFlags, Surface, SurfaceList, SurfaceType, WallCollisionData,
    WallMover,
};
use spore_shared::{CollisionConfig, Vec3, Vec3i};

fn tri(a: [i32; 3], b: [i32; 3], c: [i32; 3]) -> Surface {
    Surface::new(
        [
            Vec3i::new(a[0], a[1], a[2]),
            Vec3i::new(b[0], b[1], b[2]),
            Vec3i::new(c[0], c[1], c[2]),
        ],
        SurfaceType::DEFAULT,
    )
    .expect("non-degenerate triangle")
}

fn world() -> CollisionWorld {
    CollisionWorld::new(CollisionConfig::default())
}

#[test]
fn test_single_triangle_floor() {
    let mut w = world();
    let id = w.insert_static(tri([0, 0, 0], [0, 0, 100], [100, 0, 0]));

    let hit = w.find_floor(25.0, 50.0, 25.0).expect("floor under the point");
    assert_eq!(hit.height, 0.0);
    assert_eq!(hit.surface, id);

    // 50 units under the floor is still inside the 78-unit step-up buffer.
    let hit = w.find_floor(25.0, -50.0, 25.0).expect("floor within buffer");
    assert_eq!(hit.height, 0.0);

    // Past the buffer.
    assert!(w.find_floor(25.0, -100.0, 25.0).is_none());
    // Outside the XZ projection.
    assert!(w.find_floor(90.0, 50.0, 90.0).is_none());
}

#[test]
fn test_winding_decides_facing() {
    let mut w = world();
    // Same corners, opposite winding: this one faces down.
    let s = tri([0, 0, 0], [100, 0, 0], [0, 0, 100]);
    assert!(s.normal.y < 0.0);
    assert_eq!(w.grid().classify(&s), SurfaceList::Ceilings);
    w.insert_static(s);

    assert!(w.find_floor(25.0, 50.0, 25.0).is_none());
    let hit = w.find_ceil(25.0, -50.0, 25.0).expect("ceiling above the point");
    assert!(hit.height.abs() < 1e-3);
}

#[test]
fn test_floor_matches_plane_at_random_points() {
    let mut w = world();
    // y = 200 + x / 4 - z / 8
    let a = [-2000, 0, -2000];
    let b = [-2000, 0, 2000];
    let c = [2000, 0, -2000];
    let height = |x: f32, z: f32| 200.0 + x / 4.0 - z / 8.0;
    let lift = |p: [i32; 3]| [p[0], height(p[0] as f32, p[2] as f32) as i32, p[2]];
    w.insert_static(tri(lift(a), lift(b), lift(c)));

    let mut rng = StdRng::seed_from_u64(0x5EED);
    for _ in 0..500 {
        let x = rng.gen_range(-1990..0);
        let z = rng.gen_range(-1990..(-x - 10));
        let (xf, zf) = (x as f32, z as f32);
        let expected = height(xf, zf);
        let hit = w.find_floor(xf, expected + 10.0, zf).expect("point is over the triangle");
        assert!(
            (hit.height - expected).abs() < 0.05,
            "({x}, {z}): got {}, expected {expected}",
            hit.height
        );
    }
    assert_eq!(w.stats().snapshot().floor_misses, 0);
}

#[test]
fn test_wall_push_equals_penetration() {
    let mut w = world();
    // Thin wall in the x = 300 plane.
    let wall = tri([300, 0, -500], [300, 0, 500], [300, 1000, -500]);
    let side = wall.normal.x.signum();
    w.insert_static(wall);

    for dist in [5.0f32, 20.0, 49.0] {
        let start = Vec3::new(300.0 + dist * side, 0.0, 0.0);
        let mut data = WallCollisionData::new(start, 60.0, 50.0);
        assert_eq!(w.find_wall_collisions(&mut data), 1);
        let push = data.x - start.x;
        assert!((push - (50.0 - dist) * side).abs() < 1e-3, "dist {dist}: push {push}");
        assert_eq!(data.z, 0.0);
        assert_eq!(data.y, 0.0);
    }

    // Too far away.
    let mut data = WallCollisionData::new(Vec3::new(300.0 + 60.0 * side, 0.0, 0.0), 60.0, 50.0);
    assert_eq!(w.find_wall_collisions(&mut data), 0);
    assert_eq!(data.num_walls(), 0);

    // Above the wall.
    let mut data = WallCollisionData::new(Vec3::new(300.0 + 10.0 * side, 1100.0, 0.0), 60.0, 50.0);
    assert_eq!(w.find_wall_collisions(&mut data), 0);
}

#[test]
fn test_player_velocity_mirrors_push() {
    let mut w = world();
    let wall = tri([300, 0, -500], [300, 0, 500], [300, 1000, -500]);
    let side = wall.normal.x.signum();
    w.insert_static(wall);

    // Moving away from the wall: the outward push would add to the motion.
    // z = 300 keeps the sphere inside a single cell.
    let mover = WallMover { velocity: Some(Vec3::new(8.0 * side, 0.0, 0.0)), passes_vanish_walls: false };
    let mut data = WallCollisionData::new(Vec3::new(300.0 + 20.0 * side, 0.0, 300.0), 60.0, 50.0).with_mover(mover);
    w.find_wall_collisions(&mut data);
    assert!((data.x - (300.0 - 10.0 * side)).abs() < 1e-3);
}

#[test]
fn test_layered_floors_and_dynamic_preference() {
    let mut w = world();
    w.insert_static(tri([0, 0, 0], [0, 0, 1000], [1000, 0, 0]));
    let upper = w.insert_static(tri([0, 60, 0], [0, 60, 1000], [1000, 60, 0]));
    w.insert_dynamic(tri([0, 30, 0], [0, 30, 1000], [1000, 30, 0]));

    // Static 60 is above the dynamic 30 and in range.
    assert_eq!(w.find_floor(100.0, 70.0, 100.0).map(|h| h.surface), Some(upper));

    // Dynamic strictly above the static floor wins.
    w.clear_partition(Partition::Dynamic);
    let lift_high = w.insert_dynamic(tri([0, 90, 0], [0, 90, 1000], [1000, 90, 0]));
    assert_eq!(w.find_floor(100.0, 100.0, 100.0).map(|h| h.surface), Some(lift_high));

    // Return-first stops at the first acceptable floor in list order.
    w.set_query_flags(QueryFlags::RETURN_FIRST | QueryFlags::EXCLUDE_DYNAMIC);
    let first = w.find_floor(100.0, 100.0, 100.0).expect("some static floor");
    assert_eq!(first.surface, upper);
}

#[test]
fn test_stateless_queries_share_world() {
    let mut w = world();
    w.insert_static(tri([-1000, 0, -1000], [-1000, 0, 1000], [1000, 0, -1000]));
    let w = &w;

    std::thread::scope(|scope| {
        for t in 0..4 {
            scope.spawn(move || {
                for i in 0..100 {
                    let x = -900.0 + (t * 100 + i) as f32;
                    let hit = w.find_floor_with(x, 10.0, -900.0, QueryFlags::NONE);
                    assert_eq!(hit.map(|h| h.height), Some(0.0));
                }
            });
        }
    });
    assert_eq!(w.stats().snapshot().floor, 400);
}
