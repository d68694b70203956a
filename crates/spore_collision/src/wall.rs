//! # Wall Collisions
//!
//! A mover is a sphere of `radius` centred `offset_y` above its feet. Every
//! near-vertical surface the sphere overlaps pushes it out, in XZ only, and
//! each push feeds into the next test so corners resolve in one pass.

use spore_shared::Vec3;

use crate::flags::QueryFlags;
use crate::floor::camera_skips;
use crate::partition::SurfaceId;
use crate::surface::{Surface, SurfaceType};

/// Walls a single query can hand back.
pub const WALL_CAPACITY: usize = 4;

/// Squared lengths below this count as zero.
const NEAR_ZERO: f32 = 1e-6;

/// What the wall query knows about the thing being pushed.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct WallMover {
    /// Player velocity. When set, pushes pointing along it in XZ are
    /// mirrored.
    pub velocity: Option<Vec3>,
    /// Passes through vanish-cap walls.
    pub passes_vanish_walls: bool,
}

/// Input and output of a wall query.
#[derive(Clone, Debug, PartialEq)]
pub struct WallCollisionData {
    /// X position; updated with the resolved position.
    pub x: f32,
    /// Y position of the mover's feet.
    pub y: f32,
    /// Z position; updated with the resolved position.
    pub z: f32,
    /// Height of the sphere centre above `y`.
    pub offset_y: f32,
    /// Sphere radius.
    pub radius: f32,
    /// Mover context.
    pub mover: WallMover,
    walls: [Option<SurfaceId>; WALL_CAPACITY],
    num_walls: usize,
}

impl WallCollisionData {
    /// Query for a sphere at `pos`.
    #[must_use]
    pub fn new(pos: Vec3, offset_y: f32, radius: f32) -> Self {
        Self {
            x: pos.x,
            y: pos.y,
            z: pos.z,
            offset_y,
            radius,
            mover: WallMover::default(),
            walls: [None; WALL_CAPACITY],
            num_walls: 0,
        }
    }

    /// Attaches mover context.
    #[must_use]
    pub fn with_mover(mut self, mover: WallMover) -> Self {
        self.mover = mover;
        self
    }

    /// Current (resolved) position.
    #[inline]
    #[must_use]
    pub fn position(&self) -> Vec3 {
        Vec3::new(self.x, self.y, self.z)
    }

    /// Walls recorded by the last query, in hit order.
    pub fn walls(&self) -> impl Iterator<Item = SurfaceId> + '_ {
        self.walls[..self.num_walls].iter().flatten().copied()
    }

    /// Number of walls recorded.
    #[inline]
    #[must_use]
    pub fn num_walls(&self) -> usize {
        self.num_walls
    }

    /// Most recently recorded wall.
    #[must_use]
    pub fn last_wall(&self) -> Option<SurfaceId> {
        self.num_walls.checked_sub(1).and_then(|i| self.walls[i])
    }

    pub(crate) fn reset_walls(&mut self) {
        self.walls = [None; WALL_CAPACITY];
        self.num_walls = 0;
    }

    fn record(&mut self, id: SurfaceId, limit: usize) {
        if self.num_walls < limit.min(WALL_CAPACITY) {
            self.walls[self.num_walls] = Some(id);
            self.num_walls += 1;
        }
    }
}

/// Push that moves a sphere at `pos` out of `surface`, or `None` when they
/// do not touch.
///
/// The contact point is the projection onto the plane when it falls inside
/// the triangle, otherwise the nearest point on the nearest edge. Works for
/// either side of the surface.
#[must_use]
pub fn sphere_push(pos: Vec3, radius: f32, surface: &Surface) -> Option<Vec3> {
    let dist = surface.signed_distance(pos);
    let abs_dist = dist.abs();
    if abs_dist >= radius {
        return None;
    }

    let normal = surface.normal;
    let proj = pos - normal * dist;
    let [v0, v1, v2] = surface.vertices.map(Vec3::from);

    let closest = if projection_inside(proj, v0, v1, v2) {
        proj
    } else {
        [
            Vec3::closest_on_segment(v0, v1, pos),
            Vec3::closest_on_segment(v1, v2, pos),
            Vec3::closest_on_segment(v2, v0, pos),
        ]
        .into_iter()
        .fold((f32::INFINITY, proj), |best, c| {
            let d = pos.distance_squared(c);
            if d < best.0 {
                (d, c)
            } else {
                best
            }
        })
        .1
    };

    let delta = pos - closest;
    let dist_sq = delta.length_squared();
    if dist_sq <= NEAR_ZERO {
        let penetration = radius - abs_dist;
        if penetration <= 0.0 {
            return None;
        }
        let sign = if dist >= 0.0 { 1.0 } else { -1.0 };
        return Some(normal * (penetration * sign));
    }

    let len = dist_sq.sqrt();
    if len >= radius {
        return None;
    }
    Some(delta * ((radius - len) / len))
}

/// Barycentric inside test for a point already on the triangle's plane.
fn projection_inside(p: Vec3, v0: Vec3, v1: Vec3, v2: Vec3) -> bool {
    let (e0, e1, vp) = (v1 - v0, v2 - v0, p - v0);
    let d00 = e0.dot(e0);
    let d01 = e0.dot(e1);
    let d11 = e1.dot(e1);
    let d20 = vp.dot(e0);
    let d21 = vp.dot(e1);

    let denom = d00 * d11 - d01 * d01;
    if denom.abs() <= NEAR_ZERO {
        return false;
    }
    let v = (d11 * d20 - d01 * d21) / denom;
    let w = (d00 * d21 - d01 * d20) / denom;
    let u = 1.0 - v - w;
    u >= 0.0 && v >= 0.0 && w >= 0.0
}

/// Limits a wall scan runs under.
#[derive(Clone, Copy, Debug)]
pub(crate) struct WallRules {
    pub normal_limit: f32,
    pub max_walls: usize,
}

/// Resolves `data` against one wall list. Returns the number of walls hit
/// and whether a return-first query should stop.
pub(crate) fn scan_walls<'a>(
    walls: impl Iterator<Item = (SurfaceId, &'a Surface)>,
    data: &mut WallCollisionData,
    rules: WallRules,
    flags: QueryFlags,
) -> (usize, bool) {
    let radius = data.radius;
    let mut pos = Vec3::new(data.x, data.y + data.offset_y, data.z);
    let mut hits = 0;
    let mut stop = false;

    for (id, surface) in walls {
        if pos.y < surface.lower_y as f32 || pos.y > surface.upper_y as f32 {
            continue;
        }
        if surface.normal.y.abs() > rules.normal_limit {
            continue;
        }
        if camera_skips(surface, flags) {
            continue;
        }
        if !flags.contains(QueryFlags::CAMERA)
            && surface.kind == SurfaceType::VANISH_CAP_WALLS
            && data.mover.passes_vanish_walls
        {
            continue;
        }

        let offset = surface.signed_distance(pos);
        if offset < -radius || offset > radius {
            continue;
        }

        let Some(mut push) = sphere_push(pos, radius, surface) else {
            continue;
        };
        if let Some(vel) = data.mover.velocity {
            if vel.x * push.x + vel.z * push.z > 0.0 {
                push.x = -push.x;
                push.z = -push.z;
            }
        }

        pos.x += push.x;
        pos.z += push.z;
        data.record(id, rules.max_walls);
        hits += 1;

        if flags.contains(QueryFlags::RETURN_FIRST) {
            stop = true;
            break;
        }
    }

    data.x = pos.x;
    data.z = pos.z;
    (hits, stop)
}
