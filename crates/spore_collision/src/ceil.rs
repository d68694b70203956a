//! Segment raycasts and the ceiling list scan.

use spore_shared::{Vec3, Vec3i};

use crate::flags::QueryFlags;
use crate::floor::{camera_skips, SurfaceHit};
use crate::partition::SurfaceId;
use crate::surface::{Surface, SurfaceType};

/// Denominators below this mean the segment runs parallel to the plane.
const PARALLEL_EPSILON: f32 = 0.0001;

/// Where a segment crosses a surface.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RayHit {
    /// Fraction of the segment travelled, in `[0, 1]`.
    pub t: f32,
    /// Intersection point.
    pub point: Vec3,
    /// The surface hit.
    pub surface: SurfaceId,
}

/// Thresholds that decide which lateral test a surface gets.
#[derive(Clone, Copy, Debug)]
pub(crate) struct LateralRules {
    /// Surfaces with `normal.y` at or below this use the ceiling test.
    pub ceil_threshold: f32,
    /// Inward margin for ceiling-like surfaces that qualify.
    pub ceil_margin: f32,
    /// Ceilings with `normal.y` above this get the margin.
    pub steep_ceil_normal: f32,
}

impl LateralRules {
    fn ceil_margin_for(&self, surface: &Surface) -> f32 {
        if surface.kind != SurfaceType::HANGABLE && surface.normal.y > self.steep_ceil_normal {
            self.ceil_margin
        } else {
            0.0
        }
    }
}

/// Intersects segment `p0 -> p1` with `surface`.
///
/// The hit point is then checked against the triangle in XZ: floor-like
/// surfaces and walls with the floor test, ceiling-like surfaces with the
/// ceiling test.
pub(crate) fn segment_triangle(p0: Vec3, p1: Vec3, surface: &Surface, rules: &LateralRules) -> Option<(f32, Vec3)> {
    let dir = p1 - p0;
    let denom = surface.normal.dot(dir);
    if denom.abs() < PARALLEL_EPSILON {
        return None;
    }

    let t = -surface.signed_distance(p0) / denom;
    if !(0.0..=1.0).contains(&t) {
        return None;
    }

    let hit = p0 + dir * t;
    let (hx, hz) = (hit.x as i32, hit.z as i32);
    let inside = if surface.normal.y <= rules.ceil_threshold {
        surface.contains_xz_ceil(hx, hz, rules.ceil_margin_for(surface))
    } else {
        surface.contains_xz_floor(hx, hz)
    };

    inside.then_some((t, hit))
}

/// Nearest ceiling crossed by the upward ray from `start`.
pub(crate) fn scan_ceilings<'a>(
    ceilings: impl Iterator<Item = (SurfaceId, &'a Surface)>,
    start: Vec3i,
    ray_length: f32,
    height_limit: f32,
    rules: &LateralRules,
    flags: QueryFlags,
) -> Option<SurfaceHit> {
    let p0 = Vec3::from(start);
    let p1 = Vec3::new(p0.x, p0.y + ray_length, p0.z);

    let mut best_t = 1.0;
    let mut best = None;

    for (id, surface) in ceilings {
        if start.y > surface.upper_y || camera_skips(surface, flags) {
            continue;
        }
        if let Some((t, hit)) = segment_triangle(p0, p1, surface, rules) {
            if t < best_t {
                best_t = t;
                best = Some((id, hit.y));
            }
        }
    }

    best.filter(|&(_, height)| height <= height_limit && p0.y <= height)
        .map(|(surface, height)| SurfaceHit { height, surface })
}

/// Nearest surface crossed by `p0 -> p1` among `candidates`.
pub(crate) fn scan_segment<'a>(
    candidates: impl Iterator<Item = (SurfaceId, &'a Surface)>,
    p0: Vec3,
    p1: Vec3,
    rules: &LateralRules,
    flags: QueryFlags,
) -> Option<RayHit> {
    let mut best: Option<RayHit> = None;
    for (id, surface) in candidates {
        if camera_skips(surface, flags) {
            continue;
        }
        if let Some((t, point)) = segment_triangle(p0, p1, surface, rules) {
            if best.map_or(true, |b| t < b.t) {
                best = Some(RayHit { t, point, surface: id });
            }
        }
    }
    best
}
