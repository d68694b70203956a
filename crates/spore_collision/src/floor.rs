//! Floor list scan.

use crate::flags::QueryFlags;
use crate::partition::SurfaceId;
use crate::surface::{Surface, SurfaceFlags, SurfaceType};

/// A surface found by a floor or ceiling query.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SurfaceHit {
    /// Plane height at the query point.
    pub height: f32,
    /// The surface hit.
    pub surface: SurfaceId,
}

/// Whether a query in `flags` mode ignores `surface` for camera reasons.
#[inline]
pub(crate) fn camera_skips(surface: &Surface, flags: QueryFlags) -> bool {
    if flags.contains(QueryFlags::CAMERA) {
        surface.flags.contains(SurfaceFlags::NO_CAM_COLLISION)
    } else {
        surface.kind == SurfaceType::CAMERA_BOUNDARY
    }
}

/// Highest floor in `floors` at or below `y + buffer`, strictly above
/// `best`.
pub(crate) fn scan_floors<'a>(
    floors: impl Iterator<Item = (SurfaceId, &'a Surface)>,
    x: i32,
    y: i32,
    z: i32,
    buffer: i32,
    mut best: f32,
    flags: QueryFlags,
) -> Option<SurfaceHit> {
    let buffer_y = y.saturating_add(buffer);
    let include_intangible = flags.contains(QueryFlags::INCLUDE_INTANGIBLE);
    let mut found = None;

    for (id, surface) in floors {
        if !include_intangible && surface.kind == SurfaceType::INTANGIBLE {
            continue;
        }
        if camera_skips(surface, flags) {
            continue;
        }
        if buffer_y < surface.lower_y {
            continue;
        }
        if !surface.contains_xz_floor(x, z) {
            continue;
        }

        let height = surface.height_at(x as f32, z as f32);
        if height <= best || (buffer_y as f32) < height {
            continue;
        }

        best = height;
        found = Some(SurfaceHit { height, surface: id });

        if height == buffer_y as f32 || flags.contains(QueryFlags::RETURN_FIRST) {
            break;
        }
    }

    found
}
