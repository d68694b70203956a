//! Water surface scan.
//!
//! Modelled water comes in pairs: a water-bottom surface marks the floor of
//! a body of water and ordinary water surfaces mark its top. The top that
//! counts is the highest one not above the bottom found under the point.

use crate::floor::SurfaceHit;
use crate::partition::SurfaceId;
use crate::surface::{Surface, SurfaceType};

/// Thresholds used by the water scan.
#[derive(Clone, Copy, Debug)]
pub(crate) struct WaterRules {
    pub floor_threshold: f32,
    pub buffer: i32,
    pub lower_limit: f32,
}

fn within_bounds(surface: &Surface, x: i32, z: i32, floor_threshold: f32) -> bool {
    if surface.normal.y >= floor_threshold {
        surface.contains_xz_floor(x, z)
    } else {
        surface.contains_xz_ceil(x, z, 0.0)
    }
}

/// Highest water surface at `(x, z)`, capped by the water bottom above
/// `y + buffer`.
pub(crate) fn scan_water<'a, I>(water: I, x: i32, y: i32, z: i32, rules: WaterRules) -> Option<SurfaceHit>
where
    I: Iterator<Item = (SurfaceId, &'a Surface)> + Clone,
{
    let mut bottom: Option<f32> = None;
    for (_, surface) in water.clone() {
        if surface.kind != SurfaceType::WATER_BOTTOM || surface.normal.y.abs() < rules.floor_threshold {
            continue;
        }
        if !within_bounds(surface, x, z, rules.floor_threshold) {
            continue;
        }
        let height = surface.height_at(x as f32, z as f32);
        if height >= y.saturating_add(rules.buffer) as f32 {
            bottom = Some(height);
        }
    }

    let mut best_height = rules.lower_limit;
    let mut best = None;
    for (id, surface) in water {
        if surface.kind == SurfaceType::WATER_BOTTOM || surface.normal.y.abs() < rules.floor_threshold {
            continue;
        }
        if !within_bounds(surface, x, z, rules.floor_threshold) {
            continue;
        }
        let height = surface.height_at(x as f32, z as f32);
        if bottom.is_some_and(|b| height > b) {
            continue;
        }
        if height > best_height {
            best_height = height;
            best = Some(SurfaceHit { height, surface: id });
        }
    }
    best
}
