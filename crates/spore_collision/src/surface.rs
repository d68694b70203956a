//! # Surfaces
//!
//! A surface is one collision triangle with everything the queries need
//! precomputed at load time: the unit normal, the plane offset and a padded
//! Y range for cheap rejection.

use std::fmt;

use spore_shared::{Vec3, Vec3i};

/// Padding added above and below a surface's vertex Y range.
pub const SURFACE_VERTICAL_BUFFER: i32 = 5;

/// Normals shorter than this mark a degenerate triangle.
const MIN_NORMAL_MAGNITUDE: f32 = 0.0001;

// =============================================================================
// SURFACE TYPE
// =============================================================================

/// Terrain type of a surface, as authored in collision data.
///
/// Unknown values are preserved; the queries only single out the types
/// listed here.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct SurfaceType(pub u16);

impl SurfaceType {
    /// Plain ground.
    pub const DEFAULT: Self = Self(0x0000);
    /// Unused type that still carries a force parameter.
    pub const FORCE_0004: Self = Self(0x0004);
    /// Ceiling the player can hang from.
    pub const HANGABLE: Self = Self(0x0005);
    /// Flowing water current.
    pub const FLOWING_WATER: Self = Self(0x000E);
    /// Ignored by floor queries unless intangible floors are requested.
    pub const INTANGIBLE: Self = Self(0x0012);
    /// Deep quicksand that drifts.
    pub const DEEP_MOVING_QUICKSAND: Self = Self(0x0024);
    /// Shallow quicksand that drifts.
    pub const SHALLOW_MOVING_QUICKSAND: Self = Self(0x0025);
    /// Standing quicksand.
    pub const QUICKSAND: Self = Self(0x0026);
    /// Quicksand that drifts.
    pub const MOVING_QUICKSAND: Self = Self(0x0027);
    /// Horizontal wind.
    pub const HORIZONTAL_WIND: Self = Self(0x002C);
    /// Instant-sink quicksand that drifts.
    pub const INSTANT_MOVING_QUICKSAND: Self = Self(0x002D);
    /// Only the camera collides with it.
    pub const CAMERA_BOUNDARY: Self = Self(0x0072);
    /// The camera passes through.
    pub const NO_CAM_COLLISION: Self = Self(0x0076);
    /// The camera passes through (second variant).
    pub const NO_CAM_COLLISION_77: Self = Self(0x0077);
    /// Very slippery, and the camera passes through.
    pub const NO_CAM_COL_VERY_SLIPPERY: Self = Self(0x0078);
    /// Switch top, the camera passes through.
    pub const SWITCH: Self = Self(0x007A);
    /// Walls that vanish-capped movers pass through.
    pub const VANISH_CAP_WALLS: Self = Self(0x007B);
    /// Water surface.
    pub const WATER: Self = Self(0x00FD);
    /// Underside of a body of water.
    pub const WATER_BOTTOM: Self = Self(0x00FE);

    /// Whether triangles of this type carry an extra force word in
    /// collision data.
    #[must_use]
    pub const fn has_force(self) -> bool {
        matches!(self.0, 0x0004 | 0x000E | 0x0024 | 0x0025 | 0x0027 | 0x002C | 0x002D)
    }

    /// Whether the camera ignores surfaces of this type.
    #[must_use]
    pub const fn has_no_cam_collision(self) -> bool {
        matches!(self.0, 0x0076 | 0x0077 | 0x0078 | 0x007A)
    }

    /// Whether the surface belongs in the water list.
    #[inline]
    #[must_use]
    pub const fn is_water(self) -> bool {
        self.0 == Self::WATER.0 || self.0 == Self::WATER_BOTTOM.0
    }
}

impl fmt::Display for SurfaceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#06x}", self.0)
    }
}

// =============================================================================
// FLAGS AND OWNERS
// =============================================================================

/// Per-surface flag bits.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct SurfaceFlags(pub u8);

impl SurfaceFlags {
    /// No flags.
    pub const NONE: Self = Self(0);
    /// Belongs to a moving object.
    pub const DYNAMIC: Self = Self(1 << 0);
    /// The camera passes through.
    pub const NO_CAM_COLLISION: Self = Self(1 << 1);

    /// Whether every bit of `other` is set.
    #[inline]
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl std::ops::BitOr for SurfaceFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl std::ops::BitOrAssign for SurfaceFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

/// Identifies the object that owns a dynamic surface.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ObjectId(pub u32);

// =============================================================================
// SURFACE
// =============================================================================

/// A collision triangle.
#[derive(Clone, Debug, PartialEq)]
pub struct Surface {
    /// Corners in authored winding order.
    pub vertices: [Vec3i; 3],
    /// Unit normal, `cross(v2 - v1, v3 - v2)` normalized.
    pub normal: Vec3,
    /// Plane offset: `normal . p + origin_offset == 0` on the plane.
    pub origin_offset: f32,
    /// Lowest vertex Y minus the vertical buffer.
    pub lower_y: i32,
    /// Highest vertex Y plus the vertical buffer.
    pub upper_y: i32,
    /// Terrain type.
    pub kind: SurfaceType,
    /// Force parameter (currents, wind, drifting quicksand).
    pub force: i16,
    /// Flag bits.
    pub flags: SurfaceFlags,
    /// Room index, `-1` for none.
    pub room: i8,
    /// Owning object of a dynamic surface.
    pub owner: Option<ObjectId>,
}

impl Surface {
    /// Builds a surface from three corners.
    ///
    /// Returns `None` for degenerate (zero-area) triangles.
    #[must_use]
    pub fn new(vertices: [Vec3i; 3], kind: SurfaceType) -> Option<Self> {
        let [v1, v2, v3] = vertices.map(Vec3::from);
        let normal = (v2 - v1).cross(v3 - v2);
        let mag = normal.length();
        if mag < MIN_NORMAL_MAGNITUDE {
            return None;
        }
        let normal = normal * (1.0 / mag);

        let min_y = vertices.iter().map(|v| v.y).min().unwrap_or_default();
        let max_y = vertices.iter().map(|v| v.y).max().unwrap_or_default();

        let mut flags = SurfaceFlags::NONE;
        if kind.has_no_cam_collision() {
            flags |= SurfaceFlags::NO_CAM_COLLISION;
        }

        Some(Self {
            vertices,
            normal,
            origin_offset: -normal.dot(v1),
            lower_y: min_y - SURFACE_VERTICAL_BUFFER,
            upper_y: max_y + SURFACE_VERTICAL_BUFFER,
            kind,
            force: 0,
            flags,
            room: -1,
            owner: None,
        })
    }

    /// Sets the force parameter.
    #[must_use]
    pub fn with_force(mut self, force: i16) -> Self {
        self.force = force;
        self
    }

    /// Sets the room index.
    #[must_use]
    pub fn with_room(mut self, room: i8) -> Self {
        self.room = room;
        self
    }

    /// Marks the surface as belonging to `owner`.
    #[must_use]
    pub fn with_owner(mut self, owner: ObjectId) -> Self {
        self.owner = Some(owner);
        self.flags |= SurfaceFlags::DYNAMIC;
        self
    }

    /// Signed distance from `p` to the surface plane.
    #[inline]
    #[must_use]
    pub fn signed_distance(&self, p: Vec3) -> f32 {
        self.normal.dot(p) + self.origin_offset
    }

    /// Height of the surface plane at `(x, z)`.
    ///
    /// Only meaningful for surfaces that are not vertical.
    #[inline]
    #[must_use]
    pub fn height_at(&self, x: f32, z: f32) -> f32 {
        -(x * self.normal.x + z * self.normal.z + self.origin_offset) / self.normal.y
    }

    /// XZ bounding box as `(min_x, max_x, min_z, max_z)`.
    #[must_use]
    pub fn bounds_xz(&self) -> (i32, i32, i32, i32) {
        let [a, b, c] = self.vertices;
        (
            a.x.min(b.x).min(c.x),
            a.x.max(b.x).max(c.x),
            a.z.min(b.z).min(c.z),
            a.z.max(b.z).max(c.z),
        )
    }

    /// Whether `(x, z)` is inside the XZ projection of an upward-facing
    /// triangle. Points on an edge are inside.
    #[must_use]
    pub fn contains_xz_floor(&self, x: i32, z: i32) -> bool {
        let [a, b, c] = self.vertices.map(|v| (i64::from(v.x), i64::from(v.z)));
        let p = (i64::from(x), i64::from(z));
        edge(a, b, p) >= 0 && edge(b, c, p) >= 0 && edge(c, a, p) >= 0
    }

    /// Whether `(x, z)` is inside the XZ projection of a downward-facing
    /// triangle, after moving each corner `margin` units toward the other
    /// two. Points on an edge are inside.
    #[must_use]
    pub fn contains_xz_ceil(&self, x: i32, z: i32, margin: f32) -> bool {
        let [v1, v2, v3] = self.vertices;
        let corners = if margin == 0.0 {
            self.vertices.map(|v| (i64::from(v.x), i64::from(v.z)))
        } else {
            [
                inset_corner(v1, v2, v3, margin),
                inset_corner(v2, v3, v1, margin),
                inset_corner(v3, v1, v2, margin),
            ]
        };
        let [a, b, c] = corners;
        let p = (i64::from(x), i64::from(z));
        edge(a, b, p) <= 0 && edge(b, c, p) <= 0 && edge(c, a, p) <= 0
    }
}

/// Signed area term of `p` against edge `a -> b` in XZ.
#[inline]
fn edge(a: (i64, i64), b: (i64, i64), p: (i64, i64)) -> i64 {
    (a.1 - p.1) * (b.0 - a.0) - (a.0 - p.0) * (b.1 - a.1)
}

/// Moves `v` toward `t1` and `t2` by `margin` in XZ, truncating to whole
/// units.
fn inset_corner(v: Vec3i, t1: Vec3i, t2: Vec3i, margin: f32) -> (i64, i64) {
    let dx = (t1.x - v.x + t2.x - v.x) as f32;
    let dz = (t1.z - v.z + t2.z - v.z) as f32;
    let len = (dx * dx + dz * dz).sqrt();
    if len == 0.0 {
        return (i64::from(v.x), i64::from(v.z));
    }
    let scale = margin / len;
    (
        (v.x as f32 + dx * scale) as i64,
        (v.z as f32 + dz * scale) as i64,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(x: i32, y: i32, z: i32) -> Vec3i {
        Vec3i::new(x, y, z)
    }

    #[test]
    fn test_upward_floor() {
        let s = Surface::new([v(0, 0, 0), v(0, 0, 100), v(100, 0, 0)], SurfaceType::DEFAULT).unwrap();
        assert!((s.normal.y - 1.0).abs() < 1e-6);
        assert_eq!(s.origin_offset, 0.0);
        assert_eq!((s.lower_y, s.upper_y), (-5, 5));
        assert!(s.contains_xz_floor(25, 25));
        assert!(s.contains_xz_floor(0, 0));
        assert!(s.contains_xz_floor(50, 50));
        assert!(!s.contains_xz_floor(60, 60));
        assert!(!s.contains_xz_floor(-1, 10));
    }

    #[test]
    fn test_opposite_winding_faces_down() {
        let s = Surface::new([v(0, 0, 0), v(100, 0, 0), v(0, 0, 100)], SurfaceType::DEFAULT).unwrap();
        assert!((s.normal.y + 1.0).abs() < 1e-6);
        assert!(s.contains_xz_ceil(25, 25, 0.0));
        assert!(!s.contains_xz_floor(25, 25));
    }

    #[test]
    fn test_sloped_height() {
        // Rises 1 unit in Y per unit of X.
        let s = Surface::new([v(0, 0, 0), v(0, 0, 100), v(100, 100, 0)], SurfaceType::DEFAULT).unwrap();
        assert!(s.normal.y > 0.0);
        assert!((s.height_at(30.0, 10.0) - 30.0).abs() < 1e-3);
        assert_eq!(s.upper_y, 105);
    }

    #[test]
    fn test_degenerate_rejected() {
        assert!(Surface::new([v(0, 0, 0), v(10, 0, 0), v(20, 0, 0)], SurfaceType::DEFAULT).is_none());
        assert!(Surface::new([v(5, 5, 5); 3], SurfaceType::DEFAULT).is_none());
    }

    #[test]
    fn test_ceil_margin_shrinks_triangle() {
        let s = Surface::new([v(0, 100, 0), v(100, 100, 0), v(0, 100, 100)], SurfaceType::DEFAULT).unwrap();
        assert!(s.contains_xz_ceil(0, 0, 0.0));
        assert!(!s.contains_xz_ceil(0, 0, 1.5));
        assert!(s.contains_xz_ceil(10, 10, 1.5));
    }

    #[test]
    fn test_type_properties() {
        assert!(SurfaceType::FLOWING_WATER.has_force());
        assert!(!SurfaceType::QUICKSAND.has_force());
        assert!(SurfaceType::WATER_BOTTOM.is_water());
        let s = Surface::new([v(0, 0, 0), v(0, 0, 100), v(100, 0, 0)], SurfaceType::SWITCH).unwrap();
        assert!(s.flags.contains(SurfaceFlags::NO_CAM_COLLISION));
        let owned = s.with_owner(ObjectId(3));
        assert!(owned.flags.contains(SurfaceFlags::DYNAMIC | SurfaceFlags::NO_CAM_COLLISION));
    }
}
