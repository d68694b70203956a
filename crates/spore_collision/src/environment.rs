//! Environment regions: flat water and poison gas boxes.
//!
//! Some bodies of water are not modelled with water surfaces. Level data
//! lists them as axis-aligned XZ rectangles with a surface height instead.

/// One environment rectangle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EnvironmentRegion {
    /// Region type. Values below the gas cutoff are water.
    pub id: i16,
    /// Low X edge (exclusive).
    pub lo_x: i16,
    /// Low Z edge (exclusive).
    pub lo_z: i16,
    /// High X edge (exclusive).
    pub hi_x: i16,
    /// High Z edge (exclusive).
    pub hi_z: i16,
    /// Surface height.
    pub height: i16,
}

impl EnvironmentRegion {
    /// Whether `(x, z)` lies strictly inside the rectangle. The point is
    /// truncated to whole units first, like every other collision query.
    #[inline]
    #[must_use]
    pub fn contains(&self, x: f32, z: f32) -> bool {
        let (x, z) = (x as i32, z as i32);
        i32::from(self.lo_x) < x && x < i32::from(self.hi_x) && i32::from(self.lo_z) < z && z < i32::from(self.hi_z)
    }

    /// Whether this is a poison gas region under `gas_cutoff`.
    #[inline]
    #[must_use]
    pub const fn is_gas(&self, gas_cutoff: i16) -> bool {
        self.id >= gas_cutoff
    }
}

/// Height of the first region of the requested kind containing `(x, z)`.
pub(crate) fn region_level(
    regions: &[EnvironmentRegion],
    x: f32,
    z: f32,
    gas_cutoff: i16,
    gas: bool,
) -> Option<f32> {
    regions
        .iter()
        .find(|r| r.is_gas(gas_cutoff) == gas && r.contains(x, z))
        .map(|r| f32::from(r.height))
}
