//! Query flag bits.

use std::ops::{BitAnd, BitOr, BitOrAssign, Not};

/// Modifiers for a single query.
///
/// Latched flags are consumed by the next floor, ceiling or wall query;
/// [`QueryFlags::CAMERA`] stays set until cleared explicitly.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct QueryFlags(pub u8);

impl QueryFlags {
    /// No modifiers.
    pub const NONE: Self = Self(0);
    /// The camera is asking: skip no-cam surfaces, keep camera boundaries.
    pub const CAMERA: Self = Self(1 << 0);
    /// Ignore the dynamic partition.
    pub const EXCLUDE_DYNAMIC: Self = Self(1 << 1);
    /// Let intangible floors count.
    pub const INCLUDE_INTANGIBLE: Self = Self(1 << 2);
    /// Stop at the first acceptable surface.
    pub const RETURN_FIRST: Self = Self(1 << 3);

    /// Flags a query clears once it has run.
    pub const TRANSIENT: Self =
        Self(Self::EXCLUDE_DYNAMIC.0 | Self::INCLUDE_INTANGIBLE.0 | Self::RETURN_FIRST.0);

    /// Whether every bit of `other` is set.
    #[inline]
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Whether no bit is set.
    #[inline]
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for QueryFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for QueryFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for QueryFlags {
    type Output = Self;

    fn bitand(self, rhs: Self) -> Self {
        Self(self.0 & rhs.0)
    }
}

impl Not for QueryFlags {
    type Output = Self;

    fn not(self) -> Self {
        Self(!self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_excludes_camera() {
        let flags = QueryFlags::CAMERA | QueryFlags::RETURN_FIRST;
        let kept = flags & !QueryFlags::TRANSIENT;
        assert_eq!(kept, QueryFlags::CAMERA);
        assert!(flags.contains(QueryFlags::RETURN_FIRST));
        assert!(!kept.contains(QueryFlags::RETURN_FIRST));
        assert!(QueryFlags::NONE.is_empty());
    }
}
