//! Math type re-exports and scan-specific math utilities.
//!
//! This module re-exports types from `glam` and provides the axis-aligned
//! bounding box used when framing decoded scans.

// Re-export glam types
pub use glam::{Mat3, Mat4, Quat, Vec2, Vec3, Vec4};

use bytemuck::{Pod, Zeroable};
use std::fmt;

/// 3D axis-aligned bounding box with single precision.
#[derive(Clone, Copy, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct BBox3f {
    pub min: Vec3,
    pub max: Vec3,
}

impl BBox3f {
    /// Empty bounding box (inverted, will expand on first point).
    pub const EMPTY: Self = Self {
        min: Vec3::splat(f32::INFINITY),
        max: Vec3::splat(f32::NEG_INFINITY),
    };

    /// Create a new bounding box from min and max points.
    #[inline]
    pub const fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Check if this box is empty (has no volume).
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y || self.min.z > self.max.z
    }

    /// Expand this box to include a point.
    #[inline]
    pub fn expand_by_point(&mut self, p: Vec3) {
        self.min = self.min.min(p);
        self.max = self.max.max(p);
    }

    /// Expand this box to include another box.
    #[inline]
    pub fn expand_by_box(&mut self, other: &Self) {
        if !other.is_empty() {
            self.min = self.min.min(other.min);
            self.max = self.max.max(other.max);
        }
    }

    /// Get the center of the box.
    #[inline]
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    /// Get the size (extents) of the box.
    #[inline]
    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }
}

impl Default for BBox3f {
    fn default() -> Self {
        Self::EMPTY
    }
}

impl fmt::Debug for BBox3f {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BBox3f({:?} - {:?})", self.min, self.max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bbox3f() {
        let mut b = BBox3f::EMPTY;
        assert!(b.is_empty());

        b.expand_by_point(Vec3::ZERO);
        assert!(!b.is_empty());
        assert_eq!(b.min, Vec3::ZERO);
        assert_eq!(b.max, Vec3::ZERO);

        b.expand_by_point(Vec3::ONE);
        assert_eq!(b.min, Vec3::ZERO);
        assert_eq!(b.max, Vec3::ONE);
        assert_eq!(b.center(), Vec3::splat(0.5));
        assert_eq!(b.size(), Vec3::ONE);
    }

    #[test]
    fn test_bbox_pod() {
        // Verify that BBox3f is Pod-compatible for handoff to renderers
        assert_eq!(std::mem::size_of::<BBox3f>(), 24); // 2 * Vec3 = 2 * 12
    }
}
