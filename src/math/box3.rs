//! World-space axis-aligned bounding box

use crate::core::types::{Vec3, Mat4};

/// Axis-aligned bounding box defined by min and max corners.
///
/// The empty box is represented with inverted infinite corners so that
/// merging a point or another box into it always works without a special
/// case.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Box3 {
    pub min: Vec3,
    pub max: Vec3,
}

impl Box3 {
    /// Create a box from min and max corners
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Create an empty box (any merge will overwrite it)
    pub fn empty() -> Self {
        Self {
            min: Vec3::INFINITY,
            max: Vec3::NEG_INFINITY,
        }
    }

    /// Reset to the empty state
    pub fn set_empty(&mut self) {
        self.min = Vec3::INFINITY;
        self.max = Vec3::NEG_INFINITY;
    }

    /// True when the box contains no points
    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y || self.min.z > self.max.z
    }

    /// Get center point
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    /// Get size (max - min)
    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }

    /// Index of the longest extent (0 = x, 1 = y, 2 = z)
    pub fn longest_axis(&self) -> usize {
        let s = self.size();
        if s.x >= s.y && s.x >= s.z {
            0
        } else if s.y >= s.z {
            1
        } else {
            2
        }
    }

    /// Corner by index, bit 0 = x, bit 1 = y, bit 2 = z
    pub fn corner(&self, index: u8) -> Vec3 {
        Vec3::new(
            if index & 1 != 0 { self.max.x } else { self.min.x },
            if index & 2 != 0 { self.max.y } else { self.min.y },
            if index & 4 != 0 { self.max.z } else { self.min.z },
        )
    }

    /// Check if point is inside the box
    pub fn contains_point(&self, p: Vec3) -> bool {
        p.x >= self.min.x && p.x <= self.max.x &&
        p.y >= self.min.y && p.y <= self.max.y &&
        p.z >= self.min.z && p.z <= self.max.z
    }

    /// Check if two boxes intersect
    pub fn intersects(&self, other: &Box3) -> bool {
        self.min.x <= other.max.x && self.max.x >= other.min.x &&
        self.min.y <= other.max.y && self.max.y >= other.min.y &&
        self.min.z <= other.max.z && self.max.z >= other.min.z
    }

    /// Expand the box to include a point
    pub fn expand(&mut self, point: Vec3) {
        self.min = self.min.min(point);
        self.max = self.max.max(point);
    }

    /// Grow this box to include another
    pub fn merge(&mut self, other: &Box3) {
        if other.is_empty() {
            return;
        }
        self.min = self.min.min(other.min);
        self.max = self.max.max(other.max);
    }

    /// Return a merged box containing both
    pub fn merged(&self, other: &Box3) -> Box3 {
        let mut out = *self;
        out.merge(other);
        out
    }

    /// Apply a transform, returning the box of the 8 transformed corners
    pub fn transformed(&self, matrix: &Mat4) -> Box3 {
        if self.is_empty() {
            return *self;
        }
        let mut out = Box3::empty();
        for i in 0..8 {
            out.expand(matrix.transform_point3(self.corner(i)));
        }
        out
    }

    /// Read a box from six packed floats (min xyz, max xyz)
    pub fn from_slice(data: &[f32]) -> Box3 {
        Box3 {
            min: Vec3::new(data[0], data[1], data[2]),
            max: Vec3::new(data[3], data[4], data[5]),
        }
    }

    /// Write the box into six packed floats (min xyz, max xyz)
    pub fn write_slice(&self, out: &mut [f32]) {
        out[0] = self.min.x;
        out[1] = self.min.y;
        out[2] = self.min.z;
        out[3] = self.max.x;
        out[4] = self.max.y;
        out[5] = self.max.z;
    }
}

impl Default for Box3 {
    fn default() -> Self {
        Self::empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_box() {
        let mut b = Box3::empty();
        assert!(b.is_empty());

        b.expand(Vec3::ONE);
        assert!(!b.is_empty());
        assert_eq!(b.min, Vec3::ONE);
        assert_eq!(b.max, Vec3::ONE);
    }

    #[test]
    fn test_accessors() {
        let b = Box3::new(Vec3::ZERO, Vec3::ONE);
        assert_eq!(b.center(), Vec3::splat(0.5));
        assert_eq!(b.size(), Vec3::ONE);
    }

    #[test]
    fn test_longest_axis() {
        let b = Box3::new(Vec3::ZERO, Vec3::new(1.0, 5.0, 2.0));
        assert_eq!(b.longest_axis(), 1);
        let b = Box3::new(Vec3::ZERO, Vec3::new(9.0, 5.0, 2.0));
        assert_eq!(b.longest_axis(), 0);
    }

    #[test]
    fn test_corner_pattern() {
        let b = Box3::new(Vec3::ZERO, Vec3::ONE);
        assert_eq!(b.corner(0), Vec3::ZERO);
        assert_eq!(b.corner(7), Vec3::ONE);
        assert_eq!(b.corner(1), Vec3::new(1.0, 0.0, 0.0));
        assert_eq!(b.corner(6), Vec3::new(0.0, 1.0, 1.0));
    }

    #[test]
    fn test_merge_with_empty() {
        let mut b = Box3::new(Vec3::ZERO, Vec3::ONE);
        b.merge(&Box3::empty());
        assert_eq!(b, Box3::new(Vec3::ZERO, Vec3::ONE));

        let mut e = Box3::empty();
        e.merge(&b);
        assert_eq!(e, b);
    }

    #[test]
    fn test_intersects() {
        let a = Box3::new(Vec3::ZERO, Vec3::ONE);
        let b = Box3::new(Vec3::splat(0.5), Vec3::splat(1.5));
        let c = Box3::new(Vec3::splat(2.0), Vec3::splat(3.0));
        assert!(a.intersects(&b));
        assert!(!a.intersects(&c));
    }

    #[test]
    fn test_transformed() {
        let b = Box3::new(Vec3::ZERO, Vec3::ONE);
        let m = Mat4::from_translation(Vec3::new(10.0, 0.0, 0.0));
        let t = b.transformed(&m);
        assert!((t.min - Vec3::new(10.0, 0.0, 0.0)).length() < 1e-5);
        assert!((t.max - Vec3::new(11.0, 1.0, 1.0)).length() < 1e-5);

        assert!(Box3::empty().transformed(&m).is_empty());
    }

    #[test]
    fn test_slice_roundtrip() {
        let b = Box3::new(Vec3::new(-1.0, -2.0, -3.0), Vec3::new(4.0, 5.0, 6.0));
        let mut data = [0.0f32; 6];
        b.write_slice(&mut data);
        assert_eq!(Box3::from_slice(&data), b);
    }
}
