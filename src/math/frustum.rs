//! View frustum extraction and box classification

use crate::core::types::{Vec3, Vec4, Mat4};
use super::box3::Box3;

/// A plane in Hessian normal form (normal.xyz, signed distance)
#[derive(Clone, Copy, Debug)]
pub struct Plane {
    pub normal: Vec3,
    pub d: f32,
}

impl Plane {
    pub fn new(normal: Vec3, d: f32) -> Self {
        Self { normal, d }
    }

    /// Signed distance from point to plane (positive = in front)
    pub fn distance_to_point(&self, point: Vec3) -> f32 {
        self.normal.dot(point) + self.d
    }
}

/// How a box relates to the frustum.
///
/// The tri-state result matters: fully contained boxes can skip any further
/// per-primitive culling downstream.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BoxIntersection {
    /// Entirely outside at least one plane
    Outside,
    /// Straddles at least one plane
    Intersects,
    /// Inside all six planes
    Contains,
}

/// View frustum with 6 planes (near, far, left, right, top, bottom)
#[derive(Clone, Copy, Debug)]
pub struct Frustum {
    pub planes: [Plane; 6],
}

impl Frustum {
    /// Extract frustum planes from a view-projection matrix.
    /// Uses the Gribb/Hartmann method.
    pub fn from_view_projection(vp: &Mat4) -> Self {
        let m = vp.to_cols_array_2d();

        // Near: row3 + row2
        let near = Self::normalize_plane(Vec4::new(
            m[0][3] + m[0][2],
            m[1][3] + m[1][2],
            m[2][3] + m[2][2],
            m[3][3] + m[3][2],
        ));

        // Far: row3 - row2
        let far = Self::normalize_plane(Vec4::new(
            m[0][3] - m[0][2],
            m[1][3] - m[1][2],
            m[2][3] - m[2][2],
            m[3][3] - m[3][2],
        ));

        // Left: row3 + row0
        let left = Self::normalize_plane(Vec4::new(
            m[0][3] + m[0][0],
            m[1][3] + m[1][0],
            m[2][3] + m[2][0],
            m[3][3] + m[3][0],
        ));

        // Right: row3 - row0
        let right = Self::normalize_plane(Vec4::new(
            m[0][3] - m[0][0],
            m[1][3] - m[1][0],
            m[2][3] - m[2][0],
            m[3][3] - m[3][0],
        ));

        // Top: row3 - row1
        let top = Self::normalize_plane(Vec4::new(
            m[0][3] - m[0][1],
            m[1][3] - m[1][1],
            m[2][3] - m[2][1],
            m[3][3] - m[3][1],
        ));

        // Bottom: row3 + row1
        let bottom = Self::normalize_plane(Vec4::new(
            m[0][3] + m[0][1],
            m[1][3] + m[1][1],
            m[2][3] + m[2][1],
            m[3][3] + m[3][1],
        ));

        Self {
            planes: [near, far, left, right, top, bottom],
        }
    }

    fn normalize_plane(plane: Vec4) -> Plane {
        let normal = Vec3::new(plane.x, plane.y, plane.z);
        let len = normal.length();
        if len > 0.0 {
            Plane {
                normal: normal / len,
                d: plane.w / len,
            }
        } else {
            Plane { normal: Vec3::ZERO, d: 0.0 }
        }
    }

    /// The near clip plane
    pub fn near_plane(&self) -> &Plane {
        &self.planes[0]
    }

    /// Check if point is inside the frustum
    pub fn contains_point(&self, point: Vec3) -> bool {
        for plane in &self.planes {
            if plane.distance_to_point(point) < 0.0 {
                return false;
            }
        }
        true
    }

    /// Classify a box against the frustum using positive/negative-vertex tests
    pub fn classify_box(&self, bounds: &Box3) -> BoxIntersection {
        let mut contained = true;

        for plane in &self.planes {
            // Corner most aligned with the plane normal (p-vertex)
            let p = Vec3::new(
                if plane.normal.x >= 0.0 { bounds.max.x } else { bounds.min.x },
                if plane.normal.y >= 0.0 { bounds.max.y } else { bounds.min.y },
                if plane.normal.z >= 0.0 { bounds.max.z } else { bounds.min.z },
            );

            // If the p-vertex is outside, the box is completely outside
            if plane.distance_to_point(p) < 0.0 {
                return BoxIntersection::Outside;
            }

            // Corner least aligned with the plane normal (n-vertex)
            let n = Vec3::new(
                if plane.normal.x >= 0.0 { bounds.min.x } else { bounds.max.x },
                if plane.normal.y >= 0.0 { bounds.min.y } else { bounds.max.y },
                if plane.normal.z >= 0.0 { bounds.min.z } else { bounds.max.z },
            );

            if plane.distance_to_point(n) < 0.0 {
                contained = false;
            }
        }

        if contained {
            BoxIntersection::Contains
        } else {
            BoxIntersection::Intersects
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_frustum() -> Frustum {
        let proj = Mat4::perspective_rh(std::f32::consts::FRAC_PI_3, 1.0, 0.1, 100.0);
        Frustum::from_view_projection(&proj)
    }

    #[test]
    fn test_plane_distance() {
        let plane = Plane::new(Vec3::Y, 0.0); // XZ plane
        assert_eq!(plane.distance_to_point(Vec3::new(0.0, 5.0, 0.0)), 5.0);
        assert_eq!(plane.distance_to_point(Vec3::new(0.0, -3.0, 0.0)), -3.0);
    }

    #[test]
    fn test_planes_normalized() {
        let frustum = test_frustum();
        for plane in &frustum.planes {
            assert!(plane.normal.length() > 0.99, "plane normal should be unit length");
        }
    }

    #[test]
    fn test_contains_point() {
        let frustum = test_frustum();
        assert!(frustum.contains_point(Vec3::new(0.0, 0.0, -10.0)));
        assert!(!frustum.contains_point(Vec3::new(0.0, 0.0, 10.0)));
    }

    #[test]
    fn test_classify_inside() {
        let frustum = test_frustum();
        let b = Box3::new(Vec3::new(-1.0, -1.0, -11.0), Vec3::new(1.0, 1.0, -9.0));
        assert_eq!(frustum.classify_box(&b), BoxIntersection::Contains);
    }

    #[test]
    fn test_classify_outside() {
        let frustum = test_frustum();

        // Behind the camera
        let behind = Box3::new(Vec3::new(-1.0, -1.0, 5.0), Vec3::new(1.0, 1.0, 10.0));
        assert_eq!(frustum.classify_box(&behind), BoxIntersection::Outside);

        // Far off to the left
        let left = Box3::new(Vec3::new(-1000.0, -1.0, -10.0), Vec3::new(-999.0, 1.0, -9.0));
        assert_eq!(frustum.classify_box(&left), BoxIntersection::Outside);

        // Beyond the far plane
        let far = Box3::new(Vec3::new(-1.0, -1.0, -200.0), Vec3::new(1.0, 1.0, -150.0));
        assert_eq!(frustum.classify_box(&far), BoxIntersection::Outside);
    }

    #[test]
    fn test_classify_straddling() {
        let frustum = test_frustum();

        // Straddles the near plane
        let b = Box3::new(Vec3::new(-0.5, -0.5, -5.0), Vec3::new(0.5, 0.5, 5.0));
        assert_eq!(frustum.classify_box(&b), BoxIntersection::Intersects);

        // Straddles exactly one side plane
        let wide = Box3::new(Vec3::new(-50.0, -1.0, -20.0), Vec3::new(0.0, 1.0, -19.0));
        assert_eq!(frustum.classify_box(&wide), BoxIntersection::Intersects);
    }
}
