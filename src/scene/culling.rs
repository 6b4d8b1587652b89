//! Per-frame frustum culling and screen-space importance scoring

use crate::core::camera::Camera;
use crate::core::types::{Mat4, Vec4};
use crate::math::{Box3, BoxIntersection, Frustum};
use crate::model::FragmentList;

use super::iterator::FragmentBatchIterator;

/// Classifies world boxes against the current view frustum and estimates
/// their on-screen importance.
///
/// [`reset`](FrustumCuller::reset) re-derives the planes once per frame;
/// the classify/score calls run once per candidate batch.
pub struct FrustumCuller {
    frustum: Frustum,
    view_proj: Mat4,
}

impl FrustumCuller {
    pub fn new() -> Self {
        Self {
            frustum: Frustum::from_view_projection(&Mat4::IDENTITY),
            view_proj: Mat4::IDENTITY,
        }
    }

    /// Re-derive the frustum planes from the camera for this frame
    pub fn reset(&mut self, camera: &Camera) {
        self.view_proj = camera.view_projection();
        self.frustum = Frustum::from_view_projection(&self.view_proj);
    }

    /// Tri-state box classification; fully-contained boxes can skip any
    /// further per-primitive culling.
    pub fn intersects_box(&self, bounds: &Box3) -> BoxIntersection {
        self.frustum.classify_box(bounds)
    }

    /// Area of the box's projection clamped to the NDC rectangle, a cheap
    /// visual-importance heuristic for scheduling draw order.
    ///
    /// Corners that project behind the camera get their homogeneous
    /// divisor's sign flipped before the divide; otherwise a large box
    /// partially behind the eye collapses to a sliver instead of covering
    /// the screen.
    pub fn projected_area(&self, bounds: &Box3) -> f32 {
        if bounds.is_empty() {
            return 0.0;
        }

        let mut min_x = f32::INFINITY;
        let mut min_y = f32::INFINITY;
        let mut max_x = f32::NEG_INFINITY;
        let mut max_y = f32::NEG_INFINITY;

        for i in 0..8 {
            let corner = bounds.corner(i);
            let clip = self.view_proj * Vec4::new(corner.x, corner.y, corner.z, 1.0);
            let w = if clip.w < 0.0 { -clip.w } else { clip.w };
            if w <= f32::EPSILON {
                continue;
            }
            let x = clip.x / w;
            let y = clip.y / w;
            min_x = min_x.min(x);
            min_y = min_y.min(y);
            max_x = max_x.max(x);
            max_y = max_y.max(y);
        }

        if min_x > max_x || min_y > max_y {
            return 0.0;
        }

        // Clamp the 2D rect to the normalized device range
        let min_x = min_x.clamp(-1.0, 1.0);
        let max_x = max_x.clamp(-1.0, 1.0);
        let min_y = min_y.clamp(-1.0, 1.0);
        let max_y = max_y.clamp(-1.0, 1.0);

        (max_x - min_x) * (max_y - min_y)
    }

    /// Distance from the near plane to the box's closest corner; negative
    /// when the box starts behind it.
    pub fn estimate_depth(&self, bounds: &Box3) -> f32 {
        let near = self.frustum.near_plane();
        let mut closest = f32::INFINITY;
        for i in 0..8 {
            closest = closest.min(near.distance_to_point(bounds.corner(i)));
        }
        closest
    }
}

impl Default for FrustumCuller {
    fn default() -> Self {
        Self::new()
    }
}

/// One batch's per-frame cull result
#[derive(Clone, Copy, Debug)]
pub struct BatchCullState {
    pub batch: usize,
    pub intersection: BoxIntersection,
    /// Projected-area importance, higher draws first
    pub priority: f32,
}

/// Per-frame scratch for culling a model's batches.
///
/// Allocations are reused across frames.
pub struct BatchCuller {
    visible: Vec<BatchCullState>,
}

impl BatchCuller {
    pub fn new() -> Self {
        Self { visible: Vec::new() }
    }

    /// Cull every batch against the frustum and sort survivors by
    /// descending projected area. Returns the visible list, valid until
    /// the next call.
    pub fn cull(
        &mut self,
        culler: &FrustumCuller,
        iterator: &mut FragmentBatchIterator,
        fragments: &FragmentList,
    ) -> &[BatchCullState] {
        self.visible.clear();
        iterator.update_all_bounds(fragments);

        for index in 0..iterator.batch_count() {
            let bounds = *iterator.batch(index).bounds();
            if bounds.is_empty() {
                continue;
            }
            let intersection = culler.intersects_box(&bounds);
            if intersection == BoxIntersection::Outside {
                continue;
            }
            self.visible.push(BatchCullState {
                batch: index,
                intersection,
                priority: culler.projected_area(&bounds),
            });
        }

        self.visible.sort_by(|a, b| {
            b.priority
                .partial_cmp(&a.priority)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        &self.visible
    }
}

impl Default for BatchCuller {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Vec3;

    fn culler_at_origin() -> FrustumCuller {
        // fov 90, square aspect, looking down -Z
        let mut camera = Camera::new(Vec3::ZERO, 90.0, 1.0);
        camera.near = 0.1;
        camera.far = 1000.0;
        let mut culler = FrustumCuller::new();
        culler.reset(&camera);
        culler
    }

    #[test]
    fn test_tri_state_classification() {
        let culler = culler_at_origin();

        let inside = Box3::new(Vec3::new(-1.0, -1.0, -11.0), Vec3::new(1.0, 1.0, -9.0));
        assert_eq!(culler.intersects_box(&inside), BoxIntersection::Contains);

        let behind = Box3::new(Vec3::new(-1.0, -1.0, 5.0), Vec3::new(1.0, 1.0, 10.0));
        assert_eq!(culler.intersects_box(&behind), BoxIntersection::Outside);

        let straddling = Box3::new(Vec3::new(-0.5, -0.5, -5.0), Vec3::new(0.5, 0.5, 5.0));
        assert_eq!(culler.intersects_box(&straddling), BoxIntersection::Intersects);
    }

    #[test]
    fn test_projected_area_on_axis_box() {
        let culler = culler_at_origin();

        // Unit half-extent box centered at z = -10 with fov 90: the widest
        // corners sit at x = +-1 with depth 9, so NDC extent is +-1/9
        let bounds = Box3::new(Vec3::new(-1.0, -1.0, -11.0), Vec3::new(1.0, 1.0, -9.0));
        let expected = (2.0f32 / 9.0) * (2.0 / 9.0);
        let area = culler.projected_area(&bounds);
        assert!((area - expected).abs() < 1e-4, "area {} vs expected {}", area, expected);
    }

    #[test]
    fn test_projected_area_grows_closer() {
        let culler = culler_at_origin();
        let near_box = Box3::new(Vec3::new(-1.0, -1.0, -6.0), Vec3::new(1.0, 1.0, -4.0));
        let far_box = Box3::new(Vec3::new(-1.0, -1.0, -51.0), Vec3::new(1.0, 1.0, -49.0));
        assert!(culler.projected_area(&near_box) > culler.projected_area(&far_box));
    }

    #[test]
    fn test_projected_area_straddling_eye_covers_screen() {
        let culler = culler_at_origin();
        // Huge box surrounding the camera; corners behind the eye must not
        // collapse the projected extent
        let bounds = Box3::new(Vec3::splat(-100.0), Vec3::splat(100.0));
        let area = culler.projected_area(&bounds);
        assert!((area - 4.0).abs() < 1e-3, "expected full NDC coverage, got {}", area);
    }

    #[test]
    fn test_projected_area_empty_box() {
        let culler = culler_at_origin();
        assert_eq!(culler.projected_area(&Box3::empty()), 0.0);
    }

    #[test]
    fn test_estimate_depth_ordering() {
        let culler = culler_at_origin();
        let near_box = Box3::new(Vec3::new(-1.0, -1.0, -6.0), Vec3::new(1.0, 1.0, -4.0));
        let far_box = Box3::new(Vec3::new(-1.0, -1.0, -51.0), Vec3::new(1.0, 1.0, -49.0));
        let d_near = culler.estimate_depth(&near_box);
        let d_far = culler.estimate_depth(&far_box);
        assert!(d_near < d_far);
        assert!(d_near > 0.0);

        let behind = Box3::new(Vec3::new(-1.0, -1.0, 5.0), Vec3::new(1.0, 1.0, 10.0));
        assert!(culler.estimate_depth(&behind) < 0.0);
    }
}
