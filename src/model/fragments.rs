//! Per-fragment parallel arrays
//!
//! A fragment is the smallest renderable unit: one geometry reference, one
//! world transform, one owning dbId. Everything is immutable after load
//! except the flag byte, which only the visibility controller and selector
//! touch.

use std::collections::HashMap;

use crate::core::types::Mat4;
use crate::math::Box3;

use super::geometry::GeometryCache;

/// Fragment is included in normal rendering
pub const FRAG_VISIBLE: u8 = 0x01;
/// Fragment draws with the selection highlight
pub const FRAG_HIGHLIGHTED: u8 = 0x02;
/// Fragment draws ghosted (2D visibility path)
pub const FRAG_GHOSTED: u8 = 0x04;
/// Fragment is switched off entirely
pub const FRAG_OFF: u8 = 0x08;

/// Parallel per-fragment arrays plus a dbId reverse map.
///
/// The reverse map serves flat 2D datasets that carry no instance tree;
/// hierarchical lookups go through the tree's fragment ranges instead.
pub struct FragmentList {
    geom_ids: Vec<u32>,
    db_ids: Vec<u32>,
    transforms: Vec<Mat4>,
    /// Packed 6-float world box per fragment
    boxes: Vec<f32>,
    flags: Vec<u8>,
    by_db_id: HashMap<u32, Vec<u32>>,
}

impl FragmentList {
    pub fn new() -> Self {
        Self {
            geom_ids: Vec::new(),
            db_ids: Vec::new(),
            transforms: Vec::new(),
            boxes: Vec::new(),
            flags: Vec::new(),
            by_db_id: HashMap::new(),
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            geom_ids: Vec::with_capacity(capacity),
            db_ids: Vec::with_capacity(capacity),
            transforms: Vec::with_capacity(capacity),
            boxes: Vec::with_capacity(capacity * 6),
            flags: Vec::with_capacity(capacity),
            by_db_id: HashMap::new(),
        }
    }

    /// Append a fragment, computing its world box from the geometry's model
    /// box and the transform. Returns the fragment id.
    pub fn add_fragment(
        &mut self,
        geom_id: u32,
        db_id: u32,
        transform: Mat4,
        cache: &GeometryCache,
    ) -> u32 {
        let frag_id = self.geom_ids.len() as u32;

        let mut model_box = Box3::empty();
        cache.get_model_box(geom_id, &mut model_box);
        let world = model_box.transformed(&transform);

        self.geom_ids.push(geom_id);
        self.db_ids.push(db_id);
        self.transforms.push(transform);
        let mut floats = [0.0f32; 6];
        world.write_slice(&mut floats);
        self.boxes.extend_from_slice(&floats);
        self.flags.push(FRAG_VISIBLE);
        self.by_db_id.entry(db_id).or_default().push(frag_id);

        frag_id
    }

    pub fn count(&self) -> usize {
        self.geom_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.geom_ids.is_empty()
    }

    pub fn geometry_id(&self, frag_id: u32) -> u32 {
        self.geom_ids[frag_id as usize]
    }

    pub fn db_id(&self, frag_id: u32) -> u32 {
        self.db_ids[frag_id as usize]
    }

    pub fn transform(&self, frag_id: u32) -> &Mat4 {
        &self.transforms[frag_id as usize]
    }

    /// Read a fragment's world box into `out`
    pub fn get_world_box(&self, frag_id: u32, out: &mut Box3) {
        let i = frag_id as usize * 6;
        *out = Box3::from_slice(&self.boxes[i..i + 6]);
    }

    /// World box by value
    pub fn world_box(&self, frag_id: u32) -> Box3 {
        let i = frag_id as usize * 6;
        Box3::from_slice(&self.boxes[i..i + 6])
    }

    /// Fragments owned by a dbId (flat reverse map)
    pub fn fragments_for_db(&self, db_id: u32) -> &[u32] {
        self.by_db_id.get(&db_id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// All dbIds that own at least one fragment
    pub fn db_ids(&self) -> impl Iterator<Item = u32> + '_ {
        self.by_db_id.keys().copied()
    }

    // Flag accessors. Only the visibility controller and selector mutate.

    pub fn flags(&self, frag_id: u32) -> u8 {
        self.flags[frag_id as usize]
    }

    pub fn is_visible(&self, frag_id: u32) -> bool {
        self.flags[frag_id as usize] & FRAG_VISIBLE != 0
    }

    pub fn set_visible(&mut self, frag_id: u32, visible: bool) {
        self.set_flag(frag_id, FRAG_VISIBLE, visible);
    }

    pub fn is_highlighted(&self, frag_id: u32) -> bool {
        self.flags[frag_id as usize] & FRAG_HIGHLIGHTED != 0
    }

    pub fn set_highlighted(&mut self, frag_id: u32, on: bool) {
        self.set_flag(frag_id, FRAG_HIGHLIGHTED, on);
    }

    pub fn is_ghosted(&self, frag_id: u32) -> bool {
        self.flags[frag_id as usize] & FRAG_GHOSTED != 0
    }

    pub fn set_ghosted(&mut self, frag_id: u32, on: bool) {
        self.set_flag(frag_id, FRAG_GHOSTED, on);
    }

    pub fn is_off(&self, frag_id: u32) -> bool {
        self.flags[frag_id as usize] & FRAG_OFF != 0
    }

    pub fn set_off(&mut self, frag_id: u32, on: bool) {
        self.set_flag(frag_id, FRAG_OFF, on);
    }

    fn set_flag(&mut self, frag_id: u32, flag: u8, on: bool) {
        let f = &mut self.flags[frag_id as usize];
        if on {
            *f |= flag;
        } else {
            *f &= !flag;
        }
    }

    /// World boxes of every fragment, for BVH construction
    pub fn collect_world_boxes(&self) -> Vec<Box3> {
        (0..self.count() as u32).map(|f| self.world_box(f)).collect()
    }
}

impl Default for FragmentList {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Vec3;
    use crate::model::geometry::GeometryBuffer;

    fn cache_with_unit_geom() -> (GeometryCache, u32) {
        let mut cache = GeometryCache::default();
        let geom = GeometryBuffer::new(
            vec![0u8; 100],
            Vec::new(),
            1,
            Box3::new(Vec3::ZERO, Vec3::ONE),
        );
        let id = cache.add_geometry(geom, 1, 0);
        (cache, id)
    }

    #[test]
    fn test_add_computes_world_box() {
        let (cache, geom) = cache_with_unit_geom();
        let mut frags = FragmentList::new();

        let m = Mat4::from_translation(Vec3::new(10.0, 0.0, 0.0));
        let f = frags.add_fragment(geom, 5, m, &cache);

        let mut world = Box3::empty();
        frags.get_world_box(f, &mut world);
        assert!((world.min.x - 10.0).abs() < 1e-5);
        assert!((world.max.x - 11.0).abs() < 1e-5);
    }

    #[test]
    fn test_new_fragment_starts_visible() {
        let (cache, geom) = cache_with_unit_geom();
        let mut frags = FragmentList::new();
        let f = frags.add_fragment(geom, 5, Mat4::IDENTITY, &cache);

        assert!(frags.is_visible(f));
        assert!(!frags.is_highlighted(f));
        assert!(!frags.is_ghosted(f));
        assert!(!frags.is_off(f));
    }

    #[test]
    fn test_flag_toggles_isolated() {
        let (cache, geom) = cache_with_unit_geom();
        let mut frags = FragmentList::new();
        let f = frags.add_fragment(geom, 5, Mat4::IDENTITY, &cache);

        frags.set_highlighted(f, true);
        frags.set_visible(f, false);
        assert!(frags.is_highlighted(f));
        assert!(!frags.is_visible(f));

        frags.set_highlighted(f, false);
        assert!(!frags.is_highlighted(f));
        assert!(!frags.is_visible(f));
    }

    #[test]
    fn test_reverse_map() {
        let (cache, geom) = cache_with_unit_geom();
        let mut frags = FragmentList::new();
        let a = frags.add_fragment(geom, 5, Mat4::IDENTITY, &cache);
        let b = frags.add_fragment(geom, 5, Mat4::IDENTITY, &cache);
        let c = frags.add_fragment(geom, 7, Mat4::IDENTITY, &cache);

        assert_eq!(frags.fragments_for_db(5), &[a, b]);
        assert_eq!(frags.fragments_for_db(7), &[c]);
        assert!(frags.fragments_for_db(99).is_empty());
    }

    #[test]
    fn test_unknown_geometry_gives_empty_box() {
        let cache = GeometryCache::default();
        let mut frags = FragmentList::new();
        let f = frags.add_fragment(42, 1, Mat4::IDENTITY, &cache);

        let mut world = Box3::new(Vec3::ZERO, Vec3::ONE);
        frags.get_world_box(f, &mut world);
        assert!(world.is_empty());
    }
}
