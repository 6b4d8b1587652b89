//! Render batch: a bounded group of fragments drawn together

use crate::math::Box3;
use crate::model::FragmentList;

/// An ordered, mutable-length group of fragment indices sharing summed
/// bounding boxes.
///
/// Owns no geometry; `start..start + count` indexes the iterator's shared
/// fragment-order array. Bounds are re-summed lazily when flagged dirty.
pub struct RenderBatch {
    /// Offset into the shared fragment-order array
    pub start: usize,
    /// Number of fragments currently assigned
    pub count: usize,
    bounds: Box3,
    bounds_with_hidden: Box3,
    dirty: bool,
}

impl RenderBatch {
    pub fn new(start: usize) -> Self {
        Self {
            start,
            count: 0,
            bounds: Box3::empty(),
            bounds_with_hidden: Box3::empty(),
            dirty: true,
        }
    }

    /// Mark the summed boxes stale (a fragment flag changed)
    pub fn invalidate_bounds(&mut self) {
        self.dirty = true;
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Re-sum the batch boxes if stale.
    ///
    /// The visible box keys on the fragment VISIBLE flag alone; the
    /// with-hidden box includes ghosted and hidden fragments too. OFF
    /// fragments that are still flagged visible contribute to the visible
    /// box — this mirrors the framing behavior callers already depend on.
    pub fn update_bounds(&mut self, fragments: &FragmentList, order: &[u32]) {
        if !self.dirty {
            return;
        }
        self.bounds.set_empty();
        self.bounds_with_hidden.set_empty();

        let mut frag_box = Box3::empty();
        for &frag in &order[self.start..self.start + self.count] {
            fragments.get_world_box(frag, &mut frag_box);
            self.bounds_with_hidden.merge(&frag_box);
            if fragments.is_visible(frag) {
                self.bounds.merge(&frag_box);
            }
        }
        self.dirty = false;
    }

    /// Summed box of visible fragments (call
    /// [`update_bounds`](RenderBatch::update_bounds) first)
    pub fn bounds(&self) -> &Box3 {
        &self.bounds
    }

    /// Summed box including ghosted/hidden fragments
    pub fn bounds_with_hidden(&self) -> &Box3 {
        &self.bounds_with_hidden
    }

    /// Fragment ids in draw order
    pub fn fragments<'a>(&self, order: &'a [u32]) -> &'a [u32] {
        &order[self.start..self.start + self.count]
    }
}
