//! Progressive batch iteration over a model's fragments
//!
//! Partitions N fragments into render batches sized for interactive-frame
//! progressive drawing, either up front when the total count is known or
//! lazily as fragments stream in during load.

use log::debug;

use crate::core::config::IteratorConfig;
use crate::math::{Box3, Ray};
use crate::model::FragmentList;
use crate::store::Bvh;

use super::batch::RenderBatch;

/// Stateful, restartable cursor over a model's render batches.
///
/// `next_batch` is single-pass and not reentrant; one caller drives it per
/// frame and calls [`reset`](FragmentBatchIterator::reset) to start over.
pub struct FragmentBatchIterator {
    batch_size: usize,
    batches: Vec<RenderBatch>,
    /// Shared fragment-order array every batch slices into
    order: Vec<u32>,
    cursor: usize,
    /// Highest fragment id seen in incremental mode, for the ordering
    /// precondition
    last_added: Option<u32>,
    bvh: Option<Bvh>,
}

impl FragmentBatchIterator {
    /// Construct for a known total fragment count; batches are partitioned
    /// up front and fragment order is trivial.
    pub fn with_fragment_count(fragment_count: usize, config: IteratorConfig) -> Self {
        let batch_size = config.batch_size();
        let order: Vec<u32> = (0..fragment_count as u32).collect();

        let batch_count = fragment_count.div_ceil(batch_size);
        let mut batches = Vec::with_capacity(batch_count);
        for i in 0..batch_count {
            let start = i * batch_size;
            let mut batch = RenderBatch::new(start);
            batch.count = batch_size.min(fragment_count - start);
            batches.push(batch);
        }

        debug!(
            "batch iterator: {} fragments -> {} batches of {}",
            fragment_count, batch_count, batch_size
        );

        Self {
            batch_size,
            batches,
            order,
            cursor: 0,
            last_added: None,
            bvh: None,
        }
    }

    /// Construct for incremental (streamed) loading; batches are created
    /// lazily as fragments arrive via
    /// [`add_fragment`](FragmentBatchIterator::add_fragment).
    pub fn incremental(config: IteratorConfig) -> Self {
        Self {
            batch_size: config.batch_size(),
            batches: Vec::new(),
            order: Vec::new(),
            cursor: 0,
            last_added: None,
            bvh: None,
        }
    }

    /// Register a streamed fragment.
    ///
    /// Precondition: fragments arrive in non-decreasing id order. Out-of-
    /// order arrival leaves gaps in batch assignment; this is documented,
    /// not checked, in release builds.
    pub fn add_fragment(&mut self, frag_id: u32) {
        debug_assert!(
            self.last_added.map_or(true, |last| frag_id >= last),
            "fragments must arrive in non-decreasing id order"
        );
        self.last_added = Some(frag_id);

        let slot = frag_id as usize;
        if slot >= self.order.len() {
            // Same 1.5x growth policy as the packed node store
            let grown = (self.order.len() * 3 / 2).max(slot + 1);
            self.order.reserve(grown - self.order.len());
            while self.order.len() <= slot {
                let next = self.order.len() as u32;
                self.order.push(next);
            }
        }

        let batch_index = slot / self.batch_size;
        while self.batches.len() <= batch_index {
            let start = self.batches.len() * self.batch_size;
            self.batches.push(RenderBatch::new(start));
        }
        let batch = &mut self.batches[batch_index];
        let within = slot - batch.start + 1;
        if within > batch.count {
            batch.count = within;
            batch.invalidate_bounds();
        }
    }

    /// Number of batches currently populated
    pub fn batch_count(&self) -> usize {
        self.batches.len()
    }

    pub fn batch(&self, index: usize) -> &RenderBatch {
        &self.batches[index]
    }

    pub fn batch_mut(&mut self, index: usize) -> &mut RenderBatch {
        &mut self.batches[index]
    }

    /// The shared fragment-order array
    pub fn fragment_order(&self) -> &[u32] {
        &self.order
    }

    /// Advance the cursor, returning the next batch index, or `None` once
    /// every batch has been handed out since the last reset.
    pub fn next_batch(&mut self) -> Option<usize> {
        if self.cursor >= self.batches.len() {
            return None;
        }
        let index = self.cursor;
        self.cursor += 1;
        Some(index)
    }

    /// Restart iteration from the first batch
    pub fn reset(&mut self) {
        self.cursor = 0;
    }

    pub fn done(&self) -> bool {
        self.cursor >= self.batches.len()
    }

    /// Flag every batch's summed bounds stale (visibility flags changed)
    pub fn invalidate_bounds(&mut self) {
        for batch in &mut self.batches {
            batch.invalidate_bounds();
        }
    }

    /// Re-sum any stale batch bounds
    pub fn update_all_bounds(&mut self, fragments: &FragmentList) {
        for batch in &mut self.batches {
            batch.update_bounds(fragments, &self.order);
        }
    }

    /// Union up-to-date batch bounds into two running boxes, one excluding
    /// and one including ghosted/hidden fragments.
    pub fn get_visible_bounds(
        &mut self,
        fragments: &FragmentList,
        out_visible: &mut Box3,
        out_with_hidden: &mut Box3,
    ) {
        out_visible.set_empty();
        out_with_hidden.set_empty();
        for batch in &mut self.batches {
            batch.update_bounds(fragments, &self.order);
            out_visible.merge(batch.bounds());
            out_with_hidden.merge(batch.bounds_with_hidden());
        }
    }

    /// Build the fragment-box BVH used for ray casting and draw ordering
    pub fn build_bvh(&mut self, fragments: &FragmentList) {
        self.bvh = Some(Bvh::build(&fragments.collect_world_boxes()));
    }

    pub fn has_bvh(&self) -> bool {
        self.bvh.is_some()
    }

    /// Cast a ray against fragment world boxes, returning the nearest
    /// visible hit as `(fragment id, t)`. Uses the BVH when built, a linear
    /// scan otherwise.
    pub fn ray_cast(&self, ray: &Ray, fragments: &FragmentList) -> Option<(u32, f32)> {
        if let Some(bvh) = &self.bvh {
            // The BVH indexes every fragment, hidden ones included; when
            // the nearest hit is hidden fall through to the linear scan
            let boxes = fragments.collect_world_boxes();
            if let Some((frag, t)) = bvh.ray_cast(ray, &boxes) {
                if fragments.is_visible(frag) {
                    return Some((frag, t));
                }
            }
        }
        self.linear_ray_cast(ray, fragments)
    }

    fn linear_ray_cast(&self, ray: &Ray, fragments: &FragmentList) -> Option<(u32, f32)> {
        let mut best: Option<(u32, f32)> = None;
        let mut frag_box = Box3::empty();
        for frag in 0..fragments.count() as u32 {
            if !fragments.is_visible(frag) {
                continue;
            }
            fragments.get_world_box(frag, &mut frag_box);
            if let Some((t, _)) = ray.intersects_box(&frag_box) {
                if best.map_or(true, |(_, bt)| t < bt) {
                    best = Some((frag, t));
                }
            }
        }
        best
    }
}
