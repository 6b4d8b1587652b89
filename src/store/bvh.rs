//! Bounding-volume hierarchy over fragment world boxes
//!
//! Median-split builder producing a packed [`NodeStore`] plus a primitive
//! order array. The order array doubles as the deferred draw order for the
//! batch iterator; the tree itself serves ray casting.

use crate::math::{Box3, Ray};

use super::node_store::{LeanNode, NodeStore, INVALID_NODE};

/// Leaf primitive count below which splitting stops
const DEFAULT_LEAF_SIZE: usize = 4;

/// BVH over a fixed set of primitive boxes.
///
/// Primitives are referenced by index into the box slice handed to
/// [`build`](Bvh::build); for fragment use the index is the fragment id.
pub struct Bvh {
    store: NodeStore<LeanNode>,
    prim_order: Vec<u32>,
}

impl Bvh {
    /// Build a BVH over `boxes` with the default leaf size
    pub fn build(boxes: &[Box3]) -> Self {
        Self::build_with_leaf_size(boxes, DEFAULT_LEAF_SIZE)
    }

    /// Build a BVH over `boxes`, splitting nodes larger than `leaf_size`.
    ///
    /// Split axis is the longest extent of the node box; primitives are
    /// partitioned at the median center along that axis.
    pub fn build_with_leaf_size(boxes: &[Box3], leaf_size: usize) -> Self {
        let mut bvh = Self {
            store: NodeStore::with_capacity(boxes.len().max(1) * 2),
            prim_order: (0..boxes.len() as u32).collect(),
        };

        let root = bvh.store.allocate(1);
        bvh.store.make_empty(root);

        if !boxes.is_empty() {
            bvh.build_node(root, boxes, 0, boxes.len(), leaf_size.max(1));
        }
        bvh
    }

    fn build_node(
        &mut self,
        node: u32,
        boxes: &[Box3],
        start: usize,
        end: usize,
        leaf_size: usize,
    ) {
        let mut bounds = Box3::empty();
        for &prim in &self.prim_order[start..end] {
            bounds.merge(&boxes[prim as usize]);
        }
        self.store.set_box(node, &bounds);

        let count = end - start;
        if count <= leaf_size {
            self.store.set_prim_range(node, start as u32, count as u16);
            return;
        }

        let axis = bounds.longest_axis();
        self.prim_order[start..end].sort_by(|&a, &b| {
            let ca = boxes[a as usize].center()[axis];
            let cb = boxes[b as usize].center()[axis];
            ca.partial_cmp(&cb).unwrap_or(std::cmp::Ordering::Equal)
        });
        let mid = start + count / 2;

        // Children are allocated as an adjacent pair; only the left index is stored
        let left = self.store.allocate(2);
        self.store.make_empty(left);
        self.store.make_empty(left + 1);
        self.store.set_left_child(node, left);
        self.store.set_axis(node, axis);

        self.build_node(left, boxes, start, mid, leaf_size);
        self.build_node(left + 1, boxes, mid, end, leaf_size);
    }

    /// Primitive indices in tree order; contiguous per leaf
    pub fn prim_order(&self) -> &[u32] {
        &self.prim_order
    }

    /// Number of nodes in the tree
    pub fn node_count(&self) -> usize {
        self.store.len()
    }

    /// Cast a ray against the primitive boxes, returning the primitive with
    /// the nearest entry distance as `(index, t)`.
    ///
    /// Subtrees whose box lies beyond the current best hit are pruned.
    pub fn ray_cast(&self, ray: &Ray, boxes: &[Box3]) -> Option<(u32, f32)> {
        if self.prim_order.is_empty() {
            return None;
        }

        let mut best: Option<(u32, f32)> = None;
        let mut stack = vec![0u32];

        while let Some(node) = stack.pop() {
            let mut node_box = Box3::empty();
            self.store.get_box(node, &mut node_box);

            let entry = match ray.intersects_box(&node_box) {
                Some((t_near, _)) => t_near,
                None => continue,
            };
            if let Some((_, best_t)) = best {
                if entry > best_t {
                    continue;
                }
            }

            if self.store.is_leaf(node) {
                let start = self.store.prim_start(node) as usize;
                let count = self.store.prim_count(node) as usize;
                for &prim in &self.prim_order[start..start + count] {
                    if let Some((t, _)) = ray.intersects_box(&boxes[prim as usize]) {
                        if best.map_or(true, |(_, bt)| t < bt) {
                            best = Some((prim, t));
                        }
                    }
                }
            } else {
                let left = self.store.left_child(node);
                if left != INVALID_NODE {
                    stack.push(left);
                    stack.push(left + 1);
                }
            }
        }
        best
    }
}
