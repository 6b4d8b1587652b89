//! Packed per-model object hierarchy
//!
//! Built once from the loader's hierarchy description and never structurally
//! mutated afterwards; only the per-node flag word changes over a session.
//! Storage is flat parallel arrays indexed by node index, with child and
//! fragment links as ranges into shared arrays, so a hundred-thousand-node
//! hierarchy is a handful of allocations.

use std::collections::HashMap;

use log::info;

use crate::core::error::Error;
use crate::core::types::Result;
use crate::math::Box3;

use super::fragments::FragmentList;
use super::hierarchy::{HierarchyDescription, NodeType};

/// Node is unselectable (pick resolution rejects it)
pub const NODE_FLAG_NO_SELECT: u32 = 0x2000_0000;
/// Node is switched off (excluded from rendering and framing)
pub const NODE_FLAG_OFF: u32 = 0x4000_0000;
/// Node is hidden by an isolate/hide operation
pub const NODE_FLAG_HIDE: u32 = 0x8000_0000;

const TYPE_MASK: u32 = 0x7;
const NO_NODE: u32 = u32::MAX;

/// Policy for resolving a raw leaf pick to the object the user meant.
///
/// What "the picked object" is differs by domain: detailed mechanical
/// assemblies want the containing part, architectural layer stacks want the
/// leaf itself.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SelectionMode {
    /// No resolution; the leaf is the selection
    LeafObject,
    /// First non-grouping ancestor walking root-ward down to the leaf
    #[default]
    FirstObject,
    /// Nearest composite ancestor walking leaf-to-root, else the leaf
    LastObject,
}

/// Read-mostly hierarchical view over one model's object graph.
///
/// dbId 0 is reserved as invalid and never names a node.
pub struct InstanceTree {
    // Parallel per-node arrays, indexed by node index
    flags: Vec<u32>,
    parents: Vec<u32>,
    child_start: Vec<u32>,
    child_counts: Vec<u32>,
    frag_start: Vec<u32>,
    frag_counts: Vec<u32>,
    /// Packed 6-float world box per node
    boxes: Vec<f32>,
    db_ids: Vec<u32>,

    // Shared link arrays the ranges above point into
    children: Vec<u32>,
    frag_ids: Vec<u32>,

    index_of: HashMap<u32, u32>,
    root: u32,

    hidden_count: usize,
    off_count: usize,
}

impl InstanceTree {
    /// Build the tree from a hierarchy description, computing node boxes
    /// bottom-up from the fragments' world boxes.
    pub fn build(desc: &HierarchyDescription, fragments: &FragmentList) -> Result<Self> {
        let n = desc.nodes.len();
        if n == 0 {
            return Err(Error::Hierarchy("empty hierarchy description".into()));
        }

        let mut index_of = HashMap::with_capacity(n);
        for (i, node) in desc.nodes.iter().enumerate() {
            if node.db_id == 0 {
                return Err(Error::Hierarchy("dbId 0 is reserved as invalid".into()));
            }
            if index_of.insert(node.db_id, i as u32).is_some() {
                return Err(Error::Hierarchy(format!("duplicate dbId {}", node.db_id)));
            }
        }
        let root = *index_of
            .get(&desc.root_id)
            .ok_or_else(|| Error::Hierarchy(format!("root dbId {} not in node list", desc.root_id)))?;

        let mut tree = Self {
            flags: Vec::with_capacity(n),
            parents: vec![NO_NODE; n],
            child_start: Vec::with_capacity(n),
            child_counts: Vec::with_capacity(n),
            frag_start: Vec::with_capacity(n),
            frag_counts: Vec::with_capacity(n),
            boxes: vec![0.0; n * 6],
            db_ids: Vec::with_capacity(n),
            children: Vec::new(),
            frag_ids: Vec::new(),
            index_of,
            root,
            hidden_count: 0,
            off_count: 0,
        };

        for (i, node) in desc.nodes.iter().enumerate() {
            let mut flags = node.node_type.to_bits();
            if node.no_select {
                flags |= NODE_FLAG_NO_SELECT;
            }
            tree.flags.push(flags);
            tree.db_ids.push(node.db_id);

            tree.child_start.push(tree.children.len() as u32);
            tree.child_counts.push(node.children.len() as u32);
            for &child_db in &node.children {
                let child = *tree.index_of.get(&child_db).ok_or_else(|| {
                    Error::Hierarchy(format!("child dbId {} of {} not in node list", child_db, node.db_id))
                })?;
                tree.children.push(child);
                tree.parents[child as usize] = i as u32;
            }

            tree.frag_start.push(tree.frag_ids.len() as u32);
            tree.frag_counts.push(node.fragments.len() as u32);
            tree.frag_ids.extend_from_slice(&node.fragments);
        }

        tree.compute_boxes(fragments);

        info!(
            "instance tree built: {} nodes, {} fragments, root dbId {}",
            n,
            tree.frag_ids.len(),
            desc.root_id
        );
        Ok(tree)
    }

    /// Union fragment world boxes bottom-up into per-node boxes.
    ///
    /// Iterative post-order; hierarchy chains can run deep enough that
    /// recursion is not safe here.
    fn compute_boxes(&mut self, fragments: &FragmentList) {
        // (node, children_done)
        let mut stack = vec![(self.root, false)];
        while let Some((node, children_done)) = stack.pop() {
            if !children_done {
                stack.push((node, true));
                let start = self.child_start[node as usize] as usize;
                let count = self.child_counts[node as usize] as usize;
                for &child in &self.children[start..start + count] {
                    stack.push((child, false));
                }
                continue;
            }

            let mut bounds = Box3::empty();
            let fs = self.frag_start[node as usize] as usize;
            let fc = self.frag_counts[node as usize] as usize;
            for &frag in &self.frag_ids[fs..fs + fc] {
                if (frag as usize) < fragments.count() {
                    bounds.merge(&fragments.world_box(frag));
                }
            }
            let cs = self.child_start[node as usize] as usize;
            let cc = self.child_counts[node as usize] as usize;
            for i in cs..cs + cc {
                let child = self.children[i] as usize;
                bounds.merge(&Box3::from_slice(&self.boxes[child * 6..child * 6 + 6]));
            }
            bounds.write_slice(&mut self.boxes[node as usize * 6..node as usize * 6 + 6]);
        }
    }

    fn index(&self, db_id: u32) -> Option<u32> {
        self.index_of.get(&db_id).copied()
    }

    pub fn node_count(&self) -> usize {
        self.flags.len()
    }

    pub fn root_id(&self) -> u32 {
        self.db_ids[self.root as usize]
    }

    pub fn contains(&self, db_id: u32) -> bool {
        self.index_of.contains_key(&db_id)
    }

    pub fn node_type(&self, db_id: u32) -> Option<NodeType> {
        self.index(db_id)
            .map(|i| NodeType::from_bits(self.flags[i as usize] & TYPE_MASK))
    }

    /// Parent dbId, `None` for the root or unknown ids
    pub fn parent(&self, db_id: u32) -> Option<u32> {
        let i = self.index(db_id)?;
        let p = self.parents[i as usize];
        if p == NO_NODE {
            None
        } else {
            Some(self.db_ids[p as usize])
        }
    }

    pub fn child_count(&self, db_id: u32) -> usize {
        self.index(db_id)
            .map(|i| self.child_counts[i as usize] as usize)
            .unwrap_or(0)
    }

    /// Read a node's world box into `out`; empty for unknown ids
    pub fn get_node_box(&self, db_id: u32, out: &mut Box3) {
        match self.index(db_id) {
            Some(i) => {
                let at = i as usize * 6;
                *out = Box3::from_slice(&self.boxes[at..at + 6]);
            }
            None => out.set_empty(),
        }
    }

    pub fn node_box(&self, db_id: u32) -> Box3 {
        let mut out = Box3::empty();
        self.get_node_box(db_id, &mut out);
        out
    }

    // Flag access

    pub fn is_node_hidden(&self, db_id: u32) -> bool {
        self.index(db_id)
            .map(|i| self.flags[i as usize] & NODE_FLAG_HIDE != 0)
            .unwrap_or(false)
    }

    pub fn is_node_off(&self, db_id: u32) -> bool {
        self.index(db_id)
            .map(|i| self.flags[i as usize] & NODE_FLAG_OFF != 0)
            .unwrap_or(false)
    }

    pub fn is_node_selectable(&self, db_id: u32) -> bool {
        self.index(db_id)
            .map(|i| self.flags[i as usize] & NODE_FLAG_NO_SELECT == 0)
            .unwrap_or(false)
    }

    /// Set the hidden flag; returns whether it actually changed.
    ///
    /// A running count of hidden nodes backs the O(1)
    /// [`any_hidden`](InstanceTree::any_hidden) query.
    pub fn set_node_hidden(&mut self, db_id: u32, hidden: bool) -> bool {
        let changed = self.set_flag(db_id, NODE_FLAG_HIDE, hidden);
        if changed {
            if hidden {
                self.hidden_count += 1;
            } else {
                self.hidden_count -= 1;
            }
        }
        changed
    }

    /// Set the off flag; returns whether it actually changed
    pub fn set_node_off(&mut self, db_id: u32, off: bool) -> bool {
        let changed = self.set_flag(db_id, NODE_FLAG_OFF, off);
        if changed {
            if off {
                self.off_count += 1;
            } else {
                self.off_count -= 1;
            }
        }
        changed
    }

    fn set_flag(&mut self, db_id: u32, flag: u32, on: bool) -> bool {
        let Some(i) = self.index(db_id) else {
            return false;
        };
        let flags = &mut self.flags[i as usize];
        let was = *flags & flag != 0;
        if was == on {
            return false;
        }
        if on {
            *flags |= flag;
        } else {
            *flags &= !flag;
        }
        true
    }

    pub fn any_hidden(&self) -> bool {
        self.hidden_count > 0
    }

    pub fn any_off(&self) -> bool {
        self.off_count > 0
    }

    pub fn hidden_count(&self) -> usize {
        self.hidden_count
    }

    // Traversal

    /// Visit nodes under `db_id`, passing each visited dbId to `cb`.
    ///
    /// With `recursive` the traversal is inclusive: `cb` fires for `db_id`
    /// itself first, then depth-first for every descendant. Without it,
    /// only the direct children are visited. Callers depend on the
    /// inclusive-root convention to act on whole subtrees.
    pub fn enum_node_children<F: FnMut(u32)>(&self, db_id: u32, mut cb: F, recursive: bool) {
        let Some(start) = self.index(db_id) else {
            return;
        };
        if recursive {
            self.walk(start, &mut cb);
        } else {
            let cs = self.child_start[start as usize] as usize;
            let cc = self.child_counts[start as usize] as usize;
            for &child in &self.children[cs..cs + cc] {
                cb(self.db_ids[child as usize]);
            }
        }
    }

    /// Depth-first preorder over node indices; explicit stack, same depth
    /// reasoning as [`compute_boxes`](InstanceTree::compute_boxes)
    fn walk<F: FnMut(u32)>(&self, start: u32, cb: &mut F) {
        let mut stack = vec![start];
        while let Some(node) = stack.pop() {
            cb(self.db_ids[node as usize]);
            let cs = self.child_start[node as usize] as usize;
            let cc = self.child_counts[node as usize] as usize;
            for &child in self.children[cs..cs + cc].iter().rev() {
                stack.push(child);
            }
        }
    }

    /// Visit fragment ids attached to nodes under `db_id`; same
    /// inclusive/recursive contract as
    /// [`enum_node_children`](InstanceTree::enum_node_children).
    pub fn enum_node_fragments<F: FnMut(u32)>(&self, db_id: u32, mut cb: F, recursive: bool) {
        if recursive {
            self.enum_node_children(
                db_id,
                |node| {
                    self.own_fragments(node, &mut cb);
                },
                true,
            );
        } else if self.index(db_id).is_some() {
            self.own_fragments(db_id, &mut cb);
        }
    }

    fn own_fragments<F: FnMut(u32)>(&self, db_id: u32, cb: &mut F) {
        let Some(i) = self.index(db_id) else {
            return;
        };
        let fs = self.frag_start[i as usize] as usize;
        let fc = self.frag_counts[i as usize] as usize;
        for &frag in &self.frag_ids[fs..fs + fc] {
            cb(frag);
        }
    }

    /// Resolve a raw leaf pick to the object that should be treated as
    /// selected under `mode`. Returns the input unchanged for unknown ids
    /// and under [`SelectionMode::LeafObject`].
    pub fn find_node_for_selection(&self, db_id: u32, mode: SelectionMode) -> u32 {
        if mode == SelectionMode::LeafObject || self.index(db_id).is_none() {
            return db_id;
        }
        match mode {
            SelectionMode::FirstObject => {
                // Ancestor chain root..=leaf; first node that is not a
                // model/layer/collection grouping wins
                let mut chain = vec![db_id];
                let mut cur = db_id;
                while let Some(p) = self.parent(cur) {
                    chain.push(p);
                    cur = p;
                }
                for &node in chain.iter().rev() {
                    if let Some(t) = self.node_type(node) {
                        if !t.is_grouping() {
                            return node;
                        }
                    }
                }
                db_id
            }
            SelectionMode::LastObject => {
                // Nearest composite walking leaf-to-root, else the leaf
                let mut cur = db_id;
                loop {
                    if self.node_type(cur) == Some(NodeType::Composite) {
                        return cur;
                    }
                    match self.parent(cur) {
                        Some(p) => cur = p,
                        None => return db_id,
                    }
                }
            }
            SelectionMode::LeafObject => db_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{Mat4, Vec3};
    use crate::model::geometry::{GeometryBuffer, GeometryCache};
    use crate::model::hierarchy::HierarchyNode;

    fn node(db_id: u32, t: NodeType, children: &[u32], fragments: &[u32]) -> HierarchyNode {
        HierarchyNode {
            db_id,
            node_type: t,
            name: String::new(),
            children: children.to_vec(),
            fragments: fragments.to_vec(),
            no_select: false,
        }
    }

    /// root(1) -> A(2) -> { B(3, frag 0), C(4, frag 1) }
    fn five_node_fixture() -> (InstanceTree, FragmentList) {
        let mut cache = GeometryCache::default();
        let geom = cache.add_geometry(
            GeometryBuffer::new(vec![0; 64], Vec::new(), 1, Box3::new(Vec3::ZERO, Vec3::ONE)),
            2,
            0,
        );
        let mut frags = FragmentList::new();
        frags.add_fragment(geom, 3, Mat4::IDENTITY, &cache);
        frags.add_fragment(geom, 4, Mat4::from_translation(Vec3::new(5.0, 0.0, 0.0)), &cache);

        let desc = HierarchyDescription {
            root_id: 1,
            nodes: vec![
                node(1, NodeType::Model, &[2], &[]),
                node(2, NodeType::Assembly, &[3, 4], &[]),
                node(3, NodeType::Geometry, &[], &[0]),
                node(4, NodeType::Geometry, &[], &[1]),
            ],
        };
        (InstanceTree::build(&desc, &frags).unwrap(), frags)
    }

    #[test]
    fn test_build_rejects_bad_descriptions() {
        let frags = FragmentList::new();

        let empty = HierarchyDescription { root_id: 1, nodes: vec![] };
        assert!(InstanceTree::build(&empty, &frags).is_err());

        let zero_id = HierarchyDescription {
            root_id: 0,
            nodes: vec![node(0, NodeType::Model, &[], &[])],
        };
        assert!(InstanceTree::build(&zero_id, &frags).is_err());

        let dup = HierarchyDescription {
            root_id: 1,
            nodes: vec![
                node(1, NodeType::Model, &[], &[]),
                node(1, NodeType::Geometry, &[], &[]),
            ],
        };
        assert!(InstanceTree::build(&dup, &frags).is_err());

        let dangling = HierarchyDescription {
            root_id: 1,
            nodes: vec![node(1, NodeType::Model, &[9], &[])],
        };
        assert!(InstanceTree::build(&dangling, &frags).is_err());
    }

    #[test]
    fn test_structure_queries() {
        let (tree, _) = five_node_fixture();
        assert_eq!(tree.node_count(), 4);
        assert_eq!(tree.root_id(), 1);
        assert_eq!(tree.parent(3), Some(2));
        assert_eq!(tree.parent(1), None);
        assert_eq!(tree.child_count(2), 2);
        assert_eq!(tree.node_type(2), Some(NodeType::Assembly));
        assert!(!tree.contains(99));
    }

    #[test]
    fn test_boxes_union_bottom_up() {
        let (tree, _) = five_node_fixture();

        // Leaf boxes come straight from the fragments
        let b3 = tree.node_box(3);
        assert!((b3.max.x - 1.0).abs() < 1e-5);

        // Root box spans both leaves
        let root = tree.node_box(1);
        assert!((root.min.x - 0.0).abs() < 1e-5);
        assert!((root.max.x - 6.0).abs() < 1e-5);
    }

    #[test]
    fn test_enum_children_inclusive_preorder() {
        let (tree, _) = five_node_fixture();

        let mut visited = Vec::new();
        tree.enum_node_children(2, |id| visited.push(id), true);
        assert_eq!(visited, vec![2, 3, 4]);

        // Starting node fires first, each descendant exactly once
        let mut visited = Vec::new();
        tree.enum_node_children(1, |id| visited.push(id), true);
        assert_eq!(visited[0], 1);
        assert_eq!(visited.len(), 4);
        let mut sorted = visited.clone();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(sorted.len(), 4);
    }

    #[test]
    fn test_enum_children_non_recursive_excludes_root() {
        let (tree, _) = five_node_fixture();
        let mut visited = Vec::new();
        tree.enum_node_children(2, |id| visited.push(id), false);
        assert_eq!(visited, vec![3, 4]);
    }

    #[test]
    fn test_enum_children_deep_chain() {
        // 25-level chain exercises the traversal depth
        let mut nodes = Vec::new();
        for i in 1..=25u32 {
            let children: &[u32] = if i < 25 { &[i + 1] } else { &[] };
            nodes.push(node(i, NodeType::Assembly, children, &[]));
        }
        let desc = HierarchyDescription { root_id: 1, nodes };
        let tree = InstanceTree::build(&desc, &FragmentList::new()).unwrap();

        let mut visited = Vec::new();
        tree.enum_node_children(1, |id| visited.push(id), true);
        assert_eq!(visited, (1..=25).collect::<Vec<_>>());
    }

    #[test]
    fn test_enum_fragments() {
        let (tree, _) = five_node_fixture();

        let mut frags = Vec::new();
        tree.enum_node_fragments(2, |f| frags.push(f), true);
        assert_eq!(frags, vec![0, 1]);

        let mut own = Vec::new();
        tree.enum_node_fragments(2, |f| own.push(f), false);
        assert!(own.is_empty());

        let mut leaf = Vec::new();
        tree.enum_node_fragments(4, |f| leaf.push(f), false);
        assert_eq!(leaf, vec![1]);
    }

    #[test]
    fn test_hidden_flag_idempotent_with_counter() {
        let (mut tree, _) = five_node_fixture();
        assert!(!tree.any_hidden());

        assert!(tree.set_node_hidden(2, true));
        assert!(!tree.set_node_hidden(2, true));
        assert!(tree.is_node_hidden(2));
        assert_eq!(tree.hidden_count(), 1);
        assert!(tree.any_hidden());

        assert!(tree.set_node_hidden(2, false));
        assert!(!tree.set_node_hidden(2, false));
        assert!(!tree.any_hidden());
    }

    #[test]
    fn test_off_flag_counter() {
        let (mut tree, _) = five_node_fixture();
        assert!(tree.set_node_off(3, true));
        assert!(tree.any_off());
        assert!(tree.set_node_off(3, false));
        assert!(!tree.any_off());
    }

    #[test]
    fn test_unknown_id_flag_writes_rejected() {
        let (mut tree, _) = five_node_fixture();
        assert!(!tree.set_node_hidden(99, true));
        assert!(!tree.is_node_hidden(99));
        assert!(tree.node_box(99).is_empty());
    }

    #[test]
    fn test_selection_mode_first_object() {
        // root -> layer -> collection -> assembly -> leaf
        let desc = HierarchyDescription {
            root_id: 1,
            nodes: vec![
                node(1, NodeType::Model, &[2], &[]),
                node(2, NodeType::Layer, &[3], &[]),
                node(3, NodeType::Collection, &[4], &[]),
                node(4, NodeType::Assembly, &[5], &[]),
                node(5, NodeType::Geometry, &[], &[]),
            ],
        };
        let tree = InstanceTree::build(&desc, &FragmentList::new()).unwrap();
        assert_eq!(tree.find_node_for_selection(5, SelectionMode::FirstObject), 4);
        assert_eq!(tree.find_node_for_selection(5, SelectionMode::LeafObject), 5);
    }

    #[test]
    fn test_selection_mode_last_object() {
        // root -> composite -> assembly -> leaf
        let desc = HierarchyDescription {
            root_id: 1,
            nodes: vec![
                node(1, NodeType::Model, &[2], &[]),
                node(2, NodeType::Composite, &[3], &[]),
                node(3, NodeType::Assembly, &[4], &[]),
                node(4, NodeType::Geometry, &[], &[]),
            ],
        };
        let tree = InstanceTree::build(&desc, &FragmentList::new()).unwrap();
        assert_eq!(tree.find_node_for_selection(4, SelectionMode::LastObject), 2);

        // Without a composite on the chain, the leaf stands
        let desc = HierarchyDescription {
            root_id: 1,
            nodes: vec![
                node(1, NodeType::Model, &[2], &[]),
                node(2, NodeType::Assembly, &[3], &[]),
                node(3, NodeType::Geometry, &[], &[]),
            ],
        };
        let tree = InstanceTree::build(&desc, &FragmentList::new()).unwrap();
        assert_eq!(tree.find_node_for_selection(3, SelectionMode::LastObject), 3);
    }

    #[test]
    fn test_no_select_flag_from_description() {
        let mut unselectable = node(2, NodeType::Geometry, &[], &[]);
        unselectable.no_select = true;
        let desc = HierarchyDescription {
            root_id: 1,
            nodes: vec![node(1, NodeType::Model, &[2], &[]), unselectable],
        };
        let tree = InstanceTree::build(&desc, &FragmentList::new()).unwrap();
        assert!(tree.is_node_selectable(1));
        assert!(!tree.is_node_selectable(2));
    }
}
