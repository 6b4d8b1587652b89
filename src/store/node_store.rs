//! Packed fixed-stride node records for tree and BVH storage
//!
//! Nodes live in one contiguous allocation indexed by `u32` handle, so a
//! million-node hierarchy costs one buffer instead of a million heap
//! objects. Two record layouts are available: the lean layout shares one
//! field between the left-child index and the primitive-range start, the
//! fat layout carries both for trees whose inner nodes own primitives.

use bytemuck::{Pod, Zeroable};

use crate::math::Box3;

/// Sentinel index meaning "no node"
pub const INVALID_NODE: u32 = u32::MAX;

/// Two low bits of the flags field hold the split axis (0 = x, 1 = y, 2 = z)
pub const FLAG_AXIS_MASK: u16 = 0x0003;
/// Set when the left child is the lower-coordinate child along the split axis
pub const FLAG_FIRST_CHILD: u16 = 0x0004;
/// Subtree contains transparent primitives; consumed by draw ordering
pub const FLAG_TRANSPARENT: u16 = 0x0008;

/// Access contract shared by the lean and fat record layouts
pub trait NodeRecord: Pod {
    fn bounds(&self) -> &[f32; 6];
    fn bounds_mut(&mut self) -> &mut [f32; 6];
    /// Left child index, [`INVALID_NODE`] when the node has none
    fn left_child(&self) -> u32;
    fn set_left_child(&mut self, index: u32);
    fn prim_start(&self) -> u32;
    fn set_prim_start(&mut self, start: u32);
    fn prim_count(&self) -> u16;
    fn set_prim_count(&mut self, count: u16);
    fn flags(&self) -> u16;
    fn set_flags(&mut self, flags: u16);
}

/// Lean node record, exactly 32 bytes.
///
/// `child_or_prim` is a union: left-child index for inner nodes,
/// primitive-range start for leaves (`prim_count > 0`).
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct LeanNode {
    pub bounds: [f32; 6],
    pub child_or_prim: u32,
    pub prim_count: u16,
    pub flags: u16,
}

impl NodeRecord for LeanNode {
    fn bounds(&self) -> &[f32; 6] {
        &self.bounds
    }

    fn bounds_mut(&mut self) -> &mut [f32; 6] {
        &mut self.bounds
    }

    fn left_child(&self) -> u32 {
        self.child_or_prim
    }

    fn set_left_child(&mut self, index: u32) {
        self.child_or_prim = index;
    }

    fn prim_start(&self) -> u32 {
        self.child_or_prim
    }

    fn set_prim_start(&mut self, start: u32) {
        self.child_or_prim = start;
    }

    fn prim_count(&self) -> u16 {
        self.prim_count
    }

    fn set_prim_count(&mut self, count: u16) {
        self.prim_count = count;
    }

    fn flags(&self) -> u16 {
        self.flags
    }

    fn set_flags(&mut self, flags: u16) {
        self.flags = flags;
    }
}

/// Fat node record, exactly 36 bytes, for nodes carrying both a child
/// pointer and a primitive range.
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct FatNode {
    pub bounds: [f32; 6],
    pub left_child: u32,
    pub prim_start: u32,
    pub prim_count: u16,
    pub flags: u16,
}

impl NodeRecord for FatNode {
    fn bounds(&self) -> &[f32; 6] {
        &self.bounds
    }

    fn bounds_mut(&mut self) -> &mut [f32; 6] {
        &mut self.bounds
    }

    fn left_child(&self) -> u32 {
        self.left_child
    }

    fn set_left_child(&mut self, index: u32) {
        self.left_child = index;
    }

    fn prim_start(&self) -> u32 {
        self.prim_start
    }

    fn set_prim_start(&mut self, start: u32) {
        self.prim_start = start;
    }

    fn prim_count(&self) -> u16 {
        self.prim_count
    }

    fn set_prim_count(&mut self, count: u16) {
        self.prim_count = count;
    }

    fn flags(&self) -> u16 {
        self.flags
    }

    fn set_flags(&mut self, flags: u16) {
        self.flags = flags;
    }
}

/// Arena of packed node records.
///
/// All operations are O(1) except [`allocate`](NodeStore::allocate), which
/// reallocates with 1.5x geometric growth (amortized O(1)).
pub struct NodeStore<R: NodeRecord> {
    nodes: Vec<R>,
}

impl<R: NodeRecord> NodeStore<R> {
    /// Create an empty store
    pub fn new() -> Self {
        Self { nodes: Vec::new() }
    }

    /// Create a store with room for `capacity` nodes
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            nodes: Vec::with_capacity(capacity),
        }
    }

    /// Append `count` zeroed nodes, returning the index of the first.
    ///
    /// Grows the backing buffer by 1.5x (copying existing records) when
    /// capacity is exceeded.
    pub fn allocate(&mut self, count: usize) -> u32 {
        let first = self.nodes.len() as u32;
        let needed = self.nodes.len() + count;
        if needed > self.nodes.capacity() {
            let grown = (self.nodes.capacity() * 3 / 2).max(needed);
            self.nodes.reserve_exact(grown - self.nodes.len());
        }
        self.nodes.resize_with(needed, R::zeroed);
        first
    }

    /// Reset a node to its initial state: empty box, no children, no primitives
    pub fn make_empty(&mut self, index: u32) {
        let node = &mut self.nodes[index as usize];
        *node = R::zeroed();
        Box3::empty().write_slice(node.bounds_mut());
        node.set_left_child(INVALID_NODE);
    }

    /// Number of allocated nodes
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// True when no nodes are allocated
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Allocated capacity in nodes
    pub fn capacity(&self) -> usize {
        self.nodes.capacity()
    }

    /// Read a node's box into `out`
    pub fn get_box(&self, index: u32, out: &mut Box3) {
        *out = Box3::from_slice(self.nodes[index as usize].bounds());
    }

    /// Write a node's box
    pub fn set_box(&mut self, index: u32, bounds: &Box3) {
        bounds.write_slice(self.nodes[index as usize].bounds_mut());
    }

    /// Left child index, [`INVALID_NODE`] when the node has none
    pub fn left_child(&self, index: u32) -> u32 {
        self.nodes[index as usize].left_child()
    }

    pub fn set_left_child(&mut self, index: u32, child: u32) {
        self.nodes[index as usize].set_left_child(child);
    }

    pub fn prim_start(&self, index: u32) -> u32 {
        self.nodes[index as usize].prim_start()
    }

    pub fn prim_count(&self, index: u32) -> u16 {
        self.nodes[index as usize].prim_count()
    }

    /// Set the primitive range for a leaf
    pub fn set_prim_range(&mut self, index: u32, start: u32, count: u16) {
        let node = &mut self.nodes[index as usize];
        node.set_prim_start(start);
        node.set_prim_count(count);
    }

    /// A node is a leaf when it owns primitives
    pub fn is_leaf(&self, index: u32) -> bool {
        self.nodes[index as usize].prim_count() > 0
    }

    pub fn flags(&self, index: u32) -> u16 {
        self.nodes[index as usize].flags()
    }

    pub fn has_flag(&self, index: u32, flag: u16) -> bool {
        self.nodes[index as usize].flags() & flag != 0
    }

    pub fn set_flag(&mut self, index: u32, flag: u16, on: bool) {
        let node = &mut self.nodes[index as usize];
        let flags = node.flags();
        node.set_flags(if on { flags | flag } else { flags & !flag });
    }

    /// Split axis stored in the low flag bits (0 = x, 1 = y, 2 = z)
    pub fn axis(&self, index: u32) -> usize {
        (self.nodes[index as usize].flags() & FLAG_AXIS_MASK) as usize
    }

    pub fn set_axis(&mut self, index: u32, axis: usize) {
        debug_assert!(axis < 3);
        let node = &mut self.nodes[index as usize];
        let flags = node.flags() & !FLAG_AXIS_MASK;
        node.set_flags(flags | (axis as u16 & FLAG_AXIS_MASK));
    }

    /// Backing buffer size in bytes (counting capacity, like the allocation)
    pub fn memory_usage(&self) -> usize {
        self.nodes.capacity() * std::mem::size_of::<R>()
    }

    /// The raw contiguous record buffer
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.nodes)
    }
}

impl<R: NodeRecord> Default for NodeStore<R> {
    fn default() -> Self {
        Self::new()
    }
}
