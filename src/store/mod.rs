//! Packed node storage and BVH construction

pub mod node_store;
pub mod bvh;

pub use node_store::{NodeStore, NodeRecord, LeanNode, FatNode, INVALID_NODE};
pub use bvh::Bvh;
