//! Per-model scene data: geometry ownership, fragments, and the instance tree

pub mod hierarchy;
pub mod geometry;
pub mod fragments;
pub mod instance_tree;

pub use hierarchy::{HierarchyDescription, HierarchyNode, NodeType};
pub use geometry::{GeometryBuffer, GeometryCache, Residency};
pub use fragments::FragmentList;
pub use instance_tree::{InstanceTree, SelectionMode};
