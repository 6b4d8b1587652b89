//! Deserialized hierarchy description handed in by the loading collaborator
//!
//! The loader produces one of these per model; [`InstanceTree`](super::InstanceTree)
//! consumes it once at load time and the description is dropped.

use serde::{Deserialize, Serialize};

/// Logical object type tag, 3 bits in the packed node flags
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeType {
    /// Mechanical assembly grouping
    Assembly,
    /// Block/symbol insert
    Insert,
    /// Drawing layer
    Layer,
    /// Loose grouping with no physical identity
    Collection,
    /// Composite object treated as one physical part
    Composite,
    /// Model root
    Model,
    /// Leaf carrying geometry
    Geometry,
}

impl NodeType {
    pub(crate) fn from_bits(bits: u32) -> Self {
        match bits & 0x7 {
            0 => NodeType::Assembly,
            1 => NodeType::Insert,
            2 => NodeType::Layer,
            3 => NodeType::Collection,
            4 => NodeType::Composite,
            5 => NodeType::Model,
            _ => NodeType::Geometry,
        }
    }

    pub(crate) fn to_bits(self) -> u32 {
        match self {
            NodeType::Assembly => 0,
            NodeType::Insert => 1,
            NodeType::Layer => 2,
            NodeType::Collection => 3,
            NodeType::Composite => 4,
            NodeType::Model => 5,
            NodeType::Geometry => 6,
        }
    }

    /// Types that never resolve as a pick target under first-object selection
    pub fn is_grouping(self) -> bool {
        matches!(self, NodeType::Model | NodeType::Layer | NodeType::Collection)
    }
}

/// One node of the loader's hierarchy description
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HierarchyNode {
    /// Logical object id; 0 is reserved as invalid
    pub db_id: u32,
    pub node_type: NodeType,
    #[serde(default)]
    pub name: String,
    /// Child dbIds
    #[serde(default)]
    pub children: Vec<u32>,
    /// Fragment ids owned directly by this node
    #[serde(default)]
    pub fragments: Vec<u32>,
    /// Node starts the session unselectable
    #[serde(default)]
    pub no_select: bool,
}

/// Complete hierarchy description for one model
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HierarchyDescription {
    pub root_id: u32,
    pub nodes: Vec<HierarchyNode>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_bits_roundtrip() {
        for t in [
            NodeType::Assembly,
            NodeType::Insert,
            NodeType::Layer,
            NodeType::Collection,
            NodeType::Composite,
            NodeType::Model,
            NodeType::Geometry,
        ] {
            assert_eq!(NodeType::from_bits(t.to_bits()), t);
        }
    }

    #[test]
    fn test_grouping_types() {
        assert!(NodeType::Model.is_grouping());
        assert!(NodeType::Layer.is_grouping());
        assert!(NodeType::Collection.is_grouping());
        assert!(!NodeType::Assembly.is_grouping());
        assert!(!NodeType::Composite.is_grouping());
        assert!(!NodeType::Geometry.is_grouping());
    }

    #[test]
    fn test_deserialize_description() {
        let json = r#"{
            "root_id": 1,
            "nodes": [
                {"db_id": 1, "node_type": "model", "children": [2]},
                {"db_id": 2, "node_type": "geometry", "name": "wall", "fragments": [0, 1]}
            ]
        }"#;
        let desc: HierarchyDescription = serde_json::from_str(json).unwrap();
        assert_eq!(desc.root_id, 1);
        assert_eq!(desc.nodes.len(), 2);
        assert_eq!(desc.nodes[1].fragments, vec![0, 1]);
        assert!(!desc.nodes[1].no_select);
    }
}
