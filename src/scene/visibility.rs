//! Isolate/hide/show state tracking and propagation
//!
//! The controller is a state machine over three disjoint regimes:
//! all-visible, isolated(S), and hidden(H). Only one of the isolated and
//! hidden sets is ever active; activating one clears the other.

use log::debug;

use crate::model::{FragmentList, InstanceTree};

/// Per-model visibility state.
///
/// Flag propagation goes through the instance tree when one exists; flat
/// 2D datasets fall back to the fragment reverse map and the set-membership
/// visibility rule.
pub struct VisibilityController {
    isolated: Vec<u32>,
    hidden: Vec<u32>,
    /// 2D sheets express visibility as per-fragment ghosting instead of
    /// mesh inclusion
    is_2d: bool,
}

impl VisibilityController {
    pub fn new(is_2d: bool) -> Self {
        Self {
            isolated: Vec::new(),
            hidden: Vec::new(),
            is_2d,
        }
    }

    /// Show only the given nodes (and their subtrees).
    ///
    /// An empty list, or a list containing the tree root, means "isolate
    /// nothing" and transitions back to all-visible. Returns whether a
    /// redraw is needed.
    pub fn isolate(
        &mut self,
        db_ids: &[u32],
        tree: Option<&mut InstanceTree>,
        fragments: &mut FragmentList,
    ) -> bool {
        let root = tree.as_ref().map(|t| t.root_id());
        if db_ids.is_empty() || root.is_some_and(|r| db_ids.contains(&r)) {
            return self.isolate_none(tree, fragments);
        }

        debug!("isolate: {:?}", db_ids);
        match tree {
            Some(tree) => {
                let root = tree.root_id();
                self.set_visibility_on_node(root, false, Some(tree), fragments);
                for &id in db_ids {
                    self.set_visibility_on_node(id, true, Some(tree), fragments);
                }
            }
            None => {
                let all: Vec<u32> = fragments.db_ids().collect();
                for id in all {
                    let visible = db_ids.contains(&id);
                    self.set_visibility_on_node(id, visible, None, fragments);
                }
            }
        }
        self.isolated = db_ids.to_vec();
        self.hidden.clear();
        true
    }

    /// Return to the all-visible regime
    pub fn isolate_none(
        &mut self,
        tree: Option<&mut InstanceTree>,
        fragments: &mut FragmentList,
    ) -> bool {
        debug!("isolate: none (all visible)");
        match tree {
            Some(tree) => {
                let root = tree.root_id();
                self.set_visibility_on_node(root, true, Some(tree), fragments);
            }
            None => {
                let all: Vec<u32> = fragments.db_ids().collect();
                for id in all {
                    self.set_visibility_on_node(id, true, None, fragments);
                }
            }
        }
        self.isolated.clear();
        self.hidden.clear();
        true
    }

    /// Hide the given nodes (inclusive subtrees)
    pub fn hide(
        &mut self,
        db_ids: &[u32],
        mut tree: Option<&mut InstanceTree>,
        fragments: &mut FragmentList,
    ) {
        debug!("hide: {:?}", db_ids);
        for &id in db_ids {
            self.set_visibility_on_node(id, false, tree.as_deref_mut(), fragments);
            self.update_node_visibility_tracking(id, false, tree.as_deref());
        }
    }

    /// Show the given nodes (inclusive subtrees)
    pub fn show(
        &mut self,
        db_ids: &[u32],
        mut tree: Option<&mut InstanceTree>,
        fragments: &mut FragmentList,
    ) {
        debug!("show: {:?}", db_ids);
        for &id in db_ids {
            self.set_visibility_on_node(id, true, tree.as_deref_mut(), fragments);
            self.update_node_visibility_tracking(id, true, tree.as_deref());
        }
    }

    /// Flip one node's visibility; returns the new visible state
    pub fn toggle_visibility(
        &mut self,
        db_id: u32,
        mut tree: Option<&mut InstanceTree>,
        fragments: &mut FragmentList,
    ) -> bool {
        let visible = !self.is_node_visible(db_id, tree.as_deref());
        self.set_visibility_on_node(db_id, visible, tree.as_deref_mut(), fragments);
        self.update_node_visibility_tracking(db_id, visible, tree.as_deref());
        visible
    }

    /// Keep the isolated/hidden sets consistent with a single-node toggle.
    ///
    /// While an isolated set is active the toggle edits that set; otherwise
    /// it edits the hidden list. Toggling the tree root resets tracking
    /// entirely: both sets clear, and a hidden root records exactly
    /// `[root]` as the hidden set.
    fn update_node_visibility_tracking(
        &mut self,
        db_id: u32,
        visible: bool,
        tree: Option<&InstanceTree>,
    ) {
        if tree.is_some_and(|t| t.root_id() == db_id) {
            self.isolated.clear();
            self.hidden.clear();
            if !visible {
                self.hidden.push(db_id);
            }
            return;
        }

        if !self.isolated.is_empty() {
            if visible {
                if !self.isolated.contains(&db_id) {
                    self.isolated.push(db_id);
                }
            } else {
                self.isolated.retain(|&id| id != db_id);
            }
        } else if visible {
            self.hidden.retain(|&id| id != db_id);
        } else if !self.hidden.contains(&db_id) {
            self.hidden.push(db_id);
        }
    }

    /// Propagate a visibility change to the node's inclusive subtree.
    ///
    /// With a tree: every node in the subtree gets its hidden flag set and
    /// its own fragments toggled. 3D toggles the fragment visible flag; 2D
    /// toggles the ghosted flag instead, since 2D rendering cannot drop
    /// meshes the way GPU culling can. Callers treat any call as a scene
    /// change requiring redraw.
    pub fn set_visibility_on_node(
        &mut self,
        db_id: u32,
        visible: bool,
        tree: Option<&mut InstanceTree>,
        fragments: &mut FragmentList,
    ) {
        let is_2d = self.is_2d;
        match tree {
            Some(tree) => {
                let mut nodes = Vec::new();
                tree.enum_node_children(db_id, |n| nodes.push(n), true);
                for node in nodes {
                    tree.set_node_hidden(node, !visible);
                    let mut frags = Vec::new();
                    tree.enum_node_fragments(node, |f| frags.push(f), false);
                    for f in frags {
                        if is_2d {
                            fragments.set_ghosted(f, !visible);
                        } else {
                            fragments.set_visible(f, visible);
                        }
                    }
                }
            }
            None => {
                let frags: Vec<u32> = fragments.fragments_for_db(db_id).to_vec();
                for f in frags {
                    if is_2d {
                        fragments.set_ghosted(f, !visible);
                    } else {
                        fragments.set_visible(f, visible);
                    }
                }
            }
        }
    }

    /// Whether a node is visible.
    ///
    /// Delegates to the tree's hidden flag when a tree exists; for flat id
    /// lists the rule is: not hidden AND (no isolation active OR present in
    /// the isolated set).
    pub fn is_node_visible(&self, db_id: u32, tree: Option<&InstanceTree>) -> bool {
        match tree {
            Some(t) => !t.is_node_hidden(db_id),
            None => {
                !self.hidden.contains(&db_id)
                    && (self.isolated.is_empty() || self.isolated.contains(&db_id))
            }
        }
    }

    pub fn get_isolated_nodes(&self) -> &[u32] {
        &self.isolated
    }

    pub fn get_hidden_nodes(&self) -> &[u32] {
        &self.hidden
    }

    pub fn are_all_visible(&self) -> bool {
        self.isolated.is_empty() && self.hidden.is_empty()
    }
}
