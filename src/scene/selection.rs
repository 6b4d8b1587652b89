//! Per-model selection state with hierarchical mark propagation
//!
//! Selecting a node claims a render highlight on its whole subtree. Since
//! an object and several of its ancestors or descendants may all be
//! independently selected, each node carries a mark count and the highlight
//! flag toggles only on the 0-to-1 and 1-to-0 transitions.

use std::collections::{HashMap, HashSet};

use log::warn;

use crate::math::Box3;
use crate::model::{FragmentList, InstanceTree, SelectionMode};

/// Selection state for one model.
///
/// The tree and fragment list are owned by the model; every mutating call
/// takes them as split borrows.
pub struct Selector {
    mode: SelectionMode,
    selected: HashSet<u32>,
    mark_counts: HashMap<u32, i32>,
}

impl Selector {
    pub fn new(mode: SelectionMode) -> Self {
        Self {
            mode,
            selected: HashSet::new(),
            mark_counts: HashMap::new(),
        }
    }

    pub fn mode(&self) -> SelectionMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: SelectionMode) {
        self.mode = mode;
    }

    /// Select the object resolved from `db_id` under the active mode.
    ///
    /// Rejected with a warning and no state change when the id is 0 or
    /// unknown, the resolved node is unselectable, or it is already
    /// selected. Returns whether the selection changed.
    pub fn select(
        &mut self,
        db_id: u32,
        tree: Option<&InstanceTree>,
        fragments: &mut FragmentList,
    ) -> bool {
        if db_id == 0 {
            warn!("select: dbId 0 is not a valid object");
            return false;
        }
        let resolved = match tree {
            Some(t) => {
                let r = t.find_node_for_selection(db_id, self.mode);
                if !t.contains(r) {
                    warn!("select: unknown dbId {}", db_id);
                    return false;
                }
                if !t.is_node_selectable(r) {
                    warn!("select: dbId {} is marked unselectable", r);
                    return false;
                }
                r
            }
            None => db_id,
        };
        if self.selected.contains(&resolved) {
            return false;
        }

        self.selected.insert(resolved);
        self.mark_subtree(resolved, 1, tree, fragments);
        true
    }

    /// Deselect a previously-selected object; warning and no-op otherwise.
    pub fn deselect(
        &mut self,
        db_id: u32,
        tree: Option<&InstanceTree>,
        fragments: &mut FragmentList,
    ) -> bool {
        let resolved = match tree {
            Some(t) => t.find_node_for_selection(db_id, self.mode),
            None => db_id,
        };
        if !self.selected.remove(&resolved) {
            warn!("deselect: dbId {} is not selected", db_id);
            return false;
        }
        self.mark_subtree(resolved, -1, tree, fragments);
        true
    }

    /// Adjust mark counts over the inclusive subtree, toggling the
    /// fragment highlight on the zero transitions.
    ///
    /// A count going negative means mark/unmark calls went out of balance;
    /// that is a programming error and fails hard.
    fn mark_subtree(
        &mut self,
        db_id: u32,
        delta: i32,
        tree: Option<&InstanceTree>,
        fragments: &mut FragmentList,
    ) {
        match tree {
            Some(t) => {
                let counts = &mut self.mark_counts;
                t.enum_node_children(
                    db_id,
                    |node| {
                        let count = counts.entry(node).or_insert(0);
                        *count += delta;
                        match *count {
                            c if c < 0 => {
                                panic!("selection mark count went negative for dbId {}", node)
                            }
                            0 => {
                                counts.remove(&node);
                                t.enum_node_fragments(
                                    node,
                                    |f| fragments.set_highlighted(f, false),
                                    false,
                                );
                            }
                            1 if delta > 0 => {
                                t.enum_node_fragments(
                                    node,
                                    |f| fragments.set_highlighted(f, true),
                                    false,
                                );
                            }
                            _ => {}
                        }
                    },
                    true,
                );
            }
            None => {
                let count = self.mark_counts.entry(db_id).or_insert(0);
                *count += delta;
                match *count {
                    c if c < 0 => panic!("selection mark count went negative for dbId {}", db_id),
                    0 | 1 => {
                        let on = *count == 1;
                        if !on {
                            self.mark_counts.remove(&db_id);
                        }
                        let frags: Vec<u32> = fragments.fragments_for_db(db_id).to_vec();
                        for f in frags {
                            fragments.set_highlighted(f, on);
                        }
                    }
                    _ => {}
                }
            }
        }
    }

    /// Toggle and report whether the object is now selected
    pub fn toggle_selection(
        &mut self,
        db_id: u32,
        tree: Option<&InstanceTree>,
        fragments: &mut FragmentList,
    ) -> bool {
        let resolved = match tree {
            Some(t) => t.find_node_for_selection(db_id, self.mode),
            None => db_id,
        };
        if self.selected.contains(&resolved) {
            self.deselect(db_id, tree, fragments);
            false
        } else {
            self.select(db_id, tree, fragments)
        }
    }

    /// Replace the selection; early-exits without touching state when the
    /// requested set already equals the current one (order-independent).
    /// Returns whether anything changed.
    pub fn set_selection(
        &mut self,
        db_ids: &[u32],
        tree: Option<&InstanceTree>,
        fragments: &mut FragmentList,
    ) -> bool {
        let requested: HashSet<u32> = db_ids
            .iter()
            .map(|&id| match tree {
                Some(t) => t.find_node_for_selection(id, self.mode),
                None => id,
            })
            .collect();
        if requested == self.selected {
            return false;
        }

        self.clear_selection(tree, fragments);
        for &id in db_ids {
            self.select(id, tree, fragments);
        }
        true
    }

    pub fn clear_selection(
        &mut self,
        tree: Option<&InstanceTree>,
        fragments: &mut FragmentList,
    ) -> bool {
        if self.selected.is_empty() {
            return false;
        }
        let current: Vec<u32> = self.selected.iter().copied().collect();
        for id in current {
            self.deselect(id, tree, fragments);
        }
        true
    }

    /// Deselect every selected id no longer visible; returns whether the
    /// selection changed. Called after isolate/hide to keep selection
    /// consistent with visibility.
    pub fn deselect_invisible<V: Fn(u32) -> bool>(
        &mut self,
        is_visible: V,
        tree: Option<&InstanceTree>,
        fragments: &mut FragmentList,
    ) -> bool {
        let stale: Vec<u32> = self
            .selected
            .iter()
            .copied()
            .filter(|&id| !is_visible(id))
            .collect();
        for id in &stale {
            self.deselect(*id, tree, fragments);
        }
        !stale.is_empty()
    }

    /// Union of world boxes of all fragments under every selected node
    pub fn get_selection_bounds(
        &self,
        tree: Option<&InstanceTree>,
        fragments: &FragmentList,
    ) -> Box3 {
        let mut bounds = Box3::empty();
        let mut frag_box = Box3::empty();
        for &id in &self.selected {
            match tree {
                Some(t) => t.enum_node_fragments(
                    id,
                    |f| {
                        fragments.get_world_box(f, &mut frag_box);
                        bounds.merge(&frag_box);
                    },
                    true,
                ),
                None => {
                    for &f in fragments.fragments_for_db(id) {
                        fragments.get_world_box(f, &mut frag_box);
                        bounds.merge(&frag_box);
                    }
                }
            }
        }
        bounds
    }

    /// Fragment ids claimed by the current selection, for the aggregate
    /// notification
    pub fn selection_fragments(
        &self,
        tree: Option<&InstanceTree>,
        fragments: &FragmentList,
    ) -> Vec<u32> {
        let mut out = Vec::new();
        for &id in &self.selected {
            match tree {
                Some(t) => t.enum_node_fragments(id, |f| out.push(f), true),
                None => out.extend_from_slice(fragments.fragments_for_db(id)),
            }
        }
        out.sort_unstable();
        out.dedup();
        out
    }

    pub fn is_selected(&self, db_id: u32) -> bool {
        self.selected.contains(&db_id)
    }

    pub fn selection(&self) -> Vec<u32> {
        let mut ids: Vec<u32> = self.selected.iter().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub fn count(&self) -> usize {
        self.selected.len()
    }

    #[cfg(test)]
    pub(crate) fn mark_count(&self, db_id: u32) -> i32 {
        self.mark_counts.get(&db_id).copied().unwrap_or(0)
    }
}
