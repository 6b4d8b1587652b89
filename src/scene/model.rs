//! One loaded model: geometry, fragments, hierarchy, and its controllers

use crate::core::config::{CacheTuning, IteratorConfig};
use crate::core::types::{Mat4, Result};
use crate::math::{Box3, Ray};
use crate::model::{
    FragmentList, GeometryBuffer, GeometryCache, HierarchyDescription, InstanceTree, SelectionMode,
};

use super::iterator::FragmentBatchIterator;
use super::selection::Selector;
use super::visibility::VisibilityController;

/// Everything the engine tracks for one loaded model.
///
/// The instance tree is optional: flat 2D datasets carry only the fragment
/// reverse map. All controller wiring goes through this struct so the
/// split-field borrows stay in one place.
pub struct Model {
    id: u32,
    is_2d: bool,
    geometry: GeometryCache,
    fragments: FragmentList,
    tree: Option<InstanceTree>,
    iterator: FragmentBatchIterator,
    selector: Selector,
    visibility: VisibilityController,
}

impl Model {
    /// Create an empty model set up for incremental fragment arrival
    pub fn new(id: u32, tuning: CacheTuning, config: IteratorConfig) -> Self {
        Self {
            id,
            is_2d: config.is_2d,
            geometry: GeometryCache::new(tuning),
            fragments: FragmentList::new(),
            tree: None,
            iterator: FragmentBatchIterator::incremental(config),
            selector: Selector::new(SelectionMode::default()),
            visibility: VisibilityController::new(config.is_2d),
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn is_2d(&self) -> bool {
        self.is_2d
    }

    // Load-time feeds from the decoding/loading collaborators

    /// Hand over a decoded geometry buffer; returns its id
    pub fn add_geometry(&mut self, buffer: GeometryBuffer, instance_count: usize, id: u32) -> u32 {
        self.geometry.add_geometry(buffer, instance_count, id)
    }

    /// Register a fragment descriptor; returns the fragment id.
    ///
    /// Fragments must arrive in non-decreasing id order (they are appended,
    /// so this holds by construction here).
    pub fn add_fragment(&mut self, geom_id: u32, db_id: u32, transform: Mat4) -> u32 {
        let frag_id = self.fragments.add_fragment(geom_id, db_id, transform, &self.geometry);
        self.iterator.add_fragment(frag_id);
        frag_id
    }

    /// Build the instance tree from the loader's hierarchy description.
    /// Call after the fragments it references have been added.
    pub fn set_hierarchy(&mut self, desc: &HierarchyDescription) -> Result<()> {
        self.tree = Some(InstanceTree::build(desc, &self.fragments)?);
        Ok(())
    }

    /// Build the fragment BVH for ray casting (typically once load settles)
    pub fn build_bvh(&mut self) {
        self.iterator.build_bvh(&self.fragments);
    }

    // Component access

    pub fn geometry(&self) -> &GeometryCache {
        &self.geometry
    }

    pub fn geometry_mut(&mut self) -> &mut GeometryCache {
        &mut self.geometry
    }

    pub fn fragments(&self) -> &FragmentList {
        &self.fragments
    }

    pub fn instance_tree(&self) -> Option<&InstanceTree> {
        self.tree.as_ref()
    }

    pub fn iterator(&self) -> &FragmentBatchIterator {
        &self.iterator
    }

    pub fn iterator_mut(&mut self) -> &mut FragmentBatchIterator {
        &mut self.iterator
    }

    pub fn selection_mode(&self) -> SelectionMode {
        self.selector.mode()
    }

    pub fn set_selection_mode(&mut self, mode: SelectionMode) {
        self.selector.set_mode(mode);
    }

    // Selection

    pub fn select(&mut self, db_id: u32) -> bool {
        self.selector.select(db_id, self.tree.as_ref(), &mut self.fragments)
    }

    pub fn deselect(&mut self, db_id: u32) -> bool {
        self.selector.deselect(db_id, self.tree.as_ref(), &mut self.fragments)
    }

    pub fn toggle_selection(&mut self, db_id: u32) -> bool {
        self.selector.toggle_selection(db_id, self.tree.as_ref(), &mut self.fragments)
    }

    pub fn set_selection(&mut self, db_ids: &[u32]) -> bool {
        self.selector.set_selection(db_ids, self.tree.as_ref(), &mut self.fragments)
    }

    pub fn clear_selection(&mut self) -> bool {
        self.selector.clear_selection(self.tree.as_ref(), &mut self.fragments)
    }

    pub fn selection(&self) -> Vec<u32> {
        self.selector.selection()
    }

    pub fn is_selected(&self, db_id: u32) -> bool {
        self.selector.is_selected(db_id)
    }

    pub fn get_selection_bounds(&self) -> Box3 {
        self.selector.get_selection_bounds(self.tree.as_ref(), &self.fragments)
    }

    /// Fragment ids claimed by the current selection
    pub fn selection_fragments(&self) -> Vec<u32> {
        self.selector.selection_fragments(self.tree.as_ref(), &self.fragments)
    }

    /// Drop selected objects that are no longer visible; returns whether
    /// the selection changed
    pub fn deselect_invisible(&mut self) -> bool {
        let tree = self.tree.as_ref();
        let visibility = &self.visibility;
        self.selector.deselect_invisible(
            |id| visibility.is_node_visible(id, tree),
            tree,
            &mut self.fragments,
        )
    }

    // Visibility

    /// Isolate the given nodes; empty (or the root) restores all-visible
    pub fn isolate(&mut self, db_ids: &[u32]) {
        self.visibility.isolate(db_ids, self.tree.as_mut(), &mut self.fragments);
        self.iterator.invalidate_bounds();
    }

    pub fn isolate_none(&mut self) {
        self.visibility.isolate_none(self.tree.as_mut(), &mut self.fragments);
        self.iterator.invalidate_bounds();
    }

    pub fn hide(&mut self, db_ids: &[u32]) {
        self.visibility.hide(db_ids, self.tree.as_mut(), &mut self.fragments);
        self.iterator.invalidate_bounds();
    }

    pub fn show(&mut self, db_ids: &[u32]) {
        self.visibility.show(db_ids, self.tree.as_mut(), &mut self.fragments);
        self.iterator.invalidate_bounds();
    }

    /// Flip one node's visibility; returns the new visible state
    pub fn toggle_visibility(&mut self, db_id: u32) -> bool {
        let visible =
            self.visibility.toggle_visibility(db_id, self.tree.as_mut(), &mut self.fragments);
        self.iterator.invalidate_bounds();
        visible
    }

    pub fn is_node_visible(&self, db_id: u32) -> bool {
        self.visibility.is_node_visible(db_id, self.tree.as_ref())
    }

    pub fn are_all_visible(&self) -> bool {
        self.visibility.are_all_visible()
    }

    pub fn get_isolated_nodes(&self) -> &[u32] {
        self.visibility.get_isolated_nodes()
    }

    pub fn get_hidden_nodes(&self) -> &[u32] {
        self.visibility.get_hidden_nodes()
    }

    // Render-facing queries

    /// Union batch bounds into visible / with-hidden boxes
    pub fn get_visible_bounds(&mut self, out_visible: &mut Box3, out_with_hidden: &mut Box3) {
        self.iterator.get_visible_bounds(&self.fragments, out_visible, out_with_hidden);
    }

    /// Nearest visible fragment hit as `(fragment id, t)`
    pub fn ray_cast(&self, ray: &Ray) -> Option<(u32, f32)> {
        self.iterator.ray_cast(ray, &self.fragments)
    }

    /// Cull this model's batches, reusing the caller's scratch
    pub fn cull_batches<'a>(
        &mut self,
        culler: &super::culling::FrustumCuller,
        scratch: &'a mut super::culling::BatchCuller,
    ) -> &'a [super::culling::BatchCullState] {
        scratch.cull(culler, &mut self.iterator, &self.fragments)
    }
}
