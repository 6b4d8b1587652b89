//! Multi-model aggregation: selection, visibility, events, and per-frame
//! culling across the set of loaded models
//!
//! Callers normally talk only to the manager. The legacy single-model
//! selection notification survives for old consumers, but only fires while
//! exactly one model is loaded; the aggregate notification always fires.

use log::{info, warn};

use crate::core::camera::Camera;
use crate::math::Box3;

use super::culling::{BatchCullState, BatchCuller, FrustumCuller};
use super::events::{EventDispatcher, EventKind, ListenerId, ModelSelection, SceneEvent};
use super::model::Model;

/// Owner of the loaded model set and the event dispatcher
pub struct SceneManager {
    models: Vec<Model>,
    dispatcher: EventDispatcher,
    culler: FrustumCuller,
    batch_culler: BatchCuller,
}

impl SceneManager {
    pub fn new() -> Self {
        Self {
            models: Vec::new(),
            dispatcher: EventDispatcher::new(),
            culler: FrustumCuller::new(),
            batch_culler: BatchCuller::new(),
        }
    }

    // Model lifecycle

    pub fn add_model(&mut self, model: Model) {
        info!("model {} added ({} fragments)", model.id(), model.fragments().count());
        self.models.push(model);
    }

    pub fn remove_model(&mut self, model_id: u32) -> Option<Model> {
        let pos = self.models.iter().position(|m| m.id() == model_id)?;
        info!("model {} removed", model_id);
        Some(self.models.remove(pos))
    }

    pub fn model_count(&self) -> usize {
        self.models.len()
    }

    pub fn model(&self, model_id: u32) -> Option<&Model> {
        self.models.iter().find(|m| m.id() == model_id)
    }

    pub fn model_mut(&mut self, model_id: u32) -> Option<&mut Model> {
        self.models.iter_mut().find(|m| m.id() == model_id)
    }

    pub fn models(&self) -> &[Model] {
        &self.models
    }

    /// Resolve an optional model id to a concrete one.
    ///
    /// `None` falls back to the first loaded model — a usability
    /// compromise, not a multi-model API; callers needing precision pass
    /// the model explicitly, and the ambiguous fallback warns.
    fn resolve_model_id(&self, model_id: Option<u32>) -> Option<u32> {
        match model_id {
            Some(id) => Some(id),
            None => {
                if self.models.len() > 1 {
                    warn!(
                        "no model specified with {} loaded; defaulting to the first",
                        self.models.len()
                    );
                }
                self.models.first().map(|m| m.id())
            }
        }
    }

    // Events

    pub fn register<F: Fn(&SceneEvent) + 'static>(&mut self, kind: EventKind, cb: F) -> ListenerId {
        self.dispatcher.register(kind, cb)
    }

    pub fn unregister(&mut self, id: ListenerId) -> bool {
        self.dispatcher.unregister(id)
    }

    /// Fire the selection notifications: legacy per-model only while
    /// exactly one model is loaded, aggregate always.
    fn emit_selection_changed(&self) {
        if self.models.len() == 1 {
            let model = &self.models[0];
            self.dispatcher.dispatch(&SceneEvent::SelectionChanged {
                model_id: model.id(),
                db_ids: model.selection(),
            });
        }
        let selections: Vec<ModelSelection> = self
            .models
            .iter()
            .map(|m| ModelSelection {
                model_id: m.id(),
                db_ids: m.selection(),
                fragment_ids: m.selection_fragments(),
            })
            .collect();
        self.dispatcher
            .dispatch(&SceneEvent::AggregateSelectionChanged { selections });
    }

    // Selection (the multi-model selection surface)

    pub fn toggle_selection(&mut self, db_id: u32, model_id: Option<u32>) -> bool {
        let Some(id) = self.resolve_model_id(model_id) else {
            return false;
        };
        let Some(model) = self.model_mut(id) else {
            warn!("toggle_selection: no model {}", id);
            return false;
        };
        let now_selected = model.toggle_selection(db_id);
        self.emit_selection_changed();
        now_selected
    }

    pub fn set_selection(&mut self, db_ids: &[u32], model_id: Option<u32>) -> bool {
        let Some(id) = self.resolve_model_id(model_id) else {
            return false;
        };
        let Some(model) = self.model_mut(id) else {
            warn!("set_selection: no model {}", id);
            return false;
        };
        let changed = model.set_selection(db_ids);
        if changed {
            self.emit_selection_changed();
        }
        changed
    }

    /// Clear selection on one model, or on every model when none given
    pub fn clear_selection(&mut self, model_id: Option<u32>) -> bool {
        let changed = match model_id {
            Some(id) => self.model_mut(id).map(|m| m.clear_selection()).unwrap_or(false),
            None => {
                let mut any = false;
                for model in &mut self.models {
                    any |= model.clear_selection();
                }
                any
            }
        };
        if changed {
            self.emit_selection_changed();
        }
        changed
    }

    /// Union of selection bounds across every loaded model
    pub fn get_selection_bounds(&self) -> Box3 {
        let mut bounds = Box3::empty();
        for model in &self.models {
            bounds.merge(&model.get_selection_bounds());
        }
        bounds
    }

    // Visibility

    pub fn isolate(&mut self, db_ids: &[u32], model_id: Option<u32>) {
        let Some(id) = self.resolve_model_id(model_id) else {
            return;
        };
        if let Some(model) = self.model_mut(id) {
            model.isolate(db_ids);
            let selection_changed = model.deselect_invisible();
            self.dispatcher.dispatch(&SceneEvent::Isolate {
                model_id: id,
                db_ids: db_ids.to_vec(),
            });
            self.dispatcher.dispatch(&SceneEvent::SceneChanged);
            if selection_changed {
                self.emit_selection_changed();
            }
        }
    }

    pub fn hide(&mut self, db_ids: &[u32], model_id: Option<u32>) {
        let Some(id) = self.resolve_model_id(model_id) else {
            return;
        };
        if let Some(model) = self.model_mut(id) {
            model.hide(db_ids);
            let selection_changed = model.deselect_invisible();
            self.dispatcher.dispatch(&SceneEvent::Hide {
                model_id: id,
                db_ids: db_ids.to_vec(),
            });
            self.dispatcher.dispatch(&SceneEvent::SceneChanged);
            if selection_changed {
                self.emit_selection_changed();
            }
        }
    }

    pub fn show(&mut self, db_ids: &[u32], model_id: Option<u32>) {
        let Some(id) = self.resolve_model_id(model_id) else {
            return;
        };
        if let Some(model) = self.model_mut(id) {
            model.show(db_ids);
            self.dispatcher.dispatch(&SceneEvent::Show {
                model_id: id,
                db_ids: db_ids.to_vec(),
            });
            self.dispatcher.dispatch(&SceneEvent::SceneChanged);
        }
    }

    pub fn is_node_visible(&self, db_id: u32, model_id: Option<u32>) -> bool {
        match model_id.or_else(|| self.models.first().map(|m| m.id())) {
            Some(id) => self.model(id).map(|m| m.is_node_visible(db_id)).unwrap_or(false),
            None => false,
        }
    }

    // Per-frame entry

    /// Re-derive the frustum from the camera and cull every model's
    /// batches, returning per-model visible batch lists sorted by
    /// projected-area priority.
    pub fn cull(&mut self, camera: &Camera) -> Vec<(u32, Vec<BatchCullState>)> {
        self.culler.reset(camera);
        let mut out = Vec::with_capacity(self.models.len());
        for model in &mut self.models {
            model.iterator_mut().reset();
            let visible = model.cull_batches(&self.culler, &mut self.batch_culler);
            out.push((model.id(), visible.to_vec()));
        }
        out
    }

    pub fn culler(&self) -> &FrustumCuller {
        &self.culler
    }
}

impl Default for SceneManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::{CacheTuning, IteratorConfig};
    use crate::core::types::{Mat4, Vec3};
    use crate::model::geometry::GeometryBuffer;
    use crate::model::hierarchy::{HierarchyDescription, HierarchyNode, NodeType};
    use crate::model::SelectionMode;
    use std::cell::RefCell;
    use std::rc::Rc;

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

    fn loaded_model(id: u32, offset: f32) -> Model {
        let mut model = Model::new(id, CacheTuning::default(), IteratorConfig::default());
        model.set_selection_mode(SelectionMode::LeafObject);
        let geom = model.add_geometry(
            GeometryBuffer::new(vec![0; 32], Vec::new(), 1, Box3::new(Vec3::ZERO, Vec3::ONE)),
            1,
            0,
        );
        model.add_fragment(geom, 2, Mat4::from_translation(Vec3::new(offset, 0.0, -10.0)));

        let desc = HierarchyDescription {
            root_id: 1,
            nodes: vec![
                node(1, NodeType::Model, &[2], &[]),
                node(2, NodeType::Geometry, &[], &[0]),
            ],
        };
        model.set_hierarchy(&desc).unwrap();
        model
    }

    #[test]
    fn test_legacy_event_single_model_only() {
        let mut mgr = SceneManager::new();
        mgr.add_model(loaded_model(1, 0.0));

        let legacy = Rc::new(RefCell::new(0));
        let aggregate = Rc::new(RefCell::new(0));
        let l = legacy.clone();
        mgr.register(EventKind::SelectionChanged, move |_| *l.borrow_mut() += 1);
        let a = aggregate.clone();
        mgr.register(EventKind::AggregateSelectionChanged, move |_| *a.borrow_mut() += 1);

        mgr.toggle_selection(2, None);
        assert_eq!(*legacy.borrow(), 1);
        assert_eq!(*aggregate.borrow(), 1);

        // Second model loaded: legacy goes quiet, aggregate keeps firing
        mgr.add_model(loaded_model(7, 20.0));
        mgr.toggle_selection(2, Some(7));
        assert_eq!(*legacy.borrow(), 1);
        assert_eq!(*aggregate.borrow(), 2);
    }

    #[test]
    fn test_aggregate_event_carries_fragments() {
        let mut mgr = SceneManager::new();
        mgr.add_model(loaded_model(1, 0.0));
        mgr.add_model(loaded_model(7, 20.0));

        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        mgr.register(EventKind::AggregateSelectionChanged, move |e| {
            if let SceneEvent::AggregateSelectionChanged { selections } = e {
                *sink.borrow_mut() = selections.clone();
            }
        });

        mgr.set_selection(&[2], Some(7));
        let selections = seen.borrow().clone();
        assert_eq!(selections.len(), 2);
        assert!(selections[0].db_ids.is_empty());
        assert_eq!(selections[1].model_id, 7);
        assert_eq!(selections[1].db_ids, vec![2]);
        assert_eq!(selections[1].fragment_ids, vec![0]);
    }

    #[test]
    fn test_default_model_fallback() {
        let mut mgr = SceneManager::new();
        mgr.add_model(loaded_model(1, 0.0));
        mgr.add_model(loaded_model(7, 20.0));

        // No model given: the first loaded model takes the selection
        mgr.toggle_selection(2, None);
        assert_eq!(mgr.model(1).unwrap().selection(), vec![2]);
        assert!(mgr.model(7).unwrap().selection().is_empty());
    }

    #[test]
    fn test_clear_selection_all_models() {
        let mut mgr = SceneManager::new();
        mgr.add_model(loaded_model(1, 0.0));
        mgr.add_model(loaded_model(7, 20.0));
        mgr.toggle_selection(2, Some(1));
        mgr.toggle_selection(2, Some(7));

        assert!(mgr.clear_selection(None));
        assert!(mgr.model(1).unwrap().selection().is_empty());
        assert!(mgr.model(7).unwrap().selection().is_empty());
        assert!(!mgr.clear_selection(None));
    }

    #[test]
    fn test_selection_bounds_union_across_models() {
        let mut mgr = SceneManager::new();
        mgr.add_model(loaded_model(1, 0.0));
        mgr.add_model(loaded_model(7, 20.0));
        mgr.toggle_selection(2, Some(1));
        mgr.toggle_selection(2, Some(7));

        let bounds = mgr.get_selection_bounds();
        assert!((bounds.min.x - 0.0).abs() < 1e-5);
        assert!((bounds.max.x - 21.0).abs() < 1e-5);
    }

    #[test]
    fn test_isolate_deselects_invisible_and_notifies() {
        let mut mgr = SceneManager::new();
        let mut model = Model::new(1, CacheTuning::default(), IteratorConfig::default());
        model.set_selection_mode(SelectionMode::LeafObject);
        let geom = model.add_geometry(
            GeometryBuffer::new(vec![0; 32], Vec::new(), 1, Box3::new(Vec3::ZERO, Vec3::ONE)),
            1,
            0,
        );
        model.add_fragment(geom, 2, Mat4::IDENTITY);
        model.add_fragment(geom, 3, Mat4::IDENTITY);
        let desc = HierarchyDescription {
            root_id: 1,
            nodes: vec![
                node(1, NodeType::Model, &[2, 3], &[]),
                node(2, NodeType::Geometry, &[], &[0]),
                node(3, NodeType::Geometry, &[], &[1]),
            ],
        };
        model.set_hierarchy(&desc).unwrap();
        mgr.add_model(model);

        let isolates = Rc::new(RefCell::new(0));
        let sink = isolates.clone();
        mgr.register(EventKind::Isolate, move |_| *sink.borrow_mut() += 1);

        mgr.toggle_selection(3, None);
        mgr.isolate(&[2], None);

        assert_eq!(*isolates.borrow(), 1);
        assert!(mgr.model(1).unwrap().selection().is_empty());
        assert!(mgr.is_node_visible(2, None));
        assert!(!mgr.is_node_visible(3, None));
    }

    #[test]
    fn test_cull_returns_prioritized_batches() {
        let mut mgr = SceneManager::new();
        mgr.add_model(loaded_model(1, 0.0));

        let camera = Camera::new(Vec3::ZERO, 90.0, 1.0);
        let results = mgr.cull(&camera);
        assert_eq!(results.len(), 1);
        let (model_id, batches) = &results[0];
        assert_eq!(*model_id, 1);
        assert_eq!(batches.len(), 1);
        assert!(batches[0].priority > 0.0);

        // Camera facing away: nothing survives
        let camera = Camera::look_at(Vec3::ZERO, Vec3::new(0.0, 0.0, 10.0), Vec3::Y);
        let results = mgr.cull(&camera);
        assert!(results[0].1.is_empty());
    }

    #[test]
    fn test_remove_model() {
        let mut mgr = SceneManager::new();
        mgr.add_model(loaded_model(1, 0.0));
        mgr.add_model(loaded_model(7, 20.0));

        assert!(mgr.remove_model(1).is_some());
        assert_eq!(mgr.model_count(), 1);
        assert!(mgr.remove_model(1).is_none());
    }
}
