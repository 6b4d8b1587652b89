//! Scene notifications consumed by UI and collaboration collaborators

use std::collections::HashMap;

/// Per-model slice of an aggregate selection notification
#[derive(Clone, Debug, PartialEq)]
pub struct ModelSelection {
    pub model_id: u32,
    pub db_ids: Vec<u32>,
    /// Fragment ids resolved from the selected nodes
    pub fragment_ids: Vec<u32>,
}

/// Notifications emitted by the selection and visibility machinery
#[derive(Clone, Debug, PartialEq)]
pub enum SceneEvent {
    /// Legacy single-model notification; emitted only while exactly one
    /// model is loaded
    SelectionChanged { model_id: u32, db_ids: Vec<u32> },
    /// Aggregate notification, always emitted regardless of model count
    AggregateSelectionChanged { selections: Vec<ModelSelection> },
    Isolate { model_id: u32, db_ids: Vec<u32> },
    Hide { model_id: u32, db_ids: Vec<u32> },
    Show { model_id: u32, db_ids: Vec<u32> },
    /// Something visible changed; the renderer must redraw
    SceneChanged,
}

/// Discriminant for listener registration
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EventKind {
    SelectionChanged,
    AggregateSelectionChanged,
    Isolate,
    Hide,
    Show,
    SceneChanged,
}

impl SceneEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            SceneEvent::SelectionChanged { .. } => EventKind::SelectionChanged,
            SceneEvent::AggregateSelectionChanged { .. } => EventKind::AggregateSelectionChanged,
            SceneEvent::Isolate { .. } => EventKind::Isolate,
            SceneEvent::Hide { .. } => EventKind::Hide,
            SceneEvent::Show { .. } => EventKind::Show,
            SceneEvent::SceneChanged => EventKind::SceneChanged,
        }
    }
}

/// Handle for unregistering a listener
pub type ListenerId = u32;

type Listener = Box<dyn Fn(&SceneEvent)>;

/// Registry of event listeners keyed by [`EventKind`].
///
/// Dispatch is synchronous on the caller's turn, matching the engine's
/// single-threaded execution model.
pub struct EventDispatcher {
    listeners: HashMap<EventKind, Vec<(ListenerId, Listener)>>,
    next_id: ListenerId,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self {
            listeners: HashMap::new(),
            next_id: 1,
        }
    }

    /// Register a callback for one event kind
    pub fn register<F: Fn(&SceneEvent) + 'static>(&mut self, kind: EventKind, cb: F) -> ListenerId {
        let id = self.next_id;
        self.next_id += 1;
        self.listeners.entry(kind).or_default().push((id, Box::new(cb)));
        id
    }

    /// Remove a listener; returns whether it was registered
    pub fn unregister(&mut self, id: ListenerId) -> bool {
        for list in self.listeners.values_mut() {
            if let Some(pos) = list.iter().position(|(lid, _)| *lid == id) {
                list.remove(pos);
                return true;
            }
        }
        false
    }

    /// Fire an event to every listener registered for its kind
    pub fn dispatch(&self, event: &SceneEvent) {
        if let Some(list) = self.listeners.get(&event.kind()) {
            for (_, cb) in list {
                cb(event);
            }
        }
    }

    pub fn listener_count(&self, kind: EventKind) -> usize {
        self.listeners.get(&kind).map(Vec::len).unwrap_or(0)
    }
}

impl Default for EventDispatcher {
    fn default() -> Self {
        Self::new()
    }
}
