//! Scene-level machinery: batch iteration, culling, selection, visibility,
//! events, and the multi-model manager

pub mod batch;
pub mod iterator;
pub mod culling;
pub mod selection;
pub mod visibility;
pub mod events;
pub mod model;
pub mod manager;

pub use batch::RenderBatch;
pub use iterator::FragmentBatchIterator;
pub use culling::{BatchCullState, BatchCuller, FrustumCuller};
pub use selection::Selector;
pub use visibility::VisibilityController;
pub use events::{EventDispatcher, EventKind, ListenerId, ModelSelection, SceneEvent};
pub use model::Model;
pub use manager::SceneManager;
