//! Fragview — scene data and visibility/selection engine for large-model
//! viewing
//!
//! The crate tracks geometry memory residency, maintains a flag-based
//! instance hierarchy mapping logical objects to render fragments, iterates
//! fragments in render-ready batches, culls batches against the view
//! frustum, and propagates selection/visibility/isolation state through
//! parent-child relationships across one or more loaded models. Rendering,
//! file loading, and UI are external collaborators.

pub mod core;
pub mod math;
pub mod store;
pub mod model;
pub mod scene;
