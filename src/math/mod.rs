//! Mathematical utilities and data structures

pub mod box3;
pub mod ray;
pub mod frustum;

pub use box3::Box3;
pub use ray::Ray;
pub use frustum::{Plane, Frustum, BoxIntersection};
