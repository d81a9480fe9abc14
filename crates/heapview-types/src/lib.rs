//! Core diagram model for heapview.
//!
//! A snapshot of the inspected heap is an [`ObjectDiagram`]: objects in
//! discovery order, the links between them, and the primitive values that
//! live outside any object. Traversal writes it, collectors own it, and the
//! renderers only ever read it.

mod diagram;
mod ids;
mod map_policy;

pub use diagram::*;
pub use ids::*;
pub use map_policy::*;
