//! Text rendering of finished heapview diagrams.

mod plantuml;

pub use plantuml::*;
