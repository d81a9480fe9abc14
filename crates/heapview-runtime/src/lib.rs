//! Snapshot engine for heapview.
//!
//! When the inspected program pauses, a [`SnapshotSession`] asks the host
//! for the roots in scope and hands them to a [`Traversal`]. The traversal
//! requests children asynchronously, one [`CompletionBarrier`] registration
//! per request, and writes objects, attributes and links into a
//! [`DiagramCollector`]. Once the barrier drains, the collector publishes
//! the finished [`ObjectDiagram`](heapview_types::ObjectDiagram).

mod barrier;
mod collector;
mod config;
mod engine;
mod inspect;
mod session;
pub mod sim;

pub use barrier::*;
pub use collector::{
    BatchCollector, CollectError, DiagramCollector, DiagramSink, DiagramWriter, ExpansionCollector,
    StreamingCollector,
};
pub use config::*;
pub use engine::*;
pub use inspect::*;
pub use session::*;

#[cfg(test)]
mod tests;
