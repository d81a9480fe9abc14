//! Scenarios for heapview, built on the simulated heap.

pub mod scenarios;

use std::sync::Arc;

use heapview_runtime::sim::Delivery;
use heapview_runtime::{BatchCollector, SnapshotConfig, SnapshotSession};
use heapview_types::ObjectDiagram;

pub use scenarios::Scenario;

/// Takes one snapshot of `scenario` with a batch collector.
pub fn snapshot(
    scenario: Scenario,
    config: SnapshotConfig,
    delivery: Delivery,
) -> Result<ObjectDiagram, String> {
    let heap = scenario.heap(delivery);
    let session = SnapshotSession::new(config, Arc::new(BatchCollector::new()));
    session
        .pause(heap.as_ref())
        .map_err(|e| format!("snapshot of {scenario} failed: {e}"))?
        .ok_or_else(|| format!("snapshot of {scenario} skipped"))
}

/// Snapshot of `scenario` rendered as PlantUML.
pub fn plantuml(
    scenario: Scenario,
    config: SnapshotConfig,
    delivery: Delivery,
) -> Result<String, String> {
    let maps = config.map_types.clone();
    let diagram = snapshot(scenario, config, delivery)?;
    Ok(heapview_render::to_plantuml(&diagram, &maps))
}
