use std::collections::HashSet;
use std::error::Error;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Instant;

use heapview_types::{ObjectDiagram, ObjectId};
use parking_lot::Mutex;
use tracing::{debug, info};

use crate::{
    BarrierError, BatchCollector, CollectError, CollectorKind, CompletionBarrier,
    DiagramCollector, DiagramSink, DiagramWriter, ExpansionCollector, InspectError, SnapshotConfig,
    StreamingCollector, Traversal, TraversalOptions, ValueInspector,
};

#[derive(Debug)]
pub enum SnapshotError {
    Inspect(InspectError),
    Barrier(BarrierError),
    Collect(CollectError),
}

impl fmt::Display for SnapshotError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Inspect(e) => write!(f, "snapshot roots unavailable: {e}"),
            Self::Barrier(e) => write!(f, "snapshot did not complete: {e}"),
            Self::Collect(e) => write!(f, "snapshot not published: {e}"),
        }
    }
}

impl Error for SnapshotError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Inspect(e) => Some(e),
            Self::Barrier(e) => Some(e),
            Self::Collect(e) => Some(e),
        }
    }
}

impl From<InspectError> for SnapshotError {
    fn from(e: InspectError) -> Self {
        Self::Inspect(e)
    }
}

impl From<BarrierError> for SnapshotError {
    fn from(e: BarrierError) -> Self {
        Self::Barrier(e)
    }
}

impl From<CollectError> for SnapshotError {
    fn from(e: CollectError) -> Self {
        Self::Collect(e)
    }
}

/// Picks the collector named by `config`.
pub fn collector_for(
    config: &SnapshotConfig,
    sink: Option<Arc<dyn DiagramSink>>,
) -> Arc<dyn DiagramCollector> {
    match (config.collector, sink) {
        (CollectorKind::Batch, Some(sink)) => Arc::new(BatchCollector::with_sink(sink)),
        (CollectorKind::Batch, None) => Arc::new(BatchCollector::new()),
        (CollectorKind::Streaming, Some(sink)) => Arc::new(StreamingCollector::with_sink(sink)),
        (CollectorKind::Streaming, None) => Arc::new(StreamingCollector::new()),
    }
}

/// Everything one debugging session shares between snapshots.
pub struct SnapshotSession {
    config: SnapshotConfig,
    collector: Arc<dyn DiagramCollector>,
    manually_expanded: Mutex<HashSet<ObjectId>>,
    active: AtomicBool,
    /// Held for the whole of a snapshot.
    running: Mutex<()>,
}

impl SnapshotSession {
    pub fn new(config: SnapshotConfig, collector: Arc<dyn DiagramCollector>) -> Self {
        Self {
            config,
            collector,
            manually_expanded: Mutex::new(HashSet::new()),
            active: AtomicBool::new(true),
            running: Mutex::new(()),
        }
    }

    pub fn config(&self) -> &SnapshotConfig {
        &self.config
    }

    pub fn collector(&self) -> &Arc<dyn DiagramCollector> {
        &self.collector
    }

    /// While inactive, pauses produce no snapshot.
    pub fn set_active(&self, active: bool) {
        self.active.store(active, Ordering::Release);
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Expands `id` in every later snapshot, whatever its depth.
    pub fn add_manually_explored_object(&self, id: ObjectId) {
        self.manually_expanded.lock().insert(id);
    }

    /// Takes a snapshot of the paused program. Blocks until every child
    /// request the traversal issued has completed.
    ///
    /// Overlapping calls run one after the other, each into its own diagram.
    /// If the wait fails, the snapshot is abandoned and whatever the host
    /// still delivers for it is dropped.
    pub fn pause(
        &self,
        inspector: &dyn ValueInspector,
    ) -> Result<Option<ObjectDiagram>, SnapshotError> {
        if !self.is_active() {
            debug!("session inactive, skipping snapshot");
            return Ok(None);
        }
        let _running = self.running.lock();
        let started = Instant::now();
        let roots = inspector.roots()?;

        let writer = self.collector.begin();
        let barrier = CompletionBarrier::new();
        let traversal = Traversal::new(
            writer.clone(),
            barrier.clone(),
            self.traversal_options(self.config.max_depth),
            HashSet::new(),
        );

        let gate = barrier.register();
        traversal.explore_roots(roots);
        gate.complete();
        self.await_completion(&barrier, &writer)?;

        let diagram = self.collector.finalize(&writer)?;
        info!(
            objects = diagram.objects.len(),
            links = diagram.links.len(),
            primitives = diagram.primitive_root_values.len(),
            requests = traversal.requests_issued(),
            generation = writer.generation(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "snapshot complete"
        );
        Ok(Some(diagram))
    }

    /// Runs [`pause`](Self::pause) on a dedicated thread, keeping the
    /// caller (typically the debugger's event thread) free.
    pub fn spawn_pause(
        self: &Arc<Self>,
        inspector: Arc<dyn ValueInspector>,
    ) -> std::io::Result<thread::JoinHandle<Result<Option<ObjectDiagram>, SnapshotError>>> {
        let session = Arc::clone(self);
        thread::Builder::new()
            .name("heapview-snapshot".into())
            .spawn(move || session.pause(inspector.as_ref()))
    }

    /// Expands one previously emitted object by a single level.
    ///
    /// Returns `None` when the collector does not know `id`. Children the
    /// viewer already has are linked to, not emitted again.
    pub fn expand(&self, id: ObjectId) -> Result<Option<ObjectDiagram>, SnapshotError> {
        let Some((mut object, handle)) = self.collector.resolve_by_id(id) else {
            debug!(object_id = %id, "expansion requested for unknown object");
            return Ok(None);
        };
        object.attributes.clear();

        let collector = ExpansionCollector::new(Arc::clone(&self.collector));
        let writer = collector.begin();
        writer.add_object(object, Arc::clone(&handle));

        let mut visited = self.collector.known_ids();
        visited.insert(id);
        let barrier = CompletionBarrier::new();
        let traversal = Traversal::new(
            writer.clone(),
            barrier.clone(),
            self.traversal_options(1),
            visited,
        );

        let gate = barrier.register();
        traversal.explore_children(&handle, id);
        gate.complete();
        self.await_completion(&barrier, &writer)?;

        let diagram = collector.finalize(&writer)?;
        debug!(object_id = %id, objects = diagram.objects.len(), "expansion complete");
        Ok(Some(diagram))
    }

    fn traversal_options(&self, max_depth: u32) -> TraversalOptions {
        let manual: Vec<ObjectId> = self.manually_expanded.lock().iter().copied().collect();
        TraversalOptions::new(max_depth)
            .with_manually_expanded(manual)
            .with_map_types(self.config.map_types.clone())
    }

    fn await_completion(
        &self,
        barrier: &CompletionBarrier,
        writer: &DiagramWriter,
    ) -> Result<(), BarrierError> {
        let waited = match self.config.wait_timeout {
            Some(timeout) => barrier.wait_timeout(timeout),
            None => barrier.wait(),
        };
        if waited.is_err() {
            writer.abandon();
        }
        waited
    }
}
