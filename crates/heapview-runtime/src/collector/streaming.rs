use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use heapview_types::{ObjectDiagram, ObjectId, OdObject};
use parking_lot::RwLock;
use tokio::sync::broadcast;
use tracing::{debug, info};

use super::{CollectError, DiagramCollector, DiagramSink, DiagramWriter};
use crate::ValueRef;

const VIEWER_CHANNEL_CAPACITY: usize = 16;

/// Pushes every finalized diagram to subscribed remote viewers and keeps
/// it, with its value handles, so viewers can expand nodes afterwards.
pub struct StreamingCollector {
    published: RwLock<Published>,
    sink: Option<Arc<dyn DiagramSink>>,
    viewers: broadcast::Sender<Arc<str>>,
}

#[derive(Default)]
struct Published {
    diagram: Arc<ObjectDiagram>,
    document: Option<Arc<str>>,
    handles: HashMap<ObjectId, ValueRef>,
    /// Objects found by on-demand expansions since the last snapshot.
    adopted: HashMap<ObjectId, (OdObject, ValueRef)>,
}

impl StreamingCollector {
    pub fn new() -> Self {
        let (viewers, _) = broadcast::channel(VIEWER_CHANNEL_CAPACITY);
        Self {
            published: RwLock::new(Published::default()),
            sink: None,
            viewers,
        }
    }

    pub fn with_sink(sink: Arc<dyn DiagramSink>) -> Self {
        Self {
            sink: Some(sink),
            ..Self::new()
        }
    }

    /// Receives the JSON document of every diagram published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<str>> {
        self.viewers.subscribe()
    }

    pub fn viewer_count(&self) -> usize {
        self.viewers.receiver_count()
    }

    /// The last finalized diagram; empty before the first snapshot.
    pub fn published(&self) -> Arc<ObjectDiagram> {
        Arc::clone(&self.published.read().diagram)
    }

    /// JSON document of the last finalized diagram, if it could be encoded.
    pub fn published_document(&self) -> Option<Arc<str>> {
        self.published.read().document.clone()
    }
}

impl Default for StreamingCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl DiagramCollector for StreamingCollector {
    fn finalize(&self, writer: &DiagramWriter) -> Result<ObjectDiagram, CollectError> {
        let (diagram, handles) = writer.close();
        if let Err(source) = diagram.check_links() {
            return Err(CollectError::Inconsistent {
                diagram: Box::new(diagram),
                source,
            });
        }

        let (document, failure) = match heapview_wire::encode_diagram_compact(&diagram) {
            Ok(text) => (Some(Arc::<str>::from(text)), None),
            Err(source) => (None, Some(source)),
        };
        {
            let mut published = self.published.write();
            published.diagram = Arc::new(diagram.clone());
            published.document = document.clone();
            published.handles = handles;
            published.adopted.clear();
        }
        if let Some(source) = failure {
            return Err(CollectError::Encode {
                diagram: Box::new(diagram),
                source,
            });
        }

        if let Some(document) = document {
            // No subscribers is not an error: the document stays available.
            let delivered = self.viewers.send(document).unwrap_or(0);
            info!(
                generation = writer.generation(),
                viewers = delivered,
                objects = diagram.objects.len(),
                "diagram published"
            );
        }

        if let Some(sink) = &self.sink {
            if let Err(message) = sink.deliver(&diagram) {
                return Err(CollectError::Sink {
                    diagram: Box::new(diagram),
                    message,
                });
            }
        }
        Ok(diagram)
    }

    fn resolve_by_id(&self, id: ObjectId) -> Option<(OdObject, ValueRef)> {
        let published = self.published.read();
        if let (Some(object), Some(handle)) = (published.diagram.object(id), published.handles.get(&id))
        {
            return Some((object.clone(), Arc::clone(handle)));
        }
        published
            .adopted
            .get(&id)
            .map(|(object, handle)| (object.clone(), Arc::clone(handle)))
    }

    fn adopt(&self, object: OdObject, handle: ValueRef) {
        let mut published = self.published.write();
        if published.handles.contains_key(&object.id) {
            return;
        }
        debug!(object_id = %object.id, "adopting expanded object");
        published.adopted.insert(object.id, (object, handle));
    }

    fn known_ids(&self) -> HashSet<ObjectId> {
        let published = self.published.read();
        published
            .diagram
            .object_ids()
            .chain(published.adopted.keys().copied())
            .collect()
    }
}
