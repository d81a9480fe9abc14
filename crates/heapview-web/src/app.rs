use std::sync::Arc;

use heapview_runtime::{
    CollectorKind, SnapshotConfig, SnapshotSession, StreamingCollector, ValueInspector,
};
use heapview_types::ObjectDiagram;
use heapview_wire::{DEFAULT_CHUNK_BYTES, ExpandReply, ExpandRequest, MIN_CHUNK_BYTES};
use tracing::{info, warn};

pub const CHUNK_BYTES_VAR: &str = "HEAPVIEW_WS_CHUNK_BYTES";

#[derive(Clone)]
pub struct AppState {
    pub session: Arc<SnapshotSession>,
    pub collector: Arc<StreamingCollector>,
    pub inspector: Arc<dyn ValueInspector>,
    pub chunk_bytes: usize,
}

impl AppState {
    /// Viewers always need a streaming collector, whatever `config` says.
    pub fn new(config: SnapshotConfig, inspector: Arc<dyn ValueInspector>) -> Self {
        let collector = Arc::new(StreamingCollector::new());
        let session = SnapshotSession::new(
            config.with_collector(CollectorKind::Streaming),
            collector.clone(),
        );
        Self {
            session: Arc::new(session),
            collector,
            inspector,
            chunk_bytes: chunk_bytes_from_env(),
        }
    }

    pub fn with_chunk_bytes(mut self, chunk_bytes: usize) -> Self {
        self.chunk_bytes = chunk_bytes.max(MIN_CHUNK_BYTES);
        self
    }

    /// Takes a fresh snapshot; subscribed viewers receive it as well.
    pub async fn snapshot(&self) -> Result<Arc<ObjectDiagram>, String> {
        let session = Arc::clone(&self.session);
        let inspector = Arc::clone(&self.inspector);
        let taken = tokio::task::spawn_blocking(move || session.pause(inspector.as_ref()))
            .await
            .map_err(|e| format!("snapshot task failed: {e}"))?
            .map_err(|e| e.to_string())?;
        if taken.is_none() {
            info!("session inactive, serving the previous diagram");
        }
        Ok(self.collector.published())
    }

    /// The last published diagram as a JSON document.
    pub fn current_document(&self) -> Result<String, String> {
        if let Some(document) = self.collector.published_document() {
            return Ok(document.to_string());
        }
        heapview_wire::encode_diagram_compact(&self.collector.published()).map_err(|e| e.to_string())
    }

    /// Services one expansion request. Blocks until the host answered.
    pub fn expand_blocking(&self, text: &str) -> ExpandReply {
        let request = ExpandRequest::from_text(text);
        let Some(id) = request.object_id() else {
            return ExpandReply::not_found(&request);
        };
        match self.session.expand(id) {
            Ok(Some(diagram)) => ExpandReply::Expansion(diagram),
            Ok(None) => ExpandReply::not_found(&request),
            Err(e) => {
                warn!(object_id = %id, error = %e, "expansion failed");
                ExpandReply::not_found(&request)
            }
        }
    }

    pub async fn expand(&self, text: String) -> ExpandReply {
        let request = ExpandRequest::from_text(&text);
        let state = self.clone();
        match tokio::task::spawn_blocking(move || state.expand_blocking(&text)).await {
            Ok(reply) => reply,
            Err(e) => {
                warn!(error = %e, "expansion task failed");
                ExpandReply::not_found(&request)
            }
        }
    }

    /// Text answer to a viewer message: an expansion document or a
    /// not-found line.
    pub async fn answer_expand_request(&self, text: String) -> String {
        let reply = self.expand(text).await;
        reply.to_text().unwrap_or_else(|e| {
            warn!(error = %e, "failed to encode expansion");
            format!("failed to encode expansion: {e}")
        })
    }
}

pub fn chunk_bytes_from_env() -> usize {
    std::env::var(CHUNK_BYTES_VAR)
        .ok()
        .and_then(|s| s.trim().parse::<usize>().ok())
        .filter(|n| *n >= MIN_CHUNK_BYTES)
        .unwrap_or(DEFAULT_CHUNK_BYTES)
}

#[cfg(test)]
mod tests {
    use super::*;
    use heapview_examples::Scenario;
    use heapview_runtime::sim::Delivery;
    use heapview_types::ObjectId;
    use std::collections::HashSet;
    use std::time::Duration;

    async fn friends_state(depth: u32) -> AppState {
        let state = AppState::new(
            SnapshotConfig::default().with_max_depth(depth),
            Scenario::Friends.heap(Delivery::Threaded),
        );
        state.snapshot().await.expect("snapshot");
        state
    }

    #[tokio::test]
    async fn snapshot_is_published_as_the_current_document() {
        let state = friends_state(1).await;
        let document = state.current_document().expect("document");
        let diagram = heapview_wire::decode_diagram(&document).expect("decode");
        assert_eq!(diagram, *state.collector.published());
        assert!(diagram.contains_object(ObjectId::new(1)));
    }

    #[tokio::test]
    async fn viewer_messages_expand_known_objects() {
        let state = friends_state(1).await;
        // Alice's friend list was reached but not expanded at depth 1.
        let answer = state.answer_expand_request(" 4\n".to_string()).await;
        let expansion = heapview_wire::decode_diagram(&answer).expect("expansion document");
        assert_eq!(expansion.objects[0].id, ObjectId::new(4));
        // Bob is already known to the viewer: linked, not emitted again.
        assert!(!expansion.contains_object(ObjectId::new(2)));
        assert!(expansion.contains_object(ObjectId::new(3)));
        let targets: Vec<ObjectId> = expansion.links.iter().map(|link| link.to).collect();
        assert_eq!(targets, vec![ObjectId::new(2), ObjectId::new(3)]);
    }

    #[tokio::test]
    async fn unknown_or_malformed_ids_are_not_found() {
        let state = friends_state(1).await;
        assert_eq!(
            state.answer_expand_request("999".to_string()).await,
            "Object with id \"999\" not found"
        );
        assert_eq!(
            state.answer_expand_request("alice".to_string()).await,
            "Object with id \"alice\" not found"
        );
    }

    fn object_ids(diagram: &ObjectDiagram) -> HashSet<ObjectId> {
        diagram.object_ids().collect()
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn overlapping_snapshots_each_publish_a_whole_diagram() {
        let state = AppState::new(
            SnapshotConfig::default().with_max_depth(10),
            Scenario::Friends.heap(Delivery::Scattered {
                max_delay: Duration::from_micros(200),
            }),
        );
        let expected = state.snapshot().await.expect("snapshot");
        assert_eq!(expected.objects.len(), 5);
        let mut viewer = state.collector.subscribe();

        for _ in 0..5 {
            let (first, second) = tokio::join!(state.snapshot(), state.snapshot());
            for diagram in [first.expect("first"), second.expect("second")] {
                assert_eq!(object_ids(&diagram), object_ids(&expected));
                assert_eq!(diagram.links.len(), expected.links.len());
            }
        }
        for _ in 0..10 {
            let document = viewer.try_recv().expect("pushed to viewers");
            let pushed = heapview_wire::decode_diagram(&document).expect("decode");
            assert_eq!(pushed.check_links(), Ok(()));
            assert_eq!(object_ids(&pushed), object_ids(&expected));
        }
    }
}
