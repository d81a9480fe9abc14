use std::sync::Arc;

use heapview_types::ObjectDiagram;
use tracing::debug;

use super::{CollectError, DiagramCollector, DiagramSink, DiagramWriter};

/// Accumulates everything, then hands the whole diagram to a sink once.
pub struct BatchCollector {
    sink: Option<Arc<dyn DiagramSink>>,
}

impl BatchCollector {
    pub fn new() -> Self {
        Self { sink: None }
    }

    pub fn with_sink(sink: Arc<dyn DiagramSink>) -> Self {
        Self { sink: Some(sink) }
    }
}

impl Default for BatchCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl DiagramCollector for BatchCollector {
    fn finalize(&self, writer: &DiagramWriter) -> Result<ObjectDiagram, CollectError> {
        // Handles are not kept: a batch snapshot cannot be expanded later.
        let (diagram, _handles) = writer.close();
        if let Err(source) = diagram.check_links() {
            return Err(CollectError::Inconsistent {
                diagram: Box::new(diagram),
                source,
            });
        }
        if let Some(sink) = &self.sink {
            if let Err(message) = sink.deliver(&diagram) {
                return Err(CollectError::Sink {
                    diagram: Box::new(diagram),
                    message,
                });
            }
        }
        debug!(
            generation = writer.generation(),
            objects = diagram.objects.len(),
            "batch diagram finalized"
        );
        Ok(diagram)
    }
}
