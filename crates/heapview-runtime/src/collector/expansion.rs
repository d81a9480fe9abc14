use std::sync::Arc;

use heapview_types::{ObjectDiagram, ObjectId, OdObject};

use super::{CollectError, DiagramCollector, DiagramWriter};
use crate::ValueRef;

/// Collects a single on-demand expansion as a standalone diagram.
///
/// Every object of the finished expansion is adopted by the collector that
/// owns the running snapshot, so it can be expanded in turn. Links may
/// point at objects the viewer already has; those are not part of this
/// diagram.
pub struct ExpansionCollector {
    owner: Arc<dyn DiagramCollector>,
}

impl ExpansionCollector {
    pub fn new(owner: Arc<dyn DiagramCollector>) -> Self {
        Self { owner }
    }
}

impl DiagramCollector for ExpansionCollector {
    fn finalize(&self, writer: &DiagramWriter) -> Result<ObjectDiagram, CollectError> {
        let (diagram, mut handles) = writer.close();
        for object in &diagram.objects {
            if let Some(handle) = handles.remove(&object.id) {
                self.owner.adopt(object.clone(), handle);
            }
        }
        Ok(diagram)
    }

    fn resolve_by_id(&self, id: ObjectId) -> Option<(OdObject, ValueRef)> {
        self.owner.resolve_by_id(id)
    }
}
