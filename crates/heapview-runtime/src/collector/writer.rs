use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use heapview_types::{
    ObjectDiagram, ObjectId, OdAttributeValue, OdLink, OdObject, OdPrimitiveRootValue,
};
use parking_lot::Mutex;
use tracing::{debug, warn};

use super::DiagramBuffer;
use crate::ValueRef;

static NEXT_GENERATION: AtomicU64 = AtomicU64::new(1);

/// Write side of a single snapshot.
///
/// Each traversal writes through its own writer, handed out by
/// [`DiagramCollector::begin`](super::DiagramCollector::begin). Once the
/// writer is closed, whether by finalize or because the snapshot was
/// abandoned, anything the host still delivers for it is dropped.
#[derive(Clone)]
pub struct DiagramWriter {
    inner: Arc<WriterInner>,
}

struct WriterInner {
    generation: u64,
    buffer: Mutex<Option<DiagramBuffer>>,
}

impl DiagramWriter {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(WriterInner {
                generation: NEXT_GENERATION.fetch_add(1, Ordering::Relaxed),
                buffer: Mutex::new(Some(DiagramBuffer::default())),
            }),
        }
    }

    /// Distinct for every writer of the process.
    pub fn generation(&self) -> u64 {
        self.inner.generation
    }

    pub fn is_closed(&self) -> bool {
        self.inner.buffer.lock().is_none()
    }

    pub fn object_count(&self) -> usize {
        self.inner
            .buffer
            .lock()
            .as_ref()
            .map_or(0, DiagramBuffer::object_count)
    }

    pub fn add_object(&self, object: OdObject, handle: ValueRef) {
        self.write(|buffer| buffer.add_object(object, handle));
    }

    pub fn add_attribute(&self, owner: ObjectId, attribute: OdAttributeValue) {
        self.write(|buffer| buffer.add_attribute(owner, attribute));
    }

    pub fn add_primitive_root(&self, value: OdPrimitiveRootValue) {
        self.write(|buffer| buffer.add_primitive_root(value));
    }

    pub fn add_link(&self, link: OdLink) {
        self.write(|buffer| buffer.add_link(link));
    }

    /// Closes the writer without reading it.
    pub fn abandon(&self) {
        if self.inner.buffer.lock().take().is_some() {
            debug!(generation = self.inner.generation, "snapshot abandoned");
        }
    }

    /// Closes the writer and hands out the diagram and its value handles.
    pub(crate) fn close(&self) -> (ObjectDiagram, HashMap<ObjectId, ValueRef>) {
        match self.inner.buffer.lock().take() {
            Some(buffer) => buffer.into_parts(),
            None => {
                warn!(generation = self.inner.generation, "snapshot writer closed twice");
                Default::default()
            }
        }
    }

    fn write(&self, f: impl FnOnce(&mut DiagramBuffer)) {
        match self.inner.buffer.lock().as_mut() {
            Some(buffer) => f(buffer),
            None => debug!(
                generation = self.inner.generation,
                "write for a closed snapshot, dropping"
            ),
        }
    }
}

impl Default for DiagramWriter {
    fn default() -> Self {
        Self::new()
    }
}
