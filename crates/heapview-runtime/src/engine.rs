use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use heapview_types::{
    MapTypePolicy, ObjectId, OdAttributeValue, OdLink, OdObject, OdPrimitiveRootValue,
};
use parking_lot::Mutex;
use tracing::{debug, trace, warn};

use crate::{CompletionBarrier, DiagramWriter, NamedValue, Pending, ValueKind, ValueRef};

const NULL_TEXT: &str = "null";
const ENTRY_VALUE: &str = "value";

/// Bounds for one traversal.
#[derive(Debug, Clone)]
pub struct TraversalOptions {
    /// Roots sit at depth 0; an object at depth `d` is expanded when `d < max_depth`.
    pub max_depth: u32,
    /// Objects expanded regardless of depth.
    pub manually_expanded: HashSet<ObjectId>,
    pub map_types: MapTypePolicy,
}

impl TraversalOptions {
    pub fn new(max_depth: u32) -> Self {
        Self {
            max_depth,
            manually_expanded: HashSet::new(),
            map_types: MapTypePolicy::default(),
        }
    }

    pub fn with_manually_expanded(mut self, ids: impl IntoIterator<Item = ObjectId>) -> Self {
        self.manually_expanded.extend(ids);
        self
    }

    pub fn with_map_types(mut self, map_types: MapTypePolicy) -> Self {
        self.map_types = map_types;
        self
    }
}

/// Walks the inspected heap into one snapshot's writer.
///
/// Nothing here blocks: every child request is handed to the host together
/// with a barrier registration, and recursion continues on whatever thread
/// the host delivers children on. Whoever started the traversal waits on
/// the barrier.
#[derive(Clone)]
pub struct Traversal {
    inner: Arc<TraversalInner>,
}

struct TraversalInner {
    writer: DiagramWriter,
    barrier: CompletionBarrier,
    visited: Mutex<HashSet<ObjectId>>,
    options: TraversalOptions,
    requests: AtomicUsize,
}

#[derive(Debug, Clone, Copy)]
enum Parent {
    Root,
    Object(ObjectId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChildMode {
    Fields,
    MapEntries,
}

impl Traversal {
    /// `visited` seeds the identities that must not be expanded again.
    pub fn new(
        writer: DiagramWriter,
        barrier: CompletionBarrier,
        options: TraversalOptions,
        visited: HashSet<ObjectId>,
    ) -> Self {
        Self {
            inner: Arc::new(TraversalInner {
                writer,
                barrier,
                visited: Mutex::new(visited),
                options,
                requests: AtomicUsize::new(0),
            }),
        }
    }

    pub fn barrier(&self) -> &CompletionBarrier {
        &self.inner.barrier
    }

    /// `true` once the snapshot this traversal writes into was finalized
    /// or abandoned.
    pub fn is_closed(&self) -> bool {
        self.inner.writer.is_closed()
    }

    /// Number of child requests handed to the host so far.
    pub fn requests_issued(&self) -> usize {
        self.inner.requests.load(Ordering::Relaxed)
    }

    pub fn explore_roots(&self, roots: Vec<NamedValue>) {
        debug!(roots = roots.len(), max_depth = self.inner.options.max_depth, "exploring roots");
        for root in &roots {
            self.visit(&root.name, &root.value, Parent::Root, 0);
        }
    }

    /// Requests the children of an object that is already in the diagram,
    /// treating it as depth 0.
    pub fn explore_children(&self, value: &ValueRef, id: ObjectId) {
        let mode = self.mode_for(&value.type_name());
        self.inner.visited.lock().insert(id);
        self.request_children(value, id, 1, mode);
    }

    fn visit(&self, name: &str, value: &ValueRef, parent: Parent, depth: u32) {
        match value.kind() {
            ValueKind::Null => self.emit_primitive(name, value, NULL_TEXT.to_string(), parent),
            ValueKind::Primitive => {
                self.emit_primitive(name, value, value.display_value(), parent)
            }
            ValueKind::Composite => self.visit_composite(name, value, parent, depth),
        }
    }

    fn emit_primitive(&self, name: &str, value: &ValueRef, text: String, parent: Parent) {
        let writer = &self.inner.writer;
        match parent {
            Parent::Root => writer.add_primitive_root(OdPrimitiveRootValue::new(
                name,
                value.type_name(),
                text,
            )),
            Parent::Object(owner) => writer.add_attribute(
                owner,
                OdAttributeValue::new(name, value.type_name(), text),
            ),
        }
    }

    fn visit_composite(&self, name: &str, value: &ValueRef, parent: Parent, depth: u32) {
        let Some(id) = value.identity() else {
            warn!(field = name, "composite value has no identity, skipping");
            return;
        };
        let writer = &self.inner.writer;

        if !self.mark_visited(id) {
            if let Parent::Object(from) = parent {
                writer.add_link(OdLink::new(from, id, name));
            }
            return;
        }

        let type_name = value.type_name();
        let mode = self.mode_for(&type_name);
        writer.add_object(OdObject::new(id, type_name, name), Arc::clone(value));
        if let Parent::Object(from) = parent {
            writer.add_link(OdLink::new(from, id, name));
        }

        let options = &self.inner.options;
        if depth < options.max_depth || options.manually_expanded.contains(&id) {
            self.request_children(value, id, depth + 1, mode);
        } else {
            trace!(object_id = %id, depth, "depth limit reached");
        }
    }

    /// Map entries become pseudo-objects labelled by slot. They do not use
    /// up depth: their key and value are always delivered.
    fn visit_entry(&self, slot: usize, entry: &NamedValue, map: ObjectId, depth: u32) {
        let label = slot.to_string();
        let value = &entry.value;
        let id = value.identity().unwrap_or_else(ObjectId::next_synthetic);
        let writer = &self.inner.writer;

        if !self.mark_visited(id) {
            writer.add_link(OdLink::new(map, id, label));
            return;
        }

        let mut node = OdObject::new(id, value.type_name(), label.clone());
        match value.kind() {
            ValueKind::Composite => {
                writer.add_object(node, Arc::clone(value));
                writer.add_link(OdLink::new(map, id, label));
                self.request_children(value, id, depth, ChildMode::Fields);
            }
            kind => {
                let text = if kind == ValueKind::Null {
                    NULL_TEXT.to_string()
                } else {
                    value.display_value()
                };
                node.add_attribute(OdAttributeValue::new(ENTRY_VALUE, value.type_name(), text));
                writer.add_object(node, Arc::clone(value));
                writer.add_link(OdLink::new(map, id, label));
            }
        }
    }

    fn request_children(&self, value: &ValueRef, parent: ObjectId, depth: u32, mode: ChildMode) {
        self.inner.requests.fetch_add(1, Ordering::Relaxed);
        let sink = ChildSink {
            traversal: self.clone(),
            parent,
            depth,
            mode,
            next_slot: 0,
            pending: Some(self.inner.barrier.register()),
        };
        value.compute_children(sink);
    }

    /// Returns `true` when `id` was not yet visited.
    fn mark_visited(&self, id: ObjectId) -> bool {
        self.inner.visited.lock().insert(id)
    }

    fn mode_for(&self, type_name: &str) -> ChildMode {
        if self.inner.options.map_types.is_map_type(type_name) {
            ChildMode::MapEntries
        } else {
            ChildMode::Fields
        }
    }
}

/// Receives the children of one requested value.
///
/// Holds one barrier registration, released exactly once: on the last
/// batch, on [`error`](Self::error), or on drop.
pub struct ChildSink {
    traversal: Traversal,
    parent: ObjectId,
    depth: u32,
    mode: ChildMode,
    next_slot: usize,
    pending: Option<Pending>,
}

impl ChildSink {
    /// The object whose children this sink receives.
    pub fn parent(&self) -> ObjectId {
        self.parent
    }

    pub fn is_finished(&self) -> bool {
        self.pending.is_none()
    }

    /// Processes one batch; `last` completes the request.
    pub fn add_children(&mut self, children: Vec<NamedValue>, last: bool) {
        if self.is_finished() {
            warn!(
                parent = %self.parent,
                count = children.len(),
                "children delivered after the final batch, ignoring"
            );
            return;
        }
        if self.traversal.is_closed() {
            debug!(
                parent = %self.parent,
                count = children.len(),
                "children delivered for a closed snapshot, dropping"
            );
            self.finish();
            return;
        }
        for child in &children {
            match self.mode {
                ChildMode::Fields => self.traversal.visit(
                    &child.name,
                    &child.value,
                    Parent::Object(self.parent),
                    self.depth,
                ),
                ChildMode::MapEntries => {
                    let slot = self.next_slot;
                    self.next_slot += 1;
                    self.traversal
                        .visit_entry(slot, child, self.parent, self.depth);
                }
            }
        }
        if last {
            self.finish();
        }
    }

    /// The host could not produce the children. The subtree is skipped and
    /// the rest of the snapshot carries on.
    pub fn error(mut self, message: impl Into<String>) {
        let message = message.into();
        warn!(parent = %self.parent, %message, "child request failed, skipping subtree");
        self.finish();
    }

    fn finish(&mut self) {
        if let Some(pending) = self.pending.take() {
            pending.complete();
        }
    }
}

impl Drop for ChildSink {
    fn drop(&mut self) {
        if !self.is_finished() {
            debug!(parent = %self.parent, "child sink dropped before its final batch");
            self.finish();
        }
    }
}
