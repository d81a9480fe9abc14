//! An in-memory heap that plays the host debugger.
//!
//! Scenarios, tests and the viewer server drive snapshots against it. The
//! delivery mode controls how children come back: inline on the caller's
//! thread, on a spawned thread, or scattered over random batches with
//! random delays, which is how a real debugger backend behaves.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use heapview_types::ObjectId;
use parking_lot::Mutex;
use rand::Rng;
use tracing::trace;

use crate::{ChildSink, InspectError, InspectedValue, NamedValue, ValueInspector, ValueKind, ValueRef};

/// What a field, root or map key/value holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Slot {
    Null { type_name: String },
    Primitive { type_name: String, value: String },
    Ref(u64),
    /// A composite value the host cannot identify.
    Orphan { type_name: String },
}

impl Slot {
    pub fn int(value: i64) -> Self {
        Self::primitive("int", value.to_string())
    }

    pub fn double(value: f64) -> Self {
        Self::primitive("double", value.to_string())
    }

    pub fn boolean(value: bool) -> Self {
        Self::primitive("boolean", value.to_string())
    }

    pub fn string(value: &str) -> Self {
        Self::primitive("String", format!("\"{value}\""))
    }

    pub fn primitive(type_name: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Primitive {
            type_name: type_name.into(),
            value: value.into(),
        }
    }

    pub fn reference(id: u64) -> Self {
        Self::Ref(id)
    }

    pub fn null(type_name: impl Into<String>) -> Self {
        Self::Null {
            type_name: type_name.into(),
        }
    }

    pub fn orphan(type_name: impl Into<String>) -> Self {
        Self::Orphan {
            type_name: type_name.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Delivery {
    /// Children are delivered before `compute_children` returns.
    #[default]
    Inline,
    /// One batch, on a fresh thread.
    Threaded,
    /// Random batch splits (empty ones included), each after a random
    /// delay up to `max_delay`, on a fresh thread.
    Scattered { max_delay: Duration },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum Behavior {
    #[default]
    Normal,
    /// Child requests fail.
    Failing,
    /// Children arrive but the final batch is never flagged.
    Unterminated,
}

#[derive(Debug, Clone, Default)]
pub struct SimObject {
    type_name: String,
    fields: Vec<(String, Slot)>,
    entries: Vec<(Option<Slot>, Option<Slot>)>,
    behavior: Behavior,
}

impl SimObject {
    pub fn field(&mut self, name: impl Into<String>, slot: Slot) -> &mut Self {
        self.fields.push((name.into(), slot));
        self
    }

    /// Adds a map entry. A missing side means the host reports no such child.
    pub fn entry(&mut self, key: Option<Slot>, value: Option<Slot>) -> &mut Self {
        self.entries.push((key, value));
        self
    }

    pub fn failing(&mut self) -> &mut Self {
        self.behavior = Behavior::Failing;
        self
    }

    pub fn unterminated(&mut self) -> &mut Self {
        self.behavior = Behavior::Unterminated;
        self
    }

    fn is_map(&self) -> bool {
        !self.entries.is_empty()
    }
}

#[derive(Debug, Default)]
pub struct SimHeapBuilder {
    objects: BTreeMap<u64, SimObject>,
    roots: Vec<(String, Slot)>,
    delivery: Delivery,
}

impl SimHeapBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn object(&mut self, id: u64, type_name: impl Into<String>) -> &mut SimObject {
        let object = self.objects.entry(id).or_default();
        object.type_name = type_name.into();
        object
    }

    /// Same as [`object`](Self::object); reads better for maps.
    pub fn map(&mut self, id: u64, type_name: impl Into<String>) -> &mut SimObject {
        self.object(id, type_name)
    }

    pub fn root(&mut self, name: impl Into<String>, slot: Slot) -> &mut Self {
        self.roots.push((name.into(), slot));
        self
    }

    pub fn delivery(&mut self, delivery: Delivery) -> &mut Self {
        self.delivery = delivery;
        self
    }

    pub fn build(&mut self) -> Arc<SimHeap> {
        Arc::new(SimHeap {
            data: Arc::new(HeapData {
                objects: std::mem::take(&mut self.objects).into_iter().collect(),
                delivery: self.delivery,
                requests: Mutex::new(HashMap::new()),
            }),
            roots: std::mem::take(&mut self.roots),
        })
    }
}

pub struct SimHeap {
    data: Arc<HeapData>,
    roots: Vec<(String, Slot)>,
}

struct HeapData {
    objects: HashMap<u64, SimObject>,
    delivery: Delivery,
    requests: Mutex<HashMap<u64, usize>>,
}

impl SimHeap {
    pub fn builder() -> SimHeapBuilder {
        SimHeapBuilder::new()
    }

    /// How many times the children of object `id` were requested.
    pub fn requests_for(&self, id: u64) -> usize {
        self.data.requests.lock().get(&id).copied().unwrap_or(0)
    }

    pub fn total_requests(&self) -> usize {
        self.data.requests.lock().values().sum()
    }

    pub fn object_count(&self) -> usize {
        self.data.objects.len()
    }

    /// A handle to object `id`, as the host would hand it out.
    pub fn value(&self, id: u64) -> Option<ValueRef> {
        self.data
            .objects
            .contains_key(&id)
            .then(|| value_of(&self.data, &Slot::Ref(id)))
    }
}

impl ValueInspector for SimHeap {
    fn roots(&self) -> Result<Vec<NamedValue>, InspectError> {
        self.roots
            .iter()
            .map(|(name, slot)| {
                if let Slot::Ref(id) = slot {
                    if !self.data.objects.contains_key(id) {
                        return Err(InspectError::Unresolvable {
                            name: name.clone(),
                            reason: format!("no object with id {id}"),
                        });
                    }
                }
                Ok(NamedValue::new(name.clone(), value_of(&self.data, slot)))
            })
            .collect()
    }
}

fn value_of(heap: &Arc<HeapData>, slot: &Slot) -> ValueRef {
    let kind = match slot {
        Slot::Null { type_name } => SimValueKind::Null(type_name.clone()),
        Slot::Primitive { type_name, value } => SimValueKind::Primitive {
            type_name: type_name.clone(),
            value: value.clone(),
        },
        Slot::Ref(id) => SimValueKind::Object(*id),
        Slot::Orphan { type_name } => SimValueKind::Orphan(type_name.clone()),
    };
    Arc::new(SimValue {
        heap: Arc::clone(heap),
        kind,
    })
}

struct SimValue {
    heap: Arc<HeapData>,
    kind: SimValueKind,
}

enum SimValueKind {
    Null(String),
    Primitive { type_name: String, value: String },
    Object(u64),
    Entry {
        map_type: String,
        key: Option<Slot>,
        value: Option<Slot>,
    },
    Orphan(String),
}

impl InspectedValue for SimValue {
    fn kind(&self) -> ValueKind {
        match self.kind {
            SimValueKind::Null(_) => ValueKind::Null,
            SimValueKind::Primitive { .. } => ValueKind::Primitive,
            SimValueKind::Object(_) | SimValueKind::Entry { .. } | SimValueKind::Orphan(_) => {
                ValueKind::Composite
            }
        }
    }

    fn type_name(&self) -> String {
        match &self.kind {
            SimValueKind::Null(type_name)
            | SimValueKind::Primitive { type_name, .. }
            | SimValueKind::Orphan(type_name) => type_name.clone(),
            SimValueKind::Object(id) => self
                .heap
                .objects
                .get(id)
                .map_or_else(|| "<unknown>".to_string(), |object| object.type_name.clone()),
            SimValueKind::Entry { map_type, .. } => format!("{map_type}$Entry"),
        }
    }

    fn identity(&self) -> Option<ObjectId> {
        match self.kind {
            SimValueKind::Object(id) => Some(ObjectId::new(id)),
            _ => None,
        }
    }

    fn display_value(&self) -> String {
        match &self.kind {
            SimValueKind::Null(_) => "null".to_string(),
            SimValueKind::Primitive { value, .. } => value.clone(),
            _ => self.type_name(),
        }
    }

    fn compute_children(&self, sink: ChildSink) {
        match &self.kind {
            SimValueKind::Object(id) => {
                *self.heap.requests.lock().entry(*id).or_default() += 1;
                let Some(object) = self.heap.objects.get(id) else {
                    fail(self.heap.delivery, sink, format!("object {id} vanished"));
                    return;
                };
                match object.behavior {
                    Behavior::Failing => {
                        fail(self.heap.delivery, sink, format!("cannot read fields of {id}"));
                    }
                    behavior => {
                        let children = if object.is_map() {
                            self.entries_of(object)
                        } else {
                            object
                                .fields
                                .iter()
                                .map(|(name, slot)| NamedValue::new(name.clone(), value_of(&self.heap, slot)))
                                .collect()
                        };
                        deliver(self.heap.delivery, sink, children, behavior != Behavior::Unterminated);
                    }
                }
            }
            SimValueKind::Entry { key, value, .. } => {
                let children = [("key", key), ("value", value)]
                    .into_iter()
                    .filter_map(|(name, slot)| {
                        slot.as_ref()
                            .map(|slot| NamedValue::new(name, value_of(&self.heap, slot)))
                    })
                    .collect();
                deliver(self.heap.delivery, sink, children, true);
            }
            _ => deliver(self.heap.delivery, sink, Vec::new(), true),
        }
    }
}

impl SimValue {
    fn entries_of(&self, map: &SimObject) -> Vec<NamedValue> {
        map.entries
            .iter()
            .enumerate()
            .map(|(slot, (key, value))| {
                let entry: ValueRef = Arc::new(SimValue {
                    heap: Arc::clone(&self.heap),
                    kind: SimValueKind::Entry {
                        map_type: map.type_name.clone(),
                        key: key.clone(),
                        value: value.clone(),
                    },
                });
                NamedValue::new(slot.to_string(), entry)
            })
            .collect()
    }
}

fn fail(delivery: Delivery, sink: ChildSink, message: String) {
    match delivery {
        Delivery::Inline => sink.error(message),
        Delivery::Threaded | Delivery::Scattered { .. } => {
            thread::spawn(move || sink.error(message));
        }
    }
}

fn deliver(delivery: Delivery, mut sink: ChildSink, children: Vec<NamedValue>, terminate: bool) {
    match delivery {
        Delivery::Inline => sink.add_children(children, terminate),
        Delivery::Threaded => {
            thread::spawn(move || sink.add_children(children, terminate));
        }
        Delivery::Scattered { max_delay } => {
            thread::spawn(move || scatter(sink, children, max_delay, terminate));
        }
    }
}

fn scatter(mut sink: ChildSink, mut rest: Vec<NamedValue>, max_delay: Duration, terminate: bool) {
    let mut rng = rand::thread_rng();
    let max_micros = max_delay.as_micros() as u64;
    loop {
        let take = if rest.is_empty() || rng.gen_bool(0.2) {
            0
        } else {
            rng.gen_range(1..=rest.len())
        };
        let batch: Vec<NamedValue> = rest.drain(..take).collect();
        let last = rest.is_empty();
        thread::sleep(Duration::from_micros(rng.gen_range(0..=max_micros)));
        trace!(parent = %sink.parent(), batch = batch.len(), last, "delivering batch");
        sink.add_children(batch, last && terminate);
        if last {
            return;
        }
    }
}
