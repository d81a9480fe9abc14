use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use heapview_types::{MapTypePolicy, ObjectDiagram, ObjectId, OdLink};
use parking_lot::Mutex;

use crate::sim::{Delivery, SimHeap, Slot};
use crate::*;

fn id(raw: u64) -> ObjectId {
    ObjectId::new(raw)
}

fn batch_session(depth: u32) -> SnapshotSession {
    SnapshotSession::new(
        SnapshotConfig::default().with_max_depth(depth),
        Arc::new(BatchCollector::new()),
    )
}

fn snapshot(heap: &SimHeap, depth: u32) -> ObjectDiagram {
    batch_session(depth)
        .pause(heap)
        .expect("snapshot succeeds")
        .expect("session is active")
}

fn ids(diagram: &ObjectDiagram) -> Vec<ObjectId> {
    diagram.object_ids().collect()
}

fn friends_heap(delivery: Delivery) -> Arc<SimHeap> {
    let mut heap = SimHeap::builder();
    heap.object(1, "Person")
        .field("name", Slot::string("alice"))
        .field("friend", Slot::reference(2));
    heap.object(2, "Person")
        .field("name", Slot::string("bob"))
        .field("friend", Slot::reference(3));
    heap.object(3, "Person")
        .field("name", Slot::string("carol"))
        .field("friend", Slot::reference(1));
    heap.root("alice", Slot::reference(1)).delivery(delivery);
    heap.build()
}

#[test]
fn cycle_yields_two_objects_and_two_links() {
    let mut heap = SimHeap::builder();
    heap.object(1, "Node").field("next", Slot::reference(2));
    heap.object(2, "Node").field("next", Slot::reference(1));
    heap.root("a", Slot::reference(1));
    let heap = heap.build();

    let diagram = snapshot(&heap, 10);

    assert_eq!(ids(&diagram), vec![id(1), id(2)]);
    assert_eq!(
        diagram.links,
        vec![OdLink::new(id(1), id(2), "next"), OdLink::new(id(2), id(1), "next")]
    );
    assert_eq!(heap.requests_for(1), 1);
    assert_eq!(heap.requests_for(2), 1);
}

#[test]
fn depth_zero_emits_roots_only() {
    let heap = friends_heap(Delivery::Inline);
    let diagram = snapshot(&heap, 0);

    assert_eq!(ids(&diagram), vec![id(1)]);
    assert!(diagram.links.is_empty());
    assert!(diagram.objects[0].attributes.is_empty());
    assert_eq!(diagram.objects[0].label, "alice");
    assert_eq!(heap.total_requests(), 0);
}

#[test]
fn depth_limit_stops_expansion_but_keeps_the_link() {
    let heap = friends_heap(Delivery::Inline);
    let diagram = snapshot(&heap, 1);

    assert_eq!(ids(&diagram), vec![id(1), id(2)]);
    assert_eq!(diagram.links, vec![OdLink::new(id(1), id(2), "friend")]);
    let alice = diagram.object(id(1)).expect("alice");
    assert_eq!(alice.attribute("name").map(|a| a.value.as_str()), Some("\"alice\""));
    assert!(diagram.object(id(2)).expect("bob").attributes.is_empty());
    assert_eq!(heap.requests_for(2), 0);
}

#[test]
fn primitive_roots_keep_their_order_and_nulls_read_null() {
    let mut heap = SimHeap::builder();
    heap.root("count", Slot::int(3))
        .root("title", Slot::string("inventory"))
        .root("missing", Slot::null("Product"));
    let diagram = snapshot(&heap.build(), 3);

    assert!(diagram.objects.is_empty());
    let roots: Vec<(&str, &str, &str)> = diagram
        .primitive_root_values
        .iter()
        .map(|v| (v.name.as_str(), v.type_name.as_str(), v.value.as_str()))
        .collect();
    assert_eq!(
        roots,
        vec![
            ("count", "int", "3"),
            ("title", "String", "\"inventory\""),
            ("missing", "Product", "null"),
        ]
    );
}

#[test]
fn null_fields_become_null_attributes() {
    let mut heap = SimHeap::builder();
    heap.object(1, "Product")
        .field("name", Slot::string("shelf"))
        .field("supplier", Slot::null("Supplier"));
    heap.root("shelf", Slot::reference(1));
    let diagram = snapshot(&heap.build(), 2);

    let shelf = diagram.object(id(1)).expect("shelf");
    assert_eq!(shelf.attribute("supplier").map(|a| a.value.as_str()), Some("null"));
    assert!(diagram.links.is_empty());
}

#[test]
fn composite_values_without_identity_are_skipped() {
    let mut heap = SimHeap::builder();
    heap.object(1, "Holder")
        .field("ghost", Slot::orphan("Ghost"))
        .field("size", Slot::int(1));
    heap.root("holder", Slot::reference(1))
        .root("lost", Slot::orphan("Ghost"));
    let diagram = snapshot(&heap.build(), 3);

    assert_eq!(ids(&diagram), vec![id(1)]);
    assert_eq!(diagram.objects[0].attributes.len(), 1);
    assert!(diagram.links.is_empty());
}

#[test]
fn scattered_delivery_is_referentially_complete() {
    const COUNT: u64 = 40;
    for _ in 0..20 {
        let mut heap = SimHeap::builder();
        for i in 1..=COUNT {
            heap.object(i, "Cell")
                .field("value", Slot::int(i as i64))
                .field("next", Slot::reference(i % COUNT + 1))
                .field("skip", Slot::reference((i * 7) % COUNT + 1));
        }
        heap.root("head", Slot::reference(1)).delivery(Delivery::Scattered {
            max_delay: Duration::from_micros(300),
        });
        let heap = heap.build();

        let diagram = snapshot(&heap, 100);

        assert_eq!(diagram.check_links(), Ok(()));
        let seen: HashSet<ObjectId> = diagram.object_ids().collect();
        assert_eq!(seen.len(), COUNT as usize);
        assert_eq!(diagram.objects.len(), COUNT as usize);
        assert_eq!(diagram.links.len(), 2 * COUNT as usize);
        for object in &diagram.objects {
            assert_eq!(object.attributes.len(), 1, "object {} expanded once", object.id);
        }
        for i in 1..=COUNT {
            assert_eq!(heap.requests_for(i), 1);
        }
    }
}

fn inventory_heap() -> Arc<SimHeap> {
    let mut heap = SimHeap::builder();
    heap.map(10, "java.util.HashMap")
        .entry(Some(Slot::string("a")), Some(Slot::int(1)))
        .entry(Some(Slot::string("b")), Some(Slot::reference(20)))
        .entry(Some(Slot::null("String")), Some(Slot::int(3)));
    heap.object(20, "Material").field("price", Slot::int(5));
    heap.root("stock", Slot::reference(10));
    heap.build()
}

#[test]
fn map_entries_become_slot_labelled_entry_nodes() {
    let heap = inventory_heap();
    let diagram = snapshot(&heap, 2);

    let labels: Vec<&str> = diagram.objects.iter().map(|o| o.label.as_str()).collect();
    assert_eq!(labels, vec!["stock", "0", "1", "value", "2"]);
    let entry = &diagram.objects[1];
    assert_eq!(entry.type_name, "java.util.HashMap$Entry");
    assert_eq!(entry.attribute("key").map(|a| a.value.as_str()), Some("\"a\""));
    assert_eq!(entry.attribute("value").map(|a| a.value.as_str()), Some("1"));
    assert_eq!(diagram.objects[4].attribute("key").map(|a| a.value.as_str()), Some("null"));

    let from_map: Vec<&str> = diagram
        .outgoing_links(id(10))
        .map(|link| link.label.as_str())
        .collect();
    assert_eq!(from_map, vec!["0", "1", "2"]);
    assert_eq!(diagram.check_links(), Ok(()));
}

#[test]
fn map_entries_do_not_use_up_depth() {
    let diagram = snapshot(&inventory_heap(), 1);
    // Depth 1 still reaches the referenced value, but does not expand it.
    let material = diagram.object(id(20)).expect("material");
    assert!(material.attributes.is_empty());
    assert_eq!(diagram.objects.len(), 5);
}

#[test]
fn map_snapshot_renders_as_plantuml_map() {
    let diagram = snapshot(&inventory_heap(), 2);
    let text = heapview_render::to_plantuml(&diagram, &MapTypePolicy::default());
    assert_eq!(
        text,
        "@startuml\n\
         !pragma layout smetana\n\
         map \"stock:HashMap\" as 10 {\n\
         \"a\" => 1\n\
         \"b\" *-> 20\n\
         null => 3\n\
         }\n\
         object \"value:Material\" as 20 {\n\
         price=5\n\
         }\n\
         @enduml\n"
    );
}

#[test]
fn maps_outside_the_policy_are_plain_objects() {
    let session = SnapshotSession::new(
        SnapshotConfig::default()
            .with_max_depth(2)
            .with_map_types(MapTypePolicy::none()),
        Arc::new(BatchCollector::new()),
    );
    let diagram = session
        .pause(inventory_heap().as_ref())
        .expect("snapshot")
        .expect("active");
    // Entries have no identity, so without map handling they are skipped.
    assert_eq!(ids(&diagram), vec![id(10)]);
}

#[test]
fn manual_allow_list_bypasses_depth_for_that_object_only() {
    let mut heap = SimHeap::builder();
    for i in 1..=4u64 {
        heap.object(i, "Link").field("next", Slot::reference(i + 1));
    }
    heap.object(5, "Link");
    heap.root("head", Slot::reference(1));
    let heap = heap.build();

    let session = batch_session(1);
    let plain = session.pause(heap.as_ref()).expect("snapshot").expect("active");
    assert_eq!(ids(&plain), vec![id(1), id(2)]);

    session.add_manually_explored_object(id(2));
    let manual = session.pause(heap.as_ref()).expect("snapshot").expect("active");
    assert_eq!(ids(&manual), vec![id(1), id(2), id(3)]);
    assert_eq!(heap.requests_for(3), 0);
}

#[test]
fn failing_child_request_skips_only_that_subtree() {
    let mut heap = SimHeap::builder();
    heap.object(1, "Order")
        .field("broken", Slot::reference(2))
        .field("line", Slot::reference(3));
    heap.object(2, "Customer")
        .field("name", Slot::string("x"))
        .failing();
    heap.object(3, "OrderLine").field("quantity", Slot::int(4));
    heap.root("order", Slot::reference(1)).delivery(Delivery::Threaded);
    let heap = heap.build();

    let diagram = snapshot(&heap, 5);

    assert_eq!(diagram.objects.len(), 3);
    assert!(diagram.object(id(2)).expect("customer").attributes.is_empty());
    let line = diagram.object(id(3)).expect("line");
    assert_eq!(line.attribute("quantity").map(|a| a.value.as_str()), Some("4"));
}

#[test]
fn sink_dropped_without_final_batch_still_completes() {
    let mut heap = SimHeap::builder();
    heap.object(1, "Sensor")
        .field("reading", Slot::double(21.5))
        .unterminated();
    heap.root("sensor", Slot::reference(1)).delivery(Delivery::Threaded);
    let diagram = snapshot(&heap.build(), 2);

    let sensor = diagram.object(id(1)).expect("sensor");
    assert_eq!(sensor.attribute("reading").map(|a| a.value.as_str()), Some("21.5"));
}

#[test]
fn inactive_session_takes_no_snapshot() {
    let heap = friends_heap(Delivery::Inline);
    let session = batch_session(3);
    session.set_active(false);
    assert!(session.pause(heap.as_ref()).expect("no error").is_none());
    assert_eq!(heap.total_requests(), 0);

    session.set_active(true);
    assert!(session.pause(heap.as_ref()).expect("snapshot").is_some());
}

#[test]
fn unresolvable_root_fails_the_snapshot() {
    let mut heap = SimHeap::builder();
    heap.root("dangling", Slot::reference(99));
    let result = batch_session(3).pause(heap.build().as_ref());
    assert!(matches!(
        result,
        Err(SnapshotError::Inspect(InspectError::Unresolvable { .. }))
    ));
}

#[test]
fn spawned_pause_runs_on_a_named_thread() {
    let heap = friends_heap(Delivery::Threaded);
    let session = Arc::new(batch_session(5));
    let handle = session.spawn_pause(heap).expect("spawn");
    assert_eq!(handle.thread().name(), Some("heapview-snapshot"));
    let diagram = handle.join().expect("join").expect("snapshot").expect("active");
    assert_eq!(diagram.objects.len(), 3);
}

#[test]
fn batch_sink_failure_preserves_the_diagram() {
    let delivered = Arc::new(Mutex::new(0usize));
    let ok_sink = {
        let delivered = Arc::clone(&delivered);
        move |diagram: &ObjectDiagram| -> Result<(), String> {
            *delivered.lock() += diagram.objects.len();
            Ok(())
        }
    };
    let heap = friends_heap(Delivery::Inline);
    let session = SnapshotSession::new(
        SnapshotConfig::default(),
        Arc::new(BatchCollector::with_sink(Arc::new(ok_sink))),
    );
    session.pause(heap.as_ref()).expect("snapshot");
    assert_eq!(*delivered.lock(), 3);

    let failing = |_: &ObjectDiagram| -> Result<(), String> { Err("disk full".to_string()) };
    let session = SnapshotSession::new(
        SnapshotConfig::default(),
        Arc::new(BatchCollector::with_sink(Arc::new(failing))),
    );
    match session.pause(heap.as_ref()) {
        Err(SnapshotError::Collect(error)) => {
            assert_eq!(error.diagram().objects.len(), 3);
            assert!(error.to_string().contains("disk full"));
        }
        other => panic!("expected a sink failure, got {other:?}"),
    }
}

#[test]
fn streaming_collector_publishes_to_viewers() {
    let collector = Arc::new(StreamingCollector::new());
    let mut viewer = collector.subscribe();
    let session = SnapshotSession::new(SnapshotConfig::default(), collector.clone());

    let diagram = session
        .pause(friends_heap(Delivery::Inline).as_ref())
        .expect("snapshot")
        .expect("active");

    let document = viewer.try_recv().expect("document pushed to viewer");
    assert_eq!(heapview_wire::decode_diagram(&document), Ok(diagram.clone()));
    assert_eq!(collector.published_document().as_deref(), Some(&*document));
    assert_eq!(*collector.published(), diagram);
}

#[test]
fn streaming_expand_on_demand_returns_one_level() {
    let collector = Arc::new(StreamingCollector::new());
    let session = SnapshotSession::new(
        SnapshotConfig::default()
            .with_max_depth(1)
            .with_collector(CollectorKind::Streaming),
        collector.clone(),
    );
    let heap = friends_heap(Delivery::Threaded);
    session.pause(heap.as_ref()).expect("snapshot").expect("active");
    assert_eq!(ids(&collector.published()), vec![id(1), id(2)]);

    let bob = session.expand(id(2)).expect("expand").expect("bob is known");
    assert_eq!(ids(&bob), vec![id(2), id(3)]);
    assert_eq!(bob.objects[0].attributes.len(), 1);
    assert!(bob.objects[1].attributes.is_empty());
    assert_eq!(bob.links, vec![OdLink::new(id(2), id(3), "friend")]);

    // Carol was only discovered by the expansion, and can be expanded in turn.
    let carol = session.expand(id(3)).expect("expand").expect("carol was adopted");
    assert_eq!(ids(&carol), vec![id(3)]);
    assert_eq!(carol.links, vec![OdLink::new(id(3), id(1), "friend")]);

    assert!(session.expand(id(99)).expect("expand").is_none());
    assert_eq!(collector.published().objects.len(), 2);
}

#[test]
fn batch_collector_cannot_expand() {
    let session = batch_session(1);
    session
        .pause(friends_heap(Delivery::Inline).as_ref())
        .expect("snapshot");
    assert!(session.expand(id(2)).expect("expand").is_none());
}

#[test]
fn collector_for_follows_config() {
    let streaming = SnapshotConfig::default().with_collector(CollectorKind::Streaming);
    let collector = collector_for(&streaming, None);
    let session = SnapshotSession::new(streaming, collector);
    session
        .pause(friends_heap(Delivery::Inline).as_ref())
        .expect("snapshot");
    assert!(session.expand(id(1)).expect("expand").is_some());
}

struct Text(&'static str);

impl InspectedValue for Text {
    fn kind(&self) -> ValueKind {
        ValueKind::Primitive
    }

    fn type_name(&self) -> String {
        "String".to_string()
    }

    fn identity(&self) -> Option<ObjectId> {
        None
    }

    fn display_value(&self) -> String {
        self.0.to_string()
    }

    fn compute_children(&self, _sink: ChildSink) {}
}

/// Parks every child request instead of answering it.
struct Hung {
    parked: Arc<Mutex<Vec<ChildSink>>>,
}

impl InspectedValue for Hung {
    fn kind(&self) -> ValueKind {
        ValueKind::Composite
    }

    fn type_name(&self) -> String {
        "Hung".to_string()
    }

    fn identity(&self) -> Option<ObjectId> {
        Some(ObjectId::new(500))
    }

    fn display_value(&self) -> String {
        String::new()
    }

    fn compute_children(&self, sink: ChildSink) {
        self.parked.lock().push(sink);
    }
}

/// Keeps talking after its final batch.
struct Chatty;

impl InspectedValue for Chatty {
    fn kind(&self) -> ValueKind {
        ValueKind::Composite
    }

    fn type_name(&self) -> String {
        "Chatty".to_string()
    }

    fn identity(&self) -> Option<ObjectId> {
        Some(ObjectId::new(600))
    }

    fn display_value(&self) -> String {
        String::new()
    }

    fn compute_children(&self, mut sink: ChildSink) {
        sink.add_children(vec![NamedValue::new("first", Arc::new(Text("1")))], true);
        assert!(sink.is_finished());
        sink.add_children(vec![NamedValue::new("second", Arc::new(Text("2")))], true);
    }
}

struct Roots(Vec<NamedValue>);

impl ValueInspector for Roots {
    fn roots(&self) -> Result<Vec<NamedValue>, InspectError> {
        Ok(self.0.clone())
    }
}

#[test]
fn hung_host_times_out_with_outstanding_count() {
    let parked = Arc::new(Mutex::new(Vec::new()));
    let roots = Roots(vec![NamedValue::new(
        "stuck",
        Arc::new(Hung {
            parked: Arc::clone(&parked),
        }),
    )]);
    let session = SnapshotSession::new(
        SnapshotConfig::default().with_wait_timeout(Duration::from_millis(20)),
        Arc::new(BatchCollector::new()),
    );

    let result = session.pause(&roots);
    assert!(matches!(
        result,
        Err(SnapshotError::Barrier(BarrierError::TimedOut { outstanding: 1 }))
    ));
    assert_eq!(parked.lock().len(), 1);
}

#[test]
fn batches_after_the_final_one_are_ignored() {
    let roots = Roots(vec![NamedValue::new("chatty", Arc::new(Chatty))]);
    let diagram = batch_session(2).pause(&roots).expect("snapshot").expect("active");

    let chatty = diagram.object(id(600)).expect("chatty");
    let names: Vec<&str> = chatty.attributes.iter().map(|a| a.name.as_str()).collect();
    assert_eq!(names, vec!["first"]);
}

#[test]
fn overlapping_pauses_each_get_a_whole_diagram() {
    let heap = friends_heap(Delivery::Scattered {
        max_delay: Duration::from_micros(300),
    });
    let session = Arc::new(batch_session(10));
    for _ in 0..30 {
        let first = session.spawn_pause(heap.clone()).expect("spawn");
        let second = session.spawn_pause(heap.clone()).expect("spawn");
        for handle in [first, second] {
            let diagram = handle.join().expect("join").expect("snapshot").expect("active");
            assert_eq!(diagram.objects.len(), 3);
            assert_eq!(diagram.links.len(), 3);
            assert_eq!(diagram.check_links(), Ok(()));
        }
    }
}

/// Answers a request parked by an earlier snapshot, then reports no
/// children of its own.
struct Releaser {
    parked: Arc<Mutex<Vec<ChildSink>>>,
}

impl InspectedValue for Releaser {
    fn kind(&self) -> ValueKind {
        ValueKind::Composite
    }

    fn type_name(&self) -> String {
        "Releaser".to_string()
    }

    fn identity(&self) -> Option<ObjectId> {
        Some(ObjectId::new(800))
    }

    fn display_value(&self) -> String {
        String::new()
    }

    fn compute_children(&self, mut sink: ChildSink) {
        let stale = self.parked.lock().pop();
        if let Some(mut stale) = stale {
            stale.add_children(vec![NamedValue::new("late", Arc::new(Chatty))], true);
            assert!(stale.is_finished());
        }
        sink.add_children(Vec::new(), true);
    }
}

#[test]
fn late_answers_from_a_timed_out_snapshot_stay_out_of_the_next() {
    let parked = Arc::new(Mutex::new(Vec::new()));
    let collector = Arc::new(StreamingCollector::new());
    let session = SnapshotSession::new(
        SnapshotConfig::default()
            .with_max_depth(2)
            .with_wait_timeout(Duration::from_millis(20)),
        collector.clone(),
    );

    let stuck = Roots(vec![NamedValue::new(
        "stuck",
        Arc::new(Hung {
            parked: Arc::clone(&parked),
        }),
    )]);
    assert!(matches!(
        session.pause(&stuck),
        Err(SnapshotError::Barrier(BarrierError::TimedOut { outstanding: 1 }))
    ));

    let releaser = Roots(vec![NamedValue::new(
        "releaser",
        Arc::new(Releaser {
            parked: Arc::clone(&parked),
        }),
    )]);
    let diagram = session.pause(&releaser).expect("snapshot").expect("active");

    assert!(parked.lock().is_empty());
    assert_eq!(ids(&diagram), vec![id(800)]);
    assert!(diagram.links.is_empty());
    assert_eq!(*collector.published(), diagram);
    assert!(session.expand(id(600)).expect("expand").is_none());
}

#[test]
fn a_second_snapshot_replaces_the_first() {
    let mut heap = SimHeap::builder();
    heap.object(1, "Counter").field("value", Slot::int(1));
    heap.root("counter", Slot::reference(1));
    let first = heap.build();

    let mut heap = SimHeap::builder();
    heap.object(2, "Counter").field("value", Slot::int(2));
    heap.root("counter", Slot::reference(2)).root("step", Slot::int(1));
    let second = heap.build();

    let session = batch_session(3);
    let one = session.pause(first.as_ref()).expect("snapshot").expect("active");
    let two = session.pause(second.as_ref()).expect("snapshot").expect("active");
    assert_eq!(ids(&one), vec![id(1)]);
    assert_eq!(ids(&two), vec![id(2)]);
    assert!(one.primitive_root_values.is_empty());
    assert_eq!(two.primitive_root_values.len(), 1);
}
