use std::sync::Arc;

use heapview_runtime::sim::{Delivery, SimHeap, Slot};

/// A warehouse keyed by part name, with a null key, a null value and an
/// object-valued entry.
pub fn heap(delivery: Delivery) -> Arc<SimHeap> {
    let mut heap = SimHeap::builder();
    heap.object(1, "Warehouse")
        .field("name", Slot::string("north"))
        .field("stock", Slot::reference(2))
        .field("byShelf", Slot::reference(3));
    heap.map(2, "java.util.HashMap")
        .entry(Some(Slot::string("hinge")), Some(Slot::reference(10)))
        .entry(Some(Slot::string("screw")), Some(Slot::int(200)))
        .entry(Some(Slot::null("String")), Some(Slot::int(0)))
        .entry(Some(Slot::string("glue")), Some(Slot::null("Material")));
    heap.map(3, "java.util.TreeMap")
        .entry(Some(Slot::int(1)), Some(Slot::reference(10)))
        .entry(Some(Slot::int(2)), None);
    heap.object(10, "Material")
        .field("name", Slot::string("hinge"))
        .field("price", Slot::int(5));

    heap.root("warehouse", Slot::reference(1))
        .root("open", Slot::boolean(true))
        .delivery(delivery);
    heap.build()
}
