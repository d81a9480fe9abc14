use std::sync::Arc;

use heapview_runtime::sim::{Delivery, SimHeap, Slot};

/// A product, its list of parts, and the material each part is made of.
pub fn heap(delivery: Delivery) -> Arc<SimHeap> {
    let mut heap = SimHeap::builder();
    heap.object(1, "Product")
        .field("name", Slot::string("folding wall table"))
        .field("price", Slot::int(25))
        .field("parts", Slot::reference(2));
    heap.object(2, "java.util.ArrayList")
        .field("0", Slot::reference(3))
        .field("1", Slot::reference(4));
    heap.object(3, "Part")
        .field("quantity", Slot::int(2))
        .field("material", Slot::reference(5));
    heap.object(4, "Part")
        .field("quantity", Slot::int(8))
        .field("material", Slot::reference(6));
    heap.object(5, "Material")
        .field("name", Slot::string("hinge"))
        .field("price", Slot::int(5));
    heap.object(6, "Material")
        .field("name", Slot::string("screw"))
        .field("price", Slot::int(1));

    heap.root("foldingWallTable", Slot::reference(1))
        .root("partCount", Slot::int(2))
        .root("discount", Slot::double(0.1))
        .delivery(delivery);
    heap.build()
}
