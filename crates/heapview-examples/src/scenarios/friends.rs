use std::sync::Arc;

use heapview_runtime::sim::{Delivery, SimHeap, Slot};

/// People referencing each other, cycles included.
pub fn heap(delivery: Delivery) -> Arc<SimHeap> {
    let mut heap = SimHeap::builder();
    heap.object(1, "Person")
        .field("name", Slot::string("alice"))
        .field("friends", Slot::reference(4));
    heap.object(2, "Person")
        .field("name", Slot::string("bob"))
        .field("friends", Slot::reference(5));
    heap.object(3, "Person")
        .field("name", Slot::string("carol"))
        .field("bestFriend", Slot::reference(1))
        .field("partner", Slot::null("Person"));
    heap.object(4, "java.util.ArrayList")
        .field("0", Slot::reference(2))
        .field("1", Slot::reference(3));
    heap.object(5, "java.util.ArrayList")
        .field("0", Slot::reference(1));

    heap.root("alice", Slot::reference(1))
        .root("bob", Slot::reference(2))
        .root("rounds", Slot::int(7))
        .delivery(delivery);
    heap.build()
}
