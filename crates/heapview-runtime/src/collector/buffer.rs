use std::collections::HashMap;

use heapview_types::{
    ObjectDiagram, ObjectId, OdAttributeValue, OdLink, OdObject, OdPrimitiveRootValue,
};
use tracing::warn;

use crate::ValueRef;

/// Diagram under construction plus the value handles behind its objects.
#[derive(Default)]
pub(crate) struct DiagramBuffer {
    diagram: ObjectDiagram,
    index: HashMap<ObjectId, usize>,
    handles: HashMap<ObjectId, ValueRef>,
}

impl DiagramBuffer {
    pub(crate) fn add_object(&mut self, object: OdObject, handle: ValueRef) {
        if self.index.contains_key(&object.id) {
            warn!(object_id = %object.id, "object emitted twice, keeping the first");
            return;
        }
        self.index.insert(object.id, self.diagram.objects.len());
        self.handles.insert(object.id, handle);
        self.diagram.add_object(object);
    }

    pub(crate) fn add_attribute(&mut self, owner: ObjectId, attribute: OdAttributeValue) {
        match self.index.get(&owner) {
            Some(&slot) => self.diagram.objects[slot].add_attribute(attribute),
            None => warn!(
                object_id = %owner,
                attribute = %attribute.name,
                "attribute for an object that was never emitted, dropping"
            ),
        }
    }

    pub(crate) fn add_primitive_root(&mut self, value: OdPrimitiveRootValue) {
        self.diagram.add_primitive_root_value(value);
    }

    pub(crate) fn add_link(&mut self, link: OdLink) {
        self.diagram.add_link(link);
    }

    pub(crate) fn object_count(&self) -> usize {
        self.diagram.objects.len()
    }

    pub(crate) fn into_parts(self) -> (ObjectDiagram, HashMap<ObjectId, ValueRef>) {
        (self.diagram, self.handles)
    }
}
