use facet::Facet;
use std::collections::HashSet;
use std::error::Error;
use std::fmt;

use crate::ObjectId;

/// A primitive-valued field of an object.
#[derive(Facet, Debug, Clone, PartialEq, Eq)]
pub struct OdAttributeValue {
    /// Field name.
    pub name: String,
    /// Declared type of the field.
    pub type_name: String,
    /// Textual value, already formatted by the host (strings keep their quotes).
    pub value: String,
}

impl OdAttributeValue {
    pub fn new(
        name: impl Into<String>,
        type_name: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
            value: value.into(),
        }
    }
}

/// A local variable or top-level primitive not owned by any object.
#[derive(Facet, Debug, Clone, PartialEq, Eq)]
pub struct OdPrimitiveRootValue {
    /// Variable name.
    pub name: String,
    /// Declared type of the variable.
    pub type_name: String,
    /// Textual value.
    pub value: String,
}

impl OdPrimitiveRootValue {
    pub fn new(
        name: impl Into<String>,
        type_name: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
            value: value.into(),
        }
    }
}

/// One heap object instance.
#[derive(Facet, Debug, Clone, PartialEq, Eq)]
pub struct OdObject {
    /// Host-assigned identity; the primary key for dedup and lookups.
    pub id: ObjectId,
    /// Declared or runtime type name, as reported by the host.
    pub type_name: String,
    /// Variable name, field name, or slot index the object was reached through.
    pub label: String,
    /// Primitive fields, in the order they were delivered.
    pub attributes: Vec<OdAttributeValue>,
}

impl OdObject {
    pub fn new(id: ObjectId, type_name: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id,
            type_name: type_name.into(),
            label: label.into(),
            attributes: Vec::new(),
        }
    }

    pub fn add_attribute(&mut self, attribute: OdAttributeValue) {
        self.attributes.push(attribute);
    }

    pub fn attribute(&self, name: &str) -> Option<&OdAttributeValue> {
        self.attributes.iter().find(|attribute| attribute.name == name)
    }
}

/// Directed reference from one object to another.
///
/// Identical links between the same pair are kept, never merged.
#[derive(Facet, Debug, Clone, PartialEq, Eq)]
pub struct OdLink {
    /// Referencing object.
    pub from: ObjectId,
    /// Referenced object.
    pub to: ObjectId,
    /// Field name, collection index, or map slot.
    pub label: String,
}

impl OdLink {
    pub fn new(from: ObjectId, to: ObjectId, label: impl Into<String>) -> Self {
        Self {
            from,
            to,
            label: label.into(),
        }
    }
}

/// One snapshot of the reachable heap.
///
/// Sequence order is discovery order, which renderers rely on for stable
/// output. Arrival order from concurrent callbacks is not root-to-leaf order.
#[derive(Facet, Debug, Clone, Default, PartialEq, Eq)]
pub struct ObjectDiagram {
    pub objects: Vec<OdObject>,
    pub links: Vec<OdLink>,
    pub primitive_root_values: Vec<OdPrimitiveRootValue>,
}

impl ObjectDiagram {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty() && self.links.is_empty() && self.primitive_root_values.is_empty()
    }

    pub fn add_object(&mut self, object: OdObject) {
        self.objects.push(object);
    }

    pub fn add_link(&mut self, link: OdLink) {
        self.links.push(link);
    }

    pub fn add_primitive_root_value(&mut self, value: OdPrimitiveRootValue) {
        self.primitive_root_values.push(value);
    }

    pub fn object(&self, id: ObjectId) -> Option<&OdObject> {
        self.objects.iter().find(|object| object.id == id)
    }

    pub fn object_mut(&mut self, id: ObjectId) -> Option<&mut OdObject> {
        self.objects.iter_mut().find(|object| object.id == id)
    }

    pub fn contains_object(&self, id: ObjectId) -> bool {
        self.objects.iter().any(|object| object.id == id)
    }

    pub fn object_ids(&self) -> impl Iterator<Item = ObjectId> + '_ {
        self.objects.iter().map(|object| object.id)
    }

    /// Links leaving `id`, in diagram order.
    pub fn outgoing_links(&self, id: ObjectId) -> impl Iterator<Item = &OdLink> + '_ {
        self.links.iter().filter(move |link| link.from == id)
    }

    /// Checks that every link endpoint is an object of this diagram.
    pub fn check_links(&self) -> Result<(), DiagramError> {
        let ids: HashSet<ObjectId> = self.object_ids().collect();
        for link in &self.links {
            for endpoint in [link.from, link.to] {
                if !ids.contains(&endpoint) {
                    return Err(DiagramError::DanglingLink {
                        from: link.from,
                        to: link.to,
                        label: link.label.clone(),
                        missing: endpoint,
                    });
                }
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiagramError {
    DanglingLink {
        from: ObjectId,
        to: ObjectId,
        label: String,
        missing: ObjectId,
    },
}

impl fmt::Display for DiagramError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DanglingLink {
                from,
                to,
                label,
                missing,
            } => write!(
                f,
                "link {from} --> {to} ({label}) references object {missing}, which is not in the diagram"
            ),
        }
    }
}

impl Error for DiagramError {}
