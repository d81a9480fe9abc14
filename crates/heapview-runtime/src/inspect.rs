//! The value-inspection seam: what heapview needs from the host debugger.

use std::error::Error;
use std::fmt;
use std::sync::Arc;

use heapview_types::ObjectId;

use crate::ChildSink;

/// Shared handle to a host value. Kept by the streaming collector so a
/// viewer can expand an object long after the snapshot finished.
pub type ValueRef = Arc<dyn InspectedValue>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    /// A null reference.
    Null,
    /// Numbers, booleans, characters, strings: anything shown inline.
    Primitive,
    /// Objects, arrays, collections, maps: anything with an identity and children.
    Composite,
}

impl ValueKind {
    pub fn is_primitive(self) -> bool {
        matches!(self, Self::Primitive)
    }

    pub fn is_composite(self) -> bool {
        matches!(self, Self::Composite)
    }
}

/// One value exposed by the host.
pub trait InspectedValue: Send + Sync {
    fn kind(&self) -> ValueKind;

    fn type_name(&self) -> String;

    /// Stable identity; only meaningful for composite values.
    fn identity(&self) -> Option<ObjectId>;

    /// Textual form of a primitive or null value.
    fn display_value(&self) -> String;

    /// Requests this value's children.
    ///
    /// Hosts may deliver on any thread, in any number of batches, and may
    /// return before delivering. The request is complete once the sink sees
    /// its last batch, an error, or is dropped.
    ///
    /// Map-like values deliver their entries, each of which delivers
    /// children named `key` and/or `value`.
    fn compute_children(&self, sink: ChildSink);
}

/// A child value together with the name it is reached through.
#[derive(Clone)]
pub struct NamedValue {
    pub name: String,
    pub value: ValueRef,
}

impl NamedValue {
    pub fn new(name: impl Into<String>, value: ValueRef) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }
}

impl fmt::Debug for NamedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NamedValue")
            .field("name", &self.name)
            .field("type_name", &self.value.type_name())
            .field("identity", &self.value.identity())
            .finish()
    }
}

/// Source of the roots of a snapshot: typically the paused stack frame.
pub trait ValueInspector: Send + Sync {
    fn roots(&self) -> Result<Vec<NamedValue>, InspectError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InspectError {
    /// The host cannot be queried at all (detached, not paused, unresponsive).
    Unavailable(String),
    Unresolvable { name: String, reason: String },
}

impl fmt::Display for InspectError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unavailable(reason) => write!(f, "value inspection unavailable: {reason}"),
            Self::Unresolvable { name, reason } => {
                write!(f, "cannot resolve value {name:?}: {reason}")
            }
        }
    }
}

impl Error for InspectError {}
