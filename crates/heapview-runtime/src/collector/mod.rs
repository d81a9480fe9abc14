//! Collectors accumulate traversal output into an [`ObjectDiagram`].
//!
//! A collector hands every snapshot its own [`DiagramWriter`]; traversal
//! output goes there, from whichever thread the host delivers children on.
//! The collector only decides what happens to the finished diagram.

use std::collections::HashSet;
use std::error::Error;
use std::fmt;

use heapview_types::{DiagramError, ObjectDiagram, ObjectId, OdObject};
use heapview_wire::WireError;

use crate::ValueRef;

mod batch;
mod buffer;
mod expansion;
mod streaming;
mod writer;

pub use batch::BatchCollector;
pub use expansion::ExpansionCollector;
pub use streaming::StreamingCollector;
pub use writer::DiagramWriter;

pub(crate) use buffer::DiagramBuffer;

pub trait DiagramCollector: Send + Sync {
    /// Opens a fresh writer for one snapshot.
    fn begin(&self) -> DiagramWriter {
        DiagramWriter::new()
    }

    /// Closes `writer` and publishes what it accumulated. Called once the
    /// barrier released.
    fn finalize(&self, writer: &DiagramWriter) -> Result<ObjectDiagram, CollectError>;

    /// Looks up an object emitted by an earlier snapshot, together with the
    /// handle needed to expand it.
    fn resolve_by_id(&self, _id: ObjectId) -> Option<(OdObject, ValueRef)> {
        None
    }

    /// Takes ownership of a handle discovered outside a full snapshot.
    fn adopt(&self, _object: OdObject, _handle: ValueRef) {}

    /// Identities already known to viewers of this collector.
    fn known_ids(&self) -> HashSet<ObjectId> {
        HashSet::new()
    }
}

/// Receives every finalized diagram, e.g. to render it locally.
pub trait DiagramSink: Send + Sync {
    fn deliver(&self, diagram: &ObjectDiagram) -> Result<(), String>;
}

impl<F> DiagramSink for F
where
    F: Fn(&ObjectDiagram) -> Result<(), String> + Send + Sync,
{
    fn deliver(&self, diagram: &ObjectDiagram) -> Result<(), String> {
        self(diagram)
    }
}

/// Failure to publish a finished diagram. The diagram itself is kept, so
/// the caller can still use it or retry in another format.
#[derive(Debug)]
pub enum CollectError {
    Sink {
        diagram: Box<ObjectDiagram>,
        message: String,
    },
    Encode {
        diagram: Box<ObjectDiagram>,
        source: WireError,
    },
    Inconsistent {
        diagram: Box<ObjectDiagram>,
        source: DiagramError,
    },
}

impl CollectError {
    pub fn diagram(&self) -> &ObjectDiagram {
        match self {
            Self::Sink { diagram, .. }
            | Self::Encode { diagram, .. }
            | Self::Inconsistent { diagram, .. } => diagram,
        }
    }

    pub fn into_diagram(self) -> ObjectDiagram {
        match self {
            Self::Sink { diagram, .. }
            | Self::Encode { diagram, .. }
            | Self::Inconsistent { diagram, .. } => *diagram,
        }
    }
}

impl fmt::Display for CollectError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sink { message, .. } => write!(f, "diagram sink failed: {message}"),
            Self::Encode { source, .. } => write!(f, "failed to publish diagram: {source}"),
            Self::Inconsistent { source, .. } => write!(f, "inconsistent diagram: {source}"),
        }
    }
}

impl Error for CollectError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sink { .. } => None,
            Self::Encode { source, .. } => Some(source),
            Self::Inconsistent { source, .. } => Some(source),
        }
    }
}
