//! Wire formats for heapview diagrams.
//!
//! - the interchange document: an [`ObjectDiagram`](heapview_types::ObjectDiagram)
//!   as JSON, with every sequence kept in diagram order
//! - the remote viewer protocol: a viewer sends an object id as a text
//!   message and receives either a one-level expansion document or a
//!   not-found line
//! - chunk framing for payloads too large for a single text message

mod chunk;
mod document;
mod protocol;

pub use chunk::*;
pub use document::*;
pub use protocol::*;
