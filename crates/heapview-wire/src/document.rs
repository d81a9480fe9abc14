use std::error::Error;
use std::fmt;

use heapview_types::ObjectDiagram;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WireError {
    Encode(String),
    Decode(String),
}

impl fmt::Display for WireError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Encode(reason) => write!(f, "encode diagram document: {reason}"),
            Self::Decode(reason) => write!(f, "decode diagram document: {reason}"),
        }
    }
}

impl Error for WireError {}

/// Serializes a diagram as an indented JSON interchange document.
pub fn encode_diagram(diagram: &ObjectDiagram) -> Result<String, WireError> {
    facet_json::to_string_pretty(diagram).map_err(|e| WireError::Encode(e.to_string()))
}

/// Single-line variant of [`encode_diagram`], for frames pushed to viewers.
pub fn encode_diagram_compact(diagram: &ObjectDiagram) -> Result<String, WireError> {
    facet_json::to_string(diagram).map_err(|e| WireError::Encode(e.to_string()))
}

pub fn decode_diagram(document: &str) -> Result<ObjectDiagram, WireError> {
    facet_json::from_str::<ObjectDiagram>(document).map_err(|e| WireError::Decode(e.to_string()))
}
