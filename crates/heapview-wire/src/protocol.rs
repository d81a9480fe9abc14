use heapview_types::{ObjectDiagram, ObjectId};

use crate::{WireError, encode_diagram};

/// A viewer's request to expand one object, as received on the socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpandRequest {
    raw: String,
}

impl ExpandRequest {
    pub fn from_text(text: &str) -> Self {
        Self {
            raw: text.trim().to_string(),
        }
    }

    /// The requested id as sent, for echoing back in not-found replies.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// `None` when the message is not a valid id; such requests can only
    /// be answered with a not-found reply.
    pub fn object_id(&self) -> Option<ObjectId> {
        self.raw.parse().ok()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExpandReply {
    /// One-level expansion rooted at the requested object.
    Expansion(ObjectDiagram),
    NotFound { requested: String },
}

impl ExpandReply {
    pub fn not_found(request: &ExpandRequest) -> Self {
        Self::NotFound {
            requested: request.raw().to_string(),
        }
    }

    /// Text sent back to the viewer.
    pub fn to_text(&self) -> Result<String, WireError> {
        match self {
            Self::Expansion(diagram) => encode_diagram(diagram),
            Self::NotFound { requested } => Ok(not_found_message(requested)),
        }
    }
}

pub fn not_found_message(requested: &str) -> String {
    format!("Object with id \"{requested}\" not found")
}
