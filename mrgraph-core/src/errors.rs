use crate::entities::VertexId;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("Record is empty")]
    Empty,
    #[error("Unexpected type tag {found:#04x}, expected {expected:#04x}")]
    UnexpectedTag { found: u8, expected: u8 },
    #[error("Unknown type tag {0:#04x}")]
    UnknownTag(u8),
    #[error("Record truncated while reading {field}: needed {needed} bytes but {available} remain")]
    Truncated {
        field: &'static str,
        needed: usize,
        available: usize,
    },
    #[error("{0} trailing bytes after the end of the record")]
    TrailingBytes(usize),
    #[error("Unknown flag bits {0:#04x}")]
    UnknownFlags(u8),
    #[error("Vertex id {0} is reserved")]
    ReservedId(VertexId),
    #[error("Malformed text record {text:?}: {reason}")]
    MalformedText { text: String, reason: String },
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),
}

impl DecodeError {
    pub(crate) fn text(text: &str, reason: impl Into<String>) -> Self {
        DecodeError::MalformedText {
            text: text.to_string(),
            reason: reason.into(),
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum EncodeError {
    #[error("Vertex {id} has {count} {direction} edges, more than the format allows ({max})")]
    TooManyEdges {
        id: VertexId,
        direction: &'static str,
        count: usize,
        max: usize,
    },
    #[error("Vertex {id} payload is {len} bytes, more than the format allows ({max})")]
    PayloadTooLarge { id: VertexId, len: usize, max: usize },
    #[error("IO operation failed")]
    IOError {
        #[from]
        source: std::io::Error,
    },
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum VertexError {
    #[error("Vertex id {0} is reserved")]
    ReservedId(VertexId),
    #[error("Cannot merge vertex {other} into vertex {id}: ids differ")]
    IdMismatch { id: VertexId, other: VertexId },
    #[error("Edge {from}->{to} does not touch vertex {id}")]
    UnrelatedEdge {
        id: VertexId,
        from: VertexId,
        to: VertexId,
    },
}
