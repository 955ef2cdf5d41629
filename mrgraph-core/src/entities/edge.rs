use super::VertexId;
use std::fmt::{Display, Formatter};

/// A single directed edge shipped between tasks so that its target learns
/// about the incoming edge.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EdgeMessage {
    from: VertexId,
    to: VertexId,
}

impl EdgeMessage {
    pub const fn new(from: VertexId, to: VertexId) -> Self {
        Self { from, to }
    }

    pub const fn from(&self) -> VertexId {
        self.from
    }

    pub const fn to(&self) -> VertexId {
        self.to
    }
}

impl Display for EdgeMessage {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}>{}", self.from, self.to)
    }
}
