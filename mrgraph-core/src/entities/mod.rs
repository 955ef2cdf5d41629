use serde::{Deserialize, Serialize};

pub mod adj;
pub mod edge;
pub mod flags;
pub mod payload;
pub mod vertex;

/// Identifier of a vertex, fixed before the graph enters the jobs.
pub type VertexId = i32;

/// Sentinel for "no vertex". Never the id of a live vertex.
pub const NO_VERTEX: VertexId = -1;

/// The single distinct out-neighbor of a chain vertex and how many
/// parallel edges lead to it.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Tail {
    pub id: VertexId,
    pub multiplicity: usize,
}

/// Per-vertex behaviour switches. Threaded explicitly into every record
/// instead of living in global state.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VertexConfig {
    /// Keep every occurrence of a neighbor instead of collapsing duplicates.
    pub allow_multi_edges: bool,
    /// Refuse to compress two chain vertices whose tail multiplicities differ.
    pub require_matching_multiplicities: bool,
}

impl Default for VertexConfig {
    fn default() -> Self {
        Self {
            allow_multi_edges: true,
            require_matching_multiplicities: false,
        }
    }
}

impl VertexConfig {
    pub fn with_multi_edges(mut self, allow: bool) -> Self {
        self.allow_multi_edges = allow;
        self
    }

    pub fn with_matching_multiplicities(mut self, require: bool) -> Self {
        self.require_matching_multiplicities = require;
        self
    }
}
