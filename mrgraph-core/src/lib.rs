//! Per-vertex state for distributed assembly-graph simplification.
//!
//! A vertex never sees the global graph. It carries its own sorted
//! adjacency in both directions, a cached classification and an opaque
//! payload, and travels between tasks in a fixed binary layout
//! (see [`codec`]).

pub mod codec;
pub mod entities;
pub mod errors;
pub mod utils;

pub mod prelude {
    pub use crate::{
        codec::{EdgeFormat, WireValue},
        entities::{
            adj::AdjList,
            edge::EdgeMessage,
            flags::VertexFlags,
            payload::{NoPayload, Payload, Span},
            vertex::{CompressOutcome, VertexRecord},
            Tail, VertexConfig, VertexId, NO_VERTEX,
        },
        errors::{DecodeError, EncodeError, VertexError},
    };
}
