//! Wire formats for values moved between map and reduce tasks.
//!
//! Every binary value starts with a one byte type tag so that a reducer
//! receiving a mix of vertex records and edge messages under one key can
//! tell them apart before decoding:
//!
//! ```text
//! vertex: [0x01][flags][i32 id][u16 n][i32; n][u16 m][i32; m][u16 len][payload]
//! edge:   [0x02][i32 from][i32 to]
//! ```
//!
//! All integers are big-endian.

use crate::{
    entities::{edge::EdgeMessage, payload::Payload, vertex::VertexRecord, VertexConfig},
    errors::DecodeError,
};
use serde::{Deserialize, Serialize};

pub mod binary;
pub mod text;

pub const TAG_VERTEX: u8 = 0x01;
pub const TAG_EDGE: u8 = 0x02;

/// Which adjacency directions a serialized vertex carries.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeFormat {
    /// Out-edges only; the in-edge count is written as zero.
    #[default]
    OutOnly,
    OutAndIn,
}

impl EdgeFormat {
    pub fn for_in_edges(include: bool) -> Self {
        if include {
            EdgeFormat::OutAndIn
        } else {
            EdgeFormat::OutOnly
        }
    }

    pub fn includes_in_edges(self) -> bool {
        matches!(self, EdgeFormat::OutAndIn)
    }
}

pub fn is_vertex_record(bytes: &[u8]) -> bool {
    bytes.first() == Some(&TAG_VERTEX)
}

/// Reads the cached branch flag without decoding the rest of the record.
pub fn is_branch_record(bytes: &[u8]) -> bool {
    is_vertex_record(bytes) && bytes.get(1).is_some_and(|flags| flags & 0x01 != 0)
}

pub fn is_edge_message(bytes: &[u8]) -> bool {
    bytes.first() == Some(&TAG_EDGE)
}

/// A decoded value of either kind.
#[derive(Clone, Debug, PartialEq)]
pub enum WireValue<P: Payload> {
    Vertex(VertexRecord<P>),
    Edge(EdgeMessage),
}

impl<P: Payload> WireValue<P> {
    pub fn from_bytes(bytes: &[u8], config: &VertexConfig) -> Result<Self, DecodeError> {
        match bytes.first() {
            None => Err(DecodeError::Empty),
            Some(&TAG_VERTEX) => Ok(WireValue::Vertex(VertexRecord::from_bytes(bytes, config)?)),
            Some(&TAG_EDGE) => Ok(WireValue::Edge(EdgeMessage::from_bytes(bytes)?)),
            Some(&tag) => Err(DecodeError::UnknownTag(tag)),
        }
    }
}

#[cfg(test)]
mod codec_tests {
    use super::*;
    use crate::entities::payload::NoPayload;

    #[test]
    fn wire_value_dispatches_on_tag() {
        let config = VertexConfig::default();
        let mut v: VertexRecord = VertexRecord::new(3, &config).unwrap();
        v.add_edge_to(4);
        let bytes = v.to_bytes(EdgeFormat::OutOnly).unwrap();
        assert_eq!(
            WireValue::from_bytes(&bytes, &config),
            Ok(WireValue::Vertex(v))
        );

        let edge = EdgeMessage::new(3, 4);
        assert_eq!(
            WireValue::<NoPayload>::from_bytes(&edge.to_bytes(), &config),
            Ok(WireValue::Edge(edge))
        );

        assert_eq!(
            WireValue::<NoPayload>::from_bytes(&[], &config),
            Err(DecodeError::Empty)
        );
        assert_eq!(
            WireValue::<NoPayload>::from_bytes(&[9, 0], &config),
            Err(DecodeError::UnknownTag(9))
        );
    }

    #[test]
    fn probes_only_look_at_the_header() {
        assert!(is_vertex_record(&[TAG_VERTEX]));
        assert!(!is_branch_record(&[TAG_VERTEX]));
        assert!(is_branch_record(&[TAG_VERTEX, 0x01]));
        assert!(is_branch_record(&[TAG_VERTEX, 0x05, 0xff]));
        assert!(!is_branch_record(&[TAG_EDGE, 0x01]));
        assert!(is_edge_message(&[TAG_EDGE]));
        assert!(!is_edge_message(&[]));
    }
}
