//! Human readable records, used for job input and for dumps.
//!
//! ```text
//! 3;t;4,4;            out-edges only, no payload
//! 3;b;4,4;2;00000002  out- and in-edges, hex payload
//! 3\t3;t;4,4;         key-value line
//! 3>4                 edge message
//! ```
//!
//! Flags are not stored; they are recomputed from the decoded edges.

use super::EdgeFormat;
use crate::{
    entities::{
        adj::AdjList, edge::EdgeMessage, flags::VertexFlags, payload::Payload,
        vertex::VertexRecord, VertexConfig, VertexId, NO_VERTEX,
    },
    errors::DecodeError,
};
use itertools::Itertools;
use std::str::FromStr;

fn parse_id(text: &str, field: &str) -> Result<VertexId, DecodeError> {
    match field.trim().parse() {
        Ok(NO_VERTEX) => Err(DecodeError::ReservedId(NO_VERTEX)),
        Ok(id) => Ok(id),
        Err(_) => Err(DecodeError::text(text, format!("{field:?} is not a vertex id"))),
    }
}

fn parse_ids(text: &str, field: &str) -> Result<Vec<VertexId>, DecodeError> {
    if field.is_empty() {
        return Ok(Vec::new());
    }
    field.split(',').map(|id| parse_id(text, id)).collect()
}

impl<P: Payload> VertexRecord<P> {
    pub fn to_text(&self, format: EdgeFormat) -> String {
        let outs = self.out_edges().iter().join(",");
        let payload = self.payload().encode_text();
        match format {
            EdgeFormat::OutOnly => format!("{};t;{outs};{payload}", self.id()),
            EdgeFormat::OutAndIn => {
                let ins = self.in_edges().iter().join(",");
                format!("{};b;{outs};{ins};{payload}", self.id())
            }
        }
    }

    pub fn from_text(text: &str, config: &VertexConfig) -> Result<Self, DecodeError> {
        let fields: Vec<&str> = text.trim_end_matches(['\r', '\n']).split(';').collect();
        let (id, outs, ins, payload) = match fields.as_slice() {
            [id, "t", outs, payload] => (*id, *outs, "", *payload),
            [id, "b", outs, ins, payload] => (*id, *outs, *ins, *payload),
            [_, format, ..] if *format != "t" && *format != "b" => {
                return Err(DecodeError::text(text, format!("unknown edge format {format:?}")))
            }
            _ => return Err(DecodeError::text(text, "wrong number of fields")),
        };

        let id = parse_id(text, id)?;
        let allow_multi = config.allow_multi_edges;
        let out_edges = AdjList::from_unsorted(parse_ids(text, outs)?, allow_multi);
        let in_edges = AdjList::from_unsorted(parse_ids(text, ins)?, allow_multi);
        let payload = P::decode_text(payload)?;

        let mut vertex =
            VertexRecord::from_parts(id, out_edges, in_edges, VertexFlags::EMPTY, payload, config);
        vertex.compute_is_branch();
        vertex.compute_is_source_sink();
        Ok(vertex)
    }

    /// `id\t<record>`, the line format of text dumps.
    pub fn to_key_value_line(&self, format: EdgeFormat) -> String {
        format!("{}\t{}", self.id(), self.to_text(format))
    }

    /// Parse a dump line. A line without a key is read as a bare record.
    pub fn from_key_value_line(line: &str, config: &VertexConfig) -> Result<Self, DecodeError> {
        match line.split_once('\t') {
            Some((key, record)) => {
                let key = parse_id(line, key)?;
                let vertex = Self::from_text(record, config)?;
                if key != vertex.id() {
                    return Err(DecodeError::text(
                        line,
                        format!("key {key} does not match vertex {}", vertex.id()),
                    ));
                }
                Ok(vertex)
            }
            None => Self::from_text(line, config),
        }
    }
}

impl FromStr for EdgeMessage {
    type Err = DecodeError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let (from, to) = text
            .split_once('>')
            .ok_or_else(|| DecodeError::text(text, "edge message needs a '>'"))?;
        Ok(EdgeMessage::new(parse_id(text, from)?, parse_id(text, to)?))
    }
}
