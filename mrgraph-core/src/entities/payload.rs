//! Extension data carried by specialised vertex kinds.
//!
//! The core record treats the payload as opaque bytes behind a 16-bit
//! length prefix. A vertex kind plugs in by implementing [`Payload`] and
//! using it as the record's type parameter.

use crate::errors::DecodeError;
use byteorder::{BigEndian, ByteOrder};
use std::fmt::{Debug, Write};

pub trait Payload: Clone + Debug + Default + PartialEq + Send + Sync + 'static {
    /// Append the wire bytes of this payload to `buf`.
    fn encode_extra(&self, buf: &mut Vec<u8>);

    fn decode_extra(bytes: &[u8]) -> Result<Self, DecodeError>;

    /// Fold in the payload of a vertex absorbed during chain compression.
    fn merge_extra(&mut self, absorbed: &Self);

    fn is_unset(&self) -> bool {
        *self == Self::default()
    }

    fn encode_text(&self) -> String {
        let mut bytes = Vec::new();
        self.encode_extra(&mut bytes);
        bytes.iter().fold(String::new(), |mut s, b| {
            let _ = write!(s, "{b:02x}");
            s
        })
    }

    fn decode_text(text: &str) -> Result<Self, DecodeError> {
        if text.len() % 2 != 0 {
            return Err(DecodeError::text(text, "payload hex has odd length"));
        }
        let bytes = (0..text.len())
            .step_by(2)
            .map(|i| {
                text.get(i..i + 2)
                    .and_then(|pair| u8::from_str_radix(pair, 16).ok())
                    .ok_or_else(|| DecodeError::text(text, "payload is not hex"))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Self::decode_extra(&bytes)
    }
}

/// Payload of the plain vertex kind: nothing.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct NoPayload;

impl Payload for NoPayload {
    fn encode_extra(&self, _buf: &mut Vec<u8>) {}

    fn decode_extra(bytes: &[u8]) -> Result<Self, DecodeError> {
        if bytes.is_empty() {
            Ok(NoPayload)
        } else {
            Err(DecodeError::InvalidPayload(format!(
                "plain vertex carries {} payload bytes",
                bytes.len()
            )))
        }
    }

    fn merge_extra(&mut self, _absorbed: &Self) {}
}

/// Number of original vertices a (possibly compressed) vertex stands for.
///
/// Zero means unset and is written as an empty payload; an unset span
/// counts as one vertex when chains are merged.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Span(pub u32);

impl Span {
    pub fn vertices(&self) -> u32 {
        self.0.max(1)
    }
}

impl Payload for Span {
    fn encode_extra(&self, buf: &mut Vec<u8>) {
        if self.0 != 0 {
            let mut bytes = [0u8; 4];
            BigEndian::write_u32(&mut bytes, self.0);
            buf.extend_from_slice(&bytes);
        }
    }

    fn decode_extra(bytes: &[u8]) -> Result<Self, DecodeError> {
        match bytes.len() {
            0 => Ok(Span(0)),
            4 => Ok(Span(BigEndian::read_u32(bytes))),
            n => Err(DecodeError::InvalidPayload(format!(
                "span payload must be 0 or 4 bytes, got {n}"
            ))),
        }
    }

    fn merge_extra(&mut self, absorbed: &Self) {
        self.0 = self.vertices().saturating_add(absorbed.vertices());
    }
}
