use super::{EdgeFormat, TAG_EDGE, TAG_VERTEX};
use crate::{
    entities::{
        adj::AdjList, edge::EdgeMessage, flags::VertexFlags, payload::Payload,
        vertex::VertexRecord, VertexConfig, VertexId, NO_VERTEX,
    },
    errors::{DecodeError, EncodeError},
};
use byteorder::{BigEndian, ByteOrder, WriteBytesExt};
use std::io::Write;

const MAX_COUNT: usize = u16::MAX as usize;

/// Strict cursor over a record. Running past the end names the field that
/// was being read.
struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn take(&mut self, field: &'static str, needed: usize) -> Result<&'a [u8], DecodeError> {
        let available = self.bytes.len() - self.pos;
        if available < needed {
            return Err(DecodeError::Truncated {
                field,
                needed,
                available,
            });
        }
        let bytes = self.bytes;
        let slice = &bytes[self.pos..self.pos + needed];
        self.pos += needed;
        Ok(slice)
    }

    fn u8(&mut self, field: &'static str) -> Result<u8, DecodeError> {
        Ok(self.take(field, 1)?[0])
    }

    fn u16(&mut self, field: &'static str) -> Result<u16, DecodeError> {
        Ok(BigEndian::read_u16(self.take(field, 2)?))
    }

    fn i32(&mut self, field: &'static str) -> Result<i32, DecodeError> {
        Ok(BigEndian::read_i32(self.take(field, 4)?))
    }

    fn id(&mut self, field: &'static str) -> Result<VertexId, DecodeError> {
        match self.i32(field)? {
            NO_VERTEX => Err(DecodeError::ReservedId(NO_VERTEX)),
            id => Ok(id),
        }
    }

    fn ids(&mut self, field: &'static str, count: usize) -> Result<Vec<VertexId>, DecodeError> {
        let raw = self.take(field, count * 4)?;
        raw.chunks_exact(4)
            .map(|chunk| match BigEndian::read_i32(chunk) {
                NO_VERTEX => Err(DecodeError::ReservedId(NO_VERTEX)),
                id => Ok(id),
            })
            .collect()
    }

    fn finish(self) -> Result<(), DecodeError> {
        match self.bytes.len() - self.pos {
            0 => Ok(()),
            rest => Err(DecodeError::TrailingBytes(rest)),
        }
    }
}

fn expect_tag(reader: &mut Reader, expected: u8) -> Result<(), DecodeError> {
    if reader.bytes.is_empty() {
        return Err(DecodeError::Empty);
    }
    let found = reader.u8("tag")?;
    if found != expected {
        return Err(DecodeError::UnexpectedTag { found, expected });
    }
    Ok(())
}

fn write_ids<W: Write>(
    out: &mut W,
    id: VertexId,
    direction: &'static str,
    ids: &AdjList,
) -> Result<(), EncodeError> {
    if ids.len() > MAX_COUNT {
        return Err(EncodeError::TooManyEdges {
            id,
            direction,
            count: ids.len(),
            max: MAX_COUNT,
        });
    }
    out.write_u16::<BigEndian>(ids.len() as u16)?;
    for other in ids {
        out.write_i32::<BigEndian>(other)?;
    }
    Ok(())
}

impl<P: Payload> VertexRecord<P> {
    /// Append the binary record to `out`.
    ///
    /// The flags byte is written from the cached flags even for
    /// [`EdgeFormat::OutOnly`], so a record keeps its classification after
    /// its in-edges were dropped.
    pub fn encode_into<W: Write>(&self, out: &mut W, format: EdgeFormat) -> Result<(), EncodeError> {
        let mut payload = Vec::new();
        self.payload().encode_extra(&mut payload);
        if payload.len() > MAX_COUNT {
            return Err(EncodeError::PayloadTooLarge {
                id: self.id(),
                len: payload.len(),
                max: MAX_COUNT,
            });
        }

        out.write_u8(TAG_VERTEX)?;
        out.write_u8(self.flags().bits())?;
        out.write_i32::<BigEndian>(self.id())?;
        write_ids(out, self.id(), "out", self.out_edges())?;
        match format {
            EdgeFormat::OutAndIn => write_ids(out, self.id(), "in", self.in_edges())?,
            EdgeFormat::OutOnly => out.write_u16::<BigEndian>(0)?,
        }
        out.write_u16::<BigEndian>(payload.len() as u16)?;
        out.write_all(&payload)?;
        Ok(())
    }

    pub fn to_bytes(&self, format: EdgeFormat) -> Result<Vec<u8>, EncodeError> {
        let mut bytes = Vec::with_capacity(
            11 + 4 * (self.out_edges().len() + self.in_edges().len()),
        );
        self.encode_into(&mut bytes, format)?;
        Ok(bytes)
    }

    /// Decode a complete binary record. Every byte must be accounted for.
    pub fn from_bytes(bytes: &[u8], config: &VertexConfig) -> Result<Self, DecodeError> {
        let mut reader = Reader::new(bytes);
        expect_tag(&mut reader, TAG_VERTEX)?;
        let raw_flags = reader.u8("flags")?;
        let flags = VertexFlags::from_bits(raw_flags).ok_or(DecodeError::UnknownFlags(raw_flags))?;
        let id = reader.id("id")?;
        let out_count = reader.u16("out edge count")? as usize;
        let out = reader.ids("out edges", out_count)?;
        let in_count = reader.u16("in edge count")? as usize;
        let ins = reader.ids("in edges", in_count)?;
        let payload_len = reader.u16("payload length")? as usize;
        let payload = P::decode_extra(reader.take("payload", payload_len)?)?;
        reader.finish()?;

        let allow_multi = config.allow_multi_edges;
        Ok(VertexRecord::from_parts(
            id,
            AdjList::from_unsorted(out, allow_multi),
            AdjList::from_unsorted(ins, allow_multi),
            flags,
            payload,
            config,
        ))
    }
}

impl EdgeMessage {
    pub const ENCODED_LEN: usize = 9;

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = vec![0u8; Self::ENCODED_LEN];
        bytes[0] = TAG_EDGE;
        BigEndian::write_i32(&mut bytes[1..5], self.from());
        BigEndian::write_i32(&mut bytes[5..9], self.to());
        bytes
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, DecodeError> {
        let mut reader = Reader::new(bytes);
        expect_tag(&mut reader, TAG_EDGE)?;
        let from = reader.id("from")?;
        let to = reader.id("to")?;
        reader.finish()?;
        Ok(EdgeMessage::new(from, to))
    }
}
