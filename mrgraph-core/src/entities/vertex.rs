use super::{
    adj::AdjList,
    edge::EdgeMessage,
    flags::VertexFlags,
    payload::{NoPayload, Payload},
    Tail, VertexConfig, VertexId, NO_VERTEX,
};
use crate::errors::VertexError;
use std::fmt::{Display, Formatter};

/// A vertex as seen by a single task: its id, its locally known adjacency in
/// both directions, a cached classification and an extension payload.
///
/// Flags are maintained incrementally by the mutators. `is_branch` only ever
/// flips on during incremental maintenance; call [`compute_is_branch`] to
/// re-derive it from scratch after edges were removed.
///
/// [`compute_is_branch`]: VertexRecord::compute_is_branch
#[derive(Clone, Debug, PartialEq)]
pub struct VertexRecord<P: Payload = NoPayload> {
    id: VertexId,
    out_edges: AdjList,
    in_edges: AdjList,
    flags: VertexFlags,
    payload: P,
    config: VertexConfig,
}

/// Result of trying to compress two chain vertices that met under one key.
#[derive(Clone, Debug, PartialEq)]
pub enum CompressOutcome<P: Payload> {
    /// The surviving vertex, which now points past the absorbed one.
    Compressed(VertexRecord<P>),
    /// The pair did not match; both come back unchanged.
    Refused(VertexRecord<P>, VertexRecord<P>),
}

impl<P: Payload> VertexRecord<P> {
    pub fn new(id: VertexId, config: &VertexConfig) -> Result<Self, VertexError> {
        if id == NO_VERTEX {
            return Err(VertexError::ReservedId(id));
        }
        Ok(Self {
            id,
            out_edges: AdjList::new(),
            in_edges: AdjList::new(),
            flags: VertexFlags::EMPTY,
            payload: P::default(),
            config: *config,
        })
    }

    /// Assemble a decoded record. The flags are taken as given.
    pub(crate) fn from_parts(
        id: VertexId,
        out_edges: AdjList,
        in_edges: AdjList,
        flags: VertexFlags,
        payload: P,
        config: &VertexConfig,
    ) -> Self {
        Self {
            id,
            out_edges,
            in_edges,
            flags,
            payload,
            config: *config,
        }
    }

    pub fn with_payload(mut self, payload: P) -> Self {
        self.payload = payload;
        self
    }

    pub fn id(&self) -> VertexId {
        self.id
    }

    pub fn config(&self) -> &VertexConfig {
        &self.config
    }

    pub fn flags(&self) -> VertexFlags {
        self.flags
    }

    pub fn is_branch(&self) -> bool {
        self.flags.is_branch()
    }

    pub fn is_source(&self) -> bool {
        self.flags.is_source()
    }

    pub fn is_sink(&self) -> bool {
        self.flags.is_sink()
    }

    pub fn payload(&self) -> &P {
        &self.payload
    }

    pub fn payload_mut(&mut self) -> &mut P {
        &mut self.payload
    }

    /// Edges pointing away from this vertex, ascending.
    pub fn out_edges(&self) -> &AdjList {
        &self.out_edges
    }

    /// Edges pointing into this vertex, ascending. Possibly stale once a
    /// predecessor was compressed away.
    pub fn in_edges(&self) -> &AdjList {
        &self.in_edges
    }

    pub fn group_out_edges(&self) -> impl Iterator<Item = (VertexId, usize)> + '_ {
        self.out_edges.groups()
    }

    pub fn group_in_edges(&self) -> impl Iterator<Item = (VertexId, usize)> + '_ {
        self.in_edges.groups()
    }

    pub fn add_edge_to(&mut self, to: VertexId) -> bool {
        let added = self.out_edges.insert(to, self.config.allow_multi_edges);
        if added {
            self.relax_branch();
            // a new out-edge can only end a sink, and may start a source
            self.flags.set(VertexFlags::SINK, false);
            self.flags
                .set(VertexFlags::SOURCE, self.in_edges.is_empty());
        }
        added
    }

    pub fn add_edge_from(&mut self, from: VertexId) -> bool {
        let added = self.in_edges.insert(from, self.config.allow_multi_edges);
        if added {
            self.relax_branch();
            self.flags.set(VertexFlags::SOURCE, false);
            self.flags
                .set(VertexFlags::SINK, self.out_edges.is_empty());
        }
        added
    }

    pub fn remove_edge_to(&mut self, to: VertexId) -> bool {
        let removed = self.out_edges.remove(to);
        if removed && self.out_edges.is_empty() {
            self.flags.set(VertexFlags::SOURCE, false);
            self.flags.set(VertexFlags::SINK, !self.in_edges.is_empty());
        }
        removed
    }

    pub fn remove_edge_from(&mut self, from: VertexId) -> bool {
        let removed = self.in_edges.remove(from);
        if removed && self.in_edges.is_empty() {
            self.flags.set(VertexFlags::SINK, false);
            self.flags
                .set(VertexFlags::SOURCE, !self.out_edges.is_empty());
        }
        removed
    }

    /// Attach an edge message to whichever side of this vertex it touches.
    /// A self loop is recorded as an incoming edge, since the outgoing half
    /// is already part of the vertex's own out-edges.
    pub fn add_edge(&mut self, edge: &EdgeMessage) -> Result<bool, VertexError> {
        if edge.to() == self.id {
            Ok(self.add_edge_from(edge.from()))
        } else if edge.from() == self.id {
            Ok(self.add_edge_to(edge.to()))
        } else {
            Err(VertexError::UnrelatedEdge {
                id: self.id,
                from: edge.from(),
                to: edge.to(),
            })
        }
    }

    pub fn compute_is_branch(&mut self) -> bool {
        let is_branch =
            self.out_edges.has_multiple_distinct() || self.in_edges.has_multiple_distinct();
        self.flags.set(VertexFlags::BRANCH, is_branch);
        is_branch
    }

    pub fn compute_is_source_sink(&mut self) {
        let has_out = !self.out_edges.is_empty();
        let has_in = !self.in_edges.is_empty();
        self.flags.set(VertexFlags::SOURCE, has_out && !has_in);
        self.flags.set(VertexFlags::SINK, has_in && !has_out);
    }

    fn relax_branch(&mut self) {
        if !self.flags.is_branch() {
            self.compute_is_branch();
        }
    }

    pub fn tail(&self) -> Option<Tail> {
        self.out_edges.tail()
    }

    /// Fold another fragment of the same vertex into this one.
    pub fn merge(&mut self, other: &Self) -> Result<(), VertexError> {
        if other.id != self.id {
            return Err(VertexError::IdMismatch {
                id: self.id,
                other: other.id,
            });
        }
        let allow_multi = self.config.allow_multi_edges;
        self.out_edges.union_with(&other.out_edges, allow_multi);
        self.in_edges.union_with(&other.in_edges, allow_multi);
        if self.payload.is_unset() {
            self.payload = other.payload.clone();
        }
        self.relax_branch();
        self.compute_is_source_sink();
        Ok(())
    }

    /// Drop groups of parallel edges with fewer than `min_coverage` members
    /// in both directions. Returns the number of edges removed.
    pub fn prune_uncovered(&mut self, min_coverage: usize) -> usize {
        self.out_edges.prune_below(min_coverage) + self.in_edges.prune_below(min_coverage)
    }

    /// Absorb `other`, the vertex this one's tail points at, so that this
    /// vertex points at `other`'s tail instead.
    ///
    /// Refuses (returns false, leaves both untouched) unless this vertex's
    /// tail is `other`, `other` has a tail of its own, and, when the config
    /// requires it, both tails have the same multiplicity.
    pub fn absorb(&mut self, other: &Self) -> bool {
        let Some(tail) = self.tail() else {
            return false;
        };
        if tail.id != other.id {
            return false;
        }
        let Some(other_tail) = other.tail() else {
            return false;
        };
        if self.config.require_matching_multiplicities
            && tail.multiplicity != other_tail.multiplicity
        {
            return false;
        }

        self.payload.merge_extra(&other.payload);
        self.out_edges
            .replace_with(other_tail.id, other_tail.multiplicity);
        self.flags.set(VertexFlags::SINK, false);
        true
    }

    /// Compress two chain vertices that arrived under the same compression
    /// `key`. The vertex whose own id is the key is the one being absorbed;
    /// the order of `v1` and `v2` does not matter.
    pub fn compress_chain(v1: Self, v2: Self, key: VertexId) -> CompressOutcome<P> {
        let (mut absorbing, absorbed) = if key == v1.id {
            (v2, v1)
        } else if key == v2.id {
            (v1, v2)
        } else {
            return CompressOutcome::Refused(v1, v2);
        };
        if absorbing.absorb(&absorbed) {
            CompressOutcome::Compressed(absorbing)
        } else {
            CompressOutcome::Refused(absorbing, absorbed)
        }
    }

    /// Same id and the same distinct neighbors in both directions.
    pub fn same_adjacency(&self, other: &Self) -> bool {
        self.id == other.id
            && self.group_out_edges().map(|(id, _)| id).eq(other.group_out_edges().map(|(id, _)| id))
            && self.group_in_edges().map(|(id, _)| id).eq(other.group_in_edges().map(|(id, _)| id))
    }
}

impl<P: Payload> Display for VertexRecord<P> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "vertex {}", self.id)?;
        if !self.out_edges.is_empty() {
            write!(f, ": to:")?;
            for to in &self.out_edges {
                write!(f, " {to}")?;
            }
        }
        if !self.in_edges.is_empty() {
            write!(f, " : from:")?;
            for from in &self.in_edges {
                write!(f, " {from}")?;
            }
        }
        Ok(())
    }
}
