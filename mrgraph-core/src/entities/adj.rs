use super::{Tail, VertexId};
use itertools::Itertools;
use std::{iter, slice};

/// Sorted multiset of neighbor ids for one direction of one vertex.
///
/// Iteration borrows the underlying slice, so a vertex cannot be mutated
/// while an iterator over its adjacency is alive.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct AdjList(Vec<VertexId>);

impl AdjList {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Build from ids in any order. Duplicates collapse unless `allow_multi`.
    pub fn from_unsorted(ids: impl IntoIterator<Item = VertexId>, allow_multi: bool) -> Self {
        let mut ids: Vec<_> = ids.into_iter().collect();
        ids.sort_unstable();
        if !allow_multi {
            ids.dedup();
        }
        Self(ids)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[VertexId] {
        &self.0
    }

    pub fn iter(&self) -> iter::Copied<slice::Iter<'_, VertexId>> {
        self.0.iter().copied()
    }

    pub fn contains(&self, id: VertexId) -> bool {
        self.0.binary_search(&id).is_ok()
    }

    /// Insert keeping the sort order. Returns false if `id` was already
    /// present and duplicates are not allowed.
    pub fn insert(&mut self, id: VertexId, allow_multi: bool) -> bool {
        let pos = self.0.partition_point(|&v| v < id);
        if !allow_multi && self.0.get(pos) == Some(&id) {
            return false;
        }
        self.0.insert(pos, id);
        true
    }

    /// Remove one occurrence of `id`.
    pub fn remove(&mut self, id: VertexId) -> bool {
        match self.0.binary_search(&id) {
            Ok(pos) => {
                self.0.remove(pos);
                true
            }
            Err(_) => false,
        }
    }

    /// Number of parallel edges to `id`.
    pub fn multiplicity(&self, id: VertexId) -> usize {
        let start = self.0.partition_point(|&v| v < id);
        let end = self.0.partition_point(|&v| v <= id);
        end - start
    }

    /// True if more than one distinct neighbor is present. Parallel edges to
    /// the same neighbor do not count.
    pub fn has_multiple_distinct(&self) -> bool {
        match (self.0.first(), self.0.last()) {
            (Some(first), Some(last)) => first != last,
            _ => false,
        }
    }

    pub fn num_distinct(&self) -> usize {
        self.0.iter().dedup().count()
    }

    pub fn tail(&self) -> Option<Tail> {
        let id = *self.0.first()?;
        if self.has_multiple_distinct() {
            return None;
        }
        Some(Tail {
            id,
            multiplicity: self.0.len(),
        })
    }

    /// Groups of parallel edges as `(neighbor, multiplicity)`, ascending.
    pub fn groups(&self) -> impl Iterator<Item = (VertexId, usize)> + '_ {
        self.0
            .iter()
            .dedup_with_count()
            .map(|(count, &id)| (id, count))
    }

    /// Multiset sum with `other`, or set union if `allow_multi` is false.
    pub fn union_with(&mut self, other: &AdjList, allow_multi: bool) {
        if other.is_empty() {
            return;
        }
        let mut merged: Vec<_> = self.iter().merge(other.iter()).collect();
        if !allow_multi {
            merged.dedup();
        }
        self.0 = merged;
    }

    /// Drop every group of parallel edges with fewer than `min_multiplicity`
    /// members. Returns the number of edges removed.
    pub fn prune_below(&mut self, min_multiplicity: usize) -> usize {
        let before = self.0.len();
        let kept: Vec<_> = self
            .groups()
            .filter(|&(_, count)| count >= min_multiplicity)
            .flat_map(|(id, count)| iter::repeat(id).take(count))
            .collect();
        self.0 = kept;
        before - self.0.len()
    }

    /// Replace the whole list by `multiplicity` copies of `id`.
    pub fn replace_with(&mut self, id: VertexId, multiplicity: usize) {
        self.0.clear();
        self.0.extend(iter::repeat(id).take(multiplicity));
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }
}

impl<'a> IntoIterator for &'a AdjList {
    type Item = VertexId;
    type IntoIter = iter::Copied<slice::Iter<'a, VertexId>>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
