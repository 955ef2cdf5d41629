//! Turns raw adjacency into complete vertices.
//!
//! Every input vertex knows only its out-edges. The mapper ships each
//! out-edge to its target as an [`EdgeMessage`], and the reducer for a
//! vertex id joins the vertex with the messages addressed to it, which
//! become its in-edges. With coverage enabled, weakly supported parallel
//! edge groups are dropped before the vertex is classified.

use crate::{
    config::{Coverage, InputFormat, JobConfig},
    errors::JobError,
    substrate::{
        BatchSubstrate, DatasetRef, Emitter, Job, JobReport, JobSpec, Mapper, Record, Reducer,
        TaskContext, BRANCH, CHAIN, PART,
    },
};
use mrgraph_core::{
    codec::{EdgeFormat, WireValue},
    entities::{
        edge::EdgeMessage, payload::Payload, vertex::VertexRecord, VertexConfig, VertexId,
    },
    errors::{DecodeError, VertexError},
};
use std::marker::PhantomData;
use tracing::debug;

pub const VERTICES_EMITTED: &str = "vertices_emitted";
pub const BRANCH_VERTICES: &str = "branch_vertices";
pub const CHAIN_VERTICES: &str = "chain_vertices";
pub const EDGES_PRUNED: &str = "edges_pruned";
pub const VERTICES_SUPPRESSED: &str = "vertices_suppressed";

/// Wrap text records, one per non-empty line, as build input.
pub fn text_input(text: &str) -> Vec<Record> {
    text.lines()
        .filter(|line| !line.trim().is_empty())
        .enumerate()
        .map(|(i, line)| Record::new(i as VertexId, line.as_bytes().to_vec()))
        .collect()
}

pub struct BuildVerticesMapper<P: Payload> {
    config: VertexConfig,
    input_format: InputFormat,
    _payload: PhantomData<fn() -> P>,
}

impl<P: Payload> BuildVerticesMapper<P> {
    pub fn new(config: VertexConfig, input_format: InputFormat) -> Self {
        Self {
            config,
            input_format,
            _payload: PhantomData,
        }
    }

    fn decode(&self, value: &[u8]) -> Result<VertexRecord<P>, DecodeError> {
        match self.input_format {
            InputFormat::Binary => VertexRecord::from_bytes(value, &self.config),
            InputFormat::Text => {
                let line = std::str::from_utf8(value).map_err(|e| DecodeError::MalformedText {
                    text: String::from_utf8_lossy(value).into_owned(),
                    reason: e.to_string(),
                })?;
                VertexRecord::from_key_value_line(line, &self.config)
            }
        }
    }
}

impl<P: Payload> Mapper for BuildVerticesMapper<P> {
    fn map(&mut self, record: &Record, out: &mut Emitter) -> Result<(), JobError> {
        let vertex = self.decode(&record.value)?;
        let id = vertex.id();
        out.emit(id, vertex.to_bytes(EdgeFormat::OutOnly)?);
        for to in vertex.out_edges() {
            out.emit(to, EdgeMessage::new(id, to).to_bytes());
        }
        Ok(())
    }
}

/// Everything that arrived under one key, with the edge messages already
/// attached when a vertex fragment was among the values.
struct Joined<P: Payload> {
    vertex: Option<VertexRecord<P>>,
    edges: Vec<EdgeMessage>,
}

fn join<P: Payload>(
    key: VertexId,
    values: Vec<Vec<u8>>,
    config: &VertexConfig,
) -> Result<Joined<P>, JobError> {
    let mut vertex: Option<VertexRecord<P>> = None;
    let mut edges = Vec::new();
    for value in values {
        match WireValue::<P>::from_bytes(&value, config)? {
            WireValue::Vertex(fragment) => {
                if fragment.id() != key {
                    return Err(VertexError::IdMismatch {
                        id: key,
                        other: fragment.id(),
                    }
                    .into());
                }
                match vertex.as_mut() {
                    Some(v) => v.merge(&fragment)?,
                    None => vertex = Some(fragment),
                }
            }
            WireValue::Edge(edge) => edges.push(edge),
        }
    }
    if let Some(v) = vertex.as_mut() {
        for edge in edges.drain(..) {
            v.add_edge(&edge)?;
        }
    }
    Ok(Joined { vertex, edges })
}

/// Accumulates only: merges fragments and folds edge messages into a
/// fragment's in-edges. Pruning and classification need the final
/// counts, so they are left to the reducer.
pub struct BuildVerticesCombiner<P: Payload> {
    config: VertexConfig,
    _payload: PhantomData<fn() -> P>,
}

impl<P: Payload> BuildVerticesCombiner<P> {
    pub fn new(config: VertexConfig) -> Self {
        Self {
            config,
            _payload: PhantomData,
        }
    }
}

impl<P: Payload> Reducer for BuildVerticesCombiner<P> {
    fn reduce(&self, key: VertexId, values: Vec<Vec<u8>>, out: &mut Emitter) -> Result<(), JobError> {
        let joined = join::<P>(key, values, &self.config)?;
        match joined.vertex {
            Some(vertex) => out.emit(key, vertex.to_bytes(EdgeFormat::OutAndIn)?),
            None => {
                for edge in joined.edges {
                    out.emit(key, edge.to_bytes());
                }
            }
        }
        Ok(())
    }
}

pub struct BuildVerticesReducer<P: Payload> {
    config: VertexConfig,
    coverage: Coverage,
    partition_branches: bool,
    format: EdgeFormat,
    _payload: PhantomData<fn() -> P>,
}

impl<P: Payload> BuildVerticesReducer<P> {
    pub fn new(job_config: &JobConfig) -> Self {
        Self {
            config: job_config.vertex_config(),
            coverage: job_config.coverage,
            partition_branches: job_config.partition_branches,
            format: EdgeFormat::for_in_edges(job_config.include_from_edges),
            _payload: PhantomData,
        }
    }
}

impl<P: Payload> Reducer for BuildVerticesReducer<P> {
    fn reduce(&self, key: VertexId, values: Vec<Vec<u8>>, out: &mut Emitter) -> Result<(), JobError> {
        let Some(mut vertex) = join::<P>(key, values, &self.config)?.vertex else {
            debug!(key, "dropping edges to a vertex that is not in the input");
            return Ok(());
        };

        if let Some(min) = self.coverage.min_multiplicity() {
            let pruned = vertex.prune_uncovered(min);
            out.incr(EDGES_PRUNED, pruned as u64);
            if pruned > 0 && vertex.out_edges().is_empty() && vertex.in_edges().is_empty() {
                debug!(key, pruned, "suppressing vertex left without edges");
                out.incr(VERTICES_SUPPRESSED, 1);
                return Ok(());
            }
        }

        let is_branch = vertex.compute_is_branch();
        vertex.compute_is_source_sink();

        let bytes = vertex.to_bytes(self.format)?;
        let stream = match (self.partition_branches, is_branch) {
            (false, _) => PART,
            (true, true) => BRANCH,
            (true, false) => CHAIN,
        };
        out.emit_to(stream, key, bytes);
        out.incr(VERTICES_EMITTED, 1);
        out.incr(if is_branch { BRANCH_VERTICES } else { CHAIN_VERTICES }, 1);
        Ok(())
    }
}

pub fn build_vertices_job<P: Payload>(config: &JobConfig) -> Job {
    let vertex_config = config.vertex_config();
    let input_format = config.input_format;
    Job::new(
        "build-vertices",
        move |_: &TaskContext| {
            Box::new(BuildVerticesMapper::<P>::new(vertex_config, input_format)) as Box<dyn Mapper>
        },
        BuildVerticesReducer::<P>::new(config),
    )
    .with_combiner(BuildVerticesCombiner::<P>::new(vertex_config))
}

pub fn run_build_vertices<P: Payload, B: BatchSubstrate>(
    substrate: &B,
    config: &JobConfig,
    input: DatasetRef,
    output: &str,
) -> Result<JobReport, JobError> {
    substrate.run_job(&build_vertices_job::<P>(config), &JobSpec::new(input, output))
}
