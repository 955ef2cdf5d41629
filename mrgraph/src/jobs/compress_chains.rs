//! One round of randomized chain compression.
//!
//! Each chain vertex with a tail flips a coin: heads sends it to its tail's
//! key, tails keeps it under its own. When a vertex stays home and its
//! predecessor was sent to it, the two meet in one reducer call and the
//! predecessor absorbs it. Repeating rounds contracts every unbranched run
//! towards a single vertex.
//!
//! No combiner: compressing inside a map task would re-key survivors
//! and skew the per-round compression count.

use super::coin::{CoinFactory, CoinSource};
use crate::{
    config::JobConfig,
    errors::{ContractViolation, JobError},
    substrate::{
        BatchSubstrate, DatasetRef, Emitter, Job, JobReport, JobSpec, Mapper, Record, Reducer,
        TaskContext,
    },
};
use mrgraph_core::{
    codec::EdgeFormat,
    entities::{
        payload::Payload,
        vertex::{CompressOutcome, VertexRecord},
        VertexConfig, VertexId,
    },
};
use std::marker::PhantomData;
use tracing::debug;

pub const NUM_COMPRESSIONS: &str = "num_compressions";

/// The key a chain vertex is shuffled under this round.
pub fn compression_key<P: Payload>(vertex: &VertexRecord<P>, coin: &mut dyn CoinSource) -> VertexId {
    match vertex.tail() {
        Some(tail) if coin.flip(vertex.id()) => tail.id,
        _ => vertex.id(),
    }
}

fn decode_chain<P: Payload>(bytes: &[u8], config: &VertexConfig) -> Result<VertexRecord<P>, JobError> {
    let vertex = VertexRecord::<P>::from_bytes(bytes, config)?;
    if vertex.is_branch() {
        return Err(ContractViolation::BranchInput { id: vertex.id() }.into());
    }
    Ok(vertex)
}

pub struct CompressChainsMapper<P: Payload> {
    config: VertexConfig,
    coin: Box<dyn CoinSource>,
    _payload: PhantomData<fn() -> P>,
}

impl<P: Payload> CompressChainsMapper<P> {
    pub fn new(config: VertexConfig, coin: Box<dyn CoinSource>) -> Self {
        Self {
            config,
            coin,
            _payload: PhantomData,
        }
    }
}

impl<P: Payload> Mapper for CompressChainsMapper<P> {
    fn map(&mut self, record: &Record, out: &mut Emitter) -> Result<(), JobError> {
        let vertex = decode_chain::<P>(&record.value, &self.config)?;
        let key = compression_key(&vertex, self.coin.as_mut());
        out.emit(key, vertex.to_bytes(EdgeFormat::OutOnly)?);
        Ok(())
    }
}

pub struct CompressChainsReducer<P: Payload> {
    config: VertexConfig,
    _payload: PhantomData<fn() -> P>,
}

impl<P: Payload> CompressChainsReducer<P> {
    pub fn new(config: VertexConfig) -> Self {
        Self {
            config,
            _payload: PhantomData,
        }
    }

    fn pass_through(out: &mut Emitter, vertex: &VertexRecord<P>) -> Result<(), JobError> {
        out.emit(vertex.id(), vertex.to_bytes(EdgeFormat::OutOnly)?);
        Ok(())
    }
}

impl<P: Payload> Reducer for CompressChainsReducer<P> {
    fn reduce(&self, key: VertexId, values: Vec<Vec<u8>>, out: &mut Emitter) -> Result<(), JobError> {
        let mut vertices = values
            .iter()
            .map(|bytes| decode_chain::<P>(bytes, &self.config))
            .collect::<Result<Vec<_>, _>>()?;

        match vertices.len() {
            0 => Err(ContractViolation::NoVertices { key }.into()),
            1 => Self::pass_through(out, &vertices[0]),
            2 => {
                let (Some(v2), Some(v1)) = (vertices.pop(), vertices.pop()) else {
                    return Err(ContractViolation::NoVertices { key }.into());
                };
                match VertexRecord::compress_chain(v1, v2, key) {
                    CompressOutcome::Compressed(merged) => {
                        out.incr(NUM_COMPRESSIONS, 1);
                        Self::pass_through(out, &merged)
                    }
                    CompressOutcome::Refused(a, b) => {
                        debug!(key, a = a.id(), b = b.id(), "refused to compress");
                        Self::pass_through(out, &a)?;
                        Self::pass_through(out, &b)
                    }
                }
            }
            n => {
                debug!(key, n, "more than two vertices under one key, passing through");
                vertices
                    .iter()
                    .try_for_each(|vertex| Self::pass_through(out, vertex))
            }
        }
    }
}

pub fn compress_chains_job<P: Payload>(config: &JobConfig, coins: CoinFactory) -> Job {
    let vertex_config = config.vertex_config();
    Job::new(
        "compress-chains",
        move |ctx: &TaskContext| {
            Box::new(CompressChainsMapper::<P>::new(vertex_config, coins(ctx))) as Box<dyn Mapper>
        },
        CompressChainsReducer::<P>::new(vertex_config),
    )
}

pub fn run_compress_chains<P: Payload, B: BatchSubstrate>(
    substrate: &B,
    config: &JobConfig,
    coins: CoinFactory,
    input: DatasetRef,
    output: &str,
) -> Result<JobReport, JobError> {
    substrate.run_job(&compress_chains_job::<P>(config, coins), &JobSpec::new(input, output))
}
