//! Repeats chain compression until it stops making progress.

use crate::{
    config::JobConfig,
    errors::JobError,
    jobs::{
        build_vertices::run_build_vertices,
        coin::{seeded_coins, CoinFactory},
        compress_chains::{run_compress_chains, NUM_COMPRESSIONS},
    },
    substrate::{BatchSubstrate, DatasetRef, DatasetStore, JobReport, CHAIN},
};
use mrgraph_core::entities::payload::Payload;
use tracing::{info, warn};

/// Where iteration `i` writes its output.
pub fn iteration_path(output: &str, iteration: usize) -> String {
    format!("{output}{iteration}")
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct IterationState {
    pub iteration: usize,
    pub consecutive_idle_rounds: usize,
    pub compressions_per_iteration: Vec<u64>,
}

impl IterationState {
    fn record(&mut self, compressions: u64) {
        self.iteration += 1;
        self.compressions_per_iteration.push(compressions);
        if compressions > 0 {
            self.consecutive_idle_rounds = 0;
        } else {
            self.consecutive_idle_rounds += 1;
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompressionSummary {
    pub iterations: usize,
    pub total_compressions: u64,
    pub compressions_per_iteration: Vec<u64>,
    /// False when the iteration cap ended the run first.
    pub converged: bool,
}

pub struct CompressionDriver<'a, B: BatchSubstrate> {
    substrate: &'a B,
    config: JobConfig,
    coins: CoinFactory,
}

impl<'a, B: BatchSubstrate> CompressionDriver<'a, B> {
    pub fn new(substrate: &'a B, config: JobConfig) -> Self {
        Self {
            substrate,
            config,
            coins: seeded_coins(),
        }
    }

    pub fn with_coins(mut self, coins: CoinFactory) -> Self {
        self.coins = coins;
        self
    }

    /// Compress the chain vertices in `input` into `output`.
    ///
    /// Iteration `i` reads `input` when `i == 0` and `{output}{i-1}`
    /// otherwise, and writes `{output}{i}`. Each superseded iteration output
    /// is deleted as soon as the next one exists, and the last one is
    /// renamed to `output`.
    pub fn run<P: Payload>(
        &self,
        input: DatasetRef,
        output: &str,
    ) -> Result<CompressionSummary, JobError> {
        let store = self.substrate.store();
        if store.exists(output) {
            return Err(JobError::OutputExists(output.to_string()));
        }
        let idle_rounds_to_stop = self.config.idle_rounds_to_stop.max(1);

        let mut state = IterationState::default();
        let converged = loop {
            let i = state.iteration;
            let source = if i == 0 {
                input.clone()
            } else {
                DatasetRef::all(iteration_path(output, i - 1))
            };
            let target = iteration_path(output, i);
            let report = run_compress_chains::<P, _>(
                self.substrate,
                &self.config,
                self.coins.clone(),
                source,
                &target,
            )?;
            if i > 0 {
                store.delete(&iteration_path(output, i - 1))?;
            }

            let compressions = report.counters.get(NUM_COMPRESSIONS);
            state.record(compressions);
            info!(
                iteration = i,
                compressions,
                vertices = report.records_out,
                idle = state.consecutive_idle_rounds,
                "compression round finished"
            );

            if state.consecutive_idle_rounds >= idle_rounds_to_stop {
                break true;
            }
            if let Some(max) = self.config.max_iterations {
                if state.iteration >= max {
                    warn!(max, "stopping compression before it converged");
                    break false;
                }
            }
        };

        store.rename(&iteration_path(output, state.iteration - 1), output)?;
        Ok(CompressionSummary {
            iterations: state.iteration,
            total_compressions: state.compressions_per_iteration.iter().sum(),
            compressions_per_iteration: state.compressions_per_iteration,
            converged,
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SimplifySummary {
    pub build: JobReport,
    pub compression: CompressionSummary,
}

/// Where [`simplify_graph`] leaves the built vertices, including the
/// branch vertices that compression never touches.
pub fn vertices_path(output: &str) -> String {
    format!("{output}-vertices")
}

/// Build vertices from raw adjacency, then compress the chain vertices.
pub fn simplify_graph<P: Payload, B: BatchSubstrate>(
    substrate: &B,
    config: &JobConfig,
    coins: CoinFactory,
    input: DatasetRef,
    output: &str,
) -> Result<SimplifySummary, JobError> {
    let mut build_config = config.clone();
    build_config.partition_branches = true;
    let vertices = vertices_path(output);
    let build = run_build_vertices::<P, B>(substrate, &build_config, input, &vertices)?;
    let compression = CompressionDriver::new(substrate, config.clone())
        .with_coins(coins)
        .run::<P>(DatasetRef::stream(vertices, CHAIN), output)?;
    Ok(SimplifySummary { build, compression })
}

#[cfg(test)]
mod driver_tests {
    use super::*;
    use crate::{
        config::JobConfigBuilder,
        jobs::coin::fn_coins,
        substrate::{LocalJobRunner, MemStore, Record},
    };
    use mrgraph_core::{
        codec::EdgeFormat,
        entities::{payload::NoPayload, vertex::VertexRecord, VertexConfig, VertexId},
    };
    use pretty_assertions::assert_eq;

    fn chain_input(len: VertexId) -> Vec<Record> {
        (0..len)
            .map(|id| {
                let mut v: VertexRecord = VertexRecord::new(id, &VertexConfig::default()).unwrap();
                if id + 1 < len {
                    v.add_edge_to(id + 1);
                }
                Record::new(id, v.to_bytes(EdgeFormat::OutOnly).unwrap())
            })
            .collect()
    }

    fn runner(config: &JobConfig) -> LocalJobRunner<MemStore> {
        LocalJobRunner::new(MemStore::new(), config.runner.clone()).unwrap()
    }

    fn read(runner: &LocalJobRunner<MemStore>, path: &str) -> Vec<VertexRecord> {
        let mut vertices: Vec<VertexRecord> = runner
            .store()
            .read(&DatasetRef::all(path))
            .unwrap()
            .iter()
            .map(|r| VertexRecord::from_bytes(&r.value, &VertexConfig::default()).unwrap())
            .collect();
        vertices.sort_by_key(|v| v.id());
        vertices
    }

    #[test]
    fn scripted_chain_converges_after_two_idle_rounds() {
        let config = JobConfigBuilder::new().build();
        let runner = runner(&config);
        runner.store().put("in", chain_input(5)).unwrap();

        let summary = CompressionDriver::new(&runner, config)
            .with_coins(fn_coins(|v| v == 0))
            .run::<NoPayload>(DatasetRef::all("in"), "out")
            .unwrap();

        assert_eq!(
            summary,
            CompressionSummary {
                iterations: 5,
                total_compressions: 3,
                compressions_per_iteration: vec![1, 1, 1, 0, 0],
                converged: true,
            }
        );
        let out = read(&runner, "out");
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].id(), 0);
        assert_eq!(out[0].out_edges().as_slice(), &[4]);
        assert_eq!(out[1].id(), 4);
        assert!(out[1].out_edges().is_empty());

        // only the input and the renamed final output are left
        assert_eq!(runner.store().paths(), vec!["in".to_string(), "out".to_string()]);
    }

    #[test]
    fn stops_after_one_idle_round_when_configured() {
        let config = JobConfigBuilder::new().with_idle_rounds_to_stop(1).build();
        let runner = runner(&config);
        runner.store().put("in", chain_input(3)).unwrap();
        let summary = CompressionDriver::new(&runner, config)
            .with_coins(fn_coins(|_| false))
            .run::<NoPayload>(DatasetRef::all("in"), "out")
            .unwrap();
        assert_eq!(summary.iterations, 1);
        assert!(summary.converged);
        assert_eq!(read(&runner, "out").len(), 3);
    }

    #[test]
    fn iteration_cap_promotes_the_last_output() {
        let config = JobConfigBuilder::new().with_max_iterations(2).build();
        let runner = runner(&config);
        runner.store().put("in", chain_input(5)).unwrap();
        let summary = CompressionDriver::new(&runner, config)
            .with_coins(fn_coins(|v| v == 0))
            .run::<NoPayload>(DatasetRef::all("in"), "out")
            .unwrap();
        assert_eq!(summary.iterations, 2);
        assert!(!summary.converged);
        let out = read(&runner, "out");
        assert_eq!(out.iter().map(|v| v.id()).collect::<Vec<_>>(), vec![0, 3, 4]);
        assert!(!runner.store().exists(&iteration_path("out", 0)));
        assert!(!runner.store().exists(&iteration_path("out", 1)));
    }

    #[test]
    fn existing_output_fails_up_front() {
        let config = JobConfig::default();
        let runner = runner(&config);
        runner.store().put("in", chain_input(2)).unwrap();
        runner.store().put("out", vec![]).unwrap();
        let err = CompressionDriver::new(&runner, config)
            .run::<NoPayload>(DatasetRef::all("in"), "out")
            .unwrap_err();
        assert!(matches!(err, JobError::OutputExists(path) if path == "out"));
        assert!(!runner.store().exists(&iteration_path("out", 0)));
    }

    #[test]
    fn simplify_keeps_branches_out_of_compression() {
        let config = JobConfigBuilder::new().with_from_edges(true).build();
        let runner = runner(&config);
        // 0 -> 1 -> 2 -> 3 and 0 -> 4 -> 5, so 0 is a branch
        let raw = [(0, vec![1, 4]), (1, vec![2]), (2, vec![3]), (3, vec![]), (4, vec![5]), (5, vec![])];
        let input = raw
            .iter()
            .map(|(id, to)| {
                let mut v: VertexRecord = VertexRecord::new(*id, &VertexConfig::default()).unwrap();
                to.iter().for_each(|t| {
                    v.add_edge_to(*t);
                });
                Record::new(*id, v.to_bytes(EdgeFormat::OutOnly).unwrap())
            })
            .collect();
        runner.store().put("raw", input).unwrap();

        let summary = simplify_graph::<NoPayload, _>(
            &runner,
            &config,
            fn_coins(|v| v == 1 || v == 4),
            DatasetRef::all("raw"),
            "simple",
        )
        .unwrap();

        assert_eq!(summary.build.counters.get("branch_vertices"), 1);
        assert!(summary.compression.converged);
        let branches = runner
            .store()
            .read(&DatasetRef::stream(vertices_path("simple"), crate::substrate::BRANCH))
            .unwrap();
        assert_eq!(branches.len(), 1);
        let out = read(&runner, "simple");
        assert_eq!(out.iter().map(|v| v.id()).collect::<Vec<_>>(), vec![1, 3, 4, 5]);
        assert_eq!(out[0].out_edges().as_slice(), &[3]);
    }
}
