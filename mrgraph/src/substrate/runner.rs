use super::{
    pool::{custom_pool, global_pool},
    store::{Dataset, DatasetStore},
    BatchSubstrate, Counters, Emitter, Job, JobReport, JobSpec, Record, Reducer, TaskContext,
};
use crate::{config::RunnerConfig, errors::JobError};
use itertools::Itertools;
use mrgraph_core::entities::VertexId;
use rayon::{prelude::*, ThreadPool};
use std::{
    collections::BTreeMap,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};
use tracing::{debug, info};

type Groups = BTreeMap<VertexId, Vec<Vec<u8>>>;

/// Runs jobs in-process: map tasks over fixed-size shards of the input,
/// an optional combiner per map task, a sorted shuffle, and one reduce
/// task per key partition.
pub struct LocalJobRunner<S: DatasetStore> {
    store: S,
    pool: Arc<ThreadPool>,
    config: RunnerConfig,
    runs: AtomicU64,
}

impl<S: DatasetStore> LocalJobRunner<S> {
    pub fn new(store: S, config: RunnerConfig) -> Result<Self, JobError> {
        let pool = match config.num_threads {
            Some(n) => custom_pool(n)?,
            None => global_pool()?,
        };
        Ok(Self {
            store,
            pool,
            config,
            runs: AtomicU64::new(0),
        })
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    /// Seed for one job run. Reruns of the same job draw fresh coins, or an
    /// iterated job would replay the same choices every round.
    fn run_seed(&self) -> u64 {
        let run = self.runs.fetch_add(1, Ordering::Relaxed);
        splitmix64(self.config.seed ^ splitmix64(run))
    }

    fn partition(&self, key: VertexId) -> usize {
        let n = self.config.num_reducers.max(1);
        (key as i64).rem_euclid(n as i64) as usize
    }

    fn group(records: impl IntoIterator<Item = Record>) -> Groups {
        let mut groups = Groups::new();
        for record in records {
            groups.entry(record.key).or_default().push(record.value);
        }
        groups
    }

    fn run_reducer(
        reducer: &dyn Reducer,
        groups: Groups,
        out: &mut Emitter,
    ) -> Result<(), JobError> {
        for (key, values) in groups {
            reducer.reduce(key, values, out)?;
        }
        Ok(())
    }

    fn run_map_task(
        &self,
        job: &Job,
        task: usize,
        seed: u64,
        shard: &[Record],
    ) -> Result<(Vec<Record>, Counters), JobError> {
        let ctx = TaskContext {
            task,
            seed: seed ^ task as u64,
        };
        let mut mapper = (job.mapper)(&ctx);
        let mut out = Emitter::new();
        for record in shard {
            mapper.map(record, &mut out)?;
        }
        let (mut streams, mut counters) = out.into_parts();
        let mut records: Vec<Record> = streams.values_mut().flat_map(std::mem::take).collect();

        if let Some(combiner) = &job.combiner {
            let mut combined = Emitter::new();
            Self::run_reducer(combiner.as_ref(), Self::group(records), &mut combined)?;
            let (mut streams, combine_counters) = combined.into_parts();
            records = streams.values_mut().flat_map(std::mem::take).collect();
            counters = counters.merge(combine_counters);
        }
        Ok((records, counters))
    }
}

impl<S: DatasetStore> BatchSubstrate for LocalJobRunner<S> {
    type Store = S;

    fn run_job(&self, job: &Job, spec: &JobSpec) -> Result<JobReport, JobError> {
        if self.store.exists(&spec.output) {
            return Err(JobError::OutputExists(spec.output.clone()));
        }
        let input = self.store.read(&spec.input)?;
        let records_in = input.len();
        let seed = self.run_seed();
        let shard_size = self.config.shard_size.max(1);
        let num_reducers = self.config.num_reducers.max(1);
        info!(
            job = job.name.as_str(),
            input = spec.input.path.as_str(),
            output = spec.output.as_str(),
            records_in,
            "starting job"
        );

        let (dataset, map_tasks, counters) = self.pool.install(|| {
            let map_outputs = input
                .par_chunks(shard_size)
                .enumerate()
                .map(|(task, shard)| {
                    self.run_map_task(job, task, seed, shard)
                        .map_err(|e| e.in_task(&job.name, task))
                })
                .collect::<Result<Vec<_>, _>>()?;
            let map_tasks = map_outputs.len();

            let mut partitions = vec![Groups::new(); num_reducers];
            let mut counters = Counters::default();
            for (records, task_counters) in map_outputs {
                counters = counters.merge(task_counters);
                for record in records {
                    partitions[self.partition(record.key)]
                        .entry(record.key)
                        .or_default()
                        .push(record.value);
                }
            }
            debug!(
                job = job.name.as_str(),
                keys = partitions.iter().map(BTreeMap::len).sum::<usize>(),
                "shuffled"
            );

            let reduce_outputs = partitions
                .into_par_iter()
                .enumerate()
                .map(|(partition, groups)| {
                    let mut out = Emitter::new();
                    Self::run_reducer(job.reducer.as_ref(), groups, &mut out)
                        .map_err(|e| e.in_task(&job.name, partition))?;
                    Ok(out.into_parts())
                })
                .collect::<Result<Vec<_>, JobError>>()?;

            let mut dataset = Dataset::new();
            for (streams, task_counters) in reduce_outputs {
                counters = counters.merge(task_counters);
                for (stream, records) in streams {
                    dataset.push_part(&stream, records);
                }
            }
            Ok::<_, JobError>((dataset, map_tasks, counters))
        })?;

        let records_out = dataset.len();
        self.store.write(&spec.output, dataset)?;
        info!(
            job = job.name.as_str(),
            records_out,
            counters = ?counters.iter().collect_vec(),
            "finished job"
        );
        Ok(JobReport {
            job: job.name.clone(),
            map_tasks,
            records_in,
            records_out,
            counters,
        })
    }

    fn store(&self) -> &S {
        &self.store
    }
}

fn splitmix64(x: u64) -> u64 {
    let mut z = x.wrapping_add(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

#[cfg(test)]
mod runner_tests {
    use super::*;
    use crate::substrate::{store::MemStore, DatasetRef, Mapper, CHAIN, PART};
    use pretty_assertions::assert_eq;

    /// Emits every byte of a value under the record's key.
    struct Explode;

    impl Mapper for Explode {
        fn map(&mut self, record: &Record, out: &mut Emitter) -> Result<(), JobError> {
            for b in &record.value {
                out.emit(record.key, vec![*b]);
            }
            out.incr("bytes", record.value.len() as u64);
            Ok(())
        }
    }

    /// Sums the bytes under a key; even sums go to the chain stream.
    struct Sum;

    impl Reducer for Sum {
        fn reduce(&self, key: VertexId, values: Vec<Vec<u8>>, out: &mut Emitter) -> Result<(), JobError> {
            let sum: u8 = values.iter().flatten().sum();
            if sum % 2 == 0 {
                out.emit_to(CHAIN, key, vec![sum]);
            } else {
                out.emit(key, vec![sum]);
            }
            out.incr("keys", 1);
            Ok(())
        }
    }

    struct Fail;

    impl Reducer for Fail {
        fn reduce(&self, key: VertexId, _values: Vec<Vec<u8>>, _out: &mut Emitter) -> Result<(), JobError> {
            Err(crate::errors::ContractViolation::NoVertices { key }.into())
        }
    }

    fn runner(shard_size: usize) -> LocalJobRunner<MemStore> {
        let config = RunnerConfig {
            num_threads: Some(2),
            shard_size,
            num_reducers: 3,
            seed: 7,
        };
        LocalJobRunner::new(MemStore::new(), config).unwrap()
    }

    fn input() -> Vec<Record> {
        vec![
            Record::new(1, vec![1, 1]),
            Record::new(-2, vec![3]),
            Record::new(1, vec![5]),
            Record::new(4, vec![2, 2, 2]),
        ]
    }

    fn sorted(mut records: Vec<Record>) -> Vec<Record> {
        records.sort_by_key(|r| r.key);
        records
    }

    #[test]
    fn map_shuffle_reduce() {
        let runner = runner(1);
        runner.store().put("in", input()).unwrap();
        let job = Job::new("sum", |_: &TaskContext| Box::new(Explode) as Box<dyn Mapper>, Sum);
        let report = runner
            .run_job(&job, &JobSpec::new(DatasetRef::all("in"), "out"))
            .unwrap();

        assert_eq!(report.map_tasks, 4);
        assert_eq!(report.records_in, 4);
        assert_eq!(report.records_out, 3);
        assert_eq!(report.counters.get("bytes"), 7);
        assert_eq!(report.counters.get("keys"), 3);

        let store = runner.store();
        assert_eq!(
            sorted(store.read(&DatasetRef::stream("out", PART)).unwrap()),
            vec![Record::new(-2, vec![3]), Record::new(1, vec![7])]
        );
        assert_eq!(
            store.read(&DatasetRef::stream("out", CHAIN)).unwrap(),
            vec![Record::new(4, vec![6])]
        );
    }

    #[test]
    fn combiner_runs_per_map_task() {
        let runner = runner(16_000);
        runner.store().put("in", input()).unwrap();
        let job = Job::new("sum", |_: &TaskContext| Box::new(Explode) as Box<dyn Mapper>, Sum)
            .with_combiner(Sum);
        let report = runner
            .run_job(&job, &JobSpec::new(DatasetRef::all("in"), "out"))
            .unwrap();
        assert_eq!(report.map_tasks, 1);
        // 3 keys seen by the combiner, 3 again by the reducer
        assert_eq!(report.counters.get("keys"), 6);
        let out = sorted(runner.store().read(&DatasetRef::all("out")).unwrap());
        assert_eq!(
            out,
            vec![
                Record::new(-2, vec![3]),
                Record::new(1, vec![7]),
                Record::new(4, vec![6])
            ]
        );
    }

    #[test]
    fn existing_output_is_refused() {
        let runner = runner(2);
        runner.store().put("in", input()).unwrap();
        runner.store().put("out", vec![]).unwrap();
        let job = Job::new("sum", |_: &TaskContext| Box::new(Explode) as Box<dyn Mapper>, Sum);
        assert!(matches!(
            runner.run_job(&job, &JobSpec::new(DatasetRef::all("in"), "out")),
            Err(JobError::OutputExists(_))
        ));
    }

    #[test]
    fn task_failures_carry_job_and_task() {
        let runner = runner(2);
        runner.store().put("in", input()).unwrap();
        let job = Job::new("fail", |_: &TaskContext| Box::new(Explode) as Box<dyn Mapper>, Fail);
        let err = runner
            .run_job(&job, &JobSpec::new(DatasetRef::all("in"), "out"))
            .unwrap_err();
        assert!(matches!(&err, JobError::Task { job, .. } if job == "fail"));
        assert!(matches!(err.root(), JobError::Contract(_)));
        assert!(!runner.store().exists("out"));
    }

    #[test]
    fn every_run_and_task_gets_its_own_seed() {
        let runner = runner(1);
        let seeds = parking_lot::Mutex::new(Vec::new());
        let seeds = Arc::new(seeds);
        runner.store().put("in", input()).unwrap();
        let captured = seeds.clone();
        let job = Job::new(
            "seeds",
            move |ctx: &TaskContext| {
                captured.lock().push(ctx.seed);
                Box::new(Explode) as Box<dyn Mapper>
            },
            Sum,
        );
        runner
            .run_job(&job, &JobSpec::new(DatasetRef::all("in"), "a"))
            .unwrap();
        runner
            .run_job(&job, &JobSpec::new(DatasetRef::all("in"), "b"))
            .unwrap();
        let mut seeds = seeds.lock().clone();
        assert_eq!(seeds.len(), 8);
        seeds.sort();
        seeds.dedup();
        assert_eq!(seeds.len(), 8);
    }
}
