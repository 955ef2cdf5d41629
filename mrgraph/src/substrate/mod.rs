//! A batch map / combine / shuffle / reduce substrate.
//!
//! Jobs are written against [`Mapper`] and [`Reducer`] and never see how
//! records are sharded, shuffled or stored. [`runner::LocalJobRunner`] runs
//! them in-process on a rayon pool; anything implementing
//! [`BatchSubstrate`] can take its place.

use crate::errors::JobError;
use mrgraph_core::entities::VertexId;
use std::collections::BTreeMap;

pub mod pool;
pub mod runner;
pub mod store;

pub use pool::{custom_pool, global_pool};
pub use runner::LocalJobRunner;
pub use store::{Dataset, DatasetStore, DiskStore, MemStore};

/// Stream written by jobs that do not partition their output.
pub const PART: &str = "part";
pub const BRANCH: &str = "branch";
pub const CHAIN: &str = "chain";

/// One key/value pair. Keys are vertex ids; values are encoded records.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Record {
    pub key: VertexId,
    pub value: Vec<u8>,
}

impl Record {
    pub fn new(key: VertexId, value: Vec<u8>) -> Self {
        Self { key, value }
    }
}

/// Named counters, summed across tasks once a job finishes.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Counters(BTreeMap<String, u64>);

impl Counters {
    pub fn incr(&mut self, name: &str, by: u64) {
        if let Some(count) = self.0.get_mut(name) {
            *count += by;
        } else {
            self.0.insert(name.to_string(), by);
        }
    }

    /// Zero for counters nobody touched.
    pub fn get(&self, name: &str) -> u64 {
        self.0.get(name).copied().unwrap_or(0)
    }

    pub fn merge(mut self, other: Counters) -> Self {
        for (name, count) in other.0 {
            *self.0.entry(name).or_insert(0) += count;
        }
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.0.iter().map(|(name, count)| (name.as_str(), *count))
    }
}

/// Output side of one task: records per stream plus the task's counters.
#[derive(Debug, Default)]
pub struct Emitter {
    streams: BTreeMap<String, Vec<Record>>,
    counters: Counters,
}

impl Emitter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn emit(&mut self, key: VertexId, value: Vec<u8>) {
        self.emit_to(PART, key, value);
    }

    pub fn emit_to(&mut self, stream: &str, key: VertexId, value: Vec<u8>) {
        if let Some(records) = self.streams.get_mut(stream) {
            records.push(Record::new(key, value));
        } else {
            self.streams
                .insert(stream.to_string(), vec![Record::new(key, value)]);
        }
    }

    pub fn incr(&mut self, counter: &str, by: u64) {
        self.counters.incr(counter, by);
    }

    pub fn counters(&self) -> &Counters {
        &self.counters
    }

    pub fn records(&self, stream: &str) -> &[Record] {
        self.streams.get(stream).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn into_parts(self) -> (BTreeMap<String, Vec<Record>>, Counters) {
        (self.streams, self.counters)
    }
}

/// What a map task knows about itself.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TaskContext {
    pub task: usize,
    /// Seed for this task only; differs between tasks and between runs.
    pub seed: u64,
}

pub trait Mapper: Send {
    fn map(&mut self, record: &Record, out: &mut Emitter) -> Result<(), JobError>;
}

/// Used both as the reducer and as the optional combiner of a job. A
/// combiner must tolerate being applied zero, one or many times.
pub trait Reducer: Send + Sync {
    fn reduce(&self, key: VertexId, values: Vec<Vec<u8>>, out: &mut Emitter) -> Result<(), JobError>;
}

pub type MapperFactory = Box<dyn Fn(&TaskContext) -> Box<dyn Mapper> + Send + Sync>;

pub struct Job {
    pub name: String,
    pub mapper: MapperFactory,
    pub combiner: Option<Box<dyn Reducer>>,
    pub reducer: Box<dyn Reducer>,
}

impl Job {
    pub fn new(
        name: impl Into<String>,
        mapper: impl Fn(&TaskContext) -> Box<dyn Mapper> + Send + Sync + 'static,
        reducer: impl Reducer + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            mapper: Box::new(mapper),
            combiner: None,
            reducer: Box::new(reducer),
        }
    }

    pub fn with_combiner(mut self, combiner: impl Reducer + 'static) -> Self {
        self.combiner = Some(Box::new(combiner));
        self
    }
}

/// A dataset, optionally narrowed to a single stream.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DatasetRef {
    pub path: String,
    pub stream: Option<String>,
}

impl DatasetRef {
    pub fn all(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            stream: None,
        }
    }

    pub fn stream(path: impl Into<String>, stream: &str) -> Self {
        Self {
            path: path.into(),
            stream: Some(stream.to_string()),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct JobSpec {
    pub input: DatasetRef,
    pub output: String,
}

impl JobSpec {
    pub fn new(input: DatasetRef, output: impl Into<String>) -> Self {
        Self {
            input,
            output: output.into(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct JobReport {
    pub job: String,
    pub map_tasks: usize,
    pub records_in: usize,
    pub records_out: usize,
    pub counters: Counters,
}

/// Runs jobs and owns the datasets they read and write.
pub trait BatchSubstrate {
    type Store: DatasetStore;

    /// Run `job` to completion. The output dataset must not exist yet.
    fn run_job(&self, job: &Job, spec: &JobSpec) -> Result<JobReport, JobError>;

    fn store(&self) -> &Self::Store;
}
