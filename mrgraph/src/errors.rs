use mrgraph_core::{
    entities::VertexId,
    errors::{DecodeError, EncodeError, VertexError},
};
use std::path::PathBuf;

/// A job received input that its preconditions rule out.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ContractViolation {
    #[error("Branch vertex {id} reached the chain compression job")]
    BranchInput { id: VertexId },
    #[error("No vertices were shuffled to key {key}")]
    NoVertices { key: VertexId },
}

#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("Dataset {0} does not exist")]
    NotFound(String),
    #[error("Dataset {0} already exists")]
    AlreadyExists(String),
    #[error("Part file {path} is corrupt: {reason}")]
    CorruptPart { path: PathBuf, reason: String },
    #[error("IO operation failed")]
    IOError {
        #[from]
        source: std::io::Error,
    },
}

#[derive(thiserror::Error, Debug)]
pub enum JobError {
    #[error("Failed to decode a record")]
    Decode {
        #[from]
        source: DecodeError,
    },
    #[error("Failed to encode a record")]
    Encode {
        #[from]
        source: EncodeError,
    },
    #[error("Invalid vertex operation")]
    Vertex {
        #[from]
        source: VertexError,
    },
    #[error(transparent)]
    Contract(#[from] ContractViolation),
    #[error("Dataset store failed")]
    Store {
        #[from]
        source: StoreError,
    },
    #[error("Failed to load config")]
    Config {
        #[from]
        source: config::ConfigError,
    },
    #[error("Failed to build the thread pool")]
    ThreadPool {
        #[from]
        source: rayon::ThreadPoolBuildError,
    },
    #[error("Output {0} already exists")]
    OutputExists(String),
    #[error("Task {task} of job {job} failed")]
    Task {
        job: String,
        task: usize,
        #[source]
        source: Box<JobError>,
    },
}

impl JobError {
    pub(crate) fn in_task(self, job: &str, task: usize) -> Self {
        match self {
            err @ JobError::Task { .. } => err,
            err => JobError::Task {
                job: job.to_string(),
                task,
                source: Box::new(err),
            },
        }
    }

    /// The innermost error, skipping task context.
    pub fn root(&self) -> &JobError {
        match self {
            JobError::Task { source, .. } => source.root(),
            err => err,
        }
    }
}
