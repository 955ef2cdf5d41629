//! # mrgraph
//!
//! Simplifies large de Bruijn style assembly graphs with batch
//! map / shuffle / reduce jobs. No task ever holds the whole graph: each
//! vertex travels as a self-contained record (see [`mrgraph_core`]) and
//! jobs only ever combine the records that meet under one key.
//!
//! The pipeline has two phases:
//!
//! 1. [`jobs::build_vertices`] joins every vertex with the edges pointing
//!    at it, optionally drops weakly covered edges, and classifies vertices
//!    as branch or chain.
//! 2. [`driver::CompressionDriver`] runs [`jobs::compress_chains`] until
//!    rounds stop compressing, contracting each unbranched run of chain
//!    vertices.
//!
//! Jobs run on any [`substrate::BatchSubstrate`]; the crate ships
//! [`substrate::LocalJobRunner`], which runs them on a rayon pool.
//!
//! ```no_run
//! use mrgraph::prelude::*;
//!
//! let config = load_config(None, None)?;
//! config.init_logging();
//! let runner = LocalJobRunner::new(DiskStore::new("/tmp/graphs"), config.runner.clone())?;
//! let summary = simplify_graph::<NoPayload, _>(
//!     &runner,
//!     &config,
//!     seeded_coins(),
//!     DatasetRef::all("raw"),
//!     "simple",
//! )?;
//! println!("{} compressions", summary.compression.total_compressions);
//! # Ok::<(), JobError>(())
//! ```

pub mod analysis;
pub mod config;
pub mod driver;
pub mod errors;
pub mod jobs;
pub mod substrate;

pub mod prelude {
    pub use crate::{
        config::{load_config, Coverage, InputFormat, JobConfig, JobConfigBuilder},
        driver::{simplify_graph, CompressionDriver, CompressionSummary},
        errors::{ContractViolation, JobError, StoreError},
        jobs::coin::{seeded_coins, CoinSource},
        substrate::{
            BatchSubstrate, Dataset, DatasetRef, DatasetStore, DiskStore, LocalJobRunner, MemStore,
            Record,
        },
    };
    pub use mrgraph_core::prelude::*;
}
