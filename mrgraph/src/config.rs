use config::{Config, ConfigError, Environment, File, FileFormat};
use mrgraph_core::{entities::VertexConfig, utils::logging::init_logging};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Edge coverage threshold applied while building vertices.
///
/// Serialized as the integer threshold, or the string `"disabled"`.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "CoverageRepr", into = "CoverageRepr")]
pub enum Coverage {
    #[default]
    Disabled,
    Threshold(u32),
}

impl Coverage {
    /// Groups of parallel edges with fewer members than this are dropped.
    pub fn min_multiplicity(&self) -> Option<usize> {
        match self {
            Coverage::Disabled => None,
            Coverage::Threshold(c) => Some((*c as usize + 1) / 2),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(untagged)]
enum CoverageRepr {
    Threshold(u32),
    Text(String),
}

impl TryFrom<CoverageRepr> for Coverage {
    type Error = String;

    fn try_from(repr: CoverageRepr) -> Result<Self, Self::Error> {
        match repr {
            CoverageRepr::Threshold(c) => Ok(Coverage::Threshold(c)),
            CoverageRepr::Text(text) if text.eq_ignore_ascii_case("disabled") => {
                Ok(Coverage::Disabled)
            }
            CoverageRepr::Text(text) => text
                .trim()
                .parse()
                .map(Coverage::Threshold)
                .map_err(|_| format!("coverage must be an integer or \"disabled\", got {text:?}")),
        }
    }
}

impl From<Coverage> for CoverageRepr {
    fn from(coverage: Coverage) -> Self {
        match coverage {
            Coverage::Disabled => CoverageRepr::Text("disabled".to_string()),
            Coverage::Threshold(c) => CoverageRepr::Threshold(c),
        }
    }
}

/// How the build job reads its input values.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputFormat {
    #[default]
    Binary,
    /// One text record per value, see `mrgraph_core::codec::text`.
    Text,
}

#[derive(Debug, Deserialize, PartialEq, Clone, Serialize)]
#[serde(default)]
pub struct RunnerConfig {
    /// `None` uses the shared pool.
    pub num_threads: Option<usize>,
    /// Records handed to one map task.
    pub shard_size: usize,
    pub num_reducers: usize,
    /// Base seed; every job run derives its own from it.
    pub seed: u64,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            num_threads: None,
            shard_size: 16_000,
            num_reducers: 4,
            seed: 42,
        }
    }
}

#[derive(Debug, Deserialize, PartialEq, Clone, Serialize)]
#[serde(default)]
pub struct JobConfig {
    pub allow_multi_edges: bool,
    /// Split build output into `branch` and `chain` streams.
    pub partition_branches: bool,
    /// Emit built vertices with their in-edges.
    pub include_from_edges: bool,
    pub coverage: Coverage,
    pub require_matching_multiplicities: bool,
    pub input_format: InputFormat,
    pub runner: RunnerConfig,
    pub idle_rounds_to_stop: usize,
    pub max_iterations: Option<usize>,
    /// Default filter for [`JobConfig::init_logging`]; `RUST_LOG` wins.
    pub log_level: String,
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            allow_multi_edges: true,
            partition_branches: false,
            include_from_edges: false,
            coverage: Coverage::Disabled,
            require_matching_multiplicities: false,
            input_format: InputFormat::Binary,
            runner: RunnerConfig::default(),
            idle_rounds_to_stop: 2,
            max_iterations: None,
            log_level: "INFO".to_string(),
        }
    }
}

impl JobConfig {
    pub fn vertex_config(&self) -> VertexConfig {
        VertexConfig::default()
            .with_multi_edges(self.allow_multi_edges)
            .with_matching_multiplicities(self.require_matching_multiplicities)
    }

    /// Install the global subscriber at `log_level`. Returns false if one
    /// was already installed.
    pub fn init_logging(&self) -> bool {
        init_logging(self.log_level.clone())
    }
}

pub struct JobConfigBuilder {
    config: JobConfig,
}

impl From<JobConfig> for JobConfigBuilder {
    fn from(config: JobConfig) -> Self {
        Self { config }
    }
}

impl Default for JobConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl JobConfigBuilder {
    pub fn new() -> Self {
        JobConfig::default().into()
    }

    pub fn with_multi_edges(mut self, allow: bool) -> Self {
        self.config.allow_multi_edges = allow;
        self
    }

    pub fn with_partition_branches(mut self, partition: bool) -> Self {
        self.config.partition_branches = partition;
        self
    }

    pub fn with_from_edges(mut self, include: bool) -> Self {
        self.config.include_from_edges = include;
        self
    }

    pub fn with_coverage(mut self, coverage: Coverage) -> Self {
        self.config.coverage = coverage;
        self
    }

    pub fn with_matching_multiplicities(mut self, require: bool) -> Self {
        self.config.require_matching_multiplicities = require;
        self
    }

    pub fn with_input_format(mut self, format: InputFormat) -> Self {
        self.config.input_format = format;
        self
    }

    pub fn with_num_threads(mut self, num_threads: usize) -> Self {
        self.config.runner.num_threads = Some(num_threads);
        self
    }

    pub fn with_shard_size(mut self, shard_size: usize) -> Self {
        self.config.runner.shard_size = shard_size;
        self
    }

    pub fn with_num_reducers(mut self, num_reducers: usize) -> Self {
        self.config.runner.num_reducers = num_reducers;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.config.runner.seed = seed;
        self
    }

    pub fn with_idle_rounds_to_stop(mut self, rounds: usize) -> Self {
        self.config.idle_rounds_to_stop = rounds;
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.config.max_iterations = Some(max_iterations);
        self
    }

    pub fn with_log_level(mut self, log_level: String) -> Self {
        self.config.log_level = log_level;
        self
    }

    pub fn build(self) -> JobConfig {
        self.config
    }
}

// Order of precedence: environment (MRGRAPH__*) >> config path >> given config >> defaults
pub fn load_config(
    job_config: Option<JobConfig>,
    config_path: Option<PathBuf>,
) -> Result<JobConfig, ConfigError> {
    let job_config = job_config.unwrap_or_default();
    let json = serde_json::to_string(&job_config).map_err(|e| ConfigError::Foreign(Box::new(e)))?;
    let mut builder = Config::builder().add_source(File::from_str(&json, FileFormat::Json));
    if let Some(config_path) = config_path {
        builder = builder.add_source(File::from(config_path));
    }
    builder = builder.add_source(
        Environment::with_prefix("MRGRAPH")
            .separator("__")
            .try_parsing(true),
    );
    builder.build()?.try_deserialize::<JobConfig>()
}
