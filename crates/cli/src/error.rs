use spark_batch::{GeneratorError, ProcessError};
use spark_config::ConfigError;
use spark_runtime::RunnerError;
use spark_transport::SparkError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CliError {
    #[error("Invalid client configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Spark request failed: {0}")]
    Spark(#[from] SparkError),

    #[error("Failed to read input files: {0}")]
    Generator(#[from] GeneratorError),

    #[error("Failed to prepare the output directory: {0}")]
    Process(#[from] ProcessError),

    #[error("Batch run failed: {0}")]
    Runner(#[from] RunnerError),

    #[error("Failed to serialize data to JSON: {0}")]
    JsonSerialize(#[from] serde_json::Error),

    /// A blocking task panicked or was aborted.
    #[error("Task join error: {0}")]
    TaskJoin(#[from] tokio::task::JoinError),

    #[error("Unexpected error: {0}")]
    Unexpected(String),

    #[error("Shutdown requested")]
    ShutdownRequested,
}
