use spark_batch::{GeneratorError, ProcessError};
use spark_transport::SparkError;
use thiserror::Error;

/// Errors that stop a batch run.
#[derive(Debug, Error)]
pub enum RunnerError {
    /// The runner was configured with values it cannot work with.
    #[error("Invalid runner settings: {0}")]
    InvalidSettings(String),

    /// Reading the next block of chunks failed.
    #[error("Chunk source error: {0}")]
    Source(#[from] GeneratorError),

    /// A push was rejected in a way retrying cannot fix.
    #[error("Upload error: {0}")]
    Upload(#[source] SparkError),

    #[error("Download error: {0}")]
    Download(#[source] SparkError),

    #[error("Status error: {0}")]
    Status(#[source] SparkError),

    /// The processor failed to flush its output at the end of the run.
    #[error("Processing error: {0}")]
    Process(#[from] ProcessError),

    /// Every receiver of a stage queue is gone while work was still pending.
    #[error("The {0} queue was disconnected")]
    Disconnected(&'static str),

    /// A stage thread panicked.
    #[error("Stage panicked: {0}")]
    StagePanicked(String),
}
