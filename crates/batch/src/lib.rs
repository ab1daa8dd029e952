pub mod batches;
pub mod error;
pub mod generator;
pub mod pipeline;
pub mod processor;

#[cfg(test)]
mod tests;

pub use batches::{Batches, CreateParams};
pub use error::{GeneratorError, ProcessError};
pub use generator::{ChunkGenerator, ChunkSource, GeneratorConfig};
pub use pipeline::{Pipeline, PipelineStats, PushInput};
pub use processor::{ChunkProcessor, CollectingProcessor, CsvResultWriter};

/// Version segment of every batch endpoint.
pub const API_VERSION: &str = "api/v4";
