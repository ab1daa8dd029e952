pub mod core;
pub mod error;
pub mod execution;
pub mod records;

pub use crate::core::identifiers::{BatchId, new_chunk_id};
pub use error::ModelError;
pub use execution::state::{DuplicatePolicy, PipelineState};
pub use execution::status::{BatchStatus, PushResponse};
pub use records::chunk::{BatchChunk, ChunkData, Row, create_chunks};
pub use records::result::{ChunkResult, PullResponse};
