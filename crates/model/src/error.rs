use thiserror::Error;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("invalid chunks: {0}")]
    InvalidChunks(String),

    #[error("unknown pipeline state '{0}'")]
    UnknownState(String),

    #[error("unknown duplicate policy '{0}' (expected ignore, throw or replace)")]
    UnknownPolicy(String),

    #[error("malformed payload: {0}")]
    Payload(#[from] serde_json::Error),
}
