use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid base URL <{url}>: {reason}")]
    BaseUrl { url: String, reason: String },

    #[error(
        "user authentication is required; provide a valid API key, bearer token, or OAuth \
         credentials to proceed (use \"open\" as API key for public APIs)"
    )]
    MissingAuth,

    #[error("invalid OAuth credentials: {0}")]
    OAuth(String),

    #[error("failed to read OAuth credentials from {path}: {source}")]
    OAuthFile {
        path: PathBuf,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("env file error: {0}")]
    Env(String),

    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}
