pub mod auth;
pub mod base_url;
pub mod config;
pub mod env;
pub mod error;

pub use auth::{Authorization, OAuthCredentials, mask};
pub use base_url::BaseUrl;
pub use config::{Config, ConfigBuilder};
pub use env::EnvManager;
pub use error::ConfigError;

/// Identifier sent as the default `source_system` and in user-agent headers.
pub const SDK_NAME: &str = "Spark Rust SDK";
pub const SDK_VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod vars {
    pub const BASE_URL: &str = "CSPARK_BASE_URL";
    pub const TENANT_NAME: &str = "CSPARK_TENANT_NAME";
    pub const API_KEY: &str = "CSPARK_API_KEY";
    pub const BEARER_TOKEN: &str = "CSPARK_BEARER_TOKEN";
    pub const CLIENT_ID: &str = "CSPARK_CLIENT_ID";
    pub const CLIENT_SECRET: &str = "CSPARK_CLIENT_SECRET";
    pub const OAUTH_PATH: &str = "CSPARK_OAUTH_PATH";
}
