pub mod client;
pub mod error;
pub mod http;
pub mod oauth;
pub mod retry;
pub mod uri;

pub use client::HttpClient;
pub use error::{ApiError, ApiErrorCause, ApiErrorKind, RequestSnapshot, ResponseSnapshot, SparkError};
pub use http::{HttpRequest, HttpResource, HttpResponse, Method};
pub use retry::{RetryDisposition, RetryPolicy, classify_spark_error};
pub use uri::{Uri, UriParams};
