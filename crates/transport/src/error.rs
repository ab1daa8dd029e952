use serde::Serialize;
use serde_json::Value;
use std::{collections::BTreeMap, fmt};
use thiserror::Error;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum SparkError {
    /// Raised on the client side, typically for invalid caller input.
    #[error("{message}")]
    Sdk {
        message: String,
        #[source]
        cause: Option<BoxError>,
    },

    /// The round trip to the platform failed.
    #[error(transparent)]
    Api(#[from] ApiError),
}

impl SparkError {
    pub fn sdk(message: impl Into<String>) -> Self {
        SparkError::Sdk {
            message: message.into(),
            cause: None,
        }
    }

    pub fn sdk_with(message: impl Into<String>, cause: impl Into<BoxError>) -> Self {
        SparkError::Sdk {
            message: message.into(),
            cause: Some(cause.into()),
        }
    }

    pub fn is_sdk(&self) -> bool {
        matches!(self, SparkError::Sdk { .. })
    }

    pub fn as_api(&self) -> Option<&ApiError> {
        match self {
            SparkError::Api(err) => Some(err),
            SparkError::Sdk { .. } => None,
        }
    }

    pub fn status(&self) -> Option<u16> {
        self.as_api().map(|err| err.status)
    }
}

/// Error category derived from the HTTP status of a failed call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ApiErrorKind {
    /// No response was received at all.
    Internet,
    BadRequest,
    Unauthorized,
    Forbidden,
    NotFound,
    Conflict,
    UnsupportedMediaType,
    UnprocessableEntity,
    RateLimit,
    InternalServer,
    ServiceUnavailable,
    GatewayTimeout,
    Unknown,
}

impl ApiErrorKind {
    pub fn from_status(status: u16) -> Self {
        match status {
            0 => ApiErrorKind::Internet,
            400 => ApiErrorKind::BadRequest,
            401 => ApiErrorKind::Unauthorized,
            403 => ApiErrorKind::Forbidden,
            404 => ApiErrorKind::NotFound,
            409 => ApiErrorKind::Conflict,
            415 => ApiErrorKind::UnsupportedMediaType,
            422 => ApiErrorKind::UnprocessableEntity,
            429 => ApiErrorKind::RateLimit,
            500 => ApiErrorKind::InternalServer,
            503 => ApiErrorKind::ServiceUnavailable,
            504 => ApiErrorKind::GatewayTimeout,
            _ => ApiErrorKind::Unknown,
        }
    }
}

impl fmt::Display for ApiErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RequestSnapshot {
    pub url: String,
    pub method: String,
    pub headers: BTreeMap<String, String>,
    pub body: Option<Value>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ResponseSnapshot {
    pub headers: BTreeMap<String, String>,
    pub body: Option<Value>,
    pub raw: String,
}

/// What was sent and, when there was one, what came back.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ApiErrorCause {
    pub request: RequestSnapshot,
    pub response: Option<ResponseSnapshot>,
}

#[derive(Debug, Clone, Error)]
#[error("{status} {message}")]
pub struct ApiError {
    pub status: u16,
    pub kind: ApiErrorKind,
    pub message: String,
    pub cause: Box<ApiErrorCause>,
}

impl ApiError {
    pub fn new(status: u16, message: impl Into<String>, cause: ApiErrorCause) -> Self {
        Self {
            status,
            kind: ApiErrorKind::from_status(status),
            message: message.into(),
            cause: Box::new(cause),
        }
    }

    /// Transport failure before any response arrived.
    pub fn no_response(message: impl Into<String>, request: RequestSnapshot) -> Self {
        Self::new(
            0,
            message,
            ApiErrorCause {
                request,
                response: None,
            },
        )
    }

    /// The `x-request-id` that was sent with the failed call.
    pub fn request_id(&self) -> &str {
        self.cause
            .request
            .headers
            .get("x-request-id")
            .map(String::as_str)
            .unwrap_or_default()
    }
}
