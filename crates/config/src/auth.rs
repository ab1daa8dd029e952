use crate::error::ConfigError;
use serde::Deserialize;
use std::{
    fmt,
    path::{Path, PathBuf},
};

const OPEN: &str = "open";

/// Client credentials for the OAuth2 `client_credentials` flow.
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct OAuthCredentials {
    pub client_id: String,
    pub client_secret: String,

    #[serde(skip)]
    pub path: Option<PathBuf>,
}

impl OAuthCredentials {
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Result<Self, ConfigError> {
        let (client_id, client_secret) = (client_id.into(), client_secret.into());
        if client_id.trim().is_empty() || client_secret.trim().is_empty() {
            return Err(ConfigError::OAuth(
                "both client_id and client_secret are required".to_string(),
            ));
        }

        Ok(Self {
            client_id,
            client_secret,
            path: None,
        })
    }

    /// Reads `{"client_id": ..., "client_secret": ...}` from a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let file_error = |source: Box<dyn std::error::Error + Send + Sync>| ConfigError::OAuthFile {
            path: path.to_path_buf(),
            source,
        };

        let content = std::fs::read_to_string(path).map_err(|e| file_error(Box::new(e)))?;
        let creds: OAuthCredentials =
            serde_json::from_str(&content).map_err(|e| file_error(Box::new(e)))?;

        let mut creds = Self::new(creds.client_id, creds.client_secret)?;
        creds.path = Some(path.to_path_buf());
        Ok(creds)
    }

    pub fn flow(&self) -> &'static str {
        "client_credentials"
    }

    /// Form fields posted to the token endpoint.
    pub fn form(&self) -> [(&'static str, String); 3] {
        [
            ("client_id", self.client_id.clone()),
            ("client_secret", self.client_secret.clone()),
            ("grant_type", self.flow().to_string()),
        ]
    }
}

impl fmt::Debug for OAuthCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OAuthCredentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &mask(&self.client_secret))
            .field("path", &self.path)
            .finish()
    }
}

/// How requests authenticate against the platform.
#[derive(Clone, PartialEq, Eq)]
pub enum Authorization {
    ApiKey(String),
    Token(String),
    OAuth(OAuthCredentials),
    /// Public endpoints only; no auth header is sent.
    Open,
}

impl Authorization {
    /// Picks one scheme from the supplied secrets. OAuth credentials take
    /// precedence, then the API key, then the bearer token. Either secret set
    /// to `"open"` selects [`Authorization::Open`].
    pub fn resolve(
        api_key: Option<&str>,
        token: Option<&str>,
        oauth: Option<OAuthCredentials>,
    ) -> Result<Self, ConfigError> {
        let api_key = api_key.map(str::trim).filter(|k| !k.is_empty());
        let token = token.map(strip_bearer).filter(|t| !t.is_empty());

        if api_key == Some(OPEN) || token.as_deref() == Some(OPEN) {
            return Ok(Authorization::Open);
        }

        match (oauth, api_key, token) {
            (Some(oauth), _, _) => Ok(Authorization::OAuth(oauth)),
            (None, Some(key), _) => Ok(Authorization::ApiKey(key.to_string())),
            (None, None, Some(token)) => Ok(Authorization::Token(token)),
            (None, None, None) => Err(ConfigError::MissingAuth),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Authorization::ApiKey(_) => "api_key",
            Authorization::Token(_) => "token",
            Authorization::OAuth(_) => "oauth",
            Authorization::Open => "open",
        }
    }

    pub fn is_oauth(&self) -> bool {
        matches!(self, Authorization::OAuth(_))
    }

    pub fn oauth(&self) -> Option<&OAuthCredentials> {
        match self {
            Authorization::OAuth(creds) => Some(creds),
            _ => None,
        }
    }

    /// Header carrying the credential. OAuth needs a token fetched at runtime,
    /// so it only yields a header once `access_token` is known.
    pub fn header(&self, access_token: Option<&str>) -> Option<(&'static str, String)> {
        match self {
            Authorization::ApiKey(key) => Some(("x-synthetic-key", key.clone())),
            Authorization::Token(token) => Some(("Authorization", format!("Bearer {token}"))),
            Authorization::OAuth(_) => {
                access_token.map(|token| ("Authorization", format!("Bearer {token}")))
            }
            Authorization::Open => None,
        }
    }
}

impl fmt::Debug for Authorization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Authorization::ApiKey(key) => f.debug_tuple("ApiKey").field(&mask(key)).finish(),
            Authorization::Token(token) => f.debug_tuple("Token").field(&mask(token)).finish(),
            Authorization::OAuth(creds) => f.debug_tuple("OAuth").field(creds).finish(),
            Authorization::Open => f.write_str("Open"),
        }
    }
}

impl fmt::Display for Authorization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Authorization::ApiKey(key) => write!(f, "api_key({})", mask(key)),
            Authorization::Token(token) => write!(f, "token({})", mask(token)),
            Authorization::OAuth(creds) => write!(f, "oauth({})", creds.client_id),
            Authorization::Open => f.write_str("open"),
        }
    }
}

fn strip_bearer(token: &str) -> String {
    let token = token.trim();
    match token.get(..6) {
        Some(prefix) if prefix.eq_ignore_ascii_case("bearer") => token[6..].trim().to_string(),
        _ => token.to_string(),
    }
}

/// Replaces all but the last four characters with `*`.
pub fn mask(value: &str) -> String {
    let count = value.chars().count();
    if count <= 4 {
        return "*".repeat(count);
    }
    let visible: String = value.chars().skip(count - 4).collect();
    format!("{}{}", "*".repeat(count - 4), visible)
}
