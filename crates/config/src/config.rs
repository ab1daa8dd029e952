use crate::{
    auth::{Authorization, OAuthCredentials},
    base_url::BaseUrl,
    env::EnvManager,
    error::ConfigError,
    vars,
};
use std::{collections::BTreeMap, fmt, time::Duration};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(60_000);
pub const DEFAULT_MAX_RETRIES: u32 = 2;
pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_secs(1);

/// Everything a client needs to reach one Spark tenant.
#[derive(Clone)]
pub struct Config {
    base_url: BaseUrl,
    auth: Authorization,
    timeout: Duration,
    max_retries: u32,
    retry_interval: Duration,
    extra_headers: BTreeMap<String, String>,
}

impl Config {
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Builds a config purely from `CSPARK_*` variables.
    pub fn from_env(env: &EnvManager) -> Result<Self, ConfigError> {
        ConfigBuilder::default().with_env(env).build()
    }

    pub fn base_url(&self) -> &BaseUrl {
        &self.base_url
    }

    pub fn auth(&self) -> &Authorization {
        &self.auth
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    pub fn retry_interval(&self) -> Duration {
        self.retry_interval
    }

    pub fn extra_headers(&self) -> &BTreeMap<String, String> {
        &self.extra_headers
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra_headers.insert(name.into(), value.into());
        self
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("base_url", &self.base_url.full())
            .field("auth", &self.auth)
            .field("timeout", &self.timeout)
            .field("max_retries", &self.max_retries)
            .field("retry_interval", &self.retry_interval)
            .field("extra_headers", &self.extra_headers.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [auth={}, timeout={}ms, max_retries={}]",
            self.base_url,
            self.auth,
            self.timeout.as_millis(),
            self.max_retries
        )
    }
}

/// Collects config inputs. Explicit `with_*` values win over anything picked
/// up through [`ConfigBuilder::with_env`].
#[derive(Debug, Clone, Default)]
pub struct ConfigBuilder {
    base_url: Option<String>,
    tenant: Option<String>,
    env_name: Option<String>,
    api_key: Option<String>,
    token: Option<String>,
    oauth: Option<OAuthCredentials>,
    oauth_path: Option<String>,
    timeout: Option<Duration>,
    max_retries: Option<u32>,
    retry_interval: Option<Duration>,
    extra_headers: BTreeMap<String, String>,
}

impl ConfigBuilder {
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    pub fn with_tenant(mut self, tenant: impl Into<String>) -> Self {
        self.tenant = Some(tenant.into());
        self
    }

    /// Environment name used when no base URL is given, e.g. `uat.us`.
    pub fn with_env_name(mut self, env: impl Into<String>) -> Self {
        self.env_name = Some(env.into());
        self
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn with_oauth(mut self, creds: OAuthCredentials) -> Self {
        self.oauth = Some(creds);
        self
    }

    pub fn with_oauth_file(mut self, path: impl Into<String>) -> Self {
        self.oauth_path = Some(path.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = Some(retries);
        self
    }

    pub fn with_retry_interval(mut self, interval: Duration) -> Self {
        self.retry_interval = Some(interval);
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra_headers.insert(name.into(), value.into());
        self
    }

    /// Fills every field still unset from `CSPARK_*` variables.
    pub fn with_env(mut self, env: &EnvManager) -> Self {
        let pick = |current: Option<String>, key: &str| {
            current.or_else(|| env.get(key).map(str::to_string))
        };

        self.base_url = pick(self.base_url.take(), vars::BASE_URL);
        self.tenant = pick(self.tenant.take(), vars::TENANT_NAME);
        self.api_key = pick(self.api_key.take(), vars::API_KEY);
        self.token = pick(self.token.take(), vars::BEARER_TOKEN);
        self.oauth_path = pick(self.oauth_path.take(), vars::OAUTH_PATH);

        if self.oauth.is_none()
            && let (Some(id), Some(secret)) = (env.get(vars::CLIENT_ID), env.get(vars::CLIENT_SECRET))
        {
            match OAuthCredentials::new(id, secret) {
                Ok(creds) => self.oauth = Some(creds),
                Err(e) => tracing::warn!(error = %e, "ignoring OAuth client credentials from env"),
            }
        }

        self
    }

    pub fn build(self) -> Result<Config, ConfigError> {
        let base_url = match (&self.base_url, &self.tenant, &self.env_name) {
            (Some(url), tenant, _) => BaseUrl::parse(url, tenant.as_deref())?,
            (None, Some(tenant), Some(env)) => BaseUrl::of_env(tenant, env)?,
            _ => {
                return Err(ConfigError::BaseUrl {
                    url: String::new(),
                    reason: format!("no base URL given (set {})", vars::BASE_URL),
                });
            }
        };

        let oauth = match (self.oauth, &self.oauth_path) {
            (Some(creds), _) => Some(creds),
            (None, Some(path)) => Some(OAuthCredentials::from_file(path)?),
            (None, None) => None,
        };
        let auth = Authorization::resolve(self.api_key.as_deref(), self.token.as_deref(), oauth)?;

        let timeout = self.timeout.unwrap_or(DEFAULT_TIMEOUT);
        if timeout.is_zero() {
            return Err(ConfigError::InvalidValue {
                field: "timeout",
                reason: "must be greater than zero".to_string(),
            });
        }

        Ok(Config {
            base_url,
            auth,
            timeout,
            max_retries: self.max_retries.unwrap_or(DEFAULT_MAX_RETRIES),
            retry_interval: self.retry_interval.unwrap_or(DEFAULT_RETRY_INTERVAL),
            extra_headers: self.extra_headers,
        })
    }
}
