use crate::error::ConfigError;
use std::fmt;
use url::{Host, Url};

const SPARK_DOMAIN: &str = "coherent.global";

/// Tenant-scoped root of every Spark endpoint, e.g.
/// `https://excel.uat.us.coherent.global` + `my-tenant`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BaseUrl {
    base: String,
    tenant: String,
}

impl BaseUrl {
    /// Parses a Spark URL. The tenant is taken from `tenant` when given,
    /// otherwise from the first path segment of `url`.
    ///
    /// Hosts must live under `coherent.global`; loopback and IP hosts are also
    /// accepted so the SDK can be pointed at a local server.
    pub fn parse(url: &str, tenant: Option<&str>) -> Result<Self, ConfigError> {
        let invalid = |reason: &str| ConfigError::BaseUrl {
            url: url.to_string(),
            reason: reason.to_string(),
        };

        let parsed = Url::parse(url.trim()).map_err(|e| invalid(&e.to_string()))?;
        let host = parsed.host().ok_or_else(|| invalid("host is missing"))?;

        let is_local = match &host {
            Host::Domain(domain) => *domain == "localhost",
            Host::Ipv4(_) | Host::Ipv6(_) => true,
        };
        let is_spark = match &host {
            Host::Domain(domain) => {
                let domain = domain.to_ascii_lowercase();
                domain.ends_with(&format!(".{SPARK_DOMAIN}"))
            }
            _ => false,
        };

        if is_spark && parsed.scheme() != "https" {
            return Err(invalid("Spark hosts must be reached over https"));
        }
        if !is_spark && !is_local {
            return Err(invalid("must be a Spark base URL <*.coherent.global>"));
        }

        let from_path = parsed
            .path_segments()
            .and_then(|mut segments| segments.next())
            .filter(|segment| !segment.is_empty());

        let tenant = tenant
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .or(from_path)
            .ok_or_else(|| invalid("tenant name is required"))?;

        let mut base = format!("{}://{}", parsed.scheme(), host);
        if let Some(port) = parsed.port() {
            base.push_str(&format!(":{port}"));
        }

        Ok(Self {
            base,
            tenant: tenant.to_lowercase(),
        })
    }

    /// Builds the canonical URL of a tenant in a named environment.
    pub fn of_env(tenant: &str, env: &str) -> Result<Self, ConfigError> {
        let (tenant, env) = (tenant.trim(), env.trim());
        if tenant.is_empty() || env.is_empty() {
            return Err(ConfigError::BaseUrl {
                url: String::new(),
                reason: "environment and tenant names are required".to_string(),
            });
        }

        Ok(Self {
            base: format!("https://excel.{}.{SPARK_DOMAIN}", env.to_lowercase()),
            tenant: tenant.to_lowercase(),
        })
    }

    pub fn tenant(&self) -> &str {
        &self.tenant
    }

    pub fn value(&self) -> &str {
        &self.base
    }

    pub fn full(&self) -> String {
        format!("{}/{}", self.base, self.tenant)
    }

    /// Root of the tenant's keycloak realm.
    pub fn oauth2(&self) -> String {
        format!("{}/auth/realms/{}", self.to("keycloak"), self.tenant)
    }

    /// The same environment served by another Spark service.
    pub fn to(&self, service: &str) -> String {
        self.base.replacen("excel", service, 1)
    }
}

impl fmt::Display for BaseUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.base, self.tenant)
    }
}
