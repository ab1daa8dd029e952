use crate::error::SparkError;
use std::fmt;

/// Parts of a service locator such as `folder/service[version]`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UriParams {
    pub folder: Option<String>,
    pub service: Option<String>,
    pub service_id: Option<String>,
    pub version: Option<String>,
    pub version_id: Option<String>,
    pub proxy: Option<String>,
    pub public: bool,
}

impl UriParams {
    pub fn folder_service(folder: impl Into<String>, service: impl Into<String>) -> Self {
        Self {
            folder: Some(folder.into()),
            service: Some(service.into()),
            ..Self::default()
        }
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    /// Short locator, e.g. `folder/service[1.0.0]`.
    pub fn service_uri(&self) -> String {
        self.encode(false)
    }

    /// Encodes the locator. The long form spells out `folders/.../services/...`.
    pub fn encode(&self, long: bool) -> String {
        if let Some(proxy) = &self.proxy {
            return format!("proxy/{proxy}");
        }
        if let Some(version_id) = &self.version_id {
            return format!("version/{version_id}");
        }
        if let Some(service_id) = &self.service_id {
            return format!("service/{service_id}");
        }
        match (&self.folder, &self.service) {
            (Some(folder), Some(service)) => {
                let version = self
                    .version
                    .as_deref()
                    .map(|v| format!("[{v}]"))
                    .unwrap_or_default();
                if long {
                    format!("folders/{folder}/services/{service}{version}")
                } else {
                    format!("{folder}/{service}{version}")
                }
            }
            _ => String::new(),
        }
    }

    /// Decodes a locator. Unrecognized input yields empty params.
    pub fn decode(uri: &str) -> Self {
        let uri = sanitize(uri).replace("folders/", "").replace("services/", "");
        let Some((head, rest)) = uri.split_once('/') else {
            return Self::default();
        };
        if head.is_empty() || rest.is_empty() {
            return Self::default();
        }

        let (name, version) = match rest.split_once('[') {
            Some((name, tail)) => match tail.strip_suffix(']') {
                Some(version) => (name, Some(version)),
                None => return Self::default(),
            },
            None => (rest, None),
        };
        if name.is_empty() || (name.contains('/') && head != "proxy") {
            return Self::default();
        }

        match head {
            "version" => Self {
                version_id: Some(name.to_string()),
                ..Self::default()
            },
            "service" => Self {
                service_id: Some(name.to_string()),
                ..Self::default()
            },
            "proxy" => Self {
                proxy: Some(name.to_string()),
                ..Self::default()
            },
            folder => Self {
                folder: Some(folder.to_string()),
                service: Some(name.to_string()),
                version: version.filter(|v| !v.trim().is_empty()).map(str::to_string),
                ..Self::default()
            },
        }
    }

    /// Decodes and checks that the locator names a service.
    pub fn validate(uri: &str) -> Result<Self, SparkError> {
        Self::decode(uri).validated()
    }

    pub fn validated(self) -> Result<Self, SparkError> {
        if !self.service_uri().is_empty() {
            return Ok(self);
        }

        let reason = match (&self.folder, &self.service) {
            (Some(_), None) => "service name is missing",
            (None, Some(_)) => "folder name is missing",
            _ => "service uri locator is required",
        };
        Err(SparkError::sdk(format!(
            "{reason} :: a uri needs to be of these formats: \"folder/service[?version]\", \
             \"service/service_id\", \"version/version_id\" or \"proxy/custom-endpoint\""
        )))
    }
}

/// A fully built endpoint URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Uri(String);

impl Uri {
    /// `{base_url}/{version}[/public][/locator]/{endpoint}`.
    pub fn of(
        params: Option<&UriParams>,
        base_url: &str,
        version: &str,
        endpoint: &str,
    ) -> Result<Self, SparkError> {
        let default = UriParams::default();
        let params = params.unwrap_or(&default);

        let mut path = sanitize(version);
        if params.public {
            path.push_str("/public");
        }

        if let Some(version_id) = &params.version_id {
            path.push_str(&format!("/version/{version_id}"));
        } else if let Some(service_id) = &params.service_id {
            path.push_str(&format!("/service/{service_id}"));
        } else if let (Some(folder), Some(service)) = (&params.folder, &params.service) {
            path.push_str(&format!("/folders/{folder}/services/{service}"));
        } else if let Some(proxy) = &params.proxy {
            path.push_str(&format!("/proxy/{}", sanitize(proxy)));
        }

        let endpoint = sanitize(endpoint);
        if !endpoint.is_empty() && params.proxy.is_none() {
            path.push('/');
            path.push_str(&endpoint);
        }

        let raw = format!("{}/{}", base_url.trim_end_matches('/'), path);
        url::Url::parse(&raw)
            .map_err(|e| SparkError::sdk_with(format!("invalid URI <{raw}>"), e))?;
        Ok(Self(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Uri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<Uri> for String {
    fn from(uri: Uri) -> Self {
        uri.0
    }
}

/// Collapses repeated slashes and trims them from both ends.
fn sanitize(value: &str) -> String {
    value
        .split('/')
        .filter(|segment| !segment.is_empty())
        .collect::<Vec<_>>()
        .join("/")
}
