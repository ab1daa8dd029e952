use crate::{
    error::{ApiError, ApiErrorCause, RequestSnapshot, ResponseSnapshot, SparkError},
    http::{HttpRequest, HttpResource, HttpResponse, Method},
    oauth::{AccessToken, token_request},
    retry::RetryPolicy,
};
use serde_json::Value;
use spark_config::{Config, SDK_NAME, SDK_VERSION, mask};
use std::{collections::BTreeMap, sync::RwLock, thread};
use tracing::{debug, info, warn};
use uuid::Uuid;

struct RawResponse {
    status: u16,
    headers: BTreeMap<String, String>,
    buffer: Vec<u8>,
}

/// Blocking [`HttpResource`] backed by `reqwest`.
///
/// Throttled (429) and timed-out (408) calls are retried with jittered
/// exponential backoff; a 401 under OAuth2 refreshes the access token and
/// retries. Both are bounded by the config's `max_retries`.
pub struct HttpClient {
    config: Config,
    inner: reqwest::blocking::Client,
    policy: RetryPolicy,
    access_token: RwLock<Option<String>>,
}

impl HttpClient {
    pub fn new(config: Config) -> Result<Self, SparkError> {
        let inner = reqwest::blocking::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| SparkError::sdk_with("failed to build HTTP client", e))?;
        let policy = RetryPolicy::new(config.max_retries(), config.retry_interval());

        Ok(Self {
            config,
            inner,
            policy,
            access_token: RwLock::new(None),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Fetches a fresh OAuth2 access token and keeps it for later calls.
    pub fn refresh_token(&self) -> Result<(), SparkError> {
        info!("retrieving OAuth2 access token...");
        let request = token_request(&self.config)?;
        let headers = self.default_headers(&request);

        let raw = self
            .send_once(&request, &headers)
            .map_err(SparkError::Api)?;
        if raw.status >= 400 {
            let err = self.status_error(&request, &headers, raw);
            warn!(status = err.status, "failed to retrieve OAuth2 access token");
            return Err(err.into());
        }

        let token = AccessToken::from_response(&decode(raw))?;
        if let Ok(mut slot) = self.access_token.write() {
            *slot = Some(token.access_token);
        }
        Ok(())
    }

    fn current_token(&self) -> Option<String> {
        self.access_token.read().ok().and_then(|t| t.clone())
    }

    fn default_headers(&self, request: &HttpRequest) -> BTreeMap<String, String> {
        let mut headers = request.headers.clone();
        headers.extend(self.config.extra_headers().clone());

        let platform = format!("{}/{}", std::env::consts::OS, std::env::consts::ARCH);
        headers.insert(
            "User-Agent".into(),
            format!("Coherent {SDK_NAME} v{SDK_VERSION} ({platform})"),
        );
        headers.insert(
            "x-spark-ua".into(),
            format!("agent=spark-rust-sdk/{SDK_VERSION}; env={platform}"),
        );
        headers.insert("x-request-id".into(), Uuid::new_v4().to_string());
        headers.insert(
            "x-tenant-name".into(),
            self.config.base_url().tenant().to_string(),
        );
        headers
    }

    fn authorized(&self, mut headers: BTreeMap<String, String>) -> BTreeMap<String, String> {
        let token = self.current_token();
        if let Some((name, value)) = self.config.auth().header(token.as_deref()) {
            headers.insert(name.to_string(), value);
        }
        headers
    }

    fn send_once(
        &self,
        request: &HttpRequest,
        headers: &BTreeMap<String, String>,
    ) -> Result<RawResponse, ApiError> {
        let method = match request.method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Patch => reqwest::Method::PATCH,
            Method::Delete => reqwest::Method::DELETE,
        };

        let mut builder = self.inner.request(method, &request.url);
        if !request.params.is_empty() {
            builder = builder.query(&request.params);
        }
        for (name, value) in headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }
        if let Some(form) = &request.form {
            builder = builder.form(form);
        }

        let no_response = |e: reqwest::Error| {
            ApiError::no_response(
                format!("an error occurred while fetching <{}>; {e}", request.url),
                snapshot(request, headers),
            )
        };

        let response = builder.send().map_err(no_response)?;
        let status = response.status().as_u16();
        let response_headers = response
            .headers()
            .iter()
            .filter_map(|(k, v)| v.to_str().ok().map(|v| (k.as_str().to_string(), v.to_string())))
            .collect();
        let buffer = response.bytes().map_err(no_response)?.to_vec();

        Ok(RawResponse {
            status,
            headers: response_headers,
            buffer,
        })
    }

    fn status_error(
        &self,
        request: &HttpRequest,
        headers: &BTreeMap<String, String>,
        raw: RawResponse,
    ) -> ApiError {
        let raw_text = String::from_utf8_lossy(&raw.buffer).into_owned();
        let body = serde_json::from_slice::<Value>(&raw.buffer).ok();
        ApiError::new(
            raw.status,
            format!("failed to fetch <{}>", request.url),
            ApiErrorCause {
                request: snapshot(request, headers),
                response: Some(ResponseSnapshot {
                    headers: raw.headers,
                    body,
                    raw: raw_text,
                }),
            },
        )
    }

    fn fetch(&self, request: HttpRequest) -> Result<HttpResponse, SparkError> {
        let base_headers = self.default_headers(&request);
        debug!(method = %request.method, url = %request.url, "sending request");

        if self.config.auth().is_oauth() && self.current_token().is_none() {
            self.refresh_token()?;
        }

        let mut retries = 0;
        loop {
            let headers = self.authorized(base_headers.clone());
            let raw = self.send_once(&request, &headers)?;

            if raw.status < 400 {
                return Ok(decode(raw));
            }

            if raw.status == 401 && self.config.auth().is_oauth() && self.policy.can_retry(retries) {
                debug!("access token rejected; refreshing");
                self.refresh_token()?;
                retries += 1;
                continue;
            }

            if RetryPolicy::is_retryable_status(raw.status) && self.policy.can_retry(retries) {
                let delay = self.policy.backoff_delay(retries);
                debug!(status = raw.status, ?delay, "retrying request");
                thread::sleep(delay);
                retries += 1;
                continue;
            }

            return Err(self.status_error(&request, &headers, raw).into());
        }
    }
}

impl HttpResource for HttpClient {
    fn request(&self, request: HttpRequest) -> Result<HttpResponse, SparkError> {
        self.fetch(request)
    }
}

fn snapshot(request: &HttpRequest, headers: &BTreeMap<String, String>) -> RequestSnapshot {
    let headers = headers
        .iter()
        .map(|(k, v)| {
            let sensitive = k.eq_ignore_ascii_case("authorization")
                || k.eq_ignore_ascii_case("x-synthetic-key");
            (k.clone(), if sensitive { mask(v) } else { v.clone() })
        })
        .collect();

    RequestSnapshot {
        url: request.url.clone(),
        method: request.method.to_string(),
        headers,
        body: request.body.clone(),
    }
}

fn decode(raw: RawResponse) -> HttpResponse {
    let is_json = raw
        .headers
        .get("content-type")
        .is_some_and(|ct| ct.contains("application/json"));

    let data = is_json.then(|| {
        serde_json::from_slice::<Value>(&raw.buffer)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&raw.buffer).into_owned()))
    });

    HttpResponse {
        status: raw.status,
        data,
        buffer: raw.buffer,
        headers: raw.headers,
    }
}
