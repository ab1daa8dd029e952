use crate::error::SparkError;
use serde_json::Value;
use std::{collections::BTreeMap, fmt, sync::Arc};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A request against a Spark resource. `body` is sent as JSON, `form` as
/// url-encoded fields; at most one of them is expected.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub headers: BTreeMap<String, String>,
    pub params: Vec<(String, String)>,
    pub body: Option<Value>,
    pub form: Option<Vec<(String, String)>>,
}

impl HttpRequest {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: BTreeMap::new(),
            params: Vec::new(),
            body: None,
            form: None,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::Get, url)
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self::new(Method::Post, url)
    }

    pub fn patch(url: impl Into<String>) -> Self {
        Self::new(Method::Patch, url)
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_param(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.params.push((name.into(), value.to_string()));
        self
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_form(mut self, fields: Vec<(String, String)>) -> Self {
        self.form = Some(fields);
        self
    }
}

/// A successful (2xx) response. `data` holds the decoded JSON body when the
/// server declared one; `buffer` always holds the raw bytes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    pub data: Option<Value>,
    pub buffer: Vec<u8>,
    pub headers: BTreeMap<String, String>,
}

impl HttpResponse {
    pub fn json(status: u16, data: Value) -> Self {
        let buffer = serde_json::to_vec(&data).unwrap_or_default();
        let mut headers = BTreeMap::new();
        headers.insert("content-type".to_string(), "application/json".to_string());
        Self {
            status,
            data: Some(data),
            buffer,
            headers,
        }
    }

    /// Field of a JSON object body, if any.
    pub fn field(&self, key: &str) -> Option<&Value> {
        self.data.as_ref().and_then(|data| data.get(key))
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.buffer).into_owned()
    }
}

/// The single seam through which every Spark resource talks HTTP.
///
/// Implementations fail with [`SparkError::Api`] on any non-2xx status or
/// transport failure, after whatever transparent retries they apply.
pub trait HttpResource: Send + Sync {
    fn request(&self, request: HttpRequest) -> Result<HttpResponse, SparkError>;
}

impl<T: HttpResource + ?Sized> HttpResource for Arc<T> {
    fn request(&self, request: HttpRequest) -> Result<HttpResponse, SparkError> {
        (**self).request(request)
    }
}

impl<T: HttpResource + ?Sized> HttpResource for &T {
    fn request(&self, request: HttpRequest) -> Result<HttpResponse, SparkError> {
        (**self).request(request)
    }
}
