
use serde_json::Value;
use spark_config::BaseUrl;
use spark_transport::{ApiError, HttpRequest, HttpResource, HttpResponse, RequestSnapshot, SparkError};
use std::sync::{Arc, Mutex};

type Handler = dyn Fn(&HttpRequest) -> Result<HttpResponse, SparkError> + Send + Sync;

/// Records every request and answers through a closure.
pub(crate) struct MockHttp {
    calls: Mutex<Vec<HttpRequest>>,
    handler: Box<Handler>,
}

impl MockHttp {
    pub(crate) fn new<F>(handler: F) -> Arc<Self>
    where
        F: Fn(&HttpRequest) -> Result<HttpResponse, SparkError> + Send + Sync + 'static,
    {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            handler: Box::new(handler),
        })
    }

    /// Answers every request with the same JSON body.
    pub(crate) fn replying(body: Value) -> Arc<Self> {
        Self::new(move |_| Ok(HttpResponse::json(200, body.clone())))
    }

    pub(crate) fn calls(&self) -> Vec<HttpRequest> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn last(&self) -> HttpRequest {
        self.calls().pop().expect("no request was sent")
    }
}

impl HttpResource for MockHttp {
    fn request(&self, request: HttpRequest) -> Result<HttpResponse, SparkError> {
        self.calls.lock().unwrap().push(request.clone());
        (self.handler)(&request)
    }
}

pub(crate) fn base_url() -> BaseUrl {
    BaseUrl::parse("http://localhost:8080/my-tenant", None).unwrap()
}

pub(crate) fn api_error(status: u16) -> SparkError {
    SparkError::Api(ApiError::new(
        status,
        "failed to fetch",
        spark_transport::ApiErrorCause {
            request: RequestSnapshot::default(),
            response: None,
        },
    ))
}
