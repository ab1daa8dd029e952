use serde_json::{Value, json};
use spark_transport::{
    ApiError, ApiErrorCause, HttpRequest, HttpResource, HttpResponse, Method, RequestSnapshot,
    SparkError,
};
use std::{
    collections::VecDeque,
    sync::{Mutex, MutexGuard},
};
use tracing::debug;

pub const BATCH_ID: &str = "batch_uuid";
const TENANT_PATH: &str = "/my-tenant/api/v4/batch";

#[derive(Debug, Default)]
struct MockState {
    requests: Vec<HttpRequest>,
    created: Vec<Value>,
    pending: VecDeque<Value>,
    records_submitted: u64,
    records_completed: u64,
    batch_status: Option<String>,
    /// Pushes left to answer with a 503.
    failing_pushes: usize,
    /// Status calls left reporting a full input buffer.
    busy_status: usize,
}

/// In-process stand-in for the Spark batch API of tenant `my-tenant`.
///
/// Every pushed chunk is "computed" immediately: its result echoes the input
/// rows and waits in a queue until pulled.
#[derive(Debug, Default)]
pub struct MockSpark {
    state: Mutex<MockState>,
}

impl MockSpark {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_pushes(self, count: usize) -> Self {
        self.lock().failing_pushes = count;
        self
    }

    pub fn busy_status(self, count: usize) -> Self {
        self.lock().busy_status = count;
        self
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.lock().requests.clone()
    }

    /// Requests whose path ends with `suffix`.
    pub fn requests_to(&self, method: Method, suffix: &str) -> Vec<HttpRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.method == method && r.url.ends_with(suffix))
            .collect()
    }

    /// Bodies received by the create endpoint.
    pub fn created(&self) -> Vec<Value> {
        self.lock().created.clone()
    }

    pub fn batch_status(&self) -> Option<String> {
        self.lock().batch_status.clone()
    }

    pub fn records_submitted(&self) -> u64 {
        self.lock().records_submitted
    }

    fn not_found(request: &HttpRequest) -> SparkError {
        SparkError::Api(ApiError::new(
            404,
            "Resource not defined yet",
            ApiErrorCause {
                request: RequestSnapshot {
                    method: request.method.to_string(),
                    url: request.url.clone(),
                    ..RequestSnapshot::default()
                },
                response: None,
            },
        ))
    }

    fn unavailable() -> SparkError {
        SparkError::Api(ApiError::new(
            503,
            "service unavailable",
            ApiErrorCause {
                request: RequestSnapshot::default(),
                response: None,
            },
        ))
    }

    fn create(state: &mut MockState, request: &HttpRequest) -> HttpResponse {
        state.created.push(request.body.clone().unwrap_or(Value::Null));
        state.batch_status = Some("created".to_string());
        HttpResponse::json(200, json!({"object": "batch", "id": BATCH_ID, "data": {}}))
    }

    fn push(state: &mut MockState, request: &HttpRequest) -> Result<HttpResponse, SparkError> {
        if state.failing_pushes > 0 {
            state.failing_pushes -= 1;
            return Err(Self::unavailable());
        }

        let chunks = request
            .body
            .as_ref()
            .and_then(|b| b.get("chunks"))
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        let mut submitted = 0;
        for chunk in &chunks {
            let size = chunk["size"].as_u64().unwrap_or_default();
            submitted += size;
            state.pending.push_back(json!({
                "id": chunk["id"],
                "outputs": chunk["data"]["inputs"],
            }));
        }
        state.records_submitted += submitted;
        state.records_completed += submitted;
        state.batch_status = Some("in_progress".to_string());
        debug!(chunks = chunks.len(), submitted, "mock accepted chunks");

        Ok(HttpResponse::json(
            200,
            json!({
                "batch_status": "in_progress",
                "record_submitted": submitted,
                "records_available": state.pending.len(),
            }),
        ))
    }

    fn pull(state: &mut MockState, request: &HttpRequest) -> HttpResponse {
        let max = request
            .params
            .iter()
            .find(|(name, _)| name == "max")
            .and_then(|(_, value)| value.parse::<usize>().ok())
            .unwrap_or(1);

        let n = max.min(state.pending.len());
        let data: Vec<Value> = state.pending.drain(..n).collect();
        HttpResponse::json(
            200,
            json!({
                "data": data,
                "status": {
                    "records_available": 0,
                    "chunks_available": state.pending.len(),
                },
            }),
        )
    }

    fn status(state: &mut MockState) -> HttpResponse {
        let (used, remaining) = if state.busy_status > 0 {
            state.busy_status -= 1;
            (950, 50)
        } else {
            (0, 1000)
        };
        HttpResponse::json(
            200,
            json!({
                "batch_status": state.batch_status,
                "pipeline_status": "idle",
                "record_submitted": state.records_submitted,
                "records_available": 0,
                "records_completed": state.records_completed,
                "chunks_available": state.pending.len(),
                "input_buffer_used_bytes": used,
                "input_buffer_remaining_bytes": remaining,
            }),
        )
    }

    fn dispose(state: &mut MockState, request: &HttpRequest) -> HttpResponse {
        state.batch_status = request
            .body
            .as_ref()
            .and_then(|b| b.get("batch_status"))
            .and_then(Value::as_str)
            .map(str::to_string);
        HttpResponse::json(200, json!({"object": "batch", "id": BATCH_ID, "meta": {}}))
    }
}

impl HttpResource for MockSpark {
    fn request(&self, request: HttpRequest) -> Result<HttpResponse, SparkError> {
        let mut state = self.lock();
        state.requests.push(request.clone());

        let path = request
            .url
            .split_once("://")
            .and_then(|(_, rest)| rest.find('/').map(|i| &rest[i..]))
            .unwrap_or_default();
        let Some(route) = path.strip_prefix(TENANT_PATH) else {
            return Err(Self::not_found(&request));
        };

        let batch = format!("/{BATCH_ID}");
        match (request.method, route) {
            (Method::Post, "") => Ok(Self::create(&mut state, &request)),
            (Method::Get, "/status") => Ok(HttpResponse::json(
                200,
                json!({"object": "list", "data": [{"id": BATCH_ID, "batch_status": state.batch_status}]}),
            )),
            (Method::Post, r) if r == format!("{batch}/chunks") => Self::push(&mut state, &request),
            (Method::Get, r) if r == format!("{batch}/chunkresults") => {
                Ok(Self::pull(&mut state, &request))
            }
            (Method::Get, r) if r == format!("{batch}/status") => Ok(Self::status(&mut state)),
            (Method::Get, r) if r == batch => Ok(HttpResponse::json(
                200,
                json!({"object": "batch", "id": BATCH_ID, "batch_status": state.batch_status}),
            )),
            (Method::Patch, r) if r == batch => Ok(Self::dispose(&mut state, &request)),
            _ => Err(Self::not_found(&request)),
        }
    }
}
