
use serde_json::{Value, json};
use spark_batch::{ChunkSource, GeneratorError, Pipeline};
use spark_config::BaseUrl;
use spark_model::{BatchChunk, ChunkData};
use spark_transport::{
    ApiError, ApiErrorCause, HttpRequest, HttpResource, HttpResponse, Method, RequestSnapshot,
    SparkError,
};
use std::{
    collections::VecDeque,
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
};

fn api_error(status: u16) -> SparkError {
    SparkError::Api(ApiError::new(
        status,
        "failed to fetch",
        ApiErrorCause {
            request: RequestSnapshot::default(),
            response: None,
        },
    ))
}

/// In-memory job: every pushed chunk becomes a result row set available to
/// the next pull.
#[derive(Default)]
pub(crate) struct FakeSpark {
    results: Mutex<VecDeque<Value>>,
    completed: AtomicUsize,
    pushes: AtomicUsize,
    status_calls: AtomicUsize,
    pulls: AtomicUsize,

    /// Number of pushes answered with a 503 before accepting any.
    pub failing_pushes: AtomicUsize,
    /// Number of status calls reporting a full input buffer.
    pub busy_status: AtomicUsize,
    /// Number of status calls answered with a body that is not a status.
    pub garbled_status: AtomicUsize,
    /// Report byte counters as floats and leave the output buffer `null`.
    pub loose_status: AtomicBool,
    /// Answer every push with a 422.
    pub reject_pushes: AtomicBool,
    /// Keep results back so pulls come up empty.
    pub hold_results: AtomicBool,
}

impl FakeSpark {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn pushes(&self) -> usize {
        self.pushes.load(Ordering::SeqCst)
    }

    pub(crate) fn status_calls(&self) -> usize {
        self.status_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn pulls(&self) -> usize {
        self.pulls.load(Ordering::SeqCst)
    }

    fn take(counter: &AtomicUsize) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }

    fn push(&self, request: &HttpRequest) -> Result<HttpResponse, SparkError> {
        self.pushes.fetch_add(1, Ordering::SeqCst);
        if self.reject_pushes.load(Ordering::SeqCst) {
            return Err(api_error(422));
        }
        if Self::take(&self.failing_pushes) {
            return Err(api_error(503));
        }

        let chunks = request
            .body
            .as_ref()
            .and_then(|b| b["chunks"].as_array().cloned())
            .unwrap_or_default();

        let mut submitted = 0;
        let mut results = self.results.lock().unwrap();
        for chunk in chunks {
            let size = chunk["size"].as_u64().unwrap_or_default() as usize;
            let mut outputs = vec![json!(["value"])];
            outputs.extend((0..size).map(|i| json!([i])));
            results.push_back(json!({"id": chunk["id"], "outputs": outputs}));
            submitted += size;
        }
        self.completed.fetch_add(submitted, Ordering::SeqCst);

        Ok(HttpResponse::json(
            200,
            json!({"record_submitted": submitted, "records_available": 0, "records_completed": 0}),
        ))
    }

    fn status(&self) -> HttpResponse {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        if Self::take(&self.garbled_status) {
            return HttpResponse::json(200, json!("busy"));
        }
        let (used, remaining) = if Self::take(&self.busy_status) {
            (90, 10)
        } else {
            (0, 100)
        };
        let mut body = json!({
            "batch_status": "in_progress",
            "records_completed": self.completed.load(Ordering::SeqCst),
            "input_buffer_used_bytes": used,
            "input_buffer_remaining_bytes": remaining,
        });
        if self.loose_status.load(Ordering::SeqCst) {
            body["input_buffer_used_bytes"] = json!(used as f64);
            body["input_buffer_remaining_bytes"] = json!(remaining as f64 + 0.5);
            body["output_buffer_used_bytes"] = Value::Null;
        }
        HttpResponse::json(200, body)
    }

    fn pull(&self, request: &HttpRequest) -> HttpResponse {
        self.pulls.fetch_add(1, Ordering::SeqCst);
        let max = request
            .params
            .iter()
            .find(|(k, _)| k == "max")
            .and_then(|(_, v)| v.parse::<usize>().ok())
            .unwrap_or(1);

        let mut results = self.results.lock().unwrap();
        let data: Vec<Value> = if self.hold_results.load(Ordering::SeqCst) {
            Vec::new()
        } else {
            let n = max.min(results.len());
            results.drain(..n).collect()
        };

        HttpResponse::json(
            200,
            json!({"data": data, "status": {"chunks_available": results.len()}}),
        )
    }
}

impl HttpResource for FakeSpark {
    fn request(&self, request: HttpRequest) -> Result<HttpResponse, SparkError> {
        match request.method {
            Method::Post if request.url.ends_with("/chunks") => self.push(&request),
            Method::Get if request.url.ends_with("/status") => Ok(self.status()),
            Method::Get if request.url.ends_with("/chunkresults") => Ok(self.pull(&request)),
            _ => Err(api_error(404)),
        }
    }
}

pub(crate) fn pipeline(http: Arc<FakeSpark>) -> Pipeline {
    let base_url = BaseUrl::parse("http://localhost:8080/my-tenant", None).unwrap();
    Pipeline::new("b1", &base_url, http).unwrap()
}

/// Yields prepared blocks, then reports done with the last one.
pub(crate) struct VecSource {
    blocks: VecDeque<Vec<BatchChunk>>,
}

impl VecSource {
    /// `blocks` blocks of `chunks` chunks, each chunk holding two records.
    pub(crate) fn new(blocks: usize, chunks: usize) -> Self {
        let blocks = (0..blocks)
            .map(|b| {
                (0..chunks)
                    .map(|c| {
                        BatchChunk::of(ChunkData::new(vec![
                            vec![json!("block"), json!("chunk")],
                            vec![json!(b), json!(c)],
                            vec![json!(b), json!(c)],
                        ]))
                    })
                    .collect::<Vec<_>>()
            })
            .collect();
        Self { blocks }
    }
}

impl ChunkSource for VecSource {
    fn next_block(&mut self) -> Result<(Vec<BatchChunk>, bool), GeneratorError> {
        let block = self.blocks.pop_front().unwrap_or_default();
        Ok((block, self.blocks.is_empty()))
    }
}

pub(crate) struct BrokenSource;

impl ChunkSource for BrokenSource {
    fn next_block(&mut self) -> Result<(Vec<BatchChunk>, bool), GeneratorError> {
        Err(GeneratorError::InvalidConfig("unreadable input".to_string()))
    }
}
