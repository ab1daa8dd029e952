use crate::API_VERSION;
use serde::Serialize;
use serde_json::{Value, json};
use spark_config::BaseUrl;
use spark_model::{
    BatchChunk, BatchId, ChunkData, DuplicatePolicy, PipelineState, PushResponse, Row,
    new_chunk_id,
};
use spark_transport::{HttpRequest, HttpResource, HttpResponse, SparkError, Uri};
use std::{
    collections::{HashMap, HashSet},
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};
use tracing::{error, info, warn};

/// What to push. When several inputs are given, `raw` wins over `chunks`,
/// which win over `data`, which wins over `inputs`.
#[derive(Debug, Clone, Default)]
pub struct PushInput {
    pub chunks: Option<Vec<BatchChunk>>,
    pub data: Option<ChunkData>,
    pub inputs: Option<Vec<Row>>,
    pub raw: Option<String>,
}

impl PushInput {
    pub fn chunks(chunks: Vec<BatchChunk>) -> Self {
        Self {
            chunks: Some(chunks),
            ..Self::default()
        }
    }

    pub fn data(data: ChunkData) -> Self {
        Self {
            data: Some(data),
            ..Self::default()
        }
    }

    pub fn inputs(inputs: Vec<Row>) -> Self {
        Self {
            inputs: Some(inputs),
            ..Self::default()
        }
    }

    pub fn raw(raw: impl Into<String>) -> Self {
        Self {
            raw: Some(raw.into()),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PipelineStats {
    pub chunks: usize,
    pub records: usize,
}

#[derive(Debug, Default)]
struct Ledger {
    state: PipelineState,
    chunks: HashMap<String, usize>,
    in_flight: HashSet<String>,
    disposing: bool,
}

/// Outcome of resolving duplicate ids for one push.
struct Assessed {
    chunks: Vec<BatchChunk>,
    evicted: Vec<String>,
}

/// Client-side handle on one remote batch job.
///
/// Tracks the job's lifecycle and a ledger of every chunk id this handle has
/// pushed. The ledger and state live behind a single lock that is never held
/// across a network call, so one pipeline can be shared by many uploaders.
pub struct Pipeline {
    batch_id: BatchId,
    base: String,
    http: Arc<dyn HttpResource>,
    ledger: Mutex<Ledger>,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("batch_id", &self.batch_id)
            .field("state", &self.state())
            .field("stats", &self.stats())
            .finish()
    }
}

impl Pipeline {
    pub fn new(
        batch_id: impl Into<BatchId>,
        base_url: &BaseUrl,
        http: Arc<dyn HttpResource>,
    ) -> Result<Self, SparkError> {
        let batch_id = batch_id.into();
        if batch_id.is_blank() {
            let err = SparkError::sdk("batch pipeline id is required to proceed");
            error!("{err}");
            return Err(err);
        }

        Ok(Self {
            batch_id,
            base: base_url.full(),
            http,
            ledger: Mutex::new(Ledger::default()),
        })
    }

    pub fn batch_id(&self) -> &BatchId {
        &self.batch_id
    }

    pub fn state(&self) -> PipelineState {
        self.lock().state
    }

    pub fn stats(&self) -> PipelineStats {
        let ledger = self.lock();
        PipelineStats {
            chunks: ledger.chunks.len(),
            records: ledger.chunks.values().sum(),
        }
    }

    /// Local view only; use [`Pipeline::get_status`] for the server's state.
    pub fn is_disposed(&self) -> bool {
        self.lock().state.is_terminal()
    }

    pub fn get_info(&self) -> Result<HttpResponse, SparkError> {
        let url = self.endpoint("")?;
        self.http.request(HttpRequest::get(url))
    }

    pub fn get_status(&self) -> Result<HttpResponse, SparkError> {
        let url = self.endpoint("status")?;
        self.http.request(HttpRequest::get(url))
    }

    /// Submits chunks to the job.
    ///
    /// Ids already pushed through this handle, in flight from a concurrent
    /// push, or repeated within `input` are resolved with `policy`. The ledger
    /// is only updated once the server accepts the push.
    pub fn push(
        &self,
        input: PushInput,
        policy: DuplicatePolicy,
    ) -> Result<HttpResponse, SparkError> {
        self.assert_state(&[PipelineState::Closed, PipelineState::Cancelled])?;

        let chunks = self.build_chunks(input).inspect_err(|e| error!("{e}"))?;
        let assessed = self.assess(chunks, policy)?;

        let body = json!({
            "chunks": assessed.chunks.iter().map(BatchChunk::to_value).collect::<Vec<Value>>(),
        });
        let url = self.endpoint("chunks")?;
        let result = self.http.request(HttpRequest::post(url).with_body(body));

        let mut ledger = self.lock();
        for chunk in &assessed.chunks {
            ledger.in_flight.remove(&chunk.id);
        }

        let response = result?;
        for old in &assessed.evicted {
            ledger.chunks.remove(old);
        }
        for chunk in &assessed.chunks {
            ledger.chunks.insert(chunk.id.clone(), chunk.size);
        }
        drop(ledger);

        let submitted = response
            .data
            .as_ref()
            .and_then(PushResponse::from_value)
            .map(|r| r.record_submitted)
            .unwrap_or_default();
        info!(batch_id = %self.batch_id, chunks = assessed.chunks.len(), "pushed {submitted} records to batch pipeline <{}>", self.batch_id);

        Ok(response)
    }

    /// Fetches up to `max_chunks` completed chunk results. The ledger is left
    /// untouched.
    pub fn pull(&self, max_chunks: usize) -> Result<HttpResponse, SparkError> {
        self.assert_state(&[PipelineState::Cancelled])?;

        let url = self.endpoint("chunkresults")?;
        let response = self
            .http
            .request(HttpRequest::get(url).with_param("max", max_chunks.max(1)))?;

        let available = response
            .field("status")
            .and_then(|s| s.get("records_available"))
            .and_then(Value::as_u64)
            .unwrap_or_default();
        info!(batch_id = %self.batch_id, "{available} available records from batch pipeline <{}>", self.batch_id);

        Ok(response)
    }

    /// Moves the job to a terminal state.
    pub fn dispose(&self, state: PipelineState) -> Result<HttpResponse, SparkError> {
        if !state.is_terminal() {
            return Err(SparkError::sdk(format!(
                "batch pipeline can only be disposed as closed or cancelled, not {state}"
            )));
        }

        {
            let mut ledger = self.lock();
            Self::check_state(&self.batch_id, &ledger, &[PipelineState::Closed, PipelineState::Cancelled])?;
            if ledger.disposing {
                let err = SparkError::sdk(format!(
                    "batch pipeline <{}> is already being disposed",
                    self.batch_id
                ));
                error!("{err}");
                return Err(err);
            }
            ledger.disposing = true;
        }

        let result = self.endpoint("").and_then(|url| {
            self.http
                .request(HttpRequest::patch(url).with_body(json!({ "batch_status": state.as_str() })))
        });

        let mut ledger = self.lock();
        ledger.disposing = false;
        let response = result?;
        ledger.state = state;
        drop(ledger);

        info!(batch_id = %self.batch_id, "batch pipeline <{}> has been {state}", self.batch_id);
        Ok(response)
    }

    pub fn close(&self) -> Result<HttpResponse, SparkError> {
        self.dispose(PipelineState::Closed)
    }

    pub fn cancel(&self) -> Result<HttpResponse, SparkError> {
        self.dispose(PipelineState::Cancelled)
    }

    fn lock(&self) -> MutexGuard<'_, Ledger> {
        self.ledger.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn endpoint(&self, suffix: &str) -> Result<String, SparkError> {
        let endpoint = if suffix.is_empty() {
            format!("batch/{}", self.batch_id)
        } else {
            format!("batch/{}/{suffix}", self.batch_id)
        };
        Ok(Uri::of(None, &self.base, API_VERSION, &endpoint)?.into())
    }

    fn assert_state(&self, disallowed: &[PipelineState]) -> Result<(), SparkError> {
        let ledger = self.lock();
        Self::check_state(&self.batch_id, &ledger, disallowed)
    }

    fn check_state(
        batch_id: &BatchId,
        ledger: &Ledger,
        disallowed: &[PipelineState],
    ) -> Result<(), SparkError> {
        if disallowed.contains(&ledger.state) {
            let err = SparkError::sdk(format!(
                "batch pipeline <{batch_id}> is already {}",
                ledger.state
            ));
            error!("{err}");
            return Err(err);
        }
        Ok(())
    }

    fn build_chunks(&self, input: PushInput) -> Result<Vec<BatchChunk>, SparkError> {
        let PushInput {
            chunks,
            data,
            inputs,
            raw,
        } = input;

        if let Some(raw) = raw.filter(|r| !r.trim().is_empty()) {
            let parsed = BatchChunk::from_str(&raw).map_err(|e| {
                SparkError::sdk_with("failed to build push data for batch pipeline", e)
            })?;
            if parsed.is_empty() {
                return Err(self.wrong_params());
            }
            return Ok(parsed);
        }

        if let Some(chunks) = chunks.filter(|c| !c.is_empty()) {
            return Ok(chunks);
        }
        if let Some(data) = data.filter(|d| !d.is_empty()) {
            return Ok(vec![BatchChunk::of(data)]);
        }
        if let Some(inputs) = inputs.filter(|i| !i.is_empty()) {
            return Ok(vec![BatchChunk::of(ChunkData::new(inputs))]);
        }

        Err(self.wrong_params())
    }

    fn wrong_params(&self) -> SparkError {
        SparkError::sdk(format!(
            "wrong data params were provided for this pipeline <{}>. Expecting either \
             \"raw\" (serialized chunks), \"chunks\" (list of BatchChunk), \"data\" (ChunkData) \
             or \"inputs\" (list of rows)",
            self.batch_id
        ))
    }

    /// Resolves duplicate ids and reserves the surviving ones.
    fn assess(
        &self,
        chunks: Vec<BatchChunk>,
        policy: DuplicatePolicy,
    ) -> Result<Assessed, SparkError> {
        let mut ledger = self.lock();
        Self::check_state(&self.batch_id, &ledger, &[PipelineState::Closed, PipelineState::Cancelled])?;

        let mut accepted = Vec::with_capacity(chunks.len());
        let mut evicted = Vec::new();
        let mut seen = HashSet::new();

        for mut chunk in chunks {
            let known = ledger.chunks.contains_key(&chunk.id)
                || ledger.in_flight.contains(&chunk.id)
                || seen.contains(&chunk.id);

            if known {
                match policy {
                    DuplicatePolicy::Ignore => {
                        warn!(
                            "chunk id <{}> appears to be duplicated for this pipeline <{}> and may \
                             cause unexpected behavior. You should consider using a different id.",
                            chunk.id, self.batch_id
                        );
                        continue;
                    }
                    DuplicatePolicy::Throw => {
                        let err = SparkError::sdk(format!(
                            "chunk id <{}> is duplicated for batch pipeline <{}>",
                            chunk.id, self.batch_id
                        ));
                        error!("{err}");
                        return Err(err);
                    }
                    DuplicatePolicy::Replace => {
                        let old = std::mem::replace(&mut chunk.id, new_chunk_id());
                        info!(
                            "chunk id <{old}> is duplicated for this pipeline <{}> and has been \
                             replaced with <{}>",
                            self.batch_id, chunk.id
                        );
                        if ledger.chunks.contains_key(&old) {
                            evicted.push(old);
                        }
                    }
                }
            }

            seen.insert(chunk.id.clone());
            accepted.push(chunk);
        }

        if accepted.is_empty() {
            let err = SparkError::sdk(format!(
                "no chunks left to push to batch pipeline <{}> after resolving duplicates",
                self.batch_id
            ));
            warn!("{err}");
            return Err(err);
        }

        ledger.in_flight.extend(seen);
        Ok(Assessed {
            chunks: accepted,
            evicted,
        })
    }
}
