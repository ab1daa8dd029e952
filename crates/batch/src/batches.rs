use crate::{API_VERSION, pipeline::Pipeline};
use serde_json::{Map, Value, json};
use spark_config::{BaseUrl, SDK_NAME};
use spark_model::BatchId;
use spark_transport::{HttpRequest, HttpResource, HttpResponse, SparkError, Uri, UriParams};
use std::sync::Arc;
use tracing::info;

pub const DEFAULT_CALL_PURPOSE: &str = "Async Batch Execution";

/// Options for a new batch job. Unset fields are left out of the request so
/// the platform applies its own defaults.
#[derive(Debug, Clone, Default)]
pub struct CreateParams {
    pub active_since: Option<String>,
    pub source_system: Option<String>,
    pub correlation_id: Option<String>,
    pub call_purpose: Option<String>,
    pub subservices: Vec<String>,
    pub selected_outputs: Vec<String>,
    pub unique_record_key: Vec<String>,

    pub min_runners: Option<u32>,
    pub max_runners: Option<u32>,
    pub chunks_per_vm: Option<u32>,
    pub runners_per_vm: Option<u32>,
    pub max_input_size: Option<f64>,
    pub max_output_size: Option<f64>,
    /// Share of records that must succeed, in `[0, 1]`.
    pub accuracy: Option<f64>,
}

impl CreateParams {
    pub fn with_active_since(mut self, timestamp: impl Into<String>) -> Self {
        self.active_since = Some(timestamp.into());
        self
    }

    pub fn with_source_system(mut self, source: impl Into<String>) -> Self {
        self.source_system = Some(source.into());
        self
    }

    pub fn with_correlation_id(mut self, id: impl Into<String>) -> Self {
        self.correlation_id = Some(id.into());
        self
    }

    pub fn with_call_purpose(mut self, purpose: impl Into<String>) -> Self {
        self.call_purpose = Some(purpose.into());
        self
    }

    pub fn with_subservices<I: IntoIterator<Item = S>, S: Into<String>>(mut self, names: I) -> Self {
        self.subservices = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_selected_outputs<I: IntoIterator<Item = S>, S: Into<String>>(
        mut self,
        names: I,
    ) -> Self {
        self.selected_outputs = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_unique_record_key<I: IntoIterator<Item = S>, S: Into<String>>(
        mut self,
        keys: I,
    ) -> Self {
        self.unique_record_key = keys.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_runners(mut self, min: Option<u32>, max: Option<u32>) -> Self {
        self.min_runners = min;
        self.max_runners = max;
        self
    }

    pub fn with_chunks_per_vm(mut self, chunks: u32) -> Self {
        self.chunks_per_vm = Some(chunks);
        self
    }

    pub fn with_runners_per_vm(mut self, runners: u32) -> Self {
        self.runners_per_vm = Some(runners);
        self
    }

    pub fn with_buffer_sizes(mut self, max_input: Option<f64>, max_output: Option<f64>) -> Self {
        self.max_input_size = max_input;
        self.max_output_size = max_output;
        self
    }

    pub fn with_accuracy(mut self, accuracy: f64) -> Self {
        self.accuracy = Some(accuracy);
        self
    }

    /// `ceil((1 - min(accuracy, 1)) * 100)`, with a missing accuracy meaning 1.
    pub fn acceptable_error_percentage(&self) -> u32 {
        let accuracy = self.accuracy.unwrap_or(1.0).clamp(0.0, 1.0);
        ((1.0 - accuracy) * 100.0).ceil() as u32
    }

    /// Request body for the service identified by `uri`.
    pub fn to_body(&self, uri: &UriParams) -> Value {
        let service_uri = UriParams {
            folder: uri.folder.clone(),
            service: uri.service.clone(),
            version: uri.version.clone(),
            ..UriParams::default()
        }
        .service_uri();
        let service = uri
            .service_id
            .clone()
            .or_else(|| (!service_uri.is_empty()).then_some(service_uri));

        let join = |values: &[String]| (!values.is_empty()).then(|| values.join(","));

        let fields = [
            ("service", service.map(Value::from)),
            ("version_id", uri.version_id.clone().map(Value::from)),
            ("version_by_timestamp", self.active_since.clone().map(Value::from)),
            ("subservice", join(&self.subservices).map(Value::from)),
            ("output", join(&self.selected_outputs).map(Value::from)),
            (
                "call_purpose",
                Some(json!(self.call_purpose.as_deref().unwrap_or(DEFAULT_CALL_PURPOSE))),
            ),
            (
                "source_system",
                Some(json!(self.source_system.as_deref().unwrap_or(SDK_NAME))),
            ),
            ("correlation_id", self.correlation_id.clone().map(Value::from)),
            ("unique_record_key", join(&self.unique_record_key).map(Value::from)),
            ("initial_workers", self.min_runners.map(Value::from)),
            ("max_workers", self.max_runners.map(Value::from)),
            ("chunks_per_request", self.chunks_per_vm.map(Value::from)),
            ("runner_thread_count", self.runners_per_vm.map(Value::from)),
            ("max_input_size", self.max_input_size.map(Value::from)),
            ("max_output_size", self.max_output_size.map(Value::from)),
            (
                "acceptable_error_percentage",
                Some(json!(self.acceptable_error_percentage())),
            ),
        ];

        let body: Map<String, Value> = fields
            .into_iter()
            .filter_map(|(key, value)| value.map(|v| (key.to_string(), v)))
            .collect();
        Value::Object(body)
    }
}

/// Entry point for batch jobs of one tenant.
#[derive(Clone)]
pub struct Batches {
    base_url: BaseUrl,
    http: Arc<dyn HttpResource>,
}

impl Batches {
    pub fn new(base_url: BaseUrl, http: Arc<dyn HttpResource>) -> Self {
        Self { base_url, http }
    }

    /// Batch pipeline status across the whole tenant.
    pub fn describe(&self) -> Result<HttpResponse, SparkError> {
        let url = Uri::of(None, &self.base_url.full(), API_VERSION, "batch/status")?;
        self.http.request(HttpRequest::get(url))
    }

    /// Creates a batch job for the service at `uri`
    /// (`folder/service[version]`, `service/<id>` or `version/<id>`).
    pub fn create(&self, uri: &str, params: &CreateParams) -> Result<HttpResponse, SparkError> {
        let uri = UriParams::validate(uri)?;
        self.create_with(&uri, params)
    }

    pub fn create_with(
        &self,
        uri: &UriParams,
        params: &CreateParams,
    ) -> Result<HttpResponse, SparkError> {
        let uri = uri.clone().validated()?;
        let url = Uri::of(None, &self.base_url.full(), API_VERSION, "batch")?;

        let response = self
            .http
            .request(HttpRequest::post(url).with_body(params.to_body(&uri)))?;
        if let Some(id) = response.field("id").and_then(Value::as_str) {
            info!(batch_id = id, service = %uri.service_uri(), "created batch pipeline");
        }
        Ok(response)
    }

    /// Handle on an existing job. No request is made.
    pub fn of(&self, batch_id: impl Into<BatchId>) -> Result<Pipeline, SparkError> {
        Pipeline::new(batch_id, &self.base_url, Arc::clone(&self.http))
    }
}
