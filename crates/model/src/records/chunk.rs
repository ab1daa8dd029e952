use crate::{core::identifiers::new_chunk_id, error::ModelError};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A single row of chunk inputs or outputs.
pub type Row = Vec<Value>;

/// One unit of work submitted to a batch job: the input rows (row zero holds
/// the column headers), optional calculation parameters applied to every row,
/// and optional execution directives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkData {
    pub inputs: Vec<Row>,

    #[serde(default)]
    pub parameters: Map<String, Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<Map<String, Value>>,
}

impl ChunkData {
    pub fn new(inputs: Vec<Row>) -> Self {
        Self {
            inputs,
            parameters: Map::new(),
            summary: None,
        }
    }

    pub fn with_parameters(mut self, parameters: Map<String, Value>) -> Self {
        self.parameters = parameters;
        self
    }

    pub fn with_summary(mut self, summary: Map<String, Value>) -> Self {
        self.summary = Some(summary);
        self
    }

    /// Number of data rows, i.e. every row after the header row.
    pub fn record_count(&self) -> usize {
        self.inputs.len().saturating_sub(1)
    }

    pub fn is_empty(&self) -> bool {
        self.inputs.is_empty()
    }
}

/// A [`ChunkData`] wrapped with the identity and record count used on the wire.
///
/// `size` counts data rows only; the header row at index zero is never counted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchChunk {
    pub id: String,
    pub data: ChunkData,
    pub size: usize,
}

#[derive(Deserialize)]
struct RawChunk {
    #[serde(default)]
    id: Option<String>,
    data: ChunkData,
    #[serde(default)]
    size: Option<usize>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawChunks {
    Wrapped { chunks: Vec<RawChunk> },
    Bare(Vec<RawChunk>),
}

impl From<RawChunk> for BatchChunk {
    fn from(raw: RawChunk) -> Self {
        let size = raw.size.unwrap_or_else(|| raw.data.record_count());
        BatchChunk::with_size(raw.id.unwrap_or_default(), raw.data, size)
    }
}

impl BatchChunk {
    /// Wraps `data` under `id`, deriving the size from the input rows.
    /// A blank id is replaced by a freshly generated one.
    pub fn new(id: impl Into<String>, data: ChunkData) -> Self {
        let size = data.record_count();
        Self::with_size(id, data, size)
    }

    pub fn with_size(id: impl Into<String>, data: ChunkData, size: usize) -> Self {
        let id = id.into();
        let id = if id.trim().is_empty() {
            new_chunk_id()
        } else {
            id
        };
        Self { id, data, size }
    }

    /// Wraps `data` under a freshly generated id.
    pub fn of(data: ChunkData) -> Self {
        Self::new(new_chunk_id(), data)
    }

    /// Parses serialized chunks, either `{"chunks": [...]}` or a bare array.
    pub fn from_str(raw: impl AsRef<[u8]>) -> Result<Vec<BatchChunk>, ModelError> {
        let parsed: RawChunks = serde_json::from_slice(raw.as_ref())
            .map_err(|e| ModelError::InvalidChunks(e.to_string()))?;

        let chunks = match parsed {
            RawChunks::Wrapped { chunks } => chunks,
            RawChunks::Bare(chunks) => chunks,
        };

        Ok(chunks.into_iter().map(BatchChunk::from).collect())
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// Splits a dataset whose first row holds the headers into chunks of at most
/// `chunk_size` records each. Every chunk repeats the header row.
pub fn create_chunks(dataset: &[Row], chunk_size: usize) -> Vec<BatchChunk> {
    let chunk_size = chunk_size.max(1);
    let Some((headers, records)) = dataset.split_first() else {
        return Vec::new();
    };

    records
        .chunks(chunk_size)
        .map(|window| {
            let mut inputs = Vec::with_capacity(window.len() + 1);
            inputs.push(headers.clone());
            inputs.extend_from_slice(window);
            BatchChunk::of(ChunkData::new(inputs))
        })
        .collect()
}
