use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Output of one processed chunk, as returned by the chunk results endpoint.
///
/// `outputs` conventionally starts with a header row followed by one row per
/// record, though the platform may also return keyed objects.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChunkResult {
    #[serde(default)]
    pub outputs: Vec<Value>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ChunkResult {
    pub fn new(outputs: Vec<Value>) -> Self {
        Self {
            outputs,
            extra: Map::new(),
        }
    }

    pub fn id(&self) -> Option<&str> {
        self.extra.get("id").and_then(Value::as_str)
    }

    pub fn len(&self) -> usize {
        self.outputs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outputs.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PullStatus {
    #[serde(default)]
    pub records_available: u64,

    #[serde(default)]
    pub chunks_available: u64,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Payload of a chunk results request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PullResponse {
    #[serde(default)]
    pub data: Vec<ChunkResult>,

    #[serde(default)]
    pub status: PullStatus,
}

impl PullResponse {
    pub fn from_value(value: &Value) -> Option<Self> {
        serde_json::from_value(value.clone()).ok()
    }

    /// Number of output rows across every returned chunk.
    pub fn total_outputs(&self) -> usize {
        self.data.iter().map(ChunkResult::len).sum()
    }
}
