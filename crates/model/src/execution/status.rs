use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Progress snapshot reported by the platform for a batch job.
///
/// The same shape is echoed back by a chunk push. Counters the server omits,
/// sends as `null` or sends as non-integral numbers are read leniently (see
/// [`lenient_count`]); anything not modelled here is kept in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch_status: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pipeline_status: Option<String>,

    #[serde(default, deserialize_with = "lenient_count")]
    pub record_submitted: u64,

    #[serde(default, deserialize_with = "lenient_count")]
    pub records_available: u64,

    #[serde(default, deserialize_with = "lenient_count")]
    pub records_completed: u64,

    #[serde(default, deserialize_with = "lenient_count")]
    pub chunks_available: u64,

    #[serde(default, deserialize_with = "lenient_count")]
    pub input_buffer_used_bytes: u64,

    #[serde(default, deserialize_with = "lenient_count")]
    pub input_buffer_remaining_bytes: u64,

    #[serde(default, deserialize_with = "lenient_count")]
    pub output_buffer_used_bytes: u64,

    #[serde(default, deserialize_with = "lenient_count")]
    pub output_buffer_remaining_bytes: u64,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

pub type PushResponse = BatchStatus;

/// Reads a byte or record counter. `null` and unparseable values count as
/// zero, floats and numeric strings are truncated, negatives clamp to zero.
fn lenient_count<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    let count = match value {
        Some(Value::Number(n)) => n.as_u64().or_else(|| n.as_f64().map(float_count)),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok().map(float_count),
        _ => None,
    };
    Ok(count.unwrap_or_default())
}

fn float_count(f: f64) -> u64 {
    if f.is_finite() && f > 0.0 { f as u64 } else { 0 }
}

impl BatchStatus {
    pub fn from_value(value: &Value) -> Option<Self> {
        serde_json::from_value(value.clone()).ok()
    }

    /// Share of the server-side input buffer currently in use, or `None` when
    /// nothing is buffered.
    pub fn input_buffer_ratio(&self) -> Option<f64> {
        if self.input_buffer_used_bytes == 0 {
            return None;
        }
        let total = self.input_buffer_used_bytes + self.input_buffer_remaining_bytes;
        Some(self.input_buffer_used_bytes as f64 / total as f64)
    }

    pub fn is_over(&self, target_ratio: f64) -> bool {
        self.input_buffer_ratio()
            .is_some_and(|ratio| ratio > target_ratio)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_partial_payload() {
        let status = BatchStatus::from_value(&json!({
            "batch_status": "in_progress",
            "record_submitted": 3,
            "records_available": 0,
            "compute_time_ms": 12
        }))
        .unwrap();

        assert_eq!(status.batch_status.as_deref(), Some("in_progress"));
        assert_eq!(status.record_submitted, 3);
        assert_eq!(status.records_completed, 0);
        assert_eq!(status.extra.get("compute_time_ms"), Some(&json!(12)));
    }

    #[test]
    fn buffer_ratio() {
        let mut status = BatchStatus::default();
        assert_eq!(status.input_buffer_ratio(), None);
        assert!(!status.is_over(0.0));

        status.input_buffer_used_bytes = 60;
        status.input_buffer_remaining_bytes = 40;
        assert_eq!(status.input_buffer_ratio(), Some(0.6));
        assert!(status.is_over(0.5));
        assert!(!status.is_over(0.6));
    }

    #[test]
    fn null_and_float_counters_keep_the_buffer_ratio() {
        let status = BatchStatus::from_value(&json!({
            "batch_status": null,
            "input_buffer_used_bytes": 90.0,
            "input_buffer_remaining_bytes": "10",
            "output_buffer_used_bytes": null,
            "records_completed": -3
        }))
        .unwrap();

        assert_eq!(status.input_buffer_used_bytes, 90);
        assert_eq!(status.input_buffer_remaining_bytes, 10);
        assert_eq!(status.output_buffer_used_bytes, 0);
        assert_eq!(status.records_completed, 0);
        assert!(status.is_over(0.5));
    }
}
