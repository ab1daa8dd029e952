use crate::error::SparkError;
use rand::Rng;
use std::time::Duration;

/// Indicates whether an error should be retried or treated as fatal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDisposition {
    Retry,
    Stop,
}

const RANDOMIZATION_FACTOR: f64 = 0.5;

/// Transparent retry applied by the transport to throttled or timed-out calls.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub interval: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            interval: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, interval: Duration) -> Self {
        Self {
            max_retries,
            interval,
        }
    }

    /// Statuses that are retried after a backoff delay.
    pub fn is_retryable_status(status: u16) -> bool {
        matches!(status, 408 | 429)
    }

    pub fn can_retry(&self, retries: u32) -> bool {
        retries < self.max_retries
    }

    /// `2^retries * interval * U(0, 1) * 0.5`
    pub fn backoff_delay(&self, retries: u32) -> Duration {
        let jitter = rand::thread_rng().gen_range(0.0..=1.0);
        self.scaled_delay(retries, jitter)
    }

    fn scaled_delay(&self, retries: u32, jitter: f64) -> Duration {
        let factor = f64::from(1u32 << retries.min(16));
        self.interval
            .mul_f64(factor * jitter.clamp(0.0, 1.0) * RANDOMIZATION_FACTOR)
    }

    /// Upper bound of [`RetryPolicy::backoff_delay`] for `retries`.
    pub fn max_delay(&self, retries: u32) -> Duration {
        self.scaled_delay(retries, 1.0)
    }
}

/// Whether a failed call is worth repeating by the caller. Client-side errors
/// and rejections of the request itself are final.
pub fn classify_spark_error(err: &SparkError) -> RetryDisposition {
    match err {
        SparkError::Sdk { .. } => RetryDisposition::Stop,
        SparkError::Api(api) => match api.status {
            400 | 403 | 404 | 409 | 415 | 422 => RetryDisposition::Stop,
            _ => RetryDisposition::Retry,
        },
    }
}
