use crate::error::RunnerError;
use spark_model::DuplicatePolicy;
use std::time::Duration;

/// Where and how often the status monitor samples the job.
#[derive(Debug, Clone)]
pub struct StatusLog {
    /// Path prefix of the CSV file; the unix timestamp and `.csv` are appended.
    pub prefix: String,

    /// Time between two status samples
    pub interval: Duration,
}

impl StatusLog {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            interval: Duration::from_secs(6),
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }
}

/// Configuration for a batch run.
#[derive(Debug, Clone)]
pub struct RunnerSettings {
    /// Number of concurrent upload threads
    pub upload_threads: usize,

    /// Number of concurrent download threads
    pub download_threads: usize,

    /// Input buffer usage above which uploads pause
    pub target_ratio: f64,

    /// Wait after a skipped upload, a failed request or an empty pull
    pub delay: Duration,

    /// Maximum chunk results fetched per pull
    pub pull_max: usize,

    /// Capacity of the upload and download queues
    pub queue_capacity: usize,

    /// How long a stage blocks on its queue before re-checking for termination
    pub poll_interval: Duration,

    pub duplicate_policy: DuplicatePolicy,

    pub status_log: Option<StatusLog>,
}

impl Default for RunnerSettings {
    fn default() -> Self {
        Self {
            upload_threads: 1,
            download_threads: 1,
            target_ratio: 0.5,
            delay: Duration::from_secs(2),
            pull_max: 100,
            queue_capacity: 16,
            poll_interval: Duration::from_millis(200),
            duplicate_policy: DuplicatePolicy::default(),
            status_log: None,
        }
    }
}

impl RunnerSettings {
    pub fn with_threads(mut self, upload: usize, download: usize) -> Self {
        self.upload_threads = upload;
        self.download_threads = download;
        self
    }

    pub fn with_target_ratio(mut self, ratio: f64) -> Self {
        self.target_ratio = ratio;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_pull_max(mut self, max: usize) -> Self {
        self.pull_max = max;
        self
    }

    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_duplicate_policy(mut self, policy: DuplicatePolicy) -> Self {
        self.duplicate_policy = policy;
        self
    }

    pub fn with_status_log(mut self, log: StatusLog) -> Self {
        self.status_log = Some(log);
        self
    }

    pub fn validate(&self) -> Result<(), RunnerError> {
        let invalid = |msg: &str| Err(RunnerError::InvalidSettings(msg.to_string()));

        if self.upload_threads == 0 || self.download_threads == 0 {
            return invalid("at least one upload and one download thread are required");
        }
        if self.target_ratio.is_nan() || self.target_ratio <= 0.0 {
            return invalid("target ratio must be greater than zero");
        }
        if self.pull_max == 0 {
            return invalid("pull max must be at least 1");
        }
        if self.queue_capacity == 0 {
            return invalid("queue capacity must be at least 1");
        }
        if self.poll_interval.is_zero() {
            return invalid("poll interval must be greater than zero");
        }
        Ok(())
    }
}
