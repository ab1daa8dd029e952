use crate::{settings::StatusLog, workers::StageContext};
use chrono::Utc;
use spark_model::BatchStatus;
use std::{
    path::PathBuf,
    time::{Duration, Instant},
};
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq)]
pub struct StatusSample {
    pub batch_id: String,
    /// Records completed since the previous sample.
    pub records_completed: u64,
    pub elapsed: Duration,
}

/// Periodic view of a job's progress, written to CSV at the end of a run.
#[derive(Debug)]
pub struct StatusMonitor {
    batch_id: String,
    samples: Vec<StatusSample>,
    last_completed: u64,
    last_time: Instant,
}

impl StatusMonitor {
    pub fn new(batch_id: impl Into<String>) -> Self {
        Self {
            batch_id: batch_id.into(),
            samples: Vec::new(),
            last_completed: 0,
            last_time: Instant::now(),
        }
    }

    pub fn samples(&self) -> &[StatusSample] {
        &self.samples
    }

    pub fn record(&mut self, status: &BatchStatus) {
        let now = Instant::now();
        self.samples.push(StatusSample {
            batch_id: self.batch_id.clone(),
            records_completed: status.records_completed.saturating_sub(self.last_completed),
            elapsed: now.duration_since(self.last_time),
        });
        self.last_completed = status.records_completed;
        self.last_time = now;
    }

    /// Writes every sample to `<prefix><unix_ts>.csv`.
    pub fn write(&self, prefix: &str) -> Result<PathBuf, csv::Error> {
        let path = PathBuf::from(format!("{prefix}{}.csv", Utc::now().timestamp()));
        let mut writer = csv::Writer::from_path(&path)?;
        writer.write_record(["Batch ID", "Records Completed", "Time"])?;
        for sample in &self.samples {
            writer.write_record([
                sample.batch_id.clone(),
                sample.records_completed.to_string(),
                format!("{:.3}", sample.elapsed.as_secs_f64()),
            ])?;
        }
        writer.flush()?;
        Ok(path)
    }
}

/// Samples the job status until processing settles or the run stops. Never
/// fails the run; problems are only logged.
pub(crate) fn monitor(ctx: StageContext<'_>, log: &StatusLog) -> Option<PathBuf> {
    let mut monitor = StatusMonitor::new(ctx.pipeline.batch_id().as_str());

    while !ctx.cancel.is_cancelled() && !ctx.controller.processing_settled() {
        match ctx.pipeline.get_status() {
            Ok(response) => {
                if let Some(status) = response.data.as_ref().and_then(BatchStatus::from_value) {
                    monitor.record(&status);
                }
            }
            Err(err) => warn!(error = %err, "Status monitor failed to fetch pipeline status"),
        }
        ctx.pause(log.interval);
    }

    match monitor.write(&log.prefix) {
        Ok(path) => {
            info!(file = %path.display(), samples = monitor.samples().len(), "Status log written");
            Some(path)
        }
        Err(err) => {
            warn!(error = %err, prefix = %log.prefix, "Failed to write status log");
            None
        }
    }
}
