use crate::{
    controller::{ControllerSnapshot, ThreadController},
    error::RunnerError,
    monitor,
    settings::RunnerSettings,
    workers::{self, Block, StageContext},
};
use crossbeam_channel::bounded;
use spark_batch::{ChunkProcessor, ChunkSource, Pipeline};
use spark_model::ChunkResult;
use std::{
    path::PathBuf,
    thread::{self, ScopedJoinHandle},
    time::{Duration, Instant},
};
use tokio_util::sync::CancellationToken;
use tracing::{Span, error, info};

/// Outcome of a completed or cancelled run.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub batch_id: String,
    pub counters: ControllerSnapshot,
    pub elapsed: Duration,
    /// The caller's token was cancelled before the run finished.
    pub cancelled: bool,
    pub status_log: Option<PathBuf>,
}

impl RunSummary {
    /// Average throughput over the whole run.
    pub fn records_per_second(&self, records: u64) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 { records as f64 / secs } else { 0.0 }
    }
}

/// Cancels the run if the owning stage unwinds.
struct CancelOnPanic<'a>(&'a CancellationToken);

impl Drop for CancelOnPanic<'_> {
    fn drop(&mut self) {
        if thread::panicking() {
            self.0.cancel();
        }
    }
}

/// Runs a stage inside the caller's span, cancelling its siblings when it
/// fails or panics.
fn stage<F>(name: &str, span: &Span, cancel: &CancellationToken, f: F) -> Result<(), RunnerError>
where
    F: FnOnce() -> Result<(), RunnerError>,
{
    let _entered = span.enter();
    let _guard = CancelOnPanic(cancel);
    let result = f();
    if let Err(err) = &result {
        error!(stage = name, error = %err, "Stage failed, stopping the run");
        cancel.cancel();
    }
    result
}

/// Streams every chunk of `source` through the job and hands the results to
/// `processor`.
///
/// One thread enqueues blocks, `upload_threads` push them, `download_threads`
/// pull results and one thread processes them. The first fatal stage error
/// stops the others and is returned once every thread has joined. Cancelling
/// `cancel` stops the run cooperatively; the remote job is left as is.
pub fn run_pipeline<S, P>(
    pipeline: &Pipeline,
    source: &mut S,
    processor: &mut P,
    settings: RunnerSettings,
    cancel: CancellationToken,
) -> Result<RunSummary, RunnerError>
where
    S: ChunkSource + ?Sized,
    P: ChunkProcessor + ?Sized,
{
    settings.validate()?;

    let started = Instant::now();
    let controller = ThreadController::new();
    let stop = cancel.child_token();
    let ctx = StageContext {
        pipeline,
        controller: &controller,
        settings: &settings,
        cancel: &stop,
    };

    info!(
        batch_id = %pipeline.batch_id(),
        upload_threads = settings.upload_threads,
        download_threads = settings.download_threads,
        "Starting batch run"
    );

    let (upload_tx, upload_rx) = bounded::<Block>(settings.queue_capacity);
    let (result_tx, result_rx) =
        bounded::<ChunkResult>(settings.queue_capacity.max(settings.pull_max));

    // Stage threads log under the caller's span so their events keep its context.
    let span = Span::current();
    let span = &span;

    let (failure, status_log) = thread::scope(|s| {
        let mut handles: Vec<(String, ScopedJoinHandle<'_, Result<(), RunnerError>>)> =
            Vec::new();

        let tx = upload_tx.clone();
        handles.push((
            "enqueue".to_string(),
            s.spawn(move || {
                stage("enqueue", span, ctx.cancel, || workers::enqueue(source, tx, ctx))
            }),
        ));

        for i in 0..settings.upload_threads {
            let name = format!("upload-{i}");
            let rx = upload_rx.clone();
            let tx = upload_tx.clone();
            let label = name.clone();
            handles.push((
                name,
                s.spawn(move || stage(&label, span, ctx.cancel, || workers::upload(rx, tx, ctx))),
            ));
        }
        drop(upload_tx);
        drop(upload_rx);

        for i in 0..settings.download_threads {
            let name = format!("download-{i}");
            let tx = result_tx.clone();
            let label = name.clone();
            handles.push((
                name,
                s.spawn(move || stage(&label, span, ctx.cancel, || workers::download(tx, ctx))),
            ));
        }
        drop(result_tx);

        handles.push((
            "process".to_string(),
            s.spawn(move || {
                stage("process", span, ctx.cancel, || {
                    workers::process(processor, result_rx, ctx)
                })
            }),
        ));

        let monitor_handle = ctx
            .settings
            .status_log
            .as_ref()
            .map(|log| {
                s.spawn(move || {
                    let _entered = span.enter();
                    monitor::monitor(ctx, log)
                })
            });

        let mut failure: Option<RunnerError> = None;
        for (name, handle) in handles {
            let outcome = handle
                .join()
                .unwrap_or_else(|_| Err(RunnerError::StagePanicked(name)));
            // A dropped queue is only a symptom of another stage going down.
            if let Err(err) = outcome
                && matches!(failure, None | Some(RunnerError::Disconnected(_)))
            {
                failure = Some(err);
            }
        }

        let status_log = monitor_handle.and_then(|handle| {
            handle.join().unwrap_or_else(|_| {
                error!("Status monitor panicked");
                None
            })
        });

        (failure, status_log)
    });

    let counters = controller.snapshot();
    if let Some(err) = failure {
        error!(batch_id = %pipeline.batch_id(), error = %err, ?counters, "Batch run failed");
        return Err(err);
    }

    let summary = RunSummary {
        batch_id: pipeline.batch_id().to_string(),
        counters,
        elapsed: started.elapsed(),
        cancelled: cancel.is_cancelled(),
        status_log,
    };

    info!(
        batch_id = %summary.batch_id,
        chunks = counters.chunks_processed,
        cancelled = summary.cancelled,
        "Run completed in {:.2} seconds",
        summary.elapsed.as_secs_f64()
    );
    Ok(summary)
}
