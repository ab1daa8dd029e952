use crate::{
    controller::{Counter, ThreadController},
    error::RunnerError,
    settings::RunnerSettings,
};
use crossbeam_channel::{Receiver, RecvTimeoutError, SendTimeoutError, Sender, TrySendError};
use spark_batch::{ChunkProcessor, ChunkSource, Pipeline, PushInput};
use spark_model::{BatchChunk, BatchStatus, ChunkResult, PullResponse};
use spark_transport::{RetryDisposition, classify_spark_error};
use std::{
    thread,
    time::{Duration, Instant},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Chunks returned by one `next_block` call, uploaded with a single push.
pub(crate) type Block = Vec<BatchChunk>;

/// Everything a stage loop shares with its siblings.
#[derive(Clone, Copy)]
pub(crate) struct StageContext<'a> {
    pub pipeline: &'a Pipeline,
    pub controller: &'a ThreadController,
    pub settings: &'a RunnerSettings,
    pub cancel: &'a CancellationToken,
}

impl StageContext<'_> {
    fn stopped(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Sleeps for `duration`, waking early on cancellation.
    pub(crate) fn pause(&self, duration: Duration) {
        let deadline = Instant::now() + duration;
        let slice = self.settings.poll_interval.min(Duration::from_millis(50));
        while !self.stopped() {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            thread::sleep(slice.min(deadline - now));
        }
    }

    /// Sends `item`, retrying while the queue is full. Returns `false` when the
    /// run was cancelled first.
    fn send<T>(&self, tx: &Sender<T>, queue: &'static str, item: T) -> Result<bool, RunnerError> {
        let mut item = item;
        loop {
            match tx.send_timeout(item, self.settings.poll_interval) {
                Ok(()) => return Ok(true),
                Err(SendTimeoutError::Timeout(returned)) => {
                    if self.stopped() {
                        return Ok(false);
                    }
                    item = returned;
                }
                Err(SendTimeoutError::Disconnected(_)) => {
                    if self.stopped() {
                        return Ok(false);
                    }
                    return Err(RunnerError::Disconnected(queue));
                }
            }
        }
    }
}

pub(crate) fn enqueue<S: ChunkSource + ?Sized>(
    source: &mut S,
    tx: Sender<Block>,
    ctx: StageContext<'_>,
) -> Result<(), RunnerError> {
    let result = enqueue_blocks(source, &tx, ctx);
    ctx.controller.done_enqueuing();
    debug!("Enqueue stage complete");
    result
}

fn enqueue_blocks<S: ChunkSource + ?Sized>(
    source: &mut S,
    tx: &Sender<Block>,
    ctx: StageContext<'_>,
) -> Result<(), RunnerError> {
    while !ctx.stopped() {
        let (chunks, done) = source.next_block()?;

        if !chunks.is_empty() {
            let size = chunks.len() as u64;
            if !ctx.send(tx, "upload", chunks)? {
                break;
            }
            ctx.controller.add(Counter::TotalChunks, size);
            ctx.controller.increment(Counter::BlocksEnqueued);
        }

        if done {
            info!(
                blocks = ctx.controller.get(Counter::BlocksEnqueued),
                chunks = ctx.controller.get(Counter::TotalChunks),
                "All chunks enqueued"
            );
            break;
        }
    }
    Ok(())
}

/// Checks the input buffer before a push. `Ok(false)` means the cycle should
/// be skipped.
fn has_capacity(ctx: StageContext<'_>) -> Result<bool, RunnerError> {
    match ctx.pipeline.get_status() {
        Ok(response) => {
            let Some(status) = response.data.as_ref().and_then(BatchStatus::from_value) else {
                warn!(
                    status = response.status,
                    "Unreadable pipeline status, skipping upload"
                );
                return Ok(false);
            };
            if status.is_over(ctx.settings.target_ratio) {
                debug!(
                    used = status.input_buffer_used_bytes,
                    remaining = status.input_buffer_remaining_bytes,
                    "Input buffer above target, skipping upload"
                );
                return Ok(false);
            }
            Ok(true)
        }
        Err(err) if err.is_sdk() => Err(RunnerError::Status(err)),
        Err(err) => {
            warn!(error = %err, "Failed to fetch pipeline status, skipping upload");
            Ok(false)
        }
    }
}

/// Puts a block back on the queue, keeping it locally when the queue is full.
fn requeue(tx: &Sender<Block>, block: Block, pending: &mut Option<Block>) {
    match tx.try_send(block) {
        Ok(()) => {}
        Err(TrySendError::Full(block)) | Err(TrySendError::Disconnected(block)) => {
            *pending = Some(block);
        }
    }
}

pub(crate) fn upload(
    rx: Receiver<Block>,
    requeue_tx: Sender<Block>,
    ctx: StageContext<'_>,
) -> Result<(), RunnerError> {
    let mut pending: Option<Block> = None;

    while !ctx.stopped() && !ctx.controller.uploads_settled() {
        let block = match pending.take() {
            Some(block) => block,
            None => match rx.recv_timeout(ctx.settings.poll_interval) {
                Ok(block) => block,
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => break,
            },
        };

        if !has_capacity(ctx)? {
            pending = Some(block);
            ctx.pause(ctx.settings.delay);
            continue;
        }

        let chunks = block.len();
        match ctx.pipeline.push(
            PushInput::chunks(block.clone()),
            ctx.settings.duplicate_policy,
        ) {
            Ok(_) => {
                ctx.controller.increment(Counter::BlocksUploaded);
                debug!(chunks, "Uploaded block");
            }
            Err(err) => match classify_spark_error(&err) {
                RetryDisposition::Retry => {
                    warn!(error = %err, chunks, "Push failed, block requeued");
                    requeue(&requeue_tx, block, &mut pending);
                    ctx.pause(ctx.settings.delay);
                }
                RetryDisposition::Stop => return Err(RunnerError::Upload(err)),
            },
        }
    }

    debug!("Upload stage complete");
    Ok(())
}

pub(crate) fn download(tx: Sender<ChunkResult>, ctx: StageContext<'_>) -> Result<(), RunnerError> {
    while !ctx.stopped() && !ctx.controller.downloads_settled() {
        let mut received = 0;

        let pull = ctx
            .pipeline
            .pull(ctx.settings.pull_max)
            .map(|response| response.data.as_ref().and_then(PullResponse::from_value));

        match pull {
            Ok(Some(response)) => {
                let remaining = response.status.chunks_available;
                for result in response.data {
                    if !ctx.send(&tx, "download", result)? {
                        return Ok(());
                    }
                    ctx.controller.increment(Counter::ChunksDownloaded);
                    received += 1;
                }
                debug!(received, remaining, "Downloaded chunks");
            }
            Ok(None) => warn!("Unexpected chunk results payload"),
            Err(err) if err.is_sdk() => return Err(RunnerError::Download(err)),
            Err(err) => warn!(error = %err, "Failed to pull chunk results"),
        }

        if received < ctx.settings.pull_max {
            ctx.pause(ctx.settings.delay);
        }
    }

    debug!("Download stage complete");
    Ok(())
}

pub(crate) fn process<P: ChunkProcessor + ?Sized>(
    processor: &mut P,
    rx: Receiver<ChunkResult>,
    ctx: StageContext<'_>,
) -> Result<(), RunnerError> {
    while !ctx.stopped() && !ctx.controller.processing_settled() {
        match rx.recv_timeout(ctx.settings.poll_interval) {
            Ok(result) => {
                if let Err(err) = processor.process(result) {
                    error!(error = %err, "Failed to process chunk result");
                }
                ctx.controller.increment(Counter::ChunksProcessed);
            }
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    processor.finish()?;
    debug!("Processing complete");
    Ok(())
}
