use crate::{
    commands::{BatchCommand, RunArgs},
    error::CliError,
    shutdown::ShutdownCoordinator,
};
use serde_json::Value;
use spark_batch::{Batches, ChunkGenerator, CsvResultWriter, Pipeline};
use spark_config::Config;
use spark_model::BatchStatus;
use spark_runtime::{RunSummary, run_pipeline};
use spark_transport::{HttpClient, HttpResponse};
use std::{path::PathBuf, sync::Arc};
use tracing::{error, info, warn};

pub struct RunReport {
    pub summary: RunSummary,
    pub disposed_as: &'static str,
    pub records_completed: u64,
    pub records_per_second: f64,
    pub output_files: Vec<PathBuf>,
}

fn batches(config: Config) -> Result<Batches, CliError> {
    let base_url = config.base_url().clone();
    let client = HttpClient::new(config)?;
    Ok(Batches::new(base_url, Arc::new(client)))
}

/// Runs a one-shot batch command. Blocking.
pub fn execute(config: Config, command: BatchCommand) -> Result<HttpResponse, CliError> {
    let batches = batches(config)?;
    let response = match command {
        BatchCommand::Describe => batches.describe()?,
        BatchCommand::Create(args) => batches.create(&args.service, &args.params())?,
        BatchCommand::Status { id } => batches.of(id)?.get_status()?,
        BatchCommand::Info { id } => batches.of(id)?.get_info()?,
        BatchCommand::Close { id } => batches.of(id)?.close()?,
        BatchCommand::Cancel { id } => batches.of(id)?.cancel()?,
        BatchCommand::Run(_) => {
            return Err(CliError::Unexpected("batch run is not a one-shot command".into()));
        }
    };
    Ok(response)
}

fn cancel_pipeline(pipeline: &Pipeline) {
    info!(batch_id = %pipeline.batch_id(), "Cancelling the pipeline");
    if let Err(err) = pipeline.cancel() {
        error!(batch_id = %pipeline.batch_id(), error = %err, "Failed to cancel the pipeline");
    }
}

fn records_completed(pipeline: &Pipeline) -> u64 {
    match pipeline.get_status() {
        Ok(response) => response
            .data
            .as_ref()
            .and_then(BatchStatus::from_value)
            .map(|status| status.records_completed)
            .unwrap_or_default(),
        Err(err) => {
            warn!(error = %err, "Failed to fetch the final pipeline status");
            0
        }
    }
}

/// Creates a pipeline, streams the input directory through it and disposes
/// of it: closed on success, cancelled on failure or interruption. Blocking.
pub fn run(
    config: Config,
    args: RunArgs,
    shutdown: ShutdownCoordinator,
) -> Result<RunReport, CliError> {
    let batches = batches(config)?;
    let mut source = ChunkGenerator::new(&args.input_dir, args.generator_config())?;
    let mut processor = CsvResultWriter::new(&args.output_dir, args.flush_every)?;

    let created = batches.create(&args.create.service, &args.create.params())?;
    let batch_id = created
        .field("id")
        .and_then(Value::as_str)
        .ok_or_else(|| CliError::Unexpected("batch pipeline created without an id".into()))?
        .to_string();
    let pipeline = batches.of(batch_id)?;
    info!(batch_id = %pipeline.batch_id(), "Created batch pipeline");
    shutdown.track_batch(pipeline.batch_id());

    let summary = match run_pipeline(
        &pipeline,
        &mut source,
        &mut processor,
        args.runner_settings(),
        shutdown.cancel_token(),
    ) {
        Ok(summary) => summary,
        Err(err) => {
            error!(batch_id = %pipeline.batch_id(), error = %err, "Batch run failed");
            cancel_pipeline(&pipeline);
            return Err(err.into());
        }
    };

    let records_completed = records_completed(&pipeline);
    let disposed_as = if summary.cancelled {
        cancel_pipeline(&pipeline);
        "cancelled"
    } else {
        pipeline.close()?;
        "closed"
    };

    let records_per_second = summary.records_per_second(records_completed);
    info!(
        batch_id = %summary.batch_id,
        submitted = source.total_records(),
        "{records_per_second:.2} records per second (on average)"
    );

    Ok(RunReport {
        summary,
        disposed_as,
        records_completed,
        records_per_second,
        output_files: processor.files_written().to_vec(),
    })
}
