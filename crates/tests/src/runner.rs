use crate::{
    mock::{BATCH_ID, MockSpark},
    utils::{output_rows, spark, write_sales_csv},
};
use spark_batch::{ChunkGenerator, CollectingProcessor, CreateParams, CsvResultWriter, GeneratorConfig};
use spark_model::PipelineState;
use spark_runtime::{RunnerError, RunnerSettings, StatusLog, run_pipeline};
use spark_transport::Method;
use std::{fs, time::Duration};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use tracing_test::traced_test;

fn settings() -> RunnerSettings {
    RunnerSettings::default()
        .with_delay(Duration::from_millis(10))
        .with_poll_interval(Duration::from_millis(10))
}

#[traced_test]
#[test]
fn streams_a_csv_directory_through_the_job() {
    let input = TempDir::new().unwrap();
    let output = TempDir::new().unwrap();
    write_sales_csv(input.path(), "a.csv", 12);
    write_sales_csv(input.path(), "b.csv", 7);

    let (mock, batches) = spark(MockSpark::new());
    batches.create("f/s", &CreateParams::default()).unwrap();
    let pipeline = batches.of(BATCH_ID).unwrap();

    let config = GeneratorConfig::default().with_chunk_size(5).with_num_chunk(2);
    let mut source = ChunkGenerator::new(input.path(), config).unwrap();
    let mut processor = CsvResultWriter::new(output.path(), 3).unwrap();

    let summary = run_pipeline(
        &pipeline,
        &mut source,
        &mut processor,
        settings().with_threads(2, 2),
        CancellationToken::new(),
    )
    .unwrap();

    // chunks never span files: 5 + 5 + 2 and 5 + 2
    assert_eq!(summary.counters.total_chunks, 5);
    assert_eq!(summary.counters.chunks_processed, 5);
    assert_eq!(summary.counters.blocks_uploaded, summary.counters.blocks_enqueued);
    assert!(!summary.cancelled);

    assert_eq!(mock.records_submitted(), 19);
    assert_eq!(pipeline.stats().records, 19);
    assert_eq!(output_rows(output.path()), 19);
    assert_eq!(processor.files_written().len(), 2);

    pipeline.close().unwrap();
    assert_eq!(mock.batch_status().as_deref(), Some("closed"));
    assert!(logs_contain("All chunks enqueued"));
}

#[test]
fn max_records_caps_the_run() {
    let input = TempDir::new().unwrap();
    write_sales_csv(input.path(), "sales.csv", 30);

    let (mock, batches) = spark(MockSpark::new());
    let pipeline = batches.of(BATCH_ID).unwrap();

    let config = GeneratorConfig::default()
        .with_chunk_size(4)
        .with_max_records(10);
    let mut source = ChunkGenerator::new(input.path(), config).unwrap();
    let mut processor = CollectingProcessor::new();

    let summary = run_pipeline(
        &pipeline,
        &mut source,
        &mut processor,
        settings(),
        CancellationToken::new(),
    )
    .unwrap();

    assert_eq!(mock.records_submitted(), 10);
    assert_eq!(summary.counters.total_chunks, 3);
    assert_eq!(processor.results().len(), 3);
}

#[traced_test]
#[test]
fn backpressure_and_transient_failures_delay_but_do_not_lose_blocks() {
    let input = TempDir::new().unwrap();
    write_sales_csv(input.path(), "sales.csv", 8);

    let (mock, batches) = spark(MockSpark::new().busy_status(2).failing_pushes(1));
    let pipeline = batches.of(BATCH_ID).unwrap();

    let config = GeneratorConfig::default().with_chunk_size(2).with_num_chunk(2);
    let mut source = ChunkGenerator::new(input.path(), config).unwrap();
    let mut processor = CollectingProcessor::new();

    let summary = run_pipeline(
        &pipeline,
        &mut source,
        &mut processor,
        settings(),
        CancellationToken::new(),
    )
    .unwrap();

    assert_eq!(summary.counters.blocks_uploaded, 2);
    assert_eq!(summary.counters.chunks_processed, 4);
    assert_eq!(mock.records_submitted(), 8);
    assert_eq!(mock.requests_to(Method::Post, "/chunks").len(), 3);
    assert!(logs_contain("Input buffer above target"));
    assert!(logs_contain("Push failed, block requeued"));
}

#[test]
fn disposed_pipeline_fails_the_run() {
    let input = TempDir::new().unwrap();
    write_sales_csv(input.path(), "sales.csv", 5);

    let (mock, batches) = spark(MockSpark::new());
    let pipeline = batches.of(BATCH_ID).unwrap();
    pipeline.close().unwrap();

    let mut source = ChunkGenerator::new(input.path(), GeneratorConfig::default()).unwrap();
    let err = run_pipeline(
        &pipeline,
        &mut source,
        &mut CollectingProcessor::new(),
        settings(),
        CancellationToken::new(),
    )
    .unwrap_err();

    assert!(matches!(err, RunnerError::Upload(ref e) if e.is_sdk()));
    assert!(mock.requests_to(Method::Post, "/chunks").is_empty());
    assert_eq!(pipeline.state(), PipelineState::Closed);
}

#[test]
fn status_log_is_written_next_to_the_outputs() {
    let input = TempDir::new().unwrap();
    let logs = TempDir::new().unwrap();
    write_sales_csv(input.path(), "sales.csv", 6);

    let (_mock, batches) = spark(MockSpark::new());
    let pipeline = batches.of(BATCH_ID).unwrap();
    let mut source = ChunkGenerator::new(input.path(), GeneratorConfig::default()).unwrap();

    let prefix = format!("{}/status_", logs.path().display());
    let summary = run_pipeline(
        &pipeline,
        &mut source,
        &mut CollectingProcessor::new(),
        settings().with_status_log(StatusLog::new(prefix).with_interval(Duration::from_millis(5))),
        CancellationToken::new(),
    )
    .unwrap();

    let path = summary.status_log.expect("status log written");
    let content = fs::read_to_string(path).unwrap();
    let mut lines = content.lines();
    assert_eq!(lines.next(), Some("Batch ID,Records Completed,Time"));
    assert!(lines.all(|line| line.starts_with(BATCH_ID)));
}
