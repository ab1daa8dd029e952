use crate::{
    mock::{BATCH_ID, MockSpark},
    utils::{RAW_STRING, spark},
};
use serde_json::json;
use spark_batch::{CreateParams, PipelineStats, PushInput};
use spark_config::SDK_NAME;
use spark_model::{DuplicatePolicy, PipelineState, PullResponse};
use spark_transport::Method;
use tracing_test::traced_test;

#[traced_test]
#[test]
fn batch_pipeline_from_start_to_finish() {
    let (mock, batches) = spark(MockSpark::new());

    let params = CreateParams::default()
        .with_runners(Some(100), None)
        .with_runners_per_vm(4)
        .with_accuracy(0.9);
    let batch = batches.create("f/s", &params).unwrap();
    assert_eq!(batch.status, 200);
    assert_eq!(batch.field("object"), Some(&json!("batch")));
    assert_eq!(batch.field("id"), Some(&json!(BATCH_ID)));

    let body = &mock.created()[0];
    assert_eq!(body["service"], json!("f/s"));
    assert_eq!(body["call_purpose"], json!("Async Batch Execution"));
    assert_eq!(body["source_system"], json!(SDK_NAME));
    assert_eq!(body["initial_workers"], json!(100));
    assert_eq!(body["runner_thread_count"], json!(4));
    assert_eq!(body["acceptable_error_percentage"], json!(10));
    assert!(body.get("max_workers").is_none());

    let pipeline = batches.of(BATCH_ID).unwrap();
    assert!(!pipeline.is_disposed());
    assert_eq!(pipeline.state(), PipelineState::Open);
    assert_eq!(pipeline.stats(), PipelineStats::default());

    // something must always be pushed
    assert!(pipeline.push(PushInput::default(), DuplicatePolicy::Replace).is_err());

    let submission = pipeline
        .push(PushInput::raw(RAW_STRING), DuplicatePolicy::Replace)
        .unwrap();
    assert_eq!(submission.status, 200);
    assert_eq!(submission.field("record_submitted"), Some(&json!(3)));
    assert_eq!(pipeline.stats(), PipelineStats { chunks: 2, records: 3 });

    let duplicated = pipeline.push(PushInput::raw(RAW_STRING), DuplicatePolicy::Throw);
    assert!(duplicated.is_err());
    assert_eq!(mock.requests_to(Method::Post, "/chunks").len(), 1);

    let results = pipeline.pull(2).unwrap();
    assert_eq!(results.status, 200);
    let pulled = PullResponse::from_value(results.data.as_ref().unwrap()).unwrap();
    assert_eq!(pulled.data.len(), 2);
    // header row plus one row per record
    assert_eq!(pulled.total_outputs(), 3 + 2);

    pipeline.close().unwrap();
    assert!(pipeline.is_disposed());
    assert_eq!(mock.batch_status().as_deref(), Some("closed"));

    // a disposed pipeline cannot be cancelled
    assert!(pipeline.cancel().is_err());
    assert_eq!(mock.requests_to(Method::Patch, BATCH_ID).len(), 1);
    assert!(logs_contain("has been closed"));
}

#[test]
fn cancelled_pipeline_rejects_every_operation() {
    let (mock, batches) = spark(MockSpark::new());
    let pipeline = batches.of(BATCH_ID).unwrap();

    pipeline.cancel().unwrap();
    assert_eq!(pipeline.state(), PipelineState::Cancelled);
    assert_eq!(mock.batch_status().as_deref(), Some("cancelled"));

    assert!(pipeline.push(PushInput::raw(RAW_STRING), DuplicatePolicy::Replace).is_err());
    assert!(pipeline.pull(1).is_err());
    assert!(pipeline.close().is_err());
    assert_eq!(mock.requests().len(), 1);
}

#[test]
fn unknown_batch_is_an_api_error() {
    let (_mock, batches) = spark(MockSpark::new());
    let pipeline = batches.of("missing").unwrap();

    let err = pipeline.get_status().unwrap_err();
    assert_eq!(err.status(), Some(404));
    assert!(!err.is_sdk());
}

#[test]
fn describe_and_info() {
    let (mock, batches) = spark(MockSpark::new());
    batches.create("f/s", &CreateParams::default()).unwrap();

    let described = batches.describe().unwrap();
    assert_eq!(described.field("data").unwrap()[0]["id"], json!(BATCH_ID));

    let info = batches.of(BATCH_ID).unwrap().get_info().unwrap();
    assert_eq!(info.field("batch_status"), Some(&json!("created")));
    assert_eq!(mock.requests().len(), 3);
}

#[test]
fn invalid_service_locator_sends_nothing() {
    let (mock, batches) = spark(MockSpark::new());
    assert!(batches.create("", &CreateParams::default()).is_err());
    assert!(mock.requests().is_empty());
    assert!(batches.of("").is_err());
}
