use crate::{batch::RunReport, error::CliError};
use serde_json::{Value, json};
use spark_transport::HttpResponse;

fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "-".to_string(),
        other => other.to_string(),
    }
}

pub fn print_response(response: &HttpResponse, as_json: bool) -> Result<(), CliError> {
    match &response.data {
        Some(Value::Object(fields)) if !as_json => {
            for (key, value) in fields {
                println!("{:<32} {}", key, render(value));
            }
        }
        Some(data) => println!("{}", serde_json::to_string_pretty(data)?),
        None => println!("{}", response.text()),
    }
    Ok(())
}

pub fn print_run(report: &RunReport, as_json: bool) -> Result<(), CliError> {
    let counters = &report.summary.counters;

    if as_json {
        let value = json!({
            "batch_id": report.summary.batch_id,
            "disposed_as": report.disposed_as,
            "cancelled": report.summary.cancelled,
            "elapsed_secs": report.summary.elapsed.as_secs_f64(),
            "records_completed": report.records_completed,
            "records_per_second": report.records_per_second,
            "blocks_uploaded": counters.blocks_uploaded,
            "chunks_processed": counters.chunks_processed,
            "total_chunks": counters.total_chunks,
            "output_files": report.output_files,
            "status_log": report.summary.status_log,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    println!("Batch run '{}':", report.summary.batch_id);
    println!("-----------------------------");
    println!("{:<20} {}", "Pipeline", report.disposed_as);
    println!("{:<20} {:.2}s", "Elapsed", report.summary.elapsed.as_secs_f64());
    println!("{:<20} {}/{}", "Chunks processed", counters.chunks_processed, counters.total_chunks);
    println!("{:<20} {}", "Records completed", report.records_completed);
    println!("{:<20} {:.2}", "Records per second", report.records_per_second);
    println!("{:<20} {}", "Output files", report.output_files.len());
    if let Some(path) = &report.summary.status_log {
        println!("{:<20} {}", "Status log", path.display());
    }
    Ok(())
}
