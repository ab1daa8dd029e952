use crate::{error::ProcessError, generator::cell_text};
use serde_json::Value;
use spark_model::ChunkResult;
use std::{
    fs,
    path::{Path, PathBuf},
};
use tracing::{debug, error, info, warn};

/// Consumes chunk results downloaded from a batch job.
pub trait ChunkProcessor: Send {
    fn process(&mut self, result: ChunkResult) -> Result<(), ProcessError>;

    /// Called once after the last result.
    fn finish(&mut self) -> Result<(), ProcessError> {
        Ok(())
    }
}

/// Keeps every result in memory.
#[derive(Debug, Default)]
pub struct CollectingProcessor {
    results: Vec<ChunkResult>,
}

impl CollectingProcessor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn results(&self) -> &[ChunkResult] {
        &self.results
    }

    pub fn into_results(self) -> Vec<ChunkResult> {
        self.results
    }

    pub fn total_outputs(&self) -> usize {
        self.results.iter().map(ChunkResult::len).sum()
    }
}

impl ChunkProcessor for CollectingProcessor {
    fn process(&mut self, result: ChunkResult) -> Result<(), ProcessError> {
        self.results.push(result);
        Ok(())
    }
}

/// Accumulates result rows and writes them to `<out_dir>/<count>_output.csv`
/// every `flush_every` chunks and once more on [`ChunkProcessor::finish`].
///
/// A result needs a header row plus at least one record; anything shorter is
/// logged and skipped. Nested list or object cells are written as JSON text.
#[derive(Debug)]
pub struct CsvResultWriter {
    out_dir: PathBuf,
    flush_every: usize,
    count: usize,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
    written: Vec<PathBuf>,
}

impl CsvResultWriter {
    pub fn new(out_dir: impl Into<PathBuf>, flush_every: usize) -> Result<Self, ProcessError> {
        let out_dir = out_dir.into();
        fs::create_dir_all(&out_dir).map_err(|e| ProcessError::Write {
            path: out_dir.clone(),
            source: Box::new(e),
        })?;

        Ok(Self {
            out_dir,
            flush_every: flush_every.max(1),
            count: 0,
            headers: Vec::new(),
            rows: Vec::new(),
            written: Vec::new(),
        })
    }

    /// Results seen so far, valid or not.
    pub fn count(&self) -> usize {
        self.count
    }

    pub fn files_written(&self) -> &[PathBuf] {
        &self.written
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Writes pending rows, if any.
    pub fn save(&mut self) -> Result<(), ProcessError> {
        if self.rows.is_empty() {
            return Ok(());
        }

        let path = self.out_dir.join(format!("{}_output.csv", self.count));
        write_csv(&path, &self.headers, &self.rows).map_err(|e| {
            error!(file = %path.display(), error = %e, "unable to save results");
            ProcessError::Write {
                path: path.clone(),
                source: Box::new(e),
            }
        })?;

        info!(file = %path.display(), rows = self.rows.len(), "saved results");
        self.rows.clear();
        self.written.push(path);
        Ok(())
    }

    fn absorb(&mut self, outputs: &[Value]) -> Result<(), ProcessError> {
        match &outputs[0] {
            Value::Array(header) => {
                self.headers = header.iter().map(cell_text).collect();
                for row in &outputs[1..] {
                    let row = row.as_array().ok_or_else(|| {
                        ProcessError::Serialize(format!("expected an array row, got {row}"))
                    })?;
                    self.rows.push(row.iter().map(cell_text).collect());
                }
            }
            Value::Object(first) => {
                self.headers = first.keys().cloned().collect();
                for row in outputs {
                    let row = row.as_object().ok_or_else(|| {
                        ProcessError::Serialize(format!("expected an object row, got {row}"))
                    })?;
                    self.rows.push(
                        self.headers
                            .iter()
                            .map(|key| row.get(key).map(cell_text).unwrap_or_default())
                            .collect(),
                    );
                }
            }
            other => {
                return Err(ProcessError::Serialize(format!(
                    "unsupported header row {other}"
                )));
            }
        }
        Ok(())
    }
}

impl ChunkProcessor for CsvResultWriter {
    fn process(&mut self, result: ChunkResult) -> Result<(), ProcessError> {
        self.count += 1;
        debug!("processing chunk {}", self.count);

        if result.outputs.len() < 2 {
            warn!("invalid chunk at count {}", self.count);
            return Ok(());
        }

        self.absorb(&result.outputs)?;

        if self.count % self.flush_every == 0 {
            self.save()?;
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<(), ProcessError> {
        self.save()
    }
}

fn write_csv(path: &Path, headers: &[String], rows: &[Vec<String>]) -> Result<(), csv::Error> {
    let mut writer = csv::WriterBuilder::new().flexible(true).from_path(path)?;
    writer.write_record(headers)?;
    for row in rows {
        writer.write_record(row)?;
    }
    writer.flush()?;
    Ok(())
}
