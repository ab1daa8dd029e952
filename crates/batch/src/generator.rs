use crate::error::GeneratorError;
use serde_json::{Map, Value};
use spark_model::{BatchChunk, ChunkData, Row};
use std::{
    fs,
    path::{Path, PathBuf},
};
use tracing::{debug, error, info};

/// Anything that can feed blocks of chunks to the pipeline runner.
///
/// Each call returns the next block and whether the source is exhausted.
/// Once exhausted, a source keeps returning `([], true)`.
pub trait ChunkSource: Send {
    fn next_block(&mut self) -> Result<(Vec<BatchChunk>, bool), GeneratorError>;
}

#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    /// Maximum chunks per block
    pub num_chunk: usize,

    /// Maximum records per chunk
    pub chunk_size: usize,

    /// Stop after this many records in total
    pub max_records: Option<usize>,

    /// Where to write a copy of every generated chunk
    pub persist_dir: Option<PathBuf>,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            num_chunk: 2,
            chunk_size: 5,
            max_records: None,
            persist_dir: None,
        }
    }
}

impl GeneratorConfig {
    pub fn with_num_chunk(mut self, num_chunk: usize) -> Self {
        self.num_chunk = num_chunk;
        self
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    pub fn with_max_records(mut self, max_records: usize) -> Self {
        self.max_records = Some(max_records);
        self
    }

    pub fn with_persist_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.persist_dir = Some(dir.into());
        self
    }
}

/// Turns a directory of CSV files into chunks, one file at a time.
///
/// Files are read in name order. Each file's first row is its header and is
/// repeated at the top of every chunk cut from that file; chunks never span
/// two files.
#[derive(Debug)]
pub struct ChunkGenerator {
    config: GeneratorConfig,
    files: Vec<PathBuf>,
    file_index: usize,
    headers: Row,
    records: Vec<Row>,
    record_index: usize,
    total_records: usize,
    done: bool,
}

impl ChunkGenerator {
    pub fn new(input_dir: impl AsRef<Path>, config: GeneratorConfig) -> Result<Self, GeneratorError> {
        if config.num_chunk == 0 || config.chunk_size == 0 {
            return Err(GeneratorError::InvalidConfig(
                "num_chunk and chunk_size must be at least 1".to_string(),
            ));
        }

        let files = list_csv_files(input_dir.as_ref())?;
        info!(dir = %input_dir.as_ref().display(), files = files.len(), "found input files");

        if let Some(dir) = &config.persist_dir
            && let Err(e) = fs::create_dir_all(dir)
        {
            error!(dir = %dir.display(), error = %e, "cannot create chunk directory");
        }

        Ok(Self {
            config,
            files,
            file_index: 0,
            headers: Vec::new(),
            records: Vec::new(),
            record_index: 0,
            total_records: 0,
            done: false,
        })
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Records emitted so far across all files.
    pub fn total_records(&self) -> usize {
        self.total_records
    }

    /// Produces up to `num_chunk` chunks. The flag turns true with the block
    /// that exhausts the input.
    pub fn get_next(&mut self) -> Result<(Vec<BatchChunk>, bool), GeneratorError> {
        if self.done {
            return Ok((Vec::new(), true));
        }

        let mut chunks = Vec::with_capacity(self.config.num_chunk);

        while chunks.len() < self.config.num_chunk {
            if self.cap_reached() {
                self.done = true;
                break;
            }

            if self.record_index >= self.records.len() {
                if !self.load_next_file()? {
                    self.done = true;
                    break;
                }
                continue;
            }

            let mut take = self
                .config
                .chunk_size
                .min(self.records.len() - self.record_index);
            if let Some(max) = self.config.max_records {
                take = take.min(max - self.total_records);
            }

            let window = &self.records[self.record_index..self.record_index + take];
            let mut inputs = Vec::with_capacity(take + 1);
            inputs.push(self.headers.clone());
            inputs.extend_from_slice(window);

            chunks.push(BatchChunk::of(
                ChunkData::new(inputs).with_summary(default_summary()),
            ));

            self.record_index += take;
            self.total_records += take;
        }

        if !self.done && self.exhausted() {
            self.done = true;
        }

        if let Some(dir) = &self.config.persist_dir {
            persist_chunks(dir, &chunks);
        }

        debug!(chunks = chunks.len(), done = self.done, "generated block");
        Ok((chunks, self.done))
    }

    fn cap_reached(&self) -> bool {
        self.config
            .max_records
            .is_some_and(|max| self.total_records >= max)
    }

    /// True when no file has records left to hand out.
    fn exhausted(&self) -> bool {
        self.cap_reached()
            || (self.record_index >= self.records.len() && self.file_index >= self.files.len())
    }

    /// Loads the next file. Returns false when there are no files left.
    fn load_next_file(&mut self) -> Result<bool, GeneratorError> {
        let Some(path) = self.files.get(self.file_index).cloned() else {
            return Ok(false);
        };
        self.file_index += 1;

        let (headers, records) = read_csv(&path)?;
        debug!(file = %path.display(), records = records.len(), "loaded input file");

        self.headers = headers;
        self.records = records;
        self.record_index = 0;
        Ok(true)
    }
}

impl ChunkSource for ChunkGenerator {
    fn next_block(&mut self) -> Result<(Vec<BatchChunk>, bool), GeneratorError> {
        self.get_next()
    }
}

fn default_summary() -> Map<String, Value> {
    let mut summary = Map::new();
    summary.insert("ignore_error".into(), Value::Bool(false));
    summary.insert("return_all_records".into(), Value::Bool(true));
    summary
}

fn list_csv_files(dir: &Path) -> Result<Vec<PathBuf>, GeneratorError> {
    let read_dir_error = |source| GeneratorError::ReadDir {
        path: dir.to_path_buf(),
        source,
    };

    let mut files = Vec::new();
    for entry in fs::read_dir(dir).map_err(read_dir_error)? {
        let path = entry.map_err(read_dir_error)?.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == "csv") {
            files.push(path);
        }
    }

    files.sort();
    Ok(files)
}

fn read_csv(path: &Path) -> Result<(Row, Vec<Row>), GeneratorError> {
    let read_error = |source| GeneratorError::ReadFile {
        path: path.to_path_buf(),
        source,
    };

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)
        .map_err(read_error)?;

    let mut rows = reader.records().map(|record| {
        record
            .map(|r| r.iter().map(|cell| Value::String(cell.to_string())).collect::<Row>())
            .map_err(read_error)
    });

    let headers = rows.next().transpose()?.unwrap_or_default();
    let records = rows.collect::<Result<Vec<_>, _>>()?;
    Ok((headers, records))
}

fn persist_chunks(dir: &Path, chunks: &[BatchChunk]) {
    for (count, chunk) in chunks.iter().enumerate() {
        let path = dir.join(format!("{}_input.csv", chunk.id));
        match write_rows(&path, &chunk.data.inputs) {
            Ok(()) => debug!(file = %path.display(), "saved chunk {count}"),
            Err(e) => error!(file = %path.display(), error = %e, "error saving chunk"),
        }
    }
}

fn write_rows(path: &Path, rows: &[Row]) -> Result<(), csv::Error> {
    let mut writer = csv::WriterBuilder::new().flexible(true).from_path(path)?;
    for row in rows {
        writer.write_record(row.iter().map(cell_text))?;
    }
    writer.flush()?;
    Ok(())
}

/// Text of a cell as written to CSV. Nested values are kept as JSON.
pub(crate) fn cell_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
