//! Flat-file driver.
//!
//! The source splits a delimited text file into byte ranges of `limit`
//! lines each; the destination appends rows to a single file.

use std::io::SeekFrom;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncSeekExt, AsyncWriteExt, BufReader};
use tokio::sync::Mutex;
use tracing::{info, warn};

use super::options::{Options, OptionsExt};
use super::types::{DriverError, ExtractionTask, LoadTask, ResultSet, Row, Value};
use super::{Destination, Source};

const FROM: &str = "from";
const TO: &str = "to";

fn single_byte(options: &Options, key: &str, default: u8) -> Result<u8, DriverError> {
    match options.str_opt(key)? {
        None => Ok(default),
        Some(sep) if sep.len() == 1 => Ok(sep.as_bytes()[0]),
        Some(sep) => Err(DriverError::Configuration(format!(
            "{} must be a single byte, got `{}`",
            key, sep
        ))),
    }
}

fn delimiter(options: &Options) -> Result<u8, DriverError> {
    single_byte(options, "column_separator", b',')
}

fn absolute(path: &str) -> Result<PathBuf, DriverError> {
    std::path::absolute(Path::new(path))
        .map_err(|e| DriverError::Configuration(format!("invalid path `{}`: {}", path, e)))
}

#[derive(Debug)]
pub struct CsvSource {
    path: PathBuf,
    limit: u64,
    offset: u64,
    delimiter: u8,
    terminator: u8,
    /// 1-based column indices to keep; empty keeps every column.
    columns: Vec<u64>,
}

impl CsvSource {
    pub async fn open(options: &Options) -> Result<Self, DriverError> {
        let path = absolute(options.require_str("path")?)?;
        let limit = options.u64_opt("limit")?.unwrap_or(1).max(1);
        let offset = options.u64_opt("offset")?.unwrap_or(0);
        let delimiter = delimiter(options)?;
        let terminator = single_byte(options, "line_separator", b'\n')?;
        let columns = options.u64_list_opt("columns")?.unwrap_or_default();

        File::open(&path)
            .await
            .map_err(|e| DriverError::Connection(format!("{}: {}", path.display(), e)))?;

        Ok(Self {
            path,
            limit,
            offset,
            delimiter,
            terminator,
            columns,
        })
    }

    /// Byte offset of every line start, plus the end of file.
    async fn line_offsets(&self) -> std::io::Result<Vec<u64>> {
        let file = File::open(&self.path).await?;
        let mut reader = BufReader::new(file);
        let mut offsets = vec![0u64];
        let mut line = Vec::new();
        let mut total = 0u64;

        loop {
            line.clear();
            let n = reader.read_until(self.terminator, &mut line).await?;
            if n == 0 {
                break;
            }
            total += n as u64;
            offsets.push(total);
        }

        Ok(offsets)
    }

    fn keep_column(&self, index: usize) -> bool {
        self.columns.is_empty() || self.columns.contains(&(index as u64 + 1))
    }

    fn parse(&self, buffer: &[u8]) -> ResultSet {
        let mut builder = csv::ReaderBuilder::new();
        builder
            .has_headers(false)
            .flexible(true)
            .delimiter(self.delimiter);
        if self.terminator != b'\n' {
            builder.terminator(csv::Terminator::Any(self.terminator));
        }
        let mut reader = builder.from_reader(buffer);

        let mut rows = Vec::new();
        for record in reader.byte_records() {
            match record {
                Ok(record) => {
                    let row: Row = record
                        .iter()
                        .enumerate()
                        .filter(|(i, _)| self.keep_column(*i))
                        .map(|(_, field)| Value::Bytes(field.to_vec()))
                        .collect();
                    rows.push(row);
                }
                Err(e) => warn!(path = %self.path.display(), error = %e, "skipping malformed record"),
            }
        }
        rows
    }
}

#[async_trait]
impl Source for CsvSource {
    async fn plan(&self) -> Result<Vec<ExtractionTask>, DriverError> {
        let offsets = self
            .line_offsets()
            .await
            .map_err(|e| DriverError::Planning(format!("{}: {}", self.path.display(), e)))?;
        let count = (offsets.len() - 1) as u64;

        let mut tasks = Vec::new();
        let mut line = self.offset;
        while line < count {
            let end = (line + self.limit).min(count);
            tasks.push(
                ExtractionTask::new()
                    .with(FROM, offsets[line as usize])
                    .with(TO, offsets[end as usize]),
            );
            line = end;
        }

        Ok(tasks)
    }

    async fn extract(&self, task: &ExtractionTask) -> Result<ResultSet, DriverError> {
        let (from, to) = match (task.get_u64(FROM), task.get_u64(TO)) {
            (Some(from), Some(to)) if to >= from => (from, to),
            _ => {
                return Err(DriverError::Extraction(format!(
                    "invalid byte range in task {:?}",
                    task.meta
                )))
            }
        };

        let read = async {
            let mut file = File::open(&self.path).await?;
            file.seek(SeekFrom::Start(from)).await?;
            let mut buffer = vec![0u8; (to - from) as usize];
            file.read_exact(&mut buffer).await?;
            Ok::<_, std::io::Error>(buffer)
        };
        let buffer = read
            .await
            .map_err(|e| DriverError::Extraction(format!("{}: {}", self.path.display(), e)))?;

        Ok(self.parse(&buffer))
    }
}

#[derive(Debug)]
pub struct CsvDestination {
    path: PathBuf,
    delimiter: u8,
    file: Mutex<File>,
}

impl CsvDestination {
    pub async fn open(options: &Options) -> Result<Self, DriverError> {
        let raw = match options.str_opt("path")? {
            Some(path) if !path.is_empty() => path,
            _ => options.require_str("endpoint").map_err(|_| {
                DriverError::Configuration("missing required option `path`".to_string())
            })?,
        };
        let path = absolute(raw)?;
        let truncate = options.bool_opt("truncate")?.unwrap_or(false);
        let delimiter = delimiter(options)?;

        let mut open = OpenOptions::new();
        open.create(true);
        if truncate {
            info!(path = %path.display(), "truncating destination file");
            open.write(true).truncate(true);
        } else {
            open.append(true);
        }
        let file = open
            .open(&path)
            .await
            .map_err(|e| DriverError::Connection(format!("{}: {}", path.display(), e)))?;

        Ok(Self {
            path,
            delimiter,
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn encode(&self, rows: &ResultSet) -> Result<Vec<u8>, csv::Error> {
        let mut buffer = Vec::new();
        {
            let mut writer = csv::WriterBuilder::new()
                .flexible(true)
                .delimiter(self.delimiter)
                .from_writer(&mut buffer);
            for row in rows {
                writer.write_record(row.iter().map(Value::as_bytes))?;
            }
            writer.flush()?;
        }
        Ok(buffer)
    }
}

#[async_trait]
impl Destination for CsvDestination {
    async fn adapt(&self, rows: ResultSet) -> Result<LoadTask, DriverError> {
        Ok(LoadTask::new(rows))
    }

    async fn persist(&self, task: LoadTask) -> Result<usize, DriverError> {
        let rows = task.row_count();
        let buffer = self
            .encode(&task.rows)
            .map_err(|e| DriverError::persistence(rows, e))?;

        // Whole batches only, so concurrent load workers never interleave rows.
        let mut file = self.file.lock().await;
        file.write_all(&buffer)
            .await
            .map_err(|e| DriverError::persistence(rows, e))?;
        file.flush()
            .await
            .map_err(|e| DriverError::persistence(rows, e))?;

        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn options(value: serde_json::Value) -> Options {
        match value {
            serde_json::Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    fn texts(rows: &ResultSet) -> Vec<Vec<String>> {
        rows.iter()
            .map(|row| row.iter().map(|v| v.to_string()).collect())
            .collect()
    }

    async fn source_for(content: &str, extra: serde_json::Value) -> (tempfile::TempDir, CsvSource) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("input.csv");
        std::fs::write(&path, content).unwrap();

        let mut opts = options(extra);
        opts.insert("path".into(), json!(path.to_str().unwrap()));
        let source = CsvSource::open(&opts).await.unwrap();
        (dir, source)
    }

    #[tokio::test]
    async fn test_plan_covers_every_line_with_short_last_chunk() {
        let (_dir, source) = source_for("a,1\nb,2\nc,3\nd,4\ne,5\n", json!({ "limit": 2 })).await;

        let tasks = source.plan().await.unwrap();
        assert_eq!(tasks.len(), 3);
        assert_eq!(tasks[0].get_u64("from"), Some(0));
        assert_eq!(tasks[0].get_u64("to"), Some(8));
        assert_eq!(tasks[2].get_u64("from"), Some(16));
        assert_eq!(tasks[2].get_u64("to"), Some(20));

        let mut all = Vec::new();
        for task in &tasks {
            all.extend(source.extract(task).await.unwrap());
        }
        assert_eq!(all.len(), 5);
        assert_eq!(texts(&all)[4], vec!["e", "5"]);
    }

    #[tokio::test]
    async fn test_plan_handles_missing_trailing_newline_and_offset() {
        let (_dir, source) =
            source_for("h1,h2\nx,1\ny,2", json!({ "limit": 10, "offset": 1 })).await;

        let tasks = source.plan().await.unwrap();
        assert_eq!(tasks.len(), 1);

        let rows = source.extract(&tasks[0]).await.unwrap();
        assert_eq!(texts(&rows), vec![vec!["x", "1"], vec!["y", "2"]]);
    }

    #[tokio::test]
    async fn test_empty_file_plans_nothing() {
        let (_dir, source) = source_for("", json!({})).await;
        assert!(source.plan().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_column_selection_and_separator() {
        let (_dir, source) = source_for(
            "1;a;x\n2;b;y\n",
            json!({ "limit": 5, "column_separator": ";", "columns": [1, 3] }),
        )
        .await;

        let tasks = source.plan().await.unwrap();
        let rows = source.extract(&tasks[0]).await.unwrap();
        assert_eq!(texts(&rows), vec![vec!["1", "x"], vec!["2", "y"]]);
    }

    #[tokio::test]
    async fn test_custom_line_separator() {
        let (_dir, source) =
            source_for("a,1|b,2|c,3", json!({ "limit": 2, "line_separator": "|" })).await;

        let tasks = source.plan().await.unwrap();
        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks[1].get_u64("from"), Some(8));

        let mut all = Vec::new();
        for task in &tasks {
            all.extend(source.extract(task).await.unwrap());
        }
        assert_eq!(texts(&all), vec![vec!["a", "1"], vec!["b", "2"], vec!["c", "3"]]);
    }

    #[tokio::test]
    async fn test_extract_rejects_invalid_range() {
        let (_dir, source) = source_for("a\n", json!({})).await;

        let task = ExtractionTask::new().with("from", 5u64).with("to", 1u64);
        assert!(matches!(
            source.extract(&task).await,
            Err(DriverError::Extraction(_))
        ));
    }

    #[tokio::test]
    async fn test_missing_source_file_is_connection_error() {
        let opts = options(json!({ "path": "/definitely/not/here.csv" }));
        assert!(matches!(
            CsvSource::open(&opts).await,
            Err(DriverError::Connection(_))
        ));
    }

    #[tokio::test]
    async fn test_destination_column_separator() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");

        let opts = options(json!({ "path": path.to_str().unwrap(), "column_separator": ";" }));
        let destination = CsvDestination::open(&opts).await.unwrap();
        let task = destination
            .adapt(vec![vec!["a".into(), "1".into()]])
            .await
            .unwrap();
        destination.persist(task).await.unwrap();
        drop(destination);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "a;1\n");
    }

    #[tokio::test]
    async fn test_destination_appends_and_truncates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        std::fs::write(&path, "old,row\n").unwrap();

        let opts = options(json!({ "endpoint": path.to_str().unwrap() }));
        let destination = CsvDestination::open(&opts).await.unwrap();
        let task = destination
            .adapt(vec![vec!["a".into(), Value::Null], vec!["b".into(), "2".into()]])
            .await
            .unwrap();
        assert_eq!(destination.persist(task).await.unwrap(), 2);
        drop(destination);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "old,row\na,\nb,2\n");

        let opts = options(json!({ "path": path.to_str().unwrap(), "truncate": true }));
        let destination = CsvDestination::open(&opts).await.unwrap();
        let task = destination.adapt(vec![vec!["c".into()]]).await.unwrap();
        destination.persist(task).await.unwrap();
        drop(destination);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "c\n");
    }
}
