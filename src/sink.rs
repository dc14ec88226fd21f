//! Overflow sinks
//!
//! When a parse is given a [`RecordSink`] and its dedup table grows past the
//! overflow threshold, records are flushed to the sink and the table is
//! cleared. At the end of the parse everything is read back with
//! [`RecordSink::find_all`] and merged by key, so a sink may store several
//! partial records for the same workload.
//!
//! The parser borrows the sink; opening, closing and deleting it is the
//! caller's business. A sink should be dedicated to one parse.

use crate::models::WorkloadRecord;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, BufWriter};

#[async_trait]
pub trait RecordSink: Send {
    async fn save(&mut self, record: &WorkloadRecord) -> Result<()>;

    async fn find_all(&mut self) -> Result<Vec<WorkloadRecord>>;
}

/// Keeps flushed records in a `Vec`. Useful for tests and small inputs.
#[derive(Debug, Default)]
pub struct MemorySink {
    records: Vec<WorkloadRecord>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait]
impl RecordSink for MemorySink {
    async fn save(&mut self, record: &WorkloadRecord) -> Result<()> {
        self.records.push(record.clone());
        Ok(())
    }

    async fn find_all(&mut self) -> Result<Vec<WorkloadRecord>> {
        Ok(self.records.clone())
    }
}

/// Spills records to a JSON-lines file on disk.
pub struct FileSink {
    path: PathBuf,
    writer: Option<BufWriter<File>>,
    saved: usize,
}

impl FileSink {
    /// Create (or truncate) the spill file at `path`.
    pub async fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create spill directory: {}", parent.display()))?;
        }

        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&path)
            .await
            .with_context(|| format!("Failed to open spill file: {}", path.display()))?;

        Ok(Self {
            path,
            writer: Some(BufWriter::new(file)),
            saved: 0,
        })
    }

    pub fn saved(&self) -> usize {
        self.saved
    }
}

#[async_trait]
impl RecordSink for FileSink {
    async fn save(&mut self, record: &WorkloadRecord) -> Result<()> {
        let writer = match self.writer.as_mut() {
            Some(writer) => writer,
            None => {
                let file = OpenOptions::new()
                    .append(true)
                    .open(&self.path)
                    .await
                    .with_context(|| format!("Failed to reopen spill file: {}", self.path.display()))?;
                self.writer.insert(BufWriter::new(file))
            }
        };

        let mut line = serde_json::to_vec(record).context("Failed to serialize record")?;
        line.push(b'\n');
        writer.write_all(&line).await?;
        self.saved += 1;
        Ok(())
    }

    async fn find_all(&mut self) -> Result<Vec<WorkloadRecord>> {
        if let Some(mut writer) = self.writer.take() {
            writer.flush().await?;
        }

        let file = File::open(&self.path)
            .await
            .with_context(|| format!("Failed to read spill file: {}", self.path.display()))?;
        let mut lines = BufReader::new(file).lines();
        let mut records = Vec::with_capacity(self.saved);

        while let Some(line) = lines.next_line().await? {
            if line.trim().is_empty() {
                continue;
            }
            let record: WorkloadRecord = serde_json::from_str(&line)
                .with_context(|| format!("Corrupt record in spill file: {}", self.path.display()))?;
            records.push(record);
        }

        Ok(records)
    }
}
