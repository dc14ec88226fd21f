//! Streaming CUR ingestion
//!
//! [`StreamingParser`] reads a Cost and Usage Report export in bounded chunks,
//! cuts it into lines, normalizes each billing row and deduplicates rows into
//! [`WorkloadRecord`]s keyed by `(resource id, service, region)`.
//!
//! The parse is a single cooperative task. It yields to the runtime every
//! `yield_every_lines` lines, between chunks, and around overflow flushes.
//! Every ceiling (records, line length, fields, time, memory) aborts with
//! [`IngestError::ResourceExhausted`] carrying a [`ParseCheckpoint`].

pub mod csv;
pub mod header;
pub mod lines;
pub mod row;
pub mod table;
pub mod timestamp;

pub use header::{Column, ColumnMap};
pub use row::{parse_cost, BillingRow, RowOutcome, RowParser};
pub use table::DedupTable;
pub use timestamp::TimestampParser;

use crate::batch::{batches, BatchTicker, CostSum};
use crate::config::ParserSettings;
use crate::diagnostics::{Diagnostics, SkipReason};
use crate::error::{ExhaustionKind, IngestError, IngestResult, ParseCheckpoint};
use crate::memory::{MemoryMonitor, MemoryPressureLevel, NoopMemoryMonitor};
use crate::models::{
    merge_records, total_cost, ParseMetadata, ParseOutput, ParseProgress, SkippedRows,
    WorkloadRecord,
};
use crate::sink::RecordSink;
use csv::{split_line, SplitError};
use lines::{LineSplitter, LineTooLong};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::{debug, info, info_span, Instrument};
use uuid::Uuid;

type ProgressCallback<'a> = Box<dyn FnMut(ParseProgress) + Send + 'a>;

/// One-shot streaming parser. Build it, attach collaborators, then call one
/// of the `parse_*` methods, which consume it.
pub struct StreamingParser<'a> {
    settings: ParserSettings,
    diagnostics: Arc<Diagnostics>,
    memory: Arc<dyn MemoryMonitor>,
    progress: Option<ProgressCallback<'a>>,
    sink: Option<&'a mut dyn RecordSink>,
}

impl<'a> StreamingParser<'a> {
    pub fn new(settings: ParserSettings) -> Self {
        Self {
            settings,
            diagnostics: Arc::new(Diagnostics::new()),
            memory: Arc::new(NoopMemoryMonitor),
            progress: None,
            sink: None,
        }
    }

    pub fn with_diagnostics(mut self, diagnostics: Arc<Diagnostics>) -> Self {
        self.diagnostics = diagnostics;
        self
    }

    pub fn with_memory_monitor(mut self, monitor: Arc<dyn MemoryMonitor>) -> Self {
        self.memory = monitor;
        self
    }

    /// Called every `progress_interval_lines` lines and once at completion.
    pub fn with_progress<F>(mut self, callback: F) -> Self
    where
        F: FnMut(ParseProgress) + Send + 'a,
    {
        self.progress = Some(Box::new(callback));
        self
    }

    /// Spill records here once the in-memory table passes the overflow threshold.
    pub fn with_sink(mut self, sink: &'a mut dyn RecordSink) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn diagnostics(&self) -> Arc<Diagnostics> {
        Arc::clone(&self.diagnostics)
    }

    pub async fn parse_bytes(self, bytes: &[u8]) -> IngestResult<ParseOutput> {
        let total = bytes.len() as u64;
        self.parse_reader(bytes, Some(total)).await
    }

    pub async fn parse_file(self, path: &Path) -> IngestResult<ParseOutput> {
        let file = tokio::fs::File::open(path).await?;
        let total = file.metadata().await.ok().map(|m| m.len());
        debug!(path = %path.display(), bytes = ?total, "Opened CUR export");
        self.parse_reader(file, total).await
    }

    /// Parse everything `reader` yields. `total_bytes` is only used for
    /// progress percentages and the time budget.
    pub async fn parse_reader<R>(self, reader: R, total_bytes: Option<u64>) -> IngestResult<ParseOutput>
    where
        R: AsyncRead + Unpin,
    {
        let run_id = Uuid::new_v4();
        let span = info_span!("parse", %run_id);
        ParseRun::new(self, total_bytes)
            .execute(reader)
            .instrument(span)
            .await
    }
}

/// Parse a byte slice with default settings.
pub async fn parse_bytes(bytes: &[u8]) -> IngestResult<ParseOutput> {
    StreamingParser::new(ParserSettings::default())
        .parse_bytes(bytes)
        .await
}

/// Mutable state of one parse invocation.
struct ParseRun<'a> {
    settings: ParserSettings,
    diagnostics: Arc<Diagnostics>,
    memory: Arc<dyn MemoryMonitor>,
    progress: Option<ProgressCallback<'a>>,
    sink: Option<&'a mut dyn RecordSink>,

    splitter: LineSplitter,
    rows: Option<RowParser>,
    table: DedupTable,
    ticker: BatchTicker,

    total_bytes: Option<u64>,
    bytes_read: u64,
    line_no: u64,
    last_progress_line: u64,
    skipped: SkippedRows,
    total_rows: u64,
    processed_rows: u64,
    raw_cost: CostSum,
    tax_cost: CostSum,
    flushed: u64,
    compactions: u64,

    started: Instant,
}

impl<'a> ParseRun<'a> {
    fn new(parser: StreamingParser<'a>, total_bytes: Option<u64>) -> Self {
        let StreamingParser {
            settings,
            diagnostics,
            memory,
            progress,
            sink,
        } = parser;

        Self {
            splitter: LineSplitter::new(settings.max_line_length),
            rows: None,
            table: DedupTable::new(settings.max_usage_dates),
            ticker: BatchTicker::new(settings.yield_every_lines),
            total_bytes,
            bytes_read: 0,
            line_no: 0,
            last_progress_line: 0,
            skipped: SkippedRows::default(),
            total_rows: 0,
            processed_rows: 0,
            raw_cost: CostSum::new(),
            tax_cost: CostSum::new(),
            flushed: 0,
            compactions: 0,
            started: Instant::now(),
            settings,
            diagnostics,
            memory,
            progress,
            sink,
        }
    }

    async fn execute<R>(mut self, mut reader: R) -> IngestResult<ParseOutput>
    where
        R: AsyncRead + Unpin,
    {
        info!(
            total_bytes = ?self.total_bytes,
            budget_secs = self.settings.time_budget(self.total_bytes).as_secs(),
            overflow = self.sink.is_some(),
            "Starting CUR parse"
        );

        let mut buffer = vec![0u8; self.settings.chunk_size.max(1)];
        loop {
            let read = reader.read(&mut buffer).await?;
            if read == 0 {
                break;
            }
            self.bytes_read += read as u64;
            self.splitter.push(&buffer[..read]);

            loop {
                let next = self.splitter.next_line();
                match next.map_err(|e| self.line_too_long(e))? {
                    Some(line) => self.handle_line(line).await?,
                    None => break,
                }
            }

            self.check_time()?;
            tokio::task::yield_now().await;
        }

        let trailing = self.splitter.finish();
        if let Some(line) = trailing.map_err(|e| self.line_too_long(e))? {
            self.handle_line(line).await?;
        }

        self.finish().await
    }

    async fn handle_line(&mut self, line: String) -> IngestResult<()> {
        self.line_no += 1;

        let line = match self.rows {
            None => line.trim_start_matches('\u{feff}').to_string(),
            Some(_) => line,
        };
        if line.trim().is_empty() {
            return self.tick().await;
        }

        let fields = match split_line(&line, self.settings.max_fields) {
            Ok(fields) => fields,
            Err(SplitError::TooManyFields { fields }) => {
                return Err(self.exhausted(ExhaustionKind::FieldCount {
                    fields,
                    limit: self.settings.max_fields,
                }));
            }
            Err(SplitError::UnterminatedQuote) if self.rows.is_none() => {
                return Err(IngestError::MalformedHeader(
                    "unterminated quoted field".to_string(),
                ));
            }
            Err(SplitError::UnterminatedQuote) => {
                self.count_row();
                self.skipped.malformed += 1;
                self.diagnostics
                    .malformed_row(self.line_no, "unterminated quoted field");
                return self.after_row().await;
            }
        };

        let Some(rows) = self.rows.as_ref() else {
            let columns = ColumnMap::resolve(&fields)?;
            let missing: Vec<&str> = columns.missing().iter().map(|c| c.name()).collect();
            debug!(columns = fields.len(), missing = ?missing, "Resolved CUR header");
            self.rows = Some(RowParser::new(
                columns,
                self.settings.default_region.clone(),
            ));
            return Ok(());
        };

        let outcome = rows.parse(&fields);
        self.count_row();

        match outcome {
            RowOutcome::Billing(row) => {
                self.raw_cost.add(row.cost);
                self.processed_rows += 1;
                if row.cost == 0.0 {
                    self.skipped.zero_cost += 1;
                    self.diagnostics.zero_cost_row();
                }
                self.table.upsert(row);
                self.enforce_table_limits().await?;
            }
            RowOutcome::Tax(cost) => {
                self.skipped.tax += 1;
                if let Some(cost) = cost {
                    self.tax_cost.add(cost);
                }
                self.diagnostics.row_skipped(SkipReason::Tax, self.line_no);
            }
            RowOutcome::NoProductCode => {
                self.skipped.no_product_code += 1;
                self.diagnostics
                    .row_skipped(SkipReason::NoProductCode, self.line_no);
            }
            RowOutcome::Malformed(reason) => {
                self.skipped.malformed += 1;
                self.diagnostics.malformed_row(self.line_no, reason);
            }
        }

        self.after_row().await
    }

    fn count_row(&mut self) {
        self.total_rows += 1;
        self.diagnostics.row_read();
    }

    /// Per-row bookkeeping: memory sampling, progress and batch boundaries.
    async fn after_row(&mut self) -> IngestResult<()> {
        let memory_interval = self.settings.memory_check_interval_lines.max(1);
        if self.total_rows % memory_interval == 0 {
            self.check_memory().await?;
        }

        let progress_interval = self.settings.progress_interval_lines.max(1);
        if self.line_no - self.last_progress_line >= progress_interval {
            self.last_progress_line = self.line_no;
            self.emit_progress(false);
        }

        self.tick().await
    }

    /// Counts every line, blank or not, toward the yield batch.
    async fn tick(&mut self) -> IngestResult<()> {
        if self.ticker.tick() {
            self.check_time()?;
            tokio::task::yield_now().await;
        }
        Ok(())
    }

    async fn enforce_table_limits(&mut self) -> IngestResult<()> {
        if self.sink.is_some() && self.table.len() > self.settings.overflow_threshold {
            self.flush().await?;
        }

        if self.table.len() > self.settings.max_records {
            return Err(self.exhausted(ExhaustionKind::RecordCount {
                limit: self.settings.max_records,
            }));
        }
        Ok(())
    }

    async fn check_memory(&mut self) -> IngestResult<()> {
        self.memory.observe(self.table.estimated_bytes());
        let ratio = self.memory.usage_ratio();
        let level = MemoryPressureLevel::classify(
            ratio,
            self.settings.high_water_ratio,
            self.settings.critical_ratio,
        );

        match (level, ratio) {
            (MemoryPressureLevel::Critical, Some(usage_ratio)) => {
                Err(self.exhausted(ExhaustionKind::Memory {
                    usage_ratio,
                    critical: self.settings.critical_ratio,
                }))
            }
            (MemoryPressureLevel::High, Some(usage_ratio)) => {
                self.table.compact(self.settings.compacted_usage_dates);
                self.compactions += 1;
                self.diagnostics
                    .compaction(self.line_no, usage_ratio, self.table.len());
                if self.sink.is_some() {
                    self.flush().await?;
                }
                self.memory.observe(self.table.estimated_bytes());
                Ok(())
            }
            _ => Ok(()),
        }
    }

    async fn flush(&mut self) -> IngestResult<()> {
        let Some(sink) = self.sink.as_deref_mut() else {
            return Ok(());
        };
        if self.table.is_empty() {
            return Ok(());
        }

        let records = self.table.drain();
        tokio::task::yield_now().await;
        for (_, batch) in batches(&records, self.settings.flush_batch_size) {
            for record in batch {
                sink.save(record).await.map_err(IngestError::Sink)?;
            }
            tokio::task::yield_now().await;
        }

        self.flushed += records.len() as u64;
        self.diagnostics.overflow_flush(self.line_no, records.len());
        drop(records);
        self.memory.release_hint();
        Ok(())
    }

    async fn finish(mut self) -> IngestResult<ParseOutput> {
        if self.rows.is_none() {
            return Err(IngestError::EmptyInput);
        }

        let date_cap = self.settings.max_usage_dates;
        let in_memory = std::mem::take(&mut self.table).into_records();
        let records: Vec<WorkloadRecord> = match self.sink.as_deref_mut() {
            Some(sink) if self.flushed > 0 => {
                let spilled = sink.find_all().await.map_err(IngestError::Sink)?;
                tokio::task::yield_now().await;
                merge_records([spilled, in_memory], date_cap)
            }
            _ => in_memory,
        };

        self.emit_progress(true);

        let metadata = ParseMetadata {
            total_raw_cost: self.raw_cost.value(),
            total_aggregated_cost: total_cost(&records),
            total_rows: self.total_rows,
            unique_workloads: records.len(),
            processed_rows: self.processed_rows,
            skipped_rows: self.skipped,
            tax_cost: self.tax_cost.value(),
            bytes_processed: self.bytes_consumed(),
            flushed_records: self.flushed,
            compactions: self.compactions,
            elapsed_ms: u64::try_from(self.started.elapsed().as_millis()).unwrap_or(u64::MAX),
        };

        info!(
            rows = metadata.total_rows,
            records = metadata.unique_workloads,
            skipped = metadata.skipped_rows.total_skipped(),
            raw_cost = metadata.total_raw_cost,
            flushed = metadata.flushed_records,
            elapsed_ms = metadata.elapsed_ms,
            "CUR parse complete"
        );

        Ok(ParseOutput { records, metadata })
    }

    fn emit_progress(&mut self, complete: bool) {
        let bytes = self.bytes_consumed();
        let Some(callback) = self.progress.as_mut() else {
            return;
        };
        let mut progress = ParseProgress::new(bytes, self.total_bytes, self.line_no);
        if complete {
            progress.percent = Some(100.0);
        }
        callback(progress);
    }

    /// The budget grows with the bytes actually read, so streams of unknown
    /// or understated size are not held to the base budget.
    fn budget(&self) -> Duration {
        let seen = self
            .total_bytes
            .map_or(self.bytes_read, |total| total.max(self.bytes_read));
        self.settings.time_budget(Some(seen))
    }

    fn check_time(&self) -> IngestResult<()> {
        let elapsed = self.started.elapsed();
        let budget = self.budget();
        if elapsed >= budget {
            return Err(self.exhausted(ExhaustionKind::Time {
                elapsed_secs: elapsed.as_secs(),
                limit_secs: budget.as_secs(),
            }));
        }
        Ok(())
    }

    fn bytes_consumed(&self) -> u64 {
        self.bytes_read
            .saturating_sub(self.splitter.pending_len() as u64)
    }

    fn checkpoint(&self) -> ParseCheckpoint {
        ParseCheckpoint {
            line: self.line_no,
            records: self.table.len(),
            bytes_processed: self.bytes_consumed(),
        }
    }

    fn line_too_long(&self, err: LineTooLong) -> IngestError {
        let LineTooLong(length) = err;
        IngestError::ResourceExhausted {
            kind: ExhaustionKind::LineLength {
                length,
                limit: self.settings.max_line_length,
            },
            checkpoint: ParseCheckpoint {
                line: self.line_no + 1,
                ..self.checkpoint()
            },
        }
    }

    fn exhausted(&self, kind: ExhaustionKind) -> IngestError {
        let checkpoint = self.checkpoint();
        tracing::warn!(kind = %kind, checkpoint = %checkpoint, "Parse ceiling reached");
        IngestError::ResourceExhausted { kind, checkpoint }
    }
}
