//! Injectable diagnostics
//!
//! One [`Diagnostics`] value is shared (behind an `Arc`) by a parser and an
//! aggregator. Counters are atomics so a snapshot can be taken at any time;
//! warnings are kept as structured events in a bounded list. Every update is
//! also emitted as a `tracing` event, so nothing needs to scrape logs.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use tracing::{debug, warn};

const MAX_WARNINGS: usize = 100;

/// Why a data row did not produce or update a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SkipReason {
    NoProductCode,
    Tax,
    Malformed,
}

/// A structured warning.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum DiagnosticEvent {
    MalformedRow { line: u64, reason: String },
    MemoryCompaction { line: u64, usage_ratio: f64, records: usize },
    OverflowFlush { line: u64, records: usize },
    AggregationTruncated { input: usize, kept: usize },
    AggregationRecordSkipped { record_id: String, reason: String },
}

#[derive(Debug, Default)]
pub struct Diagnostics {
    rows_read: AtomicU64,
    rows_skipped_no_product_code: AtomicU64,
    rows_skipped_tax: AtomicU64,
    rows_skipped_malformed: AtomicU64,
    zero_cost_rows: AtomicU64,
    compactions: AtomicU64,
    records_flushed: AtomicU64,
    aggregation_records_skipped: AtomicU64,
    aggregation_records_truncated: AtomicU64,
    warnings: Mutex<Vec<DiagnosticEvent>>,
    warnings_dropped: AtomicU64,
}

/// Point-in-time copy of all counters.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosticsSnapshot {
    pub rows_read: u64,
    pub rows_skipped_no_product_code: u64,
    pub rows_skipped_tax: u64,
    pub rows_skipped_malformed: u64,
    pub zero_cost_rows: u64,
    pub compactions: u64,
    pub records_flushed: u64,
    pub aggregation_records_skipped: u64,
    pub aggregation_records_truncated: u64,
    pub warnings: Vec<DiagnosticEvent>,
    pub warnings_dropped: u64,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn row_read(&self) {
        self.rows_read.fetch_add(1, Ordering::Relaxed);
    }

    pub fn row_skipped(&self, reason: SkipReason, line: u64) {
        let counter = match reason {
            SkipReason::NoProductCode => &self.rows_skipped_no_product_code,
            SkipReason::Tax => &self.rows_skipped_tax,
            SkipReason::Malformed => &self.rows_skipped_malformed,
        };
        counter.fetch_add(1, Ordering::Relaxed);
        debug!(line = line, reason = ?reason, "Skipped row");
    }

    pub fn malformed_row(&self, line: u64, reason: impl Into<String>) {
        let reason = reason.into();
        self.row_skipped(SkipReason::Malformed, line);
        warn!(line = line, reason = %reason, "Malformed row skipped");
        self.push_warning(DiagnosticEvent::MalformedRow { line, reason });
    }

    pub fn zero_cost_row(&self) {
        self.zero_cost_rows.fetch_add(1, Ordering::Relaxed);
    }

    pub fn compaction(&self, line: u64, usage_ratio: f64, records: usize) {
        self.compactions.fetch_add(1, Ordering::Relaxed);
        warn!(
            line = line,
            usage_ratio = usage_ratio,
            records = records,
            "Memory high-water mark reached, compacted records"
        );
        self.push_warning(DiagnosticEvent::MemoryCompaction {
            line,
            usage_ratio,
            records,
        });
    }

    pub fn overflow_flush(&self, line: u64, records: usize) {
        self.records_flushed
            .fetch_add(records as u64, Ordering::Relaxed);
        debug!(line = line, records = records, "Flushed records to overflow sink");
        self.push_warning(DiagnosticEvent::OverflowFlush { line, records });
    }

    pub fn aggregation_truncated(&self, input: usize, kept: usize) {
        self.aggregation_records_truncated
            .fetch_add((input - kept) as u64, Ordering::Relaxed);
        warn!(input = input, kept = kept, "Aggregation input truncated");
        self.push_warning(DiagnosticEvent::AggregationTruncated { input, kept });
    }

    pub fn aggregation_record_skipped(&self, record_id: &str, reason: impl Into<String>) {
        let reason = reason.into();
        self.aggregation_records_skipped
            .fetch_add(1, Ordering::Relaxed);
        warn!(record_id = %record_id, reason = %reason, "Record skipped during aggregation");
        self.push_warning(DiagnosticEvent::AggregationRecordSkipped {
            record_id: record_id.to_string(),
            reason,
        });
    }

    fn push_warning(&self, event: DiagnosticEvent) {
        let Ok(mut warnings) = self.warnings.lock() else {
            self.warnings_dropped.fetch_add(1, Ordering::Relaxed);
            return;
        };
        if warnings.len() < MAX_WARNINGS {
            warnings.push(event);
        } else {
            self.warnings_dropped.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn snapshot(&self) -> DiagnosticsSnapshot {
        let warnings = self
            .warnings
            .lock()
            .map(|w| w.clone())
            .unwrap_or_default();

        DiagnosticsSnapshot {
            rows_read: self.rows_read.load(Ordering::Relaxed),
            rows_skipped_no_product_code: self.rows_skipped_no_product_code.load(Ordering::Relaxed),
            rows_skipped_tax: self.rows_skipped_tax.load(Ordering::Relaxed),
            rows_skipped_malformed: self.rows_skipped_malformed.load(Ordering::Relaxed),
            zero_cost_rows: self.zero_cost_rows.load(Ordering::Relaxed),
            compactions: self.compactions.load(Ordering::Relaxed),
            records_flushed: self.records_flushed.load(Ordering::Relaxed),
            aggregation_records_skipped: self.aggregation_records_skipped.load(Ordering::Relaxed),
            aggregation_records_truncated: self
                .aggregation_records_truncated
                .load(Ordering::Relaxed),
            warnings,
            warnings_dropped: self.warnings_dropped.load(Ordering::Relaxed),
        }
    }
}
