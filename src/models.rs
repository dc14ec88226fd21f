//! Core Data Models
//!
//! This module defines the data shapes that flow through the assessment
//! pipeline:
//!
//! 1. **Raw Data**: CUR CSV rows, normalized inside [`crate::parser`]
//! 2. **Records**: [`WorkloadRecord`] - one per `(resource id, service, region)`
//! 3. **Parse Output**: [`ParseOutput`] - records plus [`ParseMetadata`]
//! 4. **Reports**: bucket types in [`crate::aggregate`]
//!
//! All public output types serialize to camelCase JSON for the reporting layer.

use crate::batch::CostSum;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Coarse workload category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum WorkloadType {
    Compute,
    Storage,
    Database,
    Network,
    Function,
    Container,
    #[default]
    Other,
}

impl fmt::Display for WorkloadType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Compute => "compute",
            Self::Storage => "storage",
            Self::Database => "database",
            Self::Network => "network",
            Self::Function => "function",
            Self::Container => "container",
            Self::Other => "other",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DateRange {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl DateRange {
    pub fn expand(&mut self, start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) {
        if let Some(start) = start {
            self.start = Some(self.start.map_or(start, |s| s.min(start)));
        }
        if let Some(end) = end {
            self.end = Some(self.end.map_or(end, |e| e.max(end)));
        }
    }
}

/// Complexity detail as produced by a nested assessment.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComplexityDetail {
    pub score: Option<f64>,
}

/// Assessment data attached to a record by an upstream assessor.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkloadAssessment {
    pub complexity_score: Option<f64>,
    pub complexity: Option<ComplexityDetail>,
    #[serde(default)]
    pub risk_factors: Vec<String>,
}

/// The dedup identity of a record.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DedupKey {
    pub resource_id: String,
    pub service: String,
    pub region: String,
}

/// The canonical unit produced by ingestion and consumed by aggregation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkloadRecord {
    pub id: String,
    pub service: String,
    #[serde(rename = "type")]
    pub workload_type: WorkloadType,
    pub monthly_cost: f64,
    pub region: String,
    pub cpu: f64,
    pub memory: f64,
    pub storage: f64,
    pub aws_instance_type: Option<String>,
    pub aws_product_code: String,
    pub os: Option<String>,
    pub date_range: DateRange,
    #[serde(default)]
    pub usage_dates: Vec<NaiveDate>,
    #[serde(default)]
    pub complexity_score: Option<f64>,
    #[serde(default)]
    pub assessment: Option<WorkloadAssessment>,
}

impl WorkloadRecord {
    pub fn key(&self) -> DedupKey {
        DedupKey {
            resource_id: self.id.clone(),
            service: self.service.clone(),
            region: self.region.clone(),
        }
    }

    /// Add a usage date, keeping the list sorted, distinct and at most `cap` long.
    pub fn observe_date(&mut self, date: NaiveDate, cap: usize) {
        if let Err(pos) = self.usage_dates.binary_search(&date) {
            if self.usage_dates.len() < cap {
                self.usage_dates.insert(pos, date);
            }
        }
    }

    /// Keep the first and last observed dates (or fewer if `keep` is smaller).
    pub fn compact(&mut self, keep: usize) {
        let len = self.usage_dates.len();
        if len > keep {
            match keep {
                0 => self.usage_dates.clear(),
                1 => self.usage_dates.truncate(1),
                _ => {
                    let tail = self.usage_dates.split_off(len - 1);
                    self.usage_dates.truncate(keep - 1);
                    self.usage_dates.extend(tail);
                }
            }
        }
        self.usage_dates.shrink_to_fit();
    }

    /// Fold another record with the same key into this one.
    pub fn absorb(&mut self, other: &WorkloadRecord, date_cap: usize) {
        self.monthly_cost += other.monthly_cost;
        self.date_range
            .expand(other.date_range.start, other.date_range.end);
        for date in &other.usage_dates {
            self.observe_date(*date, date_cap);
        }
        if self.aws_instance_type.is_none() {
            self.aws_instance_type = other.aws_instance_type.clone();
        }
        if self.os.is_none() {
            self.os = other.os.clone();
        }
        self.cpu = self.cpu.max(other.cpu);
        self.memory = self.memory.max(other.memory);
        self.storage = self.storage.max(other.storage);
    }

    /// Rough heap footprint, used for memory-pressure estimates.
    pub fn estimated_size(&self) -> usize {
        std::mem::size_of::<Self>()
            + self.id.len()
            + self.service.len()
            + self.region.len()
            + self.aws_product_code.len()
            + self.aws_instance_type.as_ref().map_or(0, String::len)
            + self.os.as_ref().map_or(0, String::len)
            + self.usage_dates.capacity() * std::mem::size_of::<NaiveDate>()
    }
}

/// Merge record sets (e.g. from several files) so every key appears once.
/// First-seen order is preserved.
pub fn merge_records(
    sets: impl IntoIterator<Item = Vec<WorkloadRecord>>,
    date_cap: usize,
) -> Vec<WorkloadRecord> {
    let mut index: HashMap<DedupKey, usize> = HashMap::new();
    let mut merged: Vec<WorkloadRecord> = Vec::new();

    for set in sets {
        for record in set {
            match index.get(&record.key()) {
                Some(&pos) => merged[pos].absorb(&record, date_cap),
                None => {
                    index.insert(record.key(), merged.len());
                    merged.push(record);
                }
            }
        }
    }

    merged
}

/// Sum of `monthly_cost` over records.
pub fn total_cost(records: &[WorkloadRecord]) -> f64 {
    let mut sum = CostSum::new();
    sum.extend(records.iter().map(|r| r.monthly_cost));
    sum.value()
}

/// Emitted periodically during ingestion. Advisory only.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParseProgress {
    pub bytes_processed: u64,
    pub total_bytes: Option<u64>,
    pub percent: Option<f64>,
    pub lines_processed: u64,
}

impl ParseProgress {
    pub fn new(bytes_processed: u64, total_bytes: Option<u64>, lines_processed: u64) -> Self {
        let percent = total_bytes.map(|total| {
            if total == 0 {
                100.0
            } else {
                (bytes_processed as f64 / total as f64 * 100.0).min(100.0)
            }
        });
        Self {
            bytes_processed,
            total_bytes,
            percent,
            lines_processed,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SkippedRows {
    pub no_product_code: u64,
    pub tax: u64,
    /// Informational: zero-cost rows are kept.
    pub zero_cost: u64,
    pub malformed: u64,
}

impl SkippedRows {
    pub fn total_skipped(&self) -> u64 {
        self.no_product_code + self.tax + self.malformed
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParseMetadata {
    /// Sum of every kept row's cost, negatives included, before dedup.
    pub total_raw_cost: f64,
    pub total_aggregated_cost: f64,
    /// Data rows read (header excluded).
    pub total_rows: u64,
    pub unique_workloads: usize,
    pub processed_rows: u64,
    pub skipped_rows: SkippedRows,
    /// Tax rows are excluded from records and raw cost; their sum lands here.
    pub tax_cost: f64,
    pub bytes_processed: u64,
    pub flushed_records: u64,
    pub compactions: u64,
    pub elapsed_ms: u64,
}

impl ParseMetadata {
    /// Raw and aggregated totals agree within `tolerance`.
    pub fn is_cost_conserved(&self, tolerance: f64) -> bool {
        (self.total_raw_cost - self.total_aggregated_cost).abs() <= tolerance
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParseOutput {
    pub records: Vec<WorkloadRecord>,
    pub metadata: ParseMetadata,
}
