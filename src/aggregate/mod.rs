//! Aggregation engine
//!
//! Groups workload records by complexity, service, region and migration
//! readiness. All groupings iterate in fixed-size batches, grow their bucket
//! tables with `try_reserve`, and never mutate their input, so the same
//! records always produce the same summary.
//!
//! Records with a non-finite cost or a complexity score outside `0..=10` are
//! skipped and reported to [`Diagnostics`]; every other record lands in
//! exactly one bucket per grouping.

mod complexity;
mod readiness;
mod region;
mod service;

pub use complexity::{complexity_of, ComplexityTier};
pub use readiness::{readiness_score, ReadinessBucket, ReadinessTier};
pub use region::RegionBucket;
pub use service::ServiceBucket;

use crate::batch::{batched_mean, batches, CostSum};
use crate::catalog::{DefaultServiceMapper, ServiceMapper};
use crate::config::AggregationSettings;
use crate::diagnostics::Diagnostics;
use crate::error::{AggregationError, AggregationResult};
use crate::models::WorkloadRecord;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// One group of records in a single dimension.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateBucket {
    pub key: String,
    pub count: usize,
    /// Net of credits; may be negative.
    pub total_cost: f64,
    /// `None` when no record in the bucket carries a complexity score.
    pub average_complexity: Option<f64>,
    pub sample_ids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryTotals {
    pub total_records: usize,
    pub total_cost: f64,
    pub average_cost: Option<f64>,
    pub average_complexity: Option<f64>,
    pub scored_records: usize,
    pub service_count: usize,
    pub region_count: usize,
    /// At least one record carries a negative (credit or refund) cost.
    pub has_credits: bool,
    /// The net total is below zero. Reported as-is, never clamped.
    pub net_negative: bool,
    /// Input exceeded `max_records` and only the first records were used.
    pub truncated: bool,
    pub skipped_records: usize,
}

/// The full report consumed by display code.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssessmentSummary {
    pub summary: SummaryTotals,
    pub complexity: Vec<AggregateBucket>,
    pub readiness: Vec<ReadinessBucket>,
    pub services: Vec<ServiceBucket>,
    pub regions: Vec<RegionBucket>,
}

/// A record that passed validation, with its resolved complexity score.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Scored<'r> {
    pub record: &'r WorkloadRecord,
    pub complexity: Option<f64>,
}

pub struct Aggregator {
    settings: AggregationSettings,
    diagnostics: Arc<Diagnostics>,
    mapper: Arc<dyn ServiceMapper>,
}

impl Default for Aggregator {
    fn default() -> Self {
        Self {
            settings: AggregationSettings::default(),
            diagnostics: Arc::new(Diagnostics::new()),
            mapper: Arc::new(DefaultServiceMapper),
        }
    }
}

impl Aggregator {
    pub fn new(settings: AggregationSettings) -> AggregationResult<Self> {
        if settings.batch_size == 0 {
            return Err(AggregationError::InvalidSettings(
                "batch_size must be greater than 0".to_string(),
            ));
        }
        if settings.max_records == 0 {
            return Err(AggregationError::InvalidSettings(
                "max_records must be greater than 0".to_string(),
            ));
        }

        Ok(Self {
            settings,
            ..Self::default()
        })
    }

    pub fn with_diagnostics(mut self, diagnostics: Arc<Diagnostics>) -> Self {
        self.diagnostics = diagnostics;
        self
    }

    pub fn with_mapper(mut self, mapper: Arc<dyn ServiceMapper>) -> Self {
        self.mapper = mapper;
        self
    }

    pub fn settings(&self) -> &AggregationSettings {
        &self.settings
    }

    pub fn by_complexity(&self, records: &[WorkloadRecord]) -> AggregationResult<Vec<AggregateBucket>> {
        let valid = self.prepare(self.truncate(records))?;
        complexity::group(self, &valid)
    }

    pub fn by_service(&self, records: &[WorkloadRecord]) -> AggregationResult<Vec<ServiceBucket>> {
        let valid = self.prepare(self.truncate(records))?;
        service::group(self, &valid)
    }

    pub fn by_region(&self, records: &[WorkloadRecord]) -> AggregationResult<Vec<RegionBucket>> {
        let valid = self.prepare(self.truncate(records))?;
        region::group(self, &valid)
    }

    pub fn by_readiness(&self, records: &[WorkloadRecord]) -> AggregationResult<Vec<ReadinessBucket>> {
        let valid = self.prepare(self.truncate(records))?;
        readiness::group(self, &valid)
    }

    /// Every grouping plus overall totals, computed over one validated pass.
    pub fn summarize(&self, records: &[WorkloadRecord]) -> AggregationResult<AssessmentSummary> {
        let input = self.truncate(records);
        let truncated = input.len() < records.len();
        let valid = self.prepare(input)?;

        let complexity = complexity::group(self, &valid)?;
        let readiness = readiness::group(self, &valid)?;
        let services = service::group(self, &valid)?;
        let regions = region::group(self, &valid)?;

        let mut cost = CostSum::new();
        let mut scores: Vec<f64> = Vec::new();
        let mut has_credits = false;
        for (_, batch) in batches(&valid, self.settings.batch_size) {
            for scored in batch {
                cost.add(scored.record.monthly_cost);
                has_credits |= scored.record.monthly_cost < 0.0;
                if let Some(score) = scored.complexity {
                    reserve(&mut scores, "summary complexity")?;
                    scores.push(score);
                }
            }
        }

        let total_cost = cost.value();
        let summary = SummaryTotals {
            total_records: valid.len(),
            total_cost,
            average_cost: if valid.is_empty() {
                None
            } else {
                Some(total_cost / valid.len() as f64)
            },
            average_complexity: batched_mean(&scores, self.settings.batch_size),
            scored_records: scores.len(),
            service_count: services.len(),
            region_count: regions.len(),
            has_credits,
            net_negative: total_cost < 0.0,
            truncated,
            skipped_records: input.len() - valid.len(),
        };

        if summary.net_negative {
            debug!(total_cost = total_cost, "Net cost is negative; credits exceed usage");
        }

        Ok(AssessmentSummary {
            summary,
            complexity,
            readiness,
            services,
            regions,
        })
    }

    fn truncate<'r>(&self, records: &'r [WorkloadRecord]) -> &'r [WorkloadRecord] {
        let limit = self.settings.max_records;
        if records.len() > limit {
            self.diagnostics.aggregation_truncated(records.len(), limit);
            &records[..limit]
        } else {
            records
        }
    }

    /// Validate in batches, skipping records no grouping can place.
    fn prepare<'r>(&self, records: &'r [WorkloadRecord]) -> AggregationResult<Vec<Scored<'r>>> {
        let mut valid: Vec<Scored<'r>> = Vec::new();
        valid
            .try_reserve(records.len())
            .map_err(|source| AggregationError::CapacityExhausted {
                table: "validated records",
                len: 0,
                source,
            })?;

        for (_, batch) in batches(records, self.settings.batch_size) {
            for record in batch {
                if !record.monthly_cost.is_finite() {
                    self.diagnostics
                        .aggregation_record_skipped(&record.id, "cost is not a finite number");
                    continue;
                }
                let complexity = complexity_of(record);
                if let Some(score) = complexity {
                    if !(0.0..=10.0).contains(&score) {
                        self.diagnostics.aggregation_record_skipped(
                            &record.id,
                            format!("complexity score {} is outside 0-10", score),
                        );
                        continue;
                    }
                }
                valid.push(Scored { record, complexity });
            }
        }

        Ok(valid)
    }

    pub(crate) fn mapper(&self) -> &dyn ServiceMapper {
        self.mapper.as_ref()
    }
}

/// Grow `vec` by one slot or report which table could not grow.
pub(crate) fn reserve<T>(vec: &mut Vec<T>, table: &'static str) -> AggregationResult<()> {
    vec.try_reserve(1)
        .map_err(|source| AggregationError::CapacityExhausted {
            table,
            len: vec.len(),
            source,
        })
}

/// Running totals for one bucket.
#[derive(Debug)]
pub(crate) struct BucketAccumulator {
    key: String,
    count: usize,
    cost: CostSum,
    complexities: Vec<f64>,
    sample_ids: Vec<String>,
}

impl BucketAccumulator {
    fn new(key: String) -> Self {
        Self {
            key,
            count: 0,
            cost: CostSum::new(),
            complexities: Vec::new(),
            sample_ids: Vec::new(),
        }
    }

    pub fn add(&mut self, scored: &Scored<'_>, sample_size: usize) -> AggregationResult<()> {
        self.count += 1;
        self.cost.add(scored.record.monthly_cost);
        if let Some(score) = scored.complexity {
            reserve(&mut self.complexities, "bucket complexity")?;
            self.complexities.push(score);
        }
        if self.sample_ids.len() < sample_size {
            self.sample_ids.push(scored.record.id.clone());
        }
        Ok(())
    }

    pub fn total_cost(&self) -> f64 {
        self.cost.value()
    }

    pub fn finish(self, batch_size: usize) -> AggregateBucket {
        AggregateBucket {
            average_complexity: batched_mean(&self.complexities, batch_size),
            key: self.key,
            count: self.count,
            total_cost: self.cost.value(),
            sample_ids: self.sample_ids,
        }
    }
}

/// Buckets keyed by name, kept in first-seen order.
#[derive(Debug)]
pub(crate) struct BucketTable {
    table: &'static str,
    index: HashMap<String, usize>,
    buckets: Vec<BucketAccumulator>,
}

impl BucketTable {
    pub fn new(table: &'static str) -> Self {
        Self {
            table,
            index: HashMap::new(),
            buckets: Vec::new(),
        }
    }

    /// Start with fixed, always-present buckets.
    pub fn with_keys(table: &'static str, keys: &[&str]) -> AggregationResult<Self> {
        let mut this = Self::new(table);
        for key in keys {
            this.slot(key)?;
        }
        Ok(this)
    }

    /// Position of the bucket for `key`, creating it when first seen.
    pub fn slot(&mut self, key: &str) -> AggregationResult<usize> {
        if let Some(&pos) = self.index.get(key) {
            return Ok(pos);
        }

        reserve(&mut self.buckets, self.table)?;
        let len = self.buckets.len();
        self.index
            .try_reserve(1)
            .map_err(|source| AggregationError::CapacityExhausted {
                table: self.table,
                len,
                source,
            })?;

        self.index.insert(key.to_string(), len);
        self.buckets.push(BucketAccumulator::new(key.to_string()));
        Ok(len)
    }

    pub fn add(&mut self, key: &str, scored: &Scored<'_>, sample_size: usize) -> AggregationResult<usize> {
        let pos = self.slot(key)?;
        self.buckets[pos].add(scored, sample_size)?;
        Ok(pos)
    }

    pub fn into_buckets(self) -> Vec<BucketAccumulator> {
        self.buckets
    }
}

/// Sort by descending total cost; ties keep encounter order.
pub(crate) fn rank_by_cost<T>(items: &mut [T], cost: impl Fn(&T) -> f64) {
    items.sort_by(|a, b| cost(b).total_cmp(&cost(a)));
}

pub fn by_complexity(records: &[WorkloadRecord]) -> AggregationResult<Vec<AggregateBucket>> {
    Aggregator::default().by_complexity(records)
}

pub fn by_service(records: &[WorkloadRecord]) -> AggregationResult<Vec<ServiceBucket>> {
    Aggregator::default().by_service(records)
}

pub fn by_region(records: &[WorkloadRecord]) -> AggregationResult<Vec<RegionBucket>> {
    Aggregator::default().by_region(records)
}

pub fn by_readiness(records: &[WorkloadRecord]) -> AggregationResult<Vec<ReadinessBucket>> {
    Aggregator::default().by_readiness(records)
}

pub fn summarize(records: &[WorkloadRecord]) -> AggregationResult<AssessmentSummary> {
    Aggregator::default().summarize(records)
}
