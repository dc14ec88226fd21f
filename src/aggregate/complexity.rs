use super::{AggregateBucket, Aggregator, BucketTable, Scored};
use crate::batch::batches;
use crate::error::AggregationResult;
use crate::models::WorkloadRecord;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ComplexityTier {
    Low,
    Medium,
    High,
    VeryHigh,
}

impl ComplexityTier {
    pub const ALL: [ComplexityTier; 4] = [Self::Low, Self::Medium, Self::High, Self::VeryHigh];

    pub fn label(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::VeryHigh => "veryHigh",
        }
    }

    pub fn from_score(score: f64) -> Self {
        if score <= 3.0 {
            Self::Low
        } else if score <= 6.0 {
            Self::Medium
        } else if score <= 8.0 {
            Self::High
        } else {
            Self::VeryHigh
        }
    }

    /// Bracket for records nobody has scored yet: spend stands in for risk.
    pub fn from_cost(monthly_cost: f64) -> Self {
        if monthly_cost < 100.0 {
            Self::Low
        } else if monthly_cost < 1_000.0 {
            Self::Medium
        } else if monthly_cost < 10_000.0 {
            Self::High
        } else {
            Self::VeryHigh
        }
    }
}

/// The record's complexity score, looked up in priority order:
/// the record itself, then `assessment.complexity_score`, then
/// `assessment.complexity.score`.
pub fn complexity_of(record: &WorkloadRecord) -> Option<f64> {
    record.complexity_score.or_else(|| {
        record.assessment.as_ref().and_then(|a| {
            a.complexity_score
                .or_else(|| a.complexity.as_ref().and_then(|c| c.score))
        })
    })
}

/// Always four buckets, in tier order.
pub(super) fn group(agg: &Aggregator, records: &[Scored<'_>]) -> AggregationResult<Vec<AggregateBucket>> {
    let labels = ComplexityTier::ALL.map(ComplexityTier::label);
    let mut table = BucketTable::with_keys("complexity", &labels)?;
    let settings = agg.settings();

    for (_, batch) in batches(records, settings.batch_size) {
        for scored in batch {
            let tier = match scored.complexity {
                Some(score) => ComplexityTier::from_score(score),
                None => ComplexityTier::from_cost(scored.record.monthly_cost),
            };
            table.add(tier.label(), scored, settings.sample_size)?;
        }
    }

    Ok(table
        .into_buckets()
        .into_iter()
        .map(|acc| acc.finish(settings.batch_size))
        .collect())
}
