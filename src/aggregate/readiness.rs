use super::{AggregateBucket, Aggregator, BucketTable, Scored};
use crate::batch::{batched_mean, batches};
use crate::error::AggregationResult;
use crate::models::WorkloadRecord;
use serde::Serialize;

const BASE_SCORE: f64 = 100.0;
const COMPLEXITY_PENALTY: f64 = 5.0;
const RISK_PENALTY: f64 = 10.0;
const COMPLETENESS_BONUS: f64 = 10.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ReadinessTier {
    Ready,
    Conditional,
    NotReady,
    /// No complexity score to derive readiness from.
    Unassessed,
}

impl ReadinessTier {
    pub const ALL: [ReadinessTier; 4] = [
        Self::Ready,
        Self::Conditional,
        Self::NotReady,
        Self::Unassessed,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Self::Ready => "ready",
            Self::Conditional => "conditional",
            Self::NotReady => "notReady",
            Self::Unassessed => "unassessed",
        }
    }

    pub fn from_score(score: f64) -> Self {
        if score >= 70.0 {
            Self::Ready
        } else if score >= 40.0 {
            Self::Conditional
        } else {
            Self::NotReady
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadinessBucket {
    #[serde(flatten)]
    pub bucket: AggregateBucket,
    pub average_readiness: Option<f64>,
}

/// A record is complete when its sizing and usage window are both known.
fn is_complete(record: &WorkloadRecord) -> bool {
    let sized = record.cpu > 0.0 || record.memory > 0.0 || record.storage > 0.0;
    sized && record.date_range.start.is_some()
}

/// Readiness in `[0, 100]` for a record with the given complexity.
pub fn readiness_score(record: &WorkloadRecord, complexity: f64) -> f64 {
    let risks = record
        .assessment
        .as_ref()
        .map_or(0, |a| a.risk_factors.len()) as f64;
    let bonus = if is_complete(record) {
        COMPLETENESS_BONUS
    } else {
        0.0
    };
    (BASE_SCORE - COMPLEXITY_PENALTY * complexity - RISK_PENALTY * risks + bonus).clamp(0.0, 100.0)
}

pub(super) fn group(agg: &Aggregator, records: &[Scored<'_>]) -> AggregationResult<Vec<ReadinessBucket>> {
    let labels = ReadinessTier::ALL.map(ReadinessTier::label);
    let mut table = BucketTable::with_keys("readiness", &labels)?;
    let mut scores: Vec<Vec<f64>> = vec![Vec::new(); ReadinessTier::ALL.len()];
    let settings = agg.settings();

    for (_, batch) in batches(records, settings.batch_size) {
        for scored in batch {
            match scored.complexity {
                Some(complexity) => {
                    let score = readiness_score(scored.record, complexity);
                    let pos = table.add(ReadinessTier::from_score(score).label(), scored, settings.sample_size)?;
                    super::reserve(&mut scores[pos], "readiness scores")?;
                    scores[pos].push(score);
                }
                None => {
                    table.add(ReadinessTier::Unassessed.label(), scored, settings.sample_size)?;
                }
            }
        }
    }

    Ok(table
        .into_buckets()
        .into_iter()
        .zip(scores)
        .map(|(acc, scores)| ReadinessBucket {
            bucket: acc.finish(settings.batch_size),
            average_readiness: batched_mean(&scores, settings.batch_size),
        })
        .collect())
}
