use super::{rank_by_cost, AggregateBucket, Aggregator, BucketTable, Scored};
use crate::batch::batches;
use crate::catalog::{MigrationEffort, MigrationStrategy};
use crate::error::AggregationResult;
use crate::models::WorkloadType;
use serde::Serialize;

/// Spend on one AWS service, with its target-cloud mapping.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceBucket {
    #[serde(flatten)]
    pub bucket: AggregateBucket,
    pub workload_type: WorkloadType,
    pub gcp_service: Option<String>,
    pub migration_effort: MigrationEffort,
    pub migration_strategy: MigrationStrategy,
}

pub(super) fn group(agg: &Aggregator, records: &[Scored<'_>]) -> AggregationResult<Vec<ServiceBucket>> {
    let settings = agg.settings();
    let mut table = BucketTable::new("service");
    let mut types: Vec<WorkloadType> = Vec::new();

    for (_, batch) in batches(records, settings.batch_size) {
        for scored in batch {
            let pos = table.add(&scored.record.service, scored, settings.sample_size)?;
            if pos == types.len() {
                super::reserve(&mut types, "service types")?;
                types.push(scored.record.workload_type);
            }
        }
    }

    let mapper = agg.mapper();
    let mut services: Vec<ServiceBucket> = table
        .into_buckets()
        .into_iter()
        .zip(types)
        .map(|(acc, workload_type)| {
            let bucket = acc.finish(settings.batch_size);
            let mapping = mapper.map(&bucket.key);
            ServiceBucket {
                bucket,
                workload_type,
                gcp_service: mapping.gcp_service,
                migration_effort: mapping.effort,
                migration_strategy: mapping.strategy,
            }
        })
        .collect();

    rank_by_cost(&mut services, |s| s.bucket.total_cost);
    Ok(services)
}
