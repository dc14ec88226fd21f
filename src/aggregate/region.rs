use super::{rank_by_cost, AggregateBucket, Aggregator, BucketTable, Scored};
use crate::batch::batches;
use crate::error::AggregationResult;
use serde::Serialize;

/// Spend in one region with its most expensive services.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegionBucket {
    #[serde(flatten)]
    pub bucket: AggregateBucket,
    pub top_services: Vec<String>,
    pub top_services_costs: Vec<f64>,
}

pub(super) fn group(agg: &Aggregator, records: &[Scored<'_>]) -> AggregationResult<Vec<RegionBucket>> {
    let settings = agg.settings();
    let mut table = BucketTable::new("region");
    let mut per_region: Vec<BucketTable> = Vec::new();

    for (_, batch) in batches(records, settings.batch_size) {
        for scored in batch {
            let pos = table.add(&scored.record.region, scored, settings.sample_size)?;
            if pos == per_region.len() {
                super::reserve(&mut per_region, "region services")?;
                per_region.push(BucketTable::new("region services"));
            }
            per_region[pos].add(&scored.record.service, scored, 0)?;
        }
    }

    let mut regions: Vec<RegionBucket> = table
        .into_buckets()
        .into_iter()
        .zip(per_region)
        .map(|(acc, services)| {
            let mut services: Vec<(String, f64)> = services
                .into_buckets()
                .into_iter()
                .map(|s| {
                    let cost = s.total_cost();
                    (s.finish(settings.batch_size).key, cost)
                })
                .collect();
            rank_by_cost(&mut services, |(_, cost)| *cost);
            services.truncate(settings.top_services);

            let (top_services, top_services_costs): (Vec<String>, Vec<f64>) = services.into_iter().unzip();
            RegionBucket {
                bucket: acc.finish(settings.batch_size),
                top_services,
                top_services_costs,
            }
        })
        .collect();

    rank_by_cost(&mut regions, |r| r.bucket.total_cost);
    Ok(regions)
}
