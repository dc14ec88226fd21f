//! Integration tests for the aggregation engine, fed by real parses

mod common;

use common::{synthetic_export, CurBuilder};
use cur_assess::aggregate::{self, Aggregator};
use cur_assess::config::AggregationSettings;
use cur_assess::diagnostics::Diagnostics;
use cur_assess::models::{ComplexityDetail, WorkloadAssessment, WorkloadRecord};
use cur_assess::parser::parse_bytes;
use std::sync::Arc;

async fn records_from(csv: &str) -> Vec<WorkloadRecord> {
    parse_bytes(csv.as_bytes()).await.unwrap().records
}

#[tokio::test]
async fn test_ten_thousand_rows_three_services() {
    let csv = synthetic_export(
        10_000,
        &[("AmazonEC2", 3.0), ("AmazonS3", 1.0), ("AmazonRDS", 2.0)],
    );
    let records = records_from(&csv).await;
    assert_eq!(records.len(), 10_000);

    let services = aggregate::by_service(&records).unwrap();

    assert_eq!(services.len(), 3);
    let names: Vec<&str> = services.iter().map(|s| s.bucket.key.as_str()).collect();
    assert_eq!(names, ["EC2", "RDS", "S3"]);
    assert!(services
        .windows(2)
        .all(|w| w[0].bucket.total_cost >= w[1].bucket.total_cost));
    assert_eq!(services.iter().map(|s| s.bucket.count).sum::<usize>(), 10_000);
    assert!(services.iter().all(|s| s.bucket.sample_ids.len() <= 10));
}

#[tokio::test]
async fn test_grouping_completeness() {
    let csv = CurBuilder::new()
        .usage("AmazonEC2", "i-1", "us-east-1", "150.00")
        .usage("AmazonS3", "b-1", "eu-west-1", "12000.00")
        .usage("AWSLambda", "f-1", "us-east-1", "-3.00")
        .usage("AmazonRDS", "db-1", "us-west-2", "900.00")
        .build();
    let records = records_from(&csv).await;
    let input_cost: f64 = records.iter().map(|r| r.monthly_cost).sum();

    let complexity = aggregate::by_complexity(&records).unwrap();
    let readiness = aggregate::by_readiness(&records).unwrap();
    let services = aggregate::by_service(&records).unwrap();
    let regions = aggregate::by_region(&records).unwrap();

    assert_eq!(complexity.len(), 4);
    assert_eq!(readiness.len(), 4);
    assert_eq!(complexity.iter().map(|b| b.count).sum::<usize>(), records.len());
    assert_eq!(readiness.iter().map(|b| b.bucket.count).sum::<usize>(), records.len());
    assert_eq!(services.iter().map(|b| b.bucket.count).sum::<usize>(), records.len());
    assert_eq!(regions.iter().map(|b| b.bucket.count).sum::<usize>(), records.len());

    let region_cost: f64 = regions.iter().map(|b| b.bucket.total_cost).sum();
    assert!((region_cost - input_cost).abs() < 1e-9);
}

#[test]
fn test_empty_input_is_all_zero() {
    let summary = aggregate::summarize(&[]).unwrap();

    assert_eq!(summary.summary.total_records, 0);
    assert_eq!(summary.summary.total_cost, 0.0);
    assert_eq!(summary.summary.average_cost, None);
    assert_eq!(summary.complexity.len(), 4);
    assert!(summary.complexity.iter().all(|b| b.count == 0));
    assert!(summary.readiness.iter().all(|b| b.bucket.count == 0));
    assert!(summary.services.is_empty());
    assert!(summary.regions.is_empty());
}

#[tokio::test]
async fn test_summarize_is_idempotent() {
    let csv = synthetic_export(500, &[("AmazonEC2", 0.1), ("AmazonS3", 0.7)]);
    let records = records_from(&csv).await;
    let before = records.clone();

    let aggregator = Aggregator::default();
    let first = aggregator.summarize(&records).unwrap();
    let second = aggregator.summarize(&records).unwrap();

    assert_eq!(records, before);
    assert_eq!(first, second);
    assert_eq!(
        serde_json::to_string(&first).unwrap(),
        serde_json::to_string(&second).unwrap()
    );
}

#[tokio::test]
async fn test_negative_net_total_is_preserved() {
    let csv = CurBuilder::new()
        .usage("AmazonEC2", "i-1", "us-east-1", "10.00")
        .usage("AmazonEC2", "i-2", "us-east-1", "(30.00)")
        .build();
    let records = records_from(&csv).await;

    let summary = aggregate::summarize(&records).unwrap();

    assert_eq!(summary.summary.total_cost, -20.0);
    assert!(summary.summary.net_negative);
    assert!(summary.summary.has_credits);
    assert_eq!(summary.services[0].bucket.total_cost, -20.0);
}

#[test]
fn test_readiness_uses_nested_assessment_scores() {
    let mut record = WorkloadRecord {
        id: "db-1".to_string(),
        service: "RDS".to_string(),
        workload_type: Default::default(),
        monthly_cost: 100.0,
        region: "us-east-1".to_string(),
        cpu: 0.0,
        memory: 0.0,
        storage: 0.0,
        aws_instance_type: None,
        aws_product_code: "AmazonRDS".to_string(),
        os: None,
        date_range: Default::default(),
        usage_dates: Vec::new(),
        complexity_score: None,
        assessment: None,
    };
    record.assessment = Some(WorkloadAssessment {
        complexity_score: None,
        complexity: Some(ComplexityDetail { score: Some(8.0) }),
        risk_factors: vec![
            "engine-version".to_string(),
            "license".to_string(),
            "replication".to_string(),
        ],
    });

    let readiness = aggregate::by_readiness(&[record]).unwrap();

    let not_ready = readiness.iter().find(|b| b.bucket.key == "notReady").unwrap();
    assert_eq!(not_ready.bucket.count, 1);
    assert_eq!(not_ready.bucket.average_complexity, Some(8.0));
    assert_eq!(not_ready.average_readiness, Some(30.0));
}

#[tokio::test]
async fn test_truncation_and_diagnostics() {
    let csv = synthetic_export(50, &[("AmazonEC2", 1.0)]);
    let records = records_from(&csv).await;
    let diagnostics = Arc::new(Diagnostics::new());

    let aggregator = Aggregator::new(AggregationSettings {
        max_records: 20,
        batch_size: 7,
        ..AggregationSettings::default()
    })
    .unwrap()
    .with_diagnostics(Arc::clone(&diagnostics));

    let summary = aggregator.summarize(&records).unwrap();

    assert!(summary.summary.truncated);
    assert_eq!(summary.summary.total_records, 20);
    assert_eq!(summary.summary.total_cost, 20.0);
    let snapshot = diagnostics.snapshot();
    assert_eq!(snapshot.aggregation_records_truncated, 30);
    assert_eq!(snapshot.warnings.len(), 1);
}
