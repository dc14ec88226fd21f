//! Service catalog lookups
//!
//! Product-code normalization, instance-type sizing and the AWS to GCP service
//! mapping. The mapping sits behind [`ServiceMapper`] so callers can plug in a
//! richer table; [`DefaultServiceMapper`] covers the common services.

use crate::models::WorkloadType;
use serde::Serialize;

/// `(match keys, canonical name, category)`; keys are lowercase product codes.
const SERVICE_TABLE: &[(&[&str], &str, WorkloadType)] = &[
    (&["amazonec2", "ec2"], "EC2", WorkloadType::Compute),
    (&["amazonebs", "ebs"], "EBS", WorkloadType::Storage),
    (&["amazons3", "s3"], "S3", WorkloadType::Storage),
    (&["amazonefs", "efs"], "EFS", WorkloadType::Storage),
    (&["amazonglacier", "glacier"], "Glacier", WorkloadType::Storage),
    (&["amazonrds", "rds"], "RDS", WorkloadType::Database),
    (&["amazondynamodb", "dynamodb"], "DynamoDB", WorkloadType::Database),
    (&["amazonelasticache", "elasticache"], "ElastiCache", WorkloadType::Database),
    (&["amazonredshift", "redshift"], "Redshift", WorkloadType::Database),
    (&["awslambda", "lambda"], "Lambda", WorkloadType::Function),
    (&["amazonecs", "ecs"], "ECS", WorkloadType::Container),
    (&["amazoneks", "eks"], "EKS", WorkloadType::Container),
    (&["amazonecr", "ecr"], "ECR", WorkloadType::Container),
    (&["amazoncloudfront", "cloudfront"], "CloudFront", WorkloadType::Network),
    (&["amazonvpc", "vpc"], "VPC", WorkloadType::Network),
    (&["awselb", "elasticloadbalancing", "elb"], "ELB", WorkloadType::Network),
    (&["amazonroute53", "route53"], "Route53", WorkloadType::Network),
    (&["awsdatatransfer", "datatransfer"], "DataTransfer", WorkloadType::Network),
    (&["amazonapigateway", "apigateway"], "APIGateway", WorkloadType::Network),
    (&["amazonsqs", "awsqueueservice", "sqs"], "SQS", WorkloadType::Other),
    (&["amazonsns", "sns"], "SNS", WorkloadType::Other),
    (&["amazoncloudwatch", "cloudwatch"], "CloudWatch", WorkloadType::Other),
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedService {
    pub name: String,
    pub workload_type: WorkloadType,
}

/// Canonical service name and category for a product code.
///
/// EC2 line items for EBS volumes and snapshots are reported as `EBS`.
/// Unknown codes keep their name with any `Amazon`/`AWS` prefix stripped.
pub fn normalize_service(product_code: &str, usage_type: &str) -> NormalizedService {
    let code = product_code.trim();
    let key = code.to_ascii_lowercase();

    if key == "amazonec2" || key == "ec2" {
        let usage = usage_type.to_ascii_lowercase();
        if usage.contains("ebs:") || usage.contains("volumeusage") || usage.contains("snapshotusage")
        {
            return NormalizedService {
                name: "EBS".to_string(),
                workload_type: WorkloadType::Storage,
            };
        }
    }

    for (keys, name, workload_type) in SERVICE_TABLE {
        if keys.contains(&key.as_str()) {
            return NormalizedService {
                name: (*name).to_string(),
                workload_type: *workload_type,
            };
        }
    }

    let stripped = code
        .strip_prefix("Amazon")
        .or_else(|| code.strip_prefix("AWS"))
        .filter(|rest| !rest.is_empty())
        .unwrap_or(code);

    NormalizedService {
        name: stripped.to_string(),
        workload_type: WorkloadType::Other,
    }
}

/// A product code is usable when it is non-empty, reasonably short and made
/// of identifier characters.
pub fn is_valid_product_code(code: &str) -> bool {
    let code = code.trim();
    !code.is_empty()
        && code.len() <= 128
        && code
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | ' '))
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InstanceSizing {
    pub vcpu: f64,
    pub memory_gib: f64,
}

/// Burstable `t` sizes: `(size, vcpu, memory GiB)`.
const BURSTABLE_SIZES: &[(&str, f64, f64)] = &[
    ("nano", 2.0, 0.5),
    ("micro", 2.0, 1.0),
    ("small", 2.0, 2.0),
    ("medium", 2.0, 4.0),
    ("large", 2.0, 8.0),
    ("xlarge", 4.0, 16.0),
    ("2xlarge", 8.0, 32.0),
];

/// GiB of memory per vCPU by family letter.
fn memory_per_vcpu(family: &str) -> Option<f64> {
    match family.chars().next()? {
        'm' | 'a' => Some(4.0),
        'c' => Some(2.0),
        'r' | 'z' => Some(8.0),
        'x' => Some(16.0),
        'i' | 'd' => Some(8.0),
        'g' | 'p' => Some(4.0),
        _ => None,
    }
}

fn vcpu_for_size(size: &str) -> Option<f64> {
    match size {
        "medium" => Some(1.0),
        "large" => Some(2.0),
        "xlarge" => Some(4.0),
        "metal" => Some(96.0),
        other => {
            let multiplier: f64 = other.strip_suffix("xlarge")?.parse().ok()?;
            Some(4.0 * multiplier)
        }
    }
}

/// Best-effort vCPU/memory for an instance type such as `m5.2xlarge`,
/// `db.r5.large` or `cache.t3.micro`.
pub fn instance_sizing(instance_type: &str) -> Option<InstanceSizing> {
    let lowered = instance_type.trim().to_ascii_lowercase();
    let bare = lowered
        .strip_prefix("db.")
        .or_else(|| lowered.strip_prefix("cache."))
        .unwrap_or(&lowered);

    let (family, size) = bare.split_once('.')?;

    if family.starts_with('t') {
        return BURSTABLE_SIZES
            .iter()
            .find(|(name, _, _)| *name == size)
            .map(|(_, vcpu, memory_gib)| InstanceSizing {
                vcpu: *vcpu,
                memory_gib: *memory_gib,
            });
    }

    let vcpu = vcpu_for_size(size)?;
    let ratio = memory_per_vcpu(family)?;
    Some(InstanceSizing {
        vcpu,
        memory_gib: vcpu * ratio,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MigrationEffort {
    Low,
    Medium,
    High,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MigrationStrategy {
    Rehost,
    Replatform,
    Refactor,
    Assess,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceMapping {
    pub gcp_service: Option<String>,
    pub effort: MigrationEffort,
    pub strategy: MigrationStrategy,
}

impl ServiceMapping {
    pub fn unmapped() -> Self {
        Self {
            gcp_service: None,
            effort: MigrationEffort::Unknown,
            strategy: MigrationStrategy::Assess,
        }
    }
}

/// Maps a canonical AWS service name to its target-cloud counterpart.
pub trait ServiceMapper: Send + Sync {
    fn map(&self, service: &str) -> ServiceMapping;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultServiceMapper;

const GCP_TABLE: &[(&str, &str, MigrationEffort, MigrationStrategy)] = &[
    ("EC2", "Compute Engine", MigrationEffort::Low, MigrationStrategy::Rehost),
    ("EBS", "Persistent Disk", MigrationEffort::Low, MigrationStrategy::Rehost),
    ("S3", "Cloud Storage", MigrationEffort::Low, MigrationStrategy::Rehost),
    ("EFS", "Filestore", MigrationEffort::Medium, MigrationStrategy::Replatform),
    ("Glacier", "Cloud Storage Archive", MigrationEffort::Low, MigrationStrategy::Rehost),
    ("RDS", "Cloud SQL", MigrationEffort::Medium, MigrationStrategy::Replatform),
    ("DynamoDB", "Firestore", MigrationEffort::High, MigrationStrategy::Refactor),
    ("ElastiCache", "Memorystore", MigrationEffort::Medium, MigrationStrategy::Replatform),
    ("Redshift", "BigQuery", MigrationEffort::High, MigrationStrategy::Refactor),
    ("Lambda", "Cloud Functions", MigrationEffort::Medium, MigrationStrategy::Refactor),
    ("ECS", "Cloud Run", MigrationEffort::Medium, MigrationStrategy::Replatform),
    ("EKS", "Google Kubernetes Engine", MigrationEffort::Medium, MigrationStrategy::Replatform),
    ("ECR", "Artifact Registry", MigrationEffort::Low, MigrationStrategy::Rehost),
    ("CloudFront", "Cloud CDN", MigrationEffort::Low, MigrationStrategy::Replatform),
    ("VPC", "VPC Network", MigrationEffort::Medium, MigrationStrategy::Replatform),
    ("ELB", "Cloud Load Balancing", MigrationEffort::Low, MigrationStrategy::Replatform),
    ("Route53", "Cloud DNS", MigrationEffort::Low, MigrationStrategy::Rehost),
    ("DataTransfer", "Network egress", MigrationEffort::Low, MigrationStrategy::Rehost),
    ("APIGateway", "API Gateway", MigrationEffort::Medium, MigrationStrategy::Replatform),
    ("SQS", "Pub/Sub", MigrationEffort::Medium, MigrationStrategy::Refactor),
    ("SNS", "Pub/Sub", MigrationEffort::Medium, MigrationStrategy::Refactor),
    ("CloudWatch", "Cloud Monitoring", MigrationEffort::Low, MigrationStrategy::Replatform),
];

impl ServiceMapper for DefaultServiceMapper {
    fn map(&self, service: &str) -> ServiceMapping {
        GCP_TABLE
            .iter()
            .find(|(aws, _, _, _)| aws.eq_ignore_ascii_case(service))
            .map(|(_, gcp, effort, strategy)| ServiceMapping {
                gcp_service: Some((*gcp).to_string()),
                effort: *effort,
                strategy: *strategy,
            })
            .unwrap_or_else(ServiceMapping::unmapped)
    }
}
