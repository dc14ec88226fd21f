//! Row normalization: one split CSV row in, one typed billing row out.
//!
//! This is the only place cost strings are interpreted; everything
//! downstream works with the `f64` produced here.

use crate::catalog::{self, NormalizedService};
use crate::models::{DateRange, WorkloadRecord, WorkloadType};
use crate::parser::header::{Column, ColumnMap};
use crate::parser::timestamp::TimestampParser;
use chrono::{DateTime, Utc};

/// A data row that will create or update a record.
#[derive(Debug, Clone, PartialEq)]
pub struct BillingRow {
    pub resource_id: String,
    pub product_code: String,
    pub service: NormalizedService,
    pub usage_type: String,
    pub region: String,
    pub cost: f64,
    pub usage_amount: f64,
    pub instance_type: Option<String>,
    pub os: Option<String>,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RowOutcome {
    Billing(BillingRow),
    NoProductCode,
    /// Tax line item; carries its cost when parseable.
    Tax(Option<f64>),
    Malformed(String),
}

/// Parse a cost cell: `$`, thousands separators and accounting-style
/// parentheses are accepted. Empty cells are zero.
pub fn parse_cost(raw: &str) -> Option<f64> {
    let trimmed = raw.trim().trim_matches('"').trim();
    if trimmed.is_empty() {
        return Some(0.0);
    }

    let (negative, body) = match trimmed
        .strip_prefix('(')
        .and_then(|s| s.strip_suffix(')'))
    {
        Some(inner) => (true, inner),
        None => (false, trimmed),
    };

    let cleaned: String = body
        .chars()
        .filter(|c| !matches!(c, '$' | ',' | ' '))
        .collect();

    let value: f64 = cleaned.parse().ok()?;
    if !value.is_finite() {
        return None;
    }
    Some(if negative { -value } else { value })
}

/// Strip an availability-zone suffix (`us-east-1a` -> `us-east-1`).
fn normalize_region(raw: &str, default_region: &str) -> String {
    let region = raw.trim();
    if region.is_empty() {
        return default_region.to_string();
    }
    let bytes = region.as_bytes();
    if bytes.len() > 2
        && bytes[bytes.len() - 1].is_ascii_lowercase()
        && bytes[bytes.len() - 2].is_ascii_digit()
        && region.contains('-')
    {
        return region[..region.len() - 1].to_string();
    }
    region.to_string()
}

fn non_empty(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

/// Usage types whose usage amount is a storage quantity (GB-month).
fn is_storage_usage(usage_type: &str) -> bool {
    ["ByteHrs", "VolumeUsage", "TimedStorage", "SnapshotUsage"]
        .iter()
        .any(|marker| usage_type.contains(marker))
}

pub struct RowParser {
    columns: ColumnMap,
    default_region: String,
}

impl RowParser {
    pub fn new(columns: ColumnMap, default_region: String) -> Self {
        Self {
            columns,
            default_region,
        }
    }

    /// Tax is decided before the product code check; tax rows often carry no product.
    pub fn parse(&self, fields: &[String]) -> RowOutcome {
        let product_code = self.columns.get(fields, Column::ProductCode);
        let cost_raw = self.columns.get(fields, Column::Cost);
        let line_item_type = self.columns.get(fields, Column::LineItemType);
        if line_item_type.eq_ignore_ascii_case("tax") || product_code.eq_ignore_ascii_case("tax") {
            return RowOutcome::Tax(parse_cost(cost_raw));
        }

        if !catalog::is_valid_product_code(product_code) {
            return RowOutcome::NoProductCode;
        }

        let Some(cost) = parse_cost(cost_raw) else {
            return RowOutcome::Malformed(format!("cost '{}' is not a number", cost_raw));
        };

        let usage_type = self.columns.get(fields, Column::UsageType);
        let region = normalize_region(
            self.columns.get(fields, Column::Region),
            &self.default_region,
        );
        let service = catalog::normalize_service(product_code, usage_type);

        let resource_id = match self.columns.get(fields, Column::ResourceId) {
            "" => format!("{}|{}|{}", product_code, usage_type, region),
            id => id.to_string(),
        };

        let usage_amount = self
            .columns
            .get(fields, Column::UsageAmount)
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .unwrap_or(0.0);

        RowOutcome::Billing(BillingRow {
            resource_id,
            product_code: product_code.to_string(),
            service,
            usage_type: usage_type.to_string(),
            region,
            cost,
            usage_amount,
            instance_type: non_empty(self.columns.get(fields, Column::InstanceType)),
            os: non_empty(self.columns.get(fields, Column::OperatingSystem)),
            start: TimestampParser::parse(self.columns.get(fields, Column::StartDate)),
            end: TimestampParser::parse(self.columns.get(fields, Column::EndDate)),
        })
    }
}

impl BillingRow {
    /// Build the record this row creates on first sight of its key.
    pub fn into_record(self, date_cap: usize) -> WorkloadRecord {
        let sizing = self
            .instance_type
            .as_deref()
            .and_then(catalog::instance_sizing);
        let storage = if self.service.workload_type == WorkloadType::Storage
            && is_storage_usage(&self.usage_type)
        {
            self.usage_amount.max(0.0)
        } else {
            0.0
        };

        let mut record = WorkloadRecord {
            id: self.resource_id,
            service: self.service.name,
            workload_type: self.service.workload_type,
            monthly_cost: self.cost,
            region: self.region,
            cpu: sizing.map_or(0.0, |s| s.vcpu),
            memory: sizing.map_or(0.0, |s| s.memory_gib),
            storage,
            aws_instance_type: self.instance_type,
            aws_product_code: self.product_code,
            os: self.os,
            date_range: DateRange::default(),
            usage_dates: Vec::new(),
            complexity_score: None,
            assessment: None,
        };
        record.date_range.expand(self.start, self.end);
        if let Some(start) = self.start {
            record.observe_date(start.date_naive(), date_cap);
        }
        record
    }

    /// Fold this row into an existing record with the same key.
    pub fn apply_to(self, record: &mut WorkloadRecord, date_cap: usize) {
        record.monthly_cost += self.cost;
        record.date_range.expand(self.start, self.end);
        if let Some(start) = self.start {
            record.observe_date(start.date_naive(), date_cap);
        }
        if record.workload_type == WorkloadType::Storage && is_storage_usage(&self.usage_type) {
            record.storage = record.storage.max(self.usage_amount);
        }
        if record.aws_instance_type.is_none() && self.instance_type.is_some() {
            if let Some(sizing) = self.instance_type.as_deref().and_then(catalog::instance_sizing) {
                record.cpu = sizing.vcpu;
                record.memory = sizing.memory_gib;
            }
            record.aws_instance_type = self.instance_type;
        }
        if record.os.is_none() {
            record.os = self.os;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parser(header: &str) -> RowParser {
        let headers: Vec<String> = header.split(',').map(str::to_string).collect();
        RowParser::new(ColumnMap::resolve(&headers).unwrap(), "us-east-1".to_string())
    }

    fn fields(line: &str) -> Vec<String> {
        line.split(',').map(str::to_string).collect()
    }

    #[test]
    fn test_parse_cost_variants() {
        assert_eq!(parse_cost("12.5"), Some(12.5));
        assert_eq!(parse_cost("-10.00"), Some(-10.0));
        assert_eq!(parse_cost("$1,234.50"), Some(1234.5));
        assert_eq!(parse_cost("(3.25)"), Some(-3.25));
        assert_eq!(parse_cost("  "), Some(0.0));
        assert_eq!(parse_cost("0.00"), Some(0.0));
        assert_eq!(parse_cost("abc"), None);
        assert_eq!(parse_cost("NaN"), None);
        assert_eq!(parse_cost("inf"), None);
    }

    #[test]
    fn test_region_normalization() {
        assert_eq!(normalize_region("us-east-1a", "x"), "us-east-1");
        assert_eq!(normalize_region("eu-west-2", "x"), "eu-west-2");
        assert_eq!(normalize_region("", "us-east-1"), "us-east-1");
        assert_eq!(normalize_region("global", "x"), "global");
    }

    #[test]
    fn test_billing_row_with_synthesized_id() {
        let p = parser("Service,Resource ID,Usage Type,Region,Cost");
        let RowOutcome::Billing(row) = p.parse(&fields("AmazonS3,,TimedStorage-ByteHrs,,4.20")) else {
            panic!("expected billing row");
        };
        assert_eq!(row.resource_id, "AmazonS3|TimedStorage-ByteHrs|us-east-1");
        assert_eq!(row.service.name, "S3");
        assert_eq!(row.region, "us-east-1");
        assert_eq!(row.cost, 4.2);
    }

    #[test]
    fn test_skip_outcomes() {
        let p = parser("Service,Cost,lineItem/LineItemType");
        assert_eq!(p.parse(&fields(",5.0,Usage")), RowOutcome::NoProductCode);
        assert_eq!(p.parse(&fields("TAX,1.5,Tax")), RowOutcome::Tax(Some(1.5)));
        assert_eq!(p.parse(&fields("AmazonEC2,2.0,Tax")), RowOutcome::Tax(Some(2.0)));
        assert_eq!(p.parse(&fields(",0.75,Tax")), RowOutcome::Tax(Some(0.75)));
        assert!(matches!(
            p.parse(&fields("AmazonEC2,abc,Usage")),
            RowOutcome::Malformed(_)
        ));
    }

    #[test]
    fn test_into_record_sizing_and_dates() {
        let p = parser("Service,Resource ID,Instance Type,Cost,Usage Start Date,Usage End Date");
        let RowOutcome::Billing(row) = p.parse(&fields(
            "AmazonEC2,i-1,m5.xlarge,3.0,2024-01-05T00:00:00Z,2024-01-05T01:00:00Z",
        )) else {
            panic!("expected billing row");
        };

        let record = row.into_record(31);
        assert_eq!(record.cpu, 4.0);
        assert_eq!(record.memory, 16.0);
        assert_eq!(record.usage_dates.len(), 1);
        assert!(record.date_range.start.is_some());
        assert!(record.date_range.end.is_some());
    }
}
