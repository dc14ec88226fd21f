#![allow(dead_code)]

use anyhow::Result;
use std::fs;
use std::path::{Path, PathBuf};

pub const CUR_HEADER: &str = "identity/LineItemId,lineItem/LineItemType,lineItem/UsageStartDate,lineItem/UsageEndDate,\
lineItem/ProductCode,lineItem/UsageType,lineItem/ResourceId,lineItem/UsageAmount,lineItem/UnblendedCost,\
product/instanceType,product/operatingSystem,product/region";

/// Builds CUR-shaped CSV text row by row.
pub struct CurBuilder {
    content: String,
    next_id: usize,
}

impl Default for CurBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl CurBuilder {
    pub fn new() -> Self {
        let mut content = String::from(CUR_HEADER);
        content.push('\n');
        Self { content, next_id: 0 }
    }

    /// A usage row with a fixed start date.
    pub fn usage(self, product: &str, resource: &str, region: &str, cost: &str) -> Self {
        self.row("Usage", product, "BoxUsage", resource, "", region, cost)
    }

    pub fn instance(self, resource: &str, instance_type: &str, region: &str, cost: &str) -> Self {
        self.row(
            "Usage",
            "AmazonEC2",
            "BoxUsage",
            resource,
            instance_type,
            region,
            cost,
        )
    }

    pub fn tax(self, cost: &str) -> Self {
        self.row("Tax", "AmazonEC2", "", "", "", "", cost)
    }

    #[allow(clippy::too_many_arguments)]
    pub fn row(
        mut self,
        line_item_type: &str,
        product: &str,
        usage_type: &str,
        resource: &str,
        instance_type: &str,
        region: &str,
        cost: &str,
    ) -> Self {
        self.next_id += 1;
        self.content.push_str(&format!(
            "li-{},{},2024-03-01T00:00:00Z,2024-03-01T01:00:00Z,{},{},{},1,{},{},Linux,{}\n",
            self.next_id, line_item_type, product, usage_type, resource, cost, instance_type, region
        ));
        self
    }

    pub fn raw(mut self, line: &str) -> Self {
        self.content.push_str(line);
        self.content.push('\n');
        self
    }

    pub fn build(self) -> String {
        self.content
    }
}

/// `count` rows spread round-robin over `services`, each row its own resource.
pub fn synthetic_export(count: usize, services: &[(&str, f64)]) -> String {
    let mut builder = CurBuilder::new();
    for i in 0..count {
        let (product, cost) = services[i % services.len()];
        builder = builder.usage(product, &format!("res-{}", i), "us-east-1", &format!("{:.2}", cost));
    }
    builder.build()
}

pub fn write_export(dir: &Path, filename: &str, content: &str) -> Result<PathBuf> {
    let path = dir.join(filename);
    fs::write(&path, content)?;
    Ok(path)
}
