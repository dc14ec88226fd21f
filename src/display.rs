//! Output Formatting
//!
//! Renders parse metadata and assessment summaries either as colored terminal
//! reports or as pretty-printed JSON (camelCase keys, the same shapes the
//! library types serialize to).
//!
//! Negative totals are printed as-is: a net credit is shown in yellow rather
//! than hidden.

use crate::aggregate::AssessmentSummary;
use crate::diagnostics::DiagnosticsSnapshot;
use crate::models::{ParseMetadata, WorkloadRecord};
use colored::Colorize;
use serde::Serialize;

/// Everything a report prints, ready for JSON.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeReport<'a> {
    pub files: &'a [String],
    pub parse: &'a ParseMetadata,
    pub assessment: &'a AssessmentSummary,
    pub diagnostics: &'a DiagnosticsSnapshot,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParseReport<'a> {
    pub file: &'a str,
    pub metadata: &'a ParseMetadata,
    pub records: &'a [WorkloadRecord],
    pub diagnostics: &'a DiagnosticsSnapshot,
}

pub struct DisplayManager;

impl Default for DisplayManager {
    fn default() -> Self {
        Self::new()
    }
}

fn money(value: f64) -> String {
    if value < 0.0 {
        format!("-${:.2}", value.abs())
    } else {
        format!("${:.2}", value)
    }
}

fn colored_money(value: f64) -> colored::ColoredString {
    if value < 0.0 {
        money(value).bright_yellow().bold()
    } else {
        money(value).bright_green().bold()
    }
}

fn print_json<T: Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json_str) => println!("{}", json_str),
        Err(e) => eprintln!("Error serializing report to JSON: {}", e),
    }
}

impl DisplayManager {
    pub fn new() -> Self {
        Self
    }

    pub fn display_analysis(&self, report: &AnalyzeReport<'_>, json_output: bool) {
        if json_output {
            print_json(report);
            return;
        }

        let summary = &report.assessment.summary;

        println!("\n{}", "=".repeat(80).bright_cyan());
        println!("{}", "AWS Cost and Usage Assessment".bright_white().bold());
        println!("{}", "=".repeat(80).bright_cyan());

        println!(
            "\n{} {} files • {} workloads • {} total\n",
            "📊".bright_yellow(),
            report.files.len().to_string().bright_white().bold(),
            summary.total_records.to_string().bright_white().bold(),
            colored_money(summary.total_cost)
        );

        if summary.net_negative {
            println!(
                "   {} credits exceed usage; net total is negative",
                "note:".bright_yellow()
            );
        }
        if summary.truncated {
            println!(
                "   {} input truncated to the first {} records",
                "warning:".bright_red(),
                summary.total_records + summary.skipped_records
            );
        }

        self.print_parse_quality(report.parse);

        println!("\n{} Services", "🧭".bright_blue());
        for service in &report.assessment.services {
            let target = service.gcp_service.as_deref().unwrap_or("unmapped");
            println!(
                "   {}: {} ({} workloads) → {} [{:?}, {:?}]",
                service.bucket.key.bright_cyan(),
                colored_money(service.bucket.total_cost),
                service.bucket.count.to_string().bright_white(),
                target.bright_white(),
                service.migration_effort,
                service.migration_strategy
            );
        }

        println!("\n{} Regions", "🌍".bright_blue());
        for region in &report.assessment.regions {
            let top: Vec<String> = region
                .top_services
                .iter()
                .zip(&region.top_services_costs)
                .map(|(name, cost)| format!("{} {}", name, money(*cost)))
                .collect();
            println!(
                "   {}: {} ({} workloads) top: {}",
                region.bucket.key.bright_cyan(),
                colored_money(region.bucket.total_cost),
                region.bucket.count.to_string().bright_white(),
                top.join(", ")
            );
        }

        println!("\n{} Complexity", "🧩".bright_blue());
        for bucket in &report.assessment.complexity {
            let average = bucket
                .average_complexity
                .map(|a| format!("avg {:.1}", a))
                .unwrap_or_else(|| "unscored".to_string());
            println!(
                "   {}: {} workloads, {} ({})",
                bucket.key.bright_cyan(),
                bucket.count.to_string().bright_white(),
                colored_money(bucket.total_cost),
                average
            );
        }

        println!("\n{} Readiness", "🚦".bright_blue());
        for tier in &report.assessment.readiness {
            println!(
                "   {}: {} workloads, {}",
                tier.bucket.key.bright_cyan(),
                tier.bucket.count.to_string().bright_white(),
                colored_money(tier.bucket.total_cost)
            );
        }
        println!();
    }

    pub fn display_parse(&self, report: &ParseReport<'_>, json_output: bool) {
        if json_output {
            print_json(report);
            return;
        }

        let metadata = report.metadata;
        println!("\n{} {}", "📄".bright_blue(), report.file.bright_white().bold());
        println!(
            "   Rows: {}  Workloads: {}  Bytes: {}  Time: {}ms",
            metadata.total_rows.to_string().bright_white().bold(),
            metadata.unique_workloads.to_string().bright_white().bold(),
            metadata.bytes_processed,
            metadata.elapsed_ms
        );
        println!(
            "   Raw cost: {}  Aggregated: {}  Tax (excluded): {}",
            colored_money(metadata.total_raw_cost),
            colored_money(metadata.total_aggregated_cost),
            money(metadata.tax_cost)
        );
        self.print_parse_quality(metadata);
        println!();
    }

    fn print_parse_quality(&self, metadata: &ParseMetadata) {
        let skipped = &metadata.skipped_rows;
        println!(
            "   Data quality: {} skipped ({} no product code, {} tax, {} malformed), {} zero-cost kept",
            skipped.total_skipped().to_string().bright_yellow(),
            skipped.no_product_code,
            skipped.tax,
            skipped.malformed,
            skipped.zero_cost
        );
        if metadata.flushed_records > 0 || metadata.compactions > 0 {
            println!(
                "   Spilled {} records, {} compactions",
                metadata.flushed_records, metadata.compactions
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_money_formats_credits() {
        assert_eq!(money(12.5), "$12.50");
        assert_eq!(money(-3.0), "-$3.00");
        assert_eq!(money(0.0), "$0.00");
    }
}
