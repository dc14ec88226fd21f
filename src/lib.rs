//! CUR Assess Library
//!
//! Streaming ingestion and aggregation of AWS Cost and Usage Report (CUR)
//! CSV exports for cloud-migration assessment. Multi-hundred-megabyte exports
//! are parsed in bounded chunks on a single cooperative task, deduplicated
//! into workload records, and summarized by complexity, service, region and
//! migration readiness.
//!
//! ## Core Features
//!
//! - **Streaming parser**: chunked reads from any `AsyncRead`, quote-aware CSV
//!   splitting, tolerant header resolution, and cooperative yielding
//! - **Resource ceilings**: record count, line length, field count, time and
//!   memory limits that abort with a checkpoint instead of exhausting the host
//! - **Overflow spilling**: records move to a [`sink::RecordSink`] when the
//!   in-memory table grows too large and are merged back at the end
//! - **Batched aggregation**: groupings that never recurse and report
//!   allocation failure as a typed error
//!
//! ## Architecture Overview
//!
//! - [`parser`] - Chunked line reading, header resolution, row normalization, dedup
//! - [`aggregate`] - Complexity, service, region and readiness groupings
//! - [`models`] - Workload records, parse metadata and progress events
//! - [`catalog`] - Product code normalization, instance sizing, target-cloud mapping
//! - [`sink`] - Overflow sinks (in-memory and JSON-lines on disk)
//! - [`memory`] - Memory pressure monitoring
//! - [`diagnostics`] - Shared counters and structured warnings
//! - [`batch`] - Batched iteration and compensated summation
//! - [`config`] - Configuration management with environment variable support
//! - [`logging`] - Structured logging with JSON and pretty-print formats
//! - [`display`] - Terminal and JSON report output
//!
//! ## Main Entry Point
//!
//! ```rust,no_run
//! use cur_assess::{aggregate, parser::StreamingParser, config::ParserSettings};
//! use std::path::Path;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let output = StreamingParser::new(ParserSettings::default())
//!     .with_progress(|p| eprintln!("{} lines", p.lines_processed))
//!     .parse_file(Path::new("cur-export.csv"))
//!     .await?;
//!
//! let summary = aggregate::summarize(&output.records)?;
//! println!("{} workloads, ${:.2}", summary.summary.total_records, summary.summary.total_cost);
//! # Ok(())
//! # }
//! ```

pub mod aggregate;
pub mod batch;
pub mod catalog;
pub mod config;
pub mod diagnostics;
pub mod display;
pub mod error;
pub mod logging;
pub mod memory;
pub mod models;
pub mod parser;
pub mod sink;

pub use aggregate::{AssessmentSummary, Aggregator};
pub use error::{AggregationError, IngestError};
pub use models::*;
pub use parser::StreamingParser;
