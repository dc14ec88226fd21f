//! Error taxonomy for ingestion and aggregation.
//!
//! Row-level problems never show up here: they are counted in
//! [`crate::models::SkippedRows`] and [`crate::diagnostics::Diagnostics`].
//! Everything in this module is terminal for the operation that raised it.

use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Where the parser was when it gave up.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParseCheckpoint {
    pub line: u64,
    pub records: usize,
    pub bytes_processed: u64,
}

impl fmt::Display for ParseCheckpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "line {}, {} records, {} bytes processed",
            self.line, self.records, self.bytes_processed
        )
    }
}

/// Which ceiling was breached.
#[derive(Debug, Clone, PartialEq)]
pub enum ExhaustionKind {
    RecordCount { limit: usize },
    LineLength { length: usize, limit: usize },
    FieldCount { fields: usize, limit: usize },
    Time { elapsed_secs: u64, limit_secs: u64 },
    Memory { usage_ratio: f64, critical: f64 },
}

impl fmt::Display for ExhaustionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RecordCount { limit } => {
                write!(f, "distinct workload records exceeded the limit of {}", limit)
            }
            Self::LineLength { length, limit } => {
                write!(f, "line of {} bytes exceeds the limit of {}", length, limit)
            }
            Self::FieldCount { fields, limit } => {
                write!(f, "row has {} fields, limit is {}", fields, limit)
            }
            Self::Time { elapsed_secs, limit_secs } => write!(
                f,
                "parsing took {}s, time budget is {}s",
                elapsed_secs, limit_secs
            ),
            Self::Memory {
                usage_ratio,
                critical,
            } => write!(
                f,
                "memory usage at {:.0}% crossed the critical mark of {:.0}%",
                usage_ratio * 100.0,
                critical * 100.0
            ),
        }
    }
}

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("required column '{column}' not found in header (looked for: {aliases})")]
    MissingColumn { column: &'static str, aliases: String },

    #[error("header row is not valid CSV: {0}")]
    MalformedHeader(String),

    #[error("input contains no header row")]
    EmptyInput,

    #[error("parse aborted: {kind} at {checkpoint}; try splitting the export or raising the limit")]
    ResourceExhausted {
        kind: ExhaustionKind,
        checkpoint: ParseCheckpoint,
    },

    #[error("overflow sink failed: {0}")]
    Sink(#[source] anyhow::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl IngestError {
    pub fn checkpoint(&self) -> Option<ParseCheckpoint> {
        match self {
            Self::ResourceExhausted { checkpoint, .. } => Some(*checkpoint),
            _ => None,
        }
    }

    pub fn is_resource_exhaustion(&self) -> bool {
        matches!(self, Self::ResourceExhausted { .. })
    }
}

#[derive(Debug, Error)]
pub enum AggregationError {
    #[error("could not grow {table} table past {len} entries; summarize smaller batches of records")]
    CapacityExhausted {
        table: &'static str,
        len: usize,
        #[source]
        source: std::collections::TryReserveError,
    },

    #[error("invalid aggregation settings: {0}")]
    InvalidSettings(String),
}

pub type IngestResult<T> = std::result::Result<T, IngestError>;
pub type AggregationResult<T> = std::result::Result<T, AggregationError>;
