//! Structured logging setup
//!
//! Console output goes to stderr so `--json` reports on stdout stay clean.
//! Supports:
//! - JSON output for log shippers
//! - Pretty formatting for interactive use
//! - Daily rolling log files via `tracing-appender`
//!
//! `RUST_LOG` wins over the configured level when set.

use crate::config::LoggingConfig;
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::{SubscriberInitExt, TryInitError},
    EnvFilter,
};

const LOG_FILE_NAME: &str = "cur-assess.log";

/// Initialize the global subscriber. Keep the returned guard alive for the
/// life of the process when file output is enabled, or buffered lines are lost.
///
/// Fails when a global subscriber is already installed; the existing one
/// stays in place.
pub fn init_logging(config: &LoggingConfig, log_dir: &Path) -> Result<Option<WorkerGuard>, TryInitError> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.level.to_lowercase()));

    match config.output.as_str() {
        "file" => init_file_logging(env_filter, &config.format, log_dir),
        "both" => init_combined_logging(env_filter, &config.format, log_dir),
        _ => init_console_logging(env_filter, &config.format).map(|()| None),
    }
}

fn init_console_logging(filter: EnvFilter, format: &str) -> Result<(), TryInitError> {
    let subscriber = tracing_subscriber::registry().with(filter);

    match format {
        "json" => subscriber
            .with(
                fmt::layer()
                    .json()
                    .with_writer(std::io::stderr)
                    .with_current_span(true)
                    .with_span_list(true)
                    .with_target(true),
            )
            .try_init(),
        _ => subscriber
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .with_ansi(true)
                    .with_span_events(FmtSpan::CLOSE),
            )
            .try_init(),
    }
}

fn init_file_logging(
    filter: EnvFilter,
    format: &str,
    log_dir: &Path,
) -> Result<Option<WorkerGuard>, TryInitError> {
    let file_appender = tracing_appender::rolling::daily(log_dir, LOG_FILE_NAME);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let subscriber = tracing_subscriber::registry().with(filter);

    match format {
        "json" => subscriber
            .with(
                fmt::layer()
                    .json()
                    .with_writer(non_blocking)
                    .with_current_span(true)
                    .with_span_list(true),
            )
            .try_init(),
        _ => subscriber
            .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
            .try_init(),
    }?;

    Ok(Some(guard))
}

fn init_combined_logging(
    filter: EnvFilter,
    format: &str,
    log_dir: &Path,
) -> Result<Option<WorkerGuard>, TryInitError> {
    let file_appender = tracing_appender::rolling::daily(log_dir, LOG_FILE_NAME);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let subscriber = tracing_subscriber::registry().with(filter);

    match format {
        "json" => subscriber
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .with(fmt::layer().json().with_writer(non_blocking))
            .try_init(),
        _ => subscriber
            .with(fmt::layer().with_writer(std::io::stderr))
            .with(fmt::layer().with_ansi(false).with_writer(non_blocking))
            .try_init(),
    }?;

    Ok(Some(guard))
}
