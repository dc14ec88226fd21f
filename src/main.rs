use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use cur_assess::aggregate::Aggregator;
use cur_assess::batch::CostSum;
use cur_assess::config::{Config, ParserSettings};
use cur_assess::diagnostics::Diagnostics;
use cur_assess::display::{AnalyzeReport, DisplayManager, ParseReport};
use cur_assess::error::IngestError;
use cur_assess::logging::init_logging;
use cur_assess::memory::{MemoryMonitor, TrackedMemoryMonitor};
use cur_assess::models::{merge_records, total_cost, ParseMetadata, ParseOutput};
use cur_assess::parser::StreamingParser;
use cur_assess::sink::FileSink;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "cur-assess")]
#[command(about = "Streaming AWS Cost and Usage Report ingestion and migration assessment")]
#[command(version)]
struct Cli {
    /// Configuration file (defaults to cur-assess.toml lookup)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse one or more CUR exports and print the assessment summary
    Analyze {
        /// CSV files or glob patterns
        #[arg(required = true)]
        files: Vec<String>,
        /// Output in JSON format
        #[arg(long)]
        json: bool,
        /// Spill records to disk in this directory once the overflow threshold is hit
        #[arg(long)]
        spill_dir: Option<PathBuf>,
        /// Spill to the configured spill directory
        #[arg(long)]
        spill: bool,
        /// Ceiling on distinct in-memory records per file
        #[arg(long)]
        max_records: Option<usize>,
    },
    /// Parse a single CUR export and print ingestion metadata
    Parse {
        file: PathBuf,
        /// Output in JSON format (includes the records)
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let json = match &cli.command {
        Commands::Analyze { json, .. } | Commands::Parse { json, .. } => *json,
    };

    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => return handle_error(e, json),
    };
    let _guard = match init_logging(&config.logging, &config.paths.log_directory) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("{} logging disabled: {}", "warning:".bright_yellow(), e);
            None
        }
    };

    let result = match cli.command {
        Commands::Analyze {
            files,
            json,
            spill_dir,
            spill,
            max_records,
        } => {
            let spill_dir = spill_dir.or_else(|| spill.then(|| config.paths.spill_directory.clone()));
            run_analyze(&config, &files, json, spill_dir, max_records).await
        }
        Commands::Parse { file, json } => run_parse(&config, &file, json).await,
    };

    match result {
        Ok(()) => Ok(()),
        Err(e) => handle_error(e, json),
    }
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => {
            let mut config = Config::load_from_file(path)?;
            config.apply_env_overrides()?;
            config.validate()?;
            Ok(config)
        }
        None => Config::load(),
    }
}

/// Expand glob patterns; plain paths pass through untouched.
fn expand_inputs(patterns: &[String]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for pattern in patterns {
        let path = PathBuf::from(pattern);
        if path.is_file() {
            files.push(path);
            continue;
        }

        let mut matched = false;
        for entry in glob::glob(pattern).with_context(|| format!("Invalid glob pattern: {}", pattern))? {
            let entry = entry?;
            if entry.is_file() {
                files.push(entry);
                matched = true;
            }
        }
        if !matched {
            anyhow::bail!("No CUR files found matching '{}'", pattern);
        }
    }
    Ok(files)
}

async fn parse_one(
    path: &Path,
    settings: ParserSettings,
    max_memory_mb: usize,
    diagnostics: Arc<Diagnostics>,
    spill_dir: Option<&Path>,
) -> Result<ParseOutput> {
    let label = path.display().to_string();
    let monitor = Arc::new(TrackedMemoryMonitor::from_megabytes(max_memory_mb));
    let parser = StreamingParser::new(settings)
        .with_diagnostics(diagnostics)
        .with_memory_monitor(Arc::clone(&monitor) as Arc<dyn MemoryMonitor>)
        .with_progress(move |progress| {
            debug!(
                file = %label,
                lines = progress.lines_processed,
                percent = ?progress.percent,
                "Parse progress"
            );
        });

    let output = match spill_dir {
        Some(dir) => {
            let spill_path = dir.join(format!("{}.jsonl", Uuid::new_v4()));
            let mut sink = FileSink::create(&spill_path).await?;
            let result = parser.with_sink(&mut sink).parse_file(path).await;
            if let Err(e) = tokio::fs::remove_file(&spill_path).await {
                debug!(path = %spill_path.display(), error = %e, "Could not remove spill file");
            }
            result
        }
        None => parser.parse_file(path).await,
    };

    let stats = monitor.stats();
    debug!(
        file = %path.display(),
        tracked_bytes = stats.current_usage,
        limit_bytes = stats.memory_limit,
        usage_pct = stats.usage_percentage,
        "Tracked memory at end of parse"
    );

    output.with_context(|| format!("Failed to parse {}", path.display()))
}

/// Fold per-file metadata into one view of the whole input.
fn combine_metadata(outputs: &[ParseOutput]) -> ParseMetadata {
    let mut combined = ParseMetadata::default();
    let mut raw = CostSum::new();
    let mut tax = CostSum::new();

    for meta in outputs.iter().map(|o| &o.metadata) {
        raw.add(meta.total_raw_cost);
        tax.add(meta.tax_cost);
        combined.total_rows += meta.total_rows;
        combined.processed_rows += meta.processed_rows;
        combined.skipped_rows.no_product_code += meta.skipped_rows.no_product_code;
        combined.skipped_rows.tax += meta.skipped_rows.tax;
        combined.skipped_rows.zero_cost += meta.skipped_rows.zero_cost;
        combined.skipped_rows.malformed += meta.skipped_rows.malformed;
        combined.bytes_processed += meta.bytes_processed;
        combined.flushed_records += meta.flushed_records;
        combined.compactions += meta.compactions;
        combined.elapsed_ms = combined.elapsed_ms.max(meta.elapsed_ms);
    }

    combined.total_raw_cost = raw.value();
    combined.tax_cost = tax.value();
    combined
}

async fn run_analyze(
    config: &Config,
    patterns: &[String],
    json: bool,
    spill_dir: Option<PathBuf>,
    max_records: Option<usize>,
) -> Result<()> {
    let files = expand_inputs(patterns)?;
    let mut settings = config.parser_settings();
    if let Some(limit) = max_records {
        settings.max_records = limit;
    }

    let diagnostics = Arc::new(Diagnostics::new());
    info!(files = files.len(), spill = spill_dir.is_some(), "Analyzing CUR exports");

    let parses = files.iter().map(|path| {
        parse_one(
            path,
            settings.clone(),
            config.memory.max_memory_mb,
            Arc::clone(&diagnostics),
            spill_dir.as_deref(),
        )
    });
    let outputs = futures::future::try_join_all(parses).await?;

    let mut metadata = combine_metadata(&outputs);
    let records = merge_records(
        outputs.into_iter().map(|o| o.records),
        settings.max_usage_dates,
    );
    metadata.unique_workloads = records.len();
    metadata.total_aggregated_cost = total_cost(&records);

    let aggregator = Aggregator::new(config.aggregation_settings())?
        .with_diagnostics(Arc::clone(&diagnostics));
    let assessment = aggregator.summarize(&records)?;
    let snapshot = diagnostics.snapshot();

    let file_names: Vec<String> = files.iter().map(|f| f.display().to_string()).collect();
    DisplayManager::new().display_analysis(
        &AnalyzeReport {
            files: &file_names,
            parse: &metadata,
            assessment: &assessment,
            diagnostics: &snapshot,
        },
        json,
    );
    Ok(())
}

async fn run_parse(config: &Config, file: &Path, json: bool) -> Result<()> {
    let diagnostics = Arc::new(Diagnostics::new());
    let output = parse_one(
        file,
        config.parser_settings(),
        config.memory.max_memory_mb,
        Arc::clone(&diagnostics),
        None,
    )
    .await?;
    let snapshot = diagnostics.snapshot();

    let file_name = file.display().to_string();
    DisplayManager::new().display_parse(
        &ParseReport {
            file: &file_name,
            metadata: &output.metadata,
            records: if json { output.records.as_slice() } else { &[] },
            diagnostics: &snapshot,
        },
        json,
    );
    Ok(())
}

fn handle_error(e: anyhow::Error, json: bool) -> Result<()> {
    let exhausted = e
        .chain()
        .filter_map(|cause| cause.downcast_ref::<IngestError>())
        .find(|err| err.is_resource_exhaustion());

    if json {
        let mut body = serde_json::json!({ "error": format!("{:#}", e) });
        if let Some(checkpoint) = exhausted.and_then(IngestError::checkpoint) {
            body["checkpoint"] = serde_json::json!(checkpoint);
        }
        println!("{}", body);
    } else {
        eprintln!("{} {:#}", "Error:".bright_red().bold(), e);
        if exhausted.is_some() {
            eprintln!(
                "{} split the export into smaller files, or raise the limit in cur-assess.toml",
                "hint:".bright_yellow()
            );
        }
    }
    process::exit(1);
}
