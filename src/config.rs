//! Production configuration system
//!
//! Provides centralized configuration management with:
//! - Environment variable support
//! - Config file loading (optional)
//! - Runtime defaults
//! - Validation and type safety
//!
//! Library entry points do not read the global configuration themselves;
//! they take [`ParserSettings`] / [`AggregationSettings`], which can be
//! derived from a [`Config`] or built directly.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Main configuration structure
///
/// Sections missing from a config file fall back to their defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Logging configuration
    pub logging: LoggingConfig,

    /// Streaming parser configuration
    pub parser: ParserConfig,

    /// Hard ceilings enforced while parsing
    pub limits: LimitsConfig,

    /// Memory pressure thresholds
    pub memory: MemoryConfig,

    /// Overflow sink behaviour
    pub overflow: OverflowConfig,

    /// Aggregation engine configuration
    pub aggregation: AggregationConfig,

    /// Paths configuration
    pub paths: PathsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
    pub output: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParserConfig {
    pub chunk_size_kb: usize,
    pub yield_every_lines: usize,
    pub progress_interval_lines: u64,
    pub memory_check_interval_lines: u64,
    pub default_region: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    pub max_records: usize,
    pub max_line_length: usize,
    pub max_fields: usize,
    pub max_usage_dates: usize,
    pub compacted_usage_dates: usize,
    pub time_budget_base_secs: u64,
    pub time_budget_secs_per_mb: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    pub max_memory_mb: usize,
    pub high_water_pct: usize,
    pub critical_pct: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OverflowConfig {
    pub threshold_records: usize,
    pub flush_batch_size: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregationConfig {
    pub max_records: usize,
    pub batch_size: usize,
    pub sample_size: usize,
    pub top_services: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    pub log_directory: PathBuf,
    pub spill_directory: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            logging: LoggingConfig {
                level: "WARN".to_string(),
                format: "pretty".to_string(),
                output: "console".to_string(),
            },
            parser: ParserConfig {
                chunk_size_kb: 8 * 1024,
                yield_every_lines: 1000,
                progress_interval_lines: 10_000,
                memory_check_interval_lines: 10_000,
                default_region: "us-east-1".to_string(),
            },
            limits: LimitsConfig {
                max_records: 500_000,
                max_line_length: 1_000_000,
                max_fields: 1_000,
                max_usage_dates: 31,
                compacted_usage_dates: 2,
                time_budget_base_secs: 120,
                time_budget_secs_per_mb: 2,
            },
            memory: MemoryConfig {
                max_memory_mb: 1024,
                high_water_pct: 80,
                critical_pct: 95,
            },
            overflow: OverflowConfig {
                threshold_records: 100_000,
                flush_batch_size: 1_000,
            },
            aggregation: AggregationConfig {
                max_records: 1_000_000,
                batch_size: 1_000,
                sample_size: 10,
                top_services: 3,
            },
            paths: PathsConfig {
                log_directory: PathBuf::from("logs"),
                spill_directory: env::temp_dir().join("cur-assess"),
            },
        }
    }
}

impl Config {
    /// Load configuration from environment, file, and defaults
    pub fn load() -> Result<Self> {
        let mut config = Config::default();

        let config_paths = [
            PathBuf::from("cur-assess.toml"),
            PathBuf::from(".cur-assess.toml"),
            dirs::config_dir()
                .map(|d| d.join("cur-assess").join("config.toml"))
                .unwrap_or_default(),
        ];

        for path in &config_paths {
            if path.is_file() {
                info!(config_file = %path.display(), "Loading configuration from file");
                config = Self::load_from_file(path)?;
                break;
            }
        }

        config.apply_env_overrides()?;
        config.validate()?;

        Ok(config)
    }

    /// Load configuration from TOML file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Apply environment variable overrides
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(val) = env::var("LOG_LEVEL") {
            self.logging.level = val;
        }
        if let Ok(val) = env::var("LOG_FORMAT") {
            self.logging.format = val;
        }
        if let Ok(val) = env::var("LOG_OUTPUT") {
            self.logging.output = val;
        }

        if let Ok(val) = env::var("CUR_ASSESS_CHUNK_SIZE_KB") {
            self.parser.chunk_size_kb = val.parse().context("Invalid CUR_ASSESS_CHUNK_SIZE_KB")?;
        }
        if let Ok(val) = env::var("CUR_ASSESS_DEFAULT_REGION") {
            self.parser.default_region = val;
        }

        if let Ok(val) = env::var("CUR_ASSESS_MAX_RECORDS") {
            self.limits.max_records = val.parse().context("Invalid CUR_ASSESS_MAX_RECORDS")?;
        }
        if let Ok(val) = env::var("CUR_ASSESS_MAX_LINE_LENGTH") {
            self.limits.max_line_length = val
                .parse()
                .context("Invalid CUR_ASSESS_MAX_LINE_LENGTH")?;
        }
        if let Ok(val) = env::var("CUR_ASSESS_TIME_BUDGET_SECS") {
            self.limits.time_budget_base_secs = val
                .parse()
                .context("Invalid CUR_ASSESS_TIME_BUDGET_SECS")?;
        }

        if let Ok(val) = env::var("CUR_ASSESS_MAX_MEMORY_MB") {
            self.memory.max_memory_mb = val.parse().context("Invalid CUR_ASSESS_MAX_MEMORY_MB")?;
        }

        if let Ok(val) = env::var("CUR_ASSESS_OVERFLOW_THRESHOLD") {
            self.overflow.threshold_records = val
                .parse()
                .context("Invalid CUR_ASSESS_OVERFLOW_THRESHOLD")?;
        }

        if let Ok(val) = env::var("CUR_ASSESS_AGGREGATION_BATCH_SIZE") {
            self.aggregation.batch_size = val
                .parse()
                .context("Invalid CUR_ASSESS_AGGREGATION_BATCH_SIZE")?;
        }

        if let Ok(val) = env::var("CUR_ASSESS_LOG_DIR") {
            self.paths.log_directory = PathBuf::from(val);
        }
        if let Ok(val) = env::var("CUR_ASSESS_SPILL_DIR") {
            self.paths.spill_directory = PathBuf::from(val);
        }

        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.parser.chunk_size_kb == 0 {
            return Err(anyhow::anyhow!("Chunk size must be greater than 0"));
        }
        if self.parser.yield_every_lines == 0 {
            return Err(anyhow::anyhow!("yield_every_lines must be greater than 0"));
        }
        if self.parser.progress_interval_lines == 0 || self.parser.memory_check_interval_lines == 0
        {
            return Err(anyhow::anyhow!("Progress and memory check intervals must be greater than 0"));
        }

        if self.limits.max_records == 0 {
            return Err(anyhow::anyhow!("max_records must be greater than 0"));
        }
        if self.limits.max_fields == 0 || self.limits.max_line_length == 0 {
            return Err(anyhow::anyhow!("Line length and field limits must be greater than 0"));
        }
        if self.limits.compacted_usage_dates > self.limits.max_usage_dates {
            return Err(anyhow::anyhow!(
                "compacted_usage_dates ({}) cannot exceed max_usage_dates ({})",
                self.limits.compacted_usage_dates,
                self.limits.max_usage_dates
            ));
        }

        if self.memory.max_memory_mb < 64 {
            warn!(
                max_memory_mb = self.memory.max_memory_mb,
                "Memory limit is very low, large exports will abort early"
            );
        }
        if self.memory.high_water_pct == 0
            || self.memory.high_water_pct >= self.memory.critical_pct
            || self.memory.critical_pct > 100
        {
            return Err(anyhow::anyhow!(
                "Memory thresholds must satisfy 0 < high_water_pct < critical_pct <= 100, got {} / {}",
                self.memory.high_water_pct,
                self.memory.critical_pct
            ));
        }

        if self.overflow.flush_batch_size == 0 {
            return Err(anyhow::anyhow!("Overflow flush batch size must be greater than 0"));
        }
        if self.overflow.threshold_records > self.limits.max_records {
            warn!(
                threshold_records = self.overflow.threshold_records,
                max_records = self.limits.max_records,
                "Overflow threshold is above the record ceiling, spilling will never trigger"
            );
        }

        if self.aggregation.batch_size == 0 {
            return Err(anyhow::anyhow!("Aggregation batch size must be greater than 0"));
        }
        if self.aggregation.max_records == 0 {
            return Err(anyhow::anyhow!("Aggregation max_records must be greater than 0"));
        }

        Ok(())
    }

    /// Save current configuration to file
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize configuration")?;

        fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        info!(path = %path.display(), "Configuration saved to file");

        Ok(())
    }

    pub fn parser_settings(&self) -> ParserSettings {
        ParserSettings {
            chunk_size: self.parser.chunk_size_kb * 1024,
            yield_every_lines: self.parser.yield_every_lines,
            progress_interval_lines: self.parser.progress_interval_lines,
            memory_check_interval_lines: self.parser.memory_check_interval_lines,
            default_region: self.parser.default_region.clone(),
            max_records: self.limits.max_records,
            max_line_length: self.limits.max_line_length,
            max_fields: self.limits.max_fields,
            max_usage_dates: self.limits.max_usage_dates,
            compacted_usage_dates: self.limits.compacted_usage_dates,
            time_budget_base: Duration::from_secs(self.limits.time_budget_base_secs),
            time_budget_per_mb: Duration::from_secs(self.limits.time_budget_secs_per_mb),
            high_water_ratio: self.memory.high_water_pct as f64 / 100.0,
            critical_ratio: self.memory.critical_pct as f64 / 100.0,
            overflow_threshold: self.overflow.threshold_records,
            flush_batch_size: self.overflow.flush_batch_size,
        }
    }

    pub fn aggregation_settings(&self) -> AggregationSettings {
        AggregationSettings {
            max_records: self.aggregation.max_records,
            batch_size: self.aggregation.batch_size,
            sample_size: self.aggregation.sample_size,
            top_services: self.aggregation.top_services,
        }
    }
}

/// Everything one parse invocation needs, resolved to concrete units.
#[derive(Debug, Clone)]
pub struct ParserSettings {
    pub chunk_size: usize,
    pub yield_every_lines: usize,
    pub progress_interval_lines: u64,
    pub memory_check_interval_lines: u64,
    pub default_region: String,
    pub max_records: usize,
    pub max_line_length: usize,
    pub max_fields: usize,
    pub max_usage_dates: usize,
    pub compacted_usage_dates: usize,
    pub time_budget_base: Duration,
    pub time_budget_per_mb: Duration,
    pub high_water_ratio: f64,
    pub critical_ratio: f64,
    pub overflow_threshold: usize,
    pub flush_batch_size: usize,
}

impl Default for ParserSettings {
    fn default() -> Self {
        Config::default().parser_settings()
    }
}

impl ParserSettings {
    /// Wall-clock budget for an input of `total_bytes`; unknown size gets the base budget.
    pub fn time_budget(&self, total_bytes: Option<u64>) -> Duration {
        let mb = total_bytes.map(|b| b.div_ceil(1_000_000)).unwrap_or(0);
        let scaled = self
            .time_budget_per_mb
            .checked_mul(u32::try_from(mb).unwrap_or(u32::MAX))
            .unwrap_or(Duration::MAX);
        self.time_budget_base.saturating_add(scaled)
    }
}

#[derive(Debug, Clone)]
pub struct AggregationSettings {
    pub max_records: usize,
    pub batch_size: usize,
    pub sample_size: usize,
    pub top_services: usize,
}

impl Default for AggregationSettings {
    fn default() -> Self {
        Config::default().aggregation_settings()
    }
}
