use std::env;
use std::fs;
use tempfile::tempdir;

#[cfg(test)]
mod config_tests {
    use super::*;
    use cur_assess::config::Config;
    use std::time::Duration;

    #[test]
    fn test_default_config_values() {
        let config = Config::default();

        // Logging defaults
        assert_eq!(config.logging.level, "WARN");
        assert_eq!(config.logging.format, "pretty");
        assert_eq!(config.logging.output, "console");

        // Parser and ceilings
        assert_eq!(config.parser.chunk_size_kb, 8192);
        assert_eq!(config.parser.default_region, "us-east-1");
        assert_eq!(config.limits.max_records, 500_000);
        assert_eq!(config.limits.max_usage_dates, 31);

        // Memory and overflow
        assert_eq!(config.memory.high_water_pct, 80);
        assert_eq!(config.memory.critical_pct, 95);
        assert_eq!(config.overflow.threshold_records, 100_000);

        // Aggregation
        assert_eq!(config.aggregation.batch_size, 1_000);
        assert_eq!(config.aggregation.top_services, 3);

        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_derived_settings() {
        let config = Config::default();
        let parser = config.parser_settings();

        assert_eq!(parser.chunk_size, 8192 * 1024);
        assert!((parser.high_water_ratio - 0.80).abs() < 1e-9);
        assert!((parser.critical_ratio - 0.95).abs() < 1e-9);
        assert_eq!(parser.time_budget(Some(5_500_000)), Duration::from_secs(132));

        let aggregation = config.aggregation_settings();
        assert_eq!(aggregation.sample_size, 10);
    }

    #[test]
    fn test_env_variable_override() {
        env::set_var("CUR_ASSESS_MAX_RECORDS", "1234");
        env::set_var("CUR_ASSESS_DEFAULT_REGION", "eu-west-1");
        env::set_var("CUR_ASSESS_OVERFLOW_THRESHOLD", "99");

        let mut config = Config::default();
        config
            .apply_env_overrides()
            .expect("Failed to apply env overrides");

        assert_eq!(config.limits.max_records, 1234);
        assert_eq!(config.parser.default_region, "eu-west-1");
        assert_eq!(config.overflow.threshold_records, 99);

        env::set_var("CUR_ASSESS_MAX_RECORDS", "lots");
        let mut broken = Config::default();
        assert!(broken.apply_env_overrides().is_err());

        // Cleanup
        env::remove_var("CUR_ASSESS_MAX_RECORDS");
        env::remove_var("CUR_ASSESS_DEFAULT_REGION");
        env::remove_var("CUR_ASSESS_OVERFLOW_THRESHOLD");
    }

    #[test]
    fn test_invalid_memory_thresholds() {
        let mut config = Config::default();
        config.memory.high_water_pct = 96;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.limits.compacted_usage_dates = 40;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_file_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cur-assess.toml");

        let mut config = Config::default();
        config.limits.max_records = 42;
        config.aggregation.sample_size = 3;
        config.save_to_file(&path).unwrap();

        let loaded = Config::load_from_file(&path).unwrap();
        assert_eq!(loaded.limits.max_records, 42);
        assert_eq!(loaded.aggregation.sample_size, 3);
    }

    #[test]
    fn test_partial_config_file_uses_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("partial.toml");
        fs::write(
            &path,
            "[aggregation]\nmax_records = 7\nbatch_size = 2\nsample_size = 1\ntop_services = 5\n",
        )
        .unwrap();

        let loaded = Config::load_from_file(&path).unwrap();
        assert_eq!(loaded.aggregation.max_records, 7);
        assert_eq!(loaded.aggregation.top_services, 5);
        assert_eq!(loaded.limits.max_fields, 1_000);
        assert_eq!(loaded.parser.default_region, "us-east-1");
        assert!(loaded.validate().is_ok());
    }
}
