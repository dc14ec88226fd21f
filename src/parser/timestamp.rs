use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

/// Handles parsing the usage start/end timestamps found in CUR exports
pub struct TimestampParser;

impl TimestampParser {
    /// Parse a timestamp into a `DateTime<Utc>`.
    /// Accepts RFC 3339 (`Z` or offset), naive ISO 8601, `YYYY-MM-DD HH:MM:SS`
    /// and bare dates (midnight UTC).
    pub fn parse(timestamp_str: &str) -> Option<DateTime<Utc>> {
        let timestamp = timestamp_str.trim();
        if timestamp.is_empty() {
            return None;
        }

        if let Ok(dt) = DateTime::parse_from_rfc3339(timestamp) {
            return Some(dt.with_timezone(&Utc));
        }

        for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%MZ"] {
            if let Ok(naive) = NaiveDateTime::parse_from_str(timestamp, format) {
                return Some(DateTime::from_naive_utc_and_offset(naive, Utc));
            }
        }

        NaiveDate::parse_from_str(timestamp, "%Y-%m-%d")
            .ok()
            .and_then(|date| date.and_hms_opt(0, 0, 0))
            .map(|naive| DateTime::from_naive_utc_and_offset(naive, Utc))
    }
}
