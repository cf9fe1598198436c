// eduhub-cli/src/config.rs
//! Fixed run configuration

use std::path::PathBuf;

use chrono::{DateTime, TimeZone, Utc};

pub const DATABASE_FILE: &str = "eduhub_db.mlite";
pub const DATABASE_NAME: &str = "eduhub_db";
pub const IMAGES_DIR: &str = "images";
pub const SAMPLE_EXPORT: &str = "data/sample_data.json";

/// Where the run reads and writes, and the instant it treats as "now"
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub database_path: PathBuf,
    pub database_name: String,
    pub images_dir: PathBuf,
    pub sample_export_path: PathBuf,
    /// Stands in for the wall clock so repeated runs produce the same data
    pub reference_time: DateTime<Utc>,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            database_path: PathBuf::from(DATABASE_FILE),
            database_name: DATABASE_NAME.to_string(),
            images_dir: PathBuf::from(IMAGES_DIR),
            sample_export_path: PathBuf::from(SAMPLE_EXPORT),
            reference_time: utc_at(2025, 1, 1, 12),
        }
    }
}

/// UTC instant on the hour
///
/// Only called with literal dates.
///
/// # Panics
///
/// Panics when the literal is not a calendar date, so a typo in the sample
/// data cannot turn into a 1970 timestamp.
pub fn utc_at(year: i32, month: u32, day: u32, hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, hour, 0, 0)
        .single()
        .unwrap_or_else(|| {
            panic!("invalid date literal {year:04}-{month:02}-{day:02} {hour:02}:00 UTC")
        })
}

/// Midnight UTC of a calendar day
pub fn utc_date(year: i32, month: u32, day: u32) -> DateTime<Utc> {
    utc_at(year, month, day, 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.database_path, PathBuf::from("eduhub_db.mlite"));
        assert_eq!(config.database_name, "eduhub_db");
        assert_eq!(config.reference_time.to_rfc3339(), "2025-01-01T12:00:00+00:00");
    }

    #[test]
    fn test_utc_date_is_midnight() {
        assert_eq!(utc_date(2025, 2, 28).to_rfc3339(), "2025-02-28T00:00:00+00:00");
    }

    #[test]
    #[should_panic(expected = "invalid date literal 2025-02-30")]
    fn test_invalid_date_literal_panics() {
        utc_date(2025, 2, 30);
    }
}
