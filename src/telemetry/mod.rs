//! Environmental telemetry ingestion.
//!
//! Telemetry loggers write arbitrary-width CSV rows with separate `Date`
//! and `Time` columns. Timestamps are reconstructed from those two fields;
//! all sensor columns are carried opaquely into the final merge.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use tracing::{info, warn};

use crate::constants::MIN_TELEMETRY_FILE_BYTES;
use crate::error::{Error, Result};

/// One telemetry row with its reconstructed timestamp.
#[derive(Debug, Clone)]
pub struct TelemetryRow {
    /// Reconstructed absolute timestamp.
    pub timestamp: NaiveDateTime,
    /// Sensor values keyed by column name.
    pub values: HashMap<String, String>,
}

/// A loaded telemetry time series, sorted ascending by timestamp.
#[derive(Debug, Clone, Default)]
pub struct TelemetrySeries {
    /// Union of sensor column names in first-seen order.
    pub columns: Vec<String>,
    /// Rows sorted ascending by timestamp.
    pub rows: Vec<TelemetryRow>,
}

/// Reconstruct a timestamp from separate date and time strings.
///
/// Supported date formats: `DD.MM.YYYY`, `DD.MM.YY` (interpreted as 20YY)
/// and `YYYY-MM-DD`. The time part accepts `HH:MM:SS` or `HH:MM`.
pub fn parse_timestamp(date: &str, time: &str) -> Option<NaiveDateTime> {
    let normalized = date.trim().replace('-', ".");
    let parts: Vec<&str> = normalized.split('.').collect();
    if parts.len() != 3 {
        return None;
    }

    // A four-digit first component means the date is already year-first.
    let (year, month, day) = if parts[0].len() == 4 {
        (parts[0].to_string(), parts[1], parts[2])
    } else {
        let year = if parts[2].len() == 2 {
            format!("20{}", parts[2])
        } else {
            parts[2].to_string()
        };
        (year, parts[1], parts[0])
    };

    let iso = format!("{year}-{month:0>2}-{day:0>2} {}", time.trim());
    NaiveDateTime::parse_from_str(&iso, "%Y-%m-%d %H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(&iso, "%Y-%m-%d %H:%M"))
        .ok()
}

/// Load every telemetry CSV from a directory into one sorted series.
///
/// Files smaller than a few bytes are skipped as empty; files without both
/// `Date` and `Time` columns are skipped with a warning; rows whose
/// timestamp cannot be reconstructed are dropped. An entirely empty result
/// is an error, because the merge stage cannot run without telemetry.
pub fn load_telemetry_dir(dir: &Path) -> Result<TelemetrySeries> {
    if !dir.is_dir() {
        return Err(Error::InputNotFound {
            path: dir.to_path_buf(),
        });
    }

    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| {
            p.is_file()
                && p.extension()
                    .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"))
        })
        .collect();
    files.sort();

    let mut series = TelemetrySeries::default();

    for file in &files {
        let size = std::fs::metadata(file).map(|m| m.len()).unwrap_or(0);
        if size < MIN_TELEMETRY_FILE_BYTES {
            continue;
        }
        if let Err(e) = load_telemetry_file(file, &mut series) {
            warn!("Skipping {}: {e}", file.display());
        }
    }

    if series.rows.is_empty() {
        return Err(Error::TelemetryEmpty {
            path: dir.to_path_buf(),
        });
    }

    series
        .rows
        .sort_by_key(|row| row.timestamp);

    info!(
        "Telemetry ready: {} rows from {} file(s)",
        series.rows.len(),
        files.len()
    );
    Ok(series)
}

fn load_telemetry_file(path: &Path, series: &mut TelemetrySeries) -> Result<()> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .flexible(true)
        .from_path(path)
        .map_err(|e| Error::CsvRead {
            path: path.to_path_buf(),
            source: e,
        })?;

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| Error::CsvRead {
            path: path.to_path_buf(),
            source: e,
        })?
        .iter()
        .map(ToString::to_string)
        .collect();

    let date_col = headers.iter().position(|h| h == "Date");
    let time_col = headers.iter().position(|h| h == "Time");
    let (Some(date_col), Some(time_col)) = (date_col, time_col) else {
        warn!("{}: no Date/Time columns, skipping", path.display());
        return Ok(());
    };

    for header in &headers {
        if !series.columns.contains(header) {
            series.columns.push(header.clone());
        }
    }

    for record in reader.records() {
        let record = record.map_err(|e| Error::CsvRead {
            path: path.to_path_buf(),
            source: e,
        })?;

        let date = record.get(date_col).unwrap_or("");
        let time = record.get(time_col).unwrap_or("");
        let Some(timestamp) = parse_timestamp(date, time) else {
            continue;
        };

        let values = headers
            .iter()
            .zip(record.iter())
            .map(|(h, v)| (h.clone(), v.to_string()))
            .collect();

        series.rows.push(TelemetryRow { timestamp, values });
    }

    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn ts(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap()
    }

    #[test]
    fn test_parse_timestamp_formats() {
        assert_eq!(
            parse_timestamp("01.06.2025", "22:15:30"),
            Some(ts("2025-06-01 22:15:30"))
        );
        assert_eq!(
            parse_timestamp("01.06.25", "22:15:30"),
            Some(ts("2025-06-01 22:15:30"))
        );
        assert_eq!(
            parse_timestamp("2025-06-01", "22:15:30"),
            Some(ts("2025-06-01 22:15:30"))
        );
        assert_eq!(
            parse_timestamp("1.6.2025", "22:15"),
            Some(ts("2025-06-01 22:15:00"))
        );
    }

    #[test]
    fn test_parse_timestamp_invalid() {
        assert_eq!(parse_timestamp("junk", "22:15:30"), None);
        assert_eq!(parse_timestamp("01.06.2025", "junk"), None);
        assert_eq!(parse_timestamp("", ""), None);
        assert_eq!(parse_timestamp("32.13.2025", "10:00:00"), None);
    }

    #[test]
    fn test_load_telemetry_dir_sorts_and_unions_columns() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("b.csv"),
            "Date,Time,Temp\n01.06.2025,23:00:00,14.2\n",
        )
        .unwrap();
        std::fs::write(
            dir.path().join("a.csv"),
            "Date,Time,Hum\n02.06.2025,01:00:00,81\n01.06.2025,22:00:00,76\n",
        )
        .unwrap();

        let series = load_telemetry_dir(dir.path()).unwrap();
        assert_eq!(series.rows.len(), 3);
        assert!(series.rows.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
        assert!(series.columns.contains(&"Temp".to_string()));
        assert!(series.columns.contains(&"Hum".to_string()));
        assert_eq!(series.rows[0].values.get("Hum").map(String::as_str), Some("76"));
    }

    #[test]
    fn test_load_telemetry_dir_skips_tiny_and_headerless_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("empty.csv"), "x\n").unwrap();
        std::fs::write(
            dir.path().join("nodate.csv"),
            "Timestamp,Temp\n2025-06-01,14.2\n",
        )
        .unwrap();
        std::fs::write(
            dir.path().join("good.csv"),
            "Date,Time,Temp\n01.06.2025,23:00:00,14.2\n",
        )
        .unwrap();

        let series = load_telemetry_dir(dir.path()).unwrap();
        assert_eq!(series.rows.len(), 1);
    }

    #[test]
    fn test_load_telemetry_dir_empty_is_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            load_telemetry_dir(dir.path()),
            Err(Error::TelemetryEmpty { .. })
        ));
    }
}
