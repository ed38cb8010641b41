//! Temporal/spatial merging of recordings, telemetry and species data.
//!
//! The recording master table is aligned against the environmental
//! telemetry series with a nearest-timestamp join bounded by a fixed
//! tolerance, then the per-file species string is attached via a
//! normalized filename key.

use std::collections::{BTreeSet, HashMap};
use std::path::Path;

use chrono::{Duration, NaiveDateTime};
use tracing::{info, warn};

use crate::constants::{NOT_AVAILABLE, SEGMENT_SUFFIX, UNIDENTIFIED_SPECIES};
use crate::error::{Error, Result};
use crate::telemetry::{TelemetrySeries, load_telemetry_dir};

/// Outcome counters for one merge run.
#[derive(Debug, Clone, Copy)]
pub struct MergeSummary {
    /// Rows written to the master table.
    pub rows: usize,
    /// Rows with a telemetry match within tolerance.
    pub telemetry_matched: usize,
}

/// Nearest-neighbor join between two sorted timestamp columns.
///
/// Both columns must be sorted ascending; that is a strict precondition of
/// the join, and a violation is an error, not a silently wrong result.
/// Each left timestamp is matched to the closest right timestamp in either
/// direction, but only when the distance is within `tolerance`; ties
/// resolve backward. Unmatched rows are an expected quality-of-match
/// outcome, reported by the caller, not an error.
pub fn nearest_within_tolerance(
    left: &[NaiveDateTime],
    right: &[NaiveDateTime],
    tolerance: Duration,
) -> Result<Vec<Option<usize>>> {
    ensure_sorted_ascending(left, "recordings")?;
    ensure_sorted_ascending(right, "telemetry")?;

    let matches = left
        .iter()
        .map(|l| {
            let after = right.partition_point(|r| r <= l);
            let backward = after.checked_sub(1).map(|i| (i, *l - right[i]));
            let forward = right.get(after).map(|r| (after, *r - *l));

            let nearest = match (backward, forward) {
                (Some(b), Some(f)) => {
                    if f.1 < b.1 {
                        Some(f)
                    } else {
                        Some(b)
                    }
                }
                (Some(b), None) => Some(b),
                (None, Some(f)) => Some(f),
                (None, None) => None,
            };

            nearest.and_then(|(idx, distance)| (distance <= tolerance).then_some(idx))
        })
        .collect();

    Ok(matches)
}

fn ensure_sorted_ascending(timestamps: &[NaiveDateTime], table: &'static str) -> Result<()> {
    if timestamps.windows(2).all(|w| w[0] <= w[1]) {
        Ok(())
    } else {
        Err(Error::UnsortedTimestamps { table })
    }
}

/// Normalize a filename into the species join key.
///
/// Lowercases, strips any segment suffix (`_seg...`) and appends the `.wav`
/// extension when it is missing, so segment stems and recording filenames
/// meet on the same key.
pub fn normalize_filename_key(name: &str) -> String {
    let lower = name.to_lowercase();
    let stem = lower.split(SEGMENT_SUFFIX).next().unwrap_or(&lower);
    if stem.ends_with(".wav") {
        stem.to_string()
    } else {
        format!("{stem}.wav")
    }
}

/// Clean an aggregated species string for presentation.
///
/// Removes "not available" markers and stray separators; an empty result
/// becomes `Unidentified`.
pub fn clean_species(joined: &str) -> String {
    let kept: Vec<&str> = joined
        .split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty() && *t != NOT_AVAILABLE)
        .collect();
    if kept.is_empty() {
        UNIDENTIFIED_SPECIES.to_string()
    } else {
        kept.join(", ")
    }
}

/// One parsed row of the recording master table.
struct MasterRow {
    timestamp: NaiveDateTime,
    filename_key: Option<String>,
    values: Vec<String>,
}

/// Merge the recording master table with telemetry and species data.
///
/// `species_path` is optional; without it the species column is omitted,
/// matching a pipeline run where no detections were aggregated.
pub fn run(
    recordings_path: &Path,
    telemetry_dir: &Path,
    species_path: Option<&Path>,
    output_path: &Path,
    tolerance_secs: i64,
) -> Result<MergeSummary> {
    let (headers, mut rows) = load_master_table(recordings_path)?;
    rows.sort_by_key(|row| row.timestamp);
    info!("Recordings ready: {} rows", rows.len());

    let telemetry = load_telemetry_dir(telemetry_dir)?;

    let species = match species_path {
        Some(path) if path.is_file() => Some(load_species_per_file(path)?),
        Some(path) => {
            warn!("Species table not found at {}, skipping", path.display());
            None
        }
        None => None,
    };

    let left: Vec<NaiveDateTime> = rows.iter().map(|r| r.timestamp).collect();
    let right: Vec<NaiveDateTime> = telemetry.rows.iter().map(|r| r.timestamp).collect();
    let matches = nearest_within_tolerance(&left, &right, Duration::seconds(tolerance_secs))?;

    let matched = matches.iter().flatten().count();
    info!(
        "Telemetry join: {matched}/{} rows matched within {tolerance_secs}s",
        rows.len()
    );

    write_master(
        output_path,
        &headers,
        &rows,
        &telemetry,
        &matches,
        species.as_ref(),
    )?;

    info!("Master table written to {}", output_path.display());
    Ok(MergeSummary {
        rows: rows.len(),
        telemetry_matched: matched,
    })
}

/// Load the recording master table, keeping all columns.
fn load_master_table(path: &Path) -> Result<(Vec<String>, Vec<MasterRow>)> {
    if !path.is_file() {
        return Err(Error::InputNotFound {
            path: path.to_path_buf(),
        });
    }

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

    let timestamp_col = headers
        .iter()
        .position(|h| h == "absolute_timestamp")
        .ok_or_else(|| Error::MissingColumn {
            path: path.to_path_buf(),
            column: "absolute_timestamp".to_string(),
        })?;
    let filename_col = headers.iter().position(|h| h == "filename");

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| Error::CsvRead {
            path: path.to_path_buf(),
            source: e,
        })?;

        let raw_ts = record.get(timestamp_col).unwrap_or("");
        let Some(timestamp) = parse_master_timestamp(raw_ts) else {
            warn!("Dropping master row with unparseable timestamp '{raw_ts}'");
            continue;
        };

        rows.push(MasterRow {
            timestamp,
            filename_key: filename_col
                .and_then(|c| record.get(c))
                .filter(|v| !v.is_empty())
                .map(normalize_filename_key),
            values: record.iter().map(ToString::to_string).collect(),
        });
    }

    Ok((headers, rows))
}

fn parse_master_timestamp(s: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S"))
        .ok()
}

/// Load and re-aggregate the per-file species table onto normalized keys.
///
/// Several segment stems collapse onto one recording key; their species
/// sets are unioned and re-joined sorted.
fn load_species_per_file(path: &Path) -> Result<HashMap<String, String>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|e| Error::CsvRead {
            path: path.to_path_buf(),
            source: e,
        })?;

    let mut sets: HashMap<String, BTreeSet<String>> = HashMap::new();
    for record in reader.records() {
        let record = record.map_err(|e| Error::CsvRead {
            path: path.to_path_buf(),
            source: e,
        })?;
        let (Some(basename), Some(species)) = (record.get(0), record.get(1)) else {
            continue;
        };
        let key = normalize_filename_key(basename);
        let set = sets.entry(key).or_default();
        for label in species.split(',') {
            let label = label.trim();
            if !label.is_empty() {
                set.insert(label.to_string());
            }
        }
    }

    Ok(sets
        .into_iter()
        .map(|(key, set)| (key, set.into_iter().collect::<Vec<_>>().join(", ")))
        .collect())
}

fn write_master(
    path: &Path,
    headers: &[String],
    rows: &[MasterRow],
    telemetry: &TelemetrySeries,
    matches: &[Option<usize>],
    species: Option<&HashMap<String, String>>,
) -> Result<()> {
    let mut writer = csv::Writer::from_path(path).map_err(|e| Error::CsvWrite {
        path: path.to_path_buf(),
        source: e,
    })?;
    let write_err = |e: csv::Error| Error::CsvWrite {
        path: path.to_path_buf(),
        source: e,
    };

    let mut header_row: Vec<&str> = headers.iter().map(String::as_str).collect();
    header_row.extend(telemetry.columns.iter().map(String::as_str));
    if species.is_some() {
        header_row.push("species_classified");
    }
    writer.write_record(&header_row).map_err(write_err)?;

    for (row, matched) in rows.iter().zip(matches) {
        let mut out: Vec<String> = Vec::with_capacity(header_row.len());
        out.extend(row.values.iter().cloned());
        // Pad rows that carried fewer cells than the header.
        while out.len() < headers.len() {
            out.push(String::new());
        }

        let telemetry_row = matched.map(|idx| &telemetry.rows[idx]);
        for column in &telemetry.columns {
            let value = telemetry_row
                .and_then(|r| r.values.get(column))
                .cloned()
                .unwrap_or_else(|| NOT_AVAILABLE.to_string());
            out.push(value);
        }

        if let Some(species) = species {
            let joined = row
                .filename_key
                .as_ref()
                .and_then(|key| species.get(key))
                .map(String::as_str)
                .unwrap_or("");
            out.push(clean_species(joined));
        }

        writer.write_record(&out).map_err(write_err)?;
    }

    writer.flush().map_err(|e| Error::CsvWrite {
        path: path.to_path_buf(),
        source: csv::Error::from(e),
    })?;
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
    fn test_nearest_join_matches_both_directions() {
        let left = vec![ts("2025-06-01 10:00:03"), ts("2025-06-01 10:01:58")];
        let right = vec![ts("2025-06-01 10:00:00"), ts("2025-06-01 10:02:00")];
        let matches =
            nearest_within_tolerance(&left, &right, Duration::seconds(5)).unwrap();
        // First row matches backward, second forward.
        assert_eq!(matches, vec![Some(0), Some(1)]);
    }

    #[test]
    fn test_nearest_join_never_exceeds_tolerance() {
        // Telemetry at 10:00:00 and 10:02:00, recording at 10:00:30: both
        // candidates are more than 5 s away, so there is no match.
        let left = vec![ts("2025-06-01 10:00:30")];
        let right = vec![ts("2025-06-01 10:00:00"), ts("2025-06-01 10:02:00")];
        let matches =
            nearest_within_tolerance(&left, &right, Duration::seconds(5)).unwrap();
        assert_eq!(matches, vec![None]);
    }

    #[test]
    fn test_nearest_join_tolerance_is_inclusive() {
        let left = vec![ts("2025-06-01 10:00:05")];
        let right = vec![ts("2025-06-01 10:00:00")];
        let matches =
            nearest_within_tolerance(&left, &right, Duration::seconds(5)).unwrap();
        assert_eq!(matches, vec![Some(0)]);
    }

    #[test]
    fn test_nearest_join_tie_resolves_backward() {
        let left = vec![ts("2025-06-01 10:00:02")];
        let right = vec![ts("2025-06-01 10:00:00"), ts("2025-06-01 10:00:04")];
        let matches =
            nearest_within_tolerance(&left, &right, Duration::seconds(5)).unwrap();
        assert_eq!(matches, vec![Some(0)]);
    }

    #[test]
    fn test_nearest_join_requires_sorted_input() {
        let unsorted = vec![ts("2025-06-01 10:05:00"), ts("2025-06-01 10:00:00")];
        let right = vec![ts("2025-06-01 10:00:00")];
        assert!(matches!(
            nearest_within_tolerance(&unsorted, &right, Duration::seconds(5)),
            Err(Error::UnsortedTimestamps { table: "recordings" })
        ));
        assert!(matches!(
            nearest_within_tolerance(&right, &unsorted, Duration::seconds(5)),
            Err(Error::UnsortedTimestamps { table: "telemetry" })
        ));
    }

    #[test]
    fn test_nearest_join_empty_right_side() {
        let left = vec![ts("2025-06-01 10:00:00")];
        let matches = nearest_within_tolerance(&left, &[], Duration::seconds(5)).unwrap();
        assert_eq!(matches, vec![None]);
    }

    #[test]
    fn test_normalize_filename_key() {
        assert_eq!(normalize_filename_key("Rec1_seg003"), "rec1.wav");
        assert_eq!(normalize_filename_key("rec1.wav"), "rec1.wav");
        assert_eq!(normalize_filename_key("REC1.WAV"), "rec1.wav");
        assert_eq!(normalize_filename_key("rec1"), "rec1.wav");
    }

    #[test]
    fn test_clean_species() {
        assert_eq!(
            clean_species("Myotis daubentonii, n/a, Pipistrellus pipistrellus"),
            "Myotis daubentonii, Pipistrellus pipistrellus"
        );
        assert_eq!(clean_species("n/a"), "Unidentified");
        assert_eq!(clean_species(""), "Unidentified");
        assert_eq!(clean_species(", ,"), "Unidentified");
    }
}
