//! CSV writers for the pipeline's output artifacts.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;

use crate::astro::AstroRecord;
use crate::detect::{CanonicalDetection, CanonicalTable};
use crate::error::{Error, Result};
use crate::position::PositionRecord;

/// Timestamp format used in every output table.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One row of the recordings master table.
#[derive(Debug, Clone)]
pub struct RecordingMasterRow {
    /// Recording filename.
    pub filename: String,
    /// Absolute path of the recording.
    pub filepath: PathBuf,
    /// Recovered position record.
    pub position: PositionRecord,
    /// Astronomical context, not-available sentinels when unknown.
    pub astro: AstroRecord,
}

fn csv_writer(path: &Path) -> Result<csv::Writer<std::fs::File>> {
    csv::Writer::from_path(path).map_err(|e| Error::CsvWrite {
        path: path.to_path_buf(),
        source: e,
    })
}

fn finish(path: &Path, mut writer: csv::Writer<std::fs::File>) -> Result<()> {
    writer.flush().map_err(|e| Error::CsvWrite {
        path: path.to_path_buf(),
        source: csv::Error::from(e),
    })
}

fn write_row(path: &Path, writer: &mut csv::Writer<std::fs::File>, row: &[String]) -> Result<()> {
    writer.write_record(row).map_err(|e| Error::CsvWrite {
        path: path.to_path_buf(),
        source: e,
    })
}

fn opt_num(value: Option<f64>) -> String {
    value.map_or_else(String::new, |v| v.to_string())
}

/// Write the canonical detection table.
///
/// When reconstructed absolute timestamps are provided they are appended
/// as an `absolute_start` column, empty where reconstruction failed.
pub fn write_all_detections(
    path: &Path,
    table: &CanonicalTable,
    absolute_starts: Option<&[Option<NaiveDateTime>]>,
) -> Result<()> {
    let mut writer = csv_writer(path)?;

    let mut header = vec![
        "start",
        "end",
        "low_freq",
        "high_freq",
        "freq_mean",
        "confidence",
        "species",
        "source_file",
        "basename",
    ];
    if absolute_starts.is_some() {
        header.push("absolute_start");
    }
    write_row(
        path,
        &mut writer,
        &header.iter().map(ToString::to_string).collect::<Vec<_>>(),
    )?;

    for (idx, row) in table.rows.iter().enumerate() {
        let mut record = vec![
            row.start_s.to_string(),
            row.end_s.to_string(),
            opt_num(row.low_freq_hz),
            opt_num(row.high_freq_hz),
            opt_num(row.freq_mean_khz),
            opt_num(row.confidence),
            row.species.clone().unwrap_or_default(),
            row.segment_file.clone(),
            row.basename.clone(),
        ];
        if let Some(starts) = absolute_starts {
            let value = starts
                .get(idx)
                .and_then(|ts| ts.as_ref())
                .map_or_else(String::new, |ts| ts.format(TIMESTAMP_FORMAT).to_string());
            record.push(value);
        }
        write_row(path, &mut writer, &record)?;
    }

    finish(path, writer)
}

/// Write one detection CSV per recording basename into `dir`.
pub fn write_individual_detections(dir: &Path, table: &CanonicalTable) -> Result<usize> {
    std::fs::create_dir_all(dir).map_err(|e| Error::OutputDirCreate {
        path: dir.to_path_buf(),
        source: e,
    })?;

    let mut grouped: HashMap<&str, Vec<&CanonicalDetection>> = HashMap::new();
    for row in &table.rows {
        grouped.entry(&row.basename).or_default().push(row);
    }

    for (basename, rows) in &grouped {
        let path = dir.join(format!("{basename}.csv"));
        let mut writer = csv_writer(&path)?;
        write_row(
            &path,
            &mut writer,
            &["start", "end", "low_freq", "high_freq", "species", "confidence"]
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>(),
        )?;
        for row in rows {
            write_row(
                &path,
                &mut writer,
                &[
                    row.start_s.to_string(),
                    row.end_s.to_string(),
                    opt_num(row.low_freq_hz),
                    opt_num(row.high_freq_hz),
                    row.species.clone().unwrap_or_default(),
                    opt_num(row.confidence),
                ],
            )?;
        }
        finish(&path, writer)?;
    }

    Ok(grouped.len())
}

/// Write the per-species total count table.
pub fn write_species_summary(path: &Path, counts: &[(String, usize)]) -> Result<()> {
    let mut writer = csv_writer(path)?;
    write_row(
        path,
        &mut writer,
        &["species".to_string(), "count".to_string()],
    )?;
    for (species, count) in counts {
        write_row(path, &mut writer, &[species.clone(), count.to_string()])?;
    }
    finish(path, writer)
}

/// Write the per-file aggregated species table.
pub fn write_species_per_file(path: &Path, pairs: &[(String, String)]) -> Result<()> {
    let mut writer = csv_writer(path)?;
    write_row(
        path,
        &mut writer,
        &["basename".to_string(), "species".to_string()],
    )?;
    for (basename, species) in pairs {
        write_row(path, &mut writer, &[basename.clone(), species.clone()])?;
    }
    finish(path, writer)
}

/// Write the per-recording position/astronomy master table.
pub fn write_recordings_master(path: &Path, rows: &[RecordingMasterRow]) -> Result<()> {
    let mut writer = csv_writer(path)?;
    write_row(
        path,
        &mut writer,
        &[
            "filename",
            "filepath",
            "latitude",
            "longitude",
            "elevation_m",
            "absolute_timestamp",
            "source",
            "sun_azimuth_deg",
            "sun_elevation_deg",
            "moon_azimuth_deg",
            "moon_elevation_deg",
            "moon_illuminated_fraction",
        ]
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>(),
    )?;

    for row in rows {
        write_row(
            path,
            &mut writer,
            &[
                row.filename.clone(),
                row.filepath.display().to_string(),
                row.position.latitude.to_string(),
                row.position.longitude.to_string(),
                row.position.elevation_m.to_string(),
                row.position
                    .timestamp
                    .map_or_else(String::new, |ts| ts.format(TIMESTAMP_FORMAT).to_string()),
                row.position.source_tag.clone(),
                opt_num(row.astro.sun_azimuth_deg),
                opt_num(row.astro.sun_elevation_deg),
                opt_num(row.astro.moon_azimuth_deg),
                opt_num(row.astro.moon_elevation_deg),
                opt_num(row.astro.moon_illuminated_fraction),
            ],
        )?;
    }

    finish(path, writer)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn table() -> CanonicalTable {
        CanonicalTable {
            rows: vec![CanonicalDetection {
                segment_file: "rec1_seg001.json".to_string(),
                basename: "rec1_seg001".to_string(),
                start_s: 0.1,
                end_s: 0.3,
                low_freq_hz: Some(40_000.0),
                high_freq_hz: Some(42_000.0),
                freq_mean_khz: Some(41.0),
                confidence: None,
                species: Some("Pipistrellus nathusii".to_string()),
            }],
        }
    }

    #[test]
    fn test_write_all_detections() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("all_detections.csv");
        write_all_detections(&path, &table(), None).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.starts_with("start,end,low_freq"));
        assert!(contents.contains("Pipistrellus nathusii"));
        // Absent confidence serializes as an empty cell.
        assert!(contents.contains(",,Pipistrellus nathusii,"));
    }

    #[test]
    fn test_write_individual_detections_groups_by_basename() {
        let dir = tempfile::tempdir().unwrap();
        let written = write_individual_detections(dir.path(), &table()).unwrap();
        assert_eq!(written, 1);
        assert!(dir.path().join("rec1_seg001.csv").exists());
    }

    #[test]
    fn test_write_species_summary() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("species_summary.csv");
        write_species_summary(&path, &[("Myotis daubentonii".to_string(), 3)]).unwrap();
        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents, "species,count\nMyotis daubentonii,3\n");
    }
}
