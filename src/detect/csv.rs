//! CSV export ingestion.
//!
//! Parses the classifier's tabular export. Column names are normalized
//! (`start_time` → start, `end_time` → end, `class` → species,
//! `det_prob` → confidence); expected columns absent from a particular
//! file are synthesized as unavailable so the combined batch has uniform
//! fields. No confidence filtering happens on this path.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::detect::record::{Detection, SourceFormat, basename_of};
use crate::error::{Error, Result};

/// Load all `*.csv` classifier exports from a directory.
///
/// A malformed file is skipped with a warning; it never aborts the batch.
/// A missing or empty directory yields an empty batch.
pub fn load_csv_dir(dir: &Path) -> Result<Vec<Detection>> {
    let mut detections = Vec::new();

    for file in csv_files(dir)? {
        match load_csv_file(&file) {
            Ok(mut rows) => detections.append(&mut rows),
            Err(e) => warn!("Skipping {}: {e}", file.display()),
        }
    }

    debug!("CSV path: {} detections", detections.len());
    Ok(detections)
}

/// Load one classifier CSV export.
pub fn load_csv_file(path: &Path) -> Result<Vec<Detection>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .flexible(true)
        .from_path(path)
        .map_err(|e| Error::CsvRead {
            path: path.to_path_buf(),
            source: e,
        })?;

    let headers = reader
        .headers()
        .map_err(|e| Error::CsvRead {
            path: path.to_path_buf(),
            source: e,
        })?
        .clone();

    let find = |names: &[&str]| -> Option<usize> {
        names
            .iter()
            .find_map(|name| headers.iter().position(|h| h == *name))
    };

    // Normalized column lookup: exported name first, canonical name second.
    let start_col = find(&["start_time", "start"]);
    let end_col = find(&["end_time", "end"]);
    let species_col = find(&["class", "species"]);
    let confidence_col = find(&["det_prob", "confidence"]);
    let low_freq_col = find(&["low_freq"]);
    let high_freq_col = find(&["high_freq"]);
    let freq_mean_col = find(&["freq_mean"]);

    let segment_file = path
        .file_name()
        .map_or_else(String::new, |n| n.to_string_lossy().into_owned());
    let basename = basename_of(path);

    let mut rows = Vec::new();

    for record in reader.records() {
        let record = record.map_err(|e| Error::CsvRead {
            path: path.to_path_buf(),
            source: e,
        })?;

        let number = |col: Option<usize>| -> Option<f64> {
            col.and_then(|c| record.get(c))
                .filter(|v| !v.is_empty())
                .and_then(|v| v.parse::<f64>().ok())
        };

        let (Some(start_s), Some(end_s)) = (number(start_col), number(end_col)) else {
            warn!("Skipping row without start/end in {}", path.display());
            continue;
        };
        if end_s < start_s {
            warn!(
                "Skipping row with end ({end_s}) before start ({start_s}) in {}",
                path.display()
            );
            continue;
        }

        let species = species_col
            .and_then(|c| record.get(c))
            .filter(|v| !v.is_empty())
            .map(ToString::to_string);

        rows.push(Detection {
            segment_file: segment_file.clone(),
            basename: basename.clone(),
            start_s,
            end_s,
            low_freq_hz: number(low_freq_col),
            high_freq_hz: number(high_freq_col),
            freq_mean_khz: number(freq_mean_col),
            confidence: number(confidence_col),
            species,
            source_format: SourceFormat::Csv,
        });
    }

    Ok(rows)
}

/// Sorted list of `*.csv` files in a directory.
fn csv_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    if !dir.is_dir() {
        warn!("No CSV input directory at {}", dir.display());
        return Ok(files);
    }
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file()
            && path
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"))
        {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_csv_file_normalizes_columns() {
        let mut file = NamedTempFile::with_suffix(".csv").unwrap();
        writeln!(file, "start_time,end_time,low_freq,high_freq,class,det_prob").unwrap();
        writeln!(
            file,
            "0.1,0.3,40000,42000,Pipistrellus pipistrellus,0.92"
        )
        .unwrap();
        file.flush().unwrap();

        let rows = load_csv_file(file.path()).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].start_s, 0.1);
        assert_eq!(rows[0].end_s, 0.3);
        assert_eq!(rows[0].species.as_deref(), Some("Pipistrellus pipistrellus"));
        assert_eq!(rows[0].confidence, Some(0.92));
        assert_eq!(rows[0].source_format, SourceFormat::Csv);
    }

    #[test]
    fn test_load_csv_file_synthesizes_missing_columns() {
        let mut file = NamedTempFile::with_suffix(".csv").unwrap();
        writeln!(file, "start_time,end_time").unwrap();
        writeln!(file, "1.0,1.2").unwrap();
        file.flush().unwrap();

        let rows = load_csv_file(file.path()).unwrap();
        assert_eq!(rows.len(), 1);
        assert!(rows[0].species.is_none());
        assert!(rows[0].confidence.is_none());
        assert!(rows[0].low_freq_hz.is_none());
    }

    #[test]
    fn test_load_csv_file_no_confidence_filter() {
        let mut file = NamedTempFile::with_suffix(".csv").unwrap();
        writeln!(file, "start_time,end_time,class,det_prob").unwrap();
        writeln!(file, "0.0,0.1,Myotis daubentonii,0.05").unwrap();
        file.flush().unwrap();

        // Low-confidence CSV rows are kept; the threshold applies to the
        // JSON path only.
        let rows = load_csv_file(file.path()).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].confidence, Some(0.05));
    }

    #[test]
    fn test_load_csv_dir_skips_malformed_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("good.csv"), "start,end\n0.0,0.1\n").unwrap();
        // Invalid UTF-8 in the header makes the file unparseable; the batch
        // continues past it.
        std::fs::write(dir.path().join("bad.csv"), [0xFFu8, 0xFE, b'\n']).unwrap();

        let rows = load_csv_dir(dir.path()).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].basename, "good");
    }
}
