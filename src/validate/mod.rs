//! Physical plausibility validation of classifier output.
//!
//! Each detection's call frequency and duration are checked against the
//! species reference table. Files containing questionable detections are
//! copied into a manual-review directory alongside the combined report.

use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::constants::{filenames, validation};
use crate::error::{Error, Result};
use crate::species::ReferenceDb;

/// Quality state assigned to one detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationStatus {
    /// Every applicable check passed.
    NexusVerified,
    /// At least one check failed.
    ReviewRequired,
    /// The species label has no reference entry.
    UnknownSpecies,
}

impl std::fmt::Display for ValidationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NexusVerified => write!(f, "NEXUS_Verified"),
            Self::ReviewRequired => write!(f, "Review_Required"),
            Self::UnknownSpecies => write!(f, "Unknown_Species"),
        }
    }
}

/// Validation outcome for one detection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Validation {
    /// Assigned quality state.
    pub status: ValidationStatus,
    /// Human-readable notes: `OK`, `Review_Required`, or issue strings
    /// joined by `|`.
    pub notes: String,
}

/// Validate one detection against the reference database.
///
/// The frequency check runs only when `low_freq_hz` is present and
/// positive; the duration check only when a duration is available.
pub fn validate(
    species: Option<&str>,
    low_freq_hz: Option<f64>,
    duration_ms: Option<f64>,
    db: &ReferenceDb,
) -> Validation {
    let label = species.unwrap_or("");
    let Some(bounds) = db.lookup(label) else {
        return Validation {
            status: ValidationStatus::UnknownSpecies,
            notes: validation::NOTES_REVIEW_REQUIRED.to_string(),
        };
    };

    let mut issues = Vec::new();

    let freq = low_freq_hz.unwrap_or(0.0);
    if freq > 0.0 && !(bounds.freq_min_hz..=bounds.freq_max_hz).contains(&freq) {
        issues.push(format!("Freq_Outlier({:.1}kHz)", freq / 1000.0));
    }

    if let Some(duration) = duration_ms.filter(|d| d.is_finite())
        && !(bounds.duration_min_ms..=bounds.duration_max_ms).contains(&duration)
    {
        issues.push(format!("Duration_Outlier({duration:.1}ms)"));
    }

    if issues.is_empty() {
        Validation {
            status: ValidationStatus::NexusVerified,
            notes: validation::NOTES_OK.to_string(),
        }
    } else {
        Validation {
            status: ValidationStatus::ReviewRequired,
            notes: issues.join(validation::ISSUE_SEPARATOR),
        }
    }
}

/// Validate one canonical detection.
///
/// Convenience wrapper over [`validate`] for reconciled rows.
pub fn validate_detection(
    detection: &crate::detect::CanonicalDetection,
    db: &ReferenceDb,
) -> Validation {
    validate(
        detection.species.as_deref(),
        detection.low_freq_hz,
        Some(detection.duration_ms()),
        db,
    )
}

/// Totals across a validation batch.
#[derive(Debug, Clone, Copy, Default)]
pub struct ValidationSummary {
    /// Number of files that yielded at least one row.
    pub files: usize,
    /// Total validated detections.
    pub calls: usize,
    /// Detections with status `NEXUS_Verified`.
    pub verified: usize,
    /// Detections with status `Review_Required`.
    pub review: usize,
    /// Detections with status `Unknown_Species`.
    pub unknown: usize,
}

/// One loaded classifier export with its validation results.
struct FileTable {
    path: PathBuf,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
    results: Vec<Validation>,
}

/// Validate every classifier CSV export in `input_dir`.
///
/// Writes the combined report (original columns plus `Validation_Status`
/// and `Quality_Notes`) into `output_dir` and copies each file containing
/// at least one `Review_Required` or `Unknown_Species` row, unmodified,
/// into the review subdirectory. Returns `None` when there is no data to
/// validate; that is a valid terminal state.
pub fn run(
    input_dir: &Path,
    output_dir: &Path,
    reference: &ReferenceDb,
) -> Result<Option<ValidationSummary>> {
    if !input_dir.is_dir() {
        warn!("Validation input directory not found: {}", input_dir.display());
        return Ok(None);
    }

    let mut files: Vec<PathBuf> = std::fs::read_dir(input_dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| {
            p.is_file()
                && p.extension()
                    .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"))
        })
        .collect();
    files.sort();

    if files.is_empty() {
        warn!("No CSV files to validate in {}", input_dir.display());
        return Ok(None);
    }

    let review_dir = output_dir.join(filenames::REVIEW_DIR);
    std::fs::create_dir_all(&review_dir).map_err(|e| Error::OutputDirCreate {
        path: review_dir.clone(),
        source: e,
    })?;

    let mut tables = Vec::new();
    let mut summary = ValidationSummary::default();

    for path in files {
        let table = match validate_file(&path, reference) {
            Ok(Some(table)) => table,
            Ok(None) => {
                info!("{}: file is empty", path.display());
                continue;
            }
            Err(e) => {
                warn!("Skipping {}: {e}", path.display());
                continue;
            }
        };

        let verified = count_status(&table, ValidationStatus::NexusVerified);
        let review = count_status(&table, ValidationStatus::ReviewRequired);
        let unknown = count_status(&table, ValidationStatus::UnknownSpecies);

        info!(
            "{}: {} calls | verified: {verified} review: {review} unknown: {unknown}",
            path.display(),
            table.rows.len()
        );

        // The review copy is correctness-relevant and must not fail silently.
        if review > 0 || unknown > 0 {
            let file_name = path.file_name().map_or_else(
                || PathBuf::from("unknown.csv"),
                PathBuf::from,
            );
            std::fs::copy(&path, review_dir.join(file_name)).map_err(|e| Error::ReviewCopy {
                path: path.clone(),
                source: e,
            })?;
        }

        summary.files += 1;
        summary.calls += table.rows.len();
        summary.verified += verified;
        summary.review += review;
        summary.unknown += unknown;
        tables.push(table);
    }

    if tables.is_empty() {
        warn!("No data validated");
        return Ok(None);
    }

    let report_path = output_dir.join(filenames::VALIDATION_REPORT);
    write_report(&report_path, &tables)?;
    info!(
        "Validation report written to {}: {} calls | verified: {} review: {} unknown: {}",
        report_path.display(),
        summary.calls,
        summary.verified,
        summary.review,
        summary.unknown
    );

    Ok(Some(summary))
}

/// Validate one classifier CSV export, keeping its original columns.
fn validate_file(path: &Path, reference: &ReferenceDb) -> Result<Option<FileTable>> {
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

    let find = |names: &[&str]| -> Option<usize> {
        names
            .iter()
            .find_map(|name| headers.iter().position(|h| h == name))
    };

    let species_col = find(&["class", "species"]);
    let low_freq_col = find(&["low_freq"]);
    let start_col = find(&["start_time", "start"]);
    let end_col = find(&["end_time", "end"]);

    if start_col.is_none() || end_col.is_none() {
        warn!("{}: no time columns, durations unavailable", path.display());
    }

    let mut rows = Vec::new();
    let mut results = Vec::new();

    for record in reader.records() {
        let record = record.map_err(|e| Error::CsvRead {
            path: path.to_path_buf(),
            source: e,
        })?;

        let cell = |col: Option<usize>| -> Option<&str> {
            col.and_then(|c| record.get(c)).filter(|v| !v.is_empty())
        };
        let number = |col: Option<usize>| -> Option<f64> {
            cell(col).and_then(|v| v.parse::<f64>().ok())
        };

        let duration_ms = match (number(start_col), number(end_col)) {
            (Some(start), Some(end)) => Some((end - start) * 1000.0),
            _ => None,
        };

        results.push(validate(
            cell(species_col),
            number(low_freq_col),
            duration_ms,
            reference,
        ));
        rows.push(record.iter().map(ToString::to_string).collect());
    }

    if rows.is_empty() {
        return Ok(None);
    }

    Ok(Some(FileTable {
        path: path.to_path_buf(),
        headers,
        rows,
        results,
    }))
}

fn count_status(table: &FileTable, status: ValidationStatus) -> usize {
    table.results.iter().filter(|r| r.status == status).count()
}

/// Write the combined report over the union of all file columns.
fn write_report(path: &Path, tables: &[FileTable]) -> Result<()> {
    let mut columns: Vec<String> = Vec::new();
    for table in tables {
        for header in &table.headers {
            if !columns.contains(header) {
                columns.push(header.clone());
            }
        }
    }

    let mut writer = csv::Writer::from_path(path).map_err(|e| Error::CsvWrite {
        path: path.to_path_buf(),
        source: e,
    })?;

    let write_err = |e: csv::Error| Error::CsvWrite {
        path: path.to_path_buf(),
        source: e,
    };

    let mut header_row: Vec<&str> = columns.iter().map(String::as_str).collect();
    header_row.push("source_file");
    header_row.push("Validation_Status");
    header_row.push("Quality_Notes");
    writer.write_record(&header_row).map_err(write_err)?;

    for table in tables {
        let source_file = table
            .path
            .file_name()
            .map_or_else(String::new, |n| n.to_string_lossy().into_owned());
        for (row, result) in table.rows.iter().zip(&table.results) {
            let mut out: Vec<String> = Vec::with_capacity(columns.len() + 3);
            for column in &columns {
                let value = table
                    .headers
                    .iter()
                    .position(|h| h == column)
                    .and_then(|idx| row.get(idx))
                    .cloned()
                    .unwrap_or_default();
                out.push(value);
            }
            out.push(source_file.clone());
            out.push(result.status.to_string());
            out.push(result.notes.clone());
            writer.write_record(&out).map_err(write_err)?;
        }
    }

    writer.flush().map_err(|e| Error::CsvWrite {
        path: path.to_path_buf(),
        source: csv::Error::from(e),
    })?;
    Ok(())
}
