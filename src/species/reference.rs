//! Species reference table for physical plausibility checks.
//!
//! The reference CSV carries one row per species with the physically
//! plausible main-frequency range (kHz) and call-duration range (ms).
//! Species names follow the `Common name (Scientific name)` convention;
//! both variants are indexed as lookup keys.

use std::path::Path;

use crate::error::{Error, Result};

/// Physically plausible call parameter ranges for one species.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CallBounds {
    /// Minimum plausible main frequency in Hz.
    pub freq_min_hz: f64,
    /// Maximum plausible main frequency in Hz.
    pub freq_max_hz: f64,
    /// Minimum plausible call duration in milliseconds.
    pub duration_min_ms: f64,
    /// Maximum plausible call duration in milliseconds.
    pub duration_max_ms: f64,
}

/// Order-preserving species reference database.
///
/// Lookup is a case-insensitive substring match of a detected species label
/// against the stored keys, in insertion order; the first containing key
/// wins. Insertion order is the reference table's row order, so ambiguous
/// labels resolve deterministically to the earliest row.
#[derive(Debug, Clone, Default)]
pub struct ReferenceDb {
    entries: Vec<(String, CallBounds)>,
}

impl ReferenceDb {
    /// Load the reference database from a CSV file.
    ///
    /// Expected columns: `Art`, `Hauptfrequenz_min kHz`,
    /// `Hauptfrequenz_max kHz`, `Rufdauer_min ms`, `Rufdauer_max ms`.
    /// Rows with an empty `Art` cell are skipped. A table that yields no
    /// usable entries is an error; the validator cannot run without it.
    pub fn load(path: &Path) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_path(path)
            .map_err(|e| Error::ReferenceRead {
                path: path.to_path_buf(),
                source: e,
            })?;

        let headers = reader
            .headers()
            .map_err(|e| Error::ReferenceRead {
                path: path.to_path_buf(),
                source: e,
            })?
            .clone();

        let column = |name: &str| -> Result<usize> {
            headers
                .iter()
                .position(|h| h == name)
                .ok_or_else(|| Error::MissingColumn {
                    path: path.to_path_buf(),
                    column: name.to_string(),
                })
        };

        let name_col = column("Art")?;
        let freq_min_col = column("Hauptfrequenz_min kHz")?;
        let freq_max_col = column("Hauptfrequenz_max kHz")?;
        let dur_min_col = column("Rufdauer_min ms")?;
        let dur_max_col = column("Rufdauer_max ms")?;

        let mut db = Self::default();

        for (row_idx, record) in reader.records().enumerate() {
            let record = record.map_err(|e| Error::ReferenceRead {
                path: path.to_path_buf(),
                source: e,
            })?;

            let name = record.get(name_col).unwrap_or("").trim();
            if name.is_empty() {
                continue;
            }

            let field = |col: usize, label: &str| -> Result<f64> {
                record
                    .get(col)
                    .and_then(|v| v.trim().parse::<f64>().ok())
                    .ok_or_else(|| Error::ReferenceInvalid {
                        path: path.to_path_buf(),
                        message: format!("row {}: unparseable {label}", row_idx + 2),
                    })
            };

            let bounds = CallBounds {
                freq_min_hz: field(freq_min_col, "Hauptfrequenz_min kHz")? * 1000.0,
                freq_max_hz: field(freq_max_col, "Hauptfrequenz_max kHz")? * 1000.0,
                duration_min_ms: field(dur_min_col, "Rufdauer_min ms")?,
                duration_max_ms: field(dur_max_col, "Rufdauer_max ms")?,
            };

            db.insert(name, bounds);
        }

        if db.is_empty() {
            return Err(Error::ReferenceInvalid {
                path: path.to_path_buf(),
                message: "no usable species rows".to_string(),
            });
        }

        Ok(db)
    }

    /// Insert a species row, indexing both the common name (before any
    /// parenthesis) and the parenthesized scientific alias.
    pub fn insert(&mut self, name: &str, bounds: CallBounds) {
        let common = name
            .split('(')
            .next()
            .unwrap_or(name)
            .trim()
            .to_lowercase();
        if !common.is_empty() {
            self.entries.push((common, bounds));
        }

        if let Some(rest) = name.split_once('(').map(|(_, rest)| rest) {
            let scientific = rest.trim_end_matches(')').trim().to_lowercase();
            if !scientific.is_empty() {
                self.entries.push((scientific, bounds));
            }
        }
    }

    /// Look up the bounds for a detected species label.
    ///
    /// The label is lowercased and matched by substring containment against
    /// the stored keys in insertion order.
    pub fn lookup(&self, species_label: &str) -> Option<&CallBounds> {
        let label = species_label.to_lowercase();
        self.entries
            .iter()
            .find(|(key, _)| label.contains(key.as_str()))
            .map(|(_, bounds)| bounds)
    }

    /// Number of indexed keys (a species with a scientific alias counts twice).
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the database holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
