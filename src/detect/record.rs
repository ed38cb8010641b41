//! Common detection record shape.

use std::path::Path;

/// Which classifier export a detection was parsed from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    /// Per-file JSON export with nested annotation arrays.
    Json,
    /// Tabular CSV export.
    Csv,
}

impl std::fmt::Display for SourceFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Json => write!(f, "json"),
            Self::Csv => write!(f, "csv"),
        }
    }
}

/// One classifier output for a time window within one audio segment.
#[derive(Debug, Clone)]
pub struct Detection {
    /// Name of the classifier output file this record came from.
    pub segment_file: String,
    /// File stem of the segment, the join key for reconciliation.
    pub basename: String,
    /// Start time in seconds relative to the segment start.
    pub start_s: f64,
    /// End time in seconds relative to the segment start.
    pub end_s: f64,
    /// Lower call frequency bound in Hz.
    pub low_freq_hz: Option<f64>,
    /// Upper call frequency bound in Hz.
    pub high_freq_hz: Option<f64>,
    /// Mean call frequency in kHz.
    pub freq_mean_khz: Option<f64>,
    /// Classifier confidence in [0, 1].
    pub confidence: Option<f64>,
    /// Species label.
    pub species: Option<String>,
    /// Export format the record was parsed from.
    pub source_format: SourceFormat,
}

impl Detection {
    /// Call duration in milliseconds.
    pub fn duration_ms(&self) -> f64 {
        (self.end_s - self.start_s) * 1000.0
    }
}

/// File stem without extension, used as the reconciliation join key.
pub fn basename_of(path: &Path) -> String {
    path.file_stem()
        .map_or_else(String::new, |s| s.to_string_lossy().into_owned())
}
