//! Application-wide constants.
//!
//! All magic numbers and strings are defined here to ensure consistency
//! and make changes easy to track.

/// Application name used for config directories and user-facing messages.
pub const APP_NAME: &str = "batnexus";

/// Default classifier confidence threshold applied to the JSON export path.
pub const DEFAULT_SCORE_THRESHOLD: f64 = 0.5;

/// Default segment length in seconds for recording segmentation.
pub const DEFAULT_SEGMENT_LENGTH_SECS: u32 = 2;

/// Default tolerance in seconds for the nearest-timestamp telemetry join.
pub const DEFAULT_MERGE_TOLERANCE_SECS: i64 = 5;

/// Species label returned when no mean call frequency is available.
pub const UNDETERMINED_SPECIES: &str = "undetermined";

/// Label of the catch-all frequency band at the end of the band list.
pub const FALLBACK_BAND: &str = "Unknown/Fallback";

/// Species string used when a recording's aggregated species list is empty.
pub const UNIDENTIFIED_SPECIES: &str = "Unidentified";

/// Marker written for values that are not available.
pub const NOT_AVAILABLE: &str = "n/a";

/// Separator between a recording stem and its segment counter.
pub const SEGMENT_SUFFIX: &str = "_seg";

/// Minimum telemetry file size in bytes; smaller files are skipped as empty.
pub const MIN_TELEMETRY_FILE_BYTES: u64 = 10;

/// Output file names.
pub mod filenames {
    /// Canonical detection table.
    pub const ALL_DETECTIONS: &str = "all_detections.csv";
    /// Per-species total count table.
    pub const SPECIES_SUMMARY: &str = "species_summary.csv";
    /// Per-recording aggregated species table.
    pub const SPECIES_PER_FILE: &str = "species_per_file.csv";
    /// Subdirectory for one detection CSV per recording.
    pub const INDIVIDUAL_DETECTIONS_DIR: &str = "individual_detections";
    /// Combined physical-validation report.
    pub const VALIDATION_REPORT: &str = "validation_report.csv";
    /// Subdirectory for files flagged for manual review.
    pub const REVIEW_DIR: &str = "manual_review";
    /// Segment index written by the splitter.
    pub const SEGMENT_INDEX: &str = "segment_index.csv";
    /// Per-recording position/astronomy master table.
    pub const RECORDINGS_MASTER: &str = "recordings_master.csv";
    /// Final merged master table.
    pub const MASTER_FINAL: &str = "master_data_final.csv";
}

/// Broad plausibility bounding box for the expected survey region (Europe).
pub mod region {
    /// Minimum plausible latitude in degrees.
    pub const LAT_MIN: f64 = 35.0;
    /// Maximum plausible latitude in degrees.
    pub const LAT_MAX: f64 = 70.0;
    /// Minimum plausible longitude in degrees.
    pub const LON_MIN: f64 = -10.0;
    /// Maximum plausible longitude in degrees.
    pub const LON_MAX: f64 = 30.0;
}

/// Validation quality note strings.
pub mod validation {
    /// Notes value for detections that pass every check.
    pub const NOTES_OK: &str = "OK";
    /// Notes value for detections whose species has no reference entry.
    pub const NOTES_REVIEW_REQUIRED: &str = "Review_Required";
    /// Separator between individual issue strings.
    pub const ISSUE_SEPARATOR: &str = "|";
}

/// RIFF chunk identifiers scanned for embedded recorder metadata.
pub const METADATA_CHUNK_IDS: &[&[u8]] = &[
    b"guan", b"GUAN", b"bext", b"iXML", b"LIST", b"INFO", b"ICMT",
];

/// Maximum number of bytes of a metadata chunk inspected for text fields.
pub const MAX_METADATA_SNIPPET_BYTES: usize = 4096;
