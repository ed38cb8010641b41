//! Configuration type definitions.

use crate::constants::{
    DEFAULT_MERGE_TOLERANCE_SECS, DEFAULT_SCORE_THRESHOLD, DEFAULT_SEGMENT_LENGTH_SECS, region,
};
use crate::position::RegionBounds;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Complete application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory and file layout.
    #[serde(default)]
    pub paths: PathsConfig,

    /// Analysis settings.
    #[serde(default)]
    pub analysis: AnalysisConfig,

    /// Survey-region plausibility bounds.
    #[serde(default)]
    pub region: RegionConfig,
}

/// Directory and file layout for a pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Directory with the original field recordings.
    pub audio_dir: PathBuf,

    /// Directory the splitter writes segments (and the segment index) into.
    pub segments_dir: PathBuf,

    /// Directory with the classifier's JSON/CSV exports.
    pub detections_dir: PathBuf,

    /// Directory for aggregated result tables.
    pub results_dir: PathBuf,

    /// Directory for the validation report and review copies.
    pub validation_dir: PathBuf,

    /// Directory with environmental telemetry logs.
    pub telemetry_dir: PathBuf,

    /// Species reference table for physical validation.
    pub reference_file: PathBuf,

    /// Optional precomputed astronomy table keyed by recording filename.
    pub astro_file: Option<PathBuf>,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            audio_dir: PathBuf::from("audio_work"),
            segments_dir: PathBuf::from("audio"),
            detections_dir: PathBuf::from("anns"),
            results_dir: PathBuf::from("results"),
            validation_dir: PathBuf::from("validation"),
            telemetry_dir: PathBuf::from("telemetry"),
            reference_file: PathBuf::from("Frequenzen.csv"),
            astro_file: None,
        }
    }
}

/// Analysis settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Confidence threshold for the classifier's JSON export path.
    pub score_threshold: f64,

    /// Segment length in seconds for recording segmentation.
    pub segment_length_secs: u32,

    /// Tolerance in seconds for the nearest-timestamp telemetry join.
    pub merge_tolerance_secs: i64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            score_threshold: DEFAULT_SCORE_THRESHOLD,
            segment_length_secs: DEFAULT_SEGMENT_LENGTH_SECS,
            merge_tolerance_secs: DEFAULT_MERGE_TOLERANCE_SECS,
        }
    }
}

/// Survey-region plausibility bounding box.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct RegionConfig {
    /// Minimum plausible latitude in degrees.
    pub lat_min: f64,
    /// Maximum plausible latitude in degrees.
    pub lat_max: f64,
    /// Minimum plausible longitude in degrees.
    pub lon_min: f64,
    /// Maximum plausible longitude in degrees.
    pub lon_max: f64,
}

impl Default for RegionConfig {
    fn default() -> Self {
        Self {
            lat_min: region::LAT_MIN,
            lat_max: region::LAT_MAX,
            lon_min: region::LON_MIN,
            lon_max: region::LON_MAX,
        }
    }
}

impl RegionConfig {
    /// Bounding box used by the position extractor.
    pub fn bounds(&self) -> RegionBounds {
        RegionBounds {
            lat_min: self.lat_min,
            lat_max: self.lat_max,
            lon_min: self.lon_min,
            lon_max: self.lon_max,
        }
    }
}
