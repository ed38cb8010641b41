//! JSON export ingestion.
//!
//! Parses the classifier's per-file JSON format:
//! `{"annotation": [{start_time, end_time, low_freq, high_freq,
//! freq_mean?, det_prob?}, ...]}`.

use std::path::Path;

use serde::Deserialize;
use tracing::{debug, warn};

use crate::detect::record::{Detection, SourceFormat, basename_of};
use crate::error::Result;
use crate::species::BandSet;

#[derive(Debug, Deserialize)]
struct AnnotationFile {
    #[serde(default)]
    annotation: Vec<RawAnnotation>,
}

#[derive(Debug, Deserialize)]
struct RawAnnotation {
    start_time: Option<f64>,
    end_time: Option<f64>,
    low_freq: Option<f64>,
    high_freq: Option<f64>,
    freq_mean: Option<f64>,
    det_prob: Option<f64>,
}

/// Load all `*.json` classifier exports from a directory.
///
/// Applies the batch-global confidence filter and the frequency-presence
/// filter, then assigns a provisional species label from the band set.
/// A malformed file is skipped with a warning; it never aborts the batch.
/// A missing or empty directory yields an empty batch.
pub fn load_json_dir(dir: &Path, bands: &BandSet, score_threshold: f64) -> Result<Vec<Detection>> {
    let mut detections = Vec::new();

    for file in json_files(dir)? {
        let contents = match std::fs::read_to_string(&file) {
            Ok(contents) => contents,
            Err(e) => {
                warn!("Skipping {}: read failed: {e}", file.display());
                continue;
            }
        };

        let parsed: AnnotationFile = match serde_json::from_str(&contents) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!("Skipping {}: parse failed: {e}", file.display());
                continue;
            }
        };

        let segment_file = file
            .file_name()
            .map_or_else(String::new, |n| n.to_string_lossy().into_owned());
        let basename = basename_of(&file);

        for raw in parsed.annotation {
            let (Some(start_s), Some(end_s)) = (raw.start_time, raw.end_time) else {
                warn!("Skipping annotation without start/end in {}", file.display());
                continue;
            };
            if end_s < start_s {
                warn!(
                    "Skipping annotation with end ({end_s}) before start ({start_s}) in {}",
                    file.display()
                );
                continue;
            }

            detections.push(Detection {
                segment_file: segment_file.clone(),
                basename: basename.clone(),
                start_s,
                end_s,
                low_freq_hz: raw.low_freq,
                high_freq_hz: raw.high_freq,
                freq_mean_khz: mean_frequency_khz(&raw),
                confidence: raw.det_prob,
                species: None,
                source_format: SourceFormat::Json,
            });
        }
    }

    apply_confidence_filter(&mut detections, score_threshold);
    detections.retain(|d| d.freq_mean_khz.is_some());

    for det in &mut detections {
        det.species = Some(bands.classify(det.freq_mean_khz).to_string());
    }

    debug!("JSON path: {} detections after filtering", detections.len());
    Ok(detections)
}

/// Mean call frequency in kHz for a raw annotation.
///
/// `freq_mean` is in Hz when present; otherwise the band midpoint
/// `(low_freq + high_freq) / 2` is used, converted to kHz in one step.
fn mean_frequency_khz(raw: &RawAnnotation) -> Option<f64> {
    raw.freq_mean.map(|f| f / 1000.0).or_else(|| {
        match (raw.low_freq, raw.high_freq) {
            (Some(low), Some(high)) => Some((low + high) / 2000.0),
            _ => None,
        }
    })
}

/// Apply the confidence threshold to a whole JSON batch.
///
/// The decision is made once over the entire batch: when every record lacks
/// a confidence value, the batch is treated as unscored and passes through
/// unfiltered. When any record carries a confidence, rows whose confidence
/// is absent or below the threshold are dropped. This asymmetry (wholesale
/// unscored batches are trusted, partially scored ones are filtered
/// strictly) is deliberate and must not be re-evaluated per file.
pub fn apply_confidence_filter(detections: &mut Vec<Detection>, score_threshold: f64) {
    if detections.iter().all(|d| d.confidence.is_none()) {
        return;
    }
    detections.retain(|d| d.confidence.is_some_and(|c| c >= score_threshold));
}

/// Sorted list of `*.json` files in a directory.
///
/// Sorting keeps aggregate output deterministic regardless of directory
/// enumeration order.
fn json_files(dir: &Path) -> Result<Vec<std::path::PathBuf>> {
    let mut files = Vec::new();
    if !dir.is_dir() {
        warn!("No JSON input directory at {}", dir.display());
        return Ok(files);
    }
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file()
            && path
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
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

    fn detection(confidence: Option<f64>) -> Detection {
        Detection {
            segment_file: "a.json".to_string(),
            basename: "a".to_string(),
            start_s: 0.0,
            end_s: 0.1,
            low_freq_hz: None,
            high_freq_hz: None,
            freq_mean_khz: Some(40.0),
            confidence,
            species: None,
            source_format: SourceFormat::Json,
        }
    }

    #[test]
    fn test_confidence_filter_skipped_for_unscored_batch() {
        let mut batch = vec![detection(None), detection(None)];
        apply_confidence_filter(&mut batch, 0.5);
        assert_eq!(batch.len(), 2);
    }

    #[test]
    fn test_confidence_filter_drops_low_and_unscored_rows() {
        let mut batch = vec![
            detection(Some(0.9)),
            detection(Some(0.3)),
            detection(None),
        ];
        apply_confidence_filter(&mut batch, 0.5);
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].confidence, Some(0.9));
    }

    #[test]
    fn test_confidence_filter_threshold_is_inclusive() {
        let mut batch = vec![detection(Some(0.5)), detection(Some(0.4999))];
        apply_confidence_filter(&mut batch, 0.5);
        assert_eq!(batch.len(), 1);
    }

    #[test]
    fn test_mean_frequency_prefers_direct_field() {
        let raw = RawAnnotation {
            start_time: Some(0.0),
            end_time: Some(0.1),
            low_freq: Some(40_000.0),
            high_freq: Some(42_000.0),
            freq_mean: Some(39_000.0),
            det_prob: None,
        };
        assert_eq!(mean_frequency_khz(&raw), Some(39.0));
    }

    #[test]
    fn test_mean_frequency_band_midpoint_fallback() {
        let raw = RawAnnotation {
            start_time: Some(0.0),
            end_time: Some(0.1),
            low_freq: Some(40_000.0),
            high_freq: Some(42_000.0),
            freq_mean: None,
            det_prob: None,
        };
        assert_eq!(mean_frequency_khz(&raw), Some(41.0));
    }

    #[test]
    fn test_mean_frequency_absent_when_band_incomplete() {
        let raw = RawAnnotation {
            start_time: Some(0.0),
            end_time: Some(0.1),
            low_freq: Some(40_000.0),
            high_freq: None,
            freq_mean: None,
            det_prob: None,
        };
        assert_eq!(mean_frequency_khz(&raw), None);
    }

    #[test]
    fn test_load_json_dir_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("rec1_seg001.json"),
            r#"{"annotation":[{"start_time":0.1,"end_time":0.3,"low_freq":40000,"high_freq":42000}]}"#,
        )
        .unwrap();

        let bands = BandSet::default();
        let batch = load_json_dir(dir.path(), &bands, 0.5).unwrap();
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].freq_mean_khz, Some(41.0));
        assert_eq!(batch[0].basename, "rec1_seg001");
        // Confidence absent across the batch: row passes unfiltered, and the
        // band rule assigns a species for 41 kHz.
        assert_eq!(batch[0].species.as_deref(), Some("Pipistrellus nathusii"));
    }

    #[test]
    fn test_load_json_dir_skips_malformed_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("bad.json"), "{not json").unwrap();
        std::fs::write(
            dir.path().join("good.json"),
            r#"{"annotation":[{"start_time":0.0,"end_time":0.1,"freq_mean":41000}]}"#,
        )
        .unwrap();

        let batch = load_json_dir(dir.path(), &BandSet::default(), 0.5).unwrap();
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].basename, "good");
    }

    #[test]
    fn test_load_json_dir_skips_inverted_time_range() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("rec.json"),
            r#"{"annotation":[{"start_time":0.3,"end_time":0.1,"freq_mean":41000}]}"#,
        )
        .unwrap();

        let batch = load_json_dir(dir.path(), &BandSet::default(), 0.5).unwrap();
        assert!(batch.is_empty());
    }

    #[test]
    fn test_load_json_dir_missing_dir_is_empty() {
        let batch =
            load_json_dir(Path::new("/nonexistent/anns"), &BandSet::default(), 0.5).unwrap();
        assert!(batch.is_empty());
    }
}
