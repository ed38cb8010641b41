//! Recording segmentation and the segment index.
//!
//! Long field recordings are split into fixed-length segments for the
//! external classifier. The index maps every segment back to its original
//! recording and time offset so absolute timestamps can be reconstructed.

mod splitter;

pub use splitter::{SplitOutcome, split_directory};

use std::collections::HashMap;
use std::path::Path;

use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// One row of the segment index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentIndexEntry {
    /// Name of the original recording.
    pub original_filename: String,
    /// Name of the segment file.
    pub segment_filename: String,
    /// 1-based segment counter within the recording.
    pub segment_number: u32,
    /// Segment offset from the recording start in whole seconds.
    pub segment_start_sec: u64,
    /// Actual segment duration in seconds (the last segment may be shorter).
    pub segment_duration_sec: f64,
}

/// Compute the segment schedule for one recording.
///
/// Segments are contiguous and non-overlapping; their start offsets form an
/// arithmetic sequence with step `segment_length_secs`, and the last segment
/// covers whatever remains.
pub fn plan_segments(
    original_filename: &str,
    duration_sec: f64,
    segment_length_secs: u32,
) -> Vec<SegmentIndexEntry> {
    if duration_sec <= 0.0 || segment_length_secs == 0 {
        return Vec::new();
    }

    let stem = Path::new(original_filename)
        .file_stem()
        .map_or_else(|| original_filename.to_string(), |s| s.to_string_lossy().into_owned());
    let step = f64::from(segment_length_secs);

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let count = (duration_sec / step).ceil() as u32;

    (0..count)
        .map(|i| {
            let start_sec = u64::from(i) * u64::from(segment_length_secs);
            #[allow(clippy::cast_precision_loss)]
            let remaining = duration_sec - start_sec as f64;
            SegmentIndexEntry {
                original_filename: original_filename.to_string(),
                segment_filename: format!("{stem}_seg{:03}.wav", i + 1),
                segment_number: i + 1,
                segment_start_sec: start_sec,
                segment_duration_sec: remaining.min(step),
            }
        })
        .collect()
}

/// The segment index with a lookup by segment file stem.
#[derive(Debug, Clone, Default)]
pub struct SegmentIndex {
    entries: Vec<SegmentIndexEntry>,
    by_segment_stem: HashMap<String, usize>,
}

impl SegmentIndex {
    /// Build an index from entries.
    pub fn new(entries: Vec<SegmentIndexEntry>) -> Self {
        let by_segment_stem = entries
            .iter()
            .enumerate()
            .map(|(idx, entry)| {
                let stem = Path::new(&entry.segment_filename)
                    .file_stem()
                    .map_or_else(
                        || entry.segment_filename.clone(),
                        |s| s.to_string_lossy().into_owned(),
                    );
                (stem.to_lowercase(), idx)
            })
            .collect();
        Self {
            entries,
            by_segment_stem,
        }
    }

    /// Read the index from its CSV file.
    pub fn read(path: &Path) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_path(path)
            .map_err(|e| Error::CsvRead {
                path: path.to_path_buf(),
                source: e,
            })?;

        let mut entries = Vec::new();
        for record in reader.deserialize::<SegmentIndexEntry>() {
            entries.push(record.map_err(|e| Error::CsvRead {
                path: path.to_path_buf(),
                source: e,
            })?);
        }
        Ok(Self::new(entries))
    }

    /// Write the index to its CSV file.
    pub fn write(path: &Path, entries: &[SegmentIndexEntry]) -> Result<()> {
        let mut writer = csv::Writer::from_path(path).map_err(|e| Error::CsvWrite {
            path: path.to_path_buf(),
            source: e,
        })?;
        for entry in entries {
            writer.serialize(entry).map_err(|e| Error::CsvWrite {
                path: path.to_path_buf(),
                source: e,
            })?;
        }
        writer.flush().map_err(|e| Error::CsvWrite {
            path: path.to_path_buf(),
            source: csv::Error::from(e),
        })?;
        Ok(())
    }

    /// Look up the entry for a segment file stem (case-insensitive).
    pub fn lookup(&self, segment_stem: &str) -> Option<&SegmentIndexEntry> {
        self.by_segment_stem
            .get(&segment_stem.to_lowercase())
            .map(|&idx| &self.entries[idx])
    }

    /// Reconstruct the absolute timestamp of a detection.
    ///
    /// `recording_starts` maps lowercased original recording names to their
    /// recovered start timestamps; the detection offset is the segment
    /// offset plus the in-segment start time.
    pub fn absolute_start(
        &self,
        segment_stem: &str,
        start_s: f64,
        recording_starts: &HashMap<String, NaiveDateTime>,
    ) -> Option<NaiveDateTime> {
        let entry = self.lookup(segment_stem)?;
        let recording_start = recording_starts.get(&entry.original_filename.to_lowercase())?;
        #[allow(clippy::cast_possible_truncation)]
        let offset_ms = ((entry.segment_start_sec as f64 + start_s) * 1000.0).round() as i64;
        Some(*recording_start + Duration::milliseconds(offset_ms))
    }

    /// All index entries, in file order.
    pub fn entries(&self) -> &[SegmentIndexEntry] {
        &self.entries
    }
}
