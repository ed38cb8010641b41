//! Recording position and timestamp recovery.
//!
//! Field recorders embed GPS coordinates and the recording-start timestamp
//! as text metadata inside the WAV container. The GUANO chunk is parsed as
//! line-based `Key: Value` pairs first; a raw text scan over the other
//! metadata chunks serves as a fallback for recorders that write free-form
//! comment fields.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use tracing::{debug, info, warn};

use crate::constants::{MAX_METADATA_SNIPPET_BYTES, METADATA_CHUNK_IDS, region};
use crate::error::Result;

/// Plausibility bounding box for the expected survey region.
#[derive(Debug, Clone, Copy)]
pub struct RegionBounds {
    /// Minimum plausible latitude in degrees.
    pub lat_min: f64,
    /// Maximum plausible latitude in degrees.
    pub lat_max: f64,
    /// Minimum plausible longitude in degrees.
    pub lon_min: f64,
    /// Maximum plausible longitude in degrees.
    pub lon_max: f64,
}

impl Default for RegionBounds {
    fn default() -> Self {
        Self {
            lat_min: region::LAT_MIN,
            lat_max: region::LAT_MAX,
            lon_min: region::LON_MIN,
            lon_max: region::LON_MAX,
        }
    }
}

impl RegionBounds {
    /// Whether a coordinate pair falls inside the bounding box.
    pub fn contains(&self, lat: f64, lon: f64) -> bool {
        (self.lat_min..=self.lat_max).contains(&lat)
            && (self.lon_min..=self.lon_max).contains(&lon)
    }
}

/// Recovered position and start timestamp of one recording.
#[derive(Debug, Clone, PartialEq)]
pub struct PositionRecord {
    /// Latitude in degrees.
    pub latitude: f64,
    /// Longitude in degrees.
    pub longitude: f64,
    /// Elevation in metres; 0.0 when unknown.
    pub elevation_m: f64,
    /// Recording-start timestamp, when the header carried one.
    pub timestamp: Option<NaiveDateTime>,
    /// Provenance of the extraction, including any coordinate-order
    /// correction.
    pub source_tag: String,
}

/// Extract position metadata from one WAV file.
///
/// Returns `None` when no plausible coordinates are found; that is an
/// expected per-file outcome, not an error.
pub fn extract_position(path: &Path, bounds: &RegionBounds) -> Option<PositionRecord> {
    let data = match std::fs::read(path) {
        Ok(data) => data,
        Err(e) => {
            warn!("{}: read failed: {e}", path.display());
            return None;
        }
    };

    if let Some(record) = from_guano_chunk(&data, bounds) {
        return Some(record);
    }
    from_raw_text_scan(&data, bounds)
}

/// Scan every WAV recording in a directory for position metadata.
///
/// Returns `(filename, record)` pairs sorted by filename; recordings
/// without plausible coordinates are skipped.
pub fn scan_recordings(dir: &Path, bounds: &RegionBounds) -> Result<Vec<(String, PositionRecord)>> {
    let mut wav_files: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| {
            p.is_file()
                && p.extension()
                    .is_some_and(|ext| ext.eq_ignore_ascii_case("wav"))
        })
        .collect();
    wav_files.sort();

    let mut records = Vec::new();
    for file in &wav_files {
        let name = file
            .file_name()
            .map_or_else(String::new, |n| n.to_string_lossy().into_owned());
        match extract_position(file, bounds) {
            Some(record) => {
                debug!(
                    "{name}: {:.5}, {:.5} ({})",
                    record.latitude, record.longitude, record.source_tag
                );
                records.push((name, record));
            }
            None => info!("{name}: no plausible position metadata"),
        }
    }
    Ok(records)
}

/// Parse the GUANO chunk as `Key: Value` lines.
fn from_guano_chunk(data: &[u8], bounds: &RegionBounds) -> Option<PositionRecord> {
    for chunk_id in [b"guan".as_slice(), b"GUAN".as_slice()] {
        for snippet in chunk_snippets(data, chunk_id) {
            let fields = parse_guano_fields(&snippet);

            let position = ["Loc Position", "Position", "GPS Position", "Location"]
                .iter()
                .find_map(|key| fields.get(*key));
            let Some((lat_raw, lon_raw)) = position.and_then(|v| parse_float_pair(v)) else {
                continue;
            };
            let Some((latitude, longitude, swapped)) = accept(bounds, lat_raw, lon_raw) else {
                continue;
            };

            let elevation_m = fields
                .get("Loc Elevation")
                .and_then(|v| v.trim().parse::<f64>().ok())
                .unwrap_or(0.0);
            let timestamp = fields.get("Timestamp").and_then(|v| parse_iso_timestamp(v));

            return Some(PositionRecord {
                latitude,
                longitude,
                elevation_m,
                timestamp,
                source_tag: tag("guano", swapped),
            });
        }
    }
    None
}

/// Free-text scan over the remaining metadata chunks.
fn from_raw_text_scan(data: &[u8], bounds: &RegionBounds) -> Option<PositionRecord> {
    for chunk_id in METADATA_CHUNK_IDS {
        for snippet in chunk_snippets(data, chunk_id) {
            // "Loc Position:" also matches the bare "Position:" marker.
            let Some((lat_raw, lon_raw)) =
                value_after(&snippet, "Position:").and_then(parse_float_pair)
            else {
                continue;
            };
            let Some((latitude, longitude, swapped)) = accept(bounds, lat_raw, lon_raw) else {
                continue;
            };

            let elevation_m = value_after(&snippet, "Loc Elevation:")
                .and_then(|v| first_float(v))
                .unwrap_or(0.0);
            let timestamp = value_after(&snippet, "Timestamp:").and_then(parse_iso_timestamp);

            return Some(PositionRecord {
                latitude,
                longitude,
                elevation_m,
                timestamp,
                source_tag: tag("header-fallback", swapped),
            });
        }
    }
    None
}

/// Accept coordinates inside the bounding box, correcting swapped order.
fn accept(bounds: &RegionBounds, lat_raw: f64, lon_raw: f64) -> Option<(f64, f64, bool)> {
    if bounds.contains(lat_raw, lon_raw) {
        Some((lat_raw, lon_raw, false))
    } else if bounds.contains(lon_raw, lat_raw) {
        Some((lon_raw, lat_raw, true))
    } else {
        None
    }
}

fn tag(source: &str, swapped: bool) -> String {
    if swapped {
        format!("{source} (lat/lon swapped)")
    } else {
        source.to_string()
    }
}

/// Collect text snippets of every occurrence of a chunk identifier.
///
/// The scan is tolerant rather than a strict RIFF walk: recorders nest
/// these chunks in LIST containers or write them with vendor quirks, so
/// each identifier occurrence is treated as `id + u32 size + payload` and
/// capped at a few KiB of text.
fn chunk_snippets(data: &[u8], chunk_id: &[u8]) -> Vec<String> {
    let mut snippets = Vec::new();
    let mut from = 0;
    while let Some(idx) = find_from(data, chunk_id, from) {
        if idx + 8 <= data.len() {
            let size = u32::from_le_bytes([
                data[idx + 4],
                data[idx + 5],
                data[idx + 6],
                data[idx + 7],
            ]) as usize;
            let start = idx + 8;
            let end = start
                .saturating_add(size.min(MAX_METADATA_SNIPPET_BYTES))
                .min(data.len());
            if start < end {
                snippets.push(String::from_utf8_lossy(&data[start..end]).into_owned());
            }
        }
        from = idx + 1;
    }
    snippets
}

fn find_from(data: &[u8], pat: &[u8], from: usize) -> Option<usize> {
    if pat.is_empty() || data.len() < pat.len() || from > data.len() - pat.len() {
        return None;
    }
    (from..=data.len() - pat.len()).find(|&i| &data[i..i + pat.len()] == pat)
}

/// Parse a GUANO payload into `Key: Value` pairs.
fn parse_guano_fields(text: &str) -> HashMap<String, String> {
    text.lines()
        .filter_map(|line| {
            let (key, value) = line.split_once(':')?;
            let key = key.trim();
            let value = value.trim();
            (!key.is_empty() && !value.is_empty())
                .then(|| (key.to_string(), value.to_string()))
        })
        .collect()
}

/// First two floats in a position value, separated by whitespace or commas.
fn parse_float_pair(s: &str) -> Option<(f64, f64)> {
    let mut nums = s
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|t| !t.is_empty())
        .filter_map(|t| t.parse::<f64>().ok());
    Some((nums.next()?, nums.next()?))
}

fn first_float(s: &str) -> Option<f64> {
    s.split(|c: char| c.is_whitespace() || c == ',')
        .filter(|t| !t.is_empty())
        .find_map(|t| t.parse::<f64>().ok())
}

/// First line of text following a marker.
fn value_after<'a>(text: &'a str, marker: &str) -> Option<&'a str> {
    let idx = text.find(marker)?;
    let rest = &text[idx + marker.len()..];
    Some(rest.lines().next().unwrap_or(rest))
}

/// Parse an ISO `YYYY-MM-DDTHH:MM:SS` timestamp, tolerating a UTC suffix.
fn parse_iso_timestamp(s: &str) -> Option<NaiveDateTime> {
    let trimmed = s.trim().trim_end_matches('Z');
    let head = trimmed.get(..19)?;
    NaiveDateTime::parse_from_str(head, "%Y-%m-%dT%H:%M:%S").ok()
}
