//! Detection reconciliation.
//!
//! Merges the JSON-derived and CSV-derived detection batches into one
//! canonical table keyed by `(basename, start, end)`. Field conflicts are
//! resolved with a fixed source-priority rule: the CSV value wins when
//! present, the JSON value otherwise.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use tracing::info;

use crate::constants::NOT_AVAILABLE;
use crate::detect::record::Detection;
use crate::species::BandSet;

/// One detection after merging all available sources.
#[derive(Debug, Clone)]
pub struct CanonicalDetection {
    /// Name of the classifier output file the JSON/primary record came from.
    pub segment_file: String,
    /// Segment file stem, the per-recording grouping key.
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
    /// Resolved species label.
    pub species: Option<String>,
}

impl From<&Detection> for CanonicalDetection {
    fn from(det: &Detection) -> Self {
        Self {
            segment_file: det.segment_file.clone(),
            basename: det.basename.clone(),
            start_s: det.start_s,
            end_s: det.end_s,
            low_freq_hz: det.low_freq_hz,
            high_freq_hz: det.high_freq_hz,
            freq_mean_khz: det.freq_mean_khz,
            confidence: det.confidence,
            species: det.species.clone(),
        }
    }
}

impl CanonicalDetection {
    /// Call duration in milliseconds.
    pub fn duration_ms(&self) -> f64 {
        (self.end_s - self.start_s) * 1000.0
    }
}

/// The canonical detection table with its derived aggregates.
#[derive(Debug, Clone)]
pub struct CanonicalTable {
    /// Reconciled detection rows.
    pub rows: Vec<CanonicalDetection>,
}

impl CanonicalTable {
    /// Per-species total counts, descending by count (ties alphabetical).
    ///
    /// Rows without a species label are not counted.
    pub fn species_counts(&self) -> Vec<(String, usize)> {
        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
        for row in &self.rows {
            if let Some(species) = row.species.as_deref() {
                *counts.entry(species).or_insert(0) += 1;
            }
        }
        let mut out: Vec<(String, usize)> = counts
            .into_iter()
            .map(|(species, count)| (species.to_string(), count))
            .collect();
        out.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        out
    }

    /// Per-file sorted, de-duplicated, comma-joined species lists.
    ///
    /// Rows without a species label contribute the "not available" marker,
    /// which downstream consumers clean out before presentation.
    pub fn species_per_file(&self) -> Vec<(String, String)> {
        let mut per_file: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
        for row in &self.rows {
            per_file
                .entry(&row.basename)
                .or_default()
                .insert(row.species.as_deref().unwrap_or(NOT_AVAILABLE));
        }
        per_file
            .into_iter()
            .map(|(basename, species)| {
                let joined = species.into_iter().collect::<Vec<_>>().join(", ");
                (basename.to_string(), joined)
            })
            .collect()
    }
}

/// Per-field source-priority resolution: the CSV-sourced value wins when
/// present, otherwise the JSON-sourced value is kept. Absence is a null
/// value, not a missing source; the rule holds even when only one source
/// contributed a record.
pub fn prefer_csv<T>(csv_value: Option<T>, json_value: Option<T>) -> Option<T> {
    csv_value.or(json_value)
}

/// Reconcile the two loader batches into one canonical table.
///
/// Returns `None` when both batches are empty; downstream stages treat that
/// as a valid "nothing to do" terminal state, not an error.
pub fn reconcile(
    json_rows: &[Detection],
    csv_rows: &[Detection],
    bands: &BandSet,
) -> Option<CanonicalTable> {
    if json_rows.is_empty() && csv_rows.is_empty() {
        return None;
    }

    let mut rows: Vec<CanonicalDetection> = if json_rows.is_empty() {
        info!("{} detections loaded from CSV exports only", csv_rows.len());
        csv_rows.iter().map(CanonicalDetection::from).collect()
    } else if csv_rows.is_empty() {
        info!("{} detections loaded from JSON exports only", json_rows.len());
        json_rows.iter().map(CanonicalDetection::from).collect()
    } else {
        info!(
            "Combining {} JSON detections with {} CSV detections",
            json_rows.len(),
            csv_rows.len()
        );
        merge_batches(json_rows, csv_rows)
    };

    backfill_species(&mut rows, bands);

    Some(CanonicalTable { rows })
}

/// Left-join the JSON batch with the CSV batch on `(basename, start, end)`
/// and resolve each contested field per row.
fn merge_batches(json_rows: &[Detection], csv_rows: &[Detection]) -> Vec<CanonicalDetection> {
    let mut csv_by_key: HashMap<JoinKey, &Detection> = HashMap::new();
    for row in csv_rows {
        csv_by_key.entry(JoinKey::of(row)).or_insert(row);
    }

    json_rows
        .iter()
        .map(|json| {
            let matched = csv_by_key.get(&JoinKey::of(json)).copied();
            CanonicalDetection {
                segment_file: json.segment_file.clone(),
                basename: json.basename.clone(),
                start_s: json.start_s,
                end_s: json.end_s,
                low_freq_hz: prefer_csv(matched.and_then(|c| c.low_freq_hz), json.low_freq_hz),
                high_freq_hz: prefer_csv(matched.and_then(|c| c.high_freq_hz), json.high_freq_hz),
                freq_mean_khz: json.freq_mean_khz,
                confidence: prefer_csv(matched.and_then(|c| c.confidence), json.confidence),
                species: prefer_csv(
                    matched.and_then(|c| c.species.clone()),
                    json.species.clone(),
                ),
            }
        })
        .collect()
}

/// Fill the species column from the band rule, but only when it is entirely
/// absent. Once any classifier-assigned label exists, no per-row backfill
/// happens; classifier labels take precedence over frequency-rule labels.
fn backfill_species(rows: &mut [CanonicalDetection], bands: &BandSet) {
    if rows.iter().any(|r| r.species.is_some()) {
        return;
    }
    for row in rows {
        row.species = Some(bands.classify(row.freq_mean_khz).to_string());
    }
}

/// Join key over `(basename, start, end)` with exact float equality.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct JoinKey(String, u64, u64);

impl JoinKey {
    fn of(det: &Detection) -> Self {
        Self(
            det.basename.clone(),
            det.start_s.to_bits(),
            det.end_s.to_bits(),
        )
    }
}
