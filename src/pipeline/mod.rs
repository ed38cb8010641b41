//! Pipeline stage orchestration.
//!
//! Stages run in a fixed sequence, in-process, aborting on the first stage
//! error. "No data" is a valid terminal state for every stage, not an
//! error; missing optional inputs are reported and skipped. The external
//! classifier runs between the splitter and the summary; its exports are
//! expected in the configured detections directory.

use std::collections::HashMap;
use std::path::Path;

use chrono::NaiveDateTime;
use tracing::{info, warn};

use crate::astro::{AstroRecord, load_astro_table};
use crate::config::Config;
use crate::constants::filenames;
use crate::detect::{load_csv_dir, load_json_dir, reconcile};
use crate::error::{Error, Result};
use crate::merge;
use crate::output::{self, RecordingMasterRow, TIMESTAMP_FORMAT};
use crate::position::{RegionBounds, scan_recordings};
use crate::segment::{SegmentIndex, split_directory};
use crate::species::{BandSet, ReferenceDb};
use crate::validate;

/// Split recordings into segments and write the index.
pub fn split_stage(
    input_dir: &Path,
    output_dir: &Path,
    segment_length_secs: u32,
    progress_enabled: bool,
) -> Result<()> {
    let outcome = split_directory(input_dir, output_dir, segment_length_secs, progress_enabled)?;
    info!(
        "Split complete: {} file(s), {} segment(s)",
        outcome.files, outcome.segments
    );
    Ok(())
}

/// Reconcile classifier exports and write the canonical result tables.
///
/// Returns `false` when there was nothing to process; downstream stages
/// treat that as a clean stop.
pub fn summarize_stage(
    input_dir: &Path,
    output_dir: &Path,
    score_threshold: f64,
    segment_index: Option<&Path>,
    recordings: Option<&Path>,
) -> Result<bool> {
    let bands = BandSet::default();

    info!("Loading classifier exports from {}", input_dir.display());
    let json_rows = load_json_dir(input_dir, &bands, score_threshold)?;
    let csv_rows = load_csv_dir(input_dir)?;

    let Some(table) = reconcile(&json_rows, &csv_rows, &bands) else {
        info!("No detection data to process; nothing to do");
        return Ok(false);
    };

    std::fs::create_dir_all(output_dir).map_err(|e| Error::OutputDirCreate {
        path: output_dir.to_path_buf(),
        source: e,
    })?;

    // Absolute timestamps are reconstructed when both the segment index and
    // the recordings master are available.
    let absolute_starts = match (segment_index, recordings) {
        (Some(index_path), Some(recordings_path))
            if index_path.is_file() && recordings_path.is_file() =>
        {
            let index = SegmentIndex::read(index_path)?;
            let starts = load_recording_starts(recordings_path)?;
            Some(
                table
                    .rows
                    .iter()
                    .map(|row| index.absolute_start(&row.basename, row.start_s, &starts))
                    .collect::<Vec<_>>(),
            )
        }
        _ => None,
    };

    let all_path = output_dir.join(filenames::ALL_DETECTIONS);
    output::write_all_detections(&all_path, &table, absolute_starts.as_deref())?;
    info!(
        "Canonical table written to {} ({} rows)",
        all_path.display(),
        table.rows.len()
    );

    let individual_dir = output_dir.join(filenames::INDIVIDUAL_DETECTIONS_DIR);
    let written = output::write_individual_detections(&individual_dir, &table)?;
    info!(
        "{written} per-recording table(s) written to {}",
        individual_dir.display()
    );

    output::write_species_summary(
        &output_dir.join(filenames::SPECIES_SUMMARY),
        &table.species_counts(),
    )?;
    output::write_species_per_file(
        &output_dir.join(filenames::SPECIES_PER_FILE),
        &table.species_per_file(),
    )?;

    Ok(true)
}

/// Validate classifier exports against the species reference table.
pub fn validate_stage(input_dir: &Path, output_dir: &Path, reference_file: &Path) -> Result<()> {
    let reference = ReferenceDb::load(reference_file)?;
    info!(
        "Reference database loaded: {} entries",
        reference.len()
    );
    validate::run(input_dir, output_dir, &reference)?;
    Ok(())
}

/// Recover position metadata and write the recordings master table.
///
/// Returns the number of recordings with plausible position metadata.
pub fn recordings_stage(
    audio_dir: &Path,
    output_path: &Path,
    astro_file: Option<&Path>,
    bounds: &RegionBounds,
) -> Result<usize> {
    if !audio_dir.is_dir() {
        warn!("Audio directory not found: {}", audio_dir.display());
        return Ok(0);
    }

    let records = scan_recordings(audio_dir, bounds)?;
    if records.is_empty() {
        info!("No recordings with plausible position metadata");
        return Ok(0);
    }

    let astro = match astro_file {
        Some(path) if path.is_file() => load_astro_table(path)?,
        Some(path) => {
            warn!("Astronomy table not found at {}, skipping", path.display());
            HashMap::new()
        }
        None => HashMap::new(),
    };

    let rows: Vec<RecordingMasterRow> = records
        .into_iter()
        .map(|(filename, position)| RecordingMasterRow {
            filepath: audio_dir.join(&filename),
            astro: astro
                .get(&filename.to_lowercase())
                .cloned()
                .unwrap_or_else(AstroRecord::unavailable),
            filename,
            position,
        })
        .collect();

    if let Some(parent) = output_path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| Error::OutputDirCreate {
            path: parent.to_path_buf(),
            source: e,
        })?;
    }
    output::write_recordings_master(output_path, &rows)?;
    info!(
        "Recordings master written to {} ({} recordings)",
        output_path.display(),
        rows.len()
    );

    Ok(rows.len())
}

/// Run every stage in the fixed pipeline order.
pub fn run_all(config: &Config, progress_enabled: bool) -> Result<()> {
    let paths = &config.paths;
    let bounds = config.region.bounds();

    info!("[1/5] Segmenting recordings");
    split_stage(
        &paths.audio_dir,
        &paths.segments_dir,
        config.analysis.segment_length_secs,
        progress_enabled,
    )?;

    info!("[2/5] Recovering recording metadata");
    let recordings_master = paths.results_dir.join(filenames::RECORDINGS_MASTER);
    let recordings = recordings_stage(
        &paths.audio_dir,
        &recordings_master,
        paths.astro_file.as_deref(),
        &bounds,
    )?;

    info!("[3/5] Reconciling classifier exports");
    let segment_index = paths.segments_dir.join(filenames::SEGMENT_INDEX);
    let had_data = summarize_stage(
        &paths.detections_dir,
        &paths.results_dir,
        config.analysis.score_threshold,
        Some(&segment_index),
        Some(&recordings_master),
    )?;

    info!("[4/5] Physical validation");
    if paths.reference_file.is_file() {
        validate_stage(
            &paths.detections_dir,
            &paths.validation_dir,
            &paths.reference_file,
        )?;
    } else {
        warn!(
            "Reference table not found at {}; skipping validation",
            paths.reference_file.display()
        );
    }

    info!("[5/5] Final merge");
    if recordings == 0 {
        info!("No recordings master; skipping final merge");
        return Ok(());
    }
    if !paths.telemetry_dir.is_dir() {
        warn!(
            "Telemetry directory not found at {}; skipping final merge",
            paths.telemetry_dir.display()
        );
        return Ok(());
    }

    let species = paths.results_dir.join(filenames::SPECIES_PER_FILE);
    merge::run(
        &recordings_master,
        &paths.telemetry_dir,
        had_data.then_some(species.as_path()),
        &paths.results_dir.join(filenames::MASTER_FINAL),
        config.analysis.merge_tolerance_secs,
    )?;

    info!("Pipeline complete");
    Ok(())
}

/// Map lowercased recording filenames to their start timestamps.
fn load_recording_starts(path: &Path) -> Result<HashMap<String, NaiveDateTime>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
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

    let filename_col = headers
        .iter()
        .position(|h| h == "filename")
        .ok_or_else(|| Error::MissingColumn {
            path: path.to_path_buf(),
            column: "filename".to_string(),
        })?;
    let timestamp_col = headers
        .iter()
        .position(|h| h == "absolute_timestamp")
        .ok_or_else(|| Error::MissingColumn {
            path: path.to_path_buf(),
            column: "absolute_timestamp".to_string(),
        })?;

    let mut starts = HashMap::new();
    for record in reader.records() {
        let record = record.map_err(|e| Error::CsvRead {
            path: path.to_path_buf(),
            source: e,
        })?;
        let (Some(filename), Some(raw_ts)) = (record.get(filename_col), record.get(timestamp_col))
        else {
            continue;
        };
        if let Ok(ts) = NaiveDateTime::parse_from_str(raw_ts, TIMESTAMP_FORMAT) {
            starts.insert(filename.to_lowercase(), ts);
        }
    }
    Ok(starts)
}
