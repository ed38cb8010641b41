//! Astronomical context records.
//!
//! Sun/moon geometry is not computed here; it is consumed from an optional
//! precomputed table keyed by recording filename. Every field degrades to a
//! "not available" sentinel when an input is missing.

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;
use tracing::info;

use crate::error::{Error, Result};

/// Sun and moon geometry for one recording.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct AstroRecord {
    /// Sun azimuth in degrees.
    pub sun_azimuth_deg: Option<f64>,
    /// Sun elevation in degrees.
    pub sun_elevation_deg: Option<f64>,
    /// Moon azimuth in degrees.
    pub moon_azimuth_deg: Option<f64>,
    /// Moon elevation in degrees.
    pub moon_elevation_deg: Option<f64>,
    /// Illuminated fraction of the moon disc in [0, 1].
    pub moon_illuminated_fraction: Option<f64>,
}

impl AstroRecord {
    /// A record with every field marked not available.
    pub fn unavailable() -> Self {
        Self::default()
    }
}

// Explicit row shape: the csv deserializer needs flat, typed fields.
#[derive(Debug, Deserialize)]
struct AstroRow {
    filename: String,
    sun_azimuth_deg: Option<f64>,
    sun_elevation_deg: Option<f64>,
    moon_azimuth_deg: Option<f64>,
    moon_elevation_deg: Option<f64>,
    moon_illuminated_fraction: Option<f64>,
}

/// Load a precomputed astronomy table keyed by lowercased filename.
///
/// Expected columns: `filename`, `sun_azimuth_deg`, `sun_elevation_deg`,
/// `moon_azimuth_deg`, `moon_elevation_deg`, `moon_illuminated_fraction`.
/// Empty cells become "not available".
pub fn load_astro_table(path: &Path) -> Result<HashMap<String, AstroRecord>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|e| Error::CsvRead {
            path: path.to_path_buf(),
            source: e,
        })?;

    let mut table = HashMap::new();
    for row in reader.deserialize::<AstroRow>() {
        let row = row.map_err(|e| Error::CsvRead {
            path: path.to_path_buf(),
            source: e,
        })?;
        table.insert(
            row.filename.to_lowercase(),
            AstroRecord {
                sun_azimuth_deg: row.sun_azimuth_deg,
                sun_elevation_deg: row.sun_elevation_deg,
                moon_azimuth_deg: row.moon_azimuth_deg,
                moon_elevation_deg: row.moon_elevation_deg,
                moon_illuminated_fraction: row.moon_illuminated_fraction,
            },
        );
    }

    info!("Astronomy table loaded: {} recording(s)", table.len());
    Ok(table)
}
