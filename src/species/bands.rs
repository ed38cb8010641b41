//! Frequency-band species assignment.
//!
//! Maps a mean call frequency to a species label via an ordered list of
//! expert-curated frequency bands. Bands may overlap; earlier entries take
//! priority, so the list order is part of the rule set.

use crate::constants::{FALLBACK_BAND, UNDETERMINED_SPECIES};

/// Default band table: `(species, f_min_khz, f_max_khz)`.
///
/// The catch-all band must remain at the end so that every finite frequency
/// in range receives a label.
const DEFAULT_BANDS: &[(&str, f64, f64)] = &[
    // Rhinolophus (CF callers, highest frequencies)
    ("Rhinolophus hipposideros", 106.0, 120.0),
    ("Rhinolophus ferrumequinum", 77.0, 88.0),
    // Pipistrellus/Nyctalus/Eptesicus
    ("Pipistrellus pygmaeus", 53.0, 58.0),
    ("Pipistrellus pipistrellus", 45.0, 75.0),
    ("Pipistrellus nathusii", 37.0, 50.0),
    ("Eptesicus serotinus", 25.0, 40.0),
    ("Nyctalus noctula", 18.0, 30.0),
    ("Nyctalus leisleri", 25.0, 45.0),
    ("Vespertilio murinus", 22.0, 35.0),
    ("Eptesicus nilssonii", 23.0, 35.0),
    // Myotis (FM callers, often broad bands)
    ("Myotis mystacinus/brandtii", 40.0, 65.0),
    ("Myotis daubentonii", 45.0, 65.0),
    ("Myotis nattereri", 40.0, 65.0),
    ("Myotis bechsteinii", 35.0, 50.0),
    ("Myotis myotis/blythii", 25.0, 50.0),
    ("Myotis dasycneme", 40.0, 65.0),
    ("Myotis capaccinii", 40.0, 50.0),
    ("Myotis alcathoe", 55.0, 65.0),
    ("Myotis emarginatus", 35.0, 55.0),
    // Others
    ("Barbastella barbastellus", 30.0, 40.0),
    ("Plecotus auritus/austriacus", 25.0, 40.0),
    ("Miniopterus schreibersii", 50.0, 60.0),
    ("Tadarida teniotis", 10.0, 15.0),
    ("Hypsugo savii", 30.0, 55.0),
    ("Nyctalus lasiopterus", 18.0, 22.0),
    ("Pipistrellus kuhlii", 35.0, 50.0),
    (FALLBACK_BAND, 0.0, 125.0),
];

/// One frequency band with its species label.
#[derive(Debug, Clone)]
pub struct FrequencyBand {
    /// Species label assigned to calls inside the band.
    pub species: String,
    /// Lower band edge in kHz (inclusive).
    pub min_khz: f64,
    /// Upper band edge in kHz (inclusive).
    pub max_khz: f64,
}

/// Ordered, immutable set of frequency bands.
#[derive(Debug, Clone)]
pub struct BandSet {
    bands: Vec<FrequencyBand>,
}

impl BandSet {
    /// Create a band set from an explicit ordered list.
    pub fn new(bands: Vec<FrequencyBand>) -> Self {
        Self { bands }
    }

    /// Assign a species to a mean call frequency in kHz.
    ///
    /// Returns the label of the first band whose closed interval contains
    /// the frequency. A missing or non-finite frequency yields
    /// `"undetermined"`, as does a frequency outside every band (which the
    /// default table's catch-all prevents).
    pub fn classify(&self, freq_mean_khz: Option<f64>) -> &str {
        let Some(freq) = freq_mean_khz.filter(|f| f.is_finite()) else {
            return UNDETERMINED_SPECIES;
        };
        for band in &self.bands {
            if band.min_khz <= freq && freq <= band.max_khz {
                return &band.species;
            }
        }
        UNDETERMINED_SPECIES
    }

    /// Number of bands in the set.
    pub fn len(&self) -> usize {
        self.bands.len()
    }

    /// Whether the set contains no bands.
    pub fn is_empty(&self) -> bool {
        self.bands.is_empty()
    }
}

impl Default for BandSet {
    fn default() -> Self {
        Self::new(
            DEFAULT_BANDS
                .iter()
                .map(|&(species, min_khz, max_khz)| FrequencyBand {
                    species: species.to_string(),
                    min_khz,
                    max_khz,
                })
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn band(species: &str, min_khz: f64, max_khz: f64) -> FrequencyBand {
        FrequencyBand {
            species: species.to_string(),
            min_khz,
            max_khz,
        }
    }

    #[test]
    fn test_classify_first_band_wins_on_overlap() {
        let set = BandSet::new(vec![band("A", 35.0, 45.0), band("B", 38.0, 50.0)]);
        assert_eq!(set.classify(Some(40.0)), "A");
    }

    #[test]
    fn test_classify_band_edges_inclusive() {
        let set = BandSet::new(vec![band("A", 35.0, 45.0)]);
        assert_eq!(set.classify(Some(35.0)), "A");
        assert_eq!(set.classify(Some(45.0)), "A");
        assert_eq!(set.classify(Some(45.01)), UNDETERMINED_SPECIES);
    }

    #[test]
    fn test_classify_missing_frequency() {
        let set = BandSet::default();
        assert_eq!(set.classify(None), UNDETERMINED_SPECIES);
        assert_eq!(set.classify(Some(f64::NAN)), UNDETERMINED_SPECIES);
    }

    #[test]
    fn test_default_set_catch_all_covers_everything_in_range() {
        let set = BandSet::default();
        // 5 kHz falls outside every species band but inside the catch-all.
        assert_eq!(set.classify(Some(5.0)), FALLBACK_BAND);
        // Out of the catch-all range entirely.
        assert_eq!(set.classify(Some(300.0)), UNDETERMINED_SPECIES);
    }

    #[test]
    fn test_default_set_priority_examples() {
        let set = BandSet::default();
        // 41 kHz: Pipistrellus nathusii (37-50) precedes the Myotis bands.
        assert_eq!(set.classify(Some(41.0)), "Pipistrellus nathusii");
        // 110 kHz: lesser horseshoe band.
        assert_eq!(set.classify(Some(110.0)), "Rhinolophus hipposideros");
    }
}
