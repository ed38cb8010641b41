//! Species assignment and reference data.

mod bands;
mod reference;

pub use bands::{BandSet, FrequencyBand};
pub use reference::{CallBounds, ReferenceDb};
