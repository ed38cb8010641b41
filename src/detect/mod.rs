//! Detection ingestion and reconciliation.
//!
//! The upstream classifier writes its results twice: a per-file JSON format
//! with nested annotation arrays, and a tabular CSV export. Both are parsed
//! into a common record shape and merged into one canonical table.

mod csv;
mod json;
mod reconcile;
mod record;

pub use self::csv::{load_csv_dir, load_csv_file};
pub use json::{apply_confidence_filter, load_json_dir};
pub use reconcile::{CanonicalDetection, CanonicalTable, prefer_csv, reconcile};
pub use record::{Detection, SourceFormat, basename_of};
