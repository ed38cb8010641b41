//! CLI argument definitions.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Passive-acoustic bat-monitoring pipeline.
#[derive(Debug, Parser)]
#[command(name = "batnexus")]
#[command(author, version, about, long_about = None)]
#[command(arg_required_else_help = true)]
pub struct Cli {
    /// Subcommand to run.
    #[command(subcommand)]
    pub command: Command,

    /// Suppress progress output.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Increase verbosity (-v: debug, -vv: trace).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

/// Available subcommands, one per pipeline stage plus orchestration.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the full pipeline in its fixed stage order.
    Run,

    /// Split recordings into fixed-length segments with an index.
    Split {
        /// Directory with the original recordings.
        #[arg(short, long, env = "BATNEXUS_AUDIO_DIR")]
        input: Option<PathBuf>,
        /// Directory for segment files and the segment index.
        #[arg(short, long, env = "BATNEXUS_SEGMENTS_DIR")]
        output: Option<PathBuf>,
        /// Segment length in seconds.
        #[arg(short = 'l', long)]
        segment_length: Option<u32>,
        /// Disable the progress bar.
        #[arg(long)]
        no_progress: bool,
    },

    /// Reconcile classifier JSON/CSV exports into the canonical tables.
    Summarize {
        /// Directory with the classifier exports.
        #[arg(short, long, env = "BATNEXUS_DETECTIONS_DIR")]
        input: Option<PathBuf>,
        /// Directory for the result tables.
        #[arg(short, long, env = "BATNEXUS_RESULTS_DIR")]
        output: Option<PathBuf>,
        /// Confidence threshold for the JSON export path (0.0-1.0).
        #[arg(short = 't', long, value_parser = parse_threshold, env = "BATNEXUS_SCORE_THRESHOLD")]
        threshold: Option<f64>,
        /// Segment index for absolute timestamp reconstruction.
        #[arg(long)]
        segment_index: Option<PathBuf>,
        /// Recordings master table with recording-start timestamps.
        #[arg(long)]
        recordings: Option<PathBuf>,
    },

    /// Validate classifier output against the species reference table.
    Validate {
        /// Directory with the classifier CSV exports.
        #[arg(short, long, env = "BATNEXUS_DETECTIONS_DIR")]
        input: Option<PathBuf>,
        /// Directory for the report and review copies.
        #[arg(short, long, env = "BATNEXUS_VALIDATION_DIR")]
        output: Option<PathBuf>,
        /// Species reference CSV.
        #[arg(short, long, env = "BATNEXUS_REFERENCE_FILE")]
        reference: Option<PathBuf>,
    },

    /// Recover position/timestamp metadata from recording headers.
    Recordings {
        /// Directory with the original recordings.
        #[arg(short, long, env = "BATNEXUS_AUDIO_DIR")]
        audio: Option<PathBuf>,
        /// Output path for the recordings master table.
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Precomputed astronomy table keyed by recording filename.
        #[arg(long)]
        astro: Option<PathBuf>,
    },

    /// Merge recordings, telemetry and species data into the master table.
    Merge {
        /// Recordings master table.
        #[arg(short, long)]
        recordings: Option<PathBuf>,
        /// Directory with environmental telemetry logs.
        #[arg(short, long, env = "BATNEXUS_TELEMETRY_DIR")]
        telemetry: Option<PathBuf>,
        /// Per-file species table from the summarize stage.
        #[arg(short, long)]
        species: Option<PathBuf>,
        /// Output path for the merged master table.
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Join tolerance in seconds.
        #[arg(long)]
        tolerance: Option<i64>,
    },

    /// Manage configuration.
    Config {
        /// Configuration action to perform.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommand actions.
#[derive(Debug, Clone, Copy, Subcommand)]
pub enum ConfigAction {
    /// Create default configuration file.
    Init,
    /// Display current configuration.
    Show,
    /// Print configuration file path.
    Path,
}

fn parse_threshold(s: &str) -> Result<f64, String> {
    let value: f64 = s
        .parse()
        .map_err(|_| format!("'{s}' is not a valid number"))?;
    if (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(format!("{value} is out of range (0.0-1.0)"))
    }
}
