//! Batnexus - passive-acoustic bat-monitoring pipeline.
//!
//! Splits field recordings into classifier-sized segments, reconciles the
//! classifier's JSON/CSV exports into one canonical detection table,
//! validates detections against physical plausibility bounds, recovers
//! position/timestamp metadata from recording headers, and merges
//! environmental telemetry into a final master table.

#![warn(missing_docs)]

pub mod astro;
pub mod cli;
pub mod config;
pub mod constants;
pub mod detect;
pub mod error;
pub mod merge;
pub mod output;
pub mod pipeline;
pub mod position;
pub mod segment;
pub mod species;
pub mod telemetry;
pub mod validate;

use std::path::{Path, PathBuf};

use clap::Parser;
use cli::{Cli, Command, ConfigAction};
use config::{Config, config_file_path, load_default_config, save_default_config};
use constants::filenames;

pub use error::{Error, Result};

/// Main entry point for the batnexus CLI.
pub fn run() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose, cli.quiet);

    let config = load_default_config()?;
    let progress_enabled = !cli.quiet;

    match cli.command {
        Command::Run => pipeline::run_all(&config, progress_enabled),
        Command::Split {
            input,
            output,
            segment_length,
            no_progress,
        } => pipeline::split_stage(
            &resolve(input, &config.paths.audio_dir),
            &resolve(output, &config.paths.segments_dir),
            segment_length.unwrap_or(config.analysis.segment_length_secs),
            progress_enabled && !no_progress,
        ),
        Command::Summarize {
            input,
            output,
            threshold,
            segment_index,
            recordings,
        } => {
            pipeline::summarize_stage(
                &resolve(input, &config.paths.detections_dir),
                &resolve(output, &config.paths.results_dir),
                threshold.unwrap_or(config.analysis.score_threshold),
                segment_index.as_deref(),
                recordings.as_deref(),
            )?;
            Ok(())
        }
        Command::Validate {
            input,
            output,
            reference,
        } => pipeline::validate_stage(
            &resolve(input, &config.paths.detections_dir),
            &resolve(output, &config.paths.validation_dir),
            &resolve(reference, &config.paths.reference_file),
        ),
        Command::Recordings {
            audio,
            output,
            astro,
        } => {
            let default_output = config.paths.results_dir.join(filenames::RECORDINGS_MASTER);
            pipeline::recordings_stage(
                &resolve(audio, &config.paths.audio_dir),
                &resolve(output, &default_output),
                astro.as_deref().or(config.paths.astro_file.as_deref()),
                &config.region.bounds(),
            )?;
            Ok(())
        }
        Command::Merge {
            recordings,
            telemetry,
            species,
            output,
            tolerance,
        } => {
            let default_recordings =
                config.paths.results_dir.join(filenames::RECORDINGS_MASTER);
            let default_species = config.paths.results_dir.join(filenames::SPECIES_PER_FILE);
            let default_output = config.paths.results_dir.join(filenames::MASTER_FINAL);
            let species = resolve(species, &default_species);
            merge::run(
                &resolve(recordings, &default_recordings),
                &resolve(telemetry, &config.paths.telemetry_dir),
                Some(species.as_path()),
                &resolve(output, &default_output),
                tolerance.unwrap_or(config.analysis.merge_tolerance_secs),
            )?;
            Ok(())
        }
        Command::Config { action } => handle_config_command(action),
    }
}

fn resolve(explicit: Option<PathBuf>, default: &Path) -> PathBuf {
    explicit.unwrap_or_else(|| default.to_path_buf())
}

fn init_logging(verbose: u8, quiet: bool) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter_str = if quiet {
        "warn"
    } else {
        match verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter_str));

    fmt().with_env_filter(filter).init();
}

fn handle_config_command(action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Init => {
            let path = config_file_path()?;
            if path.exists() {
                println!("Configuration file already exists: {}", path.display());
            } else {
                let config = Config::default();
                let saved_path = save_default_config(&config)?;
                println!("Created configuration file: {}", saved_path.display());
                println!("\nAdjust the [paths] section to your survey layout, then run:");
                println!("  batnexus run");
            }
            Ok(())
        }
        ConfigAction::Show => {
            let config = load_default_config()?;
            println!("{config:#?}");
            Ok(())
        }
        ConfigAction::Path => {
            let path = config_file_path()?;
            println!("{}", path.display());
            Ok(())
        }
    }
}
