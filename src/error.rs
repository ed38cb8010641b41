//! Error types for batnexus.

/// Result type alias for batnexus operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type for batnexus.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration directory could not be determined.
    #[error("could not determine configuration directory for this platform")]
    ConfigDirNotFound,

    /// Failed to read configuration file.
    #[error("failed to read config file '{path}'")]
    ConfigRead {
        /// Path to the config file.
        path: std::path::PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse configuration file.
    #[error("failed to parse config file '{path}'")]
    ConfigParse {
        /// Path to the config file.
        path: std::path::PathBuf,
        /// Underlying parse error.
        #[source]
        source: toml::de::Error,
    },

    /// Failed to write configuration file.
    #[error("failed to write config file '{path}'")]
    ConfigWrite {
        /// Path to the config file.
        path: std::path::PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to serialize configuration.
    #[error("failed to serialize config")]
    ConfigSerialize {
        /// Underlying serialization error.
        #[source]
        source: toml::ser::Error,
    },

    /// A required input file or directory does not exist.
    #[error("input not found: {path}")]
    InputNotFound {
        /// Path to the missing input.
        path: std::path::PathBuf,
    },

    /// Failed to read the species reference table.
    #[error("failed to read species reference table '{path}'")]
    ReferenceRead {
        /// Path to the reference table.
        path: std::path::PathBuf,
        /// Underlying parse error.
        #[source]
        source: csv::Error,
    },

    /// The species reference table is unusable.
    #[error("invalid species reference table '{path}': {message}")]
    ReferenceInvalid {
        /// Path to the reference table.
        path: std::path::PathBuf,
        /// Description of the problem.
        message: String,
    },

    /// Failed to read a CSV file.
    #[error("failed to read CSV file '{path}'")]
    CsvRead {
        /// Path to the CSV file.
        path: std::path::PathBuf,
        /// Underlying parse error.
        #[source]
        source: csv::Error,
    },

    /// Failed to write a CSV file.
    #[error("failed to write CSV file '{path}'")]
    CsvWrite {
        /// Path to the CSV file.
        path: std::path::PathBuf,
        /// Underlying error.
        #[source]
        source: csv::Error,
    },

    /// A required column is missing from an input table.
    #[error("column '{column}' missing from '{path}'")]
    MissingColumn {
        /// Path to the input table.
        path: std::path::PathBuf,
        /// Name of the missing column.
        column: String,
    },

    /// Failed to copy a file into the manual review directory.
    #[error("failed to copy '{path}' into review directory")]
    ReviewCopy {
        /// Path to the source file.
        path: std::path::PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to open a WAV file.
    #[error("failed to open WAV file '{path}'")]
    WavOpen {
        /// Path to the WAV file.
        path: std::path::PathBuf,
        /// Underlying error.
        #[source]
        source: hound::Error,
    },

    /// Failed to write a WAV file.
    #[error("failed to write WAV file '{path}'")]
    WavWrite {
        /// Path to the WAV file.
        path: std::path::PathBuf,
        /// Underlying error.
        #[source]
        source: hound::Error,
    },

    /// Failed to create an output directory.
    #[error("failed to create output directory '{path}'")]
    OutputDirCreate {
        /// Path to the output directory.
        path: std::path::PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// No usable environmental telemetry could be loaded.
    #[error("no usable telemetry records in '{path}'")]
    TelemetryEmpty {
        /// Path to the telemetry directory.
        path: std::path::PathBuf,
    },

    /// A timestamp column violated the sorted-ascending precondition.
    #[error("timestamps in {table} are not sorted ascending")]
    UnsortedTimestamps {
        /// Name of the offending table.
        table: &'static str,
    },
}
