use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProcessorError {
    #[error("Cannot read {}: {source}", path.display())]
    FileSystem {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Input file '{file}' does not match the period pattern '{pattern}'; recency order cannot be trusted")]
    InvalidFilename { file: String, pattern: String },

    #[error("Malformed header in {}: {reason}", file.display())]
    MalformedHeader { file: PathBuf, reason: String },

    #[error("Missing column '{column}' in {}{}", file.display(), line.map(|l| format!(" (line {l})")).unwrap_or_default())]
    MissingColumn {
        column: String,
        file: PathBuf,
        line: Option<u64>,
    },

    #[error("Blank identifier in {} at line {line}", file.display())]
    BlankIdentifier { file: PathBuf, line: u64 },

    #[error("CSV parse error in {}: {source}", file.display())]
    Parse {
        file: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("Failed to write {}: {message}", destination.display())]
    Write { destination: PathBuf, message: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),
}

impl ProcessorError {
    /// Coarse error class used in logs and metrics labels.
    pub fn kind(&self) -> &'static str {
        match self {
            ProcessorError::FileSystem { .. } | ProcessorError::InvalidFilename { .. } => "filesystem",
            ProcessorError::MalformedHeader { .. }
            | ProcessorError::MissingColumn { .. }
            | ProcessorError::BlankIdentifier { .. }
            | ProcessorError::Parse { .. } => "schema",
            ProcessorError::Write { .. } => "io",
            ProcessorError::Config(_) | ProcessorError::Toml(_) => "config",
        }
    }

    pub(crate) fn write(destination: impl Into<PathBuf>, err: impl std::fmt::Display) -> Self {
        ProcessorError::Write {
            destination: destination.into(),
            message: err.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ProcessorError>;
