use crate::constants::{self, strip_bom};
use crate::error::{ProcessorError, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// How the enumerator treats file names that do not carry a recognizable period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum FilenameCheck {
    Off,
    #[default]
    Warn,
    Strict,
}

/// What the merge does with rows whose identifier is empty or whitespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum BlankIdentifierPolicy {
    /// Keep them under the blank key; all later blank rows count as duplicates.
    #[default]
    Merge,
    Skip,
    Reject,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InputConfig {
    pub dir: PathBuf,
    pub extension: String,
    pub filename_check: FilenameCheck,
    pub period_pattern: String,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from(constants::DEFAULT_INPUT_DIR),
            extension: constants::DEFAULT_EXTENSION.to_string(),
            filename_check: FilenameCheck::default(),
            period_pattern: constants::DEFAULT_PERIOD_PATTERN.to_string(),
        }
    }
}

impl InputConfig {
    pub fn period_regex(&self) -> Result<Regex> {
        Regex::new(&self.period_pattern).map_err(|e| {
            ProcessorError::Config(format!("Invalid period pattern '{}': {}", self.period_pattern, e))
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnConfig {
    pub id_column: String,
    /// Projected columns, jurisdiction first.
    pub export: Vec<String>,
    pub blank_identifiers: BlankIdentifierPolicy,
}

impl Default for ColumnConfig {
    fn default() -> Self {
        Self {
            id_column: constants::DEFAULT_ID_COLUMN.to_string(),
            export: constants::DEFAULT_EXPORT_COLUMNS.iter().map(|c| c.to_string()).collect(),
            blank_identifiers: BlankIdentifierPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub dir: PathBuf,
    pub partition_subdir: PathBuf,
    pub consolidated_filename: String,
    pub partition_template: String,
    pub uncategorised_label: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from(constants::DEFAULT_OUTPUT_DIR),
            partition_subdir: PathBuf::from(constants::DEFAULT_PARTITION_SUBDIR),
            consolidated_filename: constants::DEFAULT_CONSOLIDATED_FILENAME.to_string(),
            partition_template: constants::DEFAULT_PARTITION_TEMPLATE.to_string(),
            uncategorised_label: constants::UNCATEGORISED.to_string(),
        }
    }
}

impl OutputConfig {
    pub fn consolidated_path(&self) -> PathBuf {
        self.dir.join(&self.consolidated_filename)
    }

    pub fn partition_dir(&self) -> PathBuf {
        self.dir.join(&self.partition_subdir)
    }

    pub fn partition_filename(&self, label: &str) -> String {
        self.partition_template.replace(constants::LABEL_PLACEHOLDER, label)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub input: InputConfig,
    pub output: OutputConfig,
    pub columns: ColumnConfig,
    pub log_dir: Option<PathBuf>,
    /// Prometheus text exposition written at the end of a run.
    pub metrics_file: Option<PathBuf>,
}

impl Config {
    /// Resolve and load configuration.
    ///
    /// An explicit path must exist. Otherwise `$EPC_CONFIG` is tried, then
    /// `epc_processor.toml` in the working directory; if neither is present the
    /// built-in defaults are used.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let path = match explicit {
            Some(p) => Some(p.to_path_buf()),
            None => match std::env::var(constants::CONFIG_ENV_VAR) {
                Ok(v) if !v.trim().is_empty() => Some(PathBuf::from(v)),
                _ => {
                    let default = PathBuf::from(constants::DEFAULT_CONFIG_FILE);
                    default.is_file().then_some(default)
                }
            },
        };

        let config = match path {
            Some(path) => {
                info!("Loading configuration from {}", path.display());
                let content = fs::read_to_string(&path).map_err(|e| {
                    ProcessorError::Config(format!("Failed to read config file '{}': {}", path.display(), e))
                })?;
                Self::from_toml_str(&content)?
            }
            None => {
                debug!("No config file found, using defaults");
                Self::default()
            }
        };

        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let columns = &self.columns;
        if columns.export.is_empty() {
            return Err(ProcessorError::Config("Export column list must not be empty".into()));
        }
        if strip_bom(&columns.id_column).trim().is_empty() {
            return Err(ProcessorError::Config("Identifier column must not be empty".into()));
        }

        let mut seen = HashSet::new();
        for column in &columns.export {
            if !seen.insert(strip_bom(column)) {
                return Err(ProcessorError::Config(format!("Duplicate export column '{}'", column)));
            }
        }

        if self.output.uncategorised_label.trim().is_empty() {
            return Err(ProcessorError::Config("Uncategorised label must not be empty".into()));
        }
        if !self.output.partition_template.contains(constants::LABEL_PLACEHOLDER) {
            return Err(ProcessorError::Config(format!(
                "Partition template '{}' must contain {}",
                self.output.partition_template,
                constants::LABEL_PLACEHOLDER
            )));
        }
        if self.input.extension.trim().is_empty() {
            return Err(ProcessorError::Config("Input extension must not be empty".into()));
        }

        self.input.period_regex()?;
        Ok(())
    }
}
