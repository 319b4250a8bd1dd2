//! Writes the consolidated output and one output per jurisdiction.

use crate::config::OutputConfig;
use crate::error::{ProcessorError, Result};
use crate::metrics::PartitionMetrics;
use crate::pipeline::atomic_writer::AtomicCsvWriter;
use crate::types::{PartitionIndex, RecordStore};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, instrument};

static ILLEGAL_FILENAME_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"[/\\:*?"<>|\x00-\x1f]"#).expect("static regex"));

/// Device names Windows refuses as a file stem, with or without an extension.
static RESERVED_DEVICE_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(con|prn|aux|nul|com[1-9]|lpt[1-9])(\..*)?$").expect("static regex"));

#[derive(Debug, Clone, Serialize)]
pub struct PartitionFile {
    pub label: String,
    pub path: PathBuf,
    pub rows: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct PartitionOutcome {
    pub consolidated: PathBuf,
    pub rows: usize,
    pub partitions: Vec<PartitionFile>,
}

/// Group label for a jurisdiction value; blank values go to the sentinel.
pub fn partition_label<'a>(jurisdiction: &'a str, sentinel: &'a str) -> &'a str {
    if jurisdiction.trim().is_empty() {
        sentinel
    } else {
        jurisdiction
    }
}

/// Make a label safe to embed in a file name.
pub fn sanitize_label(label: &str, sentinel: &str) -> String {
    let replaced = ILLEGAL_FILENAME_CHARS.replace_all(label, "_");
    let trimmed = replaced.trim_matches(|c: char| c == '.' || c.is_whitespace());
    if trimmed.is_empty() {
        return sentinel.to_string();
    }
    match RESERVED_DEVICE_NAME.captures(trimmed) {
        Some(caps) => format!("{}_{}", &caps[1], caps.get(2).map_or("", |m| m.as_str())),
        None => trimmed.to_string(),
    }
}

/// Write all outputs for a finalized store.
///
/// Outputs already written stay in place if a later one fails.
#[instrument(skip_all, fields(records = store.len()))]
pub fn write_partitions(store: &RecordStore, output: &OutputConfig) -> Result<PartitionOutcome> {
    let started = Instant::now();
    let partition_dir = output.partition_dir();
    create_dir(&output.dir)?;
    create_dir(&partition_dir)?;

    let sentinel = output.uncategorised_label.as_str();
    let consolidated_path = output.consolidated_path();
    info!("Writing consolidated output to {}", consolidated_path.display());

    let mut index = PartitionIndex::default();
    let mut writer = AtomicCsvWriter::new(&consolidated_path).inspect_err(|_| PartitionMetrics::record_write_error())?;
    writer.write_row(&store.columns)?;
    for record in store.iter() {
        writer.write_row(&record.values)?;
        index.push(partition_label(record.jurisdiction(), sentinel), record);
    }
    let consolidated = writer.finish().inspect_err(|_| PartitionMetrics::record_write_error())?;

    info!("Writing {} jurisdiction files to {}", index.len(), partition_dir.display());
    let mut used_names = HashSet::new();
    let mut partitions = Vec::with_capacity(index.len());
    for (label, records) in index.iter() {
        let file_name = unique_file_name(output, &sanitize_label(label, sentinel), &mut used_names);
        let path = partition_dir.join(file_name);

        let mut writer = AtomicCsvWriter::new(&path).inspect_err(|_| PartitionMetrics::record_write_error())?;
        writer.write_row(&store.columns)?;
        for record in records {
            writer.write_row(&record.values)?;
        }
        let path = writer.finish().inspect_err(|_| PartitionMetrics::record_write_error())?;
        debug!("{}: {} rows -> {}", label, records.len(), path.display());

        partitions.push(PartitionFile {
            label: label.to_string(),
            path,
            rows: records.len(),
        });
    }

    PartitionMetrics::record_written(store.len(), partitions.len(), started.elapsed().as_secs_f64());
    Ok(PartitionOutcome {
        consolidated,
        rows: store.len(),
        partitions,
    })
}

fn create_dir(dir: &Path) -> Result<()> {
    fs::create_dir_all(dir).map_err(|e| ProcessorError::write(dir, e))
}

/// Resolve the file name for a sanitized label, suffixing ` (2)`, ` (3)`, ...
/// when another label already produced the same name. Names compare
/// case-insensitively.
fn unique_file_name(output: &OutputConfig, safe_label: &str, used: &mut HashSet<String>) -> String {
    let mut candidate = output.partition_filename(safe_label);
    let mut n = 2;
    while !used.insert(candidate.to_lowercase()) {
        candidate = output.partition_filename(&format!("{safe_label} ({n})"));
        n += 1;
    }
    candidate
}
