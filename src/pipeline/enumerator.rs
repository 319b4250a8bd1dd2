//! Lists the quarterly extracts and orders them newest first.
//!
//! Recency comes from a plain descending sort of the file names. That is only
//! correct when names embed a zero-padded period such as `2022Q1`, so each
//! name is checked against the configured period pattern.

use crate::config::{FilenameCheck, InputConfig};
use crate::error::{ProcessorError, Result};
use crate::metrics::EnumeratorMetrics;
use crate::types::SourceFile;
use regex::Regex;
use std::fs;
use std::path::Path;
use tracing::{debug, info, instrument, warn};

#[instrument(skip_all, fields(dir = %dir.display()))]
pub fn enumerate_sources(dir: &Path, settings: &InputConfig) -> Result<Vec<SourceFile>> {
    let period = settings.period_regex()?;
    let fs_err = |source| ProcessorError::FileSystem {
        path: dir.to_path_buf(),
        source,
    };

    let mut names = Vec::new();
    for entry in fs::read_dir(dir).map_err(fs_err)? {
        let entry = entry.map_err(fs_err)?;
        let path = entry.path();
        if !path.is_file() || !has_extension(&path, &settings.extension) {
            debug!("Ignoring {}", path.display());
            continue;
        }
        names.push(entry.file_name().to_string_lossy().into_owned());
    }

    names.sort_unstable_by(|a, b| b.cmp(a));

    let mut unmatched = 0;
    let mut sources = Vec::with_capacity(names.len());
    for (rank, name) in names.into_iter().enumerate() {
        let found = extract_period(&period, &name);
        if found.is_none() {
            match settings.filename_check {
                FilenameCheck::Off => {}
                FilenameCheck::Warn => {
                    unmatched += 1;
                    warn!("'{}' carries no period matching '{}'; ordering by name only", name, settings.period_pattern);
                }
                FilenameCheck::Strict => {
                    return Err(ProcessorError::InvalidFilename {
                        file: name,
                        pattern: settings.period_pattern.clone(),
                    });
                }
            }
        }
        sources.push(SourceFile {
            path: dir.join(&name),
            name,
            rank,
            period: found,
        });
    }

    EnumeratorMetrics::record_enumerated(sources.len(), unmatched);
    info!("Found {} input files", sources.len());
    Ok(sources)
}

fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(extension.trim_start_matches('.')))
}

/// The `period` capture group if the pattern has one, else the whole match.
fn extract_period(pattern: &Regex, name: &str) -> Option<String> {
    let caps = pattern.captures(name)?;
    caps.name("period")
        .or_else(|| caps.get(0))
        .map(|m| m.as_str().to_string())
}
