//! Merges the ordered extracts into a single first-seen-wins record store.
//!
//! Files arrive newest first, so the first row seen for an identifier is the
//! most recent assessment and every later row for it is counted as a
//! duplicate and dropped.

use crate::config::{BlankIdentifierPolicy, ColumnConfig};
use crate::constants::strip_bom;
use crate::error::{ProcessorError, Result};
use crate::metrics::MergeMetrics;
use crate::types::{FileStats, Record, RecordStore, SourceFile};
use csv::{ByteRecord, ReaderBuilder};
use std::collections::HashMap;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Read};
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info, instrument, trace, warn};

const DELIMITER: u8 = b',';
const QUOTE: u8 = b'"';

/// Header positions of the identifier and of each export column.
#[derive(Debug)]
struct Projection<'c> {
    id: (usize, &'c str),
    export: Vec<(usize, &'c str)>,
}

/// Merge every source, in the given order, into a fresh store.
#[instrument(skip_all, fields(files = sources.len()))]
pub fn merge_sources(sources: &[SourceFile], columns: &ColumnConfig) -> Result<RecordStore> {
    let mut store = RecordStore::new(columns.export.clone());

    for source in sources {
        let started = Instant::now();
        let stats = merge_file(&mut store, source, columns).inspect_err(|e| MergeMetrics::record_error(e.kind()))?;
        MergeMetrics::record_file(&stats, started.elapsed().as_secs_f64());
        store.files.push(stats);
    }

    MergeMetrics::record_store_size(store.len());
    info!(
        "Merged {} rows into {} unique records ({} duplicates)",
        store.total_rows,
        store.len(),
        store.duplicates
    );
    Ok(store)
}

/// Merge one source into `store`, returning that file's counts.
///
/// The store is only meaningful if this succeeds; callers abort the run on error.
#[instrument(skip_all, fields(file = %source.name))]
pub fn merge_file(store: &mut RecordStore, source: &SourceFile, columns: &ColumnConfig) -> Result<FileStats> {
    let path = source.path.as_path();
    let file = File::open(path).map_err(|e| ProcessorError::FileSystem {
        path: path.to_path_buf(),
        source: e,
    })?;

    let mut input = BufReader::new(file);
    skip_byte_order_mark(&mut input).map_err(|e| ProcessorError::FileSystem {
        path: path.to_path_buf(),
        source: e,
    })?;

    let mut reader = ReaderBuilder::new()
        .delimiter(DELIMITER)
        .quote(QUOTE)
        .has_headers(true)
        .flexible(true)
        .from_reader(SkipInitialSpace::new(input));

    let parse_err = |source| ProcessorError::Parse {
        file: path.to_path_buf(),
        source,
    };

    let headers = reader.byte_headers().map_err(parse_err)?.clone();
    let projection = resolve_projection(&headers, path, columns)?;
    debug!("Resolved {} export columns", projection.export.len());

    let mut stats = FileStats {
        file: source.name.clone(),
        ..FileStats::default()
    };
    let mut row = ByteRecord::new();

    while reader.read_byte_record(&mut row).map_err(parse_err)? {
        stats.rows += 1;
        let line = row.position().map(|p| p.line()).unwrap_or(stats.rows + 1);
        let id = field(&row, projection.id, path, line)?;

        if id.trim().is_empty() {
            stats.blank_identifiers += 1;
            match columns.blank_identifiers {
                BlankIdentifierPolicy::Merge => {}
                BlankIdentifierPolicy::Skip => {
                    store.skipped += 1;
                    continue;
                }
                BlankIdentifierPolicy::Reject => {
                    return Err(ProcessorError::BlankIdentifier {
                        file: path.to_path_buf(),
                        line,
                    });
                }
            }
        }

        if store.contains(&id) {
            trace!("Duplicate identifier '{}' at line {}", id, line);
            stats.duplicates += 1;
            continue;
        }

        let values = projection
            .export
            .iter()
            .map(|&column| field(&row, column, path, line))
            .collect::<Result<Vec<_>>>()?;
        store.insert_if_absent(Record { id, values });
        stats.inserted += 1;
    }

    if stats.blank_identifiers > 0 && columns.blank_identifiers == BlankIdentifierPolicy::Merge {
        warn!(
            "{} rows in {} have a blank identifier and share a single record",
            stats.blank_identifiers, source.name
        );
    }

    store.total_rows += stats.rows;
    store.duplicates += stats.duplicates;
    store.blank_identifiers += stats.blank_identifiers;

    info!(
        "{}: {} rows, {} new, {} duplicates",
        source.name, stats.rows, stats.inserted, stats.duplicates
    );
    Ok(stats)
}

/// Drops spaces and tabs that directly follow an unquoted delimiter.
///
/// Extracts are written as `"a", "b"`; without this the space before the
/// opening quote makes the field unquoted and keeps the quotes as data.
/// Whitespace inside quotes is untouched.
struct SkipInitialSpace<R> {
    inner: R,
    in_quotes: bool,
    after_delimiter: bool,
}

impl<R> SkipInitialSpace<R> {
    fn new(inner: R) -> Self {
        Self {
            inner,
            in_quotes: false,
            after_delimiter: false,
        }
    }
}

impl<R: Read> Read for SkipInitialSpace<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        loop {
            let n = self.inner.read(buf)?;
            if n == 0 {
                return Ok(0);
            }

            let mut kept = 0;
            for i in 0..n {
                let byte = buf[i];
                if self.after_delimiter && (byte == b' ' || byte == b'\t') {
                    continue;
                }
                self.after_delimiter = false;
                if byte == QUOTE {
                    self.in_quotes = !self.in_quotes;
                } else if byte == DELIMITER && !self.in_quotes {
                    self.after_delimiter = true;
                }
                buf[kept] = byte;
                kept += 1;
            }

            // A chunk of nothing but skipped padding must not read as end of input.
            if kept > 0 {
                return Ok(kept);
            }
        }
    }
}

/// Consume a leading UTF-8 BOM so it cannot hide the opening quote of the first header.
fn skip_byte_order_mark<R: BufRead>(input: &mut R) -> std::io::Result<()> {
    const BOM: &[u8] = &[0xEF, 0xBB, 0xBF];
    if input.fill_buf()?.starts_with(BOM) {
        input.consume(BOM.len());
    }
    Ok(())
}

fn resolve_projection<'c>(headers: &ByteRecord, file: &Path, columns: &'c ColumnConfig) -> Result<Projection<'c>> {
    if headers.is_empty() {
        return Err(ProcessorError::MalformedHeader {
            file: file.to_path_buf(),
            reason: "no header row".to_string(),
        });
    }

    let mut positions: HashMap<String, Vec<usize>> = HashMap::new();
    for (i, raw) in headers.iter().enumerate() {
        let name = String::from_utf8_lossy(raw);
        positions.entry(strip_bom(name.trim()).to_string()).or_default().push(i);
    }

    let locate = |column: &'c str| -> Result<(usize, &'c str)> {
        match positions.get(strip_bom(column).trim()).map(Vec::as_slice) {
            Some([index]) => Ok((*index, column)),
            Some(_) => Err(ProcessorError::MalformedHeader {
                file: file.to_path_buf(),
                reason: format!("column '{}' appears more than once", column),
            }),
            None => Err(ProcessorError::MissingColumn {
                column: column.to_string(),
                file: file.to_path_buf(),
                line: None,
            }),
        }
    };

    Ok(Projection {
        id: locate(columns.id_column.as_str())?,
        export: columns
            .export
            .iter()
            .map(|c| locate(c.as_str()))
            .collect::<Result<Vec<_>>>()?,
    })
}

fn field(row: &ByteRecord, (index, column): (usize, &str), file: &Path, line: u64) -> Result<String> {
    row.get(index)
        .map(|raw| String::from_utf8_lossy(raw).into_owned())
        .ok_or_else(|| ProcessorError::MissingColumn {
            column: column.to_string(),
            file: file.to_path_buf(),
            line: Some(line),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn columns() -> ColumnConfig {
        ColumnConfig {
            id_column: "Property_UPRN".into(),
            export: vec!["Local Authority".into(), "Property_UPRN".into(), "Rating".into()],
            blank_identifiers: BlankIdentifierPolicy::Merge,
        }
    }

    fn source(dir: &TempDir, name: &str, rank: usize, body: &str) -> SourceFile {
        let path = dir.path().join(name);
        fs::write(&path, body).unwrap();
        SourceFile {
            path,
            name: name.to_string(),
            rank,
            period: None,
        }
    }

    const HEADER: &str = "\"Property_UPRN\",\"Local Authority\",\"Rating\",\"Extra\"\n";

    #[test]
    fn newest_file_wins_and_duplicates_are_counted() {
        let dir = TempDir::new().unwrap();
        let newer = source(
            &dir,
            "2022Q1.csv",
            0,
            &format!("{HEADER}\"100\",\"Glasgow\",\"B\",\"x\"\n\"200\",\"Fife\",\"C\",\"x\"\n"),
        );
        let older = source(
            &dir,
            "2021Q4.csv",
            1,
            &format!("{HEADER}\"100\",\"Glasgow\",\"D\",\"x\"\n\"300\",\"Angus\",\"E\",\"x\"\n"),
        );

        let store = merge_sources(&[newer, older], &columns()).unwrap();
        assert_eq!(store.len(), 3);
        assert_eq!(store.duplicates, 1);
        assert_eq!(store.total_rows, 4);
        assert_eq!(store.get("100").unwrap().values, vec!["Glasgow", "100", "B"]);
        let ids: Vec<_> = store.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["100", "200", "300"]);
        assert_eq!(store.files[1].duplicates, 1);
        assert_eq!(store.files[1].inserted, 1);
    }

    #[test]
    fn bom_prefixed_header_is_matched() {
        let dir = TempDir::new().unwrap();
        let src = source(
            &dir,
            "2022Q1.csv",
            0,
            "\u{feff}\"Property_UPRN\",\"Local Authority\",\"Rating\"\n\"1\",\"Fife\",\"A\"\n",
        );
        let mut cols = columns();
        cols.id_column = "\u{feff}Property_UPRN".into();
        let store = merge_sources(&[src], &cols).unwrap();
        assert_eq!(store.get("1").unwrap().values, vec!["Fife", "1", "A"]);
    }

    #[test]
    fn quoted_commas_stay_in_one_field() {
        let dir = TempDir::new().unwrap();
        let src = source(
            &dir,
            "2022Q1.csv",
            0,
            "\"Property_UPRN\",\"Local Authority\",\"Rating\"\n\"1\",\"Perth, and Kinross\",\"A\"\n",
        );
        let store = merge_sources(&[src], &columns()).unwrap();
        assert_eq!(store.get("1").unwrap().jurisdiction(), "Perth, and Kinross");
    }

    #[test]
    fn spaces_after_delimiters_are_skipped() {
        let dir = TempDir::new().unwrap();
        let src = source(
            &dir,
            "2022Q1.csv",
            0,
            "\"Property_UPRN\", \"Local Authority\",\t\"Rating\"\n\"100\", \"Glasgow\", \"B\"\n\"200\",  \"Perth,  and Kinross\", C\n",
        );
        let store = merge_sources(&[src], &columns()).unwrap();
        assert_eq!(store.get("100").unwrap().values, vec!["Glasgow", "100", "B"]);
        assert_eq!(store.get("200").unwrap().values, vec!["Perth,  and Kinross", "200", "C"]);
    }

    #[test]
    fn skipping_survives_chunk_boundaries() {
        let mut reader = SkipInitialSpace::new((&b"\"a\", "[..]).chain(&b"  ,\t c"[..]));
        let mut out = Vec::new();
        let mut buf = [0u8; 2];
        loop {
            let n = reader.read(&mut buf).unwrap();
            if n == 0 {
                break;
            }
            out.extend_from_slice(&buf[..n]);
        }
        assert_eq!(out, b"\"a\",,c");
    }

    #[test]
    fn missing_export_column_names_column_and_file() {
        let dir = TempDir::new().unwrap();
        let src = source(&dir, "2022Q1.csv", 0, "\"Property_UPRN\",\"Local Authority\"\n\"1\",\"Fife\"\n");
        let err = merge_sources(&[src.clone()], &columns()).unwrap_err();
        match err {
            ProcessorError::MissingColumn { column, file, line } => {
                assert_eq!(column, "Rating");
                assert_eq!(file, src.path);
                assert_eq!(line, None);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn short_row_is_a_schema_error_with_line() {
        let dir = TempDir::new().unwrap();
        let src = source(
            &dir,
            "2022Q1.csv",
            0,
            "\"Property_UPRN\",\"Local Authority\",\"Rating\"\n\"1\",\"Fife\",\"A\"\n\"2\",\"Fife\"\n",
        );
        let err = merge_sources(&[src], &columns()).unwrap_err();
        assert!(matches!(err, ProcessorError::MissingColumn { ref column, line: Some(3), .. } if column == "Rating"));
    }

    #[test]
    fn empty_file_has_malformed_header() {
        let dir = TempDir::new().unwrap();
        let src = source(&dir, "2022Q1.csv", 0, "");
        let err = merge_sources(&[src], &columns()).unwrap_err();
        assert!(matches!(err, ProcessorError::MalformedHeader { .. }));
    }

    #[test]
    fn ambiguous_required_column_is_malformed() {
        let dir = TempDir::new().unwrap();
        let src = source(
            &dir,
            "2022Q1.csv",
            0,
            "\"Property_UPRN\",\"Local Authority\",\"Rating\",\"Rating\"\n\"1\",\"Fife\",\"A\",\"B\"\n",
        );
        let err = merge_sources(&[src], &columns()).unwrap_err();
        assert!(matches!(err, ProcessorError::MalformedHeader { .. }));
    }

    #[test]
    fn unreadable_file_is_a_filesystem_error() {
        let dir = TempDir::new().unwrap();
        let src = SourceFile {
            path: dir.path().join("gone.csv"),
            name: "gone.csv".into(),
            rank: 0,
            period: None,
        };
        let err = merge_sources(&[src], &columns()).unwrap_err();
        assert!(matches!(err, ProcessorError::FileSystem { .. }));
    }

    #[test]
    fn blank_identifiers_merge_by_default() {
        let dir = TempDir::new().unwrap();
        let src = source(
            &dir,
            "2022Q1.csv",
            0,
            "\"Property_UPRN\",\"Local Authority\",\"Rating\"\n\"\",\"Fife\",\"A\"\n\" \",\"Angus\",\"B\"\n\"\",\"Moray\",\"C\"\n",
        );
        let store = merge_sources(&[src], &columns()).unwrap();
        assert_eq!(store.len(), 2);
        assert_eq!(store.duplicates, 1);
        assert_eq!(store.blank_identifiers, 3);
        assert_eq!(store.get("").unwrap().jurisdiction(), "Fife");
    }

    #[test]
    fn blank_identifiers_can_be_skipped() {
        let dir = TempDir::new().unwrap();
        let src = source(
            &dir,
            "2022Q1.csv",
            0,
            "\"Property_UPRN\",\"Local Authority\",\"Rating\"\n\"\",\"Fife\",\"A\"\n\"7\",\"Angus\",\"B\"\n",
        );
        let mut cols = columns();
        cols.blank_identifiers = BlankIdentifierPolicy::Skip;
        let store = merge_sources(&[src], &cols).unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(store.skipped, 1);
        assert_eq!(store.len() as u64 + store.duplicates + store.skipped, store.total_rows);
    }

    #[test]
    fn blank_identifiers_can_be_rejected() {
        let dir = TempDir::new().unwrap();
        let src = source(
            &dir,
            "2022Q1.csv",
            0,
            "\"Property_UPRN\",\"Local Authority\",\"Rating\"\n\"7\",\"Angus\",\"B\"\n\"\",\"Fife\",\"A\"\n",
        );
        let mut cols = columns();
        cols.blank_identifiers = BlankIdentifierPolicy::Reject;
        let err = merge_sources(&[src], &cols).unwrap_err();
        assert!(matches!(err, ProcessorError::BlankIdentifier { line: 3, .. }));
    }
}
