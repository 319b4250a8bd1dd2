use indexmap::IndexMap;
use serde::Serialize;
use std::path::PathBuf;

/// One property's assessment, projected onto the export columns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Record {
    pub id: String,
    /// Values in export-column order; position 0 is the jurisdiction.
    pub values: Vec<String>,
}

impl Record {
    pub fn jurisdiction(&self) -> &str {
        self.values.first().map(String::as_str).unwrap_or("")
    }
}

/// A quarterly extract. Rank 0 is the newest file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceFile {
    pub path: PathBuf,
    pub name: String,
    pub rank: usize,
    /// Period parsed from the name, e.g. `2022Q1`, when it matched the pattern.
    pub period: Option<String>,
}

/// Per-file merge statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FileStats {
    pub file: String,
    pub rows: u64,
    pub inserted: u64,
    pub duplicates: u64,
    pub blank_identifiers: u64,
}

/// First-seen-wins mapping from identifier to record, in insertion order.
#[derive(Debug, Default)]
pub struct RecordStore {
    records: IndexMap<String, Record>,
    pub columns: Vec<String>,
    pub total_rows: u64,
    pub duplicates: u64,
    /// Rows with a blank identifier, whatever the policy did with them.
    pub blank_identifiers: u64,
    /// Blank-identifier rows dropped under the skip policy.
    pub skipped: u64,
    pub files: Vec<FileStats>,
}

impl RecordStore {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            ..Default::default()
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.records.contains_key(id)
    }

    /// Insert unless the identifier is already present. Returns whether it was inserted.
    pub fn insert_if_absent(&mut self, record: Record) -> bool {
        match self.records.entry(record.id.clone()) {
            indexmap::map::Entry::Occupied(_) => false,
            indexmap::map::Entry::Vacant(slot) => {
                slot.insert(record);
                true
            }
        }
    }

    pub fn get(&self, id: &str) -> Option<&Record> {
        self.records.get(id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Record> {
        self.records.values()
    }
}

/// Jurisdiction label to the records filed under it, both in first-seen order.
#[derive(Debug, Default)]
pub struct PartitionIndex<'a> {
    groups: IndexMap<String, Vec<&'a Record>>,
}

impl<'a> PartitionIndex<'a> {
    pub fn push(&mut self, label: &str, record: &'a Record) {
        match self.groups.get_mut(label) {
            Some(group) => group.push(record),
            None => {
                self.groups.insert(label.to_string(), vec![record]);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn get(&self, label: &str) -> Option<&[&'a Record]> {
        self.groups.get(label).map(Vec::as_slice)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[&'a Record])> {
        self.groups.iter().map(|(label, records)| (label.as_str(), records.as_slice()))
    }
}
