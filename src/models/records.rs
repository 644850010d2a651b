// src/models/records.rs

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};

use crate::error::LoadError;

/// One row of source data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub record_id: String,
    pub event_type: String,
    pub attributes: BTreeMap<String, String>,
}

impl Record {
    pub fn new(record_id: impl Into<String>, event_type: impl Into<String>) -> Self {
        Self {
            record_id: record_id.into(),
            event_type: event_type.into(),
            attributes: BTreeMap::new(),
        }
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    /// Attribute value, or `None` when absent or blank.
    pub fn get(&self, attribute: &str) -> Option<&str> {
        self.attributes
            .get(attribute)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    pub fn set(&mut self, attribute: impl Into<String>, value: impl Into<String>) {
        self.attributes.insert(attribute.into(), value.into());
    }
}

/// Ordered set of records with unique ids. Record positions are the indices
/// used by candidate pairs, distances and cluster labels.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordSet {
    records: Vec<Record>,
}

impl RecordSet {
    pub fn new(records: Vec<Record>) -> Result<Self, LoadError> {
        let mut seen = HashSet::with_capacity(records.len());
        for record in &records {
            if !seen.insert(record.record_id.as_str()) {
                return Err(LoadError::DuplicateRecordId(record.record_id.clone()));
            }
        }
        Ok(Self { records })
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Record> {
        self.records.get(index)
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    /// Attribute edits only; ids are fixed once the set is built.
    pub(crate) fn records_mut(&mut self) -> &mut [Record] {
        &mut self.records
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Record> {
        self.records.iter()
    }

    pub fn into_records(self) -> Vec<Record> {
        self.records
    }

    /// Attribute names present on any record, sorted.
    pub fn attribute_names(&self) -> Vec<String> {
        let names: BTreeSet<&String> = self
            .records
            .iter()
            .flat_map(|r| r.attributes.keys())
            .collect();
        names.into_iter().cloned().collect()
    }

    /// All column names, including the `record_id` and `event_type` columns.
    pub fn columns(&self) -> Vec<String> {
        let mut columns = vec!["record_id".to_string(), "event_type".to_string()];
        columns.extend(self.attribute_names());
        columns
    }

    /// `[rows, columns]`, in the same shape the job metadata reports.
    pub fn shape(&self) -> [usize; 2] {
        [self.len(), self.columns().len()]
    }

    pub fn event_types(&self) -> Vec<String> {
        let types: BTreeSet<&String> = self.records.iter().map(|r| &r.event_type).collect();
        types.into_iter().cloned().collect()
    }
}

impl<'a> IntoIterator for &'a RecordSet {
    type Item = &'a Record;
    type IntoIter = std::slice::Iter<'a, Record>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

/// A source record annotated with the entity it was assigned to.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchedRecord {
    pub record: Record,
    pub matched_id: String,
}
