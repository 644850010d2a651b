// src/io/csv_source.rs

use csv::ReaderBuilder;
use log::{debug, info};
use std::path::{Path, PathBuf};

use crate::error::LoadError;
use crate::models::{Record, RecordSet};
use crate::pipeline::collaborators::{RecordSource, SchemaLookup};

/// Reads `{source_location}/{event_type}.csv` for each event type.
#[derive(Debug, Default, Clone)]
pub struct CsvRecordSource;

impl CsvRecordSource {
    pub fn new() -> Self {
        Self
    }

    pub fn event_file(source_location: &str, event_type: &str) -> PathBuf {
        Path::new(source_location).join(format!("{}.csv", event_type))
    }

    fn read_event_type(
        path: &Path,
        event_type: &str,
        primary_key: &str,
        keys: &[String],
    ) -> Result<Vec<Record>, LoadError> {
        let malformed = |e: csv::Error| LoadError::Malformed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        };
        let mut reader = ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_path(path)
            .map_err(malformed)?;
        let headers = reader.headers().map_err(malformed)?.clone();

        let column_index = |column: &str| {
            headers
                .iter()
                .position(|h| h == column)
                .ok_or_else(|| LoadError::MissingColumn {
                    path: path.to_path_buf(),
                    column: column.to_string(),
                })
        };
        let pk_idx = column_index(primary_key)?;
        let key_idx = keys
            .iter()
            .map(|k| Ok((k.clone(), column_index(k)?)))
            .collect::<Result<Vec<_>, LoadError>>()?;

        let mut records = Vec::new();
        for (line, row) in reader.records().enumerate() {
            let row = row.map_err(malformed)?;
            let pk = row.get(pk_idx).unwrap_or("").trim();
            if pk.is_empty() {
                return Err(LoadError::Malformed {
                    path: path.to_path_buf(),
                    reason: format!("row {} has an empty primary key '{}'", line + 1, primary_key),
                });
            }
            let mut record = Record::new(format!("{}:{}", event_type, pk), event_type);
            for (key, idx) in &key_idx {
                record.set(key.as_str(), row.get(*idx).unwrap_or(""));
            }
            records.push(record);
        }
        Ok(records)
    }
}

impl RecordSource for CsvRecordSource {
    fn load_records(
        &self,
        source_location: &str,
        event_types: &[String],
        keys: &[String],
        schema_lookup: &SchemaLookup,
        job_id: &str,
    ) -> Result<(RecordSet, Vec<String>), LoadError> {
        let mut records = Vec::new();
        let mut found = Vec::new();

        for event_type in event_types {
            let path = Self::event_file(source_location, event_type);
            if !path.is_file() {
                debug!("[{}] No source file for event type '{}' at {}", job_id, event_type, path.display());
                continue;
            }
            let primary_key = schema_lookup
                .get(event_type)
                .ok_or_else(|| LoadError::MissingPrimaryKey(event_type.clone()))?;
            let rows = Self::read_event_type(&path, event_type, primary_key, keys)?;
            info!("[{}] Loaded {} records for event type '{}'", job_id, rows.len(), event_type);
            records.extend(rows);
            found.push(event_type.clone());
        }

        if found.is_empty() {
            return Err(LoadError::NoEventTypes {
                location: source_location.to_string(),
                event_types: event_types.to_vec(),
            });
        }
        Ok((RecordSet::new(records)?, found))
    }
}
