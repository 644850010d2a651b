// src/io/csv_writer.rs

use csv::Writer;
use log::{info, warn};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::WriteError;
use crate::models::MatchedRecord;
use crate::pipeline::collaborators::{MatchWriter, OutputLocations, SchemaLookup};

pub const MATCHED_ID_COLUMN: &str = "matched_id";

/// Writes `{source_location}/matches/{job_id}/{event_type}.csv` with the
/// primary key, the key columns and the matched id.
///
/// Every file is written into `matches/{job_id}.partial/`, which is renamed
/// to the job directory in one step once all event types are written. On
/// any failure the staging directory is removed and no job directory exists.
#[derive(Debug, Default, Clone)]
pub struct CsvMatchWriter;

impl CsvMatchWriter {
    pub fn new() -> Self {
        Self
    }

    pub fn output_dir(source_location: &str, job_id: &str) -> PathBuf {
        Path::new(source_location).join("matches").join(job_id)
    }

    pub fn staging_dir(source_location: &str, job_id: &str) -> PathBuf {
        Path::new(source_location)
            .join("matches")
            .join(format!("{}.partial", job_id))
    }

    fn stage_event_type(
        path: &Path,
        event_type: &str,
        primary_key: &str,
        keys: &[String],
        rows: &[&MatchedRecord],
    ) -> Result<(), WriteError> {
        let encode = |e: csv::Error| WriteError::Encode {
            path: path.to_path_buf(),
            reason: e.to_string(),
        };
        let mut writer = Writer::from_path(path).map_err(encode)?;

        let mut header = Vec::with_capacity(keys.len() + 2);
        header.push(primary_key);
        header.extend(keys.iter().map(|k| k.as_str()));
        header.push(MATCHED_ID_COLUMN);
        writer.write_record(&header).map_err(encode)?;

        let id_prefix = format!("{}:", event_type);
        for matched in rows {
            let record = &matched.record;
            let pk = record
                .record_id
                .strip_prefix(&id_prefix)
                .unwrap_or(&record.record_id);
            let mut row = Vec::with_capacity(header.len());
            row.push(pk);
            row.extend(
                keys.iter()
                    .map(|k| record.attributes.get(k).map(|v| v.as_str()).unwrap_or("")),
            );
            row.push(matched.matched_id.as_str());
            writer.write_record(&row).map_err(encode)?;
        }
        writer.flush().map_err(|source| WriteError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    fn discard(staging: &Path) {
        if let Err(e) = fs::remove_dir_all(staging) {
            warn!("Could not remove staging directory {}: {}", staging.display(), e);
        }
    }

    fn stage_all(
        staging: &Path,
        by_event_type: &BTreeMap<&str, Vec<&MatchedRecord>>,
        keys: &[String],
        schema_lookup: &SchemaLookup,
    ) -> Result<(), WriteError> {
        for (event_type, primary_key) in schema_lookup {
            let rows = by_event_type
                .get(event_type.as_str())
                .map(|v| v.as_slice())
                .unwrap_or(&[]);
            let path = staging.join(format!("{}.csv", event_type));
            Self::stage_event_type(&path, event_type, primary_key, keys, rows)?;
        }
        Ok(())
    }
}

impl MatchWriter for CsvMatchWriter {
    fn write_matched_records(
        &self,
        matches: &[MatchedRecord],
        source_location: &str,
        keys: &[String],
        schema_lookup: &SchemaLookup,
        job_id: &str,
    ) -> Result<OutputLocations, WriteError> {
        let mut by_event_type: BTreeMap<&str, Vec<&MatchedRecord>> = BTreeMap::new();
        for matched in matches {
            by_event_type
                .entry(matched.record.event_type.as_str())
                .or_default()
                .push(matched);
        }
        if let Some(event_type) = by_event_type
            .keys()
            .find(|et| !schema_lookup.contains_key(**et))
        {
            return Err(WriteError::MissingPrimaryKey(event_type.to_string()));
        }

        let dir = Self::output_dir(source_location, job_id);
        let staging = Self::staging_dir(source_location, job_id);
        fs::create_dir_all(&staging).map_err(|source| WriteError::Io {
            path: staging.clone(),
            source,
        })?;

        if let Err(e) = Self::stage_all(&staging, &by_event_type, keys, schema_lookup) {
            Self::discard(&staging);
            return Err(e);
        }
        if let Err(source) = fs::rename(&staging, &dir) {
            Self::discard(&staging);
            return Err(WriteError::Io { path: dir, source });
        }

        let locations: OutputLocations = schema_lookup
            .keys()
            .map(|et| (et.clone(), dir.join(format!("{}.csv", et)).display().to_string()))
            .collect();
        info!(
            "[{}] Wrote matched data for {} event types to {}",
            job_id,
            locations.len(),
            dir.display()
        );
        Ok(locations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Record;

    fn matched(id: &str, event_type: &str, last: &str, matched_id: &str) -> MatchedRecord {
        MatchedRecord {
            record: Record::new(format!("{}:{}", event_type, id), event_type)
                .with_attribute("last_name", last),
            matched_id: matched_id.to_string(),
        }
    }

    #[test]
    fn test_writes_one_file_per_event_type() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().to_str().unwrap();
        let lookup = SchemaLookup::from([
            ("jail".to_string(), "booking_id".to_string()),
            ("hmis".to_string(), "client_id".to_string()),
        ]);
        let matches = vec![
            matched("7", "jail", "Smith", "m1"),
            matched("c:9", "hmis", "Smith", "m1"),
        ];
        let locations = CsvMatchWriter::new()
            .write_matched_records(&matches, base, &["last_name".to_string()], &lookup, "job-1")
            .unwrap();

        assert_eq!(locations.len(), 2);
        let hmis = fs::read_to_string(&locations["hmis"]).unwrap();
        assert_eq!(hmis, "client_id,last_name,matched_id\nc:9,Smith,m1\n");
        assert!(!CsvMatchWriter::staging_dir(base, "job-1").exists());
    }

    #[test]
    fn test_unknown_event_type_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().to_str().unwrap();
        let lookup = SchemaLookup::from([("jail".to_string(), "booking_id".to_string())]);
        let matches = vec![
            matched("7", "jail", "Smith", "m1"),
            matched("9", "hmis", "Smith", "m1"),
        ];
        let err = CsvMatchWriter::new()
            .write_matched_records(&matches, base, &["last_name".to_string()], &lookup, "job-2")
            .unwrap_err();
        assert!(matches!(err, WriteError::MissingPrimaryKey(et) if et == "hmis"));

        assert!(!CsvMatchWriter::output_dir(base, "job-2").exists());
        assert!(!CsvMatchWriter::staging_dir(base, "job-2").exists());
    }

    #[test]
    fn test_failed_commit_leaves_no_outputs() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().to_str().unwrap();
        let out = CsvMatchWriter::output_dir(base, "job-3");
        // An occupied job directory makes the final rename fail.
        fs::create_dir_all(out.join("jail.csv")).unwrap();
        fs::write(out.join("jail.csv").join("keep"), "x").unwrap();
        let lookup = SchemaLookup::from([
            ("hmis".to_string(), "client_id".to_string()),
            ("jail".to_string(), "booking_id".to_string()),
        ]);
        let matches = vec![
            matched("c:9", "hmis", "Smith", "m1"),
            matched("7", "jail", "Smith", "m1"),
        ];

        let result = CsvMatchWriter::new().write_matched_records(
            &matches,
            base,
            &["last_name".to_string()],
            &lookup,
            "job-3",
        );

        assert!(matches!(result, Err(WriteError::Io { .. })));
        assert!(!out.join("hmis.csv").exists());
        assert!(!CsvMatchWriter::staging_dir(base, "job-3").exists());
    }
}
