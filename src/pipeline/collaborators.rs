// src/pipeline/collaborators.rs
//! Narrow interfaces to everything outside the matching core: where records
//! come from, where results and metadata go, and who hears about a finished
//! job.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{LoadError, WriteError};
use crate::models::{MatchJobMetadata, MatchedRecord, RecordSet};

/// Event type -> primary key column of that event type's source data.
pub type SchemaLookup = BTreeMap<String, String>;

/// Event type -> location of the written matched data.
pub type OutputLocations = BTreeMap<String, String>;

pub trait RecordSource: Send + Sync {
    /// Loads the key columns of every requested event type found at
    /// `source_location`. Returns the records and the event types found.
    fn load_records(
        &self,
        source_location: &str,
        event_types: &[String],
        keys: &[String],
        schema_lookup: &SchemaLookup,
        job_id: &str,
    ) -> Result<(RecordSet, Vec<String>), LoadError>;
}

pub trait MatchWriter: Send + Sync {
    /// Writes all matched records. Either every event type is written or
    /// nothing is.
    fn write_matched_records(
        &self,
        matches: &[MatchedRecord],
        source_location: &str,
        keys: &[String],
        schema_lookup: &SchemaLookup,
        job_id: &str,
    ) -> Result<OutputLocations, WriteError>;
}

pub trait MetadataStore: Send + Sync {
    fn persist_job_metadata(&self, metadata: &MatchJobMetadata, path: &str) -> Result<(), WriteError>;
}

/// Completion message for the external job system.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobCompletion {
    pub output_locations: OutputLocations,
    pub job_id: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub success: bool,
    pub runtime_secs: f64,
    pub upload_id: Option<String>,
}

/// Fire-and-forget: implementations handle their own delivery errors.
pub trait JobNotifier: Send + Sync {
    fn notify_job_completion(&self, completion: &JobCompletion);
}

/// The I/O side of a match job.
pub struct Collaborators {
    pub source: Box<dyn RecordSource>,
    pub writer: Box<dyn MatchWriter>,
    pub metadata_store: Box<dyn MetadataStore>,
}

/// Where job metadata lives for a source location.
pub fn metadata_path(source_location: &str, job_id: &str) -> String {
    format!(
        "{}/match_cache/metadata/{}",
        source_location.trim_end_matches('/'),
        job_id
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metadata_path() {
        assert_eq!(
            metadata_path("/data/upload/", "job-1"),
            "/data/upload/match_cache/metadata/job-1"
        );
    }
}
