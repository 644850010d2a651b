// src/io/metadata_store.rs

use log::debug;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::WriteError;
use crate::models::MatchJobMetadata;
use crate::pipeline::collaborators::MetadataStore;

/// Persists job metadata as a YAML document at the given path.
#[derive(Debug, Default, Clone)]
pub struct YamlMetadataStore;

impl YamlMetadataStore {
    pub fn new() -> Self {
        Self
    }

    pub fn load(path: impl AsRef<Path>) -> Result<MatchJobMetadata, WriteError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| WriteError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_yaml::from_str(&text).map_err(|e| WriteError::Encode {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }
}

impl MetadataStore for YamlMetadataStore {
    fn persist_job_metadata(&self, metadata: &MatchJobMetadata, path: &str) -> Result<(), WriteError> {
        let path = PathBuf::from(path);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| WriteError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let yaml = serde_yaml::to_string(metadata).map_err(|e| WriteError::Encode {
            path: path.clone(),
            reason: e.to_string(),
        })?;
        fs::write(&path, yaml).map_err(|source| WriteError::Io {
            path: path.clone(),
            source,
        })?;
        debug!("Persisted metadata for job {} to {}", metadata.match_job_id, path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MatcherConfig;
    use crate::models::{JobState, StageTimer};

    #[test]
    fn test_persist_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("match_cache/metadata/job-1");

        let mut metadata = MatchJobMetadata::new("job-1", "/data", Some("u-1".into()), &MatcherConfig::default());
        metadata
            .complete_stage(StageTimer::start(JobState::Loaded).finish((0, 0), (4, 5)))
            .unwrap();

        YamlMetadataStore::new()
            .persist_job_metadata(&metadata, path.to_str().unwrap())
            .unwrap();
        let reloaded = YamlMetadataStore::load(&path).unwrap();

        assert_eq!(reloaded.match_job_id, "job-1");
        assert_eq!(reloaded.upload_id.as_deref(), Some("u-1"));
        assert_eq!(reloaded.completed_stages(), vec![JobState::Loaded]);
        assert_eq!(reloaded.config_fingerprint, metadata.config_fingerprint);
    }
}
