// src/models/metadata.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use std::time::Instant;

use crate::config::MatcherConfig;
use crate::error::{MatchError, StateError};

/// Job lifecycle. `Written` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobState {
    Initialized,
    Loaded,
    Preprocessed,
    Blocked,
    Contrasted,
    Clustered,
    Written,
    Failed,
}

impl JobState {
    /// The next state on the success path.
    pub fn next(self) -> Option<JobState> {
        match self {
            JobState::Initialized => Some(JobState::Loaded),
            JobState::Loaded => Some(JobState::Preprocessed),
            JobState::Preprocessed => Some(JobState::Blocked),
            JobState::Blocked => Some(JobState::Contrasted),
            JobState::Contrasted => Some(JobState::Clustered),
            JobState::Clustered => Some(JobState::Written),
            JobState::Written | JobState::Failed => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Written | JobState::Failed)
    }

    pub fn can_transition_to(self, to: JobState) -> bool {
        if to == JobState::Failed {
            return !self.is_terminal();
        }
        self.next() == Some(to)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Initialized => "initialized",
            JobState::Loaded => "loaded",
            JobState::Preprocessed => "preprocessed",
            JobState::Blocked => "blocked",
            JobState::Contrasted => "contrasted",
            JobState::Clustered => "clustered",
            JobState::Written => "written",
            JobState::Failed => "failed",
        }
    }
}

/// Timing and counts for one completed stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageMetadata {
    pub stage: JobState,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub duration_secs: f64,
    pub rows_in: usize,
    pub rows_out: usize,
    pub columns_in: usize,
    pub columns_out: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pairs: Option<usize>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty", default)]
    pub details: BTreeMap<String, JsonValue>,
}

impl StageMetadata {
    pub fn with_pairs(mut self, pairs: usize) -> Self {
        self.pairs = Some(pairs);
        self
    }

    pub fn with_detail(mut self, key: &str, value: impl Into<JsonValue>) -> Self {
        self.details.insert(key.to_string(), value.into());
        self
    }
}

/// Captures the wall-clock start of a stage.
pub struct StageTimer {
    stage: JobState,
    started_at: DateTime<Utc>,
    started: Instant,
}

impl StageTimer {
    pub fn start(stage: JobState) -> Self {
        Self {
            stage,
            started_at: Utc::now(),
            started: Instant::now(),
        }
    }

    pub fn stage(&self) -> JobState {
        self.stage
    }

    pub fn finish(
        self,
        (rows_in, columns_in): (usize, usize),
        (rows_out, columns_out): (usize, usize),
    ) -> StageMetadata {
        StageMetadata {
            stage: self.stage,
            started_at: self.started_at,
            finished_at: Utc::now(),
            duration_secs: self.started.elapsed().as_secs_f64(),
            rows_in,
            rows_out,
            columns_in,
            columns_out,
            pairs: None,
            details: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureMetadata {
    pub kind: String,
    pub message: String,
    /// Last state reached before the failure.
    pub last_state: JobState,
    pub failed_at: DateTime<Utc>,
}

/// Metadata for one match job. Created at job start, appended to as stages
/// complete, persisted once at the end.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchJobMetadata {
    pub match_job_id: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub upload_id: Option<String>,
    pub base_data_directory: String,
    pub match_job_start_time: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub match_job_end_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub runtime_secs: Option<f64>,
    pub state: JobState,
    #[serde(default)]
    pub event_types_read: Vec<String>,
    #[serde(default)]
    pub loaded_data_columns: Vec<String>,
    #[serde(default)]
    pub preprocessed_data_columns: Vec<String>,
    #[serde(default)]
    pub stages: Vec<StageMetadata>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub failure: Option<FailureMetadata>,
    pub config_fingerprint: String,
    pub config: MatcherConfig,
}

impl MatchJobMetadata {
    pub fn new(
        match_job_id: impl Into<String>,
        base_data_directory: impl Into<String>,
        upload_id: Option<String>,
        config: &MatcherConfig,
    ) -> Self {
        Self {
            match_job_id: match_job_id.into(),
            upload_id,
            base_data_directory: base_data_directory.into(),
            match_job_start_time: Utc::now(),
            match_job_end_time: None,
            runtime_secs: None,
            state: JobState::Initialized,
            event_types_read: Vec::new(),
            loaded_data_columns: Vec::new(),
            preprocessed_data_columns: Vec::new(),
            stages: Vec::new(),
            failure: None,
            config_fingerprint: config.fingerprint(),
            config: config.clone(),
        }
    }

    fn transition(&mut self, to: JobState) -> Result<(), StateError> {
        if !self.state.can_transition_to(to) {
            return Err(StateError {
                from: self.state,
                to,
            });
        }
        self.state = to;
        Ok(())
    }

    /// Moves to the stage's state and records it.
    pub fn complete_stage(&mut self, stage: StageMetadata) -> Result<(), StateError> {
        self.transition(stage.stage)?;
        self.stages.push(stage);
        Ok(())
    }

    /// Moves to `Failed`, keeping every stage completed so far.
    pub fn fail(&mut self, error: &MatchError, failed_at: DateTime<Utc>) -> Result<(), StateError> {
        let last_state = self.state;
        self.transition(JobState::Failed)?;
        self.failure = Some(FailureMetadata {
            kind: error.kind().to_string(),
            message: error.to_string(),
            last_state,
            failed_at,
        });
        self.finish(failed_at);
        Ok(())
    }

    /// Stamps the end time. Runtime is always derived from this timestamp.
    pub fn finish(&mut self, end_time: DateTime<Utc>) {
        self.match_job_end_time = Some(end_time);
        let runtime = end_time - self.match_job_start_time;
        self.runtime_secs = Some(runtime.num_milliseconds() as f64 / 1000.0);
    }

    pub fn completed_stages(&self) -> Vec<JobState> {
        self.stages.iter().map(|s| s.stage).collect()
    }

    pub fn stage(&self, state: JobState) -> Option<&StageMetadata> {
        self.stages.iter().find(|s| s.stage == state)
    }

    pub fn succeeded(&self) -> bool {
        self.state == JobState::Written
    }
}
