//! Error types for the matcher.
//!
//! Every failure a job can hit is typed so the orchestrator can tell fatal
//! stage errors apart from per-feature contrast failures, which are recovered
//! locally and never leave the contrast stage.

use std::path::PathBuf;

use thiserror::Error;

use crate::models::metadata::JobState;

/// Invalid or unreadable matcher configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read configuration file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Blocking rule '{rule}' uses unknown key method '{method}'")]
    UnknownKeyMethod { rule: String, method: String },

    #[error("Contrast rule '{rule}' uses unknown comparator '{method}'")]
    UnknownComparator { rule: String, method: String },

    #[error("Failed to build worker pool: {0}")]
    WorkerPool(String),
}

/// Upstream data missing or malformed. Fatal to the job.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("No source data found for any of the event types {event_types:?} in {location}")]
    NoEventTypes {
        location: String,
        event_types: Vec<String>,
    },

    #[error("Malformed source file {path}: {reason}")]
    Malformed { path: PathBuf, reason: String },

    #[error("Source file {path} is missing required column '{column}'")]
    MissingColumn { path: PathBuf, column: String },

    #[error("No primary key configured for event type '{0}'")]
    MissingPrimaryKey(String),

    #[error("Duplicate record id '{0}'")]
    DuplicateRecordId(String),

    #[error("I/O error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Failure computing a single feature. Recovered by substituting the rule's
/// missing-value policy; never aborts a pair or a job.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ContrastError {
    #[error("Value '{value}' for rule '{rule}' could not be parsed")]
    Unparseable { rule: String, value: String },

    #[error("Comparator for rule '{rule}' produced an invalid distance: {distance}")]
    InvalidDistance { rule: String, distance: f64 },
}

/// Clustering algorithm failure, e.g. an invalid parameter combination.
#[derive(Debug, Error)]
pub enum ClusteringError {
    #[error("Invalid clustering parameter '{name}': {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    #[error("Unknown clustering algorithm '{0}'")]
    UnknownAlgorithm(String),

    #[error("Clustering produced {actual} labels for {expected} records")]
    LabelCount { expected: usize, actual: usize },
}

/// Result persistence failure. Fatal; computed assignments are discarded.
#[derive(Debug, Error)]
pub enum WriteError {
    #[error("I/O error writing {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to encode {path}: {reason}")]
    Encode { path: PathBuf, reason: String },

    #[error("No primary key configured for event type '{0}'")]
    MissingPrimaryKey(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Illegal job state transition {from:?} -> {to:?}")]
pub struct StateError {
    pub from: JobState,
    pub to: JobState,
}

/// Fatal job error. Any of these moves the job to `Failed`.
#[derive(Debug, Error)]
pub enum MatchError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Clustering(#[from] ClusteringError),

    #[error(transparent)]
    Write(#[from] WriteError),

    #[error(transparent)]
    State(#[from] StateError),

    #[error("Job cancelled before stage {stage:?}")]
    Cancelled { stage: JobState },
}

impl MatchError {
    /// Short classification used in job metadata and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            MatchError::Config(_) => "ConfigError",
            MatchError::Load(_) => "LoadError",
            MatchError::Clustering(_) => "ClusteringError",
            MatchError::Write(_) => "WriteError",
            MatchError::State(_) => "StateError",
            MatchError::Cancelled { .. } => "Cancelled",
        }
    }
}
