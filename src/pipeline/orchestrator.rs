// src/pipeline/orchestrator.rs
//! Runs one match job end to end.
//!
//! `Initialized -> Loaded -> Preprocessed -> Blocked -> Contrasted ->
//! Clustered -> Written`, with `Failed` reachable from any non-terminal
//! state. Stage timings and counts go into the job metadata, which is
//! persisted once on both paths. The notifier is called exactly once per job.

use chrono::Utc;
use indicatif::{MultiProgress, ProgressBar};
use serde_json::Value as JsonValue;
use thiserror::Error;
use uuid::Uuid;

use crate::candidate_generation::KeyExtractorRegistry;
use crate::clustering::ClusterAssignment;
use crate::config::MatcherConfig;
use crate::error::{ClusteringError, ConfigError, MatchError};
use crate::matching::ComparatorRegistry;
use crate::models::{JobState, MatchJobMetadata, MatchedRecord, RecordSet, StageMetadata, StageTimer};
use crate::pipeline::cancellation::CancellationToken;
use crate::pipeline::collaborators::{
    metadata_path, Collaborators, JobCompletion, JobNotifier, OutputLocations, SchemaLookup,
};
use crate::pipeline::matcher::Matcher;
use crate::preprocess::Preprocessor;
use crate::utils::get_memory_usage;
use crate::utils::progress_bars::logging::{log_job_completion, log_job_start, StageLogger};
use crate::utils::progress_bars::progress_config::{item_progress_bar, stage_progress_bar, ProgressConfig};
use crate::utils::worker_pool::WorkerPool;

const PIPELINE_STAGES: u64 = 6;

/// Result of a successful job.
#[derive(Debug)]
pub struct MatchJobOutput {
    pub job_id: String,
    /// The loaded records, unmodified, each with its matched id.
    pub records: Vec<MatchedRecord>,
    pub output_locations: OutputLocations,
    pub metadata: MatchJobMetadata,
}

impl MatchJobOutput {
    pub fn distinct_matched_ids(&self) -> usize {
        self.records
            .iter()
            .map(|r| r.matched_id.as_str())
            .collect::<std::collections::BTreeSet<_>>()
            .len()
    }
}

/// A failed job: the fatal error plus the metadata captured up to it.
#[derive(Debug, Error)]
#[error("Match job {job_id} failed: {error}")]
pub struct MatchJobFailure {
    pub job_id: String,
    #[source]
    pub error: MatchError,
    pub metadata: MatchJobMetadata,
}

struct StageOutcome {
    records: Vec<MatchedRecord>,
    output_locations: OutputLocations,
}

fn to_detail<T: serde::Serialize>(value: &T) -> JsonValue {
    serde_json::to_value(value).unwrap_or_default()
}

pub struct MatchOrchestrator {
    config: MatcherConfig,
    matcher: Matcher,
    preprocessor: Preprocessor,
    collaborators: Collaborators,
    notifier: Box<dyn JobNotifier>,
    pool: WorkerPool,
    multi_progress: Option<MultiProgress>,
    detailed_progress: bool,
    show_memory: bool,
}

impl MatchOrchestrator {
    /// Builds an orchestrator with the built-in key extractors and
    /// comparators.
    pub fn new(
        config: MatcherConfig,
        collaborators: Collaborators,
        notifier: Box<dyn JobNotifier>,
    ) -> Result<Self, ConfigError> {
        Self::with_registries(
            config,
            collaborators,
            notifier,
            &KeyExtractorRegistry::default(),
            &ComparatorRegistry::default(),
        )
    }

    pub fn with_registries(
        config: MatcherConfig,
        collaborators: Collaborators,
        notifier: Box<dyn JobNotifier>,
        key_extractors: &KeyExtractorRegistry,
        comparators: &ComparatorRegistry,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let matcher = Matcher::new(&config, key_extractors, comparators)?;
        let pool = WorkerPool::new(config.worker_count(), "matcher")?;
        Ok(Self {
            preprocessor: Preprocessor::new(&config.preprocessing),
            matcher,
            collaborators,
            notifier,
            pool,
            multi_progress: None,
            detailed_progress: false,
            show_memory: false,
            config,
        })
    }

    pub fn with_progress(mut self, progress: &ProgressConfig) -> Self {
        self.multi_progress = progress.create_multi_progress();
        self.detailed_progress = progress.should_show_detailed();
        self.show_memory = progress.should_show_memory();
        self
    }

    pub fn config(&self) -> &MatcherConfig {
        &self.config
    }

    pub fn run(
        &self,
        source_location: &str,
        schema_lookup: &SchemaLookup,
        upload_id: Option<String>,
    ) -> Result<MatchJobOutput, MatchJobFailure> {
        self.run_with_cancellation(source_location, schema_lookup, upload_id, &CancellationToken::new())
    }

    pub fn run_with_cancellation(
        &self,
        source_location: &str,
        schema_lookup: &SchemaLookup,
        upload_id: Option<String>,
        cancellation: &CancellationToken,
    ) -> Result<MatchJobOutput, MatchJobFailure> {
        let job_id = Uuid::new_v4().to_string();
        let mut metadata =
            MatchJobMetadata::new(job_id.clone(), source_location, upload_id.clone(), &self.config);
        let event_types: Vec<String> = schema_lookup.keys().cloned().collect();
        log_job_start(&job_id, source_location, &event_types, self.pool.current_num_threads());

        let stage_pb = self
            .multi_progress
            .as_ref()
            .map(|mp| stage_progress_bar(mp, PIPELINE_STAGES));

        let result = self.execute(
            &job_id,
            source_location,
            schema_lookup,
            &mut metadata,
            cancellation,
            stage_pb.as_ref(),
        );

        let meta_path = metadata_path(source_location, &job_id);
        match result {
            Ok(outcome) => {
                let end_time = Utc::now();
                metadata.finish(end_time);
                self.persist_metadata(&metadata, &meta_path);
                let runtime_secs = metadata.runtime_secs.unwrap_or_default();
                self.notifier.notify_job_completion(&JobCompletion {
                    output_locations: outcome.output_locations.clone(),
                    job_id: job_id.clone(),
                    start_time: metadata.match_job_start_time,
                    end_time,
                    success: true,
                    runtime_secs,
                    upload_id,
                });
                if let Some(pb) = &stage_pb {
                    pb.finish_with_message("Match job complete");
                }
                let output = MatchJobOutput {
                    job_id,
                    records: outcome.records,
                    output_locations: outcome.output_locations,
                    metadata,
                };
                log_job_completion(
                    &output.job_id,
                    true,
                    runtime_secs,
                    Some(output.distinct_matched_ids()),
                );
                Ok(output)
            }
            Err(error) => {
                let failed_at = Utc::now();
                StageLogger::new(JobState::Failed, &job_id)
                    .log_error(&format!("Match job failed: {}", error));
                if let Err(state_err) = metadata.fail(&error, failed_at) {
                    log::warn!("[{}] Could not record failure: {}", job_id, state_err);
                    metadata.finish(failed_at);
                }
                self.persist_metadata(&metadata, &meta_path);
                // Runtime is derived from the failure timestamp.
                let runtime_secs = metadata.runtime_secs.unwrap_or_default();
                self.notifier.notify_job_completion(&JobCompletion {
                    output_locations: OutputLocations::new(),
                    job_id: job_id.clone(),
                    start_time: metadata.match_job_start_time,
                    end_time: failed_at,
                    success: false,
                    runtime_secs,
                    upload_id,
                });
                if let Some(pb) = &stage_pb {
                    pb.abandon_with_message("Match job failed");
                }
                log_job_completion(&job_id, false, runtime_secs, None);
                Err(MatchJobFailure {
                    job_id,
                    error,
                    metadata,
                })
            }
        }
    }

    fn persist_metadata(&self, metadata: &MatchJobMetadata, path: &str) {
        if let Err(e) = self
            .collaborators
            .metadata_store
            .persist_job_metadata(metadata, path)
        {
            log::error!(
                "[{}] Failed to persist job metadata to {}: {}",
                metadata.match_job_id,
                path,
                e
            );
        }
    }

    fn finish_stage(
        &self,
        logger: &StageLogger,
        metadata: &mut MatchJobMetadata,
        stage: StageMetadata,
        stage_pb: Option<&ProgressBar>,
    ) -> Result<(), MatchError> {
        let memory = self.show_memory.then(get_memory_usage);
        logger.log_completion(&stage, memory);
        metadata.complete_stage(stage)?;
        if let Some(pb) = stage_pb {
            pb.inc(1);
        }
        Ok(())
    }

    fn execute(
        &self,
        job_id: &str,
        source_location: &str,
        schema_lookup: &SchemaLookup,
        metadata: &mut MatchJobMetadata,
        cancellation: &CancellationToken,
        stage_pb: Option<&ProgressBar>,
    ) -> Result<StageOutcome, MatchError> {
        let set_message = |msg: &str| {
            if let Some(pb) = stage_pb {
                pb.set_message(msg.to_string());
            }
        };

        // Loading
        cancellation.check(JobState::Loaded)?;
        set_message("Loading records");
        let logger = StageLogger::new(JobState::Loaded, job_id);
        logger.log_start(Some(source_location));
        let timer = StageTimer::start(JobState::Loaded);
        let event_types: Vec<String> = schema_lookup.keys().cloned().collect();
        let (records, found) = self.collaborators.source.load_records(
            source_location,
            &event_types,
            &self.config.keys,
            schema_lookup,
            job_id,
        )?;
        let loaded_shape = records.shape();
        metadata.event_types_read = found.clone();
        metadata.loaded_data_columns = records.columns();
        let stage = timer
            .finish((0, 0), (loaded_shape[0], loaded_shape[1]))
            .with_detail("event_types_read", found.clone());
        self.finish_stage(&logger, metadata, stage, stage_pb)?;

        // Preprocessing runs on a working copy; `records` stays as loaded.
        cancellation.check(JobState::Preprocessed)?;
        set_message("Preprocessing");
        let logger = StageLogger::new(JobState::Preprocessed, job_id);
        logger.log_start(None);
        let timer = StageTimer::start(JobState::Preprocessed);
        let (working, prep_stats) = self.preprocessor.run(&records, &self.pool);
        let working_shape = working.shape();
        metadata.preprocessed_data_columns = working.columns();
        if prep_stats.dates_unparseable > 0 {
            logger.log_warning(&format!(
                "{} date values could not be parsed",
                prep_stats.dates_unparseable
            ));
        }
        let stage = timer
            .finish(
                (loaded_shape[0], loaded_shape[1]),
                (working_shape[0], working_shape[1]),
            )
            .with_detail("preprocessing", to_detail(&prep_stats));
        self.finish_stage(&logger, metadata, stage, stage_pb)?;

        // Blocking
        cancellation.check(JobState::Blocked)?;
        set_message("Blocking");
        let logger = StageLogger::new(JobState::Blocked, job_id);
        logger.log_start(Some(&format!("{} rules", self.config.blocking_rules.len())));
        logger.log_debug(&format!("Rules: {:?}", self.matcher.blocking_rule_names()));
        let timer = StageTimer::start(JobState::Blocked);
        let blocking = self.matcher.block(&working, &self.pool);
        let skipped: usize = blocking.stats.iter().map(|s| s.skipped_blocks).sum();
        if skipped > 0 {
            logger.log_warning(&format!("{} oversized blocks skipped", skipped));
        }
        let stage = timer
            .finish(
                (working_shape[0], working_shape[1]),
                (working_shape[0], working_shape[1]),
            )
            .with_pairs(blocking.pairs.len())
            .with_detail("rules", to_detail(&blocking.stats));
        self.finish_stage(&logger, metadata, stage, stage_pb)?;

        // Contrast and aggregation
        cancellation.check(JobState::Contrasted)?;
        set_message("Contrasting pairs");
        let logger = StageLogger::new(JobState::Contrasted, job_id);
        logger.log_start(Some(&format!("{} candidate pairs", blocking.pairs.len())));
        logger.log_debug(&format!("Features: {:?}", self.matcher.feature_names()));
        let timer = StageTimer::start(JobState::Contrasted);
        let pair_pb = self
            .multi_progress
            .as_ref()
            .filter(|_| self.detailed_progress)
            .map(|mp| item_progress_bar(mp, blocking.pairs.len() as u64, "pairs contrasted"));
        let contrast = self
            .matcher
            .contrast(&working, &blocking.pairs, &self.pool, pair_pb.as_ref());
        if let Some(pb) = &pair_pb {
            pb.finish_and_clear();
        }
        let distances = self.matcher.aggregate(working.len(), &contrast.vectors);
        let failures = contrast.stats.total_failures();
        if failures > 0 {
            logger.log_warning(&format!(
                "{} feature comparisons failed and used their missing-value policy",
                failures
            ));
        }
        let stage = timer
            .finish(
                (working_shape[0], working_shape[1]),
                (working_shape[0], working_shape[1]),
            )
            .with_pairs(distances.len())
            .with_detail("features", self.matcher.feature_names())
            .with_detail("missing_values", to_detail(&contrast.stats.missing_by_rule))
            .with_detail("contrast_failures", to_detail(&contrast.stats.failures_by_rule))
            .with_detail("contrast_failure_samples", contrast.stats.failure_samples.clone());
        self.finish_stage(&logger, metadata, stage, stage_pb)?;

        // Clustering
        cancellation.check(JobState::Clustered)?;
        set_message("Clustering");
        let logger = StageLogger::new(JobState::Clustered, job_id);
        logger.log_start(None);
        let timer = StageTimer::start(JobState::Clustered);
        let assignment = self.matcher.cluster(&working, &distances)?;
        let stage = timer
            .finish(
                (working_shape[0], working_shape[1]),
                (assignment.len(), 2),
            )
            .with_pairs(distances.len())
            .with_detail("clusters", to_detail(assignment.summary()));
        self.finish_stage(&logger, metadata, stage, stage_pb)?;

        // Writing
        cancellation.check(JobState::Written)?;
        set_message("Writing matched records");
        let logger = StageLogger::new(JobState::Written, job_id);
        logger.log_start(None);
        let timer = StageTimer::start(JobState::Written);
        let matched = attach_matched_ids(&records, &assignment)?;
        let write_lookup: SchemaLookup = schema_lookup
            .iter()
            .filter(|(event_type, _)| found.contains(*event_type))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        let output_locations = self.collaborators.writer.write_matched_records(
            &matched,
            source_location,
            &self.config.keys,
            &write_lookup,
            job_id,
        )?;
        let stage = timer
            .finish(
                (loaded_shape[0], loaded_shape[1]),
                (matched.len(), loaded_shape[1] + 1),
            )
            .with_detail("output_locations", to_detail(&output_locations));
        self.finish_stage(&logger, metadata, stage, stage_pb)?;

        Ok(StageOutcome {
            records: matched,
            output_locations,
        })
    }
}

/// Pairs each loaded record with its matched id, by position.
fn attach_matched_ids(
    records: &RecordSet,
    assignment: &ClusterAssignment,
) -> Result<Vec<MatchedRecord>, ClusteringError> {
    if assignment.len() != records.len() {
        return Err(ClusteringError::LabelCount {
            expected: records.len(),
            actual: assignment.len(),
        });
    }
    records
        .iter()
        .enumerate()
        .map(|(pos, record)| {
            let matched_id = assignment.at(pos).ok_or(ClusteringError::LabelCount {
                expected: records.len(),
                actual: pos,
            })?;
            Ok(MatchedRecord {
                record: record.clone(),
                matched_id: matched_id.to_string(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{LoadError, WriteError};
    use crate::models::Record;
    use crate::pipeline::collaborators::{MatchWriter, MetadataStore, RecordSource};
    use std::sync::{Arc, Mutex};

    struct StaticSource(Vec<Record>);

    impl RecordSource for StaticSource {
        fn load_records(
            &self,
            _: &str,
            _: &[String],
            _: &[String],
            _: &SchemaLookup,
            _: &str,
        ) -> Result<(RecordSet, Vec<String>), LoadError> {
            let set = RecordSet::new(self.0.clone())?;
            let found = set.event_types();
            Ok((set, found))
        }
    }

    struct NullWriter;

    impl MatchWriter for NullWriter {
        fn write_matched_records(
            &self,
            _: &[MatchedRecord],
            source_location: &str,
            _: &[String],
            schema_lookup: &SchemaLookup,
            job_id: &str,
        ) -> Result<OutputLocations, WriteError> {
            Ok(schema_lookup
                .keys()
                .map(|et| (et.clone(), format!("{}/matches/{}/{}", source_location, job_id, et)))
                .collect())
        }
    }

    struct RejectingWriter;

    impl MatchWriter for RejectingWriter {
        fn write_matched_records(
            &self,
            _: &[MatchedRecord],
            source_location: &str,
            _: &[String],
            _: &SchemaLookup,
            job_id: &str,
        ) -> Result<OutputLocations, WriteError> {
            Err(WriteError::Encode {
                path: format!("{}/matches/{}", source_location, job_id).into(),
                reason: "read-only volume".into(),
            })
        }
    }

    /// Cancels the job while its records are being loaded.
    struct CancellingSource {
        records: Vec<Record>,
        token: CancellationToken,
    }

    impl RecordSource for CancellingSource {
        fn load_records(
            &self,
            _: &str,
            _: &[String],
            _: &[String],
            _: &SchemaLookup,
            _: &str,
        ) -> Result<(RecordSet, Vec<String>), LoadError> {
            self.token.cancel();
            let set = RecordSet::new(self.records.clone())?;
            let found = set.event_types();
            Ok((set, found))
        }
    }

    #[derive(Clone, Default)]
    struct MemoryStore(Arc<Mutex<Vec<(String, MatchJobMetadata)>>>);

    impl MetadataStore for MemoryStore {
        fn persist_job_metadata(&self, metadata: &MatchJobMetadata, path: &str) -> Result<(), WriteError> {
            self.0.lock().unwrap().push((path.to_string(), metadata.clone()));
            Ok(())
        }
    }

    struct FailingStore;

    impl MetadataStore for FailingStore {
        fn persist_job_metadata(&self, _: &MatchJobMetadata, path: &str) -> Result<(), WriteError> {
            Err(WriteError::Encode {
                path: path.into(),
                reason: "disk full".into(),
            })
        }
    }

    #[derive(Clone, Default)]
    struct Recorder(Arc<Mutex<Vec<JobCompletion>>>);

    impl JobNotifier for Recorder {
        fn notify_job_completion(&self, completion: &JobCompletion) {
            self.0.lock().unwrap().push(completion.clone());
        }
    }

    fn people() -> Vec<Record> {
        vec![
            Record::new("jail:1", "jail")
                .with_attribute("first_name", "Ann")
                .with_attribute("last_name", "Lee")
                .with_attribute("dob", "1990-01-01"),
            Record::new("hmis:1", "hmis")
                .with_attribute("first_name", "Ann")
                .with_attribute("last_name", "Lee")
                .with_attribute("dob", "1990-01-01"),
            Record::new("hmis:2", "hmis")
                .with_attribute("first_name", "Zed")
                .with_attribute("last_name", "Quinn")
                .with_attribute("dob", "1960-06-30"),
        ]
    }

    fn lookup() -> SchemaLookup {
        SchemaLookup::from([
            ("jail".to_string(), "booking_id".to_string()),
            ("hmis".to_string(), "client_id".to_string()),
        ])
    }

    fn orchestrator(
        store: Box<dyn MetadataStore>,
        notifier: Recorder,
        config: MatcherConfig,
    ) -> MatchOrchestrator {
        orchestrator_with(
            Box::new(StaticSource(people())),
            Box::new(NullWriter),
            store,
            notifier,
            config,
        )
    }

    fn orchestrator_with(
        source: Box<dyn RecordSource>,
        writer: Box<dyn MatchWriter>,
        store: Box<dyn MetadataStore>,
        notifier: Recorder,
        config: MatcherConfig,
    ) -> MatchOrchestrator {
        let collaborators = Collaborators {
            source,
            writer,
            metadata_store: store,
        };
        MatchOrchestrator::new(config, collaborators, Box::new(notifier)).unwrap()
    }

    #[test]
    fn test_successful_job_records_every_stage() {
        let store = MemoryStore::default();
        let recorder = Recorder::default();
        let orch = orchestrator(Box::new(store.clone()), recorder.clone(), MatcherConfig::default());

        let output = orch.run("/data", &lookup(), Some("upload-9".into())).unwrap();
        assert_eq!(output.records.len(), 3);
        assert_eq!(output.distinct_matched_ids(), 2);
        assert_eq!(output.records[0].record.get("first_name"), Some("Ann"));
        assert_eq!(
            output.metadata.completed_stages(),
            vec![
                JobState::Loaded,
                JobState::Preprocessed,
                JobState::Blocked,
                JobState::Contrasted,
                JobState::Clustered,
                JobState::Written
            ]
        );

        let persisted = store.0.lock().unwrap();
        assert_eq!(persisted.len(), 1);
        assert_eq!(persisted[0].0, format!("/data/match_cache/metadata/{}", output.job_id));

        let notes = recorder.0.lock().unwrap();
        assert_eq!(notes.len(), 1);
        assert!(notes[0].success);
        assert_eq!(notes[0].upload_id.as_deref(), Some("upload-9"));
        assert_eq!(notes[0].output_locations.len(), 2);
    }

    #[test]
    fn test_cluster_failure_notifies_once() {
        let recorder = Recorder::default();
        let mut config = MatcherConfig::default();
        config.clusterer.args.eps = -1.0;
        let orch = orchestrator(Box::new(MemoryStore::default()), recorder.clone(), config);

        let failure = orch.run("/data", &lookup(), None).unwrap_err();
        assert_eq!(failure.error.kind(), "ClusteringError");
        assert_eq!(failure.metadata.state, JobState::Failed);
        assert_eq!(failure.metadata.completed_stages().len(), 4);
        assert_eq!(
            failure.metadata.failure.as_ref().unwrap().last_state,
            JobState::Contrasted
        );

        let notes = recorder.0.lock().unwrap();
        assert_eq!(notes.len(), 1);
        assert!(!notes[0].success);
        assert!(notes[0].output_locations.is_empty());
        assert!(notes[0].runtime_secs >= 0.0);
        assert_eq!(notes[0].end_time, failure.metadata.match_job_end_time.unwrap());
    }

    #[test]
    fn test_metadata_persist_failure_is_not_fatal() {
        let recorder = Recorder::default();
        let orch = orchestrator(Box::new(FailingStore), recorder.clone(), MatcherConfig::default());
        assert!(orch.run("/data", &lookup(), None).is_ok());
        assert!(recorder.0.lock().unwrap()[0].success);
    }

    #[test]
    fn test_cancelled_job_fails_before_loading() {
        let recorder = Recorder::default();
        let orch = orchestrator(Box::new(MemoryStore::default()), recorder.clone(), MatcherConfig::default());
        let token = CancellationToken::new();
        token.cancel();

        let failure = orch
            .run_with_cancellation("/data", &lookup(), None, &token)
            .unwrap_err();
        assert!(matches!(
            failure.error,
            MatchError::Cancelled { stage: JobState::Loaded }
        ));
        assert!(failure.metadata.stages.is_empty());
        assert_eq!(recorder.0.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_write_failure_discards_outputs() {
        let store = MemoryStore::default();
        let recorder = Recorder::default();
        let orch = orchestrator_with(
            Box::new(StaticSource(people())),
            Box::new(RejectingWriter),
            Box::new(store.clone()),
            recorder.clone(),
            MatcherConfig::default(),
        );

        let failure = orch.run("/data", &lookup(), Some("upload-3".into())).unwrap_err();
        assert_eq!(failure.error.kind(), "WriteError");
        assert_eq!(failure.metadata.state, JobState::Failed);
        assert_eq!(
            failure.metadata.failure.as_ref().unwrap().last_state,
            JobState::Clustered
        );
        assert!(failure.metadata.stage(JobState::Written).is_none());
        assert_eq!(failure.metadata.completed_stages().len(), 5);

        let persisted = store.0.lock().unwrap();
        assert_eq!(persisted.len(), 1);
        assert_eq!(persisted[0].1.state, JobState::Failed);

        let notes = recorder.0.lock().unwrap();
        assert_eq!(notes.len(), 1);
        assert!(!notes[0].success);
        assert!(notes[0].output_locations.is_empty());
        assert_eq!(notes[0].upload_id.as_deref(), Some("upload-3"));
    }

    #[test]
    fn test_cancellation_during_load_stops_before_preprocessing() {
        let recorder = Recorder::default();
        let token = CancellationToken::new();
        let orch = orchestrator_with(
            Box::new(CancellingSource {
                records: people(),
                token: token.clone(),
            }),
            Box::new(NullWriter),
            Box::new(MemoryStore::default()),
            recorder.clone(),
            MatcherConfig::default(),
        );

        let failure = orch
            .run_with_cancellation("/data", &lookup(), None, &token)
            .unwrap_err();
        assert!(matches!(
            failure.error,
            MatchError::Cancelled { stage: JobState::Preprocessed }
        ));
        assert_eq!(failure.metadata.completed_stages(), vec![JobState::Loaded]);
        assert_eq!(
            failure.metadata.failure.as_ref().unwrap().last_state,
            JobState::Loaded
        );
        let notes = recorder.0.lock().unwrap();
        assert_eq!(notes.len(), 1);
        assert!(!notes[0].success);
    }
}
