// src/pipeline/mod.rs
pub mod cancellation;
pub mod collaborators;
pub mod matcher;
pub mod orchestrator;

pub use cancellation::CancellationToken;
pub use collaborators::{
    Collaborators, JobCompletion, JobNotifier, MatchWriter, MetadataStore, OutputLocations,
    RecordSource, SchemaLookup,
};
pub use matcher::Matcher;
pub use orchestrator::{MatchJobFailure, MatchJobOutput, MatchOrchestrator};
