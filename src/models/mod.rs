pub mod matching;
pub mod metadata;
pub mod records;

pub use matching::{CandidatePair, FeatureVector};
pub use metadata::{JobState, MatchJobMetadata, StageMetadata, StageTimer};
pub use records::{MatchedRecord, Record, RecordSet};
