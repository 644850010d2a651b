// src/candidate_generation/mod.rs
pub mod candidate_generation;
pub mod key_extractors;

pub use candidate_generation::{BlockingOutput, BlockingStats, CandidatePairGenerator};
pub use key_extractors::{KeyExtractor, KeyExtractorRegistry};
