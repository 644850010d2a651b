// src/lib.rs
pub mod candidate_generation;
pub mod clustering;
pub mod config;
pub mod error;
pub mod io;
pub mod matching;
pub mod models;
pub mod pipeline;
pub mod preprocess;
pub mod utils;

pub use config::MatcherConfig;
pub use error::MatchError;
pub use pipeline::{MatchOrchestrator, SchemaLookup};
