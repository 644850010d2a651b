// src/preprocess/mod.rs
//! Working-copy preparation before blocking.
//!
//! The loaded record set is never modified. `Preprocessor::run` clones it
//! and derives the working columns the blocking and contrast rules read.

use log::debug;
use rayon::prelude::*;
use serde::Serialize;

use crate::config::PreprocessConfig;
use crate::matching::name::normalize_person_name;
use crate::matching::values::parse_date;
use crate::models::{Record, RecordSet};
use crate::utils::worker_pool::WorkerPool;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct PreprocessStats {
    pub values_trimmed: usize,
    pub names_normalized: usize,
    pub dates_split: usize,
    pub dates_unparseable: usize,
    pub columns_combined: usize,
}

impl PreprocessStats {
    fn merge(self, other: Self) -> Self {
        Self {
            values_trimmed: self.values_trimmed + other.values_trimmed,
            names_normalized: self.names_normalized + other.names_normalized,
            dates_split: self.dates_split + other.dates_split,
            dates_unparseable: self.dates_unparseable + other.dates_unparseable,
            columns_combined: self.columns_combined + other.columns_combined,
        }
    }
}

pub struct Preprocessor {
    config: PreprocessConfig,
}

impl Preprocessor {
    pub fn new(config: &PreprocessConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    /// Returns the preprocessed working copy of `records`.
    pub fn run(&self, records: &RecordSet, pool: &WorkerPool) -> (RecordSet, PreprocessStats) {
        let mut working = records.clone();
        let stats = pool.install(|| {
            working
                .records_mut()
                .par_iter_mut()
                .map(|record| self.apply(record))
                .reduce(PreprocessStats::default, PreprocessStats::merge)
        });
        debug!("Preprocessing stats: {:?}", stats);
        (working, stats)
    }

    fn apply(&self, record: &mut Record) -> PreprocessStats {
        let mut stats = PreprocessStats::default();

        for value in record.attributes.values_mut() {
            let trimmed = value.trim();
            if trimmed.len() != value.len() {
                *value = trimmed.to_string();
                stats.values_trimmed += 1;
            }
        }

        for column in &self.config.name_columns {
            if let Some(name) = record.get(column) {
                let normalized = normalize_person_name(name);
                record.set(column.as_str(), normalized);
                stats.names_normalized += 1;
            }
        }

        for column in &self.config.date_columns {
            let Some(raw) = record.get(column) else {
                continue;
            };
            match parse_date(raw) {
                Some(date) => {
                    record.set(column.as_str(), date.format("%Y-%m-%d").to_string());
                    record.set(format!("{}_year", column), date.format("%Y").to_string());
                    record.set(format!("{}_month", column), date.format("%m").to_string());
                    record.set(format!("{}_day", column), date.format("%d").to_string());
                    stats.dates_split += 1;
                }
                None => stats.dates_unparseable += 1,
            }
        }

        for combined in &self.config.combine {
            let parts: Vec<&str> = combined
                .columns
                .iter()
                .filter_map(|c| record.get(c))
                .collect();
            if !parts.is_empty() {
                let value = parts.join(&combined.separator);
                record.set(combined.name.as_str(), value);
                stats.columns_combined += 1;
            }
        }

        stats
    }
}
