// src/matching/contrast.rs

use indicatif::ProgressBar;
use log::debug;
use rayon::prelude::*;
use std::collections::BTreeMap;

use crate::config::{ContrastRuleConfig, MissingValuePolicy};
use crate::error::{ConfigError, ContrastError};
use crate::matching::comparators::{Comparator, ComparatorRegistry};
use crate::models::{CandidatePair, FeatureVector, Record, RecordSet};
use crate::utils::worker_pool::WorkerPool;

const MAX_FAILURE_SAMPLES: usize = 5;

/// What a rule yields when it cannot compare two values.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Fallback {
    Skip,
    Distance(f64),
}

impl Fallback {
    fn from_rule(rule: &ContrastRuleConfig) -> Self {
        match rule.missing {
            MissingValuePolicy::Max => Fallback::Distance(1.0),
            MissingValuePolicy::Skip => Fallback::Skip,
            MissingValuePolicy::Default => Fallback::Distance(rule.default_distance.unwrap_or(1.0)),
        }
    }

    fn value(self) -> Option<f64> {
        match self {
            Fallback::Skip => None,
            Fallback::Distance(d) => Some(d),
        }
    }
}

struct CompiledRule {
    name: String,
    attribute: String,
    fallback: Fallback,
    comparator: Box<dyn Comparator>,
}

#[derive(Debug, Clone, PartialEq)]
enum FeatureIssue {
    Missing,
    Failed(ContrastError),
}

/// Counts of features that fell back to their rule's missing policy.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContrastStats {
    pub pairs: usize,
    pub missing_by_rule: BTreeMap<String, usize>,
    pub failures_by_rule: BTreeMap<String, usize>,
    pub failure_samples: Vec<String>,
}

impl ContrastStats {
    pub fn total_failures(&self) -> usize {
        self.failures_by_rule.values().sum()
    }

    pub fn total_missing(&self) -> usize {
        self.missing_by_rule.values().sum()
    }
}

pub struct ContrastOutput {
    pub vectors: Vec<FeatureVector>,
    pub stats: ContrastStats,
}

/// Applies the configured contrast rules to candidate pairs. Comparators are
/// resolved once, when the contraster is built.
pub struct PairContraster {
    rules: Vec<CompiledRule>,
}

impl PairContraster {
    pub fn new(
        rules: &[ContrastRuleConfig],
        registry: &ComparatorRegistry,
    ) -> Result<Self, ConfigError> {
        let rules = rules
            .iter()
            .map(|rule| {
                Ok(CompiledRule {
                    name: rule.name.clone(),
                    attribute: rule.attribute.clone(),
                    fallback: Fallback::from_rule(rule),
                    comparator: registry.build(rule)?,
                })
            })
            .collect::<Result<Vec<_>, ConfigError>>()?;
        Ok(Self { rules })
    }

    /// Rule names, in feature-vector order.
    pub fn feature_names(&self) -> Vec<String> {
        self.rules.iter().map(|r| r.name.clone()).collect()
    }

    pub fn contrast_pair(&self, pair: CandidatePair, left: &Record, right: &Record) -> FeatureVector {
        self.contrast_with_issues(pair, left, right).0
    }

    fn contrast_with_issues(
        &self,
        pair: CandidatePair,
        left: &Record,
        right: &Record,
    ) -> (FeatureVector, Vec<(usize, FeatureIssue)>) {
        let mut issues = Vec::new();
        let distances = self
            .rules
            .iter()
            .enumerate()
            .map(|(idx, rule)| {
                let (l, r) = match (left.get(&rule.attribute), right.get(&rule.attribute)) {
                    (Some(l), Some(r)) => (l, r),
                    _ => {
                        issues.push((idx, FeatureIssue::Missing));
                        return rule.fallback.value();
                    }
                };
                let result = rule.comparator.distance(l, r).and_then(|d| {
                    if d.is_nan() {
                        Err(ContrastError::InvalidDistance {
                            rule: rule.name.clone(),
                            distance: d,
                        })
                    } else {
                        Ok(d.clamp(0.0, 1.0))
                    }
                });
                match result {
                    Ok(d) => Some(d),
                    Err(e) => {
                        debug!(
                            "Contrast '{}' failed for {} / {}: {}",
                            rule.name, left.record_id, right.record_id, e
                        );
                        issues.push((idx, FeatureIssue::Failed(e)));
                        rule.fallback.value()
                    }
                }
            })
            .collect();
        (FeatureVector { pair, distances }, issues)
    }

    /// Contrasts every pair on `pool`. Output order follows `pairs`.
    pub fn contrast_all(
        &self,
        records: &RecordSet,
        pairs: &[CandidatePair],
        pool: &WorkerPool,
        progress: Option<&ProgressBar>,
    ) -> ContrastOutput {
        let results: Vec<(FeatureVector, Vec<(usize, FeatureIssue)>)> = pool.install(|| {
            pairs
                .par_iter()
                .filter_map(|pair| {
                    let (left, right) = pair.records(records)?;
                    let out = self.contrast_with_issues(*pair, left, right);
                    if let Some(pb) = progress {
                        pb.inc(1);
                    }
                    Some(out)
                })
                .collect()
        });

        let mut stats = ContrastStats {
            pairs: results.len(),
            ..ContrastStats::default()
        };
        let mut vectors = Vec::with_capacity(results.len());
        for (vector, issues) in results {
            for (idx, issue) in issues {
                let name = self.rules[idx].name.clone();
                match issue {
                    FeatureIssue::Missing => *stats.missing_by_rule.entry(name).or_insert(0) += 1,
                    FeatureIssue::Failed(e) => {
                        *stats.failures_by_rule.entry(name).or_insert(0) += 1;
                        if stats.failure_samples.len() < MAX_FAILURE_SAMPLES {
                            stats.failure_samples.push(e.to_string());
                        }
                    }
                }
            }
            vectors.push(vector);
        }
        ContrastOutput { vectors, stats }
    }
}
