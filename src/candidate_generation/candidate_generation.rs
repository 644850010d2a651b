// src/candidate_generation/candidate_generation.rs

use log::{debug, warn};
use rayon::prelude::*;
use serde::Serialize;
use std::collections::HashMap;

use crate::candidate_generation::key_extractors::{KeyExtractor, KeyExtractorRegistry};
use crate::config::BlockingRuleConfig;
use crate::error::ConfigError;
use crate::models::{CandidatePair, Record, RecordSet};
use crate::utils::worker_pool::WorkerPool;

// ASCII unit separator between composite key parts.
const KEY_SEPARATOR: char = '\u{1f}';

struct CompiledKey {
    attribute: String,
    extractor: Box<dyn KeyExtractor>,
}

struct CompiledBlockingRule {
    name: String,
    keys: Vec<CompiledKey>,
    max_block_size: Option<usize>,
}

impl CompiledBlockingRule {
    /// Composite key, or `None` when any key part is null or underivable.
    fn key_for(&self, record: &Record) -> Option<String> {
        let mut key = String::new();
        for (i, part) in self.keys.iter().enumerate() {
            let value = part.extractor.extract(record.get(&part.attribute)?)?;
            if i > 0 {
                key.push(KEY_SEPARATOR);
            }
            key.push_str(&value);
        }
        Some(key)
    }
}

/// Per-rule blocking statistics, reported in job metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BlockingStats {
    pub rule: String,
    pub blocks: usize,
    pub largest_block: usize,
    /// Pairs emitted by this rule before the cross-rule union.
    pub pairs: usize,
    pub skipped_blocks: usize,
    /// Records without a derivable key for this rule.
    pub excluded_records: usize,
}

#[derive(Debug, Clone, Default)]
pub struct BlockingOutput {
    /// Deduplicated union over all rules, sorted.
    pub pairs: Vec<CandidatePair>,
    pub stats: Vec<BlockingStats>,
}

/// Groups records into blocks per rule and emits the pairs within each block.
pub struct CandidatePairGenerator {
    rules: Vec<CompiledBlockingRule>,
}

impl CandidatePairGenerator {
    pub fn new(
        rules: &[BlockingRuleConfig],
        registry: &KeyExtractorRegistry,
    ) -> Result<Self, ConfigError> {
        let mut compiled = Vec::with_capacity(rules.len());
        for rule in rules {
            let keys = rule
                .keys
                .iter()
                .map(|key| {
                    Ok(CompiledKey {
                        attribute: key.attribute.clone(),
                        extractor: registry.build(&rule.name, key)?,
                    })
                })
                .collect::<Result<Vec<_>, ConfigError>>()?;
            compiled.push(CompiledBlockingRule {
                name: rule.name.clone(),
                keys,
                max_block_size: rule.max_block_size,
            });
        }
        Ok(Self { rules: compiled })
    }

    pub fn rule_names(&self) -> Vec<String> {
        self.rules.iter().map(|r| r.name.clone()).collect()
    }

    /// Record positions grouped by derived key. Blocks are ordered by their
    /// first member so output does not depend on hash order.
    fn blocks_for_rule(rule: &CompiledBlockingRule, records: &RecordSet) -> (Vec<Vec<usize>>, usize) {
        let mut blocks: HashMap<String, Vec<usize>> = HashMap::new();
        let mut excluded = 0;
        for (idx, record) in records.iter().enumerate() {
            match rule.key_for(record) {
                Some(key) => blocks.entry(key).or_default().push(idx),
                None => excluded += 1,
            }
        }
        let mut blocks: Vec<Vec<usize>> = blocks.into_values().collect();
        blocks.sort_by_key(|b| b[0]);
        (blocks, excluded)
    }

    fn pairs_for_rule(
        rule: &CompiledBlockingRule,
        records: &RecordSet,
    ) -> (Vec<CandidatePair>, BlockingStats) {
        let (blocks, excluded) = Self::blocks_for_rule(rule, records);
        let mut stats = BlockingStats {
            rule: rule.name.clone(),
            blocks: blocks.len(),
            largest_block: blocks.iter().map(|b| b.len()).max().unwrap_or(0),
            excluded_records: excluded,
            ..BlockingStats::default()
        };

        let kept: Vec<&Vec<usize>> = blocks
            .iter()
            .filter(|block| match rule.max_block_size {
                Some(max) if block.len() > max => {
                    warn!(
                        "Blocking rule '{}': skipping block of {} records (max_block_size {})",
                        rule.name,
                        block.len(),
                        max
                    );
                    false
                }
                _ => true,
            })
            .collect();
        stats.skipped_blocks = blocks.len() - kept.len();

        let pairs: Vec<CandidatePair> = kept
            .par_iter()
            .flat_map_iter(|block| {
                block.iter().enumerate().flat_map(move |(i, &a)| {
                    block[i + 1..]
                        .iter()
                        .filter_map(move |&b| CandidatePair::new(a, b))
                })
            })
            .collect();
        stats.pairs = pairs.len();

        debug!(
            "Blocking rule '{}': {} blocks (largest {}), {} pairs, {} skipped, {} records without key",
            stats.rule,
            stats.blocks,
            stats.largest_block,
            stats.pairs,
            stats.skipped_blocks,
            stats.excluded_records
        );
        (pairs, stats)
    }

    /// Candidate pairs for `records`: the deduplicated union over all rules.
    pub fn generate(&self, records: &RecordSet, pool: &WorkerPool) -> BlockingOutput {
        let per_rule: Vec<(Vec<CandidatePair>, BlockingStats)> = pool.install(|| {
            self.rules
                .par_iter()
                .map(|rule| Self::pairs_for_rule(rule, records))
                .collect()
        });

        let mut pairs = Vec::with_capacity(per_rule.iter().map(|(p, _)| p.len()).sum());
        let mut stats = Vec::with_capacity(per_rule.len());
        for (rule_pairs, rule_stats) in per_rule {
            pairs.extend(rule_pairs);
            stats.push(rule_stats);
        }
        pairs.par_sort_unstable();
        pairs.dedup();

        BlockingOutput { pairs, stats }
    }
}
