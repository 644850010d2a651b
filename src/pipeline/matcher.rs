// src/pipeline/matcher.rs
//! The matching core: blocking, contrast, aggregation and clustering over a
//! preprocessed record set. No I/O happens here.

use indicatif::ProgressBar;

use crate::candidate_generation::{BlockingOutput, CandidatePairGenerator, KeyExtractorRegistry};
use crate::clustering::{ClusterAssignment, DistanceAggregator, EntityClusterer, SparseDistanceMatrix};
use crate::config::{ClustererConfig, MatcherConfig};
use crate::error::{ClusteringError, ConfigError};
use crate::matching::{ComparatorRegistry, ContrastOutput, PairContraster};
use crate::models::{CandidatePair, FeatureVector, RecordSet};
use crate::utils::worker_pool::WorkerPool;

pub struct Matcher {
    generator: CandidatePairGenerator,
    contraster: PairContraster,
    aggregator: DistanceAggregator,
    clusterer: ClustererConfig,
}

impl Matcher {
    /// Resolves every blocking key and comparator name against the given
    /// registries.
    pub fn new(
        config: &MatcherConfig,
        key_extractors: &KeyExtractorRegistry,
        comparators: &ComparatorRegistry,
    ) -> Result<Self, ConfigError> {
        let generator = CandidatePairGenerator::new(&config.blocking_rules, key_extractors)?;
        let contraster = PairContraster::new(&config.contrasts, comparators)?;
        let aggregator = DistanceAggregator::new(config, &contraster.feature_names());
        Ok(Self {
            generator,
            contraster,
            aggregator,
            clusterer: config.clusterer.clone(),
        })
    }

    pub fn blocking_rule_names(&self) -> Vec<String> {
        self.generator.rule_names()
    }

    pub fn feature_names(&self) -> Vec<String> {
        self.contraster.feature_names()
    }

    pub fn block(&self, records: &RecordSet, pool: &WorkerPool) -> BlockingOutput {
        self.generator.generate(records, pool)
    }

    pub fn contrast(
        &self,
        records: &RecordSet,
        pairs: &[CandidatePair],
        pool: &WorkerPool,
        progress: Option<&ProgressBar>,
    ) -> ContrastOutput {
        self.contraster.contrast_all(records, pairs, pool, progress)
    }

    pub fn aggregate(&self, n_records: usize, vectors: &[FeatureVector]) -> SparseDistanceMatrix {
        self.aggregator.build_matrix(n_records, vectors)
    }

    /// Clustering parameters are validated here, so a bad value fails the
    /// job at the cluster stage.
    pub fn cluster(
        &self,
        records: &RecordSet,
        distances: &SparseDistanceMatrix,
    ) -> Result<ClusterAssignment, ClusteringError> {
        EntityClusterer::from_config(&self.clusterer)?.cluster(records, distances)
    }

    /// All matching stages in one call.
    pub fn block_and_match(
        &self,
        records: &RecordSet,
        pool: &WorkerPool,
    ) -> Result<ClusterAssignment, ClusteringError> {
        let blocking = self.block(records, pool);
        let contrast = self.contrast(records, &blocking.pairs, pool, None);
        let distances = self.aggregate(records.len(), &contrast.vectors);
        self.cluster(records, &distances)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Record;

    fn person(id: &str, first: &str, last: &str, dob: &str) -> Record {
        Record::new(id, "people")
            .with_attribute("first_name", first)
            .with_attribute("last_name", last)
            .with_attribute("dob", dob)
            .with_attribute("dob_year", &dob[..4])
    }

    fn matcher(config: &MatcherConfig) -> Matcher {
        Matcher::new(config, &KeyExtractorRegistry::default(), &ComparatorRegistry::default()).unwrap()
    }

    #[test]
    fn test_block_and_match_links_close_records() {
        let records = RecordSet::new(vec![
            person("p:1", "jonathan", "smith", "1980-04-01"),
            person("p:2", "jonathon", "smith", "1980-04-01"),
            person("p:3", "maria", "garcia", "1975-10-12"),
            person("p:4", "jonathan", "smith", "1951-02-02"),
        ])
        .unwrap();
        let mut config = MatcherConfig::default();
        config.clusterer.args.eps = 0.1;
        let pool = WorkerPool::new(2, "matcher-test").unwrap();

        let assignment = matcher(&config).block_and_match(&records, &pool).unwrap();
        assert_eq!(assignment.get("p:1"), assignment.get("p:2"));
        assert_ne!(assignment.get("p:1"), assignment.get("p:3"));
        assert_ne!(assignment.get("p:1"), assignment.get("p:4"));
        assert_eq!(assignment.distinct_count(), 3);
    }

    #[test]
    fn test_unknown_strategy_fails_construction() {
        let mut config = MatcherConfig::default();
        config.blocking_rules[0].keys[0].method = "metaphone".to_string();
        assert!(matches!(
            Matcher::new(&config, &KeyExtractorRegistry::default(), &ComparatorRegistry::default()),
            Err(ConfigError::UnknownKeyMethod { .. })
        ));
    }

    #[test]
    fn test_invalid_clustering_params_fail_at_cluster() {
        let mut config = MatcherConfig::default();
        config.clusterer.args.min_samples = 0;
        let m = matcher(&config);
        let records = RecordSet::new(vec![person("p:1", "ann", "lee", "1990-01-01")]).unwrap();
        let distances = m.aggregate(records.len(), &[]);
        assert!(matches!(
            m.cluster(&records, &distances),
            Err(ClusteringError::InvalidParameter { name: "min_samples", .. })
        ));
    }
}
