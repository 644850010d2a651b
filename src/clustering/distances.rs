// src/clustering/distances.rs

use std::collections::BTreeMap;

use crate::config::{AggregationMethod, MatcherConfig};
use crate::models::{CandidatePair, FeatureVector};

/// Distance for a pair with no usable features.
pub const NO_EVIDENCE_DISTANCE: f64 = 1.0;

/// Aggregated distances for the candidate pairs of one record set. Pairs that
/// were never blocked together are absent and read as infinitely far apart.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SparseDistanceMatrix {
    n_records: usize,
    entries: BTreeMap<(usize, usize), f64>,
}

impl SparseDistanceMatrix {
    pub fn new(n_records: usize) -> Self {
        Self {
            n_records,
            entries: BTreeMap::new(),
        }
    }

    /// Stores the distance for a pair, keeping the smaller value if the pair
    /// is already present. Pairs outside the record range are ignored.
    pub fn insert(&mut self, pair: CandidatePair, distance: f64) {
        if pair.right >= self.n_records {
            return;
        }
        self.entries
            .entry((pair.left, pair.right))
            .and_modify(|d| *d = d.min(distance))
            .or_insert(distance);
    }

    /// Distance between two records; a record is at distance 0 from itself.
    pub fn get(&self, a: usize, b: usize) -> Option<f64> {
        if a == b {
            return (a < self.n_records).then_some(0.0);
        }
        let pair = CandidatePair::new(a, b)?;
        self.entries.get(&(pair.left, pair.right)).copied()
    }

    /// Like `get`, with absent pairs at infinity.
    pub fn distance(&self, a: usize, b: usize) -> f64 {
        self.get(a, b).unwrap_or(f64::INFINITY)
    }

    pub fn n_records(&self) -> usize {
        self.n_records
    }

    /// Number of stored pairs.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (CandidatePair, f64)> + '_ {
        self.entries
            .iter()
            .map(|(&(left, right), &d)| (CandidatePair { left, right }, d))
    }

    /// Pairs with distance <= eps.
    pub fn within(&self, eps: f64) -> impl Iterator<Item = (CandidatePair, f64)> + '_ {
        self.iter().filter(move |(_, d)| *d <= eps)
    }
}

/// Combines feature vectors into scalar distances.
#[derive(Debug, Clone)]
pub struct DistanceAggregator {
    method: AggregationMethod,
    weights: Vec<f64>,
    total_weight: f64,
}

impl DistanceAggregator {
    /// `feature_names` gives the feature order of the vectors to aggregate.
    pub fn new(config: &MatcherConfig, feature_names: &[String]) -> Self {
        let weights: Vec<f64> = feature_names.iter().map(|n| config.weight_for(n)).collect();
        Self {
            method: config.aggregation.method,
            total_weight: weights.iter().sum(),
            weights,
        }
    }

    pub fn aggregate(&self, vector: &FeatureVector) -> f64 {
        let present: Vec<(f64, f64)> = vector
            .present()
            .map(|(i, d)| (self.weights.get(i).copied().unwrap_or(1.0), d))
            .collect();
        if present.is_empty() {
            return NO_EVIDENCE_DISTANCE;
        }

        match self.method {
            AggregationMethod::Max => present.iter().map(|(_, d)| *d).fold(0.0, f64::max),
            AggregationMethod::WeightedAverage | AggregationMethod::WeightedSum => {
                let present_weight: f64 = present.iter().map(|(w, _)| w).sum();
                if present_weight <= 0.0 {
                    return NO_EVIDENCE_DISTANCE;
                }
                let weighted: f64 = present.iter().map(|(w, d)| w * d).sum();
                match self.method {
                    // Missing features are scaled up to the full weight so
                    // they never pull a pair closer.
                    AggregationMethod::WeightedSum => weighted * self.total_weight / present_weight,
                    _ => weighted / present_weight,
                }
            }
        }
    }

    pub fn build_matrix(&self, n_records: usize, vectors: &[FeatureVector]) -> SparseDistanceMatrix {
        let mut matrix = SparseDistanceMatrix::new(n_records);
        for vector in vectors {
            matrix.insert(vector.pair, self.aggregate(vector));
        }
        matrix
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap as Map;

    fn config(method: AggregationMethod, weights: &[(&str, f64)]) -> MatcherConfig {
        let mut config = MatcherConfig::default();
        config.aggregation.method = method;
        config.aggregation.weights = weights
            .iter()
            .map(|(n, w)| (n.to_string(), *w))
            .collect::<Map<_, _>>();
        config
    }

    fn names() -> Vec<String> {
        vec!["first_name".into(), "last_name".into(), "dob".into()]
    }

    fn vector(distances: Vec<Option<f64>>) -> FeatureVector {
        FeatureVector {
            pair: CandidatePair { left: 0, right: 1 },
            distances,
        }
    }

    #[test]
    fn test_weighted_sum_rescales_missing_features() {
        let cfg = config(
            AggregationMethod::WeightedSum,
            &[("first_name", 0.5), ("last_name", 0.25), ("dob", 0.25)],
        );
        let agg = DistanceAggregator::new(&cfg, &names());
        let full = agg.aggregate(&vector(vec![Some(0.2), Some(0.4), Some(0.0)]));
        assert!((full - 0.2).abs() < 1e-12);

        // Without dob the remaining 0.75 of weight is scaled to 1.0.
        let partial = agg.aggregate(&vector(vec![Some(0.2), Some(0.4), None]));
        assert!((partial - 0.2 / 0.75).abs() < 1e-12);
        assert!(partial > full);
    }

    #[test]
    fn test_weighted_average_and_max() {
        let avg = DistanceAggregator::new(
            &config(AggregationMethod::WeightedAverage, &[("first_name", 3.0)]),
            &names(),
        );
        let d = avg.aggregate(&vector(vec![Some(0.0), Some(1.0), None]));
        assert!((d - 0.25).abs() < 1e-12);

        let max = DistanceAggregator::new(&config(AggregationMethod::Max, &[]), &names());
        assert_eq!(max.aggregate(&vector(vec![Some(0.1), None, Some(0.7)])), 0.7);
    }

    #[test]
    fn test_no_features_means_no_evidence() {
        for method in [
            AggregationMethod::WeightedSum,
            AggregationMethod::WeightedAverage,
            AggregationMethod::Max,
        ] {
            let agg = DistanceAggregator::new(&config(method, &[]), &names());
            assert_eq!(agg.aggregate(&vector(vec![None, None, None])), NO_EVIDENCE_DISTANCE);
        }
    }

    #[test]
    fn test_sparse_matrix_lookup() {
        let mut m = SparseDistanceMatrix::new(3);
        m.insert(CandidatePair::new(2, 0).unwrap(), 0.4);
        m.insert(CandidatePair::new(0, 2).unwrap(), 0.3);
        m.insert(CandidatePair { left: 1, right: 7 }, 0.1);

        assert_eq!(m.len(), 1);
        assert_eq!(m.get(2, 0), Some(0.3));
        assert_eq!(m.get(1, 1), Some(0.0));
        assert_eq!(m.get(0, 1), None);
        assert_eq!(m.distance(0, 1), f64::INFINITY);
        assert_eq!(m.within(0.3).count(), 1);
        assert_eq!(m.within(0.29).count(), 0);
    }
}
