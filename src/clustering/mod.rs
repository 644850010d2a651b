// src/clustering/mod.rs
pub mod assign;
pub mod dbscan;
pub mod distances;

pub use assign::{ClusterAssignment, ClusterSummary};
pub use dbscan::{algorithm_by_name, ConnectedComponents, Dbscan, DensityClusteringAlgorithm};
pub use distances::{DistanceAggregator, SparseDistanceMatrix};

use log::info;

use crate::config::{ClustererConfig, ClusteringParams};
use crate::error::ClusteringError;
use crate::models::RecordSet;

/// A configured clustering algorithm plus its parameters.
pub struct EntityClusterer {
    algorithm: Box<dyn DensityClusteringAlgorithm>,
    params: ClusteringParams,
}

impl EntityClusterer {
    /// Validates the parameters and resolves the algorithm by name.
    pub fn from_config(config: &ClustererConfig) -> Result<Self, ClusteringError> {
        config.args.validate()?;
        Ok(Self {
            algorithm: algorithm_by_name(&config.method, &config.args)?,
            params: config.args.clone(),
        })
    }

    pub fn with_algorithm(
        algorithm: Box<dyn DensityClusteringAlgorithm>,
        params: ClusteringParams,
    ) -> Result<Self, ClusteringError> {
        params.validate()?;
        Ok(Self { algorithm, params })
    }

    pub fn algorithm_name(&self) -> &'static str {
        self.algorithm.name()
    }

    pub fn cluster(
        &self,
        records: &RecordSet,
        distances: &SparseDistanceMatrix,
    ) -> Result<ClusterAssignment, ClusteringError> {
        if distances.n_records() != records.len() {
            return Err(ClusteringError::LabelCount {
                expected: records.len(),
                actual: distances.n_records(),
            });
        }
        info!(
            "Clustering {} records over {} scored pairs with {} (eps={}, min_samples={}, algorithm={})",
            records.len(),
            distances.len(),
            self.algorithm.name(),
            self.params.eps,
            self.params.min_samples,
            self.params.algorithm
        );
        let labels = self
            .algorithm
            .fit(distances, self.params.eps, self.params.min_samples)?;
        ClusterAssignment::from_labels(records, &labels)
    }
}
