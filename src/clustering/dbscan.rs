// src/clustering/dbscan.rs
//! Density clustering over a sparse distance matrix.
//!
//! Both algorithms work on the eps-graph: one node per record and an edge for
//! every stored pair with distance <= eps. Labels are cluster numbers in
//! order of discovery; `-1` marks noise.

use log::debug;
use petgraph::graph::{NodeIndex, UnGraph};
use petgraph::unionfind::UnionFind;
use rayon::prelude::*;
use std::collections::HashMap;

use crate::clustering::distances::SparseDistanceMatrix;
use crate::config::ClusteringParams;
use crate::error::ClusteringError;
use crate::utils::worker_pool::WorkerPool;

pub const NOISE: i64 = -1;

pub trait DensityClusteringAlgorithm: Send + Sync {
    fn name(&self) -> &'static str;

    /// One label per record, in record order.
    fn fit(
        &self,
        distances: &SparseDistanceMatrix,
        eps: f64,
        min_samples: usize,
    ) -> Result<Vec<i64>, ClusteringError>;
}

fn check_fit_params(eps: f64, min_samples: usize) -> Result<(), ClusteringError> {
    if !eps.is_finite() || eps < 0.0 {
        return Err(ClusteringError::InvalidParameter {
            name: "eps",
            reason: format!("must be a finite, non-negative number (got {})", eps),
        });
    }
    if min_samples == 0 {
        return Err(ClusteringError::InvalidParameter {
            name: "min_samples",
            reason: "must be at least 1".to_string(),
        });
    }
    Ok(())
}

/// Builds the eps-graph. Node `i` is record `i`.
pub fn eps_graph(distances: &SparseDistanceMatrix, eps: f64) -> UnGraph<usize, f64> {
    let n = distances.n_records();
    let mut graph = UnGraph::with_capacity(n, distances.len());
    for i in 0..n {
        graph.add_node(i);
    }
    for (pair, d) in distances.within(eps) {
        graph.add_edge(NodeIndex::new(pair.left), NodeIndex::new(pair.right), d);
    }
    graph
}

/// DBSCAN with scikit-learn semantics on a precomputed metric.
#[derive(Debug)]
pub struct Dbscan {
    n_jobs: usize,
}

impl Dbscan {
    pub fn new(n_jobs: usize) -> Self {
        Self { n_jobs: n_jobs.max(1) }
    }

    /// Sorted neighbourhood of each record, itself included.
    fn neighbourhoods(&self, graph: &UnGraph<usize, f64>) -> Result<Vec<Vec<usize>>, ClusteringError> {
        let build = |idx: usize| {
            let mut hood: Vec<usize> = graph
                .neighbors(NodeIndex::new(idx))
                .map(|n| n.index())
                .collect();
            hood.push(idx);
            hood.sort_unstable();
            hood.dedup();
            hood
        };
        let n = graph.node_count();
        if self.n_jobs == 1 {
            return Ok((0..n).map(build).collect());
        }
        let pool = WorkerPool::new(self.n_jobs, "dbscan").map_err(|e| {
            ClusteringError::InvalidParameter {
                name: "n_jobs",
                reason: e.to_string(),
            }
        })?;
        Ok(pool.install(|| (0..n).into_par_iter().map(build).collect()))
    }
}

impl DensityClusteringAlgorithm for Dbscan {
    fn name(&self) -> &'static str {
        "dbscan"
    }

    fn fit(
        &self,
        distances: &SparseDistanceMatrix,
        eps: f64,
        min_samples: usize,
    ) -> Result<Vec<i64>, ClusteringError> {
        check_fit_params(eps, min_samples)?;
        let graph = eps_graph(distances, eps);
        let hoods = self.neighbourhoods(&graph)?;
        let is_core: Vec<bool> = hoods.iter().map(|h| h.len() >= min_samples).collect();

        let mut labels = vec![NOISE; hoods.len()];
        let mut next_label: i64 = 0;
        let mut stack = Vec::new();
        for start in 0..hoods.len() {
            if labels[start] != NOISE || !is_core[start] {
                continue;
            }
            labels[start] = next_label;
            stack.push(start);
            while let Some(current) = stack.pop() {
                // Only core records extend the cluster; border records join it.
                if !is_core[current] {
                    continue;
                }
                for &neighbour in &hoods[current] {
                    if labels[neighbour] == NOISE {
                        labels[neighbour] = next_label;
                        stack.push(neighbour);
                    }
                }
            }
            next_label += 1;
        }

        debug!(
            "DBSCAN: {} records, {} eps-edges, {} core, {} clusters, {} noise",
            hoods.len(),
            graph.edge_count(),
            is_core.iter().filter(|c| **c).count(),
            next_label,
            labels.iter().filter(|l| **l == NOISE).count()
        );
        Ok(labels)
    }
}

/// Connected components of the eps-graph. Components smaller than
/// `min_samples` are noise, so `min_samples = 1` labels every record and
/// matches DBSCAN exactly.
#[derive(Debug, Default)]
pub struct ConnectedComponents;

impl DensityClusteringAlgorithm for ConnectedComponents {
    fn name(&self) -> &'static str {
        "connected_components"
    }

    fn fit(
        &self,
        distances: &SparseDistanceMatrix,
        eps: f64,
        min_samples: usize,
    ) -> Result<Vec<i64>, ClusteringError> {
        check_fit_params(eps, min_samples)?;
        let n = distances.n_records();
        let mut components = UnionFind::<usize>::new(n);
        for (pair, _) in distances.within(eps) {
            components.union(pair.left, pair.right);
        }
        let roots = components.into_labeling();

        let mut sizes: HashMap<usize, usize> = HashMap::new();
        for root in &roots {
            *sizes.entry(*root).or_insert(0) += 1;
        }

        let mut label_of_root: HashMap<usize, i64> = HashMap::new();
        let mut labels = Vec::with_capacity(n);
        for root in &roots {
            if sizes[root] < min_samples {
                labels.push(NOISE);
                continue;
            }
            let next = label_of_root.len() as i64;
            labels.push(*label_of_root.entry(*root).or_insert(next));
        }
        Ok(labels)
    }
}

pub const ALGORITHMS: [&str; 2] = ["dbscan", "connected_components"];

/// Resolves a clusterer `method` name.
pub fn algorithm_by_name(
    name: &str,
    params: &ClusteringParams,
) -> Result<Box<dyn DensityClusteringAlgorithm>, ClusteringError> {
    match name {
        "dbscan" => Ok(Box::new(Dbscan::new(params.n_jobs))),
        "connected_components" => Ok(Box::new(ConnectedComponents)),
        other => Err(ClusteringError::UnknownAlgorithm(other.to_string())),
    }
}
