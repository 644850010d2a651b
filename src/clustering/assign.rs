// src/clustering/assign.rs

use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::clustering::dbscan::NOISE;
use crate::error::ClusteringError;
use crate::models::RecordSet;

/// SHA-256 (hex) of the sorted member record ids, each prefixed with its
/// byte length so no id can spell out a different membership.
pub fn matched_id_for(member_ids: &[&str]) -> String {
    let mut ids = member_ids.to_vec();
    ids.sort_unstable();
    let mut hasher = Sha256::new();
    for id in ids {
        hasher.update((id.len() as u64).to_be_bytes());
        hasher.update(id.as_bytes());
    }
    hex::encode(hasher.finalize())
}

/// Summary figures for job metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ClusterSummary {
    pub records: usize,
    pub clusters: usize,
    pub multi_record_clusters: usize,
    pub noise_records: usize,
    pub largest_cluster: usize,
}

/// `record_id -> matched_id` for every record of one job.
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterAssignment {
    /// `(record_id, matched_id)` in record order.
    assignments: Vec<(String, String)>,
    index: HashMap<String, usize>,
    summary: ClusterSummary,
}

impl ClusterAssignment {
    /// Turns algorithm labels into matched ids. Each noise record becomes its
    /// own singleton entity.
    pub fn from_labels(records: &RecordSet, labels: &[i64]) -> Result<Self, ClusteringError> {
        if labels.len() != records.len() {
            return Err(ClusteringError::LabelCount {
                expected: records.len(),
                actual: labels.len(),
            });
        }

        let mut members: BTreeMap<i64, Vec<&str>> = BTreeMap::new();
        let mut noise_records = 0;
        for (record, &label) in records.iter().zip(labels) {
            if label == NOISE {
                noise_records += 1;
            } else {
                members.entry(label).or_default().push(record.record_id.as_str());
            }
        }
        let cluster_ids: BTreeMap<i64, String> = members
            .iter()
            .map(|(label, ids)| (*label, matched_id_for(ids)))
            .collect();

        let mut assignments = Vec::with_capacity(records.len());
        let mut index = HashMap::with_capacity(records.len());
        for (pos, (record, &label)) in records.iter().zip(labels).enumerate() {
            let matched_id = match cluster_ids.get(&label) {
                Some(id) => id.clone(),
                None => matched_id_for(&[record.record_id.as_str()]),
            };
            index.insert(record.record_id.clone(), pos);
            assignments.push((record.record_id.clone(), matched_id));
        }

        let summary = ClusterSummary {
            records: records.len(),
            clusters: members.len() + noise_records,
            multi_record_clusters: members.values().filter(|m| m.len() > 1).count(),
            noise_records,
            largest_cluster: members
                .values()
                .map(|m| m.len())
                .max()
                .unwrap_or(usize::from(noise_records > 0)),
        };

        Ok(Self {
            assignments,
            index,
            summary,
        })
    }

    pub fn get(&self, record_id: &str) -> Option<&str> {
        self.index
            .get(record_id)
            .map(|&pos| self.assignments[pos].1.as_str())
    }

    /// Matched id of the record at `position`.
    pub fn at(&self, position: usize) -> Option<&str> {
        self.assignments.get(position).map(|(_, m)| m.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.assignments
            .iter()
            .map(|(r, m)| (r.as_str(), m.as_str()))
    }

    pub fn len(&self) -> usize {
        self.assignments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assignments.is_empty()
    }

    pub fn distinct_count(&self) -> usize {
        self.assignments
            .iter()
            .map(|(_, m)| m.as_str())
            .collect::<BTreeSet<_>>()
            .len()
    }

    /// Groups of record ids sharing a matched id.
    pub fn partition(&self) -> BTreeSet<BTreeSet<String>> {
        let mut groups: BTreeMap<&str, BTreeSet<String>> = BTreeMap::new();
        for (record_id, matched_id) in &self.assignments {
            groups
                .entry(matched_id.as_str())
                .or_default()
                .insert(record_id.clone());
        }
        groups.into_values().collect()
    }

    pub fn summary(&self) -> &ClusterSummary {
        &self.summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Record;

    fn records(ids: &[&str]) -> RecordSet {
        RecordSet::new(ids.iter().map(|id| Record::new(*id, "t")).collect()).unwrap()
    }

    #[test]
    fn test_noise_gets_singleton_ids() {
        let set = records(&["t:1", "t:2", "t:3", "t:4"]);
        let assignment = ClusterAssignment::from_labels(&set, &[0, NOISE, 0, NOISE]).unwrap();

        assert_eq!(assignment.len(), 4);
        assert_eq!(assignment.get("t:1"), assignment.get("t:3"));
        assert_ne!(assignment.get("t:2"), assignment.get("t:4"));
        assert_eq!(assignment.distinct_count(), 3);
        assert_eq!(assignment.get("t:2"), Some(matched_id_for(&["t:2"]).as_str()));

        let summary = assignment.summary();
        assert_eq!(summary.noise_records, 2);
        assert_eq!(summary.clusters, 3);
        assert_eq!(summary.largest_cluster, 2);
    }

    #[test]
    fn test_ids_depend_on_membership_not_labels() {
        let set = records(&["t:1", "t:2", "t:3"]);
        let a = ClusterAssignment::from_labels(&set, &[0, 0, 1]).unwrap();
        let b = ClusterAssignment::from_labels(&set, &[5, 5, 2]).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.get("t:1"), Some(matched_id_for(&["t:2", "t:1"]).as_str()));
        assert_eq!(a.partition().len(), 2);
    }

    #[test]
    fn test_id_with_separator_does_not_collide_with_cluster() {
        let singleton = matched_id_for(&["t:1\nt:2"]);
        let pair = matched_id_for(&["t:1", "t:2"]);
        assert_ne!(singleton, pair);
        assert_eq!(pair, matched_id_for(&["t:2", "t:1"]));
    }

    #[test]
    fn test_label_count_mismatch() {
        let set = records(&["t:1", "t:2"]);
        assert!(matches!(
            ClusterAssignment::from_labels(&set, &[0]),
            Err(ClusteringError::LabelCount { expected: 2, actual: 1 })
        ));
    }
}
