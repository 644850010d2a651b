// src/models/matching.rs

use serde::Serialize;

use crate::models::records::{Record, RecordSet};

/// Unordered pair of record positions, stored with the lower index first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct CandidatePair {
    pub left: usize,
    pub right: usize,
}

impl CandidatePair {
    /// Returns `None` for a record paired with itself.
    pub fn new(a: usize, b: usize) -> Option<Self> {
        match a.cmp(&b) {
            std::cmp::Ordering::Less => Some(Self { left: a, right: b }),
            std::cmp::Ordering::Greater => Some(Self { left: b, right: a }),
            std::cmp::Ordering::Equal => None,
        }
    }

    pub fn records<'a>(&self, records: &'a RecordSet) -> Option<(&'a Record, &'a Record)> {
        Some((records.get(self.left)?, records.get(self.right)?))
    }

    pub fn record_ids<'a>(&self, records: &'a RecordSet) -> Option<(&'a str, &'a str)> {
        let (l, r) = self.records(records)?;
        Some((l.record_id.as_str(), r.record_id.as_str()))
    }
}

/// Per-feature distances for one candidate pair. Positions follow the order of
/// the configured contrast rules; `None` marks a skipped feature.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureVector {
    pub pair: CandidatePair,
    pub distances: Vec<Option<f64>>,
}

impl FeatureVector {
    pub fn present(&self) -> impl Iterator<Item = (usize, f64)> + '_ {
        self.distances
            .iter()
            .enumerate()
            .filter_map(|(i, d)| d.map(|d| (i, d)))
    }

    /// Distance for a named feature, looked up through the rule names.
    pub fn get(&self, feature_names: &[String], name: &str) -> Option<f64> {
        let idx = feature_names.iter().position(|n| n == name)?;
        self.distances.get(idx).copied().flatten()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pair_is_normalized() {
        assert_eq!(
            CandidatePair::new(5, 2),
            Some(CandidatePair { left: 2, right: 5 })
        );
        assert_eq!(CandidatePair::new(3, 3), None);
    }

    #[test]
    fn test_feature_lookup_by_name() {
        let names = vec!["first".to_string(), "last".to_string()];
        let fv = FeatureVector {
            pair: CandidatePair { left: 0, right: 1 },
            distances: vec![Some(0.25), None],
        };
        assert_eq!(fv.get(&names, "first"), Some(0.25));
        assert_eq!(fv.get(&names, "last"), None);
        assert_eq!(fv.get(&names, "dob"), None);
        assert_eq!(fv.present().count(), 1);
    }
}
