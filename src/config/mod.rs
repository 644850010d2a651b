// src/config/mod.rs
//! Matcher configuration.
//!
//! One `MatcherConfig` value is loaded at startup and handed to the
//! orchestrator. A snapshot of it, with its fingerprint, is stored in every
//! job's metadata.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use crate::error::{ClusteringError, ConfigError};

fn default_key_method() -> String {
    "exact".to_string()
}

fn default_separator() -> String {
    " ".to_string()
}

fn default_clusterer_method() -> String {
    "dbscan".to_string()
}

fn default_eps() -> f64 {
    0.5
}

fn default_min_samples() -> usize {
    1
}

fn default_neighbor_algorithm() -> String {
    "auto".to_string()
}

fn default_leaf_size() -> usize {
    30
}

fn default_n_jobs() -> usize {
    1
}

/// Neighbour search strategies accepted for `clusterer.args.algorithm`. The
/// distance structure is precomputed and sparse, so every strategy resolves
/// to the same adjacency walk; the name is validated and recorded.
pub const NEIGHBOR_ALGORITHMS: [&str; 4] = ["auto", "ball_tree", "kd_tree", "brute"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatcherConfig {
    /// Attribute columns loaded from every event source.
    pub keys: Vec<String>,
    #[serde(default)]
    pub preprocessing: PreprocessConfig,
    pub blocking_rules: Vec<BlockingRuleConfig>,
    pub contrasts: Vec<ContrastRuleConfig>,
    #[serde(default)]
    pub aggregation: AggregationConfig,
    #[serde(default)]
    pub clusterer: ClustererConfig,
    /// Worker pool size for blocking and contrast. Defaults to the CPU count.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workers: Option<usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PreprocessConfig {
    /// Columns normalized as person names.
    #[serde(default)]
    pub name_columns: Vec<String>,
    /// Date columns split into `<col>_year`, `<col>_month` and `<col>_day`.
    #[serde(default)]
    pub date_columns: Vec<String>,
    #[serde(default)]
    pub combine: Vec<CombineColumnsConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombineColumnsConfig {
    pub name: String,
    pub columns: Vec<String>,
    #[serde(default = "default_separator")]
    pub separator: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockingRuleConfig {
    pub name: String,
    pub keys: Vec<BlockingKeyConfig>,
    /// Blocks larger than this are skipped.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_block_size: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockingKeyConfig {
    pub attribute: String,
    #[serde(default = "default_key_method")]
    pub method: String,
    /// Prefix length for the `prefix` method.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub length: Option<usize>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingValuePolicy {
    /// Maximum distance: no evidence of similarity.
    #[default]
    Max,
    /// Leave the feature out of the vector.
    Skip,
    /// Use the rule's `default_distance`.
    Default,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContrastRuleConfig {
    pub name: String,
    pub attribute: String,
    pub method: String,
    /// Normalization range for `numeric` (units) and `date` (days).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale: Option<f64>,
    #[serde(default)]
    pub missing: MissingValuePolicy,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_distance: Option<f64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregationMethod {
    #[default]
    WeightedSum,
    WeightedAverage,
    Max,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AggregationConfig {
    #[serde(default)]
    pub method: AggregationMethod,
    /// Contrast rule name -> weight. Rules without an entry weigh 1.0.
    #[serde(default)]
    pub weights: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClustererConfig {
    #[serde(default = "default_clusterer_method")]
    pub method: String,
    #[serde(default)]
    pub args: ClusteringParams,
}

impl Default for ClustererConfig {
    fn default() -> Self {
        Self {
            method: default_clusterer_method(),
            args: ClusteringParams::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusteringParams {
    #[serde(default = "default_eps")]
    pub eps: f64,
    #[serde(default = "default_min_samples")]
    pub min_samples: usize,
    #[serde(default = "default_neighbor_algorithm")]
    pub algorithm: String,
    #[serde(default = "default_leaf_size")]
    pub leaf_size: usize,
    #[serde(default = "default_n_jobs")]
    pub n_jobs: usize,
}

impl Default for ClusteringParams {
    fn default() -> Self {
        Self {
            eps: default_eps(),
            min_samples: default_min_samples(),
            algorithm: default_neighbor_algorithm(),
            leaf_size: default_leaf_size(),
            n_jobs: default_n_jobs(),
        }
    }
}

impl ClusteringParams {
    pub fn validate(&self) -> Result<(), ClusteringError> {
        if !self.eps.is_finite() || self.eps < 0.0 {
            return Err(ClusteringError::InvalidParameter {
                name: "eps",
                reason: format!("must be a finite, non-negative number (got {})", self.eps),
            });
        }
        if self.min_samples == 0 {
            return Err(ClusteringError::InvalidParameter {
                name: "min_samples",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.leaf_size == 0 {
            return Err(ClusteringError::InvalidParameter {
                name: "leaf_size",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.n_jobs == 0 {
            return Err(ClusteringError::InvalidParameter {
                name: "n_jobs",
                reason: "must be at least 1".to_string(),
            });
        }
        if !NEIGHBOR_ALGORITHMS.contains(&self.algorithm.as_str()) {
            return Err(ClusteringError::InvalidParameter {
                name: "algorithm",
                reason: format!(
                    "'{}' is not one of {:?}",
                    self.algorithm, NEIGHBOR_ALGORITHMS
                ),
            });
        }
        Ok(())
    }
}

impl Default for MatcherConfig {
    /// Person matching on first name, last name and date of birth.
    fn default() -> Self {
        Self {
            keys: vec![
                "first_name".to_string(),
                "last_name".to_string(),
                "dob".to_string(),
            ],
            preprocessing: PreprocessConfig {
                name_columns: vec!["first_name".to_string(), "last_name".to_string()],
                date_columns: vec!["dob".to_string()],
                combine: Vec::new(),
            },
            blocking_rules: vec![
                BlockingRuleConfig {
                    name: "last_name_soundex_birth_year".to_string(),
                    keys: vec![
                        BlockingKeyConfig {
                            attribute: "last_name".to_string(),
                            method: "soundex".to_string(),
                            length: None,
                        },
                        BlockingKeyConfig {
                            attribute: "dob".to_string(),
                            method: "year".to_string(),
                            length: None,
                        },
                    ],
                    max_block_size: None,
                },
                BlockingRuleConfig {
                    name: "first_name_prefix_dob".to_string(),
                    keys: vec![
                        BlockingKeyConfig {
                            attribute: "first_name".to_string(),
                            method: "prefix".to_string(),
                            length: Some(2),
                        },
                        BlockingKeyConfig {
                            attribute: "dob".to_string(),
                            method: "exact".to_string(),
                            length: None,
                        },
                    ],
                    max_block_size: None,
                },
            ],
            contrasts: vec![
                ContrastRuleConfig {
                    name: "first_name".to_string(),
                    attribute: "first_name".to_string(),
                    method: "jaro_winkler".to_string(),
                    scale: None,
                    missing: MissingValuePolicy::Max,
                    default_distance: None,
                },
                ContrastRuleConfig {
                    name: "last_name".to_string(),
                    attribute: "last_name".to_string(),
                    method: "jaro_winkler".to_string(),
                    scale: None,
                    missing: MissingValuePolicy::Max,
                    default_distance: None,
                },
                ContrastRuleConfig {
                    name: "dob".to_string(),
                    attribute: "dob".to_string(),
                    method: "date".to_string(),
                    scale: Some(365.0),
                    missing: MissingValuePolicy::Default,
                    default_distance: Some(0.5),
                },
            ],
            aggregation: AggregationConfig {
                method: AggregationMethod::WeightedSum,
                weights: BTreeMap::from([
                    ("first_name".to_string(), 0.3),
                    ("last_name".to_string(), 0.4),
                    ("dob".to_string(), 0.3),
                ]),
            },
            clusterer: ClustererConfig::default(),
            workers: None,
        }
    }
}

impl MatcherConfig {
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        let config: MatcherConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&text)
    }

    /// Columns available to blocking and contrast rules: the loaded keys plus
    /// the working columns added by preprocessing.
    pub fn working_columns(&self) -> HashSet<String> {
        let mut columns: HashSet<String> = self.keys.iter().cloned().collect();
        for date_col in &self.preprocessing.date_columns {
            for suffix in ["year", "month", "day"] {
                columns.insert(format!("{}_{}", date_col, suffix));
            }
        }
        for combined in &self.preprocessing.combine {
            columns.insert(combined.name.clone());
        }
        columns
    }

    /// Structural checks. Strategy names are checked when the rules are
    /// resolved against their registries; clustering parameters are checked
    /// by the clusterer.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.keys.is_empty() {
            return Err(ConfigError::Invalid("at least one key column is required".into()));
        }
        if self.blocking_rules.is_empty() {
            return Err(ConfigError::Invalid("at least one blocking rule is required".into()));
        }
        if self.contrasts.is_empty() {
            return Err(ConfigError::Invalid("at least one contrast rule is required".into()));
        }
        if let Some(0) = self.workers {
            return Err(ConfigError::Invalid("workers must be at least 1".into()));
        }

        let keys: HashSet<&String> = self.keys.iter().collect();
        for column in self
            .preprocessing
            .name_columns
            .iter()
            .chain(self.preprocessing.date_columns.iter())
            .chain(self.preprocessing.combine.iter().flat_map(|c| c.columns.iter()))
        {
            if !keys.contains(column) {
                return Err(ConfigError::Invalid(format!(
                    "preprocessing references column '{}' which is not a key",
                    column
                )));
            }
        }

        let available = self.working_columns();
        let mut seen_rules = HashSet::new();
        for rule in &self.blocking_rules {
            if rule.name.trim().is_empty() || !seen_rules.insert(rule.name.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "blocking rule names must be unique and non-empty ('{}')",
                    rule.name
                )));
            }
            if rule.keys.is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "blocking rule '{}' has no keys",
                    rule.name
                )));
            }
            if let Some(max) = rule.max_block_size {
                if max < 2 {
                    return Err(ConfigError::Invalid(format!(
                        "blocking rule '{}': max_block_size must be at least 2",
                        rule.name
                    )));
                }
            }
            for key in &rule.keys {
                if !available.contains(&key.attribute) {
                    return Err(ConfigError::Invalid(format!(
                        "blocking rule '{}' references unknown column '{}'",
                        rule.name, key.attribute
                    )));
                }
            }
        }

        let mut seen_contrasts = HashSet::new();
        for rule in &self.contrasts {
            if rule.name.trim().is_empty() || !seen_contrasts.insert(rule.name.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "contrast rule names must be unique and non-empty ('{}')",
                    rule.name
                )));
            }
            if !available.contains(&rule.attribute) {
                return Err(ConfigError::Invalid(format!(
                    "contrast rule '{}' references unknown column '{}'",
                    rule.name, rule.attribute
                )));
            }
            if let Some(scale) = rule.scale {
                if !scale.is_finite() || scale <= 0.0 {
                    return Err(ConfigError::Invalid(format!(
                        "contrast rule '{}': scale must be positive",
                        rule.name
                    )));
                }
            }
            if rule.missing == MissingValuePolicy::Default {
                match rule.default_distance {
                    Some(d) if (0.0..=1.0).contains(&d) => {}
                    _ => {
                        return Err(ConfigError::Invalid(format!(
                            "contrast rule '{}': missing policy 'default' needs a default_distance in [0, 1]",
                            rule.name
                        )))
                    }
                }
            }
        }

        for (name, weight) in &self.aggregation.weights {
            if !seen_contrasts.contains(name.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "aggregation weight given for unknown contrast rule '{}'",
                    name
                )));
            }
            if !weight.is_finite() || *weight < 0.0 {
                return Err(ConfigError::Invalid(format!(
                    "aggregation weight for '{}' must be a non-negative number",
                    name
                )));
            }
        }
        let total_weight: f64 = self
            .contrasts
            .iter()
            .map(|c| self.weight_for(&c.name))
            .sum();
        if total_weight <= 0.0 {
            return Err(ConfigError::Invalid("aggregation weights sum to zero".into()));
        }

        Ok(())
    }

    pub fn weight_for(&self, contrast_name: &str) -> f64 {
        self.aggregation
            .weights
            .get(contrast_name)
            .copied()
            .unwrap_or(1.0)
    }

    /// Worker count, falling back to the number of CPUs.
    pub fn worker_count(&self) -> usize {
        self.workers.unwrap_or_else(num_cpus::get).max(1)
    }

    /// SHA-256 over the canonical JSON encoding of the configuration.
    pub fn fingerprint(&self) -> String {
        let encoded = serde_json::to_vec(self).unwrap_or_default();
        let mut hasher = Sha256::new();
        hasher.update(&encoded);
        hex::encode(hasher.finalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const YAML: &str = r#"
keys: [first_name, last_name, dob]
preprocessing:
  name_columns: [first_name, last_name]
  date_columns: [dob]
blocking_rules:
  - name: soundex_year
    keys:
      - { attribute: last_name, method: soundex }
      - { attribute: dob_year }
contrasts:
  - { name: first, attribute: first_name, method: jaro_winkler }
  - { name: birth, attribute: dob, method: date, scale: 365, missing: skip }
aggregation:
  method: weighted_average
  weights: { first: 2.0 }
clusterer:
  args:
    eps: 0.25
    min_samples: 2
"#;

    #[test]
    fn test_parse_yaml_with_defaults() {
        let config = MatcherConfig::from_yaml_str(YAML).unwrap();
        assert_eq!(config.blocking_rules[0].keys[1].method, "exact");
        assert_eq!(config.contrasts[1].missing, MissingValuePolicy::Skip);
        assert_eq!(config.contrasts[0].missing, MissingValuePolicy::Max);
        assert_eq!(config.aggregation.method, AggregationMethod::WeightedAverage);
        assert_eq!(config.weight_for("first"), 2.0);
        assert_eq!(config.weight_for("birth"), 1.0);
        assert_eq!(config.clusterer.method, "dbscan");
        assert_eq!(config.clusterer.args.eps, 0.25);
        assert_eq!(config.clusterer.args.leaf_size, 30);
        assert_eq!(config.clusterer.args.algorithm, "auto");
    }

    #[test]
    fn test_default_config_is_valid() {
        let config = MatcherConfig::default();
        config.validate().unwrap();
        config.clusterer.args.validate().unwrap();
    }

    #[test]
    fn test_unknown_column_rejected() {
        let mut config = MatcherConfig::default();
        config.contrasts[0].attribute = "ssn".to_string();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_default_policy_requires_distance() {
        let mut config = MatcherConfig::default();
        config.contrasts[2].default_distance = None;
        assert!(config.validate().is_err());
        config.contrasts[2].default_distance = Some(1.5);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_duplicate_rule_names_rejected() {
        let mut config = MatcherConfig::default();
        let dup = config.blocking_rules[0].clone();
        config.blocking_rules.push(dup);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_clustering_params_validation() {
        let mut params = ClusteringParams::default();
        params.eps = -0.1;
        assert!(params.validate().is_err());
        params.eps = f64::NAN;
        assert!(params.validate().is_err());
        params.eps = 0.0;
        assert!(params.validate().is_ok());
        params.min_samples = 0;
        assert!(params.validate().is_err());
        params.min_samples = 1;
        params.algorithm = "cover_tree".to_string();
        assert!(params.validate().is_err());
    }

    #[test]
    fn test_example_config_file_is_valid() {
        let config =
            MatcherConfig::from_yaml_str(include_str!("../../matcher_config.example.yaml")).unwrap();
        config.clusterer.args.validate().unwrap();
        assert_eq!(config.blocking_rules[0].max_block_size, Some(5000));
        assert!(config.working_columns().contains("full_name"));
    }

    #[test]
    fn test_fingerprint_tracks_content() {
        let a = MatcherConfig::default();
        let mut b = MatcherConfig::default();
        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_eq!(a.fingerprint().len(), 64);
        b.clusterer.args.eps = 0.3;
        assert_ne!(a.fingerprint(), b.fingerprint());
    }
}
