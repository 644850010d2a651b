// src/matching/comparators.rs
//! Comparator strategies for contrast rules.
//!
//! Rules name their comparator by `method`; the registry maps that name to a
//! factory which builds one comparator per rule when the matcher is
//! constructed. Nothing is looked up per pair.

use std::collections::HashMap;
use std::sync::Arc;
use strsim::{jaro_winkler, normalized_damerau_levenshtein, normalized_levenshtein};

use crate::config::ContrastRuleConfig;
use crate::error::{ConfigError, ContrastError};
use crate::matching::name::canonical_person_name;
use crate::matching::values::{parse_date, parse_number};

const DEFAULT_DATE_SCALE_DAYS: f64 = 365.0;
const DEFAULT_NUMERIC_SCALE: f64 = 1.0;

/// Distance between two present, non-blank values. 0.0 means identical,
/// 1.0 means no similarity.
pub trait Comparator: Send + Sync {
    fn distance(&self, left: &str, right: &str) -> Result<f64, ContrastError>;
}

pub type ComparatorFactory =
    Arc<dyn Fn(&ContrastRuleConfig) -> Result<Box<dyn Comparator>, ConfigError> + Send + Sync>;

pub struct ExactComparator {
    case_insensitive: bool,
}

impl Comparator for ExactComparator {
    fn distance(&self, left: &str, right: &str) -> Result<f64, ContrastError> {
        let equal = if self.case_insensitive {
            left.trim().to_lowercase() == right.trim().to_lowercase()
        } else {
            left.trim() == right.trim()
        };
        Ok(if equal { 0.0 } else { 1.0 })
    }
}

#[derive(Debug, Clone, Copy)]
pub enum StringMetric {
    JaroWinkler,
    Levenshtein,
    DamerauLevenshtein,
}

pub struct StringSimilarityComparator {
    metric: StringMetric,
}

impl Comparator for StringSimilarityComparator {
    fn distance(&self, left: &str, right: &str) -> Result<f64, ContrastError> {
        let l = left.trim().to_lowercase();
        let r = right.trim().to_lowercase();
        let similarity = match self.metric {
            StringMetric::JaroWinkler => jaro_winkler(&l, &r),
            StringMetric::Levenshtein => normalized_levenshtein(&l, &r),
            StringMetric::DamerauLevenshtein => normalized_damerau_levenshtein(&l, &r),
        };
        Ok(1.0 - similarity)
    }
}

/// Jaro-Winkler on canonical person names (titles, suffixes and nicknames
/// resolved first).
pub struct PersonNameComparator {
    rule: String,
}

impl Comparator for PersonNameComparator {
    fn distance(&self, left: &str, right: &str) -> Result<f64, ContrastError> {
        let l = canonical_person_name(left);
        let r = canonical_person_name(right);
        if l.is_empty() {
            return Err(ContrastError::Unparseable {
                rule: self.rule.clone(),
                value: left.to_string(),
            });
        }
        if r.is_empty() {
            return Err(ContrastError::Unparseable {
                rule: self.rule.clone(),
                value: right.to_string(),
            });
        }
        Ok(1.0 - jaro_winkler(&l, &r))
    }
}

/// `|a - b| / scale`, capped at 1.0.
pub struct NumericComparator {
    rule: String,
    scale: f64,
}

impl Comparator for NumericComparator {
    fn distance(&self, left: &str, right: &str) -> Result<f64, ContrastError> {
        let parse = |value: &str| {
            parse_number(value).ok_or_else(|| ContrastError::Unparseable {
                rule: self.rule.clone(),
                value: value.to_string(),
            })
        };
        let (a, b) = (parse(left)?, parse(right)?);
        Ok(((a - b).abs() / self.scale).min(1.0))
    }
}

/// Day difference divided by `scale` days, capped at 1.0.
pub struct DateComparator {
    rule: String,
    scale_days: f64,
}

impl Comparator for DateComparator {
    fn distance(&self, left: &str, right: &str) -> Result<f64, ContrastError> {
        let parse = |value: &str| {
            parse_date(value).ok_or_else(|| ContrastError::Unparseable {
                rule: self.rule.clone(),
                value: value.to_string(),
            })
        };
        let (a, b) = (parse(left)?, parse(right)?);
        let days = (a - b).num_days().abs() as f64;
        Ok((days / self.scale_days).min(1.0))
    }
}

pub struct ComparatorRegistry {
    factories: HashMap<String, ComparatorFactory>,
}

impl Default for ComparatorRegistry {
    fn default() -> Self {
        let mut registry = Self {
            factories: HashMap::new(),
        };
        registry.register("exact", |_| Ok(Box::new(ExactComparator { case_insensitive: false })));
        registry.register("normalized_exact", |_| {
            Ok(Box::new(ExactComparator { case_insensitive: true }))
        });
        registry.register("jaro_winkler", |_| {
            Ok(Box::new(StringSimilarityComparator {
                metric: StringMetric::JaroWinkler,
            }))
        });
        registry.register("levenshtein", |_| {
            Ok(Box::new(StringSimilarityComparator {
                metric: StringMetric::Levenshtein,
            }))
        });
        registry.register("damerau_levenshtein", |_| {
            Ok(Box::new(StringSimilarityComparator {
                metric: StringMetric::DamerauLevenshtein,
            }))
        });
        registry.register("name", |rule| {
            Ok(Box::new(PersonNameComparator {
                rule: rule.name.clone(),
            }))
        });
        registry.register("numeric", |rule| {
            Ok(Box::new(NumericComparator {
                rule: rule.name.clone(),
                scale: rule.scale.unwrap_or(DEFAULT_NUMERIC_SCALE),
            }))
        });
        registry.register("date", |rule| {
            Ok(Box::new(DateComparator {
                rule: rule.name.clone(),
                scale_days: rule.scale.unwrap_or(DEFAULT_DATE_SCALE_DAYS),
            }))
        });
        registry
    }
}

impl ComparatorRegistry {
    /// Adds or replaces the factory for `method`.
    pub fn register<F>(&mut self, method: &str, factory: F)
    where
        F: Fn(&ContrastRuleConfig) -> Result<Box<dyn Comparator>, ConfigError> + Send + Sync + 'static,
    {
        self.factories.insert(method.to_string(), Arc::new(factory));
    }

    pub fn build(&self, rule: &ContrastRuleConfig) -> Result<Box<dyn Comparator>, ConfigError> {
        let factory = self
            .factories
            .get(&rule.method)
            .ok_or_else(|| ConfigError::UnknownComparator {
                rule: rule.name.clone(),
                method: rule.method.clone(),
            })?;
        factory(rule)
    }

    pub fn methods(&self) -> Vec<String> {
        let mut names: Vec<String> = self.factories.keys().cloned().collect();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MissingValuePolicy;

    fn rule(method: &str, scale: Option<f64>) -> ContrastRuleConfig {
        ContrastRuleConfig {
            name: format!("{}_rule", method),
            attribute: "value".to_string(),
            method: method.to_string(),
            scale,
            missing: MissingValuePolicy::Max,
            default_distance: None,
        }
    }

    fn build(method: &str, scale: Option<f64>) -> Box<dyn Comparator> {
        ComparatorRegistry::default().build(&rule(method, scale)).unwrap()
    }

    #[test]
    fn test_exact_comparators() {
        let exact = build("exact", None);
        assert_eq!(exact.distance("Smith", "Smith").unwrap(), 0.0);
        assert_eq!(exact.distance("Smith", "smith").unwrap(), 1.0);

        let normalized = build("normalized_exact", None);
        assert_eq!(normalized.distance("Smith ", "smith").unwrap(), 0.0);
    }

    #[test]
    fn test_string_metrics_in_range() {
        for method in ["jaro_winkler", "levenshtein", "damerau_levenshtein"] {
            let cmp = build(method, None);
            assert_eq!(cmp.distance("martha", "MARTHA").unwrap(), 0.0, "{}", method);
            let d = cmp.distance("martha", "marhta").unwrap();
            assert!(d > 0.0 && d < 0.5, "{} gave {}", method, d);
            let far = cmp.distance("martha", "zzz").unwrap();
            assert!(far > d && far <= 1.0, "{} gave {}", method, far);
        }
    }

    #[test]
    fn test_name_comparator_resolves_nicknames() {
        let cmp = build("name", None);
        assert_eq!(cmp.distance("Bill", "William").unwrap(), 0.0);
        assert!(matches!(
            cmp.distance("...", "William"),
            Err(ContrastError::Unparseable { .. })
        ));
    }

    #[test]
    fn test_numeric_comparator() {
        let cmp = build("numeric", Some(10.0));
        assert_eq!(cmp.distance("20", "25").unwrap(), 0.5);
        assert_eq!(cmp.distance("20", "95").unwrap(), 1.0);
        assert!(matches!(
            cmp.distance("twenty", "25"),
            Err(ContrastError::Unparseable { value, .. }) if value == "twenty"
        ));
    }

    #[test]
    fn test_date_comparator() {
        let cmp = build("date", Some(10.0));
        assert_eq!(cmp.distance("2020-01-01", "01/06/2020").unwrap(), 0.5);
        assert_eq!(cmp.distance("2020-01-01", "2021-01-01").unwrap(), 1.0);
        assert!(cmp.distance("2020-01-01", "not a date").is_err());
    }

    #[test]
    fn test_unknown_method_is_config_error() {
        let registry = ComparatorRegistry::default();
        match registry.build(&rule("soundex_distance", None)) {
            Err(ConfigError::UnknownComparator { method, .. }) => {
                assert_eq!(method, "soundex_distance")
            }
            _ => panic!("expected unknown comparator"),
        }
    }

    #[test]
    fn test_custom_registration() {
        struct AlwaysHalf;
        impl Comparator for AlwaysHalf {
            fn distance(&self, _: &str, _: &str) -> Result<f64, ContrastError> {
                Ok(0.5)
            }
        }
        let mut registry = ComparatorRegistry::default();
        registry.register("half", |_| Ok(Box::new(AlwaysHalf)));
        let cmp = registry.build(&rule("half", None)).unwrap();
        assert_eq!(cmp.distance("a", "b").unwrap(), 0.5);
        assert!(registry.methods().contains(&"half".to_string()));
    }
}
