// src/candidate_generation/key_extractors.rs

use std::collections::HashMap;
use std::sync::Arc;

use crate::config::BlockingKeyConfig;
use crate::error::ConfigError;
use crate::matching::name::soundex;
use crate::matching::values::date_parts;

const DEFAULT_PREFIX_LENGTH: usize = 3;

/// Derives a blocking key part from one non-blank attribute value. `None`
/// means the value yields no key and the record stays out of the rule's
/// blocks.
pub trait KeyExtractor: Send + Sync {
    fn extract(&self, value: &str) -> Option<String>;
}

pub type KeyExtractorFactory =
    Arc<dyn Fn(&str, &BlockingKeyConfig) -> Result<Box<dyn KeyExtractor>, ConfigError> + Send + Sync>;

/// Lowercase alphanumeric tokens separated by single spaces.
fn normalize_key(value: &str) -> String {
    value
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

fn non_empty(value: String) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

pub struct ExactKey;

impl KeyExtractor for ExactKey {
    fn extract(&self, value: &str) -> Option<String> {
        non_empty(value.trim().to_string())
    }
}

pub struct NormalizedKey;

impl KeyExtractor for NormalizedKey {
    fn extract(&self, value: &str) -> Option<String> {
        non_empty(normalize_key(value))
    }
}

pub struct SoundexKey;

impl KeyExtractor for SoundexKey {
    fn extract(&self, value: &str) -> Option<String> {
        soundex(value)
    }
}

/// First `length` characters of the normalized value, spaces removed.
pub struct PrefixKey {
    length: usize,
}

impl KeyExtractor for PrefixKey {
    fn extract(&self, value: &str) -> Option<String> {
        let prefix: String = normalize_key(value)
            .chars()
            .filter(|c| !c.is_whitespace())
            .take(self.length)
            .collect();
        non_empty(prefix)
    }
}

/// Year of a date value. A bare four-digit value is taken as a year already.
pub struct YearKey;

impl KeyExtractor for YearKey {
    fn extract(&self, value: &str) -> Option<String> {
        let trimmed = value.trim();
        if trimmed.len() == 4 && trimmed.chars().all(|c| c.is_ascii_digit()) {
            return Some(trimmed.to_string());
        }
        date_parts(trimmed).map(|(year, _, _)| year.to_string())
    }
}

pub struct DigitsKey;

impl KeyExtractor for DigitsKey {
    fn extract(&self, value: &str) -> Option<String> {
        non_empty(value.chars().filter(|c| c.is_ascii_digit()).collect())
    }
}

pub struct KeyExtractorRegistry {
    factories: HashMap<String, KeyExtractorFactory>,
}

impl Default for KeyExtractorRegistry {
    fn default() -> Self {
        let mut registry = Self {
            factories: HashMap::new(),
        };
        registry.register("exact", |_, _| Ok(Box::new(ExactKey)));
        registry.register("normalized", |_, _| Ok(Box::new(NormalizedKey)));
        registry.register("soundex", |_, _| Ok(Box::new(SoundexKey)));
        registry.register("prefix", |rule, key| {
            let length = key.length.unwrap_or(DEFAULT_PREFIX_LENGTH);
            if length == 0 {
                return Err(ConfigError::Invalid(format!(
                    "blocking rule '{}': prefix length for '{}' must be at least 1",
                    rule, key.attribute
                )));
            }
            Ok(Box::new(PrefixKey { length }))
        });
        registry.register("year", |_, _| Ok(Box::new(YearKey)));
        registry.register("digits", |_, _| Ok(Box::new(DigitsKey)));
        registry
    }
}

impl KeyExtractorRegistry {
    /// Adds or replaces the factory for `method`. The factory receives the
    /// owning rule's name and the key configuration.
    pub fn register<F>(&mut self, method: &str, factory: F)
    where
        F: Fn(&str, &BlockingKeyConfig) -> Result<Box<dyn KeyExtractor>, ConfigError>
            + Send
            + Sync
            + 'static,
    {
        self.factories.insert(method.to_string(), Arc::new(factory));
    }

    pub fn build(
        &self,
        rule_name: &str,
        key: &BlockingKeyConfig,
    ) -> Result<Box<dyn KeyExtractor>, ConfigError> {
        let factory = self
            .factories
            .get(&key.method)
            .ok_or_else(|| ConfigError::UnknownKeyMethod {
                rule: rule_name.to_string(),
                method: key.method.clone(),
            })?;
        factory(rule_name, key)
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

    fn extractor(method: &str, length: Option<usize>) -> Box<dyn KeyExtractor> {
        let key = BlockingKeyConfig {
            attribute: "value".to_string(),
            method: method.to_string(),
            length,
        };
        KeyExtractorRegistry::default().build("rule", &key).unwrap()
    }

    #[test]
    fn test_builtin_extractors() {
        assert_eq!(extractor("exact", None).extract(" Smith "), Some("Smith".into()));
        assert_eq!(
            extractor("normalized", None).extract("O'Neil-Smith"),
            Some("o neil smith".into())
        );
        assert_eq!(extractor("soundex", None).extract("Robert"), Some("R163".into()));
        assert_eq!(extractor("prefix", Some(2)).extract("Jonathan"), Some("jo".into()));
        assert_eq!(extractor("prefix", None).extract("Al"), Some("al".into()));
        assert_eq!(extractor("year", None).extract("1985-03-07"), Some("1985".into()));
        assert_eq!(extractor("year", None).extract("1985"), Some("1985".into()));
        assert_eq!(
            extractor("digits", None).extract("(555) 010-2000"),
            Some("5550102000".into())
        );
    }

    #[test]
    fn test_underivable_values_yield_no_key() {
        assert_eq!(extractor("soundex", None).extract("1234"), None);
        assert_eq!(extractor("year", None).extract("sometime"), None);
        assert_eq!(extractor("digits", None).extract("n/a"), None);
        assert_eq!(extractor("normalized", None).extract("--"), None);
    }

    #[test]
    fn test_builtin_methods_are_listed() {
        let mut registry = KeyExtractorRegistry::default();
        assert_eq!(
            registry.methods(),
            vec!["digits", "exact", "normalized", "prefix", "soundex", "year"]
        );
        registry.register("upper", |_, _| Ok(Box::new(ExactKey)));
        assert!(registry.methods().contains(&"upper".to_string()));
    }

    #[test]
    fn test_unknown_and_invalid_methods() {
        let registry = KeyExtractorRegistry::default();
        let key = BlockingKeyConfig {
            attribute: "value".to_string(),
            method: "metaphone".to_string(),
            length: None,
        };
        assert!(matches!(
            registry.build("r", &key),
            Err(ConfigError::UnknownKeyMethod { .. })
        ));

        let key = BlockingKeyConfig {
            attribute: "value".to_string(),
            method: "prefix".to_string(),
            length: Some(0),
        };
        assert!(matches!(registry.build("r", &key), Err(ConfigError::Invalid(_))));
    }
}
