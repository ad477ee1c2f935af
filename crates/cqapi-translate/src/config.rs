//! Configuration types for the translator.

use std::time::Duration;

use cqapi_query::DatasetRules;

/// Configuration for the translator.
///
/// # Example
///
/// ```rust
/// use cqapi_query::DatasetRules;
/// use cqapi_translate::{CacheConfig, TranslatorConfig};
///
/// let config = TranslatorConfig::builder()
///     .with_rules(DatasetRules::builder().with_known_dataset("kv_2021").build())
///     .with_cache(CacheConfig::default())
///     .with_parallel(true)
///     .build();
/// assert!(config.cache.is_some());
/// ```
#[derive(Debug, Clone, Default)]
pub struct TranslatorConfig {
    /// Rules recognizing the dataset segment of identifiers.
    pub rules: DatasetRules,
    /// Listing cache configuration (None = caching disabled).
    pub cache: Option<CacheConfig>,
    /// Translate batches in parallel (requires `parallel` feature).
    pub parallel: bool,
}

impl TranslatorConfig {
    /// Creates a new builder for TranslatorConfig.
    pub fn builder() -> TranslatorConfigBuilder {
        TranslatorConfigBuilder::default()
    }
}

/// Builder for TranslatorConfig.
#[derive(Debug, Clone, Default)]
pub struct TranslatorConfigBuilder {
    rules: DatasetRules,
    cache: Option<CacheConfig>,
    parallel: bool,
}

impl TranslatorConfigBuilder {
    /// Sets the dataset rules.
    pub fn with_rules(mut self, rules: DatasetRules) -> Self {
        self.rules = rules;
        self
    }

    /// Enables listing caching with the given configuration.
    pub fn with_cache(mut self, cache: CacheConfig) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Enables or disables parallel batch translation.
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Builds the TranslatorConfig.
    pub fn build(self) -> TranslatorConfig {
        TranslatorConfig {
            rules: self.rules,
            cache: self.cache,
            parallel: self.parallel,
        }
    }
}

/// Configuration for the concept listing cache.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Maximum number of cached listings.
    pub max_entries: usize,
    /// Time-to-live for cached listings.
    pub ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 10_000,
            ttl: Duration::from_secs(300),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_translator_config_default() {
        let config = TranslatorConfig::default();
        assert!(config.cache.is_none());
        assert!(!config.parallel);
        assert!(config.rules.is_dataset("dataset1"));
    }

    #[test]
    fn test_translator_config_builder() {
        let config = TranslatorConfig::builder()
            .with_rules(DatasetRules::builder().with_known_dataset("kv_2021").build())
            .with_cache(CacheConfig {
                max_entries: 16,
                ttl: Duration::from_secs(5),
            })
            .with_parallel(true)
            .build();

        assert!(config.rules.is_dataset("kv_2021"));
        assert_eq!(config.cache.map(|c| c.max_entries), Some(16));
        assert!(config.parallel);
    }

    #[test]
    fn test_cache_config_default() {
        let cache = CacheConfig::default();
        assert_eq!(cache.max_entries, 10_000);
        assert_eq!(cache.ttl, Duration::from_secs(300));
    }
}
