//! Engine configuration.
//!
//! Every field has a serde default, so a config file only needs to name the
//! settings it changes. Durations are stored as integer seconds or
//! milliseconds to keep JSON and TOML files readable.
use crate::compute::DistanceMetric;
use serde::de::Error;
use std::time::Duration;

/// Top-level configuration for a [`GeoContext`](crate::GeoContext).
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub index: IndexConfig,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub batch: BatchConfig,

    #[serde(default)]
    pub enrichment: EnrichmentConfig,

    #[serde(default)]
    pub webhooks: WebhookConfig,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IndexConfig {
    /// Metric used for exact distance filtering and ordering
    #[serde(default = "IndexConfig::default_metric")]
    pub metric: DistanceMetric,

    /// Activation radius given to imported POI markers
    #[serde(default = "IndexConfig::default_pin_radius_m")]
    pub default_pin_radius_m: f64,
}

impl IndexConfig {
    const fn default_metric() -> DistanceMetric {
        DistanceMetric::Geodesic
    }

    const fn default_pin_radius_m() -> f64 {
        50.0
    }
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            metric: Self::default_metric(),
            default_pin_radius_m: Self::default_pin_radius_m(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CacheConfig {
    /// Store-wide TTL in seconds
    #[serde(default = "CacheConfig::default_ttl_secs")]
    pub default_ttl_secs: u64,

    #[serde(default = "CacheConfig::default_max_entries")]
    pub max_entries: usize,

    /// Background sweep period in seconds, 0 disables the sweeper
    #[serde(default = "CacheConfig::default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

impl CacheConfig {
    const fn default_ttl_secs() -> u64 {
        3600
    }

    const fn default_max_entries() -> usize {
        10_000
    }

    const fn default_sweep_interval_secs() -> u64 {
        300
    }

    pub fn default_ttl(&self) -> Duration {
        Duration::from_secs(self.default_ttl_secs)
    }

    pub fn sweep_interval(&self) -> Option<Duration> {
        (self.sweep_interval_secs > 0).then(|| Duration::from_secs(self.sweep_interval_secs))
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            default_ttl_secs: Self::default_ttl_secs(),
            max_entries: Self::default_max_entries(),
            sweep_interval_secs: Self::default_sweep_interval_secs(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BatchConfig {
    #[serde(default = "BatchConfig::default_max_concurrency")]
    pub max_concurrency: usize,

    #[serde(default = "BatchConfig::default_max_batch_size")]
    pub max_batch_size: usize,
}

impl BatchConfig {
    const fn default_max_concurrency() -> usize {
        5
    }

    const fn default_max_batch_size() -> usize {
        50
    }
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_concurrency: Self::default_max_concurrency(),
            max_batch_size: Self::default_max_batch_size(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EnrichmentConfig {
    /// Upper bound on the distance between path samples
    #[serde(default = "EnrichmentConfig::default_max_sample_interval_m")]
    pub max_sample_interval_m: f64,

    /// Short paths are split into this many intervals
    #[serde(default = "EnrichmentConfig::default_samples_per_route")]
    pub samples_per_route: usize,

    /// Decimal places used for coordinate deduplication (5 ≈ 1.1 m)
    #[serde(default = "EnrichmentConfig::default_dedup_decimals")]
    pub dedup_decimals: u32,

    /// Search radius around each sample when a request gives none
    #[serde(default = "EnrichmentConfig::default_buffer_m")]
    pub default_buffer_m: f64,

    #[serde(default = "EnrichmentConfig::default_max_buffer_m")]
    pub max_buffer_m: f64,

    /// Concurrent POI lookups per route
    #[serde(default = "EnrichmentConfig::default_max_concurrency")]
    pub max_concurrency: usize,
}

impl EnrichmentConfig {
    const fn default_max_sample_interval_m() -> f64 {
        1000.0
    }

    const fn default_samples_per_route() -> usize {
        10
    }

    const fn default_dedup_decimals() -> u32 {
        5
    }

    const fn default_buffer_m() -> f64 {
        500.0
    }

    const fn default_max_buffer_m() -> f64 {
        5000.0
    }

    const fn default_max_concurrency() -> usize {
        5
    }
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            max_sample_interval_m: Self::default_max_sample_interval_m(),
            samples_per_route: Self::default_samples_per_route(),
            dedup_decimals: Self::default_dedup_decimals(),
            default_buffer_m: Self::default_buffer_m(),
            max_buffer_m: Self::default_max_buffer_m(),
            max_concurrency: Self::default_max_concurrency(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WebhookConfig {
    #[serde(default = "WebhookConfig::default_max_attempts")]
    pub max_attempts: u32,

    /// Backoff after failed attempt n is `base_delay_ms * 2^n`
    #[serde(default = "WebhookConfig::default_base_delay_ms")]
    pub base_delay_ms: u64,

    #[serde(default = "WebhookConfig::default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    #[serde(default = "WebhookConfig::default_queue_capacity")]
    pub queue_capacity: usize,

    /// Delivery records kept per webhook
    #[serde(default = "WebhookConfig::default_max_history")]
    pub max_history: usize,

    #[serde(default = "WebhookConfig::default_user_agent")]
    pub user_agent: String,
}

impl WebhookConfig {
    const fn default_max_attempts() -> u32 {
        3
    }

    const fn default_base_delay_ms() -> u64 {
        1000
    }

    const fn default_request_timeout_ms() -> u64 {
        10_000
    }

    const fn default_queue_capacity() -> usize {
        1024
    }

    const fn default_max_history() -> usize {
        1000
    }

    fn default_user_agent() -> String {
        format!("geopin-webhook/{}", crate::VERSION)
    }

    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Delay before the attempt following failed attempt `attempt` (1-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.base_delay()
            .saturating_mul(2u32.saturating_pow(attempt))
    }
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            max_attempts: Self::default_max_attempts(),
            base_delay_ms: Self::default_base_delay_ms(),
            request_timeout_ms: Self::default_request_timeout_ms(),
            queue_capacity: Self::default_queue_capacity(),
            max_history: Self::default_max_history(),
            user_agent: Self::default_user_agent(),
        }
    }
}

impl Config {
    pub fn with_metric(mut self, metric: DistanceMetric) -> Self {
        self.index.metric = metric;
        self
    }

    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache.default_ttl_secs = ttl.as_secs();
        self
    }

    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        assert!(max_concurrency > 0, "Max concurrency must be greater than zero");
        self.batch.max_concurrency = max_concurrency;
        self
    }

    pub fn with_webhooks(mut self, webhooks: WebhookConfig) -> Self {
        self.webhooks = webhooks;
        self
    }

    pub fn validate(&self) -> Result<(), String> {
        if !self.index.default_pin_radius_m.is_finite() || self.index.default_pin_radius_m <= 0.0
        {
            return Err("Default pin radius must be positive".to_string());
        }

        if self.cache.max_entries == 0 {
            return Err("Cache max entries must be greater than zero".to_string());
        }

        if self.batch.max_concurrency == 0 {
            return Err("Batch max concurrency must be greater than zero".to_string());
        }

        if self.batch.max_batch_size == 0 {
            return Err("Batch max size must be greater than zero".to_string());
        }

        if self.enrichment.max_sample_interval_m <= 0.0 || self.enrichment.samples_per_route == 0
        {
            return Err("Enrichment sampling must be positive".to_string());
        }

        if !(self.enrichment.default_buffer_m > 0.0
            && self.enrichment.default_buffer_m <= self.enrichment.max_buffer_m)
        {
            return Err("Default buffer must be positive and within max_buffer_m".to_string());
        }

        if self.enrichment.dedup_decimals > 9 {
            return Err("Dedup decimals must be at most 9".to_string());
        }

        if self.enrichment.max_concurrency == 0 {
            return Err("Enrichment max concurrency must be greater than zero".to_string());
        }

        if self.webhooks.max_attempts == 0 {
            return Err("Webhook max attempts must be greater than zero".to_string());
        }

        if self.webhooks.queue_capacity == 0 {
            return Err("Webhook queue capacity must be greater than zero".to_string());
        }

        Ok(())
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let config: Config = serde_json::from_str(json)?;
        if let Err(e) = config.validate() {
            return Err(Error::custom(e));
        }
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    #[cfg(feature = "toml")]
    pub fn from_toml(toml_str: &str) -> Result<Self, toml::de::Error> {
        let config: Config = toml::from_str(toml_str)?;
        if let Err(e) = config.validate() {
            return Err(toml::de::Error::custom(e));
        }
        Ok(config)
    }

    #[cfg(feature = "toml")]
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.index.metric, DistanceMetric::Geodesic);
        assert_eq!(config.cache.default_ttl(), Duration::from_secs(3600));
        assert_eq!(config.batch.max_concurrency, 5);
        assert_eq!(config.enrichment.dedup_decimals, 5);
        assert_eq!(config.webhooks.max_attempts, 3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_backoff_doubles() {
        let webhooks = WebhookConfig::default();
        assert_eq!(webhooks.backoff(1), Duration::from_secs(2));
        assert_eq!(webhooks.backoff(2), Duration::from_secs(4));
        assert_eq!(webhooks.backoff(3), Duration::from_secs(8));
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = Config::from_json(r#"{"batch": {"max_concurrency": 2}}"#).unwrap();
        assert_eq!(config.batch.max_concurrency, 2);
        assert_eq!(config.batch.max_batch_size, 50);
        assert_eq!(config.webhooks, WebhookConfig::default());
    }

    #[test]
    fn test_invalid_json_rejected() {
        assert!(Config::from_json(r#"{"batch": {"max_concurrency": 0}}"#).is_err());
        assert!(Config::from_json(r#"{"unknown": true}"#).is_err());
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::default()
            .with_metric(DistanceMetric::Haversine)
            .with_max_concurrency(8);

        let json = config.to_json().unwrap();
        let deserialized = Config::from_json(&json).unwrap();
        assert_eq!(deserialized, config);
    }

    #[cfg(feature = "toml")]
    #[test]
    fn test_toml_config() {
        let toml_str = r#"
            [cache]
            default_ttl_secs = 60

            [webhooks]
            max_attempts = 5
        "#;
        let config = Config::from_toml(toml_str).unwrap();
        assert_eq!(config.cache.default_ttl_secs, 60);
        assert_eq!(config.webhooks.max_attempts, 5);
        assert_eq!(config.index, IndexConfig::default());

        let round = Config::from_toml(&config.to_toml().unwrap()).unwrap();
        assert_eq!(round, config);
    }
}
