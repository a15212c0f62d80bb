//! Exchange cache configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::DomainError;

/// Configuration for response caching and the background writer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExchangeCacheConfig {
    /// Whether lookups and writes are performed at all
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Exchanges older than this are invisible to lookups
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,

    /// Most-recent rows scanned per lookup
    #[serde(default = "default_scan_limit")]
    pub scan_limit: usize,

    /// Minimum similarity for a near-duplicate hit (inclusive)
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f64,

    /// Retries after the first failed write
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Delay before the first retry; doubles each attempt
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,
}

fn default_enabled() -> bool {
    true
}

fn default_retention_days() -> u32 {
    30
}

fn default_scan_limit() -> usize {
    100
}

fn default_similarity_threshold() -> f64 {
    0.85
}

fn default_max_retries() -> u32 {
    2
}

fn default_backoff_base_ms() -> u64 {
    100
}

impl Default for ExchangeCacheConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            retention_days: default_retention_days(),
            scan_limit: default_scan_limit(),
            similarity_threshold: default_similarity_threshold(),
            max_retries: default_max_retries(),
            backoff_base_ms: default_backoff_base_ms(),
        }
    }
}

impl ExchangeCacheConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Retention window as a chrono duration
    pub fn retention(&self) -> chrono::Duration {
        chrono::Duration::days(i64::from(self.retention_days))
    }

    /// Total write attempts, including the first
    pub fn max_attempts(&self) -> u32 {
        self.max_retries + 1
    }

    /// Backoff before retry number `attempt` (0-based): base * 2^attempt
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let factor = 1u64.checked_shl(attempt).unwrap_or(u64::MAX);
        Duration::from_millis(self.backoff_base_ms.saturating_mul(factor))
    }

    /// Reject values that would silently disable or flood matching
    pub fn validate(&self) -> Result<(), DomainError> {
        if !(0.0..=1.0).contains(&self.similarity_threshold) {
            return Err(DomainError::configuration(format!(
                "cache.similarity_threshold must be within [0, 1], got {}",
                self.similarity_threshold
            )));
        }
        Ok(())
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn with_retention_days(mut self, days: u32) -> Self {
        self.retention_days = days;
        self
    }

    pub fn with_scan_limit(mut self, limit: usize) -> Self {
        self.scan_limit = limit;
        self
    }

    /// Set the similarity threshold, clamped to `[0, 1]`
    pub fn with_similarity_threshold(mut self, threshold: f64) -> Self {
        self.similarity_threshold = threshold.clamp(0.0, 1.0);
        self
    }

    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    pub fn with_backoff_base_ms(mut self, ms: u64) -> Self {
        self.backoff_base_ms = ms;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_threshold_range_is_validated() {
        assert!(ExchangeCacheConfig::default().validate().is_ok());

        for bad in [1.5, -1.0, f64::NAN] {
            let config = ExchangeCacheConfig {
                similarity_threshold: bad,
                ..Default::default()
            };
            assert!(
                matches!(config.validate(), Err(DomainError::Configuration { .. })),
                "{bad}"
            );
        }
    }

    #[test]
    fn test_defaults() {
        let config = ExchangeCacheConfig::default();

        assert!(config.enabled);
        assert_eq!(config.retention_days, 30);
        assert_eq!(config.scan_limit, 100);
        assert_eq!(config.similarity_threshold, 0.85);
        assert_eq!(config.max_retries, 2);
        assert_eq!(config.backoff_base_ms, 100);
        assert_eq!(config.max_attempts(), 3);
    }

    #[test]
    fn test_backoff_doubles() {
        let config = ExchangeCacheConfig::default();

        assert_eq!(config.delay_for_attempt(0), Duration::from_millis(100));
        assert_eq!(config.delay_for_attempt(1), Duration::from_millis(200));
        assert_eq!(config.delay_for_attempt(2), Duration::from_millis(400));
    }

    #[test]
    fn test_backoff_saturates() {
        let config = ExchangeCacheConfig::default();
        assert_eq!(config.delay_for_attempt(80), Duration::from_millis(u64::MAX));
    }

    #[test]
    fn test_builder_clamps_threshold() {
        let config = ExchangeCacheConfig::new()
            .with_similarity_threshold(1.5)
            .with_scan_limit(10)
            .with_retention_days(7);

        assert_eq!(config.similarity_threshold, 1.0);
        assert_eq!(config.scan_limit, 10);
        assert_eq!(config.retention(), chrono::Duration::days(7));
    }

    #[test]
    fn test_deserialize_partial() {
        let config: ExchangeCacheConfig =
            serde_json::from_str(r#"{"similarity_threshold": 0.9}"#).unwrap();

        assert_eq!(config.similarity_threshold, 0.9);
        assert_eq!(config.scan_limit, 100);
    }
}
