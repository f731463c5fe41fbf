//! Outbound client and retry configuration.

use std::time::Duration;

use serde::Deserialize;

/// Estimated catalog size used to pick random offsets.
pub const DEFAULT_CATALOG_SIZE_HINT: u64 = 21_349;

/// Catalog HTTP API, as seen by the random-movie picker.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CatalogClientConfig {
    /// Base URL of the catalog service.
    pub url: String,
    /// Approximate number of movies in the catalog.
    pub size_hint: u64,
    pub request_timeout_ms: u64,
}

impl Default for CatalogClientConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:3002".to_string(),
            size_hint: DEFAULT_CATALOG_SIZE_HINT,
            request_timeout_ms: 5_000,
        }
    }
}

impl CatalogClientConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

/// Backoff for broker and database connections.
///
/// Startup connection attempts stop after `max_attempts`; the consumer's
/// reconnect loop uses the same delays but never gives up.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub min_delay_ms: u64,
    pub max_delay_ms: u64,
    pub max_attempts: usize,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            min_delay_ms: 500,
            max_delay_ms: 30_000,
            max_attempts: 10,
        }
    }
}

impl RetryConfig {
    pub fn min_delay(&self) -> Duration {
        Duration::from_millis(self.min_delay_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms.max(self.min_delay_ms))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_defaults() {
        let config = CatalogClientConfig::default();
        assert_eq!(config.url, "http://localhost:3002");
        assert_eq!(config.size_hint, 21_349);
        assert_eq!(config.request_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn test_max_delay_never_below_min() {
        let config = RetryConfig {
            min_delay_ms: 2_000,
            max_delay_ms: 100,
            max_attempts: 3,
        };
        assert_eq!(config.max_delay(), Duration::from_secs(2));
    }
}
