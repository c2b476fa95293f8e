//! Configuration for market data fetching

use crate::error::{MarketError, Result};
use std::time::Duration;

/// Environment variable holding the FRED API key
pub const FRED_API_KEY_ENV: &str = "FRED_API_KEY";
/// Environment variable holding the Alpha Vantage API key
pub const ALPHA_VANTAGE_API_KEY_ENV: &str = "ALPHA_VANTAGE_API_KEY";

/// Configuration for [`crate::MarketDataFetcher`]
///
/// Providers without an API key are skipped and their categories fall back
/// to reference values.
#[derive(Debug, Clone)]
pub struct MarketConfig {
    /// FRED API key (optional)
    pub fred_api_key: Option<String>,

    /// Alpha Vantage API key (optional)
    pub alpha_vantage_api_key: Option<String>,

    /// Request timeout duration
    pub request_timeout: Duration,

    /// FRED requests per minute
    pub fred_rate_limit: u32,

    /// Alpha Vantage requests per minute (5 on the free tier)
    pub alpha_vantage_rate_limit: u32,

    /// How long fetched series stay cached
    pub cache_ttl: Duration,
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            fred_api_key: None,
            alpha_vantage_api_key: None,
            request_timeout: Duration::from_secs(30),
            fred_rate_limit: 120,
            alpha_vantage_rate_limit: 5,
            cache_ttl: Duration::from_secs(300), // 5 minutes
        }
    }
}

impl MarketConfig {
    /// Create a new configuration builder
    pub fn builder() -> MarketConfigBuilder {
        MarketConfigBuilder::default()
    }

    /// Fill missing API keys from the environment
    pub fn with_env_api_keys(mut self) -> Self {
        if self.fred_api_key.is_none() {
            self.fred_api_key = non_empty_env(FRED_API_KEY_ENV);
        }
        if self.alpha_vantage_api_key.is_none() {
            self.alpha_vantage_api_key = non_empty_env(ALPHA_VANTAGE_API_KEY_ENV);
        }
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.request_timeout.is_zero() {
            return Err(MarketError::ConfigError(
                "request_timeout must be greater than 0".to_string(),
            ));
        }

        if self.fred_rate_limit == 0 || self.alpha_vantage_rate_limit == 0 {
            return Err(MarketError::ConfigError(
                "rate limits must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Builder for MarketConfig
#[derive(Debug, Default)]
pub struct MarketConfigBuilder {
    fred_api_key: Option<String>,
    alpha_vantage_api_key: Option<String>,
    request_timeout: Option<Duration>,
    fred_rate_limit: Option<u32>,
    alpha_vantage_rate_limit: Option<u32>,
    cache_ttl: Option<Duration>,
}

impl MarketConfigBuilder {
    /// Set FRED API key
    pub fn fred_api_key(mut self, key: impl Into<String>) -> Self {
        self.fred_api_key = Some(key.into());
        self
    }

    /// Set Alpha Vantage API key
    pub fn alpha_vantage_api_key(mut self, key: impl Into<String>) -> Self {
        self.alpha_vantage_api_key = Some(key.into());
        self
    }

    /// Set request timeout
    pub fn request_timeout(mut self, duration: Duration) -> Self {
        self.request_timeout = Some(duration);
        self
    }

    /// Set FRED requests per minute
    pub fn fred_rate_limit(mut self, per_minute: u32) -> Self {
        self.fred_rate_limit = Some(per_minute);
        self
    }

    /// Set Alpha Vantage requests per minute
    pub fn alpha_vantage_rate_limit(mut self, per_minute: u32) -> Self {
        self.alpha_vantage_rate_limit = Some(per_minute);
        self
    }

    /// Set cache TTL
    pub fn cache_ttl(mut self, duration: Duration) -> Self {
        self.cache_ttl = Some(duration);
        self
    }

    /// Build the configuration
    pub fn build(self) -> Result<MarketConfig> {
        let defaults = MarketConfig::default();

        let config = MarketConfig {
            fred_api_key: self.fred_api_key,
            alpha_vantage_api_key: self.alpha_vantage_api_key,
            request_timeout: self.request_timeout.unwrap_or(defaults.request_timeout),
            fred_rate_limit: self.fred_rate_limit.unwrap_or(defaults.fred_rate_limit),
            alpha_vantage_rate_limit: self
                .alpha_vantage_rate_limit
                .unwrap_or(defaults.alpha_vantage_rate_limit),
            cache_ttl: self.cache_ttl.unwrap_or(defaults.cache_ttl),
        };

        config.validate()?;
        Ok(config)
    }
}
