//! Error types for market data operations

use thiserror::Error;

/// Market data errors
///
/// These never leave [`crate::MarketDataSource::fetch_all`]; the fetcher
/// logs them and falls back per category.
#[derive(Debug, Error)]
pub enum MarketError {
    /// API request failed
    #[error("API error: {0}")]
    ApiError(String),

    /// Data not available for the requested series
    #[error("Data not available for {series}: {reason}")]
    DataUnavailable { series: String, reason: String },

    /// Rate limit exceeded for API
    #[error("Rate limit exceeded for {provider}")]
    RateLimitExceeded { provider: String },

    /// Network or HTTP error
    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Alpha Vantage API error
    #[error("Alpha Vantage error: {0}")]
    AlphaVantageError(String),

    /// Provider not configured (missing API key)
    #[error("{0} is not configured")]
    NotConfigured(&'static str),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Result type alias for market data operations
pub type Result<T> = std::result::Result<T, MarketError>;

/// Convert MarketError to yensense_core::Error
impl From<MarketError> for yensense_core::Error {
    fn from(err: MarketError) -> Self {
        yensense_core::Error::Fetch {
            category: "market_data".to_string(),
            reason: err.to_string(),
        }
    }
}
