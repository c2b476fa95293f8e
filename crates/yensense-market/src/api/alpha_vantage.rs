//! Alpha Vantage API client (FX rates)

use crate::error::{MarketError, Result};
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use reqwest::Client;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

const BASE_URL: &str = "https://www.alphavantage.co/query";

type SharedRateLimiter = Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>;

/// Alpha Vantage API client
#[derive(Debug, Clone)]
pub struct AlphaVantageClient {
    client: Client,
    api_key: String,
    rate_limiter: SharedRateLimiter,
}

impl AlphaVantageClient {
    /// Create a new Alpha Vantage client
    ///
    /// # Arguments
    /// * `api_key` - Alpha Vantage API key
    /// * `rate_limit` - Maximum requests per minute (5 on the free tier)
    /// * `timeout` - Per-request timeout
    pub fn new(api_key: impl Into<String>, rate_limit: u32, timeout: Duration) -> Result<Self> {
        let quota = Quota::per_minute(NonZeroU32::new(rate_limit).unwrap_or(NonZeroU32::MIN));
        let rate_limiter = Arc::new(RateLimiter::direct(quota));
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            api_key: api_key.into(),
            rate_limiter,
        })
    }

    /// Realtime exchange rate for `from`/`to`
    pub async fn exchange_rate(&self, from: &str, to: &str) -> Result<f64> {
        // Wait for rate limiter
        self.rate_limiter.until_ready().await;

        let params = [
            ("function", "CURRENCY_EXCHANGE_RATE"),
            ("from_currency", from),
            ("to_currency", to),
            ("apikey", self.api_key.as_str()),
        ];

        let response = self.client.get(BASE_URL).query(&params).send().await?;

        if !response.status().is_success() {
            return Err(MarketError::AlphaVantageError(format!(
                "HTTP error: {}",
                response.status()
            )));
        }

        let data: serde_json::Value = response.json().await?;
        parse_exchange_rate(&data)
    }
}

fn parse_exchange_rate(data: &serde_json::Value) -> Result<f64> {
    // Check for API error messages
    if let Some(error) = data.get("Error Message") {
        return Err(MarketError::AlphaVantageError(error.to_string()));
    }

    if data.get("Note").is_some() || data.get("Information").is_some() {
        return Err(MarketError::RateLimitExceeded {
            provider: "Alpha Vantage".to_string(),
        });
    }

    data.get("Realtime Currency Exchange Rate")
        .and_then(|rate| rate.get("5. Exchange Rate"))
        .and_then(serde_json::Value::as_str)
        .and_then(|rate| rate.parse::<f64>().ok())
        .ok_or_else(|| {
            MarketError::AlphaVantageError("Missing exchange rate in response".to_string())
        })
}
