//! Federal Reserve Economic Data (FRED) API client
//!
//! API Key: Free registration at https://fred.stlouisfed.org/docs/api/api_key.html
//! Rate Limit: 120 requests per minute

use crate::error::{MarketError, Result};
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

type SharedRateLimiter = Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>;

const FRED_BASE_URL: &str = "https://api.stlouisfed.org/fred";

/// How many recent observations to scan for a numeric value
const LATEST_LOOKBACK: u32 = 10;

/// FRED series used by the pipeline
pub mod series {
    /// Japanese Yen to one U.S. Dollar (daily)
    pub const USD_JPY: &str = "DEXJPUS";
    /// U.S. Dollars to one Euro (daily)
    pub const EUR_USD: &str = "DEXUSEU";
    /// Nominal broad U.S. Dollar index
    pub const DOLLAR_INDEX: &str = "DTWEXBGS";

    /// Japan CPI inflation
    pub const JAPAN_CPI: &str = "FPCPITOTLZGJPN";
    /// Japan real GDP
    pub const JAPAN_GDP: &str = "JPNRGDPEXP";
    /// U.S. nominal GDP
    pub const US_GDP: &str = "GDP";

    /// Treasury constant-maturity yields as (tenor, series id)
    pub const TREASURY_CURVE: [(&str, &str); 11] = [
        ("1m", "DGS1MO"),
        ("3m", "DGS3MO"),
        ("6m", "DGS6MO"),
        ("1y", "DGS1"),
        ("2y", "DGS2"),
        ("3y", "DGS3"),
        ("5y", "DGS5"),
        ("7y", "DGS7"),
        ("10y", "DGS10"),
        ("20y", "DGS20"),
        ("30y", "DGS30"),
    ];
}

/// Observation data from a FRED series
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Observation {
    /// Date of observation (YYYY-MM-DD)
    pub date: String,
    /// Value ("." for missing data)
    pub value: String,
}

impl Observation {
    /// Numeric value, `None` for FRED's "." placeholder
    pub fn parsed(&self) -> Option<ParsedObservation> {
        self.value.parse::<f64>().ok().map(|value| ParsedObservation {
            date: self.date.clone(),
            value,
        })
    }
}

/// Observation with numeric value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedObservation {
    pub date: String,
    pub value: f64,
}

#[derive(Debug, Clone, Deserialize)]
struct ObservationsResponse {
    observations: Vec<Observation>,
}

/// FRED API client
#[derive(Clone)]
pub struct FredClient {
    client: Client,
    api_key: String,
    rate_limiter: SharedRateLimiter,
}

impl FredClient {
    /// Create a new FRED client
    ///
    /// # Arguments
    /// * `api_key` - FRED API key
    /// * `rate_limit` - Requests per minute
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

    /// Get the most recent observations for a series, newest first
    pub async fn get_observations(&self, series_id: &str, limit: u32) -> Result<Vec<Observation>> {
        self.rate_limiter.until_ready().await;

        let limit = limit.to_string();
        let params = [
            ("series_id", series_id),
            ("api_key", self.api_key.as_str()),
            ("file_type", "json"),
            ("sort_order", "desc"),
            ("limit", limit.as_str()),
        ];

        let url = format!("{FRED_BASE_URL}/series/observations");
        let response = self
            .client
            .get(&url)
            .query(&params)
            .send()
            .await
            .map_err(|e| MarketError::ApiError(format!("FRED request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(MarketError::ApiError(format!(
                "FRED API error for {series_id}: {}",
                response.status()
            )));
        }

        let data: ObservationsResponse = response
            .json()
            .await
            .map_err(|e| MarketError::ApiError(format!("Failed to parse FRED response: {e}")))?;

        Ok(data.observations)
    }

    /// Latest numeric value for a series, skipping missing-data placeholders
    pub async fn get_latest(&self, series_id: &str) -> Result<ParsedObservation> {
        let observations = self.get_observations(series_id, LATEST_LOOKBACK).await?;
        latest_numeric(&observations).ok_or_else(|| MarketError::DataUnavailable {
            series: series_id.to_string(),
            reason: "no numeric observations".to_string(),
        })
    }
}

fn latest_numeric(observations: &[Observation]) -> Option<ParsedObservation> {
    observations.iter().find_map(Observation::parsed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn obs(date: &str, value: &str) -> Observation {
        Observation {
            date: date.to_string(),
            value: value.to_string(),
        }
    }

    #[test]
    fn test_latest_numeric_skips_placeholders() {
        let observations = vec![
            obs("2025-09-05", "."),
            obs("2025-09-04", "147.82"),
            obs("2025-09-03", "148.10"),
        ];
        let latest = latest_numeric(&observations).unwrap();
        assert_eq!(latest.date, "2025-09-04");
        assert!((latest.value - 147.82).abs() < f64::EPSILON);
    }

    #[test]
    fn test_latest_numeric_none_when_all_missing() {
        assert!(latest_numeric(&[obs("2025-09-05", ".")]).is_none());
        assert!(latest_numeric(&[]).is_none());
    }

    #[test]
    fn test_observations_response_parsing() {
        let data: ObservationsResponse = serde_json::from_str(
            r#"{"observations":[{"realtime_start":"2025-09-05","date":"2025-09-04","value":"4.25"}]}"#,
        )
        .unwrap();
        assert_eq!(data.observations.len(), 1);
        assert_eq!(data.observations[0].parsed().unwrap().value, 4.25);
    }

    #[test]
    fn test_treasury_curve_series() {
        assert_eq!(series::TREASURY_CURVE.len(), 11);
        assert!(series::TREASURY_CURVE.contains(&("10y", "DGS10")));
    }

    #[tokio::test]
    #[ignore = "requires FRED_API_KEY and network access"]
    async fn test_get_latest_live() {
        let key = std::env::var("FRED_API_KEY").unwrap();
        let client = FredClient::new(key, 120, Duration::from_secs(30)).unwrap();
        let latest = client.get_latest(series::USD_JPY).await.unwrap();
        assert!(latest.value > 50.0);
    }
}
