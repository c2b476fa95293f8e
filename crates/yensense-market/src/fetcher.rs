//! Concrete market data source over FRED and Alpha Vantage

use crate::api::{AlphaVantageClient, FredClient, fred_series as series};
use crate::cache::{CacheKey, MarketCache};
use crate::config::MarketConfig;
use crate::error::{MarketError, Result};
use crate::sentiment::calculate_sentiment_score;
use crate::source::MarketDataSource;
use async_trait::async_trait;
use std::collections::BTreeMap;
use tracing::{debug, info, instrument, warn};
use yensense_core::{
    FxRates, MacroData, NewsItem, NewsSource, RawData, RepoRates, YieldCurves,
};

/// Fetches live data where API keys are configured and falls back to
/// reference values everywhere else
///
/// JGB yields, repo rates and news feeds come from scraped sources in a full
/// deployment; this fetcher always supplies their reference values.
pub struct MarketDataFetcher {
    fred: Option<FredClient>,
    alpha_vantage: Option<AlphaVantageClient>,
    cache: MarketCache,
}

impl MarketDataFetcher {
    pub fn new(config: &MarketConfig) -> Result<Self> {
        config.validate()?;

        let fred = config
            .fred_api_key
            .as_ref()
            .map(|key| FredClient::new(key.clone(), config.fred_rate_limit, config.request_timeout))
            .transpose()?;
        let alpha_vantage = config
            .alpha_vantage_api_key
            .as_ref()
            .map(|key| {
                AlphaVantageClient::new(
                    key.clone(),
                    config.alpha_vantage_rate_limit,
                    config.request_timeout,
                )
            })
            .transpose()?;

        if fred.is_none() && alpha_vantage.is_none() {
            info!("No market data API keys configured, reference values will be used");
        }

        Ok(Self {
            fred,
            alpha_vantage,
            cache: MarketCache::new(config.cache_ttl),
        })
    }

    pub fn cache(&self) -> &MarketCache {
        &self.cache
    }

    /// Spot FX, preferring Alpha Vantage and filling gaps from FRED
    pub async fn fetch_fx_rates(&self) -> Result<FxRates> {
        let usd_jpy = match self.fx_rate("USD", "JPY").await {
            Ok(rate) => Some(rate),
            Err(e) => {
                log_miss("USD/JPY from Alpha Vantage", &e);
                self.fred_optional(series::USD_JPY).await
            }
        };
        let fred_eur_usd = self.fred_optional(series::EUR_USD).await;

        let eur_jpy = match self.fx_rate("EUR", "JPY").await {
            Ok(rate) => Some(rate),
            Err(e) => {
                log_miss("EUR/JPY from Alpha Vantage", &e);
                usd_jpy
                    .zip(fred_eur_usd)
                    .map(|(usd_jpy, eur_usd)| round4(usd_jpy * eur_usd))
            }
        };
        let eur_usd = fred_eur_usd.or_else(|| {
            eur_jpy
                .zip(usd_jpy)
                .map(|(eur_jpy, usd_jpy)| round4(eur_jpy / usd_jpy))
        });
        let dollar_index = self.fred_optional(series::DOLLAR_INDEX).await;

        if usd_jpy.is_none() {
            return Err(MarketError::DataUnavailable {
                series: "USD/JPY".to_string(),
                reason: "no provider returned a rate".to_string(),
            });
        }

        Ok(FxRates {
            usd_jpy,
            eur_jpy,
            eur_usd,
            dollar_index,
        })
    }

    /// Japanese and U.S. macro indicators from FRED
    pub async fn fetch_macro_data(&self) -> Result<MacroData> {
        let data = MacroData {
            japan_cpi: self.fred_optional(series::JAPAN_CPI).await,
            japan_gdp: self.fred_optional(series::JAPAN_GDP).await,
            us_gdp: self.fred_optional(series::US_GDP).await,
        };

        if data == MacroData::default() {
            return Err(MarketError::DataUnavailable {
                series: "macro indicators".to_string(),
                reason: "no series returned a value".to_string(),
            });
        }
        Ok(data)
    }

    /// Treasury curve by tenor from FRED
    pub async fn fetch_treasury_curve(&self) -> Result<BTreeMap<String, f64>> {
        let mut curve = BTreeMap::new();
        for (tenor, series_id) in series::TREASURY_CURVE {
            if let Some(value) = self.fred_optional(series_id).await {
                curve.insert(tenor.to_string(), value);
            }
        }

        if curve.is_empty() {
            return Err(MarketError::DataUnavailable {
                series: "treasury curve".to_string(),
                reason: "no tenor returned a value".to_string(),
            });
        }
        Ok(curve)
    }

    async fn fred_latest(&self, series_id: &str) -> Result<f64> {
        let fred = self.fred.as_ref().ok_or(MarketError::NotConfigured("FRED"))?;
        self.cache
            .get_or_fetch(CacheKey::new("fred", series_id), move || async move {
                fred.get_latest(series_id).await.map(|obs| obs.value)
            })
            .await
    }

    async fn fred_optional(&self, series_id: &str) -> Option<f64> {
        match self.fred_latest(series_id).await {
            Ok(value) => Some(value),
            Err(e) => {
                log_miss(series_id, &e);
                None
            }
        }
    }

    async fn fx_rate(&self, from: &str, to: &str) -> Result<f64> {
        let client = self
            .alpha_vantage
            .as_ref()
            .ok_or(MarketError::NotConfigured("Alpha Vantage"))?;
        self.cache
            .get_or_fetch(CacheKey::new("alpha_vantage", format!("{from}/{to}")), move || {
                client.exchange_rate(from, to)
            })
            .await
    }
}

#[async_trait]
impl MarketDataSource for MarketDataFetcher {
    #[instrument(skip(self))]
    async fn fetch_all(&self) -> RawData {
        info!("Fetching market data");

        let fx_rates = self.fetch_fx_rates().await.unwrap_or_else(|e| {
            log_fallback("fx_rates", &e);
            FxRates::fallback()
        });
        let macro_data = self.fetch_macro_data().await.unwrap_or_else(|e| {
            log_fallback("macro_data", &e);
            MacroData::fallback()
        });
        let reference_curves = YieldCurves::fallback();
        let ust = self.fetch_treasury_curve().await.unwrap_or_else(|e| {
            log_fallback("yield_curves", &e);
            reference_curves.ust.clone()
        });

        let sentiment_score = calculate_sentiment_score(fx_rates.usd_jpy, macro_data.japan_cpi);
        debug!(sentiment_score, "Market data assembled");

        RawData {
            fx_rates: Some(fx_rates),
            macro_data: Some(macro_data),
            yield_curves: Some(YieldCurves {
                ust,
                jgb: reference_curves.jgb,
            }),
            repo_rates: Some(RepoRates::fallback()),
            boj_news: Some(vec![NewsItem::placeholder(NewsSource::Boj)]),
            reuters_news: Some(vec![NewsItem::placeholder(NewsSource::Reuters)]),
            nikkei_news: Some(vec![NewsItem::placeholder(NewsSource::Nikkei)]),
            sentiment_score: Some(sentiment_score),
        }
    }
}

fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

fn log_miss(what: &str, err: &MarketError) {
    if matches!(err, MarketError::NotConfigured(_)) {
        debug!("Skipping {}: {}", what, err);
    } else {
        warn!("Failed to fetch {}: {}", what, err);
    }
}

fn log_fallback(category: &str, err: &MarketError) {
    info!("Using reference values for {}: {}", category, err);
}
