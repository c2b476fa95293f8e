//! Market data gateway for the YenSense pipeline
//!
//! [`MarketDataSource`] is the collaborator the data-collection stage talks
//! to. [`MarketDataFetcher`] implements it over FRED and Alpha Vantage,
//! caching series lookups and substituting documented fallback values for
//! anything it cannot fetch, so `fetch_all` never fails.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod fetcher;
pub mod sentiment;
pub mod source;

pub use cache::{CacheKey, MarketCache};
pub use config::{MarketConfig, MarketConfigBuilder};
pub use error::{MarketError, Result};
pub use fetcher::MarketDataFetcher;
pub use sentiment::calculate_sentiment_score;
pub use source::MarketDataSource;
