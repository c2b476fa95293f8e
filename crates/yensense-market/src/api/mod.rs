//! API clients for market data providers

pub mod alpha_vantage;
pub mod fred;

pub use alpha_vantage::AlphaVantageClient;
pub use fred::{FredClient, ParsedObservation, series as fred_series};
